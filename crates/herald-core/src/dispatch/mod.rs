//! Dispatch pipeline
//!
//! Executes one [`Argv`] against a snapshot of its command's handlers:
//!
//! 1. An upstream parse error is returned as-is.
//! 2. Checkers run in order; the first `Some` reply aborts dispatch.
//! 3. Actions run as a continuation chain ending in a fallback link.
//! 4. A fault raised before the cursor reaches the end of the chain is
//!    logged and swallowed (empty reply); a fault raised once the cursor sits
//!    exactly at the end propagates to the caller.

pub mod chain;
pub mod handler;

use std::sync::Arc;

use herald_core_types::schema::EVENT_FAULT_SUPPRESSED;

use crate::argv::Argv;

pub use chain::{continuation, default_fallback, Continuation, Next};
pub use handler::{action_fn, checker_fn, Action, ActionResult, Checker, FnChecker};

/// A prepared invocation: the argv plus the handlers captured at preparation
///
/// Built by [`CommandRegistry::prepare`](crate::command::CommandRegistry::prepare).
pub struct Dispatch {
    pub(crate) argv: Argv,
    pub(crate) checkers: Vec<Arc<dyn Checker>>,
    pub(crate) actions: Vec<Arc<dyn Action>>,
}

impl Dispatch {
    pub fn argv(&self) -> &Argv {
        &self.argv
    }

    pub fn argv_mut(&mut self) -> &mut Argv {
        &mut self.argv
    }

    /// Run the invocation
    ///
    /// `fallback` is the terminal continuation; `None` uses
    /// [`default_fallback`]. An empty reply means the command ran but had
    /// nothing to say.
    ///
    /// # Errors
    ///
    /// Propagates checker errors, and action faults raised once the chain
    /// cursor has reached its end.
    pub async fn execute(mut self, fallback: Option<Continuation>) -> anyhow::Result<String> {
        if let Some(error) = self.argv.error.take() {
            return Ok(error);
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            let source = self.argv.source().to_string();
            tracing::debug!(
                component = module_path!(),
                op = "execute",
                invocation_id = %self.argv.session.correlation.invocation_id,
                source = %source
            );
        }

        for checker in &self.checkers {
            if let Some(reply) = checker.check(&mut self.argv).await? {
                return Ok(reply);
            }
        }

        let mut queue: Vec<Continuation> = self
            .actions
            .iter()
            .map(|action| {
                let action = Arc::clone(action);
                let argv = self.argv.clone();
                continuation(move |next: Next| {
                    let action = Arc::clone(&action);
                    let argv = argv.clone();
                    async move { action.call(argv, next).await }
                })
            })
            .collect();
        queue.push(fallback.unwrap_or_else(default_fallback));

        let length = queue.len();
        let next = Next::new(queue);

        match next.call().await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Ok(String::new()),
            Err(error) => {
                if next.position() == length {
                    return Err(error);
                }
                let source = self.argv.source().to_string();
                tracing::warn!(
                    component = module_path!(),
                    op = "execute",
                    event = EVENT_FAULT_SUPPRESSED,
                    invocation_id = %self.argv.session.correlation.invocation_id,
                    source = %source,
                    error = %format!("{:#}", error),
                    backtrace = %error.backtrace(),
                );
                Ok(String::new())
            }
        }
    }
}
