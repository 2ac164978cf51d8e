//! Checker and action handler traits

use std::future::Future;

use async_trait::async_trait;

use crate::argv::Argv;
use crate::dispatch::chain::Next;

/// Outcome of an action or continuation
///
/// `Ok(Some(reply))` ends the chain with `reply`; `Ok(None)` lets the
/// dispatch fall through to an empty reply.
pub type ActionResult = anyhow::Result<Option<String>>;

/// A pre-check that may veto an invocation
///
/// Returning `Ok(Some(hint))` aborts dispatch with `hint` as the reply, even
/// when `hint` is empty. Errors propagate to the dispatch caller.
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, argv: &mut Argv) -> anyhow::Result<Option<String>>;
}

/// A continuation-chained command behavior
///
/// `next` proceeds to the remaining chain; an action that never calls it
/// short-circuits everything after it.
#[async_trait]
pub trait Action: Send + Sync {
    async fn call(&self, argv: Argv, next: Next) -> ActionResult;
}

#[async_trait]
impl<F, Fut> Action for F
where
    F: Fn(Argv, Next) -> Fut + Send + Sync,
    Fut: Future<Output = ActionResult> + Send,
{
    async fn call(&self, argv: Argv, next: Next) -> ActionResult {
        self(argv, next).await
    }
}

/// Pin down the argument types of an action closure
///
/// ```
/// use herald_core::dispatch::action_fn;
///
/// let echo = action_fn(|argv, _next| async move {
///     Ok(argv.args.first().map(|arg| arg.to_string()))
/// });
/// # let _ = echo;
/// ```
pub fn action_fn<F, Fut>(f: F) -> F
where
    F: Fn(Argv, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
    f
}

/// Adapter turning a synchronous closure into a [`Checker`]
pub struct FnChecker<F>(F);

#[async_trait]
impl<F> Checker for FnChecker<F>
where
    F: Fn(&mut Argv) -> anyhow::Result<Option<String>> + Send + Sync,
{
    async fn check(&self, argv: &mut Argv) -> anyhow::Result<Option<String>> {
        (self.0)(argv)
    }
}

/// Build a checker from a synchronous closure
///
/// ```
/// use herald_core::dispatch::checker_fn;
///
/// let deny_empty = checker_fn(|argv| {
///     Ok(argv.args.is_empty().then(|| "nothing to do".to_string()))
/// });
/// # let _ = deny_empty;
/// ```
pub fn checker_fn<F>(f: F) -> FnChecker<F>
where
    F: Fn(&mut Argv) -> anyhow::Result<Option<String>> + Send + Sync,
{
    FnChecker(f)
}
