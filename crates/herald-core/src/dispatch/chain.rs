//! The action chain and its shared cursor

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::dispatch::handler::ActionResult;

/// One link of the action chain
pub type Continuation = Arc<dyn Fn(Next) -> BoxFuture<'static, ActionResult> + Send + Sync>;

/// Build a [`Continuation`] from an async closure
pub fn continuation<F, Fut>(f: F) -> Continuation
where
    F: Fn(Next) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ActionResult> + Send + 'static,
{
    Arc::new(move |next| Box::pin(f(next)))
}

/// The default terminal continuation: advance once more and yield nothing
pub fn default_fallback() -> Continuation {
    continuation(|next: Next| async move { next.call().await })
}

struct Chain {
    queue: Vec<Continuation>,
    index: AtomicUsize,
}

/// Forward continuation handed to each link
///
/// Every [`Next::call`] advances the single shared cursor and runs the link
/// it lands on. Past the end it resolves to `Ok(None)`.
#[derive(Clone)]
pub struct Next {
    chain: Arc<Chain>,
}

impl Next {
    pub(crate) fn new(queue: Vec<Continuation>) -> Self {
        Self {
            chain: Arc::new(Chain {
                queue,
                index: AtomicUsize::new(0),
            }),
        }
    }

    /// Run the next link of the chain
    ///
    /// # Errors
    ///
    /// Returns whatever the invoked link returns.
    pub async fn call(&self) -> ActionResult {
        let index = self.chain.index.fetch_add(1, Ordering::SeqCst);
        match self.chain.queue.get(index) {
            Some(link) => link(self.clone()).await,
            None => Ok(None),
        }
    }

    /// How many links have been entered so far
    pub fn position(&self) -> usize {
        self.chain.index.load(Ordering::SeqCst)
    }

    /// Total links, fallback included
    pub fn len(&self) -> usize {
        self.chain.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.queue.is_empty()
    }
}
