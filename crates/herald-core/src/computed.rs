//! Literal-or-computed policy values

use std::fmt;
use std::sync::Arc;

use crate::session::Session;

/// A policy value that is either fixed or derived from the invoking session
///
/// ```
/// use herald_core::{Computed, Session};
///
/// let fixed: Computed<u32> = Computed::Literal(2);
/// let per_platform = Computed::computed(|s: &Session| if s.platform == "test" { 5 } else { 1 });
///
/// let session = Session::new("test", "alice");
/// assert_eq!(fixed.resolve(&session), 2);
/// assert_eq!(per_platform.resolve(&session), 5);
/// ```
pub enum Computed<T> {
    Literal(T),
    Computed(Arc<dyn Fn(&Session) -> T + Send + Sync>),
}

impl<T: Clone> Computed<T> {
    /// Wrap a session-dependent function
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Session) -> T + Send + Sync + 'static,
    {
        Computed::Computed(Arc::new(f))
    }

    /// Evaluate against a session
    pub fn resolve(&self, session: &Session) -> T {
        match self {
            Computed::Literal(value) => value.clone(),
            Computed::Computed(f) => f(session),
        }
    }

    /// The literal value, if this is not session-dependent
    pub fn literal(&self) -> Option<&T> {
        match self {
            Computed::Literal(value) => Some(value),
            Computed::Computed(_) => None,
        }
    }
}

impl<T: Clone> Clone for Computed<T> {
    fn clone(&self) -> Self {
        match self {
            Computed::Literal(value) => Computed::Literal(value.clone()),
            Computed::Computed(f) => Computed::Computed(f.clone()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computed::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Computed::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

impl<T> From<T> for Computed<T> {
    fn from(value: T) -> Self {
        Computed::Literal(value)
    }
}
