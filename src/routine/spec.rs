//! # Per-routine options.
//!
//! [`RoutineSpec`] bundles what `Machine::go` needs to know besides the work itself:
//! - optional explicit PID (generated when absent)
//! - ordered tags (duplicates allowed)
//! - optional timeout bounding the routine's context
//! - per-routine middlewares, composed inside the machine-level chain

use std::fmt;
use std::time::Duration;

use crate::middleware::Middleware;

/// Options for one routine.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use routine_machine::RoutineSpec;
///
/// let spec = RoutineSpec::<()>::new()
///     .with_pid("publisher")
///     .with_tags(["publish", "acme"])
///     .with_timeout(Duration::from_secs(3));
///
/// assert_eq!(spec.pid(), Some("publisher"));
/// assert_eq!(spec.tags(), ["publish", "acme"]);
/// ```
pub struct RoutineSpec<M> {
    pid: Option<String>,
    tags: Vec<String>,
    timeout: Option<Duration>,
    middlewares: Vec<Middleware<M>>,
}

impl<M> RoutineSpec<M> {
    /// Creates a spec with a generated PID, no tags, no timeout and no middlewares.
    pub fn new() -> Self {
        Self {
            pid: None,
            tags: Vec::new(),
            timeout: None,
            middlewares: Vec::new(),
        }
    }

    /// Uses an explicit PID instead of a generated one.
    pub fn with_pid(mut self, pid: impl Into<String>) -> Self {
        self.pid = Some(pid.into());
        self
    }

    /// Appends one tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Appends tags in order.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Cancels the routine's context once `timeout` elapsed after admission.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Appends a per-routine middleware; earlier ones wrap later ones.
    pub fn with_middleware(mut self, mw: Middleware<M>) -> Self {
        self.middlewares.push(mw);
        self
    }

    /// Appends several per-routine middlewares, outermost first.
    pub fn with_middlewares(mut self, mws: impl IntoIterator<Item = Middleware<M>>) -> Self {
        self.middlewares.extend(mws);
        self
    }

    /// Returns the explicit PID, if any.
    pub fn pid(&self) -> Option<&str> {
        self.pid.as_deref()
    }

    /// Returns the tags.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn into_parts(
        self,
    ) -> (Option<String>, Vec<String>, Option<Duration>, Vec<Middleware<M>>) {
        (self.pid, self.tags, self.timeout, self.middlewares)
    }
}

impl<M> Default for RoutineSpec<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for RoutineSpec<M> {
    fn clone(&self) -> Self {
        Self {
            pid: self.pid.clone(),
            tags: self.tags.clone(),
            timeout: self.timeout,
            middlewares: self.middlewares.clone(),
        }
    }
}

impl<M> fmt::Debug for RoutineSpec<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutineSpec")
            .field("pid", &self.pid)
            .field("tags", &self.tags)
            .field("timeout", &self.timeout)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}
