use tokio_util::sync::CancellationToken;

use super::{config::Config, machine::Machine};
use crate::error::MachineError;
use crate::middleware::Middleware;

/// Builder for constructing a [`Machine`] with a fluent API.
pub struct MachineBuilder<M> {
    cfg: Config<M>,
}

impl<M> MachineBuilder<M>
where
    M: Clone + Send + 'static,
{
    /// Creates a builder with [`Config::default`].
    pub fn new() -> Self {
        Self {
            cfg: Config::default(),
        }
    }

    /// Bounds the number of concurrently running routines (`0` = unbounded).
    pub fn max_routines(mut self, n: usize) -> Self {
        self.cfg.max_routines = n;
        self
    }

    /// Bounds each subscription's delivery queue (`0` = unbounded).
    pub fn subscription_capacity(mut self, n: usize) -> Self {
        self.cfg.subscription_capacity = n;
        self
    }

    /// Appends a machine-level middleware; earlier middlewares wrap later ones.
    pub fn with_middleware(mut self, mw: Middleware<M>) -> Self {
        self.cfg.middlewares.push(mw);
        self
    }

    /// Appends several machine-level middlewares, outermost first.
    pub fn with_middlewares(mut self, mws: impl IntoIterator<Item = Middleware<M>>) -> Self {
        self.cfg.middlewares.extend(mws);
        self
    }

    /// Builds the machine; its root token is a child of `parent`.
    pub fn build(self, parent: &CancellationToken) -> Result<Machine<M>, MachineError> {
        Machine::new(parent, self.cfg)
    }
}

impl<M> Default for MachineBuilder<M>
where
    M: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
