//! Units of work the scheduler executes on every worker of the pool.

use axon_core::sync::TickContext;

use super::error::BindingError;

/// Work attached to a clock.
///
/// `execute` runs once per tick of the owning clock on *every* worker, with
/// the same `t`, `dt` and `step`. A binding that calls `ctx.barrier()` must
/// do so the same number of times on every worker, including on its error
/// paths; otherwise the pool's barriers fall out of step.
pub trait Binding: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, ctx: &TickContext<'_>) -> Result<(), BindingError>;
}

/// Binding backed by a closure.
pub struct FnBinding<F> {
    name: String,
    body: F,
}

impl<F> FnBinding<F>
where
    F: Fn(&TickContext<'_>) -> Result<(), BindingError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<F> Binding for FnBinding<F>
where
    F: Fn(&TickContext<'_>) -> Result<(), BindingError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &TickContext<'_>) -> Result<(), BindingError> {
        (self.body)(ctx)
    }
}

impl<F> std::fmt::Debug for FnBinding<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBinding").field("name", &self.name).finish()
    }
}
