use crate::core::context::Context;
use crate::utils::error::Result;
use futures::future::BoxFuture;

type Compensation = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Undo actions registered while a saga makes progress.
///
/// Register the compensation *before* running the step it undoes, so a step
/// that failed half-way is still undone.
#[derive(Default)]
pub struct Compensations {
    steps: Vec<(String, Compensation)>,
}

impl Compensations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, name: impl Into<String>, compensation: F)
    where
        F: Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.steps.push((name.into(), Box::new(compensation)));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every compensation in reverse registration order, each as a side
    /// effect of its own.
    pub async fn compensate(self, ctx: &Context) -> Result<()> {
        tracing::warn!(steps = self.steps.len(), "🔄 Running compensations");
        for (name, compensation) in self.steps.into_iter().rev() {
            ctx.run(name.as_str(), || compensation()).await?;
        }
        Ok(())
    }
}
