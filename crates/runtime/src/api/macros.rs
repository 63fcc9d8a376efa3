//! Macro execution port used by AfterDamage activations.
use async_trait::async_trait;

use combat_core::ActorId;

use super::errors::Result;

#[async_trait]
pub trait MacroRunner: Send + Sync {
    /// Runs the named macro for `actor` against the final target set.
    async fn run(&self, name: &str, actor: &ActorId, targets: &[ActorId]) -> Result<()>;
}

/// Runner for sessions without a macro host; logs and succeeds.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMacros;

#[async_trait]
impl MacroRunner for NoopMacros {
    async fn run(&self, name: &str, actor: &ActorId, targets: &[ActorId]) -> Result<()> {
        tracing::debug!(
            target: "runtime::macros",
            name,
            actor = %actor,
            targets = targets.len(),
            "No macro host configured"
        );
        Ok(())
    }
}
