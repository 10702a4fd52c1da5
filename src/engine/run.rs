// ABOUTME: Deployment engine: concurrent deploy phase, then conditional rollback phase.
// ABOUTME: The first deploy failure cancels the phase and decides the run's verdict.

use std::collections::HashSet;
use std::sync::Arc;

use super::context::{RunOptions, ShipContext};
use super::error::{EngineError, ShipFailure};
use super::fan::fan_out;
use super::shipper::Target;
use crate::output::Output;

/// Orchestrates one deployment across a fixed set of targets.
pub struct Engine {
    targets: Vec<Target>,
    output: Output,
}

impl Engine {
    /// Build an engine over `targets`. Names must be unique.
    pub fn new(targets: Vec<Target>, output: Output) -> Result<Self, EngineError> {
        if targets.is_empty() {
            return Err(EngineError::NoTargets);
        }

        let mut seen = HashSet::with_capacity(targets.len());
        for target in &targets {
            if !seen.insert(&target.name) {
                return Err(EngineError::DuplicateTarget(target.name.clone()));
            }
        }

        Ok(Self { targets, output })
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Ship `options` to every target.
    ///
    /// If any target fails, every target is offered a rollback under a fresh
    /// context and the first deploy failure is returned. Rollback failures
    /// are printed and attached to the error but never change the verdict.
    pub async fn run(&self, options: RunOptions) -> Result<(), EngineError> {
        let options = Arc::new(options);

        let deploy_ctx = ShipContext::new(Arc::clone(&options));
        let Some(cause) = self.run_deploy(&deploy_ctx).await else {
            tracing::info!(targets = self.targets.len(), "deploy succeeded");
            return Ok(());
        };

        self.output.rollback_banner(&cause);

        // The deploy context is cancelled by now; rollback must not inherit it.
        let rollback_ctx = ShipContext::new(options);
        let rollback_failures = self.run_rollback(&rollback_ctx).await;

        Err(EngineError::DeployFailed {
            cause,
            rollback_failures,
        })
    }

    /// Returns the first failure, if any. Cancels `ctx` as soon as one is seen
    /// and keeps draining until every target has finished.
    async fn run_deploy(&self, ctx: &ShipContext) -> Option<ShipFailure> {
        let op_ctx = ctx.clone();
        let mut failures = fan_out(&self.targets, move |shipper| {
            let ctx = op_ctx.clone();
            async move { shipper.ship_it(&ctx).await }
        });

        let mut first = None;
        while let Some(failure) = failures.recv().await {
            self.output.failure(&failure);
            if first.is_none() {
                tracing::debug!(target_name = %failure.target, "cancelling deploy phase");
                ctx.cancel();
                first = Some(failure);
            }
        }
        first
    }

    async fn run_rollback(&self, ctx: &ShipContext) -> Vec<ShipFailure> {
        let op_ctx = ctx.clone();
        let mut failures = fan_out(&self.targets, move |shipper| {
            let ctx = op_ctx.clone();
            async move { shipper.rollback(&ctx).await }
        });

        let mut collected = Vec::new();
        while let Some(failure) = failures.recv().await {
            self.output.failure(&failure);
            collected.push(failure);
        }

        if collected.is_empty() {
            tracing::info!("rollback completed");
        } else {
            tracing::warn!(failed = collected.len(), "rollback completed with failures");
        }
        collected
    }
}
