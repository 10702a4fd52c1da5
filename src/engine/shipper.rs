// ABOUTME: The capability contract every deployment target implements.
// ABOUTME: Targets bind a validated name to one shared shipper instance.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::ShipContext;
use super::error::ShipError;
use crate::types::TargetName;

/// Something that can ship a new version to one target and revert it.
///
/// Both methods are called at most once per run. Implementations keep their
/// own rollback readiness: `rollback` must succeed without side effects when
/// `ship_it` never reached a mutating step.
#[async_trait]
pub trait Shipper: Send + Sync {
    /// Registry name of this shipper's kind.
    fn kind(&self) -> &'static str;

    /// Deploy the version carried by `ctx`.
    ///
    /// Implementations check `ctx.is_cancelled()` between steps and return
    /// `Ok(())` early once cancelled. They never call `rollback` themselves.
    async fn ship_it(&self, ctx: &ShipContext) -> Result<(), ShipError>;

    /// Revert whatever `ship_it` changed. Best effort.
    async fn rollback(&self, ctx: &ShipContext) -> Result<(), ShipError>;
}

/// One named deployment destination.
#[derive(Clone)]
pub struct Target {
    pub name: TargetName,
    pub shipper: Arc<dyn Shipper>,
}

impl Target {
    pub fn new(name: TargetName, shipper: Arc<dyn Shipper>) -> Self {
        Self { name, shipper }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("kind", &self.shipper.kind())
            .finish()
    }
}
