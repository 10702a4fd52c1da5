// ABOUTME: No-op shipper that always succeeds.
// ABOUTME: Useful for dry runs and as a placeholder target.

use std::sync::Arc;

use async_trait::async_trait;
use serde_yaml::Mapping;

use super::{ConfigError, parse_options};
use crate::engine::{ShipContext, ShipError, Shipper};
use crate::types::TargetName;

pub const KIND: &str = "null";

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct NullOptions {}

/// Ships nothing and rolls back nothing.
#[derive(Debug, Default)]
pub struct NullShipper;

impl NullShipper {
    pub fn from_options(
        target: &TargetName,
        options: &Mapping,
    ) -> Result<Arc<dyn Shipper>, ConfigError> {
        let _: NullOptions = parse_options(target, KIND, options)?;
        Ok(Arc::new(NullShipper))
    }
}

#[async_trait]
impl Shipper for NullShipper {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn ship_it(&self, _ctx: &ShipContext) -> Result<(), ShipError> {
        Ok(())
    }

    async fn rollback(&self, _ctx: &ShipContext) -> Result<(), ShipError> {
        Ok(())
    }
}
