// ABOUTME: Deployment orchestration across independently deployable targets.
// ABOUTME: Exports the Shipper contract, run context, coordinator, and Engine.

mod context;
mod error;
mod fan;
mod run;
mod shipper;

pub use context::{RunOptions, ShipContext, VERSION_FILE};
pub use error::{EngineError, ShipError, ShipFailure};
pub use fan::fan_out;
pub use run::Engine;
pub use shipper::{Shipper, Target};
