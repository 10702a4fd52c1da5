// ABOUTME: Command module aggregator for the shipit CLI.
// ABOUTME: Re-exports the deploy and targets command handlers.

mod deploy;
mod targets;

pub use deploy::deploy;
pub use targets::targets;
