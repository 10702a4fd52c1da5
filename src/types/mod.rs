// ABOUTME: Validated domain types shared across the crate.
// ABOUTME: Target names are checked once at config load time.

mod target_name;

pub use target_name::{TargetName, TargetNameError};
