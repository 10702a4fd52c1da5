// ABOUTME: Targets command implementation.
// ABOUTME: Validates every target's options and lists names with shipper kinds.

use shipit::config::Config;
use shipit::error::Result;
use shipit::output::{Output, OutputMode};
use shipit::shippers::ShipperRegistry;

pub fn targets(config: &Config, output: &Output) -> Result<()> {
    let targets = ShipperRegistry::builtin().build_targets(&config.targets)?;

    for target in &targets {
        match output.mode() {
            OutputMode::Json => {
                let line = serde_json::json!({
                    "target": target.name.as_str(),
                    "kind": target.shipper.kind(),
                });
                println!("{line}");
            }
            OutputMode::Normal | OutputMode::Quiet => {
                println!("{}\t{}", target.name, target.shipper.kind());
            }
        }
    }
    Ok(())
}
