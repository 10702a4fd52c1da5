// ABOUTME: Deploy command implementation.
// ABOUTME: Builds shippers from config and runs the engine across every target.

use shipit::config::Config;
use shipit::engine::{Engine, RunOptions};
use shipit::error::Result;
use shipit::output::Output;
use shipit::shippers::ShipperRegistry;

/// Deploy to all configured targets.
pub async fn deploy(config: Config, options: RunOptions, mut output: Output) -> Result<()> {
    output.start_timer();

    let targets = ShipperRegistry::builtin().build_targets(&config.targets)?;
    let engine = Engine::new(targets, output.clone())?;

    output.progress(&format!("Deploying to {} target(s)", engine.targets().len()));
    for target in engine.targets() {
        output.progress(&format!("  {} ({})", target.name, target.shipper.kind()));
    }
    if let Some(version) = &options.version {
        output.progress(&format!("Version: {version}"));
    }

    engine.run(options).await?;

    output.success("Deployment complete!");
    Ok(())
}
