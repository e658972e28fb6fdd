//! Captures the header safe-area padding on an iPhone 14 Pro viewport.
//!
//! The header must clear the notch; the screenshot shows whether the
//! safe-area padding is applied.

use clap::Parser;
use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome, EXIT_LAUNCH_FAILURE};
use lifebalance_verify::session::DeviceProfile;
use lifebalance_verify::wait::WaitCondition;
use lifebalance_verify::Result;
use std::time::Duration;

async fn script(s: &Scenario) -> Result<ScenarioOutcome> {
    s.navigate(&s.target()).await?;

    s.wait_for(
        &WaitCondition::element_visible("header"),
        Duration::from_secs(10),
    )
    .await?;

    s.screenshot("padding", false).await?;
    Ok(ScenarioOutcome::Success)
}

#[tokio::main]
async fn main() {
    let args = RunArgs::parse();
    args.init_tracing();

    let config = args.session_config(DeviceProfile::IPhone14Pro);
    let scenario = match Scenario::start("header", &args, config).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Browser launch failed: {e}");
            std::process::exit(EXIT_LAUNCH_FAILURE);
        }
    };

    let outcome = script(&scenario).await;
    let result = scenario.finish(outcome).await;
    std::process::exit(result.exit_code(args.blocked_policy()));
}
