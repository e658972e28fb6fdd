//! Verifies the auth-bypass flow.
//!
//! `/#/login?bypass=true` must redirect to the dashboard with the red
//! "TEST MODE ENABLED" banner and the "Safe to Spend" headline visible.

use clap::Parser;
use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome, EXIT_LAUNCH_FAILURE};
use lifebalance_verify::session::DeviceProfile;
use lifebalance_verify::wait::WaitCondition;
use lifebalance_verify::Result;
use std::time::Duration;
use tracing::info;

async fn script(s: &Scenario) -> Result<ScenarioOutcome> {
    let target = s.target().route("/login").query("bypass", "true");
    s.navigate(&target).await?;

    info!("Waiting for dashboard redirect");
    s.wait_for(
        &WaitCondition::text("TEST MODE ENABLED"),
        Duration::from_secs(10),
    )
    .await?;
    info!("Test mode banner found");

    s.wait_for(&WaitCondition::text("Safe to Spend"), Duration::from_secs(5))
        .await?;

    s.screenshot("success", false).await?;
    Ok(ScenarioOutcome::Success)
}

#[tokio::main]
async fn main() {
    let args = RunArgs::parse();
    args.init_tracing();

    let config = args.session_config(DeviceProfile::default());
    let scenario = match Scenario::start("bypass", &args, config).await {
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
