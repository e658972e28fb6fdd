//! Captures the full settings page on a phone viewport.
//!
//! The settings page is long; a full-page screenshot covers every section
//! in one artifact.

use clap::Parser;
use lifebalance_verify::navigation::SettlePolicy;
use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome, EXIT_LAUNCH_FAILURE};
use lifebalance_verify::session::DeviceProfile;
use lifebalance_verify::Result;

async fn script(s: &Scenario) -> Result<ScenarioOutcome> {
    s.navigate(&s.target().route("/settings")).await?;
    s.settle(&SettlePolicy::network_idle()).await?;

    if let Some(blocked) = s.guard_login_redirect().await? {
        return Ok(blocked);
    }

    s.screenshot("page", true).await?;
    Ok(ScenarioOutcome::Success)
}

#[tokio::main]
async fn main() {
    let args = RunArgs::parse();
    args.init_tracing();

    let config = args.session_config(DeviceProfile::Phone);
    let scenario = match Scenario::start("settings", &args, config).await {
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
