//! Verifies the Shopping List feature renders on the dashboard.
//!
//! When the dev server requires authentication this scenario lands on the
//! login page and reports `blocked` instead of failing, since the feature
//! itself is not disproven.

use clap::Parser;
use lifebalance_verify::navigation::SettlePolicy;
use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome, EXIT_LAUNCH_FAILURE};
use lifebalance_verify::session::DeviceProfile;
use lifebalance_verify::wait::WaitCondition;
use lifebalance_verify::Result;
use std::time::Duration;

async fn script(s: &Scenario) -> Result<ScenarioOutcome> {
    s.navigate(&s.target()).await?;
    s.settle(&SettlePolicy::network_idle()).await?;

    if let Some(blocked) = s.guard_login_redirect().await? {
        return Ok(blocked);
    }

    s.wait_for(
        &WaitCondition::text("Shopping List"),
        Duration::from_secs(10),
    )
    .await?;

    s.screenshot("page", false).await?;
    Ok(ScenarioOutcome::Success)
}

#[tokio::main]
async fn main() {
    let args = RunArgs::parse();
    args.init_tracing();

    let config = args.session_config(DeviceProfile::Desktop {
        width: 1280,
        height: 800,
    });
    let scenario = match Scenario::start("shopping-list", &args, config).await {
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
