//! Captures the dashboard and settings pages for member-management review.
//!
//! Two screenshots on a desktop viewport: the dashboard (member switcher in
//! the header) and the settings page (household members section).

use clap::Parser;
use lifebalance_verify::navigation::SettlePolicy;
use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome, EXIT_LAUNCH_FAILURE};
use lifebalance_verify::session::DeviceProfile;
use lifebalance_verify::Result;

async fn script(s: &Scenario) -> Result<ScenarioOutcome> {
    s.navigate(&s.target().route("/")).await?;
    s.settle(&SettlePolicy::network_idle()).await?;
    s.screenshot("initial", false).await?;

    s.navigate(&s.target().route("/settings")).await?;
    s.settle(&SettlePolicy::network_idle()).await?;
    s.screenshot("settings", false).await?;

    Ok(ScenarioOutcome::Success)
}

#[tokio::main]
async fn main() {
    let args = RunArgs::parse();
    args.init_tracing();

    let config = args.session_config(DeviceProfile::default());
    let scenario = match Scenario::start("member-management", &args, config).await {
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
