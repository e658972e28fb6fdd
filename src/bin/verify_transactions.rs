//! Verifies the transaction history view on mobile.
//!
//! Enters via `/#/login?test=true`, walks Budget -> History, and expects the
//! merchant/amount search field to appear, which proves the transaction list
//! is mounted.

use clap::Parser;
use lifebalance_verify::navigation::SettlePolicy;
use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome, EXIT_LAUNCH_FAILURE};
use lifebalance_verify::selector::{Resolution, UiTarget};
use lifebalance_verify::session::DeviceProfile;
use lifebalance_verify::wait::WaitCondition;
use lifebalance_verify::Result;
use std::time::Duration;

async fn script(s: &Scenario) -> Result<ScenarioOutcome> {
    let target = s.target().route("/login").query("test", "true");
    s.navigate(&target).await?;
    s.settle(&SettlePolicy::network_idle()).await?;

    s.screenshot("loaded", false).await?;

    let budget = UiTarget::new("Budget link")
        .text("Budget")
        .css("a[href=\"/budget\"]");
    let Resolution::Found(link) = s.resolve_within(&budget, Duration::from_secs(5)).await? else {
        return s.not_found(&budget).await;
    };
    s.interacting();
    link.click().await?;

    let history = UiTarget::new("History tab")
        .role("button", "History")
        .text("History");
    let Resolution::Found(tab) = s.resolve_within(&history, Duration::from_secs(5)).await? else {
        return s.not_found(&history).await;
    };
    s.interacting();
    tab.click().await?;

    s.wait_for(
        &WaitCondition::element_visible("input[placeholder=\"Search merchant or amount...\"]"),
        Duration::from_secs(10),
    )
    .await?;

    s.screenshot("history", false).await?;
    Ok(ScenarioOutcome::Success)
}

#[tokio::main]
async fn main() {
    let args = RunArgs::parse();
    args.init_tracing();

    let config = args.session_config(DeviceProfile::Phone);
    let scenario = match Scenario::start("transactions", &args, config).await {
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
