//! Verifies the transaction-history Export action.
//!
//! Seeds the test-mode flag into session storage so mock providers populate
//! data, navigates Budget -> History, and expects the Export button to be
//! reachable within 10 seconds. A desktop viewport keeps the filter row and
//! export controls on screen.

use clap::Parser;
use lifebalance_verify::navigation::SettlePolicy;
use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome, EXIT_LAUNCH_FAILURE};
use lifebalance_verify::selector::{Resolution, UiTarget};
use lifebalance_verify::session::{DeviceProfile, StorageSeed};
use lifebalance_verify::Result;
use std::time::Duration;
use tracing::info;

async fn script(s: &Scenario) -> Result<ScenarioOutcome> {
    s.navigate(&s.target()).await?;
    s.settle(&SettlePolicy::network_idle()).await?;

    if let Some(blocked) = s.guard_login_redirect().await? {
        return Ok(blocked);
    }

    let budget = UiTarget::new("Budget link")
        .role("link", "Budget")
        .text("Budget")
        .css("a[href=\"/budget\"]");
    let Resolution::Found(link) = s.resolve_within(&budget, Duration::from_secs(5)).await? else {
        return s.not_found(&budget).await;
    };
    s.interacting();
    link.click().await?;

    let history = UiTarget::new("History tab").role("button", "History").text("History");
    let Resolution::Found(tab) = s.resolve_within(&history, Duration::from_secs(5)).await? else {
        return s.not_found(&history).await;
    };
    s.interacting();
    tab.click().await?;

    let export = UiTarget::new("Export button").role("button", "Export");
    match s.resolve_within(&export, Duration::from_secs(10)).await? {
        Resolution::Found(button) => {
            info!("Export button resolved via {}", button.strategy);
            button.scroll_into_view().await?;
            s.screenshot("success", false).await?;
            Ok(ScenarioOutcome::Success)
        }
        Resolution::NotFound => s.not_found(&export).await,
    }
}

#[tokio::main]
async fn main() {
    let args = RunArgs::parse();
    args.init_tracing();

    let mut config = args.session_config(DeviceProfile::Desktop {
        width: 1280,
        height: 800,
    });
    config
        .storage_seeds
        .push(StorageSeed::session("LIFEBALANCE_TEST_MODE", "true"));

    let scenario = match Scenario::start("export", &args, config).await {
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
