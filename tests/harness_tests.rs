//! Integration tests for the verification harness public API
//!
//! These tests exercise configuration, target description, outcome mapping,
//! and report serialization without launching a browser. Live-browser
//! behavior is covered by running the scenario binaries against a dev server.

use lifebalance_verify::capture::Recorder;
use lifebalance_verify::error::{Error, WaitError};
use lifebalance_verify::navigation::{NavigationTarget, SettlePolicy};
use lifebalance_verify::scenario::{BlockedPolicy, RunArgs, ScenarioOutcome};
use lifebalance_verify::selector::{SelectorStrategy, UiTarget};
use lifebalance_verify::session::{DeviceProfile, SessionConfig, StorageSeed};
use lifebalance_verify::wait::{UrlPattern, WaitCondition};

use clap::Parser;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Session Configuration Tests
// ============================================================================

#[test]
fn test_default_session_is_headless_desktop() {
    let config = SessionConfig::default();
    assert!(config.headless);
    assert!(config.sandbox);
    assert!(!config.device.is_mobile());
    assert_eq!(config.device.dimensions(), (1920, 1080));
}

#[test]
fn test_mobile_profiles_emulate_touch_and_scale() {
    for profile in [DeviceProfile::Phone, DeviceProfile::IPhone14Pro] {
        assert!(profile.is_mobile());
        assert!(profile.scale_factor().is_some());
        assert!(profile.user_agent().unwrap().contains("iPhone"));
    }
    assert_eq!(DeviceProfile::IPhone14Pro.dimensions(), (393, 852));
}

#[test]
fn test_storage_seed_round_trip_through_config() {
    let config = SessionConfig::builder()
        .device(DeviceProfile::Desktop {
            width: 1280,
            height: 800,
        })
        .seed(StorageSeed::session("LIFEBALANCE_TEST_MODE", "true"))
        .seed(StorageSeed::local("theme", "dark"))
        .build();

    assert_eq!(config.storage_seeds.len(), 2);
    assert_eq!(config.storage_seeds[0].key, "LIFEBALANCE_TEST_MODE");
    assert_eq!(config.storage_seeds[1].value, "dark");
}

// ============================================================================
// Navigation Target Tests
// ============================================================================

#[test]
fn test_hash_route_with_bypass_flag() {
    let t = NavigationTarget::base("http://localhost:3000")
        .route("/login")
        .query("bypass", "true");
    assert_eq!(t.url(), "http://localhost:3000/#/login?bypass=true");
}

#[test]
fn test_base_url_override_flows_through_target() {
    // Scenarios run against whatever --base-url points at, including a
    // second dev server on another port.
    let t = NavigationTarget::base("http://localhost:3001").route("/test-toolbar");
    assert_eq!(t.url(), "http://localhost:3001/#/test-toolbar");
    assert!(t.validate().is_ok());
}

#[test]
fn test_invalid_base_url_is_rejected() {
    assert!(NavigationTarget::base("not a url").validate().is_err());
    assert!(NavigationTarget::base("file:///etc/passwd").validate().is_err());
}

#[test]
fn test_settle_policy_constructors() {
    assert!(matches!(
        SettlePolicy::network_idle(),
        SettlePolicy::NetworkIdle { .. }
    ));
    assert!(matches!(
        SettlePolicy::marker(
            WaitCondition::element_visible("header"),
            Duration::from_secs(10)
        ),
        SettlePolicy::Marker { .. }
    ));
}

// ============================================================================
// Wait Condition Tests
// ============================================================================

#[test]
fn test_conditions_describe_for_timeout_reports() {
    assert_eq!(
        WaitCondition::text("TEST MODE ENABLED").describe(),
        "text \"TEST MODE ENABLED\" visible"
    );
    assert_eq!(
        WaitCondition::url(UrlPattern::EndsWith("/login".to_string())).describe(),
        "url ends with \"/login\""
    );
}

#[test]
fn test_login_redirect_pattern() {
    let p = UrlPattern::EndsWith("/login".to_string());
    assert!(p.is_match("http://localhost:3000/#/login"));
    assert!(!p.is_match("http://localhost:3000/#/"));
    assert!(!p.is_match("http://localhost:3000/#/login?bypass=true"));
}

// ============================================================================
// Selector Target Tests
// ============================================================================

#[test]
fn test_target_candidates_are_ordered() {
    let target = UiTarget::new("Export button")
        .role("button", "Export")
        .aria_label("Export transactions")
        .text("Export")
        .css("button.export");

    assert_eq!(target.candidates.len(), 4);
    assert!(matches!(target.candidates[0], SelectorStrategy::Role { .. }));
    assert!(matches!(
        target.candidates[3],
        SelectorStrategy::Css(_)
    ));
}

#[test]
fn test_strategy_descriptions_name_the_locator() {
    let target = UiTarget::new("Safe to Spend toolbar button")
        .aria_label("View Safe to Spend details");
    assert_eq!(
        target.candidates[0].describe(),
        "aria-label=\"View Safe to Spend details\""
    );
}

// ============================================================================
// Outcome and Exit Code Tests
// ============================================================================

#[test]
fn test_outcome_serialization_is_tagged() {
    let json = serde_json::to_value(ScenarioOutcome::Timeout {
        condition: "text \"Safe to Spend\" visible".to_string(),
    })
    .unwrap();
    assert_eq!(json["outcome"], "timeout");
    assert_eq!(json["condition"], "text \"Safe to Spend\" visible");

    let json = serde_json::to_value(ScenarioOutcome::NotFound {
        target: "Export button".to_string(),
    })
    .unwrap();
    assert_eq!(json["outcome"], "not-found");
}

#[test]
fn test_timeout_error_is_distinguishable() {
    let err: Error = WaitError::Timeout {
        condition: "element \"header\" visible".to_string(),
        timeout_ms: 10_000,
    }
    .into();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("10000ms"));
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_run_args_default_base_url_and_out_dir() {
    let args = RunArgs::parse_from(["verify-bypass"]);
    assert_eq!(args.base_url, "http://localhost:3000");
    assert_eq!(args.out_dir, PathBuf::from("verification"));
    assert_eq!(args.blocked_policy(), BlockedPolicy::Tolerate);
}

#[test]
fn test_run_args_fail_on_blocked() {
    let args = RunArgs::parse_from(["verify-shopping-list", "--fail-on-blocked"]);
    assert_eq!(args.blocked_policy(), BlockedPolicy::Fail);
}

#[test]
fn test_run_args_headed_disables_headless() {
    let args = RunArgs::parse_from(["verify-analytics", "--headed"]);
    let config = args.session_config(DeviceProfile::default());
    assert!(!config.headless);
}

// ============================================================================
// Recorder Tests
// ============================================================================

#[test]
fn test_recorder_names_artifacts_by_scenario() {
    let r = Recorder::new("toolbar", "verification");
    assert_eq!(r.scenario(), "toolbar");
    assert!(r.artifacts().is_empty());
}
