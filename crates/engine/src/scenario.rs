//! Scenario runner – execute scripted action sequences from YAML files.
//!
//! ```yaml
//! name: open settings
//! steps:
//!   - act: { action: home }
//!   - perceive: true
//!   - act: { action: tap, coordinates: [540, 1200] }
//!   - act: { action: done }
//! ```

use crate::commands::CommandRegistry;
use crate::context::AppContext;
use crate::types::*;

/// Load a scenario from a YAML string.
pub fn load_scenario(yaml: &str) -> Result<Scenario, String> {
    serde_yaml::from_str(yaml).map_err(|e| format!("failed to parse scenario YAML: {}", e))
}

/// Execute a scenario and return the overall result.
///
/// Stops after a successful `done` action or the first step whose status
/// does not match its expectation.
pub fn run_scenario(
    scenario: &Scenario,
    ctx: &AppContext,
    registry: &CommandRegistry,
) -> ScenarioResult {
    let mut step_results = Vec::new();
    let mut overall = Status::Pass;

    for (i, step) in scenario.steps.iter().enumerate() {
        let (result, expected, finished) = match step {
            ScenarioStep::Act { act, expect_status } => {
                let r = registry.execute("act", act.clone(), ctx);
                let done = r.status == Status::Pass
                    && r.data.as_ref().and_then(|d| d.get("action")).and_then(|a| a.as_str())
                        == Some("done");
                (r, expect_status.as_str(), done)
            }
            ScenarioStep::Perceive { perceive: false } => continue,
            ScenarioStep::Perceive { perceive: true } => {
                (registry.execute("perceive", serde_json::json!({}), ctx), "pass", false)
            }
        };

        let mismatch = result.status.as_str() != expected;
        if mismatch {
            tracing::warn!(
                step = i,
                expected = %expected,
                actual = %result.status.as_str(),
                "scenario step status mismatch"
            );
            overall = Status::Fail;
        }
        step_results.push(result);

        if mismatch || finished {
            break;
        }
    }

    let executed = step_results.len();
    let skipped_steps = scenario
        .steps
        .iter()
        .filter(|s| !matches!(s, ScenarioStep::Perceive { perceive: false }))
        .count()
        .saturating_sub(executed);

    ScenarioResult {
        name: scenario.name.clone(),
        overall_status: overall,
        step_results,
        skipped_steps,
    }
}
