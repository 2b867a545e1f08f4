use std::collections::BTreeMap;

use bidfan_common::account::Account;
use bidfan_common::openrtb::BidRequest;
use serde::Serialize;
use serde_json::Value;

use crate::outcome::StageOutcome;

/// How much of the hook execution record the response may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum TraceLevel {
    #[default]
    None,
    /// Excludes per-hook debug messages and analytics tags.
    Basic,
    Verbose,
}

impl TraceLevel {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("basic") => TraceLevel::Basic,
            Some("verbose") => TraceLevel::Verbose,
            _ => TraceLevel::None,
        }
    }

    fn is_basic_or_higher(self) -> bool {
        matches!(self, TraceLevel::Basic | TraceLevel::Verbose)
    }

    fn is_verbose(self) -> bool {
        self == TraceLevel::Verbose
    }
}

/// `module -> hook code -> messages`.
type Messages = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Default, Serialize)]
struct ModulesOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Messages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Messages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<TraceOutcome>,
}

#[derive(Debug, Default, Serialize)]
struct TraceOutcome {
    execution_time_millis: u64,
    stages: Vec<TraceStage>,
}

#[derive(Debug, Serialize)]
struct TraceStage {
    stage: String,
    execution_time_millis: u64,
    outcomes: Vec<StageOutcome>,
}

/// Folds the request's stage outcomes into `response.ext` under
/// `prebid.modules`. Errors and warnings require debug mode (request asked,
/// account allowed); the trace block follows `ext.prebid.trace`. When
/// nothing qualifies the ext comes back untouched.
pub fn enrich_response_ext(
    ext: Value,
    stage_outcomes: &[StageOutcome],
    bid_request: &BidRequest,
    account: Option<&Account>,
) -> Value {
    if stage_outcomes.is_empty() {
        return ext;
    }

    let trace = TraceLevel::parse(
        bid_request.prebid_ext("trace").and_then(|v| v.as_str()),
    );
    let debug_requested = bid_request.test == 1
        || bid_request
            .prebid_ext("debug")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
    let debug_enabled = debug_requested && account.is_some_and(|a| a.debug_allow);

    let outcome = build_modules_outcome(stage_outcomes, trace, debug_enabled);
    let outcome = match outcome {
        Some(outcome) => outcome,
        None => return ext,
    };

    let fragment = serde_json::json!({ "prebid": { "modules": outcome } });
    let mut merged = ext;
    merge_json(&mut merged, fragment);
    merged
}

fn build_modules_outcome(
    stage_outcomes: &[StageOutcome],
    trace: TraceLevel,
    debug_enabled: bool,
) -> Option<ModulesOutcome> {
    let mut errors = Messages::new();
    let mut warnings = Messages::new();
    let mut stage_names: Vec<String> = Vec::new();
    let mut stages: BTreeMap<String, TraceStage> = BTreeMap::new();

    for stage_outcome in stage_outcomes {
        if stage_outcome.groups.is_empty() {
            continue;
        }

        if debug_enabled {
            for group in &stage_outcome.groups {
                for hook in &group.invocation_results {
                    fill_messages(&mut errors, &hook.errors, hook);
                    fill_messages(&mut warnings, &hook.warnings, hook);
                }
            }
        }

        if !trace.is_basic_or_higher() {
            continue;
        }

        let mut outcome = stage_outcome.clone();
        if !trace.is_verbose() {
            for group in &mut outcome.groups {
                for hook in &mut group.invocation_results {
                    hook.debug_messages.clear();
                    hook.analytics_tags.activities.clear();
                }
            }
        }

        let entry = stages.entry(outcome.stage.clone()).or_insert_with(|| {
            stage_names.push(outcome.stage.clone());
            TraceStage {
                stage: outcome.stage.clone(),
                execution_time_millis: 0,
                outcomes: Vec::new(),
            }
        });
        if outcome.execution_time_millis > entry.execution_time_millis {
            entry.execution_time_millis = outcome.execution_time_millis;
        }
        entry.outcomes.push(outcome);
    }

    if errors.is_empty() && warnings.is_empty() && stages.is_empty() {
        return None;
    }

    let trace_outcome = if stages.is_empty() {
        None
    } else {
        let mut trace_outcome = TraceOutcome::default();
        // First-observation order, not map order.
        for name in stage_names {
            if let Some(stage) = stages.remove(&name) {
                trace_outcome.execution_time_millis += stage.execution_time_millis;
                trace_outcome.stages.push(stage);
            }
        }
        Some(trace_outcome)
    };

    Some(ModulesOutcome {
        errors: (!errors.is_empty()).then_some(errors),
        warnings: (!warnings.is_empty()).then_some(warnings),
        trace: trace_outcome,
    })
}

fn fill_messages(messages: &mut Messages, values: &[String], hook: &crate::outcome::HookOutcome) {
    if values.is_empty() {
        return;
    }
    messages
        .entry(hook.hook_id.module_code.clone())
        .or_default()
        .entry(hook.hook_id.hook_impl_code.clone())
        .or_default()
        .extend(values.iter().cloned());
}

/// Deep-merges `patch` into `base`; on scalar conflicts the patch wins.
fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, patch) => *slot = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{GroupOutcome, HookId, HookOutcome, HookStatus};

    fn make_account(debug_allow: bool) -> Account {
        Account { id: "acct-1".to_string(), debug_allow, ..Default::default() }
    }

    fn make_request(test: u8, trace: Option<&str>) -> BidRequest {
        let mut prebid = serde_json::Map::new();
        if let Some(trace) = trace {
            prebid.insert("trace".to_string(), Value::from(trace));
        }
        BidRequest {
            test,
            ext: serde_json::json!({ "prebid": Value::Object(prebid) }),
            ..Default::default()
        }
    }

    fn make_outcome(stage: &str, errors: Vec<&str>, debug: Vec<&str>) -> StageOutcome {
        let mut hook = HookOutcome::new(HookId::new("acme.foobar", "foo"), HookStatus::Success);
        hook.errors = errors.into_iter().map(String::from).collect();
        hook.debug_messages = debug.into_iter().map(String::from).collect();
        StageOutcome {
            stage: stage.to_string(),
            entity: "http-request".to_string(),
            execution_time_millis: 7,
            groups: vec![GroupOutcome {
                execution_time_millis: 7,
                invocation_results: vec![hook],
            }],
        }
    }

    #[test]
    fn test_nothing_emitted_without_debug_or_trace() {
        let outcomes = vec![make_outcome("entrypoint", vec!["boom"], vec![])];
        let ext = enrich_response_ext(
            Value::Null,
            &outcomes,
            &make_request(0, None),
            Some(&make_account(true)),
        );
        assert_eq!(ext, Value::Null);
    }

    #[test]
    fn test_account_gates_debug_output() {
        let outcomes = vec![make_outcome("entrypoint", vec!["boom"], vec![])];
        let ext = enrich_response_ext(
            Value::Null,
            &outcomes,
            &make_request(1, None),
            Some(&make_account(false)),
        );
        assert_eq!(ext, Value::Null);
    }

    #[test]
    fn test_errors_grouped_by_module_and_hook() {
        let outcomes = vec![
            make_outcome("entrypoint", vec!["first"], vec![]),
            make_outcome("rawauction", vec!["second"], vec![]),
        ];
        let ext = enrich_response_ext(
            Value::Null,
            &outcomes,
            &make_request(1, None),
            Some(&make_account(true)),
        );
        assert_eq!(
            ext["prebid"]["modules"]["errors"]["acme.foobar"]["foo"],
            serde_json::json!(["first", "second"])
        );
        assert!(ext["prebid"]["modules"].get("trace").is_none());
    }

    #[test]
    fn test_basic_trace_excludes_debug_messages() {
        let outcomes = vec![make_outcome("entrypoint", vec![], vec!["applied"])];
        let ext = enrich_response_ext(
            Value::Null,
            &outcomes,
            &make_request(1, Some("basic")),
            Some(&make_account(true)),
        );

        let trace = &ext["prebid"]["modules"]["trace"];
        assert_eq!(trace["stages"][0]["stage"], "entrypoint");
        assert_eq!(trace["execution_time_millis"], 7);
        let hook = &trace["stages"][0]["outcomes"][0]["groups"][0]["invocation_results"][0];
        assert!(hook.get("debug_messages").is_none());
    }

    #[test]
    fn test_verbose_trace_includes_debug_messages() {
        let outcomes = vec![make_outcome("entrypoint", vec![], vec!["applied"])];
        let ext = enrich_response_ext(
            Value::Null,
            &outcomes,
            &make_request(1, Some("verbose")),
            Some(&make_account(true)),
        );

        let hook = &ext["prebid"]["modules"]["trace"]["stages"][0]["outcomes"][0]["groups"][0]
            ["invocation_results"][0];
        assert_eq!(hook["debug_messages"], serde_json::json!(["applied"]));
    }

    #[test]
    fn test_trace_emitted_without_debug_when_requested() {
        // Trace gating is independent from the error/warning debug gate.
        let outcomes = vec![make_outcome("entrypoint", vec!["boom"], vec![])];
        let ext = enrich_response_ext(
            Value::Null,
            &outcomes,
            &make_request(0, Some("basic")),
            Some(&make_account(true)),
        );
        assert!(ext["prebid"]["modules"].get("errors").is_none());
        assert_eq!(ext["prebid"]["modules"]["trace"]["stages"][0]["stage"], "entrypoint");
    }

    #[test]
    fn test_stage_order_follows_first_observation() {
        let outcomes = vec![
            make_outcome("rawauction", vec![], vec![]),
            make_outcome("entrypoint", vec![], vec![]),
            make_outcome("rawauction", vec![], vec![]),
        ];
        let ext = enrich_response_ext(
            Value::Null,
            &outcomes,
            &make_request(0, Some("basic")),
            Some(&make_account(true)),
        );

        let stages = ext["prebid"]["modules"]["trace"]["stages"].as_array().unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0]["stage"], "rawauction");
        assert_eq!(stages[0]["outcomes"].as_array().unwrap().len(), 2);
        assert_eq!(stages[1]["stage"], "entrypoint");
    }

    #[test]
    fn test_existing_ext_keys_survive_merge() {
        let outcomes = vec![make_outcome("entrypoint", vec!["boom"], vec![])];
        let existing = serde_json::json!({"prebid": {"auctiontimestamp": 123}, "other": true});
        let ext = enrich_response_ext(
            existing,
            &outcomes,
            &make_request(1, None),
            Some(&make_account(true)),
        );
        assert_eq!(ext["prebid"]["auctiontimestamp"], 123);
        assert_eq!(ext["other"], true);
        assert!(ext["prebid"]["modules"]["errors"].is_object());
    }
}
