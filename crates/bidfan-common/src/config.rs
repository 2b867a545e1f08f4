use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Hook execution plan document, as found in host configuration and inside
/// account records:
///
/// ```json
/// {"endpoints":{"/openrtb2/auction":{"stages":{"entrypoint":{"groups":[
///   {"timeout":5,"hook-sequence":[{"module-code":"acme.foobar","hook-impl-code":"foo"}]}
/// ]}}}}}
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ExecutionPlanConfig {
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointPlanConfig>,
}

impl ExecutionPlanConfig {
    /// Group configs for one stage on one endpoint; empty when not configured.
    pub fn groups(&self, endpoint: &str, stage: &str) -> &[GroupConfig] {
        self.endpoints
            .get(endpoint)
            .and_then(|e| e.stages.get(stage))
            .map(|s| s.groups.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EndpointPlanConfig {
    #[serde(default)]
    pub stages: HashMap<String, StagePlanConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StagePlanConfig {
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct GroupConfig {
    /// Group wall-clock budget in milliseconds.
    pub timeout: u64,
    #[serde(default, rename = "hook-sequence")]
    pub hook_sequence: Vec<HookRefConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HookRefConfig {
    #[serde(rename = "module-code")]
    pub module_code: String,
    #[serde(rename = "hook-impl-code")]
    pub hook_impl_code: String,
}

/// Raw per-module configuration blocks keyed `vendor -> module -> config`.
pub type ModulesConfig = HashMap<String, HashMap<String, Value>>;
