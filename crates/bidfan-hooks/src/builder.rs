use std::collections::BTreeMap;

use bidfan_common::config::ModulesConfig;
use serde_json::Value;

use crate::repository::{ConfigError, HookRepository, HookSet};

/// One named hook a module wants registered.
pub struct HookRegistration {
    pub code: String,
    pub hooks: HookSet,
}

/// Builds a module's hooks from its raw JSON config block and the shared
/// HTTP client. Returning a registration with an empty hook set fails the
/// build.
pub type ModuleBuilderFn =
    Box<dyn Fn(Value, reqwest::Client) -> Result<Vec<HookRegistration>, String> + Send + Sync>;

/// Startup-time registry mapping `vendor -> module -> builder`. `build`
/// runs every builder with its config block (`<vendor>.<module>` key) and
/// assembles the hook repository.
#[derive(Default)]
pub struct ModuleBuilder {
    builders: BTreeMap<String, BTreeMap<String, ModuleBuilderFn>>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        ModuleBuilder::default()
    }

    pub fn register(&mut self, vendor: &str, module: &str, builder: ModuleBuilderFn) -> &mut Self {
        self.builders
            .entry(vendor.to_string())
            .or_default()
            .insert(module.to_string(), builder);
        self
    }

    pub fn build(
        &self,
        cfg: &ModulesConfig,
        client: reqwest::Client,
    ) -> Result<HookRepository, ConfigError> {
        let mut repo = HookRepository::default();

        for (vendor, modules) in &self.builders {
            for (module, builder) in modules {
                let id = format!("{vendor}.{module}");
                let conf = cfg
                    .get(vendor)
                    .and_then(|v| v.get(module))
                    .cloned()
                    .unwrap_or(Value::Null);

                let registrations = builder(conf, client.clone()).map_err(|reason| {
                    ConfigError::ModuleBuild { module: id.clone(), reason }
                })?;

                for registration in registrations {
                    repo.register(&id, &registration.code, registration.hooks)?;
                }
                tracing::debug!(module = %id, "module hooks registered");
            }
        }

        Ok(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::{HookError, HookResult};
    use crate::invocation::ModuleInvocationContext;
    use crate::stages::{EntrypointHook, EntrypointPayload};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct ConfiguredHook {
        allow_reject: bool,
    }

    #[async_trait]
    impl EntrypointHook for ConfiguredHook {
        async fn call(
            &self,
            _ctx: ModuleInvocationContext,
            _payload: EntrypointPayload,
        ) -> Result<HookResult<EntrypointPayload>, HookError> {
            if self.allow_reject {
                Ok(HookResult::rejected(""))
            } else {
                Ok(HookResult::default())
            }
        }
    }

    fn foobar_builder() -> ModuleBuilderFn {
        Box::new(|conf, _client| {
            let allow_reject = conf
                .get("allow_reject")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            Ok(vec![HookRegistration {
                code: "validate".to_string(),
                hooks: HookSet {
                    entrypoint: Some(Arc::new(ConfiguredHook { allow_reject })),
                    ..Default::default()
                },
            }])
        })
    }

    #[test]
    fn test_build_registers_configured_modules() {
        let mut builder = ModuleBuilder::new();
        builder.register("acme", "foobar", foobar_builder());

        let cfg: ModulesConfig = serde_json::from_str(
            r#"{"acme":{"foobar":{"allow_reject":true}}}"#,
        )
        .unwrap();

        let repo = builder.build(&cfg, reqwest::Client::new()).unwrap();
        assert_eq!(repo.len(), 1);
        assert!(repo.entrypoint_hook("acme.foobar", "validate").is_some());
    }

    #[test]
    fn test_builder_runs_without_config_block() {
        let mut builder = ModuleBuilder::new();
        builder.register("acme", "foobar", foobar_builder());

        let repo = builder.build(&ModulesConfig::default(), reqwest::Client::new()).unwrap();
        assert!(repo.entrypoint_hook("acme.foobar", "validate").is_some());
    }

    #[test]
    fn test_failing_builder_surfaces_config_error() {
        let mut builder = ModuleBuilder::new();
        builder.register(
            "acme",
            "broken",
            Box::new(|_conf, _client| Err("bad config".to_string())),
        );

        let err = builder.build(&ModulesConfig::default(), reqwest::Client::new()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ModuleBuild {
                module: "acme.broken".to_string(),
                reason: "bad config".to_string()
            }
        );
    }

    #[test]
    fn test_hookless_registration_rejected_at_build_time() {
        let mut builder = ModuleBuilder::new();
        builder.register(
            "acme",
            "hollow",
            Box::new(|_conf, _client| {
                Ok(vec![HookRegistration { code: "noop".to_string(), hooks: HookSet::default() }])
            }),
        );

        let err = builder.build(&ModulesConfig::default(), reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyHookSet { .. }));
    }
}
