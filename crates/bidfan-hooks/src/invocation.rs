use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// Immutable snapshot of one module's scratch data. Writers build a fresh
/// context and replace the stored one; readers in later stages share the
/// snapshot by reference.
#[derive(Debug, Clone, Default)]
pub struct ModuleContext {
    entries: Arc<HashMap<String, Value>>,
}

impl ModuleContext {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<String, Value>> for ModuleContext {
    fn from(entries: HashMap<String, Value>) -> Self {
        ModuleContext { entries: Arc::new(entries) }
    }
}

impl<const N: usize> From<[(String, Value); N]> for ModuleContext {
    fn from(entries: [(String, Value); N]) -> Self {
        ModuleContext { entries: Arc::new(HashMap::from(entries)) }
    }
}

/// Request-scoped store of module contexts, shared across stages. Bidder
/// stages write from multiple tasks, so the map is concurrent.
#[derive(Debug, Default)]
pub struct ModuleContexts {
    ctxs: DashMap<String, ModuleContext>,
}

impl ModuleContexts {
    pub fn put(&self, module: &str, ctx: ModuleContext) {
        self.ctxs.insert(module.to_string(), ctx);
    }

    pub fn get(&self, module: &str) -> Option<ModuleContext> {
        self.ctxs.get(module).map(|c| c.value().clone())
    }
}

/// Per-invocation view handed to a hook: who is asking, on which endpoint,
/// and the module's context from earlier stages (if any).
#[derive(Debug, Clone, Default)]
pub struct ModuleInvocationContext {
    pub endpoint: String,
    pub account_id: String,
    pub module_context: Option<ModuleContext>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_replaces_snapshot() {
        let store = ModuleContexts::default();
        assert!(store.get("acme.foobar").is_none());

        store.put(
            "acme.foobar",
            ModuleContext::from([("k".to_string(), Value::from(1))]),
        );
        let first = store.get("acme.foobar").unwrap();
        assert_eq!(first.get("k"), Some(&Value::from(1)));

        store.put(
            "acme.foobar",
            ModuleContext::from([("k".to_string(), Value::from(2))]),
        );
        // The old snapshot is unaffected by the replacement.
        assert_eq!(first.get("k"), Some(&Value::from(1)));
        assert_eq!(store.get("acme.foobar").unwrap().get("k"), Some(&Value::from(2)));
    }
}
