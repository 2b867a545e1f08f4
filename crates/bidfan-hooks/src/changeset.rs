use thiserror::Error;

use crate::analytics::Analytics;
use crate::invocation::ModuleContext;

/// What a single mutation does to the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Update,
    Delete,
}

impl std::fmt::Display for MutationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationType::Update => write!(f, "update"),
            MutationType::Delete => write!(f, "delete"),
        }
    }
}

/// A mutation failed; the message becomes a hook-level warning.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct MutationError(pub String);

impl From<&str> for MutationError {
    fn from(s: &str) -> Self {
        MutationError(s.to_string())
    }
}

impl From<String> for MutationError {
    fn from(s: String) -> Self {
        MutationError(s)
    }
}

/// One deferred payload transformation keyed by a dotted path.
pub struct Mutation<P> {
    apply: Box<dyn Fn(P) -> Result<P, MutationError> + Send + Sync>,
    kind: MutationType,
    path: Vec<String>,
}

impl<P> Mutation<P> {
    pub fn apply(&self, payload: P) -> Result<P, MutationError> {
        (self.apply)(payload)
    }

    pub fn kind(&self) -> MutationType {
        self.kind
    }

    /// Dotted key the mutation touches, e.g. `body.name`.
    pub fn key(&self) -> String {
        self.path.join(".")
    }
}

impl<P> std::fmt::Debug for Mutation<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .finish()
    }
}

/// Ordered list of mutations produced by one hook. The executor applies them
/// strictly in insertion order, never concurrently with other hooks' sets.
#[derive(Debug, Default)]
pub struct ChangeSet<P> {
    mutations: Vec<Mutation<P>>,
}

impl<P> ChangeSet<P> {
    pub fn new() -> Self {
        ChangeSet { mutations: Vec::new() }
    }

    pub fn add_mutation(
        &mut self,
        apply: impl Fn(P) -> Result<P, MutationError> + Send + Sync + 'static,
        kind: MutationType,
        path: &[&str],
    ) -> &mut Self {
        self.mutations.push(Mutation {
            apply: Box::new(apply),
            kind,
            path: path.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn mutations(&self) -> &[Mutation<P>] {
        &self.mutations
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// A hook invocation failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HookError {
    /// Domain failure the hook itself diagnosed (e.g. a required attribute
    /// was missing). Recorded as `execution_failure`.
    #[error("{0}")]
    Failure(String),
    /// Unexpected fault. Recorded as `execution_error`.
    #[error("{0}")]
    Execution(String),
}

/// Everything a hook hands back to the executor.
pub struct HookResult<P> {
    /// Stops the stage after this group when set.
    pub reject: bool,
    /// Free-form message; doubles as the rejection reason.
    pub message: String,
    pub change_set: ChangeSet<P>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub debug_messages: Vec<String>,
    pub analytics_tags: Analytics,
    /// Replaces the module's context snapshot when set.
    pub module_context: Option<ModuleContext>,
}

impl<P> Default for HookResult<P> {
    fn default() -> Self {
        HookResult {
            reject: false,
            message: String::new(),
            change_set: ChangeSet::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            debug_messages: Vec::new(),
            analytics_tags: Analytics::default(),
            module_context: None,
        }
    }
}

impl<P> HookResult<P> {
    pub fn rejected(message: impl Into<String>) -> Self {
        HookResult { reject: true, message: message.into(), ..Default::default() }
    }

    pub fn with_change_set(change_set: ChangeSet<P>) -> Self {
        HookResult { change_set, ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations_apply_in_insertion_order() {
        let mut cs: ChangeSet<Vec<u8>> = ChangeSet::new();
        cs.add_mutation(
            |mut payload| {
                payload.push(b'a');
                Ok(payload)
            },
            MutationType::Update,
            &["body", "a"],
        )
        .add_mutation(
            |mut payload| {
                payload.push(b'b');
                Ok(payload)
            },
            MutationType::Update,
            &["body", "b"],
        );

        let mut payload = Vec::new();
        for m in cs.mutations() {
            payload = m.apply(payload).unwrap();
        }
        assert_eq!(payload, b"ab");
        assert_eq!(cs.mutations()[0].key(), "body.a");
        assert_eq!(cs.mutations()[1].kind(), MutationType::Update);
    }

    #[test]
    fn test_mutation_error_message() {
        let mut cs: ChangeSet<Vec<u8>> = ChangeSet::new();
        cs.add_mutation(|_| Err("key not found".into()), MutationType::Delete, &["body", "x"]);

        let err = cs.mutations()[0].apply(Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "key not found");
    }
}
