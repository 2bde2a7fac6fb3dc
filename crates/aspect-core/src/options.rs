//! Engine options shared by every advised member.

use serde::{Deserialize, Serialize};

/// What happens when `before` advice fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeforeFailure {
    /// The failure is treated like a failure of the original behavior:
    /// after-throwing and after-finally advice observe it, then it is rethrown.
    #[default]
    Route,
    /// The failure is returned immediately; no after advice runs.
    Propagate,
}

/// Options that tune how the interception engine runs advice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Handling of a failing `before` callback.
    pub before_failure: BeforeFailure,

    /// Wrap every advised invocation in a `tracing` span named `advice`.
    pub trace_invocations: bool,
}

impl EngineOptions {
    /// Sets the `before` failure policy.
    pub fn before_failure(mut self, policy: BeforeFailure) -> Self {
        self.before_failure = policy;
        self
    }

    /// Enables or disables per-invocation tracing spans.
    pub fn trace_invocations(mut self, enabled: bool) -> Self {
        self.trace_invocations = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial() {
        let opts: EngineOptions =
            serde_json::from_str(r#"{ "before_failure": "propagate" }"#).unwrap();
        assert_eq!(opts.before_failure, BeforeFailure::Propagate);
        assert!(!opts.trace_invocations);
    }
}
