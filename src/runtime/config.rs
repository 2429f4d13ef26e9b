//! Runtime configuration.
//!
//! A plain, non-parsing struct in the same spirit as `CloudLLMConfig`: no TOML
//! or YAML dependency is pulled in here. Applications construct a `RuntimeConfig`
//! however they like (hardcoded, `std::env`, or their own config crate) and hand
//! it to the runtime.

use std::collections::HashMap;

/// The default tool-loop iteration budget (`toolloop.maxIterations`).
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Named retry policy presets for [`crate::runtime::action::ActionRetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicyName {
    /// A single attempt, no retries.
    FireOnce,
    /// Up to 5 attempts with exponential backoff.
    Default,
}

/// Backoff parameters for a named retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub backoff_millis: u64,
    pub backoff_multiplier: f64,
    pub backoff_max_interval_millis: u64,
    pub idempotent: bool,
}

impl RetryPolicyConfig {
    fn fire_once() -> Self {
        Self {
            max_attempts: 1,
            backoff_millis: 0,
            backoff_multiplier: 1.0,
            backoff_max_interval_millis: 0,
            idempotent: false,
        }
    }

    fn default_policy() -> Self {
        Self {
            max_attempts: 5,
            backoff_millis: 10_000,
            backoff_multiplier: 5.0,
            backoff_max_interval_millis: 60_000,
            idempotent: false,
        }
    }
}

/// Top-level runtime configuration, covering every key enumerated in the
/// external-interfaces design: LLM model selection, tool-loop budget, and the
/// default retry policy.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// `llm.defaultModel`
    pub default_model: String,
    /// `llm.roles.<role>`
    pub model_roles: HashMap<String, String>,
    /// `toolloop.maxIterations`
    pub max_tool_iterations: usize,
    /// `toolloop.useEmbabelDriver` — retained as a compatibility flag so callers
    /// migrating an existing planner integration can opt out of this driver's
    /// tool loop without changing their call sites; the runtime driver is the
    /// only one implemented.
    pub use_embabel_driver: bool,
    /// `action.retry.default.*`
    pub default_retry: RetryPolicyConfig,
    /// Bounded retry count for the typed object creator's malformed-JSON retry.
    pub typed_object_retry_attempts: u32,
}

impl RuntimeConfig {
    /// Resolve a named retry policy to its concrete backoff parameters.
    pub fn retry_policy(&self, name: RetryPolicyName) -> RetryPolicyConfig {
        match name {
            RetryPolicyName::FireOnce => RetryPolicyConfig::fire_once(),
            RetryPolicyName::Default => self.default_retry,
        }
    }

    /// Resolve a role name (e.g. `"planner"`, `"summarizer"`) to a configured model.
    pub fn model_for_role(&self, role: &str) -> Option<&str> {
        self.model_roles.get(role).map(|s| s.as_str())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4.1-mini".to_string(),
            model_roles: HashMap::new(),
            max_tool_iterations: DEFAULT_MAX_ITERATIONS,
            use_embabel_driver: true,
            default_retry: RetryPolicyConfig::default_policy(),
            typed_object_retry_attempts: 2,
        }
    }
}
