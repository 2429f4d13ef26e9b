//! Human-in-the-loop suspension and the replan control-flow signal.
//!
//! Both are control flow, not errors: they unwind the tool loop successfully
//! rather than as a failure, are logged at debug level, never count against
//! an action's retry budget, and must be re-thrown past any generic error
//! handler. The driver enforces the last point structurally — see
//! [`crate::runtime::tool::ToolDispatchSignal`] and [`ToolLoopSignal`]
//! below, neither of which is reachable from
//! [`crate::runtime::error::RuntimeError`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runtime::blackboard::Blackboard;

/// Lifecycle of an [`Awaitable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwaitableStatus {
    Pending,
    Resolved,
    Cancelled,
}

/// A persisted request for user input that suspends the enclosing action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Awaitable {
    pub id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    /// Text shown to the user describing what response is expected.
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub status: AwaitableStatus,
    /// Populated once the user responds; `None` while `status == Pending`.
    pub resolution: Option<serde_json::Value>,
}

impl Awaitable {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, payload: serde_json::Value, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            payload,
            prompt: prompt.into(),
            created_at: Utc::now(),
            status: AwaitableStatus::Pending,
            resolution: None,
        }
    }

    /// Construct with a fresh random id, for call sites that don't need a
    /// caller-chosen id (most tools don't).
    pub fn new_with_generated_id(kind: impl Into<String>, payload: serde_json::Value, prompt: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), kind, payload, prompt)
    }

    pub fn resolve(&mut self, payload: serde_json::Value) {
        self.resolution = Some(payload);
        self.status = AwaitableStatus::Resolved;
    }

    pub fn cancel(&mut self) {
        self.status = AwaitableStatus::Cancelled;
    }

    pub fn is_pending(&self) -> bool {
        self.status == AwaitableStatus::Pending
    }
}

/// A function applied to the blackboard when a [`ReplanRequested`] signal is
/// handled. Boxed because closures captured by a tool at call time vary in
/// captured state; `Send` so the signal can cross an `async_trait` boundary.
pub type BlackboardUpdater = Box<dyn FnOnce(&mut Blackboard) + Send>;

/// A tool-originated request to cleanly abandon the current tool loop and
/// re-invoke the planner against an updated blackboard.
pub struct ReplanRequested {
    pub reason: String,
    pub blackboard_updater: BlackboardUpdater,
}

impl ReplanRequested {
    pub fn new(reason: impl Into<String>, blackboard_updater: BlackboardUpdater) -> Self {
        Self {
            reason: reason.into(),
            blackboard_updater,
        }
    }

    /// Apply the captured update to the blackboard, consuming the signal.
    pub fn apply(self, blackboard: &mut Blackboard) {
        (self.blackboard_updater)(blackboard);
    }
}

impl std::fmt::Debug for ReplanRequested {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplanRequested").field("reason", &self.reason).finish()
    }
}

/// The two ways a tool loop invocation can terminate other than a normal
/// typed result: an `Awaitable` was bound (the action is now `WAITING`), or a
/// replan was requested (the action is not failed; the caller should
/// re-invoke the planner).
#[derive(Debug)]
pub enum ToolLoopSignal {
    AwaitableRequested(Awaitable),
    ReplanRequested(ReplanRequested),
}
