// Messages exchanged with the collaborative session and the external runner.

use serde::{Deserialize, Serialize};

use crate::attributes::PoolSnapshot;
use crate::identity::DocumentIdentity;
use crate::types::{Diagnostic, RunState, TestResult};

/// Author recorded on changesets that only re-assert analysis attributes.
pub const SYNTAX_COLOR_AUTHOR: &str = "#syntaxcolor";

/// Author recorded on changesets the bridge writes into run documents.
pub const RUN_OUTPUT_AUTHOR: &str = "#run";

/// Outbound events, in the order they were produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A changeset to be applied to the shared document. `pool` resolves
    /// every attribute id the changeset references.
    Changeset {
        pad_id: DocumentIdentity,
        revision: u64,
        changeset: String,
        author: String,
        pool: PoolSnapshot,
    },

    /// Full replacement of one annotation channel of a document.
    Annotations {
        pad_id: DocumentIdentity,
        kind: AnnotationKind,
        annotations: Vec<Diagnostic>,
    },

    /// An extended message for every client of a pad or a single connection.
    Extended { target: ExtendedTarget, message: ExtendedMessage },

    /// A test result for every client with a document of `project` open.
    ProjectTestResult { project: String, test: String, result: TestResult },

    /// Forwarded to the external runner; the bridge never runs anything.
    RunCommand { pad_id: DocumentIdentity, action: RunAction },
}

/// An outbox entry as handed to pollers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequencedEvent {
    pub seq: u64,
    pub event: SessionEvent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Problem,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ExtendedTarget {
    Pad { pad_id: DocumentIdentity },
    Connection { connection_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtendedMessage {
    /// `state` is absent when nothing was ever run for the pad.
    RunStateChange { state: Option<RunState> },
    TestResult { test: String, result: TestResult },
}

/// An extended request from one client connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtendedRequest {
    RunRequest { action: RunAction },
    TestsRequest { action: TestsAction },
}

impl ExtendedRequest {
    /// Routing key of the request.
    pub fn kind(&self) -> ExtendedKind {
        match self {
            Self::RunRequest { .. } => ExtendedKind::RunRequest,
            Self::TestsRequest { .. } => ExtendedKind::TestsRequest,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtendedKind {
    RunRequest,
    TestsRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtendedCall {
    pub pad_id: DocumentIdentity,
    pub connection_id: String,
    pub message: ExtendedRequest,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunAction {
    State,
    Launch,
    Terminate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TestsAction {
    State,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::TestOutcome;

    #[test]
    fn extended_requests_use_session_type_tags() {
        let request: ExtendedRequest =
            serde_json::from_value(json!({ "type": "RUN_REQUEST", "action": "launch" })).unwrap();
        assert_eq!(request, ExtendedRequest::RunRequest { action: RunAction::Launch });
        assert_eq!(request.kind(), ExtendedKind::RunRequest);

        let tests: ExtendedRequest =
            serde_json::from_value(json!({ "type": "TESTS_REQUEST", "action": "state" })).unwrap();
        assert_eq!(tests.kind(), ExtendedKind::TestsRequest);

        let unknown = serde_json::from_value::<ExtendedRequest>(json!({ "type": "RUN_REQUEST", "action": "debug" }));
        assert!(unknown.is_err());
    }

    #[test]
    fn run_state_change_message_shape() {
        let message = ExtendedMessage::RunStateChange { state: Some(RunState::Launching) };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "type": "RUN_STATE_CHANGE", "state": "launching" })
        );
    }

    #[test]
    fn session_events_are_tagged_by_type() {
        let pad_id = DocumentIdentity::content("bob", "/demo/A.java").unwrap();
        let event = SessionEvent::Extended {
            target: ExtendedTarget::Pad { pad_id },
            message: ExtendedMessage::TestResult {
                test: "demo.ATest#adds".into(),
                result: TestResult { outcome: TestOutcome::Passed, message: None },
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "extended");
        assert_eq!(value["target"], json!({ "scope": "pad", "pad_id": "bob@/demo/A.java" }));
        assert_eq!(value["message"]["type"], "TEST_RESULT");

        let back: SessionEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
