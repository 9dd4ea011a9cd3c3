// Auxiliary stream payloads shared by the daemon and its clients.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One analysis problem attached to a line of a content document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// 1-based source line.
    pub line_number: u32,
    pub severity: Severity,
    pub message: String,
}

/// Coarse lifecycle of a run, as reported by the external runner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Launching,
    Running,
    Terminated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    Error,
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestResult {
    pub outcome: TestOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_uses_annotation_field_names() {
        let diagnostic =
            Diagnostic { line_number: 3, severity: Severity::Error, message: "boom".into() };
        assert_eq!(
            serde_json::to_value(&diagnostic).unwrap(),
            serde_json::json!({ "lineNumber": 3, "severity": "error", "message": "boom" })
        );
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let parsed = serde_json::from_str::<Severity>(r#""fatal""#);
        assert!(parsed.is_err());
    }

    #[test]
    fn run_state_is_snake_case() {
        assert_eq!(serde_json::to_string(&RunState::Launching).unwrap(), r#""launching""#);
        assert_eq!(
            serde_json::from_str::<RunState>(r#""terminated""#).unwrap(),
            RunState::Terminated
        );
    }
}
