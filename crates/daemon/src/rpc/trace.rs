// Per-request trace ids, echoed in error payloads and log spans.

use std::future::Future;

use serde_json::Value;
use uuid::Uuid;

tokio::task_local! {
    static TRACE_ID: String;
}

pub async fn with_trace_id_scope<F>(trace_id: String, future: F) -> F::Output
where
    F: Future,
{
    TRACE_ID.scope(trace_id, future).await
}

/// Trace id of the request being handled on this task, if any.
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(Clone::clone).ok()
}

/// Takes `trace_id` from the request or its params; otherwise a fresh UUID.
pub fn trace_id_from_raw_request(raw: &[u8]) -> String {
    serde_json::from_slice::<Value>(raw)
        .ok()
        .and_then(|request| {
            [Some(&request), request.get("params")]
                .into_iter()
                .flatten()
                .find_map(|value| value.get("trace_id")?.as_str())
                .filter(|trace_id| !trace_id.trim().is_empty())
                .map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prefers_top_level_then_params() {
        let top = json!({ "trace_id": "top", "params": { "trace_id": "inner" } });
        assert_eq!(trace_id_from_raw_request(top.to_string().as_bytes()), "top");

        let params = json!({ "method": "pad.read", "params": { "trace_id": "inner" } });
        assert_eq!(trace_id_from_raw_request(params.to_string().as_bytes()), "inner");
    }

    #[test]
    fn blank_or_missing_ids_get_a_uuid() {
        for raw in [json!({ "trace_id": "  " }).to_string(), "not json".to_string()] {
            let generated = trace_id_from_raw_request(raw.as_bytes());
            assert!(Uuid::parse_str(&generated).is_ok(), "{raw}");
        }
    }

    #[tokio::test]
    async fn scope_exposes_current_trace_id() {
        assert_eq!(current_trace_id(), None);
        let inside = with_trace_id_scope("t-1".to_string(), async { current_trace_id() }).await;
        assert_eq!(inside.as_deref(), Some("t-1"));
    }
}
