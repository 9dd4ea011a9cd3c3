use std::sync::Arc;

use padsync_common::attributes::{Attribute, AttributeSpan};
use padsync_common::identity::{DocumentIdentity, StreamMode};
use padsync_common::protocol::jsonrpc::{
    is_supported_protocol_version, Request, RequestId, Response, RpcError, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use padsync_common::protocol::rpc_methods as methods;
use padsync_common::protocol::session::ExtendedCall;
use padsync_common::types::{Diagnostic, RunState, TestResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::bridge::{Bridge, BridgeError};
use crate::rpc::trace::current_trace_id;

const DEFAULT_POLL_LIMIT: usize = 256;

#[derive(Clone)]
pub struct RpcServerState {
    bridge: Arc<Bridge>,
    shutdown_notifier: Option<broadcast::Sender<()>>,
}

impl RpcServerState {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge, shutdown_notifier: None }
    }

    pub fn with_shutdown_notifier(mut self, notifier: broadcast::Sender<()>) -> Self {
        self.shutdown_notifier = Some(notifier);
        self
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }
}

// ── Params ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PadAccessParams {
    user: String,
    path: String,
    #[serde(default = "content_mode")]
    mode: StreamMode,
}

fn content_mode() -> StreamMode {
    StreamMode::Content
}

#[derive(Debug, Deserialize)]
struct PadParams {
    pad_id: String,
}

#[derive(Debug, Deserialize)]
struct ChangesetSubmitParams {
    pad_id: String,
    changeset: String,
}

#[derive(Debug, Deserialize)]
struct AttributesReassertParams {
    pad_id: String,
    spans: Vec<AttributeSpan>,
}

#[derive(Debug, Deserialize)]
struct DiagnosticsPushParams {
    pad_id: String,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Deserialize)]
struct RunStateParams {
    pad_id: String,
    state: RunState,
}

#[derive(Debug, Deserialize)]
struct RunOutputParams {
    pad_id: String,
    text: String,
    #[serde(default)]
    attributes: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
struct TestsResultParams {
    project: String,
    test: String,
    result: TestResult,
}

#[derive(Debug, Deserialize)]
struct SessionPollParams {
    #[serde(default)]
    after: u64,
    #[serde(default = "default_poll_limit")]
    limit: usize,
}

fn default_poll_limit() -> usize {
    DEFAULT_POLL_LIMIT
}

// ── Dispatch ────────────────────────────────────────────────────────

pub async fn handle_raw_request(raw: &[u8], state: &RpcServerState) -> Response {
    let request = match serde_json::from_slice::<Request>(raw) {
        Ok(request) => request,
        Err(error) => {
            return Response::error(
                RequestId::Null,
                RpcError::new(PARSE_ERROR, "Parse error")
                    .with_data(json!({ "reason": error.to_string() })),
            );
        }
    };

    if request.jsonrpc != "2.0" {
        return Response::error(request.id, RpcError::new(INVALID_REQUEST, "Invalid Request"));
    }
    if let Some(version) = request.protocol_version.as_deref() {
        if !is_supported_protocol_version(version) {
            return Response::error(
                request.id,
                RpcError::new(INVALID_REQUEST, "Unsupported protocol version")
                    .with_data(json!({ "protocol_version": version })),
            );
        }
    }

    dispatch_request(request, state).await
}

pub async fn dispatch_request(request: Request, state: &RpcServerState) -> Response {
    match request.method.as_str() {
        methods::RPC_PING => Response::success(request.id, json!({ "ok": true })),
        methods::DAEMON_SHUTDOWN => {
            if let Some(notifier) = &state.shutdown_notifier {
                let _ = notifier.send(());
            }
            Response::success(request.id, json!({ "ok": true }))
        }
        methods::PAD_ACCESS => handle_pad_access(request, state).await,
        methods::PAD_READ => handle_pad_read(request, state).await,
        methods::CHANGESET_SUBMIT => handle_changeset_submit(request, state).await,
        methods::ATTRIBUTES_REASSERT => handle_attributes_reassert(request, state).await,
        methods::DIAGNOSTICS_PUSH => handle_diagnostics_push(request, state).await,
        methods::RUN_STATE => handle_run_state(request, state).await,
        methods::RUN_OUTPUT => handle_run_output(request, state).await,
        methods::TESTS_RESULT => handle_tests_result(request, state).await,
        methods::EXTENDED_REQUEST => handle_extended_request(request, state).await,
        methods::SESSION_POLL => handle_session_poll(request, state),
        _ => Response::error(request.id, RpcError::new(METHOD_NOT_FOUND, "Method not found")),
    }
}

async fn handle_pad_access(request: Request, state: &RpcServerState) -> Response {
    let params: PadAccessParams = match parse_params(methods::PAD_ACCESS, request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let result = match params.mode {
        StreamMode::Content => state.bridge.access_document_pad(&params.user, &params.path).await,
        StreamMode::Run => state.bridge.access_run_pad(&params.user, &params.path).await,
    };
    reply(request.id, result.map(|pad_id| json!({ "pad_id": pad_id })))
}

async fn handle_pad_read(request: Request, state: &RpcServerState) -> Response {
    let params: PadParams = match parse_params(methods::PAD_READ, request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let pad_id = match parse_pad_id(&params.pad_id, &request.id) {
        Ok(pad_id) => pad_id,
        Err(response) => return response,
    };

    reply(request.id, state.bridge.read_pad(&pad_id).await.map(|view| json!(view)))
}

async fn handle_changeset_submit(request: Request, state: &RpcServerState) -> Response {
    let params: ChangesetSubmitParams =
        match parse_params(methods::CHANGESET_SUBMIT, request.params, &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        };
    let pad_id = match parse_pad_id(&params.pad_id, &request.id) {
        Ok(pad_id) => pad_id,
        Err(response) => return response,
    };

    let result = state.bridge.submit_changeset(&pad_id, &params.changeset).await;
    reply(request.id, result.map(|report| json!(report)))
}

async fn handle_attributes_reassert(request: Request, state: &RpcServerState) -> Response {
    let params: AttributesReassertParams =
        match parse_params(methods::ATTRIBUTES_REASSERT, request.params, &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        };
    let pad_id = match parse_pad_id(&params.pad_id, &request.id) {
        Ok(pad_id) => pad_id,
        Err(response) => return response,
    };

    let result = state.bridge.reassert_attributes(&pad_id, &params.spans).await;
    reply(request.id, result.map(|changeset| json!({ "changeset": changeset })))
}

async fn handle_diagnostics_push(request: Request, state: &RpcServerState) -> Response {
    let params: DiagnosticsPushParams =
        match parse_params(methods::DIAGNOSTICS_PUSH, request.params, &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        };
    let pad_id = match parse_pad_id(&params.pad_id, &request.id) {
        Ok(pad_id) => pad_id,
        Err(response) => return response,
    };

    let result = state.bridge.push_diagnostics(&pad_id, params.diagnostics).await;
    reply(request.id, result.map(|()| json!({ "ok": true })))
}

async fn handle_run_state(request: Request, state: &RpcServerState) -> Response {
    let params: RunStateParams = match parse_params(methods::RUN_STATE, request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let pad_id = match parse_pad_id(&params.pad_id, &request.id) {
        Ok(pad_id) => pad_id,
        Err(response) => return response,
    };

    let result = state.bridge.run_state_change(&pad_id, params.state).await;
    reply(request.id, result.map(|()| json!({ "ok": true })))
}

async fn handle_run_output(request: Request, state: &RpcServerState) -> Response {
    let params: RunOutputParams = match parse_params(methods::RUN_OUTPUT, request.params, &request.id) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let pad_id = match parse_pad_id(&params.pad_id, &request.id) {
        Ok(pad_id) => pad_id,
        Err(response) => return response,
    };

    let result = state.bridge.run_output(&pad_id, &params.text, &params.attributes).await;
    reply(request.id, result.map(|()| json!({ "ok": true })))
}

async fn handle_tests_result(request: Request, state: &RpcServerState) -> Response {
    let params: TestsResultParams =
        match parse_params(methods::TESTS_RESULT, request.params, &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        };

    state.bridge.report_test_result(&params.project, &params.test, params.result).await;
    Response::success(request.id, json!({ "ok": true }))
}

async fn handle_extended_request(request: Request, state: &RpcServerState) -> Response {
    let call: ExtendedCall = match parse_params(methods::EXTENDED_REQUEST, request.params, &request.id) {
        Ok(call) => call,
        Err(response) => return response,
    };

    reply(request.id, state.bridge.handle_extended(&call).await.map(|()| json!({ "ok": true })))
}

fn handle_session_poll(request: Request, state: &RpcServerState) -> Response {
    let params = match request.params {
        None => SessionPollParams { after: 0, limit: DEFAULT_POLL_LIMIT },
        Some(params) => match parse_params(methods::SESSION_POLL, Some(params), &request.id) {
            Ok(params) => params,
            Err(response) => return response,
        },
    };

    let page = state.bridge.outbox().poll(params.after, params.limit);
    Response::success(request.id, json!(page))
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_params<P: DeserializeOwned>(
    method: &str,
    params: Option<Value>,
    request_id: &RequestId,
) -> Result<P, Response> {
    let Some(params) = params else {
        return Err(invalid_params_response(request_id.clone(), format!("{method} requires params")));
    };

    serde_json::from_value::<P>(params).map_err(|error| {
        invalid_params_response(request_id.clone(), format!("failed to decode {method} params: {error}"))
    })
}

fn parse_pad_id(pad_id: &str, request_id: &RequestId) -> Result<DocumentIdentity, Response> {
    pad_id
        .parse::<DocumentIdentity>()
        .map_err(|error| bridge_error_response(request_id.clone(), &BridgeError::Identity(error)))
}

fn reply(request_id: RequestId, result: Result<Value, BridgeError>) -> Response {
    match result {
        Ok(value) => Response::success(request_id, value),
        Err(error) => bridge_error_response(request_id, &error),
    }
}

fn bridge_error_response(request_id: RequestId, error: &BridgeError) -> Response {
    Response::error(
        request_id,
        RpcError::new(error.code(), error.to_string())
            .with_data(json!({ "kind": error.kind(), "trace_id": current_trace_id() })),
    )
}

fn invalid_params_response(request_id: RequestId, reason: String) -> Response {
    Response::error(
        request_id,
        RpcError::new(INVALID_PARAMS, "Invalid params").with_data(json!({ "reason": reason })),
    )
}
