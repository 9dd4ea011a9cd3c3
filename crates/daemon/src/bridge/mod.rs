// Channel/identity bridge: routes session changesets, analysis attributes and
// auxiliary streams to the right pad, one exclusive region per identity.

pub mod routes;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use padsync_common::attributes::{encode_spans, Attribute, AttributeError, AttributeSpan, PoolSnapshot};
use padsync_common::changeset::{
    Changeset, ChangesetBuilder, ChangesetError, CombineOptions, ReplayError, ReplayReport, SinkError,
};
use padsync_common::identity::{DocumentIdentity, IdentityError, StreamMode};
use padsync_common::protocol::jsonrpc;
use padsync_common::protocol::session::{
    AnnotationKind, ExtendedCall, ExtendedKind, ExtendedMessage, ExtendedTarget, SessionEvent,
    RUN_OUTPUT_AUTHOR, SYNTAX_COLOR_AUTHOR,
};
use padsync_common::types::{Diagnostic, RunState, TestResult};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::engine::pad::{Pad, PadError};
use crate::engine::registry::{ActivePad, PadGuard, PadRegistry, PadSlot};
use crate::host::{HostDocument, HostError, ResourceHost};
use crate::outbox::{SessionOutbox, DEFAULT_CAPACITY};

pub use routes::{ExtendedHandler, ExtendedRoutes};

pub const DEFAULT_BANNER_COLOR: &str = "150,150,150";
const BANNER_TIME_FORMAT: &str = "%a %b %d %Y %H:%M:%S UTC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    pub combine: CombineOptions,
    /// `foreground` value of the run banners.
    pub banner_color: String,
    pub outbox_capacity: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            combine: CombineOptions::default(),
            banner_color: DEFAULT_BANNER_COLOR.to_string(),
            outbox_capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Changeset(#[from] ChangesetError),

    #[error("pad has {actual} characters but the changeset expects {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Attribute(AttributeError),

    #[error("pad `{0}` has not been accessed")]
    PadNotActive(DocumentIdentity),

    #[error("no handler for extended message {0:?}")]
    NoRoute(ExtendedKind),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("pad rejected an edit: {0}")]
    Edit(SinkError),
}

impl BridgeError {
    /// Stable machine-readable name, carried as `data.kind` over RPC.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Changeset(ChangesetError::Malformed { .. }) => "MALFORMED_CHANGESET",
            Self::Changeset(ChangesetError::BankUnderflow { .. }) => "BANK_UNDERFLOW",
            Self::LengthMismatch { .. } | Self::Host(HostError::Edit(_)) => "DOCUMENT_LENGTH_MISMATCH",
            Self::Attribute(AttributeError::UnknownAttributeId(_)) => "UNKNOWN_ATTRIBUTE_ID",
            Self::Attribute(AttributeError::SpanCoverageMismatch { .. }) => "SPAN_COVERAGE_MISMATCH",
            Self::PadNotActive(_)
            | Self::NoRoute(_)
            | Self::Host(HostError::NotFound(_) | HostError::NotAFile(_)) => "NOT_FOUND",
            Self::Identity(_)
            | Self::Host(HostError::InvalidPath(_) | HostError::OutsideWorkspace(_)) => {
                "INVALID_IDENTITY"
            }
            Self::Host(_) => "HOST_FAILURE",
            Self::Attribute(_) | Self::Edit(_) => "INTERNAL",
        }
    }

    pub fn code(&self) -> i32 {
        match self.kind() {
            "MALFORMED_CHANGESET" => jsonrpc::MALFORMED_CHANGESET,
            "BANK_UNDERFLOW" => jsonrpc::BANK_UNDERFLOW,
            "DOCUMENT_LENGTH_MISMATCH" => jsonrpc::DOCUMENT_LENGTH_MISMATCH,
            "UNKNOWN_ATTRIBUTE_ID" => jsonrpc::UNKNOWN_ATTRIBUTE_ID,
            "SPAN_COVERAGE_MISMATCH" => jsonrpc::SPAN_COVERAGE_MISMATCH,
            "NOT_FOUND" => jsonrpc::NOT_FOUND,
            "INVALID_IDENTITY" => jsonrpc::INVALID_IDENTITY,
            "HOST_FAILURE" => jsonrpc::HOST_FAILURE,
            _ => jsonrpc::INTERNAL_ERROR,
        }
    }
}

impl From<AttributeError> for BridgeError {
    fn from(error: AttributeError) -> Self {
        match error {
            AttributeError::Changeset(error) => Self::Changeset(error),
            other => Self::Attribute(other),
        }
    }
}

impl From<ReplayError> for BridgeError {
    fn from(error: ReplayError) -> Self {
        match error {
            ReplayError::Changeset(error) => Self::Changeset(error),
            ReplayError::LengthMismatch { expected, actual } => Self::LengthMismatch { expected, actual },
            ReplayError::Sink(error) => Self::Edit(error),
        }
    }
}

impl From<PadError> for BridgeError {
    fn from(error: PadError) -> Self {
        match error {
            PadError::Replay(error) => error.into(),
            PadError::Attribute(error) => error.into(),
        }
    }
}

/// Read-only view of a pad for clients and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PadView {
    pub pad_id: DocumentIdentity,
    pub text: String,
    pub len_chars: usize,
    pub revision: u64,
    pub pool: PoolSnapshot,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_state: Option<RunState>,
}

pub struct Bridge {
    registry: PadRegistry,
    host: Arc<dyn ResourceHost>,
    outbox: Arc<SessionOutbox>,
    routes: ExtendedRoutes,
    options: BridgeOptions,
    test_results: Mutex<HashMap<String, BTreeMap<String, TestResult>>>,
}

impl Bridge {
    pub fn new(host: Arc<dyn ResourceHost>, options: BridgeOptions) -> Self {
        Self::with_routes(host, options, ExtendedRoutes::standard())
    }

    pub fn with_routes(host: Arc<dyn ResourceHost>, options: BridgeOptions, routes: ExtendedRoutes) -> Self {
        let outbox = Arc::new(SessionOutbox::new(options.outbox_capacity));
        Self {
            registry: PadRegistry::new(),
            host,
            outbox,
            routes,
            options,
            test_results: Mutex::new(HashMap::new()),
        }
    }

    pub fn outbox(&self) -> &Arc<SessionOutbox> {
        &self.outbox
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Activates `user`'s content pad for `path`, seeded from the host
    /// document. Idempotent.
    pub async fn access_document_pad(&self, user: &str, path: &str) -> Result<DocumentIdentity, BridgeError> {
        let identity = DocumentIdentity::content(user, path)?;
        let span = info_span!("access_document_pad", pad_id = %identity);
        async {
            let mut slot = self.registry.lock(&identity).await;
            if slot.is_active() {
                return Ok(identity.clone());
            }

            let document = HostDocument::open(self.host.as_ref(), identity.path())?;
            let pad = Pad::new(identity.clone(), document.text());
            info!(len_chars = pad.len_chars(), "content pad activated");
            *slot = PadSlot::Active(ActivePad { pad, document: Some(document) });
            Ok(identity.clone())
        }
        .instrument(span)
        .await
    }

    /// Activates `user`'s run pad for `path`. Run pads start empty and are
    /// not backed by a host document.
    pub async fn access_run_pad(&self, user: &str, path: &str) -> Result<DocumentIdentity, BridgeError> {
        let identity = DocumentIdentity::run(user, path)?;
        self.lock_run_pad(&identity).await;
        Ok(identity)
    }

    /// Replays a session changeset into the host document, then the pad.
    pub async fn submit_changeset(
        &self,
        identity: &DocumentIdentity,
        encoded: &str,
    ) -> Result<ReplayReport, BridgeError> {
        let span = info_span!("submit_changeset", pad_id = %identity);
        async {
            let changeset = Changeset::decode(encoded).inspect_err(|error| {
                warn!(error = %error, "rejected undecodable changeset");
            })?;

            let mut slot = self.registry.lock(identity).await;
            let active = active_mut(&mut slot, identity)?;
            let result = self.apply_session_changeset(active, &changeset);
            if let Err(error) = &result {
                warn!(kind = error.kind(), error = %error, "rejected changeset");
            }
            result
        }
        .instrument(span)
        .await
    }

    fn apply_session_changeset(
        &self,
        active: &mut ActivePad,
        changeset: &Changeset,
    ) -> Result<ReplayReport, BridgeError> {
        let plan = active.pad.plan(changeset, self.options.combine)?;
        if let Some(document) = active.document.as_mut() {
            let actual = document.len_chars();
            if actual != changeset.old_len() {
                return Err(BridgeError::LengthMismatch { expected: changeset.old_len(), actual });
            }
            document.apply(self.host.as_ref(), plan.edits())?;
        }

        let edits = plan.edits().len();
        let revision = active.pad.commit(plan)?;
        let report =
            ReplayReport { edits, old_len: changeset.old_len(), new_len: changeset.new_len() };
        debug!(edits, old_len = report.old_len, new_len = report.new_len, revision, "replayed changeset");
        Ok(report)
    }

    /// Re-asserts analysis attributes over the whole content pad and queues
    /// the resulting changeset for the session.
    pub async fn reassert_attributes(
        &self,
        identity: &DocumentIdentity,
        spans: &[AttributeSpan],
    ) -> Result<String, BridgeError> {
        let span = info_span!("reassert_attributes", pad_id = %identity, spans = spans.len());
        async {
            let mut slot = self.registry.lock(identity).await;
            let pad = &mut active_mut(&mut slot, identity)?.pad;

            let len = pad.len_chars();
            let changeset = encode_spans(spans, len, pad.pool_mut()).inspect_err(|error| {
                warn!(error = %error, "rejected attribute spans");
            })?;
            let encoded = self.publish(pad, &changeset, SYNTAX_COLOR_AUTHOR)?;
            debug!(changeset = %encoded, "attributes reasserted");
            Ok(encoded)
        }
        .instrument(span)
        .await
    }

    /// Replaces the pad's problem annotations wholesale.
    pub async fn push_diagnostics(
        &self,
        identity: &DocumentIdentity,
        diagnostics: Vec<Diagnostic>,
    ) -> Result<(), BridgeError> {
        let mut slot = self.registry.lock(identity).await;
        let pad = &mut active_mut(&mut slot, identity)?.pad;

        debug!(pad_id = %identity, count = diagnostics.len(), "diagnostics replaced");
        pad.replace_diagnostics(diagnostics.clone());
        self.outbox.push(SessionEvent::Annotations {
            pad_id: identity.clone(),
            kind: AnnotationKind::Problem,
            annotations: diagnostics,
        });
        Ok(())
    }

    /// Records a run lifecycle change in the run pad and tells its clients.
    pub async fn run_state_change(&self, identity: &DocumentIdentity, state: RunState) -> Result<(), BridgeError> {
        let identity = identity.with_mode(StreamMode::Run);
        let span = info_span!("run_state_change", pad_id = %identity, ?state);
        async {
            let mut slot = self.lock_run_pad(&identity).await;
            let pad = &mut active_mut(&mut slot, &identity)?.pad;
            let gray = [Attribute::new("foreground", self.options.banner_color.as_str())];

            let changeset = match state {
                RunState::Launching => {
                    let text = pad.text();
                    let mut builder = ChangesetBuilder::new(pad.len_chars());
                    builder.remove(pad.len_chars(), text.matches('\n').count());
                    builder.insert(&banner("Started"), &gray, pad.pool_mut());
                    Some(builder.build()?)
                }
                RunState::Terminated => Some(append_changeset(pad, &banner("Stopped"), &gray)?),
                RunState::Running => None,
            };
            if let Some(changeset) = changeset {
                self.publish(pad, &changeset, RUN_OUTPUT_AUTHOR)?;
            }

            pad.set_run_state(state);
            self.outbox.push(SessionEvent::Extended {
                target: ExtendedTarget::Pad { pad_id: identity.clone() },
                message: ExtendedMessage::RunStateChange { state: Some(state) },
            });
            info!("run state changed");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Appends run output to the end of the run pad.
    pub async fn run_output(
        &self,
        identity: &DocumentIdentity,
        text: &str,
        attributes: &[Attribute],
    ) -> Result<(), BridgeError> {
        if text.is_empty() {
            return Ok(());
        }
        let identity = identity.with_mode(StreamMode::Run);
        let mut slot = self.lock_run_pad(&identity).await;
        let pad = &mut active_mut(&mut slot, &identity)?.pad;

        let changeset = append_changeset(pad, text, attributes)?;
        self.publish(pad, &changeset, RUN_OUTPUT_AUTHOR)?;
        Ok(())
    }

    /// Stores a test result and broadcasts it to the project's clients.
    pub async fn report_test_result(&self, project: &str, test: &str, result: TestResult) {
        self.test_results
            .lock()
            .await
            .entry(project.to_string())
            .or_default()
            .insert(test.to_string(), result.clone());

        debug!(project, test, outcome = ?result.outcome, "test result reported");
        self.outbox.push(SessionEvent::ProjectTestResult {
            project: project.to_string(),
            test: test.to_string(),
            result,
        });
    }

    /// Known results for `project`, ordered by test name.
    pub async fn test_results(&self, project: &str) -> Vec<(String, TestResult)> {
        self.test_results
            .lock()
            .await
            .get(project)
            .map(|results| results.iter().map(|(test, result)| (test.clone(), result.clone())).collect())
            .unwrap_or_default()
    }

    pub async fn handle_extended(&self, call: &ExtendedCall) -> Result<(), BridgeError> {
        let span = info_span!(
            "handle_extended",
            pad_id = %call.pad_id,
            connection_id = %call.connection_id,
            kind = ?call.message.kind(),
        );
        self.routes.dispatch(self, call).instrument(span).await
    }

    pub async fn read_pad(&self, identity: &DocumentIdentity) -> Result<PadView, BridgeError> {
        let slot = self.registry.lock(identity).await;
        let pad = &slot.active().ok_or_else(|| BridgeError::PadNotActive(identity.clone()))?.pad;
        Ok(PadView {
            pad_id: identity.clone(),
            text: pad.text(),
            len_chars: pad.len_chars(),
            revision: pad.revision(),
            pool: pad.pool().snapshot(),
            diagnostics: pad.diagnostics().to_vec(),
            run_state: pad.run_state(),
        })
    }

    /// Latest run state of a run pad, without activating it.
    pub(crate) async fn run_state(&self, identity: &DocumentIdentity) -> Option<RunState> {
        let slot = self.registry.lock(identity).await;
        slot.active().and_then(|active| active.pad.run_state())
    }

    pub(crate) fn push_event(&self, event: SessionEvent) -> u64 {
        self.outbox.push(event)
    }

    async fn lock_run_pad(&self, identity: &DocumentIdentity) -> PadGuard {
        let mut slot = self.registry.lock(identity).await;
        if !slot.is_active() {
            info!(pad_id = %identity, "run pad activated");
            *slot = PadSlot::Active(ActivePad { pad: Pad::new(identity.clone(), ""), document: None });
        }
        slot
    }

    /// Applies a bridge-authored changeset to the pad and queues it for the
    /// session together with the pool that resolves its ids.
    fn publish(&self, pad: &mut Pad, changeset: &Changeset, author: &str) -> Result<String, BridgeError> {
        let revision = pad.apply(changeset, self.options.combine)?;
        let encoded = changeset.encode();
        self.outbox.push(SessionEvent::Changeset {
            pad_id: pad.identity().clone(),
            revision,
            changeset: encoded.clone(),
            author: author.to_string(),
            pool: pad.pool().snapshot(),
        });
        Ok(encoded)
    }
}

fn active_mut<'a>(slot: &'a mut PadSlot, identity: &DocumentIdentity) -> Result<&'a mut ActivePad, BridgeError> {
    slot.active_mut().ok_or_else(|| BridgeError::PadNotActive(identity.clone()))
}

fn append_changeset(pad: &mut Pad, text: &str, attributes: &[Attribute]) -> Result<Changeset, BridgeError> {
    let len = pad.len_chars();
    let lines = pad.text().matches('\n').count();
    let mut builder = ChangesetBuilder::new(len);
    builder.keep(len, lines, &[], pad.pool_mut());
    builder.insert(text, attributes, pad.pool_mut());
    Ok(builder.build()?)
}

fn banner(word: &str) -> String {
    format!(" [ {word} {} ]\n", Utc::now().format(BANNER_TIME_FORMAT))
}
