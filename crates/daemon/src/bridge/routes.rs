use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use padsync_common::identity::StreamMode;
use padsync_common::protocol::session::{
    ExtendedCall, ExtendedKind, ExtendedMessage, ExtendedRequest, ExtendedTarget, RunAction,
    SessionEvent, TestsAction,
};
use tracing::debug;

use super::{Bridge, BridgeError};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type ExtendedHandler =
    for<'a> fn(&'a Bridge, &'a ExtendedCall) -> BoxFuture<'a, Result<(), BridgeError>>;

/// Routing table for extended messages, fixed once the bridge is built.
#[derive(Clone, Default)]
pub struct ExtendedRoutes {
    handlers: BTreeMap<ExtendedKind, ExtendedHandler>,
}

impl ExtendedRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// `RUN_REQUEST` and `TESTS_REQUEST`.
    pub fn standard() -> Self {
        Self::new()
            .route(ExtendedKind::RunRequest, run_request)
            .route(ExtendedKind::TestsRequest, tests_request)
    }

    #[must_use]
    pub fn route(mut self, kind: ExtendedKind, handler: ExtendedHandler) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = ExtendedKind> + '_ {
        self.handlers.keys().copied()
    }

    pub(crate) async fn dispatch(&self, bridge: &Bridge, call: &ExtendedCall) -> Result<(), BridgeError> {
        let kind = call.message.kind();
        let handler = self.handlers.get(&kind).ok_or(BridgeError::NoRoute(kind))?;
        handler(bridge, call).await
    }
}

fn run_request<'a>(bridge: &'a Bridge, call: &'a ExtendedCall) -> BoxFuture<'a, Result<(), BridgeError>> {
    Box::pin(async move {
        let ExtendedRequest::RunRequest { action } = call.message else {
            return Err(BridgeError::NoRoute(call.message.kind()));
        };
        let run_pad = call.pad_id.with_mode(StreamMode::Run);

        match action {
            RunAction::State => {
                let state = bridge.run_state(&run_pad).await;
                bridge.push_event(SessionEvent::Extended {
                    target: ExtendedTarget::Connection { connection_id: call.connection_id.clone() },
                    message: ExtendedMessage::RunStateChange { state },
                });
            }
            RunAction::Launch | RunAction::Terminate => {
                debug!(pad_id = %run_pad, ?action, "forwarding run command");
                bridge.push_event(SessionEvent::RunCommand { pad_id: run_pad, action });
            }
        }
        Ok(())
    })
}

fn tests_request<'a>(bridge: &'a Bridge, call: &'a ExtendedCall) -> BoxFuture<'a, Result<(), BridgeError>> {
    Box::pin(async move {
        let ExtendedRequest::TestsRequest { action: TestsAction::State } = call.message else {
            return Err(BridgeError::NoRoute(call.message.kind()));
        };

        for (test, result) in bridge.test_results(call.pad_id.project()).await {
            bridge.push_event(SessionEvent::Extended {
                target: ExtendedTarget::Connection { connection_id: call.connection_id.clone() },
                message: ExtendedMessage::TestResult { test, result },
            });
        }
        Ok(())
    })
}
