// RPC method name constants, mirrored by contracts/jsonrpc-methods.json.

// ── Daemon-internal ────────────────────────────────────────────────
pub const RPC_PING: &str = "rpc.ping";
pub const DAEMON_SHUTDOWN: &str = "daemon.shutdown";

// ── Pads ───────────────────────────────────────────────────────────
pub const PAD_ACCESS: &str = "pad.access";
pub const PAD_READ: &str = "pad.read";
pub const CHANGESET_SUBMIT: &str = "changeset.submit";
pub const ATTRIBUTES_REASSERT: &str = "attributes.reassert";

// ── Auxiliary streams ──────────────────────────────────────────────
pub const DIAGNOSTICS_PUSH: &str = "diagnostics.push";
pub const RUN_STATE: &str = "run.state";
pub const RUN_OUTPUT: &str = "run.output";
pub const TESTS_RESULT: &str = "tests.result";
pub const EXTENDED_REQUEST: &str = "extended.request";

// ── Session ────────────────────────────────────────────────────────
pub const SESSION_POLL: &str = "session.poll";

/// All methods the daemon dispatches.
pub const IMPLEMENTED_METHODS: &[&str] = &[
    RPC_PING,
    DAEMON_SHUTDOWN,
    PAD_ACCESS,
    PAD_READ,
    CHANGESET_SUBMIT,
    ATTRIBUTES_REASSERT,
    DIAGNOSTICS_PUSH,
    RUN_STATE,
    RUN_OUTPUT,
    TESTS_RESULT,
    EXTENDED_REQUEST,
    SESSION_POLL,
];
