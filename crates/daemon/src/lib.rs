// padsync-daemon library entry point.

pub mod bridge;
pub mod config;
pub mod engine;
pub mod host;
pub mod outbox;
pub mod rpc;
pub mod runtime;
pub mod startup;
