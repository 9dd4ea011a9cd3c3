use std::collections::{BTreeMap, BTreeSet};

use padsync_common::protocol::jsonrpc::{
    BANK_UNDERFLOW, DOCUMENT_LENGTH_MISMATCH, HOST_FAILURE, INVALID_IDENTITY, MALFORMED_CHANGESET, NOT_FOUND,
    SPAN_COVERAGE_MISMATCH, SUPPORTED_PROTOCOL_VERSIONS, UNKNOWN_ATTRIBUTE_ID,
};
use padsync_common::protocol::rpc_methods::IMPLEMENTED_METHODS;
use serde::Deserialize;

/// `contracts/jsonrpc-methods.json`, shared with socket clients.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Contract {
    rpc_protocol_versions: Vec<String>,
    implemented_methods: Vec<String>,
    error_kinds: BTreeMap<String, i32>,
}

fn contract() -> Contract {
    let raw = include_str!("../../../contracts/jsonrpc-methods.json");
    serde_json::from_str(raw).expect("contract should deserialize")
}

#[test]
fn dispatched_methods_are_the_published_ones() {
    let contract = contract();
    let published: BTreeSet<&str> = contract.implemented_methods.iter().map(String::as_str).collect();
    let dispatched: BTreeSet<&str> = IMPLEMENTED_METHODS.iter().copied().collect();

    assert_eq!(dispatched, published);
    assert_eq!(published.len(), contract.implemented_methods.len(), "contract lists a method twice");
    assert_eq!(dispatched.len(), IMPLEMENTED_METHODS.len(), "IMPLEMENTED_METHODS lists a method twice");
}

#[test]
fn protocol_versions_are_the_published_ones() {
    assert_eq!(contract().rpc_protocol_versions, SUPPORTED_PROTOCOL_VERSIONS);
}

#[test]
fn error_kinds_keep_their_codes() {
    let expected: BTreeMap<String, i32> = [
        ("MALFORMED_CHANGESET", MALFORMED_CHANGESET),
        ("BANK_UNDERFLOW", BANK_UNDERFLOW),
        ("DOCUMENT_LENGTH_MISMATCH", DOCUMENT_LENGTH_MISMATCH),
        ("UNKNOWN_ATTRIBUTE_ID", UNKNOWN_ATTRIBUTE_ID),
        ("SPAN_COVERAGE_MISMATCH", SPAN_COVERAGE_MISMATCH),
        ("NOT_FOUND", NOT_FOUND),
        ("INVALID_IDENTITY", INVALID_IDENTITY),
        ("HOST_FAILURE", HOST_FAILURE),
    ]
    .into_iter()
    .map(|(kind, code)| (kind.to_string(), code))
    .collect();

    assert_eq!(contract().error_kinds, expected);
}
