//! Shared primitive types used across the reporting core.

/// A policy identifier as it appears in source extracts.
/// Not unique across time; endorsements reuse the id of the original.
pub type PolicyId = String;

/// The raw "employee-id + name" key that joins a row to the agent directory.
pub type AgentKey = String;
