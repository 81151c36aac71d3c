//! Use-case services composing cache, store and codec.
//!
//! # Responsibility
//! - Orchestrate directory, table, variation and assignment lookups into
//!   one constants-retrieval API.
//! - Keep callers decoupled from storage and blob-format details.

pub mod constants_service;
