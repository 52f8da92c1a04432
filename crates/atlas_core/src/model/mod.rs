//! Domain model for memory/docs documents and the trees they hang off.
//!
//! # Responsibility
//! - Define the document shape shared by memory and docs kinds.
//! - Define the read-only directory and docs trees produced by repositories.
//! - Own path normalization rules used by resolution and storage.
//!
//! # Invariants
//! - At most one authoritative `Document` per `(kind, path)`.
//! - Normalized paths never carry a leading `./` or a trailing `/`; the
//!   repository root is `.`.

pub mod document;
pub mod path;
pub mod tree;
