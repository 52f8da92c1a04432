//! Document Repository Client contract and its implementations.
//!
//! # Responsibility
//! - Define the fetch/create/update/delete contract the edit session drives.
//! - Provide a SQLite-backed local store and an HTTP-shaped JSON client.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to transport/storage errors.
//! - Create never overwrites; it reports `Conflict` instead.

pub mod api_repo;
pub mod document_repo;
pub mod sqlite_repo;
