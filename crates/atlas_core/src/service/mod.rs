//! Edit-session services.
//!
//! # Responsibility
//! - Resolve tree selections to documents.
//! - Run the edit session, autosave and save sequencing.
//! - Keep the application state store consistent with completed operations.

pub mod app_state;
pub mod autosave;
pub mod content_reconciler;
pub mod edit_session;
pub mod path_resolver;
pub mod workspace_controller;
