//! Flutter-facing bindings for the memory atlas core.

pub mod api;
