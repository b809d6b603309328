//! Vela Core
//!
//! Core library for the Vela infrastructure tool: the resource model,
//! the Provider seam implemented by cloud plugins, attribute schemas,
//! and the generic polling helper providers use to wait on remote state.

pub mod provider;
pub mod resource;
pub mod retry;
pub mod schema;
