//! # parley-core
//!
//! Core types, collaborator traits, configuration, safety filtering and the
//! shared helper state for Parley.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod safety;
pub mod sanitize;
pub mod state;
pub mod traits;
