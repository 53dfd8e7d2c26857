//! # parley-channels
//!
//! Chat session integrations for Parley.

pub mod whatsapp;
