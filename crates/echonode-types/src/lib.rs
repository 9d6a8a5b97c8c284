//! Shared types for the echonode daemon.
//!
//! This crate defines the configuration model and the sample catalog records
//! served over HTTP. It contains no business logic.

pub mod album;
pub mod config;
