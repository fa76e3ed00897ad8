//! Onboarding Tracker Library
//!
//! This module exports the core components for testing and integration.

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod import;
pub mod logging;
pub mod report;
pub mod types;
