//! On-device storybook bootstrap
//!
//! Discovers story files from configured directory trees, hands them to a
//! preview session and keeps that one session current across hot reloads.

pub mod annotations;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod preview;
pub mod storybook;
pub mod watcher;
