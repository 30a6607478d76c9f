//! Centralized constants for the solo project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod bot;
pub mod env;
pub mod lease;
pub mod network;
pub mod paths;
