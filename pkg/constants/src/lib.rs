//! Centralized constants for the allot project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod paths;
pub mod quota;
pub mod state;
