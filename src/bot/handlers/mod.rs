//! Discord interaction handlers
//!
//! This module provides handlers for Discord interactions that are not commands
//! themselves: autocomplete suggestions and the admin gate shared by review commands.

/// Admin permission checks
pub mod admin;
/// Autocomplete handlers for property names
pub mod autocomplete;
