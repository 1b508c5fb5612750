//! Shared wire schema for the Taskboard HTTP API.

pub mod api;
pub mod query;
pub mod task;
