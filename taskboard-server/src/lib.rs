//! Taskboard server library.
//!
//! Exposes the task service and its HTTP surface for use in tests and
//! embedding. Storage is an in-memory transactional store; every request
//! acts on behalf of the single configured owner.

pub mod clock;
pub mod config;
pub mod http;
pub mod query;
pub mod service;
pub mod store;
pub mod tags;
