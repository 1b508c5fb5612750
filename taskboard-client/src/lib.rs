//! Taskboard client library.
//!
//! [`api`] talks to the server, [`optimistic`] tracks values shown ahead of
//! the server, and [`board`] combines them into the task list a user
//! interacts with.

pub mod api;
pub mod board;
pub mod optimistic;
