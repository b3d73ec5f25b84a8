//! Persistence layer.

pub mod sqlite;
