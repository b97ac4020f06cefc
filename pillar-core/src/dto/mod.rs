//! Data Transfer Objects
//!
//! Request bodies and query filters exchanged between the recipes service
//! and its callers.

pub mod recipe;
