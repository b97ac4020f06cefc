//! Core domain types
//!
//! These types represent the entities persisted by the recipes service and
//! returned over HTTP to the client and CLI.

pub mod recipe;
