//! Service Module
//!
//! Business logic layer for the recipes service.
//! Services validate requests and delegate storage to a repository.

pub mod recipe;

pub use recipe as recipe_service;
