//! Pillar Core
//!
//! Core types shared by the Pillar recipes service, its client and the CLI.
//!
//! This crate contains:
//! - Domain types: Core business entities (Recipe)
//! - DTOs: Request payloads and query filters for the recipes API

pub mod domain;
pub mod dto;
