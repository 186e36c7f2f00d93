//! services/api/src/lib.rs
//!
//! HTTP surface and storage adapters for the achievement records service.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
