//! services/api/src/lib.rs
//!
//! The NeuroStudy HTTP API: account management and study sessions built from
//! photographed notes. The binaries wire these modules to PostgreSQL, the image
//! store and the AI worker.

pub mod adapters;
pub mod auth;
pub mod config;
pub mod error;
pub mod web;
