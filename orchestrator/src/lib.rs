//! Hybrid retrieval orchestrator.
//!
//! Answers a query by routing it to a local document index, a live web
//! search provider, or both, merging the evidence in a fixed order and
//! handing a citation-numbered context to a grounded generator.

pub mod agents;
pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pipeline;
