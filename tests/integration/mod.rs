//! Integration test suite for tribunal.
//!
//! These tests run whole requests through the orchestrator against scripted
//! tool providers and in-memory or unavailable cache stores. No network or
//! model calls are made.
//!
//! # Test Categories
//!
//! - `graph_properties`: graph shape for every selection and depth
//! - `scenarios`: end-to-end requests from selection to decision
//! - `resilience`: tool limits, timeouts and panics inside a phase
//! - `caching`: cache reuse across requests and store outages

mod fixtures;

mod caching;
mod graph_properties;
mod resilience;
mod scenarios;
