//! # Meterwise Analytics Engine
//!
//! This crate turns a series of smart-meter readings into a descriptive profile of a
//! customer's consumption: load factor, time-of-day shares, anomalous days, the
//! month-over-month trend and a set of rule-based alerts and savings opportunities.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of external systems.
//!   It depends only on `core-types` and the policy thresholds in `configuration`.
//! - **Total Calculation:** `AnalyticsEngine::analyze` never fails. An empty input is a
//!   valid input and yields a fully populated "insufficient data" report.
//! - **Order Independence:** Readings may arrive in any order; everything order-sensitive
//!   (monthly trend, quantiles) is sorted internally.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: The main struct that contains the calculation logic.
//! - `AnalysisReport`: The structured result, with its `Alert` and `Opportunity` items.
//! - `stats`: The small statistics toolkit the engine is built on.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod report;
pub mod stats;

// Re-export the key components to create a clean, public-facing API.
pub use engine::AnalyticsEngine;
pub use report::{Alert, AlertLevel, AnalysisReport, Opportunity, Priority};
