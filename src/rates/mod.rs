//! Foreign-born rate computation.
//!
//! This module turns per-year filtered rows into per-tract rate series with
//! year-over-year deltas, and into population-weighted totals over tract
//! subsets.

pub mod aggregate;
pub mod series;
pub mod subset;
pub mod types;
