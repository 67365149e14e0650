//! Domain model for step-versioned origami geometry.
//!
//! # Responsibility
//! - Define the records held by the geometry store and the step ledger.
//! - Define the scoped-id request/response payloads exchanged with callers.
//!
//! # Invariants
//! - Records are immutable once created; retirement stamps a step marker.
//! - Durable ids never appear in payload types.

pub mod geometry;
pub mod payload;
pub mod step;
