//! Origami engines and the use-case facade over them.
//!
//! # Responsibility
//! - Enforce domain rules on top of the repositories: step ordering,
//!   annotation pipeline, fold retirement and creation, replay.
//! - Classify failures into caller errors and consistency faults.
//!
//! # Invariants
//! - Engine functions never open transactions; `OrigamiService` owns them.

pub mod annotation;
pub mod deletion;
pub mod error;
pub mod fold;
pub mod invariants;
pub mod ledger;
pub mod origami_service;
pub mod replay;
