//! Scoring engine.

/// Pure frame derivation and scoring functions.
pub mod score;
