//! Utility functions and helpers for the paramset-rs library.

pub mod parallel;

pub use parallel::{evaluate_many, evaluate_scenarios};
