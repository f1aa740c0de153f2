//! Integration tests for uncertainty propagation
