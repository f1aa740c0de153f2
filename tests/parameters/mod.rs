//! Integration tests for the parameter system
//!
//! These tests verify that the parameter system behaves correctly in various scenarios.


// Tests for the Parameter struct and definitions
mod parameter_tests;

// Tests for the ParameterSet lifecycle
mod parameter_set_tests;

// Tests for name mangling
mod mangling_tests;
