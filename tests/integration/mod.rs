//! Integration tests that exercise the library as a whole

mod scenarios;
