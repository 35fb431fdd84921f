//! Helpers for tests that need a real, throw-away database. Enabled by the `test_utils` feature.
pub mod prepare_env;
