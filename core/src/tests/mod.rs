//! End-to-end tests: JSON tree in, value or located diagnostics out

mod helpers;
mod requirement_tests;
