//! Mock upstream servers for integration tests.

// Each test binary uses a different subset of the helpers
#![allow(dead_code)]

pub mod gemini_mock;

pub use gemini_mock::{MockBehavior, MockGeminiServer};
