//! Cross-crate integration tests for the interpretation monitor.

#[cfg(test)]
pub mod fixtures;

#[cfg(test)]
mod channel_tests;
#[cfg(test)]
mod session_tests;
