//! Common test imports

pub use rstest::rstest;
pub use rwtxd_api::Engine;
