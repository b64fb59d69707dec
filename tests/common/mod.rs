//! Common test utilities and helpers
//!
//! - Test application with a throwaway database
//! - Payload factories

pub mod factories;
pub mod test_app;

pub use factories::*;
pub use test_app::*;
