//! Integration tests for the governance API
//!
//! These tests drive the real routers, extractors and middleware against a
//! temporary SQLite database.

mod access_reviews_tests;
mod api_tests;
mod audit_tests;
mod auth_tests;
mod dashboard_tests;
mod retention_tests;
mod sites_tests;
mod storage_tests;
mod two_factor_tests;
