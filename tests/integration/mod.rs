//! Integration tests for the tenant directory
//!
//! These tests run every directory operation against a real (in-memory)
//! SQLite database with the embedded migrations applied.

mod directory_tests;
