//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! fetch, extract, resolve and enqueue cycle end-to-end against the
//! in-memory shared store.

mod crawl_tests;
