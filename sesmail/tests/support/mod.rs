//! Test support utilities for transport tests
//!
//! - [`mock_client::MockSesClient`] stands in for the remote API in-process
//!   and records when each call started and finished
//! - [`mock_http::MockHttpServer`] answers real HTTP requests from
//!   [`sesmail::SesClient`] with canned SES v2 JSON responses
#![allow(dead_code)] // Not every test file uses every helper

pub mod mock_client;
pub mod mock_http;

pub use mock_client::{MockSesClient, Reply};
pub use mock_http::MockHttpServer;
