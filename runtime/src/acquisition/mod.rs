//! HTTP acquisition for static harvests.
//!
//! The browser is only needed for modes that watch network traffic or read
//! the rendered DOM; hash and placeholder links come straight from HTML.

pub mod http_client;
