//! HTTP operations for checkers.

mod client;

pub use client::{HttpClient, RedirectError, RemoteResource, MAX_REDIRECTS};
