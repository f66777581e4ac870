//! HTTP API: routing, the authorization gateway, and request/response mapping.

pub mod app;
pub mod context;
pub mod middleware;
pub mod remote;
