//! HTTP surface modules (router, handlers, middleware).

/// Shared constants and header names.
pub(crate) mod constants;
/// Problem response helpers and error mapping.
pub(crate) mod errors;
/// Health and metrics endpoints.
pub(crate) mod health;
/// Job submission, inspection and artifact downloads.
pub(crate) mod jobs;
/// Router construction and server host.
pub mod router;
/// Server-sent events feed.
pub(crate) mod sse;
/// Metrics middleware for HTTP requests.
pub(crate) mod telemetry;
#[cfg(test)]
pub(crate) mod testing;
