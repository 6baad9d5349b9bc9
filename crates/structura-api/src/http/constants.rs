//! Shared HTTP constants (headers, problem URIs, content types).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_LAST_EVENT_ID: &str = "last-event-id";
pub(crate) const SSE_KEEP_ALIVE_SECS: u64 = 20;

pub(crate) const PROBLEM_INTERNAL: &str = "https://structura.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://structura.dev/problems/bad-request";
pub(crate) const PROBLEM_CONFLICT: &str = "https://structura.dev/problems/conflict";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://structura.dev/problems/not-found";
pub(crate) const PROBLEM_CONVERSION_FAILED: &str =
    "https://structura.dev/problems/conversion-failed";

pub(crate) const CONTENT_TYPE_BUNDLE: &str = "application/octet-stream";
pub(crate) const CONTENT_TYPE_MANIFEST: &str = "text/plain; charset=utf-8";
pub(crate) const CONTENT_TYPE_METRICS: &str = "text/plain; version=0.0.4";

pub(crate) const JOBS_ROUTE_PREFIX: &str = "/v1/jobs";
pub(crate) const EVENTS_ROUTE: &str = "/v1/events";
