//! Metric names shared by the auth pipeline and the HTTP server

pub const HTTP_REQUESTS_TOTAL: &str = "authgate_http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "authgate_http_request_duration_seconds";

pub const AUTH_VERDICTS_TOTAL: &str = "authgate_auth_verdicts_total";

pub const CACHE_HITS_TOTAL: &str = "authgate_cache_hits_total";
pub const CACHE_MISSES_TOTAL: &str = "authgate_cache_misses_total";

pub const UPTIME_SECONDS: &str = "authgate_uptime_seconds";
pub const INFO: &str = "authgate_info";
