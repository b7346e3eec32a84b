pub mod logging;
pub mod rate_limit;
pub mod security;

pub use logging::request_logging_middleware;
pub use rate_limit::rate_limit_middleware;
pub use security::security_headers_middleware;
