//! Upstream transport: the HTTP client and its observability wrapper

mod http;
mod interceptor;

pub use self::http::UpstreamClient;
pub use self::interceptor::ObservabilityInterceptor;
