use std::sync::LazyLock;
use std::time::Duration;

/// Connect timeout of outbound HTTP calls
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Whole-request timeout of outbound HTTP calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Global HTTP client instance
///
/// Initialized lazily on first access and shared by every provider using
/// the default timeouts.
///
/// # Example
/// ```ignore
/// use mailer_rs::external::client::HTTP_CLIENT;
///
/// let response = HTTP_CLIENT.get("https://api.example.com/data").send().await?;
/// ```
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    build_client(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to a default HTTP client");
        reqwest::Client::new()
    })
});

/// Build a client with the given timeouts and the shared pooling settings.
pub fn build_client(connect_timeout: Duration, request_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        // Connection pooling
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        // HTTP/2 settings
        .http2_adaptive_window(true)
        .http2_keep_alive_interval(Duration::from_secs(10))
        .http2_keep_alive_timeout(Duration::from_secs(20))
        .user_agent(concat!("mailer-rs/", env!("CARGO_PKG_VERSION")))
        .build()
}
