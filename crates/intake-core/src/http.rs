//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Build the HTTP client used by every network collaborator.
///
/// Config: 30s connect timeout, rustls TLS, `intake/{version}` user-agent,
/// redirect limit 10. `timeout` bounds the whole request; `None` leaves it
/// unbounded.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_client(timeout: Option<Duration>) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("intake/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}
