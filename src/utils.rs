// ABOUTME: Utility functions shared by startup and the sinks
// ABOUTME: Provides retry with exponential backoff and credential-free URL rendering

use std::fmt::Display;
use std::time::Duration;

use url::Url;

/// Retry an async operation with exponential backoff
///
/// Runs `operation` up to `max_retries + 1` times, doubling the delay after
/// each failure. Returns the first success or the last error.
///
/// # Examples
///
/// ```
/// # use adsb_relay::utils::retry_with_backoff;
/// # use std::time::Duration;
/// # async fn example() -> Result<(), String> {
/// let value = retry_with_backoff(
///     || async { Ok::<_, String>(42) },
///     3,
///     Duration::from_millis(10),
/// )
/// .await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    max_retries: u32,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    "Operation failed (attempt {}/{}): {}, retrying in {:?}...",
                    attempt,
                    max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2; // Exponential backoff
            }
            Err(e) => return Err(e),
        }
    }
}

/// Render a URL with its password replaced by `***`
///
/// Strings that do not parse as URLs are returned unchanged.
pub fn sanitize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}
