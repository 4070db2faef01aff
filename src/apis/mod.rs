//! External data source clients: the OpenSanctions bulk download plus the
//! two corporate registry REST APIs. Registry data is browsed and printed
//! only; it is never joined against the sanctions tables.

pub mod opencorporates;
pub mod opensanctions;
pub mod uk_companies_house;

use std::time::Duration;

use tracing::warn;

use crate::error::{MapperError, Result};

/// Issue a GET with retry and exponential backoff. 404 resolves to
/// `Ok(None)` so lookups can distinguish "not found" from failure; any
/// other non-success status or transport error is retried up to
/// `max_retries` attempts.
pub(crate) async fn get_with_retries(
    build: impl Fn() -> reqwest::RequestBuilder,
    max_retries: u32,
    what: &str,
) -> Result<Option<reqwest::Response>> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let outcome = match build().send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => return Ok(None),
            Ok(resp) => resp.error_for_status().map_err(MapperError::from),
            Err(err) => Err(MapperError::from(err)),
        };
        match outcome {
            Ok(resp) => return Ok(Some(resp)),
            Err(err) if attempt < max_retries => {
                let delay = Duration::from_secs((1u64 << attempt).min(60));
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {}s",
                    what,
                    attempt,
                    max_retries,
                    err,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
