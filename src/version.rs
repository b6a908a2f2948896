use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;

/// Raw-text file holding the latest released application version.
pub const VERSION_URL: &str =
    "https://raw.githubusercontent.com/0xzer0x/quran-companion/main/VERSION";

/// The check is best-effort, so it gets a short fixed timeout instead of
/// the transport default.
const VERSION_TIMEOUT: Duration = Duration::from_millis(1500);

/// Fetches the latest published version string. Returns `None` on any
/// non-200 response or transport error; the check never surfaces
/// failures to the caller.
pub async fn latest_version(client: &Client) -> Option<String> {
    let resp = match client
        .get(VERSION_URL)
        .timeout(VERSION_TIMEOUT)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            debug!("version check skipped: {e}");
            return None;
        }
    };

    if resp.status() != StatusCode::OK {
        debug!("version check ignored HTTP {}", resp.status());
        return None;
    }

    let body = resp.text().await.ok()?;
    let version = body.trim();
    (!version.is_empty()).then(|| version.to_string())
}
