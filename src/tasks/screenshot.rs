//! Full-page screenshots via a headless Chromium-family browser.

use std::process::Stdio;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::process::Command;
use url::Url;

use crate::config::ScreenshotConfig;
use crate::tasks::TaskFailure;

/// Render `url` and return the PNG as base64.
pub async fn capture(url: &str, config: &ScreenshotConfig) -> Result<String, TaskFailure> {
    let target = Url::parse(url)?;
    if !matches!(target.scheme(), "http" | "https") {
        return Err(TaskFailure::InvalidUrl(format!(
            "unsupported scheme {}",
            target.scheme()
        )));
    }

    let workdir = tempfile::tempdir()?;
    let output = workdir.path().join("screenshot.png");
    let profile = workdir.path().join("profile");

    let mut command = Command::new(&config.browser);
    command
        .arg("--headless=new")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-gpu")
        .arg("--hide-scrollbars")
        .arg(format!("--window-size={},{}", config.width, config.height))
        .arg(format!("--virtual-time-budget={}", config.settle_ms))
        .arg(format!("--user-data-dir={}", profile.display()))
        .arg(format!("--screenshot={}", output.display()))
        .arg(target.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let budget = Duration::from_secs(config.page_load_timeout_secs) + Duration::from_millis(config.settle_ms);
    let status = tokio::time::timeout(budget, command.status())
        .await
        .map_err(|_| TaskFailure::Timeout(budget.as_secs()))?
        .map_err(|e| TaskFailure::Browser(format!("cannot start {}: {}", config.browser, e)))?;

    if !status.success() {
        return Err(TaskFailure::Browser(format!("{} exited with {}", config.browser, status)));
    }

    let png = tokio::fs::read(&output)
        .await
        .map_err(|e| TaskFailure::Browser(format!("no screenshot written: {}", e)))?;
    tracing::debug!(url = %target, bytes = png.len(), "Screenshot captured");
    Ok(BASE64.encode(png))
}
