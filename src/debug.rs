use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::traits::BrowsingSession;

/// 失敗時のスクリーンショットとHTMLを保存。失敗してもログのみ
pub async fn save_debug_info<S: BrowsingSession + ?Sized>(
    session: &S,
    dir: &Path,
    name: &str,
) -> Vec<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let screenshot_path = dir.join(format!("{}_screenshot_{}.png", name, timestamp));
    let html_path = dir.join(format!("{}_page_{}.html", name, timestamp));
    let mut saved = Vec::new();

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!("Failed to create debug directory {:?}: {}", dir, e);
        return saved;
    }

    match session.screenshot(&screenshot_path).await {
        Ok(()) => {
            info!("Screenshot saved: {:?}", screenshot_path);
            saved.push(screenshot_path);
        }
        Err(e) => warn!("Failed to save screenshot: {}", e),
    }

    match session.page_source().await {
        Ok(html) => match tokio::fs::write(&html_path, html).await {
            Ok(()) => {
                info!("Page HTML saved: {:?}", html_path);
                saved.push(html_path);
            }
            Err(e) => warn!("Failed to save page HTML: {}", e),
        },
        Err(e) => warn!("Failed to read page source: {}", e),
    }

    saved
}
