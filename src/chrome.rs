//! chromiumoxide によるブラウザセッション

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::traits::BrowsingSession;
use crate::types::{PagerState, TableRow};

/// 要素待機のポーリング間隔
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 自動化検出の回避（全ドキュメントで先に実行される）
const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// セレクタを JS 文字列リテラルにする
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Chrome セッション
///
/// `close` で明示的に解放する。解放前に破棄された場合もブラウザプロセスは
/// chromiumoxide 側で終了される。
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    user_data_dir: PathBuf,
}

impl ChromeSession {
    /// ブラウザを起動して空ページを開く
    pub async fn launch(config: &SyncConfig) -> Result<Self, SyncError> {
        info!("Launching browser...");

        // ユニークなユーザーデータディレクトリを生成
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("warning-letter-sync-{}", unique_id));

        // 既定引数には --enable-automation が含まれるため外す
        let mut builder = BrowserConfig::builder()
            .user_data_dir(&user_data_dir)
            .disable_default_args()
            .no_sandbox()
            .request_timeout(Duration::from_secs(60))
            .window_size(1920, 1080)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--start-maximized");

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder
            .build()
            .map_err(|e| SyncError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SyncError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SyncError::BrowserInit(e.to_string()))?;

        let stealth = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(HIDE_WEBDRIVER_SCRIPT)
            .build()
            .map_err(|e| SyncError::BrowserInit(format!("webdriver 隠蔽スクリプト: {}", e)))?;
        page.execute(stealth)
            .await
            .map_err(|e| SyncError::BrowserInit(format!("webdriver 隠蔽スクリプト: {}", e)))?;

        info!("Browser launched");
        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler),
            user_data_dir,
        })
    }

    fn page(&self) -> Result<&Page, SyncError> {
        self.page
            .as_ref()
            .ok_or_else(|| SyncError::BrowserInit("ブラウザが初期化されていません".into()))
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T, SyncError> {
        self.page()?
            .evaluate(script)
            .await
            .map_err(|e| SyncError::JavaScript(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| SyncError::JavaScript(e.to_string()))
    }
}

#[async_trait]
impl BrowsingSession for ChromeSession {
    async fn open(&self, url: &str) -> Result<(), SyncError> {
        let page = self.page()?;
        debug!("Navigating to {}", url);
        page.goto(url)
            .await
            .map_err(|e| SyncError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| SyncError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn wait_until_visible(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), SyncError> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                return style.display !== 'none' &&
                       style.visibility !== 'hidden' &&
                       (rect.width > 0 || rect.height > 0);
            }})()
            "#,
            js_string(selector)
        );

        let start = Instant::now();
        loop {
            match self.eval::<bool>(&script).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                // 再描画中は評価に失敗することがある
                Err(e) => debug!("Visibility check for {} failed: {}", selector, e),
            }

            if start.elapsed() > timeout {
                return Err(SyncError::Timeout(format!(
                    "{} が{}秒以内に表示されませんでした",
                    selector,
                    timeout.as_secs()
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), SyncError> {
        self.page()?
            .find_element(selector)
            .await
            .map_err(|e| SyncError::ElementNotFound(format!("{}: {}", selector, e)))?
            .click()
            .await
            .map_err(|e| SyncError::Browser(format!("{} クリック: {}", selector, e)))?
            .type_str(text)
            .await
            .map_err(|e| SyncError::Browser(format!("{} 入力: {}", selector, e)))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), SyncError> {
        // DataTables のページャーは JS でクリックする方が確実
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return false;
                (el.querySelector('a') || el).click();
                return true;
            }})()
            "#,
            js_string(selector)
        );
        if self.eval::<bool>(&script).await? {
            Ok(())
        } else {
            Err(SyncError::ElementNotFound(selector.to_string()))
        }
    }

    async fn text_of(&self, selector: &str) -> Result<String, SyncError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.innerText : null; }})()",
            js_string(selector)
        );
        self.eval::<Option<String>>(&script)
            .await?
            .ok_or_else(|| SyncError::ElementNotFound(selector.to_string()))
    }

    async fn table_rows(&self, row_selector: &str) -> Result<Vec<TableRow>, SyncError> {
        let script = format!(
            r#"
            (() => {{
                const rows = Array.from(document.querySelectorAll({}));
                return JSON.stringify(rows.map(tr => {{
                    const cells = Array.from(tr.querySelectorAll('td'));
                    return {{
                        cells: cells.map(td => td.innerText.trim()),
                        links: cells.map(td => {{
                            const a = td.querySelector('a[href]');
                            return a ? a.href : null;
                        }}),
                    }};
                }}));
            }})()
            "#,
            js_string(row_selector)
        );
        let json: String = self.eval(&script).await?;
        let rows: Vec<TableRow> = serde_json::from_str(&json)?;
        debug!("Fetched {} table rows", rows.len());
        Ok(rows)
    }

    async fn pager_state(&self, selector: &str) -> Result<PagerState, SyncError> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return null;
                const disabled = el.classList.contains('disabled') ||
                                 el.getAttribute('aria-disabled') === 'true';
                return disabled ? 'disabled' : 'enabled';
            }})()
            "#,
            js_string(selector)
        );
        match self.eval::<Option<String>>(&script).await? {
            Some(state) if state == "disabled" => Ok(PagerState::Disabled),
            Some(_) => Ok(PagerState::Enabled),
            None => Err(SyncError::ElementNotFound(selector.to_string())),
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), SyncError> {
        let bytes = self
            .page()?
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| SyncError::Browser(format!("スクリーンショット: {}", e)))?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, SyncError> {
        self.page()?
            .content()
            .await
            .map_err(|e| SyncError::Browser(format!("ページHTML: {}", e)))
    }

    async fn close(&mut self) -> Result<(), SyncError> {
        info!("Closing browser...");

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close page: {}", e);
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Failed to wait for browser exit: {}", e);
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!("Failed to remove user data dir {:?}: {}", self.user_data_dir, e);
        }

        info!("Browser closed");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!("ChromeSession dropped without close()");
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}
