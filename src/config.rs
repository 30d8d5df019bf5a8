use std::path::PathBuf;
use std::time::Duration;

/// FDA Warning Letters 一覧ページ
pub const WARNING_LETTERS_URL: &str = "https://www.fda.gov/inspections-compliance-enforcement-and-criminal-investigations/compliance-actions-and-activities/warning-letters";

pub const DEFAULT_KEYWORD: &str = "Finished Pharmaceuticals";
/// 書き込み先のスプレッドシート
pub const DEFAULT_SPREADSHEET_ID: &str = "1L_sPHkWw6nzVWCFUXnTVUuCNyJjogmyM90iFCIvluD8";
pub const DEFAULT_SHEET_NAME: &str = "FDA_WL";
pub const DEFAULT_CREDENTIALS_FILE: &str = "service_account_credentials.json";
/// 認証情報JSONを受け取る環境変数
pub const CREDENTIALS_ENV: &str = "GOOGLE_CREDENTIALS";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 一覧の検索キーワード
    pub keyword: String,
    /// 初回実行時に遡る年数
    pub initial_look_back_years: u32,
    /// 1回の実行で巡回する最大ページ数
    pub max_pages: u32,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub credentials_path: PathBuf,
    pub listing_url: String,
    pub chrome_path: Option<String>,
    pub headless: bool,
    /// 要素の表示待ち上限
    pub element_timeout: Duration,
    /// キーワード入力後、テーブル再描画までの待機
    pub search_pause: Duration,
    /// 次ページクリック後の待機
    pub pagination_pause: Duration,
    /// 本文書き込み後の待機
    pub backfill_pause: Duration,
    /// デバッグ用スクリーンショット/HTMLの保存先
    pub debug_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.to_string(),
            initial_look_back_years: 3,
            max_pages: 50,
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            listing_url: WARNING_LETTERS_URL.to_string(),
            chrome_path: None,
            headless: true,
            element_timeout: Duration::from_secs(20),
            search_pause: Duration::from_secs(4),
            pagination_pause: Duration::from_secs(3),
            backfill_pause: Duration::from_secs(1),
            debug_dir: PathBuf::from("."),
        }
    }
}

impl SyncConfig {
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            ..Default::default()
        }
    }

    /// 環境変数で上書き（SPREADSHEET_ID, SHEET_NAME, CHROME_PATH, HEADLESS）
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(id) = std::env::var("SPREADSHEET_ID") {
            if !id.trim().is_empty() {
                config.spreadsheet_id = id;
            }
        }
        if let Ok(name) = std::env::var("SHEET_NAME") {
            config.sheet_name = name;
        }
        config.chrome_path = std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .ok();
        if let Ok(headless) = std::env::var("HEADLESS") {
            config.headless = headless != "false";
        }
        config
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn with_look_back_years(mut self, years: u32) -> Self {
        self.initial_look_back_years = years;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_element_timeout(mut self, timeout: Duration) -> Self {
        self.element_timeout = timeout;
        self
    }

    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = dir.into();
        self
    }

    /// 全ての固定待機をまとめて設定（テストでは0にする）
    pub fn with_pauses(mut self, pause: Duration) -> Self {
        self.search_pause = pause;
        self.pagination_pause = pause;
        self.backfill_pause = pause;
        self
    }
}
