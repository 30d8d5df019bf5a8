use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("ページ読み込みエラー: {0}")]
    PageLoad(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("ブラウザ操作エラー: {0}")]
    Browser(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("日付を解析できません: {0:?}")]
    DateParse(String),

    #[error("スプレッドシートエラー: {0}")]
    Store(String),

    #[error("認証情報エラー: {0}")]
    Credentials(String),

    #[error("JSON解析エラー: {0}")]
    Json(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

impl SyncError {
    /// 要素待機のタイムアウトかどうか（バックフィルでは再試行対象として残す）
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::Timeout(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Json(e.to_string())
    }
}
