use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::{PagerState, TableRow};

/// ブラウザセッション
///
/// 一覧の巡回とバックフィルの両方が同じセッションを順番に使う。
/// 実装は自動化検出の回避（navigator.webdriver の隠蔽など）を行うこと。
#[async_trait]
pub trait BrowsingSession: Send + Sync {
    /// URLを開く
    async fn open(&self, url: &str) -> Result<(), SyncError>;

    /// 要素が表示されるまで待機。期限切れは `SyncError::Timeout`
    async fn wait_until_visible(&self, selector: &str, timeout: Duration)
        -> Result<(), SyncError>;

    /// 入力欄に文字列を入力
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), SyncError>;

    /// 要素をクリック
    async fn click(&self, selector: &str) -> Result<(), SyncError>;

    /// 要素のテキスト
    async fn text_of(&self, selector: &str) -> Result<String, SyncError>;

    /// テーブルの行を取得
    async fn table_rows(&self, row_selector: &str) -> Result<Vec<TableRow>, SyncError>;

    /// ページャー「次へ」の状態。見つからなければ `SyncError::ElementNotFound`
    async fn pager_state(&self, selector: &str) -> Result<PagerState, SyncError>;

    /// スクリーンショットを保存
    async fn screenshot(&self, path: &Path) -> Result<(), SyncError>;

    /// 現在のページHTML
    async fn page_source(&self) -> Result<String, SyncError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), SyncError>;
}

/// 表形式の永続化ストア（Google スプレッドシート）
///
/// 範囲は A1 記法（例: `FDA_WL!A2:F`）。
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 範囲の値を取得。末尾の空セル・空行は省略されうる
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SyncError>;

    /// 行を一括追記（1回の呼び出しで全行）
    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), SyncError>;

    /// 単一セルを更新
    async fn update_cell(&self, cell: &str, value: &str) -> Result<(), SyncError>;
}
