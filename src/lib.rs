//! FDA Warning Letter 差分同期ライブラリ
//!
//! - 永続化済みの最新掲載日から検索期間を決める
//! - キーワードで絞り込んだ一覧テーブルをページ送りしながら収集
//! - 詳細リンクで重複排除して Google スプレッドシートへ追記
//! - 本文が空の行に詳細ページの本文を書き戻す
//!
//! # 使用例
//!
//! ```rust,ignore
//! use warning_letter_sync::{SyncConfig, SyncRequest, SyncService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = SyncService::new();
//!
//!     let config = SyncConfig::new("spreadsheet_id")
//!         .with_keyword("Finished Pharmaceuticals")
//!         .with_max_pages(50);
//!
//!     let report = service.call(SyncRequest::new(config)).await.unwrap();
//!     println!("appended: {}", report.appended);
//! }
//! ```

pub mod backfill;
pub mod chrome;
pub mod config;
pub mod credentials;
pub mod debug;
pub mod error;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod sync;
pub mod traits;
pub mod types;
pub mod walker;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型をリエクスポート
pub use chrome::ChromeSession;
pub use config::SyncConfig;
pub use error::SyncError;
pub use service::{SyncRequest, SyncService};
pub use store::SheetsStore;
pub use sync::{run_scoped, run_sync, SyncReport};
pub use traits::{BrowsingSession, RecordStore};
pub use types::ListingRecord;
pub use window::{compute_start_date, DateWindow};
