use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{Local, NaiveDate};
use tower::Service;
use tracing::info;

use crate::chrome::ChromeSession;
use crate::config::SyncConfig;
use crate::credentials::ServiceAccountTokenSource;
use crate::error::SyncError;
use crate::store::SheetsStore;
use crate::sync::{run_scoped, SyncReport};

/// 同期リクエスト
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub config: SyncConfig,
    /// 検索期間の終端。未指定ならローカル日付の今日
    pub today: Option<NaiveDate>,
}

impl SyncRequest {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

/// tower::Serviceを実装した同期サービス
///
/// 呼び出しごとにシートクライアントとブラウザを用意し、終了時にブラウザを必ず解放する。
#[derive(Debug, Clone, Default)]
pub struct SyncService {}

impl SyncService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<SyncRequest> for SyncService {
    type Response = SyncReport;
    type Error = SyncError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: SyncRequest) -> Self::Future {
        info!(
            "Sync request received: sheet={}, keyword={:?}",
            req.config.sheet_name, req.config.keyword
        );

        Box::pin(async move {
            let config = req.config;
            let today = req.today.unwrap_or_else(|| Local::now().date_naive());

            // ブラウザ起動前に認証情報を検証する
            let tokens = ServiceAccountTokenSource::from_file(&config.credentials_path)?;
            info!("Using service account {}", tokens.client_email());
            let store = SheetsStore::new(config.spreadsheet_id.clone(), tokens);

            let session = ChromeSession::launch(&config).await?;
            let report = run_scoped(session, &store, &config, today).await?;

            info!(
                "Sync complete: appended={}, bodies filled={}",
                report.appended, report.backfill.filled
            );
            Ok(report)
        })
    }
}
