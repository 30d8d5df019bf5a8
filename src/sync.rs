//! 差分同期の実行
//!
//! 開始日計算 → 一覧巡回 → 重複排除・追記 → 本文バックフィル を順に実行する。
//! ブラウザセッションとストアは呼び出し側から渡す。

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::backfill::{Backfill, BackfillReport};
use crate::config::SyncConfig;
use crate::debug::save_debug_info;
use crate::error::SyncError;
use crate::reconcile::{append_novel, persisted_keys, reconcile};
use crate::store::{append_range, data_range};
use crate::traits::{BrowsingSession, RecordStore};
use crate::types::number_rows;
use crate::walker::{ListingWalker, StopReason};
use crate::window::{compute_start_date, latest_posted_date, DateWindow};

/// 1回の実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub start_date: NaiveDate,
    /// 期間内として収集した行数
    pub scraped: usize,
    pub appended: usize,
    /// 一覧巡回の終了理由（巡回失敗時は None）
    pub walk_stop: Option<StopReason>,
    pub backfill: BackfillReport,
}

/// 同期を1回実行
///
/// 一覧巡回に失敗した場合は追記せずバックフィルだけ行い、最後に巡回のエラーを返す。
pub async fn run_sync<S, R>(
    session: &S,
    store: &R,
    config: &SyncConfig,
    today: NaiveDate,
) -> Result<SyncReport, SyncError>
where
    S: BrowsingSession + ?Sized,
    R: RecordStore + ?Sized,
{
    sync_once(session, store, config, today)
        .await
        .map_err(|failure| failure.error)
}

/// 失敗と、その時点でデバッグ情報を保存済みかどうか
struct SyncFailure {
    error: SyncError,
    captured: bool,
}

impl From<SyncError> for SyncFailure {
    fn from(error: SyncError) -> Self {
        Self {
            error,
            captured: false,
        }
    }
}

async fn sync_once<S, R>(
    session: &S,
    store: &R,
    config: &SyncConfig,
    today: NaiveDate,
) -> Result<SyncReport, SyncFailure>
where
    S: BrowsingSession + ?Sized,
    R: RecordStore + ?Sized,
{
    info!("==== Part 1: collecting new listings ====");
    let rows = number_rows(store.read_range(&data_range(&config.sheet_name)).await?);
    let last = latest_posted_date(&rows)?;
    let start_date = compute_start_date(last, today, config.initial_look_back_years)?;
    match last {
        Some(date) => info!("Resuming after last saved date {}", date),
        None => info!(
            "First run, looking back {} years",
            config.initial_look_back_years
        ),
    }
    let window = DateWindow::new(start_date, today);
    info!("Date window: {} to {} ({} days)", start_date, today, window.len());

    let walker = ListingWalker::new(session, config);
    let walked = match walker.search().await {
        Ok(()) => walker.walk(&window).await.map_err(|e| (e, "listing")),
        Err(e) => Err((e, "initial_load")),
    };

    let mut report = SyncReport {
        start_date,
        scraped: 0,
        appended: 0,
        walk_stop: None,
        backfill: BackfillReport::default(),
    };
    let mut listing_error = None;

    match walked {
        Ok(walk) => {
            report.scraped = walk.records.len();
            report.walk_stop = Some(walk.stop);
            let novel = reconcile(walk.records, &persisted_keys(&rows));
            info!(
                "{} scraped, {} new after deduplication",
                report.scraped,
                novel.len()
            );
            report.appended =
                append_novel(store, &append_range(&config.sheet_name), &novel).await?;
        }
        Err((e, stage)) => {
            error!("Listing stage aborted at {}, nothing appended: {}", stage, e);
            save_debug_info(session, &config.debug_dir, stage).await;
            listing_error = Some(e);
        }
    }

    info!("==== Part 2: backfilling letter bodies ====");
    let rows = match store.read_range(&data_range(&config.sheet_name)).await {
        Ok(values) => number_rows(values),
        Err(e) => match listing_error {
            // 一覧のエラーを優先して返す
            Some(listing) => {
                warn!("Skipping backfill, failed to re-read sheet: {}", e);
                return Err(SyncFailure {
                    error: listing,
                    captured: true,
                });
            }
            None => return Err(e.into()),
        },
    };
    report.backfill = Backfill::new(session, store, config).run(&rows).await;

    info!(
        "Sync finished: start={}, scraped={}, appended={}, bodies filled={}",
        report.start_date, report.scraped, report.appended, report.backfill.filled
    );

    match listing_error {
        Some(error) => Err(SyncFailure {
            error,
            captured: true,
        }),
        None => Ok(report),
    }
}

/// セッションを受け取り、成否にかかわらず解放して結果を返す
pub async fn run_scoped<S, R>(
    mut session: S,
    store: &R,
    config: &SyncConfig,
    today: NaiveDate,
) -> Result<SyncReport, SyncError>
where
    S: BrowsingSession,
    R: RecordStore + ?Sized,
{
    let result = match sync_once(&session, store, config, today).await {
        Ok(report) => Ok(report),
        Err(failure) => {
            error!("Sync failed: {}", failure.error);
            if !failure.captured {
                save_debug_info(&session, &config.debug_dir, "general_error").await;
            }
            Err(failure.error)
        }
    };

    if let Err(e) = session.close().await {
        warn!("Failed to release browser session: {}", e);
    }
    result
}
