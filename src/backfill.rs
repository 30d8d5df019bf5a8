//! 本文バックフィル
//!
//! リンクがあり本文（F列）が空の行だけを選び、詳細ページの本文を1行ずつ
//! 書き戻す。埋まった行は二度と選ばれないため、何度実行しても安全。

use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::store::body_cell;
use crate::traits::{BrowsingSession, RecordStore};
use crate::types::StoredRow;

/// 詳細ページの本文領域
pub const DETAIL_BODY_SELECTOR: &str = "#main-content";
/// Google スプレッドシートの1セルあたりの上限文字数
pub const MAX_CELL_CHARS: usize = 50_000;

/// 本文取得待ちの行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBody {
    pub row_number: usize,
    pub link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Filled,
    /// 本文領域が時間内に表示されなかった（次回実行で再試行）
    TimedOut,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub selected: usize,
    pub filled: usize,
    pub timed_out: usize,
    pub failed: usize,
}

/// リンクあり・本文なしの行を選ぶ（空白だけの本文も書き込み済みとみなす）
pub fn select_pending(rows: &[StoredRow]) -> Vec<PendingBody> {
    rows.iter()
        .filter(|row| !row.detail_link().trim().is_empty() && row.body_text().is_empty())
        .map(|row| PendingBody {
            row_number: row.row_number,
            link: row.detail_link().trim().to_string(),
        })
        .collect()
}

fn truncate_for_cell(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct Backfill<'a, S: BrowsingSession + ?Sized, R: RecordStore + ?Sized> {
    session: &'a S,
    store: &'a R,
    config: &'a SyncConfig,
}

impl<'a, S, R> Backfill<'a, S, R>
where
    S: BrowsingSession + ?Sized,
    R: RecordStore + ?Sized,
{
    pub fn new(session: &'a S, store: &'a R, config: &'a SyncConfig) -> Self {
        Self {
            session,
            store,
            config,
        }
    }

    /// 対象行を順に処理。行単位の失敗はスキップして続行する
    pub async fn run(&self, rows: &[StoredRow]) -> BackfillReport {
        let pending = select_pending(rows);
        let mut report = BackfillReport {
            selected: pending.len(),
            ..Default::default()
        };
        info!("Backfill: {} rows without body", pending.len());

        for (i, task) in pending.iter().enumerate() {
            info!("[{}/{}] Fetching body for row {}", i + 1, pending.len(), task.row_number);
            match self.process(task).await {
                TaskOutcome::Filled => report.filled += 1,
                TaskOutcome::TimedOut => report.timed_out += 1,
                TaskOutcome::Failed => report.failed += 1,
            }
        }

        info!(
            "Backfill finished: {} filled, {} timed out, {} failed",
            report.filled, report.timed_out, report.failed
        );
        report
    }

    async fn process(&self, task: &PendingBody) -> TaskOutcome {
        match self.fill(task).await {
            Ok(()) => {
                sleep(self.config.backfill_pause).await;
                TaskOutcome::Filled
            }
            Err(e) if e.is_timeout() => {
                warn!("Row {}: detail body did not load, leaving empty: {}", task.row_number, e);
                TaskOutcome::TimedOut
            }
            Err(e) => {
                warn!("Row {}: skipped: {}", task.row_number, e);
                TaskOutcome::Failed
            }
        }
    }

    async fn fill(&self, task: &PendingBody) -> Result<(), SyncError> {
        self.session.open(&task.link).await?;
        self.session
            .wait_until_visible(DETAIL_BODY_SELECTOR, self.config.element_timeout)
            .await?;

        let text = self.session.text_of(DETAIL_BODY_SELECTOR).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::ElementNotFound(format!(
                "empty detail body: {}",
                task.link
            )));
        }

        let cell = body_cell(&self.config.sheet_name, task.row_number);
        self.store.update_cell(&cell, truncate_for_cell(text)).await?;
        info!("Row {}: body saved ({} chars)", task.row_number, text.chars().count());
        Ok(())
    }
}
