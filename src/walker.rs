//! 一覧テーブルのページ巡回
//!
//! DataTables で描画される一覧は、ページ遷移ではなくテーブル内容の差し替えで
//! ページが切り替わる。1ページずつ行を取得し、期間内の行だけを集める。

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::traits::BrowsingSession;
use crate::types::{ListingRecord, PagerState, TableRow};
use crate::window::DateWindow;

pub const SEARCH_INPUT_SELECTOR: &str = "#edit-search-api-fulltext";
pub const TABLE_INFO_SELECTOR: &str = "#datatable_info";
pub const TABLE_BODY_SELECTOR: &str = "#datatable tbody";
pub const ROW_SELECTOR: &str = "#datatable tbody tr";
pub const NEXT_SELECTOR: &str = "#datatable_next";

/// 該当なしのときに DataTables が描画する行のテキスト
pub const NO_RESULTS_TEXT: &str = "No matching records found";

/// 列: 掲載日 / 発行日 / 会社名 / 発行部署 / 件名 / ...
const MIN_COLUMNS: usize = 5;
const POSTED_DATE_CELL: usize = 0;
const ISSUE_DATE_CELL: usize = 1;
const COMPANY_CELL: usize = 2;
const SUBJECT_CELL: usize = 4;

/// 巡回終了の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 該当なし行が表示された
    NoResults,
    /// 2ページ目以降で期間内の行が0件
    NoNewMatches,
    /// 「次へ」が無効、または見つからない
    LastPage,
    /// 最大ページ数に到達
    MaxPages,
}

/// 1ステップの結果
#[derive(Debug)]
pub enum PageStep {
    Continue,
    StopTerminal(StopReason),
    StopError(SyncError),
}

#[derive(Debug)]
pub struct WalkReport {
    /// ページ順・行順の収集結果
    pub records: Vec<ListingRecord>,
    pub pages_visited: u32,
    pub stop: StopReason,
}

/// 該当なし行かどうか（データ行とはテキストでしか区別できない）
pub fn is_no_results_row(row: &TableRow) -> bool {
    row.cells
        .iter()
        .any(|c| c.trim().eq_ignore_ascii_case(NO_RESULTS_TEXT))
}

/// 期間内の行をレコードに変換。列不足・期間外は None
pub fn extract_record(row: &TableRow, window: &DateWindow) -> Option<ListingRecord> {
    if row.cells.len() < MIN_COLUMNS {
        return None;
    }
    let posted_date = row.cell(POSTED_DATE_CELL).trim();
    if !window.contains(posted_date) {
        return None;
    }
    Some(ListingRecord {
        posted_date: posted_date.to_string(),
        issue_date: row.cell(ISSUE_DATE_CELL).trim().to_string(),
        company_name: row.cell(COMPANY_CELL).trim().to_string(),
        subject: row.cell(SUBJECT_CELL).trim().to_string(),
        detail_link: row.link(COMPANY_CELL).unwrap_or_default().to_string(),
    })
}

pub struct ListingWalker<'a, S: BrowsingSession + ?Sized> {
    session: &'a S,
    config: &'a SyncConfig,
}

impl<'a, S: BrowsingSession + ?Sized> ListingWalker<'a, S> {
    pub fn new(session: &'a S, config: &'a SyncConfig) -> Self {
        Self { session, config }
    }

    /// 一覧ページを開いてキーワードで絞り込む
    pub async fn search(&self) -> Result<(), SyncError> {
        let timeout = self.config.element_timeout;
        info!("Opening listing page: {}", self.config.listing_url);

        self.session
            .open(&self.config.listing_url)
            .await
            .map_err(|e| SyncError::PageLoad(format!("listing page: {}", e)))?;

        self.session
            .wait_until_visible(SEARCH_INPUT_SELECTOR, timeout)
            .await
            .map_err(|e| SyncError::PageLoad(format!("search box: {}", e)))?;

        self.session
            .type_text(SEARCH_INPUT_SELECTOR, &self.config.keyword)
            .await
            .map_err(|e| SyncError::PageLoad(format!("search box input: {}", e)))?;
        debug!("Keyword entered: {}", self.config.keyword);

        sleep(self.config.search_pause).await;

        self.session
            .wait_until_visible(TABLE_INFO_SELECTOR, timeout)
            .await
            .map_err(|e| SyncError::PageLoad(format!("table info: {}", e)))?;

        match self.session.text_of(TABLE_INFO_SELECTOR).await {
            Ok(text) => info!("Search info: {}", text),
            Err(e) => debug!("Failed to read table info: {}", e),
        }
        Ok(())
    }

    /// 1ページ目から順に巡回する（search 済みであること）
    pub async fn walk(&self, window: &DateWindow) -> Result<WalkReport, SyncError> {
        let max_pages = self.config.max_pages;
        let mut records = Vec::new();
        let mut pages_visited = 0;

        for page_index in 1..=max_pages {
            pages_visited = page_index;

            let step = match self.collect_page(page_index, window, &mut records).await {
                PageStep::Continue if page_index < max_pages => self.advance(page_index).await,
                step => step,
            };

            match step {
                PageStep::Continue => {}
                PageStep::StopTerminal(stop) => {
                    info!(
                        "Listing walk finished at page {}: {:?} ({} records)",
                        page_index,
                        stop,
                        records.len()
                    );
                    return Ok(WalkReport {
                        records,
                        pages_visited,
                        stop,
                    });
                }
                PageStep::StopError(e) => {
                    warn!("Listing walk aborted at page {}: {}", page_index, e);
                    return Err(e);
                }
            }
        }

        info!(
            "Listing walk reached max pages ({}): {} records",
            max_pages,
            records.len()
        );
        Ok(WalkReport {
            records,
            pages_visited,
            stop: StopReason::MaxPages,
        })
    }

    /// 現在のページの行を収集
    async fn collect_page(
        &self,
        page_index: u32,
        window: &DateWindow,
        records: &mut Vec<ListingRecord>,
    ) -> PageStep {
        let rows = match self.session.table_rows(ROW_SELECTOR).await {
            Ok(rows) => rows,
            Err(e) => {
                return PageStep::StopError(SyncError::PageLoad(format!(
                    "rows on page {}: {}",
                    page_index, e
                )))
            }
        };

        if rows.iter().any(is_no_results_row) {
            info!("Page {}: no matching records", page_index);
            return PageStep::StopTerminal(StopReason::NoResults);
        }

        let before = records.len();
        for row in &rows {
            match extract_record(row, window) {
                Some(record) => {
                    if record.detail_link.is_empty() {
                        warn!("Row without detail link: {}", record.company_name);
                    }
                    records.push(record);
                }
                None => debug!("Skipping row: {:?}", row.cells.first()),
            }
        }
        let matched = records.len() - before;
        info!(
            "Page {}: {} rows, {} within date window",
            page_index,
            rows.len(),
            matched
        );

        // 一覧は掲載日の降順。2ページ目以降で0件ならこの先にも該当はない
        if page_index > 1 && matched == 0 {
            return PageStep::StopTerminal(StopReason::NoNewMatches);
        }
        PageStep::Continue
    }

    /// 次のページへ進む
    async fn advance(&self, page_index: u32) -> PageStep {
        match self.session.pager_state(NEXT_SELECTOR).await {
            Ok(PagerState::Enabled) => {}
            Ok(PagerState::Disabled) => return PageStep::StopTerminal(StopReason::LastPage),
            Err(e) => {
                warn!("Pagination control unavailable, treating as last page: {}", e);
                return PageStep::StopTerminal(StopReason::LastPage);
            }
        }

        if let Err(e) = self.session.click(NEXT_SELECTOR).await {
            warn!("Failed to click next, treating as last page: {}", e);
            return PageStep::StopTerminal(StopReason::LastPage);
        }
        debug!("Moving to page {}", page_index + 1);

        sleep(self.config.pagination_pause).await;

        match self
            .session
            .wait_until_visible(TABLE_BODY_SELECTOR, self.config.element_timeout)
            .await
        {
            Ok(()) => PageStep::Continue,
            Err(e) => PageStep::StopError(SyncError::PageLoad(format!(
                "results table after moving to page {}: {}",
                page_index + 1,
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePage, FakeSession};
    use chrono::NaiveDate;
    use std::time::Duration;

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
        )
    }

    fn row(date: &str, link: &str) -> TableRow {
        let row = TableRow::new([date, "01/02/2024", "Acme Pharma", "CDER", "CGMP/Finished Pharmaceuticals"]);
        if link.is_empty() {
            row
        } else {
            row.with_link(2, link)
        }
    }

    fn config(max_pages: u32) -> SyncConfig {
        SyncConfig::new("sheet")
            .with_max_pages(max_pages)
            .with_pauses(Duration::ZERO)
    }

    #[test]
    fn test_extract_record_columns() {
        let record = extract_record(&row("01/10/2024", "https://fda/l1"), &window()).unwrap();
        assert_eq!(record.posted_date, "01/10/2024");
        assert_eq!(record.issue_date, "01/02/2024");
        assert_eq!(record.company_name, "Acme Pharma");
        assert_eq!(record.subject, "CGMP/Finished Pharmaceuticals");
        assert_eq!(record.detail_link, "https://fda/l1");
    }

    #[test]
    fn test_extract_record_missing_link_is_empty() {
        let record = extract_record(&row("01/10/2024", ""), &window()).unwrap();
        assert_eq!(record.detail_link, "");
    }

    #[test]
    fn test_extract_record_rejects_short_and_out_of_window() {
        assert!(extract_record(&row("01/07/2024", "l"), &window()).is_none());
        let short = TableRow::new(["01/10/2024", "01/02/2024", "Acme", "CDER"]);
        assert!(extract_record(&short, &window()).is_none());
    }

    #[test]
    fn test_no_results_row() {
        assert!(is_no_results_row(&TableRow::new([NO_RESULTS_TEXT])));
        assert!(!is_no_results_row(&row("01/10/2024", "l")));
    }

    #[tokio::test]
    async fn test_walk_collects_in_page_order() {
        let session = FakeSession::new(vec![
            FakePage::new(vec![row("01/12/2024", "a"), row("01/11/2024", "b")]),
            FakePage::new(vec![row("01/10/2024", "c"), row("01/01/2024", "x")]).last(),
        ]);
        let config = config(10);
        let walker = ListingWalker::new(&session, &config);
        walker.search().await.unwrap();
        let report = walker.walk(&window()).await.unwrap();

        let links: Vec<_> = report.records.iter().map(|r| r.detail_link.as_str()).collect();
        assert_eq!(links, vec!["a", "b", "c"]);
        assert_eq!(report.pages_visited, 2);
        assert_eq!(report.stop, StopReason::LastPage);
        assert_eq!(session.next_clicks(), 1);
    }

    #[tokio::test]
    async fn test_walk_stops_on_no_results_row() {
        let session = FakeSession::new(vec![FakePage::new(vec![TableRow::new([NO_RESULTS_TEXT])])]);
        let config = config(10);
        let report = ListingWalker::new(&session, &config).walk(&window()).await.unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.stop, StopReason::NoResults);
        assert_eq!(session.next_clicks(), 0);
    }

    #[tokio::test]
    async fn test_walk_early_exit_after_first_page() {
        let session = FakeSession::new(vec![
            FakePage::new(vec![row("01/01/2024", "old")]),
            FakePage::new(vec![row("01/10/2024", "a")]),
            FakePage::new(vec![row("01/01/2024", "old2")]),
            FakePage::new(vec![row("01/10/2024", "never")]),
        ]);
        let config = config(10);
        let report = ListingWalker::new(&session, &config).walk(&window()).await.unwrap();

        // 1ページ目は0件でも続行、3ページ目で打ち切り
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.pages_visited, 3);
        assert_eq!(report.stop, StopReason::NoNewMatches);
    }

    #[tokio::test]
    async fn test_walk_bounded_by_max_pages() {
        let pages = (0..20)
            .map(|i| FakePage::new(vec![row("01/10/2024", &format!("l{}", i))]))
            .collect();
        let session = FakeSession::new(pages);
        let config = config(3);
        let report = ListingWalker::new(&session, &config).walk(&window()).await.unwrap();

        assert_eq!(report.pages_visited, 3);
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.stop, StopReason::MaxPages);
        assert_eq!(session.next_clicks(), 2);
    }

    #[tokio::test]
    async fn test_walk_missing_pager_is_last_page() {
        let session = FakeSession::new(vec![
            FakePage::new(vec![row("01/10/2024", "a")]).without_pager(),
        ]);
        let config = config(10);
        let report = ListingWalker::new(&session, &config).walk(&window()).await.unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.stop, StopReason::LastPage);
    }

    #[tokio::test]
    async fn test_search_types_keyword() {
        let session = FakeSession::new(vec![FakePage::new(vec![]).last()]);
        let config = config(10).with_keyword("Sterile Drugs");
        ListingWalker::new(&session, &config).search().await.unwrap();

        assert_eq!(
            session.typed(),
            vec![(SEARCH_INPUT_SELECTOR.to_string(), "Sterile Drugs".to_string())]
        );
    }

    #[tokio::test]
    async fn test_walk_next_click_failure_is_last_page() {
        let session = FakeSession::new(vec![
            FakePage::new(vec![row("01/10/2024", "a")]).click_fails(),
            FakePage::new(vec![row("01/09/2024", "never")]),
        ]);
        let config = config(10);
        let report = ListingWalker::new(&session, &config).walk(&window()).await.unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.pages_visited, 1);
        assert_eq!(report.stop, StopReason::LastPage);
        assert_eq!(session.next_clicks(), 0);
    }

    #[tokio::test]
    async fn test_walk_table_timeout_aborts() {
        let session = FakeSession::new(vec![
            FakePage::new(vec![row("01/10/2024", "a")]),
            FakePage::new(vec![row("01/10/2024", "b")]).never_renders(),
        ]);
        let config = config(10);
        let err = ListingWalker::new(&session, &config).walk(&window()).await.unwrap_err();
        assert!(matches!(err, SyncError::PageLoad(_)));
    }

    #[tokio::test]
    async fn test_search_failure_is_page_load_error() {
        let session = FakeSession::new(vec![]).without_search_box();
        let config = config(10);
        let err = ListingWalker::new(&session, &config).search().await.unwrap_err();
        assert!(matches!(err, SyncError::PageLoad(_)));
    }
}
