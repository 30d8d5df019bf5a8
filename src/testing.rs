//! テスト用のブラウザセッションとストア

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::backfill::DETAIL_BODY_SELECTOR;
use crate::config::WARNING_LETTERS_URL;
use crate::error::SyncError;
use crate::traits::{BrowsingSession, RecordStore};
use crate::types::{number_rows, PagerState, StoredRow, TableRow};
use crate::walker::{NEXT_SELECTOR, SEARCH_INPUT_SELECTOR, TABLE_BODY_SELECTOR, TABLE_INFO_SELECTOR};

/// 一覧の1ページ分
#[derive(Debug, Clone)]
pub struct FakePage {
    rows: Vec<TableRow>,
    pager: Option<PagerState>,
    renders: bool,
    click_fails: bool,
}

impl FakePage {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self {
            rows,
            pager: Some(PagerState::Enabled),
            renders: true,
            click_fails: false,
        }
    }

    /// 「次へ」が無効
    pub fn last(mut self) -> Self {
        self.pager = Some(PagerState::Disabled);
        self
    }

    /// 「次へ」は有効に見えるがクリックできない
    pub fn click_fails(mut self) -> Self {
        self.click_fails = true;
        self
    }

    pub fn without_pager(mut self) -> Self {
        self.pager = None;
        self
    }

    /// ページ切り替え後にテーブルが表示されない
    pub fn never_renders(mut self) -> Self {
        self.renders = false;
        self
    }
}

#[derive(Debug, Clone)]
pub enum DetailPage {
    Body(String),
    Timeout,
    Unreachable,
}

/// 台本どおりに応答するブラウザセッション
pub struct FakeSession {
    pages: Vec<FakePage>,
    details: HashMap<String, DetailPage>,
    search_box: bool,
    current_page: AtomicUsize,
    current_url: Mutex<String>,
    next_clicks: AtomicUsize,
    typed: Mutex<Vec<(String, String)>>,
    closed: Arc<AtomicBool>,
}

impl FakeSession {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            details: HashMap::new(),
            search_box: true,
            current_page: AtomicUsize::new(0),
            current_url: Mutex::new(String::new()),
            next_clicks: AtomicUsize::new(0),
            typed: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_detail(mut self, link: &str, page: DetailPage) -> Self {
        self.details.insert(link.to_string(), page);
        self
    }

    pub fn without_search_box(mut self) -> Self {
        self.search_box = false;
        self
    }

    pub fn next_clicks(&self) -> usize {
        self.next_clicks.load(Ordering::SeqCst)
    }

    /// 入力された (セレクタ, テキスト)
    pub fn typed(&self) -> Vec<(String, String)> {
        self.typed.lock().unwrap().clone()
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    fn page(&self) -> Option<&FakePage> {
        self.pages.get(self.current_page.load(Ordering::SeqCst))
    }

    fn detail(&self) -> Option<DetailPage> {
        let url = self.current_url.lock().unwrap().clone();
        self.details.get(&url).cloned()
    }
}

#[async_trait]
impl BrowsingSession for FakeSession {
    async fn open(&self, url: &str) -> Result<(), SyncError> {
        if let Some(DetailPage::Unreachable) = self.details.get(url) {
            return Err(SyncError::Navigation(format!("unreachable: {}", url)));
        }
        *self.current_url.lock().unwrap() = url.to_string();
        if url == WARNING_LETTERS_URL {
            self.current_page.store(0, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn wait_until_visible(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<(), SyncError> {
        let visible = match selector {
            SEARCH_INPUT_SELECTOR => self.search_box,
            TABLE_BODY_SELECTOR => self.page().map_or(false, |p| p.renders),
            DETAIL_BODY_SELECTOR => !matches!(self.detail(), Some(DetailPage::Timeout)),
            _ => true,
        };
        if visible {
            Ok(())
        } else {
            Err(SyncError::Timeout(selector.to_string()))
        }
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), SyncError> {
        self.typed
            .lock()
            .unwrap()
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), SyncError> {
        if selector == NEXT_SELECTOR {
            if self.page().map_or(false, |p| p.click_fails) {
                return Err(SyncError::JavaScript(format!("click failed: {}", selector)));
            }
            self.next_clicks.fetch_add(1, Ordering::SeqCst);
            self.current_page.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn text_of(&self, selector: &str) -> Result<String, SyncError> {
        match selector {
            TABLE_INFO_SELECTOR => Ok(format!("Showing 1 to 10 of {} entries", self.pages.len() * 10)),
            DETAIL_BODY_SELECTOR => match self.detail() {
                Some(DetailPage::Body(text)) => Ok(text),
                _ => Err(SyncError::ElementNotFound(selector.to_string())),
            },
            _ => Err(SyncError::ElementNotFound(selector.to_string())),
        }
    }

    async fn table_rows(&self, _row_selector: &str) -> Result<Vec<TableRow>, SyncError> {
        Ok(self.page().map(|p| p.rows.clone()).unwrap_or_default())
    }

    async fn pager_state(&self, selector: &str) -> Result<PagerState, SyncError> {
        self.page()
            .and_then(|p| p.pager)
            .ok_or_else(|| SyncError::ElementNotFound(selector.to_string()))
    }

    async fn screenshot(&self, path: &Path) -> Result<(), SyncError> {
        std::fs::write(path, b"png")?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, SyncError> {
        Ok("<html></html>".to_string())
    }

    async fn close(&mut self) -> Result<(), SyncError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// メモリ上のシート（ヘッダー行は持たない）
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Vec<String>>>,
    append_calls: AtomicUsize,
    update_calls: AtomicUsize,
    reads: AtomicUsize,
    /// この回数の読み込みが成功した後は失敗する
    reads_before_failure: Option<usize>,
}

impl MemoryStore {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            reads_before_failure: Some(0),
            ..Default::default()
        }
    }

    /// `n` 回目までの読み込みだけ成功する
    pub fn failing_after(mut self, n: usize) -> Self {
        self.reads_before_failure = Some(n);
        self
    }

    pub fn stored_rows(&self) -> Vec<StoredRow> {
        number_rows(self.rows.lock().unwrap().clone())
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

/// `'Sheet'!F7` → (列番号0始まり, 行番号)
fn parse_cell(cell: &str) -> Option<(usize, usize)> {
    let addr = cell.rsplit('!').next()?;
    let letters: String = addr.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let row: usize = addr[letters.len()..].parse().ok()?;
    let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    Some((col.checked_sub(1)?, row))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SyncError> {
        let done = self.reads.fetch_add(1, Ordering::SeqCst);
        if self.reads_before_failure.map_or(false, |n| done >= n) {
            return Err(SyncError::Store(format!("read {} failed: {}", done + 1, range)));
        }
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn append_rows(&self, _range: &str, rows: Vec<Vec<String>>) -> Result<(), SyncError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().extend(rows);
        Ok(())
    }

    async fn update_cell(&self, cell: &str, value: &str) -> Result<(), SyncError> {
        let (col, row) =
            parse_cell(cell).ok_or_else(|| SyncError::Store(format!("bad cell: {}", cell)))?;
        let mut rows = self.rows.lock().unwrap();
        let cells = rows
            .get_mut(row - 2)
            .ok_or_else(|| SyncError::Store(format!("no such row: {}", cell)))?;
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.to_string();
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
