//! 一覧レコードとシート行の型定義

use serde::Deserialize;

/// シートの列数（A..F）
pub const SHEET_COLUMNS: usize = 6;
/// 識別キー（詳細リンク）の列: E
pub const LINK_COLUMN: usize = 4;
/// 本文の列: F
pub const BODY_COLUMN: usize = 5;
pub const BODY_COLUMN_LETTER: char = 'F';
/// 1行目はヘッダー
pub const FIRST_DATA_ROW: usize = 2;

/// 一覧テーブルの1行（キーワードに一致したもの）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub posted_date: String,
    pub issue_date: String,
    pub company_name: String,
    pub subject: String,
    /// 詳細ページURL。空文字はリンクなし
    pub detail_link: String,
}

impl ListingRecord {
    /// シートに追記する行（A..E。F列の本文はバックフィルで埋める）
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.posted_date.clone(),
            self.issue_date.clone(),
            self.company_name.clone(),
            self.subject.clone(),
            self.detail_link.clone(),
        ]
    }
}

/// ブラウザから取得したテーブル行の生データ
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TableRow {
    /// 各セルのテキスト（trim済み）
    pub cells: Vec<String>,
    /// 各セル内の最初のアンカーhref（絶対URL）。cells と同じ並び
    #[serde(default)]
    pub links: Vec<Option<String>>,
}

impl TableRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cells: Vec<String> = cells.into_iter().map(Into::into).collect();
        let links = vec![None; cells.len()];
        Self { cells, links }
    }

    pub fn with_link(mut self, cell: usize, link: impl Into<String>) -> Self {
        if self.links.len() <= cell {
            self.links.resize(cell + 1, None);
        }
        self.links[cell] = Some(link.into());
        self
    }

    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn link(&self, index: usize) -> Option<&str> {
        self.links.get(index).and_then(|l| l.as_deref())
    }
}

/// 「次へ」ボタンの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    Enabled,
    Disabled,
}

/// シート上の永続化済み行（行番号付き）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// シート上の行番号（1始まり、データは2行目から）
    pub row_number: usize,
    pub cells: Vec<String>,
}

impl StoredRow {
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn posted_date(&self) -> &str {
        self.cell(0)
    }

    pub fn detail_link(&self) -> &str {
        self.cell(LINK_COLUMN)
    }

    pub fn body_text(&self) -> &str {
        self.cell(BODY_COLUMN)
    }
}

/// read_range の結果（データ行のみ、A2 起点）に行番号を振る
pub fn number_rows(values: Vec<Vec<String>>) -> Vec<StoredRow> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, cells)| StoredRow {
            row_number: FIRST_DATA_ROW + i,
            cells,
        })
        .collect()
}
