//! Google スプレッドシートを永続化ストアとして使う
//!
//! 列: A=掲載日 B=発行日 C=会社名 D=件名 E=詳細リンク F=本文。1行目はヘッダー。

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::ServiceAccountTokenSource;
use crate::error::SyncError;
use crate::traits::RecordStore;
use crate::types::{BODY_COLUMN_LETTER, FIRST_DATA_ROW};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// データ行全体（A2:F）
pub fn data_range(sheet: &str) -> String {
    format!("{}!A{}:F", quote_sheet(sheet), FIRST_DATA_ROW)
}

/// 追記先のテーブル範囲
pub fn append_range(sheet: &str) -> String {
    format!("{}!A:F", quote_sheet(sheet))
}

/// 本文セル（F列）
pub fn body_cell(sheet: &str, row_number: usize) -> String {
    format!("{}!{}{}", quote_sheet(sheet), BODY_COLUMN_LETTER, row_number)
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ValueRangeBody<'a> {
    range: &'a str,
    #[serde(rename = "majorDimension")]
    major_dimension: &'static str,
    values: Vec<Vec<String>>,
}

/// Sheets API v4 クライアント
#[derive(Debug)]
pub struct SheetsStore {
    spreadsheet_id: String,
    tokens: ServiceAccountTokenSource,
    client: reqwest::Client,
}

impl SheetsStore {
    pub fn new(spreadsheet_id: impl Into<String>, tokens: ServiceAccountTokenSource) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            tokens,
            client: reqwest::Client::new(),
        }
    }

    /// `.../spreadsheets/{id}/values/{last_segment}`
    fn values_url(&self, last_segment: &str) -> Result<Url, SyncError> {
        let mut url = Url::parse(SHEETS_API).map_err(|e| SyncError::Store(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Store("invalid API base url".into()))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(last_segment);
        Ok(url)
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, SyncError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(SyncError::Store(format!("{} failed ({}): {}", what, status, body)))
    }
}

#[async_trait]
impl RecordStore for SheetsStore {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SyncError> {
        let token = self.tokens.access_token().await?;
        let url = self.values_url(range)?;
        debug!("values.get {}", range);

        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::Store(format!("values.get: {}", e)))?;
        let resp = Self::check(resp, "values.get").await?;
        let body: ValueRange = resp
            .json()
            .await
            .map_err(|e| SyncError::Store(format!("values.get response: {}", e)))?;
        Ok(body.values)
    }

    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), SyncError> {
        let token = self.tokens.access_token().await?;
        let mut url = self.values_url(&format!("{}:append", range))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        debug!("values.append {} ({} rows)", range, rows.len());

        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&ValueRangeBody {
                range,
                major_dimension: "ROWS",
                values: rows,
            })
            .send()
            .await
            .map_err(|e| SyncError::Store(format!("values.append: {}", e)))?;
        Self::check(resp, "values.append").await?;
        Ok(())
    }

    async fn update_cell(&self, cell: &str, value: &str) -> Result<(), SyncError> {
        let token = self.tokens.access_token().await?;
        let mut url = self.values_url(cell)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        debug!("values.update {}", cell);

        let resp = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&ValueRangeBody {
                range: cell,
                major_dimension: "ROWS",
                values: vec![vec![value.to_string()]],
            })
            .send()
            .await
            .map_err(|e| SyncError::Store(format!("values.update: {}", e)))?;
        Self::check(resp, "values.update").await?;
        Ok(())
    }
}
