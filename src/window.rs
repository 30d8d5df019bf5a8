//! 再開日付と検索期間
//!
//! 永続化済みの掲載日だけから今回の開始日を決め、一覧の掲載日セルと
//! 文字列一致で照合する日付集合を作る。一覧は掲載日を `MM/DD/YYYY` の
//! 固定書式でしか表示しないため、行ごとの日付解析はしない。上流の書式が
//! 変わるとすべての行が期間外と判定される点に注意。

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::error::SyncError;
use crate::types::StoredRow;

/// 境界付近で遅れて掲載された行を拾うための重複日数
pub const OVERLAP_DAYS: u64 = 2;
/// 一覧の掲載日書式
pub const WINDOW_DATE_FORMAT: &str = "%m/%d/%Y";

const ACCEPTED_FORMATS: [&str; 2] = ["%B %d, %Y", WINDOW_DATE_FORMAT];

/// 掲載日文字列を解析（"January 10, 2024" または "01/10/2024"）
pub fn parse_posted_date(text: &str) -> Result<NaiveDate, SyncError> {
    let trimmed = text.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| SyncError::DateParse(text.to_string()))
}

/// 今回の開始日を計算
///
/// 永続化済みの最新掲載日があればその2日前、なければ `today - 365 × years` 日。
/// 未来日付が保存されていても開始日は今日を超えない。
pub fn compute_start_date(
    last_persisted: Option<&str>,
    today: NaiveDate,
    look_back_years: u32,
) -> Result<NaiveDate, SyncError> {
    let start = match last_persisted {
        Some(text) => {
            let last = parse_posted_date(text)?;
            last.checked_sub_days(Days::new(OVERLAP_DAYS))
                .ok_or_else(|| SyncError::DateParse(text.to_string()))?
        }
        None => today
            .checked_sub_days(Days::new(365 * u64::from(look_back_years)))
            .unwrap_or(NaiveDate::MIN),
    };
    Ok(start.min(today))
}

/// A列を全件走査して最新の掲載日文字列を返す
///
/// 追記は発見順で並べ替えないため、2行目が最新とは限らない。
/// 空セルは無視し、解析できないセルがあればエラー。
pub fn latest_posted_date(rows: &[StoredRow]) -> Result<Option<&str>, SyncError> {
    let mut latest: Option<(NaiveDate, &str)> = None;
    for row in rows {
        let text = row.posted_date();
        if text.trim().is_empty() {
            continue;
        }
        let date = parse_posted_date(text).map_err(|e| {
            debug!("Unparseable posted date at row {}: {:?}", row.row_number, text);
            e
        })?;
        if latest.map_or(true, |(d, _)| date > d) {
            latest = Some((date, text));
        }
    }
    Ok(latest.map(|(_, text)| text))
}

/// `[start, end]` の各日を `MM/DD/YYYY` にした集合
#[derive(Debug, Clone)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
    dates: HashSet<String>,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        let dates = start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|d| d.format(WINDOW_DATE_FORMAT).to_string())
            .collect();
        Self { start, end, dates }
    }

    /// 掲載日セルのテキストが期間内か
    pub fn contains(&self, posted_date: &str) -> bool {
        self.dates.contains(posted_date.trim())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
