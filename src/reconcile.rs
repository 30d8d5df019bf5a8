//! 重複排除と追記

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::SyncError;
use crate::traits::RecordStore;
use crate::types::{ListingRecord, StoredRow};

/// 永続化済み行の識別キー（E列）
pub fn persisted_keys(rows: &[StoredRow]) -> HashSet<String> {
    rows.iter().map(|r| r.detail_link().to_string()).collect()
}

/// 未登録のレコードだけを発見順のまま返す
///
/// 空リンクのレコード同士は重複とみなさない。永続化済みに空リンクの行が
/// あれば、空リンクのレコードはすべて登録済み扱いになる。
pub fn reconcile(
    candidates: Vec<ListingRecord>,
    persisted_keys: &HashSet<String>,
) -> Vec<ListingRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    candidates
        .into_iter()
        .filter(|record| {
            let link = record.detail_link.as_str();
            if persisted_keys.contains(link) {
                debug!("Already recorded: {:?}", link);
                return false;
            }
            link.is_empty() || seen.insert(link.to_string())
        })
        .collect()
}

/// 新規行を1回の呼び出しでまとめて追記し、追記件数を返す
pub async fn append_novel<R: RecordStore + ?Sized>(
    store: &R,
    range: &str,
    novel: &[ListingRecord],
) -> Result<usize, SyncError> {
    if novel.is_empty() {
        info!("No new records to append");
        return Ok(0);
    }
    let rows = novel.iter().map(ListingRecord::to_row).collect();
    store.append_rows(range, rows).await?;
    info!("Appended {} new records", novel.len());
    Ok(novel.len())
}
