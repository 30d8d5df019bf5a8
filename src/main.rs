use std::process::ExitCode;

use tower::Service;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use warning_letter_sync::config::CREDENTIALS_ENV;
use warning_letter_sync::credentials::provision_credentials;
use warning_letter_sync::{SyncConfig, SyncRequest, SyncService};

#[tokio::main]
async fn main() -> ExitCode {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SyncConfig::from_env();
    info!("Target spreadsheet: {} ({})", config.spreadsheet_id, config.sheet_name);

    // 環境変数の認証情報をファイルに書き出す
    match provision_credentials(CREDENTIALS_ENV, &config.credentials_path) {
        Ok(true) => {}
        Ok(false) => debug!("Using credentials file {:?}", config.credentials_path),
        Err(e) => {
            error!("Failed to write credentials: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let mut service = SyncService::new();
    let code = match service.call(SyncRequest::new(config)).await {
        Ok(report) => {
            info!(
                "Appended {} new letters, filled {} bodies ({} timed out, {} failed)",
                report.appended,
                report.backfill.filled,
                report.backfill.timed_out,
                report.backfill.failed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Sync failed: {}", e);
            ExitCode::FAILURE
        }
    };

    info!("All done");
    code
}
