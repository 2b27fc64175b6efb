//! jira-export: 保存済みJQLの検索結果を `;` 区切りのテキストに書き出す
//!
//! 設定は `./config`（環境変数 `JIRA_EXPORT_CONFIG_DIR` で変更可）から読み込む。
//! 行は標準出力、ログは標準エラーに出力する。

use std::process::ExitCode;

use dotenv::dotenv;
use jira_export::{
    DelimitedWriter, Error, ExportConfig, ExportSummary, FileConfigStore, JiraClient, TeeSink,
    export,
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(summary) => {
            if summary.warnings > 0 {
                tracing::warn!(
                    warnings = summary.warnings,
                    "some field values did not match their configured shape and were exported empty"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExportSummary, Error> {
    let store = FileConfigStore::from_env();
    tracing::info!(config_dir = %store.config_dir().display(), "loading configuration");

    // ネットワークに触れる前に設定の誤りを検出する
    let export_config = store.load_export_config().await?;
    let jira_config = store.load_jira_config().await?;

    let client = JiraClient::new(jira_config)?;
    let mut sink = build_sink(&export_config)?;

    export(&client, &export_config, &mut sink).await
}

fn build_sink(config: &ExportConfig) -> Result<TeeSink, Error> {
    let mut sink = TeeSink::new();
    if config.options.console {
        sink = sink.with(Box::new(DelimitedWriter::stdout()));
    }
    if let Some(path) = &config.options.output_file {
        tracing::info!(path = %path.display(), "writing export file");
        sink = sink.with(Box::new(DelimitedWriter::create(path)?));
    }
    Ok(sink)
}
