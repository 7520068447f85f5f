//! storyforge CLI エントリーポイント
//!
//! # 責務
//!
//! - コマンドライン引数の解釈（[`clap`]）
//! - ロギングの初期化（`logs/` への日次ローテーションファイル）
//! - ワークフローエンジンの組み立てと1インスタンスの駆動
//!
//! このバイナリは1回の実行で1つのストーリーを生成します。インスタンスの
//! 進行はプロセス内で完結するため、`status` のような独立した照会
//! サブコマンドは提供しません（別プロセスから見えるのは結果ストアの
//! レコードだけです）。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use storyforge::activities::StoryActivities;
use storyforge::config::AppConfig;
use storyforge::engine::{
    ActivityExecutor, InMemoryStepJournal, QueryGateway, RetryPolicy, StoryPipeline,
    WorkflowEngine,
};
use storyforge::model::{StoryParams, WorkflowState};
use storyforge::provider::{create_chat_capability, create_image_capability};
use storyforge::store::{InMemoryResultStore, ResultStore};

/// ステータス照会のポーリング間隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "storyforge", about = "子ども向けストーリー生成ワークフローエンジン")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// ストーリーを1本生成する
    Generate {
        /// 主人公の名前
        #[arg(long, default_value = "John")]
        character_name: String,

        /// 克服すべき恐怖
        #[arg(long, default_value = "Night")]
        fear: String,

        /// 物語を書く言語
        #[arg(long, default_value = "English")]
        language: String,

        /// 設定ファイルのパス（存在しない場合はデフォルト設定で動く）
        #[arg(long, default_value = "storyforge.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let file_appender = tracing_appender::rolling::daily("logs", "storyforge.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .json()
        .with_writer(file_writer)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate { character_name, fear, language, config } => {
            let config = load_config(&config)?;
            let params = StoryParams { character_name, fear, language };
            generate(config, params).await
        }
    }
}

/// 設定ファイルを読み込む（無ければデフォルト設定）
fn load_config(path: &PathBuf) -> Result<AppConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(AppConfig::from_file(path)?)
    } else {
        info!(path = %path.display(), "設定ファイルが無いためデフォルト設定を使います");
        Ok(AppConfig::default())
    }
}

/// エンジンを組み立てて1インスタンスを駆動し、完了まで追跡する
async fn generate(
    config: AppConfig,
    params: StoryParams,
) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());

    let activities = StoryActivities::new(
        create_chat_capability(&config)?,
        create_image_capability(&config)?,
        Arc::clone(&store),
        config.story.cover.clone(),
    );
    let pipeline = StoryPipeline::new(
        activities,
        ActivityExecutor::new(RetryPolicy::from(&config.retry)),
        Arc::new(InMemoryStepJournal::new()),
    );
    let engine = Arc::new(WorkflowEngine::new(pipeline));
    let gateway = QueryGateway::new(Arc::clone(&engine), store);

    let workflow_id = engine.submit(params);
    println!("workflow: {workflow_id}");

    let mut last_state = None;
    loop {
        let status = gateway.status(&workflow_id).await?;
        if last_state != Some(status.state) {
            println!("state: {}", serde_json::to_string(&status.state)?);
            last_state = Some(status.state);
        }

        match status.state {
            WorkflowState::Completed => {
                if let Some(story) = status.story {
                    println!("{}", serde_json::to_string_pretty(&story)?);
                }
                return Ok(());
            }
            WorkflowState::Failed => {
                let reason = status.error.unwrap_or_else(|| "原因不明".to_string());
                return Err(format!("ワークフローが失敗しました: {reason}").into());
            }
            _ => tokio::time::sleep(POLL_INTERVAL).await,
        }
    }
}
