//! ワークフロー実行エンジン
//!
//! # 責務
//!
//! - ストーリー生成パイプラインの固定4ステップを順序立てて実行
//! - タイムアウトとリトライの制御（一時的/恒久的エラーの区別）
//! - 完了済みステップ出力のジャーナル記録と再開時のスキップ
//! - インスタンス表の維持と前進のみの状態遷移の強制
//! - ストア優先規則によるステータス照会
//!
//! # モジュール構成
//!
//! - [`activity`][]: タイムアウト・リトライ付きアクティビティ実行
//! - [`journal`][]: 完了済みステップ出力の記録
//! - [`pipeline`][]: 固定4ステップの逐次パイプライン
//! - [`core`][]: インスタンス表とライフサイクル管理
//! - [`query`][]: ステータス照会ゲートウェイ
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storyforge::activities::StoryActivities;
//! use storyforge::config::AppConfig;
//! use storyforge::engine::{
//!     ActivityExecutor, InMemoryStepJournal, QueryGateway, RetryPolicy, StoryPipeline,
//!     WorkflowEngine,
//! };
//! use storyforge::model::StoryParams;
//! use storyforge::provider::{create_chat_capability, create_image_capability};
//! use storyforge::store::{InMemoryResultStore, ResultStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::default();
//!     let store: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());
//!
//!     // 1. アクティビティとパイプラインを組み立てる
//!     let activities = StoryActivities::new(
//!         create_chat_capability(&config)?,
//!         create_image_capability(&config)?,
//!         Arc::clone(&store),
//!         config.story.cover.clone(),
//!     );
//!     let pipeline = StoryPipeline::new(
//!         activities,
//!         ActivityExecutor::new(RetryPolicy::from(&config.retry)),
//!         Arc::new(InMemoryStepJournal::new()),
//!     );
//!
//!     // 2. エンジンに投入する
//!     let engine = Arc::new(WorkflowEngine::new(pipeline));
//!     let workflow_id = engine.submit(StoryParams::default());
//!
//!     // 3. 進行状況を照会する
//!     let gateway = QueryGateway::new(Arc::clone(&engine), store);
//!     let status = gateway.status(&workflow_id).await?;
//!     println!("State: {:?}", status.state);
//!
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod core;
pub mod journal;
pub mod pipeline;
pub mod query;

// 公開APIの再エクスポート
pub use activity::{ActivityError, ActivityExecutor, ActivityOutcome, PermanentFailure, RetryPolicy};
pub use self::core::{InstanceRecord, WorkflowEngine};
pub use journal::{InMemoryStepJournal, StepJournal, StepRecord};
pub use pipeline::{ProgressSink, StoryPipeline};
pub use query::{QueryGateway, StoryStatus};
