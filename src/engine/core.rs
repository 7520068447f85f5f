//! ワークフローエンジン（インスタンス表とライフサイクル管理）
//!
//! # 責務
//!
//! - インスタンスの受付（識別子の採番と駆動タスクの起動）
//! - インスタンス表の維持と現在状態の照会
//! - 前進のみの状態遷移規則の強制
//! - 中断したインスタンスの再開
//!
//! # 並行性モデル
//!
//! インスタンスは受付ごとに1つの tokio タスクで駆動されます。タスク内の
//! ステップは厳密に逐次ですが、インスタンス同士は完全に独立して並行に
//! 進みます。インスタンス表は [`DashMap`] で、キー単位の短いロックのみを
//! 使います。ロックを `.await` をまたいで保持することはありません。
//!
//! # 遷移規則
//!
//! 状態は宣言順がそのまま前進の全順序です。終端状態
//! （`Completed` / `Failed`）に達したインスタンスは二度と遷移しません。
//! 後退や同一状態への遷移の要求は黙って無視されます（遅れて届いた
//! 通知が先行した状態を巻き戻さないため）。

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::model::{StoryParams, WorkflowState};

use super::pipeline::{ProgressSink, StoryPipeline};
use crate::error::EngineError;

/// インスタンス表の1エントリー
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    /// 現在の状態
    pub state: WorkflowState,
    /// 失敗時の最終エラー（`Failed` でのみ `Some`）
    pub last_error: Option<String>,
    /// 駆動タスクが実行中かどうか
    ///
    /// 1インスタンスにつき駆動タスクは常に高々1つです。このフラグの
    /// 検査と設定はエントリーロックの中で行われます。
    pub driving: bool,
}

/// ワークフローエンジン
///
/// # 使用例
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use storyforge::activities::StoryActivities;
/// # use storyforge::engine::{ActivityExecutor, InMemoryStepJournal, RetryPolicy,
/// #     StoryPipeline, WorkflowEngine};
/// # use storyforge::model::StoryParams;
/// # fn demo(activities: StoryActivities) {
/// let pipeline = StoryPipeline::new(
///     activities,
///     ActivityExecutor::new(RetryPolicy::default()),
///     Arc::new(InMemoryStepJournal::new()),
/// );
/// let engine = Arc::new(WorkflowEngine::new(pipeline));
/// let workflow_id = engine.submit(StoryParams::default());
/// # let _ = workflow_id;
/// # }
/// ```
pub struct WorkflowEngine {
    instances: DashMap<Uuid, InstanceRecord>,
    pipeline: StoryPipeline,
}

impl WorkflowEngine {
    /// 新しいエンジンを生成
    pub fn new(pipeline: StoryPipeline) -> Self {
        Self { instances: DashMap::new(), pipeline }
    }

    /// 新しいインスタンスを受け付ける
    ///
    /// 識別子を採番してインスタンス表に登録し、駆動タスクを起動して
    /// 即座に識別子を返します。完了は待ちません。
    pub fn submit(self: &Arc<Self>, params: StoryParams) -> Uuid {
        let workflow_id = Uuid::new_v4();
        self.instances.insert(
            workflow_id,
            InstanceRecord {
                state: WorkflowState::Initializing,
                last_error: None,
                driving: true,
            },
        );
        info!(workflow_id = %workflow_id, "ワークフローを受け付けました");

        self.spawn_drive(workflow_id, params);
        workflow_id
    }

    /// 中断したインスタンスを再開する
    ///
    /// 既知の識別子なら状態を残したまま、未知の識別子なら
    /// `Initializing` で登録した上で駆動タスクを起動します。
    /// 完了済みステップはジャーナルによりスキップされます。
    /// 終端状態のインスタンスと、駆動タスクがまだ実行中のインスタンスに
    /// 対しては何もしません（同一インスタンスのステップが並列に走ることは
    /// ありません）。
    pub fn resume(self: &Arc<Self>, workflow_id: Uuid, params: StoryParams) {
        let mut record = self
            .instances
            .entry(workflow_id)
            .or_insert_with(|| InstanceRecord {
                state: WorkflowState::Initializing,
                last_error: None,
                driving: false,
            });
        if record.state.is_terminal() {
            info!(workflow_id = %workflow_id, state = ?record.state, "終端状態のため再開しません");
            return;
        }
        if record.driving {
            info!(workflow_id = %workflow_id, "駆動タスクが実行中のため再開しません");
            return;
        }
        record.driving = true;
        drop(record);

        info!(workflow_id = %workflow_id, "ワークフローを再開します");
        self.spawn_drive(workflow_id, params);
    }

    /// インスタンスの現在状態を返す
    pub fn current_state(&self, workflow_id: &Uuid) -> Result<WorkflowState, EngineError> {
        self.instances
            .get(workflow_id)
            .map(|record| record.state)
            .ok_or(EngineError::UnknownInstance(*workflow_id))
    }

    /// インスタンスの失敗理由を返す（`Failed` 以外では `None`）
    pub fn last_error(&self, workflow_id: &Uuid) -> Option<String> {
        self.instances
            .get(workflow_id)
            .and_then(|record| record.last_error.clone())
    }

    /// 駆動タスクを起動する
    fn spawn_drive(self: &Arc<Self>, workflow_id: Uuid, params: StoryParams) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.drive(workflow_id, params).await;
        });
    }

    /// パイプラインを最後まで（または失敗まで）駆動する
    async fn drive(self: Arc<Self>, workflow_id: Uuid, params: StoryParams) {
        let progress = EngineProgress { engine: self.as_ref(), workflow_id };

        match self.pipeline.run(workflow_id, &params, &progress).await {
            Ok(story) => {
                self.transition(workflow_id, WorkflowState::Completed);
                info!(workflow_id = %workflow_id, title = %story.title, "ワークフローが完了しました");
            }
            Err(failure) => {
                error!(
                    workflow_id = %workflow_id,
                    activity = %failure.activity,
                    attempts = failure.attempts,
                    error = %failure.last_error,
                    "ワークフローが失敗しました"
                );
                self.fail(workflow_id, failure.to_string());
            }
        }

        if let Some(mut record) = self.instances.get_mut(&workflow_id) {
            record.driving = false;
        }
    }

    /// 前進のみの遷移を適用する
    ///
    /// 終端状態からの遷移と後退はどちらも無視されます。
    fn transition(&self, workflow_id: Uuid, next: WorkflowState) {
        let Some(mut record) = self.instances.get_mut(&workflow_id) else {
            warn!(workflow_id = %workflow_id, "未登録インスタンスへの遷移要求を無視します");
            return;
        };
        if record.state.is_terminal() || next <= record.state {
            return;
        }
        info!(workflow_id = %workflow_id, from = ?record.state, to = ?next, "状態を遷移します");
        record.state = next;
    }

    /// インスタンスを失敗として確定する
    fn fail(&self, workflow_id: Uuid, reason: String) {
        let Some(mut record) = self.instances.get_mut(&workflow_id) else {
            return;
        };
        if record.state.is_terminal() {
            return;
        }
        record.state = WorkflowState::Failed;
        record.last_error = Some(reason);
    }
}

/// エンジンのインスタンス表へ遷移を反映するシンク
struct EngineProgress<'a> {
    engine: &'a WorkflowEngine,
    workflow_id: Uuid,
}

impl ProgressSink for EngineProgress<'_> {
    fn transition(&self, state: WorkflowState) {
        self.engine.transition(self.workflow_id, state);
    }
}
