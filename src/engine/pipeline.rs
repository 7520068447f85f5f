//! ストーリー生成パイプライン（固定4ステップの逐次実行）
//!
//! # 責務
//!
//! 1つのワークフローインスタンスについて、決められた順序のステップ列を
//! 逐次実行します。
//!
//! 1. `generate-story` - ストーリー本文の生成
//! 2. `generate-cover-prompt` - カバー画像用プロンプトの生成
//! 3. `generate-cover` - カバー画像の生成
//! 4. `save-story` - 結果ストアへの保存
//!
//! 各ステップは [`ActivityExecutor`] を通して実行され、完了した出力は
//! [`StepJournal`] に記録されます。記録済みのステップは再実行されず、
//! 記録された出力がそのまま使われます。ステップの実行前には
//! [`ProgressSink`] 経由で対応する状態遷移が通知されます
//! （終端状態への遷移は呼び出し側であるエンジンの責務です）。
//!
//! ステップ内では並行実行を行いません。各ステップは直前のステップの
//! 出力に依存するため、順序はそのままデータ依存を表しています。

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activities::StoryActivities;
use crate::model::{Story, StoryParams, WorkflowState};

use super::activity::{ActivityError, ActivityExecutor, PermanentFailure};
use super::journal::StepJournal;

/// インスタンスの状態遷移を受け取るシンク
///
/// パイプラインはインスタンス表を直接知らず、遷移をこのシンクに
/// 通知するだけです。
pub trait ProgressSink: Send + Sync {
    /// 次の状態への遷移を通知する
    fn transition(&self, state: WorkflowState);
}

/// ストーリー生成パイプライン
pub struct StoryPipeline {
    activities: StoryActivities,
    executor: ActivityExecutor,
    journal: Arc<dyn StepJournal>,
}

impl StoryPipeline {
    /// 新しいパイプラインを生成
    pub fn new(
        activities: StoryActivities,
        executor: ActivityExecutor,
        journal: Arc<dyn StepJournal>,
    ) -> Self {
        Self { activities, executor, journal }
    }

    /// パイプライン全体を駆動し、完成したストーリーを返す
    ///
    /// 失敗した場合、どのステップで失敗したかは [`PermanentFailure`] が
    /// 保持しています。途中まで完了したステップの出力はジャーナルに
    /// 残っているため、同じ `workflow_id` で再度呼び出すと続きから
    /// 実行されます。
    pub async fn run(
        &self,
        workflow_id: Uuid,
        params: &StoryParams,
        progress: &dyn ProgressSink,
    ) -> Result<Story, PermanentFailure> {
        let activities = &self.activities;

        progress.transition(WorkflowState::GeneratingStory);
        let mut story: Story = self
            .run_step(workflow_id, 0, "generate-story", || async move {
                let story = activities
                    .generate_story(params)
                    .await
                    .map_err(ActivityError::from_capability)?;
                validate_draft(&story)?;
                Ok(story)
            })
            .await?;

        progress.transition(WorkflowState::PreparingCover);
        let story_ref = &story;
        let language = params.language.as_str();
        let cover_prompt: String = self
            .run_step(workflow_id, 1, "generate-cover-prompt", || async move {
                activities
                    .generate_cover_prompt(story_ref, language)
                    .await
                    .map_err(ActivityError::from_capability)
            })
            .await?;

        progress.transition(WorkflowState::GeneratingCover);
        let prompt = cover_prompt.as_str();
        let cover = self
            .run_step(workflow_id, 2, "generate-cover", || async move {
                activities
                    .generate_cover(prompt)
                    .await
                    .map_err(ActivityError::from_capability)
            })
            .await?;
        story.cover = Some(cover);

        progress.transition(WorkflowState::SavingResults);
        let story_ref = &story;
        self.run_step(workflow_id, 3, "save-story", || async move {
            activities.save_story(&workflow_id, story_ref).await.map_err(|e| match e {
                crate::error::StoreError::IncompleteStory => {
                    ActivityError::Permanent(e.to_string())
                }
                crate::error::StoreError::Unavailable(_) => {
                    ActivityError::Transient(e.to_string())
                }
            })
        })
        .await?;

        info!(workflow_id = %workflow_id, title = %story.title, "パイプラインが完了しました");
        Ok(story)
    }

    /// 1ステップをジャーナル参照つきで実行する
    ///
    /// 記録済みの出力が復元できればステップ本体は呼ばず、その出力を
    /// 返します。復元できない記録（形式の変わった古いエントリー等）は
    /// 警告して捨て、ステップを再実行します。
    async fn run_step<T, F, Fut>(
        &self,
        workflow_id: Uuid,
        step_index: u32,
        step_name: &str,
        op: F,
    ) -> Result<T, PermanentFailure>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ActivityError>>,
    {
        if let Some(record) = self.journal.lookup(workflow_id, step_index) {
            match serde_json::from_value::<T>(record.payload) {
                Ok(output) => {
                    debug!(
                        workflow_id = %workflow_id,
                        step = step_name,
                        "記録済みステップをスキップします"
                    );
                    return Ok(output);
                }
                Err(e) => {
                    warn!(
                        workflow_id = %workflow_id,
                        step = step_name,
                        error = %e,
                        "ジャーナル記録を復元できないため再実行します"
                    );
                }
            }
        }

        let outcome = self.executor.execute(step_name, op).await?;

        match serde_json::to_value(&outcome.output) {
            Ok(payload) => self.journal.record(workflow_id, step_index, step_name, payload),
            Err(e) => {
                // 記録に失敗しても前進は継続する（再開時にこのステップだけ再実行される）
                warn!(
                    workflow_id = %workflow_id,
                    step = step_name,
                    error = %e,
                    "ステップ出力をジャーナルに記録できませんでした"
                );
            }
        }

        Ok(outcome.output)
    }
}

/// 生成されたストーリー草稿の形を検査する
///
/// タイトルまたは本文が空の草稿は再試行しても直らないため恒久的エラーです。
fn validate_draft(story: &Story) -> Result<(), ActivityError> {
    if story.title.trim().is_empty() {
        return Err(ActivityError::Permanent("生成されたタイトルが空です".to_string()));
    }
    if story.content.trim().is_empty() {
        return Err(ActivityError::Permanent("生成された本文が空です".to_string()));
    }
    Ok(())
}
