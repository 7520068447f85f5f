//! ステータス照会ゲートウェイ
//!
//! # 責務
//!
//! インスタンスの進行状況と完成した結果を1つの照会に統合します。
//! 判定には「ストア優先」の規則を適用します。結果ストアに完全な
//! レコードが存在すれば、エンジンの生きた状態にかかわらずその
//! インスタンスは完了として報告されます。結果ストアが真実の源であり、
//! エンジンのインスタンス表は進行中の近似にすぎません。

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{Story, WorkflowState};
use crate::store::{story_key, ResultStore};

use super::core::WorkflowEngine;

/// 照会結果
#[derive(Debug, Clone)]
pub struct StoryStatus {
    /// 報告する状態
    pub state: WorkflowState,
    /// 完成したストーリー（`Completed` のときのみ `Some`）
    pub story: Option<Story>,
    /// 失敗理由（`Failed` のときのみ `Some`）
    pub error: Option<String>,
}

/// ステータス照会ゲートウェイ
pub struct QueryGateway {
    engine: Arc<WorkflowEngine>,
    store: Arc<dyn ResultStore>,
}

impl QueryGateway {
    /// 新しいゲートウェイを生成
    pub fn new(engine: Arc<WorkflowEngine>, store: Arc<dyn ResultStore>) -> Self {
        Self { engine, store }
    }

    /// インスタンスの現況を照会する
    ///
    /// 1. 結果ストアに完全なレコードがあれば `Completed` + ストーリー
    /// 2. なければエンジンのインスタンス表の生きた状態
    /// 3. どちらにもなければ [`EngineError::UnknownInstance`]
    ///
    /// ストアの読み取り失敗は警告ログに残し、生きた状態へ切り替えます
    /// （照会はストアの一時的な不調で失敗させません）。
    pub async fn status(&self, workflow_id: &Uuid) -> Result<StoryStatus, EngineError> {
        match self.store.get(&story_key(workflow_id)).await {
            Ok(Some(stored)) => {
                return Ok(StoryStatus {
                    state: WorkflowState::Completed,
                    story: Some(stored.into()),
                    error: None,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(workflow_id = %workflow_id, error = %e, "結果ストアの照会に失敗しました");
            }
        }

        let state = self.engine.current_state(workflow_id)?;
        let error = if state == WorkflowState::Failed {
            self.engine.last_error(workflow_id)
        } else {
            None
        };
        Ok(StoryStatus { state, story: None, error })
    }
}
