//! ステップジャーナル（完了済みステップ出力の永続記録）
//!
//! # 責務
//!
//! ワークフローインスタンスごとに、完了した各ステップの出力を
//! ステップ番号をキーとして記録します。パイプラインは各ステップの
//! 実行前にジャーナルを参照し、記録済みのステップは副作用を再実行せず
//! 記録された出力をそのまま採用します。これにより、中断したインスタンスを
//! 再開しても完了済みステップの外部呼び出しが二重に走りません。
//!
//! 「ステップ実行の完了」と「ジャーナルへの記録」の間には原理的に
//! 隙間があります。その隙間で停止したインスタンスを再開すると該当
//! ステップだけが再実行されますが、各アクティビティは重複実行に耐える
//! 契約なのでこれは安全です。
//!
//! # 主要な型
//!
//! - [`StepJournal`]: 記録・参照インターフェース
//! - [`InMemoryStepJournal`]: プロセス内実装（テストと単一プロセス運用向け）

use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

/// ジャーナルに記録された1ステップ分のエントリー
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// ステップ名（診断用。参照時の照合キーには使わない）
    pub step_name: String,
    /// ステップ出力のシリアライズ結果
    pub payload: Value,
}

/// ステップジャーナルのインターフェース
///
/// 同一の `(workflow_id, step_index)` への記録は上書きで、
/// 最後の書き込みが残ります。
pub trait StepJournal: Send + Sync {
    /// 完了したステップの出力を記録する
    fn record(&self, workflow_id: Uuid, step_index: u32, step_name: &str, payload: Value);

    /// 記録済みのステップ出力を参照する
    fn lookup(&self, workflow_id: Uuid, step_index: u32) -> Option<StepRecord>;
}

/// プロセス内ステップジャーナル
///
/// インスタンスへの書き込みはそのインスタンスを駆動する単一のタスクだけが
/// 行うため、エントリー単位のロックで十分です。
#[derive(Default)]
pub struct InMemoryStepJournal {
    inner: DashMap<(Uuid, u32), StepRecord>,
}

impl InMemoryStepJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StepJournal for InMemoryStepJournal {
    fn record(&self, workflow_id: Uuid, step_index: u32, step_name: &str, payload: Value) {
        self.inner.insert(
            (workflow_id, step_index),
            StepRecord { step_name: step_name.to_string(), payload },
        );
    }

    fn lookup(&self, workflow_id: Uuid, step_index: u32) -> Option<StepRecord> {
        self.inner.get(&(workflow_id, step_index)).map(|entry| entry.clone())
    }
}
