//! ドメインモデルの定義
//!
//! # 責務
//!
//! - ストーリー生成パイプラインの入力 [`StoryParams`] と成果物 [`Story`] / [`StoryCover`] の型定義
//! - ワークフローの進行状態 [`WorkflowState`] の型定義
//!
//! # 状態遷移
//!
//! ワークフローの状態は次の全順序に沿って前進のみします（後退はしません）。
//!
//! ```text
//! Idle → Initializing → GeneratingStory → PreparingCover
//!      → GeneratingCover → SavingResults → Completed
//! ```
//!
//! `Failed` は任意の非終端状態から到達しうるもう一つの終端状態です。
//! 終端状態（`Completed` / `Failed`）に入った後の遷移はありません。

use serde::{Deserialize, Serialize};

/// ストーリー生成の入力パラメーター
///
/// 未指定時のデフォルトは「John が Night（夜の暗闇）を英語の物語で克服する」です。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryParams {
    /// 主人公の名前
    pub character_name: String,
    /// 克服すべき恐怖
    pub fear: String,
    /// 物語を書く言語
    pub language: String,
}

impl Default for StoryParams {
    fn default() -> Self {
        Self {
            character_name: "John".to_string(),
            fear: "Night".to_string(),
            language: "English".to_string(),
        }
    }
}

/// 生成されたストーリー
///
/// 段階的に組み立てられます。ステップ1完了時点ではテキストのみ
/// （`cover` は `None`）、ステップ3完了後にカバー画像が添付され、
/// ステップ4で結果ストアに永続化されてはじめて「完成」とみなされます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    /// タイトル
    pub title: String,
    /// 本文
    pub content: String,
    /// カバー画像（生成前は `None`）
    pub cover: Option<StoryCover>,
}

/// カバー画像
///
/// 一度生成された後は不変です。幅と高さは画像サービスのレスポンスではなく
/// 静的設定（[`CoverConfig`](crate::config::CoverConfig)）から決まります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryCover {
    /// 画像 URL
    pub url: String,
    /// 幅（ピクセル）
    pub width: u32,
    /// 高さ（ピクセル）
    pub height: u32,
}

/// ワークフローインスタンスの進行状態
///
/// 変数の宣言順がそのまま全順序になっており、`Ord` による比較で
/// 「前進のみ」の不変条件を検査できます。`Failed` は順序上の最大値で、
/// 任意の非終端状態からの遷移を許します。
///
/// # 例
///
/// ```rust
/// use storyforge::model::WorkflowState;
///
/// assert!(WorkflowState::Initializing < WorkflowState::GeneratingStory);
/// assert!(WorkflowState::SavingResults < WorkflowState::Completed);
/// assert!(WorkflowState::Completed.is_terminal());
/// assert!(!WorkflowState::GeneratingCover.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    /// 未投入（論理上の初期値。エンジンに投入された時点で `Initializing` になる）
    Idle,
    /// 投入済み・ステップ1開始前
    Initializing,
    /// ステップ1: ストーリー本文を生成中
    GeneratingStory,
    /// ステップ2: カバー画像用プロンプトを生成中
    PreparingCover,
    /// ステップ3: カバー画像を生成中
    GeneratingCover,
    /// ステップ4: 結果ストアへ保存中
    SavingResults,
    /// 正常終了（結果ストアに永続化済み）
    Completed,
    /// 異常終了（リトライ予算の枯渇または恒久的エラー）
    Failed,
}

impl WorkflowState {
    /// 終端状態（`Completed` / `Failed`）かどうか
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}
