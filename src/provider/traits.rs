//! 生成ケイパビリティの共通インターフェース定義
//!
//! # 責務
//!
//! - テキスト生成ケイパビリティ [`ChatCapability`] の定義
//! - 画像生成ケイパビリティ [`ImageCapability`] の定義
//! - プロバイダー非依存の中間型 [`StoryDraft`] の提供
//!
//! 実装の切り替えはリフレクション等の実行時探索ではなく、明示的な設定
//! （[`crate::provider::create_chat_capability`] /
//! [`crate::provider::create_image_capability`]）で行います。
//! 各ケイパビリティは同じ入力で複数回呼ばれても安全（冪等または無害な
//! 重複副作用）であることが要求されます。タイムアウトしたリモート呼び出しが
//! リトライ時点でまだ進行中である可能性があるためです。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;

/// テキスト生成の出力（ストーリー草稿）
///
/// プロバイダーの構造化出力をそのまま受けるワイヤ形式です。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryDraft {
    /// ストーリーのタイトル
    pub story_title: String,
    /// ストーリー本文
    pub story_text: String,
}

/// テキスト生成ケイパビリティ
///
/// # 実装要件
///
/// - `Send + Sync`: 複数のワークフローインスタンスから並行に呼ばれます
/// - 一時的エラー（ネットワーク・レート制限）とレスポンス形式の不備を
///   [`CapabilityError`] で区別して返すこと
#[async_trait]
pub trait ChatCapability: Send + Sync {
    /// ストーリー草稿を生成する
    ///
    /// # 引数
    ///
    /// - `character_name`: 主人公の名前
    /// - `fear`: 克服すべき恐怖
    /// - `language`: 物語を書く言語
    async fn generate_story(
        &self,
        character_name: &str,
        fear: &str,
        language: &str,
    ) -> Result<StoryDraft, CapabilityError>;

    /// ストーリー本文からカバー画像用プロンプトを生成する
    ///
    /// 生成されるプロンプトは物語の言語にかかわらず常に英語です
    /// （下流の画像生成の精度を最大化するため）。
    ///
    /// # 引数
    ///
    /// - `story_content`: ストーリー本文
    /// - `language`: 本文が書かれている言語
    async fn generate_cover_prompt(
        &self,
        story_content: &str,
        language: &str,
    ) -> Result<String, CapabilityError>;
}

/// 画像生成ケイパビリティ
#[async_trait]
pub trait ImageCapability: Send + Sync {
    /// プロンプトから画像を生成し、URL を返す
    async fn generate_image(&self, prompt: &str) -> Result<String, CapabilityError>;
}
