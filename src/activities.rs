//! ストーリー生成アクティビティの実装
//!
//! # 責務
//!
//! パイプラインの各ステップが呼び出す4つの副作用つき操作を提供します。
//!
//! - [`StoryActivities::generate_story`]: ストーリー本文の生成
//! - [`StoryActivities::generate_cover_prompt`]: カバー画像用プロンプトの生成
//! - [`StoryActivities::generate_cover`]: カバー画像の生成
//! - [`StoryActivities::save_story`]: 結果ストアへの保存
//!
//! 各操作は外部サービスの呼び出しそのものだけを担い、インスタンスの状態は
//! 一切変更しません（「呼び出しが成功したか」と「パイプラインが前進したか」の
//! 分離はエンジン側の責務です）。リトライによって同じ入力で複数回呼ばれる
//! 可能性があるため、どの操作も重複実行に耐える必要があります。画像の
//! 二重生成は無害な重複として受容し、保存は結果ストアの上書き冪等性に
//! 依存します。

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::config::CoverConfig;
use crate::error::{CapabilityError, StoreError};
use crate::model::{Story, StoryCover, StoryParams};
use crate::provider::{prompts, ChatCapability, ImageCapability};
use crate::store::{story_key, ResultStore, StoredStory};

/// ストーリー生成アクティビティ
///
/// 生成ケイパビリティと結果ストアへのハンドルを束ね、パイプラインの
/// ステップから呼び出される操作を提供します。
pub struct StoryActivities {
    chat: Arc<dyn ChatCapability>,
    image: Arc<dyn ImageCapability>,
    store: Arc<dyn ResultStore>,
    cover: CoverConfig,
}

impl StoryActivities {
    /// 新しいアクティビティ群を生成
    ///
    /// # 引数
    ///
    /// - `chat`: テキスト生成ケイパビリティ
    /// - `image`: 画像生成ケイパビリティ
    /// - `store`: 結果ストア
    /// - `cover`: カバー画像の寸法設定
    pub fn new(
        chat: Arc<dyn ChatCapability>,
        image: Arc<dyn ImageCapability>,
        store: Arc<dyn ResultStore>,
        cover: CoverConfig,
    ) -> Self {
        Self { chat, image, store, cover }
    }

    /// ステップ1: ストーリー本文を生成する
    ///
    /// 指定された言語で三幕構成の物語を生成します。カバーは未添付
    /// （`cover = None`）のまま返します。
    pub async fn generate_story(&self, params: &StoryParams) -> Result<Story, CapabilityError> {
        info!(
            character_name = %params.character_name,
            fear = %params.fear,
            language = %params.language,
            "ストーリーを生成します"
        );

        let draft = self
            .chat
            .generate_story(&params.character_name, &params.fear, &params.language)
            .await?;

        Ok(Story {
            title: draft.story_title,
            content: draft.story_text,
            cover: None,
        })
    }

    /// ステップ2: カバー画像用プロンプトを生成する
    ///
    /// 物語の言語にかかわらず常に英語のプロンプトを生成します。
    /// 出力は改行を含まない単一の連続した段落に正規化されます。
    pub async fn generate_cover_prompt(
        &self,
        story: &Story,
        language: &str,
    ) -> Result<String, CapabilityError> {
        info!(title = %story.title, language = %language, "カバープロンプトを生成します");

        let raw = self.chat.generate_cover_prompt(&story.content, language).await?;

        // 構造的マークアップの残骸（改行・連続空白）を単一段落に正規化する
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return Err(CapabilityError::InvalidResponse(
                "カバープロンプトが空です".to_string(),
            ));
        }
        Ok(normalized)
    }

    /// ステップ3: カバー画像を生成する
    ///
    /// プロンプトをスタイル指示テンプレートで包んで画像サービスに渡します。
    /// 返すカバーの寸法は静的設定から決まります（画像サービスの応答には
    /// 依存しません）。
    pub async fn generate_cover(&self, cover_prompt: &str) -> Result<StoryCover, CapabilityError> {
        info!(prompt = %cover_prompt, "カバー画像を生成します");

        let url = self.image.generate_image(&prompts::image_prompt(cover_prompt)).await?;

        Ok(StoryCover {
            url,
            width: self.cover.width,
            height: self.cover.height,
        })
    }

    /// ステップ4: 完成したストーリーを結果ストアへ保存する
    ///
    /// ワークフローの公開識別子をキーに使います。書き込みは結果ストアの
    /// 契約により上書き冪等です。
    ///
    /// # エラー
    ///
    /// - [`StoreError::IncompleteStory`] - カバー画像が未添付
    /// - [`StoreError::Unavailable`] - ストアへの書き込み失敗
    pub async fn save_story(&self, workflow_id: &Uuid, story: &Story) -> Result<(), StoreError> {
        info!(workflow_id = %workflow_id, title = %story.title, "ストーリーを保存します");

        let fields = StoredStory::from_story(story)?;
        self.store.put(&story_key(workflow_id), &fields).await
    }
}
