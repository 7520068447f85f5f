//! OpenAI 互換 API クライアント
//!
//! # 責務
//!
//! - Chat Completions API を使った [`ChatCapability`] の実装
//! - Images API を使った [`ImageCapability`] の実装
//! - HTTP ステータス・通信エラーから [`CapabilityError`] への変換
//!
//! # エラー分類
//!
//! - 通信エラー・タイムアウト → [`CapabilityError::Http`]（一時的）
//! - 429 → [`CapabilityError::RateLimitExceeded`]（一時的）
//! - 5xx → [`CapabilityError::ApiStatus`]（一時的）
//! - その他の 4xx → [`CapabilityError::ApiStatus`]（恒久的）
//! - JSON パース失敗・フィールド欠落 → [`CapabilityError::InvalidResponse`]（恒久的）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{CoverConfig, ProviderConfig};
use crate::error::CapabilityError;

use super::prompts;
use super::traits::{ChatCapability, ImageCapability, StoryDraft};

/// エラー表示用に保持するレスポンスボディの最大長
const ERROR_BODY_LIMIT: usize = 512;

/// OpenAI 互換の Chat Completions クライアント
pub struct OpenAiChatClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    /// 新しいチャットクライアントを生成
    ///
    /// # 引数
    ///
    /// - `config`: プロバイダー接続先設定
    /// - `api_key`: 認証に使う API キー
    pub fn new(config: &ProviderConfig, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.chat_model.clone(),
        }
    }

    /// Chat Completions を1回呼び出し、アシスタントのメッセージ本文を返す
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, CapabilityError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "response_format": { "type": "json_object" },
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let completion: ChatCompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(format!("Chat Completions の JSON パースに失敗: {e}")))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::InvalidResponse("choices が空です".to_string()))?;
        Ok(choice.message.content)
    }
}

#[async_trait]
impl ChatCapability for OpenAiChatClient {
    async fn generate_story(
        &self,
        character_name: &str,
        fear: &str,
        language: &str,
    ) -> Result<StoryDraft, CapabilityError> {
        let content = self
            .complete(
                &prompts::story_system_prompt(language),
                &prompts::story_user_prompt(character_name, fear, language),
            )
            .await?;

        serde_json::from_str(&content).map_err(|e| {
            CapabilityError::InvalidResponse(format!("ストーリー草稿の構造化出力をパースできません: {e}"))
        })
    }

    async fn generate_cover_prompt(
        &self,
        story_content: &str,
        language: &str,
    ) -> Result<String, CapabilityError> {
        let content = self
            .complete(
                &prompts::cover_prompt_system_prompt(),
                &prompts::cover_prompt_user_prompt(story_content, language),
            )
            .await?;

        let parsed: CoverPromptResponse = serde_json::from_str(&content).map_err(|e| {
            CapabilityError::InvalidResponse(format!("カバープロンプトの構造化出力をパースできません: {e}"))
        })?;
        Ok(parsed.prompt)
    }
}

/// OpenAI 互換の Images クライアント
///
/// リクエストに渡す画像サイズは静的設定（[`CoverConfig`]）から決まります。
pub struct OpenAiImageClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    size: String,
}

impl OpenAiImageClient {
    /// 新しい画像クライアントを生成
    pub fn new(config: &ProviderConfig, cover: &CoverConfig, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.image_model.clone(),
            size: format!("{}x{}", cover.width, cover.height),
        }
    }
}

#[async_trait]
impl ImageCapability for OpenAiImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<String, CapabilityError> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": self.size,
        });

        let response = self
            .http
            .post(format!("{}/images/generations", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let generation: ImageGenerationResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(format!("Images API の JSON パースに失敗: {e}")))?;

        let image = generation
            .data
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::InvalidResponse("data が空です".to_string()))?;
        Ok(image.url)
    }
}

/// HTTP ステータスを検査し、エラーなら [`CapabilityError`] に変換する
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CapabilityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 429 {
        return Err(CapabilityError::RateLimitExceeded);
    }

    let mut body = response.text().await.unwrap_or_default();
    body.truncate(ERROR_BODY_LIMIT);
    Err(CapabilityError::ApiStatus { status: status.as_u16(), body })
}

/// Chat Completions のレスポンス形式（必要な部分のみ）
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize, Serialize)]
struct ChatMessage {
    content: String,
}

/// カバープロンプトの構造化出力形式
#[derive(Debug, Deserialize)]
struct CoverPromptResponse {
    prompt: String,
}

/// Images API のレスポンス形式（必要な部分のみ）
#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: String,
}
