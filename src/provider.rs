//! 生成ケイパビリティ抽象化レイヤー
//!
//! # 責務
//!
//! - テキスト生成・画像生成を統一的に扱うインターフェースの提供
//! - 設定に基づいて適切なクライアントを生成するファクトリー機能
//!
//! # アーキテクチャ
//!
//! パイプラインから見える生成能力は固定のケイパビリティ集合
//! （テキスト生成・カバープロンプト生成・画像生成）です。実装の選択は
//! 実行時探索ではなく明示的な設定（[`crate::config::ProviderConfig`]）で
//! 行います。API キーは設定ファイルに書かず、環境変数経由で渡します。
//!
//! # モジュール構成
//!
//! - `traits` - 共通インターフェース（[`ChatCapability`] / [`ImageCapability`]）
//! - `prompts` - プロンプトテンプレート
//! - `openai` - OpenAI 互換 API クライアント
//!
//! # 使用例
//!
//! ```rust,no_run
//! use storyforge::config::AppConfig;
//! use storyforge::provider::{create_chat_capability, create_image_capability};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 事前に環境変数 OPENAI_API_KEY の設定が必要
//! let config = AppConfig::default();
//! let chat = create_chat_capability(&config)?;
//! let image = create_image_capability(&config)?;
//! # Ok(())
//! # }
//! ```

pub mod openai;
pub mod prompts;
pub mod traits;

// 公開APIの再エクスポート
pub use traits::{ChatCapability, ImageCapability, StoryDraft};

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::ConfigError;

/// テキスト生成ケイパビリティを生成するファクトリー関数
///
/// # エラー
///
/// - [`ConfigError::Validation`] - 設定で指定された環境変数に API キーがない
pub fn create_chat_capability(config: &AppConfig) -> Result<Arc<dyn ChatCapability>, ConfigError> {
    let api_key = load_api_key(&config.provider.api_key_env)?;
    Ok(Arc::new(openai::OpenAiChatClient::new(&config.provider, api_key)))
}

/// 画像生成ケイパビリティを生成するファクトリー関数
///
/// # エラー
///
/// - [`ConfigError::Validation`] - 設定で指定された環境変数に API キーがない
pub fn create_image_capability(config: &AppConfig) -> Result<Arc<dyn ImageCapability>, ConfigError> {
    let api_key = load_api_key(&config.provider.api_key_env)?;
    Ok(Arc::new(openai::OpenAiImageClient::new(
        &config.provider,
        &config.story.cover,
        api_key,
    )))
}

/// 環境変数から API キーを読み込む
fn load_api_key(env_name: &str) -> Result<String, ConfigError> {
    std::env::var(env_name).map_err(|_| {
        ConfigError::Validation(format!("環境変数 {env_name} に API キーが設定されていません"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_a_config_error() {
        let result = load_api_key("STORYFORGE_TEST_KEY_THAT_DOES_NOT_EXIST");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
