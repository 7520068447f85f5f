//! アプリケーション設定の読み込みと管理
//!
//! # 責務
//!
//! - TOML 形式の設定ファイルを [`AppConfig`] にデシリアライズ
//! - カバー画像の寸法・リトライポリシー・プロバイダー接続先の管理
//! - 読み込み後のバリデーション（不正値は [`ConfigError::Validation`]）
//!
//! # 設定ファイルの例
//!
//! ```toml
//! [story.cover]
//! width = 1024
//! height = 1024
//!
//! [retry]
//! max_attempts = 3
//! per_attempt_timeout_secs = 120
//! backoff_base_ms = 500
//! backoff_cap_ms = 30000
//!
//! [provider]
//! api_base = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//! chat_model = "gpt-4o"
//! image_model = "dall-e-3"
//! ```
//!
//! すべてのセクション・フィールドは省略可能で、省略時は上記と同じ
//! デフォルト値が使われます。

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// アプリケーション設定
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// ストーリー生成に関する設定
    pub story: StoryConfig,
    /// ステップ実行のリトライポリシー
    pub retry: RetryConfig,
    /// 生成ケイパビリティ（LLM・画像）の接続先
    pub provider: ProviderConfig,
}

impl AppConfig {
    /// TOML ファイルから設定を読み込む
    ///
    /// # 戻り値
    ///
    /// - `Ok(AppConfig)`: 読み込み・バリデーションに成功した場合
    /// - `Err(ConfigError)`: 読み込み・パース・バリデーションに失敗した場合
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// TOML 文字列から設定を読み込む
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// 設定値のバリデーション
    ///
    /// # エラー
    ///
    /// - リトライ回数が 0
    /// - タイムアウトが 0 秒
    /// - カバー寸法が 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts は 1 以上でなければなりません".to_string(),
            ));
        }
        if self.retry.per_attempt_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "retry.per_attempt_timeout_secs は 1 以上でなければなりません".to_string(),
            ));
        }
        if self.story.cover.width == 0 || self.story.cover.height == 0 {
            return Err(ConfigError::Validation(
                "story.cover の寸法は 1 以上でなければなりません".to_string(),
            ));
        }
        Ok(())
    }
}

/// ストーリー生成に関する設定
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// カバー画像の寸法
    pub cover: CoverConfig,
}

/// カバー画像の寸法設定
///
/// 下流の利用者に報告する寸法はここで静的に決まります。
/// 画像サービスのレスポンスには依存しません。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// 幅（ピクセル）
    pub width: u32,
    /// 高さ（ピクセル）
    pub height: u32,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self { width: 1024, height: 1024 }
    }
}

/// ステップ実行のリトライポリシー設定
///
/// デフォルトは「最大3回試行・1試行あたり2分タイムアウト・
/// 指数バックオフ（基準500ms・上限30秒）」です。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 最大試行回数（初回実行を含む）
    pub max_attempts: u32,
    /// 1試行あたりのタイムアウト（秒）
    pub per_attempt_timeout_secs: u64,
    /// 指数バックオフの基準待機時間（ミリ秒）
    pub backoff_base_ms: u64,
    /// バックオフ待機時間の上限（ミリ秒）
    pub backoff_cap_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_attempt_timeout_secs: 120,
            backoff_base_ms: 500,
            backoff_cap_ms: 30_000,
        }
    }
}

/// 生成ケイパビリティの接続先設定
///
/// API キーそのものは設定ファイルに書かず、環境変数名だけを指定します。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenAI 互換 API のベース URL
    pub api_base: String,
    /// API キーを保持する環境変数名
    pub api_key_env: String,
    /// テキスト生成に使うモデル名
    pub chat_model: String,
    /// 画像生成に使うモデル名
    pub image_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            chat_model: "gpt-4o".to_string(),
            image_model: "dall-e-3".to_string(),
        }
    }
}
