//! エラー型の定義
//!
//! このモジュールは、storyforge 全体で使用されるエラー型を定義します。

use thiserror::Error;
use uuid::Uuid;

/// 設定関連のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ファイルの読み込みに失敗
    #[error("設定ファイルの読み込みに失敗しました: {0}")]
    FileRead(#[from] std::io::Error),

    /// TOML のデシリアライズに失敗
    #[error("TOML のデシリアライズに失敗しました: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// バリデーションエラー
    #[error("設定のバリデーションに失敗しました: {0}")]
    Validation(String),
}

/// 生成ケイパビリティ（テキスト生成・画像生成）のエラー
///
/// リトライ可能かどうかは [`CapabilityError::is_transient`] で判定します。
/// ネットワーク障害・タイムアウト・レート制限は一時的エラーとして扱われ、
/// レスポンス形式の不備は恒久的エラーとして扱われます。
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// HTTP 通信エラー（接続失敗・タイムアウト等）
    #[error("HTTP 通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    /// API がエラーステータスを返した
    #[error("API エラー (status={status}): {body}")]
    ApiStatus {
        /// HTTP ステータスコード
        status: u16,
        /// レスポンスボディ（先頭部分）
        body: String,
    },

    /// レート制限超過
    #[error("レート制限を超えました")]
    RateLimitExceeded,

    /// 不正なレスポンス（JSON パース失敗・必須フィールド欠落等）
    #[error("不正なレスポンス: {0}")]
    InvalidResponse(String),
}

impl CapabilityError {
    /// リトライで回復しうるエラーかどうか
    ///
    /// - `Http` / `RateLimitExceeded` / 5xx の `ApiStatus`: 一時的（リトライ対象）
    /// - 4xx の `ApiStatus` / `InvalidResponse`: 恒久的（リトライしない）
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::RateLimitExceeded => true,
            Self::ApiStatus { status, .. } => *status >= 500,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// 結果ストア（外部 key-value コラボレーター）のエラー
#[derive(Debug, Error)]
pub enum StoreError {
    /// ストアが利用できない（接続断等）
    #[error("結果ストアが利用できません: {0}")]
    Unavailable(String),

    /// カバー画像が添付されていないストーリーは完成品として保存できない
    #[error("カバー画像が未設定のストーリーは保存できません")]
    IncompleteStory,
}

/// ワークフローエンジンのエラー
#[derive(Debug, Error)]
pub enum EngineError {
    /// 指定されたワークフローインスタンスが存在しない
    ///
    /// エンジンにも結果ストアにも記録がない識別子に対する照会で返されます。
    /// 「実行中」とも「失敗」とも区別される独立した結果です。
    #[error("ワークフロー {0} は存在しません")]
    UnknownInstance(Uuid),
}
