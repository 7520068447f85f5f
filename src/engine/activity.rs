//! アクティビティ実行エンジン（タイムアウト + リトライ制御）
//!
//! # 責務
//!
//! このモジュールは、副作用を伴う1つの操作（アクティビティ）を
//! ポリシーに従って実行する [`ActivityExecutor`] を提供します。
//! パイプラインの決定的な制御フローを、外部サービス呼び出しの
//! 非決定性（ネットワーク障害・遅延・レート制限）から隔離します。
//!
//! # 主要な型
//!
//! - [`ActivityExecutor`][]: タイムアウト・リトライ付き実行の中核
//! - [`RetryPolicy`][]: 最大試行回数・タイムアウト・指数バックオフの設定
//! - [`ActivityError`][]: 一時的/恒久的を区別する試行単位のエラー
//! - [`PermanentFailure`][]: リトライ予算を使い切った最終的な失敗
//!
//! # 実行フロー
//!
//! 1. アクティビティを1回呼び出す（1試行あたりのタイムアウト付き）
//! 2. 一時的エラーまたはタイムアウトなら、指数バックオフで待機して再試行
//! 3. 恒久的エラーなら残りの試行を消費せず即座に失敗
//! 4. 試行回数を使い切ったら [`PermanentFailure`] を返す（握りつぶさない）
//!
//! エグゼキューター自身はワークフローインスタンスの状態を一切変更しません。
//! 「呼び出しが成功したか」と「パイプラインが前進したか」は分離されています。

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::CapabilityError;

/// バックオフ計算でのシフト量の上限（オーバーフロー防止）
const MAX_BACKOFF_SHIFT: u32 = 16;

/// リトライポリシー
///
/// デフォルトはこのパイプラインの全ステップに適用される
/// 「最大3回試行・1試行あたり2分タイムアウト」です。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大試行回数（初回実行を含む、1以上）
    pub max_attempts: u32,
    /// 1試行あたりのタイムアウト
    pub per_attempt_timeout: Duration,
    /// 指数バックオフの基準待機時間
    pub backoff_base: Duration,
    /// バックオフ待機時間の上限
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_attempt_timeout: Duration::from_secs(120),
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            per_attempt_timeout: Duration::from_secs(config.per_attempt_timeout_secs),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_cap: Duration::from_millis(config.backoff_cap_ms),
        }
    }
}

/// 試行単位のエラー
///
/// 一時的エラーはエグゼキューターのリトライループに完全に吸収され、
/// パイプラインには決して漏れません。恒久的エラーは即座に
/// [`PermanentFailure`] へ昇格します。
#[derive(Debug, Error)]
pub enum ActivityError {
    /// 一時的エラー（リトライ対象）
    #[error("一時的エラー: {0}")]
    Transient(String),

    /// 恒久的エラー（リトライしない）
    #[error("恒久的エラー: {0}")]
    Permanent(String),
}

impl ActivityError {
    /// ケイパビリティエラーを一時的/恒久的に分類して変換する
    pub fn from_capability(error: CapabilityError) -> Self {
        if error.is_transient() {
            Self::Transient(error.to_string())
        } else {
            Self::Permanent(error.to_string())
        }
    }
}

/// リトライ予算を使い切った（または恒久的エラーで打ち切った）最終的な失敗
///
/// これを受け取ったエンジンはインスタンスを `Failed` に遷移させます。
#[derive(Debug, Error)]
#[error("アクティビティ '{activity}' は {attempts} 回の試行後に失敗しました: {last_error}")]
pub struct PermanentFailure {
    /// 失敗したアクティビティ名
    pub activity: String,
    /// 消費した試行回数
    pub attempts: u32,
    /// 最後に観測したエラー
    pub last_error: String,
}

/// 成功したアクティビティの出力と、消費した試行回数
#[derive(Debug, Clone)]
pub struct ActivityOutcome<T> {
    /// アクティビティの出力
    pub output: T,
    /// 消費した試行回数（可観測性のため）
    pub attempts: u32,
}

/// アクティビティ実行エンジン
///
/// # 例
///
/// ```rust
/// use std::time::Duration;
/// use storyforge::engine::activity::{ActivityError, ActivityExecutor, RetryPolicy};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let executor = ActivityExecutor::new(RetryPolicy {
///     max_attempts: 3,
///     per_attempt_timeout: Duration::from_secs(1),
///     backoff_base: Duration::from_millis(1),
///     backoff_cap: Duration::from_millis(10),
/// });
///
/// let outcome = executor
///     .execute("greet", || async { Ok::<_, ActivityError>("hello".to_string()) })
///     .await
///     .unwrap();
///
/// assert_eq!(outcome.output, "hello");
/// assert_eq!(outcome.attempts, 1);
/// # }
/// ```
pub struct ActivityExecutor {
    policy: RetryPolicy,
}

impl ActivityExecutor {
    /// 新しいエグゼキューターを生成
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// 適用中のリトライポリシー
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// アクティビティをポリシーに従って実行する
    ///
    /// `op` は試行のたびに呼ばれ、新しい Future を返します。
    /// 基盤となるケイパビリティは同じ入力で複数回呼ばれても安全である
    /// 必要があります（タイムアウトした呼び出しがリモート側でまだ進行中の
    /// まま再試行が走る可能性があるため）。重複排除はこのエグゼキューターの
    /// 責務ではありません。
    ///
    /// # 戻り値
    ///
    /// - `Ok(ActivityOutcome)`: 成功時、出力と消費した試行回数
    /// - `Err(PermanentFailure)`: 恒久的エラーまたはリトライ予算の枯渇
    pub async fn execute<T, F, Fut>(
        &self,
        activity: &str,
        op: F,
    ) -> Result<ActivityOutcome<T>, PermanentFailure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ActivityError>>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            match tokio::time::timeout(self.policy.per_attempt_timeout, op()).await {
                Ok(Ok(output)) => {
                    if attempt > 1 {
                        debug!(activity, attempt, "リトライ後に成功しました");
                    }
                    return Ok(ActivityOutcome { output, attempts: attempt });
                }
                Ok(Err(ActivityError::Permanent(message))) => {
                    warn!(activity, attempt, error = %message, "恒久的エラーのため打ち切ります");
                    return Err(PermanentFailure {
                        activity: activity.to_string(),
                        attempts: attempt,
                        last_error: message,
                    });
                }
                Ok(Err(ActivityError::Transient(message))) => {
                    last_error = message;
                }
                Err(_) => {
                    last_error = format!(
                        "タイムアウト（{}秒以内に完了しませんでした）",
                        self.policy.per_attempt_timeout.as_secs()
                    );
                }
            }

            if attempt < self.policy.max_attempts {
                let delay = self.backoff_delay(attempt);
                warn!(
                    activity,
                    attempt,
                    error = %last_error,
                    delay_ms = delay.as_millis() as u64,
                    "一時的エラーのため再試行します"
                );
                tokio::time::sleep(delay).await;
            }
        }

        warn!(
            activity,
            attempts = self.policy.max_attempts,
            error = %last_error,
            "リトライ予算を使い切りました"
        );
        Err(PermanentFailure {
            activity: activity.to_string(),
            attempts: self.policy.max_attempts,
            last_error,
        })
    }

    /// n 回目の試行後の待機時間（指数バックオフ・上限つき）
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = (attempt - 1).min(MAX_BACKOFF_SHIFT);
        let delay = self.policy.backoff_base.saturating_mul(1u32 << shift);
        delay.min(self.policy.backoff_cap)
    }
}
