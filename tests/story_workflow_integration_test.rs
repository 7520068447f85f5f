//! ワークフローエンジンの統合テスト
//!
//! モックのケイパビリティを使い、受付から終端状態までの一連の流れを
//! エンジン全体として検証します。外部サービスへの実通信は行いません。

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use storyforge::activities::StoryActivities;
use storyforge::config::CoverConfig;
use storyforge::engine::{
    ActivityExecutor, InMemoryStepJournal, QueryGateway, RetryPolicy, StepJournal, StoryPipeline,
    WorkflowEngine,
};
use storyforge::error::CapabilityError;
use storyforge::model::{StoryParams, WorkflowState};
use storyforge::provider::{ChatCapability, ImageCapability, StoryDraft};
use storyforge::store::{story_key, InMemoryResultStore, ResultStore, StoredStory};

/// 最初の n 回だけ一時的エラーを返すチャットモック
struct ScriptedChat {
    story_calls: AtomicU32,
    story_failures: u32,
    /// true なら常に恒久的エラー（壊れた構造化出力を装う）
    story_broken: bool,
    /// 本文生成にかける人工的な遅延
    story_delay: Duration,
}

impl ScriptedChat {
    fn reliable() -> Self {
        Self {
            story_calls: AtomicU32::new(0),
            story_failures: 0,
            story_broken: false,
            story_delay: Duration::ZERO,
        }
    }

    fn flaky(failures: u32) -> Self {
        Self { story_failures: failures, ..Self::reliable() }
    }

    fn broken() -> Self {
        Self { story_broken: true, ..Self::reliable() }
    }

    fn slow(delay: Duration) -> Self {
        Self { story_delay: delay, ..Self::reliable() }
    }
}

#[async_trait]
impl ChatCapability for ScriptedChat {
    async fn generate_story(
        &self,
        character_name: &str,
        fear: &str,
        language: &str,
    ) -> Result<StoryDraft, CapabilityError> {
        if !self.story_delay.is_zero() {
            tokio::time::sleep(self.story_delay).await;
        }
        if self.story_broken {
            return Err(CapabilityError::InvalidResponse("構造化出力が壊れています".to_string()));
        }
        let n = self.story_calls.fetch_add(1, Ordering::SeqCst);
        if n < self.story_failures {
            return Err(CapabilityError::RateLimitExceeded);
        }
        Ok(StoryDraft {
            story_title: format!("{character_name} and {fear}"),
            story_text: format!("A story in {language} about {character_name}."),
        })
    }

    async fn generate_cover_prompt(
        &self,
        _story_content: &str,
        _language: &str,
    ) -> Result<String, CapabilityError> {
        Ok("A children's book cover illustration of a brave hero".to_string())
    }
}

/// 最初の n 回だけ一時的エラーを返す画像モック
struct ScriptedImage {
    calls: AtomicU32,
    failures: u32,
}

impl ScriptedImage {
    fn reliable() -> Self {
        Self { calls: AtomicU32::new(0), failures: 0 }
    }

    fn flaky(failures: u32) -> Self {
        Self { calls: AtomicU32::new(0), failures }
    }
}

#[async_trait]
impl ImageCapability for ScriptedImage {
    async fn generate_image(&self, _prompt: &str) -> Result<String, CapabilityError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(CapabilityError::ApiStatus {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok("https://images.example.com/cover.png".to_string())
    }
}

/// テスト用の高速リトライポリシー
fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        per_attempt_timeout: Duration::from_secs(2),
        backoff_base: Duration::from_millis(1),
        backoff_cap: Duration::from_millis(2),
    }
}

/// エンジン一式を組み立てる
fn build_engine(
    chat: Arc<ScriptedChat>,
    image: Arc<ScriptedImage>,
    store: Arc<InMemoryResultStore>,
    journal: Arc<InMemoryStepJournal>,
) -> (Arc<WorkflowEngine>, QueryGateway) {
    let activities = StoryActivities::new(
        chat as Arc<dyn ChatCapability>,
        image as Arc<dyn ImageCapability>,
        Arc::clone(&store) as Arc<dyn ResultStore>,
        CoverConfig::default(),
    );
    let pipeline = StoryPipeline::new(
        activities,
        ActivityExecutor::new(fast_policy()),
        Arc::clone(&journal) as Arc<dyn StepJournal>,
    );
    let engine = Arc::new(WorkflowEngine::new(pipeline));
    let gateway = QueryGateway::new(Arc::clone(&engine), store as Arc<dyn ResultStore>);
    (engine, gateway)
}

/// 終端状態に達するまでポーリングし、観測した状態列を返す
async fn wait_for_terminal(gateway: &QueryGateway, workflow_id: &Uuid) -> Vec<WorkflowState> {
    let mut observed = Vec::new();
    for _ in 0..500 {
        let status = gateway.status(workflow_id).await.unwrap();
        if observed.last() != Some(&status.state) {
            observed.push(status.state);
        }
        if status.state.is_terminal() {
            return observed;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("終端状態に達しませんでした: {observed:?}");
}

/// 正常系: 受付から完了まで走り、結果ストアに完全なレコードが残ること
#[tokio::test]
async fn test_submit_runs_to_completion() {
    let store = Arc::new(InMemoryResultStore::new());
    let (engine, gateway) = build_engine(
        Arc::new(ScriptedChat::reliable()),
        Arc::new(ScriptedImage::reliable()),
        Arc::clone(&store),
        Arc::new(InMemoryStepJournal::new()),
    );

    let params = StoryParams {
        character_name: "Alex".to_string(),
        fear: "the dark".to_string(),
        language: "French".to_string(),
    };
    let id = engine.submit(params);

    let observed = wait_for_terminal(&gateway, &id).await;
    assert_eq!(observed.last(), Some(&WorkflowState::Completed));

    let stored = store.get(&story_key(&id)).await.unwrap().unwrap();
    assert_eq!(stored.title, "Alex and the dark");
    assert!(!stored.content.is_empty());
    assert_eq!(stored.cover_url, "https://images.example.com/cover.png");
    assert_eq!(stored.cover_width, 1024);
    assert_eq!(stored.cover_height, 1024);

    // 完了後の照会はストア経由でストーリー本体も返す
    let status = gateway.status(&id).await.unwrap();
    assert_eq!(status.state, WorkflowState::Completed);
    assert_eq!(status.story.unwrap().title, "Alex and the dark");
}

/// 観測される状態列が後退しないこと（ポーリングの単調性）
#[tokio::test]
async fn test_observed_states_are_monotonic() {
    let (engine, gateway) = build_engine(
        Arc::new(ScriptedChat::flaky(1)),
        Arc::new(ScriptedImage::flaky(1)),
        Arc::new(InMemoryResultStore::new()),
        Arc::new(InMemoryStepJournal::new()),
    );

    let id = engine.submit(StoryParams::default());
    let observed = wait_for_terminal(&gateway, &id).await;

    for pair in observed.windows(2) {
        assert!(pair[0] < pair[1], "{:?} が {:?} の後に観測されました", pair[1], pair[0]);
    }
}

/// 受付のたびに異なる識別子が採番されること
#[tokio::test]
async fn test_each_submission_gets_a_unique_id() {
    let (engine, gateway) = build_engine(
        Arc::new(ScriptedChat::reliable()),
        Arc::new(ScriptedImage::reliable()),
        Arc::new(InMemoryResultStore::new()),
        Arc::new(InMemoryStepJournal::new()),
    );

    let a = engine.submit(StoryParams::default());
    let b = engine.submit(StoryParams::default());
    assert_ne!(a, b);

    assert_eq!(wait_for_terminal(&gateway, &a).await.last(), Some(&WorkflowState::Completed));
    assert_eq!(wait_for_terminal(&gateway, &b).await.last(), Some(&WorkflowState::Completed));
}

/// 一時的エラーはリトライで吸収され、外からは見えないこと
#[tokio::test]
async fn test_transient_failures_do_not_surface() {
    let chat = Arc::new(ScriptedChat::flaky(2));
    let (engine, gateway) = build_engine(
        Arc::clone(&chat),
        Arc::new(ScriptedImage::flaky(2)),
        Arc::new(InMemoryResultStore::new()),
        Arc::new(InMemoryStepJournal::new()),
    );

    let id = engine.submit(StoryParams::default());
    let observed = wait_for_terminal(&gateway, &id).await;

    assert_eq!(observed.last(), Some(&WorkflowState::Completed));
    assert!(!observed.contains(&WorkflowState::Failed));
    assert_eq!(chat.story_calls.load(Ordering::SeqCst), 3);
}

/// 恒久的エラーはFailedに確定し、結果ストアには何も残らないこと
#[tokio::test]
async fn test_permanent_failure_leaves_no_stored_result() {
    let store = Arc::new(InMemoryResultStore::new());
    let (engine, gateway) = build_engine(
        Arc::new(ScriptedChat::broken()),
        Arc::new(ScriptedImage::reliable()),
        Arc::clone(&store),
        Arc::new(InMemoryStepJournal::new()),
    );

    let id = engine.submit(StoryParams::default());
    let observed = wait_for_terminal(&gateway, &id).await;

    assert_eq!(observed.last(), Some(&WorkflowState::Failed));
    assert!(store.get(&story_key(&id)).await.unwrap().is_none());

    let status = gateway.status(&id).await.unwrap();
    assert_eq!(status.state, WorkflowState::Failed);
    assert!(status.story.is_none());
    assert!(status.error.unwrap().contains("generate-story"));
}

/// ストア優先規則: 完全なレコードがあれば、エンジンの生きた状態にかかわらず完了と報告すること
#[tokio::test]
async fn test_stored_result_outranks_failed_instance() {
    let store = Arc::new(InMemoryResultStore::new());
    let (engine, gateway) = build_engine(
        Arc::new(ScriptedChat::broken()),
        Arc::new(ScriptedImage::reliable()),
        Arc::clone(&store),
        Arc::new(InMemoryStepJournal::new()),
    );

    let id = engine.submit(StoryParams::default());
    wait_for_terminal(&gateway, &id).await;

    // 別経路（過去の実行など）で完全なレコードが書かれた状況を装う
    let stored = StoredStory {
        title: "Recovered".to_string(),
        content: "Recovered body".to_string(),
        cover_url: "https://images.example.com/recovered.png".to_string(),
        cover_width: 1024,
        cover_height: 1024,
    };
    store.put(&story_key(&id), &stored).await.unwrap();

    let status = gateway.status(&id).await.unwrap();
    assert_eq!(status.state, WorkflowState::Completed);
    assert_eq!(status.story.unwrap().title, "Recovered");
}

/// 再開: 失敗したインスタンスをジャーナル共有の新しいエンジンで再開すると、
/// 完了済みステップを再実行せず続きから完走すること
#[tokio::test]
async fn test_resume_skips_recorded_steps() {
    let store = Arc::new(InMemoryResultStore::new());
    let journal = Arc::new(InMemoryStepJournal::new());

    // 1回目: 画像生成が常に失敗してFailedになる
    let first_chat = Arc::new(ScriptedChat::reliable());
    let (engine1, gateway1) = build_engine(
        Arc::clone(&first_chat),
        Arc::new(ScriptedImage::flaky(100)),
        Arc::clone(&store),
        Arc::clone(&journal),
    );
    let id = engine1.submit(StoryParams::default());
    let observed = wait_for_terminal(&gateway1, &id).await;
    assert_eq!(observed.last(), Some(&WorkflowState::Failed));
    assert_eq!(first_chat.story_calls.load(Ordering::SeqCst), 1);

    // 2回目: 同じジャーナルとストアを共有する新しいエンジンで再開する
    let second_chat = Arc::new(ScriptedChat::reliable());
    let (engine2, gateway2) = build_engine(
        Arc::clone(&second_chat),
        Arc::new(ScriptedImage::reliable()),
        Arc::clone(&store),
        Arc::clone(&journal),
    );
    engine2.resume(id, StoryParams::default());

    let observed = wait_for_terminal(&gateway2, &id).await;
    assert_eq!(observed.last(), Some(&WorkflowState::Completed));

    // 本文とカバープロンプトはジャーナルから復元され、チャットは一度も呼ばれない
    assert_eq!(second_chat.story_calls.load(Ordering::SeqCst), 0);

    let stored = store.get(&story_key(&id)).await.unwrap().unwrap();
    assert_eq!(stored.title, "John and Night");
}

/// 受付直後の照会はパイプラインの進行を待たず Initializing を答えること
#[tokio::test(flavor = "current_thread")]
async fn test_query_immediately_after_submit_answers_initializing() {
    let (engine, gateway) = build_engine(
        Arc::new(ScriptedChat::reliable()),
        Arc::new(ScriptedImage::reliable()),
        Arc::new(InMemoryResultStore::new()),
        Arc::new(InMemoryStepJournal::new()),
    );

    // current_thread ランタイムでは待機点に達するまで駆動タスクは走らない
    let id = engine.submit(StoryParams::default());
    assert_eq!(engine.current_state(&id).unwrap(), WorkflowState::Initializing);

    let status = gateway.status(&id).await.unwrap();
    assert_eq!(status.state, WorkflowState::Initializing);
    assert!(status.story.is_none());

    // その後は通常どおり完了まで進む
    let observed = wait_for_terminal(&gateway, &id).await;
    assert_eq!(observed.first(), Some(&WorkflowState::Initializing));
    assert_eq!(observed.last(), Some(&WorkflowState::Completed));
}

/// 駆動タスクが実行中のインスタンスへの再開要求は無視され、
/// 同じステップの外部呼び出しが並行に二重実行されないこと
#[tokio::test]
async fn test_resume_while_driver_is_active_is_a_no_op() {
    let chat = Arc::new(ScriptedChat::slow(Duration::from_millis(300)));
    let image = Arc::new(ScriptedImage::reliable());
    let (engine, gateway) = build_engine(
        Arc::clone(&chat),
        Arc::clone(&image),
        Arc::new(InMemoryResultStore::new()),
        Arc::new(InMemoryStepJournal::new()),
    );

    let id = engine.submit(StoryParams::default());

    // 本文生成の最中に再開を要求する
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.resume(id, StoryParams::default());

    let observed = wait_for_terminal(&gateway, &id).await;
    assert_eq!(observed.last(), Some(&WorkflowState::Completed));

    // 駆動タスクが二重化していれば各ステップの呼び出し回数が増えているはず
    assert_eq!(chat.story_calls.load(Ordering::SeqCst), 1);
    assert_eq!(image.calls.load(Ordering::SeqCst), 1);
}

/// 終端状態のインスタンスに対する再開は何もしないこと
#[tokio::test]
async fn test_resume_of_completed_instance_is_a_no_op() {
    let store = Arc::new(InMemoryResultStore::new());
    let chat = Arc::new(ScriptedChat::reliable());
    let image = Arc::new(ScriptedImage::reliable());
    let (engine, gateway) = build_engine(
        Arc::clone(&chat),
        Arc::clone(&image),
        Arc::clone(&store),
        Arc::new(InMemoryStepJournal::new()),
    );

    let id = engine.submit(StoryParams::default());
    wait_for_terminal(&gateway, &id).await;

    engine.resume(id, StoryParams::default());
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 駆動タスクが再起動していれば呼び出し回数が増えているはず
    assert_eq!(chat.story_calls.load(Ordering::SeqCst), 1);
    assert_eq!(image.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        gateway.status(&id).await.unwrap().state,
        WorkflowState::Completed
    );
}
