//! 結果ストア（外部 key-value コラボレーター）の契約と参照実装
//!
//! # 責務
//!
//! - 完成したストーリーを永続化する [`ResultStore`] トレイトの定義
//! - ワークフロー識別子からストアキーへの変換（[`story_key`]）
//! - テスト・ローカル実行用のインメモリ実装 [`InMemoryResultStore`]
//!
//! # 一貫性の契約
//!
//! ある識別子に対する完全なレコードの存在が「パイプラインが正常完了した」
//! ことの唯一の正とされます（エンジンのインメモリ状態はあくまで進行状況の
//! シグナルであり、プロセス再起動をまたいで信用してはいけません）。
//!
//! - `put` は上書き冪等です。同じキーに同じ内容を2回書いても、1回書いた
//!   場合と観測可能な状態は変わりません。
//! - `get` は5つのフィールド（title / content / coverUrl / coverWidth /
//!   coverHeight）がすべて揃っている場合のみレコードを返します。
//!   部分的なレコードは「存在しない」ものとして扱われます。

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Story, StoryCover};

/// レコードを構成するフィールド名
const FIELD_TITLE: &str = "title";
const FIELD_CONTENT: &str = "content";
const FIELD_COVER_URL: &str = "coverUrl";
const FIELD_COVER_WIDTH: &str = "coverWidth";
const FIELD_COVER_HEIGHT: &str = "coverHeight";

/// ワークフロー識別子からストアキーを導出する
///
/// # 例
///
/// ```rust
/// use storyforge::store::story_key;
/// use uuid::Uuid;
///
/// let id = Uuid::nil();
/// assert_eq!(
///     story_key(&id),
///     "storyforge:stories:00000000-0000-0000-0000-000000000000"
/// );
/// ```
pub fn story_key(workflow_id: &Uuid) -> String {
    format!("storyforge:stories:{workflow_id}")
}

/// 永続化されたストーリーのフラットなフィールド表現
///
/// ストアに書き込む際の形式です。[`Story`] との相互変換を提供します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStory {
    pub title: String,
    pub content: String,
    pub cover_url: String,
    pub cover_width: u32,
    pub cover_height: u32,
}

impl StoredStory {
    /// カバー付きストーリーからフィールド表現を作る
    ///
    /// カバー画像が添付されていない場合は [`StoreError::IncompleteStory`] を
    /// 返します。未完成の成果物が永続化されることはありません。
    pub fn from_story(story: &Story) -> Result<Self, StoreError> {
        let cover = story.cover.as_ref().ok_or(StoreError::IncompleteStory)?;
        Ok(Self {
            title: story.title.clone(),
            content: story.content.clone(),
            cover_url: cover.url.clone(),
            cover_width: cover.width,
            cover_height: cover.height,
        })
    }
}

impl From<StoredStory> for Story {
    fn from(fields: StoredStory) -> Self {
        Story {
            title: fields.title,
            content: fields.content,
            cover: Some(StoryCover {
                url: fields.cover_url,
                width: fields.cover_width,
                height: fields.cover_height,
            }),
        }
    }
}

/// 結果ストアの契約
///
/// ストレージエンジンそのものはこのクレートの範囲外です（外部コラボレーター）。
/// キーごとの並行書き込みはキー間で干渉しないことが要求されます。
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// 完成したストーリーを保存する（上書き冪等）
    async fn put(&self, key: &str, fields: &StoredStory) -> Result<(), StoreError>;

    /// キーに対応する完全なレコードを取得する
    ///
    /// 5つのフィールドが揃っていない部分的なレコードは `None` 扱いです。
    async fn get(&self, key: &str) -> Result<Option<StoredStory>, StoreError>;
}

/// インメモリの結果ストア実装
///
/// キーごとにフィールド名→値のハッシュを保持します（Redis のハッシュと
/// 同じ形）。プロセスを越えた永続性はありません。
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    inner: DashMap<String, HashMap<String, String>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生のフィールドマップを直接書き込む
    ///
    /// 部分レコードの扱いを検証するためのテスト用入口です。
    pub fn put_raw(&self, key: &str, fields: HashMap<String, String>) {
        self.inner.insert(key.to_string(), fields);
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, key: &str, fields: &StoredStory) -> Result<(), StoreError> {
        let values = HashMap::from([
            (FIELD_TITLE.to_string(), fields.title.clone()),
            (FIELD_CONTENT.to_string(), fields.content.clone()),
            (FIELD_COVER_URL.to_string(), fields.cover_url.clone()),
            (FIELD_COVER_WIDTH.to_string(), fields.cover_width.to_string()),
            (FIELD_COVER_HEIGHT.to_string(), fields.cover_height.to_string()),
        ]);
        self.inner.insert(key.to_string(), values);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredStory>, StoreError> {
        let Some(values) = self.inner.get(key) else {
            return Ok(None);
        };

        // 5フィールドが揃っていて寸法がパース可能な場合のみ有効なレコード
        let complete = (|| {
            let title = values.get(FIELD_TITLE)?.clone();
            let content = values.get(FIELD_CONTENT)?.clone();
            let cover_url = values.get(FIELD_COVER_URL)?.clone();
            let cover_width = values.get(FIELD_COVER_WIDTH)?.parse().ok()?;
            let cover_height = values.get(FIELD_COVER_HEIGHT)?.parse().ok()?;
            Some(StoredStory { title, content, cover_url, cover_width, cover_height })
        })();

        Ok(complete)
    }
}
