//! storyforge - 子ども向けストーリー生成のための耐久ワークフローエンジン
//!
//! # 概要
//!
//! 「主人公の名前・克服すべき恐怖・言語」の3パラメーターから、
//! 固定4ステップのパイプライン（本文生成 → カバープロンプト生成 →
//! カバー画像生成 → 保存）で絵本ストーリーを生成します。
//!
//! 各ステップはリトライ・タイムアウト付きで実行され、完了した出力は
//! ジャーナルに記録されます。中断したインスタンスを再開しても完了済み
//! ステップの外部呼び出しは二重に走りません。完成したストーリーは
//! 結果ストアに永続化され、ステータス照会ではストアのレコードが
//! エンジンの生きた状態より優先されます。
//!
//! # モジュール構成
//!
//! - [`model`][]: 入力パラメーター・成果物・進行状態の型
//! - [`config`][]: TOML 設定の読み込み
//! - [`error`][]: エラー型の定義
//! - [`provider`][]: 生成ケイパビリティ（テキスト・画像）の抽象化と実装
//! - [`store`][]: 結果ストアの契約と参照実装
//! - [`activities`][]: パイプラインが呼び出す副作用つき操作
//! - [`engine`][]: パイプライン実行・インスタンス管理・ステータス照会

pub mod activities;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod provider;
pub mod store;
