//! # wayfinder
//!
//! 視覚障害者向け屋内ナビゲーション支援のシミュレーションライブラリ。
//!
//! 空間センシングで環境をスキャンしてウェイポイントマップを作り、
//! 計画経路に沿って音声・効果音・振動で誘導します。
//!
//! - [`models::scanner`]: 平面同期、障害物検出、経路点生成
//! - [`models::guidance`]: 経路追従、障害物警告、経路逸脱検出、到着判定
//! - [`environment`]: シナリオ定義の模擬環境とパスプランナー
//! - [`simulation`]: スキャンからナビゲーションまでを再現する制御ループ

pub mod environment;
pub mod error;
pub mod logging;
pub mod models;
pub mod scenario;
pub mod simulation;
