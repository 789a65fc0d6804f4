//! # Error モジュール
//!
//! ナビゲーション支援システムで使用するエラー型を定義します。
//!
//! - **構成エラー**: 必要なコラボレーター（パスプランナー等）が未設定。ログ出力のみで処理をスキップします。
//! - **データ不足エラー**: ウェイポイント不足・安全な経路なし。音声とエラー音でユーザーに通知します。
//! - **センシング欠落**: プローブが何もヒットしなかった場合はエラー値を作らず、そのティックを読み飛ばします。

use std::path::PathBuf;
use thiserror::Error;

use crate::models::waypoint::{WaypointId, WaypointKind};

/// エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 必要なコラボレーターが存在しない
    Configuration,
    /// ウェイポイントや経路が不足している
    InsufficientData,
}

/// ナビゲーション開始・再計画時のエラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigationError {
    #[error("required collaborator is not available: {0}")]
    MissingCollaborator(&'static str),

    #[error("no waypoints have been placed")]
    NoWaypoints,

    #[error("not enough waypoints: need at least {required}, found {found}")]
    NotEnoughWaypoints { required: usize, found: usize },

    #[error("no safe path to the destination")]
    NoSafePath,

    #[error("start or end point could not be assigned: {0}")]
    Store(#[from] StoreError),
}

impl NavigationError {
    /// エラー分類を返す
    pub fn category(&self) -> ErrorCategory {
        match self {
            NavigationError::MissingCollaborator(_) => ErrorCategory::Configuration,
            NavigationError::NoWaypoints
            | NavigationError::NotEnoughWaypoints { .. }
            | NavigationError::NoSafePath
            | NavigationError::Store(_) => ErrorCategory::InsufficientData,
        }
    }

    /// ユーザーに読み上げる説明文
    pub fn spoken_message(&self) -> String {
        match self {
            NavigationError::MissingCollaborator(_) => {
                "Navigation is not available right now.".to_string()
            }
            NavigationError::NoWaypoints => {
                "No waypoints found. Please scan the environment first.".to_string()
            }
            NavigationError::NotEnoughWaypoints { required, .. } => format!(
                "Not enough waypoints. At least {} points are needed to navigate.",
                required
            ),
            NavigationError::NoSafePath => {
                "No safe path found to the destination.".to_string()
            }
            NavigationError::Store(_) => {
                "Could not set the start and end points.".to_string()
            }
        }
    }
}

/// ウェイポイントストア操作のエラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("unknown waypoint: {0}")]
    UnknownWaypoint(WaypointId),

    #[error("waypoint {id} of kind {kind:?} cannot be promoted")]
    NotPromotable { id: WaypointId, kind: WaypointKind },

    #[error("waypoints can only be promoted to a start or end point, not {0:?}")]
    InvalidTarget(WaypointKind),

    #[error("{kind:?} is already held by waypoint {holder}")]
    RoleTaken { kind: WaypointKind, holder: WaypointId },
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("設定検証エラー: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_error_category() {
        assert_eq!(
            NavigationError::MissingCollaborator("path planner").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(NavigationError::NoSafePath.category(), ErrorCategory::InsufficientData);
        assert_eq!(
            NavigationError::NotEnoughWaypoints { required: 2, found: 1 }.category(),
            ErrorCategory::InsufficientData
        );
    }

    #[test]
    fn test_spoken_message_mentions_requirement() {
        let err = NavigationError::NotEnoughWaypoints { required: 2, found: 1 };
        assert!(err.spoken_message().contains("At least 2"));
    }
}
