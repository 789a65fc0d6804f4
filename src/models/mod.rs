// 基本的なデータ型と数学ユーティリティ
pub mod common;

// 外部コンポーネントとの境界（trait）定義
pub mod traits;

// 環境マップとセンシング結果の型
pub mod waypoint;
pub mod arena;
pub mod sensing;

// 制御ループの補助
pub mod scheduler;
pub mod feedback;

// 経路と方向表現
pub mod path;
pub mod direction;

// 中核コンポーネント
pub mod scanner;
pub mod guidance;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use waypoint::{Waypoint, WaypointId, WaypointKind, WaypointStore};
pub use sensing::{PlaneAlignment, PlaneId, ProbeHit, SceneHit, ScreenPoint, SurfaceTag, TrackedPlane};
pub use feedback::{FeedbackCounts, FeedbackEvent, FeedbackLog};
pub use path::PlannedPath;
pub use direction::DirectionScheme;
pub use scanner::{ScanReport, ScanStats, Scanner, ScannerConfig, ScannerState};
pub use guidance::{
    GuidanceConfig, GuidanceController, GuidanceEvent, GuidanceStats, NavigationState,
    NavigationStatus, UpdateTrigger,
};
