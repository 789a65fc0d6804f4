use serde::{Deserialize, Serialize};

use crate::models::common::{Vec2, Vec3};

/// トラッキングされた平面の安定ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaneId(pub u64);

/// 平面の向き
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaneAlignment {
    /// 上向きの水平面（床など）
    HorizontalUp,
    /// 下向きの水平面（天井など）
    HorizontalDown,
    /// 鉛直面（壁など）
    Vertical,
}

impl PlaneAlignment {
    pub fn is_horizontal(&self) -> bool {
        matches!(self, PlaneAlignment::HorizontalUp | PlaneAlignment::HorizontalDown)
    }
}

/// 空間トラッキングが報告する平面
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPlane {
    pub id: PlaneId,
    pub alignment: PlaneAlignment,
    /// 平面中心（ワールド座標）
    pub center: Vec3,
    /// 平面の外接サイズ（水平面では x, z 方向の幅、鉛直面では幅と高さ）
    pub extent: Vec2,
    /// 水平面の境界多角形（XZ平面上のワールド座標）
    pub boundary: Vec<Vec2>,
}

/// プローブのヒット面の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceTag {
    /// ウェイポイントのマーカー
    Waypoint,
    /// トラッキング済み平面
    Plane,
    /// それ以外（家具など、障害物候補）
    Other,
}

/// レイプローブのヒット結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeHit {
    pub point: Vec3,
    pub distance: f64,
    pub surface: SurfaceTag,
}

/// 正規化スクリーン座標
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// シーンヒットテスト（ARヒットテスト）の結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub plane_id: PlaneId,
    pub alignment: PlaneAlignment,
    pub point: Vec3,
    pub distance: f64,
}
