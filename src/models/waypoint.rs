use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::common::Vec3;

/// ウェイポイントの一意識別子。生成時に払い出され、再利用されない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaypointId(pub u64);

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// ウェイポイントの種類
///
/// 障害物固有の属性（推定高さ、危険度）は `Obstacle` バリアントが保持します。
/// 種類の変更は [`WaypointStore::promote`] を通してのみ行います。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WaypointKind {
    StartPoint,
    EndPoint,
    PathPoint,
    Obstacle {
        /// 推定される鉛直方向の高さ（m）
        height: f64,
        /// 危険度（0〜1）
        severity: f64,
    },
}

impl WaypointKind {
    pub fn is_obstacle(&self) -> bool {
        matches!(self, WaypointKind::Obstacle { .. })
    }
}

/// 空間マップ上の型付きマーカー
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub id: WaypointId,
    pub position: Vec3,
    /// 向き（単位前方ベクトル）
    pub orientation: Vec3,
    kind: WaypointKind,
}

impl Waypoint {
    pub fn kind(&self) -> WaypointKind {
        self.kind
    }

    pub fn is_obstacle(&self) -> bool {
        self.kind.is_obstacle()
    }
}

/// 順序付きウェイポイントストア
///
/// スキャナーとガイダンスコントローラーが共有する単一の可変コレクションです。
/// 追加順が保持され、IDは `clear` 後も再利用されません。
#[derive(Debug, Default)]
pub struct WaypointStore {
    waypoints: Vec<Waypoint>,
    next_id: u64,
}

impl WaypointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// ウェイポイントを追加し、払い出したIDを返す
    pub fn add(&mut self, kind: WaypointKind, position: Vec3, orientation: Vec3) -> WaypointId {
        let id = WaypointId(self.next_id);
        self.next_id += 1;
        self.waypoints.push(Waypoint {
            id,
            position,
            orientation,
            kind,
        });
        debug!(
            waypoint_id = %id,
            kind = ?kind,
            x = position.x,
            y = position.y,
            z = position.z,
            "WAYPOINT_ADDED: ウェイポイントを追加しました"
        );
        id
    }

    /// 追加順の全ウェイポイント
    pub fn all(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn get(&self, id: WaypointId) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.id == id)
    }

    /// 条件に一致する最初のウェイポイント（追加順）
    pub fn find<P>(&self, predicate: P) -> Option<&Waypoint>
    where
        P: Fn(&Waypoint) -> bool,
    {
        self.waypoints.iter().find(|w| predicate(w))
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.iter().filter(|w| w.is_obstacle())
    }

    /// 正規の開始点（追加順で最初の StartPoint）
    pub fn canonical_start(&self) -> Option<&Waypoint> {
        self.find(|w| w.kind == WaypointKind::StartPoint)
    }

    /// 正規の終了点（追加順で最初の EndPoint）
    pub fn canonical_end(&self) -> Option<&Waypoint> {
        self.find(|w| w.kind == WaypointKind::EndPoint)
    }

    /// 指定位置から `radius` 以内（3次元距離）に条件を満たすウェイポイントがあるか
    pub fn any_within<P>(&self, position: &Vec3, radius: f64, predicate: P) -> bool
    where
        P: Fn(&Waypoint) -> bool,
    {
        self.waypoints
            .iter()
            .any(|w| predicate(w) && w.position.distance(position) < radius)
    }

    /// 汎用ウェイポイントを開始点または終了点に昇格させる
    ///
    /// 昇格できるのは PathPoint のみで、対象の役割を既に別のウェイポイントが
    /// 持っている場合は拒否します（先着の StartPoint / EndPoint が正規）。
    pub fn promote(&mut self, id: WaypointId, kind: WaypointKind) -> Result<(), StoreError> {
        if !matches!(kind, WaypointKind::StartPoint | WaypointKind::EndPoint) {
            return Err(StoreError::InvalidTarget(kind));
        }
        if let Some(holder) = self.find(|w| w.kind == kind) {
            return Err(StoreError::RoleTaken {
                kind,
                holder: holder.id,
            });
        }

        let waypoint = self
            .waypoints
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(StoreError::UnknownWaypoint(id))?;
        if waypoint.kind != WaypointKind::PathPoint {
            return Err(StoreError::NotPromotable {
                id,
                kind: waypoint.kind,
            });
        }

        waypoint.kind = kind;
        info!(waypoint_id = %id, kind = ?kind, "WAYPOINT_PROMOTED: ウェイポイントを昇格しました");
        Ok(())
    }

    /// 全ウェイポイントを削除。ID カウンターは維持する
    pub fn clear(&mut self) {
        let removed = self.waypoints.len();
        self.waypoints.clear();
        info!(removed, "WAYPOINTS_CLEARED: ウェイポイントストアをクリアしました");
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obstacle() -> WaypointKind {
        WaypointKind::Obstacle {
            height: 1.0,
            severity: 0.8,
        }
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = WaypointStore::new();
        let a = store.add(WaypointKind::PathPoint, Vec3::ZERO, Vec3::FORWARD);
        store.clear();
        let b = store.add(WaypointKind::PathPoint, Vec3::ZERO, Vec3::FORWARD);
        assert_ne!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_canonical_start_is_first_found() {
        let mut store = WaypointStore::new();
        let first = store.add(WaypointKind::StartPoint, Vec3::ZERO, Vec3::FORWARD);
        store.add(WaypointKind::StartPoint, Vec3::new(1.0, 0.0, 0.0), Vec3::FORWARD);
        assert_eq!(store.canonical_start().map(|w| w.id), Some(first));
        assert!(store.canonical_end().is_none());
    }

    #[test]
    fn test_promote_path_point() {
        let mut store = WaypointStore::new();
        let id = store.add(WaypointKind::PathPoint, Vec3::ZERO, Vec3::FORWARD);
        store.promote(id, WaypointKind::EndPoint).unwrap();
        assert_eq!(store.get(id).unwrap().kind(), WaypointKind::EndPoint);
    }

    #[test]
    fn test_promote_rejects_taken_role() {
        let mut store = WaypointStore::new();
        let start = store.add(WaypointKind::StartPoint, Vec3::ZERO, Vec3::FORWARD);
        let other = store.add(WaypointKind::PathPoint, Vec3::ZERO, Vec3::FORWARD);
        assert_eq!(
            store.promote(other, WaypointKind::StartPoint),
            Err(StoreError::RoleTaken {
                kind: WaypointKind::StartPoint,
                holder: start
            })
        );
    }

    #[test]
    fn test_promote_rejects_obstacles_and_bad_targets() {
        let mut store = WaypointStore::new();
        let obs = store.add(obstacle(), Vec3::ZERO, Vec3::FORWARD);
        assert!(matches!(
            store.promote(obs, WaypointKind::EndPoint),
            Err(StoreError::NotPromotable { .. })
        ));
        assert!(matches!(
            store.promote(obs, WaypointKind::PathPoint),
            Err(StoreError::InvalidTarget(_))
        ));
        assert_eq!(
            store.promote(WaypointId(99), WaypointKind::EndPoint),
            Err(StoreError::UnknownWaypoint(WaypointId(99)))
        );
    }

    #[test]
    fn test_any_within_filters_by_kind() {
        let mut store = WaypointStore::new();
        store.add(WaypointKind::PathPoint, Vec3::new(1.0, 0.0, 0.0), Vec3::FORWARD);
        store.add(obstacle(), Vec3::new(5.0, 0.0, 0.0), Vec3::FORWARD);
        assert!(store.any_within(&Vec3::ZERO, 1.5, |_| true));
        assert!(!store.any_within(&Vec3::ZERO, 1.5, |w| w.is_obstacle()));
        assert_eq!(store.obstacles().count(), 1);
    }
}
