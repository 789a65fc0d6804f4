//! # Environment モジュール
//!
//! シミュレーション用の外部コラボレーター実装を提供します。
//!
//! - [`SimulatedEnvironment`]: シナリオで定義した床・壁・箱から空間センシングを模擬
//! - [`DirectPlanner`]: 開始点から終了点への直線経路（必要なら経路点1つを経由）を返す簡易プランナー

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::models::common::{Pose, Vec2, Vec3, geometry};
use crate::models::sensing::{
    PlaneAlignment, PlaneId, ProbeHit, SceneHit, ScreenPoint, SurfaceTag, TrackedPlane,
};
use crate::models::traits::{PathPlanner, SpatialSensing};
use crate::models::waypoint::{Waypoint, WaypointKind};

const EPSILON: f64 = 1e-9;

/// シナリオで定義する平面
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceSpec {
    /// 上向きの水平面。境界は XZ 平面上の多角形
    Floor {
        id: u64,
        #[serde(default)]
        height: f64,
        boundary: Vec<Vec2>,
    },
    /// 鉛直な壁。XZ 平面上の線分 `from`-`to` を `base` から `height` だけ立ち上げる
    Wall {
        id: u64,
        from: Vec2,
        to: Vec2,
        #[serde(default)]
        base: f64,
        height: f64,
    },
}

/// 軸平行な箱（家具など）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpec {
    #[serde(default)]
    pub name: String,
    /// 底面中心の水平位置
    pub center: Vec2,
    /// 幅（x）、高さ（y）、奥行き（z）
    pub size: Vec3,
    /// 底面の高さ。机の天板のように浮いた箱を表せる
    #[serde(default)]
    pub base: f64,
}

impl BoxSpec {
    fn min(&self) -> Vec3 {
        Vec3::new(
            self.center.x - self.size.x / 2.0,
            self.base,
            self.center.y - self.size.z / 2.0,
        )
    }

    fn max(&self) -> Vec3 {
        Vec3::new(
            self.center.x + self.size.x / 2.0,
            self.base + self.size.y,
            self.center.y + self.size.z / 2.0,
        )
    }

    fn contains(&self, p: &Vec3) -> bool {
        let (min, max) = (self.min(), self.max());
        p.x > min.x && p.x < max.x && p.y > min.y && p.y < max.y && p.z > min.z && p.z < max.z
    }
}

/// 環境設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub surfaces: Vec<SurfaceSpec>,
    pub boxes: Vec<BoxSpec>,
    /// カメラの水平・垂直画角（度）
    pub field_of_view_deg: f64,
    /// シーンヒットテストの最大距離（m）
    pub hit_test_range_m: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            surfaces: Vec::new(),
            boxes: Vec::new(),
            field_of_view_deg: 90.0,
            hit_test_range_m: 8.0,
        }
    }
}

/// シナリオ幾何に基づく空間センシングの模擬実装
///
/// プローブは床・壁（`Plane` タグ）と箱（`Other` タグ）に対する最近傍のレイ交差を返します。
/// レイの始点が箱の内部にある場合、その箱は無視されます。
#[derive(Debug, Clone)]
pub struct SimulatedEnvironment {
    config: EnvironmentConfig,
    /// 画角から求めたスクリーン端の正接
    screen_extent: f64,
}

impl SimulatedEnvironment {
    pub fn new(config: EnvironmentConfig) -> Self {
        let screen_extent = (config.field_of_view_deg.to_radians() / 2.0).tan();
        Self {
            config,
            screen_extent,
        }
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// 壁・床のレイ交差（平面のみ）を近い順に返す
    fn cast_surfaces(&self, origin: Vec3, direction: Vec3, max_distance: f64) -> Vec<SceneHit> {
        let mut hits: Vec<SceneHit> = self
            .config
            .surfaces
            .iter()
            .filter_map(|surface| intersect_surface(surface, origin, direction))
            .filter(|hit| hit.distance <= max_distance)
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn cast_boxes(&self, origin: Vec3, direction: Vec3) -> Option<(Vec3, f64)> {
        self.config
            .boxes
            .iter()
            .filter(|b| !b.contains(&origin))
            .filter_map(|b| intersect_box(b, origin, direction))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl SpatialSensing for SimulatedEnvironment {
    fn tracked_planes(&self) -> Vec<TrackedPlane> {
        self.config.surfaces.iter().map(tracked_plane).collect()
    }

    fn probe(&self, origin: Vec3, direction: Vec3, max_distance: f64) -> Option<ProbeHit> {
        let direction = direction.normalize();
        if direction.magnitude() < EPSILON {
            return None;
        }

        let surface = self
            .cast_surfaces(origin, direction, max_distance)
            .into_iter()
            .next()
            .map(|hit| ProbeHit {
                point: hit.point,
                distance: hit.distance,
                surface: SurfaceTag::Plane,
            });
        let object = self
            .cast_boxes(origin, direction)
            .filter(|(_, distance)| *distance <= max_distance)
            .map(|(point, distance)| ProbeHit {
                point,
                distance,
                surface: SurfaceTag::Other,
            });

        let hit = match (surface, object) {
            (Some(s), Some(o)) => Some(if o.distance < s.distance { o } else { s }),
            (s, o) => s.or(o),
        };
        if hit.is_none() {
            trace!(x = origin.x, y = origin.y, z = origin.z, "PROBE_MISS: プローブがヒットしませんでした");
        }
        hit
    }

    fn project_to_screen(&self, camera: &Pose, point: Vec3) -> Option<ScreenPoint> {
        let forward = Vec3::new(camera.forward.x, 0.0, camera.forward.z).normalize();
        let right = camera.right();
        let offset = point - camera.position;

        let depth = offset.dot(&forward);
        if depth <= EPSILON {
            return None;
        }
        let screen = ScreenPoint {
            x: offset.dot(&right) / depth,
            y: offset.dot(&Vec3::UP) / depth,
        };
        (screen.x.abs() <= self.screen_extent && screen.y.abs() <= self.screen_extent)
            .then_some(screen)
    }

    fn scene_hit_test(&self, camera: &Pose, screen: ScreenPoint) -> Vec<SceneHit> {
        let forward = Vec3::new(camera.forward.x, 0.0, camera.forward.z).normalize();
        let direction = forward + camera.right() * screen.x + Vec3::UP * screen.y;
        self.cast_surfaces(
            camera.position,
            direction.normalize(),
            self.config.hit_test_range_m,
        )
    }
}

fn tracked_plane(surface: &SurfaceSpec) -> TrackedPlane {
    match surface {
        SurfaceSpec::Floor {
            id,
            height,
            boundary,
        } => {
            let (min, max) = bounds(boundary);
            TrackedPlane {
                id: PlaneId(*id),
                alignment: PlaneAlignment::HorizontalUp,
                center: Vec3::new((min.x + max.x) / 2.0, *height, (min.y + max.y) / 2.0),
                extent: Vec2::new(max.x - min.x, max.y - min.y),
                boundary: boundary.clone(),
            }
        }
        SurfaceSpec::Wall {
            id,
            from,
            to,
            base,
            height,
        } => {
            let mid = (*from + *to) * 0.5;
            TrackedPlane {
                id: PlaneId(*id),
                alignment: PlaneAlignment::Vertical,
                center: Vec3::from_planar(mid, base + height / 2.0),
                extent: Vec2::new(from.distance(to), *height),
                boundary: vec![*from, *to],
            }
        }
    }
}

fn bounds(points: &[Vec2]) -> (Vec2, Vec2) {
    points.iter().fold(
        (
            Vec2::new(f64::INFINITY, f64::INFINITY),
            Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        ),
        |(min, max), p| {
            (
                Vec2::new(min.x.min(p.x), min.y.min(p.y)),
                Vec2::new(max.x.max(p.x), max.y.max(p.y)),
            )
        },
    )
}

/// 正規化済み方向ベクトルに対する平面との交差
fn intersect_surface(surface: &SurfaceSpec, origin: Vec3, direction: Vec3) -> Option<SceneHit> {
    match surface {
        SurfaceSpec::Floor {
            id,
            height,
            boundary,
        } => {
            if direction.y.abs() < EPSILON {
                return None;
            }
            let t = (height - origin.y) / direction.y;
            if t <= EPSILON {
                return None;
            }
            let point = origin + direction * t;
            geometry::point_in_polygon(point.planar(), boundary).then_some(SceneHit {
                plane_id: PlaneId(*id),
                alignment: PlaneAlignment::HorizontalUp,
                point,
                distance: t,
            })
        }
        SurfaceSpec::Wall {
            id,
            from,
            to,
            base,
            height,
        } => {
            // 水平成分で線分との交差を求め、同じパラメータで高さを判定する
            let o = origin.planar();
            let d = direction.planar();
            let edge = *to - *from;
            let denom = cross(d, edge);
            if denom.abs() < EPSILON {
                return None;
            }
            let rel = *from - o;
            let t = cross(rel, edge) / denom;
            let s = cross(rel, d) / denom;
            if t <= EPSILON || !(0.0..=1.0).contains(&s) {
                return None;
            }
            let point = origin + direction * t;
            (point.y >= *base && point.y <= base + height).then_some(SceneHit {
                plane_id: PlaneId(*id),
                alignment: PlaneAlignment::Vertical,
                point,
                distance: t,
            })
        }
    }
}

fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// スラブ法による箱との交差。(交点, 距離)
fn intersect_box(b: &BoxSpec, origin: Vec3, direction: Vec3) -> Option<(Vec3, f64)> {
    let (min, max) = (b.min(), b.max());
    let mut t_near = f64::NEG_INFINITY;
    let mut t_far = f64::INFINITY;

    for (o, d, lo, hi) in [
        (origin.x, direction.x, min.x, max.x),
        (origin.y, direction.y, min.y, max.y),
        (origin.z, direction.z, min.z, max.z),
    ] {
        if d.abs() < EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let (t1, t2) = ((lo - o) / d, (hi - o) / d);
        t_near = t_near.max(t1.min(t2));
        t_far = t_far.min(t1.max(t2));
    }

    if t_near > t_far || t_near <= EPSILON {
        return None;
    }
    Some((origin + direction * t_near, t_near))
}

/// 直線経路プランナー
///
/// 開始点から終了点への直線が障害物から `clearance` 以上離れていればそれを使い、
/// そうでなければ経路点を1つ経由する最短の迂回路を探します。経路は `step` 間隔で
/// 中間点に分割されます。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectPlanner {
    pub clearance_m: f64,
    pub step_m: f64,
}

impl Default for DirectPlanner {
    fn default() -> Self {
        Self {
            clearance_m: 0.5,
            step_m: 2.0,
        }
    }
}

impl DirectPlanner {
    fn is_clear(&self, a: Vec3, b: Vec3, obstacles: &[Vec2]) -> bool {
        obstacles.iter().all(|obstacle| {
            let closest = geometry::closest_point_on_segment(*obstacle, a.planar(), b.planar());
            closest.distance(obstacle) >= self.clearance_m
        })
    }

    fn densify(&self, corners: &[Vec3]) -> Vec<Vec3> {
        let mut points = Vec::new();
        for pair in corners.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let length = a.planar_distance(&b);
            let segments = if self.step_m > 0.0 {
                (length / self.step_m).ceil().max(1.0) as usize
            } else {
                1
            };
            for i in 0..segments {
                let t = i as f64 / segments as f64;
                points.push(a + (b - a) * t);
            }
        }
        if let Some(last) = corners.last() {
            points.push(*last);
        }
        points
    }
}

impl PathPlanner for DirectPlanner {
    fn plan(&self, waypoints: &[Waypoint]) -> Option<Vec<Vec3>> {
        let start = waypoints
            .iter()
            .find(|w| w.kind() == WaypointKind::StartPoint)?
            .position;
        let end = waypoints
            .iter()
            .find(|w| w.kind() == WaypointKind::EndPoint)?
            .position;
        let obstacles: Vec<Vec2> = waypoints
            .iter()
            .filter(|w| w.is_obstacle())
            .map(|w| w.position.planar())
            .collect();

        if self.is_clear(start, end, &obstacles) {
            debug!(obstacles = obstacles.len(), "PATH_PLANNED: 直線経路");
            return Some(self.densify(&[start, end]));
        }

        let detour = waypoints
            .iter()
            .filter(|w| w.kind() == WaypointKind::PathPoint)
            .map(|w| w.position)
            .filter(|via| {
                self.is_clear(start, *via, &obstacles) && self.is_clear(*via, end, &obstacles)
            })
            .min_by(|a, b| {
                let la = start.planar_distance(a) + a.planar_distance(&end);
                let lb = start.planar_distance(b) + b.planar_distance(&end);
                la.total_cmp(&lb)
            })?;

        debug!(
            via_x = detour.x,
            via_z = detour.z,
            obstacles = obstacles.len(),
            "PATH_PLANNED: 経路点を経由する迂回路"
        );
        Some(self.densify(&[start, detour, end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::waypoint::WaypointStore;

    fn room() -> SimulatedEnvironment {
        SimulatedEnvironment::new(EnvironmentConfig {
            surfaces: vec![
                SurfaceSpec::Floor {
                    id: 1,
                    height: 0.0,
                    boundary: vec![
                        Vec2::new(-5.0, -5.0),
                        Vec2::new(5.0, -5.0),
                        Vec2::new(5.0, 5.0),
                        Vec2::new(-5.0, 5.0),
                    ],
                },
                SurfaceSpec::Wall {
                    id: 2,
                    from: Vec2::new(-5.0, 5.0),
                    to: Vec2::new(5.0, 5.0),
                    base: 0.0,
                    height: 2.5,
                },
            ],
            boxes: vec![
                BoxSpec {
                    name: "chair".to_string(),
                    center: Vec2::new(2.0, 0.0),
                    size: Vec3::new(0.6, 0.9, 0.6),
                    base: 0.0,
                },
                BoxSpec {
                    name: "table top".to_string(),
                    center: Vec2::new(-2.0, 0.0),
                    size: Vec3::new(1.2, 0.05, 0.8),
                    base: 0.7,
                },
            ],
            ..Default::default()
        })
    }

    #[test]
    fn test_tracked_planes() {
        let planes = room().tracked_planes();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].alignment, PlaneAlignment::HorizontalUp);
        assert_eq!(planes[0].extent, Vec2::new(10.0, 10.0));
        assert_eq!(planes[1].alignment, PlaneAlignment::Vertical);
        assert_eq!(planes[1].center, Vec3::new(0.0, 1.25, 5.0));
    }

    #[test]
    fn test_probe_down_hits_floor_or_box_top() {
        let env = room();
        let floor = env.probe(Vec3::new(0.0, 1.5, 0.0), Vec3::DOWN, 3.0).unwrap();
        assert_eq!(floor.surface, SurfaceTag::Plane);
        assert!((floor.distance - 1.5).abs() < 1e-9);

        let chair = env.probe(Vec3::new(2.0, 1.5, 0.0), Vec3::DOWN, 3.0).unwrap();
        assert_eq!(chair.surface, SurfaceTag::Other);
        assert!((chair.point.y - 0.9).abs() < 1e-9);

        assert!(env.probe(Vec3::new(0.0, 1.5, 0.0), Vec3::DOWN, 1.0).is_none());
        assert!(env.probe(Vec3::new(8.0, 1.5, 0.0), Vec3::DOWN, 3.0).is_none());
    }

    #[test]
    fn test_probe_up_sees_table_but_ignores_enclosing_box() {
        let env = room();
        let table = env.probe(Vec3::new(-2.0, 0.05, 0.0), Vec3::UP, 1.5).unwrap();
        assert_eq!(table.surface, SurfaceTag::Other);
        assert!((table.distance - 0.65).abs() < 1e-9);

        assert!(env.probe(Vec3::new(2.0, 0.05, 0.0), Vec3::UP, 1.5).is_none());
    }

    #[test]
    fn test_projection_and_scene_hit_test() {
        let env = room();
        let camera = Pose::new(Vec3::new(0.0, 1.5, 0.0), Vec3::FORWARD);

        let ahead = env.project_to_screen(&camera, Vec3::new(0.0, 1.5, 3.0)).unwrap();
        assert!(ahead.x.abs() < 1e-9 && ahead.y.abs() < 1e-9);
        let right = env.project_to_screen(&camera, Vec3::new(1.0, 1.5, 3.0)).unwrap();
        assert!(right.x > 0.0);
        assert!(env.project_to_screen(&camera, Vec3::new(0.0, 1.5, -3.0)).is_none());
        assert!(env.project_to_screen(&camera, Vec3::new(3.0, 1.5, 0.5)).is_none());

        let hits = env.scene_hit_test(&camera, ahead);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].alignment, PlaneAlignment::Vertical);
        assert!((hits[0].point.z - 5.0).abs() < 1e-9);
    }

    fn store_with(start: Vec3, end: Vec3) -> WaypointStore {
        let mut store = WaypointStore::new();
        store.add(WaypointKind::StartPoint, start, Vec3::FORWARD);
        store.add(WaypointKind::EndPoint, end, Vec3::FORWARD);
        store
    }

    #[test]
    fn test_direct_planner_straight_line_is_densified() {
        let store = store_with(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0));
        let path = DirectPlanner::default().plan(store.all()).unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path.first(), Some(&Vec3::ZERO));
        assert_eq!(path.last(), Some(&Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn test_direct_planner_detours_or_fails() {
        let mut store = store_with(Vec3::ZERO, Vec3::new(0.0, 0.0, 6.0));
        store.add(
            WaypointKind::Obstacle {
                height: 1.0,
                severity: 0.8,
            },
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::FORWARD,
        );
        let planner = DirectPlanner::default();
        assert!(planner.plan(store.all()).is_none());

        store.add(WaypointKind::PathPoint, Vec3::new(2.0, 0.0, 3.0), Vec3::FORWARD);
        let path = planner.plan(store.all()).unwrap();
        assert!(path.contains(&Vec3::new(2.0, 0.0, 3.0)));
    }

    #[test]
    fn test_direct_planner_requires_endpoints() {
        let mut store = WaypointStore::new();
        store.add(WaypointKind::PathPoint, Vec3::ZERO, Vec3::FORWARD);
        assert!(DirectPlanner::default().plan(store.all()).is_none());
    }
}
