use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::models::arena::Arena;
use crate::models::common::{Pose, Vec2, Vec3, geometry};
use crate::models::feedback::clips;
use crate::models::scheduler::Cooldown;
use crate::models::sensing::{PlaneAlignment, PlaneId, SurfaceTag, TrackedPlane};
use crate::models::traits::{FeedbackSink, SpatialSensing};
use crate::models::waypoint::{WaypointId, WaypointKind, WaypointStore};

/// 床面から上向きプローブを打つ際の持ち上げ量（m）。床自身へのヒットを避ける
const PROBE_LIFT: f64 = 0.05;

/// スキャナー設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// スキャン間隔の下限（秒）
    pub scan_interval_s: f64,
    /// スキャン密度。グリッド刻み幅であり、移動判定（半分の距離）にも使う（m）
    pub scan_density_m: f64,
    /// ユーザー中心の走査正方形の半幅（m）
    pub scan_radius_m: f64,
    /// 1回のスキャンで生成する障害物の上限
    pub max_obstacles_per_scan: usize,
    /// 中心付近の自己検出除外半径（m）
    pub self_exclusion_radius_m: f64,
    /// 床検出用の下向きプローブ長（m）
    pub floor_probe_distance_m: f64,
    /// 障害物検出用の上向きプローブ長（m）
    pub obstacle_detection_height_m: f64,
    /// 水平面上に生成する経路ウェイポイントのグリッド間隔（m）
    pub waypoint_grid_size_m: f64,
    /// 新規障害物の既定危険度
    pub default_obstacle_severity: f64,
    /// 高さ推定プローブがヒットしなかった場合の既定高さ（m）
    pub default_obstacle_height_m: f64,
    /// 推定高さの上限（m）
    pub max_obstacle_height_m: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_s: 1.0,
            scan_density_m: 0.5,
            scan_radius_m: 3.0,
            max_obstacles_per_scan: 10,
            self_exclusion_radius_m: 0.5,
            floor_probe_distance_m: 3.0,
            obstacle_detection_height_m: 1.5,
            waypoint_grid_size_m: 1.0,
            default_obstacle_severity: 0.8,
            default_obstacle_height_m: 1.0,
            max_obstacle_height_m: 2.5,
        }
    }
}

impl ScannerConfig {
    /// 障害物同士の重複排除距離
    pub fn obstacle_dedup_distance(&self) -> f64 {
        1.5 * self.scan_density_m
    }

    /// 経路ウェイポイントの重複排除距離
    pub fn waypoint_dedup_distance(&self) -> f64 {
        0.9 * self.waypoint_grid_size_m
    }
}

/// スキャナーの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Scanning,
}

/// スキャン統計。マップクリアでのみリセットされる累積値
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    pub scan_count: u64,
    pub obstacles_found: u64,
    /// 新規平面の面積の累計（m²）
    pub area_mapped: f64,
    pub planes_tracked: usize,
    pub path_points_generated: u64,
}

/// 障害物の検出経路
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    /// 下向き・上向きプローブによるグリッド走査
    GridProbe,
    /// スクリーン投影からのシーンヒットテスト
    SceneHitTest,
}

/// トラッキング平面の表示用表現
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneVisual {
    pub plane_id: PlaneId,
    pub alignment: PlaneAlignment,
    pub center: Vec3,
    pub extent: Vec2,
    /// 境界メッシュ（XZ平面上の頂点列）
    pub mesh: Vec<Vec2>,
    pub area: f64,
    /// その場更新の回数
    pub revision: u32,
}

impl PlaneVisual {
    fn build(plane: &TrackedPlane) -> Self {
        let area = if plane.boundary.len() >= 3 {
            geometry::polygon_area(&plane.boundary)
        } else {
            plane.extent.x * plane.extent.y
        };
        Self {
            plane_id: plane.id,
            alignment: plane.alignment,
            center: plane.center,
            extent: plane.extent,
            mesh: plane.boundary.clone(),
            area,
            revision: 0,
        }
    }

    /// 変換とメッシュのみを更新する。面積は累積し直さない
    fn refresh(&mut self, plane: &TrackedPlane) {
        self.alignment = plane.alignment;
        self.center = plane.center;
        self.extent = plane.extent;
        self.mesh.clone_from(&plane.boundary);
        self.revision += 1;
    }
}

/// 障害物マーカーの表示用表現
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleMarker {
    pub waypoint_id: WaypointId,
    pub position: Vec3,
    pub height: f64,
    pub source: DetectionSource,
}

/// 1ティック分のスキャン結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub new_planes: usize,
    pub new_path_points: usize,
    pub new_obstacles: Vec<WaypointId>,
    /// グリッド障害物スキャンを実行したか
    pub obstacle_scan_performed: bool,
}

/// 障害物・平面スキャナー
///
/// 空間トラッキングの平面情報とプローブ結果から、重複のない障害物・経路ウェイポイントを
/// ウェイポイントストアへ登録します。
pub struct Scanner {
    config: ScannerConfig,
    sensing: Option<Box<dyn SpatialSensing>>,
    state: ScannerState,
    planes: Arena<PlaneId, PlaneVisual>,
    obstacle_markers: Arena<WaypointId, ObstacleMarker>,
    stats: ScanStats,
    scan_cooldown: Cooldown,
    last_scan_position: Option<Vec3>,
    missing_sensing_reported: bool,
}

impl Scanner {
    /// 新しいスキャナーを作成します
    ///
    /// # 引数
    ///
    /// * `config` - スキャナー設定
    /// * `sensing` - 空間センシングサービス。None の場合スキャンは毎ティックスキップされる
    pub fn new(config: ScannerConfig, sensing: Option<Box<dyn SpatialSensing>>) -> Self {
        let scan_cooldown = Cooldown::new(config.scan_interval_s);
        Self {
            config,
            sensing,
            state: ScannerState::Idle,
            planes: Arena::new(),
            obstacle_markers: Arena::new(),
            stats: ScanStats::default(),
            scan_cooldown,
            last_scan_position: None,
            missing_sensing_reported: false,
        }
    }

    pub fn with_sensing<S: SpatialSensing + 'static>(config: ScannerConfig, sensing: S) -> Self {
        Self::new(config, Some(Box::new(sensing)))
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    pub fn is_scanning(&self) -> bool {
        self.state == ScannerState::Scanning
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn planes(&self) -> &Arena<PlaneId, PlaneVisual> {
        &self.planes
    }

    pub fn obstacle_markers(&self) -> &Arena<WaypointId, ObstacleMarker> {
        &self.obstacle_markers
    }

    /// スキャン開始。既にスキャン中なら false
    pub fn start_scanning(&mut self, feedback: &mut dyn FeedbackSink) -> bool {
        if self.is_scanning() {
            return false;
        }
        self.state = ScannerState::Scanning;
        self.scan_cooldown.reset();
        self.last_scan_position = None;
        info!("SCANNING_STARTED: 環境スキャンを開始しました");
        feedback.speak("Scanning started. Move slowly around the space.");
        true
    }

    /// スキャン停止。既に停止中なら false
    pub fn stop_scanning(&mut self, feedback: &mut dyn FeedbackSink) -> bool {
        if !self.is_scanning() {
            return false;
        }
        self.state = ScannerState::Idle;
        info!(
            scan_count = self.stats.scan_count,
            obstacles_found = self.stats.obstacles_found,
            area_mapped = self.stats.area_mapped,
            "SCANNING_STOPPED: 環境スキャンを停止しました"
        );
        feedback.speak(&format!(
            "Scanning stopped. {} obstacles found.",
            self.stats.obstacles_found
        ));
        true
    }

    /// 前回スキャン位置からスキャン密度の半分以上移動したか
    pub fn has_moved_enough(&self, position: &Vec3) -> bool {
        match self.last_scan_position {
            None => true,
            Some(last) => last.planar_distance(position) >= 0.5 * self.config.scan_density_m,
        }
    }

    /// 1ティック分の処理
    ///
    /// スキャン中のみ動作します。平面の同期は毎ティック行い、グリッド障害物スキャンは
    /// スキャン間隔が経過し、かつユーザーが十分移動した場合にのみ実行します。
    /// センシングサービスやカメラ姿勢がない場合はそのティックを読み飛ばします。
    pub fn tick(
        &mut self,
        now: f64,
        camera: Option<&Pose>,
        store: &mut WaypointStore,
        feedback: &mut dyn FeedbackSink,
    ) -> Option<ScanReport> {
        if !self.is_scanning() {
            return None;
        }
        let Some(camera) = camera else {
            trace!(now, "SCAN_SKIPPED: カメラ姿勢がありません");
            return None;
        };
        let Some(sensing) = self.sensing.take() else {
            if !self.missing_sensing_reported {
                error!("SCAN_SKIPPED: 空間センシングサービスが設定されていません");
                self.missing_sensing_reported = true;
            }
            return None;
        };

        let mut report = ScanReport::default();
        let (new_planes, new_path_points) = self.sync_planes(sensing.as_ref(), store);
        report.new_planes = new_planes;
        report.new_path_points = new_path_points;

        if self.has_moved_enough(&camera.position) && self.scan_cooldown.ready(now) {
            report.new_obstacles = self.scan_obstacles(sensing.as_ref(), camera, store);
            report.obstacle_scan_performed = true;

            if !report.new_obstacles.is_empty() {
                feedback.play_sound(clips::OBSTACLE_DETECTED, 0.6);
                feedback.vibrate(0.3, 0.1);
            }
        }

        self.sensing = Some(sensing);
        Some(report)
    }

    /// トラッキング平面を同期し、(新規平面数, 生成経路点数) を返す
    fn sync_planes(
        &mut self,
        sensing: &dyn SpatialSensing,
        store: &mut WaypointStore,
    ) -> (usize, usize) {
        let mut new_planes = 0;
        let mut new_points = 0;

        for plane in sensing.tracked_planes() {
            if let Some(visual) = self.planes.get_mut(&plane.id) {
                visual.refresh(&plane);
                continue;
            }

            let visual = PlaneVisual::build(&plane);
            self.stats.area_mapped += visual.area;
            self.planes.insert(plane.id, visual);
            new_planes += 1;

            if plane.alignment == PlaneAlignment::HorizontalUp {
                new_points += generate_plane_waypoints(
                    &plane,
                    self.config.waypoint_grid_size_m,
                    store,
                );
            }

            debug!(
                plane_id = plane.id.0,
                alignment = ?plane.alignment,
                area_mapped = self.stats.area_mapped,
                "PLANE_TRACKED: 新しい平面をトラッキングしました"
            );
        }

        self.stats.planes_tracked = self.planes.len();
        self.stats.path_points_generated += new_points as u64;
        (new_planes, new_points)
    }

    /// ユーザー中心のグリッドを走査して障害物を登録する
    fn scan_obstacles(
        &mut self,
        sensing: &dyn SpatialSensing,
        camera: &Pose,
        store: &mut WaypointStore,
    ) -> Vec<WaypointId> {
        let density = self.config.scan_density_m;
        let steps = if density > 0.0 {
            (self.config.scan_radius_m / density).floor() as i64
        } else {
            0
        };
        let origin = camera.position;
        let limit = self.config.max_obstacles_per_scan;
        let mut created = Vec::new();
        let mut cells_probed = 0usize;

        'cells: for ix in -steps..=steps {
            for iz in -steps..=steps {
                if created.len() >= limit {
                    break 'cells;
                }
                let offset = Vec2::new(ix as f64 * density, iz as f64 * density);
                if offset.magnitude() < self.config.self_exclusion_radius_m {
                    continue;
                }
                let cell = Vec3::new(origin.x + offset.x, origin.y, origin.z + offset.y);
                cells_probed += 1;

                if let Some(position) = self.probe_cell(sensing, cell) {
                    if let Some(id) =
                        self.register_obstacle(sensing, store, position, DetectionSource::GridProbe)
                    {
                        created.push(id);
                        if created.len() >= limit {
                            break 'cells;
                        }
                    }
                }

                if let Some(screen) = sensing.project_to_screen(camera, cell) {
                    let vertical = sensing
                        .scene_hit_test(camera, screen)
                        .into_iter()
                        .find(|hit| !hit.alignment.is_horizontal());
                    if let Some(hit) = vertical {
                        if let Some(id) = self.register_obstacle(
                            sensing,
                            store,
                            hit.point,
                            DetectionSource::SceneHitTest,
                        ) {
                            created.push(id);
                        }
                    }
                }
            }
        }

        self.stats.scan_count += 1;
        self.last_scan_position = Some(origin);

        info!(
            scan_count = self.stats.scan_count,
            cells_probed,
            new_obstacles = created.len(),
            obstacles_found = self.stats.obstacles_found,
            "SCAN_COMPLETED: グリッド障害物スキャンが完了しました"
        );
        created
    }

    /// 1セル分のプローブ。障害物候補の位置を返す
    ///
    /// 下向きプローブで床を求め、床から上向きにプローブする。下向きプローブが
    /// 平面・ウェイポイント以外の面に当たった場合はそのセル自体が塞がっているとみなす。
    fn probe_cell(&self, sensing: &dyn SpatialSensing, cell: Vec3) -> Option<Vec3> {
        let floor = sensing.probe(cell, Vec3::DOWN, self.config.floor_probe_distance_m)?;
        if floor.surface == SurfaceTag::Other {
            return Some(floor.point);
        }

        let base = floor.point + Vec3::UP * PROBE_LIFT;
        let hit = sensing.probe(base, Vec3::UP, self.config.obstacle_detection_height_m)?;
        match hit.surface {
            SurfaceTag::Other => Some(Vec3::new(hit.point.x, floor.point.y, hit.point.z)),
            SurfaceTag::Waypoint | SurfaceTag::Plane => None,
        }
    }

    /// 重複がなければ障害物ウェイポイントを登録する
    fn register_obstacle(
        &mut self,
        sensing: &dyn SpatialSensing,
        store: &mut WaypointStore,
        position: Vec3,
        source: DetectionSource,
    ) -> Option<WaypointId> {
        let dedup = self.config.obstacle_dedup_distance();
        if store.any_within(&position, dedup, |w| w.is_obstacle()) {
            return None;
        }

        let height = self.estimate_height(sensing, position);
        let severity = self.config.default_obstacle_severity;
        let id = store.add(
            WaypointKind::Obstacle { height, severity },
            position,
            Vec3::FORWARD,
        );
        self.obstacle_markers.insert(
            id,
            ObstacleMarker {
                waypoint_id: id,
                position,
                height,
                source,
            },
        );
        self.stats.obstacles_found += 1;

        info!(
            waypoint_id = %id,
            source = ?source,
            x = position.x,
            y = position.y,
            z = position.z,
            height,
            "OBSTACLE_DETECTED: 障害物を検出しました"
        );
        Some(id)
    }

    /// 上向きの短いプローブで高さを推定する。ヒットしなければ既定値
    fn estimate_height(&self, sensing: &dyn SpatialSensing, position: Vec3) -> f64 {
        let max = self.config.max_obstacle_height_m;
        sensing
            .probe(position + Vec3::UP * PROBE_LIFT, Vec3::UP, max)
            .map(|hit| (hit.distance + PROBE_LIFT).min(max))
            .unwrap_or(self.config.default_obstacle_height_m)
    }

    /// 環境マップのクリア
    ///
    /// 平面・障害物の表示表現、両トラッキング辞書、スキャン統計、ウェイポイントストアを
    /// 一括でリセットします。スキャン状態自体は変更しません。
    pub fn clear_environment(&mut self, store: &mut WaypointStore) {
        self.planes.reset();
        self.obstacle_markers.reset();
        self.stats = ScanStats::default();
        self.scan_cooldown.reset();
        self.last_scan_position = None;
        store.clear();
        info!("ENVIRONMENT_CLEARED: 環境マップをクリアしました");
    }
}

/// 上向き水平面の外接範囲にグリッド状の経路ウェイポイント候補を生成する
///
/// 候補は境界多角形の内側にあり、既存のどのウェイポイントからも `0.9 × grid_size`
/// 以上離れているもののみ登録します。グリッド候補が一つも境界内に入らない細い面では
/// 面の中心を候補にします。登録数を返します。
pub fn generate_plane_waypoints(
    plane: &TrackedPlane,
    grid_size: f64,
    store: &mut WaypointStore,
) -> usize {
    if grid_size <= 0.0 || plane.boundary.len() < 3 {
        return 0;
    }

    let (min, max) = bounding_box(&plane.boundary);
    let dedup = 0.9 * grid_size;
    let mut inside = 0;
    let mut generated = 0;
    let try_add = |candidate: Vec2, store: &mut WaypointStore| {
        let position = Vec3::from_planar(candidate, plane.center.y);
        if store.any_within(&position, dedup, |_| true) {
            return false;
        }
        store.add(WaypointKind::PathPoint, position, Vec3::FORWARD);
        true
    };

    let mut x = min.x + grid_size * 0.5;
    while x <= max.x {
        let mut z = min.y + grid_size * 0.5;
        while z <= max.y {
            let candidate = Vec2::new(x, z);
            if geometry::point_in_polygon(candidate, &plane.boundary) {
                inside += 1;
                if try_add(candidate, store) {
                    generated += 1;
                }
            }
            z += grid_size;
        }
        x += grid_size;
    }

    let center = plane.center.planar();
    if inside == 0 && geometry::point_in_polygon(center, &plane.boundary) && try_add(center, store) {
        debug!(plane = plane.id.0, "NARROW_PLANE: グリッドに収まらない面の中心を経路点にしました");
        generated += 1;
    }

    generated
}

fn bounding_box(points: &[Vec2]) -> (Vec2, Vec2) {
    let mut min = Vec2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}
