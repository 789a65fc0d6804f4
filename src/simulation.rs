//! # Simulation モジュール
//!
//! ナビゲーション支援セッションを時間駆動で再現するシミュレーションエンジンを提供します。
//!
//! 模擬ユーザーはシナリオの経路を歩き、スキャナーとガイダンスコントローラーは
//! 単一の制御ループ上で毎ステップ呼び出されます。遅延・周期アクション（スキャン進捗の
//! 読み上げ、経路概要の読み上げ）はスケジューラに登録され、ステップ末尾でポーリングされます。
//!
//! ## フェーズ
//!
//! 1. **スキャン**: `scan_duration_s` の間、調査経路を歩きながら環境をスキャン
//! 2. **ナビゲーション**: 経路を計画し、到着するか最大時間に達するまで誘導
//! 3. **終了**
//!
//! ## 各ステップの処理順序
//!
//! 1. **フェーズ遷移**: スキャン終了時刻ならナビゲーションを開始
//! 2. **歩行**: 模擬ユーザーの姿勢を更新
//! 3. **スキャナー / ガイダンス処理**: 現在フェーズのコンポーネントを1ティック実行
//! 4. **スケジューラ処理**: 期限に達した遅延・周期アクションを実行
//!
//! ## 使用例
//!
//! ```no_run
//! use wayfinder::scenario::ScenarioConfig;
//! use wayfinder::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::from_file("scenarios/corridor.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize();
//! let report = engine.run();
//! report.print();
//! # Ok::<(), wayfinder::error::ScenarioError>(())
//! ```

use tracing::{debug, info, warn};

use crate::environment::SimulatedEnvironment;
use crate::error::NavigationError;
use crate::models::common::{Pose, Vec2, Vec3};
use crate::models::feedback::{FeedbackCounts, FeedbackLog};
use crate::models::guidance::{GuidanceController, GuidanceEvent, GuidanceStats};
use crate::models::scanner::{ScanStats, Scanner};
use crate::models::scheduler::{Scheduler, TaskHandle};
use crate::models::traits::FeedbackSink;
use crate::models::waypoint::WaypointStore;
use crate::scenario::ScenarioConfig;

/// 経路概要で読み上げる区間数
const ROUTE_OVERVIEW_LOOKAHEAD: usize = 3;

/// 制御ループが保持するセッション状態
///
/// スケジューラのアクションはこの状態への可変参照を受け取ります。
pub struct SessionState {
    pub now: f64,
    pub pose: Pose,
    pub store: WaypointStore,
    pub scanner: Scanner,
    pub guidance: GuidanceController,
    pub feedback: FeedbackLog,
}

impl SessionState {
    /// 環境マップのクリア。ナビゲーション中なら先に停止する
    pub fn clear_environment(&mut self) {
        self.guidance.stop_navigation(&mut self.feedback);
        self.scanner.clear_environment(&mut self.store);
    }
}

/// セッションのフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Navigating,
    Finished,
}

/// シミュレーション結果
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub steps: u64,
    pub simulated_time_s: f64,
    pub arrived: bool,
    pub navigation_error: Option<NavigationError>,
    pub final_position: Vec3,
    pub waypoints: usize,
    pub obstacles: usize,
    pub scan: ScanStats,
    pub guidance: GuidanceStats,
    pub feedback: FeedbackCounts,
}

impl SimulationReport {
    pub fn print(&self) {
        println!("=== シミュレーション結果 ===");
        println!("ステップ数: {}", self.steps);
        println!("経過時間: {:.1}秒", self.simulated_time_s);
        println!("到着: {}", if self.arrived { "はい" } else { "いいえ" });
        if let Some(err) = &self.navigation_error {
            println!("ナビゲーションエラー: {}", err);
        }
        println!(
            "最終位置: ({:.2}, {:.2})",
            self.final_position.x, self.final_position.z
        );
        println!();

        println!("=== スキャン統計 ===");
        println!("スキャン回数: {}", self.scan.scan_count);
        println!("検出障害物: {}", self.scan.obstacles_found);
        println!("マップ面積: {:.1}m²", self.scan.area_mapped);
        println!("トラッキング平面: {}", self.scan.planes_tracked);
        println!("生成経路点: {}", self.scan.path_points_generated);
        println!("ウェイポイント総数: {} (障害物 {})", self.waypoints, self.obstacles);
        println!();

        println!("=== ガイダンス統計 ===");
        println!("方向案内: {}", self.guidance.instructions_spoken);
        println!("重複抑止: {}", self.guidance.repeats_suppressed);
        println!("障害物警告: {}", self.guidance.obstacle_warnings);
        println!(
            "経路逸脱 / 復帰: {} / {}",
            self.guidance.off_route_events, self.guidance.back_on_route_events
        );
        println!("再計画: {}", self.guidance.replans);
        println!();

        println!("=== フィードバック出力 ===");
        println!("読み上げ: {}", self.feedback.speech);
        println!("効果音: {}", self.feedback.sounds);
        println!("振動: {}", self.feedback.vibrations);
    }
}

/// 折れ線に沿って歩く
#[derive(Debug, Clone)]
struct ScriptedWalk {
    points: Vec<Vec2>,
    next: usize,
}

impl ScriptedWalk {
    fn new(points: Vec<Vec2>) -> Self {
        Self { points, next: 0 }
    }

    fn advance(&mut self, pose: &mut Pose, distance: f64) {
        let mut remaining = distance;
        while remaining > 0.0 && self.next < self.points.len() {
            let target = self.points[self.next];
            remaining -= step_toward(pose, target, remaining);
            if pose.position.planar().distance(&target) < 1e-6 {
                self.next += 1;
            } else {
                break;
            }
        }
    }
}

/// 目標点に向けて最大 `max_distance` だけ進み、向きを進行方向に合わせる。移動距離を返す
fn step_toward(pose: &mut Pose, target: Vec2, max_distance: f64) -> f64 {
    let here = pose.position.planar();
    let delta = target - here;
    let distance = delta.magnitude();
    if distance < 1e-9 {
        return 0.0;
    }
    let moved = distance.min(max_distance);
    let direction = delta * (1.0 / distance);
    pose.position = Vec3::from_planar(here + direction * moved, pose.position.y);
    pose.forward = Vec3::new(direction.x, 0.0, direction.y);
    moved
}

/// シミュレーションエンジン
pub struct SimulationEngine {
    pub dt: f64,
    pub max_time: f64,
    pub step_count: u64,
    pub verbose_level: u8,

    config: ScenarioConfig,
    state: SessionState,
    scheduler: Scheduler<SessionState>,
    phase: Phase,
    survey: ScriptedWalk,
    route: Option<ScriptedWalk>,
    progress_task: Option<TaskHandle>,
    overview_task: Option<TaskHandle>,
    navigation_error: Option<NavigationError>,
}

impl SimulationEngine {
    /// シナリオからエンジンを構築します
    ///
    /// 空間センシングとパスプランナーはシナリオの環境定義から生成し、
    /// スキャナーとガイダンスコントローラーに注入します。
    pub fn new(config: ScenarioConfig, verbose_level: u8) -> Self {
        let environment = SimulatedEnvironment::new(config.environment.clone());
        let scanner = Scanner::with_sensing(config.scanner.clone(), environment);
        let guidance =
            GuidanceController::with_planner(config.guidance.clone(), config.planner.clone());

        let start = Vec3::from_planar(config.walk.start, config.walk.eye_height_m);
        let state = SessionState {
            now: 0.0,
            pose: Pose::new(start, Vec3::FORWARD),
            store: WaypointStore::new(),
            scanner,
            guidance,
            feedback: FeedbackLog::new(),
        };

        let route = (!config.walk.route.is_empty())
            .then(|| ScriptedWalk::new(config.walk.route.clone()));

        Self {
            dt: config.sim.dt_s,
            max_time: config.sim.t_max_s,
            step_count: 0,
            verbose_level,
            survey: ScriptedWalk::new(config.walk.survey.clone()),
            route,
            config,
            state,
            scheduler: Scheduler::new(),
            phase: Phase::Scanning,
            progress_task: None,
            overview_task: None,
            navigation_error: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    /// マーカーを配置し、最初のフェーズを開始します
    pub fn initialize(&mut self) {
        for marker in &self.config.markers {
            self.state
                .store
                .add(marker.kind.waypoint_kind(), marker.position, Vec3::FORWARD);
        }

        if self.verbose_level > 0 {
            info!(
                name = %self.config.meta.name,
                markers = self.config.markers.len(),
                surfaces = self.config.environment.surfaces.len(),
                boxes = self.config.environment.boxes.len(),
                "初期化完了"
            );
        }

        if self.config.sim.scan_duration_s > 0.0 {
            self.begin_scanning();
        } else {
            self.begin_navigation();
        }
    }

    /// 終了するか最大時間に達するまで実行し、結果を返します
    pub fn run(&mut self) -> SimulationReport {
        info!("=== シミュレーション実行開始 ===");

        while self.phase != Phase::Finished && self.state.now < self.max_time {
            self.step();

            if self.verbose_level > 0 && self.step_count % 100 == 0 {
                let progress = (self.state.now / self.max_time) * 100.0;
                info!(
                    "進行状況: {:.1}% ({:.1}/{:.1}秒) フェーズ: {:?}",
                    progress, self.state.now, self.max_time, self.phase
                );
            }
        }

        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.1}秒", self.state.now);
        info!("総ステップ数: {}", self.step_count);

        self.report()
    }

    /// 1ステップ進める
    pub fn step(&mut self) {
        if self.phase == Phase::Scanning && self.state.now >= self.config.sim.scan_duration_s {
            self.finish_scanning();
        }

        let walk_distance = self.config.walk.speed_mps * self.dt;
        match self.phase {
            Phase::Scanning => {
                self.survey.advance(&mut self.state.pose, walk_distance);
                let state = &mut self.state;
                state.scanner.tick(
                    state.now,
                    Some(&state.pose),
                    &mut state.store,
                    &mut state.feedback,
                );
            }
            Phase::Navigating => {
                self.walk_navigation(walk_distance);
                let state = &mut self.state;
                let events =
                    state
                        .guidance
                        .tick(state.now, &state.pose, &state.store, &mut state.feedback);
                if events.contains(&GuidanceEvent::Arrived) {
                    self.cancel_overview();
                    self.phase = Phase::Finished;
                }
            }
            Phase::Finished => {}
        }

        let now = self.state.now;
        self.scheduler.poll(now, &mut self.state);

        self.state.now += self.dt;
        self.step_count += 1;
    }

    /// ナビゲーションを停止し、予約済みの経路概要を取り消す
    pub fn stop_navigation(&mut self) -> bool {
        self.cancel_overview();
        let stopped = self.state.guidance.stop_navigation(&mut self.state.feedback);
        if stopped {
            self.phase = Phase::Finished;
        }
        stopped
    }

    /// 環境マップをクリアする
    pub fn clear_environment(&mut self) {
        self.cancel_overview();
        self.state.clear_environment();
        if self.phase == Phase::Navigating {
            self.phase = Phase::Finished;
        }
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            steps: self.step_count,
            simulated_time_s: self.state.now,
            arrived: self.state.guidance.stats().arrivals > 0,
            navigation_error: self.navigation_error.clone(),
            final_position: self.state.pose.position,
            waypoints: self.state.store.len(),
            obstacles: self.state.store.obstacles().count(),
            scan: self.state.scanner.stats().clone(),
            guidance: self.state.guidance.stats().clone(),
            feedback: self.state.feedback.counts(),
        }
    }

    fn begin_scanning(&mut self) {
        self.phase = Phase::Scanning;
        self.state.scanner.start_scanning(&mut self.state.feedback);

        let handle = self.scheduler.schedule_recurring(
            self.state.now,
            self.config.sim.scan_progress_interval_s,
            |s: &SessionState| s.scanner.is_scanning(),
            |s: &mut SessionState| {
                let found = s.scanner.stats().obstacles_found;
                s.feedback
                    .speak(&format!("Scanning, {} obstacles found so far.", found));
            },
        );
        self.progress_task = Some(handle);
    }

    fn finish_scanning(&mut self) {
        if let Some(handle) = self.progress_task.take() {
            self.scheduler.cancel(handle);
        }
        self.state.scanner.stop_scanning(&mut self.state.feedback);
        self.begin_navigation();
    }

    fn begin_navigation(&mut self) {
        let state = &mut self.state;
        let result =
            state
                .guidance
                .start_navigation(state.now, &state.pose, &mut state.store, &mut state.feedback);

        match result {
            Ok(()) => {
                self.phase = Phase::Navigating;
                let handle = self.scheduler.schedule_once(
                    self.state.now,
                    self.config.sim.route_overview_delay_s,
                    |s: &mut SessionState| {
                        let overview = s.guidance.path().map(|path| {
                            path.upcoming_description(path.current_index(), ROUTE_OVERVIEW_LOOKAHEAD)
                        });
                        if let Some(text) = overview {
                            s.feedback.speak(&text);
                        }
                    },
                );
                self.overview_task = Some(handle);
            }
            Err(err) => {
                warn!(error = %err, "ナビゲーションを開始できなかったため終了します");
                self.navigation_error = Some(err);
                self.phase = Phase::Finished;
            }
        }
    }

    fn cancel_overview(&mut self) {
        if let Some(handle) = self.overview_task.take() {
            if self.scheduler.cancel(handle) {
                debug!("ROUTE_OVERVIEW_CANCELLED: 経路概要の読み上げを取り消しました");
            }
        }
    }

    fn walk_navigation(&mut self, distance: f64) {
        if let Some(route) = self.route.as_mut() {
            route.advance(&mut self.state.pose, distance);
            return;
        }
        let target = self
            .state
            .guidance
            .path()
            .and_then(|path| path.next())
            .map(|p| p.planar());
        if let Some(target) = target {
            step_toward(&mut self.state.pose, target, distance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{BoxSpec, EnvironmentConfig, SurfaceSpec};
    use crate::scenario::{MarkerConfig, MarkerKind, ScenarioMeta, SimulationConfig, WalkConfig};

    fn corridor_scenario(scan_duration_s: f64) -> ScenarioConfig {
        ScenarioConfig {
            meta: ScenarioMeta {
                version: "1.0".to_string(),
                name: "test corridor".to_string(),
                description: String::new(),
            },
            sim: SimulationConfig {
                dt_s: 0.1,
                t_max_s: 60.0,
                scan_duration_s,
                scan_progress_interval_s: 2.0,
                route_overview_delay_s: 1.0,
            },
            scanner: Default::default(),
            guidance: Default::default(),
            planner: Default::default(),
            environment: EnvironmentConfig {
                surfaces: vec![SurfaceSpec::Floor {
                    id: 1,
                    height: 0.0,
                    boundary: vec![
                        Vec2::new(-2.0, -1.0),
                        Vec2::new(2.0, -1.0),
                        Vec2::new(2.0, 12.0),
                        Vec2::new(-2.0, 12.0),
                    ],
                }],
                boxes: vec![BoxSpec {
                    name: "bin".to_string(),
                    center: Vec2::new(1.5, 2.0),
                    size: Vec3::new(0.4, 0.8, 0.4),
                    base: 0.0,
                }],
                ..Default::default()
            },
            markers: vec![
                MarkerConfig {
                    kind: MarkerKind::Start,
                    position: Vec3::ZERO,
                },
                MarkerConfig {
                    kind: MarkerKind::End,
                    position: Vec3::new(0.0, 0.0, 10.0),
                },
            ],
            walk: WalkConfig {
                survey: vec![Vec2::new(0.0, 2.0), Vec2::new(0.0, 0.0)],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_scan_then_navigate_to_arrival() {
        let mut engine = SimulationEngine::new(corridor_scenario(4.0), 0);
        engine.initialize();
        assert_eq!(engine.phase(), Phase::Scanning);

        let report = engine.run();
        assert!(report.arrived);
        assert_eq!(engine.phase(), Phase::Finished);
        assert!(report.scan.scan_count > 0);
        assert!(report.scan.obstacles_found > 0);
        assert!(report.scan.path_points_generated > 0);
        assert!(report.simulated_time_s < 60.0);

        let spoken = engine.state().feedback.spoken();
        assert!(spoken.iter().any(|s| s.starts_with("Scanning, ")));
        assert!(spoken.iter().any(|s| s.starts_with("Walk ")));
        assert_eq!(
            spoken
                .iter()
                .filter(|s| **s == "You have arrived at your destination.")
                .count(),
            1
        );
        assert_eq!(engine.pending_tasks(), 0);
    }

    #[test]
    fn test_navigation_without_scan() {
        let mut engine = SimulationEngine::new(corridor_scenario(0.0), 0);
        engine.initialize();
        assert_eq!(engine.phase(), Phase::Navigating);

        let report = engine.run();
        assert!(report.arrived);
        assert_eq!(report.scan.scan_count, 0);
    }

    #[test]
    fn test_stop_cancels_route_overview() {
        let mut engine = SimulationEngine::new(corridor_scenario(0.0), 0);
        engine.initialize();
        assert_eq!(engine.pending_tasks(), 1);

        assert!(engine.stop_navigation());
        assert_eq!(engine.pending_tasks(), 0);
        assert!(!engine.stop_navigation());
        for _ in 0..20 {
            engine.step();
        }
        assert!(!engine
            .state()
            .feedback
            .spoken()
            .iter()
            .any(|s| s.starts_with("Walk ")));
    }

    #[test]
    fn test_failed_start_finishes_with_error() {
        let mut config = corridor_scenario(0.0);
        config.markers.truncate(1);
        config.markers[0].kind = MarkerKind::Path;
        config.environment.surfaces.clear();

        let mut engine = SimulationEngine::new(config, 0);
        engine.initialize();
        let report = engine.run();
        assert!(!report.arrived);
        assert_eq!(
            report.navigation_error,
            Some(NavigationError::NotEnoughWaypoints {
                required: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_clear_environment_resets_map_and_stops() {
        let mut engine = SimulationEngine::new(corridor_scenario(0.0), 0);
        engine.initialize();
        engine.step();

        engine.clear_environment();
        assert!(engine.state().store.is_empty());
        assert!(!engine.state().guidance.is_navigating());
        assert_eq!(engine.phase(), Phase::Finished);
        assert_eq!(engine.report().scan, ScanStats::default());
    }
}
