use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{ErrorCategory, NavigationError};
use crate::models::common::{Pose, Vec3, geometry};
use crate::models::direction::{DirectionScheme, format_distance, relative_direction};
use crate::models::feedback::clips;
use crate::models::path::PlannedPath;
use crate::models::scheduler::Cooldown;
use crate::models::traits::{FeedbackSink, HapticSide, PathPlanner};
use crate::models::waypoint::{WaypointId, WaypointKind, WaypointStore};

/// 触覚の左右を振り分ける方位角のしきい値（度）
const HAPTIC_SIDE_THRESHOLD_DEG: f64 = 15.0;

/// 方向案内の更新トリガー。どちらか一方のみが有効
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateTrigger {
    /// 前回案内からの移動距離
    #[default]
    DistanceMoved,
    /// 前回案内からの経過時間
    Elapsed,
}

/// ガイダンス設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    pub obstacle_check_interval_s: f64,
    /// この距離以内の障害物を追跡する（m）
    pub obstacle_warning_distance_m: f64,
    /// この距離以内の最も近い障害物を警告対象にする（m）
    pub high_alert_distance_m: f64,
    /// 前方扇形の半角（度）
    pub forward_cone_deg: f64,
    pub destination_info_interval_s: f64,
    /// 目的地距離の再通知に必要な変化量（m）
    pub destination_change_threshold_m: f64,
    /// カウントダウン音を鳴らし始める距離（m）
    pub final_approach_distance_m: f64,
    pub off_route_check_interval_s: f64,
    pub off_route_threshold_m: f64,
    pub update_trigger: UpdateTrigger,
    pub update_distance_m: f64,
    pub update_interval_s: f64,
    /// これ未満の速度では低速時の追加案内を行う（m/s）
    pub slow_speed_mps: f64,
    pub slow_update_interval_s: f64,
    /// これを超える方位角は「曲がる」案内になる（度）
    pub turn_threshold_deg: f64,
    /// 目的地到着とみなす距離（m）
    pub reached_distance_m: f64,
    /// 経路点を通過したとみなす距離（m）
    pub waypoint_reach_distance_m: f64,
    /// 重複抑止に使う直近案内文の保持数
    pub instruction_history_cap: usize,
    pub direction_scheme: DirectionScheme,
    /// 残りメートル数で引くカウントダウン音（範囲外は末尾に丸める）
    pub countdown_clips: Vec<String>,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            obstacle_check_interval_s: 0.5,
            obstacle_warning_distance_m: 2.0,
            high_alert_distance_m: 1.0,
            forward_cone_deg: 60.0,
            destination_info_interval_s: 3.0,
            destination_change_threshold_m: 2.0,
            final_approach_distance_m: 5.0,
            off_route_check_interval_s: 1.0,
            off_route_threshold_m: 1.5,
            update_trigger: UpdateTrigger::DistanceMoved,
            update_distance_m: 2.0,
            update_interval_s: 4.0,
            slow_speed_mps: 0.3,
            slow_update_interval_s: 2.0,
            turn_threshold_deg: 45.0,
            reached_distance_m: 1.0,
            waypoint_reach_distance_m: 1.0,
            instruction_history_cap: 5,
            direction_scheme: DirectionScheme::Coarse,
            countdown_clips: (0..=5).map(|i| format!("countdown_{}", i)).collect(),
        }
    }
}

/// ナビゲーション状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationState {
    #[default]
    Idle,
    Navigating,
}

/// 1ティックで発生したガイダンス出力
#[derive(Debug, Clone, PartialEq)]
pub enum GuidanceEvent {
    Instruction { text: String, forced: bool },
    ObstacleWarning {
        waypoint_id: WaypointId,
        distance: f64,
        bearing: f64,
    },
    DestinationUpdate { distance: f64 },
    CountdownCue { clip: String },
    OffRoute { deviation: f64 },
    BackOnRoute { deviation: f64 },
    Arrived,
}

/// ガイダンス統計
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuidanceStats {
    pub instructions_spoken: u64,
    pub repeats_suppressed: u64,
    pub obstacle_warnings: u64,
    pub off_route_events: u64,
    pub back_on_route_events: u64,
    pub arrivals: u64,
    pub replans: u64,
}

/// ナビゲーション状況のスナップショット
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationStatus {
    pub state: NavigationState,
    pub cursor: usize,
    pub path_len: usize,
    pub distance_to_destination: Option<f64>,
    pub off_route: bool,
    pub nearby_obstacles: Vec<WaypointId>,
}

/// ガイダンスコントローラー
///
/// 計画済み経路に沿ってユーザーを誘導するナビゲーション制御ループです。
/// `tick` は毎フレーム呼ばれ、障害物・目的地・経路逸脱の各チェックをそれぞれの
/// 間隔でレート制限しながら実行します。
pub struct GuidanceController {
    config: GuidanceConfig,
    planner: Option<Box<dyn PathPlanner>>,
    state: NavigationState,
    path: Option<PlannedPath>,
    recent_instructions: VecDeque<String>,
    obstacle_cooldown: Cooldown,
    destination_cooldown: Cooldown,
    off_route_cooldown: Cooldown,
    last_update_position: Option<Vec3>,
    last_update_time: Option<f64>,
    last_sample: Option<(f64, Vec3)>,
    speed: f64,
    last_announced_distance: Option<f64>,
    last_countdown_index: Option<usize>,
    off_route: bool,
    nearby_obstacles: Vec<WaypointId>,
    stats: GuidanceStats,
}

impl GuidanceController {
    /// 新しいガイダンスコントローラーを作成します
    ///
    /// # 引数
    ///
    /// * `config` - ガイダンス設定
    /// * `planner` - パスプランナー。None の場合ナビゲーション開始は構成エラーになる
    pub fn new(config: GuidanceConfig, planner: Option<Box<dyn PathPlanner>>) -> Self {
        let obstacle_cooldown = Cooldown::new(config.obstacle_check_interval_s);
        let destination_cooldown = Cooldown::new(config.destination_info_interval_s);
        let off_route_cooldown = Cooldown::new(config.off_route_check_interval_s);
        Self {
            config,
            planner,
            state: NavigationState::Idle,
            path: None,
            recent_instructions: VecDeque::new(),
            obstacle_cooldown,
            destination_cooldown,
            off_route_cooldown,
            last_update_position: None,
            last_update_time: None,
            last_sample: None,
            speed: 0.0,
            last_announced_distance: None,
            last_countdown_index: None,
            off_route: false,
            nearby_obstacles: Vec::new(),
            stats: GuidanceStats::default(),
        }
    }

    pub fn with_planner<P: PathPlanner + 'static>(config: GuidanceConfig, planner: P) -> Self {
        Self::new(config, Some(Box::new(planner)))
    }

    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn is_navigating(&self) -> bool {
        self.state == NavigationState::Navigating
    }

    pub fn path(&self) -> Option<&PlannedPath> {
        self.path.as_ref()
    }

    pub fn stats(&self) -> &GuidanceStats {
        &self.stats
    }

    /// ナビゲーション開始
    ///
    /// 開始点・終了点がなければ先頭と末尾の経路点を昇格させ、パスプランナーで経路を
    /// 求めます。失敗時は読み上げで理由を伝え、Idle のまま戻ります。
    ///
    /// # 引数
    ///
    /// * `now` - 現在時刻（秒）
    /// * `pose` - ユーザーの姿勢
    /// * `store` - ウェイポイントストア
    /// * `feedback` - フィードバック出力先
    pub fn start_navigation(
        &mut self,
        now: f64,
        pose: &Pose,
        store: &mut WaypointStore,
        feedback: &mut dyn FeedbackSink,
    ) -> Result<(), NavigationError> {
        let result = self.plan_route(store);
        let points = match result {
            Ok(points) => points,
            Err(err) => {
                Self::report_failure(&err, feedback);
                return Err(err);
            }
        };

        let total = points.len();
        self.path = Some(PlannedPath::new(points, self.config.waypoint_reach_distance_m));
        self.reset_progress(now, pose);
        self.state = NavigationState::Navigating;

        info!(
            path_len = total,
            x = pose.position.x,
            z = pose.position.z,
            "NAVIGATION_STARTED: ナビゲーションを開始しました"
        );
        feedback.play_sound(clips::NAVIGATION_START, 0.8);
        feedback.speak(&format!(
            "Navigation started. {} points to your destination.",
            total
        ));

        let mut events = Vec::new();
        self.update_direction(now, pose, true, feedback, &mut events);
        Ok(())
    }

    /// ナビゲーション停止。既に Idle なら何もせず false
    pub fn stop_navigation(&mut self, feedback: &mut dyn FeedbackSink) -> bool {
        if !self.is_navigating() {
            return false;
        }
        self.finish();
        info!("NAVIGATION_STOPPED: ナビゲーションを停止しました");
        feedback.play_sound(clips::NAVIGATION_STOP, 0.8);
        feedback.speak("Navigation stopped.");
        true
    }

    /// 1ティック分のナビゲーション処理
    ///
    /// 到着判定を最優先し、到着した場合は他のチェックを行わずに Idle へ遷移します。
    pub fn tick(
        &mut self,
        now: f64,
        pose: &Pose,
        store: &WaypointStore,
        feedback: &mut dyn FeedbackSink,
    ) -> Vec<GuidanceEvent> {
        let mut events = Vec::new();
        if !self.is_navigating() {
            return events;
        }

        self.sample_speed(now, &pose.position);
        if let Some(path) = self.path.as_mut() {
            path.advance(&pose.position);
        }

        if let Some(distance) = self.distance_to_destination(&pose.position, store) {
            if distance < self.config.reached_distance_m {
                self.arrive(feedback, &mut events);
                return events;
            }
            if self.destination_cooldown.ready(now) {
                self.announce_destination(distance, feedback, &mut events);
            }
        }

        if self.obstacle_cooldown.ready(now) {
            self.check_obstacles(pose, store, feedback, &mut events);
        }
        if self.off_route_cooldown.ready(now) {
            self.check_off_route(pose, feedback, &mut events);
        }
        if self.direction_update_due(now, &pose.position) {
            self.update_direction(now, pose, false, feedback, &mut events);
        }

        events
    }

    /// 現在の方向案内を重複抑止を無視して読み上げ直す
    pub fn repeat_instruction(
        &mut self,
        now: f64,
        pose: &Pose,
        feedback: &mut dyn FeedbackSink,
    ) -> Option<String> {
        if !self.is_navigating() {
            return None;
        }
        let mut events = Vec::new();
        self.update_direction(now, pose, true, feedback, &mut events);
        events.into_iter().find_map(|event| match event {
            GuidanceEvent::Instruction { text, .. } => Some(text),
            _ => None,
        })
    }

    /// 経路の再計画
    ///
    /// ナビゲーション中であれば経路を置き換えてカーソルを先頭に戻します。再計画に
    /// 失敗した場合は現在の経路のまま案内を続けます。Idle の場合は開始と同じです。
    pub fn replan(
        &mut self,
        now: f64,
        pose: &Pose,
        store: &mut WaypointStore,
        feedback: &mut dyn FeedbackSink,
    ) -> Result<(), NavigationError> {
        if !self.is_navigating() {
            return self.start_navigation(now, pose, store, feedback);
        }

        let points = match self.plan_route(store) {
            Ok(points) => points,
            Err(err) => {
                Self::report_failure(&err, feedback);
                return Err(err);
            }
        };

        let total = points.len();
        self.path = Some(PlannedPath::new(points, self.config.waypoint_reach_distance_m));
        self.reset_progress(now, pose);
        self.stats.replans += 1;

        info!(path_len = total, "ROUTE_REPLANNED: 経路を再計画しました");
        feedback.speak("Route updated.");
        let mut events = Vec::new();
        self.update_direction(now, pose, true, feedback, &mut events);
        Ok(())
    }

    /// 現在のナビゲーション状況
    pub fn status(&self, position: &Vec3, store: &WaypointStore) -> NavigationStatus {
        NavigationStatus {
            state: self.state,
            cursor: self.path.as_ref().map_or(0, |p| p.current_index()),
            path_len: self.path.as_ref().map_or(0, |p| p.count()),
            distance_to_destination: self.distance_to_destination(position, store),
            off_route: self.off_route,
            nearby_obstacles: self.nearby_obstacles.clone(),
        }
    }

    fn plan_route(&self, store: &mut WaypointStore) -> Result<Vec<Vec3>, NavigationError> {
        if store.is_empty() {
            return Err(NavigationError::NoWaypoints);
        }
        let Some(planner) = self.planner.as_deref() else {
            return Err(NavigationError::MissingCollaborator("path planner"));
        };

        ensure_endpoints(store)?;

        match planner.plan(store.all()) {
            Some(points) if !points.is_empty() => Ok(points),
            _ => Err(NavigationError::NoSafePath),
        }
    }

    fn report_failure(err: &NavigationError, feedback: &mut dyn FeedbackSink) {
        match err.category() {
            ErrorCategory::Configuration => {
                error!(error = %err, "NAVIGATION_UNAVAILABLE: 必要なコンポーネントがありません");
                feedback.speak(&err.spoken_message());
            }
            ErrorCategory::InsufficientData => {
                warn!(error = %err, "NAVIGATION_FAILED: ナビゲーションを開始できません");
                feedback.play_sound(clips::ERROR, 1.0);
                feedback.speak(&err.spoken_message());
            }
        }
    }

    fn reset_progress(&mut self, now: f64, pose: &Pose) {
        self.recent_instructions.clear();
        self.obstacle_cooldown.reset();
        self.destination_cooldown.reset();
        self.off_route_cooldown.reset();
        self.last_update_position = None;
        self.last_update_time = None;
        self.last_sample = Some((now, pose.position));
        self.speed = 0.0;
        self.last_announced_distance = None;
        self.last_countdown_index = None;
        self.off_route = false;
        self.nearby_obstacles.clear();
        if let Some(path) = self.path.as_mut() {
            path.advance(&pose.position);
        }
    }

    fn finish(&mut self) {
        self.state = NavigationState::Idle;
        self.path = None;
        self.off_route = false;
        self.nearby_obstacles.clear();
    }

    fn sample_speed(&mut self, now: f64, position: &Vec3) {
        if let Some((last_time, last_position)) = self.last_sample {
            let dt = now - last_time;
            if dt > 0.0 {
                self.speed = last_position.planar_distance(position) / dt;
            }
        }
        self.last_sample = Some((now, *position));
    }

    /// 目的地（正規の終了点、なければ経路の最終点）までの水平距離
    fn distance_to_destination(&self, position: &Vec3, store: &WaypointStore) -> Option<f64> {
        let destination = store
            .canonical_end()
            .map(|w| w.position)
            .or_else(|| self.path.as_ref().and_then(|p| p.final_point()))?;
        Some(position.planar_distance(&destination))
    }

    fn arrive(&mut self, feedback: &mut dyn FeedbackSink, events: &mut Vec<GuidanceEvent>) {
        self.finish();
        self.stats.arrivals += 1;
        info!("ARRIVED: 目的地に到着しました");
        feedback.play_sound(clips::ARRIVAL, 1.0);
        feedback.vibrate(0.8, 0.5);
        feedback.speak("You have arrived at your destination.");
        events.push(GuidanceEvent::Arrived);
    }

    fn check_obstacles(
        &mut self,
        pose: &Pose,
        store: &WaypointStore,
        feedback: &mut dyn FeedbackSink,
        events: &mut Vec<GuidanceEvent>,
    ) {
        let nearby: Vec<(WaypointId, Vec3, f64)> = store
            .obstacles()
            .map(|w| (w.id, w.position, pose.position.planar_distance(&w.position)))
            .filter(|(_, _, distance)| *distance <= self.config.obstacle_warning_distance_m)
            .collect();
        self.nearby_obstacles = nearby.iter().map(|(id, _, _)| *id).collect();

        let closest = nearby
            .iter()
            .filter(|(_, _, distance)| *distance <= self.config.high_alert_distance_m)
            .min_by(|a, b| a.2.total_cmp(&b.2));
        let Some(&(waypoint_id, position, distance)) = closest else {
            return;
        };

        let bearing = pose.bearing_to(&position);
        if bearing.abs() > self.config.forward_cone_deg {
            debug!(waypoint_id = %waypoint_id, bearing, "OBSTACLE_OUTSIDE_CONE: 前方範囲外の障害物");
            return;
        }

        let direction = relative_direction(bearing, self.config.direction_scheme);
        let alert = self.config.high_alert_distance_m;
        let text = if distance < alert / 3.0 {
            format!("Stop! Obstacle {}, very close.", direction)
        } else if distance < alert * 2.0 / 3.0 {
            format!("Caution, obstacle {}, {}.", direction, format_distance(distance))
        } else {
            format!("Obstacle {}, {}.", direction, format_distance(distance))
        };

        let side = if bearing < -HAPTIC_SIDE_THRESHOLD_DEG {
            HapticSide::Left
        } else if bearing > HAPTIC_SIDE_THRESHOLD_DEG {
            HapticSide::Right
        } else {
            HapticSide::Front
        };
        let intensity = (1.0 - distance / alert).clamp(0.3, 1.0);

        warn!(
            waypoint_id = %waypoint_id,
            distance,
            bearing,
            tracked = self.nearby_obstacles.len(),
            "OBSTACLE_WARNING: 障害物に接近しています"
        );
        feedback.play_sound(clips::OBSTACLE_WARNING, 1.0);
        feedback.vibrate_directional(intensity, 0.3, side);
        feedback.speak(&text);
        self.stats.obstacle_warnings += 1;
        events.push(GuidanceEvent::ObstacleWarning {
            waypoint_id,
            distance,
            bearing,
        });
    }

    fn announce_destination(
        &mut self,
        distance: f64,
        feedback: &mut dyn FeedbackSink,
        events: &mut Vec<GuidanceEvent>,
    ) {
        let changed = self.last_announced_distance.is_none_or(|last| {
            (last - distance).abs() > self.config.destination_change_threshold_m
        });
        if changed {
            self.last_announced_distance = Some(distance);
            debug!(distance, "DESTINATION_INFO: 目的地までの距離を通知");
            feedback.speak(&format!(
                "Your destination is {} away.",
                format_distance(distance)
            ));
            events.push(GuidanceEvent::DestinationUpdate { distance });
        }

        if distance >= self.config.final_approach_distance_m {
            return;
        }
        let Some(last_clip) = self.config.countdown_clips.len().checked_sub(1) else {
            return;
        };
        let index = (distance.floor().max(0.0) as usize).min(last_clip);
        if self.last_countdown_index == Some(index) {
            return;
        }
        self.last_countdown_index = Some(index);
        let clip = self.config.countdown_clips[index].clone();
        feedback.play_sound(&clip, 0.8);
        events.push(GuidanceEvent::CountdownCue { clip });
    }

    fn check_off_route(
        &mut self,
        pose: &Pose,
        feedback: &mut dyn FeedbackSink,
        events: &mut Vec<GuidanceEvent>,
    ) {
        let Some(path) = self.path.as_ref() else {
            return;
        };
        if path.count() < 2 {
            return;
        }

        let user = pose.position.planar();
        let cursor = path.current_index();
        let nearest = [cursor.checked_sub(1), Some(cursor), Some(cursor + 1)]
            .into_iter()
            .flatten()
            .filter(|&end| end >= 1 && end < path.count())
            .filter_map(|end| {
                let a = path.point_at(end - 1)?.planar();
                let b = path.point_at(end)?.planar();
                let closest = geometry::closest_point_on_segment(user, a, b);
                Some((closest, closest.distance(&user)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let Some((closest, deviation)) = nearest else {
            return;
        };

        let threshold = self.config.off_route_threshold_m;
        if !self.off_route && deviation > threshold {
            self.off_route = true;
            self.stats.off_route_events += 1;
            let back = Vec3::from_planar(closest, pose.position.y);
            let direction = relative_direction(pose.bearing_to(&back), self.config.direction_scheme);
            warn!(deviation, "OFF_ROUTE: 経路から外れました");
            feedback.play_sound(clips::OFF_ROUTE, 1.0);
            feedback.vibrate(0.6, 0.4);
            feedback.speak(&format!(
                "You are off route. The path is {}, {} away.",
                direction,
                format_distance(deviation)
            ));
            events.push(GuidanceEvent::OffRoute { deviation });
        } else if self.off_route && deviation <= threshold {
            self.off_route = false;
            self.stats.back_on_route_events += 1;
            info!(deviation, "BACK_ON_ROUTE: 経路に復帰しました");
            feedback.play_sound(clips::ON_ROUTE, 0.8);
            feedback.speak("You are back on route.");
            events.push(GuidanceEvent::BackOnRoute { deviation });
        }
    }

    fn direction_update_due(&self, now: f64, position: &Vec3) -> bool {
        let primary = match self.config.update_trigger {
            UpdateTrigger::DistanceMoved => self
                .last_update_position
                .is_none_or(|last| last.planar_distance(position) >= self.config.update_distance_m),
            UpdateTrigger::Elapsed => self
                .last_update_time
                .is_none_or(|last| now - last >= self.config.update_interval_s),
        };
        let slow = self.speed < self.config.slow_speed_mps
            && self
                .last_update_time
                .is_none_or(|last| now - last >= self.config.slow_update_interval_s);
        primary || slow
    }

    fn update_direction(
        &mut self,
        now: f64,
        pose: &Pose,
        forced: bool,
        feedback: &mut dyn FeedbackSink,
        events: &mut Vec<GuidanceEvent>,
    ) {
        self.last_update_position = Some(pose.position);
        self.last_update_time = Some(now);

        let Some((text, turn)) = self.compose_instruction(pose) else {
            return;
        };
        if self.emit_instruction(text, forced, feedback, events) && turn {
            feedback.play_sound(clips::TURN, 0.6);
        }
    }

    /// 案内文と、それが曲がる指示かどうか
    fn compose_instruction(&self, pose: &Pose) -> Option<(String, bool)> {
        let path = self.path.as_ref()?;
        let target = path.next()?;
        let bearing = pose.bearing_to(&target);
        let distance = format_distance(pose.position.planar_distance(&target));
        let direction = relative_direction(bearing, self.config.direction_scheme);

        let instruction = if path.is_final_target() {
            (format!("Destination is {}, {} away.", direction, distance), false)
        } else if bearing.abs() > self.config.turn_threshold_deg {
            if direction.starts_with("behind") {
                (format!("Turn around and walk {}.", distance), true)
            } else {
                (format!("Turn {} and walk {}.", direction, distance), true)
            }
        } else {
            (format!("Continue {} for {}.", direction, distance), false)
        };
        Some(instruction)
    }

    fn emit_instruction(
        &mut self,
        text: String,
        forced: bool,
        feedback: &mut dyn FeedbackSink,
        events: &mut Vec<GuidanceEvent>,
    ) -> bool {
        if !forced && self.recent_instructions.contains(&text) {
            self.stats.repeats_suppressed += 1;
            debug!(text = %text, "INSTRUCTION_SUPPRESSED: 直近と同じ案内のため省略");
            return false;
        }

        feedback.speak(&text);
        self.recent_instructions.push_back(text.clone());
        while self.recent_instructions.len() > self.config.instruction_history_cap {
            self.recent_instructions.pop_front();
        }
        self.stats.instructions_spoken += 1;
        info!(text = %text, forced, "INSTRUCTION: 方向案内");
        events.push(GuidanceEvent::Instruction { text, forced });
        true
    }
}

/// 開始点・終了点がなければ経路点の先頭と末尾を昇格させる
fn ensure_endpoints(store: &mut WaypointStore) -> Result<(), NavigationError> {
    let needs_start = store.canonical_start().is_none();
    let needs_end = store.canonical_end().is_none();
    if !needs_start && !needs_end {
        return Ok(());
    }

    let candidates: Vec<WaypointId> = store
        .all()
        .iter()
        .filter(|w| w.kind() == WaypointKind::PathPoint)
        .map(|w| w.id)
        .collect();
    let needed = usize::from(needs_start) + usize::from(needs_end);
    if candidates.len() < needed {
        let found = store.all().iter().filter(|w| !w.is_obstacle()).count();
        return Err(NavigationError::NotEnoughWaypoints { required: 2, found });
    }

    if needs_start {
        store.promote(candidates[0], WaypointKind::StartPoint)?;
    }
    if needs_end {
        store.promote(candidates[candidates.len() - 1], WaypointKind::EndPoint)?;
    }
    Ok(())
}
