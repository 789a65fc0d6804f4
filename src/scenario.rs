use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::environment::{DirectPlanner, EnvironmentConfig, SurfaceSpec};
use crate::error::ScenarioError;
use crate::models::common::{Vec2, Vec3};
use crate::models::guidance::GuidanceConfig;
use crate::models::scanner::ScannerConfig;
use crate::models::waypoint::WaypointKind;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
    /// スキャンフェーズの長さ（秒）。0 ならスキャンせずにナビゲーションを始める
    #[serde(default)]
    pub scan_duration_s: f64,
    #[serde(default = "default_scan_progress_interval")]
    pub scan_progress_interval_s: f64,
    #[serde(default = "default_route_overview_delay")]
    pub route_overview_delay_s: f64,
}

fn default_scan_progress_interval() -> f64 {
    5.0
}

fn default_route_overview_delay() -> f64 {
    3.0
}

/// ユーザーが手動で置くマーカー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Start,
    End,
    Path,
}

impl MarkerKind {
    pub fn waypoint_kind(self) -> WaypointKind {
        match self {
            MarkerKind::Start => WaypointKind::StartPoint,
            MarkerKind::End => WaypointKind::EndPoint,
            MarkerKind::Path => WaypointKind::PathPoint,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarkerConfig {
    pub kind: MarkerKind,
    pub position: Vec3,
}

/// 模擬ユーザーの歩行設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalkConfig {
    pub speed_mps: f64,
    /// カメラ（目線）の高さ（m）
    pub eye_height_m: f64,
    /// 歩行開始位置（水平）
    pub start: Vec2,
    /// スキャンフェーズで歩く経路
    pub survey: Vec<Vec2>,
    /// ナビゲーション中に歩く経路。空なら計画経路に従って歩く
    pub route: Vec<Vec2>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            speed_mps: 1.0,
            eye_height_m: 1.5,
            start: Vec2::default(),
            survey: Vec::new(),
            route: Vec::new(),
        }
    }
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub guidance: GuidanceConfig,
    #[serde(default)]
    pub planner: DirectPlanner,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub markers: Vec<MarkerConfig>,
    #[serde(default)]
    pub walk: WalkConfig,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents =
            fs::read_to_string(path).map_err(|e| ScenarioError::Io(path.to_path_buf(), e))?;

        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::Parse(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// 設定の検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let invalid = |msg: String| Err(ScenarioError::Validation(msg));

        if self.sim.dt_s <= 0.0 {
            return invalid("dt_s must be positive".to_string());
        }
        if self.sim.t_max_s <= 0.0 {
            return invalid("t_max_s must be positive".to_string());
        }
        if self.sim.scan_duration_s < 0.0 || self.sim.scan_duration_s >= self.sim.t_max_s {
            return invalid(format!(
                "scan_duration_s {} must be within [0, t_max_s {})",
                self.sim.scan_duration_s, self.sim.t_max_s
            ));
        }

        let scanner = &self.scanner;
        if scanner.scan_density_m <= 0.0
            || scanner.scan_radius_m <= 0.0
            || scanner.waypoint_grid_size_m <= 0.0
        {
            return invalid("scanner density, radius and grid size must be positive".to_string());
        }

        let guidance = &self.guidance;
        if guidance.high_alert_distance_m > guidance.obstacle_warning_distance_m {
            return invalid(format!(
                "high_alert_distance_m {} exceeds obstacle_warning_distance_m {}",
                guidance.high_alert_distance_m, guidance.obstacle_warning_distance_m
            ));
        }
        if guidance.countdown_clips.is_empty() {
            return invalid("countdown_clips must not be empty".to_string());
        }

        let placeable = self.markers.len()
            + self
                .environment
                .surfaces
                .iter()
                .filter(|s| matches!(s, SurfaceSpec::Floor { .. }))
                .count();
        if placeable == 0 {
            return invalid("at least one marker or floor surface is required".to_string());
        }
        for kind in [MarkerKind::Start, MarkerKind::End] {
            let count = self.markers.iter().filter(|m| m.kind == kind).count();
            if count > 1 {
                return invalid(format!("{:?} marker is defined {} times", kind, count));
            }
        }

        if self.walk.speed_mps <= 0.0 {
            return invalid("walk speed_mps must be positive".to_string());
        }
        if self.walk.route.len() == 1 {
            return invalid("walk route needs at least two points".to_string());
        }

        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒", self.sim.t_max_s);
        println!("スキャン時間: {:.1}秒", self.sim.scan_duration_s);
        println!();

        println!("=== 環境 ===");
        let floors = self
            .environment
            .surfaces
            .iter()
            .filter(|s| matches!(s, SurfaceSpec::Floor { .. }))
            .count();
        println!("床: {}面", floors);
        println!("壁: {}面", self.environment.surfaces.len() - floors);
        println!("家具などの物体: {}個", self.environment.boxes.len());
        for b in &self.environment.boxes {
            println!(
                "  {}: ({:.1}, {:.1}) 高さ {:.2}m",
                if b.name.is_empty() { "-" } else { &b.name },
                b.center.x,
                b.center.y,
                b.base + b.size.y
            );
        }
        println!();

        println!("=== マーカー ===");
        for marker in &self.markers {
            println!(
                "  {:?}: ({:.1}, {:.1}, {:.1})",
                marker.kind, marker.position.x, marker.position.y, marker.position.z
            );
        }
        println!();

        println!("=== 歩行 ===");
        println!("速度: {:.2}m/s", self.walk.speed_mps);
        println!("スキャン時の経路点: {}", self.walk.survey.len());
        if self.walk.route.is_empty() {
            println!("ナビゲーション中: 計画経路に従う");
        } else {
            println!("ナビゲーション中の経路点: {}", self.walk.route.len());
        }
        println!("方向表現: {:?}", self.guidance.direction_scheme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::direction::DirectionScheme;
    use crate::models::guidance::UpdateTrigger;

    const MINIMAL: &str = r#"
meta:
  version: "1.0"
  name: minimal
sim:
  dt_s: 0.1
  t_max_s: 30.0
markers:
  - kind: start
    position: { x: 0.0, y: 0.0, z: 0.0 }
  - kind: end
    position: { x: 0.0, y: 0.0, z: 8.0 }
"#;

    #[test]
    fn test_minimal_scenario_uses_defaults() {
        let config: ScenarioConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.scanner, ScannerConfig::default());
        assert_eq!(config.guidance.update_trigger, UpdateTrigger::DistanceMoved);
        assert_eq!(config.sim.scan_progress_interval_s, 5.0);
        assert_eq!(config.walk.speed_mps, 1.0);
        assert_eq!(config.markers[1].kind.waypoint_kind(), WaypointKind::EndPoint);
    }

    #[test]
    fn test_overrides_and_environment() {
        let yaml = format!(
            "{}{}",
            MINIMAL,
            r#"
guidance:
  direction_scheme: fine
  update_trigger: elapsed
scanner:
  scan_density_m: 0.25
environment:
  surfaces:
    - type: floor
      id: 1
      boundary: [{ x: -2, y: -2 }, { x: 2, y: -2 }, { x: 2, y: 10 }, { x: -2, y: 10 }]
    - type: wall
      id: 2
      from: { x: -2, y: 10 }
      to: { x: 2, y: 10 }
      height: 2.5
  boxes:
    - name: chair
      center: { x: 1.0, y: 4.0 }
      size: { x: 0.5, y: 0.9, z: 0.5 }
"#
        );
        let config: ScenarioConfig = serde_yaml::from_str(&yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.guidance.direction_scheme, DirectionScheme::Fine);
        assert_eq!(config.guidance.update_trigger, UpdateTrigger::Elapsed);
        assert_eq!(config.scanner.scan_density_m, 0.25);
        assert_eq!(config.scanner.scan_radius_m, 3.0);
        assert_eq!(config.environment.surfaces.len(), 2);
        assert_eq!(config.environment.boxes[0].base, 0.0);
    }

    #[test]
    fn test_validation_errors() {
        let base: ScenarioConfig = serde_yaml::from_str(MINIMAL).unwrap();

        let mut config = base.clone();
        config.sim.dt_s = 0.0;
        assert!(matches!(config.validate(), Err(ScenarioError::Validation(_))));

        let mut config = base.clone();
        config.sim.scan_duration_s = 40.0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.guidance.high_alert_distance_m = 3.0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.markers.push(config.markers[0].clone());
        assert!(config.validate().is_err());

        let mut config = base;
        config.walk.route = vec![Vec2::new(0.0, 0.0)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = ScenarioConfig::from_file("scenarios/does_not_exist.yaml");
        assert!(matches!(result, Err(ScenarioError::FileNotFound(_))));
    }

    #[test]
    fn test_bundled_scenarios_are_valid() {
        for path in ["scenarios/corridor.yaml", "scenarios/living_room.yaml"] {
            let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(path);
            ScenarioConfig::from_file(&path).unwrap();
        }
    }
}
