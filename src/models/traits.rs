use crate::models::common::{Pose, Vec3};
use crate::models::sensing::{ProbeHit, SceneHit, ScreenPoint, TrackedPlane};
use crate::models::waypoint::Waypoint;

/// パスプランナー
///
/// ウェイポイント集合（障害物を含む）から安全な経路点列を返す純粋関数境界です。
pub trait PathPlanner {
    /// 経路計画。安全な経路がない場合は None
    fn plan(&self, waypoints: &[Waypoint]) -> Option<Vec<Vec3>>;
}

/// 空間センシングサービス
pub trait SpatialSensing {
    /// 現在トラッキング中の平面
    fn tracked_planes(&self) -> Vec<TrackedPlane>;

    /// レイプローブ。`max_distance` 以内に何もなければ None
    fn probe(&self, origin: Vec3, direction: Vec3, max_distance: f64) -> Option<ProbeHit>;

    /// ワールド座標の点をカメラのスクリーン座標へ投影。画面外なら None
    fn project_to_screen(&self, camera: &Pose, point: Vec3) -> Option<ScreenPoint>;

    /// スクリーン座標からのシーンヒットテスト（近い順）
    fn scene_hit_test(&self, camera: &Pose, screen: ScreenPoint) -> Vec<SceneHit>;
}

/// 触覚フィードバックの方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticSide {
    Left,
    Front,
    Right,
}

/// フィードバック出力（音声・効果音・触覚）
///
/// 実装はブロックしてはならない。読み上げや再生はキューに積むだけとする。
pub trait FeedbackSink {
    /// 音声読み上げ
    fn speak(&mut self, text: &str);

    /// 効果音の再生
    fn play_sound(&mut self, clip: &str, volume: f64);

    /// 振動
    fn vibrate(&mut self, intensity: f64, duration: f64);

    /// 方向付き振動。左右の区別ができない出力装置では通常の振動になる
    fn vibrate_directional(&mut self, intensity: f64, duration: f64, _side: HapticSide) {
        self.vibrate(intensity, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 左右の区別を持たない出力装置
    #[derive(Default)]
    struct MonoHaptics {
        vibrations: Vec<(f64, f64)>,
    }

    impl FeedbackSink for MonoHaptics {
        fn speak(&mut self, _text: &str) {}

        fn play_sound(&mut self, _clip: &str, _volume: f64) {}

        fn vibrate(&mut self, intensity: f64, duration: f64) {
            self.vibrations.push((intensity, duration));
        }
    }

    #[test]
    fn test_directional_vibration_falls_back_to_plain() {
        let mut sink = MonoHaptics::default();
        sink.vibrate_directional(0.7, 0.3, HapticSide::Left);
        sink.vibrate_directional(0.4, 0.2, HapticSide::Right);
        assert_eq!(sink.vibrations, vec![(0.7, 0.3), (0.4, 0.2)]);
    }
}
