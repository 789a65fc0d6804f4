//! 方位角から相対方向フレーズへの変換
//!
//! 方位角は前方を0度、右回りを正とした -180〜180 度の値です。
//! 各帯の上端は内側の帯に含まれます（例: 粗モードで 22.5 度ちょうどは "straight ahead"）。

use serde::{Deserialize, Serialize};

use crate::models::common::math_utils;

/// 方向表現の細かさ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionScheme {
    /// 8方向
    #[default]
    Coarse,
    /// 9方向
    Fine,
}

// (上端角度, 右側フレーズ, 左側フレーズ)
const COARSE_BANDS: [(f64, &str, &str); 4] = [
    (22.5, "straight ahead", "straight ahead"),
    (67.5, "slightly right", "slightly left"),
    (112.5, "right", "left"),
    (157.5, "sharp right", "sharp left"),
];
const COARSE_BEHIND: (&str, &str) = ("behind", "behind");

const FINE_BANDS: [(f64, &str, &str); 4] = [
    (10.0, "straight ahead", "straight ahead"),
    (35.0, "slightly to your right", "slightly to your left"),
    (80.0, "to your right", "to your left"),
    (135.0, "sharply to your right", "sharply to your left"),
];
const FINE_BEHIND: (&str, &str) = ("behind you to the right", "behind you to the left");

/// 方位角を相対方向フレーズに変換
pub fn relative_direction(bearing_deg: f64, scheme: DirectionScheme) -> &'static str {
    let bearing = math_utils::normalize_angle(bearing_deg);
    let magnitude = bearing.abs();
    let right = bearing >= 0.0;

    let (bands, behind) = match scheme {
        DirectionScheme::Coarse => (&COARSE_BANDS, COARSE_BEHIND),
        DirectionScheme::Fine => (&FINE_BANDS, FINE_BEHIND),
    };

    for &(edge, right_phrase, left_phrase) in bands.iter() {
        if magnitude <= edge {
            return if right { right_phrase } else { left_phrase };
        }
    }
    if right { behind.0 } else { behind.1 }
}

/// 距離の読み上げ表現
pub fn format_distance(distance: f64) -> String {
    if distance < 1.0 {
        return "less than 1 meter".to_string();
    }
    let meters = distance.round() as u64;
    if meters == 1 {
        "1 meter".to_string()
    } else {
        format!("{} meters", meters)
    }
}
