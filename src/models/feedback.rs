use tracing::{debug, info};

use crate::models::traits::{FeedbackSink, HapticSide};

/// 効果音クリップ名
pub mod clips {
    pub const ERROR: &str = "error";
    pub const NAVIGATION_START: &str = "navigation_start";
    pub const NAVIGATION_STOP: &str = "navigation_stop";
    pub const ARRIVAL: &str = "arrival";
    pub const OBSTACLE_WARNING: &str = "obstacle_warning";
    pub const OBSTACLE_DETECTED: &str = "obstacle_detected";
    pub const OFF_ROUTE: &str = "off_route";
    pub const ON_ROUTE: &str = "on_route";
    pub const TURN: &str = "turn";
}

/// フィードバック出力の記録
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackEvent {
    Speech(String),
    Sound {
        clip: String,
        volume: f64,
    },
    Vibration {
        intensity: f64,
        duration: f64,
        side: Option<HapticSide>,
    },
}

/// 出力種別ごとの件数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackCounts {
    pub speech: usize,
    pub sounds: usize,
    pub vibrations: usize,
}

/// 全出力を記録しつつ tracing に流すフィードバックシンク
///
/// シミュレーションではこれを実デバイスの代わりに使い、テストでは記録内容を検証します。
#[derive(Debug, Default)]
pub struct FeedbackLog {
    events: Vec<FeedbackEvent>,
}

impl FeedbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[FeedbackEvent] {
        &self.events
    }

    /// 読み上げられた文のみ
    pub fn spoken(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                FeedbackEvent::Speech(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// 指定クリップの再生回数
    pub fn sound_count(&self, clip: &str) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, FeedbackEvent::Sound { clip: c, .. } if c == clip))
            .count()
    }

    pub fn counts(&self) -> FeedbackCounts {
        let mut counts = FeedbackCounts::default();
        for event in &self.events {
            match event {
                FeedbackEvent::Speech(_) => counts.speech += 1,
                FeedbackEvent::Sound { .. } => counts.sounds += 1,
                FeedbackEvent::Vibration { .. } => counts.vibrations += 1,
            }
        }
        counts
    }
}

impl FeedbackSink for FeedbackLog {
    fn speak(&mut self, text: &str) {
        info!(text, "SPEECH: 読み上げ");
        self.events.push(FeedbackEvent::Speech(text.to_string()));
    }

    fn play_sound(&mut self, clip: &str, volume: f64) {
        debug!(clip, volume, "SOUND: 効果音再生");
        self.events.push(FeedbackEvent::Sound {
            clip: clip.to_string(),
            volume,
        });
    }

    fn vibrate(&mut self, intensity: f64, duration: f64) {
        debug!(intensity, duration, "HAPTIC: 振動");
        self.events.push(FeedbackEvent::Vibration {
            intensity,
            duration,
            side: None,
        });
    }

    fn vibrate_directional(&mut self, intensity: f64, duration: f64, side: HapticSide) {
        debug!(intensity, duration, side = ?side, "HAPTIC: 方向付き振動");
        self.events.push(FeedbackEvent::Vibration {
            intensity,
            duration,
            side: Some(side),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_log_records_in_order() {
        let mut log = FeedbackLog::new();
        log.speak("hello");
        log.play_sound(clips::ARRIVAL, 1.0);
        log.vibrate_directional(0.5, 0.2, HapticSide::Left);

        assert_eq!(log.spoken(), vec!["hello"]);
        assert_eq!(log.sound_count(clips::ARRIVAL), 1);
        assert_eq!(
            log.counts(),
            FeedbackCounts {
                speech: 1,
                sounds: 1,
                vibrations: 1
            }
        );
        assert!(matches!(
            log.events()[2],
            FeedbackEvent::Vibration {
                side: Some(HapticSide::Left),
                ..
            }
        ));
    }
}
