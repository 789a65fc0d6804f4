use tracing::debug;

use crate::models::common::{Vec2, Vec3, math_utils};
use crate::models::direction::{DirectionScheme, format_distance, relative_direction};

/// 計画済み経路
///
/// パスプランナーが返した順序付き経路点列と、ユーザーの進捗を表すカーソルを保持します。
/// カーソルは `advance` によって単調に進み、戻すには経路を作り直す（再計画）必要があります。
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPath {
    points: Vec<Vec3>,
    cursor: usize,
    /// 経路点に到達したとみなす水平距離（m）
    reach_distance: f64,
}

impl PlannedPath {
    pub fn new(points: Vec<Vec3>, reach_distance: f64) -> Self {
        Self {
            points,
            cursor: 0,
            reach_distance,
        }
    }

    /// ユーザー位置に応じてカーソルを進める。進んだ場合は true
    ///
    /// 現在の点に到達距離まで近づいたとき、または現在の点を通り過ぎたとき
    /// （手前の区間への射影が区間終端を越え、かつ次の区間への射影が始点を越えたとき）に進む。
    /// 経路と平行に少し離れて歩いていても進捗を追跡できる。最終点より先には進まない。
    pub fn advance(&mut self, user_position: &Vec3) -> bool {
        let before = self.cursor;
        let user = user_position.planar();
        while self.cursor + 1 < self.points.len() && self.has_passed(self.cursor, user) {
            self.cursor += 1;
        }
        if self.cursor != before {
            debug!(
                from = before,
                to = self.cursor,
                total = self.points.len(),
                "PATH_ADVANCED: 経路カーソルを進めました"
            );
        }
        self.cursor != before
    }

    fn has_passed(&self, index: usize, user: Vec2) -> bool {
        let point = self.points[index].planar();
        if point.distance(&user) <= self.reach_distance {
            return true;
        }
        let beyond_incoming = index
            .checked_sub(1)
            .is_none_or(|prev| segment_progress(user, self.points[prev].planar(), point) >= 1.0);
        beyond_incoming && segment_progress(user, point, self.points[index + 1].planar()) > 0.0
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn point_at(&self, index: usize) -> Option<Vec3> {
        self.points.get(index).copied()
    }

    /// 次に向かう経路点（カーソル位置の点）
    pub fn next(&self) -> Option<Vec3> {
        self.point_at(self.cursor)
    }

    pub fn final_point(&self) -> Option<Vec3> {
        self.points.last().copied()
    }

    /// 次に向かう点が最終点か
    pub fn is_final_target(&self) -> bool {
        !self.points.is_empty() && self.cursor == self.points.len() - 1
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// `from_index` から最大 `lookahead` 区間分の経路説明文
    pub fn upcoming_description(&self, from_index: usize, lookahead: usize) -> String {
        if self.points.len() < 2 || from_index + 1 >= self.points.len() || lookahead == 0 {
            return "You are at the final point.".to_string();
        }

        let last_leg = (from_index + lookahead).min(self.points.len() - 1);
        let mut parts = Vec::new();

        for i in from_index..last_leg {
            let leg = self.points[i + 1].planar() - self.points[i].planar();
            let distance = format_distance(leg.magnitude());

            if i == from_index {
                parts.push(format!("Walk {}", distance));
                continue;
            }

            let previous = self.points[i].planar() - self.points[i - 1].planar();
            let turn = math_utils::signed_planar_angle(previous, leg);
            let direction = relative_direction(turn, DirectionScheme::Coarse);
            if direction == "straight ahead" {
                parts.push(format!("then continue {}", distance));
            } else {
                parts.push(format!("then turn {} and walk {}", direction, distance));
            }
        }

        let mut description = parts.join(", ");
        if last_leg == self.points.len() - 1 {
            description.push_str(" to reach your destination.");
        } else {
            description.push('.');
        }
        description
    }
}

/// 区間 a-b 上への射影位置（a で 0、b で 1、クランプなし）。長さ 0 の区間は 1
fn segment_progress(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    let ab = b - a;
    let length_sq = ab.dot(&ab);
    if length_sq < 1e-12 {
        return 1.0;
    }
    (p - a).dot(&ab) / length_sq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shaped() -> PlannedPath {
        PlannedPath::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 4.0),
                Vec3::new(3.0, 0.0, 4.0),
                Vec3::new(3.0, 0.0, 8.0),
            ],
            1.0,
        )
    }

    #[test]
    fn test_advance_is_monotonic_and_stops_at_final() {
        let mut path = l_shaped();
        assert!(path.advance(&Vec3::new(0.0, 1.6, 0.2)));
        assert_eq!(path.current_index(), 1);

        // 戻っても減らない
        assert!(!path.advance(&Vec3::new(0.0, 0.0, 0.0)));
        assert_eq!(path.current_index(), 1);

        path.advance(&Vec3::new(3.0, 0.0, 8.0));
        path.advance(&Vec3::new(0.0, 0.0, 4.0));
        path.advance(&Vec3::new(3.0, 0.0, 4.0));
        path.advance(&Vec3::new(3.0, 0.0, 8.0));
        assert_eq!(path.current_index(), 3);
        assert!(path.is_final_target());
        assert!(!path.advance(&Vec3::new(3.0, 0.0, 8.0)));
    }

    #[test]
    fn test_advance_tracks_parallel_walk() {
        let mut path = PlannedPath::new(
            (0..=5).map(|i| Vec3::new(0.0, 0.0, i as f64 * 2.0)).collect(),
            1.0,
        );

        // 始点の横に立っていても第1区間に入っていれば始点は通過済み
        assert!(path.advance(&Vec3::new(1.2, 1.5, 0.1)));
        assert_eq!(path.current_index(), 1);

        assert!(!path.advance(&Vec3::new(1.2, 1.5, 1.9)));
        assert!(path.advance(&Vec3::new(1.2, 1.5, 2.1)));
        assert_eq!(path.current_index(), 2);

        path.advance(&Vec3::new(1.2, 1.5, 7.0));
        assert_eq!(path.current_index(), 4);
    }

    #[test]
    fn test_advance_waits_behind_start_and_outside_corner() {
        let mut path = l_shaped();
        assert!(!path.advance(&Vec3::new(1.5, 0.0, -0.5)));
        assert_eq!(path.current_index(), 0);

        path.advance(&Vec3::new(0.0, 0.0, 0.0));
        // 角を曲がらずに直進した側では角の点を通過扱いにしない
        assert!(!path.advance(&Vec3::new(-1.2, 0.0, 4.5)));
        assert_eq!(path.current_index(), 1);
        assert!(path.advance(&Vec3::new(1.2, 0.0, 4.5)));
        assert_eq!(path.current_index(), 2);
    }

    #[test]
    fn test_next_and_point_at() {
        let path = l_shaped();
        assert_eq!(path.count(), 4);
        assert_eq!(path.next(), Some(Vec3::new(0.0, 0.0, 0.0)));
        assert_eq!(path.point_at(2), Some(Vec3::new(3.0, 0.0, 4.0)));
        assert_eq!(path.point_at(9), None);
        assert_eq!(path.final_point(), Some(Vec3::new(3.0, 0.0, 8.0)));
    }

    #[test]
    fn test_upcoming_description() {
        let path = l_shaped();
        assert_eq!(
            path.upcoming_description(0, 3),
            "Walk 4 meters, then turn right and walk 3 meters, then turn left and walk 4 meters to reach your destination."
        );
        assert_eq!(path.upcoming_description(0, 1), "Walk 4 meters.");
        assert_eq!(path.upcoming_description(3, 2), "You are at the final point.");
    }
}
