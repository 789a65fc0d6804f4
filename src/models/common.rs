use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 3次元ベクトル（ワールド座標系、y軸が上方向）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64, // m
    pub y: f64, // m (高さ)
    pub z: f64, // m
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const UP: Vec3 = Vec3 { x: 0.0, y: 1.0, z: 0.0 };
    pub const DOWN: Vec3 = Vec3 { x: 0.0, y: -1.0, z: 0.0 };
    pub const FORWARD: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 1.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 3次元距離を計算
    pub fn distance(&self, other: &Vec3) -> f64 {
        (*self - *other).magnitude()
    }

    /// 水平面（XZ平面）での距離を計算。高さ成分は無視する
    pub fn planar_distance(&self, other: &Vec3) -> f64 {
        self.planar().distance(&other.planar())
    }

    /// ベクトルの長さ
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// 正規化。長さ0の場合はそのまま返す
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 1e-9 {
            *self * (1.0 / mag)
        } else {
            *self
        }
    }

    /// XZ平面への射影
    pub fn planar(&self) -> Vec2 {
        Vec2::new(self.x, self.z)
    }

    /// 指定した高さで水平面上の点から3次元座標を作る
    pub fn from_planar(point: Vec2, y: f64) -> Self {
        Self::new(point.x, y, point.y)
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// 水平面上の2次元座標（x, z をそれぞれ x, y として保持）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Vec2) -> f64 {
        (*self - *other).magnitude()
    }

    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2)).sqrt()
    }

    pub fn dot(&self, other: &Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z軸（前方）から時計回りに測った方位角（度）
    pub fn heading_deg(&self) -> f64 {
        self.x.atan2(self.y).to_degrees()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

/// ユーザー（カメラ）の姿勢
///
/// 位置と前方方向ベクトルを保持します。方位計算では前方ベクトルの
/// 水平成分のみを使用します。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub forward: Vec3,
}

impl Pose {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self { position, forward }
    }

    /// 前方ベクトルに対する水平右方向ベクトル
    pub fn right(&self) -> Vec3 {
        let f = Vec3::new(self.forward.x, 0.0, self.forward.z).normalize();
        Vec3::new(f.z, 0.0, -f.x)
    }

    /// ユーザーの前方から目標点への符号付き方位角（度）。右が正
    pub fn bearing_to(&self, target: &Vec3) -> f64 {
        let to_target = target.planar() - self.position.planar();
        math_utils::signed_planar_angle(self.forward.planar(), to_target)
    }
}

/// 数学ユーティリティ関数
pub mod math_utils {
    use super::Vec2;

    /// 角度を -180度〜180度 の範囲に正規化（-180 は 180 として扱う）
    pub fn normalize_angle(angle_deg: f64) -> f64 {
        let mut normalized = angle_deg % 360.0;
        if normalized > 180.0 {
            normalized -= 360.0;
        } else if normalized <= -180.0 {
            normalized += 360.0;
        }
        normalized
    }

    /// `from` から `to` への水平面内の符号付き角度（度、時計回りが正）
    ///
    /// どちらかのベクトルが長さ0の場合は0を返す。
    pub fn signed_planar_angle(from: Vec2, to: Vec2) -> f64 {
        if from.magnitude() < 1e-9 || to.magnitude() < 1e-9 {
            return 0.0;
        }
        normalize_angle(to.heading_deg() - from.heading_deg())
    }
}

/// 幾何ユーティリティ関数
pub mod geometry {
    use super::Vec2;

    /// 偶奇規則（レイキャスティング）による多角形内外判定
    ///
    /// 頂点が3未満の退化した境界は常に false。
    pub fn point_in_polygon(point: Vec2, boundary: &[Vec2]) -> bool {
        if boundary.len() < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = boundary.len() - 1;
        for i in 0..boundary.len() {
            let a = boundary[i];
            let b = boundary[j];
            if (a.y > point.y) != (b.y > point.y) {
                let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
                if point.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// 線分 a-b 上で点 p に最も近い点（端点でクランプ）
    pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
        let ab = b - a;
        let len_sq = ab.dot(&ab);
        if len_sq < 1e-12 {
            return a;
        }
        let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
        a + ab * t
    }

    /// 多角形の面積（靴紐公式）
    pub fn polygon_area(boundary: &[Vec2]) -> f64 {
        if boundary.len() < 3 {
            return 0.0;
        }
        let mut twice_area = 0.0;
        let mut j = boundary.len() - 1;
        for i in 0..boundary.len() {
            twice_area += (boundary[j].x + boundary[i].x) * (boundary[j].y - boundary[i].y);
            j = i;
        }
        (twice_area / 2.0).abs()
    }
}
