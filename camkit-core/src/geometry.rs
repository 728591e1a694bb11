use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// 图纸坐标点，内部以 `glam::DVec3` 表示；二维运算默认 `z = 0`。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point(pub DVec3);

impl Point {
    pub const ORIGIN: Point = Point(DVec3::ZERO);

    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self(DVec3::new(x, y, 0.0))
    }

    #[inline]
    pub fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self(DVec3::new(x, y, z))
    }

    #[inline]
    pub fn x(self) -> f64 {
        self.0.x
    }

    #[inline]
    pub fn y(self) -> f64 {
        self.0.y
    }

    #[inline]
    pub fn z(self) -> f64 {
        self.0.z
    }

    #[inline]
    pub fn xy(self) -> DVec2 {
        self.0.truncate()
    }

    /// 平移 XY，保持 Z 不变。
    #[inline]
    pub fn translate(self, dx: f64, dy: f64) -> Self {
        Self(DVec3::new(self.0.x + dx, self.0.y + dy, self.0.z))
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    #[inline]
    pub fn as_vec3(self) -> DVec3 {
        self.0
    }
}

impl From<DVec3> for Point {
    fn from(value: DVec3) -> Self {
        Self(value)
    }
}

impl From<DVec2> for Point {
    fn from(value: DVec2) -> Self {
        Self(value.extend(0.0))
    }
}

/// 二维轴对齐矩形，`min` 为左下角。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    min: DVec2,
    max: DVec2,
}

impl Rect {
    #[inline]
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            min: DVec2::new(x, y),
            max: DVec2::new(x + width, y + height),
        }
    }

    #[inline]
    pub fn min(&self) -> DVec2 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> DVec2 {
        self.max
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::from((self.min + self.max) * 0.5)
    }

    /// 将矩形整体平移，常用于把以圆心为原点的圆弧范围放回图纸坐标。
    #[inline]
    pub fn offset(self, by: DVec2) -> Self {
        Self {
            min: self.min + by,
            max: self.max + by,
        }
    }
}

/// `Bounds` 的非空序列化形态。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: Point,
    pub max: Point,
}

/// 三维轴对齐范围。空状态使用 `+∞/−∞` 哨兵，首个真实坐标必然覆盖初值；
/// 序列化时空范围写为 `null`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<Extent>", into = "Option<Extent>")]
pub struct Bounds {
    min: Point,
    max: Point,
}

impl Bounds {
    #[inline]
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Point(DVec3::splat(f64::INFINITY)),
            max: Point(DVec3::splat(f64::NEG_INFINITY)),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x() > self.max.x() || self.min.y() > self.max.y()
    }

    #[inline]
    pub fn min(&self) -> Point {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Point {
        self.max
    }

    #[inline]
    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.x() - self.min.x()
        }
    }

    #[inline]
    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max.y() - self.min.y()
        }
    }

    pub fn include_point(&mut self, point: Point) {
        self.min = Point(self.min.0.min(point.0));
        self.max = Point(self.max.0.max(point.0));
    }

    pub fn include_bounds(&mut self, other: &Bounds) {
        if other.is_empty() {
            return;
        }
        self.include_point(other.min);
        self.include_point(other.max);
    }

    /// 以二维矩形扩展 XY，Z 取给定值。
    pub fn include_rect(&mut self, rect: &Rect, z: f64) {
        self.include_point(Point::with_z(rect.min().x, rect.min().y, z));
        self.include_point(Point::with_z(rect.max().x, rect.max().y, z));
    }

    #[inline]
    pub fn center(&self) -> Point {
        debug_assert!(!self.is_empty());
        Point((self.min.0 + self.max.0) * 0.5)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Option<Extent>> for Bounds {
    fn from(value: Option<Extent>) -> Self {
        match value {
            Some(extent) => Self::new(extent.min, extent.max),
            None => Self::empty(),
        }
    }
}

impl From<Bounds> for Option<Extent> {
    fn from(value: Bounds) -> Self {
        if value.is_empty() {
            None
        } else {
            Some(Extent {
                min: value.min,
                max: value.max,
            })
        }
    }
}
