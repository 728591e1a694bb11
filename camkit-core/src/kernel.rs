//! 计算几何内核：无状态纯函数，可被任意数量的调用方并发使用。
//!
//! 角度约定：图元角度以 +X 为零点、逆时针递增；`rotate` 系列的正角默认顺时针旋转
//! （Y 轴向上），`clockwise_positive = false` 时取数学正方向。

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::DVec2;

use crate::errors::GeometryError;
use crate::geometry::{Point, Rect};

/// 圆弧离散时每段的目标弧长。
pub const ARC_SECTION_LENGTH: f64 = 1.0;

const ZERO_TOLERANCE: f64 = 1e-7;
const CIRCLE_MIN_VERTICES: usize = 10;
const CIRCLE_MAX_DEVIATION: f64 = 0.2;
const AREA_ROUNDING_WINDOW: f64 = 1e-14;
const CONTAINS_TOLERANCE: f64 = 1e-9;
const BULGE_EPSILON: f64 = 1e-9;
const STEPS_PER_RADIAN: f64 = 2.4;

#[inline]
pub fn degrees_to_radians(angle: f64) -> f64 {
    angle * PI / 180.0
}

#[inline]
pub fn radians_to_degrees(angle: f64) -> f64 {
    angle * 180.0 / PI
}

/// 归一化到 `[0, 360)`。
pub fn normalize_degrees(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(360.0);
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// 归一化到 `[0, 2π)`。
pub fn normalize_radians(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(TAU);
    if normalized >= TAU { 0.0 } else { normalized }
}

/// 平面欧氏距离，忽略 Z。
#[inline]
pub fn distance(p1: Point, p2: Point) -> f64 {
    let dx = p1.x() - p2.x();
    let dy = p1.y() - p2.y();
    (dx * dx + dy * dy).sqrt()
}

pub fn bounding_rect(points: &[Point]) -> Result<Rect, GeometryError> {
    let (first, rest) = points.split_first().ok_or(GeometryError::EmptyInput)?;
    let mut min = first.xy();
    let mut max = min;
    for point in rest {
        min = min.min(point.xy());
        max = max.max(point.xy());
    }
    Ok(Rect::new(min, max))
}

/// 外接矩形中心。对倾斜多边形不一定等于形心。
pub fn center(points: &[Point]) -> Result<Point, GeometryError> {
    Ok(bounding_rect(points)?.center())
}

/// 鞋带公式求闭合多边形面积，结果与顶点方向无关。
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x() * b.y() - a.y() * b.x())
        .sum();
    (twice_area / 2.0).abs()
}

/// 判断多边形是否近似为圆：至少 10 个顶点，外接矩形宽高比与面积/πr² 的
/// 相对偏差均不超过 20%，其中 r 取外接矩形宽度的一半。
pub fn is_polygon_circle(points: &[Point]) -> bool {
    if points.len() < CIRCLE_MIN_VERTICES {
        return false;
    }
    let Ok(rect) = bounding_rect(points) else {
        return false;
    };
    if rect.width() <= 0.0 || rect.height() <= 0.0 {
        return false;
    }
    let radius = rect.width() / 2.0;
    let aspect_deviation = (1.0 - rect.width() / rect.height()).abs();
    let area_deviation = (1.0 - polygon_area(points) / (PI * radius * radius)).abs();
    aspect_deviation <= CIRCLE_MAX_DEVIATION && area_deviation <= CIRCLE_MAX_DEVIATION
}

/// 圆形多边形的中心（顶点均值）与半径（各顶点到中心的平均距离）。
pub fn circular_polygon_center_and_radius(
    points: &[Point],
) -> Result<(Point, f64), GeometryError> {
    if points.is_empty() {
        return Err(GeometryError::EmptyInput);
    }
    let count = points.len() as f64;
    let sum = points.iter().fold(DVec2::ZERO, |acc, p| acc + p.xy());
    let center = Point::from(sum / count);
    let radius = points.iter().map(|p| distance(center, *p)).sum::<f64>() / count;
    Ok((center, radius))
}

/// 绕 `origin` 作 180° 点对称。
#[inline]
pub fn reflect(point: Point, origin: Point) -> Point {
    Point::with_z(
        2.0 * origin.x() - point.x(),
        2.0 * origin.y() - point.y(),
        point.z(),
    )
}

/// 绕任意中心旋转（角度制）。
#[inline]
pub fn rotate(point: Point, center: Point, angle_deg: f64, clockwise_positive: bool) -> Point {
    rotate_radians(point, center, degrees_to_radians(angle_deg), clockwise_positive)
}

/// 绕任意中心旋转（弧度制），Z 保持不变。
pub fn rotate_radians(point: Point, center: Point, theta: f64, clockwise_positive: bool) -> Point {
    let theta = if clockwise_positive { -theta } else { theta };
    let (sin, cos) = theta.sin_cos();
    let dx = point.x() - center.x();
    let dy = point.y() - center.y();
    Point::with_z(
        center.x() + dx * cos - dy * sin,
        center.y() + dx * sin + dy * cos,
        point.z(),
    )
}

/// `center → target` 相对 +X 轴的方向角，弧度，`[0, 2π)`。
pub fn angle_of_radians(center: Point, target: Point) -> f64 {
    normalize_radians((target.y() - center.y()).atan2(target.x() - center.x()))
}

/// `center → target` 相对 +X 轴的方向角，角度，`[0, 360)`。
pub fn angle_of(center: Point, target: Point) -> f64 {
    normalize_degrees(radians_to_degrees(
        (target.y() - center.y()).atan2(target.x() - center.x()),
    ))
}

/// 由弦的两个端点与半径反求圆心（数控 R 字圆弧）。
///
/// 先把坐标系旋转到弦落在 X 轴上，求垂直偏移 `h = sqrt(r² − (c/2)²)`，
/// 再由 `clockwise` 与半径符号在四个候选圆心中选定一个并旋转回去。
/// 半径无法跨越弦长（超出容差）时返回 [`GeometryError::RadiusTooSmall`]。
pub fn arc_center(
    p1: Point,
    p2: Point,
    radius: f64,
    clockwise: bool,
) -> Result<Point, GeometryError> {
    if distance(p1, p2) <= ZERO_TOLERANCE {
        return Err(GeometryError::DegenerateLine);
    }

    let theta = angle_of_radians(p1, p2);
    let aligned = rotate_radians(p2, p1, theta, true);
    let half_chord = (aligned.x() - p1.x()) / 2.0;

    let mut offset = 0.0;
    if radius.abs() < half_chord {
        if half_chord - radius.abs() > ZERO_TOLERANCE {
            return Err(GeometryError::RadiusTooSmall { radius, half_chord });
        }
    } else {
        offset = -(radius * radius - half_chord * half_chord).sqrt();
    }

    if !clockwise {
        offset = -offset;
    }
    if radius < 0.0 {
        offset = -offset;
    }

    let aligned_center = Point::with_z(p1.x() + half_chord, p1.y() + offset, p1.z());
    Ok(rotate_radians(aligned_center, p1, theta, false))
}

/// 直线与圆的交点，`Secant` 中的顺序对应二次方程的 `+`/`−` 根。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineCircleIntersection {
    None,
    Tangent(Point),
    Secant(Point, Point),
}

impl LineCircleIntersection {
    pub fn count(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Tangent(_) => 1,
            Self::Secant(..) => 2,
        }
    }

    pub fn points(&self) -> Vec<Point> {
        match *self {
            Self::None => Vec::new(),
            Self::Tangent(p) => vec![p],
            Self::Secant(a, b) => vec![a, b],
        }
    }
}

/// 求经过 `p1`、`p2` 的直线与圆的交点。
pub fn line_circle_intersections(
    center: Point,
    radius: f64,
    p1: Point,
    p2: Point,
) -> LineCircleIntersection {
    let dx = p2.x() - p1.x();
    let dy = p2.y() - p1.y();
    let fx = p1.x() - center.x();
    let fy = p1.y() - center.y();

    let a = dx * dx + dy * dy;
    let b = 2.0 * (dx * fx + dy * fy);
    let c = fx * fx + fy * fy - radius * radius;
    let det = b * b - 4.0 * a * c;

    let at = |t: f64| Point::with_z(p1.x() + t * dx, p1.y() + t * dy, p1.z());

    if a <= ZERO_TOLERANCE || det < 0.0 {
        LineCircleIntersection::None
    } else if det == 0.0 {
        LineCircleIntersection::Tangent(at(-b / (2.0 * a)))
    } else {
        let root = det.sqrt();
        LineCircleIntersection::Secant(at((-b + root) / (2.0 * a)), at((-b - root) / (2.0 * a)))
    }
}

/// 两条直线（按无限延长处理）的交点，行列式法。
pub fn line_line_intersection(
    p1_start: Point,
    p1_end: Point,
    p2_start: Point,
    p2_end: Point,
) -> Result<Point, GeometryError> {
    if p1_start.xy() == p1_end.xy() || p2_start.xy() == p2_end.xy() {
        return Err(GeometryError::DegenerateLine);
    }

    let a1 = p1_end.y() - p1_start.y();
    let b1 = p1_start.x() - p1_end.x();
    let c1 = a1 * p1_start.x() + b1 * p1_start.y();

    let a2 = p2_end.y() - p2_start.y();
    let b2 = p2_start.x() - p2_end.x();
    let c2 = a2 * p2_start.x() + b2 * p2_start.y();

    let delta = a1 * b2 - a2 * b1;
    if delta == 0.0 {
        return Err(GeometryError::ParallelLines);
    }

    Ok(Point::new(
        (b2 * c1 - b1 * c2) / delta,
        (a1 * c2 - a2 * c1) / delta,
    ))
}

/// 海伦公式求三角形面积。
pub fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    let ab = distance(a, b);
    let ac = distance(a, c);
    let bc = distance(b, c);
    let s = (ab + ac + bc) / 2.0;
    (s * (s - ab) * (s - ac) * (s - bc)).max(0.0).sqrt()
}

/// 坐标式三角形面积，不开方，热路径优先使用。
#[inline]
pub fn triangle_area_fast(a: Point, b: Point, c: Point) -> f64 {
    ((a.x() * b.y() - a.x() * c.y())
        + (b.x() * c.y() - b.x() * a.y())
        + (c.x() * a.y() - c.x() * b.y()))
    .abs()
        / 2.0
}

/// 以相邻两边长求矩形面积（`d` 仅用于签名对称）。
pub fn rectangle_area(a: Point, b: Point, c: Point, _d: Point) -> f64 {
    distance(a, b) * distance(b, c)
}

/// 坐标式矩形面积：`|(Ay−Cy)(Dx−Bx) + (By−Dy)(Ax−Cx)| / 2`。
#[inline]
pub fn rectangle_area_fast(a: Point, b: Point, c: Point, d: Point) -> f64 {
    ((a.y() - c.y()) * (d.x() - b.x()) + (b.y() - d.y()) * (a.x() - c.x())).abs() / 2.0
}

/// 判断点是否位于（可旋转的）矩形 `ABCD` 内，边上的点视为在内。
///
/// 点与相邻角点构成的四个三角形面积之和等于矩形面积时点在内部；
/// 面积和距上方整数不超过 `1e-14` 时先向上取整，以吸收浮点误差。
pub fn rectangle_contains(a: Point, b: Point, c: Point, d: Point, p: Point) -> bool {
    let mut sum = triangle_area_fast(a, b, p)
        + triangle_area_fast(b, c, p)
        + triangle_area_fast(c, d, p)
        + triangle_area_fast(d, a, p);

    if sum.ceil() - sum <= AREA_ROUNDING_WINDOW {
        sum = sum.ceil();
    }

    let area = rectangle_area_fast(a, b, c, d);
    (sum - area).abs() <= CONTAINS_TOLERANCE * area.max(1.0)
}

/// 轴对齐矩形版本的 [`rectangle_contains`]。
pub fn rect_contains(rect: &Rect, p: Point) -> bool {
    let min = rect.min();
    let max = rect.max();
    rectangle_contains(
        Point::new(min.x, min.y),
        Point::new(min.x, max.y),
        Point::new(max.x, max.y),
        Point::new(max.x, min.y),
        p,
    )
}

/// 圆弧离散段数，使用默认段长 [`ARC_SECTION_LENGTH`]。
#[inline]
pub fn arc_step_count(sweep: f64, radius: f64) -> usize {
    arc_step_count_with(sweep, radius, ARC_SECTION_LENGTH)
}

/// `ceil(max(2.4·sweep, 弧长 / section_length))`，至少 1 段。
pub fn arc_step_count_with(sweep: f64, radius: f64, section_length: f64) -> usize {
    let sweep = sweep.abs();
    let section = if section_length > 0.0 {
        section_length
    } else {
        ARC_SECTION_LENGTH
    };
    let length = radius.abs() * sweep;
    let steps = (sweep * STEPS_PER_RADIAN).max(length / section).ceil();
    if !steps.is_finite() {
        return 1;
    }
    (steps as usize).max(1)
}

/// 角度所在象限（0..=3，每个象限 90°）。
pub fn quadrant(angle: f64) -> usize {
    let angle = normalize_radians(angle);
    if angle < FRAC_PI_2 {
        0
    } else if angle < PI {
        1
    } else if angle < PI + FRAC_PI_2 {
        2
    } else {
        3
    }
}

/// 圆心位于原点、自 `start` 逆时针扫至 `end`（弧度）的圆弧真实包围盒。
///
/// 按起止角象限查 4×4 表，决定四条边界取半径还是端点投影；
/// 同一象限内且终止角小于起始角（近整圆）时按整圆处理。
pub fn arc_bounds(start: f64, end: f64, radius: f64, margin: f64) -> Rect {
    let r = radius.abs();
    let start_quad = quadrant(start);
    let end_quad = quadrant(end);

    let (sin_start, cos_start) = start.sin_cos();
    let (sin_end, cos_end) = end.sin_cos();
    let (ix, iy) = (cos_start * r, sin_start * r);
    let (ex, ey) = (cos_end * r, sin_end * r);

    let min_x = ix.min(ex);
    let min_y = iy.min(ey);
    let max_x = ix.max(ex);
    let max_y = iy.max(ey);

    let (x1, y1, x2, y2) =
        if start_quad == end_quad && normalize_radians(end) < normalize_radians(start) {
            (-r, -r, r, r)
        } else {
            let x_max = [
                [max_x, r, r, r],
                [max_x, max_x, r, r],
                [max_x, max_x, max_x, r],
                [max_x, max_x, max_x, max_x],
            ];
            let y_max = [
                [max_y, max_y, max_y, max_y],
                [r, max_y, r, r],
                [r, max_y, max_y, r],
                [r, max_y, max_y, max_y],
            ];
            let x_min = [
                [min_x, -r, min_x, min_x],
                [min_x, min_x, min_x, min_x],
                [-r, -r, min_x, -r],
                [-r, -r, min_x, min_x],
            ];
            let y_min = [
                [min_y, -r, -r, min_y],
                [min_y, min_y, -r, min_y],
                [min_y, min_y, min_y, min_y],
                [-r, -r, -r, min_y],
            ];
            (
                x_min[end_quad][start_quad],
                y_min[end_quad][start_quad],
                x_max[end_quad][start_quad],
                y_max[end_quad][start_quad],
            )
        };

    Rect::new(
        DVec2::new(x1 - margin, y1 - margin),
        DVec2::new(x2 + margin, y2 + margin),
    )
}

/// 由 bulge 还原的圆弧段。`sweep` 带符号，正值为逆时针。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulgeArc {
    pub center: Point,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

impl BulgeArc {
    #[inline]
    pub fn end_angle(&self) -> f64 {
        self.start_angle + self.sweep
    }

    /// 逆时针方向的起止角，可直接交给 [`arc_bounds`]。
    pub fn counter_clockwise_angles(&self) -> (f64, f64) {
        if self.sweep >= 0.0 {
            (self.start_angle, self.end_angle())
        } else {
            (self.end_angle(), self.start_angle)
        }
    }

    pub fn bounds(&self) -> Rect {
        let (start, end) = self.counter_clockwise_angles();
        arc_bounds(start, end, self.radius, 0.0).offset(self.center.xy())
    }
}

/// `bulge = tan(θ/4)`；为零或弦长退化时返回 `None`（直线段）。
pub fn bulge_arc(p1: Point, p2: Point, bulge: f64) -> Option<BulgeArc> {
    if bulge.abs() <= BULGE_EPSILON {
        return None;
    }
    let chord = p2.xy() - p1.xy();
    let length = chord.length();
    if length <= f64::EPSILON {
        return None;
    }

    let sweep = 4.0 * bulge.atan();
    let half = sweep / 2.0;
    let radius = (length / (2.0 * half.sin())).abs();
    let normal = DVec2::new(-chord.y, chord.x) / length;
    let center = (p1.xy() + p2.xy()) * 0.5 + normal * (length / 2.0 / half.tan());
    let start_angle = (p1.y() - center.y).atan2(p1.x() - center.x);

    Some(BulgeArc {
        center: Point::with_z(center.x, center.y, p1.z()),
        radius,
        start_angle,
        sweep,
    })
}

/// 将圆弧离散为 `steps + 1` 个点（含起止点）。
pub fn arc_points(center: Point, radius: f64, start: f64, sweep: f64, steps: usize) -> Vec<Point> {
    let steps = steps.max(1);
    (0..=steps)
        .map(|i| {
            let angle = start + sweep * (i as f64 / steps as f64);
            let (sin, cos) = angle.sin_cos();
            Point::with_z(
                center.x() + radius * cos,
                center.y() + radius * sin,
                center.z(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn regular_polygon(sides: usize, radius: f64) -> Vec<Point> {
        (0..sides)
            .map(|i| {
                let angle = TAU * i as f64 / sides as f64;
                Point::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect()
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = Point::new(-3.5, 7.25);
        let b = Point::new(12.0, -1.0);
        assert_eq!(distance(a, b), distance(b, a));
        assert_eq!(distance(a, a), 0.0);
        assert_abs_diff_eq!(distance(Point::ORIGIN, Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn bounding_rect_requires_points() {
        assert_eq!(bounding_rect(&[]), Err(GeometryError::EmptyInput));
        assert_eq!(center(&[]), Err(GeometryError::EmptyInput));

        let rect = bounding_rect(&[
            Point::new(1.0, -2.0),
            Point::new(-4.0, 6.0),
            Point::new(3.0, 0.0),
        ])
        .unwrap();
        assert_eq!(rect.min(), DVec2::new(-4.0, -2.0));
        assert_eq!(rect.max(), DVec2::new(3.0, 6.0));
        let c = center(&[Point::new(0.0, 0.0), Point::new(10.0, 4.0)]).unwrap();
        assert_eq!((c.x(), c.y()), (5.0, 2.0));
    }

    #[test]
    fn polygon_area_ignores_orientation_and_start_vertex() {
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(6.0, 0.0),
            Point::new(6.0, 3.0),
            Point::new(2.0, 5.0),
            Point::new(0.0, 3.0),
        ];
        let area = polygon_area(&ring);
        assert_abs_diff_eq!(area, 24.0, epsilon = 1e-12);

        let mut reversed = ring.clone();
        reversed.reverse();
        assert_abs_diff_eq!(polygon_area(&reversed), area, epsilon = 1e-12);

        for shift in 1..ring.len() {
            let mut rotated = ring.clone();
            rotated.rotate_left(shift);
            assert_abs_diff_eq!(polygon_area(&rotated), area, epsilon = 1e-12);
        }
    }

    #[test]
    fn circle_heuristic_accepts_36_gon_and_rejects_square() {
        assert!(is_polygon_circle(&regular_polygon(36, 10.0)));
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(!is_polygon_circle(&square));
    }

    #[test]
    fn circle_heuristic_rejects_elongated_polygon() {
        let ellipse: Vec<Point> = regular_polygon(36, 10.0)
            .into_iter()
            .map(|p| Point::new(p.x() * 2.0, p.y()))
            .collect();
        assert!(!is_polygon_circle(&ellipse));
    }

    #[test]
    fn circular_polygon_center_and_radius_uses_means() {
        let ring: Vec<Point> = regular_polygon(24, 5.0)
            .into_iter()
            .map(|p| p.translate(3.0, -2.0))
            .collect();
        let (center, radius) = circular_polygon_center_and_radius(&ring).unwrap();
        assert_abs_diff_eq!(center.x(), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(center.y(), -2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(radius, 5.0, epsilon = 1e-9);
        assert_eq!(
            circular_polygon_center_and_radius(&[]),
            Err(GeometryError::EmptyInput)
        );
    }

    #[test]
    fn reflect_mirrors_through_origin_point() {
        let reflected = reflect(Point::new(3.0, 4.0), Point::new(1.0, 1.0));
        assert_eq!((reflected.x(), reflected.y()), (-1.0, -2.0));
    }

    #[test]
    fn rotate_positive_angle_is_clockwise() {
        let rotated = rotate(Point::new(1.0, 0.0), Point::ORIGIN, 90.0, true);
        assert_abs_diff_eq!(rotated.x(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rotated.y(), -1.0, epsilon = 1e-12);

        let rotated = rotate(Point::new(1.0, 0.0), Point::ORIGIN, 90.0, false);
        assert_abs_diff_eq!(rotated.x(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rotated.y(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rotate_round_trip_returns_original_point() {
        let center = Point::new(-2.0, 5.5);
        for &(x, y) in &[(0.0, 0.0), (10.0, -3.0), (-7.5, 12.25)] {
            for &angle in &[-270.0, -33.3, 0.0, 17.0, 90.0, 359.0] {
                let p = Point::with_z(x, y, 2.0);
                let back = rotate(rotate(p, center, angle, true), center, -angle, true);
                assert_abs_diff_eq!(back.x(), p.x(), epsilon = 1e-9);
                assert_abs_diff_eq!(back.y(), p.y(), epsilon = 1e-9);
                assert_eq!(back.z(), 2.0);
            }
        }
        let p = Point::new(4.0, 1.0);
        let back = rotate_radians(rotate_radians(p, center, 1.2, false), center, -1.2, false);
        assert_abs_diff_eq!(back.x(), p.x(), epsilon = 1e-9);
        assert_abs_diff_eq!(back.y(), p.y(), epsilon = 1e-9);
    }

    #[test]
    fn angle_of_is_normalized() {
        let c = Point::ORIGIN;
        assert_abs_diff_eq!(angle_of(c, Point::new(1.0, 0.0)), 0.0);
        assert_abs_diff_eq!(angle_of(c, Point::new(0.0, 1.0)), 90.0, epsilon = 1e-12);
        assert_abs_diff_eq!(angle_of(c, Point::new(-1.0, 0.0)), 180.0, epsilon = 1e-12);
        assert_abs_diff_eq!(angle_of(c, Point::new(0.0, -1.0)), 270.0, epsilon = 1e-12);
        let a = angle_of(c, Point::new(1.0, -1e-12));
        assert!((0.0..360.0).contains(&a));
        assert_abs_diff_eq!(
            angle_of_radians(c, Point::new(-1.0, -1.0)),
            1.25 * PI,
            epsilon = 1e-12
        );
    }

    #[test]
    fn arc_center_for_semicircle_is_chord_midpoint() {
        let center = arc_center(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 5.0, true).unwrap();
        assert_abs_diff_eq!(center.x(), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(center.y(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn arc_center_is_equidistant_from_endpoints() {
        let cases = [
            (Point::new(0.0, 0.0), Point::new(10.0, 0.0), 10.0),
            (Point::new(3.0, -4.0), Point::new(-6.0, 8.0), 9.0),
            (Point::new(1.0, 1.0), Point::new(1.0, 11.0), -7.5),
        ];
        for (p1, p2, radius) in cases {
            for clockwise in [true, false] {
                let center = arc_center(p1, p2, radius, clockwise).unwrap();
                assert_abs_diff_eq!(distance(center, p1), radius.abs(), epsilon = 1e-9);
                assert_abs_diff_eq!(distance(center, p2), radius.abs(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn arc_center_selects_side_from_direction_and_radius_sign() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(10.0, 0.0);
        let cw = arc_center(p1, p2, 10.0, true).unwrap();
        let ccw = arc_center(p1, p2, 10.0, false).unwrap();
        let cw_negative = arc_center(p1, p2, -10.0, true).unwrap();
        assert!(cw.y() < 0.0);
        assert!(ccw.y() > 0.0);
        assert!(cw_negative.y() > 0.0);
    }

    #[test]
    fn arc_center_rejects_short_radius() {
        let err = arc_center(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 4.9, true).unwrap_err();
        assert!(matches!(err, GeometryError::RadiusTooSmall { .. }));
        assert_eq!(
            arc_center(Point::new(1.0, 1.0), Point::new(1.0, 1.0), 3.0, true),
            Err(GeometryError::DegenerateLine)
        );
    }

    #[test]
    fn line_through_circle_has_two_intersections() {
        let hits = line_circle_intersections(
            Point::ORIGIN,
            5.0,
            Point::new(-10.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert_eq!(hits.count(), 2);
        let mut xs: Vec<f64> = hits.points().iter().map(|p| p.x()).collect();
        xs.sort_by(f64::total_cmp);
        assert_abs_diff_eq!(xs[0], -5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(xs[1], 5.0, epsilon = 1e-9);
        assert!(hits.points().iter().all(|p| p.y().abs() < 1e-12));
    }

    #[test]
    fn line_circle_tangent_and_miss() {
        let tangent = line_circle_intersections(
            Point::ORIGIN,
            5.0,
            Point::new(-10.0, 5.0),
            Point::new(10.0, 5.0),
        );
        match tangent {
            LineCircleIntersection::Tangent(p) => {
                assert_abs_diff_eq!(p.x(), 0.0, epsilon = 1e-9);
                assert_abs_diff_eq!(p.y(), 5.0, epsilon = 1e-9);
            }
            other => panic!("expected tangent, got {other:?}"),
        }

        let miss = line_circle_intersections(
            Point::ORIGIN,
            5.0,
            Point::new(-10.0, 6.0),
            Point::new(10.0, 6.0),
        );
        assert_eq!(miss, LineCircleIntersection::None);

        let degenerate =
            line_circle_intersections(Point::ORIGIN, 5.0, Point::new(5.0, 0.0), Point::new(5.0, 0.0));
        assert_eq!(degenerate.count(), 0);
    }

    #[test]
    fn line_line_intersection_finds_crossing_and_rejects_parallel() {
        let p = line_line_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        )
        .unwrap();
        assert_abs_diff_eq!(p.x(), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y(), 5.0, epsilon = 1e-12);

        let parallel = line_line_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 5.0),
            Point::new(10.0, 5.0),
        );
        assert_eq!(parallel, Err(GeometryError::ParallelLines));

        let degenerate = line_line_intersection(
            Point::new(1.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 5.0),
            Point::new(10.0, 5.0),
        );
        assert_eq!(degenerate, Err(GeometryError::DegenerateLine));
    }

    #[test]
    fn triangle_area_forms_agree() {
        let a = Point::new(0.5, -1.0);
        let b = Point::new(7.0, 2.0);
        let c = Point::new(-3.0, 4.5);
        assert_abs_diff_eq!(triangle_area(a, b, c), triangle_area_fast(a, b, c), epsilon = 1e-9);
        assert_abs_diff_eq!(
            triangle_area_fast(Point::ORIGIN, Point::new(4.0, 0.0), Point::new(0.0, 3.0)),
            6.0
        );
    }

    #[test]
    fn rectangle_area_forms_agree() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 10.0);
        let c = Point::new(5.0, 10.0);
        let d = Point::new(5.0, 0.0);
        assert_abs_diff_eq!(rectangle_area(a, b, c, d), 50.0);
        assert_abs_diff_eq!(rectangle_area_fast(a, b, c, d), 50.0);
    }

    #[test]
    fn rectangle_contains_interior_edge_and_outside_points() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 10.0);
        let c = Point::new(10.0, 10.0);
        let d = Point::new(10.0, 0.0);
        assert!(rectangle_contains(a, b, c, d, Point::new(3.3, 7.1)));
        assert!(rectangle_contains(a, b, c, d, Point::new(0.0, 5.0)));
        assert!(rectangle_contains(a, b, c, d, Point::new(10.0, 10.0)));
        assert!(!rectangle_contains(a, b, c, d, Point::new(10.5, 5.0)));
        assert!(!rectangle_contains(a, b, c, d, Point::new(-0.1, -0.1)));
    }

    #[test]
    fn rotated_rectangle_contains_center() {
        let corners: Vec<Point> = [(0.0, 0.0), (0.0, 4.0), (6.0, 4.0), (6.0, 0.0)]
            .iter()
            .map(|&(x, y)| rotate(Point::new(x, y), Point::new(3.0, 2.0), 30.0, true))
            .collect();
        let inside = rectangle_contains(
            corners[0],
            corners[1],
            corners[2],
            corners[3],
            Point::new(3.0, 2.0),
        );
        let outside = rectangle_contains(
            corners[0],
            corners[1],
            corners[2],
            corners[3],
            Point::new(6.0, 0.0),
        );
        assert!(inside);
        assert!(!outside);
    }

    #[test]
    fn rect_contains_uses_corners() {
        let rect = Rect::from_xywh(1.0, 1.0, 2.5, 1.5);
        assert!(rect_contains(&rect, Point::new(2.0, 2.0)));
        assert!(rect_contains(&rect, Point::new(3.5, 2.5)));
        assert!(!rect_contains(&rect, Point::new(0.5, 2.0)));
    }

    #[test]
    fn arc_step_count_has_minimum_resolution() {
        assert_eq!(arc_step_count(PI, 100.0), 315);
        assert_eq!(arc_step_count(PI, 0.001), 8);
        assert_eq!(arc_step_count(0.0, 10.0), 1);
        assert_eq!(arc_step_count_with(PI, 100.0, 10.0), 32);
        assert_eq!(arc_step_count(-PI, 100.0), arc_step_count(PI, 100.0));
    }

    #[test]
    fn quadrant_classifies_angles() {
        assert_eq!(quadrant(0.0), 0);
        assert_eq!(quadrant(FRAC_PI_2), 1);
        assert_eq!(quadrant(PI + 0.1), 2);
        assert_eq!(quadrant(-0.1), 3);
        assert_eq!(quadrant(TAU + 0.1), 0);
    }

    #[test]
    fn arc_bounds_include_swept_extremes() {
        // 45° → 135°：经过 90°，上边界为半径
        let rect = arc_bounds(PI / 4.0, 3.0 * PI / 4.0, 10.0, 0.0);
        let s = 10.0 * (PI / 4.0).cos();
        assert_abs_diff_eq!(rect.max().y, 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rect.min().y, s, epsilon = 1e-12);
        assert_abs_diff_eq!(rect.min().x, -s, epsilon = 1e-12);
        assert_abs_diff_eq!(rect.max().x, s, epsilon = 1e-12);

        // 10° → 80°：同一象限，只取端点
        let rect = arc_bounds(10f64.to_radians(), 80f64.to_radians(), 1.0, 0.0);
        assert!(rect.max().x < 1.0);
        assert!(rect.max().y < 1.0);

        // 300° → 60°：跨越 0°，右边界为半径
        let rect = arc_bounds(300f64.to_radians(), 60f64.to_radians(), 2.0, 0.5);
        assert_abs_diff_eq!(rect.max().x, 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(rect.min().x, 2.0 * 60f64.to_radians().cos() - 0.5, epsilon = 1e-12);

        // 80° → 10°：近整圆
        let rect = arc_bounds(80f64.to_radians(), 10f64.to_radians(), 3.0, 0.0);
        assert_eq!(rect.min(), DVec2::splat(-3.0));
        assert_eq!(rect.max(), DVec2::splat(3.0));
    }

    #[test]
    fn bulge_of_one_is_semicircle() {
        let arc = bulge_arc(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 1.0).unwrap();
        assert_abs_diff_eq!(arc.center.x(), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(arc.center.y(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(arc.radius, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(arc.sweep, PI, epsilon = 1e-12);
        let bounds = arc.bounds();
        assert_abs_diff_eq!(bounds.min().y, -5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(bounds.max().y, 0.0, epsilon = 1e-9);

        let points = arc_points(arc.center, arc.radius, arc.start_angle, arc.sweep, 4);
        assert_eq!(points.len(), 5);
        assert_abs_diff_eq!(points[2].y(), -5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(points[4].x(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn negative_bulge_sweeps_clockwise() {
        let arc = bulge_arc(Point::new(0.0, 0.0), Point::new(10.0, 0.0), -0.5).unwrap();
        assert!(arc.sweep < 0.0);
        assert_abs_diff_eq!(arc.center.y(), -3.75, epsilon = 1e-9);
        assert_abs_diff_eq!(arc.radius, 6.25, epsilon = 1e-9);
        let end = arc_points(arc.center, arc.radius, arc.start_angle, arc.sweep, 8)[8];
        assert_abs_diff_eq!(end.x(), 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(end.y(), 0.0, epsilon = 1e-9);
        let mid = arc_points(arc.center, arc.radius, arc.start_angle, arc.sweep, 2)[1];
        assert!(mid.y() > 0.0);
        assert!(bulge_arc(Point::ORIGIN, Point::new(1.0, 0.0), 0.0).is_none());
    }
}
