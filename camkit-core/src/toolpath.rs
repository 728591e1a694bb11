//! 数控刀路导入：把分块的运动段转换为图元。
//!
//! 快速移动保留为不可见直线；连续的切削段合并为一条多段线，只存每段起点与路径终点；
//! 钻孔/探测块在落刀位置画一个固定半径的小圆。

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::drawing::{Circle, Drawing, ElementAttributes, Entity, Line, Polyline};
use crate::errors::DrawingError;
use crate::geometry::Point;
use crate::kernel;

/// 钻孔标记的默认半径。
pub const DEFAULT_DRILL_MARKER_RADIUS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionKind {
    Rapid,
    Cut,
}

/// 圆弧插补（R 字格式）：仅给出终点与半径。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcMotion {
    pub radius: f64,
    pub clockwise: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSegment {
    pub kind: MotionKind,
    pub pen: u32,
    pub from: Point,
    pub to: Point,
    #[serde(default)]
    pub arc: Option<ArcMotion>,
}

impl MotionSegment {
    pub fn rapid(from: Point, to: Point) -> Self {
        Self {
            kind: MotionKind::Rapid,
            pen: 0,
            from,
            to,
            arc: None,
        }
    }

    pub fn cut(pen: u32, from: Point, to: Point) -> Self {
        Self {
            kind: MotionKind::Cut,
            pen,
            from,
            to,
            arc: None,
        }
    }

    pub fn arc(pen: u32, from: Point, to: Point, radius: f64, clockwise: bool) -> Self {
        Self {
            arc: Some(ArcMotion { radius, clockwise }),
            ..Self::cut(pen, from, to)
        }
    }

    #[inline]
    fn is_plunge(&self) -> bool {
        self.from.xy() == self.to.xy()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolpathBlock {
    pub name: Option<String>,
    pub segments: Vec<MotionSegment>,
    #[serde(default)]
    pub is_drill_point: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolpathOptions {
    pub drill_marker_radius: f64,
    pub arc_section_length: f64,
}

impl Default for ToolpathOptions {
    fn default() -> Self {
        Self {
            drill_marker_radius: DEFAULT_DRILL_MARKER_RADIUS,
            arc_section_length: kernel::ARC_SECTION_LENGTH,
        }
    }
}

/// 正在合并的切削路径。
struct PathBuilder {
    pen: u32,
    vertices: Vec<Point>,
    pending_end: Point,
}

impl PathBuilder {
    fn finish(self, name: Option<&String>) -> Polyline {
        let mut vertices = self.vertices;
        vertices.push(self.pending_end);
        Polyline {
            vertices,
            is_closed: false,
            attributes: ElementAttributes {
                code_name: Some(format!("T{}", self.pen)),
                layer: name.cloned(),
                ..ElementAttributes::default()
            },
        }
    }
}

/// 圆弧段离散后的中间点（不含起止点）。
fn arc_interior(
    segment: &MotionSegment,
    arc: ArcMotion,
    section_length: f64,
) -> Result<Vec<Point>, DrawingError> {
    let center = kernel::arc_center(segment.from, segment.to, arc.radius, arc.clockwise)?;
    let radius = kernel::distance(center, segment.from);
    let start = kernel::angle_of_radians(center, segment.from);
    let end = kernel::angle_of_radians(center, segment.to);
    let sweep = if arc.clockwise {
        -kernel::normalize_radians(start - end)
    } else {
        kernel::normalize_radians(end - start)
    };
    if sweep == 0.0 {
        return Ok(Vec::new());
    }
    let steps = kernel::arc_step_count_with(sweep, radius, section_length);
    let mut points = kernel::arc_points(center, radius, start, sweep, steps);
    points.pop();
    if !points.is_empty() {
        points.remove(0);
    }
    let z = segment.from.z();
    Ok(points
        .into_iter()
        .map(|p| Point::with_z(p.x(), p.y(), z))
        .collect())
}

fn block_entities(
    block: &ToolpathBlock,
    options: &ToolpathOptions,
    entities: &mut Vec<Entity>,
) -> Result<(), DrawingError> {
    let name = block.name.as_ref();
    let mut path: Option<PathBuilder> = None;

    for segment in &block.segments {
        if !segment.from.is_finite() || !segment.to.is_finite() {
            return Err(DrawingError::InvalidEntity {
                kind: "motion segment",
                reason: format!("block {name:?} contains non-finite coordinates"),
            });
        }

        if segment.kind == MotionKind::Rapid {
            if let Some(done) = path.take() {
                entities.push(Entity::Polyline(done.finish(name)));
            }
            let mut line = Line::new(segment.from, segment.to);
            line.attributes.visible = false;
            line.attributes.layer = name.cloned();
            entities.push(Entity::Line(line));
            continue;
        }

        if block.is_drill_point || segment.is_plunge() {
            continue;
        }

        let continues = path
            .as_ref()
            .is_some_and(|p| p.pen == segment.pen && p.pending_end.xy() == segment.from.xy());
        if !continues {
            if let Some(done) = path.take() {
                entities.push(Entity::Polyline(done.finish(name)));
            }
        }

        let builder = path.get_or_insert_with(|| PathBuilder {
            pen: segment.pen,
            vertices: Vec::new(),
            pending_end: segment.from,
        });
        builder.vertices.push(segment.from);
        if let Some(arc) = segment.arc {
            builder
                .vertices
                .extend(arc_interior(segment, arc, options.arc_section_length)?);
        }
        builder.pending_end = segment.to;
    }

    if let Some(done) = path.take() {
        entities.push(Entity::Polyline(done.finish(name)));
    }

    if block.is_drill_point {
        let location = block
            .segments
            .iter()
            .find(|s| s.kind == MotionKind::Cut)
            .map(|s| s.from)
            .or_else(|| block.segments.last().map(|s| s.to));
        if let Some(location) = location {
            let mut marker = Circle::new(
                Point::with_z(location.x(), location.y(), 0.0),
                options.drill_marker_radius,
            );
            marker.attributes.layer = name.cloned();
            entities.push(Entity::Circle(marker));
        }
    }
    Ok(())
}

/// 由刀路块构建图纸，范围在全部块处理完后一次计算。
pub fn ingest_toolpath(
    filename: impl Into<String>,
    blocks: &[ToolpathBlock],
    options: &ToolpathOptions,
) -> Result<Drawing, DrawingError> {
    let mut entities = Vec::new();
    for block in blocks {
        block_entities(block, options, &mut entities)?;
    }
    let drawing = Drawing::from_entities(filename, entities)?;
    debug!(
        blocks = blocks.len(),
        polylines = drawing.polylines().len(),
        rapids = drawing.lines().len(),
        "刀路导入完成"
    );
    Ok(drawing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::DrawElement;
    use approx::assert_abs_diff_eq;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn rapids_become_hidden_lines_and_cuts_coalesce() {
        let block = ToolpathBlock {
            name: Some("contour".to_string()),
            segments: vec![
                MotionSegment::rapid(p(0.0, 0.0), p(10.0, 10.0)),
                MotionSegment::cut(1, Point::with_z(10.0, 10.0, 5.0), Point::with_z(10.0, 10.0, -1.0)),
                MotionSegment::cut(1, p(10.0, 10.0), p(20.0, 10.0)),
                MotionSegment::cut(1, p(20.0, 10.0), p(20.0, 20.0)),
                MotionSegment::cut(1, p(20.0, 20.0), p(10.0, 10.0)),
            ],
            is_drill_point: false,
        };
        let drawing = ingest_toolpath("part.nc", &[block], &ToolpathOptions::default()).unwrap();

        assert_eq!(drawing.lines().len(), 1);
        let rapid = &drawing.lines()[0];
        assert!(!rapid.is_visible());
        assert_eq!(rapid.layer(), Some("contour"));

        assert_eq!(drawing.polylines().len(), 1);
        let path = &drawing.polylines()[0];
        assert_eq!(path.vertices.len(), 4);
        assert_eq!(path.vertices[0].xy(), p(10.0, 10.0).xy());
        assert_eq!(path.vertices[3].xy(), p(10.0, 10.0).xy());
        assert_eq!(path.code_name(), Some("T1"));

        // 快速移动不计入范围
        let bounds = drawing.bounds();
        assert_eq!((bounds.min().x(), bounds.min().y()), (10.0, 10.0));
        assert_eq!((bounds.max().x(), bounds.max().y()), (20.0, 20.0));
    }

    #[test]
    fn discontinuity_and_pen_change_start_new_paths() {
        let block = ToolpathBlock {
            name: None,
            segments: vec![
                MotionSegment::cut(1, p(0.0, 0.0), p(5.0, 0.0)),
                MotionSegment::cut(2, p(5.0, 0.0), p(5.0, 5.0)),
                MotionSegment::cut(2, p(7.0, 7.0), p(9.0, 9.0)),
            ],
            is_drill_point: false,
        };
        let drawing = ingest_toolpath("pens.nc", &[block], &ToolpathOptions::default()).unwrap();
        assert_eq!(drawing.polylines().len(), 3);
        assert!(drawing.polylines().iter().all(|p| p.vertices.len() == 2));
    }

    #[test]
    fn drill_block_becomes_marker_circle() {
        let block = ToolpathBlock {
            name: Some("drill".to_string()),
            segments: vec![
                MotionSegment::rapid(p(0.0, 0.0), p(30.0, 40.0)),
                MotionSegment::cut(1, Point::with_z(30.0, 40.0, 2.0), Point::with_z(30.0, 40.0, -3.0)),
            ],
            is_drill_point: true,
        };
        let options = ToolpathOptions {
            drill_marker_radius: 2.5,
            ..ToolpathOptions::default()
        };
        let drawing = ingest_toolpath("drill.nc", &[block], &options).unwrap();
        assert!(drawing.polylines().is_empty());
        assert_eq!(drawing.circles().len(), 1);
        let marker = &drawing.circles()[0];
        assert_eq!(marker.center.xy(), p(30.0, 40.0).xy());
        assert_eq!(marker.radius, 2.5);
        assert_eq!(drawing.bounds().min().x(), 27.5);
    }

    #[test]
    fn radius_arc_is_tessellated_through_reconstructed_center() {
        let block = ToolpathBlock {
            name: None,
            segments: vec![MotionSegment::arc(1, p(0.0, 0.0), p(10.0, 0.0), 5.0, true)],
            is_drill_point: false,
        };
        let drawing = ingest_toolpath("arc.nc", &[block], &ToolpathOptions::default()).unwrap();
        let path = &drawing.polylines()[0];
        assert!(path.vertices.len() > 3);
        for vertex in &path.vertices {
            assert_abs_diff_eq!(kernel::distance(*vertex, p(5.0, 0.0)), 5.0, epsilon = 1e-9);
        }
        // 顺时针从 (0,0) 到 (10,0) 经过上半圆
        assert!(path.vertices.iter().any(|v| v.y() > 4.9));
    }

    #[test]
    fn arc_with_short_radius_fails() {
        let block = ToolpathBlock {
            name: None,
            segments: vec![MotionSegment::arc(1, p(0.0, 0.0), p(10.0, 0.0), 2.0, true)],
            is_drill_point: false,
        };
        let result = ingest_toolpath("bad.nc", &[block], &ToolpathOptions::default());
        assert!(matches!(result, Err(DrawingError::Geometry(_))));
    }
}
