//! 矢量图形状导入。
//!
//! 源坐标系 Y 轴向下。导入时平移到可见形状范围的左下角并翻转 Y：
//! `x' = x − minX`，`y' = maxY − y`；圆弧角度随翻转变为 `(−end, −start)`。
//! 矢量图不产生轻量多段线。

use camkit_core::drawing::{Arc, Circle, DrawElement, Drawing, Line, Polyline};
use camkit_core::geometry::{Bounds, Point};
use camkit_core::kernel;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DrawingSource, IoError, ingest};

/// Y 轴向下的矢量图形状集合，可直接从形状导出的 JSON 反序列化。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDocument {
    pub filename: String,
    pub circles: Vec<Circle>,
    pub lines: Vec<Line>,
    pub arcs: Vec<Arc>,
    pub polylines: Vec<Polyline>,
}

/// 从源坐标到图纸坐标的映射。
#[derive(Debug, Clone, Copy)]
struct Flip {
    min_x: f64,
    max_y: f64,
}

impl Flip {
    fn point(self, p: Point) -> Point {
        Point::with_z(p.x() - self.min_x, self.max_y - p.y(), p.z())
    }
}

impl VectorDocument {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// 可见形状在源坐标系中的实时范围。
    pub fn extent(&self) -> Bounds {
        let mut bounds = Bounds::empty();
        let elements = self
            .circles
            .iter()
            .map(|e| e as &dyn DrawElement)
            .chain(self.lines.iter().map(|e| e as &dyn DrawElement))
            .chain(self.arcs.iter().map(|e| e as &dyn DrawElement))
            .chain(self.polylines.iter().map(|e| e as &dyn DrawElement));
        for element in elements.filter(|e| e.is_visible()) {
            element.include_in(&mut bounds);
        }
        bounds
    }

    fn flip(&self) -> Flip {
        let extent = self.extent();
        if extent.is_empty() {
            return Flip {
                min_x: 0.0,
                max_y: 0.0,
            };
        }
        Flip {
            min_x: extent.min().x(),
            max_y: extent.max().y(),
        }
    }
}

impl DrawingSource for VectorDocument {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn circles(&self) -> Vec<Circle> {
        let flip = self.flip();
        self.circles
            .iter()
            .map(|circle| Circle {
                center: flip.point(circle.center),
                ..circle.clone()
            })
            .collect()
    }

    fn lines(&self) -> Vec<Line> {
        let flip = self.flip();
        self.lines
            .iter()
            .map(|line| Line {
                start: flip.point(line.start),
                end: flip.point(line.end),
                ..line.clone()
            })
            .collect()
    }

    fn arcs(&self) -> Vec<Arc> {
        let flip = self.flip();
        self.arcs
            .iter()
            .map(|arc| Arc {
                center: flip.point(arc.center),
                start_angle: kernel::normalize_degrees(-arc.end_angle),
                end_angle: kernel::normalize_degrees(-arc.start_angle),
                ..arc.clone()
            })
            .collect()
    }

    fn polylines(&self) -> Vec<Polyline> {
        let flip = self.flip();
        self.polylines
            .iter()
            .map(|polyline| Polyline {
                vertices: polyline.vertices.iter().map(|&p| flip.point(p)).collect(),
                ..polyline.clone()
            })
            .collect()
    }
}

/// 导入矢量图；`detect_circles` 为真时把近似圆形的闭合多段线还原为圆。
pub fn ingest_vector(document: &VectorDocument, detect_circles: bool) -> Result<Drawing, IoError> {
    let mut drawing = ingest(document)?;
    if detect_circles {
        let promoted = drawing.promote_circular_polylines();
        debug!(filename = %document.filename, promoted, "矢量图圆形识别完成");
    }
    Ok(drawing)
}
