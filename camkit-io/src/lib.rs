use std::path::{Path, PathBuf};

use camkit_core::drawing::{Arc, Circle, Drawing, Entity, Line, Polyline, PolylineLw};
use camkit_core::errors::DrawingError;
use camkit_core::toolpath::ToolpathOptions;
use thiserror::Error;
use tracing::debug;

pub mod dxf;
pub mod toolpath;
pub mod vector;

pub use dxf::{DxfDocument, DxfFacade};
pub use toolpath::GcodeFacade;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Drawing(#[from] DrawingError),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Drawing, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, drawing: &Drawing, path: &Path) -> Result<(), IoError>;
}

/// 外部文档的强类型访问接口，每类图元一个取值方法。
///
/// 不提供某类图元的格式（例如矢量图没有轻量多段线）保留默认实现即可。
pub trait DrawingSource {
    fn filename(&self) -> &str;

    fn circles(&self) -> Vec<Circle> {
        Vec::new()
    }

    fn lines(&self) -> Vec<Line> {
        Vec::new()
    }

    fn arcs(&self) -> Vec<Arc> {
        Vec::new()
    }

    fn polylines(&self) -> Vec<Polyline> {
        Vec::new()
    }

    fn lw_polylines(&self) -> Vec<PolylineLw> {
        Vec::new()
    }
}

/// 导出目标，按顺序接收可见图元。
pub trait DrawingSink {
    fn accept(&mut self, entity: &Entity) -> Result<(), IoError>;
}

impl DrawingSink for Vec<Entity> {
    fn accept(&mut self, entity: &Entity) -> Result<(), IoError> {
        self.push(entity.clone());
        Ok(())
    }
}

/// 由外部文档构建图纸；任一图元非法时整体失败。
pub fn ingest<S>(source: &S) -> Result<Drawing, IoError>
where
    S: DrawingSource + ?Sized,
{
    let entities = source
        .circles()
        .into_iter()
        .map(Entity::Circle)
        .chain(source.lines().into_iter().map(Entity::Line))
        .chain(source.arcs().into_iter().map(Entity::Arc))
        .chain(source.polylines().into_iter().map(Entity::Polyline))
        .chain(source.lw_polylines().into_iter().map(Entity::PolylineLw));
    let drawing = Drawing::from_entities(source.filename(), entities)?;
    debug!(
        filename = source.filename(),
        entities = drawing.entity_count(),
        "外部文档已导入"
    );
    Ok(drawing)
}

/// 把图纸的可见图元依次交给 `sink`，返回导出数量。
pub fn export<S>(drawing: &Drawing, sink: &mut S) -> Result<usize, IoError>
where
    S: DrawingSink + ?Sized,
{
    let entities = drawing.export_entities();
    for entity in &entities {
        sink.accept(entity)?;
    }
    debug!(filename = drawing.filename(), exported = entities.len(), "图纸已导出");
    Ok(entities.len())
}

/// 按扩展名选择加载器：`.nc`/`.ngc`/`.gcode`/`.tap` 走刀路，其余按 DXF 处理。
pub fn loader_for_path(path: &Path, toolpath: ToolpathOptions) -> Box<dyn DocumentLoader> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("nc" | "ngc" | "gcode" | "tap") => Box::new(GcodeFacade::with_options(toolpath)),
        _ => Box::new(DxfFacade::new()),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_source(path: &Path) -> Result<String, IoError> {
    std::fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camkit_core::geometry::Point;

    struct FixedSource;

    impl DrawingSource for FixedSource {
        fn filename(&self) -> &str {
            "fixed"
        }

        fn circles(&self) -> Vec<Circle> {
            vec![Circle::new(Point::new(1.0, 1.0), 1.0)]
        }

        fn lines(&self) -> Vec<Line> {
            vec![Line::new(Point::new(-4.0, 0.0), Point::new(0.0, 6.0))]
        }
    }

    struct BrokenSource;

    impl DrawingSource for BrokenSource {
        fn filename(&self) -> &str {
            "broken"
        }

        fn arcs(&self) -> Vec<Arc> {
            vec![Arc::new(Point::ORIGIN, f64::INFINITY, 0.0, 90.0)]
        }
    }

    #[test]
    fn ingest_uses_typed_getters() {
        let drawing = ingest(&FixedSource).unwrap();
        assert_eq!(drawing.filename(), "fixed");
        assert_eq!(drawing.circles().len(), 1);
        assert_eq!(drawing.lines().len(), 1);
        assert_eq!(drawing.bounds().min().x(), -4.0);
        assert_eq!(drawing.bounds().max().y(), 6.0);
    }

    #[test]
    fn ingest_failure_surfaces_drawing_error() {
        let err = ingest(&BrokenSource).unwrap_err();
        assert!(matches!(err, IoError::Drawing(DrawingError::InvalidEntity { .. })));
    }

    #[test]
    fn export_into_vec_collects_visible_entities() {
        let mut drawing = ingest(&FixedSource).unwrap();
        drawing
            .set_visibility(
                camkit_core::drawing::EntityRef::new(camkit_core::drawing::EntityKind::Line, 0),
                false,
            )
            .unwrap();
        let mut sink: Vec<Entity> = Vec::new();
        assert_eq!(export(&drawing, &mut sink).unwrap(), 1);
        assert!(matches!(sink[0], Entity::Circle(_)));
    }
}
