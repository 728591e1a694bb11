pub mod command;

pub mod errors {
    use camkit_core::errors::DrawingError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error(transparent)]
        Drawing(#[from] DrawingError),
        #[error("invalid argument: {0}")]
        InvalidArgument(String),
        #[error("unknown command: {0}")]
        UnknownCommand(String),
    }
}

/// 作用于整张图纸的变换。每个操作返回时图纸范围都与当前内容一致。
pub mod transform {
    use camkit_core::drawing::{Drawing, SplitAxis, SplitPage};
    use camkit_core::geometry::Point;
    use camkit_core::kernel;
    use tracing::{debug, info, warn};

    use crate::errors::EngineError;

    /// 绕原点旋转，正角顺时针。
    pub fn rotate(drawing: &mut Drawing, angle_deg: f64) -> Result<(), EngineError> {
        if !angle_deg.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "rotation angle {angle_deg} is not finite"
            )));
        }
        drawing.rotate(Point::ORIGIN, angle_deg);
        info!(filename = drawing.filename(), angle_deg, "旋转完成");
        Ok(())
    }

    /// 把图纸移到原点，返回是否发生了平移。
    pub fn trim(drawing: &mut Drawing) -> bool {
        let moved = drawing.trim();
        debug!(filename = drawing.filename(), moved, "归零完成");
        moved
    }

    /// 使用默认离散段长分割，见 [`split_with`]。
    pub fn split(
        drawing: &mut Drawing,
        position: f64,
        axis: SplitAxis,
        page_index: usize,
    ) -> Result<(), EngineError> {
        split_with(drawing, position, axis, page_index, kernel::ARC_SECTION_LENGTH)
    }

    /// 沿分割线保留一页（0 为靠近原点一侧，1 为另一侧）。失败时图纸保持不变。
    pub fn split_with(
        drawing: &mut Drawing,
        position: f64,
        axis: SplitAxis,
        page_index: usize,
        section_length: f64,
    ) -> Result<(), EngineError> {
        let page = SplitPage::from_index(page_index).ok_or_else(|| {
            EngineError::InvalidArgument(format!("page index {page_index} must be 0 or 1"))
        })?;
        let result = drawing.split_with(position, axis, page, section_length)?;
        if result.is_empty() {
            warn!(position, ?axis, page_index, "分割结果为空页");
        }
        info!(
            filename = drawing.filename(),
            position,
            ?axis,
            page_index,
            before = drawing.entity_count(),
            after = result.entity_count(),
            "分割完成"
        );
        *drawing = result;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use camkit_core::drawing::{Arc, Circle, Drawing, Entity, Line, SplitAxis};
    use camkit_core::geometry::Point;

    use crate::errors::EngineError;
    use crate::transform;

    fn sample() -> Drawing {
        let entities: Vec<Entity> = vec![
            Line::new(Point::new(-5.0, -3.0), Point::new(15.0, 7.0)).into(),
            Circle::new(Point::new(10.0, 10.0), 2.0).into(),
            Arc::new(Point::new(0.0, 10.0), 3.0, 0.0, 90.0).into(),
        ];
        Drawing::from_entities("sample.dxf", entities).unwrap()
    }

    #[test]
    fn rotate_quarter_turn_is_clockwise() {
        let mut drawing = sample();
        transform::rotate(&mut drawing, 90.0).unwrap();
        let line = &drawing.lines()[0];
        assert_abs_diff_eq!(line.end.x(), 7.0, epsilon = 1e-9);
        assert_abs_diff_eq!(line.end.y(), -15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(drawing.arcs()[0].start_angle, 270.0, epsilon = 1e-9);

        transform::rotate(&mut drawing, -90.0).unwrap();
        assert_abs_diff_eq!(drawing.lines()[0].end.x(), 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(drawing.bounds().min().x(), -5.0, epsilon = 1e-9);
    }

    #[test]
    fn rotate_rejects_nan() {
        let mut drawing = sample();
        let err = transform::rotate(&mut drawing, f64::NAN).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn trim_moves_to_origin_once() {
        let mut drawing = sample();
        assert!(transform::trim(&mut drawing));
        assert_eq!(drawing.bounds().min().x(), 0.0);
        assert_eq!(drawing.bounds().min().y(), 0.0);
        assert!(!transform::trim(&mut drawing));
    }

    #[test]
    fn split_replaces_drawing_with_page() {
        let mut drawing = sample();
        transform::split(&mut drawing, 5.0, SplitAxis::X, 1).unwrap();
        assert!(drawing.arcs().is_empty());
        assert_eq!(drawing.circles().len(), 1);
        assert_abs_diff_eq!(drawing.circles()[0].center.x(), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(drawing.lines()[0].start.x(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(drawing.lines()[0].start.y(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn failed_split_leaves_drawing_untouched() {
        let mut drawing = sample();
        let before = drawing.clone();

        let err = transform::split(&mut drawing, 5.0, SplitAxis::Y, 2).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        let err = transform::split(&mut drawing, f64::NAN, SplitAxis::Y, 0).unwrap_err();
        assert!(matches!(err, EngineError::Drawing(_)));
        assert_eq!(drawing, before);
    }
}
