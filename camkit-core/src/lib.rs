pub mod drawing;
pub mod geometry;
pub mod kernel;
pub mod toolpath;

pub mod errors {
    use thiserror::Error;

    /// 几何内核错误，均为调用方可恢复的局部错误。
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum GeometryError {
        #[error("operation requires at least one point")]
        EmptyInput,
        #[error("radius {radius} is too small to span a chord of half length {half_chord}")]
        RadiusTooSmall { radius: f64, half_chord: f64 },
        #[error("line has zero length")]
        DegenerateLine,
        #[error("lines are parallel or coincident")]
        ParallelLines,
    }

    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum DrawingError {
        #[error(transparent)]
        Geometry(#[from] GeometryError),
        #[error("invalid {kind}: {reason}")]
        InvalidEntity { kind: &'static str, reason: String },
        #[error("{kind} at index {index} not found")]
        EntityNotFound { kind: &'static str, index: usize },
        #[error("invalid split: {0}")]
        InvalidSplit(String),
    }
}
