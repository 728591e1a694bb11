use std::collections::HashMap;
use std::str::FromStr;

use camkit_core::drawing::{Drawing, SplitAxis};
use camkit_core::kernel;
use tracing::debug;

use crate::errors::EngineError;
use crate::transform;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn arg<T: FromStr>(&self, index: usize, what: &str) -> Result<T, EngineError> {
        let raw = self.args.get(index).ok_or_else(|| {
            EngineError::InvalidArgument(format!("{}: missing {what}", self.name))
        })?;
        raw.parse::<T>().map_err(|_| {
            EngineError::InvalidArgument(format!("{}: cannot parse {what} from {raw:?}", self.name))
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError>;
}

/// 命令执行时可访问的状态：调用方显式传入的图纸与离散参数。
pub struct CommandContext<'a> {
    pub drawing: &'a mut Drawing,
    pub arc_section_length: f64,
}

impl<'a> CommandContext<'a> {
    pub fn new(drawing: &'a mut Drawing) -> Self {
        Self {
            drawing,
            arc_section_length: kernel::ARC_SECTION_LENGTH,
        }
    }
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(RotateCommand);
        bus.register(TrimCommand);
        bus.register(SplitCommand);
        bus.register(FlattenCommand);
        bus.register(PromoteCirclesCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let handler = self
            .handlers
            .get(request.name.as_str())
            .ok_or_else(|| EngineError::UnknownCommand(request.name.clone()))?;
        debug!(command = %request.name, args = ?request.args, "执行命令");
        handler.execute(request, context)
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// `rotate <角度>`
struct RotateCommand;

impl CommandHandler for RotateCommand {
    fn name(&self) -> &'static str {
        "rotate"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let angle: f64 = request.arg(0, "angle")?;
        transform::rotate(context.drawing, angle)?;
        Ok(CommandResponse::ok(format!("已顺时针旋转 {angle}°")))
    }
}

struct TrimCommand;

impl CommandHandler for TrimCommand {
    fn name(&self) -> &'static str {
        "trim"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let message = if transform::trim(context.drawing) {
            "图纸已移到原点"
        } else {
            "图纸已在原点"
        };
        Ok(CommandResponse::ok(message))
    }
}

/// `split <位置> <x|y> <页>`
struct SplitCommand;

impl CommandHandler for SplitCommand {
    fn name(&self) -> &'static str {
        "split"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let position: f64 = request.arg(0, "position")?;
        let axis_name: String = request.arg(1, "axis")?;
        let axis = match axis_name.to_ascii_lowercase().as_str() {
            "x" => SplitAxis::X,
            "y" => SplitAxis::Y,
            other => {
                return Err(EngineError::InvalidArgument(format!(
                    "split: axis must be x or y, got {other:?}"
                )));
            }
        };
        let page: usize = request.arg(2, "page")?;
        transform::split_with(
            context.drawing,
            position,
            axis,
            page,
            context.arc_section_length,
        )?;
        Ok(CommandResponse::ok(format!(
            "已保留第 {page} 页，剩余 {} 个图元",
            context.drawing.entity_count()
        )))
    }
}

/// 把圆、圆弧和轻量多段线离散为多段线。
struct FlattenCommand;

impl CommandHandler for FlattenCommand {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let section = if request.args.is_empty() {
            context.arc_section_length
        } else {
            request.arg(0, "section length")?
        };
        if !(section.is_finite() && section > 0.0) {
            return Err(EngineError::InvalidArgument(format!(
                "flatten: section length {section} must be positive"
            )));
        }
        let count = context.drawing.flatten_curves(section);
        Ok(CommandResponse::ok(format!("已离散 {count} 个曲线图元")))
    }
}

struct PromoteCirclesCommand;

impl CommandHandler for PromoteCirclesCommand {
    fn name(&self) -> &'static str {
        "promote_circles"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let count = context.drawing.promote_circular_polylines();
        Ok(CommandResponse::ok(format!("已识别 {count} 个圆")))
    }
}
