//! 数控程序（G 代码子集）读取。
//!
//! 支持的字：G0/G1/G2/G3（圆弧可用 R 或 I/J）、G17、G20/G21、G80–G83、G90/G91、
//! T 换刀、X/Y/Z/R/I/J 坐标。`( 名称 )` 单独成行时开始一个新块，块名作为图层。
//! 其余字（N、F、S、M 等）忽略。

use std::f64::consts::PI;
use std::path::Path;

use camkit_core::drawing::Drawing;
use camkit_core::geometry::Point;
use camkit_core::kernel;
use camkit_core::toolpath::{
    MotionKind, MotionSegment, ToolpathBlock, ToolpathOptions, ingest_toolpath,
};
use tracing::{debug, warn};

use crate::{DocumentLoader, IoError, file_name_of, read_source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Rapid,
    Linear,
    Clockwise,
    CounterClockwise,
    DrillCycle,
}

/// 单行中出现的字。
#[derive(Debug, Default)]
struct Words {
    motion: Option<Motion>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    r: Option<f64>,
    i: Option<f64>,
    j: Option<f64>,
    tool: Option<u32>,
}

impl Words {
    fn has_axis(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.z.is_some()
    }
}

/// 逐行解释 G 代码，产出刀路块。
struct GcodeInterpreter {
    blocks: Vec<ToolpathBlock>,
    current: ToolpathBlock,
    position: Point,
    motion: Motion,
    absolute: bool,
    pen: u32,
    retract: Option<f64>,
    drill_depth: Option<f64>,
    line_number: usize,
}

impl GcodeInterpreter {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            current: ToolpathBlock::default(),
            position: Point::ORIGIN,
            motion: Motion::Rapid,
            absolute: true,
            pen: 0,
            retract: None,
            drill_depth: None,
            line_number: 0,
        }
    }

    fn run(mut self, source: &str) -> Result<Vec<ToolpathBlock>, IoError> {
        for line in source.lines() {
            self.line_number += 1;
            self.line(line)?;
        }
        self.flush(None);
        Ok(self.blocks)
    }

    fn line(&mut self, raw: &str) -> Result<(), IoError> {
        let code = raw.split(';').next().unwrap_or_default().trim();
        if code.is_empty() || code == "%" {
            return Ok(());
        }
        if let Some(name) = block_name(code) {
            self.flush(Some(name));
            return Ok(());
        }

        let words = self.words(&strip_comments(code))?;
        if let Some(tool) = words.tool {
            if tool != self.pen && !self.current.segments.is_empty() {
                let name = self.current.name.clone();
                self.flush(name);
            }
            self.pen = tool;
        }
        if let Some(motion) = words.motion {
            self.motion = motion;
        }
        if !words.has_axis() {
            return Ok(());
        }

        let target = self.target(&words);
        match self.motion {
            Motion::Rapid => {
                self.current
                    .segments
                    .push(MotionSegment::rapid(self.position, target));
            }
            Motion::Linear => {
                self.current
                    .segments
                    .push(MotionSegment::cut(self.pen, self.position, target));
            }
            Motion::Clockwise | Motion::CounterClockwise => {
                let clockwise = self.motion == Motion::Clockwise;
                let radius = self.arc_radius(&words, target, clockwise)?;
                self.current.segments.push(MotionSegment::arc(
                    self.pen,
                    self.position,
                    target,
                    radius,
                    clockwise,
                ));
            }
            Motion::DrillCycle => {
                self.drill_cycle(&words, target);
                return Ok(());
            }
        }
        self.position = target;
        Ok(())
    }

    fn words(&mut self, code: &str) -> Result<Words, IoError> {
        let mut words = Words::default();
        let mut chars = code.char_indices().peekable();
        while let Some((start, letter)) = chars.next() {
            if letter.is_whitespace() {
                continue;
            }
            let mut end = start + letter.len_utf8();
            while let Some(&(index, c)) = chars.peek() {
                if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == ' ' {
                    end = index + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let number = code[start + letter.len_utf8()..end].replace(' ', "");
            let value = number.parse::<f64>().map_err(|_| {
                IoError::InvalidDocument(format!(
                    "第 {} 行的字 {letter}{number} 无法解析",
                    self.line_number
                ))
            })?;

            match letter.to_ascii_uppercase() {
                'G' => self.g_word(value, &mut words)?,
                'X' => words.x = Some(value),
                'Y' => words.y = Some(value),
                'Z' => words.z = Some(value),
                'R' => words.r = Some(value),
                'I' => words.i = Some(value),
                'J' => words.j = Some(value),
                'T' => words.tool = Some(value.max(0.0) as u32),
                _ => {}
            }
        }
        Ok(words)
    }

    fn g_word(&mut self, value: f64, words: &mut Words) -> Result<(), IoError> {
        match value.round() as i64 {
            0 => words.motion = Some(Motion::Rapid),
            1 => words.motion = Some(Motion::Linear),
            2 => words.motion = Some(Motion::Clockwise),
            3 => words.motion = Some(Motion::CounterClockwise),
            81..=83 => words.motion = Some(Motion::DrillCycle),
            80 => {
                words.motion = Some(Motion::Rapid);
                self.retract = None;
                self.drill_depth = None;
            }
            90 => self.absolute = true,
            91 => self.absolute = false,
            17 | 20 | 21 | 40 | 49 | 54..=59 | 94 => {}
            18 | 19 => {
                return Err(IoError::UnsupportedFeature(format!(
                    "第 {} 行：仅支持 XY 平面（G17）",
                    self.line_number
                )));
            }
            other => {
                warn!(line = self.line_number, code = other, "忽略未识别的 G 代码");
            }
        }
        Ok(())
    }

    fn target(&self, words: &Words) -> Point {
        let axis = |value: Option<f64>, current: f64| match value {
            Some(v) if self.absolute => v,
            Some(v) => current + v,
            None => current,
        };
        Point::with_z(
            axis(words.x, self.position.x()),
            axis(words.y, self.position.y()),
            axis(words.z, self.position.z()),
        )
    }

    /// I/J 圆心格式换算为带符号 R：扫角超过半圈时取负。
    fn arc_radius(&self, words: &Words, target: Point, clockwise: bool) -> Result<f64, IoError> {
        if let Some(radius) = words.r {
            return Ok(radius);
        }
        let (i, j) = (words.i.unwrap_or(0.0), words.j.unwrap_or(0.0));
        if i == 0.0 && j == 0.0 {
            return Err(IoError::InvalidDocument(format!(
                "第 {} 行的圆弧既没有 R 也没有 I/J",
                self.line_number
            )));
        }
        if kernel::distance(self.position, target) <= 1e-9 {
            return Err(IoError::UnsupportedFeature(format!(
                "第 {} 行：整圆插补",
                self.line_number
            )));
        }

        let center = self.position.translate(i, j);
        let radius = kernel::distance(center, self.position);
        let start = kernel::angle_of_radians(center, self.position);
        let end = kernel::angle_of_radians(center, target);
        let sweep = if clockwise {
            kernel::normalize_radians(start - end)
        } else {
            kernel::normalize_radians(end - start)
        };
        Ok(if sweep > PI { -radius } else { radius })
    }

    /// 固定循环：快速移到孔位与 R 平面，再落刀到 Z，最后回到 R 平面。每个孔单独成块。
    fn drill_cycle(&mut self, words: &Words, target: Point) {
        if let Some(r) = words.r {
            self.retract = Some(r);
        }
        if let Some(z) = words.z {
            self.drill_depth = Some(z);
        }
        let retract = self.retract.unwrap_or(self.position.z());
        let depth = self.drill_depth.unwrap_or(retract);
        let above = Point::with_z(target.x(), target.y(), retract);
        let bottom = Point::with_z(target.x(), target.y(), depth);

        let name = self.current.name.clone();
        self.flush(name.clone());
        self.current.segments = vec![
            MotionSegment::rapid(self.position, above),
            MotionSegment::cut(self.pen, above, bottom),
        ];
        self.flush(name);
        self.position = above;
    }

    /// 收尾当前块并以 `next_name` 开启新块。只含落刀的块标记为钻孔点。
    fn flush(&mut self, next_name: Option<String>) {
        let mut block = std::mem::replace(
            &mut self.current,
            ToolpathBlock {
                name: next_name,
                ..ToolpathBlock::default()
            },
        );
        if block.segments.is_empty() {
            return;
        }
        let mut cuts = block
            .segments
            .iter()
            .filter(|s| s.kind == MotionKind::Cut)
            .peekable();
        block.is_drill_point =
            cuts.peek().is_some() && cuts.all(|s| s.from.xy() == s.to.xy() && s.arc.is_none());
        self.blocks.push(block);
    }
}

fn block_name(code: &str) -> Option<String> {
    let inner = code.strip_prefix('(')?.strip_suffix(')')?;
    if inner.contains(['(', ')']) {
        return None;
    }
    let name = inner.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn strip_comments(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut depth = 0usize;
    for c in code.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// 把 G 代码文本解析为刀路块。
pub fn parse_gcode(source: &str) -> Result<Vec<ToolpathBlock>, IoError> {
    GcodeInterpreter::new().run(source)
}

pub struct GcodeFacade {
    options: ToolpathOptions,
}

impl GcodeFacade {
    pub fn new() -> Self {
        Self::with_options(ToolpathOptions::default())
    }

    pub fn with_options(options: ToolpathOptions) -> Self {
        Self { options }
    }
}

impl Default for GcodeFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for GcodeFacade {
    fn load(&self, path: &Path) -> Result<Drawing, IoError> {
        let source = read_source(path)?;
        let blocks = parse_gcode(&source)?;
        debug!(path = %path.display(), blocks = blocks.len(), "G 代码解析完成");
        Ok(ingest_toolpath(file_name_of(path), &blocks, &self.options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn named_blocks_and_tool_changes() {
        let source = "%\n(outline)\nT1 M6\nG0 X0 Y0 Z5\nG1 Z-1 F100\nX10\nY10 ; corner\nT2\nX0\n(holes)\nG0 X3 Y3\n%\n";
        let blocks = parse_gcode(source).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].name.as_deref(), Some("outline"));
        assert_eq!(blocks[0].segments.len(), 4);
        assert_eq!(blocks[0].segments[3].pen, 1);
        assert_eq!(blocks[1].name.as_deref(), Some("outline"));
        assert_eq!(blocks[1].segments[0].pen, 2);
        assert_eq!(blocks[2].name.as_deref(), Some("holes"));
        assert_eq!(blocks[2].segments[0].kind, MotionKind::Rapid);
    }

    #[test]
    fn incremental_mode_accumulates() {
        let blocks = parse_gcode("G91\nG1 X2 Y1\nX2\n").unwrap();
        let last = blocks[0].segments[1];
        assert_eq!(last.from.xy(), Point::new(2.0, 1.0).xy());
        assert_eq!(last.to.xy(), Point::new(4.0, 1.0).xy());
    }

    #[test]
    fn ij_arc_over_half_turn_gets_negative_radius() {
        // 从 (10,0) 逆时针绕 (0,0) 到 (0,-10)：扫角 270°
        let blocks = parse_gcode("G0 X10 Y0\nG3 X0 Y-10 I-10 J0\n").unwrap();
        let arc = blocks[0].segments[1].arc.unwrap();
        assert!(!arc.clockwise);
        assert_abs_diff_eq!(arc.radius, -10.0, epsilon = 1e-12);

        let short = parse_gcode("G0 X10 Y0\nG3 X0 Y10 I-10 J0\n").unwrap();
        assert_abs_diff_eq!(short[0].segments[1].arc.unwrap().radius, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn full_circle_ij_is_unsupported() {
        let err = parse_gcode("G0 X10 Y0\nG2 X10 Y0 I-10 J0\n").unwrap_err();
        assert!(matches!(err, IoError::UnsupportedFeature(_)));
    }

    #[test]
    fn drill_cycle_blocks_are_drill_points() {
        let blocks = parse_gcode("(drill)\nT3\nG81 X5 Y6 Z-2 R1\nX8 Y6\nG80\n").unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.is_drill_point));
        assert!(blocks.iter().all(|b| b.name.as_deref() == Some("drill")));

        let drawing = ingest_toolpath("d.nc", &blocks, &ToolpathOptions::default()).unwrap();
        assert_eq!(drawing.circles().len(), 2);
        assert_eq!(drawing.circles()[1].center.xy(), Point::new(8.0, 6.0).xy());
    }

    #[test]
    fn malformed_word_is_invalid() {
        let err = parse_gcode("G1 X1.2.3\n").unwrap_err();
        assert!(matches!(err, IoError::InvalidDocument(_)));
    }
}
