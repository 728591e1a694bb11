//! ASCII DXF 子集：LINE、CIRCLE、ARC、LWPOLYLINE 与 POLYLINE/VERTEX/SEQEND。
//!
//! 公共组码：5 句柄（作为图元代号）、8 图层、60 可见性、420 真彩色；圆与圆弧读取 39 厚度。
//! 其它实体跳过并记录警告。

use std::fmt::{Display, Write as _};
use std::path::Path;

use camkit_core::drawing::{
    Arc, Circle, Color, DrawElement, Drawing, ElementAttributes, Entity, Line, LwVertex, Polyline,
    PolylineLw,
};
use camkit_core::geometry::Point;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    DocumentLoader, DocumentSaver, DrawingSink, DrawingSource, IoError, export, file_name_of,
    ingest, read_source,
};

/// 解析后的 DXF 实体序列，同时充当导入源与导出目标。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DxfDocument {
    pub filename: String,
    pub entities: Vec<Entity>,
}

impl DxfDocument {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            entities: Vec::new(),
        }
    }

    pub fn parse(filename: impl Into<String>, source: &str) -> Result<Self, IoError> {
        let filename = filename.into();
        let parser = DxfParser::new(source);
        let (entities, skipped) = parser.parse()?;
        debug!(
            filename = %filename,
            entities = entities.len(),
            skipped,
            "DXF 解析完成"
        );
        Ok(Self { filename, entities })
    }

    /// 生成只含 ENTITIES 段的 DXF 文本；没有图层的图元写入 `layer_fallback`。
    pub fn to_dxf_string(&self, layer_fallback: &str) -> String {
        let mut writer = DxfWriter::new(layer_fallback);
        writer.group(0, "SECTION");
        writer.group(2, "ENTITIES");
        for entity in &self.entities {
            writer.entity(entity);
        }
        writer.group(0, "ENDSEC");
        writer.group(0, "EOF");
        writer.out
    }

    fn collect<T: Clone>(&self, pick: impl Fn(&Entity) -> Option<&T>) -> Vec<T> {
        self.entities.iter().filter_map(pick).cloned().collect()
    }
}

impl DrawingSource for DxfDocument {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn circles(&self) -> Vec<Circle> {
        self.collect(|e| match e {
            Entity::Circle(circle) => Some(circle),
            _ => None,
        })
    }

    fn lines(&self) -> Vec<Line> {
        self.collect(|e| match e {
            Entity::Line(line) => Some(line),
            _ => None,
        })
    }

    fn arcs(&self) -> Vec<Arc> {
        self.collect(|e| match e {
            Entity::Arc(arc) => Some(arc),
            _ => None,
        })
    }

    fn polylines(&self) -> Vec<Polyline> {
        self.collect(|e| match e {
            Entity::Polyline(polyline) => Some(polyline),
            _ => None,
        })
    }

    fn lw_polylines(&self) -> Vec<PolylineLw> {
        self.collect(|e| match e {
            Entity::PolylineLw(polyline) => Some(polyline),
            _ => None,
        })
    }
}

impl DrawingSink for DxfDocument {
    fn accept(&mut self, entity: &Entity) -> Result<(), IoError> {
        self.entities.push(entity.clone());
        Ok(())
    }
}

pub struct DxfFacade {
    layer_fallback: String,
}

impl DxfFacade {
    pub fn new() -> Self {
        Self::with_layer_fallback("0")
    }

    pub fn with_layer_fallback(layer: impl Into<String>) -> Self {
        Self {
            layer_fallback: layer.into(),
        }
    }
}

impl Default for DxfFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Drawing, IoError> {
        let data = read_source(path)?;
        let document = DxfDocument::parse(file_name_of(path), &data)?;
        ingest(&document)
    }
}

impl DocumentSaver for DxfFacade {
    fn save(&self, drawing: &Drawing, path: &Path) -> Result<(), IoError> {
        let mut document = DxfDocument::new(drawing.filename());
        export(drawing, &mut document)?;
        std::fs::write(path, document.to_dxf_string(&self.layer_fallback)).map_err(|source| {
            IoError::WriteError {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

#[derive(Debug)]
enum DxfError {
    Unsupported { feature: String },
    Invalid { message: String },
}

impl DxfError {
    fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

impl From<DxfError> for IoError {
    fn from(err: DxfError) -> Self {
        match err {
            DxfError::Unsupported { feature } => IoError::UnsupportedFeature(feature),
            DxfError::Invalid { message } => IoError::InvalidDocument(message),
        }
    }
}

/// 所有实体共有的组码。
#[derive(Debug, Default)]
struct CommonGroups {
    handle: Option<String>,
    layer: Option<String>,
    invisible: bool,
    color: Option<Color>,
}

impl CommonGroups {
    /// 消费公共组码时返回 `true`。
    fn absorb(&mut self, code: i32, value: &str, entity: &str) -> Result<bool, DxfError> {
        match code {
            5 => self.handle = Some(value.trim().to_string()),
            8 => self.layer = Some(value.trim().to_string()),
            60 => {
                self.invisible = parse_i32(value, &format!("{entity} 可见性（组码 60）"))? == 1;
            }
            420 => {
                let raw = parse_i32(value, &format!("{entity} 真彩色（组码 420）"))?;
                self.color = Some(Color::from_true_color(raw as u32 & 0x00FF_FFFF));
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn into_attributes(self) -> ElementAttributes {
        ElementAttributes {
            code_name: self.handle,
            color: self.color,
            visible: !self.invisible,
            layer: self.layer,
        }
    }
}

struct RoundGroups {
    center: Point,
    radius: f64,
    thickness: f64,
    start_angle: Option<f64>,
    end_angle: Option<f64>,
    common: CommonGroups,
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
    skipped: usize,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
            skipped: 0,
        }
    }

    fn parse(mut self) -> Result<(Vec<Entity>, usize), DxfError> {
        let mut entities = Vec::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 999 {
                continue;
            }
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "ENTITIES" => self.parse_entities(&mut entities)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        Ok((entities, self.skipped))
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, entities: &mut Vec<Entity>) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            match value.trim() {
                "ENDSEC" => break,
                "LINE" => entities.push(self.parse_line()?),
                "CIRCLE" => entities.push(self.parse_circle()?),
                "ARC" => entities.push(self.parse_arc()?),
                "LWPOLYLINE" => entities.push(self.parse_lwpolyline()?),
                "POLYLINE" => entities.push(self.parse_polyline()?),
                other => {
                    warn!(entity = other, "跳过暂不支持的 DXF 实体");
                    self.skipped += 1;
                    self.skip_entity_body()?;
                }
            }
        }
        Ok(())
    }

    /// 读取当前实体的下一个组码；遇到下一实体（组码 0）时回退并返回 `None`。
    fn next_group(&mut self, entity: &str) -> Result<Option<(i32, String)>, DxfError> {
        match self.reader.next_pair()? {
            Some((0, value)) => {
                self.reader.put_back((0, value));
                Ok(None)
            }
            Some(pair) => Ok(Some(pair)),
            None => Err(DxfError::invalid(format!("{entity} 未正确结束"))),
        }
    }

    fn parse_line(&mut self) -> Result<Entity, DxfError> {
        let mut common = CommonGroups::default();
        let (mut sx, mut sy, mut sz) = (None, None, None);
        let (mut ex, mut ey, mut ez) = (None, None, None);
        while let Some((code, value)) = self.next_group("LINE")? {
            if common.absorb(code, &value, "LINE")? {
                continue;
            }
            match code {
                10 => assign_coord(&mut sx, &value, "LINE 起点 X（组码 10）")?,
                20 => assign_coord(&mut sy, &value, "LINE 起点 Y（组码 20）")?,
                30 => assign_coord(&mut sz, &value, "LINE 起点 Z（组码 30）")?,
                11 => assign_coord(&mut ex, &value, "LINE 终点 X（组码 11）")?,
                21 => assign_coord(&mut ey, &value, "LINE 终点 Y（组码 21）")?,
                31 => assign_coord(&mut ez, &value, "LINE 终点 Z（组码 31）")?,
                _ => {}
            }
        }

        let start = Point::with_z(
            require(sx, "LINE 缺少起点 X（组码 10）")?,
            require(sy, "LINE 缺少起点 Y（组码 20）")?,
            sz.unwrap_or(0.0),
        );
        let end = Point::with_z(
            require(ex, "LINE 缺少终点 X（组码 11）")?,
            require(ey, "LINE 缺少终点 Y（组码 21）")?,
            ez.unwrap_or(0.0),
        );
        Ok(Entity::Line(Line {
            start,
            end,
            attributes: common.into_attributes(),
        }))
    }

    /// CIRCLE 与 ARC 共用的组码；ARC 额外读取起止角。
    fn parse_round(&mut self, entity: &str) -> Result<RoundGroups, DxfError> {
        let mut common = CommonGroups::default();
        let (mut cx, mut cy, mut cz) = (None, None, None);
        let mut radius = None;
        let mut thickness = None;
        let mut start_angle = None;
        let mut end_angle = None;
        while let Some((code, value)) = self.next_group(entity)? {
            if common.absorb(code, &value, entity)? {
                continue;
            }
            match code {
                10 => assign_coord(&mut cx, &value, &format!("{entity} 圆心 X（组码 10）"))?,
                20 => assign_coord(&mut cy, &value, &format!("{entity} 圆心 Y（组码 20）"))?,
                30 => assign_coord(&mut cz, &value, &format!("{entity} 圆心 Z（组码 30）"))?,
                39 => assign_coord(&mut thickness, &value, &format!("{entity} 厚度（组码 39）"))?,
                40 => assign_coord(&mut radius, &value, &format!("{entity} 半径（组码 40）"))?,
                50 => assign_coord(&mut start_angle, &value, &format!("{entity} 起始角（组码 50）"))?,
                51 => assign_coord(&mut end_angle, &value, &format!("{entity} 终止角（组码 51）"))?,
                _ => {}
            }
        }

        let center = Point::with_z(
            require(cx, format!("{entity} 缺少圆心 X（组码 10）"))?,
            require(cy, format!("{entity} 缺少圆心 Y（组码 20）"))?,
            cz.unwrap_or(0.0),
        );
        let radius = require(radius, format!("{entity} 缺少半径（组码 40）"))?;
        Ok(RoundGroups {
            center,
            radius,
            thickness: thickness.unwrap_or(0.0),
            start_angle,
            end_angle,
            common,
        })
    }

    fn parse_circle(&mut self) -> Result<Entity, DxfError> {
        let round = self.parse_round("CIRCLE")?;
        Ok(Entity::Circle(Circle {
            center: round.center,
            radius: round.radius,
            thickness: round.thickness,
            attributes: round.common.into_attributes(),
        }))
    }

    fn parse_arc(&mut self) -> Result<Entity, DxfError> {
        let round = self.parse_round("ARC")?;
        Ok(Entity::Arc(Arc {
            center: round.center,
            radius: round.radius,
            thickness: round.thickness,
            start_angle: require(round.start_angle, "ARC 缺少起始角（组码 50）")?,
            end_angle: require(round.end_angle, "ARC 缺少终止角（组码 51）")?,
            attributes: round.common.into_attributes(),
        }))
    }

    fn parse_lwpolyline(&mut self) -> Result<Entity, DxfError> {
        let mut common = CommonGroups::default();
        let mut is_closed = false;
        let mut elevation = 0.0;
        let mut vertices: Vec<LwVertex> = Vec::new();
        let mut pending_x: Option<f64> = None;
        let mut pending_y: Option<f64> = None;
        while let Some((code, value)) = self.next_group("LWPOLYLINE")? {
            if common.absorb(code, &value, "LWPOLYLINE")? {
                continue;
            }
            match code {
                70 => {
                    let flag = parse_i32(&value, "LWPOLYLINE 标志")?;
                    is_closed = flag & 0x01 == 0x01;
                }
                38 => elevation = parse_f64(&value, "LWPOLYLINE 标高（组码 38）")?,
                10 => {
                    let x = parse_f64(&value, "LWPOLYLINE 顶点 X")?;
                    if let Some(y) = pending_y.take() {
                        vertices.push(LwVertex::new(x, y));
                    } else if pending_x.replace(x).is_some() {
                        return Err(DxfError::invalid("LWPOLYLINE 顶点缺少对应的 Y（组码 20）"));
                    }
                }
                20 => {
                    let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                    if let Some(x) = pending_x.take() {
                        vertices.push(LwVertex::new(x, y));
                    } else if pending_y.replace(y).is_some() {
                        return Err(DxfError::invalid("LWPOLYLINE 顶点缺少对应的 X（组码 10）"));
                    }
                }
                40 | 41 | 42 => {
                    let parsed = parse_f64(&value, &format!("LWPOLYLINE 顶点属性（组码 {code}）"))?;
                    let vertex = vertices.last_mut().ok_or_else(|| {
                        DxfError::invalid(format!(
                            "LWPOLYLINE 在定义首个顶点前遇到组码 {code}"
                        ))
                    })?;
                    match code {
                        40 => vertex.start_width = parsed,
                        41 => vertex.end_width = parsed,
                        _ => vertex.bulge = parsed,
                    }
                }
                _ => {}
            }
        }

        if pending_x.is_some() || pending_y.is_some() {
            return Err(DxfError::invalid(
                "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }
        if vertices.is_empty() {
            return Err(DxfError::invalid("LWPOLYLINE 未解析到任何顶点"));
        }

        for vertex in &mut vertices {
            vertex.position = Point::with_z(vertex.position.x(), vertex.position.y(), elevation);
        }
        Ok(Entity::PolylineLw(PolylineLw {
            vertices,
            is_closed,
            attributes: common.into_attributes(),
        }))
    }

    /// 经典 POLYLINE：头部之后是若干 VERTEX，以 SEQEND 结束。含 bulge 时转为轻量多段线。
    fn parse_polyline(&mut self) -> Result<Entity, DxfError> {
        let mut common = CommonGroups::default();
        let mut flags = 0;
        let mut elevation = 0.0;
        while let Some((code, value)) = self.next_group("POLYLINE")? {
            if common.absorb(code, &value, "POLYLINE")? {
                continue;
            }
            match code {
                70 => flags = parse_i32(&value, "POLYLINE 标志（组码 70）")?,
                30 => elevation = parse_f64(&value, "POLYLINE 标高（组码 30）")?,
                _ => {}
            }
        }

        if flags & (0x10 | 0x40) != 0 {
            self.skip_polyline_sequence()?;
            return Err(DxfError::unsupported("POLYLINE 网格与多面网格"));
        }

        let mut vertices: Vec<LwVertex> = Vec::new();
        loop {
            let (_, marker) = self
                .reader
                .next_pair()?
                .ok_or_else(|| DxfError::invalid("POLYLINE 缺少 SEQEND"))?;
            match marker.trim() {
                "VERTEX" => vertices.push(self.parse_vertex(elevation)?),
                "SEQEND" => {
                    self.skip_entity_body()?;
                    break;
                }
                other => {
                    return Err(DxfError::invalid(format!(
                        "POLYLINE 序列中出现意外实体 {other}"
                    )));
                }
            }
        }

        let is_closed = flags & 0x01 == 0x01;
        let attributes = common.into_attributes();
        if vertices.iter().any(|v| v.bulge != 0.0) {
            Ok(Entity::PolylineLw(PolylineLw {
                vertices,
                is_closed,
                attributes,
            }))
        } else {
            Ok(Entity::Polyline(Polyline {
                vertices: vertices.into_iter().map(|v| v.position).collect(),
                is_closed,
                attributes,
            }))
        }
    }

    fn parse_vertex(&mut self, elevation: f64) -> Result<LwVertex, DxfError> {
        let (mut x, mut y, mut z) = (None, None, None);
        let mut vertex = LwVertex::default();
        while let Some((code, value)) = self.next_group("VERTEX")? {
            match code {
                10 => assign_coord(&mut x, &value, "VERTEX X（组码 10）")?,
                20 => assign_coord(&mut y, &value, "VERTEX Y（组码 20）")?,
                30 => assign_coord(&mut z, &value, "VERTEX Z（组码 30）")?,
                40 => vertex.start_width = parse_f64(&value, "VERTEX 起始宽度")?,
                41 => vertex.end_width = parse_f64(&value, "VERTEX 终止宽度")?,
                42 => vertex.bulge = parse_f64(&value, "VERTEX bulge")?,
                _ => {}
            }
        }
        vertex.position = Point::with_z(
            require(x, "VERTEX 缺少 X（组码 10）")?,
            require(y, "VERTEX 缺少 Y（组码 20）")?,
            z.unwrap_or(elevation),
        );
        Ok(vertex)
    }

    fn skip_polyline_sequence(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "SEQEND" => {
                    self.skip_entity_body()?;
                    return Ok(());
                }
                Some(_) => continue,
                None => return Err(DxfError::invalid("POLYLINE 缺少 SEQEND")),
            }
        }
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => return Ok(None),
        };
        if code_line.trim().is_empty() && self.lines.clone().all(|l| l.trim().is_empty()) {
            return Ok(None);
        }

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只能回退一次");
        self.buffer = Some(pair);
    }
}

struct DxfWriter<'a> {
    out: String,
    layer_fallback: &'a str,
}

impl<'a> DxfWriter<'a> {
    fn new(layer_fallback: &'a str) -> Self {
        Self {
            out: String::new(),
            layer_fallback,
        }
    }

    fn group(&mut self, code: i32, value: impl Display) {
        // 写入 String 不会失败
        let _ = writeln!(self.out, "{code:>3}\n{value}");
    }

    fn point(&mut self, base: i32, point: Point) {
        self.group(base, point.x());
        self.group(base + 10, point.y());
        self.group(base + 20, point.z());
    }

    fn header(&mut self, kind: &str, element: &dyn DrawElement) {
        self.group(0, kind);
        let layer = element.layer().unwrap_or(self.layer_fallback).to_string();
        self.group(8, layer);
        if !element.is_visible() {
            self.group(60, 1);
        }
        if let Some(color) = element.color() {
            self.group(420, color.to_true_color());
        }
    }

    fn entity(&mut self, entity: &Entity) {
        match entity {
            Entity::Line(line) => {
                self.header("LINE", line);
                self.point(10, line.start);
                self.point(11, line.end);
            }
            Entity::Circle(circle) => {
                self.header("CIRCLE", circle);
                if circle.thickness != 0.0 {
                    self.group(39, circle.thickness);
                }
                self.point(10, circle.center);
                self.group(40, circle.radius);
            }
            Entity::Arc(arc) => {
                self.header("ARC", arc);
                if arc.thickness != 0.0 {
                    self.group(39, arc.thickness);
                }
                self.point(10, arc.center);
                self.group(40, arc.radius);
                self.group(50, arc.start_angle);
                self.group(51, arc.end_angle);
            }
            Entity::PolylineLw(polyline) => {
                self.header("LWPOLYLINE", polyline);
                self.group(90, polyline.vertices.len());
                self.group(70, i32::from(polyline.is_closed));
                let elevation = polyline.vertices.first().map_or(0.0, |v| v.position.z());
                if elevation != 0.0 {
                    self.group(38, elevation);
                }
                for vertex in &polyline.vertices {
                    self.group(10, vertex.position.x());
                    self.group(20, vertex.position.y());
                    if vertex.start_width != 0.0 {
                        self.group(40, vertex.start_width);
                    }
                    if vertex.end_width != 0.0 {
                        self.group(41, vertex.end_width);
                    }
                    if vertex.bulge != 0.0 {
                        self.group(42, vertex.bulge);
                    }
                }
            }
            Entity::Polyline(polyline) => {
                let is_3d = polyline.vertices.iter().any(|v| v.z() != 0.0);
                let mut flags = i32::from(polyline.is_closed);
                if is_3d {
                    flags |= 0x08;
                }
                self.header("POLYLINE", polyline);
                self.group(66, 1);
                self.group(70, flags);
                self.point(10, Point::ORIGIN);
                let layer = polyline.layer().unwrap_or(self.layer_fallback).to_string();
                for vertex in &polyline.vertices {
                    self.group(0, "VERTEX");
                    self.group(8, &layer);
                    self.point(10, *vertex);
                    self.group(70, if is_3d { 32 } else { 0 });
                }
                self.group(0, "SEQEND");
                self.group(8, &layer);
            }
        }
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn require(slot: Option<f64>, message: impl Into<String>) -> Result<f64, DxfError> {
    slot.ok_or_else(|| DxfError::invalid(message))
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!("0\nSECTION\n2\nENTITIES\n{body}0\nENDSEC\n0\nEOF\n")
    }

    #[test]
    fn parses_common_groups() {
        let source = wrap(
            "0\nLINE\n5\n2F\n8\nCut\n60\n1\n420\n16711680\n10\n1.5\n20\n2\n11\n3\n21\n4\n",
        );
        let document = DxfDocument::parse("a.dxf", &source).unwrap();
        let Entity::Line(line) = &document.entities[0] else {
            panic!("expected line");
        };
        assert_eq!(line.layer(), Some("Cut"));
        assert_eq!(line.code_name(), Some("2F"));
        assert!(!line.is_visible());
        assert_eq!(line.color(), Some(Color::new(255, 0, 0)));
        assert_eq!(line.start.x(), 1.5);
        assert_eq!(line.end.y(), 4.0);
    }

    #[test]
    fn unknown_entities_are_skipped() {
        let source = wrap("0\nTEXT\n8\n0\n1\nhello\n0\nCIRCLE\n10\n0\n20\n0\n40\n2\n");
        let document = DxfDocument::parse("b.dxf", &source).unwrap();
        assert_eq!(document.entities.len(), 1);
        assert_eq!(document.circles().len(), 1);
    }

    #[test]
    fn missing_radius_is_invalid() {
        let source = wrap("0\nCIRCLE\n10\n0\n20\n0\n");
        let err = DxfDocument::parse("c.dxf", &source).unwrap_err();
        assert!(matches!(err, IoError::InvalidDocument(message) if message.contains("半径")));
    }

    #[test]
    fn heavy_polyline_with_bulge_becomes_lightweight() {
        let source = wrap(
            "0\nPOLYLINE\n8\nP\n66\n1\n70\n1\n0\nVERTEX\n10\n0\n20\n0\n42\n1\n0\nVERTEX\n10\n10\n20\n0\n0\nSEQEND\n",
        );
        let document = DxfDocument::parse("d.dxf", &source).unwrap();
        let lw = document.lw_polylines();
        assert_eq!(lw.len(), 1);
        assert!(lw[0].is_closed);
        assert_eq!(lw[0].vertices[0].bulge, 1.0);
        assert_eq!(lw[0].layer(), Some("P"));
    }

    #[test]
    fn mesh_polyline_is_unsupported() {
        let source = wrap("0\nPOLYLINE\n70\n16\n0\nVERTEX\n10\n0\n20\n0\n0\nSEQEND\n");
        let err = DxfDocument::parse("e.dxf", &source).unwrap_err();
        assert!(matches!(err, IoError::UnsupportedFeature(_)));
    }

    #[test]
    fn writer_uses_layer_fallback() {
        let mut document = DxfDocument::new("out.dxf");
        document
            .entities
            .push(Entity::Line(Line::new(Point::ORIGIN, Point::new(1.0, 2.0))));
        let text = document.to_dxf_string("OUTLINE");
        assert!(text.contains("  8\nOUTLINE\n"));
        assert!(text.ends_with("  0\nEOF\n"));

        let reread = DxfDocument::parse("out.dxf", &text).unwrap();
        assert_eq!(reread.lines()[0].layer(), Some("OUTLINE"));
    }
}
