//! 统一图元模型：五类图元集合加一个派生范围。
//!
//! 范围不变量：`bounds` 始终覆盖所有可见图元，每次改变图元集合的操作都会重算。
//! `recompute_bounds` 对圆弧只取圆心与起止点（粗略规则），需要真实外形时使用
//! [`Drawing::exact_bounds`]。

use std::f64::consts::TAU;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::DrawingError;
use crate::geometry::{Bounds, Point, Rect};
use crate::kernel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 24 位真彩色（`0xRRGGBB`），与 DXF 组码 420 一致。
    #[inline]
    pub fn to_true_color(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    #[inline]
    pub fn from_true_color(value: u32) -> Self {
        Self {
            r: ((value >> 16) & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: (value & 0xFF) as u8,
        }
    }
}

/// 所有图元共享的能力集：命名、颜色、可见性、图层。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementAttributes {
    pub code_name: Option<String>,
    pub color: Option<Color>,
    pub visible: bool,
    pub layer: Option<String>,
}

impl Default for ElementAttributes {
    fn default() -> Self {
        Self {
            code_name: None,
            color: None,
            visible: true,
            layer: None,
        }
    }
}

impl ElementAttributes {
    pub fn on_layer(layer: impl Into<String>) -> Self {
        Self {
            layer: Some(layer.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Circle,
    Line,
    Arc,
    Polyline,
    PolylineLw,
}

impl EntityKind {
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Circle => "circle",
            EntityKind::Line => "line",
            EntityKind::Arc => "arc",
            EntityKind::Polyline => "polyline",
            EntityKind::PolylineLw => "lightweight polyline",
        }
    }
}

/// 指向图纸中某个集合内的图元。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub index: usize,
}

impl EntityRef {
    #[inline]
    pub fn new(kind: EntityKind, index: usize) -> Self {
        Self { kind, index }
    }
}

/// 图元的公共行为。几何变换只改坐标，属性保持不变。
pub trait DrawElement {
    fn kind(&self) -> EntityKind;

    fn attributes(&self) -> &ElementAttributes;

    fn attributes_mut(&mut self) -> &mut ElementAttributes;

    #[inline]
    fn is_visible(&self) -> bool {
        self.attributes().visible
    }

    #[inline]
    fn set_visible(&mut self, visible: bool) {
        self.attributes_mut().visible = visible;
    }

    #[inline]
    fn layer(&self) -> Option<&str> {
        self.attributes().layer.as_deref()
    }

    #[inline]
    fn color(&self) -> Option<Color> {
        self.attributes().color
    }

    #[inline]
    fn code_name(&self) -> Option<&str> {
        self.attributes().code_name.as_deref()
    }

    /// 按实时范围规则把自身坐标并入 `bounds`。
    fn include_in(&self, bounds: &mut Bounds);

    /// 按真实几何外形并入 `bounds`，默认与 [`DrawElement::include_in`] 相同。
    fn include_exact_in(&self, bounds: &mut Bounds) {
        self.include_in(bounds);
    }

    fn translate(&mut self, dx: f64, dy: f64);

    /// 绕 `center` 旋转，正角顺时针。
    fn rotate(&mut self, center: Point, angle_deg: f64);

    fn validate(&self) -> Result<(), DrawingError>;
}

fn ensure_finite(kind: EntityKind, what: &str, point: Point) -> Result<(), DrawingError> {
    if point.is_finite() {
        Ok(())
    } else {
        Err(DrawingError::InvalidEntity {
            kind: kind.name(),
            reason: format!("{what} has non-finite coordinates"),
        })
    }
}

fn ensure_radius(kind: EntityKind, radius: f64) -> Result<(), DrawingError> {
    if radius.is_finite() && radius >= 0.0 {
        Ok(())
    } else {
        Err(DrawingError::InvalidEntity {
            kind: kind.name(),
            reason: format!("radius {radius} must be finite and non-negative"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
    #[serde(default)]
    pub thickness: f64,
    #[serde(default)]
    pub attributes: ElementAttributes,
}

impl Circle {
    pub fn new(center: Point, radius: f64) -> Self {
        Self {
            center,
            radius,
            thickness: 0.0,
            attributes: ElementAttributes::default(),
        }
    }

    /// 离散为闭合多段线，首尾不重复。
    pub fn to_polyline(&self, section_length: f64) -> Polyline {
        let steps = kernel::arc_step_count_with(TAU, self.radius, section_length);
        let mut vertices = kernel::arc_points(self.center, self.radius, 0.0, TAU, steps);
        vertices.pop();
        Polyline {
            vertices,
            is_closed: true,
            attributes: self.attributes.clone(),
        }
    }
}

impl DrawElement for Circle {
    fn kind(&self) -> EntityKind {
        EntityKind::Circle
    }

    fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut ElementAttributes {
        &mut self.attributes
    }

    fn include_in(&self, bounds: &mut Bounds) {
        let c = self.center;
        let r = self.radius;
        bounds.include_point(Point::with_z(c.x() - r, c.y() - r, c.z()));
        bounds.include_point(Point::with_z(c.x() + r, c.y() + r, c.z()));
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.center = self.center.translate(dx, dy);
    }

    fn rotate(&mut self, center: Point, angle_deg: f64) {
        self.center = kernel::rotate(self.center, center, angle_deg, true);
    }

    fn validate(&self) -> Result<(), DrawingError> {
        ensure_finite(self.kind(), "center", self.center)?;
        ensure_radius(self.kind(), self.radius)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point,
    pub end: Point,
    #[serde(default)]
    pub attributes: ElementAttributes,
}

impl Line {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            attributes: ElementAttributes::default(),
        }
    }
}

impl DrawElement for Line {
    fn kind(&self) -> EntityKind {
        EntityKind::Line
    }

    fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut ElementAttributes {
        &mut self.attributes
    }

    fn include_in(&self, bounds: &mut Bounds) {
        bounds.include_point(self.start);
        bounds.include_point(self.end);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.start = self.start.translate(dx, dy);
        self.end = self.end.translate(dx, dy);
    }

    fn rotate(&mut self, center: Point, angle_deg: f64) {
        self.start = kernel::rotate(self.start, center, angle_deg, true);
        self.end = kernel::rotate(self.end, center, angle_deg, true);
    }

    fn validate(&self) -> Result<(), DrawingError> {
        ensure_finite(self.kind(), "start point", self.start)?;
        ensure_finite(self.kind(), "end point", self.end)
    }
}

/// 圆弧，角度为度，自 +X 逆时针由 `start_angle` 扫到 `end_angle`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point,
    pub radius: f64,
    #[serde(default)]
    pub thickness: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    #[serde(default)]
    pub attributes: ElementAttributes,
}

impl Arc {
    pub fn new(center: Point, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center,
            radius,
            thickness: 0.0,
            start_angle,
            end_angle,
            attributes: ElementAttributes::default(),
        }
    }

    fn point_at(&self, angle_deg: f64) -> Point {
        let (sin, cos) = kernel::degrees_to_radians(angle_deg).sin_cos();
        Point::with_z(
            self.center.x() + cos * self.radius,
            self.center.y() + sin * self.radius,
            self.center.z(),
        )
    }

    #[inline]
    pub fn start_point(&self) -> Point {
        self.point_at(self.start_angle)
    }

    #[inline]
    pub fn end_point(&self) -> Point {
        self.point_at(self.end_angle)
    }

    /// 逆时针扫角，`(0, 360]`；起止角重合视为整圆。
    pub fn sweep_degrees(&self) -> f64 {
        let sweep = kernel::normalize_degrees(self.end_angle - self.start_angle);
        if sweep == 0.0 { 360.0 } else { sweep }
    }

    pub fn to_polyline(&self, section_length: f64) -> Polyline {
        let sweep = kernel::degrees_to_radians(self.sweep_degrees());
        let steps = kernel::arc_step_count_with(sweep, self.radius, section_length);
        Polyline {
            vertices: kernel::arc_points(
                self.center,
                self.radius,
                kernel::degrees_to_radians(self.start_angle),
                sweep,
                steps,
            ),
            is_closed: false,
            attributes: self.attributes.clone(),
        }
    }
}

impl DrawElement for Arc {
    fn kind(&self) -> EntityKind {
        EntityKind::Arc
    }

    fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut ElementAttributes {
        &mut self.attributes
    }

    /// 只取圆心与两个端点，鼓出弦外的部分不计入。
    fn include_in(&self, bounds: &mut Bounds) {
        bounds.include_point(self.start_point());
        bounds.include_point(self.end_point());
        bounds.include_point(self.center);
    }

    fn include_exact_in(&self, bounds: &mut Bounds) {
        let rect = if self.sweep_degrees() >= 360.0 {
            let r = self.radius.abs();
            Rect::new(DVec2::splat(-r), DVec2::splat(r))
        } else {
            kernel::arc_bounds(
                kernel::degrees_to_radians(self.start_angle),
                kernel::degrees_to_radians(self.end_angle),
                self.radius,
                0.0,
            )
        };
        bounds.include_rect(&rect.offset(self.center.xy()), self.center.z());
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.center = self.center.translate(dx, dy);
    }

    fn rotate(&mut self, center: Point, angle_deg: f64) {
        self.center = kernel::rotate(self.center, center, angle_deg, true);
        self.start_angle = kernel::normalize_degrees(self.start_angle - angle_deg);
        self.end_angle = kernel::normalize_degrees(self.end_angle - angle_deg);
    }

    fn validate(&self) -> Result<(), DrawingError> {
        ensure_finite(self.kind(), "center", self.center)?;
        ensure_radius(self.kind(), self.radius)?;
        if !self.start_angle.is_finite() || !self.end_angle.is_finite() {
            return Err(DrawingError::InvalidEntity {
                kind: self.kind().name(),
                reason: "angles must be finite".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<Point>,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub attributes: ElementAttributes,
}

impl Polyline {
    pub fn new(vertices: Vec<Point>, is_closed: bool) -> Self {
        Self {
            vertices,
            is_closed,
            attributes: ElementAttributes::default(),
        }
    }

    /// 依次给出各段端点；闭合时包含末点回到首点的一段。
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let closing = if self.is_closed && self.vertices.len() > 2 {
            self.vertices.last().copied().zip(self.vertices.first().copied())
        } else {
            None
        };
        self.vertices
            .windows(2)
            .map(|pair| (pair[0], pair[1]))
            .chain(closing)
    }
}

impl DrawElement for Polyline {
    fn kind(&self) -> EntityKind {
        EntityKind::Polyline
    }

    fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut ElementAttributes {
        &mut self.attributes
    }

    fn include_in(&self, bounds: &mut Bounds) {
        for vertex in &self.vertices {
            bounds.include_point(*vertex);
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        for vertex in &mut self.vertices {
            *vertex = vertex.translate(dx, dy);
        }
    }

    fn rotate(&mut self, center: Point, angle_deg: f64) {
        for vertex in &mut self.vertices {
            *vertex = kernel::rotate(*vertex, center, angle_deg, true);
        }
    }

    fn validate(&self) -> Result<(), DrawingError> {
        for vertex in &self.vertices {
            ensure_finite(self.kind(), "vertex", *vertex)?;
        }
        Ok(())
    }
}

/// 轻量多段线顶点，`bulge` 描述到下一个顶点的圆弧。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LwVertex {
    pub position: Point,
    #[serde(default)]
    pub start_width: f64,
    #[serde(default)]
    pub end_width: f64,
    #[serde(default)]
    pub bulge: f64,
}

impl LwVertex {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_bulge(x: f64, y: f64, bulge: f64) -> Self {
        Self {
            bulge,
            ..Self::new(x, y)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineLw {
    pub vertices: Vec<LwVertex>,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub attributes: ElementAttributes,
}

impl PolylineLw {
    pub fn new(vertices: Vec<LwVertex>, is_closed: bool) -> Self {
        Self {
            vertices,
            is_closed,
            attributes: ElementAttributes::default(),
        }
    }

    /// 各段起止顶点，bulge 取起始顶点的值。
    pub fn segments(&self) -> impl Iterator<Item = (LwVertex, LwVertex)> + '_ {
        let closing = if self.is_closed && self.vertices.len() > 1 {
            self.vertices.last().copied().zip(self.vertices.first().copied())
        } else {
            None
        };
        self.vertices
            .windows(2)
            .map(|pair| (pair[0], pair[1]))
            .chain(closing)
    }

    /// 展开 bulge 圆弧，得到等价的普通多段线。
    pub fn to_polyline(&self, section_length: f64) -> Polyline {
        let mut vertices: Vec<Point> = Vec::with_capacity(self.vertices.len());
        if let Some(first) = self.vertices.first() {
            vertices.push(first.position);
        }
        for (from, to) in self.segments() {
            match kernel::bulge_arc(from.position, to.position, from.bulge) {
                Some(arc) => {
                    let steps = kernel::arc_step_count_with(arc.sweep, arc.radius, section_length);
                    let points =
                        kernel::arc_points(arc.center, arc.radius, arc.start_angle, arc.sweep, steps);
                    vertices.extend(points.into_iter().skip(1));
                }
                None => vertices.push(to.position),
            }
        }
        if self.is_closed && vertices.len() > 1 {
            vertices.pop();
        }
        Polyline {
            vertices,
            is_closed: self.is_closed,
            attributes: self.attributes.clone(),
        }
    }
}

impl DrawElement for PolylineLw {
    fn kind(&self) -> EntityKind {
        EntityKind::PolylineLw
    }

    fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut ElementAttributes {
        &mut self.attributes
    }

    fn include_in(&self, bounds: &mut Bounds) {
        for vertex in &self.vertices {
            bounds.include_point(vertex.position);
        }
    }

    fn include_exact_in(&self, bounds: &mut Bounds) {
        self.include_in(bounds);
        for (from, to) in self.segments() {
            if let Some(arc) = kernel::bulge_arc(from.position, to.position, from.bulge) {
                bounds.include_rect(&arc.bounds(), from.position.z());
            }
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        for vertex in &mut self.vertices {
            vertex.position = vertex.position.translate(dx, dy);
        }
    }

    fn rotate(&mut self, center: Point, angle_deg: f64) {
        for vertex in &mut self.vertices {
            vertex.position = kernel::rotate(vertex.position, center, angle_deg, true);
        }
    }

    fn validate(&self) -> Result<(), DrawingError> {
        for vertex in &self.vertices {
            ensure_finite(self.kind(), "vertex", vertex.position)?;
            let scalars = [vertex.start_width, vertex.end_width, vertex.bulge];
            if scalars.iter().any(|value| !value.is_finite()) {
                return Err(DrawingError::InvalidEntity {
                    kind: self.kind().name(),
                    reason: "vertex width or bulge is not finite".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// 与格式无关的图元，适配器之间交换的就是它。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Circle(Circle),
    Line(Line),
    Arc(Arc),
    Polyline(Polyline),
    PolylineLw(PolylineLw),
}

impl Entity {
    pub fn as_element(&self) -> &dyn DrawElement {
        match self {
            Entity::Circle(circle) => circle,
            Entity::Line(line) => line,
            Entity::Arc(arc) => arc,
            Entity::Polyline(polyline) => polyline,
            Entity::PolylineLw(polyline) => polyline,
        }
    }

    pub fn as_element_mut(&mut self) -> &mut dyn DrawElement {
        match self {
            Entity::Circle(circle) => circle,
            Entity::Line(line) => line,
            Entity::Arc(arc) => arc,
            Entity::Polyline(polyline) => polyline,
            Entity::PolylineLw(polyline) => polyline,
        }
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.as_element().kind()
    }

    #[inline]
    pub fn layer(&self) -> Option<&str> {
        self.as_element().layer()
    }
}

impl From<Circle> for Entity {
    fn from(value: Circle) -> Self {
        Entity::Circle(value)
    }
}

impl From<Line> for Entity {
    fn from(value: Line) -> Self {
        Entity::Line(value)
    }
}

impl From<Arc> for Entity {
    fn from(value: Arc) -> Self {
        Entity::Arc(value)
    }
}

impl From<Polyline> for Entity {
    fn from(value: Polyline) -> Self {
        Entity::Polyline(value)
    }
}

impl From<PolylineLw> for Entity {
    fn from(value: PolylineLw) -> Self {
        Entity::PolylineLw(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitAxis {
    /// 在竖直线 `x = position` 处分割。
    X,
    /// 在水平线 `y = position` 处分割。
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitPage {
    /// 保留 `≤ position` 的一侧。
    First,
    /// 保留 `≥ position` 的一侧，并平移到分割线为零点。
    Second,
}

impl SplitPage {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(SplitPage::First),
            1 => Some(SplitPage::Second),
            _ => None,
        }
    }
}

/// 单一所有者的图纸聚合，所有修改都同步完成并在返回前维护范围不变量。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    filename: String,
    bounds: Bounds,
    circles: Vec<Circle>,
    lines: Vec<Line>,
    arcs: Vec<Arc>,
    polylines: Vec<Polyline>,
    polylines_lw: Vec<PolylineLw>,
}

impl Drawing {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// 由外部文档给出的图元一次性构建图纸。
    ///
    /// 单遍完成校验、分类与范围累计；任意图元校验失败时整体返回错误，不产生半成品。
    pub fn from_entities<I>(filename: impl Into<String>, entities: I) -> Result<Self, DrawingError>
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut drawing = Self::new(filename);
        let mut bounds = Bounds::empty();
        for entity in entities {
            let element = entity.as_element();
            element.validate()?;
            if element.is_visible() {
                element.include_in(&mut bounds);
            }
            drawing.push_entity(entity);
        }
        drawing.bounds = bounds;
        debug!(
            filename = %drawing.filename,
            entities = drawing.entity_count(),
            empty = bounds.is_empty(),
            "图纸导入完成"
        );
        Ok(drawing)
    }

    fn push_entity(&mut self, entity: Entity) -> EntityRef {
        let kind = entity.kind();
        let index = match entity {
            Entity::Circle(circle) => {
                self.circles.push(circle);
                self.circles.len()
            }
            Entity::Line(line) => {
                self.lines.push(line);
                self.lines.len()
            }
            Entity::Arc(arc) => {
                self.arcs.push(arc);
                self.arcs.len()
            }
            Entity::Polyline(polyline) => {
                self.polylines.push(polyline);
                self.polylines.len()
            }
            Entity::PolylineLw(polyline) => {
                self.polylines_lw.push(polyline);
                self.polylines_lw.len()
            }
        };
        EntityRef::new(kind, index - 1)
    }

    #[inline]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[inline]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    #[inline]
    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }

    #[inline]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    #[inline]
    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    #[inline]
    pub fn polylines(&self) -> &[Polyline] {
        &self.polylines
    }

    #[inline]
    pub fn polylines_lw(&self) -> &[PolylineLw] {
        &self.polylines_lw
    }

    pub fn entity_count(&self) -> usize {
        self.circles.len()
            + self.lines.len()
            + self.arcs.len()
            + self.polylines.len()
            + self.polylines_lw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }

    /// 按集合顺序（圆、直线、圆弧、多段线、轻量多段线）遍历全部图元。
    pub fn elements(&self) -> impl Iterator<Item = &dyn DrawElement> {
        let circles = self.circles.iter().map(|e| e as &dyn DrawElement);
        let lines = self.lines.iter().map(|e| e as &dyn DrawElement);
        let arcs = self.arcs.iter().map(|e| e as &dyn DrawElement);
        let polylines = self.polylines.iter().map(|e| e as &dyn DrawElement);
        let polylines_lw = self.polylines_lw.iter().map(|e| e as &dyn DrawElement);
        circles
            .chain(lines)
            .chain(arcs)
            .chain(polylines)
            .chain(polylines_lw)
    }

    fn for_each_element_mut(&mut self, mut f: impl FnMut(&mut dyn DrawElement)) {
        self.circles.iter_mut().for_each(|e| f(e as &mut dyn DrawElement));
        self.lines.iter_mut().for_each(|e| f(e as &mut dyn DrawElement));
        self.arcs.iter_mut().for_each(|e| f(e as &mut dyn DrawElement));
        self.polylines.iter_mut().for_each(|e| f(e as &mut dyn DrawElement));
        self.polylines_lw.iter_mut().for_each(|e| f(e as &mut dyn DrawElement));
    }

    fn element_mut(&mut self, target: EntityRef) -> Option<&mut dyn DrawElement> {
        let index = target.index;
        match target.kind {
            EntityKind::Circle => self.circles.get_mut(index).map(|e| e as &mut dyn DrawElement),
            EntityKind::Line => self.lines.get_mut(index).map(|e| e as &mut dyn DrawElement),
            EntityKind::Arc => self.arcs.get_mut(index).map(|e| e as &mut dyn DrawElement),
            EntityKind::Polyline => self.polylines.get_mut(index).map(|e| e as &mut dyn DrawElement),
            EntityKind::PolylineLw => self
                .polylines_lw
                .get_mut(index)
                .map(|e| e as &mut dyn DrawElement),
        }
    }

    fn add(&mut self, mut entity: Entity) -> EntityRef {
        entity.as_element_mut().set_visible(true);
        let target = self.push_entity(entity);
        self.recompute_bounds();
        target
    }

    pub fn add_circle(&mut self, circle: Circle) -> EntityRef {
        self.add(Entity::Circle(circle))
    }

    pub fn add_line(&mut self, line: Line) -> EntityRef {
        self.add(Entity::Line(line))
    }

    pub fn add_arc(&mut self, arc: Arc) -> EntityRef {
        self.add(Entity::Arc(arc))
    }

    pub fn add_polyline(&mut self, polyline: Polyline) -> EntityRef {
        self.add(Entity::Polyline(polyline))
    }

    pub fn add_polyline_lw(&mut self, polyline: PolylineLw) -> EntityRef {
        self.add(Entity::PolylineLw(polyline))
    }

    /// 批量追加，先整体校验再写入，最后只重算一次范围。
    pub fn extend<I>(&mut self, entities: I) -> Result<(), DrawingError>
    where
        I: IntoIterator<Item = Entity>,
    {
        let entities: Vec<Entity> = entities.into_iter().collect();
        for entity in &entities {
            entity.as_element().validate()?;
        }
        for entity in entities {
            self.push_entity(entity);
        }
        self.recompute_bounds();
        Ok(())
    }

    pub fn recompute_bounds(&mut self) {
        let mut bounds = Bounds::empty();
        for element in self.elements().filter(|e| e.is_visible()) {
            element.include_in(&mut bounds);
        }
        self.bounds = bounds;
    }

    /// 真实外形范围：圆弧与 bulge 段按扫过的象限计算。
    pub fn exact_bounds(&self) -> Bounds {
        let mut bounds = Bounds::empty();
        for element in self.elements().filter(|e| e.is_visible()) {
            element.include_exact_in(&mut bounds);
        }
        bounds
    }

    /// 软删除或恢复一个图元。
    pub fn set_visibility(&mut self, target: EntityRef, visible: bool) -> Result<(), DrawingError> {
        let element = self
            .element_mut(target)
            .ok_or(DrawingError::EntityNotFound {
                kind: target.kind.name(),
                index: target.index,
            })?;
        element.set_visible(visible);
        self.recompute_bounds();
        Ok(())
    }

    /// 将所有可见图元平移到范围最小点为原点；已在原点或为空时不做任何事。
    ///
    /// 返回是否发生了平移。Z 范围保持不变。
    pub fn trim(&mut self) -> bool {
        if self.bounds.is_empty() {
            return false;
        }
        let min = self.bounds.min();
        let max = self.bounds.max();
        if min.x() == 0.0 && min.y() == 0.0 {
            return false;
        }

        let (dx, dy) = (-min.x(), -min.y());
        self.for_each_element_mut(|element| {
            if element.is_visible() {
                element.translate(dx, dy);
            }
        });
        self.bounds = Bounds::new(
            Point::with_z(0.0, 0.0, min.z()),
            Point::with_z(max.x() - min.x(), max.y() - min.y(), max.z()),
        );
        debug!(dx, dy, "图纸已归零");
        true
    }

    /// 绕 `center` 旋转全部图元，正角顺时针；bulge 不受旋转影响。
    pub fn rotate(&mut self, center: Point, angle_deg: f64) {
        self.for_each_element_mut(|element| element.rotate(center, angle_deg));
        self.recompute_bounds();
        debug!(angle_deg, "图纸已旋转");
    }

    /// 可见图元的导出序列；少于两个顶点的多段线无法在交换格式中表示，直接跳过。
    pub fn export_entities(&self) -> Vec<Entity> {
        let mut entities = Vec::with_capacity(self.entity_count());
        entities.extend(
            self.circles
                .iter()
                .filter(|c| c.is_visible())
                .cloned()
                .map(Entity::Circle),
        );
        entities.extend(
            self.lines
                .iter()
                .filter(|l| l.is_visible())
                .cloned()
                .map(Entity::Line),
        );
        entities.extend(
            self.arcs
                .iter()
                .filter(|a| a.is_visible())
                .cloned()
                .map(Entity::Arc),
        );
        entities.extend(
            self.polylines
                .iter()
                .filter(|p| p.is_visible() && p.vertices.len() >= 2)
                .cloned()
                .map(Entity::Polyline),
        );
        entities.extend(
            self.polylines_lw
                .iter()
                .filter(|p| p.is_visible() && p.vertices.len() >= 2)
                .cloned()
                .map(Entity::PolylineLw),
        );
        entities
    }

    /// 将圆、圆弧和轻量多段线离散为普通多段线，返回转换数量。
    pub fn flatten_curves(&mut self, section_length: f64) -> usize {
        let mut flattened: Vec<Polyline> = Vec::new();
        flattened.extend(self.circles.drain(..).map(|c| c.to_polyline(section_length)));
        flattened.extend(self.arcs.drain(..).map(|a| a.to_polyline(section_length)));
        flattened.extend(
            self.polylines_lw
                .drain(..)
                .map(|p| p.to_polyline(section_length)),
        );
        let count = flattened.len();
        self.polylines.extend(flattened);
        self.recompute_bounds();
        debug!(count, section_length, "曲线已离散为多段线");
        count
    }

    /// 把近似圆形的闭合可见多段线替换为圆，返回替换数量。
    pub fn promote_circular_polylines(&mut self) -> usize {
        let mut kept = Vec::with_capacity(self.polylines.len());
        let mut promoted = 0;
        for polyline in self.polylines.drain(..) {
            let candidate = polyline.is_visible()
                && polyline.is_closed
                && kernel::is_polygon_circle(&polyline.vertices);
            match candidate
                .then(|| kernel::circular_polygon_center_and_radius(&polyline.vertices))
            {
                Some(Ok((center, radius))) => {
                    let z = polyline.vertices.first().map_or(0.0, |p| p.z());
                    self.circles.push(Circle {
                        center: Point::with_z(center.x(), center.y(), z),
                        radius,
                        thickness: 0.0,
                        attributes: polyline.attributes,
                    });
                    promoted += 1;
                }
                _ => kept.push(polyline),
            }
        }
        self.polylines = kept;
        if promoted > 0 {
            self.recompute_bounds();
            debug!(promoted, "多段线已识别为圆");
        }
        promoted
    }

    /// 使用默认段长分割，见 [`Drawing::split_with`]。
    pub fn split(&self, position: f64, axis: SplitAxis, page: SplitPage) -> Result<Drawing, DrawingError> {
        self.split_with(position, axis, page, kernel::ARC_SECTION_LENGTH)
    }

    /// 沿分割线裁出一页，返回新图纸，原图纸保持不变。
    ///
    /// 直线与多段线在分割线处求交截断；圆、圆弧与轻量多段线整体落在保留侧时原样保留，
    /// 完全在另一侧时丢弃，跨线时先离散再截断。第二页平移到分割线为零点。
    pub fn split_with(
        &self,
        position: f64,
        axis: SplitAxis,
        page: SplitPage,
        section_length: f64,
    ) -> Result<Drawing, DrawingError> {
        if !position.is_finite() {
            return Err(DrawingError::InvalidSplit(format!(
                "split position {position} is not finite"
            )));
        }

        let clip = Clipper {
            position,
            axis,
            page,
        };
        let mut result = Drawing::new(self.filename.clone());

        for line in &self.lines {
            if let Some((start, end)) = clip.segment(line.start, line.end)? {
                result.lines.push(Line {
                    start,
                    end,
                    attributes: line.attributes.clone(),
                });
            }
        }

        for polyline in &self.polylines {
            result.polylines.extend(clip.polyline(polyline)?);
        }

        for circle in &self.circles {
            let mut extent = Bounds::empty();
            circle.include_exact_in(&mut extent);
            match clip.classify(&extent) {
                Side::Kept => result.circles.push(circle.clone()),
                Side::Dropped => {}
                Side::Crossing => result
                    .polylines
                    .extend(clip.polyline(&circle.to_polyline(section_length))?),
            }
        }

        for arc in &self.arcs {
            let mut extent = Bounds::empty();
            arc.include_exact_in(&mut extent);
            match clip.classify(&extent) {
                Side::Kept => result.arcs.push(arc.clone()),
                Side::Dropped => {}
                Side::Crossing => result
                    .polylines
                    .extend(clip.polyline(&arc.to_polyline(section_length))?),
            }
        }

        for polyline in &self.polylines_lw {
            let mut extent = Bounds::empty();
            polyline.include_exact_in(&mut extent);
            match clip.classify(&extent) {
                Side::Kept => result.polylines_lw.push(polyline.clone()),
                Side::Dropped => {}
                Side::Crossing => result
                    .polylines
                    .extend(clip.polyline(&polyline.to_polyline(section_length))?),
            }
        }

        if page == SplitPage::Second {
            let (dx, dy) = match axis {
                SplitAxis::X => (-position, 0.0),
                SplitAxis::Y => (0.0, -position),
            };
            result.for_each_element_mut(|element| element.translate(dx, dy));
        }

        result.recompute_bounds();
        if result.is_empty() {
            warn!(position, ?axis, ?page, "分割结果为空");
        } else {
            debug!(
                position,
                ?axis,
                ?page,
                entities = result.entity_count(),
                "图纸分割完成"
            );
        }
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Kept,
    Dropped,
    Crossing,
}

struct Clipper {
    position: f64,
    axis: SplitAxis,
    page: SplitPage,
}

impl Clipper {
    #[inline]
    fn coordinate(&self, point: Point) -> f64 {
        match self.axis {
            SplitAxis::X => point.x(),
            SplitAxis::Y => point.y(),
        }
    }

    #[inline]
    fn keeps_value(&self, value: f64) -> bool {
        match self.page {
            SplitPage::First => value <= self.position,
            SplitPage::Second => value >= self.position,
        }
    }

    #[inline]
    fn keeps(&self, point: Point) -> bool {
        self.keeps_value(self.coordinate(point))
    }

    fn classify(&self, extent: &Bounds) -> Side {
        if extent.is_empty() {
            return Side::Dropped;
        }
        let low = self.coordinate(extent.min());
        let high = self.coordinate(extent.max());
        match (self.keeps_value(low), self.keeps_value(high)) {
            (true, true) => Side::Kept,
            (false, false) => Side::Dropped,
            _ => Side::Crossing,
        }
    }

    /// `a`、`b` 分处分割线两侧时求交点，Z 按线性插值。
    fn crossing(&self, a: Point, b: Point) -> Result<Point, DrawingError> {
        let (line_start, line_end) = match self.axis {
            SplitAxis::X => (Point::new(self.position, 0.0), Point::new(self.position, 1.0)),
            SplitAxis::Y => (Point::new(0.0, self.position), Point::new(1.0, self.position)),
        };
        let hit = kernel::line_line_intersection(a, b, line_start, line_end)?;
        let span = self.coordinate(b) - self.coordinate(a);
        let t = (self.position - self.coordinate(a)) / span;
        let (x, y) = match self.axis {
            SplitAxis::X => (self.position, hit.y()),
            SplitAxis::Y => (hit.x(), self.position),
        };
        Ok(Point::with_z(x, y, a.z() + (b.z() - a.z()) * t))
    }

    fn segment(&self, a: Point, b: Point) -> Result<Option<(Point, Point)>, DrawingError> {
        Ok(match (self.keeps(a), self.keeps(b)) {
            (true, true) => Some((a, b)),
            (false, false) => None,
            (true, false) => Some((a, self.crossing(a, b)?)),
            (false, true) => Some((self.crossing(a, b)?, b)),
        })
    }

    /// 截断多段线；完全保留时原样返回，否则拆成若干开放多段线。
    fn polyline(&self, polyline: &Polyline) -> Result<Vec<Polyline>, DrawingError> {
        if polyline.vertices.iter().all(|p| self.keeps(*p)) {
            return Ok(vec![polyline.clone()]);
        }

        let mut runs: Vec<Vec<Point>> = Vec::new();
        let mut current: Vec<Point> = Vec::new();
        for (a, b) in polyline.segments() {
            match (self.keeps(a), self.keeps(b)) {
                (true, true) => {
                    if current.is_empty() {
                        current.push(a);
                    }
                    current.push(b);
                }
                (true, false) => {
                    if current.is_empty() {
                        current.push(a);
                    }
                    current.push(self.crossing(a, b)?);
                    runs.push(std::mem::take(&mut current));
                }
                (false, true) => {
                    let entry = if self.coordinate(b) == self.position {
                        b
                    } else {
                        self.crossing(a, b)?
                    };
                    current.push(entry);
                    if entry != b {
                        current.push(b);
                    }
                }
                (false, false) => {}
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }

        // 闭合多段线从保留侧中间被切开时，首尾两段在原首点处相连
        if polyline.is_closed && runs.len() > 1 {
            let joins = match (runs.first(), runs.last()) {
                (Some(first), Some(last)) => first.first() == last.last(),
                _ => false,
            };
            if joins {
                let head = runs.remove(0);
                if let Some(tail) = runs.last_mut() {
                    tail.extend(head.into_iter().skip(1));
                }
            }
        }

        Ok(runs
            .into_iter()
            .filter(|run| run.len() >= 2)
            .map(|vertices| Polyline {
                vertices,
                is_closed: false,
                attributes: polyline.attributes.clone(),
            })
            .collect())
    }
}
