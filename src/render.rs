//! Volumetric bar rendering
//!
//! A 3D surface drives rendering: it calls `draw_begin` once, `draw` once per
//! occupied cell in no particular order, then `draw_end`. Every call gets the
//! same `RenderContext`, which carries the frozen model and the per-frame
//! state (pane height, frame flag, notable level) the enrichments need.
//! Geometry goes to a `RenderSink`; `SceneRecorder` keeps it for export.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SettingsError;
use crate::models::{Point3, Rgba, Triple};
use crate::postprocess::ModelData;

/// Top faces near the notable level are drawn in this color
pub const HIGHLIGHT_COLOR: Rgba = Rgba::opaque(0.7, 0.0, 0.0);

/// Bar edges and pane outline
pub const EDGE_COLOR: Rgba = Rgba::BLACK;

/// Reference pane fill, alpha set per enrichment
const PANE_RGB: (f64, f64, f64) = (0.5, 0.5, 1.0);

const BAR_PANE_ALPHA: f64 = 0.7;
const WATER_PANE_ALPHA: f64 = 1.0;

/// Share of the scene height range either side of the notable level that
/// counts as "at" the level
const NOTABLE_BAND: f64 = 0.01;

/// How the model is drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotStyle {
    /// Solid bars per cell
    #[default]
    Bar,
    /// Filled mesh with gridlines
    Grid,
    /// Filled mesh
    Surface,
    /// Points only, normals shown
    Dots,
}

impl PlotStyle {
    pub const ALL: [PlotStyle; 4] = [PlotStyle::Bar, PlotStyle::Grid, PlotStyle::Surface, PlotStyle::Dots];

    /// Enrichment used to decorate the surface in this style
    pub fn enrichment(&self) -> Box<dyn Enrichment> {
        match self {
            PlotStyle::Bar => Box::new(BarEnrichment),
            PlotStyle::Grid | PlotStyle::Surface | PlotStyle::Dots => Box::new(WaterEnrichment),
        }
    }

    pub fn shows_normals(&self) -> bool {
        matches!(self, PlotStyle::Dots)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlotStyle::Bar => "bar",
            PlotStyle::Grid => "grid",
            PlotStyle::Surface => "surface",
            PlotStyle::Dots => "dots",
        }
    }
}

impl fmt::Display for PlotStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PlotStyle {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bar" | "bars" => Ok(PlotStyle::Bar),
            "grid" => Ok(PlotStyle::Grid),
            "surface" => Ok(PlotStyle::Surface),
            "dots" | "points" => Ok(PlotStyle::Dots),
            _ => Err(SettingsError::UnknownStyle(s.to_string())),
        }
    }
}

/// A vertex with its color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColoredVertex {
    pub position: Point3,
    pub color: Rgba,
}

impl ColoredVertex {
    pub fn new(x: f64, y: f64, z: f64, color: Rgba) -> Self {
        Self {
            position: Point3::new(x, y, z),
            color,
        }
    }
}

/// Receives primitive geometry
pub trait RenderSink {
    fn quad(&mut self, vertices: [ColoredVertex; 4]);
    fn line(&mut self, from: Point3, to: Point3, color: Rgba);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub from: Point3,
    pub to: Point3,
    pub color: Rgba,
}

/// Sink that keeps every primitive in emission order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneRecorder {
    pub quads: Vec<[ColoredVertex; 4]>,
    pub lines: Vec<Line>,
}

impl SceneRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty() && self.lines.is_empty()
    }
}

impl RenderSink for SceneRecorder {
    fn quad(&mut self, vertices: [ColoredVertex; 4]) {
        self.quads.push(vertices);
    }

    fn line(&mut self, from: Point3, to: Point3, color: Rgba) {
        self.lines.push(Line { from, to, color });
    }
}

/// Axis-aligned bounding box of the plotted data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hull {
    pub min: Point3,
    pub max: Point3,
}

impl Hull {
    pub fn of(model: &ModelData) -> Self {
        Self {
            min: Point3::new(model.domain.min_x, model.domain.min_y, model.min_z()),
            max: Point3::new(model.domain.max_x, model.domain.max_y, model.max_z()),
        }
    }

    pub fn z_range(&self) -> f64 {
        self.max.z - self.min.z
    }
}

/// Everything an enrichment may read while drawing one frame
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub model: &'a ModelData,
    pub hull: Hull,

    /// Pane height above the hull floor, 0 hides the pane
    pub zpane: f64,

    /// Outline all-samples bars while intervals are active
    pub frame: bool,

    /// Absolute height whose crossing bars are highlighted
    pub notable_level: f64,

    /// Treat an interval height of exactly 0 as missing
    pub zero_interval_is_absent: bool,
}

impl<'a> RenderContext<'a> {
    pub fn new(model: &'a ModelData) -> Self {
        let hull = Hull::of(model);
        Self {
            model,
            hull,
            zpane: 0.0,
            frame: true,
            notable_level: hull.min.z + hull.z_range(),
            zero_interval_is_absent: true,
        }
    }

    pub fn with_zpane(mut self, zpane: f64) -> Self {
        self.zpane = zpane;
        self
    }

    pub fn with_frame(mut self, frame: bool) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_notable_level(mut self, level: f64) -> Self {
        self.notable_level = level;
        self
    }

    pub fn with_zero_interval_is_absent(mut self, absent: bool) -> Self {
        self.zero_interval_is_absent = absent;
        self
    }

    /// Whether a bar top sits within 1% of the scene height range of the notable level
    pub fn is_notable(&self, z: f64) -> bool {
        let band = self.hull.z_range() * NOTABLE_BAND;
        z > self.notable_level - band && z < self.notable_level + band
    }

    fn interval_height(&self, x: f64, y: f64) -> Option<f64> {
        self.model
            .interval_height_at(x, y)
            .filter(|&z| !(self.zero_interval_is_absent && z == 0.0))
    }
}

/// Per-cell decoration of the surface
pub trait Enrichment {
    fn draw_begin(&mut self, _ctx: &RenderContext<'_>) {}

    /// Called once per occupied cell with its all-samples height as `pos.z`
    fn draw(&mut self, ctx: &RenderContext<'_>, pos: &Triple, sink: &mut dyn RenderSink);

    /// Called once per frame after every cell
    fn draw_end(&mut self, ctx: &RenderContext<'_>, sink: &mut dyn RenderSink);
}

/// Solid bars, with interval bars drawn inside the all-samples frames
#[derive(Debug, Clone, Copy, Default)]
pub struct BarEnrichment;

impl Enrichment for BarEnrichment {
    fn draw(&mut self, ctx: &RenderContext<'_>, pos: &Triple, sink: &mut dyn RenderSink) {
        let floor = ctx.hull.min.z;
        if pos.z == floor {
            return;
        }

        let bar = BarGeometry {
            x: pos.x,
            y: pos.y,
            half_width: ctx.model.diag,
            floor,
        };

        if !ctx.model.intervals_active {
            let top = ctx.model.color.color_at_z(pos.x, pos.y, pos.z);
            let bottom = ctx.model.color.color_at_z(pos.x, pos.y, floor);
            let top_face = if ctx.is_notable(pos.z) { HIGHLIGHT_COLOR } else { top };
            bar.faces(pos.z, bottom, top, top_face, sink);
            bar.edges(pos.z, sink);
            return;
        }

        if ctx.frame {
            bar.edges(pos.z, sink);
        }

        let Some(z) = ctx.interval_height(pos.x, pos.y) else {
            return;
        };
        let top = ctx.model.color.color_at_z(pos.x, pos.y, z);
        let bottom = ctx.model.color.color_at_z(pos.x, pos.y, floor);
        let top_face = if ctx.is_notable(z) { HIGHLIGHT_COLOR } else { top };
        bar.faces(z, bottom, top, top_face, sink);
        bar.edges(z, sink);
    }

    fn draw_end(&mut self, ctx: &RenderContext<'_>, sink: &mut dyn RenderSink) {
        draw_pane(ctx, BAR_PANE_ALPHA, sink);
    }
}

/// Decoration for the mesh styles: only the pane
#[derive(Debug, Clone, Copy, Default)]
pub struct WaterEnrichment;

impl Enrichment for WaterEnrichment {
    fn draw(&mut self, _ctx: &RenderContext<'_>, _pos: &Triple, _sink: &mut dyn RenderSink) {}

    fn draw_end(&mut self, ctx: &RenderContext<'_>, sink: &mut dyn RenderSink) {
        draw_pane(ctx, WATER_PANE_ALPHA, sink);
    }
}

/// Footprint of one bar
struct BarGeometry {
    x: f64,
    y: f64,
    half_width: f64,
    floor: f64,
}

impl BarGeometry {
    /// Corners of the footprint, counter-clockwise from (-, -)
    fn corners(&self) -> [(f64, f64); 4] {
        let d = self.half_width;
        [
            (self.x - d, self.y - d),
            (self.x + d, self.y - d),
            (self.x + d, self.y + d),
            (self.x - d, self.y + d),
        ]
    }

    /// Bottom face, top face and four shaded sides
    fn faces(&self, z: f64, bottom: Rgba, top: Rgba, top_face: Rgba, sink: &mut dyn RenderSink) {
        let c = self.corners();

        sink.quad(c.map(|(x, y)| ColoredVertex::new(x, y, self.floor, bottom)));
        sink.quad(c.map(|(x, y)| ColoredVertex::new(x, y, z, top_face)));

        for (a, b) in [(0, 1), (3, 2), (0, 3), (1, 2)] {
            let (ax, ay) = c[a];
            let (bx, by) = c[b];
            sink.quad([
                ColoredVertex::new(ax, ay, self.floor, bottom),
                ColoredVertex::new(bx, by, self.floor, bottom),
                ColoredVertex::new(bx, by, z, top),
                ColoredVertex::new(ax, ay, z, top),
            ]);
        }
    }

    /// The twelve box edges
    fn edges(&self, z: f64, sink: &mut dyn RenderSink) {
        let c = self.corners();
        for i in 0..4 {
            let (ax, ay) = c[i];
            let (bx, by) = c[(i + 1) % 4];
            sink.line(Point3::new(ax, ay, self.floor), Point3::new(bx, by, self.floor), EDGE_COLOR);
            sink.line(Point3::new(ax, ay, z), Point3::new(bx, by, z), EDGE_COLOR);
            sink.line(Point3::new(ax, ay, self.floor), Point3::new(ax, ay, z), EDGE_COLOR);
        }
    }
}

/// Translucent slab from the hull floor up to the pane, outlined at the top
fn draw_pane(ctx: &RenderContext<'_>, alpha: f64, sink: &mut dyn RenderSink) {
    if ctx.zpane == 0.0 {
        return;
    }

    let (r, g, b) = PANE_RGB;
    let fill = Rgba::new(r, g, b, alpha);
    let min = ctx.hull.min;
    let max = ctx.hull.max;
    let z = ctx.zpane + min.z;

    let footprint = [(min.x, min.y), (min.x, max.y), (max.x, max.y), (max.x, min.y)];
    sink.quad(footprint.map(|(x, y)| ColoredVertex::new(x, y, z, fill)));
    sink.quad(footprint.map(|(x, y)| ColoredVertex::new(x, y, min.z, fill)));

    for ((ax, ay), (bx, by)) in [
        ((min.x, min.y), (max.x, min.y)),
        ((min.x, max.y), (max.x, max.y)),
        ((min.x, min.y), (min.x, max.y)),
        ((max.x, min.y), (max.x, max.y)),
    ] {
        sink.quad([
            ColoredVertex::new(ax, ay, min.z, fill),
            ColoredVertex::new(ax, ay, z, fill),
            ColoredVertex::new(bx, by, z, fill),
            ColoredVertex::new(bx, by, min.z, fill),
        ]);
    }

    for i in 0..4 {
        let (ax, ay) = footprint[i];
        let (bx, by) = footprint[(i + 1) % 4];
        sink.line(Point3::new(ax, ay, z), Point3::new(bx, by, z), EDGE_COLOR);
    }
}
