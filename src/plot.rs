//! The model plot: settings in, a frozen model and rendered frames out

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{aggregate, ModelSettings};
use crate::channel::Channel;
use crate::color::Legend;
use crate::error::SettingsError;
use crate::models::{Point3, RideData, Triple};
use crate::postprocess::{postprocess, ModelData, ModelStatus};
use crate::render::{PlotStyle, RenderContext, RenderSink};
use crate::zones::ZoneSource;

const AXIS_MAJORS: usize = 7;
const AXIS_MINORS: usize = 5;
const ISOLINES: usize = 10;

/// Camera placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewPoint {
    /// Rotation about x, y and z in degrees
    pub rotation: (f64, f64, f64),
    pub shift: Point3,
    pub viewport_shift: (f64, f64),
    pub zoom: f64,
    pub orthographic: bool,
    pub lighting: bool,
}

impl Default for ViewPoint {
    fn default() -> Self {
        Self {
            rotation: (45.0, 0.0, 30.0),
            shift: Point3::new(0.0, 0.0, 0.0),
            viewport_shift: (0.0, 0.0),
            zoom: 0.8,
            orthographic: false,
            lighting: false,
        }
    }
}

/// Label and ticks for one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub label: String,
    pub majors: usize,
    pub minors: usize,
}

impl Axis {
    fn for_channel(channel: Channel) -> Self {
        Self {
            label: channel.long_description().to_string(),
            majors: AXIS_MAJORS,
            minors: AXIS_MINORS,
        }
    }
}

/// Axis presentation for the whole plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    pub x: Axis,
    pub y: Axis,
    pub z: Axis,
    pub isolines: usize,
    /// Gridlines on the back, left and floor planes
    pub gridlines: bool,
    pub label_offset: f64,
}

/// Build the model for a ride, or the null plot when nothing is configured
pub fn build_model(
    ride: Option<&dyn RideData>,
    settings: &ModelSettings,
    zones: Option<&dyn ZoneSource>,
) -> Result<ModelData, SettingsError> {
    let ride = match ride {
        Some(ride) if settings.is_complete() => ride,
        _ => {
            debug!("Plot not configured, building null model");
            return Ok(ModelData::unconfigured(settings));
        }
    };

    let aggregation = aggregate(ride, settings)?;
    Ok(postprocess(aggregation, settings, ride, zones))
}

/// A configured plot holding the current model and display state
#[derive(Debug, Clone)]
pub struct ModelPlot {
    settings: ModelSettings,
    model: ModelData,
    zpane: f64,
    notable_level: Option<f64>,
    view: ViewPoint,
}

impl Default for ModelPlot {
    fn default() -> Self {
        Self::new(ModelSettings::default())
    }
}

impl ModelPlot {
    pub fn new(settings: ModelSettings) -> Self {
        let model = ModelData::unconfigured(&settings);
        Self {
            settings,
            model,
            zpane: 0.0,
            notable_level: None,
            view: ViewPoint::default(),
        }
    }

    /// Rebuild the model from a ride. The reference pane goes back to 0.
    pub fn set_data(
        &mut self,
        ride: Option<&dyn RideData>,
        settings: ModelSettings,
        zones: Option<&dyn ZoneSource>,
    ) -> Result<&ModelData, SettingsError> {
        let model = build_model(ride, &settings, zones)?;

        self.settings = settings;
        self.model = model;
        self.zpane = 0.0;

        info!(status = ?self.model.status, style = %self.settings.style, "Plot data set");
        Ok(&self.model)
    }

    pub fn model(&self) -> &ModelData {
        &self.model
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn set_style(&mut self, style: PlotStyle) {
        self.settings.style = style;
    }

    pub fn style(&self) -> PlotStyle {
        self.settings.style
    }

    /// Outline the all-samples bars while intervals are shown
    pub fn set_frame(&mut self, frame: bool) {
        self.settings.frame = frame;
    }

    pub fn set_grid(&mut self, grid: bool) {
        self.settings.grid = grid;
    }

    pub fn set_legend(&mut self, legend: bool) {
        self.settings.legend = legend;
    }

    /// Place the reference pane at a percentage of the height range
    pub fn set_zpane(&mut self, percent: f64) {
        self.zpane = (self.model.max_z() - self.model.min_z()) / 100.0 * percent;
    }

    /// Pane height above the floor
    pub fn zpane(&self) -> f64 {
        self.zpane
    }

    /// Override the highlighted height, `None` restores the default
    pub fn set_notable_level(&mut self, level: Option<f64>) {
        self.notable_level = level;
    }

    /// Height whose bars get a highlighted top, the top of the range by default
    pub fn notable_level(&self) -> f64 {
        self.notable_level.unwrap_or_else(|| {
            let range = self.model.max_z() - self.model.min_z();
            self.model.min_z() + range
        })
    }

    pub fn reset_view_point(&mut self) {
        self.view = ViewPoint::default();
    }

    pub fn set_view_point(&mut self, view: ViewPoint) {
        self.view = view;
    }

    pub fn view_point(&self) -> &ViewPoint {
        &self.view
    }

    /// Message shown in place of the plot, if any
    pub fn title(&self) -> Option<&str> {
        match &self.model.status {
            ModelStatus::Placeholder { message } => Some(message),
            _ => None,
        }
    }

    /// Legend, when enabled and there is something to color by
    pub fn legend(&self) -> Option<Legend> {
        if !self.model.is_ready() || self.model.color_channel == Channel::None {
            return None;
        }
        Some(Legend::new(
            &self.model.color,
            self.model.color_channel.short_description(),
            self.settings.legend,
        ))
    }

    pub fn axes(&self) -> Axes {
        Axes {
            x: Axis::for_channel(self.model.x),
            y: Axis::for_channel(self.model.y),
            z: Axis::for_channel(self.model.z),
            isolines: ISOLINES,
            gridlines: self.settings.grid,
            label_offset: self.model.diag * 2.0,
        }
    }

    /// Context handed to the enrichment for one frame
    pub fn render_context(&self) -> RenderContext<'_> {
        RenderContext::new(&self.model)
            .with_zpane(self.zpane)
            .with_frame(self.settings.frame)
            .with_notable_level(self.notable_level())
            .with_zero_interval_is_absent(self.settings.zero_interval_is_absent)
    }

    /// Draw one frame into a sink, returning the number of cells visited
    pub fn render(&self, sink: &mut dyn RenderSink) -> usize {
        if !self.model.is_ready() {
            return 0;
        }

        let ctx = self.render_context();
        let mut enrichment = self.settings.style.enrichment();
        let bins = self.model.bins;

        enrichment.draw_begin(&ctx);
        let mut visited = 0;
        for (key, cell) in self.model.heights.iter() {
            let (x, y) = key.coords(&bins);
            enrichment.draw(&ctx, &Triple::new(x, y, cell.value), sink);
            visited += 1;
        }
        enrichment.draw_end(&ctx, sink);

        debug!(cells = visited, style = %self.settings.style, "Rendered frame");
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BinWidths;
    use crate::models::{Ride, Sample};
    use crate::postprocess::EMPTY_DATASET_MESSAGE;
    use crate::render::SceneRecorder;
    use crate::zones::PowerZoneRanges;

    fn ride() -> Ride {
        let samples = [(100.0, 80.0), (100.0, 80.0), (100.0, 80.0), (200.0, 90.0)]
            .iter()
            .enumerate()
            .map(|(i, &(watts, cad))| Sample {
                watts,
                cad,
                ..Sample::at(i as f64)
            })
            .collect();
        Ride::new(samples, 1.0)
    }

    fn settings() -> ModelSettings {
        ModelSettings {
            bins: BinWidths::new(50.0, 10.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_context_follows_settings() {
        let mut plot = ModelPlot::default();
        let s = ModelSettings {
            zero_interval_is_absent: false,
            frame: false,
            ..settings()
        };
        plot.set_data(Some(&ride()), s, None).unwrap();

        let ctx = plot.render_context();
        assert!(!ctx.zero_interval_is_absent);
        assert!(!ctx.frame);
    }

    #[test]
    fn test_unconfigured_without_ride() {
        let mut plot = ModelPlot::default();
        let model = plot.set_data(None, settings(), None).unwrap();
        assert_eq!(model.status, ModelStatus::Unconfigured);
        assert_eq!(model.min_z(), 0.0);

        let mut s = settings();
        s.y = Channel::None;
        let r = ride();
        let model = plot.set_data(Some(&r), s, None).unwrap();
        assert_eq!(model.status, ModelStatus::Unconfigured);
        assert!(plot.legend().is_none());
        assert_eq!(plot.render(&mut SceneRecorder::new()), 0);
    }

    #[test]
    fn test_placeholder_title() {
        let mut plot = ModelPlot::default();
        let r = Ride::new(Vec::new(), 1.0);
        plot.set_data(Some(&r), settings(), None).unwrap();
        assert_eq!(plot.title(), Some(EMPTY_DATASET_MESSAGE));
    }

    #[test]
    fn test_zpane_percent_and_reset() {
        let mut plot = ModelPlot::default();
        let r = ride();
        plot.set_data(Some(&r), settings(), None).unwrap();

        // heights are 75% and 25%
        plot.set_zpane(50.0);
        assert!((plot.zpane() - 25.0).abs() < 1e-9);

        plot.set_data(Some(&r), settings(), None).unwrap();
        assert_eq!(plot.zpane(), 0.0);
    }

    #[test]
    fn test_notable_level_default_and_override() {
        let mut plot = ModelPlot::default();
        let r = ride();
        plot.set_data(Some(&r), settings(), None).unwrap();
        assert!((plot.notable_level() - 75.0).abs() < 1e-9);

        plot.set_notable_level(Some(40.0));
        assert_eq!(plot.notable_level(), 40.0);
        plot.set_notable_level(None);
        assert!((plot.notable_level() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_view_point_reset() {
        let mut plot = ModelPlot::default();
        plot.set_view_point(ViewPoint {
            zoom: 2.0,
            ..Default::default()
        });
        plot.reset_view_point();
        assert_eq!(plot.view_point().rotation, (45.0, 0.0, 30.0));
        assert_eq!(plot.view_point().zoom, 0.8);
    }

    #[test]
    fn test_render_bar_and_water() {
        let mut plot = ModelPlot::default();
        let r = ride();
        plot.set_data(Some(&r), settings(), None).unwrap();

        let mut scene = SceneRecorder::new();
        assert_eq!(plot.render(&mut scene), 2);
        // the floor-height cell draws nothing
        assert_eq!(scene.quads.len(), 6);
        assert_eq!(scene.lines.len(), 12);

        plot.set_style(PlotStyle::Surface);
        let mut scene = SceneRecorder::new();
        plot.render(&mut scene);
        assert!(scene.is_empty());

        plot.set_zpane(10.0);
        plot.render(&mut scene);
        assert_eq!(scene.quads.len(), 6);
    }

    #[test]
    fn test_legend_with_zones() {
        let mut plot = ModelPlot::default();
        let r = ride();
        let zones = PowerZoneRanges::from_ftp(250).unwrap();
        plot.set_data(Some(&r), settings(), Some(&zones)).unwrap();

        let legend = plot.legend().unwrap();
        assert!(legend.shown);
        assert_eq!(legend.majors, 7);
        assert_eq!(legend.title, "Zone");

        plot.set_legend(false);
        assert!(!plot.legend().unwrap().shown);
    }

    #[test]
    fn test_axes_presentation() {
        let mut plot = ModelPlot::default();
        let r = ride();
        plot.set_data(Some(&r), settings(), None).unwrap();

        let axes = plot.axes();
        assert_eq!(axes.x.label, "Power (watts)");
        assert_eq!(axes.z.label, "Time at X/Y (%)");
        assert_eq!((axes.x.majors, axes.x.minors), (7, 5));
        assert_eq!(axes.isolines, 10);
        assert!(axes.gridlines);
        assert_eq!(axes.label_offset, plot.model().diag * 2.0);
    }
}
