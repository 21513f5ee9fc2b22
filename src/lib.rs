// Library interface for ridemodel
// Binned 3D plots of ride data: aggregation, post-processing, coloring and bar rendering

pub mod aggregate;
pub mod channel;
pub mod color;
pub mod config;
pub mod error;
pub mod export;
pub mod grid;
pub mod import;
pub mod logging;
pub mod models;
pub mod plot;
pub mod postprocess;
pub mod render;
pub mod zones;

// Re-export commonly used types for convenience
pub use aggregate::{aggregate, Aggregation, ModelSettings};
pub use channel::Channel;
pub use color::{ColorProvider, Legend};
pub use error::{ModelPlotError, Result};
pub use grid::{BinWidths, CellMap, GridKey};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use plot::{build_model, ModelPlot, ViewPoint};
pub use postprocess::{postprocess, ModelData, ModelStatus};
pub use render::{BarEnrichment, Enrichment, PlotStyle, RenderContext, RenderSink, SceneRecorder, WaterEnrichment};
pub use zones::{PowerZoneRanges, ZoneSource};
