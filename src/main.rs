use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

use ridemodel::channel::Channel;
use ridemodel::config::AppConfig;
use ridemodel::error::{ExportError, ModelPlotError};
use ridemodel::export::{self, text, ExportFormat, SceneExport};
use ridemodel::grid::UpdateMode;
use ridemodel::import::csv::CsvImporter;
use ridemodel::import::ImportManager;
use ridemodel::logging::{init_logging, log_error, LogFormat, LogLevel};
use ridemodel::models::{Interval, RideData};
use ridemodel::plot::ModelPlot;
use ridemodel::postprocess::ModelStatus;
use ridemodel::render::PlotStyle;
use ridemodel::zones::PowerZoneRanges;

/// ridemodel - 3D binned ride data plots
///
/// Bins a ride's samples on two channels, aggregates a third into bar
/// heights and colors the bars by a fourth.
#[derive(Parser)]
#[command(name = "ridemodel")]
#[command(version)]
#[command(about = "Binned 3D model plots of ride data", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log level (error, warn, info, debug, trace), overrides the config file
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<LogLevel>,

    /// Console log format (pretty, json, compact), overrides the config file
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a model plot from a ride file
    Plot(PlotArgs),

    /// List the channels that can be bound to an axis
    Channels,

    /// Show or create the configuration file
    Config {
        /// Print the active configuration
        #[arg(short, long)]
        list: bool,

        /// Write a default configuration file
        #[arg(short, long)]
        init: bool,
    },
}

#[derive(Args)]
struct PlotArgs {
    /// Ride file (CSV)
    file: PathBuf,

    /// Channel binned along x
    #[arg(long)]
    x: Option<Channel>,

    /// Channel binned along y
    #[arg(long)]
    y: Option<Channel>,

    /// Channel aggregated into bar height
    #[arg(long)]
    z: Option<Channel>,

    /// Channel used to color the bars
    #[arg(long)]
    color: Option<Channel>,

    /// Bin width along x
    #[arg(long)]
    x_bin: Option<f64>,

    /// Bin width along y
    #[arg(long)]
    y_bin: Option<f64>,

    /// Skip samples that bin onto x = 0 or y = 0
    #[arg(long)]
    ignore_zero: Option<bool>,

    /// Interval to highlight, as start:stop[:label] in seconds (repeatable)
    #[arg(long = "interval", value_name = "START:STOP[:LABEL]")]
    intervals: Vec<Interval>,

    /// Use the interval markers recorded in the ride file
    #[arg(long)]
    ride_intervals: bool,

    /// Reference pane height as a percentage of the height range
    #[arg(long)]
    zpane: Option<f64>,

    /// Hide the all-samples outlines while intervals are shown
    #[arg(long)]
    no_frame: bool,

    /// Plot style (bar, grid, surface, dots)
    #[arg(long)]
    style: Option<PlotStyle>,

    /// FTP for zone coloring, overrides configured zones
    #[arg(long)]
    ftp: Option<u16>,

    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format (json, text, png)
    #[arg(short = 'f', long, default_value = "text")]
    format: ExportFormat,
}

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Axis label")]
    label: &'static str,
    #[tabled(rename = "Legend")]
    legend: &'static str,
    #[tabled(rename = "Per cell")]
    aggregation: &'static str,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    let log_config = config
        .logging
        .clone()
        .with_overrides(cli.log_level, cli.log_format)
        .with_verbosity(cli.verbose);
    init_logging(&log_config).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Plot(args) => {
            if let Err(e) = run_plot(args, &config) {
                log_error(&e);
                eprintln!("{} {}", "✗".red().bold(), e.user_message());
                std::process::exit(1);
            }
        }

        Commands::Channels => {
            let rows: Vec<ChannelRow> = Channel::ALL
                .iter()
                .filter(|channel| **channel != Channel::None)
                .map(|channel| ChannelRow {
                    name: channel.name(),
                    label: channel.long_description(),
                    legend: channel.short_description(),
                    aggregation: match UpdateMode::for_channel(*channel) {
                        UpdateMode::Mean => "mean",
                        UpdateMode::Accumulate => "total time (%)",
                    },
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }

        Commands::Config { list, init } => {
            let path = cli.config.unwrap_or_else(AppConfig::default_config_path);

            if init {
                if path.exists() {
                    println!("{} {}", "Config already exists:".yellow(), path.display());
                } else {
                    let mut fresh = AppConfig::default();
                    fresh.save_to_file(&path)?;
                    println!("{} {}", "✓ Wrote".green(), path.display());
                }
            }

            if list || !init {
                println!("{}", format!("# {}", path.display()).dimmed());
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn run_plot(args: PlotArgs, config: &AppConfig) -> ridemodel::Result<()> {
    let manager = ImportManager::with_importers(vec![Box::new(
        CsvImporter::new().with_default_recording_interval(config.import.default_recording_interval),
    )]);
    let ride = manager.import_file(&args.file)?;

    let mut settings = config.plot.to_settings();
    if let Some(x) = args.x {
        settings.x = x;
    }
    if let Some(y) = args.y {
        settings.y = y;
    }
    if let Some(z) = args.z {
        settings.z = z;
    }
    if let Some(color) = args.color {
        settings.color = color;
    }
    if let Some(width) = args.x_bin {
        settings.bins.x = width;
    }
    if let Some(width) = args.y_bin {
        settings.bins.y = width;
    }
    if let Some(ignore_zero) = args.ignore_zero {
        settings.ignore_zero = ignore_zero;
    }
    if let Some(style) = args.style {
        settings.style = style;
    }
    if args.no_frame {
        settings.frame = false;
    }
    settings.intervals = args.intervals;
    if args.ride_intervals {
        settings.intervals.extend(ride.intervals_from_markers());
    }

    let zones = match args.ftp {
        Some(ftp) => PowerZoneRanges::from_ftp(ftp),
        None => config.zones.power_zones(),
    }
    .map_err(|e| ModelPlotError::Configuration(e.to_string()))?;

    let mut plot = ModelPlot::new(settings.clone());
    plot.set_data(Some(&ride), settings, Some(&zones))?;
    if let Some(percent) = args.zpane {
        plot.set_zpane(percent);
    }

    match &plot.model().status {
        ModelStatus::Placeholder { message } => eprintln!("{}", message.yellow()),
        ModelStatus::Unconfigured => eprintln!("{}", "Plot has an axis without a channel".yellow()),
        ModelStatus::Ready => eprintln!(
            "{} {} samples, {} cells",
            "✓".green(),
            ride.samples().len(),
            plot.model().heights.len()
        ),
    }

    let scene = SceneExport::from_plot(&plot, ride.source.clone());
    match (args.output, args.format) {
        (Some(path), format) => {
            export::export_scene(&scene, format, &path)?;
            eprintln!("{} {}", "✓ Wrote".green(), path.display());
        }
        (None, ExportFormat::Json) => {
            let json = serde_json::to_string_pretty(&scene)
                .map_err(|e| ExportError::SerializationError(e.to_string()))?;
            println!("{}", json);
        }
        (None, ExportFormat::Text) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            text::write_summary(&scene, &mut out)?;
            out.flush()?;
        }
        (None, ExportFormat::Png) => {
            return Err(ExportError::UnsupportedFormat("png needs --output".to_string()).into());
        }
    }

    Ok(())
}
