//! grainscope: command-line front end for quantitative metallography.
//!
//! Every subcommand operates on one sample in a directory store
//! (`--store`, default `./grainscope-data`) and prints its result as
//! JSON on stdout. Logs go to stderr; set `RUST_LOG` to change the
//! level.
//!
//! # Usage
//!
//! ```text
//! grainscope import steel-1 micrograph.png
//! grainscope calibrate steel-1 --pixels-per-mm 120
//! grainscope measure steel-1 --min-diameter-mm 0.01
//! grainscope planimetric steel-1 --magnification 100
//! grainscope intercept lines steel-1 --h-intercepts 20 --h-length-px 1000 \
//!     --v-intercepts 18 --v-length-px 1000
//! grainscope chart steel-1 --magnification 100 --g 5 --g 7 --out-dir charts
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use grainscope_engine::{
    ChartConfig, Contour, InterceptTest, MeasureConfig, Point, Scale, SegmentConfig,
    ThresholdWindow,
};
use grainscope_io::{DirectoryStore, SampleId, SampleService};
use serde::Serialize;

type Service = SampleService<DirectoryStore, DirectoryStore>;

/// Grain segmentation, measurement and ASTM E112 grain size.
#[derive(Parser)]
#[command(name = "grainscope", version)]
struct Cli {
    /// Directory holding images and sample records.
    #[arg(long, global = true, default_value = "grainscope-data")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a micrograph and segment it into a new sample.
    Import {
        /// New sample id (letters, digits, `-`, `_`).
        id: SampleId,

        /// Micrograph to import (PNG, JPEG, BMP, WebP, TIFF).
        image_path: PathBuf,

        /// Gaussian blur kernel size (odd; 0 or 1 disables blurring).
        #[arg(long, default_value_t = SegmentConfig::DEFAULT_BLUR_KERNEL_SIZE)]
        blur_kernel_size: u32,

        /// Lowest foreground intensity. Omit both bounds for Otsu.
        #[arg(long, requires = "threshold_max")]
        threshold_min: Option<u8>,

        /// Highest foreground intensity.
        #[arg(long, requires = "threshold_min")]
        threshold_max: Option<u8>,

        /// Count pixels outside the window as foreground.
        #[arg(long)]
        invert: bool,

        /// Contour simplification tolerance as a fraction of perimeter.
        #[arg(long, default_value_t = SegmentConfig::DEFAULT_SIMPLIFY_RATIO)]
        simplify_ratio: f64,

        /// Full segmentation config as a JSON string.
        ///
        /// When provided, the other segmentation flags are ignored.
        #[arg(long)]
        config_json: Option<String>,
    },

    /// Set the sample's pixels-per-millimetre scale.
    Calibrate {
        id: SampleId,

        #[command(flatten)]
        scale: ScaleArgs,

        /// Real distance between the two reference points.
        #[arg(long, requires = "reference")]
        distance_mm: Option<f64>,
    },

    /// Measure every grain contour.
    Measure {
        id: SampleId,

        /// Drop grains with a smaller equivalent diameter.
        #[arg(long, default_value_t = MeasureConfig::DEFAULT_MIN_DIAMETER_MM)]
        min_diameter_mm: f64,
    },

    /// Planimetric grain-size number from the measured grain count.
    Planimetric {
        id: SampleId,

        /// Microscope magnification the image was taken at.
        #[arg(long)]
        magnification: f64,
    },

    /// Intercept grain-size number from counted boundary crossings.
    #[command(subcommand)]
    Intercept(InterceptCommand),

    /// Record the chart-comparison grain-size number.
    Compare {
        id: SampleId,

        /// Integer G between 1 and 14.
        g: f64,
    },

    /// Two-phase area fractions at an intensity threshold.
    Multiphase {
        id: SampleId,

        /// Pixels strictly above this level are phase 1.
        #[arg(allow_negative_numbers = true)]
        threshold: i64,
    },

    /// Replace all contours with those in a JSON file.
    Retouch {
        id: SampleId,

        /// JSON array of contours, each an array of `[x, y]` pairs.
        contours: PathBuf,
    },

    /// Split one contour along a polyline.
    Split {
        id: SampleId,

        /// Index of the contour to split.
        index: usize,

        /// Vertex of the cutting line as `x,y`; repeat for each vertex.
        #[arg(long = "point", value_parser = parse_point, required = true)]
        points: Vec<Point>,

        /// Replace the contour with the pieces instead of only printing them.
        #[arg(long)]
        apply: bool,
    },

    /// Render synthetic comparison charts at the sample's image size.
    Chart {
        id: SampleId,

        #[arg(long)]
        magnification: f64,

        /// Grain-size number to render; repeat for several charts.
        #[arg(long = "g", required = true)]
        g_values: Vec<i32>,

        /// Directory the PNGs are written to.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        #[arg(long, default_value_t = ChartConfig::DEFAULT_SEED)]
        seed: u64,

        /// Lloyd relaxation iterations, 3 to 5.
        #[arg(long, default_value_t = ChartConfig::DEFAULT_ITERATIONS)]
        iterations: u32,
    },

    /// Diameter statistics and histogram of the measured grains.
    Stats { id: SampleId },

    /// Write the contours as white outlines on black.
    Overlay {
        id: SampleId,

        /// Output PNG path.
        output: PathBuf,
    },

    /// Print the stored record.
    Show { id: SampleId },

    /// List stored sample ids.
    List,
}

/// Exactly one way of specifying the scale.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct ScaleArgs {
    /// Scale given directly.
    #[arg(long)]
    pixels_per_mm: Option<Scale>,

    /// Scale from the microscope's micrometres per pixel.
    #[arg(long)]
    microns_per_pixel: Option<f64>,

    /// Two reference points as `x,y`, used with `--distance-mm`.
    #[arg(long, num_args = 2, value_parser = parse_point)]
    reference: Option<Vec<Point>>,
}

#[derive(Subcommand)]
enum InterceptCommand {
    /// Horizontal and vertical test lines.
    Lines {
        id: SampleId,
        #[arg(long)]
        h_intercepts: f64,
        #[arg(long)]
        h_length_px: f64,
        #[arg(long)]
        v_intercepts: f64,
        #[arg(long)]
        v_length_px: f64,
    },
    /// Test circles.
    Circles {
        id: SampleId,
        /// Total circumference in pixels.
        #[arg(long)]
        length_px: f64,
        #[arg(long)]
        intercepts: f64,
        /// Crossings through triple points (weighted 1.5).
        #[arg(long, default_value_t = 0.0)]
        junctions: f64,
    },
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("bad coordinate {v:?}: {e}"))
    };
    Ok(Point::new(parse(x)?, parse(y)?))
}

fn segment_config(
    blur_kernel_size: u32,
    threshold: Option<(u8, u8)>,
    invert: bool,
    simplify_ratio: f64,
    config_json: Option<&str>,
) -> Result<SegmentConfig, String> {
    if let Some(json) = config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    Ok(SegmentConfig {
        blur_kernel_size,
        threshold: threshold.map_or(ThresholdWindow::Auto, |(min, max)| ThresholdWindow::Manual {
            min,
            max,
        }),
        invert,
        simplify_ratio,
    })
}

fn scale_from_args(args: &ScaleArgs, distance_mm: Option<f64>) -> Result<Scale, String> {
    if let Some(scale) = args.pixels_per_mm {
        return Ok(scale);
    }
    if let Some(microns) = args.microns_per_pixel {
        return Scale::from_microns_per_pixel(microns).map_err(|e| e.to_string());
    }
    match (args.reference.as_deref(), distance_mm) {
        (Some(&[p1, p2]), Some(distance)) => {
            Scale::from_reference(p1, p2, distance).map_err(|e| e.to_string())
        }
        _ => Err("--reference needs two points and --distance-mm".to_owned()),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), String> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| format!("Error serializing output: {e}"))?;
    println!("{json}");
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), String> {
    std::fs::write(path, bytes).map_err(|e| format!("Error writing {}: {e}", path.display()))
}

#[allow(clippy::too_many_lines)]
fn run(command: Command, service: &mut Service) -> Result<(), String> {
    match command {
        Command::Import {
            id,
            image_path,
            blur_kernel_size,
            threshold_min,
            threshold_max,
            invert,
            simplify_ratio,
            config_json,
        } => {
            let config = segment_config(
                blur_kernel_size,
                threshold_min.zip(threshold_max),
                invert,
                simplify_ratio,
                config_json.as_deref(),
            )?;
            let bytes = std::fs::read(&image_path)
                .map_err(|e| format!("Error reading {}: {e}", image_path.display()))?;
            let extension = image_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("png");
            let image_name = format!("{id}.{}", extension.to_ascii_lowercase());
            let record = service
                .create_sample(&id, &image_name, &bytes, &config)
                .map_err(|e| e.to_string())?;
            print_json(&record)
        }
        Command::Calibrate {
            id,
            scale,
            distance_mm,
        } => {
            let scale = scale_from_args(&scale, distance_mm)?;
            let scale = service.calibrate(&id, scale).map_err(|e| e.to_string())?;
            print_json(&scale)
        }
        Command::Measure {
            id,
            min_diameter_mm,
        } => {
            let config = MeasureConfig { min_diameter_mm };
            print_json(&service.measure(&id, &config).map_err(|e| e.to_string())?)
        }
        Command::Planimetric { id, magnification } => print_json(
            &service
                .planimetric(&id, magnification)
                .map_err(|e| e.to_string())?,
        ),
        Command::Intercept(intercept) => {
            let (id, test) = match intercept {
                InterceptCommand::Lines {
                    id,
                    h_intercepts,
                    h_length_px,
                    v_intercepts,
                    v_length_px,
                } => (
                    id,
                    InterceptTest::Lines {
                        h_intercepts,
                        h_length_px,
                        v_intercepts,
                        v_length_px,
                    },
                ),
                InterceptCommand::Circles {
                    id,
                    length_px,
                    intercepts,
                    junctions,
                } => (
                    id,
                    InterceptTest::Circles {
                        length_px,
                        intercepts,
                        junctions,
                    },
                ),
            };
            print_json(&service.intercept(&id, &test).map_err(|e| e.to_string())?)
        }
        Command::Compare { id, g } => {
            print_json(&service.set_comparison(&id, g).map_err(|e| e.to_string())?)
        }
        Command::Multiphase { id, threshold } => {
            print_json(&service.multiphase(&id, threshold).map_err(|e| e.to_string())?)
        }
        Command::Retouch { id, contours: path } => {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
            let contours: Vec<Contour> = serde_json::from_str(&text)
                .map_err(|e| format!("Error parsing {}: {e}", path.display()))?;
            service.retouch(&id, contours).map_err(|e| e.to_string())
        }
        Command::Split {
            id,
            index,
            points,
            apply,
        } => print_json(
            &service
                .split_contour(&id, index, &points, apply)
                .map_err(|e| e.to_string())?,
        ),
        Command::Chart {
            id,
            magnification,
            g_values,
            out_dir,
            seed,
            iterations,
        } => {
            let config = ChartConfig { seed, iterations };
            let charts = service
                .comparison_charts(&id, magnification, &g_values, &config)
                .map_err(|e| e.to_string())?;
            std::fs::create_dir_all(&out_dir)
                .map_err(|e| format!("Error creating {}: {e}", out_dir.display()))?;
            for chart in charts {
                let path = out_dir.join(format!("{id}_G{}.png", chart.g));
                write_file(&path, &chart.png)?;
                println!("{}", path.display());
            }
            Ok(())
        }
        Command::Stats { id } => print_json(&service.statistics(&id).map_err(|e| e.to_string())?),
        Command::Overlay { id, output } => {
            let png = service.overlay(&id).map_err(|e| e.to_string())?;
            write_file(&output, &png)
        }
        Command::Show { id } => print_json(&service.load(&id).map_err(|e| e.to_string())?),
        Command::List => {
            for id in service.list().map_err(|e| e.to_string())? {
                println!("{id}");
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut service = SampleService::new(
        DirectoryStore::new(&cli.store),
        DirectoryStore::new(&cli.store),
    );

    match run(cli.command, &mut service) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
