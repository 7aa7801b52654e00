// Export model tensors as fixed-point hex memory-init files
use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use plotters::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fixed_point_hex::loader::{collect_tensors, load_json_tensor, SafetensorsLoader};
use fixed_point_hex::matrices::Matrix;
use fixed_point_hex::stats::{mean_squared_error, QuantizationStats};
use fixed_point_hex::{ExportPlan, FixedPoint, FormatConfig, Preset, RoundingMode, Tensor, TensorSource};

#[derive(Parser)]
#[command(
    name = "fxhex",
    about = "Fixed-point hex memory-init exporter",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct FormatArgs {
    /// Total bits per value
    #[arg(long, default_value_t = 16)]
    bits: u32,
    /// Fractional bits per value
    #[arg(long, default_value_t = 8)]
    frac_bits: u32,
    /// Tie-breaking rule
    #[arg(long, value_enum, default_value_t = RoundingMode::HalfEven)]
    rounding: RoundingMode,
}

impl FormatArgs {
    fn format(&self) -> FormatConfig {
        FormatConfig {
            bits: self.bits,
            frac_bits: self.frac_bits,
            rounding: self.rounding,
        }
    }
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Model parameters (.safetensors)
    #[arg(long)]
    model: Option<PathBuf>,
    /// Extra tensors as JSON {"name", "shape", "flat"}, e.g. an input image
    #[arg(long)]
    input: Vec<PathBuf>,
}

impl SourceArgs {
    fn load(&self) -> anyhow::Result<BTreeMap<String, Tensor>> {
        let mut extra = BTreeMap::new();
        for path in &self.input {
            let tensor = load_json_tensor(path)
                .with_context(|| format!("Failed to load tensor {}", path.display()))?;
            extra.insert(tensor.name.clone(), tensor);
        }

        let tensors = match &self.model {
            Some(path) => {
                let loader = SafetensorsLoader::from_file(path)
                    .with_context(|| format!("Failed to load model {}", path.display()))?;
                tracing::info!(model = %path.display(), tensors = loader.tensor_names().len(), "loaded model");
                let sources: [&dyn TensorSource; 2] = [&loader, &extra];
                collect_tensors(&sources)?
            }
            None => extra,
        };

        if tensors.is_empty() {
            bail!("No tensors given: pass --model and/or --input");
        }
        Ok(tensors)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write one hex file per tensor
    Export {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        format: FormatArgs,
        /// Memory layout applied to every tensor when no plan is given
        #[arg(long, value_enum, default_value_t = Preset::Vector)]
        preset: Preset,
        /// JSON export plan; overrides --preset and the format flags
        #[arg(long)]
        plan: Option<PathBuf>,
        /// Output directory
        #[arg(long, default_value = "hex")]
        out_dir: PathBuf,
    },
    /// Report value ranges and quantization error per tensor
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        format: FormatArgs,
    },
    /// Plot mean squared quantization error against value range
    Plot {
        #[command(flatten)]
        format: FormatArgs,
        /// Largest value range magnitude to sample
        #[arg(long, default_value_t = 10)]
        max_range: i32,
        /// Side of the random square matrices
        #[arg(long, default_value_t = 32)]
        size: usize,
        #[arg(long, default_value = "mse-range.png")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fxhex=info,fixed_point_hex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            source,
            format,
            preset,
            plan,
            out_dir,
        } => cmd_export(&source, &format, preset, plan, &out_dir),
        Commands::Inspect { source, format } => cmd_inspect(&source, &format),
        Commands::Plot {
            format,
            max_range,
            size,
            output,
        } => cmd_plot(&format, max_range, size, &output)
            .map_err(|e| anyhow::anyhow!("Plot failed: {}", e)),
    }
}

fn cmd_export(
    source: &SourceArgs,
    format: &FormatArgs,
    preset: Preset,
    plan: Option<PathBuf>,
    out_dir: &Path,
) -> anyhow::Result<()> {
    let tensors = source.load()?;

    let plan = match plan {
        Some(path) => ExportPlan::from_json_file(&path)
            .with_context(|| format!("Failed to read plan {}", path.display()))?,
        None => ExportPlan::from_preset(preset, format.format(), &tensors.tensor_names()),
    };

    let written = plan
        .run(&tensors, out_dir)
        .with_context(|| format!("Export into {} failed", out_dir.display()))?;

    for file in &written {
        println!(
            "Saved {} to {} ({} values, {} lines)",
            file.tensor,
            file.path.display(),
            file.summary.values,
            file.summary.lines
        );
    }
    Ok(())
}

fn cmd_inspect(source: &SourceArgs, format: &FormatArgs) -> anyhow::Result<()> {
    let tensors = source.load()?;
    let quantizer = format.format().quantizer()?;
    let (lo, hi) = quantizer.representable_range();

    println!(
        "Q{}.{} ({:?}), representable range [{}, {}]\n",
        format.bits - format.frac_bits,
        format.frac_bits,
        quantizer.rounding(),
        lo,
        hi
    );
    println!(
        "{:<24} {:>14} {:>10} {:>10} {:>12} {:>12} {:>8}",
        "tensor", "shape", "min", "max", "mse", "max err", "wrapped"
    );

    for tensor in tensors.values() {
        let shape = format!("{:?}", tensor.shape);
        match QuantizationStats::compute(&tensor.flat, &quantizer) {
            Some(stats) => println!(
                "{:<24} {:>14} {:>10.4} {:>10.4} {:>12.3e} {:>12.3e} {:>8}",
                tensor.name,
                shape,
                stats.min,
                stats.max,
                stats.mean_squared_error,
                stats.max_abs_error,
                stats.wrapped
            ),
            None => println!("{:<24} {:>14} (no finite values)", tensor.name, shape),
        }
    }
    Ok(())
}

fn cmd_plot(format: &FormatArgs, max_range: i32, size: usize, output: &Path) -> Result<(), Box<dyn Error>> {
    if max_range < 1 || size == 0 {
        return Err("--max-range and --size must be at least 1".into());
    }
    let quantizer = format.format().quantizer()?;
    let mse = mse_as_range_increases(&quantizer, max_range, size);

    let root = BitMapBackend::new(output, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_min, x_max) = (
        mse.first().map(|(x, _)| *x).unwrap_or(1.0),
        mse.last().map(|(x, _)| *x).unwrap_or(100.0),
    );
    let y_max = mse.iter().map(|(_, y)| *y).fold(0.0, f32::max) * 1.1; // Add 10% padding
    let y_max = if y_max > 0.0 { y_max } else { 1.0 };

    let caption = format!(
        "MSE vs. Value Range (Q{}.{})",
        format.bits - format.frac_bits,
        format.frac_bits
    );
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 40).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(75)
        .build_cartesian_2d(x_min..x_max, 0f32..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Value Range")
        .y_desc("Mean Squared Error (MSE)")
        .light_line_style(&WHITE.mix(0.8))
        .draw()?;

    chart
        .draw_series(LineSeries::new(mse.iter().cloned(), &RED))?
        .label("MSE Trend")
        .legend(|(x, y)| PathElement::new(vec![(x - 5, y), (x + 5, y)], &RED));

    chart.draw_series(
        mse.iter()
            .map(|(x, y)| Circle::new((*x, *y), 3, RED.filled())),
    )?;

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    tracing::info!(path = %output.display(), points = mse.len(), "wrote plot");

    Ok(())
}

fn mse_as_range_increases(quantizer: &FixedPoint, max_real_value: i32, size: usize) -> Vec<(f32, f32)> {
    assert!(max_real_value >= 1);

    let mut mses = Vec::new();

    let iterations_per_range = 20;

    for range_magnitude in 1..=max_real_value {
        let range_magnitude = range_magnitude as f32;
        let mut sum = 0.0;

        for _ in 0..iterations_per_range {
            let f_matrix = Matrix::random_square(size, -range_magnitude..range_magnitude);
            let q_matrix = f_matrix.quantize(quantizer).dequantize(quantizer);
            sum += mean_squared_error(&f_matrix.data, &q_matrix.data);
        }

        mses.push((range_magnitude, sum / iterations_per_range as f32));
    }

    mses
}
