mod plot;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::info;
use mi_align::experiment::{ExperimentConfig, GaussianNoise, run_experiment};
use mi_align::pipeline::{BinLayout, BinSize, JointStrategy, Selection, ZeroMassPolicy};
use std::path::PathBuf;

/// Registers the red channel of an image against its green channel and
/// renders the mutual information series.
#[derive(Debug, Parser)]
#[command(name = "align_tester", version)]
struct Cli {
    /// Source RGB image.
    input: PathBuf,

    /// Directory for prepared channels, results and plots.
    #[arg(long, default_value = "out")]
    out: PathBuf,

    #[arg(long, default_value_t = 3)]
    bin_size: usize,

    #[arg(long, value_enum, default_value_t = LayoutArg::Full)]
    layout: LayoutArg,

    #[arg(long, value_enum, default_value_t = JointArg::Additive)]
    joint: JointArg,

    #[arg(long, value_enum, default_value_t = ZeroMassArg::Skip)]
    zero_mass: ZeroMassArg,

    #[arg(long, value_enum, default_value_t = SelectArg::Min)]
    select: SelectArg,

    /// Enables additive Gaussian noise with this variance.
    #[arg(long)]
    noise_variance: Option<f64>,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    noise_mean: f64,

    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    noise_offset: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Score shifts on the worker pool.
    #[arg(long)]
    parallel: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    Full,
    Legacy,
}

impl From<LayoutArg> for BinLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Full => BinLayout::Full,
            LayoutArg::Legacy => BinLayout::Legacy,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum JointArg {
    Additive,
    CoOccurrence,
}

impl From<JointArg> for JointStrategy {
    fn from(arg: JointArg) -> Self {
        match arg {
            JointArg::Additive => JointStrategy::Additive,
            JointArg::CoOccurrence => JointStrategy::CoOccurrence,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ZeroMassArg {
    Skip,
    Reject,
}

impl From<ZeroMassArg> for ZeroMassPolicy {
    fn from(arg: ZeroMassArg) -> Self {
        match arg {
            ZeroMassArg::Skip => ZeroMassPolicy::Skip,
            ZeroMassArg::Reject => ZeroMassPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SelectArg {
    Min,
    Max,
}

impl From<SelectArg> for Selection {
    fn from(arg: SelectArg) -> Self {
        match arg {
            SelectArg::Min => Selection::Minimum,
            SelectArg::Max => Selection::Maximum,
        }
    }
}

impl Cli {
    fn experiment(&self) -> anyhow::Result<ExperimentConfig> {
        let mut config = ExperimentConfig::new(&self.input, &self.out);
        config.registration.bin_size = BinSize::new(self.bin_size)?;
        config.registration.layout = self.layout.into();
        config.registration.joint = self.joint.into();
        config.registration.zero_mass = self.zero_mass.into();
        config.selection = self.select.into();
        config.parallel = self.parallel;
        config.noise = self.noise_variance.map(|variance| GaussianNoise {
            mean: self.noise_mean,
            variance,
            offset: self.noise_offset,
            seed: self.seed,
        });
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    // --- 1. Registration ---
    let config = cli.experiment()?;
    let report = run_experiment(&config)
        .await
        .with_context(|| format!("registering {}", config.input.display()))?;

    // --- 2. Console summary ---
    for entry in report.series.entries() {
        println!("{:>2}  {:.6}", entry.shift, entry.score);
    }
    let label = match report.selection {
        Selection::Minimum => "min(MI)",
        Selection::Maximum => "max(MI)",
    };
    println!(
        "{label} = {:.6}  Shift = {}  bin_size = {}",
        report.best.score,
        report.best.shift,
        config.registration.bin_size.get()
    );

    // --- 3. Exports ---
    let json_path = config.output_dir.join("results.json");
    report.write_series_json(&json_path)?;

    let chart_path = config.output_dir.join("mi_series.png");
    plot::render_series(&report.series, Some(report.best))
        .save(&chart_path)
        .with_context(|| format!("writing {}", chart_path.display()))?;

    let heatmap_path = config.output_dir.join("contributions.png");
    plot::render_contributions(&report.breakdown)
        .save(&heatmap_path)
        .with_context(|| format!("writing {}", heatmap_path.display()))?;

    info!(
        "Wrote {}, {} and {}",
        json_path.display(),
        chart_path.display(),
        heatmap_path.display()
    );
    Ok(())
}
