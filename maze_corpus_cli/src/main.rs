use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use maze_corpus_core::{
    CorpusBuilder, DatasetArtifacts, MazeConfig, ValidatedConfig, describe::CorpusReport,
    serialize,
};
use tracing::Level;

/// Accepted as `on` or `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Generate maze-learning training and test datasets",
    long_about = None
)]
struct Args {
    /// JSON file with generation parameters; flags given here override it
    #[arg(long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Width of each random room mark vector
    #[arg(
        long,
        alias = "num_room_marks",
        value_name = "QUANTITY",
        allow_negative_numbers = true
    )]
    num_room_marks: Option<i64>,

    /// Number of doors to choose from in every room
    #[arg(
        long,
        alias = "num_doors",
        value_name = "QUANTITY",
        allow_negative_numbers = true
    )]
    num_doors: Option<i64>,

    /// Interior rooms following each maze entry
    #[arg(
        long,
        alias = "maze_interior_sequence_length",
        value_name = "LENGTH",
        allow_negative_numbers = true
    )]
    maze_interior_sequence_length: Option<i64>,

    /// Mazes trained inside a context
    #[arg(
        long,
        alias = "num_context_mazes",
        value_name = "QUANTITY",
        allow_negative_numbers = true
    )]
    num_context_mazes: Option<i64>,

    /// Mazes trained alone and recombined with contexts for testing
    #[arg(
        long,
        alias = "num_independent_mazes",
        value_name = "QUANTITY",
        allow_negative_numbers = true
    )]
    num_independent_mazes: Option<i64>,

    /// Seed for the random stream
    #[arg(
        long,
        alias = "random_seed",
        value_name = "SEED",
        allow_negative_numbers = true
    )]
    random_seed: Option<i64>,

    /// Log progress and print the interpreted dataset
    #[arg(long, value_enum, value_name = "on|off")]
    verbose: Option<Switch>,

    /// Directory the dataset files are written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// File name of the declarative listing
    #[arg(long, value_name = "NAME", default_value = serialize::MODULE_FILE_NAME)]
    module_name: String,

    /// File name of the tabular listing
    #[arg(long, value_name = "NAME", default_value = serialize::CSV_FILE_NAME)]
    csv_name: String,
}

impl Args {
    /// Layers defaults, the optional config file, then individual flags.
    fn resolve(&self) -> Result<MazeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => MazeConfig::default(),
        };
        let overrides = [
            (&mut config.num_room_marks, self.num_room_marks),
            (&mut config.num_doors, self.num_doors),
            (
                &mut config.maze_interior_sequence_length,
                self.maze_interior_sequence_length,
            ),
            (&mut config.num_context_mazes, self.num_context_mazes),
            (&mut config.num_independent_mazes, self.num_independent_mazes),
            (&mut config.random_seed, self.random_seed),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(switch) = self.verbose {
            config.verbose = switch == Switch::On;
        }
        Ok(config)
    }
}

/// Sends log output to stderr so the verbose dataset dump owns stdout.
fn init_logging(verbose: bool) {
    let level = if verbose { Level::INFO } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Echoes the declarative listing, split into its training and test halves.
fn print_listing(module: &str) {
    for line in module.lines() {
        if line.starts_with("X_train_shape") {
            println!("Training data:");
        } else if line.starts_with("X_test_shape") {
            println!("Testing data:");
        }
        println!("{}", line);
    }
}

fn print_report(config: &ValidatedConfig, artifacts: &DatasetArtifacts) -> Result<()> {
    print_listing(&artifacts.module);
    // Describe what was written, not what was generated.
    let decoded = serialize::from_module(&artifacts.module)
        .context("Written dataset does not decode")?;
    let layout = config.layout();
    print!("{}", CorpusReport::new("Training mazes", &decoded.train, layout));
    print!("{}", CorpusReport::new("Test mazes", &decoded.test, layout));
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve()?;
    init_logging(config.verbose);

    // Nothing is generated or written for an invalid configuration.
    let config = config.validate().context("Invalid maze configuration")?;
    config.log_parameters();

    let dataset = CorpusBuilder::new(config.clone())
        .build()
        .context("Failed to generate maze dataset")?;
    let artifacts = DatasetArtifacts::render(&dataset);
    artifacts
        .write_named(&args.output_dir, &args.module_name, &args.csv_name)
        .with_context(|| {
            format!(
                "Failed to write maze dataset to {}",
                args.output_dir.display()
            )
        })?;

    if config.verbose() {
        print_report(&config, &artifacts)?;
    }
    Ok(())
}
