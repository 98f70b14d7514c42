// Command-line front end. All model logic lives in the library.
//
//   ferrite-cnn prepare --root ./project --rows 200 --cols 200
//   ferrite-cnn train   --root ./project --config model.json --epochs 10
//   ferrite-cnn predict --root ./project --model my_model frame.png

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use ferrite_cnn::dataset;
use ferrite_cnn::logging::init_logging;
use ferrite_cnn::{ModelConfig, ModelManager, ProjectPaths};

#[derive(Parser, Debug)]
#[command(
    name = "ferrite-cnn",
    version,
    about = "Train and run convolutional classifiers on <category>/<case>/<frame> image trees."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resize the project's dataset into its adaptation folder.
    Prepare(PrepareArgs),
    /// Train a new model, or continue training a saved one.
    Train(TrainArgs),
    /// Classify one image with a saved model.
    Predict(PredictArgs),
    /// Print a random frame of the resized dataset and its category.
    RandomFrame(ModelArgs),
    /// Print a saved model's metadata as JSON.
    Info(ModelArgs),
    /// Write a Graphviz description of a saved model's layers.
    Dot(ModelArgs),
}

#[derive(Args, Debug)]
struct RootArg {
    /// Project directory holding `dataset/` and `cnn_models/`.
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[derive(Args, Debug)]
struct PrepareArgs {
    #[command(flatten)]
    root: RootArg,
    #[arg(long, default_value_t = 200)]
    rows: u32,
    #[arg(long, default_value_t = 200)]
    cols: u32,
    /// Rebuild even if the adaptation folder already exists.
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[command(flatten)]
    root: RootArg,
    /// JSON model config for a new model.
    #[arg(long, conflicts_with = "resume")]
    config: Option<PathBuf>,
    /// Name of a saved model to keep training.
    #[arg(long)]
    resume: Option<String>,
    /// Overrides the configured epoch count.
    #[arg(long)]
    epochs: Option<usize>,
}

#[derive(Args, Debug)]
struct ModelArgs {
    #[command(flatten)]
    root: RootArg,
    /// Saved model name.
    #[arg(long)]
    model: String,
}

#[derive(Args, Debug)]
struct PredictArgs {
    #[command(flatten)]
    model: ModelArgs,
    /// Image to classify; must match the model's input size.
    frame: PathBuf,
}

fn main() -> Result<()> {
    init_logging("ferrite_cnn=info");
    let cli = Cli::parse();

    match cli.command {
        Command::Prepare(args) => {
            let input = ProjectPaths::new(&args.root.root).dataset_dir();
            let output = dataset::adaptation_dir(&input, args.rows, args.cols);
            let written = if args.force || !output.exists() {
                dataset::reshape_images(&input, &output, args.rows, args.cols)?
            } else {
                0
            };
            println!("{} ({} frames written)", output.display(), written);
        }
        Command::Train(args) => {
            let root = args.root.root;
            let mut manager = match (args.config, args.resume) {
                (_, Some(name)) => ModelManager::open(&name, &root)?,
                (Some(path), None) => {
                    let config = ModelConfig::load_json(&path)
                        .with_context(|| format!("reading config {}", path.display()))?;
                    ModelManager::new(config, &root)?
                }
                (None, None) => anyhow::bail!("either --config or --resume is required"),
            };
            let loss = manager.train_model(args.epochs)?;
            println!("final training loss {:.4}", loss);
            if let Some((epoch, score)) = manager.best_validation_score() {
                println!("best validation score {:.4} at epoch {}", score, epoch);
            }
        }
        Command::Predict(args) => {
            let mut manager = ModelManager::open(&args.model.model, &args.model.root.root)?;
            println!("{}", manager.predict(&args.frame)?);
        }
        Command::RandomFrame(args) => {
            let mut manager = ModelManager::open(&args.model, &args.root.root)?;
            let (frame, label) = manager.get_random_frame()?;
            let category = manager.config().category.get(label).cloned().unwrap_or_default();
            println!("{}\t{}", frame.display(), category);
        }
        Command::Info(args) => {
            let manager = ModelManager::open(&args.model, &args.root.root)?;
            println!("{}", serde_json::to_string_pretty(&manager.info())?);
            for line in manager.model().summary() {
                println!("{}", line);
            }
        }
        Command::Dot(args) => {
            let manager = ModelManager::open(&args.model, &args.root.root)?;
            println!("{}", manager.export_dot()?.display());
        }
    }
    Ok(())
}
