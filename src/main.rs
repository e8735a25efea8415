// Thin command-line front end. All pipeline logic lives in the library.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ferrite_meg::data::{ChannelType, Feature, LoadingMode};
use ferrite_meg::model::ModelKind;
use ferrite_meg::optim::OptimizerKind;
use ferrite_meg::{RunConfig, RunMode, ResumePolicy};

/// Train and evaluate models on subject-partitioned MEG recordings.
#[derive(Parser, Debug)]
#[command(name = "ferrite-meg", version, about, long_about = None)]
struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with trials.csv, participants.csv and the recordings
    #[arg(short = 'd', long)]
    data_dir: Option<PathBuf>,

    /// Directory for checkpoints and ledgers
    #[arg(short = 's', long)]
    save_dir: Option<PathBuf>,

    /// File stem of the checkpoint and ledger
    #[arg(short = 'n', long)]
    model_name: Option<String>,

    /// overwrite, continue, empty-run or evaluate
    #[arg(short, long)]
    mode: Option<RunMode>,

    /// abort, force-continue or reset-patience
    #[arg(long)]
    resume_policy: Option<ResumePolicy>,

    /// MAG, GRAD or ALL
    #[arg(long)]
    channel: Option<ChannelType>,

    /// temporal, bands, bins or both
    #[arg(short, long)]
    feature: Option<Feature>,

    /// eager or chunked
    #[arg(long)]
    loading: Option<LoadingMode>,

    /// classifier or autoencoder
    #[arg(long)]
    model: Option<ModelKind>,

    /// adam or sgd
    #[arg(long)]
    optimizer: Option<OptimizerKind>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    max_subjects: Option<usize>,

    #[arg(short, long)]
    batch_size: Option<usize>,

    #[arg(short = 'w', long)]
    num_workers: Option<usize>,

    #[arg(short, long)]
    patience: Option<usize>,

    /// Hard cap on the total number of epochs
    #[arg(long)]
    max_epochs: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    hidden: Option<usize>,

    #[arg(long)]
    dropout: Option<f64>,

    /// Do not shuffle trials within a split
    #[arg(long)]
    no_shuffle: bool,

    /// Time the first training batches and project an epoch instead of training
    #[arg(long)]
    timing: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(v) = self.data_dir {
            cfg.data_dir = v;
        }
        if let Some(v) = self.save_dir {
            cfg.save_dir = v;
        }
        if let Some(v) = self.model_name {
            cfg.model_name = v;
        }
        if let Some(v) = self.mode {
            cfg.mode = v;
        }
        if let Some(v) = self.resume_policy {
            cfg.resume_policy = v;
        }
        if let Some(v) = self.channel {
            cfg.channel = v;
        }
        if let Some(v) = self.feature {
            cfg.feature = v;
        }
        if let Some(v) = self.loading {
            cfg.loading = v;
        }
        if let Some(v) = self.model {
            cfg.model = v;
        }
        if let Some(v) = self.optimizer {
            cfg.optimizer = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if let Some(v) = self.max_subjects {
            cfg.max_subjects = v;
        }
        if let Some(v) = self.batch_size {
            cfg.batch_size = v;
        }
        if let Some(v) = self.num_workers {
            cfg.num_workers = v;
        }
        if let Some(v) = self.patience {
            cfg.patience = v;
        }
        if let Some(v) = self.max_epochs {
            cfg.max_epochs = Some(v);
        }
        if let Some(v) = self.learning_rate {
            cfg.learning_rate = v;
        }
        if let Some(v) = self.hidden {
            cfg.hidden = v;
        }
        if let Some(v) = self.dropout {
            cfg.dropout = v;
        }
        if self.no_shuffle {
            cfg.shuffle = false;
        }
        if self.timing {
            cfg.timing = true;
        }
        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<()> {
    let cfg = cli.into_config()?;
    info!(mode = cfg.mode.as_str(), data_dir = %cfg.data_dir.display(), model_name = %cfg.model_name, "starting run");

    let outcome = ferrite_meg::run(&cfg).with_context(|| format!("{} run failed", cfg.mode.as_str()))?;

    if let Some(fit) = outcome.fit {
        info!(
            best_epoch = fit.best_epoch,
            epochs_run = fit.epochs_run,
            "best validation loss {:.6}",
            fit.best_valid_loss
        );
    }
    if let Some(timing) = outcome.timing {
        info!(batches = timing.batches, "per batch {:?}, projected epoch {:?}", timing.per_batch, timing.projected_epoch);
    }
    if let Some(test) = outcome.test {
        match test.accuracy {
            Some(acc) => info!("test: loss {:.4}, accuracy {:.2}% over {} samples", test.loss, acc * 100.0, test.samples),
            None => info!("test: loss {:.4} over {} samples", test.loss, test.samples),
        }
    }
    Ok(())
}
