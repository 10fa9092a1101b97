use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use noisy_float::prelude::*;
use prettytable::{cell, row, Table};
use std::{env, fs, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};
use visdrone::{
    config::Config,
    data_config::DataConfig,
    launcher::{self, Optimizer},
    plot::Plotter,
    ConversionReport, Converter, LabelStats, SplitDirs,
};

const DEFAULT_CONFIG_FILE: &str = "visdrone.json5";
const MAX_LISTED_ISSUES: usize = 20;

#[derive(Debug, Clone, Parser)]
/// VisDrone dataset toolkit for YOLO detectors
struct Opts {
    #[clap(long)]
    /// configuration file, visdrone.json5 is loaded if present
    config_file: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Convert VisDrone annotations into YOLO label files
    Convert {
        #[clap(long)]
        /// dataset root containing annotations/ and images/
        root_dir: Option<PathBuf>,
        #[clap(long)]
        /// split to convert, may be repeated
        split: Vec<String>,
        #[clap(long)]
        /// convert a single annotation directory instead of a dataset
        annotation_dir: Option<PathBuf>,
        #[clap(long)]
        image_dir: Option<PathBuf>,
        #[clap(long)]
        output_dir: Option<PathBuf>,
        #[clap(long)]
        /// number of parallel workers
        workers: Option<usize>,
        #[clap(long)]
        /// write the conversion summary as JSON
        report_file: Option<PathBuf>,
    },
    /// Write the dataset YAML read by the trainer
    DataConfig {
        #[clap(long, default_value = "configs/VisDrone.yaml")]
        output_file: PathBuf,
    },
    /// Print label statistics and draw charts
    Visualize {
        #[clap(long)]
        split: Option<String>,
        #[clap(long)]
        /// label directory, defaults to labels/<split> under the dataset root
        label_dir: Option<PathBuf>,
        #[clap(long)]
        output_dir: Option<PathBuf>,
        #[clap(long)]
        /// TrueType or OpenType font for chart text
        font_file: Option<PathBuf>,
    },
    /// Train a detector with the external yolo program
    Train {
        #[clap(long)]
        data: Option<PathBuf>,
        #[clap(long)]
        model: Option<PathBuf>,
        #[clap(long)]
        epochs: Option<usize>,
        #[clap(long)]
        batch: Option<usize>,
        #[clap(long)]
        lr: Option<f64>,
        #[clap(long)]
        optimizer: Option<Optimizer>,
        #[clap(long)]
        device: Option<String>,
        #[clap(long)]
        workers: Option<usize>,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        /// print the command without running it
        dry_run: bool,
    },
    /// Run inference with the external yolo program
    Predict {
        #[clap(long)]
        /// image, video, directory or stream URL
        source: String,
        #[clap(long)]
        weights: Option<PathBuf>,
        #[clap(long)]
        conf: Option<f64>,
        #[clap(long)]
        /// do not save annotated outputs
        no_save: bool,
        #[clap(long)]
        /// print the command without running it
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        }
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    // parse arguments
    let Opts {
        config_file,
        command,
    } = Opts::parse();
    let config = load_config(config_file)?;

    match command {
        Command::Convert {
            root_dir,
            split,
            annotation_dir,
            image_dir,
            output_dir,
            workers,
            report_file,
        } => {
            let mut converter = Converter::from_config(&config);
            if workers.is_some() {
                converter = converter.with_workers(workers);
            }

            let reports = match (annotation_dir, image_dir, output_dir) {
                (Some(annotation_dir), Some(image_dir), Some(output_dir)) => {
                    let dirs = SplitDirs {
                        annotation_dir,
                        image_dir,
                        output_dir,
                    };
                    vec![("custom".to_string(), converter.convert_dir(&dirs).await?)]
                }
                (None, None, None) => {
                    let root_dir = root_dir.unwrap_or_else(|| config.dataset.root_dir.clone());
                    let splits = if split.is_empty() {
                        config.dataset.splits.clone()
                    } else {
                        split
                    };
                    let reports = converter.convert_dataset(&root_dir, &splits).await?;
                    ensure!(
                        !reports.is_empty(),
                        "no split of {:?} found under '{}'",
                        splits,
                        root_dir.display()
                    );
                    reports.into_iter().collect()
                }
                _ => bail!("--annotation-dir, --image-dir and --output-dir must be given together"),
            };

            print_reports(&reports);

            if let Some(report_file) = report_file {
                let summary: serde_json::Map<_, _> = reports
                    .iter()
                    .map(|(split, report)| -> Result<_> {
                        Ok((split.clone(), serde_json::to_value(report.summary())?))
                    })
                    .collect::<Result<_>>()?;
                let text = serde_json::to_string_pretty(&summary)?;
                fs::write(&report_file, text)
                    .with_context(|| format!("unable to write '{}'", report_file.display()))?;
                info!("report saved to '{}'", report_file.display());
            }
        }
        Command::DataConfig { output_file } => {
            let data_config = DataConfig::new(
                &config.dataset.root_dir,
                &config.dataset.splits,
                &config.categories,
            );
            data_config.save(&output_file)?;
            info!("dataset file saved to '{}'", output_file.display());
        }
        Command::Visualize {
            split,
            label_dir,
            output_dir,
            font_file,
        } => {
            let mut visualize = config.visualize.clone();
            if let Some(split) = split {
                visualize.split = split;
            }
            if let Some(output_dir) = output_dir {
                visualize.output_dir = output_dir;
            }
            if font_file.is_some() {
                visualize.font_file = font_file;
            }
            let label_dir = label_dir.unwrap_or_else(|| {
                config
                    .dataset
                    .root_dir
                    .join("labels")
                    .join(&visualize.split)
            });

            let stats = LabelStats::collect(&label_dir, config.categories.class_names())?;
            stats.table().printstd();
            if stats.skipped_lines > 0 {
                warn!("{} label lines were skipped", stats.skipped_lines);
            }
            if stats.skipped_files > 0 {
                warn!("{} label files were unreadable", stats.skipped_files);
            }

            let plotter = Plotter::from_config(&visualize)?;
            plotter.save_all(&stats, &visualize.split, &visualize.output_dir)?;
        }
        Command::Train {
            data,
            model,
            epochs,
            batch,
            lr,
            optimizer,
            device,
            workers,
            name,
            dry_run,
        } => {
            let mut train = config.train.clone();
            if let Some(data) = data {
                train.data = data;
            }
            if let Some(model) = model {
                train.model = model;
            }
            if let Some(epochs) = epochs {
                train.epochs = epochs;
            }
            if let Some(batch) = batch {
                train.batch = batch;
            }
            if let Some(lr) = lr {
                ensure!(lr.is_finite(), "the learning rate must be finite");
                train.lr = r64(lr);
            }
            if let Some(optimizer) = optimizer {
                train.optimizer = optimizer;
            }
            if let Some(device) = device {
                train.device = device;
            }
            if let Some(workers) = workers {
                train.workers = workers;
            }
            if let Some(name) = name {
                train.name = name;
            }

            if dry_run {
                println!("{}", train.invocation()?);
            } else {
                launcher::train(&train).await?;
            }
        }
        Command::Predict {
            source,
            weights,
            conf,
            no_save,
            dry_run,
        } => {
            let mut predict = config.predict.clone();
            if let Some(weights) = weights {
                predict.weights = weights;
            }
            if let Some(conf) = conf {
                ensure!(conf.is_finite(), "the confidence threshold must be finite");
                predict.conf = r64(conf);
            }
            if no_save {
                predict.save = false;
            }

            if dry_run {
                println!("{}", predict.invocation(&source)?);
            } else {
                launcher::predict(&predict, &source).await?;
            }
        }
    }

    Ok(())
}

fn load_config(config_file: Option<PathBuf>) -> Result<Config> {
    let config_file = match config_file {
        Some(path) => path,
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !path.is_file() {
                return Ok(Config::default());
            }
            path
        }
    };

    let config = Config::open(&config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))?;
    info!("loaded config file '{}'", config_file.display());
    Ok(config)
}

fn print_reports(reports: &[(String, ConversionReport)]) {
    for (split, report) in reports {
        println!("split: {}", split);
        report.table().printstd();

        let issues = &report.issues;
        if !issues.is_empty() {
            warn!("{} issues in split '{}'", issues.len(), split);
            issues
                .iter()
                .take(MAX_LISTED_ISSUES)
                .for_each(|issue| warn!("{}", issue));
        }
    }

    if reports.len() > 1 {
        let mut table = Table::new();
        table.add_row(row!["split", "images", "skipped", "labels", "dropped"]);
        reports.iter().for_each(|(split, report)| {
            table.add_row(row![
                split,
                report.images_processed,
                report.images_skipped,
                report.labels_emitted,
                report.labels_dropped()
            ]);
        });
        table.printstd();
    }
}
