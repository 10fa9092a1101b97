//! Invocations of the external `yolo` command line program.
//!
//! Training and inference are delegated to the Ultralytics framework. This
//! module only turns the configured hyperparameters into `key=value`
//! arguments, checks them, and supervises the child process.

use crate::common::*;
use tokio::process::Command;

pub use predict::*;
pub use train::*;

/// The default program name of the Ultralytics command line interface.
pub const DEFAULT_EXECUTABLE: &str = "yolo";

/// A prepared external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    /// Runs the command to completion with inherited stdio.
    pub async fn run(&self) -> Result<()> {
        info!("running {}", self);
        let status = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("failed to launch '{}'", self.program.display()))?;
        ensure!(
            status.success(),
            "'{}' exited with {}",
            self.program.display(),
            status
        );
        Ok(())
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        self.args.iter().try_for_each(|arg| write!(f, " {}", arg))
    }
}

fn key_value(key: &str, value: impl Display) -> String {
    format!("{}={}", key, value)
}

fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

mod train {
    use super::*;

    /// The optimizer choices accepted by the trainer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumString)]
    #[serde(rename_all = "lowercase")]
    #[strum(ascii_case_insensitive)]
    pub enum Optimizer {
        Sgd,
        Adam,
        #[strum(serialize = "adamw")]
        AdamW,
        #[strum(serialize = "rmsprop")]
        RmsProp,
    }

    impl Optimizer {
        /// The spelling expected by the trainer.
        pub fn as_arg(&self) -> &'static str {
            match self {
                Self::Sgd => "SGD",
                Self::Adam => "Adam",
                Self::AdamW => "AdamW",
                Self::RmsProp => "RMSProp",
            }
        }
    }

    /// Training options.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct TrainConfig {
        pub executable: PathBuf,
        /// The dataset YAML declaring image directories and class names.
        pub data: PathBuf,
        /// Initial weights or a model name known to the trainer.
        pub model: PathBuf,
        pub epochs: usize,
        pub batch: usize,
        /// The initial learning rate.
        pub lr: R64,
        pub optimizer: Optimizer,
        /// Device selector such as `0`, `0,1` or `cpu`.
        pub device: String,
        /// Number of data loading workers.
        pub workers: usize,
        pub name: String,
        /// The directory receiving training runs.
        pub project: PathBuf,
        pub augment: bool,
        /// Epochs without improvement before early stopping.
        pub patience: usize,
        pub val: bool,
        /// Extra `key=value` arguments passed through verbatim.
        pub extra_args: IndexMap<String, String>,
    }

    impl Default for TrainConfig {
        fn default() -> Self {
            Self {
                executable: PathBuf::from(DEFAULT_EXECUTABLE),
                data: PathBuf::from("configs/VisDrone.yaml"),
                model: PathBuf::from("weights/best.pt"),
                epochs: 100,
                batch: 8,
                lr: r64(0.0015),
                optimizer: Optimizer::Sgd,
                device: "0".into(),
                workers: 2,
                name: "visdrone_yolo11".into(),
                project: PathBuf::from("weights/runs"),
                augment: true,
                patience: 10,
                val: true,
                extra_args: IndexMap::new(),
            }
        }
    }

    impl TrainConfig {
        pub fn validate(&self) -> Result<()> {
            ensure!(self.epochs > 0, "epochs must be positive");
            ensure!(self.batch > 0, "batch size must be positive");
            ensure!(self.lr > 0.0, "learning rate must be positive");
            ensure!(!self.name.is_empty(), "the run name must not be empty");
            ensure!(
                !self.device.trim().is_empty(),
                "the device selector must not be empty"
            );
            Ok(())
        }

        /// Builds the trainer command line.
        pub fn invocation(&self) -> Result<Invocation> {
            self.validate()?;

            let mut args = vec![
                "detect".to_string(),
                "train".to_string(),
                key_value("model", self.model.display()),
                key_value("data", self.data.display()),
                key_value("epochs", self.epochs),
                key_value("batch", self.batch),
                key_value("lr0", self.lr),
                key_value("optimizer", self.optimizer.as_arg()),
                key_value("device", &self.device),
                key_value("workers", self.workers),
                key_value("name", &self.name),
                key_value("project", self.project.display()),
                key_value("augment", python_bool(self.augment)),
                key_value("patience", self.patience),
                key_value("val", python_bool(self.val)),
            ];
            args.extend(
                self.extra_args
                    .iter()
                    .map(|(key, value)| key_value(key, value)),
            );

            Ok(Invocation {
                program: self.executable.clone(),
                args,
            })
        }

        /// Where the trainer stores the best checkpoint of this run.
        ///
        /// The trainer appends a counter to `name` when the run directory
        /// already exists, so this is the expected location only.
        pub fn best_weights(&self) -> PathBuf {
            self.project.join(&self.name).join("weights").join("best.pt")
        }
    }

    /// Runs training to completion.
    pub async fn train(config: &TrainConfig) -> Result<()> {
        let invocation = config.invocation()?;
        ensure!(
            config.data.is_file(),
            "the dataset file '{}' does not exist",
            config.data.display()
        );
        if looks_like_path(&config.model) && !config.model.exists() {
            warn!(
                "initial weights '{}' not found locally, the trainer may try to download them",
                config.model.display()
            );
        }

        info!("data: {}", config.data.display());
        info!(
            "epochs: {}, batch: {}, lr0: {}, optimizer: {}, device: {}, workers: {}",
            config.epochs,
            config.batch,
            config.lr,
            config.optimizer.as_arg(),
            config.device,
            config.workers
        );

        invocation
            .run()
            .await
            .context("training did not complete")?;
        info!(
            "training finished, best weights expected at '{}'",
            config.best_weights().display()
        );
        Ok(())
    }

    fn looks_like_path(path: &Path) -> bool {
        path.components().count() > 1
    }
}

mod predict {
    use super::*;

    const IMAGE_EXTENSIONS: &[&str] = &[
        "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
    ];
    const VIDEO_EXTENSIONS: &[&str] = &[
        "asf", "avi", "gif", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "ts", "wmv", "webm",
    ];
    const STREAM_SCHEMES: &[&str] = &["rtsp://", "rtmp://", "http://", "https://", "tcp://"];

    /// Inference options.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct PredictConfig {
        pub executable: PathBuf,
        pub weights: PathBuf,
        /// The confidence threshold.
        pub conf: R64,
        /// Save annotated outputs.
        pub save: bool,
        pub extra_args: IndexMap<String, String>,
    }

    impl Default for PredictConfig {
        fn default() -> Self {
            Self {
                executable: PathBuf::from(DEFAULT_EXECUTABLE),
                weights: PathBuf::from("weights/best.pt"),
                conf: r64(0.25),
                save: true,
                extra_args: IndexMap::new(),
            }
        }
    }

    /// The kind of input handed to the predictor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SourceKind {
        Image,
        Video,
        Directory,
        Stream,
        /// An existing file with an unrecognized extension.
        Other,
    }

    impl SourceKind {
        /// Classifies a prediction source. Local paths must exist.
        pub fn classify(source: &str) -> Result<Self> {
            let lower = source.to_ascii_lowercase();
            if STREAM_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
                return Ok(Self::Stream);
            }

            let path = Path::new(source);
            ensure!(
                path.exists(),
                "the prediction source '{}' does not exist",
                source
            );
            if path.is_dir() {
                return Ok(Self::Directory);
            }

            let ext = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_ascii_lowercase());
            let kind = match ext.as_deref() {
                Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => Self::Image,
                Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => Self::Video,
                _ => Self::Other,
            };
            Ok(kind)
        }
    }

    impl PredictConfig {
        pub fn validate(&self) -> Result<()> {
            ensure!(
                (0.0..=1.0).contains(&self.conf.raw()),
                "confidence threshold must be within [0, 1], but get {}",
                self.conf
            );
            Ok(())
        }

        /// Builds the predictor command line for `source`.
        pub fn invocation(&self, source: &str) -> Result<Invocation> {
            self.validate()?;
            ensure!(!source.is_empty(), "the prediction source is empty");

            let mut args = vec![
                "detect".to_string(),
                "predict".to_string(),
                key_value("model", self.weights.display()),
                key_value("source", source),
                key_value("conf", self.conf),
                key_value("save", python_bool(self.save)),
            ];
            args.extend(
                self.extra_args
                    .iter()
                    .map(|(key, value)| key_value(key, value)),
            );

            Ok(Invocation {
                program: self.executable.clone(),
                args,
            })
        }
    }

    /// Runs inference over an image, a video, a directory or a stream.
    pub async fn predict(config: &PredictConfig, source: &str) -> Result<()> {
        let invocation = config.invocation(source)?;
        let kind = SourceKind::classify(source)?;
        ensure!(
            config.weights.is_file(),
            "the weights file '{}' does not exist",
            config.weights.display()
        );
        info!("predicting on {:?} source '{}'", kind, source);

        invocation
            .run()
            .await
            .context("inference did not complete")?;
        info!("inference finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_invocation() {
        let mut config = TrainConfig::default();
        config
            .extra_args
            .insert("imgsz".to_string(), "1024".to_string());
        let invocation = config.invocation().unwrap();

        assert_eq!(invocation.program, Path::new("yolo"));
        assert_eq!(
            invocation.args,
            vec![
                "detect",
                "train",
                "model=weights/best.pt",
                "data=configs/VisDrone.yaml",
                "epochs=100",
                "batch=8",
                "lr0=0.0015",
                "optimizer=SGD",
                "device=0",
                "workers=2",
                "name=visdrone_yolo11",
                "project=weights/runs",
                "augment=True",
                "patience=10",
                "val=True",
                "imgsz=1024",
            ]
        );
        assert_eq!(
            config.best_weights(),
            Path::new("weights/runs/visdrone_yolo11/weights/best.pt")
        );
    }

    #[test]
    fn train_validation() {
        let config = TrainConfig {
            epochs: 0,
            ..Default::default()
        };
        assert!(config.invocation().is_err());

        let config = TrainConfig {
            lr: r64(0.0),
            ..Default::default()
        };
        assert!(config.invocation().is_err());
    }

    #[test]
    fn optimizer_names() {
        assert_eq!("sgd".parse::<Optimizer>().unwrap(), Optimizer::Sgd);
        assert_eq!("AdamW".parse::<Optimizer>().unwrap(), Optimizer::AdamW);
        assert_eq!("rmsprop".parse::<Optimizer>().unwrap(), Optimizer::RmsProp);
        assert!("lamb".parse::<Optimizer>().is_err());
        assert_eq!(Optimizer::RmsProp.as_arg(), "RMSProp");
    }

    #[test]
    fn predict_invocation() {
        let config = PredictConfig {
            save: false,
            ..Default::default()
        };
        let invocation = config.invocation("videos/clip.mp4").unwrap();
        assert_eq!(
            invocation.to_string(),
            "yolo detect predict model=weights/best.pt source=videos/clip.mp4 conf=0.25 save=False"
        );

        let config = PredictConfig {
            conf: r64(1.5),
            ..Default::default()
        };
        assert!(config.invocation("a.jpg").is_err());
    }

    #[test]
    fn classify_sources() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("frame.JPG");
        let video = dir.path().join("clip.mp4");
        let other = dir.path().join("notes.txt");
        [&image, &video, &other]
            .iter()
            .for_each(|path| fs::write(path, b"").unwrap());

        let classify = |path: &Path| SourceKind::classify(path.to_str().unwrap()).unwrap();
        assert_eq!(classify(&image), SourceKind::Image);
        assert_eq!(classify(&video), SourceKind::Video);
        assert_eq!(classify(&other), SourceKind::Other);
        assert_eq!(classify(dir.path()), SourceKind::Directory);
        assert_eq!(
            SourceKind::classify("rtsp://camera.local/stream").unwrap(),
            SourceKind::Stream
        );
        assert!(SourceKind::classify(dir.path().join("missing.jpg").to_str().unwrap()).is_err());
    }
}
