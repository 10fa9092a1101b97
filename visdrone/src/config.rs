//! Toolkit configuration format.

use crate::{
    category::{CategoryMapping, FilterPolicy},
    common::*,
    launcher::{PredictConfig, TrainConfig},
};

pub use convert::*;
pub use dataset::*;
pub use visualize::*;

pub static CONFIG_VERSION: Lazy<VersionReq> = Lazy::new(|| VersionReq::parse("0.1").unwrap());

/// The main toolkit configuration.
///
/// Every section falls back to its defaults when omitted from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_version")]
    pub version: Version,
    pub dataset: DatasetConfig,
    pub categories: CategoryMapping,
    pub filter: FilterPolicy,
    pub convert: ConvertConfig,
    pub visualize: VisualizeConfig,
    pub train: TrainConfig,
    pub predict: PredictConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: Version::new(0, 1, 0),
            dataset: DatasetConfig::default(),
            categories: CategoryMapping::default(),
            filter: FilterPolicy::default(),
            convert: ConvertConfig::default(),
            visualize: VisualizeConfig::default(),
            train: TrainConfig::default(),
            predict: PredictConfig::default(),
        }
    }
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let Self {
            dataset,
            convert,
            visualize,
            train,
            predict,
            ..
        } = self;

        ensure!(!dataset.splits.is_empty(), "dataset.splits must not be empty");
        ensure!(
            !dataset.image_extensions.is_empty(),
            "dataset.image_extensions must not be empty"
        );
        if let Some(ext) = dataset
            .image_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            bail!("invalid image extension '{}', write it without the dot", ext);
        }
        ensure!(
            convert.precision <= MAX_PRECISION,
            "convert.precision must not exceed {}",
            MAX_PRECISION
        );
        if let Some(workers) = convert.workers {
            ensure!(workers > 0, "convert.workers must be positive");
        }
        ensure!(
            !visualize.split.is_empty(),
            "visualize.split must not be empty"
        );
        train.validate().context("invalid train section")?;
        predict.validate().context("invalid predict section")?;

        Ok(())
    }
}

mod dataset {
    use super::*;

    /// Dataset location and layout.
    ///
    /// Annotations are read from `<root_dir>/annotations/<split>`, images
    /// from `<root_dir>/images/<split>` and labels are written to
    /// `<root_dir>/labels/<split>`.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct DatasetConfig {
        pub root_dir: PathBuf,
        pub splits: Vec<String>,
        /// Extensions tried in order when looking up the image of an annotation.
        pub image_extensions: Vec<String>,
    }

    impl Default for DatasetConfig {
        fn default() -> Self {
            Self {
                root_dir: PathBuf::from("datasets/visdrone2019"),
                splits: vec!["train".into(), "val".into(), "test".into()],
                image_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            }
        }
    }
}

mod convert {
    use super::*;

    /// The largest supported number of decimals in label files.
    pub const MAX_PRECISION: usize = 12;

    /// Conversion options.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ConvertConfig {
        /// Number of parallel workers. Defaults to the number of CPUs.
        pub workers: Option<usize>,
        /// Number of decimals of normalized coordinates.
        pub precision: usize,
    }

    impl Default for ConvertConfig {
        fn default() -> Self {
            Self {
                workers: None,
                precision: 6,
            }
        }
    }
}

mod visualize {
    use super::*;

    /// Label statistics and chart options.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct VisualizeConfig {
        pub split: String,
        pub output_dir: PathBuf,
        /// TrueType or OpenType font used for chart text. Charts are drawn
        /// without text when unset.
        pub font_file: Option<PathBuf>,
        /// Width and height in pixels of a single chart panel.
        pub panel_size: (u32, u32),
    }

    impl Default for VisualizeConfig {
        fn default() -> Self {
            Self {
                split: "train".into(),
                output_dir: PathBuf::from("visualization"),
                font_file: None,
                panel_size: (1200, 600),
            }
        }
    }
}

pub fn deserialize_version<'de, D>(deserializer: D) -> Result<Version, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let version = Version::parse(&text).map_err(|err| {
        D::Error::custom(format!(
            "failed to parse version number '{}': {:?}",
            text, err
        ))
    })?;

    if !CONFIG_VERSION.matches(&version) {
        return Err(D::Error::custom(format!(
            "incompatible version: get '{}', but it is incompatible with requirement '{}'",
            version, &*CONFIG_VERSION,
        )));
    }

    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryLookup;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = json5::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_config() {
        let text = r#"{
            version: "0.1.0",
            dataset: { root_dir: "/data/visdrone", splits: ["train"] },
            categories: {
                names: ["human", "vehicle"],
                mapping: [
                    { source: 0, target: null },
                    { source: 1, target: 0 },
                    { source: 2, target: 0 },
                    { source: 4, target: 1 },
                    { source: 5, target: 1 },
                ],
            },
            filter: { max_occlusion: 1 },
            convert: { precision: 4 },
        }"#;
        let config: Config = json5::from_str(text).unwrap();
        config.validate().unwrap();

        assert_eq!(config.dataset.root_dir, Path::new("/data/visdrone"));
        assert_eq!(config.dataset.splits, vec!["train".to_string()]);
        assert_eq!(config.dataset.image_extensions.len(), 3);
        assert_eq!(config.categories.lookup(5), CategoryLookup::Class(1));
        assert_eq!(config.filter.max_occlusion, Some(1));
        assert!(config.filter.ignore_zero_score);
        assert_eq!(config.convert.precision, 4);
        assert_eq!(config.visualize, VisualizeConfig::default());
    }

    #[test]
    fn incompatible_version() {
        assert!(json5::from_str::<Config>(r#"{ version: "2.0.0" }"#).is_err());
        assert!(json5::from_str::<Config>(r#"{ version: "zero" }"#).is_err());
    }

    #[test]
    fn invalid_values() {
        let mut config = Config::default();
        config.convert.precision = 20;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dataset.image_extensions = vec![".jpg".into()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.convert.workers = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.predict.conf = r64(1.5);
        assert!(config.validate().is_err());
    }
}
