//! The dataset YAML shared with the trainer and the predictor.

use crate::{category::CategoryMapping, common::*};

/// The dataset description consumed by the Ultralytics trainer.
///
/// ```yaml
/// path: datasets/visdrone2019
/// train: images/train
/// val: images/val
/// test: images/test
/// nc: 10
/// names:
///   0: pedestrian
///   1: people
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfig {
    /// The dataset root. Split directories are relative to it.
    pub path: PathBuf,
    pub train: PathBuf,
    pub val: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<PathBuf>,
    /// The number of classes.
    pub nc: usize,
    pub names: IndexMap<usize, String>,
}

impl DataConfig {
    /// Describes the dataset at `root_dir` with the classes of `mapping`.
    ///
    /// The test split is declared only if it is listed in `splits`.
    pub fn new(root_dir: &Path, splits: &[String], mapping: &CategoryMapping) -> Self {
        let image_dir = |split: &str| Path::new("images").join(split);
        let test = splits
            .iter()
            .any(|split| split == "test")
            .then(|| image_dir("test"));

        Self {
            path: root_dir.to_owned(),
            train: image_dir("train"),
            val: image_dir("val"),
            test,
            nc: mapping.num_classes(),
            names: mapping.class_names().iter().cloned().enumerate().collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.nc == self.names.len(),
            "nc is {}, but {} class names are declared",
            self.nc,
            self.names.len()
        );
        if let Some(index) = (0..self.nc).find(|index| !self.names.contains_key(index)) {
            bail!("class index {} has no name", index);
        }
        Ok(())
    }

    /// The class names in class index order.
    pub fn class_names(&self) -> Vec<String> {
        (0..self.nc)
            .filter_map(|index| self.names.get(&index).cloned())
            .collect()
    }

    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        self.validate()?;
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_yaml::to_string(self)?;
        fs::write(path, text).with_context(|| format!("failed to write '{}'", path.display()))?;
        Ok(())
    }
}
