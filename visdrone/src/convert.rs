//! Conversion of VisDrone annotations into YOLO labels.

use crate::{
    annotation::VisDroneRecord,
    category::{CategoryLookup, CategoryMapping, FilterPolicy},
    common::*,
    config::Config,
    error::ConvertError,
    report::{ConversionReport, DropCounts, DropReason, ImageReport},
};
use bbox::{Transform, HW};
use par_stream::{ParParams, ParParamsConfig};
use label::{Label, YoloLabel};

/// The annotation, image and label directories of one dataset split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitDirs {
    pub annotation_dir: PathBuf,
    pub image_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl SplitDirs {
    /// The standard layout `<root>/{annotations,images,labels}/<split>`.
    pub fn from_dataset(root_dir: &Path, split: &str) -> Self {
        Self {
            annotation_dir: root_dir.join("annotations").join(split),
            image_dir: root_dir.join("images").join(split),
            output_dir: root_dir.join("labels").join(split),
        }
    }
}

/// The labels extracted from one annotation file.
#[derive(Debug, Default)]
pub struct FileConversion {
    pub labels: Vec<YoloLabel>,
    pub drops: DropCounts,
    pub issues: Vec<ConvertError>,
}

/// A located image and the transform normalizing its pixel coordinates.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub path: PathBuf,
    pub size: HW<usize>,
    pub to_unit: Transform<f64>,
}

/// The outcome of one annotation file that did not abort the batch.
#[derive(Debug)]
pub enum ImageOutcome {
    Converted(ImageReport),
    Skipped(ConvertError),
}

/// Converts VisDrone annotation files into YOLO label files.
#[derive(Debug, Clone)]
pub struct Converter {
    mapping: CategoryMapping,
    filter: FilterPolicy,
    image_extensions: Vec<String>,
    precision: usize,
    workers: Option<usize>,
}

impl Converter {
    pub fn new(mapping: CategoryMapping, filter: FilterPolicy) -> Self {
        Self {
            mapping,
            filter,
            image_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            precision: 6,
            workers: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            mapping: config.categories.clone(),
            filter: config.filter.clone(),
            image_extensions: config.dataset.image_extensions.clone(),
            precision: config.convert.precision,
            workers: config.convert.workers,
        }
    }

    pub fn with_image_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn mapping(&self) -> &CategoryMapping {
        &self.mapping
    }

    /// Worker settings of the batch stream. Unset workers follow the CPU count.
    pub fn par_params(&self) -> ParParams {
        self.workers
            .map(|num_workers| ParParamsConfig::FixedWorkers { num_workers })
            .into()
    }

    /// Decides the fate of one source box: its class index, or why it is dropped.
    pub fn classify(&self, record: &VisDroneRecord) -> Result<usize, DropReason> {
        let FilterPolicy {
            ignore_zero_score,
            max_occlusion,
            max_truncation,
        } = self.filter;
        let lookup = self.mapping.lookup(record.category_id);

        if lookup == CategoryLookup::Ignored || (ignore_zero_score && record.score == 0) {
            return Err(DropReason::IgnoredRegion);
        }
        if matches!(max_occlusion, Some(max) if record.occlusion > max) {
            return Err(DropReason::Occluded);
        }
        if matches!(max_truncation, Some(max) if record.truncation > max) {
            return Err(DropReason::Truncated);
        }

        match lookup {
            CategoryLookup::Class(index) => Ok(index),
            _ => Err(DropReason::UnmappedCategory),
        }
    }

    /// Converts the text of an annotation file for an image of `size`.
    ///
    /// `file` only names the source in reported issues.
    pub fn convert_text(
        &self,
        file: &Path,
        text: &str,
        size: &HW<usize>,
    ) -> Result<FileConversion> {
        let to_unit = unit_transform(size)
            .ok_or_else(|| format_err!("the image size must be positive"))?;
        Ok(self.convert_lines(file, text, &to_unit))
    }

    /// Converts annotation text with `to_unit` mapping pixels into the unit square.
    pub fn convert_lines(
        &self,
        file: &Path,
        text: &str,
        to_unit: &Transform<f64>,
    ) -> FileConversion {
        let mut output = FileConversion::default();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            if line.trim().is_empty() {
                continue;
            }

            let record: VisDroneRecord = match line.parse() {
                Ok(record) => record,
                Err(err) => {
                    warn!("skip line {} of '{}': {}", line_no, file.display(), err);
                    output.drops.increment(DropReason::MalformedLine);
                    output.issues.push(ConvertError::MalformedAnnotation {
                        file: file.to_owned(),
                        line: line_no,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let class = match self.classify(&record) {
                Ok(class) => class,
                Err(reason) => {
                    output.drops.increment(reason);
                    if reason == DropReason::UnmappedCategory {
                        debug!(
                            "drop unmapped category {} at line {} of '{}'",
                            record.category_id,
                            line_no,
                            file.display()
                        );
                        output.issues.push(ConvertError::UnmappedCategory {
                            file: file.to_owned(),
                            line: line_no,
                            category_id: record.category_id,
                        });
                    }
                    continue;
                }
            };

            // boxes reaching past the image border are clamped, not dropped
            let rect = (to_unit * &record.bbox).clamp(0.0, 1.0);
            output.labels.push(Label { rect, class });
        }

        output
    }

    /// Renders labels as the content of a label file.
    pub fn render(&self, labels: &[YoloLabel]) -> String {
        labels
            .iter()
            .map(|label| format!("{}\n", label.display(self.precision)))
            .collect()
    }

    /// Finds the image of an annotation file and reads its size from the image header.
    pub fn find_image(
        &self,
        annotation_file: &Path,
        image_dir: &Path,
    ) -> Result<ImageFrame, ConvertError> {
        let missing = |reason: String| ConvertError::MissingImage {
            annotation: annotation_file.to_owned(),
            reason,
        };
        let file_name = annotation_file
            .file_name()
            .ok_or_else(|| missing("the annotation path has no file name".into()))?;

        let image_file = self
            .image_extensions
            .iter()
            .map(|ext| image_dir.join(file_name).with_extension(ext))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                missing(format!(
                    "no image with extension {} found in '{}'",
                    self.image_extensions.join("/"),
                    image_dir.display()
                ))
            })?;

        let imagesize::ImageSize { width, height } = imagesize::size(&image_file)
            .map_err(|err| missing(format!("cannot read '{}': {}", image_file.display(), err)))?;
        let frame = HW::try_from_wh(width, height).ok().and_then(|size| {
            let to_unit = unit_transform(&size)?;
            Some(ImageFrame {
                path: image_file.clone(),
                size,
                to_unit,
            })
        });
        frame.ok_or_else(|| {
            missing(format!(
                "'{}' has an empty size {}x{}",
                image_file.display(),
                width,
                height
            ))
        })
    }

    /// Converts one annotation file and writes its label file into `output_dir`.
    ///
    /// Only write failures are returned as errors. A missing image skips the file.
    pub fn convert_file(
        &self,
        annotation_file: &Path,
        image_dir: &Path,
        output_dir: &Path,
    ) -> Result<ImageOutcome, ConvertError> {
        let frame = match self.find_image(annotation_file, image_dir) {
            Ok(found) => found,
            Err(err) => {
                warn!("{}, skipping", err);
                return Ok(ImageOutcome::Skipped(err));
            }
        };

        let text = match fs::read(annotation_file) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                let err = ConvertError::MalformedAnnotation {
                    file: annotation_file.to_owned(),
                    line: 0,
                    reason: format!("cannot read the file: {}", err),
                };
                warn!("{}, skipping", err);
                return Ok(ImageOutcome::Skipped(err));
            }
        };

        let FileConversion {
            labels,
            drops,
            issues,
        } = self.convert_lines(annotation_file, &text, &frame.to_unit);

        // the label file keeps the annotation file name, even when empty
        let label_file = output_dir.join(annotation_file.file_name().unwrap_or_default());
        fs::write(&label_file, self.render(&labels)).map_err(|source| {
            ConvertError::OutputWrite {
                path: label_file.clone(),
                source,
            }
        })?;

        debug!(
            "wrote {} labels to '{}'",
            labels.len(),
            label_file.display()
        );
        Ok(ImageOutcome::Converted(ImageReport {
            annotation_file: annotation_file.to_owned(),
            label_file,
            labels_emitted: labels.len(),
            drops,
            issues,
        }))
    }

    /// Converts every `*.txt` annotation of a split in parallel.
    pub async fn convert_dir(&self, dirs: &SplitDirs) -> Result<ConversionReport, ConvertError> {
        let SplitDirs {
            annotation_dir,
            image_dir,
            output_dir,
        } = dirs;

        for dir in [annotation_dir, image_dir] {
            if !dir.is_dir() {
                return Err(ConvertError::SourceDirMissing { path: dir.clone() });
            }
        }
        fs::create_dir_all(output_dir).map_err(|source| ConvertError::OutputWrite {
            path: output_dir.clone(),
            source,
        })?;

        let annotation_files = list_annotation_files(annotation_dir).map_err(|err| {
            warn!("cannot list '{}': {:#}", annotation_dir.display(), err);
            ConvertError::SourceDirMissing {
                path: annotation_dir.clone(),
            }
        })?;
        info!(
            "converting {} annotation files in '{}'",
            annotation_files.len(),
            annotation_dir.display()
        );

        let converter = Arc::new(self.clone());
        let image_dir = Arc::new(image_dir.clone());
        let output_dir = Arc::new(output_dir.clone());

        let outcomes: Vec<_> = stream::iter(annotation_files)
            .par_map(self.par_params(), move |annotation_file| {
                let converter = converter.clone();
                let image_dir = image_dir.clone();
                let output_dir = output_dir.clone();

                move || converter.convert_file(&annotation_file, &image_dir, &output_dir)
            })
            .try_collect()
            .await?;

        let mut report = ConversionReport::default();
        outcomes.into_iter().for_each(|outcome| match outcome {
            ImageOutcome::Converted(image) => report.add_image(image),
            ImageOutcome::Skipped(err) => report.add_skipped(err),
        });

        info!(
            "'{}': {} images processed, {} skipped, {} labels emitted, {} dropped",
            annotation_dir.display(),
            report.images_processed,
            report.images_skipped,
            report.labels_emitted,
            report.labels_dropped()
        );
        Ok(report)
    }

    /// Converts the configured splits of a dataset laid out as in [SplitDirs::from_dataset].
    ///
    /// Splits without an annotation directory are skipped.
    pub async fn convert_dataset(
        &self,
        root_dir: &Path,
        splits: &[String],
    ) -> Result<IndexMap<String, ConversionReport>, ConvertError> {
        let mut reports = IndexMap::new();

        for split in splits {
            let dirs = SplitDirs::from_dataset(root_dir, split);
            if !dirs.annotation_dir.is_dir() {
                info!(
                    "skip split '{}': '{}' does not exist",
                    split,
                    dirs.annotation_dir.display()
                );
                continue;
            }

            let report = self.convert_dir(&dirs).await?;
            reports.insert(split.clone(), report);
        }

        Ok(reports)
    }
}

fn unit_transform(size: &HW<usize>) -> Option<Transform<f64>> {
    let size: HW<f64> = size.clone().try_cast()?;
    Transform::try_normalize(&size).ok()
}

/// Lists `*.txt` files directly under `dir` in lexical order.
pub fn list_annotation_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/*.txt",
        glob::Pattern::escape(&dir.display().to_string())
    );
    let mut files = vec![];
    for path in glob::glob(&pattern)? {
        let path = path?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bbox::Rect;

    fn converter() -> Converter {
        Converter::new(CategoryMapping::visdrone(), FilterPolicy::default())
    }

    fn size(w: usize, h: usize) -> HW<usize> {
        HW::try_from_wh(w, h).unwrap()
    }

    #[test]
    fn convert_scenario_line() {
        let converter = converter();
        let output = converter
            .convert_text(Path::new("a.txt"), "100,50,40,30,1,2,0,0\n", &size(640, 480))
            .unwrap();

        assert_eq!(output.labels.len(), 1);
        assert_eq!(
            converter.render(&output.labels),
            "1 0.1875 0.135417 0.0625 0.0625\n"
        );
        assert_eq!(output.drops.total(), 0);
    }

    #[test]
    fn convert_drops_by_reason() {
        let converter = converter();
        let text = "\
            684,8,273,116,0,0,0,0\n\
            10,10,5,5,0,4,0,0\n\
            10,10,5,5,1,11,0,0\n\
            10,10,5,5,1,4\n\
            \n\
            10,10,5,5,1,4,0,2\n";
        let output = converter
            .convert_text(Path::new("a.txt"), text, &size(100, 100))
            .unwrap();

        assert_eq!(output.labels.len(), 1);
        assert_eq!(output.labels[0].class, 3);
        assert_eq!(output.drops.ignored_region, 2);
        assert_eq!(output.drops.unmapped_category, 1);
        assert_eq!(output.drops.malformed_line, 1);
        assert_eq!(output.issues.len(), 2);
        assert!(matches!(
            output.issues[1],
            ConvertError::MalformedAnnotation { line: 4, .. }
        ));
    }

    #[test]
    fn convert_with_occlusion_threshold() {
        let filter = FilterPolicy {
            max_occlusion: Some(1),
            max_truncation: Some(0),
            ..Default::default()
        };
        let converter = Converter::new(CategoryMapping::visdrone(), filter);
        let text = "1,1,2,2,1,1,0,2\n1,1,2,2,1,1,1,0\n1,1,2,2,1,1,0,1\n";
        let output = converter
            .convert_text(Path::new("a.txt"), text, &size(10, 10))
            .unwrap();

        assert_eq!(output.labels.len(), 1);
        assert_eq!(output.drops.occluded, 1);
        assert_eq!(output.drops.truncated, 1);
    }

    #[test]
    fn convert_keeps_zero_score_when_allowed() {
        let filter = FilterPolicy {
            ignore_zero_score: false,
            ..Default::default()
        };
        let converter = Converter::new(CategoryMapping::visdrone(), filter);
        let output = converter
            .convert_text(Path::new("a.txt"), "1,1,2,2,0,1,0,0\n0,0,9,9,0,0,0,0\n", &size(10, 10))
            .unwrap();

        // category 0 stays an ignored region regardless of the score policy
        assert_eq!(output.labels.len(), 1);
        assert_eq!(output.drops.ignored_region, 1);
    }

    #[test]
    fn convert_clamps_out_of_bound_boxes() {
        let converter = converter();
        let output = converter
            .convert_text(Path::new("a.txt"), "90,-10,40,30,1,1,0,0\n", &size(100, 100))
            .unwrap();
        let rect = &output.labels[0].rect;

        assert!(rect.is_within(0.0, 1.0));
        assert_abs_diff_eq!(rect.cx(), 1.0);
        assert_abs_diff_eq!(rect.cy(), 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(rect.w(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn convert_empty_text() {
        let converter = converter();
        let output = converter
            .convert_text(Path::new("a.txt"), "", &size(10, 10))
            .unwrap();
        assert!(output.labels.is_empty());
        assert_eq!(converter.render(&output.labels), "");
    }

    #[test]
    fn worker_count_sets_stream_params() {
        assert_eq!(converter().with_workers(Some(3)).par_params().num_workers, 3);
        assert!(converter().with_workers(None).par_params().num_workers > 0);
    }

    #[test]
    fn reject_empty_image_size() {
        let converter = converter();
        assert!(converter
            .convert_text(Path::new("a.txt"), "1,1,2,2,1,1,0,0", &size(0, 10))
            .is_err());
    }

    #[test]
    fn precision_is_configurable() {
        let converter = converter().with_precision(3);
        let output = converter
            .convert_text(Path::new("a.txt"), "100,50,40,30,1,2,0,0", &size(640, 480))
            .unwrap();
        assert_eq!(converter.render(&output.labels), "1 0.188 0.135 0.062 0.062\n");
    }
}
