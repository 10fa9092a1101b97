//! Statistics over a directory of YOLO label files.

use crate::{common::*, convert::list_annotation_files};
use bbox::Rect as _;
use label::YoloLabel;
use prettytable::{cell, row, Table};

/// Object counts and normalized box sizes of a label set.
#[derive(Debug, Clone)]
pub struct LabelStats {
    pub class_names: Vec<String>,
    pub num_files: usize,
    pub class_counts: Vec<usize>,
    /// Normalized `(width, height)` of every box.
    pub box_sizes: Vec<(f64, f64)>,
    /// Normalized `(width, height)` of boxes, indexed by class.
    pub class_box_sizes: Vec<Vec<(f64, f64)>>,
    pub skipped_lines: usize,
    pub skipped_files: usize,
}

impl LabelStats {
    pub fn new(class_names: Vec<String>) -> Self {
        let num_classes = class_names.len();
        Self {
            class_names,
            num_files: 0,
            class_counts: vec![0; num_classes],
            box_sizes: vec![],
            class_box_sizes: vec![vec![]; num_classes],
            skipped_lines: 0,
            skipped_files: 0,
        }
    }

    /// Reads every `*.txt` label file in `label_dir`.
    pub fn collect<I, S>(label_dir: impl AsRef<Path>, class_names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let label_dir = label_dir.as_ref();
        ensure!(
            label_dir.is_dir(),
            "the label directory '{}' does not exist, run the conversion first",
            label_dir.display()
        );

        let mut stats = Self::new(class_names.into_iter().map(Into::into).collect());
        for file in list_annotation_files(label_dir)? {
            let bytes = match fs::read(&file) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("skip unreadable label file '{}': {}", file.display(), err);
                    stats.skipped_files += 1;
                    continue;
                }
            };
            stats.add_file(&file, &String::from_utf8_lossy(&bytes));
        }

        info!(
            "collected {} objects from {} label files in '{}'",
            stats.total(),
            stats.num_files,
            label_dir.display()
        );
        Ok(stats)
    }

    /// Accumulates the content of one label file.
    pub fn add_file(&mut self, file: &Path, text: &str) {
        self.num_files += 1;

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let label: YoloLabel = match line.parse() {
                Ok(label) => label,
                Err(err) => {
                    warn!("skip line {} of '{}': {:#}", index + 1, file.display(), err);
                    self.skipped_lines += 1;
                    continue;
                }
            };
            if label.class >= self.num_classes() {
                warn!(
                    "skip line {} of '{}': class {} is out of range",
                    index + 1,
                    file.display(),
                    label.class
                );
                self.skipped_lines += 1;
                continue;
            }

            let size = (label.rect.w(), label.rect.h());
            self.class_counts[label.class] += 1;
            self.box_sizes.push(size);
            self.class_box_sizes[label.class].push(size);
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn total(&self) -> usize {
        self.class_counts.iter().sum()
    }

    /// Percentage of each class over all objects, zero when the set is empty.
    pub fn percentages(&self) -> Vec<f64> {
        let total = self.total();
        self.class_counts
            .iter()
            .map(|&count| {
                if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                }
            })
            .collect()
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row!["class", "count", "percentage"]);
        izip!(&self.class_names, &self.class_counts, self.percentages()).for_each(
            |(name, count, percent)| {
                table.add_row(row![name, count, format!("{:.2}%", percent)]);
            },
        );
        table.add_row(row!["total", self.total(), ""]);
        table
    }
}
