//! Conversion summaries.

use crate::{common::*, error::ConvertError};
use prettytable::{cell, row, Table};
use strum::IntoEnumIterator as _;

/// Why a source box was not written to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    IgnoredRegion,
    Occluded,
    Truncated,
    UnmappedCategory,
    MalformedLine,
}

impl DropReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::IgnoredRegion => "ignored region",
            Self::Occluded => "occlusion above threshold",
            Self::Truncated => "truncation above threshold",
            Self::UnmappedCategory => "unmapped category",
            Self::MalformedLine => "malformed line",
        }
    }
}

impl Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Number of dropped boxes per [DropReason].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCounts {
    pub ignored_region: usize,
    pub occluded: usize,
    pub truncated: usize,
    pub unmapped_category: usize,
    pub malformed_line: usize,
}

impl DropCounts {
    pub fn increment(&mut self, reason: DropReason) {
        *self.slot_mut(reason) += 1;
    }

    pub fn get(&self, reason: DropReason) -> usize {
        match reason {
            DropReason::IgnoredRegion => self.ignored_region,
            DropReason::Occluded => self.occluded,
            DropReason::Truncated => self.truncated,
            DropReason::UnmappedCategory => self.unmapped_category,
            DropReason::MalformedLine => self.malformed_line,
        }
    }

    pub fn total(&self) -> usize {
        DropReason::iter().map(|reason| self.get(reason)).sum()
    }

    fn slot_mut(&mut self, reason: DropReason) -> &mut usize {
        match reason {
            DropReason::IgnoredRegion => &mut self.ignored_region,
            DropReason::Occluded => &mut self.occluded,
            DropReason::Truncated => &mut self.truncated,
            DropReason::UnmappedCategory => &mut self.unmapped_category,
            DropReason::MalformedLine => &mut self.malformed_line,
        }
    }
}

impl AddAssign<&DropCounts> for DropCounts {
    fn add_assign(&mut self, rhs: &DropCounts) {
        DropReason::iter().for_each(|reason| *self.slot_mut(reason) += rhs.get(reason));
    }
}

/// The outcome of converting one annotation file.
#[derive(Debug)]
pub struct ImageReport {
    pub annotation_file: PathBuf,
    pub label_file: PathBuf,
    pub labels_emitted: usize,
    pub drops: DropCounts,
    /// Non-fatal problems found in the file.
    pub issues: Vec<ConvertError>,
}

/// The aggregated outcome of a batch.
#[derive(Debug, Default)]
pub struct ConversionReport {
    pub images_processed: usize,
    pub images_skipped: usize,
    pub labels_emitted: usize,
    pub drops: DropCounts,
    pub issues: Vec<ConvertError>,
}

/// The serializable digest of a [ConversionReport].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub images_processed: usize,
    pub images_skipped: usize,
    pub labels_emitted: usize,
    pub labels_dropped: usize,
    pub drops: DropCounts,
    pub issues: Vec<String>,
}

impl ConversionReport {
    pub fn add_image(&mut self, report: ImageReport) {
        let ImageReport {
            labels_emitted,
            drops,
            issues,
            ..
        } = report;
        self.images_processed += 1;
        self.labels_emitted += labels_emitted;
        self.drops += &drops;
        self.issues.extend(issues);
    }

    pub fn add_skipped(&mut self, error: ConvertError) {
        self.images_skipped += 1;
        self.issues.push(error);
    }

    pub fn merge(&mut self, other: ConversionReport) {
        let ConversionReport {
            images_processed,
            images_skipped,
            labels_emitted,
            drops,
            issues,
        } = other;
        self.images_processed += images_processed;
        self.images_skipped += images_skipped;
        self.labels_emitted += labels_emitted;
        self.drops += &drops;
        self.issues.extend(issues);
    }

    pub fn labels_dropped(&self) -> usize {
        self.drops.total()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            images_processed: self.images_processed,
            images_skipped: self.images_skipped,
            labels_emitted: self.labels_emitted,
            labels_dropped: self.labels_dropped(),
            drops: self.drops.clone(),
            issues: self.issues.iter().map(|issue| issue.to_string()).collect(),
        }
    }

    /// Renders the end-of-run summary table.
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row!["item", "count"]);
        table.add_row(row!["images processed", self.images_processed]);
        table.add_row(row!["images skipped", self.images_skipped]);
        table.add_row(row!["labels emitted", self.labels_emitted]);
        table.add_row(row!["labels dropped", self.labels_dropped()]);
        DropReason::iter().for_each(|reason| {
            table.add_row(row![format!("  {}", reason), self.drops.get(reason)]);
        });
        table
    }
}
