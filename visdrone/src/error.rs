//! Error kinds raised while converting annotations.

use crate::common::*;
use thiserror::Error;

/// The errors produced by the annotation converter.
///
/// Only [ConvertError::OutputWrite] and [ConvertError::SourceDirMissing] abort
/// a batch. The other kinds are recorded in the conversion report.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("image for annotation '{}' is unavailable: {reason}", .annotation.display())]
    MissingImage { annotation: PathBuf, reason: String },
    #[error("malformed annotation at '{}' line {line}: {reason}", .file.display())]
    MalformedAnnotation {
        file: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("category {category_id} at '{}' line {line} has no mapping", .file.display())]
    UnmappedCategory {
        file: PathBuf,
        line: usize,
        category_id: u32,
    },
    #[error("failed to write '{}'", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("source directory '{}' does not exist", .path.display())]
    SourceDirMissing { path: PathBuf },
}

impl ConvertError {
    /// Returns true if the error must stop the whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OutputWrite { .. } | Self::SourceDirMissing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds() {
        let missing = ConvertError::MissingImage {
            annotation: PathBuf::from("a.txt"),
            reason: "not found".into(),
        };
        let write = ConvertError::OutputWrite {
            path: PathBuf::from("labels/a.txt"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!missing.is_fatal());
        assert!(write.is_fatal());
        assert_eq!(
            write.to_string(),
            "failed to write 'labels/a.txt'"
        );
    }
}
