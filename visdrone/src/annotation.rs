//! The VisDrone annotation line format.

use crate::common::*;
use bbox::{CyCxHW, Rect};
use thiserror::Error;

/// The number of comma-separated fields of a VisDrone annotation line.
pub const NUM_FIELDS: usize = 8;

const FIELD_NAMES: [&str; NUM_FIELDS] = [
    "bbox_left",
    "bbox_top",
    "bbox_width",
    "bbox_height",
    "score",
    "object_category",
    "truncation",
    "occlusion",
];

/// One object of a VisDrone annotation file.
///
/// The source line reads
/// `<bbox_left>,<bbox_top>,<bbox_width>,<bbox_height>,<score>,<object_category>,<truncation>,<occlusion>`
/// with the box in absolute pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct VisDroneRecord {
    /// The box in pixel units.
    pub bbox: CyCxHW<f64>,
    /// `0` marks a box ignored during evaluation, `1` a counted object.
    pub score: u32,
    pub category_id: u32,
    pub truncation: u32,
    pub occlusion: u32,
}

/// The reason an annotation line cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRecordError {
    #[error("expect at least 8 fields, but found {0}")]
    FieldCount(usize),
    #[error("invalid {name} value '{value}'")]
    InvalidField { name: &'static str, value: String },
    #[error("invalid box: {0}")]
    InvalidBox(String),
}

impl VisDroneRecord {
    /// The left edge in pixels.
    pub fn x_min(&self) -> f64 {
        self.bbox.l()
    }

    /// The top edge in pixels.
    pub fn y_min(&self) -> f64 {
        self.bbox.t()
    }

    pub fn width(&self) -> f64 {
        self.bbox.w()
    }

    pub fn height(&self) -> f64 {
        self.bbox.h()
    }
}

impl FromStr for VisDroneRecord {
    type Err = ParseRecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields: Vec<_> = line.trim().split(',').map(str::trim).collect();

        // tolerate the trailing comma found in some annotation files
        if fields.len() > NUM_FIELDS && fields.last() == Some(&"") {
            fields.pop();
        }
        if fields.len() < NUM_FIELDS {
            return Err(ParseRecordError::FieldCount(fields.len()));
        }

        let float = |index: usize| -> Result<f64, ParseRecordError> {
            fields[index]
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| ParseRecordError::InvalidField {
                    name: FIELD_NAMES[index],
                    value: fields[index].to_owned(),
                })
        };
        let integer = |index: usize| -> Result<u32, ParseRecordError> {
            fields[index]
                .parse::<u32>()
                .map_err(|_| ParseRecordError::InvalidField {
                    name: FIELD_NAMES[index],
                    value: fields[index].to_owned(),
                })
        };

        let left = float(0)?;
        let top = float(1)?;
        let width = float(2)?;
        let height = float(3)?;
        let bbox = CyCxHW::try_from_tlhw([top, left, height, width])
            .map_err(|err| ParseRecordError::InvalidBox(err.to_string()))?;

        Ok(Self {
            bbox,
            score: integer(4)?,
            category_id: integer(5)?,
            truncation: integer(6)?,
            occlusion: integer(7)?,
        })
    }
}
