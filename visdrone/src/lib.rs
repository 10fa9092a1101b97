//! VisDrone dataset toolkit for YOLO-family detectors.
//!
//! The crate converts VisDrone annotations into YOLO labels, summarizes and
//! plots the resulting label sets, and prepares invocations of the external
//! `yolo` command line program for training and inference.

mod common;

pub mod annotation;
pub mod category;
pub mod config;
pub mod convert;
pub mod data_config;
pub mod error;
pub mod launcher;
pub mod plot;
pub mod report;
pub mod stats;

pub use annotation::VisDroneRecord;
pub use category::{CategoryMapping, FilterPolicy};
pub use config::Config;
pub use convert::{Converter, SplitDirs};
pub use error::ConvertError;
pub use report::{ConversionReport, DropCounts, DropReason, ImageReport};
pub use stats::LabelStats;
