//! Labeled bounding boxes and the YOLO label text format.

use anyhow::{ensure, format_err, Context as _, Error, Result};
use bbox::{CyCxHW, CyCxHW_, Rect, Transform};
use num_traits::Num;
use std::{fmt, ops::Mul, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<R, C>
where
    R: Rect,
{
    pub rect: R,
    pub class: C,
}

/// A box in the YOLO label format: a zero-based class index and a
/// center-form box in image-relative units.
pub type YoloLabel = Label<CyCxHW<f64>, usize>;

impl<'a, T, C> Mul<&'a Label<CyCxHW<T>, C>> for &'a Transform<T>
where
    T: Copy + Num + PartialOrd,
    C: Copy,
{
    type Output = Label<CyCxHW<T>, C>;

    fn mul(self, rhs: &'a Label<CyCxHW<T>, C>) -> Self::Output {
        Label {
            rect: self * &rhs.rect,
            class: rhs.class,
        }
    }
}

impl YoloLabel {
    /// Formats the label as one line of a YOLO label file, without the line break.
    ///
    /// Each coordinate is rounded to `precision` decimals and printed in its
    /// shortest form, e.g. `1 0.1875 0.135417 0.0625 0.0625`.
    pub fn display(&self, precision: usize) -> YoloLine<'_> {
        YoloLine {
            label: self,
            precision,
        }
    }
}

/// The [Display](fmt::Display) adaptor returned by [YoloLabel::display].
#[derive(Debug, Clone, Copy)]
pub struct YoloLine<'a> {
    label: &'a YoloLabel,
    precision: usize,
}

impl fmt::Display for YoloLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { label, precision } = *self;
        let rect = &label.rect;
        write!(f, "{}", label.class)?;

        // YOLO orders the fields x before y, unlike CyCxHW
        [rect.cx(), rect.cy(), rect.w(), rect.h()]
            .into_iter()
            .try_for_each(|value| write!(f, " {}", format_decimals(value, precision)))
    }
}

impl FromStr for YoloLabel {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<_> = line.split_whitespace().collect();
        ensure!(
            fields.len() == 5,
            "expect 5 fields in a label line, but found {}",
            fields.len()
        );

        let class: usize = fields[0]
            .parse()
            .with_context(|| format!("invalid class index '{}'", fields[0]))?;
        let values: Vec<f64> = fields[1..]
            .iter()
            .map(|text| {
                text.parse()
                    .map_err(|_| format_err!("invalid coordinate '{}'", text))
            })
            .collect::<Result<_>>()?;
        let [cx, cy, w, h]: [f64; 4] = values
            .try_into()
            .map_err(|_| format_err!("expect 4 coordinates"))?;
        ensure!(
            [cx, cy, w, h].iter().all(|value| value.is_finite()),
            "coordinates must be finite"
        );

        let rect = CyCxHW_ { cy, cx, h, w }.try_into()?;
        Ok(Label { rect, class })
    }
}

/// Prints `value` with `precision` decimals, rounding exact ties to even,
/// then drops trailing zeros. Negative zero prints as `0`.
pub fn format_decimals(value: f64, precision: usize) -> String {
    let mut text = format!("{:.*}", precision, value);
    if text.contains('.') {
        let len = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(len);
    }
    if text == "-0" {
        text = "0".into();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bbox::{RectNum, HW};

    #[test]
    fn yolo_line_format() {
        let label = YoloLabel {
            rect: CyCxHW::from_cycxhw([65.0 / 480.0, 0.1875, 0.0625, 0.0625]),
            class: 1,
        };
        assert_eq!(
            label.display(6).to_string(),
            "1 0.1875 0.135417 0.0625 0.0625"
        );
        assert_eq!(label.display(2).to_string(), "1 0.19 0.14 0.06 0.06");
    }

    #[test]
    fn yolo_line_format_bounds() {
        let label = YoloLabel {
            rect: CyCxHW::from_cycxhw([1.0, 0.0, 1.0, 0.0000004]),
            class: 0,
        };
        assert_eq!(label.display(6).to_string(), "0 0 1 0 1");
    }

    #[test]
    fn yolo_line_rounds_ties_to_even() {
        // 0.0078125 and 0.0234375 are exact in binary and sit on a tie at 6 decimals
        let label = YoloLabel {
            rect: CyCxHW::from_cycxhw([0.0234375, 0.0078125, 0.5, 0.25]),
            class: 0,
        };
        assert_eq!(label.display(6).to_string(), "0 0.007812 0.023438 0.25 0.5");
    }

    #[test]
    fn format_decimals_shortest_form() {
        assert_eq!(format_decimals(0.1875, 6), "0.1875");
        assert_eq!(format_decimals(0.0625, 3), "0.062");
        assert_eq!(format_decimals(1.0, 6), "1");
        assert_eq!(format_decimals(-0.0, 6), "0");
        assert_eq!(format_decimals(-0.0000001, 6), "0");
        assert_eq!(format_decimals(0.75, 0), "1");
    }

    #[test]
    fn yolo_line_parse() {
        let label: YoloLabel = "3 0.5 0.25 0.125 0.0625".parse().unwrap();
        assert_eq!(label.class, 3);
        assert_abs_diff_eq!(label.rect.cx(), 0.5);
        assert_abs_diff_eq!(label.rect.cy(), 0.25);
        assert_abs_diff_eq!(label.rect.w(), 0.125);
        assert_abs_diff_eq!(label.rect.h(), 0.0625);
    }

    #[test]
    fn yolo_line_parse_errors() {
        assert!("3 0.5 0.25 0.125".parse::<YoloLabel>().is_err());
        assert!("-1 0.5 0.25 0.125 0.1".parse::<YoloLabel>().is_err());
        assert!("1 0.5 x 0.125 0.1".parse::<YoloLabel>().is_err());
        assert!("1 0.5 0.5 -0.1 0.1".parse::<YoloLabel>().is_err());
        assert!("1 0.5 0.5 NaN 0.1".parse::<YoloLabel>().is_err());
    }

    #[test]
    fn label_denormalize() {
        let size = HW::try_from_wh(640.0, 480.0).unwrap();
        let to_ratio = Transform::try_normalize(&size).unwrap();
        let label: YoloLabel = "1 0.1875 0.135417 0.0625 0.0625".parse().unwrap();
        let pixel = &to_ratio.inverse() * &label;

        assert_eq!(pixel.class, 1);
        assert_abs_diff_eq!(pixel.rect.l(), 100.0, epsilon = 1e-3);
        assert_abs_diff_eq!(pixel.rect.t(), 50.0, epsilon = 1e-3);
        assert_abs_diff_eq!(pixel.rect.w(), 40.0, epsilon = 1e-3);
        assert_abs_diff_eq!(pixel.rect.h(), 30.0, epsilon = 1e-3);
    }
}
