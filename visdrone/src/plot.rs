//! PNG charts of label statistics.

use crate::{common::*, config::VisualizeConfig, stats::LabelStats};
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{
        draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut,
        draw_line_segment_mut, draw_text_mut,
    },
    rect::Rect as PixelRect,
};

pub const HISTOGRAM_BINS: usize = 50;
const GRID_COLUMNS: usize = 3;
const MARGIN: u32 = 40;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRAY: Rgb<u8> = Rgb([200, 200, 200]);
const PALETTE: [Rgb<u8>; 10] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
    Rgb([127, 127, 127]),
    Rgb([188, 189, 34]),
    Rgb([23, 190, 207]),
];

fn class_color(class: usize) -> Rgb<u8> {
    PALETTE[class % PALETTE.len()]
}

/// Counts `values` in [0, 1] into `bins` equal-width bins.
///
/// Values outside the range fall into the first or the last bin.
pub fn histogram(values: impl IntoIterator<Item = f64>, bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins];
    if bins == 0 {
        return counts;
    }

    values.into_iter().for_each(|value| {
        let index = (value * bins as f64).floor();
        let index = if index.is_nan() || index < 0.0 {
            0
        } else {
            (index as usize).min(bins - 1)
        };
        counts[index] += 1;
    });
    counts
}

/// The pixel region of a chart, mapping unit coordinates onto it.
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl Frame {
    fn inside(left: u32, top: u32, width: u32, height: u32) -> Self {
        let margin = MARGIN.min(width / 4).min(height / 4);
        Self {
            left: left + margin,
            top: top + margin,
            width: width.saturating_sub(margin * 2).max(1),
            height: height.saturating_sub(margin * 2).max(1),
        }
    }

    fn x(&self, value: f64) -> f32 {
        self.left as f32 + value.clamp(0.0, 1.0) as f32 * self.width as f32
    }

    fn y(&self, value: f64) -> f32 {
        (self.top + self.height) as f32 - value.clamp(0.0, 1.0) as f32 * self.height as f32
    }

    fn bottom(&self) -> u32 {
        self.top + self.height
    }
}

/// Draws label statistics into PNG charts.
pub struct Plotter {
    panel_size: (u32, u32),
    font: Option<FontVec>,
}

impl Plotter {
    pub fn new(panel_size: (u32, u32)) -> Result<Self> {
        let (width, height) = panel_size;
        ensure!(
            width >= 64 && height >= 64,
            "the panel size {}x{} is too small",
            width,
            height
        );

        Ok(Self {
            panel_size,
            font: None,
        })
    }

    pub fn from_config(config: &VisualizeConfig) -> Result<Self> {
        let plotter = Self::new(config.panel_size)?;
        match &config.font_file {
            Some(path) => plotter.with_font_file(path),
            None => {
                warn!(
                    "visualize.font_file is not set, charts are drawn without titles or labels"
                );
                Ok(plotter)
            }
        }
    }

    /// Loads a TrueType or OpenType font to draw titles and labels.
    pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("unable to read '{}'", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|err| format_err!("invalid font file '{}': {}", path.display(), err))?;
        self.font = Some(font);
        Ok(self)
    }

    /// Returns true if chart text can be drawn.
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn text(&self, image: &mut RgbImage, x: u32, y: u32, size: f32, text: &str) {
        if let Some(font) = &self.font {
            draw_text_mut(
                image,
                BLACK,
                x as i32,
                y as i32,
                PxScale::from(size),
                font,
                text,
            );
        }
    }

    fn axes(&self, image: &mut RgbImage, frame: &Frame) {
        let (left, bottom) = (frame.left as f32, frame.bottom() as f32);
        let right = (frame.left + frame.width) as f32;
        let top = frame.top as f32;
        draw_line_segment_mut(image, (left, bottom), (right, bottom), BLACK);
        draw_line_segment_mut(image, (left, bottom), (left, top), BLACK);
    }

    fn bars(
        &self,
        image: &mut RgbImage,
        frame: &Frame,
        counts: &[usize],
        color: impl Fn(usize) -> Rgb<u8>,
    ) {
        let max = counts.iter().copied().max().unwrap_or(0);
        if counts.is_empty() || max == 0 {
            self.axes(image, frame);
            return;
        }

        let slot = frame.width as f64 / counts.len() as f64;
        let bar_width = ((slot * 0.8) as u32).max(1);

        for (index, &count) in counts.iter().enumerate() {
            let height = (count as f64 / max as f64 * frame.height as f64).round() as u32;
            if height == 0 {
                continue;
            }
            let x = frame.left as f64 + slot * index as f64 + slot * 0.1;
            let rect = PixelRect::at(x as i32, (frame.bottom() - height) as i32)
                .of_size(bar_width, height);
            draw_filled_rect_mut(image, rect, color(index));
        }
        self.axes(image, frame);
    }

    fn scatter(&self, image: &mut RgbImage, frame: &Frame, sizes: &[(f64, f64)], color: Rgb<u8>) {
        for &(w, h) in sizes {
            let center = (frame.x(w).round() as i32, frame.y(h).round() as i32);
            draw_filled_circle_mut(image, center, 1, color);
        }
        self.axes(image, frame);
    }

    /// Bar chart of the object count of each class.
    pub fn class_distribution(&self, stats: &LabelStats, title: &str) -> RgbImage {
        let (width, height) = self.panel_size;
        let mut image = RgbImage::from_pixel(width, height, WHITE);
        let frame = Frame::inside(0, 0, width, height);

        self.bars(&mut image, &frame, &stats.class_counts, class_color);
        self.text(&mut image, frame.left, 8, 20.0, title);

        let slot = frame.width / stats.num_classes().max(1) as u32;
        let percents = stats.percentages();
        for (index, (name, percent)) in stats.class_names.iter().zip(percents).enumerate() {
            let x = frame.left + slot * index as u32;
            self.text(&mut image, x, frame.bottom() + 4, 14.0, name);
            self.text(
                &mut image,
                x,
                frame.bottom() + 20,
                12.0,
                &format!("{} ({:.1}%)", stats.class_counts[index], percent),
            );
        }

        image
    }

    /// Width versus height of every box.
    pub fn box_size_scatter(&self, stats: &LabelStats) -> RgbImage {
        let (width, height) = self.panel_size;
        let side = width.min(height);
        let mut image = RgbImage::from_pixel(side, side, WHITE);
        let frame = Frame::inside(0, 0, side, side);

        self.scatter(&mut image, &frame, &stats.box_sizes, class_color(0));
        self.text(&mut image, frame.left, 8, 20.0, "box width vs. height");
        image
    }

    /// One width versus height scatter per class, laid out three per row.
    pub fn box_size_by_class(&self, stats: &LabelStats) -> RgbImage {
        let cell = self.panel_size.0.min(self.panel_size.1) / 2;
        let rows = ((stats.num_classes() + GRID_COLUMNS - 1) / GRID_COLUMNS).max(1);
        let mut image =
            RgbImage::from_pixel(cell * GRID_COLUMNS as u32, cell * rows as u32, WHITE);

        for (class, sizes) in stats.class_box_sizes.iter().enumerate() {
            let left = (class % GRID_COLUMNS) as u32 * cell;
            let top = (class / GRID_COLUMNS) as u32 * cell;
            draw_hollow_rect_mut(
                &mut image,
                PixelRect::at(left as i32, top as i32).of_size(cell, cell),
                GRAY,
            );

            let frame = Frame::inside(left, top, cell, cell);
            self.scatter(&mut image, &frame, sizes, class_color(class));
            self.text(
                &mut image,
                frame.left,
                top + 4,
                16.0,
                &format!("{} ({})", stats.class_names[class], sizes.len()),
            );
        }

        image
    }

    /// Histograms of box widths and heights, side by side.
    pub fn box_size_histogram(&self, stats: &LabelStats) -> RgbImage {
        let (width, height) = self.panel_size;
        let mut image = RgbImage::from_pixel(width, height, WHITE);
        let half = width / 2;

        let widths = histogram(stats.box_sizes.iter().map(|&(w, _)| w), HISTOGRAM_BINS);
        let heights = histogram(stats.box_sizes.iter().map(|&(_, h)| h), HISTOGRAM_BINS);

        for (index, (title, counts)) in [("box width", widths), ("box height", heights)]
            .into_iter()
            .enumerate()
        {
            let frame = Frame::inside(half * index as u32, 0, half, height);
            self.bars(&mut image, &frame, &counts, |_| class_color(index));
            self.text(&mut image, frame.left, 8, 20.0, title);
        }

        image
    }

    /// Writes every chart into `output_dir` and returns the written files.
    pub fn save_all(
        &self,
        stats: &LabelStats,
        split: &str,
        output_dir: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)
            .with_context(|| format!("unable to create '{}'", output_dir.display()))?;

        let charts = [
            (
                format!("class_distribution_{}.png", split),
                self.class_distribution(stats, &format!("class distribution ({})", split)),
            ),
            ("box_size_scatter.png".to_string(), self.box_size_scatter(stats)),
            ("box_size_by_class.png".to_string(), self.box_size_by_class(stats)),
            ("box_size_histogram.png".to_string(), self.box_size_histogram(stats)),
        ];

        charts
            .into_iter()
            .map(|(file_name, image)| {
                let path = output_dir.join(file_name);
                image
                    .save(&path)
                    .with_context(|| format!("unable to write '{}'", path.display()))?;
                info!("saved '{}'", path.display());
                Ok(path)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> LabelStats {
        let names = ["a", "b", "c", "d"].iter().map(|name| name.to_string()).collect();
        let mut stats = LabelStats::new(names);
        stats.add_file(
            Path::new("a.txt"),
            "0 0.5 0.5 0.2 0.1\n0 0.5 0.5 1 1\n3 0.2 0.2 0.01 0.05\n",
        );
        stats
    }

    #[test]
    fn histogram_bins() {
        let counts = histogram([0.0, 0.01, 0.5, 0.999, 1.0, 1.5, -0.2], 50);
        assert_eq!(counts.len(), 50);
        assert_eq!(counts[0], 3);
        assert_eq!(counts[25], 1);
        assert_eq!(counts[49], 3);
        assert_eq!(counts.iter().sum::<usize>(), 7);
        assert!(histogram([0.5], 0).is_empty());
    }

    #[test]
    fn chart_sizes() -> Result<()> {
        let plotter = Plotter::new((300, 200))?;
        let stats = stats();

        let bars = plotter.class_distribution(&stats, "train");
        assert_eq!(bars.dimensions(), (300, 200));

        let scatter = plotter.box_size_scatter(&stats);
        assert_eq!(scatter.dimensions(), (200, 200));

        // four classes take two rows of three cells
        let grid = plotter.box_size_by_class(&stats);
        assert_eq!(grid.dimensions(), (300, 200));

        let hist = plotter.box_size_histogram(&stats);
        assert_eq!(hist.dimensions(), (300, 200));
        Ok(())
    }

    #[test]
    fn bars_are_drawn() -> Result<()> {
        let plotter = Plotter::new((300, 200))?;
        let image = plotter.class_distribution(&stats(), "train");
        let colored = image.pixels().filter(|&&pixel| pixel == class_color(0)).count();
        assert!(colored > 0);
        Ok(())
    }

    #[test]
    fn empty_stats_render() -> Result<()> {
        let plotter = Plotter::new((128, 128))?;
        let stats = LabelStats::new(vec![]);
        plotter.class_distribution(&stats, "empty");
        plotter.box_size_by_class(&stats);
        plotter.box_size_histogram(&stats);
        Ok(())
    }

    #[test]
    fn from_config_without_font() -> Result<()> {
        let config = VisualizeConfig {
            panel_size: (200, 100),
            ..Default::default()
        };
        let plotter = Plotter::from_config(&config)?;
        assert!(!plotter.has_font());

        let dir = tempfile::tempdir()?;
        let font_file = dir.path().join("broken.ttf");
        fs::write(&font_file, b"not a font")?;
        let config = VisualizeConfig {
            font_file: Some(font_file),
            ..config
        };
        assert!(Plotter::from_config(&config).is_err());
        Ok(())
    }

    #[test]
    fn reject_tiny_panel() {
        assert!(Plotter::new((10, 10)).is_err());
    }

    #[test]
    fn save_all_charts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let plotter = Plotter::new((200, 100))?;
        let files = plotter.save_all(&stats(), "val", dir.path())?;

        let names: Vec<_> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            [
                "class_distribution_val.png",
                "box_size_scatter.png",
                "box_size_by_class.png",
                "box_size_histogram.png",
            ]
        );
        assert!(files.iter().all(|path| path.is_file()));
        Ok(())
    }
}
