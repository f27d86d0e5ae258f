//! PNG charts embedded in the report.
//!
//! Charts are drawn with `plotters` into an in-memory RGB buffer and encoded with `image`, so a
//! given [`ReportData`] always produces the same bytes. Drawing problems never abort a run: the
//! affected chart is replaced by a placeholder and a warning is logged.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use image::{DynamicImage, ImageOutputFormat, RgbImage};
use log::{info, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::config::{Palette, Rgb};
use crate::error::{ReportError, Result};
use crate::fonts;
use crate::format::{capitalize, format_usd, format_usd_axis};
use crate::metrics::ReportData;

const FONT: &str = "sans-serif";
const CHART_WIDTH: u32 = 1600;

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type DrawResult<T> = std::result::Result<T, String>;

/// Colours used by every chart, derived from the report palette.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartStyle {
    palette: Palette,
    background: Rgb,
}

impl ChartStyle {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            background: Rgb(0xFF, 0xFF, 0xFF),
        }
    }

    pub fn chain_color(&self, chain: &str, index: usize) -> RGBColor {
        self.palette.chain_color(chain, index).into()
    }

    fn background(&self) -> RGBColor {
        self.background.into()
    }

    fn text(&self) -> RGBColor {
        self.palette.text.into()
    }

    fn muted(&self) -> RGBColor {
        self.palette.text_muted.into()
    }

    fn border(&self) -> RGBColor {
        self.palette.border.into()
    }

    fn grid(&self) -> RGBColor {
        self.palette.grid.into()
    }

    fn positive(&self) -> RGBColor {
        self.palette.positive.into()
    }

    fn negative(&self) -> RGBColor {
        self.palette.negative.into()
    }

    fn title_font(&self) -> TextStyle<'static> {
        (FONT, 34)
            .into_font()
            .style(FontStyle::Bold)
            .color(&self.text())
    }

    fn label_font(&self) -> TextStyle<'static> {
        (FONT, 22).into_font().color(&self.muted())
    }
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self::new(Palette::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChartKind {
    DailyLiquidations,
    LiquidationsByChain,
    BadDebt,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [
        ChartKind::DailyLiquidations,
        ChartKind::LiquidationsByChain,
        ChartKind::BadDebt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChartKind::DailyLiquidations => "daily_liquidations",
            ChartKind::LiquidationsByChain => "liquidations_by_chain",
            ChartKind::BadDebt => "bad_debt",
        }
    }

    pub fn file_name(self) -> String {
        format!("chart_{}.png", self.name())
    }

    /// Chart heading for a reporting window of `window_days`.
    pub fn title(self, window_days: u32) -> String {
        let subject = match self {
            ChartKind::DailyLiquidations => "DAILY LIQUIDATION AMOUNTS",
            ChartKind::LiquidationsByChain => "LIQUIDATION VOLUME BY CHAIN",
            ChartKind::BadDebt => "REALIZED BAD DEBT BY CHAIN",
        };
        format!("{} (PAST {} DAYS)", subject, window_days)
    }

    fn height(self) -> u32 {
        match self {
            ChartKind::DailyLiquidations => 760,
            ChartKind::LiquidationsByChain => 700,
            ChartKind::BadDebt => 620,
        }
    }
}

/// A chart written to disk for this run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartArtifact {
    pub kind: ChartKind,
    pub path: PathBuf,
    /// Set when the chart could not be drawn and a placeholder was written instead.
    pub placeholder: bool,
}

/// Renders the report charts into `output_dir`.
pub struct ChartGenerator {
    style: ChartStyle,
    output_dir: PathBuf,
}

impl ChartGenerator {
    pub fn new(style: ChartStyle, output_dir: impl Into<PathBuf>) -> Self {
        register_chart_fonts();
        Self {
            style,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Renders and writes every chart. Only write failures are returned as errors.
    pub fn generate_all(&self, data: &ReportData) -> Result<Vec<ChartArtifact>> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|err| ReportError::write(&self.output_dir, err))?;

        let artifacts = ChartKind::ALL
            .iter()
            .map(|kind| self.generate(*kind, data))
            .collect::<Result<Vec<_>>>()?;

        let placeholders = artifacts.iter().filter(|chart| chart.placeholder).count();
        info!(
            "Generated {} charts in {} ({} placeholders)",
            artifacts.len(),
            self.output_dir.display(),
            placeholders
        );
        Ok(artifacts)
    }

    /// Renders a single chart, falling back to a placeholder when drawing fails.
    pub fn generate(&self, kind: ChartKind, data: &ReportData) -> Result<ChartArtifact> {
        let (bytes, placeholder) = match self.render(kind, data) {
            Ok(bytes) => (bytes, false),
            Err(err) => {
                warn!("{}; writing placeholder", err);
                (self.render_placeholder(kind, data.window_days)?, true)
            }
        };

        let path = self.output_dir.join(kind.file_name());
        fs::write(&path, &bytes).map_err(|err| ReportError::write(&path, err))?;
        Ok(ChartArtifact {
            kind,
            path,
            placeholder,
        })
    }

    /// Draws `kind` and returns the encoded PNG.
    pub fn render(&self, kind: ChartKind, data: &ReportData) -> Result<Vec<u8>> {
        let style = &self.style;
        let heading = kind.title(data.window_days);
        let title = heading.as_str();
        let drawn = match kind {
            ChartKind::DailyLiquidations => {
                let (labels, series) = daily_series(data, style);
                if labels.is_empty() {
                    draw_png(kind.height(), |root| draw_no_data(root, style, title))
                } else {
                    draw_png(kind.height(), |root| {
                        draw_stacked_bars(root, style, title, &labels, &series)
                    })
                }
            }
            ChartKind::LiquidationsByChain => {
                let bars: Vec<Bar> = data
                    .liquidations_by_chain
                    .iter()
                    .enumerate()
                    .map(|(index, chain)| Bar {
                        label: capitalize(&chain.chain),
                        value: chain.volume_usd,
                        color: style.chain_color(&chain.chain, index),
                    })
                    .collect();
                if bars.is_empty() {
                    draw_png(kind.height(), |root| draw_no_data(root, style, title))
                } else {
                    draw_png(kind.height(), |root| {
                        draw_horizontal_bars(root, style, title, bars)
                    })
                }
            }
            ChartKind::BadDebt => match bad_debt_bars(data, style) {
                Some(bars) => draw_png(kind.height(), |root| {
                    draw_horizontal_bars(root, style, title, bars)
                }),
                None => draw_png(kind.height(), |root| {
                    draw_zero_bad_debt(root, style, data.window_days)
                }),
            },
        };

        drawn.map_err(|message| ReportError::Render {
            chart: kind.name().to_string(),
            message,
        })
    }

    fn render_placeholder(&self, kind: ChartKind, window_days: u32) -> Result<Vec<u8>> {
        let style = &self.style;
        let title = kind.title(window_days);
        draw_png(kind.height(), |root| draw_no_data(root, style, &title))
            .or_else(|err| {
                warn!("Placeholder text unavailable for {} ({}); drawing frame only", kind.name(), err);
                draw_png(kind.height(), |root| draw_frame(root, style))
            })
            .map_err(|message| ReportError::Render {
                chart: kind.name().to_string(),
                message,
            })
    }
}

/// Registers the report fonts with the chart text backend once per process.
fn register_chart_fonts() -> bool {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    *REGISTERED.get_or_init(|| {
        let Some((regular, bold)) = fonts::chart_font_bytes() else {
            return false;
        };
        let registered = plotters::style::register_font(FONT, FontStyle::Normal, regular)
            .and_then(|_| plotters::style::register_font(FONT, FontStyle::Bold, bold));
        match registered {
            Ok(()) => true,
            Err(_) => {
                warn!("Chart fonts could not be parsed; charts will be placeholders");
                false
            }
        }
    })
}

#[derive(Debug)]
struct Bar {
    label: String,
    value: f64,
    color: RGBColor,
}

struct Series {
    label: String,
    color: RGBColor,
    values: Vec<f64>,
}

/// Bars for the bad-debt chart, or `None` when nothing was realized in the window.
///
/// When only the summary total is known, the chart shows that total as a single bar.
fn bad_debt_bars(data: &ReportData, style: &ChartStyle) -> Option<Vec<Bar>> {
    if !data.has_bad_debt() {
        return None;
    }
    let bars: Vec<Bar> = data
        .bad_debt_by_chain
        .iter()
        .filter(|chain| chain.amount_usd > 0.0)
        .map(|chain| Bar {
            label: capitalize(&chain.chain),
            value: chain.amount_usd,
            color: style.negative(),
        })
        .collect();
    if !bars.is_empty() {
        return Some(bars);
    }
    Some(vec![Bar {
        label: "All chains".to_string(),
        value: data.total_bad_debt_usd(),
        color: style.negative(),
    }])
}

/// Day labels plus one series per chain, ordered by weekly volume (largest first).
fn daily_series(data: &ReportData, style: &ChartStyle) -> (Vec<String>, Vec<Series>) {
    let mut days: Vec<_> = data.daily_liquidations.iter().map(|entry| entry.day).collect();
    days.sort();
    days.dedup();

    let mut chains: Vec<(String, f64)> = Vec::new();
    for entry in &data.daily_liquidations {
        match chains.iter_mut().find(|(chain, _)| *chain == entry.chain) {
            Some((_, total)) => *total += entry.volume_usd,
            None => chains.push((entry.chain.clone(), entry.volume_usd)),
        }
    }
    chains.sort_by(|(a_name, a), (b_name, b)| b.total_cmp(a).then_with(|| a_name.cmp(b_name)));

    let series = chains
        .into_iter()
        .enumerate()
        .map(|(index, (chain, _))| {
            let values = days
                .iter()
                .map(|day| {
                    data.daily_liquidations
                        .iter()
                        .filter(|entry| entry.day == *day && entry.chain == chain)
                        .map(|entry| entry.volume_usd)
                        .sum()
                })
                .collect();
            Series {
                label: capitalize(&chain),
                color: style.chain_color(&chain, index),
                values,
            }
        })
        .collect();

    let labels = days
        .iter()
        .map(|day| day.format("%b %d").to_string())
        .collect();
    (labels, series)
}

fn draw_png<F>(height: u32, draw: F) -> DrawResult<Vec<u8>>
where
    F: FnOnce(&Canvas<'_>) -> DrawResult<()>,
{
    let mut buffer = vec![0u8; (CHART_WIDTH * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (CHART_WIDTH, height)).into_drawing_area();
        draw(&root)?;
        root.present().map_err(|err| err.to_string())?;
    }
    encode_png(height, buffer)
}

fn encode_png(height: u32, buffer: Vec<u8>) -> DrawResult<Vec<u8>> {
    let image = RgbImage::from_raw(CHART_WIDTH, height, buffer)
        .ok_or_else(|| "chart buffer does not match its dimensions".to_string())?;
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .map_err(|err| err.to_string())?;
    Ok(bytes)
}

fn draw_stacked_bars(
    root: &Canvas<'_>,
    style: &ChartStyle,
    title: &str,
    labels: &[String],
    series: &[Series],
) -> DrawResult<()> {
    root.fill(&style.background()).map_err(|err| err.to_string())?;

    let day_count = labels.len() as f64;
    let peak = (0..labels.len())
        .map(|day| series.iter().map(|s| s.values[day]).sum::<f64>())
        .fold(0.0, f64::max);
    let y_max = if peak > 0.0 { peak * 1.12 } else { 1.0 };

    let mut chart = ChartBuilder::on(root)
        .caption(title, style.title_font())
        .margin(28)
        .x_label_area_size(50)
        .y_label_area_size(120)
        .build_cartesian_2d(0f64..day_count, 0f64..y_max)
        .map_err(|err| err.to_string())?;

    // Day names are drawn under each bar below; the numeric x axis stays unlabeled.
    let blank = |_: &f64| String::new();
    let y_label = |value: &f64| format_usd_axis(*value);

    chart
        .configure_mesh()
        .disable_x_mesh()
        .max_light_lines(0)
        .bold_line_style(style.grid().stroke_width(1))
        .axis_style(style.border().stroke_width(1))
        .set_tick_mark_size(LabelAreaPosition::Bottom, 0)
        .x_label_formatter(&blank)
        .y_label_formatter(&y_label)
        .label_style(style.label_font())
        .draw()
        .map_err(|err| err.to_string())?;

    let day_font = style.label_font().pos(Pos::new(HPos::Center, VPos::Top));
    for (day, label) in labels.iter().enumerate() {
        let (x, y) = chart.backend_coord(&(day as f64 + 0.5, 0.0));
        root.draw(&Text::new(label.as_str(), (x, y + 12), day_font.clone()))
            .map_err(|err| err.to_string())?;
    }

    let mut bottoms = vec![0f64; labels.len()];
    for entry in series {
        let color = entry.color;
        let bars: Vec<_> = entry
            .values
            .iter()
            .enumerate()
            .map(|(day, value)| {
                let bottom = bottoms[day];
                bottoms[day] += value;
                let mut bar = Rectangle::new(
                    [
                        (day as f64, bottom),
                        (day as f64 + 1.0, bottom + value),
                    ],
                    color.filled(),
                );
                bar.set_margin(0, 0, 30, 30);
                bar
            })
            .collect();

        chart
            .draw_series(bars)
            .map_err(|err| err.to_string())?
            .label(entry.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 8), (x + 18, y + 8)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(style.background().mix(0.85).filled())
        .border_style(style.border().stroke_width(1))
        .label_font(style.label_font())
        .draw()
        .map_err(|err| err.to_string())?;

    Ok(())
}

/// Horizontal bars sorted ascending so the largest value sits on top.
fn draw_horizontal_bars(
    root: &Canvas<'_>,
    style: &ChartStyle,
    title: &str,
    mut bars: Vec<Bar>,
) -> DrawResult<()> {
    root.fill(&style.background()).map_err(|err| err.to_string())?;

    bars.sort_by(|a, b| a.value.total_cmp(&b.value).then_with(|| b.label.cmp(&a.label)));
    let peak = bars.iter().map(|bar| bar.value).fold(0.0, f64::max);
    let x_max = if peak > 0.0 { peak * 1.2 } else { 1.0 };
    let count = bars.len() as f64;

    let mut chart = ChartBuilder::on(root)
        .caption(title, style.title_font())
        .margin(28)
        .x_label_area_size(50)
        .y_label_area_size(170)
        .build_cartesian_2d(0f64..x_max, 0f64..count)
        .map_err(|err| err.to_string())?;

    let x_label = |value: &f64| format_usd_axis(*value);
    let blank = |_: &f64| String::new();

    chart
        .configure_mesh()
        .disable_y_mesh()
        .max_light_lines(0)
        .bold_line_style(style.grid().stroke_width(1))
        .axis_style(style.border().stroke_width(1))
        .set_tick_mark_size(LabelAreaPosition::Left, 0)
        .x_label_formatter(&x_label)
        .y_label_formatter(&blank)
        .label_style(style.label_font())
        .draw()
        .map_err(|err| err.to_string())?;

    let name_font = style.label_font().pos(Pos::new(HPos::Right, VPos::Center));
    for (index, bar) in bars.iter().enumerate() {
        let (x, y) = chart.backend_coord(&(0.0, index as f64 + 0.5));
        root.draw(&Text::new(bar.label.as_str(), (x - 14, y), name_font.clone()))
            .map_err(|err| err.to_string())?;
    }

    chart
        .draw_series(bars.iter().enumerate().map(|(index, bar)| {
            let mut rect = Rectangle::new(
                [
                    (0.0, index as f64),
                    (bar.value, index as f64 + 1.0),
                ],
                bar.color.filled(),
            );
            rect.set_margin(14, 14, 0, 0);
            rect
        }))
        .map_err(|err| err.to_string())?;

    let value_font = style.label_font().pos(Pos::new(HPos::Left, VPos::Center));
    chart
        .draw_series(bars.iter().enumerate().map(|(index, bar)| {
            Text::new(
                format_usd(bar.value),
                (bar.value + x_max * 0.015, index as f64 + 0.5),
                value_font.clone(),
            )
        }))
        .map_err(|err| err.to_string())?;

    Ok(())
}

/// Single-figure panel shown when no bad debt was realized.
fn draw_zero_bad_debt(root: &Canvas<'_>, style: &ChartStyle, window_days: u32) -> DrawResult<()> {
    root.fill(&style.background()).map_err(|err| err.to_string())?;
    let (width, height) = root.dim_in_pixel();
    let center_x = width as i32 / 2;

    let figure = (FONT, 120)
        .into_font()
        .style(FontStyle::Bold)
        .color(&style.positive())
        .pos(Pos::new(HPos::Center, VPos::Center));
    root.draw(&Text::new("$0", (center_x, height as i32 * 2 / 5), figure))
        .map_err(|err| err.to_string())?;

    let caption = (FONT, 30)
        .into_font()
        .color(&style.muted())
        .pos(Pos::new(HPos::Center, VPos::Center));
    root.draw(&Text::new(
        format!("Realized Bad Debt (Past {} Days)", window_days),
        (center_x, height as i32 * 13 / 20),
        caption,
    ))
    .map_err(|err| err.to_string())?;

    Ok(())
}

fn draw_no_data(root: &Canvas<'_>, style: &ChartStyle, title: &str) -> DrawResult<()> {
    draw_frame(root, style)?;
    let (width, height) = root.dim_in_pixel();
    let center_x = width as i32 / 2;

    let heading = style.title_font().pos(Pos::new(HPos::Center, VPos::Top));
    root.draw(&Text::new(title, (center_x, 40), heading))
        .map_err(|err| err.to_string())?;

    let message = (FONT, 34)
        .into_font()
        .color(&style.muted())
        .pos(Pos::new(HPos::Center, VPos::Center));
    root.draw(&Text::new(
        "No data available for this period",
        (center_x, height as i32 / 2),
        message,
    ))
    .map_err(|err| err.to_string())?;

    Ok(())
}

/// Background plus a thin border; needs no fonts.
fn draw_frame(root: &Canvas<'_>, style: &ChartStyle) -> DrawResult<()> {
    root.fill(&style.background()).map_err(|err| err.to_string())?;
    let (width, height) = root.dim_in_pixel();
    root.draw(&Rectangle::new(
        [(8, 8), (width as i32 - 8, height as i32 - 8)],
        style.border().stroke_width(2),
    ))
    .map_err(|err| err.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{fetch_all, SampleSource};
    use crate::config::ReportConfig;
    use crate::metrics::WeeklySummary;
    use chrono::{NaiveDate, TimeZone, Utc};
    use image::GenericImageView;

    fn sample_data() -> ReportData {
        let config = ReportConfig::default();
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 17).unwrap();
        let results = fetch_all(&SampleSource::new(as_of), &config.queries).unwrap();
        ReportData::from_results(&results, Utc.with_ymd_and_hms(2024, 6, 17, 9, 0, 0).unwrap(), 7)
    }

    #[test]
    fn daily_series_orders_chains_by_volume() {
        let (labels, series) = daily_series(&sample_data(), &ChartStyle::default());
        assert_eq!(labels.len(), 7);
        assert_eq!(labels[6], "Jun 17");
        let totals: Vec<f64> = series.iter().map(|s| s.values.iter().sum()).collect();
        assert!(totals.windows(2).all(|pair| pair[0] >= pair[1]));

        let data = sample_data();
        let largest = data
            .daily_liquidations
            .iter()
            .map(|candidate| {
                let weekly: f64 = data
                    .daily_liquidations
                    .iter()
                    .filter(|entry| entry.chain == candidate.chain)
                    .map(|entry| entry.volume_usd)
                    .sum();
                (weekly, candidate.chain.as_str())
            })
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, chain)| capitalize(chain))
            .unwrap();
        assert_eq!(series[0].label, largest);
    }

    #[test]
    fn titles_follow_the_reporting_window() {
        assert_eq!(
            ChartKind::BadDebt.title(7),
            "REALIZED BAD DEBT BY CHAIN (PAST 7 DAYS)"
        );
        assert_eq!(
            ChartKind::DailyLiquidations.title(14),
            "DAILY LIQUIDATION AMOUNTS (PAST 14 DAYS)"
        );
    }

    #[test]
    fn zero_bad_debt_uses_the_panel() {
        let mut data = sample_data();
        data.bad_debt_by_chain.clear();
        if let Some(summary) = data.summary.as_mut() {
            summary.total_bad_debt_usd = 0.0;
        }
        assert!(bad_debt_bars(&data, &ChartStyle::default()).is_none());
    }

    #[test]
    fn summary_only_bad_debt_is_drawn_as_one_bar() {
        let mut data = sample_data();
        data.bad_debt_by_chain.clear();
        data.summary = Some(WeeklySummary {
            total_liquidated_usd: 1_000_000.0,
            total_bad_debt_usd: 5_000.0,
            positions: 10,
            markets: 4,
            chains: 2,
        });

        let bars = bad_debt_bars(&data, &ChartStyle::default()).expect("bad debt was realized");
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].label, "All chains");
        assert_eq!(bars[0].value, 5_000.0);
    }

    #[test]
    fn every_chart_kind_renders_from_sample_data() {
        if !register_chart_fonts() {
            eprintln!("skipping: chart fonts not available");
            return;
        }
        let data = sample_data();
        let generator = ChartGenerator::new(ChartStyle::default(), std::env::temp_dir());
        for kind in ChartKind::ALL {
            let bytes = generator
                .render(kind, &data)
                .unwrap_or_else(|err| panic!("{} failed to render: {}", kind.name(), err));
            let image = image::load_from_memory(&bytes).unwrap();
            assert_eq!(image.width(), CHART_WIDTH, "{}", kind.name());
        }
    }

    #[test]
    fn single_day_and_single_chain_render() {
        if !register_chart_fonts() {
            return;
        }
        let mut data = sample_data();
        let last_day = data.daily_liquidations.iter().map(|entry| entry.day).max().unwrap();
        data.daily_liquidations.retain(|entry| entry.day == last_day);
        data.liquidations_by_chain.truncate(1);
        let generator = ChartGenerator::new(ChartStyle::default(), std::env::temp_dir());
        generator.render(ChartKind::DailyLiquidations, &data).unwrap();
        generator.render(ChartKind::LiquidationsByChain, &data).unwrap();
    }

    #[test]
    fn chain_colours_come_from_palette() {
        let style = ChartStyle::default();
        assert_eq!(style.chain_color("ethereum", 0), RGBColor(0x4A, 0x7C, 0xBA));
        assert_eq!(style.chain_color("Hyperevm", 0), RGBColor(0x1A, 0xBC, 0x9C));
    }

    #[test]
    fn empty_data_still_produces_every_chart() {
        let dir = tempfile::tempdir().unwrap();
        let data = ReportData::from_results(&[], Utc.with_ymd_and_hms(2024, 6, 17, 9, 0, 0).unwrap(), 7);
        let charts = ChartGenerator::new(ChartStyle::default(), dir.path())
            .generate_all(&data)
            .expect("charts never fail on empty input");
        assert_eq!(charts.len(), ChartKind::ALL.len());
        for chart in &charts {
            let bytes = fs::read(&chart.path).unwrap();
            assert!(bytes.starts_with(b"\x89PNG"), "{} is not a PNG", chart.path.display());
        }
    }

    #[test]
    fn frame_placeholder_needs_no_fonts() {
        let bytes = draw_png(200, |root| draw_frame(root, &ChartStyle::default())).unwrap();
        let image = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (CHART_WIDTH, 200));
        assert_eq!(image.get_pixel(100, 100).0, [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn rendering_is_deterministic() {
        let data = sample_data();
        let generator = ChartGenerator::new(ChartStyle::default(), std::env::temp_dir());
        for kind in ChartKind::ALL {
            let first = generator
                .render(kind, &data)
                .or_else(|_| generator.render_placeholder(kind, data.window_days))
                .unwrap();
            let second = generator
                .render(kind, &data)
                .or_else(|_| generator.render_placeholder(kind, data.window_days))
                .unwrap();
            assert_eq!(first, second, "{} differs between renders", kind.name());
        }
    }
}
