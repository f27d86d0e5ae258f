//! Custom `genpdf` elements used by the report layout.
//!
//! `genpdf` ships paragraphs, tables, and images; the report additionally needs captioned chart
//! images scaled to a fixed width, underlined link text, horizontal rules, header/footer lines
//! with a left and a right part, and section headings that remember the page they landed on.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use image::GenericImageView;

use genpdf::elements::{Image, Paragraph};
use genpdf::error::{Context as _, Error};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{render, Alignment, Element, Mm, Position, RenderResult, Scale, Size};

use crate::richtext::StyledSpan;

const DEFAULT_IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;
const CAPTION_SPACING_MM: f64 = 2.0;
const UNDERLINE_OFFSET_MM: f64 = 0.4;

pub(crate) fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

pub(crate) fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

fn estimated_image_size(image: &image::DynamicImage, dpi: f64) -> Size {
    let (px_width, px_height) = image.dimensions();
    let width_mm = MM_PER_INCH * (px_width as f64) / dpi;
    let height_mm = MM_PER_INCH * (px_height as f64) / dpi;
    Size::new(mm_from_f64(width_mm), mm_from_f64(height_mm))
}

/// Loads an image file with descriptive errors.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<image::DynamicImage, Error> {
    let path = path.as_ref();
    let reader = image::io::Reader::open(path)
        .with_context(|| format!("Failed to open image file {}", path.display()))?;
    reader
        .with_guessed_format()
        .context("Unable to determine image format")?
        .decode()
        .with_context(|| format!("Failed to decode image file {}", path.display()))
}

/// A chart image scaled to a requested width, with an optional caption underneath.
pub struct CaptionedImage {
    image: Image,
    caption: Option<Paragraph>,
    alignment: Alignment,
    natural_size: Size,
    requested_width: Option<Mm>,
    spacing: Mm,
}

impl CaptionedImage {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let dynamic = decode_image_from_path(path)?;
        let natural_size = estimated_image_size(&dynamic, DEFAULT_IMAGE_DPI);
        let image = Image::from_dynamic_image(dynamic)?;
        Ok(Self {
            image,
            caption: None,
            alignment: Alignment::Center,
            natural_size,
            requested_width: None,
            spacing: mm_from_f64(CAPTION_SPACING_MM),
        })
    }

    pub fn with_caption(mut self, caption: Option<Paragraph>) -> Self {
        self.caption = caption;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Constrains the rendered width while preserving the aspect ratio.
    pub fn with_width(mut self, width: impl Into<Option<Mm>>) -> Self {
        self.requested_width = width.into();
        self
    }

    fn apply_layout(&mut self) {
        self.image.set_alignment(self.alignment);
        if let Some(caption) = self.caption.as_mut() {
            caption.set_alignment(self.alignment);
        }

        let natural = mm_to_f64(self.natural_size.width);
        let scale = match self.requested_width {
            Some(width) if natural > f64::EPSILON => mm_to_f64(width) / natural,
            _ => 1.0,
        };
        self.image.set_scale(Scale::new(scale, scale));
    }
}

impl Element for CaptionedImage {
    fn render(
        &mut self,
        context: &genpdf::Context,
        mut area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        self.apply_layout();

        let mut result = self.image.render(context, area.clone(), style)?;
        let Some(caption) = self.caption.as_mut() else {
            return Ok(result);
        };

        area.add_offset(Position::new(0, result.size.height + self.spacing));
        result.size = result.size.stack_vertical(Size::new(0, self.spacing));

        let caption_result = caption.render(context, area, style)?;
        result.size = result.size.stack_vertical(caption_result.size);
        result.has_more |= caption_result.has_more;
        Ok(result)
    }
}

struct PreparedSpan {
    string: StyledString,
    underline: bool,
    width: Mm,
}

/// Measures `spans` under `style`, returning them with their widths plus the line metrics.
fn prepare_spans(
    context: &genpdf::Context,
    spans: &[StyledSpan],
    style: Style,
) -> (Vec<PreparedSpan>, Mm, Mm, Mm) {
    let mut prepared = Vec::with_capacity(spans.len());
    let mut total_width = Mm::default();
    let mut line_height = style.line_height(&context.font_cache);
    let mut glyph_height = Mm::default();

    for span in spans {
        let mut string = span.string.clone();
        string.style = style.and(string.style);
        let width = string.width(&context.font_cache);
        total_width += width;
        line_height = line_height.max(string.style.line_height(&context.font_cache));
        glyph_height = glyph_height.max(
            string
                .style
                .font(&context.font_cache)
                .glyph_height(string.style.font_size()),
        );
        prepared.push(PreparedSpan {
            string,
            underline: span.underline,
            width,
        });
    }

    (prepared, total_width, line_height, glyph_height)
}

fn print_spans(
    context: &genpdf::Context,
    area: &render::Area<'_>,
    x: Mm,
    spans: &[PreparedSpan],
    style: Style,
) -> Result<bool, Error> {
    match area.text_section(&context.font_cache, Position::new(x, 0), style) {
        Some(mut section) => {
            for span in spans {
                section.print_str(&span.string.s, span.string.style)?;
            }
            Ok(true)
        }
        None => Ok(false),
    }
}

/// A single line of styled text whose underlined spans get a thin stroke beneath them.
pub struct UnderlinedText {
    spans: Vec<StyledSpan>,
    alignment: Alignment,
}

impl UnderlinedText {
    pub fn new(spans: Vec<StyledSpan>) -> Self {
        Self {
            spans,
            alignment: Alignment::Left,
        }
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }
}

impl Element for UnderlinedText {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        let (prepared, total_width, line_height, glyph_height) =
            prepare_spans(context, &self.spans, style);

        if line_height > area.size().height {
            result.has_more = true;
            return Ok(result);
        }

        let available = area.size().width;
        let x_offset = match self.alignment {
            Alignment::Left => Mm::default(),
            Alignment::Center => (available - total_width) / 2.0,
            Alignment::Right => available - total_width,
        };

        if !print_spans(context, &area, x_offset, &prepared, style)? {
            result.has_more = true;
            return Ok(result);
        }

        let baseline = glyph_height + mm_from_f64(UNDERLINE_OFFSET_MM);
        let mut cursor = x_offset;
        for span in &prepared {
            if span.underline {
                let mut line_style = Style::new();
                if let Some(color) = span.string.style.color().or(style.color()) {
                    line_style = line_style.with_color(color);
                }
                area.draw_line(
                    vec![
                        Position::new(cursor, baseline),
                        Position::new(cursor + span.width, baseline),
                    ],
                    line_style,
                );
            }
            cursor += span.width;
        }

        result.size = Size::new(total_width, line_height);
        Ok(result)
    }
}

/// One line with left-aligned and right-aligned text, used for page headers and footers.
pub struct SplitLine {
    left: Vec<StyledSpan>,
    right: Vec<StyledSpan>,
}

impl SplitLine {
    pub fn new(left: Vec<StyledSpan>, right: Vec<StyledSpan>) -> Self {
        Self { left, right }
    }
}

impl Element for SplitLine {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        let (left, _, left_height, _) = prepare_spans(context, &self.left, style);
        let (right, right_width, right_height, _) = prepare_spans(context, &self.right, style);
        let line_height = left_height.max(right_height);

        if line_height > area.size().height {
            result.has_more = true;
            return Ok(result);
        }

        let right_x = area.size().width - right_width;
        if !print_spans(context, &area, Mm::default(), &left, style)?
            || !print_spans(context, &area, right_x, &right, style)?
        {
            result.has_more = true;
            return Ok(result);
        }

        result.size = Size::new(area.size().width, line_height);
        Ok(result)
    }
}

/// Full-width horizontal line with space above and below.
pub struct HorizontalRule {
    color: Color,
    space_above: Mm,
    space_below: Mm,
}

impl HorizontalRule {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            space_above: mm_from_f64(1.5),
            space_below: mm_from_f64(3.0),
        }
    }

    pub fn with_spacing(mut self, above_mm: f64, below_mm: f64) -> Self {
        self.space_above = mm_from_f64(above_mm);
        self.space_below = mm_from_f64(below_mm);
        self
    }
}

impl Element for HorizontalRule {
    fn render(
        &mut self,
        _context: &genpdf::Context,
        area: render::Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        let height = self.space_above + self.space_below;
        if height > area.size().height {
            result.has_more = true;
            return Ok(result);
        }

        area.draw_line(
            vec![
                Position::new(0, self.space_above),
                Position::new(area.size().width, self.space_above),
            ],
            Style::new().with_color(self.color),
        );
        result.size = Size::new(area.size().width, height);
        Ok(result)
    }
}

/// Page number shared between the page decorator and elements that need to know it.
#[derive(Clone, Debug, Default)]
pub struct PageCounter(Rc<Cell<usize>>);

impl PageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1-based number of the page currently being laid out; 0 before the first page.
    pub fn current(&self) -> usize {
        self.0.get()
    }

    pub(crate) fn advance(&self) -> usize {
        let next = self.0.get() + 1;
        self.0.set(next);
        next
    }
}

/// Records the page on which a section heading was actually placed.
#[derive(Clone, Debug, Default)]
pub struct PageSlot(Rc<Cell<Option<usize>>>);

impl PageSlot {
    pub fn get(&self) -> Option<usize> {
        self.0.get()
    }
}

/// Section heading paragraph that fills a [`PageSlot`] the first time it is drawn.
pub struct SectionHeading {
    heading: Paragraph,
    counter: PageCounter,
    slot: PageSlot,
}

impl SectionHeading {
    pub fn new(heading: Paragraph, counter: PageCounter) -> (Self, PageSlot) {
        let slot = PageSlot::default();
        let element = Self {
            heading,
            counter,
            slot: slot.clone(),
        };
        (element, slot)
    }
}

impl Element for SectionHeading {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let result = self.heading.render(context, area, style)?;
        if self.slot.get().is_none() && result.size.height > Mm::default() {
            self.slot.0.set(Some(self.counter.current()));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mm_conversions_round_trip() {
        assert!((mm_to_f64(mm_from_f64(12.5)) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn page_counter_is_shared() {
        let counter = PageCounter::new();
        let shared = counter.clone();
        assert_eq!(counter.current(), 0);
        shared.advance();
        shared.advance();
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn slot_starts_empty() {
        let (_, slot) = SectionHeading::new(Paragraph::new("1. Liquidations"), PageCounter::new());
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn missing_image_is_reported() {
        let err = CaptionedImage::from_path("/nonexistent/chart.png")
            .err()
            .expect("missing file fails");
        assert!(err.to_string().contains("chart.png"));
    }
}
