//! Turns the [`crate::model`] description of the report into PDF bytes with `genpdf`.

use genpdf::elements::{Break, FrameCellDecorator, Paragraph, TableLayout};
use genpdf::error::{Error, ErrorKind};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{self, Alignment, Element, Margins, Mm, PageDecorator, Position, Size};
use log::debug;

use crate::config::Palette;
use crate::elements::{
    mm_from_f64, CaptionedImage, HorizontalRule, PageCounter, PageSlot, SectionHeading,
    UnderlinedText,
};
use crate::error::{ReportError, Result};
use crate::fonts;
use crate::model::{
    Block, HorizontalAlignment, RichParagraph, Section, TableBlock, TextSize, TitleBlock,
};
use crate::richtext::StyledSpan;

/// Font sizes and colours applied when rendering the model.
#[derive(Clone, Debug)]
pub struct Theme {
    pub body_size: u8,
    pub small_size: u8,
    pub large_size: u8,
    pub table_size: u8,
    pub heading_size: u8,
    pub title_size: u8,
    pub subtitle_size: u8,
    pub text: Color,
    pub muted: Color,
    pub heading: Color,
    pub rule: Color,
    /// Width of images that do not request one.
    pub image_width_mm: f64,
}

impl Theme {
    pub fn from_palette(palette: &Palette) -> Self {
        Self {
            body_size: 10,
            small_size: 8,
            large_size: 11,
            table_size: 9,
            heading_size: 16,
            title_size: 24,
            subtitle_size: 12,
            text: palette.text.into(),
            muted: palette.text_muted.into(),
            heading: palette.accent.into(),
            rule: palette.border.into(),
            image_width_mm: 170.0,
        }
    }

    fn text_size(&self, size: TextSize) -> u8 {
        match size {
            TextSize::Small => self.small_size,
            TextSize::Body => self.body_size,
            TextSize::Large => self.large_size,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_palette(&Palette::default())
    }
}

type HeaderFactory = dyn Fn(usize) -> Box<dyn Element>;

/// Builder for `genpdf::Document` instances with margins, header, and footer.
#[derive(Default)]
pub struct DocumentBuilder {
    title: Option<String>,
    paper_size: Option<Size>,
    margins: Option<Margins>,
    font_size: Option<u8>,
    header: Option<Box<HeaderFactory>>,
    footer: Option<FooterSpec>,
    pages: PageCounter,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title stored in the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = Some(paper_size.into());
        self
    }

    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    pub fn with_font_size(mut self, font_size: u8) -> Self {
        self.font_size = Some(font_size);
        self
    }

    /// Configures a header callback invoked with the 1-based page number.
    pub fn with_header<F, E>(mut self, header: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        self.header = Some(Box::new(move |page| {
            Box::new(header(page)) as Box<dyn Element>
        }));
        self
    }

    /// Configures a footer with a fixed height, invoked with the 1-based page number.
    pub fn with_footer<F, E>(mut self, height: impl Into<Mm>, footer: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        self.footer = Some(FooterSpec::new(height, footer));
        self
    }

    /// Counter the page decorator advances; elements read it to learn their page.
    pub fn page_counter(&self) -> PageCounter {
        self.pages.clone()
    }

    /// Loads the report fonts and builds the configured document.
    pub fn build(self) -> Result<genpdf::Document> {
        let font_family = fonts::default_font_family().map_err(ReportError::Fonts)?;
        let mut document = genpdf::Document::new(font_family);

        if let Some(title) = self.title {
            document.set_title(title);
        }
        if let Some(paper_size) = self.paper_size {
            document.set_paper_size(paper_size);
        }
        if let Some(font_size) = self.font_size {
            document.set_font_size(font_size);
        }

        document.set_page_decorator(ConfiguredPageDecorator {
            pages: self.pages,
            margins: self.margins,
            header: self.header,
            footer: self.footer,
        });

        Ok(document)
    }
}

/// Footer element factory plus the height reserved for it at the bottom of every page.
pub struct FooterSpec {
    height: Mm,
    factory: Box<HeaderFactory>,
}

impl FooterSpec {
    pub fn new<F, E>(height: impl Into<Mm>, factory: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        Self {
            height: height.into(),
            factory: Box::new(move |page| Box::new(factory(page)) as Box<dyn Element>),
        }
    }
}

struct ConfiguredPageDecorator {
    pages: PageCounter,
    margins: Option<Margins>,
    header: Option<Box<HeaderFactory>>,
    footer: Option<FooterSpec>,
}

impl PageDecorator for ConfiguredPageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: genpdf::render::Area<'a>,
        style: Style,
    ) -> std::result::Result<genpdf::render::Area<'a>, Error> {
        let page = self.pages.advance();

        if let Some(margins) = self.margins {
            area.add_margins(margins);
        }

        if let Some(header_cb) = &self.header {
            let mut element = header_cb(page);
            let result = element.render(context, area.clone(), style)?;
            area.add_offset(Position::new(0, result.size.height));
        }

        if let Some(footer) = &self.footer {
            let available = area.size().height;
            if footer.height > available {
                return Err(Error::new(
                    "Footer height exceeds available space",
                    ErrorKind::InvalidData,
                ));
            }

            let mut footer_area = area.clone();
            footer_area.add_offset(Position::new(0, available - footer.height));
            let mut element = (footer.factory)(page);
            let result = element.render(context, footer_area, style)?;
            if result.has_more {
                return Err(Error::new(
                    "Footer element does not fit into the reserved space",
                    ErrorKind::PageSizeExceeded,
                ));
            }

            area.set_height(available - footer.height);
        }

        Ok(area)
    }
}

/// Rendered document plus the page each section heading landed on.
#[derive(Clone, Debug)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    /// 1-based start page per section, in section order; `None` if the heading never rendered.
    pub section_pages: Vec<Option<usize>>,
}

/// Assembles a title block and sections into a PDF.
#[derive(Default)]
pub struct PdfBuilder {
    document: DocumentBuilder,
    theme: Theme,
    title_block: Option<TitleBlock>,
    sections: Vec<Section>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the page-level settings (paper, margins, header, footer).
    pub fn with_document(mut self, document: DocumentBuilder) -> Self {
        self.document = document;
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_title_block(mut self, title_block: TitleBlock) -> Self {
        self.title_block = Some(title_block);
        self
    }

    pub fn add_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Renders the document to bytes.
    pub fn render(self) -> Result<RenderedPdf> {
        let Self {
            document,
            theme,
            title_block,
            sections,
        } = self;

        let pages = document.page_counter();
        let mut document = document.build()?;

        if let Some(title_block) = &title_block {
            push_title_block(&mut document, title_block, &theme)?;
        }

        let mut slots: Vec<PageSlot> = Vec::with_capacity(sections.len());
        for section in &sections {
            let heading = Paragraph::new(StyledString::new(
                section.title().to_string(),
                Style::new()
                    .bold()
                    .with_font_size(theme.heading_size)
                    .with_color(theme.heading),
            ));
            let (heading, slot) = SectionHeading::new(heading, pages.clone());
            document.push(Break::new(0.6));
            document.push(heading.padded(Margins::trbl(0, 0, 2, 0)));
            slots.push(slot);

            for block in section.blocks() {
                push_block(&mut document, block, &theme)?;
            }
        }

        let mut bytes = Vec::new();
        document.render(&mut bytes)?;
        let section_pages: Vec<Option<usize>> = slots.iter().map(PageSlot::get).collect();
        debug!(
            "Rendered PDF: {} bytes, {} pages, section pages {:?}",
            bytes.len(),
            pages.current(),
            section_pages
        );

        Ok(RenderedPdf {
            bytes,
            section_pages,
        })
    }

    /// Renders the document and adds a PDF outline entry for each section.
    #[cfg(feature = "bookmarks")]
    pub fn render_with_bookmarks(self) -> Result<RenderedPdf> {
        let sections = self.sections.clone();
        let rendered = self.render()?;
        let bytes = crate::bookmarks::apply_section_bookmarks(
            &rendered.bytes,
            &sections,
            &rendered.section_pages,
        )?;
        Ok(RenderedPdf {
            bytes,
            section_pages: rendered.section_pages,
        })
    }
}

fn push_title_block(
    document: &mut genpdf::Document,
    title_block: &TitleBlock,
    theme: &Theme,
) -> Result<()> {
    document.push(Paragraph::new(StyledString::new(
        title_block.title().to_string(),
        Style::new()
            .bold()
            .with_font_size(theme.title_size)
            .with_color(theme.text),
    )));
    if let Some(subtitle) = title_block.subtitle() {
        document.push(
            Paragraph::new(StyledString::new(
                subtitle.to_string(),
                Style::new()
                    .with_font_size(theme.subtitle_size)
                    .with_color(theme.muted),
            ))
            .padded(Margins::trbl(1, 0, 2, 0)),
        );
    }
    for block in title_block.blocks() {
        push_block(document, block, theme)?;
    }
    Ok(())
}

fn push_block(document: &mut genpdf::Document, block: &Block, theme: &Theme) -> Result<()> {
    match block {
        Block::Paragraph(paragraph) => {
            let style = Style::new()
                .with_font_size(theme.text_size(paragraph.size()))
                .with_color(theme.text);
            let margins = Margins::trbl(
                mm_from_f64(0.0),
                mm_from_f64(0.0),
                mm_from_f64(1.5),
                mm_from_f64(paragraph.indent_mm()),
            );
            if paragraph.has_underline() {
                let spans: Vec<StyledSpan> = paragraph.spans().iter().map(StyledSpan::from).collect();
                document.push(
                    UnderlinedText::new(spans)
                        .with_alignment(paragraph.alignment().into())
                        .styled(style)
                        .padded(margins),
                );
            } else {
                document.push(paragraph_element(paragraph).styled(style).padded(margins));
            }
        }
        Block::Image(image) => {
            let caption = image.caption().map(paragraph_element);
            let width = image.width_mm().unwrap_or(theme.image_width_mm);
            let element = CaptionedImage::from_path(image.path())?
                .with_caption(caption)
                .with_alignment(image.alignment().into())
                .with_width(mm_from_f64(width));
            document.push(element.padded(Margins::trbl(1, 0, 2, 0)));
        }
        Block::Table(table) => {
            let element = table_element(table, theme)?;
            document.push(
                element
                    .styled(Style::new().with_font_size(theme.table_size).with_color(theme.text))
                    .padded(Margins::trbl(1, 0, 3, 0)),
            );
        }
        Block::Rule => document.push(HorizontalRule::new(theme.rule)),
        Block::Spacer(lines) => document.push(Break::new(*lines)),
    }
    Ok(())
}

fn paragraph_element(paragraph: &RichParagraph) -> Paragraph {
    let mut element = Paragraph::default();
    for span in paragraph.spans() {
        element.push(span.to_styled_string());
    }
    element.set_alignment(paragraph.alignment().into());
    element
}

fn cell(paragraph: Paragraph, alignment: HorizontalAlignment) -> impl Element {
    let mut paragraph = paragraph;
    paragraph.set_alignment(Alignment::from(alignment));
    paragraph.padded(Margins::trbl(1, 2, 1, 2))
}

fn table_element(table: &TableBlock, theme: &Theme) -> Result<TableLayout> {
    let weights = table.columns().iter().map(|column| column.weight.max(1)).collect();
    let mut layout = TableLayout::new(weights);
    layout.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    let header_style = if table.header_muted() {
        Style::new().with_color(theme.muted)
    } else {
        Style::new().bold().with_color(theme.heading)
    };
    let mut header = layout.row();
    for column in table.columns() {
        let title = Paragraph::new(StyledString::new(column.title.clone(), header_style));
        header.push_element(cell(title, column.alignment));
    }
    header.push()?;

    if table.rows().is_empty() {
        let mut row = layout.row();
        for (index, column) in table.columns().iter().enumerate() {
            let text = if index == 0 { table.empty_message() } else { "" };
            let message = Paragraph::new(StyledString::new(
                text.to_string(),
                Style::new().italic().with_color(theme.muted),
            ));
            row.push_element(cell(message, column.alignment));
        }
        row.push()?;
    }

    for cells in table.rows() {
        let mut row = layout.row();
        for (paragraph, column) in cells.iter().zip(table.columns()) {
            row.push_element(cell(paragraph_element(paragraph), column.alignment));
        }
        row.push()?;
    }

    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::Span;

    #[test]
    fn theme_uses_palette_colours() {
        let palette = Palette::default();
        let theme = Theme::from_palette(&palette);
        assert_eq!(theme.heading, Color::Rgb(0x4A, 0x7C, 0xBA));
        assert_eq!(theme.text_size(TextSize::Small), theme.small_size);
        assert!(theme.title_size > theme.heading_size);
    }

    #[test]
    fn missing_fonts_surface_as_font_errors() {
        if fonts::default_fonts_available() {
            return;
        }
        let err = PdfBuilder::new()
            .add_section(Section::new("Empty").with_block(Block::paragraph(vec![Span::new("x")])))
            .render()
            .unwrap_err();
        assert!(matches!(err, ReportError::Fonts(_)));
    }
}
