//! Logical content of the report document.
//!
//! These types describe *what* goes into the PDF without touching `genpdf`, so the report
//! layout can be assembled and inspected in tests without fonts. [`crate::builder`] turns them
//! into rendered pages.

use std::path::PathBuf;

use crate::richtext::{plain_text, Span};

/// Horizontal placement of text and images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalAlignment {
    #[default]
    Left,
    Center,
    Right,
}

impl From<HorizontalAlignment> for genpdf::Alignment {
    fn from(alignment: HorizontalAlignment) -> Self {
        match alignment {
            HorizontalAlignment::Left => genpdf::Alignment::Left,
            HorizontalAlignment::Center => genpdf::Alignment::Center,
            HorizontalAlignment::Right => genpdf::Alignment::Right,
        }
    }
}

/// Relative text size of a paragraph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextSize {
    Small,
    #[default]
    Body,
    Large,
}

/// A paragraph of styled spans.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RichParagraph {
    spans: Vec<Span>,
    alignment: HorizontalAlignment,
    size: TextSize,
    indent_mm: f64,
}

impl RichParagraph {
    pub fn new(spans: impl Into<Vec<Span>>) -> Self {
        Self {
            spans: spans.into(),
            ..Self::default()
        }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn alignment(&self) -> HorizontalAlignment {
        self.alignment
    }

    pub fn size(&self) -> TextSize {
        self.size
    }

    pub fn indent_mm(&self) -> f64 {
        self.indent_mm
    }

    /// Whether any span needs a hand-drawn underline.
    pub fn has_underline(&self) -> bool {
        self.spans.iter().any(Span::is_underlined)
    }

    pub fn text(&self) -> String {
        plain_text(&self.spans)
    }

    pub fn with_alignment(mut self, alignment: HorizontalAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_size(mut self, size: TextSize) -> Self {
        self.size = size;
        self
    }

    pub fn with_indent_mm(mut self, indent_mm: f64) -> Self {
        self.indent_mm = indent_mm;
        self
    }
}

impl From<Vec<Span>> for RichParagraph {
    fn from(spans: Vec<Span>) -> Self {
        Self::new(spans)
    }
}

/// A PNG on disk, optionally captioned, scaled to a fixed width.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlock {
    path: PathBuf,
    caption: Option<RichParagraph>,
    alignment: HorizontalAlignment,
    width_mm: Option<f64>,
}

impl ImageBlock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            caption: None,
            alignment: HorizontalAlignment::Center,
            width_mm: None,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn caption(&self) -> Option<&RichParagraph> {
        self.caption.as_ref()
    }

    pub fn alignment(&self) -> HorizontalAlignment {
        self.alignment
    }

    pub fn width_mm(&self) -> Option<f64> {
        self.width_mm
    }

    pub fn with_caption(mut self, caption: impl Into<Option<RichParagraph>>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn with_width_mm(mut self, width_mm: impl Into<Option<f64>>) -> Self {
        self.width_mm = width_mm.into();
        self
    }
}

/// Column definition of a [`TableBlock`].
#[derive(Clone, Debug, PartialEq)]
pub struct TableColumn {
    pub title: String,
    /// Relative width; `genpdf` distributes the page width by these weights.
    pub weight: usize,
    pub alignment: HorizontalAlignment,
}

impl TableColumn {
    pub fn new(title: impl Into<String>, weight: usize) -> Self {
        Self {
            title: title.into(),
            weight,
            alignment: HorizontalAlignment::Left,
        }
    }

    pub fn right(mut self) -> Self {
        self.alignment = HorizontalAlignment::Right;
        self
    }

    pub fn centered(mut self) -> Self {
        self.alignment = HorizontalAlignment::Center;
        self
    }
}

/// A framed table with a header row.
///
/// Tables without rows render a single row holding `empty_message` so the reader sees that the
/// data was checked rather than silently missing.
#[derive(Clone, Debug, PartialEq)]
pub struct TableBlock {
    columns: Vec<TableColumn>,
    rows: Vec<Vec<RichParagraph>>,
    empty_message: String,
    header_muted: bool,
}

impl TableBlock {
    pub fn new(columns: Vec<TableColumn>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            empty_message: "No data available".to_string(),
            header_muted: false,
        }
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<RichParagraph>] {
        &self.rows
    }

    pub fn empty_message(&self) -> &str {
        &self.empty_message
    }

    /// Whether the header row uses the muted label style instead of the accent heading style.
    pub fn header_muted(&self) -> bool {
        self.header_muted
    }

    /// Appends a row; missing cells are padded with blanks and surplus cells dropped.
    pub fn with_row<I, C>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<RichParagraph>,
    {
        let mut row: Vec<RichParagraph> = cells
            .into_iter()
            .take(self.columns.len())
            .map(Into::into)
            .collect();
        row.resize_with(self.columns.len(), RichParagraph::default);
        self.rows.push(row);
        self
    }

    pub fn with_empty_message(mut self, message: impl Into<String>) -> Self {
        self.empty_message = message.into();
        self
    }

    pub fn with_muted_header(mut self) -> Self {
        self.header_muted = true;
        self
    }
}

/// Content blocks that make up sections and the title block.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Paragraph(RichParagraph),
    Image(ImageBlock),
    Table(TableBlock),
    /// Full-width horizontal line.
    Rule,
    /// Vertical gap measured in text lines.
    Spacer(f64),
}

impl Block {
    pub fn paragraph(paragraph: impl Into<RichParagraph>) -> Self {
        Self::Paragraph(paragraph.into())
    }

    pub fn image(image: ImageBlock) -> Self {
        Self::Image(image)
    }

    pub fn table(table: TableBlock) -> Self {
        Self::Table(table)
    }
}

/// Report title, subtitle, and the blocks printed before the first section.
#[derive(Clone, Debug, PartialEq)]
pub struct TitleBlock {
    title: String,
    subtitle: Option<String>,
    blocks: Vec<Block>,
}

impl TitleBlock {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            blocks: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<Option<String>>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }
}

/// A titled section; the title doubles as the bookmark label.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    identifier: Option<String>,
    title: String,
    blocks: Vec<Block>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            identifier: None,
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn with_identifier(mut self, identifier: impl Into<Option<String>>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_blocks<I>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = Block>,
    {
        self.blocks.extend(blocks);
        self
    }

    /// Tables contained in this section, in order.
    pub fn tables(&self) -> impl Iterator<Item = &TableBlock> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_are_normalised_to_column_count() {
        let table = TableBlock::new(vec![
            TableColumn::new("Chain", 3),
            TableColumn::new("Volume", 2).right(),
        ])
        .with_row(vec![RichParagraph::new(vec![Span::new("Base")])])
        .with_row(vec![
            RichParagraph::new(vec![Span::new("Ethereum")]),
            RichParagraph::new(vec![Span::new("$1.2M")]),
            RichParagraph::new(vec![Span::new("extra")]),
        ]);

        assert_eq!(table.rows().len(), 2);
        assert!(table.rows().iter().all(|row| row.len() == 2));
        assert_eq!(table.rows()[0][1].text(), "");
        assert_eq!(table.rows()[1][1].text(), "$1.2M");
    }

    #[test]
    fn section_lists_its_tables() {
        let section = Section::new("1. Liquidations & Bad Debt")
            .with_block(Block::paragraph(vec![Span::new("intro")]))
            .with_block(Block::table(
                TableBlock::new(vec![TableColumn::new("Chain", 1)])
                    .with_empty_message("No data available"),
            ))
            .with_block(Block::Rule);

        let tables: Vec<_> = section.tables().collect();
        assert_eq!(tables.len(), 1);
        assert!(tables[0].rows().is_empty());
        assert_eq!(tables[0].empty_message(), "No data available");
    }

    #[test]
    fn underline_detection() {
        let paragraph = RichParagraph::new(vec![
            Span::new("• "),
            Span::new("Morpho Risk Dashboard").underline(),
        ]);
        assert!(paragraph.has_underline());
        assert_eq!(paragraph.text(), "• Morpho Risk Dashboard");
    }
}
