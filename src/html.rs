//! Single-file HTML edition of the report.
//!
//! The page is produced from the same [`TitleBlock`] and [`Section`]s as the PDF, so both
//! editions carry identical wording and tables. Chart PNGs are inlined as `data:` URIs, which
//! lets the file be mailed or hosted without its `charts/` directory. No fonts are needed.

use std::fs;

use base64::engine::general_purpose;
use base64::Engine;
use genpdf::style::Color;
use log::warn;

use crate::charts::ChartArtifact;
use crate::config::{Palette, ReportConfig, Rgb};
use crate::error::Result;
use crate::layout::{self, REPORT_TITLE};
use crate::metrics::ReportData;
use crate::model::{
    Block, HorizontalAlignment, ImageBlock, RichParagraph, Section, TableBlock, TextSize,
    TitleBlock,
};
use crate::richtext::Span;

/// Builds the HTML report for `data`.
pub fn build_html(
    data: &ReportData,
    charts: &[ChartArtifact],
    config: &ReportConfig,
) -> Result<String> {
    let palette = &config.palette;
    let title = layout::title_block(data, palette);
    let sections = layout::report_sections(data, charts, palette)?;
    let date = data.generated_at.format("%B %d, %Y").to_string();
    Ok(render_page(&config.brand, &date, &title, &sections, palette))
}

fn render_page(
    brand: &str,
    date: &str,
    title: &TitleBlock,
    sections: &[Section],
    palette: &Palette,
) -> String {
    let mut html = String::with_capacity(64 * 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str(&format!(
        "<title>{} &ndash; {}</title>\n",
        escape(REPORT_TITLE),
        escape(date)
    ));
    html.push_str(&stylesheet(palette));
    html.push_str("</head>\n<body>\n");

    html.push_str(&format!(
        "<header><span class=\"brand\">{}</span> <span class=\"muted\">Weekly Risk Report</span>\
         <span class=\"date\">{}</span></header>\n<main>\n",
        escape(&brand.to_uppercase()),
        escape(date)
    ));

    html.push_str(&format!("<h1>{}</h1>\n", escape(title.title())));
    if let Some(subtitle) = title.subtitle() {
        html.push_str(&format!("<p class=\"subtitle\">{}</p>\n", escape(subtitle)));
    }
    for block in title.blocks() {
        push_block(&mut html, block);
    }

    for section in sections {
        match section.identifier() {
            Some(id) => html.push_str(&format!("<section id=\"{}\">\n", escape(id))),
            None => html.push_str("<section>\n"),
        }
        html.push_str(&format!("<h2>{}</h2>\n", escape(section.title())));
        for block in section.blocks() {
            push_block(&mut html, block);
        }
        html.push_str("</section>\n");
    }

    html.push_str(
        "</main>\n<footer>Generated from Dune Analytics | data.morpho.org/risk</footer>\n\
         </body>\n</html>\n",
    );
    html
}

fn stylesheet(palette: &Palette) -> String {
    format!(
        "<style>\n\
         body {{ font-family: -apple-system, \"Segoe UI\", Roboto, Arial, sans-serif; \
         color: {text}; max-width: 900px; margin: 0 auto; padding: 0 24px; line-height: 1.5; }}\n\
         header {{ display: flex; gap: 8px; align-items: baseline; padding: 16px 0; \
         border-bottom: 2px solid {accent}; font-size: 13px; }}\n\
         header .brand {{ font-weight: 700; color: {accent}; }}\n\
         header .date {{ margin-left: auto; }}\n\
         .muted, .subtitle, footer, th {{ color: {muted}; }}\n\
         h2 {{ color: {accent}; border-bottom: 1px solid {border}; padding-bottom: 4px; }}\n\
         table {{ width: 100%; border-collapse: collapse; margin: 8px 0 20px; }}\n\
         th, td {{ border: 1px solid {border}; padding: 6px 10px; }}\n\
         td.empty {{ text-align: center; color: {muted}; }}\n\
         figure {{ margin: 12px 0; text-align: center; }}\n\
         figure img {{ max-width: 100%; }}\n\
         figcaption, .small {{ font-size: 12px; }}\n\
         .large {{ font-size: 20px; }}\n\
         footer {{ border-top: 1px solid {border}; padding: 12px 0; font-size: 12px; }}\n\
         </style>\n",
        text = palette.text.to_hex(),
        accent = palette.accent.to_hex(),
        muted = palette.text_muted.to_hex(),
        border = palette.border.to_hex(),
    )
}

fn push_block(html: &mut String, block: &Block) {
    match block {
        Block::Paragraph(paragraph) => html.push_str(&paragraph_html("p", paragraph)),
        Block::Image(image) => {
            if let Some(figure) = image_html(image) {
                html.push_str(&figure);
            }
        }
        Block::Table(table) => html.push_str(&table_html(table)),
        Block::Rule => html.push_str("<hr>\n"),
        Block::Spacer(lines) => {
            html.push_str(&format!("<div style=\"height: {:.1}em\"></div>\n", lines * 1.5))
        }
    }
}

fn paragraph_html(tag: &str, paragraph: &RichParagraph) -> String {
    let mut attributes = Vec::new();
    match paragraph.size() {
        TextSize::Small => attributes.push("class=\"small\"".to_string()),
        TextSize::Large => attributes.push("class=\"large\"".to_string()),
        TextSize::Body => {}
    }
    let mut style = String::new();
    if let Some(align) = text_align(paragraph.alignment()) {
        style.push_str(&format!("text-align: {};", align));
    }
    if paragraph.indent_mm() > 0.0 {
        style.push_str(&format!("padding-left: {:.1}mm;", paragraph.indent_mm()));
    }
    if !style.is_empty() {
        attributes.push(format!("style=\"{}\"", style));
    }

    let open = if attributes.is_empty() {
        format!("<{}>", tag)
    } else {
        format!("<{} {}>", tag, attributes.join(" "))
    };
    let body: String = paragraph.spans().iter().map(span_html).collect();
    format!("{}{}</{}>\n", open, body, tag)
}

fn span_html(span: &Span) -> String {
    let mut text = escape(span.text());
    if span.is_underlined() {
        text = format!("<u>{}</u>", text);
    }
    if span.is_italic() {
        text = format!("<em>{}</em>", text);
    }
    if span.is_bold() {
        text = format!("<strong>{}</strong>", text);
    }
    match span.color() {
        Some(color) => format!("<span style=\"color: {}\">{}</span>", css_color(color), text),
        None => text,
    }
}

/// A `<figure>` with the PNG inlined, or `None` when the file cannot be read.
fn image_html(image: &ImageBlock) -> Option<String> {
    let bytes = match fs::read(image.path()) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Leaving {} out of the HTML report: {}", image.path().display(), err);
            return None;
        }
    };
    let width = image
        .width_mm()
        .map(|mm| format!(" style=\"width: {:.0}mm\"", mm))
        .unwrap_or_default();
    let caption = image
        .caption()
        .map(|caption| paragraph_html("figcaption", caption))
        .unwrap_or_default();
    Some(format!(
        "<figure><img src=\"data:image/png;base64,{}\" alt=\"\"{}>{}</figure>\n",
        general_purpose::STANDARD.encode(bytes),
        width,
        caption
    ))
}

fn table_html(table: &TableBlock) -> String {
    let mut html = String::from("<table>\n<thead><tr>");
    for column in table.columns() {
        html.push_str(&format!(
            "<th{}>{}</th>",
            align_attribute(column.alignment),
            escape(&column.title)
        ));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    if table.rows().is_empty() {
        html.push_str(&format!(
            "<tr><td class=\"empty\" colspan=\"{}\">{}</td></tr>\n",
            table.columns().len().max(1),
            escape(table.empty_message())
        ));
    }
    for row in table.rows() {
        html.push_str("<tr>");
        for (column, cell) in table.columns().iter().zip(row) {
            let body: String = cell.spans().iter().map(span_html).collect();
            html.push_str(&format!("<td{}>{}</td>", align_attribute(column.alignment), body));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
    html
}

fn text_align(alignment: HorizontalAlignment) -> Option<&'static str> {
    match alignment {
        HorizontalAlignment::Left => None,
        HorizontalAlignment::Center => Some("center"),
        HorizontalAlignment::Right => Some("right"),
    }
}

fn align_attribute(alignment: HorizontalAlignment) -> String {
    text_align(alignment)
        .map(|align| format!(" style=\"text-align: {}\"", align))
        .unwrap_or_default()
}

fn css_color(color: Color) -> String {
    match color {
        Color::Rgb(r, g, b) => Rgb(r, g, b).to_hex(),
        Color::Greyscale(level) => Rgb(level, level, level).to_hex(),
        Color::Cmyk(c, m, y, k) => {
            let channel = |value: u8| {
                let scaled = (255 - value as u16) * (255 - k as u16) / 255;
                scaled as u8
            };
            Rgb(channel(c), channel(m), channel(y)).to_hex()
        }
    }
}

/// Escapes text for use in element content and double-quoted attributes.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartKind;
    use crate::metrics::ChainLiquidation;
    use chrono::{TimeZone, Utc};

    fn data() -> ReportData {
        ReportData {
            generated_at: Utc.with_ymd_and_hms(2024, 6, 17, 9, 0, 0).unwrap(),
            window_days: 7,
            summary: None,
            daily_liquidations: Vec::new(),
            liquidations_by_chain: vec![ChainLiquidation {
                chain: "base".to_string(),
                volume_usd: 1_250_000.0,
                count: 12,
                markets_affected: 3,
            }],
            bad_debt_by_chain: Vec::new(),
            unrealized_bad_debt: Vec::new(),
            snapshot_24h: Default::default(),
        }
    }

    #[test]
    fn page_carries_every_section_and_table() {
        let html = build_html(&data(), &[], &ReportConfig::default()).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        let headings = [
            "TLDR",
            "1. Liquidations &amp; Bad Debt",
            "2. Bad Debt Overview",
            "Data Sources",
        ];
        for heading in headings {
            assert!(html.contains(&format!("<h2>{}</h2>", heading)), "missing {}", heading);
        }
        assert!(html.contains("<td>Base</td>"));
        assert!(html.contains("No unrealized bad debt"));
        assert!(html.contains("<section id=\"bad-debt\">"));
    }

    #[test]
    fn charts_are_inlined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart_bad_debt.png");
        fs::write(&path, b"\x89PNG fake").unwrap();
        let charts = vec![ChartArtifact {
            kind: ChartKind::BadDebt,
            path,
            placeholder: false,
        }];

        let html = build_html(&data(), &charts, &ReportConfig::default()).unwrap();
        let encoded = general_purpose::STANDARD.encode(b"\x89PNG fake");
        assert!(html.contains(&format!("data:image/png;base64,{}", encoded)));
    }

    #[test]
    fn unreadable_chart_is_left_out() {
        let charts = vec![ChartArtifact {
            kind: ChartKind::BadDebt,
            path: "does/not/exist.png".into(),
            placeholder: false,
        }];
        let html = build_html(&data(), &charts, &ReportConfig::default()).unwrap();
        assert!(!html.contains("<figure>"));
    }

    #[test]
    fn spans_keep_their_styling() {
        let span = Span::new("a < b").bold().colored(Rgb(0xE7, 0x4C, 0x3C));
        assert_eq!(
            span_html(&span),
            "<span style=\"color: #E74C3C\"><strong>a &lt; b</strong></span>"
        );
    }
}
