//! The weekly report's page layout and prose, assembled from [`ReportData`].
//!
//! Everything here produces [`crate::model`] values, so the wording and table contents can be
//! checked without fonts. Rendering happens later in [`PdfBuilder::render`].

use genpdf::elements::LinearLayout;
use genpdf::style::{Color, Style};
use genpdf::{Element, Margins, PaperSize};

use crate::builder::{DocumentBuilder, PdfBuilder, Theme};
use crate::charts::{ChartArtifact, ChartKind};
use crate::config::{Palette, ReportConfig};
use crate::elements::{HorizontalRule, SplitLine};
use crate::error::Result;
use crate::format::{capitalize, format_change, format_count, format_usd, truncate};
use crate::metrics::ReportData;
use crate::model::{
    Block, HorizontalAlignment, ImageBlock, RichParagraph, Section, TableBlock, TableColumn,
    TextSize, TitleBlock,
};
use crate::richtext::{escape_markup, parse_markup, Span, StyledSpan};

pub const REPORT_TITLE: &str = "Morpho Weekly Risk Report";
pub const DASHBOARD_URL: &str = "https://data.morpho.org/risk";
pub const DUNE_DASHBOARD_URL: &str = "https://dune.com/morpho/morpho-liquidation";

const CHAIN_TABLE_ROWS: usize = 8;
const UNREALIZED_TABLE_ROWS: usize = 5;
const MARKET_NAME_CHARS: usize = 28;
const FOOTER_HEIGHT_MM: i32 = 10;
/// Printed under a chart that could not be drawn from this week's data.
const PLACEHOLDER_CAPTION: &str = "Chart unavailable for this run; see the table below.";

/// Builds the complete report for `data`, ready to render.
pub fn build_report(
    data: &ReportData,
    charts: &[ChartArtifact],
    config: &ReportConfig,
) -> Result<PdfBuilder> {
    let palette = &config.palette;
    let theme = Theme::from_palette(palette);

    let mut builder = PdfBuilder::new()
        .with_document(page_setup(data, config))
        .with_theme(theme)
        .with_title_block(title_block(data, palette));

    for section in report_sections(data, charts, palette)? {
        builder = builder.add_section(section);
    }
    Ok(builder)
}

/// Letter paper with the branded running header and the page-numbered footer.
fn page_setup(data: &ReportData, config: &ReportConfig) -> DocumentBuilder {
    let palette = &config.palette;
    let brand = config.brand.to_uppercase();
    let date = data.generated_at.format("%B %d, %Y").to_string();
    let accent: Color = palette.accent.into();
    let muted: Color = palette.text_muted.into();
    let rule: Color = palette.border.into();

    DocumentBuilder::new()
        .with_title(format!("{} - {}", REPORT_TITLE, data.report_date()))
        .with_paper_size(PaperSize::Letter)
        .with_margins(Margins::trbl(14, 18, 12, 18))
        .with_font_size(10)
        .with_header(move |_page| {
            let left = vec![
                Span::new(brand.clone()).bold().colored(accent),
                Span::new("  Weekly Risk Report").colored(muted),
            ];
            let right = vec![Span::new(date.clone()).colored(muted)];
            LinearLayout::vertical()
                .element(SplitLine::new(styled(&left), styled(&right)))
                .element(HorizontalRule::new(rule).with_spacing(1.5, 4.0))
                .styled(Style::new().with_font_size(8))
        })
        .with_footer(FOOTER_HEIGHT_MM, move |page| {
            let left = vec![Span::new(
                "Generated from Dune Analytics | data.morpho.org/risk",
            )
            .colored(muted)];
            let right = vec![Span::new(format!("Page {}", page)).colored(muted)];
            LinearLayout::vertical()
                .element(HorizontalRule::new(rule).with_spacing(0.0, 2.0))
                .element(SplitLine::new(styled(&left), styled(&right)))
                .styled(Style::new().with_font_size(7))
        })
}

fn styled(spans: &[Span]) -> Vec<StyledSpan> {
    spans.iter().map(StyledSpan::from).collect()
}

/// Title, rolling-window subtitle, and the KPI strip.
pub fn title_block(data: &ReportData, palette: &Palette) -> TitleBlock {
    let subtitle = format!(
        "Rolling {}-Day Summary  |  {} \u{2013} {}",
        data.window_days,
        data.window_start().format("%B %d"),
        data.report_date().format("%B %d, %Y"),
    );

    TitleBlock::new(REPORT_TITLE)
        .with_subtitle(subtitle)
        .with_block(Block::Rule)
        .with_block(Block::table(kpi_table(data, palette)))
}

fn kpi_table(data: &ReportData, palette: &Palette) -> TableBlock {
    let bad_debt_color = if data.has_bad_debt() {
        palette.negative
    } else {
        palette.positive
    };
    let value =
        |text: String| RichParagraph::new(vec![Span::new(text).bold()]).with_size(TextSize::Large);

    TableBlock::new(vec![
        TableColumn::new("Liquidation Vol.", 1).centered(),
        TableColumn::new("Positions", 1).centered(),
        TableColumn::new("Markets", 1).centered(),
        TableColumn::new("Chains", 1).centered(),
        TableColumn::new("Bad Debt", 1).centered(),
    ])
    .with_muted_header()
    .with_row(vec![
        value(format_usd(data.total_liquidated_usd())),
        value(format_count(data.positions_liquidated())),
        value(format_count(data.markets_affected())),
        value(format_count(data.chains_affected())),
        RichParagraph::new(vec![Span::new(kpi_bad_debt(data))
            .bold()
            .colored(bad_debt_color)])
        .with_size(TextSize::Large),
    ])
}

/// A clean week reads as a flat `$0` in the KPI strip.
fn kpi_bad_debt(data: &ReportData) -> String {
    if data.has_bad_debt() {
        format_usd(data.total_bad_debt_usd())
    } else {
        "$0".to_string()
    }
}

/// The fixed report sections in reading order.
pub fn report_sections(
    data: &ReportData,
    charts: &[ChartArtifact],
    palette: &Palette,
) -> Result<Vec<Section>> {
    Ok(vec![
        tldr(data, palette)?,
        liquidations(data, charts)?,
        bad_debt(data, charts)?,
        takeaways(data)?,
        data_sources(data, palette)?,
    ])
}

fn markup(text: &str) -> Result<Block> {
    Ok(Block::paragraph(parse_markup(text)?))
}

fn chart(charts: &[ChartArtifact], kind: ChartKind) -> Option<Block> {
    let artifact = charts.iter().find(|artifact| artifact.kind == kind);
    if artifact.is_none() {
        log::debug!("No {} chart available, leaving it out", kind.name());
    }
    // Bad debt panel prints narrower than the bar charts.
    let width = (kind == ChartKind::BadDebt).then_some(150.0);
    artifact.map(|artifact| {
        let caption = artifact.placeholder.then(|| {
            RichParagraph::new(vec![Span::new(PLACEHOLDER_CAPTION).italic()])
                .with_size(TextSize::Small)
        });
        Block::image(
            ImageBlock::new(&artifact.path)
                .with_width_mm(width)
                .with_caption(caption),
        )
    })
}

fn tldr(data: &ReportData, palette: &Palette) -> Result<Section> {
    let outcome = if data.has_bad_debt() {
        format!(
            "with [color={}]{{{} in realized bad debt}}",
            palette.negative.to_hex(),
            escape_markup(&format_usd(data.total_bad_debt_usd()))
        )
    } else {
        format!(
            "with [color={}]{{zero realized bad debt}}",
            palette.positive.to_hex()
        )
    };
    let summary = format!(
        "Over the past {} days, Morpho processed **{}** in liquidations across **{}** positions and \
         **{}** markets on **{}** networks \u{2014} {}.",
        data.window_days,
        escape_markup(&format_usd(data.total_liquidated_usd())),
        format_count(data.positions_liquidated()),
        format_count(data.markets_affected()),
        format_count(data.chains_affected()),
        outcome,
    );

    let mut section = Section::new("TLDR")
        .with_identifier("tldr".to_string())
        .with_block(markup(&summary)?);

    if let Some(change) = data.day_over_day_change() {
        let direction = if change >= 0.0 { palette.negative } else { palette.positive };
        section = section.with_block(markup(&format!(
            "Latest daily liquidation volume: [color={}]{{{}}} versus the previous day.",
            direction.to_hex(),
            escape_markup(&format_change(change))
        ))?);
    }
    Ok(section)
}

fn liquidations(data: &ReportData, charts: &[ChartArtifact]) -> Result<Section> {
    let narrative = format!(
        "Morpho\u{2019}s infrastructure processed **{}** in liquidations over the past {} days, \
         demonstrating continued resilience. Liquidation activity spanned {} chains and {} \
         distinct markets.",
        escape_markup(&format_usd(data.total_liquidated_usd())),
        data.window_days,
        format_count(data.chains_affected()),
        format_count(data.markets_affected()),
    );

    let mut section = Section::new("1. Liquidations & Bad Debt")
        .with_identifier("liquidations".to_string())
        .with_block(markup(&narrative)?);

    let snapshot = &data.snapshot_24h;
    if snapshot.positions > 0 || snapshot.liquidated_usd > 0.0 {
        section = section.with_block(Block::paragraph(
            RichParagraph::new(vec![
                Span::new("Past 24 hours: ").bold(),
                Span::new(format!(
                    "{} liquidated across {} positions in {} markets on {} chains; {} bad debt \
                     events.",
                    format_usd(snapshot.liquidated_usd),
                    format_count(snapshot.positions),
                    format_count(snapshot.markets),
                    format_count(snapshot.chains),
                    snapshot.bad_debt_events,
                )),
            ])
            .with_size(TextSize::Small),
        ));
    }

    section = section
        .with_blocks(chart(charts, ChartKind::DailyLiquidations))
        .with_blocks(chart(charts, ChartKind::LiquidationsByChain))
        .with_block(Block::paragraph(vec![
            Span::new("Liquidation Breakdown by Chain").bold()
        ]))
        .with_block(Block::table(chain_table(data)));
    Ok(section)
}

/// Top chains by liquidation volume.
pub fn chain_table(data: &ReportData) -> TableBlock {
    let mut chains: Vec<_> = data.liquidations_by_chain.iter().collect();
    chains.sort_by(|a, b| b.volume_usd.total_cmp(&a.volume_usd));

    let table = TableBlock::new(vec![
        TableColumn::new("Chain", 3),
        TableColumn::new("Volume", 2).right(),
        TableColumn::new("Positions", 2).right(),
        TableColumn::new("Markets", 2).right(),
    ]);
    chains
        .into_iter()
        .take(CHAIN_TABLE_ROWS)
        .fold(table, |table, chain| {
            table.with_row(vec![
                RichParagraph::new(vec![Span::new(capitalize(&chain.chain))]),
                RichParagraph::new(vec![Span::new(format_usd(chain.volume_usd))]),
                RichParagraph::new(vec![Span::new(format_count(chain.count))]),
                RichParagraph::new(vec![Span::new(format_count(chain.markets_affected))]),
            ])
        })
}

fn bad_debt(data: &ReportData, charts: &[ChartArtifact]) -> Result<Section> {
    let narrative = if data.has_bad_debt() {
        format!(
            "A total of **{}** in realized bad debt was recorded. See the breakdown below for \
             details.",
            escape_markup(&format_usd(data.total_bad_debt_usd()))
        )
    } else {
        format!(
            "No realized bad debt events occurred during the past {} days, confirming the \
             effectiveness of Morpho\u{2019}s liquidation mechanisms and the prudent risk \
             parameters set by curators across the network.",
            data.window_days
        )
    };

    Ok(Section::new("2. Bad Debt Overview")
        .with_identifier("bad-debt".to_string())
        .with_block(markup(&narrative)?)
        .with_blocks(chart(charts, ChartKind::BadDebt))
        .with_block(Block::paragraph(vec![Span::new("Unrealized Bad Debt").bold()]))
        .with_block(Block::table(unrealized_table(data))))
}

/// Largest unrealized bad debt positions.
pub fn unrealized_table(data: &ReportData) -> TableBlock {
    let mut positions: Vec<_> = data.unrealized_bad_debt.iter().collect();
    positions.sort_by(|a, b| b.amount_usd.total_cmp(&a.amount_usd));

    let table = TableBlock::new(vec![
        TableColumn::new("Market", 4),
        TableColumn::new("Chain", 2),
        TableColumn::new("Unrealized Debt", 2).right(),
    ])
    .with_empty_message("No unrealized bad debt");
    positions
        .into_iter()
        .take(UNREALIZED_TABLE_ROWS)
        .fold(table, |table, position| {
            table.with_row(vec![
                RichParagraph::new(vec![Span::new(truncate(&position.market, MARKET_NAME_CHARS))]),
                RichParagraph::new(vec![Span::new(capitalize(&position.chain))]),
                RichParagraph::new(vec![Span::new(format_usd(position.amount_usd))]),
            ])
        })
}

fn takeaways(data: &ReportData) -> Result<Section> {
    let infrastructure = if data.has_bad_debt() {
        format!(
            "Liquidations cleared **{}** of at-risk positions; realized bad debt was limited to \
             **{}**.",
            escape_markup(&format_usd(data.total_liquidated_usd())),
            escape_markup(&format_usd(data.total_bad_debt_usd()))
        )
    } else {
        format!(
            "Liquidations cleared **{}** of at-risk positions without generating realized bad \
             debt.",
            escape_markup(&format_usd(data.total_liquidated_usd()))
        )
    };
    let items = [
        ("Infrastructure performed as designed.", infrastructure),
        (
            "Protocol resilience confirmed.",
            format!(
                "Liquidation activity across {} chains and {} markets was absorbed without \
                 disruption.",
                format_count(data.chains_affected()),
                format_count(data.markets_affected())
            ),
        ),
        (
            "Curator risk management effective.",
            "Risk parameters set by curators kept liquidations orderly across the network."
                .to_string(),
        ),
    ];

    let mut section = Section::new("3. Key Takeaways").with_identifier("takeaways".to_string());
    for (index, (headline, detail)) in items.iter().enumerate() {
        let spans = parse_markup(&format!("{}. **{}** {}", index + 1, headline, detail))?;
        section = section.with_block(Block::paragraph(
            RichParagraph::new(spans).with_indent_mm(4.0),
        ));
    }
    Ok(section)
}

fn data_sources(data: &ReportData, palette: &Palette) -> Result<Section> {
    let link = palette.link.to_hex();
    let sources = [
        ("Morpho Risk Dashboard", "data.morpho.org/risk", DASHBOARD_URL),
        (
            "Morpho Liquidation Dashboard",
            "Dune Analytics",
            DUNE_DASHBOARD_URL,
        ),
    ];

    let mut section = Section::new("Data Sources").with_identifier("data-sources".to_string());
    for (name, origin, url) in sources {
        let line = format!(
            "\u{2022} [link={}]{{{}}} ({}): {}",
            link,
            escape_markup(name),
            escape_markup(origin),
            escape_markup(url)
        );
        section = section.with_block(Block::paragraph(
            RichParagraph::new(parse_markup(&line)?).with_size(TextSize::Small),
        ));
    }

    let generated = format!(
        "Report generated: {}",
        data.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(section.with_block(Block::Spacer(0.5)).with_block(Block::paragraph(
        RichParagraph::new(vec![Span::new(generated).italic()])
            .with_size(TextSize::Small)
            .with_alignment(HorizontalAlignment::Right),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ChainLiquidation, UnrealizedPosition};
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn data() -> ReportData {
        ReportData {
            generated_at: Utc.with_ymd_and_hms(2024, 6, 17, 9, 0, 0).unwrap(),
            window_days: 7,
            summary: None,
            daily_liquidations: Vec::new(),
            liquidations_by_chain: Vec::new(),
            bad_debt_by_chain: Vec::new(),
            unrealized_bad_debt: Vec::new(),
            snapshot_24h: Default::default(),
        }
    }

    fn chain(name: &str, volume_usd: f64) -> ChainLiquidation {
        ChainLiquidation {
            chain: name.to_string(),
            volume_usd,
            count: 1,
            markets_affected: 1,
        }
    }

    fn section_text(section: &Section) -> String {
        section
            .blocks()
            .iter()
            .filter_map(|block| match block {
                Block::Paragraph(paragraph) => Some(paragraph.text()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn tldr_sums_the_chain_breakdown() {
        let mut data = data();
        data.liquidations_by_chain = vec![chain("a", 10.0), chain("b", 20.0), chain("c", 30.0)];

        let sections = report_sections(&data, &[], &Palette::default()).unwrap();
        let text = section_text(&sections[0]);
        assert!(text.contains("processed $60.00 in liquidations"), "{}", text);
        assert!(text.contains("with zero realized bad debt"));
    }

    #[test]
    fn empty_breakdown_gets_placeholder_tables() {
        let sections = report_sections(&data(), &[], &Palette::default()).unwrap();
        let chain_table = sections[1].tables().next().unwrap();
        assert!(chain_table.rows().is_empty());
        assert_eq!(chain_table.empty_message(), "No data available");

        let unrealized = sections[2].tables().next().unwrap();
        assert_eq!(unrealized.empty_message(), "No unrealized bad debt");
    }

    #[test]
    fn section_titles_are_fixed() {
        let sections = report_sections(&data(), &[], &Palette::default()).unwrap();
        let titles: Vec<_> = sections.iter().map(Section::title).collect();
        assert_eq!(
            titles,
            [
                "TLDR",
                "1. Liquidations & Bad Debt",
                "2. Bad Debt Overview",
                "3. Key Takeaways",
                "Data Sources"
            ]
        );
    }

    #[test]
    fn chain_table_is_sorted_and_capped() {
        let mut data = data();
        data.liquidations_by_chain = (0..10).map(|i| chain(&format!("chain{}", i), i as f64)).collect();
        let table = chain_table(&data);
        assert_eq!(table.rows().len(), CHAIN_TABLE_ROWS);
        assert_eq!(table.rows()[0][0].text(), "Chain9");
    }

    #[test]
    fn unrealized_market_names_are_truncated() {
        let mut data = data();
        data.unrealized_bad_debt = vec![UnrealizedPosition {
            market: "a-very-long-market-name-that-keeps-going".to_string(),
            chain: "base".to_string(),
            amount_usd: 1_500.0,
            total_supply_usd: None,
        }];
        let table = unrealized_table(&data);
        assert_eq!(table.rows()[0][0].text().chars().count(), MARKET_NAME_CHARS);
        assert_eq!(table.rows()[0][2].text(), "$1.5K");
    }

    #[test]
    fn bad_debt_changes_the_narrative_and_kpi_colour() {
        let mut data = data();
        data.bad_debt_by_chain = vec![crate::metrics::ChainBadDebt {
            chain: "ethereum".to_string(),
            amount_usd: 1_284.5,
            events: 2,
        }];
        let palette = Palette::default();

        let sections = report_sections(&data, &[], &palette).unwrap();
        assert!(section_text(&sections[0]).contains("$1.3K in realized bad debt"));
        assert!(section_text(&sections[2]).starts_with("A total of $1.3K"));

        let block = title_block(&data, &palette);
        let Some(Block::Table(kpis)) = block.blocks().last() else {
            panic!("KPI table missing");
        };
        let bad_debt = &kpis.rows()[0][4].spans()[0];
        assert_eq!(bad_debt.color(), Some(palette.negative.into()));
    }

    #[test]
    fn charts_are_placed_when_available() {
        let charts = vec![ChartArtifact {
            kind: ChartKind::BadDebt,
            path: PathBuf::from("charts/chart_bad_debt.png"),
            placeholder: false,
        }];
        let sections = report_sections(&data(), &charts, &Palette::default()).unwrap();
        let images = |section: &Section| {
            section
                .blocks()
                .iter()
                .filter(|block| matches!(block, Block::Image(_)))
                .count()
        };
        assert_eq!(images(&sections[1]), 0);
        assert_eq!(images(&sections[2]), 1);
    }

    #[test]
    fn placeholder_charts_are_captioned() {
        let charts = vec![
            ChartArtifact {
                kind: ChartKind::DailyLiquidations,
                path: PathBuf::from("charts/chart_daily_liquidations.png"),
                placeholder: true,
            },
            ChartArtifact {
                kind: ChartKind::LiquidationsByChain,
                path: PathBuf::from("charts/chart_liquidations_by_chain.png"),
                placeholder: false,
            },
        ];
        let sections = report_sections(&data(), &charts, &Palette::default()).unwrap();
        let captions: Vec<_> = sections[1]
            .blocks()
            .iter()
            .filter_map(|block| match block {
                Block::Image(image) => Some(image.caption().map(RichParagraph::text)),
                _ => None,
            })
            .collect();
        assert_eq!(captions, vec![Some(PLACEHOLDER_CAPTION.to_string()), None]);
    }

    #[test]
    fn clean_week_shows_flat_zero_kpi() {
        let block = title_block(&data(), &Palette::default());
        let Some(Block::Table(kpis)) = block.blocks().last() else {
            panic!("KPI table missing");
        };
        assert_eq!(kpis.rows()[0][4].text(), "$0");
    }

    #[test]
    fn narratives_follow_the_window_length() {
        let mut data = data();
        data.window_days = 14;
        let sections = report_sections(&data, &[], &Palette::default()).unwrap();
        assert!(section_text(&sections[1]).contains("over the past 14 days"));
        assert!(section_text(&sections[2]).contains("during the past 14 days"));
    }

    #[test]
    fn subtitle_shows_the_window() {
        let block = title_block(&data(), &Palette::default());
        assert_eq!(
            block.subtitle(),
            Some("Rolling 7-Day Summary  |  June 10 \u{2013} June 17, 2024")
        );
    }
}
