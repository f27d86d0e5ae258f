//! Static report configuration: queries, palette, and output locations.
//!
//! Everything here is an immutable value handed to each stage explicitly, so tests can build a
//! tweaked [`ReportConfig`] without touching process-wide state.

use std::path::PathBuf;
use std::time::Duration;

pub const DUNE_API_BASE: &str = "https://api.dune.com/api/v1";
pub const API_KEY_ENV: &str = "DUNE_API_KEY";
pub const DEFAULT_REPORT_NAME: &str = "morpho_risk_report";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_CRON: &str = "0 9 * * 1";

pub const WEEKLY_SUMMARY: &str = "weekly_liquidation_summary";
pub const DAILY_LIQUIDATIONS: &str = "daily_liquidations_7d";
pub const LIQUIDATIONS_BY_CHAIN: &str = "weekly_liquidations_by_chain";
pub const BAD_DEBT_BY_CHAIN: &str = "weekly_bad_debt_by_chain";
pub const LIQUIDATION_STATS_24H: &str = "liquidation_stats_24h";
pub const BAD_DEBT_STATS_24H: &str = "bad_debt_stats_24h";
pub const UNREALIZED_BAD_DEBT: &str = "unrealized_bad_debt";
pub const BAD_DEBT_EVENTS_24H: &str = "bad_debt_events_24h";

const WEEKLY_SUMMARY_SQL: &str = "
SELECT
    SUM(seized_amount_usd) AS total_liquidated_usd,
    SUM(bad_debt_amount_usd) AS total_bad_debt_usd,
    COUNT(*) AS total_positions_liquidated,
    COUNT(DISTINCT market_name) AS total_markets,
    COUNT(DISTINCT blockchain) AS total_chains
FROM dune.morpho.result_morpho_liquidation_events
WHERE time >= NOW() - INTERVAL '{window_days}' DAY
";

const DAILY_LIQUIDATIONS_SQL: &str = "
SELECT
    DATE_TRUNC('day', time) AS day,
    blockchain,
    SUM(seized_amount_usd) AS total_liquidated_usd,
    COUNT(*) AS num_liquidations
FROM dune.morpho.result_morpho_liquidation_events
WHERE time >= NOW() - INTERVAL '{window_days}' DAY
GROUP BY 1, 2
ORDER BY 1 ASC, 2
";

const LIQUIDATIONS_BY_CHAIN_SQL: &str = "
SELECT
    blockchain,
    SUM(seized_amount_usd) AS total_liquidated_usd,
    COUNT(*) AS num_liquidations,
    COUNT(DISTINCT market_name) AS markets_affected
FROM dune.morpho.result_morpho_liquidation_events
WHERE time >= NOW() - INTERVAL '{window_days}' DAY
GROUP BY blockchain
ORDER BY total_liquidated_usd DESC
";

const BAD_DEBT_BY_CHAIN_SQL: &str = "
SELECT
    blockchain,
    SUM(bad_debt_amount_usd) AS total_bad_debt_usd,
    COUNT(*) AS num_events
FROM dune.morpho.result_morpho_liquidation_events
WHERE time >= NOW() - INTERVAL '{window_days}' DAY
  AND bad_debt_amount_usd > 0
GROUP BY blockchain
ORDER BY total_bad_debt_usd DESC
";

/// Plain RGB triple shared by the chart and PDF renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parses `#RRGGBB` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl From<Rgb> for genpdf::style::Color {
    fn from(color: Rgb) -> Self {
        genpdf::style::Color::Rgb(color.0, color.1, color.2)
    }
}

impl From<Rgb> for plotters::style::RGBColor {
    fn from(color: Rgb) -> Self {
        plotters::style::RGBColor(color.0, color.1, color.2)
    }
}

/// Where a query's rows come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuerySource {
    /// Latest cached result of a query registered on Dune.
    Saved { id: u64 },
    /// Ad-hoc SQL; `{window_days}` is substituted before execution.
    Sql { template: String },
}

/// One query the report depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySpec {
    key: String,
    source: QuerySource,
    description: String,
}

impl QuerySpec {
    pub fn saved(key: impl Into<String>, id: u64, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source: QuerySource::Saved { id },
            description: description.into(),
        }
    }

    pub fn sql(
        key: impl Into<String>,
        template: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            source: QuerySource::Sql {
                template: template.into(),
            },
            description: description.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> &QuerySource {
        &self.source
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the SQL text with the rolling window substituted, or `None` for saved queries.
    pub fn render_sql(&self, window_days: u32) -> Option<String> {
        match &self.source {
            QuerySource::Sql { template } => {
                Some(template.replace("{window_days}", &window_days.to_string()))
            }
            QuerySource::Saved { .. } => None,
        }
    }
}

/// Brand colours for the PDF and the charts.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    pub text: Rgb,
    pub text_muted: Rgb,
    pub text_faint: Rgb,
    pub border: Rgb,
    pub grid: Rgb,
    pub accent: Rgb,
    pub positive: Rgb,
    pub negative: Rgb,
    pub link: Rgb,
    /// Per-chain series colours, keyed by lowercase chain name.
    pub chains: Vec<(String, Rgb)>,
    /// Cycled for chains without a dedicated colour.
    pub fallback: Vec<Rgb>,
}

impl Palette {
    /// Series colour for `chain`; unknown chains cycle through the fallback palette by `index`.
    pub fn chain_color(&self, chain: &str, index: usize) -> Rgb {
        let lowered = chain.to_ascii_lowercase();
        self.chains
            .iter()
            .find(|(name, _)| *name == lowered)
            .map(|(_, color)| *color)
            .unwrap_or_else(|| {
                if self.fallback.is_empty() {
                    self.text_muted
                } else {
                    self.fallback[index % self.fallback.len()]
                }
            })
    }
}

impl Default for Palette {
    fn default() -> Self {
        let chains = [
            ("ethereum", Rgb(0x4A, 0x7C, 0xBA)),
            ("base", Rgb(0x2E, 0x86, 0xC1)),
            ("polygon", Rgb(0x7D, 0x3C, 0x98)),
            ("optimism", Rgb(0xE7, 0x4C, 0x3C)),
            ("arbitrum", Rgb(0x5D, 0xAD, 0xE2)),
            ("hyperevm", Rgb(0x1A, 0xBC, 0x9C)),
            ("unichain", Rgb(0xC0, 0x39, 0x2B)),
            ("katana", Rgb(0xD4, 0xAC, 0x0D)),
            ("monad", Rgb(0xAF, 0x7A, 0xC5)),
        ]
        .into_iter()
        .map(|(name, color)| (name.to_string(), color))
        .collect();

        Self {
            text: Rgb(0x22, 0x22, 0x22),
            text_muted: Rgb(0x77, 0x77, 0x77),
            text_faint: Rgb(0xBB, 0xBB, 0xBB),
            border: Rgb(0xDD, 0xDD, 0xDD),
            grid: Rgb(0xE0, 0xE0, 0xE0),
            accent: Rgb(0x4A, 0x7C, 0xBA),
            positive: Rgb(0x27, 0xAE, 0x60),
            negative: Rgb(0xC0, 0x39, 0x2B),
            link: Rgb(0x24, 0x5C, 0xA0),
            chains,
            fallback: vec![
                Rgb(0x4A, 0x7C, 0xBA),
                Rgb(0x5D, 0xAD, 0xE2),
                Rgb(0x7D, 0x3C, 0x98),
                Rgb(0xE7, 0x4C, 0x3C),
                Rgb(0x27, 0xAE, 0x60),
                Rgb(0xF3, 0x9C, 0x12),
                Rgb(0x1A, 0xBC, 0x9C),
                Rgb(0x95, 0xA5, 0xA6),
            ],
        }
    }
}

/// Immutable configuration for one report run (or a schedule of them).
#[derive(Clone, Debug)]
pub struct ReportConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub window_days: u32,
    pub queries: Vec<QuerySpec>,
    pub palette: Palette,
    pub report_name: String,
    pub brand: String,
    pub output_dir: PathBuf,
}

impl ReportConfig {
    /// Returns the query registered under `key`.
    pub fn query(&self, key: &str) -> Option<&QuerySpec> {
        self.queries.iter().find(|spec| spec.key() == key)
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            api_base_url: DUNE_API_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(120),
            window_days: 7,
            queries: default_queries(),
            palette: Palette::default(),
            report_name: DEFAULT_REPORT_NAME.to_string(),
            brand: "Morpho".to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// The eight queries behind the weekly report, in fetch order.
pub fn default_queries() -> Vec<QuerySpec> {
    vec![
        QuerySpec::sql(WEEKLY_SUMMARY, WEEKLY_SUMMARY_SQL, "Weekly liquidation summary"),
        QuerySpec::sql(
            DAILY_LIQUIDATIONS,
            DAILY_LIQUIDATIONS_SQL,
            "Daily liquidations by chain",
        ),
        QuerySpec::sql(
            LIQUIDATIONS_BY_CHAIN,
            LIQUIDATIONS_BY_CHAIN_SQL,
            "Weekly liquidations by chain",
        ),
        QuerySpec::sql(
            BAD_DEBT_BY_CHAIN,
            BAD_DEBT_BY_CHAIN_SQL,
            "Weekly realized bad debt by chain",
        ),
        QuerySpec::saved(
            LIQUIDATION_STATS_24H,
            6_024_591,
            "Liquidation statistics, past 24 hours",
        ),
        QuerySpec::saved(
            BAD_DEBT_STATS_24H,
            6_024_779,
            "Bad debt statistics by market, past 24 hours",
        ),
        QuerySpec::saved(UNREALIZED_BAD_DEBT, 6_015_286, "Unrealized bad debt"),
        QuerySpec::saved(
            BAD_DEBT_EVENTS_24H,
            6_657_604,
            "Bad debt events, past 24 hours",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip_and_rejects_garbage() {
        assert_eq!(Rgb::from_hex("#4A7CBA"), Some(Rgb(0x4A, 0x7C, 0xBA)));
        assert_eq!(Rgb::from_hex("27ae60"), Some(Rgb(0x27, 0xAE, 0x60)));
        assert_eq!(Rgb(0x27, 0xAE, 0x60).to_hex(), "#27AE60");
        assert_eq!(Rgb::from_hex("#12FG34"), None);
        assert_eq!(Rgb::from_hex("#123"), None);
    }

    #[test]
    fn sql_templates_substitute_window() {
        let config = ReportConfig::default();
        let spec = config.query(DAILY_LIQUIDATIONS).expect("daily query configured");
        let sql = spec.render_sql(14).expect("sql query");
        assert!(sql.contains("INTERVAL '14' DAY"));
        assert!(!sql.contains("{window_days}"));

        let saved = config.query(UNREALIZED_BAD_DEBT).expect("saved query configured");
        assert_eq!(saved.render_sql(7), None);
        assert_eq!(saved.source(), &QuerySource::Saved { id: 6_015_286 });
    }

    #[test]
    fn default_queries_cover_four_saved_ids() {
        let saved: Vec<_> = default_queries()
            .into_iter()
            .filter_map(|spec| match spec.source() {
                QuerySource::Saved { id } => Some(*id),
                QuerySource::Sql { .. } => None,
            })
            .collect();
        assert_eq!(saved, vec![6_024_591, 6_024_779, 6_015_286, 6_657_604]);
    }

    #[test]
    fn chain_colors_fall_back_by_index() {
        let palette = Palette::default();
        assert_eq!(palette.chain_color("Ethereum", 5), Rgb(0x4A, 0x7C, 0xBA));
        assert_eq!(palette.chain_color("gnosis", 3), palette.fallback[3]);
        assert_eq!(palette.chain_color("gnosis", 11), palette.fallback[3]);
    }
}
