//! Canned rows with the same shape as the live queries, for offline runs and tests.

use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};

use super::{DataSource, MetricRow, QueryResult};
use crate::config::{self, QuerySpec};
use crate::error::Result;

const SAMPLE_CHAINS: [&str; 6] = [
    "ethereum", "base", "polygon", "arbitrum", "optimism", "hyperevm",
];

/// Liquidated USD per chain (columns follow `SAMPLE_CHAINS`) for the seven days ending on the
/// report date, oldest first.
const DAILY_VOLUME: [[f64; 6]; 7] = [
    [212_430.18, 154_902.77, 41_288.05, 22_715.40, 9_812.66, 15_004.91],
    [98_114.52, 301_447.09, 12_903.31, 57_360.88, 18_441.20, 6_220.47],
    [387_205.63, 88_610.44, 66_015.72, 31_904.16, 7_385.03, 44_918.25],
    [144_870.29, 176_322.58, 24_517.90, 12_083.64, 29_950.37, 11_406.82],
    [61_502.75, 243_118.36, 78_290.11, 48_775.29, 13_602.94, 35_117.60],
    [296_841.07, 129_455.83, 19_066.47, 70_312.05, 5_947.18, 22_689.34],
    [175_339.41, 212_764.20, 53_781.66, 16_428.93, 41_273.55, 9_358.76],
];

const DAILY_COUNT: [[u64; 6]; 7] = [
    [142, 97, 38, 21, 12, 18],
    [71, 188, 14, 45, 19, 10],
    [196, 63, 52, 27, 11, 33],
    [104, 121, 25, 15, 26, 13],
    [48, 164, 61, 39, 16, 29],
    [177, 88, 22, 54, 10, 24],
    [119, 143, 44, 19, 35, 12],
];

const MARKETS_AFFECTED: [u64; 6] = [34, 27, 11, 9, 5, 8];

/// Deterministic stand-in for [`super::DuneSource`]; performs no network access.
#[derive(Clone, Debug)]
pub struct SampleSource {
    as_of: NaiveDate,
}

impl SampleSource {
    /// Sample rows whose daily series ends on `as_of`.
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    fn rows_for(&self, key: &str) -> Vec<MetricRow> {
        match key {
            config::WEEKLY_SUMMARY => weekly_summary(),
            config::DAILY_LIQUIDATIONS => self.daily_liquidations(),
            config::LIQUIDATIONS_BY_CHAIN => liquidations_by_chain(),
            config::BAD_DEBT_BY_CHAIN => vec![row([
                ("blockchain", json!("ethereum")),
                ("total_bad_debt_usd", json!(1_284.5)),
                ("num_events", json!(2)),
            ])],
            config::LIQUIDATION_STATS_24H => vec![row([
                ("total_liquidated", json!(60_173)),
                ("positions_liquidated", json!(285)),
                ("markets_liquidated", json!(18)),
                ("chains_liquidated", json!(6)),
            ])],
            config::BAD_DEBT_STATS_24H => vec![row([
                ("total_bad_debt_amount", json!(0)),
                ("markets_with_bad_debt", json!(0)),
                ("chains_with_bad_debt", json!(0)),
            ])],
            config::UNREALIZED_BAD_DEBT => unrealized_bad_debt(),
            config::BAD_DEBT_EVENTS_24H => vec![row([
                ("blockchain", json!("ethereum")),
                ("market", json!("deUSD/USDC(86.0%)")),
                ("bad_debt_usd", json!(642.25)),
            ])],
            other => vec![row([("label", json!(other)), ("value", json!(0.0))])],
        }
    }

    fn daily_liquidations(&self) -> Vec<MetricRow> {
        let mut rows = Vec::with_capacity(DAILY_VOLUME.len() * SAMPLE_CHAINS.len());
        for (offset, (volumes, counts)) in DAILY_VOLUME.iter().zip(DAILY_COUNT.iter()).enumerate() {
            let day = self.as_of - Duration::days((DAILY_VOLUME.len() - 1 - offset) as i64);
            let stamp = format!("{} 00:00:00.000 UTC", day.format("%Y-%m-%d"));
            for (index, chain) in SAMPLE_CHAINS.iter().enumerate() {
                rows.push(row([
                    ("day", json!(stamp)),
                    ("blockchain", json!(chain)),
                    ("total_liquidated_usd", json!(volumes[index])),
                    ("num_liquidations", json!(counts[index])),
                ]));
            }
        }
        rows
    }
}

impl DataSource for SampleSource {
    fn name(&self) -> &'static str {
        "sample data"
    }

    fn fetch(&self, spec: &QuerySpec) -> Result<QueryResult> {
        Ok(QueryResult::new(spec.key(), self.rows_for(spec.key())))
    }
}

fn row<const N: usize>(pairs: [(&str, Value); N]) -> MetricRow {
    MetricRow::from_pairs(pairs)
}

fn chain_totals() -> Vec<(&'static str, f64, u64)> {
    SAMPLE_CHAINS
        .iter()
        .enumerate()
        .map(|(index, chain)| {
            let volume: f64 = DAILY_VOLUME.iter().map(|day| day[index]).sum();
            let count: u64 = DAILY_COUNT.iter().map(|day| day[index]).sum();
            (*chain, volume, count)
        })
        .collect()
}

fn weekly_summary() -> Vec<MetricRow> {
    let totals = chain_totals();
    let volume: f64 = totals.iter().map(|(_, volume, _)| volume).sum();
    let positions: u64 = totals.iter().map(|(_, _, count)| count).sum();
    vec![row([
        ("total_liquidated_usd", json!(volume)),
        ("total_bad_debt_usd", json!(1_284.5)),
        ("total_positions_liquidated", json!(positions)),
        ("total_markets", json!(89)),
        ("total_chains", json!(SAMPLE_CHAINS.len())),
    ])]
}

fn liquidations_by_chain() -> Vec<MetricRow> {
    let mut totals: Vec<_> = chain_totals()
        .into_iter()
        .zip(MARKETS_AFFECTED)
        .collect();
    totals.sort_by(|((_, a, _), _), ((_, b, _), _)| b.total_cmp(a));
    totals
        .into_iter()
        .map(|((chain, volume, count), markets)| {
            row([
                ("blockchain", json!(chain)),
                ("total_liquidated_usd", json!(volume)),
                ("num_liquidations", json!(count)),
                ("markets_affected", json!(markets)),
            ])
        })
        .collect()
}

fn unrealized_bad_debt() -> Vec<MetricRow> {
    [
        ("deUSD/USDC(86.0%)", "ethereum", 5_762.19, 10_004.95),
        ("UNKNOWN/lvlUSD(91.5%)", "ethereum", 5_261.65, 5_267.03),
        ("wbCOIN/USDC(86.0%)", "base", 3_647.55, 21_853.78),
    ]
    .into_iter()
    .map(|(market, chain, debt, supply)| {
        row([
            ("market", json!(market)),
            ("chain", json!(chain)),
            ("unrealized_bad_debt", json!(debt)),
            ("total_supply", json!(supply)),
        ])
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportConfig;
    use crate::data::fetch_all;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 17).expect("valid date")
    }

    #[test]
    fn every_configured_query_has_rows() {
        let config = ReportConfig::default();
        let results = fetch_all(&SampleSource::new(as_of()), &config.queries).expect("sample fetch");
        assert_eq!(results.len(), config.queries.len());
        for (result, spec) in results.iter().zip(&config.queries) {
            assert_eq!(result.key(), spec.key());
            assert!(!result.is_empty(), "{} has no sample rows", spec.key());
        }
    }

    #[test]
    fn unknown_queries_still_get_a_row() {
        let spec = QuerySpec::saved("something_new", 1, "unregistered");
        let result = SampleSource::new(as_of()).fetch(&spec).expect("sample fetch");
        assert_eq!(result.rows().len(), 1);
        assert_eq!(result.rows()[0].text("label"), Some("something_new"));
    }

    #[test]
    fn daily_series_ends_on_report_date() {
        let rows = SampleSource::new(as_of()).daily_liquidations();
        assert_eq!(rows.len(), 42);
        assert_eq!(rows[0].text("day"), Some("2024-06-11 00:00:00.000 UTC"));
        assert_eq!(
            rows.last().and_then(|row| row.text("day")),
            Some("2024-06-17 00:00:00.000 UTC")
        );
    }

    #[test]
    fn chain_breakdown_is_sorted_and_consistent_with_summary() {
        let by_chain = liquidations_by_chain();
        let volumes: Vec<f64> = by_chain
            .iter()
            .filter_map(|row| row.number("total_liquidated_usd"))
            .collect();
        assert!(volumes.windows(2).all(|pair| pair[0] >= pair[1]));

        let summary = weekly_summary();
        let total = summary[0].number("total_liquidated_usd").expect("summary total");
        assert!((volumes.iter().sum::<f64>() - total).abs() < 1e-6);
    }
}
