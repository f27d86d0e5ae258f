//! Typed views over fetched rows and the aggregates printed in the report.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::warn;

use crate::config;
use crate::data::{MetricRow, QueryResult};

/// Totals reported by the weekly summary query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeeklySummary {
    pub total_liquidated_usd: f64,
    pub total_bad_debt_usd: f64,
    pub positions: u64,
    pub markets: u64,
    pub chains: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DailyLiquidation {
    pub day: NaiveDate,
    pub chain: String,
    pub volume_usd: f64,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChainLiquidation {
    pub chain: String,
    pub volume_usd: f64,
    pub count: u64,
    pub markets_affected: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChainBadDebt {
    pub chain: String,
    pub amount_usd: f64,
    pub events: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnrealizedPosition {
    pub market: String,
    pub chain: String,
    pub amount_usd: f64,
    pub total_supply_usd: Option<f64>,
}

/// Past-24h dashboard snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot24h {
    pub liquidated_usd: f64,
    pub positions: u64,
    pub markets: u64,
    pub chains: u64,
    pub bad_debt_usd: f64,
    pub markets_with_bad_debt: u64,
    pub bad_debt_events: usize,
}

/// Everything one report run renders, derived once from the fetched results.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub summary: Option<WeeklySummary>,
    pub daily_liquidations: Vec<DailyLiquidation>,
    pub liquidations_by_chain: Vec<ChainLiquidation>,
    pub bad_debt_by_chain: Vec<ChainBadDebt>,
    pub unrealized_bad_debt: Vec<UnrealizedPosition>,
    pub snapshot_24h: Snapshot24h,
}

impl ReportData {
    /// Builds the report view; results with unknown keys are ignored.
    pub fn from_results(
        results: &[QueryResult],
        generated_at: DateTime<Utc>,
        window_days: u32,
    ) -> Self {
        let rows = |key: &str| -> &[MetricRow] {
            results
                .iter()
                .find(|result| result.key() == key)
                .map(QueryResult::rows)
                .unwrap_or(&[])
        };

        Self {
            generated_at,
            window_days,
            summary: rows(config::WEEKLY_SUMMARY).first().map(parse_summary),
            daily_liquidations: rows(config::DAILY_LIQUIDATIONS)
                .iter()
                .filter_map(parse_daily)
                .collect(),
            liquidations_by_chain: rows(config::LIQUIDATIONS_BY_CHAIN)
                .iter()
                .filter_map(parse_chain_liquidation)
                .collect(),
            bad_debt_by_chain: rows(config::BAD_DEBT_BY_CHAIN)
                .iter()
                .filter_map(parse_chain_bad_debt)
                .collect(),
            unrealized_bad_debt: rows(config::UNREALIZED_BAD_DEBT)
                .iter()
                .filter_map(parse_unrealized)
                .collect(),
            snapshot_24h: parse_snapshot(
                rows(config::LIQUIDATION_STATS_24H).first(),
                rows(config::BAD_DEBT_STATS_24H).first(),
                rows(config::BAD_DEBT_EVENTS_24H).len(),
            ),
        }
    }

    /// Liquidation volume for the window: the chain breakdown's sum, else the summary figure.
    pub fn total_liquidated_usd(&self) -> f64 {
        if self.liquidations_by_chain.is_empty() {
            self.summary
                .as_ref()
                .map_or(0.0, |summary| summary.total_liquidated_usd)
        } else {
            self.liquidations_by_chain
                .iter()
                .map(|chain| chain.volume_usd)
                .sum()
        }
    }

    /// Realized bad debt for the window, derived like [`Self::total_liquidated_usd`].
    pub fn total_bad_debt_usd(&self) -> f64 {
        if self.bad_debt_by_chain.is_empty() {
            self.summary
                .as_ref()
                .map_or(0.0, |summary| summary.total_bad_debt_usd)
        } else {
            self.bad_debt_by_chain
                .iter()
                .map(|chain| chain.amount_usd)
                .sum()
        }
    }

    pub fn positions_liquidated(&self) -> u64 {
        match &self.summary {
            Some(summary) => summary.positions,
            None => self.liquidations_by_chain.iter().map(|chain| chain.count).sum(),
        }
    }

    pub fn markets_affected(&self) -> u64 {
        match &self.summary {
            Some(summary) => summary.markets,
            None => self
                .liquidations_by_chain
                .iter()
                .map(|chain| chain.markets_affected)
                .sum(),
        }
    }

    pub fn chains_affected(&self) -> u64 {
        match &self.summary {
            Some(summary) => summary.chains,
            None => self.liquidations_by_chain.len() as u64,
        }
    }

    pub fn has_bad_debt(&self) -> bool {
        self.total_bad_debt_usd() > 0.0
    }

    /// Per-day liquidation volume across all chains, oldest first.
    pub fn daily_totals(&self) -> Vec<(NaiveDate, f64)> {
        let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for entry in &self.daily_liquidations {
            *totals.entry(entry.day).or_default() += entry.volume_usd;
        }
        totals.into_iter().collect()
    }

    /// Relative change of the latest day's volume against the day before.
    pub fn day_over_day_change(&self) -> Option<f64> {
        let totals = self.daily_totals();
        match totals.as_slice() {
            [.., (_, previous), (_, latest)] if *previous > 0.0 => {
                Some((latest - previous) / previous)
            }
            _ => None,
        }
    }

    pub fn report_date(&self) -> NaiveDate {
        self.generated_at.date_naive()
    }

    pub fn window_start(&self) -> NaiveDate {
        self.report_date() - Duration::days(i64::from(self.window_days))
    }
}

fn parse_summary(row: &MetricRow) -> WeeklySummary {
    WeeklySummary {
        total_liquidated_usd: row.number("total_liquidated_usd").unwrap_or_default(),
        total_bad_debt_usd: row.number("total_bad_debt_usd").unwrap_or_default(),
        positions: row.count("total_positions_liquidated").unwrap_or_default(),
        markets: row.count("total_markets").unwrap_or_default(),
        chains: row.count("total_chains").unwrap_or_default(),
    }
}

/// Dune timestamps look like `2024-06-17 00:00:00.000 UTC`; only the date part matters.
fn parse_day(text: &str) -> Option<NaiveDate> {
    let date = text.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn parse_daily(row: &MetricRow) -> Option<DailyLiquidation> {
    let Some(day) = row.text("day").and_then(parse_day) else {
        warn!("Skipping daily liquidation row without a parseable day: {:?}", row);
        return None;
    };
    Some(DailyLiquidation {
        day,
        chain: row.text("blockchain").unwrap_or("unknown").to_string(),
        volume_usd: row.number("total_liquidated_usd").unwrap_or_default(),
        count: row.count("num_liquidations").unwrap_or_default(),
    })
}

fn parse_chain_liquidation(row: &MetricRow) -> Option<ChainLiquidation> {
    Some(ChainLiquidation {
        chain: row.text("blockchain")?.to_string(),
        volume_usd: row.number("total_liquidated_usd").unwrap_or_default(),
        count: row.count("num_liquidations").unwrap_or_default(),
        markets_affected: row.count("markets_affected").unwrap_or_default(),
    })
}

fn parse_chain_bad_debt(row: &MetricRow) -> Option<ChainBadDebt> {
    Some(ChainBadDebt {
        chain: row.text("blockchain")?.to_string(),
        amount_usd: row.number("total_bad_debt_usd").unwrap_or_default(),
        events: row.count("num_events").unwrap_or_default(),
    })
}

fn parse_unrealized(row: &MetricRow) -> Option<UnrealizedPosition> {
    Some(UnrealizedPosition {
        market: row.text_any(&["market", "Market"]).unwrap_or("N/A").to_string(),
        chain: row.text_any(&["chain", "Chain"]).unwrap_or("N/A").to_string(),
        amount_usd: row.number_any(&["unrealized_bad_debt", "Unrealized Bad Debt"])?,
        total_supply_usd: row.number_any(&["total_supply", "Total Supply"]),
    })
}

fn parse_snapshot(
    liquidations: Option<&MetricRow>,
    bad_debt: Option<&MetricRow>,
    bad_debt_events: usize,
) -> Snapshot24h {
    let mut snapshot = Snapshot24h {
        bad_debt_events,
        ..Snapshot24h::default()
    };
    if let Some(row) = liquidations {
        snapshot.liquidated_usd = row.number("total_liquidated").unwrap_or_default();
        snapshot.positions = row.count("positions_liquidated").unwrap_or_default();
        snapshot.markets = row.count("markets_liquidated").unwrap_or_default();
        snapshot.chains = row.count("chains_liquidated").unwrap_or_default();
    }
    if let Some(row) = bad_debt {
        snapshot.bad_debt_usd = row.number("total_bad_debt_amount").unwrap_or_default();
        snapshot.markets_with_bad_debt = row.count("markets_with_bad_debt").unwrap_or_default();
    }
    snapshot
}
