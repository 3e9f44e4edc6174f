use super::aggregator::DateSummary;
use super::models::{NormalizedChain, Side};
use super::ranker::{format_dollar_amount, ActiveContract};
use crate::error::ChainError;
use crate::models::Quote;
use serde::Serialize;

// -----------------------------------------------
// PALETTE
// -----------------------------------------------
const CALL_OI_COLOR: &str = "#708d8b";
const PUT_OI_COLOR: &str = "#b87d6e";
const AVERAGE_COLOR: &str = "#565887";
const CALL_LINE_COLORS: &[&str] = &["#75f542", "#57f542", "#25f74f"];
const PUT_LINE_COLORS: &[&str] = &["#f54242", "#d16262", "#d17b7b"];
const CALL_HIGHLIGHT: &str = "#32a852";
const PUT_HIGHLIGHT: &str = "#de3557";
const NEUTRAL_TEXT: &str = "#ffffff";
const CALL_ANNOTATION_COLOR: &str = "#32a852";
const PUT_ANNOTATION_COLOR: &str = "#ff5e00";
const UNUSUAL_BACKGROUND: &str = "#2a1c63";
const DEFAULT_BACKGROUND: &str = "#3b3b3b";

const MAX_MARKER_SIZE: f64 = 20.0;
const DEFAULT_MARKER_SIZE: f64 = 5.0;
const ANNOTATION_X_OFFSET: i32 = 35;
const ANNOTATION_Y_OFFSET: i32 = -35;
const ANNOTATION_Y_STEP: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Bar,
    Line,
}

/// Which y axis a series is drawn against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    OpenInterest,
    Strike,
}

/// One named series over the date axis; `None` is a gap, never zero
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub side: Option<Side>,
    pub kind: SeriesKind,
    pub axis: Axis,
    pub color: String,
    pub show_legend: bool,
    pub values: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_sizes: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub date: String,
    pub strike: f64,
    pub text: String,
    pub side: Side,
    /// Unusual activity
    pub highlight: bool,
    pub color: String,
    pub background: String,
    pub ax: i32,
    pub ay: i32,
}

/// Call/put pair of running totals with the leading side highlighted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideTotals {
    pub calls: f64,
    pub puts: f64,
    pub calls_text: String,
    pub puts_text: String,
    pub calls_color: String,
    pub puts_color: String,
}

impl SideTotals {
    fn new(calls: f64, puts: f64, format: impl Fn(f64) -> String) -> Self {
        Self {
            calls,
            puts,
            calls_text: format(calls),
            puts_text: format(puts),
            calls_color: if calls > puts { CALL_HIGHLIGHT } else { NEUTRAL_TEXT }.to_string(),
            puts_color: if puts > calls { PUT_HIGHLIGHT } else { NEUTRAL_TEXT }.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetTotals {
    pub volume: SideTotals,
    pub premium: SideTotals,
}

impl Default for NetTotals {
    fn default() -> Self {
        Self {
            volume: SideTotals::new(0.0, 0.0, |v| format_count(v as u64)),
            premium: SideTotals::new(0.0, 0.0, format_dollar_amount),
        }
    }
}

/// How complete the view is, for the adapter to message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewStatus {
    Complete,
    Partial { failed_dates: Vec<String> },
    NoOptionsListed,
    EmptyChain,
}

/// Renderer-neutral chart description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub ticker: String,
    pub status: ViewStatus,
    pub quote: Option<Quote>,
    pub current_price: Option<f64>,
    pub dates: Vec<String>,
    pub series: Vec<Series>,
    pub annotations: Vec<Annotation>,
    pub totals: NetTotals,
}

impl ChartView {
    /// Valid view with every series empty
    pub fn empty(ticker: &str, status: ViewStatus, quote: Option<Quote>) -> Self {
        Self {
            ticker: ticker.to_string(),
            status,
            current_price: quote.as_ref().map(|q| q.current_price),
            quote,
            dates: Vec::new(),
            series: Vec::new(),
            annotations: Vec::new(),
            totals: NetTotals::default(),
        }
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }
}

/// `1234567` -> `1,234,567`
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn format_strike(strike: f64) -> String {
    if strike.fract() == 0.0 && strike >= 0.0 {
        format_count(strike as u64)
    } else {
        format!("{:.2}", strike)
    }
}

fn ordinal(rank: usize) -> String {
    match rank {
        1 => "1st".to_string(),
        2 => "2nd".to_string(),
        3 => "3rd".to_string(),
        n => format!("{}th", n),
    }
}

fn strike_series_name(side: Side, rank: usize) -> String {
    let noun = match side {
        Side::Call => "Call",
        Side::Put => "Put",
    };
    if rank == 0 {
        noun.to_string()
    } else {
        format!("{} Most-Bought {}", ordinal(rank + 1), noun)
    }
}

/// Net volume and net notional premium per side over every row
pub fn net_totals(chain: &NormalizedChain) -> NetTotals {
    let volume = |side: Side| -> u64 {
        chain
            .side(side)
            .iter()
            .flat_map(|g| g.rows.iter())
            .filter_map(|r| r.volume)
            .sum()
    };
    let premium = |side: Side| -> f64 {
        chain
            .side(side)
            .iter()
            .flat_map(|g| g.rows.iter())
            .filter_map(|r| r.notional())
            .sum()
    };

    NetTotals {
        volume: SideTotals::new(
            volume(Side::Call) as f64,
            volume(Side::Put) as f64,
            |v| format_count(v as u64),
        ),
        premium: SideTotals::new(premium(Side::Call), premium(Side::Put), format_dollar_amount),
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn strike_series(summaries: &[DateSummary], side: Side, top_n: usize, global_max_oi: u64) -> Vec<Series> {
    let palette = match side {
        Side::Call => CALL_LINE_COLORS,
        Side::Put => PUT_LINE_COLORS,
    };

    (0..top_n)
        .map(|rank| {
            let values = summaries
                .iter()
                .map(|s| s.side(side).and_then(|ss| ss.top_strikes.get(rank).copied()).and_then(finite))
                .collect();

            // Rank-1 markers scale with the date's largest open interest
            let marker_sizes = (rank == 0).then(|| {
                summaries
                    .iter()
                    .map(|s| match s.side(side) {
                        Some(ss) if global_max_oi > 0 => {
                            ss.max_open_interest.unwrap_or(0) as f64 / global_max_oi as f64 * MAX_MARKER_SIZE
                        }
                        _ => DEFAULT_MARKER_SIZE,
                    })
                    .collect()
            });

            Series {
                name: strike_series_name(side, rank),
                side: Some(side),
                kind: SeriesKind::Line,
                axis: Axis::Strike,
                color: palette[rank.min(palette.len() - 1)].to_string(),
                show_legend: rank == 0,
                values,
                marker_sizes,
            }
        })
        .collect()
}

fn open_interest_series(summaries: &[DateSummary], side: Side) -> Series {
    let (name, color) = match side {
        Side::Call => ("Call OI", CALL_OI_COLOR),
        Side::Put => ("Put OI", PUT_OI_COLOR),
    };

    Series {
        name: name.to_string(),
        side: Some(side),
        kind: SeriesKind::Bar,
        axis: Axis::OpenInterest,
        color: color.to_string(),
        show_legend: true,
        values: summaries
            .iter()
            .map(|s| s.side(side).map(|ss| ss.total_open_interest as f64))
            .collect(),
        marker_sizes: None,
    }
}

fn annotation(idx: usize, contract: &ActiveContract, dates: &[String]) -> Result<Annotation, ChainError> {
    if !dates.contains(&contract.label) {
        return Err(ChainError::DataIntegrity(format!(
            "Active contract on {} is not on the date axis",
            contract.label
        )));
    }

    let strike = contract.strike.ok_or_else(|| {
        ChainError::DataIntegrity(format!(
            "Active {} contract on {} has no strike",
            contract.side, contract.label
        ))
    })?;

    let (color, ax) = match contract.side {
        Side::Put => (PUT_ANNOTATION_COLOR, ANNOTATION_X_OFFSET),
        Side::Call => (CALL_ANNOTATION_COLOR, -ANNOTATION_X_OFFSET),
    };

    Ok(Annotation {
        date: contract.label.clone(),
        strike,
        text: format!(
            "${} {}\nQty: {}\n{}",
            format_strike(strike),
            contract.side,
            format_count(contract.volume),
            contract.notional_text
        ),
        side: contract.side,
        highlight: contract.unusual,
        color: color.to_string(),
        background: if contract.unusual { UNUSUAL_BACKGROUND } else { DEFAULT_BACKGROUND }.to_string(),
        ax,
        ay: ANNOTATION_Y_OFFSET - idx as i32 * ANNOTATION_Y_STEP,
    })
}

/// Map aggregates onto the chart structure.
///
/// Summaries must be strictly ascending by expiration and every active
/// contract must sit on one of their dates with a known strike.
pub fn assemble(
    ticker: &str,
    summaries: &[DateSummary],
    active: &[ActiveContract],
    totals: NetTotals,
    quote: Option<Quote>,
    top_n: usize,
    status: ViewStatus,
) -> Result<ChartView, ChainError> {
    if summaries.windows(2).any(|w| w[0].expiration >= w[1].expiration) {
        return Err(ChainError::DataIntegrity(
            "Expiration summaries are not strictly ascending".to_string(),
        ));
    }
    if let Some(bad) = summaries
        .iter()
        .flat_map(|s| s.calls.iter().chain(s.puts.iter()))
        .find(|ss| ss.top_strikes.len() != top_n)
    {
        return Err(ChainError::DataIntegrity(format!(
            "Expected {} ranked strikes, found {}",
            top_n,
            bad.top_strikes.len()
        )));
    }

    let dates: Vec<String> = summaries.iter().map(|s| s.label.clone()).collect();

    let global_max_oi = summaries
        .iter()
        .flat_map(|s| s.calls.iter().chain(s.puts.iter()))
        .filter_map(|ss| ss.max_open_interest)
        .max()
        .unwrap_or(0);

    let mut series = vec![
        open_interest_series(summaries, Side::Call),
        open_interest_series(summaries, Side::Put),
        Series {
            name: "Average".to_string(),
            side: None,
            kind: SeriesKind::Line,
            axis: Axis::Strike,
            color: AVERAGE_COLOR.to_string(),
            show_legend: true,
            values: summaries.iter().map(|s| s.blended_strike).collect(),
            marker_sizes: None,
        },
    ];
    series.extend(strike_series(summaries, Side::Call, top_n, global_max_oi));
    series.extend(strike_series(summaries, Side::Put, top_n, global_max_oi));

    let annotations = active
        .iter()
        .enumerate()
        .map(|(idx, contract)| annotation(idx, contract, &dates))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ChartView {
        ticker: ticker.to_string(),
        status,
        current_price: quote.as_ref().map(|q| q.current_price),
        quote,
        dates,
        series,
        annotations,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_series_names() {
        assert_eq!(strike_series_name(Side::Call, 0), "Call");
        assert_eq!(strike_series_name(Side::Call, 1), "2nd Most-Bought Call");
        assert_eq!(strike_series_name(Side::Put, 2), "3rd Most-Bought Put");
        assert_eq!(strike_series_name(Side::Put, 3), "4th Most-Bought Put");
    }

    #[test]
    fn test_side_totals_highlight_leader() {
        let totals = SideTotals::new(10.0, 5.0, |v| format_count(v as u64));
        assert_eq!(totals.calls_color, CALL_HIGHLIGHT);
        assert_eq!(totals.puts_color, NEUTRAL_TEXT);

        let tied = SideTotals::new(5.0, 5.0, |v| format_count(v as u64));
        assert_eq!(tied.calls_color, NEUTRAL_TEXT);
        assert_eq!(tied.puts_color, NEUTRAL_TEXT);
    }
}
