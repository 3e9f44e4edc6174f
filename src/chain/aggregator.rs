use super::models::{AnalysisConfig, ContractRow, ExpirationGroup, NormalizedChain, Side};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;

/// Open-interest statistics of one side on one expiration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideSummary {
    /// Sum of known open interest
    pub total_open_interest: u64,
    /// Largest known open interest of a single contract
    pub max_open_interest: Option<u64>,
    /// Rank-1..N strikes by open interest; `0.0` past the last row, NaN for an unknown strike
    pub top_strikes: Vec<f64>,
}

/// Per-expiration summary across both sides
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateSummary {
    pub expiration: NaiveDate,
    pub label: String,
    pub calls: Option<SideSummary>,
    pub puts: Option<SideSummary>,
    /// Open-interest weighted strike; `None` when undefined
    pub blended_strike: Option<f64>,
}

impl DateSummary {
    pub fn side(&self, side: Side) -> Option<&SideSummary> {
        match side {
            Side::Call => self.calls.as_ref(),
            Side::Put => self.puts.as_ref(),
        }
    }
}

/// Descending open interest, unknown last; equal keys keep their order
pub fn compare_open_interest(a: &ContractRow, b: &ContractRow) -> Ordering {
    match (a.open_interest, b.open_interest) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Rows of a group ranked by open interest (stable)
pub fn rank_by_open_interest(rows: &[ContractRow]) -> Vec<&ContractRow> {
    let mut ranked: Vec<&ContractRow> = rows.iter().collect();
    ranked.sort_by(|a, b| compare_open_interest(a, b));
    ranked
}

pub fn summarize_group(group: &ExpirationGroup, top_n: usize) -> SideSummary {
    let ranked = rank_by_open_interest(&group.rows);

    let top_strikes = (0..top_n)
        .map(|rank| match ranked.get(rank) {
            Some(row) => row.strike.unwrap_or(f64::NAN),
            None => 0.0,
        })
        .collect();

    SideSummary {
        total_open_interest: group.rows.iter().filter_map(|r| r.open_interest).sum(),
        max_open_interest: group.rows.iter().filter_map(|r| r.open_interest).max(),
        top_strikes,
    }
}

/// Blend both sides' top strikes by their share of combined open interest.
///
/// Missing ranks count as zero while the side's weight still applies, so a
/// side with fewer than N listed strikes pulls the result down.
pub fn blended_strike(calls: Option<&SideSummary>, puts: Option<&SideSummary>, top_n: usize) -> Option<f64> {
    let (calls, puts) = (calls?, puts?);

    let total_oi = calls.total_open_interest + puts.total_open_interest;
    if total_oi == 0 || top_n == 0 {
        return None;
    }

    let weight_calls = calls.total_open_interest as f64 / total_oi as f64;
    let weight_puts = puts.total_open_interest as f64 / total_oi as f64;

    let call_sum: f64 = calls.top_strikes.iter().sum();
    let put_sum: f64 = puts.top_strikes.iter().sum();

    let blended =
        (call_sum * weight_calls + put_sum * weight_puts) / (top_n as f64 * (weight_calls + weight_puts));

    blended.is_finite().then_some(blended)
}

/// Summaries for every expiration present on either side, ascending
pub fn aggregate(chain: &NormalizedChain, analysis: &AnalysisConfig) -> Vec<DateSummary> {
    chain
        .expirations()
        .into_iter()
        .map(|expiration| {
            let calls = chain
                .group(Side::Call, expiration)
                .map(|g| summarize_group(g, analysis.top_n));
            let puts = chain
                .group(Side::Put, expiration)
                .map(|g| summarize_group(g, analysis.top_n));
            let blended = blended_strike(calls.as_ref(), puts.as_ref(), analysis.top_n);

            DateSummary {
                expiration,
                label: super::models::date_label(expiration),
                calls,
                puts,
                blended_strike: blended,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(strike: f64, oi: Option<u64>) -> ContractRow {
        ContractRow {
            strike: Some(strike),
            side: Side::Call,
            expiration: NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
            open_interest: oi,
            volume: None,
            last_price: None,
            last_trade: None,
        }
    }

    #[test]
    fn test_rank_unknown_last_and_stable() {
        let rows = vec![
            row(90.0, None),
            row(95.0, Some(10)),
            row(100.0, Some(30)),
            row(105.0, Some(10)),
        ];
        let strikes: Vec<f64> = rank_by_open_interest(&rows)
            .iter()
            .map(|r| r.strike.unwrap())
            .collect();
        assert_eq!(strikes, vec![100.0, 95.0, 105.0, 90.0]);
    }

    #[test]
    fn test_missing_ranks_default_to_zero() {
        let group = ExpirationGroup::new(
            NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
            Side::Call,
            vec![row(100.0, Some(5))],
        );
        let summary = summarize_group(&group, 3);
        assert_eq!(summary.top_strikes, vec![100.0, 0.0, 0.0]);
        assert_eq!(summary.total_open_interest, 5);
    }

    #[test]
    fn test_blended_strike_requires_both_sides() {
        let side = SideSummary {
            total_open_interest: 100,
            max_open_interest: Some(60),
            top_strikes: vec![100.0, 105.0, 110.0],
        };
        assert_eq!(blended_strike(Some(&side), None, 3), None);
        assert_eq!(blended_strike(None, Some(&side), 3), None);
        assert_eq!(blended_strike(Some(&side), Some(&side), 3), Some(105.0));
    }
}
