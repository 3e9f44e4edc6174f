use super::models::{date_label, AnalysisConfig, ContractRow, ExpirationGroup, NormalizedChain, Side};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

/// Highest-volume contract of one (expiration, side), traded today
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveContract {
    pub side: Side,
    pub strike: Option<f64>,
    pub volume: u64,
    pub open_interest: Option<u64>,
    pub expiration: NaiveDate,
    pub label: String,
    /// volume × last price × 100; unknown without a last price
    pub notional_spent: Option<f64>,
    pub notional_text: String,
    pub unusual: bool,
}

/// Human readable dollars: `$2.0B`, `$1.5M`, `$12.3K`, `$999.00`
pub fn format_dollar_amount(amount: f64) -> String {
    if amount >= 1_000_000_000.0 {
        format!("${:.1}B", amount / 1_000_000_000.0)
    } else if amount >= 1_000_000.0 {
        format!("${:.1}M", amount / 1_000_000.0)
    } else if amount >= 1_000.0 {
        format!("${:.1}K", amount / 1_000.0)
    } else {
        format!("${:.2}", amount)
    }
}

/// Same-day volume above standing open interest; unknown on either side is never unusual
pub fn is_unusual(volume: Option<u64>, open_interest: Option<u64>) -> bool {
    match (volume, open_interest) {
        (Some(volume), Some(open_interest)) => volume > open_interest,
        _ => false,
    }
}

/// First row holding the maximum known volume
pub fn top_volume_row(group: &ExpirationGroup) -> Option<&ContractRow> {
    let mut best: Option<(&ContractRow, u64)> = None;

    for row in &group.rows {
        let Some(volume) = row.volume else { continue };
        match best {
            Some((_, best_volume)) if volume <= best_volume => {}
            _ => best = Some((row, volume)),
        }
    }

    best.map(|(row, _)| row)
}

/// Whether the last trade happened on `today` in local time
pub fn traded_on(row: &ContractRow, today: NaiveDate) -> bool {
    row.last_trade
        .map(|ts| ts.date_naive() == today)
        .unwrap_or(false)
}

fn candidate(group: &ExpirationGroup, analysis: &AnalysisConfig, today: NaiveDate) -> Option<ActiveContract> {
    let row = top_volume_row(group)?;
    if analysis.require_today_local && !traded_on(row, today) {
        return None;
    }

    // Nowhere to place it on the strike axis
    if row.strike.is_none() {
        debug!(expiration = %group.expiration, side = %group.side, "Skipping active contract with unknown strike");
        return None;
    }

    let volume = row.volume?;
    let notional_spent = row.notional();

    Some(ActiveContract {
        side: group.side,
        strike: row.strike,
        volume,
        open_interest: row.open_interest,
        expiration: group.expiration,
        label: date_label(group.expiration),
        notional_spent,
        notional_text: notional_spent
            .map(format_dollar_amount)
            .unwrap_or_else(|| "N/A".to_string()),
        unusual: is_unusual(row.volume, row.open_interest),
    })
}

/// Global "most active" list: calls then puts by date, volume descending, top K.
///
/// A group whose top-volume row has no strike contributes nothing.
pub fn rank_active_contracts(
    chain: &NormalizedChain,
    analysis: &AnalysisConfig,
    today: NaiveDate,
) -> Vec<ActiveContract> {
    let mut candidates: Vec<ActiveContract> = [Side::Call, Side::Put]
        .iter()
        .flat_map(|side| chain.side(*side).iter())
        .filter_map(|group| candidate(group, analysis, today))
        .collect();

    candidates.sort_by(|a, b| b.volume.cmp(&a.volume));
    candidates.truncate(analysis.top_k);
    candidates
}
