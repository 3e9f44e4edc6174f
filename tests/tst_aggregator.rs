use chrono::NaiveDate;
use vectr::chain::aggregator::{aggregate, blended_strike, rank_by_open_interest, summarize_group};
use vectr::chain::{AnalysisConfig, ContractRow, ExpirationGroup, NormalizedChain, Side};

fn expiration() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 21).unwrap()
}

fn row(side: Side, strike: Option<f64>, open_interest: Option<u64>) -> ContractRow {
    ContractRow {
        strike,
        side,
        expiration: expiration(),
        open_interest,
        volume: None,
        last_price: None,
        last_trade: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_rows_rank_by_open_interest() {
        let rows = vec![
            row(Side::Call, Some(100.0), Some(500)),
            row(Side::Call, Some(105.0), Some(800)),
        ];
        let group = ExpirationGroup::new(expiration(), Side::Call, rows);

        let summary = summarize_group(&group, 3);
        assert_eq!(summary.top_strikes, vec![105.0, 100.0, 0.0]);
        assert_eq!(summary.total_open_interest, 1300);
        assert_eq!(summary.max_open_interest, Some(800));
    }

    #[test]
    fn test_rank_order_is_monotonic_with_unknown_last() {
        let rows = vec![
            row(Side::Put, Some(90.0), None),
            row(Side::Put, Some(95.0), Some(40)),
            row(Side::Put, Some(100.0), Some(70)),
            row(Side::Put, Some(105.0), Some(10)),
            row(Side::Put, Some(110.0), None),
        ];

        let ranked = rank_by_open_interest(&rows);
        let known: Vec<u64> = ranked.iter().filter_map(|r| r.open_interest).collect();
        assert!(known.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(ranked[3].strike, Some(90.0));
        assert_eq!(ranked[4].strike, Some(110.0));
    }

    #[test]
    fn test_unknown_strike_makes_blend_undefined() {
        let calls = ExpirationGroup::new(
            expiration(),
            Side::Call,
            vec![row(Side::Call, None, Some(100))],
        );
        let puts = ExpirationGroup::new(
            expiration(),
            Side::Put,
            vec![row(Side::Put, Some(95.0), Some(100))],
        );

        let call_summary = summarize_group(&calls, 3);
        assert!(call_summary.top_strikes[0].is_nan());

        let puts_summary = summarize_group(&puts, 3);
        assert_eq!(blended_strike(Some(&call_summary), Some(&puts_summary), 3), None);
    }

    #[test]
    fn test_blend_undefined_with_zero_open_interest() {
        let chain = NormalizedChain {
            calls: vec![ExpirationGroup::new(
                expiration(),
                Side::Call,
                vec![row(Side::Call, Some(100.0), Some(0))],
            )],
            puts: vec![ExpirationGroup::new(
                expiration(),
                Side::Put,
                vec![row(Side::Put, Some(95.0), None)],
            )],
        };

        let summaries = aggregate(&chain, &AnalysisConfig::default());
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].blended_strike, None);
    }

    #[test]
    fn test_blend_within_contributing_strikes() {
        let full = |side: Side, strikes: [f64; 3], ois: [u64; 3]| {
            ExpirationGroup::new(
                expiration(),
                side,
                strikes
                    .iter()
                    .zip(ois.iter())
                    .map(|(s, oi)| row(side, Some(*s), Some(*oi)))
                    .collect(),
            )
        };

        let chain = NormalizedChain {
            calls: vec![full(Side::Call, [110.0, 115.0, 120.0], [300, 200, 100])],
            puts: vec![full(Side::Put, [90.0, 95.0, 85.0], [50, 40, 10])],
        };

        let summaries = aggregate(&chain, &AnalysisConfig::default());
        let blended = summaries[0].blended_strike.unwrap();
        assert!((85.0..=120.0).contains(&blended));

        // Calls hold 600 of 700 open interest, so the blend leans to the call strikes
        let expected = (345.0 * 600.0 / 700.0 + 270.0 * 100.0 / 700.0) / 3.0;
        assert!((blended - expected).abs() < 1e-9);
    }

    #[test]
    fn test_dates_from_either_side_are_ascending() {
        let june = expiration();
        let july = NaiveDate::from_ymd_opt(2024, 7, 19).unwrap();
        let group = |date: NaiveDate, side: Side| ExpirationGroup::new(date, side, vec![row(side, Some(100.0), Some(1))]);

        let chain = NormalizedChain {
            calls: vec![group(july, Side::Call)],
            puts: vec![group(june, Side::Put)],
        };

        let summaries = aggregate(&chain, &AnalysisConfig::default());
        let labels: Vec<&str> = summaries.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["06/21/24", "07/19/24"]);
        assert!(summaries[0].calls.is_none());
        assert!(summaries[1].puts.is_none());
    }
}
