use chrono::{Duration, Local, NaiveDate};
use vectr::chain::ranker::top_volume_row;
use vectr::chain::{
    format_dollar_amount, is_unusual, rank_active_contracts, AnalysisConfig, ContractRow,
    ExpirationGroup, NormalizedChain, Side,
};

fn row(side: Side, expiration: NaiveDate, strike: f64, oi: u64, volume: u64, traded_days_ago: i64) -> ContractRow {
    ContractRow {
        strike: Some(strike),
        side,
        expiration,
        open_interest: Some(oi),
        volume: Some(volume),
        last_price: Some(1.0),
        last_trade: Some(Local::now() - Duration::days(traded_days_ago)),
    }
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_dollar_amount_examples() {
        assert_eq!(format_dollar_amount(1_500_000.0), "$1.5M");
        assert_eq!(format_dollar_amount(999.0), "$999.00");
        assert_eq!(format_dollar_amount(2_000_000_000.0), "$2.0B");
    }

    #[test]
    fn test_unusual_examples() {
        assert!(is_unusual(Some(100), Some(0)));
        assert!(!is_unusual(Some(0), Some(0)));
        assert!(!is_unusual(None, Some(10)));
        assert!(!is_unusual(Some(10), None));
    }

    #[test]
    fn test_example_rows_top_volume() {
        let group = ExpirationGroup::new(
            date(6, 21),
            Side::Call,
            vec![
                row(Side::Call, date(6, 21), 100.0, 500, 600, 0),
                row(Side::Call, date(6, 21), 105.0, 800, 50, 0),
            ],
        );

        let top = top_volume_row(&group).unwrap();
        assert_eq!(top.strike, Some(100.0));
        assert!(is_unusual(top.volume, top.open_interest));
    }

    #[test]
    fn test_ranking_across_dates_truncates_to_top_k() {
        let mut calls = Vec::new();
        let mut puts = Vec::new();
        for (idx, day) in [3u32, 10, 17].iter().enumerate() {
            let expiration = date(7, *day);
            calls.push(ExpirationGroup::new(
                expiration,
                Side::Call,
                vec![row(Side::Call, expiration, 100.0, 1000, 100 + idx as u64 * 10, 0)],
            ));
            puts.push(ExpirationGroup::new(
                expiration,
                Side::Put,
                vec![row(Side::Put, expiration, 90.0, 1000, 105 + idx as u64 * 10, 0)],
            ));
        }
        let chain = NormalizedChain { calls, puts };

        let analysis = AnalysisConfig {
            top_k: 4,
            ..AnalysisConfig::default()
        };
        let today = Local::now().date_naive();
        let active = rank_active_contracts(&chain, &analysis, today);

        let volumes: Vec<u64> = active.iter().map(|a| a.volume).collect();
        assert_eq!(volumes, vec![125, 120, 115, 110]);
        assert_eq!(active[0].side, Side::Put);
        assert_eq!(active[1].side, Side::Call);
    }

    #[test]
    fn test_stale_trades_are_dropped_unless_disabled() {
        let expiration = date(7, 19);
        let chain = NormalizedChain {
            calls: vec![ExpirationGroup::new(
                expiration,
                Side::Call,
                vec![row(Side::Call, expiration, 100.0, 10, 500, 3)],
            )],
            puts: vec![],
        };
        let today = Local::now().date_naive();

        assert!(rank_active_contracts(&chain, &AnalysisConfig::default(), today).is_empty());

        let relaxed = AnalysisConfig {
            require_today_local: false,
            ..AnalysisConfig::default()
        };
        let active = rank_active_contracts(&chain, &relaxed, today);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].notional_text, "$50.0K");
        assert!(active[0].unusual);
    }

    #[test]
    fn test_ranking_is_idempotent() {
        let expiration = date(8, 16);
        let chain = NormalizedChain {
            calls: vec![ExpirationGroup::new(
                expiration,
                Side::Call,
                vec![
                    row(Side::Call, expiration, 100.0, 10, 70, 0),
                    row(Side::Call, expiration, 105.0, 10, 70, 0),
                ],
            )],
            puts: vec![ExpirationGroup::new(
                expiration,
                Side::Put,
                vec![row(Side::Put, expiration, 95.0, 10, 70, 0)],
            )],
        };
        let today = Local::now().date_naive();
        let analysis = AnalysisConfig::default();

        let first = rank_active_contracts(&chain, &analysis, today);
        let second = rank_active_contracts(&chain, &analysis, today);
        assert_eq!(first, second);

        // Equal volumes keep calls before puts and the first strike within a group
        assert_eq!(first[0].strike, Some(100.0));
        assert_eq!(first[1].side, Side::Put);
    }

    #[test]
    fn test_top_row_without_strike_is_skipped() {
        let expiration = date(9, 20);
        let mut busiest = row(Side::Call, expiration, 0.0, 10, 900, 0);
        busiest.strike = None;
        let chain = NormalizedChain {
            calls: vec![ExpirationGroup::new(
                expiration,
                Side::Call,
                vec![busiest, row(Side::Call, expiration, 100.0, 500, 600, 0)],
            )],
            puts: vec![ExpirationGroup::new(
                expiration,
                Side::Put,
                vec![row(Side::Put, expiration, 95.0, 300, 40, 0)],
            )],
        };
        let today = Local::now().date_naive();

        let active = rank_active_contracts(&chain, &AnalysisConfig::default(), today);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].side, Side::Put);
        assert!(active.iter().all(|a| a.strike.is_some()));
    }
}
