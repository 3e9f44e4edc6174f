use super::models::{ContractRow, ExpirationGroup, NormalizedChain, Side};
use crate::error::ChainError;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Scratch CSV record before coercion; every field is kept as text
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default)]
    strike: String,
    #[serde(default)]
    last_price: String,
    #[serde(default)]
    volume: String,
    #[serde(default)]
    open_interest: String,
    #[serde(default)]
    last_trade_date: String,
}

/// Counters collected while normalizing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub rows: usize,
    pub malformed_fields: usize,
    pub unreadable_rows: usize,
    pub skipped_files: usize,
}

/// Read both sides from the scratch area into an ordered chain
pub fn normalize_scratch(
    ticker: &str,
    dir: &Path,
) -> Result<(NormalizedChain, NormalizeReport), ChainError> {
    let mut report = NormalizeReport::default();

    let chain = NormalizedChain {
        calls: load_side(&dir.join(Side::Call.file_suffix()), Side::Call, &mut report)?,
        puts: load_side(&dir.join(Side::Put.file_suffix()), Side::Put, &mut report)?,
    };

    if chain.is_empty() {
        return Err(ChainError::EmptyChain(ticker.to_string()));
    }

    debug!(
        ticker,
        rows = report.rows,
        malformed_fields = report.malformed_fields,
        "Chain normalized"
    );
    Ok((chain, report))
}

/// Load every `YYYYMMDD{SIDE}.csv` file of a side, ordered by calendar date
pub fn load_side(
    side_dir: &Path,
    side: Side,
    report: &mut NormalizeReport,
) -> Result<Vec<ExpirationGroup>, ChainError> {
    let mut groups = Vec::new();

    for entry in std::fs::read_dir(side_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let Some(expiration) = parse_expiration_filename(name, side) else {
            warn!(file = name, "Skipping file without a valid expiration date");
            report.skipped_files += 1;
            continue;
        };

        let file = std::fs::File::open(&path)?;
        let rows = normalize_records(file, expiration, side, report);
        if rows.is_empty() {
            continue;
        }

        groups.push(ExpirationGroup::new(expiration, side, rows));
    }

    // Directory order follows fetch completion, not the calendar
    groups.sort_by_key(|g| g.expiration);
    Ok(groups)
}

/// `20240621CALLS.csv` -> 2024-06-21
pub fn parse_expiration_filename(name: &str, side: Side) -> Option<NaiveDate> {
    let stem = name.strip_suffix(".csv")?;
    let digits = stem.strip_suffix(side.file_suffix())?;
    if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

/// Coerce CSV records of one (expiration, side) into typed rows
pub fn normalize_records<R: Read>(
    reader: R,
    expiration: NaiveDate,
    side: Side,
    report: &mut NormalizeReport,
) -> Vec<ContractRow> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut rows = Vec::new();

    for record in csv_reader.deserialize::<RawRecord>() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(%expiration, %side, error = %e, "Unreadable option row");
                report.unreadable_rows += 1;
                continue;
            }
        };

        let strike = recover(parse_decimal(&record.strike, "strike"), report);
        let last_price = recover(parse_decimal(&record.last_price, "lastPrice"), report)
            .filter(|price| *price >= 0.0);
        let volume = recover(parse_count(&record.volume, "volume"), report);
        let open_interest = recover(parse_count(&record.open_interest, "openInterest"), report);
        let last_trade = recover(parse_trade_timestamp(&record.last_trade_date), report);

        rows.push(ContractRow {
            strike,
            side,
            expiration,
            open_interest,
            volume,
            last_price,
            last_trade,
        });
        report.rows += 1;
    }

    rows
}

/// A malformed field becomes unknown; the row survives
fn recover<T>(parsed: Result<Option<T>, ChainError>, report: &mut NormalizeReport) -> Option<T> {
    match parsed {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Treating field as unknown");
            report.malformed_fields += 1;
            None
        }
    }
}

pub fn parse_decimal(raw: &str, field: &'static str) -> Result<Option<f64>, ChainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(ChainError::MalformedRow {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Non-negative whole count; exports often carry floats such as `12.0`
pub fn parse_count(raw: &str, field: &'static str) -> Result<Option<u64>, ChainError> {
    match parse_decimal(raw, field)? {
        None => Ok(None),
        Some(value) if value >= 0.0 && value.fract() == 0.0 => Ok(Some(value as u64)),
        Some(_) => Err(ChainError::MalformedRow {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Parse a trade time (UTC unless an offset is given) into local time
pub fn parse_trade_timestamp(raw: &str) -> Result<Option<DateTime<Local>>, ChainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nat") {
        return Ok(None);
    }

    let with_offset = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%:z")
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed));

    if let Ok(ts) = with_offset {
        return Ok(Some(ts.with_timezone(&Local)));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .map(|naive| Some(naive.and_utc().with_timezone(&Local)))
        .map_err(|_| ChainError::MalformedRow {
            field: "lastTradeDate",
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike, Utc};

    #[test]
    fn test_parse_expiration_filename() {
        assert_eq!(
            parse_expiration_filename("20240621CALLS.csv", Side::Call),
            NaiveDate::from_ymd_opt(2024, 6, 21)
        );
        assert_eq!(parse_expiration_filename("20240621CALLS.csv", Side::Put), None);
        assert_eq!(parse_expiration_filename("2024062CALLS.csv", Side::Call), None);
        assert_eq!(parse_expiration_filename("20241341PUTS.csv", Side::Put), None);
        assert_eq!(parse_expiration_filename("notes.txt", Side::Put), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12", "volume").unwrap(), Some(12));
        assert_eq!(parse_count("12.0", "volume").unwrap(), Some(12));
        assert_eq!(parse_count("", "volume").unwrap(), None);
        assert_eq!(parse_count("NaN", "volume").unwrap(), None);
        assert!(parse_count("-3", "volume").is_err());
        assert!(parse_count("abc", "volume").is_err());
    }

    #[test]
    fn test_parse_trade_timestamp_is_utc() {
        let ts = parse_trade_timestamp("2024-06-21 19:59:58+00:00").unwrap().unwrap();
        let utc = ts.with_timezone(&Utc);
        assert_eq!((utc.year(), utc.month(), utc.day()), (2024, 6, 21));
        assert_eq!((utc.hour(), utc.minute(), utc.second()), (19, 59, 58));

        let naive = parse_trade_timestamp("2024-06-21 19:59:58").unwrap().unwrap();
        assert_eq!(naive, ts);

        assert_eq!(parse_trade_timestamp("").unwrap(), None);
        assert!(parse_trade_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_malformed_fields_keep_row() {
        let csv = "contractSymbol,strike,lastPrice,volume,openInterest,lastTradeDate\n\
                   A,100,1.5,abc,500,2024-06-21 19:59:58+00:00\n\
                   B,105,,50,,\n";
        let mut report = NormalizeReport::default();
        let expiration = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();

        let rows = normalize_records(csv.as_bytes(), expiration, Side::Call, &mut report);

        assert_eq!(rows.len(), 2);
        assert_eq!(report.malformed_fields, 1);
        assert_eq!(rows[0].volume, None);
        assert_eq!(rows[0].open_interest, Some(500));
        assert_eq!(rows[1].last_price, None);
        assert_eq!(rows[1].open_interest, None);
        assert_eq!(rows[1].last_trade, None);
    }
}
