use std::path::Path;
use tempfile::TempDir;
use vectr::chain::normalizer::normalize_scratch;
use vectr::chain::{ScratchDir, Side};
use vectr::ChainError;

const HEADER: &str = "contractSymbol,strike,lastPrice,volume,openInterest,lastTradeDate\n";

fn write(dir: &Path, side: Side, name: &str, body: &str) {
    std::fs::write(dir.join(side.file_suffix()).join(name), format!("{}{}", HEADER, body)).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_are_ordered_by_calendar_date() {
        let root = TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), "TEST").unwrap();

        write(scratch.path(), Side::Call, "20250117CALLS.csv", "A,100,1.0,5,10,\n");
        write(scratch.path(), Side::Call, "20240621CALLS.csv", "B,100,1.0,5,10,\n");
        write(scratch.path(), Side::Call, "20241220CALLS.csv", "C,100,1.0,5,10,\n");
        write(scratch.path(), Side::Put, "20240719PUTS.csv", "D,90,1.0,5,10,\n");

        let (chain, report) = normalize_scratch("TEST", scratch.path()).unwrap();

        let labels: Vec<&str> = chain.calls.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["06/21/24", "12/20/24", "01/17/25"]);
        assert_eq!(chain.puts.len(), 1);
        assert_eq!(report.rows, 4);
        assert_eq!(chain.expirations().len(), 4);
    }

    #[test]
    fn test_bad_filenames_are_skipped() {
        let root = TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), "TEST").unwrap();

        write(scratch.path(), Side::Call, "20240621CALLS.csv", "A,100,1.0,5,10,\n");
        write(scratch.path(), Side::Call, "latest.csv", "B,100,1.0,5,10,\n");

        let (chain, report) = normalize_scratch("TEST", scratch.path()).unwrap();
        assert_eq!(chain.calls.len(), 1);
        assert_eq!(report.skipped_files, 1);
    }

    #[test]
    fn test_no_rows_is_empty_chain() {
        let root = TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), "TEST").unwrap();
        write(scratch.path(), Side::Put, "20240621PUTS.csv", "");

        let err = normalize_scratch("TEST", scratch.path()).unwrap_err();
        assert!(matches!(err, ChainError::EmptyChain(_)));
        assert!(err.is_empty_result());
    }

    #[test]
    fn test_scratch_dir_is_removed() {
        let root = TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), "TEST").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.join("CALLS").is_dir());
        assert!(path.join("PUTS").is_dir());

        scratch.close().unwrap();
        assert!(!path.exists());

        let dropped = ScratchDir::create(root.path(), "TEST").unwrap();
        let dropped_path = dropped.path().to_path_buf();
        drop(dropped);
        assert!(!dropped_path.exists());
    }
}
