//! Record reconciliation and append protocol for a two-table survey
//! dataset (producers and their fields).
//!
//! The crate is pure: it models tables, typed records, respondent
//! identity and the session state machine, and merges one record into a
//! table with outer-join column semantics. Fetching and writing the
//! tables, and everything else with a side effect, belongs to the caller.

mod identity;
mod schema;
mod session;
mod table;

use log::{debug, info};

pub use crate::identity::*;
pub use crate::schema::*;
pub use crate::session::*;
pub use crate::table::*;

/// Merges one record into a table and returns the resulting table.
///
/// Artifact columns left behind by earlier serializations are dropped
/// first, then the record is appended as the final row: historical
/// columns absent from the record stay (empty cell in the new row) and
/// record keys absent from history become new columns (empty cells in
/// all prior rows). Nothing else is touched — rows are never updated or
/// deleted in place.
///
/// ```
/// use survey_records::{append_record, Record, Table};
///
/// let base = Table::empty(&["producer_id".to_string(), "age".to_string()]);
/// let mut record = Record::new();
/// record.push("producer_id", "123456".to_string());
/// let merged = append_record(&base, &record);
/// assert_eq!(merged.num_rows(), 1);
/// assert_eq!(merged.cell(0, "age"), Some(""));
/// ```
pub fn append_record(table: &Table, record: &Record) -> Table {
    let mut merged = table.clone();
    let dropped = merged.strip_artifact_columns();
    if dropped > 0 {
        debug!("append_record: dropped {} artifact column(s)", dropped);
    }
    merged.push_record(record);
    info!(
        "append_record: {} row(s), {} column(s) after merge",
        merged.num_rows(),
        merged.columns().len()
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn append_to_empty_table_types_all_expected_columns() {
        let base = Table::empty(&ProducerRecord::columns());
        let record = ProducerRecord {
            producer_id: "123456".to_string(),
            firstname: "Jane".to_string(),
            lastname: "Doe".to_string(),
            ..ProducerRecord::default()
        }
        .to_record();
        let merged = append_record(&base, &record);
        assert_eq!(merged.num_rows(), 1);
        assert_eq!(merged.columns(), &ProducerRecord::columns()[..]);
        assert_eq!(merged.cell(0, "firstname"), Some("Jane"));
        assert_eq!(merged.cell(0, "email"), Some(""));
    }

    #[test]
    fn append_preserves_historical_only_columns() {
        // A column retired from the current form definition must survive
        // the merge, with an empty cell in the new row.
        let base = Table::from_parts(
            cols(&["producer_id", "years_irr"]),
            vec![vec!["111111".to_string(), "12".to_string()]],
        );
        let mut record = Record::new();
        record.push("producer_id", "222222".to_string());
        record.push("farm_size", "800".to_string());
        let merged = append_record(&base, &record);
        assert_eq!(
            merged.columns(),
            &cols(&["producer_id", "years_irr", "farm_size"])[..]
        );
        assert_eq!(merged.cell(0, "years_irr"), Some("12"));
        assert_eq!(merged.cell(0, "farm_size"), Some(""));
        assert_eq!(merged.cell(1, "years_irr"), Some(""));
        assert_eq!(merged.cell(1, "farm_size"), Some("800"));
    }

    #[test]
    fn append_drops_artifact_columns_before_merging() {
        let base = Table::from_parts(
            cols(&["Unnamed: 0", "producer_id"]),
            vec![vec!["0".to_string(), "111111".to_string()]],
        );
        let mut record = Record::new();
        record.push("producer_id", "222222".to_string());
        let merged = append_record(&base, &record);
        assert_eq!(merged.columns(), &cols(&["producer_id"])[..]);
        assert_eq!(merged.num_rows(), 2);
    }

    #[test]
    fn append_does_not_modify_the_input() {
        let base = Table::empty(&cols(&["producer_id"]));
        let mut record = Record::new();
        record.push("producer_id", "123456".to_string());
        let _ = append_record(&base, &record);
        assert_eq!(base.num_rows(), 0);
    }
}
