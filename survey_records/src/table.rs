use log::debug;

use crate::schema::Record;

/// An in-memory flat table: a header and rows of text cells.
///
/// Rows are kept padded to the header width at all times. The table is a
/// transient value owned by the current submission; durable state lives in
/// the remote store.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// An empty table typed with the given columns.
    pub fn empty(columns: &[String]) -> Table {
        Table {
            columns: columns.to_vec(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from a parsed header and rows. Short rows are padded
    /// with empty cells, long rows keep their extra cells only up to the
    /// header width.
    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<String>>) -> Table {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Table { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// The cell at (row, column), if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// All values of one column, in row order. Empty when the column is
    /// not present.
    pub fn column_values(&self, column: &str) -> Vec<&str> {
        match self.column_index(column) {
            Some(idx) => self.rows.iter().map(|r| r[idx].as_str()).collect(),
            None => Vec::new(),
        }
    }

    /// Removes serialization artifact columns (unlabeled index columns)
    /// together with their cells. Returns how many columns were removed.
    pub fn strip_artifact_columns(&mut self) -> usize {
        let doomed: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| is_artifact_column(c))
            .map(|(idx, _)| idx)
            .collect();
        // Remove from the right so earlier indices stay valid.
        for &idx in doomed.iter().rev() {
            debug!(
                "strip_artifact_columns: dropping column {:?} at index {}",
                self.columns[idx], idx
            );
            self.columns.remove(idx);
            for row in self.rows.iter_mut() {
                row.remove(idx);
            }
        }
        doomed.len()
    }

    /// Appends a record as the final row with outer-join semantics on the
    /// columns: historical columns missing from the record get an empty
    /// cell in the new row, and record keys unknown to the table become
    /// new columns with empty cells in all prior rows.
    pub fn push_record(&mut self, record: &Record) {
        for (column, _) in record.iter() {
            if self.column_index(column).is_none() {
                self.columns.push(column.to_string());
                for row in self.rows.iter_mut() {
                    row.push(String::new());
                }
            }
        }
        let mut row = vec![String::new(); self.columns.len()];
        for (column, value) in record.iter() {
            // Every key is present after the loop above.
            if let Some(idx) = self.column_index(column) {
                row[idx] = value.to_string();
            }
        }
        self.rows.push(row);
    }
}

/// An unlabeled index column produced by some prior serialization of the
/// table. These carry no survey data and are dropped before appending.
pub fn is_artifact_column(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed == "Unnamed" || trimmed.starts_with("Unnamed:")
}

/// Opaque revision token for a blob of table content. Two byte strings
/// compare equal exactly when their tokens do.
pub fn content_revision(bytes: &[u8]) -> String {
    sha256::digest(String::from_utf8_lossy(bytes).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_table_keeps_expected_columns() {
        let t = Table::empty(&cols(&["a", "b"]));
        assert_eq!(t.columns(), &cols(&["a", "b"])[..]);
        assert_eq!(t.num_rows(), 0);
    }

    #[test]
    fn short_rows_are_padded() {
        let t = Table::from_parts(cols(&["a", "b", "c"]), vec![vec!["1".to_string()]]);
        assert_eq!(t.cell(0, "b"), Some(""));
        assert_eq!(t.cell(0, "c"), Some(""));
    }

    #[test]
    fn push_record_with_subset_of_columns() {
        let mut t = Table::from_parts(
            cols(&["a", "b"]),
            vec![vec!["1".to_string(), "2".to_string()]],
        );
        let mut rec = Record::new();
        rec.push("a", "3".to_string());
        t.push_record(&rec);
        assert_eq!(t.num_rows(), 2);
        assert_eq!(t.cell(1, "a"), Some("3"));
        assert_eq!(t.cell(1, "b"), Some(""));
    }

    #[test]
    fn push_record_with_new_columns_backfills_history() {
        let mut t = Table::from_parts(cols(&["a"]), vec![vec!["1".to_string()]]);
        let mut rec = Record::new();
        rec.push("a", "2".to_string());
        rec.push("b", "fresh".to_string());
        t.push_record(&rec);
        assert_eq!(t.columns(), &cols(&["a", "b"])[..]);
        assert_eq!(t.cell(0, "b"), Some(""));
        assert_eq!(t.cell(1, "b"), Some("fresh"));
    }

    #[test]
    fn artifact_columns_are_dropped_with_their_cells() {
        let mut t = Table::from_parts(
            cols(&["Unnamed: 0", "a", "", "b"]),
            vec![vec![
                "0".to_string(),
                "1".to_string(),
                "x".to_string(),
                "2".to_string(),
            ]],
        );
        assert_eq!(t.strip_artifact_columns(), 2);
        assert_eq!(t.columns(), &cols(&["a", "b"])[..]);
        assert_eq!(t.cell(0, "a"), Some("1"));
        assert_eq!(t.cell(0, "b"), Some("2"));
    }

    #[test]
    fn revision_tracks_content() {
        let r1 = content_revision(b"a,b\n1,2\n");
        let r2 = content_revision(b"a,b\n1,2\n");
        let r3 = content_revision(b"a,b\n1,3\n");
        assert_eq!(r1, r2);
        assert_ne!(r1, r3);
    }
}
