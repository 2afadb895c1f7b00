// Wire codec between raw table objects and in-memory tables.

use survey_records::Table;

use crate::intake::*;

/// Parses delimited tabular text, using the first row as the header.
///
/// The decode side is deliberately forgiving: content that is empty after
/// trimming, a first line with no field separator (heuristically not a
/// real header row) or any CSV parse failure all degrade to an empty
/// table typed with `expected_columns`. The store read already reported
/// its own failures; by this point the only acceptable outcome is a table
/// the submission can append to.
pub fn decode_table(bytes: &[u8], expected_columns: &[String]) -> Table {
    let text = String::from_utf8_lossy(bytes);
    let data = text.trim();
    if data.is_empty() {
        debug!("decode_table: empty content");
        return Table::empty(expected_columns);
    }
    let first_line = data.lines().next().unwrap_or("");
    if !first_line.contains(',') {
        debug!("decode_table: first line has no separator, not a header row");
        return Table::empty(expected_columns);
    }

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data.as_bytes());
    let columns: Vec<String> = match rdr.headers() {
        Ok(header) => header.iter().map(str::to_string).collect(),
        Err(e) => {
            warn!("decode_table: header parse failure: {}", e);
            return Table::empty(expected_columns);
        }
    };
    let mut rows: Vec<Vec<String>> = Vec::new();
    for line in rdr.records() {
        match line {
            Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
            Err(e) => {
                warn!(
                    "decode_table: parse failure: {} (degrading to an empty table)",
                    e
                );
                return Table::empty(expected_columns);
            }
        }
    }
    debug!(
        "decode_table: {} row(s), {} column(s)",
        rows.len(),
        columns.len()
    );
    Table::from_parts(columns, rows)
}

/// Serializes the full table, header first. There is no partial write:
/// the caller always replaces the whole object.
pub fn encode_table(table: &Table) -> IntakeResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(table.columns()).context(CsvSerializeSnafu)?;
    for row in table.rows() {
        wtr.write_record(row).context(CsvSerializeSnafu)?;
    }
    wtr.into_inner()
        .map_err(|e| e.into_error())
        .context(BufferFlushSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected() -> Vec<String> {
        vec!["producer_id".to_string(), "firstname".to_string()]
    }

    #[test]
    fn empty_content_degrades_to_expected_columns() {
        let t = decode_table(b"", &expected());
        assert_eq!(t.columns(), &expected()[..]);
        assert_eq!(t.num_rows(), 0);

        let t = decode_table(b"   \n  \n", &expected());
        assert_eq!(t.columns(), &expected()[..]);
        assert_eq!(t.num_rows(), 0);
    }

    #[test]
    fn headerless_content_degrades_to_expected_columns() {
        let t = decode_table(b"garbage", &expected());
        assert_eq!(t.columns(), &expected()[..]);
        assert_eq!(t.num_rows(), 0);
    }

    #[test]
    fn header_only_content_keeps_remote_columns() {
        let t = decode_table(b"a,b\n", &expected());
        assert_eq!(t.columns(), &["a".to_string(), "b".to_string()][..]);
        assert_eq!(t.num_rows(), 0);
    }

    #[test]
    fn short_rows_are_padded() {
        let t = decode_table(b"a,b,c\n1\n", &expected());
        assert_eq!(t.cell(0, "a"), Some("1"));
        assert_eq!(t.cell(0, "c"), Some(""));
    }

    #[test]
    fn encoded_tables_decode_to_the_same_cells() {
        let mut record = survey_records::Record::new();
        record.push("producer_id", "123456".to_string());
        record.push("firstname", "Jane".to_string());
        let mut table = Table::empty(&expected());
        table.push_record(&record);

        let bytes = encode_table(&table).unwrap();
        let decoded = decode_table(&bytes, &expected());
        assert_eq!(decoded, table);
    }

    #[test]
    fn cells_with_commas_survive_the_round_trip() {
        let mut record = survey_records::Record::new();
        record.push("producer_id", "123456".to_string());
        record.push("firstname", "Doe, Jane".to_string());
        let mut table = Table::empty(&expected());
        table.push_record(&record);

        let bytes = encode_table(&table).unwrap();
        let decoded = decode_table(&bytes, &expected());
        assert_eq!(decoded.cell(0, "firstname"), Some("Doe, Jane"));
    }
}
