// Soil test uploads: opaque blobs renamed to a deterministic pattern and
// stored under a fixed folder prefix.

use std::fs;
use std::path::Path;

use crate::intake::store::{RemoteStore, WriteMode};
use crate::intake::*;

/// The stored name of an uploaded soil test document: a 1-based position
/// within the upload batch, the producer id and the field the document
/// belongs to, keeping the original file extension. No deduplication and
/// no content hashing; a name collision overwrites.
pub fn soil_test_name(position: usize, producer_id: &str, field_index: u32, original: &str) -> String {
    let extension = Path::new(original)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!(
        "soiltest{}_{}_field{}{}",
        position, producer_id, field_index, extension
    )
}

/// Reads each local file and stores it under the uploads folder. Returns
/// how many documents were stored.
pub fn store_soil_tests(
    store: &dyn RemoteStore,
    folder: &str,
    producer_id: &str,
    field_index: u32,
    files: &[String],
) -> IntakeResult<usize> {
    for (idx, file) in files.iter().enumerate() {
        let bytes = fs::read(file).context(ReadingFileSnafu { path: file.clone() })?;
        let name = soil_test_name(idx + 1, producer_id, field_index, file);
        let destination = format!("{}/{}", folder, name);
        store
            .put(&destination, &bytes, WriteMode::Overwrite)
            .context(StoreSnafu {
                path: destination.clone(),
            })?;
        info!(
            "store_soil_tests: {} -> {} ({} bytes)",
            file,
            destination,
            bytes.len()
        );
    }
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_encode_position_producer_and_field() {
        assert_eq!(
            soil_test_name(1, "123456", 1, "/home/u/report.pdf"),
            "soiltest1_123456_field1.pdf"
        );
        assert_eq!(
            soil_test_name(3, "654321", 7, "results.XLSX"),
            "soiltest3_654321_field7.XLSX"
        );
    }

    #[test]
    fn files_without_extension_keep_none() {
        assert_eq!(
            soil_test_name(2, "123456", 4, "/tmp/scan"),
            "soiltest2_123456_field4"
        );
    }
}
