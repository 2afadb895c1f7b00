use log::{debug, info};
use rand::Rng;

use crate::schema::PRODUCER_ID_LEN;
use crate::table::Table;

/// Returns the producer id for a (first name, last name) pair, reusing the
/// stored id when the pair already appears in the table.
///
/// Matching is a case-insensitive exact comparison; the first matching row
/// in table order wins. Two different people sharing a name are silently
/// merged onto one id — that is the product semantics, not an error.
///
/// When the pair is unknown, a fresh fixed-length numeric id is drawn and
/// redrawn until it collides with no existing id. The function is pure
/// over the passed-in table; the caller persists the id into session state.
pub fn resolve_producer_id<R: Rng>(
    table: &Table,
    firstname: &str,
    lastname: &str,
    rng: &mut R,
) -> String {
    let first = firstname.to_lowercase();
    let last = lastname.to_lowercase();

    let firstnames = table.column_values("firstname");
    let lastnames = table.column_values("lastname");
    let ids = table.column_values("producer_id");

    for row in 0..table.num_rows() {
        let row_first = firstnames.get(row).copied().unwrap_or("");
        let row_last = lastnames.get(row).copied().unwrap_or("");
        if row_first.to_lowercase() == first && row_last.to_lowercase() == last {
            if let Some(id) = ids.get(row) {
                debug!(
                    "resolve_producer_id: reusing id {:?} from row {}",
                    id, row
                );
                return id.to_string();
            }
        }
    }

    let id = generate_unused_id(&ids, rng);
    info!("resolve_producer_id: generated fresh id {:?}", id);
    id
}

// The 6-digit space holds a million combinations; for survey-sized tables
// the retry loop terminates almost immediately, so no retry bound is set.
fn generate_unused_id<R: Rng>(existing: &[&str], rng: &mut R) -> String {
    loop {
        let candidate: String = (0..PRODUCER_ID_LEN)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        if !existing.contains(&candidate.as_str()) {
            return candidate;
        }
        debug!("generate_unused_id: collision on {:?}, redrawing", candidate);
    }
}
