// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// Length of a producer identifier, in decimal digits.
pub const PRODUCER_ID_LEN: usize = 6;

/// Sentinel stored in place of a producer id when a field record is
/// submitted by a session that never completed the producer step.
/// The row is still written, just unattributed.
pub const MISSING_PRODUCER_ID: &str = "error";

/// Number of input-application blocks serialized per field row.
pub const MAX_INPUT_APPLICATIONS: usize = 6;

/// Number of irrigation-event blocks serialized per field row.
pub const MAX_IRRIGATION_EVENTS: usize = 8;

/// An ordered list of column/value pairs, ready to be appended to a table.
///
/// The key order is the write-time column order; absent optional answers
/// are carried as empty cells so that the serialized form stays compatible
/// with historical data.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Record {
        Record { fields: Vec::new() }
    }

    pub fn push(&mut self, column: &str, value: String) {
        self.fields.push((column.to_string(), value));
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn opt_cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn bool_cell(value: bool) -> String {
    if value {
        "true".to_string()
    } else {
        "false".to_string()
    }
}

/// One row of the producer table.
///
/// Every demographic answer is optional; the identifier and the name pair
/// are always present (the name may be blank, which the identity resolver
/// treats like any other name).
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ProducerRecord {
    pub producer_id: String,
    pub firstname: String,
    pub lastname: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub age: Option<String>,
    pub ed_level: Option<String>,
    pub kn_extension_agent: bool,
    pub kn_prv_consult: bool,
    pub kn_product_vendor: bool,
    pub kn_self: bool,
    pub kn_other: bool,
    pub farm_size: Option<String>,
    pub irr_wheat_ac: Option<String>,
    pub farm_purpose: Option<String>,
    pub water_limits: Option<String>,
    pub statement1: Option<String>,
    pub statement2: Option<String>,
}

impl ProducerRecord {
    /// The expected column set of the producer table, in write order.
    pub fn columns() -> Vec<String> {
        ProducerRecord::default().to_record().columns()
    }

    pub fn to_record(&self) -> Record {
        let mut r = Record::new();
        r.push("producer_id", self.producer_id.clone());
        r.push("firstname", self.firstname.clone());
        r.push("lastname", self.lastname.clone());
        r.push("phone", opt_cell(&self.phone));
        r.push("email", opt_cell(&self.email));
        r.push("age", opt_cell(&self.age));
        r.push("ed_level", opt_cell(&self.ed_level));
        r.push("kn_extension_agent", bool_cell(self.kn_extension_agent));
        r.push("kn_prv_consult", bool_cell(self.kn_prv_consult));
        r.push("kn_product_vendor", bool_cell(self.kn_product_vendor));
        r.push("kn_self", bool_cell(self.kn_self));
        r.push("kn_other", bool_cell(self.kn_other));
        r.push("farm_size", opt_cell(&self.farm_size));
        r.push("irr_wheat_ac", opt_cell(&self.irr_wheat_ac));
        r.push("farm_purpose", opt_cell(&self.farm_purpose));
        r.push("water_limits", opt_cell(&self.water_limits));
        r.push("statement1", opt_cell(&self.statement1));
        r.push("statement2", opt_cell(&self.statement2));
        r
    }
}

/// One product application reported for a field (fertilizer, lime,
/// micronutrients, crop protection...). Up to [MAX_INPUT_APPLICATIONS]
/// blocks are serialized per row.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct InputApplication {
    pub product: Option<String>,
    pub rate: Option<String>,
    pub time: Option<String>,
    pub date: Option<String>,
    pub nutrient: Option<String>,
}

/// One irrigation event reported for a field. Up to
/// [MAX_IRRIGATION_EVENTS] blocks are serialized per row.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct IrrigationEvent {
    pub date: Option<String>,
    pub stage: Option<String>,
    pub amount: Option<String>,
    pub rate: Option<String>,
    pub fertigation: Option<String>,
}

/// One row of the field table.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FieldRecord {
    pub producer_id: String,
    pub field_number: u32,
    pub lat: Option<String>,
    pub long: Option<String>,
    pub county_ident: Option<String>,
    pub section: Option<String>,
    pub township: Option<String>,
    pub range: Option<String>,
    pub field_size: Option<String>,
    pub field_size_unit: Option<String>,
    pub crop_purpose: Option<String>,
    pub prev_crop: Option<String>,
    pub prev_crop_year: Option<String>,
    pub prev_crop_irr: Option<String>,
    pub planting_date: Option<String>,
    pub harvest_date: Option<String>,
    pub cultivar: Option<String>,
    pub seed_source: Option<String>,
    pub seed_cleaned: Option<String>,
    pub seed_treat: Option<String>,
    pub profile_h2o: Option<String>,
    pub row_space: Option<String>,
    pub seeding_rate: Option<String>,
    pub seeding_rate_unit: Option<String>,
    pub grain_yield: Option<String>,
    pub yield_unit: Option<String>,
    pub forage_yield: Option<String>,
    pub forage_unit: Option<String>,
    pub impacting_events: Option<String>,
    pub k_soil: Option<String>,
    pub p_soil: Option<String>,
    pub n_soil: Option<String>,
    pub n_soildepth: Option<String>,
    pub applications: Vec<InputApplication>,
    pub irrigated: Option<String>,
    pub irr_shared: Option<String>,
    pub irr_decision: Option<String>,
    pub irr_type: Option<String>,
    pub system_config: Option<String>,
    pub system_capacity: Option<String>,
    pub water_source: Option<String>,
    pub capacity_flux: Option<String>,
    pub pre_plant_water: Option<String>,
    pub irr_number: Option<String>,
    pub irrigation_events: Vec<IrrigationEvent>,
}

impl FieldRecord {
    /// The expected column set of the field table, in write order.
    pub fn columns() -> Vec<String> {
        FieldRecord::default().to_record().columns()
    }

    /// Checks the repeated blocks against their serialized capacity.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.applications.len() > MAX_INPUT_APPLICATIONS {
            return Err(SchemaError::TooManyApplications {
                count: self.applications.len(),
            });
        }
        if self.irrigation_events.len() > MAX_IRRIGATION_EVENTS {
            return Err(SchemaError::TooManyIrrigationEvents {
                count: self.irrigation_events.len(),
            });
        }
        Ok(())
    }

    pub fn to_record(&self) -> Record {
        let mut r = Record::new();
        r.push("producer_id", self.producer_id.clone());
        r.push("field_number", self.field_number.to_string());
        r.push("lat", opt_cell(&self.lat));
        r.push("long", opt_cell(&self.long));
        r.push("county_ident", opt_cell(&self.county_ident));
        r.push("section", opt_cell(&self.section));
        r.push("township", opt_cell(&self.township));
        r.push("range", opt_cell(&self.range));
        r.push("field_size", opt_cell(&self.field_size));
        r.push("field_size_unit", opt_cell(&self.field_size_unit));
        r.push("crop_purpose", opt_cell(&self.crop_purpose));
        r.push("prev_crop", opt_cell(&self.prev_crop));
        r.push("prev_crop_year", opt_cell(&self.prev_crop_year));
        r.push("prev_crop_irr", opt_cell(&self.prev_crop_irr));
        r.push("planting_date", opt_cell(&self.planting_date));
        r.push("harvest_date", opt_cell(&self.harvest_date));
        r.push("cultivar", opt_cell(&self.cultivar));
        r.push("seed_source", opt_cell(&self.seed_source));
        r.push("seed_cleaned", opt_cell(&self.seed_cleaned));
        r.push("seed_treat", opt_cell(&self.seed_treat));
        r.push("profile_h2o", opt_cell(&self.profile_h2o));
        r.push("row_space", opt_cell(&self.row_space));
        r.push("seeding_rate", opt_cell(&self.seeding_rate));
        r.push("seeding_rate_unit", opt_cell(&self.seeding_rate_unit));
        r.push("grain_yield", opt_cell(&self.grain_yield));
        r.push("yield_unit", opt_cell(&self.yield_unit));
        r.push("forage_yield", opt_cell(&self.forage_yield));
        r.push("forage_unit", opt_cell(&self.forage_unit));
        r.push("impacting_events", opt_cell(&self.impacting_events));
        r.push("k_soil", opt_cell(&self.k_soil));
        r.push("p_soil", opt_cell(&self.p_soil));
        r.push("n_soil", opt_cell(&self.n_soil));
        r.push("n_soildepth", opt_cell(&self.n_soildepth));
        let default_app = InputApplication::default();
        for idx in 0..MAX_INPUT_APPLICATIONS {
            let app = self.applications.get(idx).unwrap_or(&default_app);
            let n = idx + 1;
            r.push(&format!("app{}_product", n), opt_cell(&app.product));
            r.push(&format!("app{}_rate", n), opt_cell(&app.rate));
            r.push(&format!("app{}_time", n), opt_cell(&app.time));
            r.push(&format!("app{}_date", n), opt_cell(&app.date));
            r.push(&format!("app{}_nutrient", n), opt_cell(&app.nutrient));
        }
        r.push("irrigated", opt_cell(&self.irrigated));
        r.push("irr_shared", opt_cell(&self.irr_shared));
        r.push("irr_decision", opt_cell(&self.irr_decision));
        r.push("irr_type", opt_cell(&self.irr_type));
        r.push("system_config", opt_cell(&self.system_config));
        r.push("system_capacity", opt_cell(&self.system_capacity));
        r.push("water_source", opt_cell(&self.water_source));
        r.push("capacity_flux", opt_cell(&self.capacity_flux));
        r.push("pre_plant_water", opt_cell(&self.pre_plant_water));
        r.push("irr_number", opt_cell(&self.irr_number));
        let default_event = IrrigationEvent::default();
        for idx in 0..MAX_IRRIGATION_EVENTS {
            let event = self.irrigation_events.get(idx).unwrap_or(&default_event);
            let n = idx + 1;
            r.push(&format!("irr{}_date", n), opt_cell(&event.date));
            r.push(&format!("irr{}_stage", n), opt_cell(&event.stage));
            r.push(&format!("irr{}_amount", n), opt_cell(&event.amount));
            r.push(&format!("irr{}_rate", n), opt_cell(&event.rate));
            r.push(&format!("irr{}_fertigation", n), opt_cell(&event.fertigation));
        }
        r
    }
}

/// Errors raised when a typed record cannot be serialized to a row.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SchemaError {
    TooManyApplications { count: usize },
    TooManyIrrigationEvents { count: usize },
}

impl Error for SchemaError {}

impl Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::TooManyApplications { count } => write!(
                f,
                "too many input applications: {} (at most {})",
                count, MAX_INPUT_APPLICATIONS
            ),
            SchemaError::TooManyIrrigationEvents { count } => write!(
                f,
                "too many irrigation events: {} (at most {})",
                count, MAX_IRRIGATION_EVENTS
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_columns_are_stable() {
        let cols = ProducerRecord::columns();
        assert_eq!(cols.first().map(String::as_str), Some("producer_id"));
        assert_eq!(cols.last().map(String::as_str), Some("statement2"));
        assert_eq!(cols.len(), 18);
    }

    #[test]
    fn field_columns_cover_all_blocks() {
        let cols = FieldRecord::columns();
        assert_eq!(cols.first().map(String::as_str), Some("producer_id"));
        assert!(cols.contains(&"app6_nutrient".to_string()));
        assert!(cols.contains(&"irr8_fertigation".to_string()));
        assert_eq!(cols.last().map(String::as_str), Some("irr8_fertigation"));
        // 33 scalars + 6 application blocks + 10 irrigation scalars + 8 event blocks
        assert_eq!(cols.len(), 33 + 30 + 10 + 40);
    }

    #[test]
    fn absent_optionals_become_empty_cells() {
        let rec = ProducerRecord {
            producer_id: "123456".to_string(),
            firstname: "Jane".to_string(),
            lastname: "Doe".to_string(),
            ..ProducerRecord::default()
        }
        .to_record();
        assert_eq!(rec.get("phone"), Some(""));
        assert_eq!(rec.get("kn_self"), Some("false"));
        assert_eq!(rec.get("producer_id"), Some("123456"));
    }

    #[test]
    fn partial_blocks_pad_to_capacity() {
        let field = FieldRecord {
            producer_id: "123456".to_string(),
            field_number: 2,
            applications: vec![InputApplication {
                product: Some("18-46-00 DAP".to_string()),
                rate: Some("30 lbs/ac".to_string()),
                ..InputApplication::default()
            }],
            ..FieldRecord::default()
        };
        let rec = field.to_record();
        assert_eq!(rec.get("app1_product"), Some("18-46-00 DAP"));
        assert_eq!(rec.get("app2_product"), Some(""));
        assert_eq!(rec.get("field_number"), Some("2"));
    }

    #[test]
    fn validate_rejects_oversized_blocks() {
        let field = FieldRecord {
            irrigation_events: vec![IrrigationEvent::default(); MAX_IRRIGATION_EVENTS + 1],
            ..FieldRecord::default()
        };
        assert_eq!(
            field.validate(),
            Err(SchemaError::TooManyIrrigationEvents {
                count: MAX_IRRIGATION_EVENTS + 1
            })
        );
    }
}
