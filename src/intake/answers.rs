// Form answer documents, as produced by the form renderer.
//
// Every answer is optional: a respondent who does not know the answer to
// a question leaves it blank, and the blank travels all the way to an
// empty CSV cell. Dates are the one exception to the pass-through rule:
// they are normalized to ISO-8601 at intake.

use std::fs;

use serde::{Deserialize, Serialize};

use survey_records::{FieldRecord, InputApplication, IrrigationEvent, ProducerRecord};

use crate::intake::*;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProducerAnswers {
    #[serde(rename = "firstName", default)]
    pub first_name: String,
    #[serde(rename = "lastName", default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(rename = "edLevel", default)]
    pub ed_level: Option<String>,
    #[serde(rename = "knExtensionAgent", default)]
    pub kn_extension_agent: bool,
    #[serde(rename = "knPrvConsult", default)]
    pub kn_prv_consult: bool,
    #[serde(rename = "knProductVendor", default)]
    pub kn_product_vendor: bool,
    #[serde(rename = "knSelf", default)]
    pub kn_self: bool,
    #[serde(rename = "knOther", default)]
    pub kn_other: bool,
    #[serde(rename = "farmSize", default)]
    pub farm_size: Option<String>,
    #[serde(rename = "irrWheatAc", default)]
    pub irr_wheat_ac: Option<String>,
    #[serde(rename = "farmPurpose", default)]
    pub farm_purpose: Option<String>,
    #[serde(rename = "waterLimits", default)]
    pub water_limits: Option<String>,
    #[serde(default)]
    pub statement1: Option<String>,
    #[serde(default)]
    pub statement2: Option<String>,
}

impl ProducerAnswers {
    pub fn into_record(self, producer_id: String) -> ProducerRecord {
        ProducerRecord {
            producer_id,
            firstname: self.first_name,
            lastname: self.last_name,
            phone: self.phone,
            email: self.email,
            age: self.age,
            ed_level: self.ed_level,
            kn_extension_agent: self.kn_extension_agent,
            kn_prv_consult: self.kn_prv_consult,
            kn_product_vendor: self.kn_product_vendor,
            kn_self: self.kn_self,
            kn_other: self.kn_other,
            farm_size: self.farm_size,
            irr_wheat_ac: self.irr_wheat_ac,
            farm_purpose: self.farm_purpose,
            water_limits: self.water_limits,
            statement1: self.statement1,
            statement2: self.statement2,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationAnswers {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub rate: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub nutrient: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrrigationAnswers {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub rate: Option<String>,
    #[serde(default)]
    pub fertigation: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldAnswers {
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub long: Option<String>,
    #[serde(rename = "countyIdent", default)]
    pub county_ident: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub township: Option<String>,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(rename = "fieldSize", default)]
    pub field_size: Option<String>,
    #[serde(rename = "fieldSizeUnit", default)]
    pub field_size_unit: Option<String>,
    #[serde(rename = "cropPurpose", default)]
    pub crop_purpose: Option<String>,
    #[serde(rename = "prevCrop", default)]
    pub prev_crop: Option<String>,
    #[serde(rename = "prevCropYear", default)]
    pub prev_crop_year: Option<String>,
    #[serde(rename = "prevCropIrr", default)]
    pub prev_crop_irr: Option<String>,
    #[serde(rename = "plantingDate", default)]
    pub planting_date: Option<String>,
    #[serde(rename = "harvestDate", default)]
    pub harvest_date: Option<String>,
    #[serde(default)]
    pub cultivar: Option<String>,
    #[serde(rename = "seedSource", default)]
    pub seed_source: Option<String>,
    #[serde(rename = "seedCleaned", default)]
    pub seed_cleaned: Option<String>,
    #[serde(rename = "seedTreat", default)]
    pub seed_treat: Option<String>,
    #[serde(rename = "profileH2o", default)]
    pub profile_h2o: Option<String>,
    #[serde(rename = "rowSpace", default)]
    pub row_space: Option<String>,
    #[serde(rename = "seedingRate", default)]
    pub seeding_rate: Option<String>,
    #[serde(rename = "seedingRateUnit", default)]
    pub seeding_rate_unit: Option<String>,
    #[serde(rename = "grainYield", default)]
    pub grain_yield: Option<String>,
    #[serde(rename = "yieldUnit", default)]
    pub yield_unit: Option<String>,
    #[serde(rename = "forageYield", default)]
    pub forage_yield: Option<String>,
    #[serde(rename = "forageUnit", default)]
    pub forage_unit: Option<String>,
    #[serde(rename = "impactingEvents", default)]
    pub impacting_events: Option<String>,
    #[serde(rename = "kSoil", default)]
    pub k_soil: Option<String>,
    #[serde(rename = "pSoil", default)]
    pub p_soil: Option<String>,
    #[serde(rename = "nSoil", default)]
    pub n_soil: Option<String>,
    #[serde(rename = "nSoildepth", default)]
    pub n_soildepth: Option<String>,
    #[serde(default)]
    pub applications: Vec<ApplicationAnswers>,
    #[serde(default)]
    pub irrigated: Option<String>,
    #[serde(rename = "irrShared", default)]
    pub irr_shared: Option<String>,
    #[serde(rename = "irrDecision", default)]
    pub irr_decision: Option<String>,
    #[serde(rename = "irrType", default)]
    pub irr_type: Option<String>,
    #[serde(rename = "systemConfig", default)]
    pub system_config: Option<String>,
    #[serde(rename = "systemCapacity", default)]
    pub system_capacity: Option<String>,
    #[serde(rename = "waterSource", default)]
    pub water_source: Option<String>,
    #[serde(rename = "capacityFlux", default)]
    pub capacity_flux: Option<String>,
    #[serde(rename = "prePlantWater", default)]
    pub pre_plant_water: Option<String>,
    #[serde(rename = "irrNumber", default)]
    pub irr_number: Option<String>,
    #[serde(rename = "irrigationEvents", default)]
    pub irrigation_events: Vec<IrrigationAnswers>,
}

impl FieldAnswers {
    pub fn into_record(self, producer_id: &str, field_number: u32) -> IntakeResult<FieldRecord> {
        let planting_date = normalized_date("planting_date", self.planting_date)?;
        let harvest_date = normalized_date("harvest_date", self.harvest_date)?;
        let applications = self
            .applications
            .into_iter()
            .enumerate()
            .map(|(idx, a)| {
                Ok(InputApplication {
                    product: a.product,
                    rate: a.rate,
                    time: a.time,
                    date: normalized_date(&format!("app{}_date", idx + 1), a.date)?,
                    nutrient: a.nutrient,
                })
            })
            .collect::<IntakeResult<Vec<_>>>()?;
        let irrigation_events = self
            .irrigation_events
            .into_iter()
            .enumerate()
            .map(|(idx, e)| {
                Ok(IrrigationEvent {
                    date: normalized_date(&format!("irr{}_date", idx + 1), e.date)?,
                    stage: e.stage,
                    amount: e.amount,
                    rate: e.rate,
                    fertigation: e.fertigation,
                })
            })
            .collect::<IntakeResult<Vec<_>>>()?;

        Ok(FieldRecord {
            producer_id: producer_id.to_string(),
            field_number,
            lat: self.lat,
            long: self.long,
            county_ident: self.county_ident,
            section: self.section,
            township: self.township,
            range: self.range,
            field_size: self.field_size,
            field_size_unit: self.field_size_unit,
            crop_purpose: self.crop_purpose,
            prev_crop: self.prev_crop,
            prev_crop_year: self.prev_crop_year,
            prev_crop_irr: self.prev_crop_irr,
            planting_date,
            harvest_date,
            cultivar: self.cultivar,
            seed_source: self.seed_source,
            seed_cleaned: self.seed_cleaned,
            seed_treat: self.seed_treat,
            profile_h2o: self.profile_h2o,
            row_space: self.row_space,
            seeding_rate: self.seeding_rate,
            seeding_rate_unit: self.seeding_rate_unit,
            grain_yield: self.grain_yield,
            yield_unit: self.yield_unit,
            forage_yield: self.forage_yield,
            forage_unit: self.forage_unit,
            impacting_events: self.impacting_events,
            k_soil: self.k_soil,
            p_soil: self.p_soil,
            n_soil: self.n_soil,
            n_soildepth: self.n_soildepth,
            applications,
            irrigated: self.irrigated,
            irr_shared: self.irr_shared,
            irr_decision: self.irr_decision,
            irr_type: self.irr_type,
            system_config: self.system_config,
            system_capacity: self.system_capacity,
            water_source: self.water_source,
            capacity_flux: self.capacity_flux,
            pre_plant_water: self.pre_plant_water,
            irr_number: self.irr_number,
            irrigation_events,
        })
    }
}

pub fn read_producer_answers(path: &str) -> IntakeResult<ProducerAnswers> {
    let contents = fs::read_to_string(path).context(ReadingFileSnafu { path })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path })
}

pub fn read_field_answers(path: &str) -> IntakeResult<FieldAnswers> {
    let contents = fs::read_to_string(path).context(ReadingFileSnafu { path })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path })
}

/// Normalizes a date answer: blanks stay blank, anything else must be
/// ISO-8601 (YYYY-MM-DD). The original form widgets serialized whatever
/// their locale produced; pinning one format is a deliberate change.
fn normalized_date(field: &str, value: Option<String>) -> IntakeResult<Option<String>> {
    let value = match value {
        None => return Ok(None),
        Some(v) => v,
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if is_iso_date(trimmed) {
        Ok(Some(trimmed.to_string()))
    } else {
        InvalidDateSnafu {
            field,
            value: value.clone(),
        }
        .fail()
    }
}

fn is_iso_date(s: &str) -> bool {
    let ok_shape = s.len() == 10
        && s.chars()
            .enumerate()
            .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
    if !ok_shape {
        return false;
    }
    let month: u32 = s[5..7].parse().unwrap_or(0);
    let day: u32 = s[8..10].parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}
