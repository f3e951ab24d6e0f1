// Sankhya entity collection denormalization
// `loadRecords` returns each row keyed positionally (f0, f1, ...) with the
// field names declared once in `metadata.fields.field`. This module rebuilds
// name-keyed rows from that layout.

use std::collections::BTreeMap;

use serde_json::Value;

use super::sankhya_client::{Result, SankhyaError};
use crate::models::{ActiveFlag, PartnerRecord, PartnerSummary, PersonType};

pub type FieldRow = BTreeMap<String, String>;

pub const FIELD_CODE: &str = "CODPARC";
pub const FIELD_NAME: &str = "NOMEPARC";
pub const FIELD_TAX_ID: &str = "CGC_CPF";
pub const FIELD_CITY_CODE: &str = "CODCID";
pub const FIELD_ACTIVE: &str = "ATIVO";
pub const FIELD_PERSON_TYPE: &str = "TIPPESSOA";

/// Field names in the order the metadata declares them.
///
/// A single-field result is serialized as a bare object instead of a one
/// element list, so both shapes are accepted.
pub fn field_names(entities: &Value) -> Result<Vec<String>> {
    let declared = entities
        .pointer("/metadata/fields/field")
        .ok_or_else(|| SankhyaError::MalformedResponse("entities.metadata.fields.field is missing".to_string()))?;

    let fields: Vec<&Value> = match declared {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![declared],
        _ => {
            return Err(SankhyaError::MalformedResponse(
                "entities.metadata.fields.field is neither a list nor an object".to_string(),
            ))
        }
    };

    fields
        .into_iter()
        .map(|field| {
            field
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| SankhyaError::MalformedResponse("field metadata without a name".to_string()))
        })
        .collect()
}

/// Scalar inside a `{"$": ...}` wrapper. `None` when the wrapper is absent,
/// `null`, or carries no scalar. An empty string is a value, not an absence.
fn wrapped_scalar(wrapper: Option<&Value>) -> Option<String> {
    match wrapper?.get("$")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Zip the declared field names against each row's positional keys.
pub fn map_entities(entities: &Value) -> Result<Vec<FieldRow>> {
    let rows = entities
        .get("entity")
        .and_then(Value::as_array)
        .ok_or_else(|| SankhyaError::MalformedResponse("entities.entity is not a list".to_string()))?;

    let names = field_names(entities)?;

    Ok(rows
        .iter()
        .map(|raw| {
            names
                .iter()
                .enumerate()
                .filter_map(|(position, name)| {
                    wrapped_scalar(raw.get(format!("f{}", position)))
                        .map(|value| (name.clone(), value))
                })
                .collect()
        })
        .collect())
}

/// Build a listed partner from a mapped row. Rows without a code are keyed
/// by their position in the page.
pub fn partner_from_row(row: &FieldRow, index: usize) -> PartnerSummary {
    let field = |name: &str| row.get(name).cloned().unwrap_or_default();

    let code = row.get(FIELD_CODE).filter(|c| !c.is_empty()).cloned();
    let tax_id = field(FIELD_TAX_ID);
    let person_type = row
        .get(FIELD_PERSON_TYPE)
        .and_then(|v| PersonType::from_wire(v))
        .unwrap_or_else(|| PersonType::from_tax_id(&tax_id));

    PartnerSummary {
        id: code.clone().unwrap_or_else(|| index.to_string()),
        record: PartnerRecord {
            code,
            name: field(FIELD_NAME),
            tax_id,
            city_code: field(FIELD_CITY_CODE),
            active: row
                .get(FIELD_ACTIVE)
                .and_then(|v| ActiveFlag::from_wire(v))
                .unwrap_or_default(),
            person_type: Some(person_type),
        },
    }
}

pub fn map_partners(entities: &Value) -> Result<Vec<PartnerSummary>> {
    Ok(map_entities(entities)?
        .iter()
        .enumerate()
        .map(|(index, row)| partner_from_row(row, index))
        .collect())
}
