use serde::{Deserialize, Serialize};

/// Tax ids longer than this (digits only) are CNPJs, i.e. companies.
const INDIVIDUAL_TAX_ID_DIGITS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActiveFlag {
    #[default]
    #[serde(rename = "active", alias = "S")]
    Active,
    #[serde(rename = "inactive", alias = "N")]
    Inactive,
}

impl ActiveFlag {
    /// Code used by the `ATIVO` column.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Active => "S",
            Self::Inactive => "N",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "S" => Some(Self::Active),
            "N" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersonType {
    #[serde(rename = "individual", alias = "F")]
    Individual,
    #[serde(rename = "company", alias = "J")]
    Company,
}

impl PersonType {
    /// Classify a tax id (CPF or CNPJ) by its digit count, ignoring punctuation.
    pub fn from_tax_id(tax_id: &str) -> Self {
        if digits_only(tax_id).len() > INDIVIDUAL_TAX_ID_DIGITS {
            Self::Company
        } else {
            Self::Individual
        }
    }

    /// Code used by the `TIPPESSOA` column.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Individual => "F",
            Self::Company => "J",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "F" => Some(Self::Individual),
            "J" => Some(Self::Company),
            _ => None,
        }
    }
}

pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A business partner (`Parceiro`) as exchanged with callers.
///
/// `person_type` is informational on input: it is always recomputed from
/// `tax_id` before anything is sent to the ERP.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
    pub tax_id: String,
    pub city_code: String,
    #[serde(default)]
    pub active: ActiveFlag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_type: Option<PersonType>,
}

impl PartnerRecord {
    /// Records without a code are created; records with one are updated.
    pub fn is_update(&self) -> bool {
        self.code.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn derived_person_type(&self) -> PersonType {
        PersonType::from_tax_id(&self.tax_id)
    }

    /// Copy with `person_type` recomputed and an empty code dropped.
    pub fn normalized(&self) -> Self {
        Self {
            code: self.code.clone().filter(|c| !c.is_empty()),
            person_type: Some(self.derived_person_type()),
            ..self.clone()
        }
    }
}

/// A listed partner with the identifier used as a list key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub record: PartnerRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerPage {
    pub partners: Vec<PartnerSummary>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}
