//! Headless partner edit/create form.
//!
//! Holds the editable state of one partner, validates required fields and
//! hands the normalized record to a caller-supplied [`PartnerSaver`].

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, warn};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{ActiveFlag, PartnerRecord, PersonType};
use crate::services::erp::{SankhyaClient, SankhyaError};
use crate::utils::log_sanitizer::sanitize_for_log;

/// Persistence callback invoked on submit.
#[async_trait]
pub trait PartnerSaver: Send + Sync {
    async fn save(&self, partner: PartnerRecord) -> Result<Value, SankhyaError>;
}

#[async_trait]
impl PartnerSaver for SankhyaClient {
    async fn save(&self, partner: PartnerRecord) -> Result<Value, SankhyaError> {
        self.save_partner(&partner).await
    }
}

#[derive(Debug)]
pub enum SaveOutcome {
    Saved(Value),
    Failed(SankhyaError),
    Invalid(ValidationErrors),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some(Cow::from("This field is required"));
        Err(error)
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct PartnerFormData {
    pub code: String,
    #[validate(custom(function = not_blank))]
    pub name: String,
    #[validate(custom(function = not_blank))]
    pub tax_id: String,
    #[validate(custom(function = not_blank))]
    pub city_code: String,
    pub active: ActiveFlag,
}

impl PartnerFormData {
    fn from_partner(partner: Option<&PartnerRecord>) -> Self {
        match partner {
            Some(p) => Self {
                code: p.code.clone().unwrap_or_default(),
                name: p.name.clone(),
                tax_id: p.tax_id.clone(),
                city_code: p.city_code.clone(),
                active: p.active,
            },
            None => Self::default(),
        }
    }
}

/// Shared view of a form's in-flight save. Clones observe the same flag, so
/// a submit control can stay disabled while `submit` holds the form.
#[derive(Debug, Clone, Default)]
pub struct SavingIndicator(Arc<AtomicBool>);

impl SavingIndicator {
    pub fn is_saving(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn start(&self) -> SavingGuard<'_> {
        self.0.store(true, Ordering::Release);
        SavingGuard(self)
    }
}

// Clears the flag even when the submit future is dropped mid-save.
struct SavingGuard<'a>(&'a SavingIndicator);

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        (self.0).0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct PartnerForm {
    partner: Option<PartnerRecord>,
    data: PartnerFormData,
    is_open: bool,
    saving: SavingIndicator,
}

impl PartnerForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the supplied partner and visibility. The field state is reset
    /// whenever either of them changes; edits survive otherwise. Partners are
    /// compared by value, so re-supplying an equal partner keeps the edits.
    /// Use [`PartnerForm::reset`] to discard them.
    pub fn sync(&mut self, partner: Option<&PartnerRecord>, is_open: bool) {
        if self.partner.as_ref() == partner && self.is_open == is_open {
            return;
        }

        self.partner = partner.cloned();
        self.is_open = is_open;
        self.data = PartnerFormData::from_partner(partner);
    }

    /// Open for editing `partner`, or for creating a new one when `None`.
    pub fn open(&mut self, partner: Option<&PartnerRecord>) {
        self.sync(partner, true);
    }

    /// Discard edits and reload the fields from the current partner.
    pub fn reset(&mut self) {
        self.data = PartnerFormData::from_partner(self.partner.as_ref());
    }

    pub fn close(&mut self) {
        let partner = self.partner.take();
        self.sync(partner.as_ref(), false);
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_editing(&self) -> bool {
        self.partner.is_some()
    }

    /// True while the save callback is running; the submit control is
    /// disabled for that duration.
    pub fn is_saving(&self) -> bool {
        self.saving.is_saving()
    }

    /// Handle for observing the saving state from outside the form.
    pub fn saving_indicator(&self) -> SavingIndicator {
        self.saving.clone()
    }

    pub fn data(&self) -> &PartnerFormData {
        &self.data
    }

    // The code is read-only: it only ever comes from the edited partner.

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.data.name = name.into();
    }

    pub fn set_tax_id(&mut self, tax_id: impl Into<String>) {
        self.data.tax_id = tax_id.into();
    }

    pub fn set_city_code(&mut self, city_code: impl Into<String>) {
        self.data.city_code = city_code.into();
    }

    pub fn set_active(&mut self, active: ActiveFlag) {
        self.data.active = active;
    }

    /// Record handed to the saver: code only in edit mode, person type
    /// classified from the digits of the tax id.
    pub fn payload(&self) -> PartnerRecord {
        PartnerRecord {
            code: self.is_editing().then(|| self.data.code.clone()),
            name: self.data.name.clone(),
            tax_id: self.data.tax_id.clone(),
            city_code: self.data.city_code.clone(),
            active: self.data.active,
            person_type: Some(PersonType::from_tax_id(&self.data.tax_id)),
        }
    }

    /// Validate, then run the saver. Failures are logged and returned; the
    /// entered data is left untouched so the user can resubmit.
    pub async fn submit<S>(&mut self, saver: &S) -> SaveOutcome
    where
        S: PartnerSaver + ?Sized,
    {
        if let Err(errors) = self.data.validate() {
            let fields: Vec<String> = errors.field_errors().keys().map(|k| k.to_string()).collect();
            warn!(fields = ?fields, "Partner form has missing fields");
            return SaveOutcome::Invalid(errors);
        }

        let payload = self.payload();
        let saving = self.saving.clone();
        let _guard = saving.start();

        let outcome = match saver.save(payload).await {
            Ok(response) => SaveOutcome::Saved(response),
            Err(e) => {
                error!(
                    error = %e,
                    name = %sanitize_for_log(&self.data.name),
                    "Failed to save partner"
                );
                SaveOutcome::Failed(e)
            }
        };

        outcome
    }
}
