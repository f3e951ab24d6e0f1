pub mod erp;
pub mod partner_form;

pub use erp::{SankhyaClient, SankhyaError};
pub use partner_form::{PartnerForm, PartnerSaver, SaveOutcome, SavingIndicator};
