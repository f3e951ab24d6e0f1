pub mod partner;

pub use partner::{ActiveFlag, PartnerPage, PartnerRecord, PartnerSummary, PersonType};
