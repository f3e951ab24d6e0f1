// ERP Integration Module
// Sankhya gateway client and the positional entity mapping it relies on

pub mod entity_mapping;
pub mod sankhya_client;

pub use entity_mapping::{map_entities, map_partners, FieldRow};
pub use sankhya_client::{SankhyaAuthenticator, SankhyaClient, SankhyaError};
