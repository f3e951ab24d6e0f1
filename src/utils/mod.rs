pub mod log_sanitizer;

pub use log_sanitizer::{mask_tax_id, sanitize_for_log};
