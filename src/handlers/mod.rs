pub mod partners;

pub use partners::{health, list_partners, save_partner, AppState};
