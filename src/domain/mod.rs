pub mod event_extractor;
pub mod models;
pub mod week;
