pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

pub use application::commands::AppState;
pub use application::task_board::{RollbackPolicy, SyncOutcome, TaskBoard};
pub use domain::event_extractor::{CandidateEvent, extract_event};
pub use infrastructure::error::InfraError;
