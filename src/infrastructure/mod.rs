pub mod billing_client;
pub mod client_state;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod event_mapper;
pub mod gmail_client;
pub mod goal_repository;
pub mod google_calendar_client;
pub mod habit_repository;
pub mod storage;
pub mod task_store;
