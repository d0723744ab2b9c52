pub mod bootstrap;
pub mod calendar_import;
pub mod commands;
pub mod email_suggestions;
pub mod goals;
pub mod habits;
pub mod subscription;
pub mod task_board;
