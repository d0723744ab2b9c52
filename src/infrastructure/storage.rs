use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

pub fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!(
        "{prefix}-{}-{sequence}",
        chrono::Utc::now().timestamp_micros()
    )
}
