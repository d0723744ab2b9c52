use crate::domain::models::{HABIT_DAYS, Habit};
use crate::infrastructure::error::InfraError;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait HabitRepository: Send + Sync {
    fn list(&self, user_id: &str) -> Result<Vec<Habit>, InfraError>;
    fn get(&self, habit_id: &str) -> Result<Option<Habit>, InfraError>;
    fn save(&self, habit: &Habit) -> Result<(), InfraError>;
    fn delete(&self, habit_id: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteHabitRepository {
    db_path: PathBuf,
}

impl SqliteHabitRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

fn decode_history(raw: &str) -> Result<[bool; HABIT_DAYS], InfraError> {
    let values: Vec<bool> = serde_json::from_str(raw)?;
    <[bool; HABIT_DAYS]>::try_from(values).map_err(|values| {
        InfraError::InvalidConfig(format!(
            "habits.history must hold {HABIT_DAYS} days, found {}",
            values.len()
        ))
    })
}

fn habit_from_row(row: (String, String, String, String)) -> Result<Habit, InfraError> {
    let (id, user_id, name, history_raw) = row;
    Ok(Habit {
        id,
        user_id,
        name,
        history: decode_history(&history_raw)?,
    })
}

impl HabitRepository for SqliteHabitRepository {
    fn list(&self, user_id: &str) -> Result<Vec<Habit>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, user_id, name, history FROM habits WHERE user_id = ?1 ORDER BY rowid ASC",
        )?;
        let rows = statement
            .query_map(params![user_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(habit_from_row).collect()
    }

    fn get(&self, habit_id: &str) -> Result<Option<Habit>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(String, String, String, String)> = connection
            .query_row(
                "SELECT id, user_id, name, history FROM habits WHERE id = ?1",
                params![habit_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        row.map(habit_from_row).transpose()
    }

    fn save(&self, habit: &Habit) -> Result<(), InfraError> {
        habit.validate().map_err(InfraError::InvalidInput)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO habits (id, user_id, name, history)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               history = excluded.history",
            params![
                habit.id,
                habit.user_id,
                habit.name,
                serde_json::to_string(&habit.history)?,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, habit_id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        Ok(connection.execute("DELETE FROM habits WHERE id = ?1", params![habit_id])? > 0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryHabitRepository {
    habits: Mutex<BTreeMap<String, Habit>>,
}

impl InMemoryHabitRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Habit>>, InfraError> {
        self.habits
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("habit store lock poisoned: {error}")))
    }
}

impl HabitRepository for InMemoryHabitRepository {
    fn list(&self, user_id: &str) -> Result<Vec<Habit>, InfraError> {
        Ok(self
            .lock()?
            .values()
            .filter(|habit| habit.user_id == user_id)
            .cloned()
            .collect())
    }

    fn get(&self, habit_id: &str) -> Result<Option<Habit>, InfraError> {
        Ok(self.lock()?.get(habit_id).cloned())
    }

    fn save(&self, habit: &Habit) -> Result<(), InfraError> {
        habit.validate().map_err(InfraError::InvalidInput)?;
        self.lock()?.insert(habit.id.clone(), habit.clone());
        Ok(())
    }

    fn delete(&self, habit_id: &str) -> Result<bool, InfraError> {
        Ok(self.lock()?.remove(habit_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::{initialize_database, next_id};

    #[test]
    fn sqlite_habits_roundtrip_history() {
        let path = std::env::temp_dir().join(format!(
            "taskmaster-habits-{}-{}.sqlite",
            std::process::id(),
            next_id("db")
        ));
        initialize_database(&path).expect("init db");
        let repository = SqliteHabitRepository::new(&path);

        let mut habit = Habit::new("hab-1", "user-1", "Read");
        habit.toggle_day(4).expect("toggle friday");
        repository.save(&habit).expect("save");

        let loaded = repository.get("hab-1").expect("get").expect("exists");
        assert_eq!(loaded, habit);
        assert_eq!(repository.list("user-1").expect("list").len(), 1);
        assert!(repository.delete("hab-1").expect("delete"));
        assert!(repository.get("hab-1").expect("get").is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn decode_history_rejects_short_arrays() {
        assert!(decode_history("[true,false,true]").is_err());
        assert!(decode_history("[false,false,false,false,false,false,true]").is_ok());
    }
}
