use crate::domain::models::{Goal, GoalScope};
use crate::infrastructure::error::InfraError;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait GoalRepository: Send + Sync {
    /// Goals of one owner and scope, ordered by position.
    fn list(&self, user_id: &str, scope: GoalScope) -> Result<Vec<Goal>, InfraError>;
    fn save(&self, goal: &Goal) -> Result<(), InfraError>;
    fn save_positions(&self, positions: &[(String, i64)]) -> Result<(), InfraError>;
    fn delete(&self, goal_id: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteGoalRepository {
    db_path: PathBuf,
}

impl SqliteGoalRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl GoalRepository for SqliteGoalRepository {
    fn list(&self, user_id: &str, scope: GoalScope) -> Result<Vec<Goal>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, user_id, text, position FROM goals
             WHERE user_id = ?1 AND scope = ?2
             ORDER BY position ASC, id ASC",
        )?;
        let goals = statement
            .query_map(params![user_id, scope.as_str()], |row| {
                Ok(Goal {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    text: row.get(2)?,
                    position: row.get(3)?,
                    scope,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(goals)
    }

    fn save(&self, goal: &Goal) -> Result<(), InfraError> {
        goal.validate().map_err(InfraError::InvalidInput)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO goals (id, user_id, text, position, scope)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
               text = excluded.text,
               position = excluded.position,
               scope = excluded.scope",
            params![
                goal.id,
                goal.user_id,
                goal.text,
                goal.position,
                goal.scope.as_str()
            ],
        )?;
        Ok(())
    }

    fn save_positions(&self, positions: &[(String, i64)]) -> Result<(), InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        for (goal_id, position) in positions {
            transaction.execute(
                "UPDATE goals SET position = ?2 WHERE id = ?1",
                params![goal_id, position],
            )?;
        }
        transaction.commit()?;
        Ok(())
    }

    fn delete(&self, goal_id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        Ok(connection.execute("DELETE FROM goals WHERE id = ?1", params![goal_id])? > 0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryGoalRepository {
    goals: Mutex<Vec<Goal>>,
}

impl InMemoryGoalRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Goal>>, InfraError> {
        self.goals
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("goal store lock poisoned: {error}")))
    }
}

impl GoalRepository for InMemoryGoalRepository {
    fn list(&self, user_id: &str, scope: GoalScope) -> Result<Vec<Goal>, InfraError> {
        let mut goals: Vec<Goal> = self
            .lock()?
            .iter()
            .filter(|goal| goal.user_id == user_id && goal.scope == scope)
            .cloned()
            .collect();
        goals.sort_by_key(|goal| goal.position);
        Ok(goals)
    }

    fn save(&self, goal: &Goal) -> Result<(), InfraError> {
        goal.validate().map_err(InfraError::InvalidInput)?;
        let mut goals = self.lock()?;
        match goals.iter_mut().find(|candidate| candidate.id == goal.id) {
            Some(existing) => *existing = goal.clone(),
            None => goals.push(goal.clone()),
        }
        Ok(())
    }

    fn save_positions(&self, positions: &[(String, i64)]) -> Result<(), InfraError> {
        let mut goals = self.lock()?;
        for (goal_id, position) in positions {
            if let Some(goal) = goals.iter_mut().find(|candidate| &candidate.id == goal_id) {
                goal.position = *position;
            }
        }
        Ok(())
    }

    fn delete(&self, goal_id: &str) -> Result<bool, InfraError> {
        let mut goals = self.lock()?;
        let before = goals.len();
        goals.retain(|goal| goal.id != goal_id);
        Ok(goals.len() != before)
    }
}
