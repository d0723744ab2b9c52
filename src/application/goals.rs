use crate::domain::models::{Goal, GoalScope};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::goal_repository::GoalRepository;
use crate::infrastructure::storage::next_id;
use std::sync::Arc;

/// Ordered goal lists per scope. Positions stay dense (`0..n`) after every
/// change.
pub struct GoalService<R>
where
    R: GoalRepository,
{
    repository: Arc<R>,
    user_id: String,
}

impl<R> GoalService<R>
where
    R: GoalRepository,
{
    pub fn new(repository: Arc<R>, user_id: impl Into<String>) -> Self {
        Self {
            repository,
            user_id: user_id.into(),
        }
    }

    pub fn add_goal(&self, text: &str, scope: GoalScope) -> Result<Goal, InfraError> {
        let existing = self.repository.list(&self.user_id, scope)?;
        let goal = Goal {
            id: next_id("goal"),
            user_id: self.user_id.clone(),
            text: text.trim().to_string(),
            position: existing.len() as i64,
            scope,
        };
        goal.validate().map_err(InfraError::InvalidInput)?;
        self.repository.save(&goal)?;
        Ok(goal)
    }

    pub fn list_goals(&self, scope: GoalScope) -> Result<Vec<Goal>, InfraError> {
        self.repository.list(&self.user_id, scope)
    }

    pub fn reorder_goal(
        &self,
        goal_id: &str,
        scope: GoalScope,
        new_index: usize,
    ) -> Result<Vec<Goal>, InfraError> {
        let mut goals = self.repository.list(&self.user_id, scope)?;
        let Some(from_index) = goals.iter().position(|goal| goal.id == goal_id) else {
            return Err(InfraError::NotFound(format!("goal {goal_id}")));
        };
        let goal = goals.remove(from_index);
        goals.insert(new_index.min(goals.len()), goal);
        self.persist_dense(&mut goals)?;
        Ok(goals)
    }

    pub fn delete_goal(&self, goal_id: &str, scope: GoalScope) -> Result<(), InfraError> {
        let mut goals = self.repository.list(&self.user_id, scope)?;
        let Some(index) = goals.iter().position(|goal| goal.id == goal_id) else {
            return Err(InfraError::NotFound(format!("goal {goal_id}")));
        };
        goals.remove(index);
        self.repository.delete(goal_id)?;
        self.persist_dense(&mut goals)
    }

    fn persist_dense(&self, goals: &mut [Goal]) -> Result<(), InfraError> {
        let mut positions = Vec::with_capacity(goals.len());
        for (index, goal) in goals.iter_mut().enumerate() {
            goal.position = index as i64;
            positions.push((goal.id.clone(), goal.position));
        }
        self.repository.save_positions(&positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::goal_repository::InMemoryGoalRepository;

    fn service() -> GoalService<InMemoryGoalRepository> {
        GoalService::new(Arc::new(InMemoryGoalRepository::default()), "user-1")
    }

    fn texts(goals: &[Goal]) -> Vec<&str> {
        goals.iter().map(|goal| goal.text.as_str()).collect()
    }

    #[test]
    fn reorder_keeps_positions_dense() {
        let service = service();
        let first = service.add_goal("Run a 10k", GoalScope::General).expect("add");
        service.add_goal("Learn Rust", GoalScope::General).expect("add");
        service.add_goal("Read 12 books", GoalScope::General).expect("add");

        let reordered = service
            .reorder_goal(&first.id, GoalScope::General, 10)
            .expect("reorder");
        assert_eq!(texts(&reordered), vec!["Learn Rust", "Read 12 books", "Run a 10k"]);

        let listed = service.list_goals(GoalScope::General).expect("list");
        let positions: Vec<i64> = listed.iter().map(|goal| goal.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(texts(&listed), texts(&reordered));
    }

    #[test]
    fn delete_closes_the_gap() {
        let service = service();
        service.add_goal("A", GoalScope::Monthly).expect("add");
        let middle = service.add_goal("B", GoalScope::Monthly).expect("add");
        service.add_goal("C", GoalScope::Monthly).expect("add");

        service.delete_goal(&middle.id, GoalScope::Monthly).expect("delete");
        let listed = service.list_goals(GoalScope::Monthly).expect("list");
        assert_eq!(texts(&listed), vec!["A", "C"]);
        assert_eq!(listed[1].position, 1);
    }

    #[test]
    fn scopes_are_independent() {
        let service = service();
        service.add_goal("Yearly", GoalScope::General).expect("add");
        let monthly = service.add_goal("This month", GoalScope::Monthly).expect("add");
        assert_eq!(monthly.position, 0);
        assert!(matches!(
            service.delete_goal(&monthly.id, GoalScope::General),
            Err(InfraError::NotFound(_))
        ));
        assert!(matches!(
            service.add_goal("  ", GoalScope::General),
            Err(InfraError::InvalidInput(_))
        ));
    }
}
