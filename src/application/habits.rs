use crate::domain::models::Habit;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::habit_repository::HabitRepository;
use crate::infrastructure::storage::next_id;
use std::sync::Arc;

pub struct HabitService<R>
where
    R: HabitRepository,
{
    repository: Arc<R>,
    user_id: String,
}

impl<R> HabitService<R>
where
    R: HabitRepository,
{
    pub fn new(repository: Arc<R>, user_id: impl Into<String>) -> Self {
        Self {
            repository,
            user_id: user_id.into(),
        }
    }

    pub fn create_habit(&self, name: &str) -> Result<Habit, InfraError> {
        let habit = Habit::new(next_id("habit"), self.user_id.clone(), name.trim());
        habit.validate().map_err(InfraError::InvalidInput)?;
        self.repository.save(&habit)?;
        Ok(habit)
    }

    pub fn list_habits(&self) -> Result<Vec<Habit>, InfraError> {
        self.repository.list(&self.user_id)
    }

    /// Flips one day (0 = Monday) and persists the whole week.
    pub fn toggle_habit_day(&self, habit_id: &str, day_index: usize) -> Result<Habit, InfraError> {
        let mut habit = self.owned_habit(habit_id)?;
        habit.toggle_day(day_index).map_err(InfraError::InvalidInput)?;
        self.repository.save(&habit)?;
        Ok(habit)
    }

    pub fn reset_week(&self, habit_id: &str) -> Result<Habit, InfraError> {
        let mut habit = self.owned_habit(habit_id)?;
        habit.reset_week();
        self.repository.save(&habit)?;
        Ok(habit)
    }

    pub fn delete_habit(&self, habit_id: &str) -> Result<(), InfraError> {
        self.owned_habit(habit_id)?;
        self.repository.delete(habit_id)?;
        Ok(())
    }

    fn owned_habit(&self, habit_id: &str) -> Result<Habit, InfraError> {
        self.repository
            .get(habit_id)?
            .filter(|habit| habit.user_id == self.user_id)
            .ok_or_else(|| InfraError::NotFound(format!("habit {habit_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::HABIT_DAYS;
    use crate::infrastructure::habit_repository::InMemoryHabitRepository;
    use proptest::prelude::*;

    fn service() -> HabitService<InMemoryHabitRepository> {
        HabitService::new(Arc::new(InMemoryHabitRepository::default()), "user-1")
    }

    #[test]
    fn toggling_marks_and_unmarks_a_day() {
        let service = service();
        let habit = service.create_habit("  Read  ").expect("create");
        assert_eq!(habit.name, "Read");

        let toggled = service.toggle_habit_day(&habit.id, 2).expect("toggle");
        assert!(toggled.history[2]);
        assert_eq!(toggled.completed_days(), 1);

        let untoggled = service.toggle_habit_day(&habit.id, 2).expect("toggle back");
        assert_eq!(untoggled.completed_days(), 0);
    }

    #[test]
    fn out_of_range_day_is_rejected() {
        let service = service();
        let habit = service.create_habit("Stretch").expect("create");
        assert!(matches!(
            service.toggle_habit_day(&habit.id, HABIT_DAYS),
            Err(InfraError::InvalidInput(_))
        ));
    }

    #[test]
    fn blank_names_and_unknown_ids_fail() {
        let service = service();
        assert!(matches!(service.create_habit(" "), Err(InfraError::InvalidInput(_))));
        assert!(matches!(service.delete_habit("missing"), Err(InfraError::NotFound(_))));
    }

    #[test]
    fn reset_and_delete() {
        let service = service();
        let habit = service.create_habit("Meditate").expect("create");
        service.toggle_habit_day(&habit.id, 0).expect("toggle");
        assert_eq!(service.reset_week(&habit.id).expect("reset").completed_days(), 0);

        service.delete_habit(&habit.id).expect("delete");
        assert!(service.list_habits().expect("list").is_empty());
    }

    proptest! {
        #[test]
        fn history_length_never_changes(days in prop::collection::vec(0usize..HABIT_DAYS, 0..30)) {
            let service = service();
            let habit = service.create_habit("Walk").expect("create");
            let mut expected = [false; HABIT_DAYS];
            for day in &days {
                service.toggle_habit_day(&habit.id, *day).expect("toggle");
                expected[*day] = !expected[*day];
            }
            let stored = service.list_habits().expect("list").remove(0);
            prop_assert_eq!(stored.history.len(), HABIT_DAYS);
            prop_assert_eq!(stored.history, expected);
        }
    }
}
