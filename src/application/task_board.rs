//! Client-held task list kept consistent with a remote [`TaskStore`].
//!
//! Every mutation applies to the in-memory list first, then writes the single
//! affected entity (or, for reorders, the affected day's positions) to the
//! store. What happens on a failed write is decided per mutation kind by a
//! [`RollbackPolicyTable`]. A task with a mutation in flight rejects further
//! mutations until the first one settles.

use crate::domain::event_extractor::CandidateEvent;
use crate::domain::models::{ExternalEvent, Task, TaskMetadata, TaskStatus};
use crate::domain::week::date_for_weekday;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{encode_task_event, reschedule_patch};
use crate::infrastructure::google_calendar_client::GoogleCalendarClient;
use crate::infrastructure::task_store::TaskStore;
use chrono::{Local, NaiveDate, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

pub type TodayProvider = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

const TEMP_ID_PREFIX: &str = "temp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Toggle,
    Move,
    Reorder,
    Delete,
    MergeMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Keep the optimistic state after a failed write.
    None,
    /// Restore the whole pre-mutation list.
    FullList,
}

#[derive(Debug, Clone)]
pub struct RollbackPolicyTable {
    policies: HashMap<MutationKind, RollbackPolicy>,
}

impl Default for RollbackPolicyTable {
    fn default() -> Self {
        Self {
            policies: HashMap::from([
                (MutationKind::Create, RollbackPolicy::None),
                (MutationKind::Toggle, RollbackPolicy::None),
                (MutationKind::Move, RollbackPolicy::FullList),
                (MutationKind::Reorder, RollbackPolicy::None),
                (MutationKind::Delete, RollbackPolicy::None),
                (MutationKind::MergeMetadata, RollbackPolicy::None),
            ]),
        }
    }
}

impl RollbackPolicyTable {
    pub fn policy_for(&self, kind: MutationKind) -> RollbackPolicy {
        self.policies
            .get(&kind)
            .copied()
            .unwrap_or(RollbackPolicy::None)
    }

    pub fn set(&mut self, kind: MutationKind, policy: RollbackPolicy) {
        self.policies.insert(kind, policy);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Confirmed,
    Failed { rolled_back: bool },
}

impl SyncOutcome {
    pub fn is_confirmed(self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarSync {
    NotLinked,
    Synced,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub store: SyncOutcome,
    pub calendar: CalendarSync,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOutcome {
    pub task: Task,
    pub store: SyncOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionOutcome {
    pub task: Task,
    pub store: SyncOutcome,
    pub calendar: CalendarSync,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub merged: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// External calendar used to mirror task moves.
pub struct CalendarBinding<C>
where
    C: GoogleCalendarClient,
{
    pub client: Arc<C>,
    pub access_token: String,
    pub calendar_id: String,
    pub timezone: Tz,
}

#[derive(Debug, Default)]
struct BoardState {
    tasks: Vec<Task>,
    revision: u64,
    in_flight: HashSet<String>,
    next_temp_id: u64,
}

struct PendingMutation {
    kind: MutationKind,
    task_id: String,
    snapshot: Vec<Task>,
    revision: u64,
    previous: Option<Task>,
}

pub struct TaskBoard<S, C>
where
    S: TaskStore,
    C: GoogleCalendarClient,
{
    user_id: String,
    store: Arc<S>,
    calendar: Option<CalendarBinding<C>>,
    rollback_policies: RollbackPolicyTable,
    today_provider: TodayProvider,
    state: Mutex<BoardState>,
}

impl<S, C> TaskBoard<S, C>
where
    S: TaskStore,
    C: GoogleCalendarClient,
{
    pub fn new(user_id: impl Into<String>, store: Arc<S>) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            calendar: None,
            rollback_policies: RollbackPolicyTable::default(),
            today_provider: Arc::new(|| Local::now().date_naive()),
            state: Mutex::new(BoardState::default()),
        }
    }

    pub fn with_calendar(mut self, calendar: CalendarBinding<C>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_rollback_policy(mut self, kind: MutationKind, policy: RollbackPolicy) -> Self {
        self.rollback_policies.set(kind, policy);
        self
    }

    pub fn with_today_provider(mut self, today_provider: TodayProvider) -> Self {
        self.today_provider = today_provider;
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.today_provider)()
    }

    pub async fn load(&self) -> Result<Vec<Task>, InfraError> {
        let tasks = self.store.list_tasks(&self.user_id).await?;
        let mut state = self.lock_state()?;
        state.tasks = tasks.clone();
        state.revision += 1;
        Ok(tasks)
    }

    pub fn tasks(&self) -> Result<Vec<Task>, InfraError> {
        Ok(self.lock_state()?.tasks.clone())
    }

    pub fn tasks_for_date(&self, date: NaiveDate) -> Result<Vec<Task>, InfraError> {
        let mut tasks: Vec<Task> = self
            .lock_state()?
            .tasks
            .iter()
            .filter(|task| task.date == date)
            .cloned()
            .collect();
        tasks.sort_by_key(|task| task.position);
        Ok(tasks)
    }

    /// Tasks on `weekday` of the current Monday-start week.
    pub fn tasks_for_day(&self, weekday: Weekday) -> Result<Vec<Task>, InfraError> {
        self.tasks_for_date(date_for_weekday(self.today(), weekday))
    }

    pub async fn create_task(
        &self,
        title: &str,
        date: NaiveDate,
        metadata: TaskMetadata,
    ) -> Result<CreateOutcome, InfraError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(InfraError::InvalidInput("task title must not be empty".to_string()));
        }

        let (draft, pending) = {
            let mut state = self.lock_state()?;
            state.next_temp_id += 1;
            let temp_id = format!("{TEMP_ID_PREFIX}-{}", state.next_temp_id);
            let draft = Task {
                id: temp_id.clone(),
                user_id: self.user_id.clone(),
                title: title.to_string(),
                date,
                status: TaskStatus::Pending,
                position: next_position(&state.tasks, date),
                metadata,
            };
            draft.validate().map_err(InfraError::InvalidInput)?;

            let snapshot = state.tasks.clone();
            state.in_flight.insert(temp_id.clone());
            state.tasks.push(draft.clone());
            state.revision += 1;
            let pending = PendingMutation {
                kind: MutationKind::Create,
                task_id: temp_id,
                snapshot,
                revision: state.revision,
                previous: None,
            };
            (draft, pending)
        };

        match self.store.insert_task(&draft).await {
            Ok(stored) => {
                let mut state = self.lock_state()?;
                state.in_flight.remove(&pending.task_id);
                let mut confirmed = stored.clone();
                if let Some(task) = state
                    .tasks
                    .iter_mut()
                    .find(|task| task.id == pending.task_id)
                {
                    task.id = stored.id.clone();
                    confirmed = task.clone();
                    // Snapshots taken before this point still hold the temp id.
                    state.revision += 1;
                } else {
                    log::warn!(
                        "task board: created task {} was removed locally before confirmation",
                        stored.id
                    );
                }
                Ok(CreateOutcome {
                    task: confirmed,
                    store: SyncOutcome::Confirmed,
                })
            }
            Err(error) => {
                let outcome = self.settle(pending, Err(error))?;
                Ok(CreateOutcome {
                    task: draft,
                    store: outcome,
                })
            }
        }
    }

    pub async fn toggle_status(&self, task_id: &str) -> Result<SyncOutcome, InfraError> {
        let (updated, pending) = self.begin_update(MutationKind::Toggle, task_id, |task, _| {
            task.status = task.status.toggled();
        })?;
        let result = self.store.update_task(&updated).await;
        self.settle(pending, result)
    }

    /// Moves a task to `weekday` of the current Monday-start week.
    pub async fn move_to_day(
        &self,
        task_id: &str,
        weekday: Weekday,
    ) -> Result<MoveOutcome, InfraError> {
        let target = date_for_weekday(self.today(), weekday);
        self.move_to_date(task_id, target).await
    }

    pub async fn move_to_date(
        &self,
        task_id: &str,
        target: NaiveDate,
    ) -> Result<MoveOutcome, InfraError> {
        let (updated, pending) = self.begin_update(MutationKind::Move, task_id, |task, tasks| {
            if task.date != target {
                task.position = next_position(tasks, target);
                task.date = target;
            }
        })?;
        let result = self.store.update_task(&updated).await;
        let store_outcome = self.settle(pending, result)?;
        if !store_outcome.is_confirmed() {
            return Ok(MoveOutcome {
                store: store_outcome,
                calendar: CalendarSync::NotLinked,
            });
        }

        let calendar = self.sync_calendar_time(&updated).await;
        Ok(MoveOutcome {
            store: store_outcome,
            calendar,
        })
    }

    /// Moves `task_id` to `target_index` among the tasks sharing its date. Tasks
    /// on other dates keep their relative order.
    pub async fn reorder_within_day(
        &self,
        task_id: &str,
        target_index: usize,
    ) -> Result<SyncOutcome, InfraError> {
        let (positions, pending) = {
            let mut state = self.lock_state()?;
            let Some(moved) = state.tasks.iter().find(|task| task.id == task_id).cloned() else {
                return Err(InfraError::NotFound(format!("task {task_id}")));
            };
            self.claim(&mut state, task_id)?;
            let snapshot = state.tasks.clone();

            let (mut day_tasks, other_tasks): (Vec<Task>, Vec<Task>) = std::mem::take(&mut state.tasks)
                .into_iter()
                .partition(|task| task.date == moved.date);
            day_tasks.sort_by_key(|task| task.position);

            let from_index = day_tasks
                .iter()
                .position(|task| task.id == task_id)
                .unwrap_or(0);
            let task = day_tasks.remove(from_index);
            let target_index = target_index.min(day_tasks.len());
            day_tasks.insert(target_index, task);

            let mut positions = Vec::with_capacity(day_tasks.len());
            for (index, task) in day_tasks.iter_mut().enumerate() {
                task.position = index as i64;
                // Unconfirmed tasks have no store row yet.
                if !is_temp_id(&task.id) {
                    positions.push((task.id.clone(), task.position));
                }
            }

            state.tasks = other_tasks;
            state.tasks.extend(day_tasks);
            state.revision += 1;
            let pending = PendingMutation {
                kind: MutationKind::Reorder,
                task_id: task_id.to_string(),
                snapshot,
                revision: state.revision,
                previous: Some(moved),
            };
            (positions, pending)
        };

        let result = self.store.update_positions(&self.user_id, &positions).await;
        self.settle(pending, result)
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<SyncOutcome, InfraError> {
        let pending = {
            let mut state = self.lock_state()?;
            let Some(index) = state.tasks.iter().position(|task| task.id == task_id) else {
                return Err(InfraError::NotFound(format!("task {task_id}")));
            };
            self.claim(&mut state, task_id)?;
            let snapshot = state.tasks.clone();
            let removed = state.tasks.remove(index);
            state.revision += 1;
            PendingMutation {
                kind: MutationKind::Delete,
                task_id: task_id.to_string(),
                snapshot,
                revision: state.revision,
                previous: Some(removed),
            }
        };

        let result = match self.store.delete_task(&self.user_id, task_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(InfraError::NotFound(format!("task {task_id} in store"))),
            Err(error) => Err(error),
        };
        self.settle(pending, result)
    }

    pub async fn merge_metadata(
        &self,
        task_id: &str,
        incoming: &TaskMetadata,
    ) -> Result<SyncOutcome, InfraError> {
        let (updated, pending) =
            self.begin_update(MutationKind::MergeMetadata, task_id, |task, _| {
                task.metadata.merge(incoming);
            })?;
        let result = self.store.update_task(&updated).await;
        self.settle(pending, result)
    }

    /// Brings external events onto the board. An event matches an existing task
    /// when title and date are equal; matches gain any metadata they lack,
    /// everything else becomes a new task.
    pub async fn import_events(&self, events: &[ExternalEvent]) -> Result<ImportReport, InfraError> {
        let mut report = ImportReport::default();

        for event in events {
            let incoming = event.metadata();
            let existing = {
                let state = self.lock_state()?;
                state
                    .tasks
                    .iter()
                    .find(|task| task.title == event.title && task.date == event.date)
                    .cloned()
            };

            let outcome = match existing {
                Some(task) if !task.metadata.gains_from(&incoming) => {
                    report.unchanged += 1;
                    continue;
                }
                Some(task) => self
                    .merge_metadata(&task.id, &incoming)
                    .await
                    .map(|outcome| (outcome, false)),
                None => self
                    .create_task(&event.title, event.date, incoming)
                    .await
                    .map(|created| (created.store, true)),
            };

            match outcome {
                Ok((SyncOutcome::Confirmed, true)) => report.created += 1,
                Ok((SyncOutcome::Confirmed, false)) => report.merged += 1,
                Ok((SyncOutcome::Failed { .. }, _)) => report.failed += 1,
                Err(error) => {
                    log::warn!(
                        "task board: import of calendar event {} skipped: {error}",
                        event.event_id
                    );
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "task board: imported {} events (created={}, merged={}, unchanged={}, failed={})",
            events.len(),
            report.created,
            report.merged,
            report.unchanged,
            report.failed
        );
        Ok(report)
    }

    /// Turns one option of an extracted candidate into a task, optionally
    /// mirroring it as a calendar event.
    pub async fn add_suggestion(
        &self,
        candidate: &CandidateEvent,
        option_index: usize,
        source_message_id: Option<&str>,
        add_to_calendar: bool,
    ) -> Result<SuggestionOutcome, InfraError> {
        let Some(option) = candidate.options.get(option_index) else {
            return Err(InfraError::InvalidInput(format!(
                "suggestion option {option_index} out of range (have {})",
                candidate.options.len()
            )));
        };
        let metadata = TaskMetadata {
            start_time: option.time.clone(),
            note: Some(option.reason.clone()),
            source_message_id: source_message_id.map(ToOwned::to_owned),
            ..TaskMetadata::default()
        };

        let created = self
            .create_task(&candidate.title, option.date, metadata)
            .await?;
        if !add_to_calendar || !created.store.is_confirmed() {
            return Ok(SuggestionOutcome {
                task: created.task,
                store: created.store,
                calendar: CalendarSync::NotLinked,
            });
        }
        let Some(calendar) = self.calendar.as_ref() else {
            return Ok(SuggestionOutcome {
                task: created.task,
                store: created.store,
                calendar: CalendarSync::NotLinked,
            });
        };

        let event = encode_task_event(&created.task, calendar.timezone)?;
        let event_id = match calendar
            .client
            .create_event(&calendar.access_token, &calendar.calendar_id, &event)
            .await
        {
            Ok(event_id) => event_id,
            Err(error) => {
                log::error!(
                    "task board: calendar event for task {} not created: {error}",
                    created.task.id
                );
                return Ok(SuggestionOutcome {
                    task: created.task,
                    store: created.store,
                    calendar: CalendarSync::Failed,
                });
            }
        };

        let link = TaskMetadata {
            calendar_event_id: Some(event_id),
            ..TaskMetadata::default()
        };
        let store = self.merge_metadata(&created.task.id, &link).await?;
        let task = self
            .lock_state()?
            .tasks
            .iter()
            .find(|task| task.id == created.task.id)
            .cloned()
            .unwrap_or(created.task);
        Ok(SuggestionOutcome {
            task,
            store,
            calendar: CalendarSync::Synced,
        })
    }

    async fn sync_calendar_time(&self, task: &Task) -> CalendarSync {
        let (Some(calendar), Some(event_id)) = (
            self.calendar.as_ref(),
            task.metadata.calendar_event_id.as_deref(),
        ) else {
            return CalendarSync::NotLinked;
        };

        let patch = match reschedule_patch(
            task.date,
            task.metadata.parsed_start_time(),
            calendar.timezone,
        ) {
            Ok(patch) => patch,
            Err(error) => {
                log::error!("task board: cannot build calendar patch for task {}: {error}", task.id);
                return CalendarSync::Failed;
            }
        };

        match calendar
            .client
            .patch_event_time(&calendar.access_token, &calendar.calendar_id, event_id, &patch)
            .await
        {
            Ok(()) => CalendarSync::Synced,
            Err(error) => {
                log::error!(
                    "task board: calendar event {event_id} not moved with task {}: {error}",
                    task.id
                );
                CalendarSync::Failed
            }
        }
    }

    fn begin_update<F>(
        &self,
        kind: MutationKind,
        task_id: &str,
        apply: F,
    ) -> Result<(Task, PendingMutation), InfraError>
    where
        F: FnOnce(&mut Task, &[Task]),
    {
        let mut state = self.lock_state()?;
        let Some(index) = state.tasks.iter().position(|task| task.id == task_id) else {
            return Err(InfraError::NotFound(format!("task {task_id}")));
        };
        self.claim(&mut state, task_id)?;

        let snapshot = state.tasks.clone();
        let previous = state.tasks[index].clone();
        let mut updated = previous.clone();
        apply(&mut updated, &state.tasks);
        state.tasks[index] = updated.clone();
        state.revision += 1;

        Ok((
            updated,
            PendingMutation {
                kind,
                task_id: task_id.to_string(),
                snapshot,
                revision: state.revision,
                previous: Some(previous),
            },
        ))
    }

    fn claim(&self, state: &mut BoardState, task_id: &str) -> Result<(), InfraError> {
        if !state.in_flight.insert(task_id.to_string()) {
            return Err(InfraError::MutationInFlight(task_id.to_string()));
        }
        Ok(())
    }

    fn settle(
        &self,
        pending: PendingMutation,
        result: Result<(), InfraError>,
    ) -> Result<SyncOutcome, InfraError> {
        let mut state = self.lock_state()?;
        state.in_flight.remove(&pending.task_id);

        let Err(error) = result else {
            return Ok(SyncOutcome::Confirmed);
        };
        log::error!(
            "task board: {:?} of task {} failed: {error}",
            pending.kind,
            pending.task_id
        );

        match self.rollback_policies.policy_for(pending.kind) {
            RollbackPolicy::None => Ok(SyncOutcome::Failed { rolled_back: false }),
            RollbackPolicy::FullList => {
                if state.revision == pending.revision {
                    state.tasks = pending.snapshot;
                } else {
                    // Other mutations landed meanwhile; only undo this task.
                    state.tasks.retain(|task| task.id != pending.task_id);
                    if let Some(previous) = pending.previous {
                        state.tasks.push(previous);
                    }
                }
                state.revision += 1;
                Ok(SyncOutcome::Failed { rolled_back: true })
            }
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, BoardState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("task board lock poisoned: {error}")))
    }
}

fn is_temp_id(task_id: &str) -> bool {
    task_id
        .strip_prefix(TEMP_ID_PREFIX)
        .is_some_and(|rest| rest.starts_with('-'))
}

fn next_position(tasks: &[Task], date: NaiveDate) -> i64 {
    tasks
        .iter()
        .filter(|task| task.date == date)
        .map(|task| task.position + 1)
        .max()
        .unwrap_or(0)
}
