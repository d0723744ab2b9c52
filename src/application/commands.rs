use crate::application::bootstrap::bootstrap_workspace;
use crate::application::calendar_import::{CalendarImportResult, CalendarImportService};
use crate::application::email_suggestions::{EmailSuggestion, suggest_from_inbox};
use crate::application::goals::GoalService;
use crate::application::habits::HabitService;
use crate::application::subscription::{SubscriptionOutcome, confirm_subscription};
use crate::application::task_board::{
    CalendarBinding, CreateOutcome, MoveOutcome, SuggestionOutcome, SyncOutcome, TaskBoard,
};
use crate::domain::event_extractor::{CandidateEvent, extract_event};
use crate::domain::models::{AccessToken, Goal, GoalScope, Habit, Task, TaskMetadata, parse_date};
use crate::domain::week::{date_for_weekday, parse_weekday};
use crate::infrastructure::billing_client::StripeCheckoutVerifier;
use crate::infrastructure::client_state::{ClientState, ClientStateStore, FileClientStateStore};
use crate::infrastructure::config::{
    AppConfig, GOOGLE_ACCESS_TOKEN_KEYS, STRIPE_SECRET_KEY_KEYS, env_lookup,
    optional_lookup_value, required_lookup_value,
};
use crate::infrastructure::credential_store::{
    CredentialStore, KeyringCredentialStore, usable_token,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::gmail_client::ReqwestGmailClient;
use crate::infrastructure::goal_repository::SqliteGoalRepository;
use crate::infrastructure::google_calendar_client::ReqwestGoogleCalendarClient;
use crate::infrastructure::habit_repository::SqliteHabitRepository;
use crate::infrastructure::task_store::SqliteTaskStore;
use chrono::{Duration, NaiveDate, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
pub type SqliteTaskBoard = TaskBoard<SqliteTaskStore, ReqwestGoogleCalendarClient>;

pub struct AppState {
    config: AppConfig,
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    board: SqliteTaskBoard,
    board_loaded: AtomicBool,
    calendar_client: Arc<ReqwestGoogleCalendarClient>,
    habits: HabitService<SqliteHabitRepository>,
    goals: GoalService<SqliteGoalRepository>,
    client_state: FileClientStateStore,
    credential_store: Arc<dyn CredentialStore>,
    lookup: EnvLookup,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let lookup: EnvLookup = Arc::new(env_lookup);
        Self::with_environment(
            workspace_root,
            lookup,
            Arc::new(KeyringCredentialStore::default()),
        )
    }

    /// Same as [`AppState::new`] with the secret lookup and token cache supplied
    /// by the caller.
    pub fn with_environment(
        workspace_root: PathBuf,
        lookup: EnvLookup,
        credential_store: Arc<dyn CredentialStore>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = bootstrap.config.clone();
        let timezone = config.timezone;
        let calendar_client = Arc::new(ReqwestGoogleCalendarClient::new());

        let mut board = TaskBoard::new(
            config.user_id.clone(),
            Arc::new(SqliteTaskStore::new(&bootstrap.database_path)),
        )
        .with_today_provider(Arc::new(move || {
            Utc::now().with_timezone(&timezone).date_naive()
        }));
        if let Some(access_token) = resolve_access_token(&lookup, credential_store.as_ref()) {
            board = board.with_calendar(CalendarBinding {
                client: Arc::clone(&calendar_client),
                access_token,
                calendar_id: config.calendar_id.clone(),
                timezone,
            });
        }

        Ok(Self {
            habits: HabitService::new(
                Arc::new(SqliteHabitRepository::new(&bootstrap.database_path)),
                config.user_id.clone(),
            ),
            goals: GoalService::new(
                Arc::new(SqliteGoalRepository::new(&bootstrap.database_path)),
                config.user_id.clone(),
            ),
            client_state: FileClientStateStore::new(bootstrap.state_dir.join("client_state.json")),
            config,
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            board,
            board_loaded: AtomicBool::new(false),
            calendar_client,
            credential_store,
            lookup,
            log_guard: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Current local date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        self.board.today()
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    async fn loaded_board(&self) -> Result<&SqliteTaskBoard, InfraError> {
        if !self.board_loaded.swap(true, Ordering::SeqCst) {
            if let Err(error) = self.board.load().await {
                self.board_loaded.store(false, Ordering::SeqCst);
                return Err(error);
            }
        }
        Ok(&self.board)
    }

    fn required_access_token(&self) -> Result<String, InfraError> {
        resolve_access_token(&self.lookup, self.credential_store.as_ref()).ok_or_else(|| {
            InfraError::InvalidConfig(format!(
                "missing google access token (set one of: {}, or cache one with `taskmaster token`)",
                GOOGLE_ACCESS_TOKEN_KEYS.join(", ")
            ))
        })
    }
}

pub fn suggest_events_impl(
    state: &AppState,
    subject: String,
    body: String,
    today: Option<String>,
) -> Result<Option<CandidateEvent>, InfraError> {
    let today = match today {
        Some(value) => parse_date(value.trim(), "today").map_err(InfraError::InvalidInput)?,
        None => state.today(),
    };
    let candidate = extract_event(&subject, &body, today);
    let message = match &candidate {
        Some(candidate) => format!("{} option(s) for '{}'", candidate.options.len(), candidate.title),
        None => "no date found".to_string(),
    };
    state.log_info("suggest_events", &message);
    Ok(candidate)
}

pub async fn list_tasks_impl(state: &AppState, day: Option<String>) -> Result<Vec<Task>, InfraError> {
    let board = state.loaded_board().await?;
    match day {
        Some(day) => board.tasks_for_date(resolve_day(state, &day)?),
        None => board.tasks(),
    }
}

pub async fn create_task_impl(
    state: &AppState,
    title: String,
    day: String,
    start_time: Option<String>,
    note: Option<String>,
) -> Result<CreateOutcome, InfraError> {
    let date = resolve_day(state, &day)?;
    let metadata = TaskMetadata {
        start_time: start_time
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned),
        note: note
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned),
        ..TaskMetadata::default()
    };
    metadata.validate().map_err(InfraError::InvalidInput)?;

    let created = state
        .loaded_board()
        .await?
        .create_task(&title, date, metadata)
        .await?;
    log_sync(state, "create_task", &created.task.id, created.store);
    Ok(created)
}

pub async fn toggle_task_impl(state: &AppState, task_id: String) -> Result<SyncOutcome, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;
    let outcome = state.loaded_board().await?.toggle_status(task_id).await?;
    log_sync(state, "toggle_task", task_id, outcome);
    Ok(outcome)
}

pub async fn move_task_impl(
    state: &AppState,
    task_id: String,
    day: String,
) -> Result<MoveOutcome, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;
    let weekday = parse_weekday(&day)
        .ok_or_else(|| InfraError::InvalidInput(format!("unknown weekday: {day}")))?;
    let outcome = state
        .loaded_board()
        .await?
        .move_to_day(task_id, weekday)
        .await?;
    log_sync(state, "move_task", task_id, outcome.store);
    Ok(outcome)
}

pub async fn reorder_task_impl(
    state: &AppState,
    task_id: String,
    index: usize,
) -> Result<SyncOutcome, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;
    let outcome = state
        .loaded_board()
        .await?
        .reorder_within_day(task_id, index)
        .await?;
    log_sync(state, "reorder_task", task_id, outcome);
    Ok(outcome)
}

pub async fn delete_task_impl(state: &AppState, task_id: String) -> Result<SyncOutcome, InfraError> {
    let task_id = required_id(&task_id, "task_id")?;
    let outcome = state.loaded_board().await?.delete_task(task_id).await?;
    log_sync(state, "delete_task", task_id, outcome);
    Ok(outcome)
}

pub async fn accept_suggestion_impl(
    state: &AppState,
    subject: String,
    body: String,
    option_index: usize,
    add_to_calendar: bool,
) -> Result<SuggestionOutcome, InfraError> {
    let candidate = extract_event(&subject, &body, state.today())
        .ok_or_else(|| InfraError::InvalidInput("no date found in text".to_string()))?;
    let outcome = state
        .loaded_board()
        .await?
        .add_suggestion(&candidate, option_index, None, add_to_calendar)
        .await?;
    log_sync(state, "accept_suggestion", &outcome.task.id, outcome.store);
    Ok(outcome)
}

pub async fn import_calendar_impl(state: &AppState) -> Result<CalendarImportResult, InfraError> {
    let access_token = state.required_access_token()?;
    let service =
        CalendarImportService::new(Arc::clone(&state.calendar_client), state.config.timezone);
    let result = service
        .import_week(
            state.loaded_board().await?,
            &access_token,
            &state.config.calendar_id,
        )
        .await?;
    state.log_info(
        "import_calendar",
        &format!(
            "calendar_id={} fetched={} created={} merged={} failed={}",
            state.config.calendar_id,
            result.fetched,
            result.report.created,
            result.report.merged,
            result.report.failed
        ),
    );
    Ok(result)
}

pub async fn inbox_suggestions_impl(state: &AppState) -> Result<Vec<EmailSuggestion>, InfraError> {
    let access_token = state.required_access_token()?;
    let gmail = ReqwestGmailClient::new();
    let suggestions = suggest_from_inbox(
        &gmail,
        &access_token,
        &state.config.gmail_query,
        state.config.gmail_max_results,
        state.today(),
    )
    .await?;
    state.log_info(
        "inbox_suggestions",
        &format!("{} suggestion(s)", suggestions.len()),
    );
    Ok(suggestions)
}

pub fn create_habit_impl(state: &AppState, name: String) -> Result<Habit, InfraError> {
    let habit = state.habits.create_habit(&name)?;
    state.log_info("create_habit", &format!("created habit_id={}", habit.id));
    Ok(habit)
}

pub fn list_habits_impl(state: &AppState) -> Result<Vec<Habit>, InfraError> {
    state.habits.list_habits()
}

pub fn toggle_habit_impl(
    state: &AppState,
    habit_id: String,
    day: String,
) -> Result<Habit, InfraError> {
    let habit_id = required_id(&habit_id, "habit_id")?;
    let weekday = parse_weekday(&day)
        .ok_or_else(|| InfraError::InvalidInput(format!("unknown weekday: {day}")))?;
    let day_index = weekday.num_days_from_monday() as usize;
    let habit = state.habits.toggle_habit_day(habit_id, day_index)?;
    state.log_info(
        "toggle_habit",
        &format!("habit_id={habit_id} day={day_index} done={}", habit.history[day_index]),
    );
    Ok(habit)
}

pub fn reset_habit_impl(state: &AppState, habit_id: String) -> Result<Habit, InfraError> {
    let habit_id = required_id(&habit_id, "habit_id")?;
    let habit = state.habits.reset_week(habit_id)?;
    state.log_info("reset_habit", &format!("habit_id={habit_id}"));
    Ok(habit)
}

pub fn delete_habit_impl(state: &AppState, habit_id: String) -> Result<(), InfraError> {
    let habit_id = required_id(&habit_id, "habit_id")?;
    state.habits.delete_habit(habit_id)?;
    state.log_info("delete_habit", &format!("deleted habit_id={habit_id}"));
    Ok(())
}

pub fn add_goal_impl(state: &AppState, text: String, scope: String) -> Result<Goal, InfraError> {
    let scope = parse_scope(&scope)?;
    let goal = state.goals.add_goal(&text, scope)?;
    state.log_info("add_goal", &format!("created goal_id={} scope={}", goal.id, scope.as_str()));
    Ok(goal)
}

pub fn list_goals_impl(state: &AppState, scope: String) -> Result<Vec<Goal>, InfraError> {
    state.goals.list_goals(parse_scope(&scope)?)
}

pub fn reorder_goal_impl(
    state: &AppState,
    goal_id: String,
    scope: String,
    index: usize,
) -> Result<Vec<Goal>, InfraError> {
    let goal_id = required_id(&goal_id, "goal_id")?;
    let goals = state.goals.reorder_goal(goal_id, parse_scope(&scope)?, index)?;
    state.log_info("reorder_goal", &format!("goal_id={goal_id} index={index}"));
    Ok(goals)
}

pub fn delete_goal_impl(state: &AppState, goal_id: String, scope: String) -> Result<(), InfraError> {
    let goal_id = required_id(&goal_id, "goal_id")?;
    state.goals.delete_goal(goal_id, parse_scope(&scope)?)?;
    state.log_info("delete_goal", &format!("deleted goal_id={goal_id}"));
    Ok(())
}

/// Records the checkout session the user is about to pay for.
pub fn start_subscription_impl(
    state: &AppState,
    session_token: String,
) -> Result<ClientState, InfraError> {
    state.client_state.set_subscription_intent(&session_token)?;
    state.log_info("start_subscription", "subscription intent recorded");
    state.client_state.load()
}

pub async fn confirm_subscription_impl(state: &AppState) -> Result<SubscriptionOutcome, InfraError> {
    if state.client_state.load()?.subscription_intent.is_none() {
        return Ok(SubscriptionOutcome::NoPendingIntent);
    }
    let lookup = |key: &str| (state.lookup)(key);
    let secret_key = required_lookup_value(&lookup, &STRIPE_SECRET_KEY_KEYS, "stripe secret key")?;
    let verifier = StripeCheckoutVerifier::new(secret_key);
    let outcome = confirm_subscription(&state.client_state, &verifier).await?;
    state.log_info("confirm_subscription", &format!("outcome={outcome:?}"));
    Ok(outcome)
}

pub fn subscription_status_impl(state: &AppState) -> Result<ClientState, InfraError> {
    state.client_state.load()
}

/// Caches a Google access token obtained elsewhere.
pub fn cache_access_token_impl(
    state: &AppState,
    access_token: String,
    expires_in_seconds: i64,
) -> Result<AccessToken, InfraError> {
    let access_token = access_token.trim();
    if access_token.is_empty() {
        return Err(InfraError::InvalidInput("access token must not be empty".to_string()));
    }
    if expires_in_seconds <= 0 {
        return Err(InfraError::InvalidInput(
            "expires_in_seconds must be positive".to_string(),
        ));
    }
    let token = AccessToken {
        access_token: access_token.to_string(),
        expires_at: Utc::now() + Duration::seconds(expires_in_seconds),
        scope: None,
    };
    state.credential_store.save_token(&token)?;
    state.log_info(
        "cache_access_token",
        &format!("expires_at={}", token.expires_at.to_rfc3339()),
    );
    Ok(token)
}

/// Forgets the cached token and every client flag.
pub fn sign_out_impl(state: &AppState) -> Result<(), InfraError> {
    state.credential_store.delete_token()?;
    state.client_state.clear_all()?;
    state.log_info("sign_out", "cleared cached token and client state");
    Ok(())
}

fn resolve_access_token(lookup: &EnvLookup, store: &dyn CredentialStore) -> Option<String> {
    let from_env = |key: &str| lookup(key);
    if let Some(token) = optional_lookup_value(&from_env, &GOOGLE_ACCESS_TOKEN_KEYS) {
        return Some(token);
    }
    match usable_token(store, Utc::now()) {
        Ok(token) => token,
        Err(error) => {
            log::warn!("cached google token unavailable: {error}");
            None
        }
    }
}

/// Accepts a weekday of the current week or a `YYYY-MM-DD` date.
fn resolve_day(state: &AppState, value: &str) -> Result<NaiveDate, InfraError> {
    let value = value.trim();
    if let Some(weekday) = parse_weekday(value) {
        return Ok(date_for_weekday(state.today(), weekday));
    }
    parse_date(value, "day").map_err(InfraError::InvalidInput)
}

fn parse_scope(value: &str) -> Result<GoalScope, InfraError> {
    GoalScope::parse(value).map_err(InfraError::InvalidInput)
}

fn required_id<'a>(value: &'a str, field_name: &str) -> Result<&'a str, InfraError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InfraError::InvalidInput(format!("{field_name} must not be empty")));
    }
    Ok(value)
}

fn log_sync(state: &AppState, command: &str, task_id: &str, outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Confirmed => state.log_info(command, &format!("confirmed task_id={task_id}")),
        SyncOutcome::Failed { rolled_back } => state.log_error(
            command,
            &format!("remote write failed task_id={task_id} rolled_back={rolled_back}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::task_board::CalendarSync;
    use crate::domain::models::TaskStatus;
    use crate::infrastructure::credential_store::InMemoryCredentialStore;
    use chrono::Weekday;
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
        credentials: Arc<InMemoryCredentialStore>,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "taskmaster-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self {
                path,
                credentials: Arc::new(InMemoryCredentialStore::default()),
            }
        }

        fn app_state(&self) -> AppState {
            let lookup: EnvLookup = Arc::new(|_: &str| -> Option<String> { None });
            AppState::with_environment(self.path.clone(), lookup, self.credentials.clone())
                .expect("initialize app state")
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[tokio::test]
    async fn create_task_rejects_empty_title() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = create_task_impl(&state, "   ".to_string(), "monday".to_string(), None, None).await;
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn task_flow_persists_across_sessions() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let created = create_task_impl(
            &state,
            "Write integration tests".to_string(),
            "2025-01-15".to_string(),
            Some("09:00".to_string()),
            None,
        )
        .await
        .expect("create task");
        assert_eq!(created.store, SyncOutcome::Confirmed);
        let task_id = created.task.id.clone();

        assert!(toggle_task_impl(&state, task_id.clone()).await.expect("toggle").is_confirmed());
        let moved = move_task_impl(&state, task_id.clone(), "fri".to_string())
            .await
            .expect("move");
        assert_eq!(moved.calendar, CalendarSync::NotLinked);

        let reopened = workspace.app_state();
        let listed = list_tasks_impl(&reopened, None).await.expect("list tasks");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, task_id);
        assert_eq!(listed[0].status, TaskStatus::Completed);
        assert_eq!(listed[0].date, date_for_weekday(reopened.today(), Weekday::Fri));
        assert_eq!(listed[0].metadata.start_time.as_deref(), Some("09:00"));

        let friday = list_tasks_impl(&reopened, Some("friday".to_string()))
            .await
            .expect("list friday");
        assert_eq!(friday.len(), 1);

        assert!(delete_task_impl(&reopened, task_id).await.expect("delete").is_confirmed());
        assert!(list_tasks_impl(&workspace.app_state(), None).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn reorder_persists_positions() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let mut ids = Vec::new();
        for title in ["first", "second", "third"] {
            let created = create_task_impl(&state, title.to_string(), "2025-02-03".to_string(), None, None)
                .await
                .expect("create");
            ids.push(created.task.id);
        }

        reorder_task_impl(&state, ids[2].clone(), 0).await.expect("reorder");

        let reopened = workspace.app_state();
        let titles: Vec<String> = list_tasks_impl(&reopened, Some("2025-02-03".to_string()))
            .await
            .expect("list")
            .into_iter()
            .map(|task| task.title)
            .collect();
        assert_eq!(titles, vec!["third", "first", "second"]);
    }

    #[tokio::test]
    async fn unknown_weekday_and_task_are_reported() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(matches!(
            move_task_impl(&state, "task-1".to_string(), "someday".to_string()).await,
            Err(InfraError::InvalidInput(_))
        ));
        assert!(matches!(
            toggle_task_impl(&state, "missing".to_string()).await,
            Err(InfraError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn google_commands_require_a_token() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(matches!(
            import_calendar_impl(&state).await,
            Err(InfraError::InvalidConfig(_))
        ));
        assert!(matches!(
            inbox_suggestions_impl(&state).await,
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn cached_token_is_used_until_sign_out() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(state.required_access_token().is_err());

        cache_access_token_impl(&state, "ya29.cached".to_string(), 3600).expect("cache token");
        assert_eq!(state.required_access_token().expect("token"), "ya29.cached");

        start_subscription_impl(&state, "cs_test_9".to_string()).expect("intent");
        sign_out_impl(&state).expect("sign out");
        assert!(state.required_access_token().is_err());
        assert_eq!(subscription_status_impl(&state).expect("status"), ClientState::default());
    }

    #[tokio::test]
    async fn subscription_confirmation_needs_intent_and_secret() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert_eq!(
            confirm_subscription_impl(&state).await.expect("no intent"),
            SubscriptionOutcome::NoPendingIntent
        );

        start_subscription_impl(&state, "cs_test_1".to_string()).expect("intent");
        assert!(matches!(
            confirm_subscription_impl(&state).await,
            Err(InfraError::InvalidConfig(_))
        ));
        assert_eq!(
            subscription_status_impl(&state)
                .expect("status")
                .subscription_intent
                .as_deref(),
            Some("cs_test_1")
        );
    }

    #[test]
    fn habit_and_goal_flows() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let habit = create_habit_impl(&state, "Journal".to_string()).expect("habit");
        let toggled = toggle_habit_impl(&state, habit.id.clone(), "wed".to_string()).expect("toggle");
        assert!(toggled.history[2]);
        assert_eq!(list_habits_impl(&state).expect("list")[0].completed_days(), 1);
        assert_eq!(
            reset_habit_impl(&state, habit.id.clone()).expect("reset").completed_days(),
            0
        );
        delete_habit_impl(&state, habit.id).expect("delete habit");

        let first = add_goal_impl(&state, "Ship v1".to_string(), "monthly".to_string()).expect("goal");
        add_goal_impl(&state, "Hire".to_string(), "monthly".to_string()).expect("goal");
        let reordered =
            reorder_goal_impl(&state, first.id.clone(), "monthly".to_string(), 1).expect("reorder");
        assert_eq!(reordered[1].id, first.id);
        delete_goal_impl(&state, first.id, "monthly".to_string()).expect("delete goal");
        assert_eq!(list_goals_impl(&state, "monthly".to_string()).expect("list").len(), 1);
        assert!(add_goal_impl(&state, "x".to_string(), "weekly".to_string()).is_err());
    }

    #[test]
    fn suggestions_and_command_log() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        let candidate = suggest_events_impl(
            &state,
            "Sync".to_string(),
            "Let's meet Monday at 3:30pm".to_string(),
            Some("2025-01-15".to_string()),
        )
        .expect("suggest")
        .expect("candidate");
        assert_eq!(candidate.options[0].date.to_string(), "2025-01-20");
        assert_eq!(candidate.options[0].time.as_deref(), Some("15:30"));

        let error = InfraError::InvalidInput("boom".to_string());
        state.command_error("suggest_events", &error);

        let log = fs::read_to_string(workspace.path.join("logs").join("commands.log"))
            .expect("read command log");
        let lines: Vec<serde_json::Value> = log
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["command"], "suggest_events");
        assert_eq!(lines[1]["level"], "error");
    }
}
