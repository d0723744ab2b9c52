use crate::application::bootstrap::bootstrap_workspace;
use crate::application::commands::{
    AppState, accept_suggestion_impl, add_goal_impl, cache_access_token_impl,
    confirm_subscription_impl, create_habit_impl, create_task_impl, delete_goal_impl,
    delete_habit_impl, delete_task_impl, import_calendar_impl, inbox_suggestions_impl,
    list_goals_impl, list_habits_impl, list_tasks_impl, move_task_impl, reorder_goal_impl,
    reorder_task_impl, reset_habit_impl, sign_out_impl, start_subscription_impl,
    subscription_status_impl, suggest_events_impl, toggle_habit_impl, toggle_task_impl,
};
use crate::infrastructure::error::InfraError;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "taskmaster")]
#[command(about = "Weekly task board with email date suggestions and calendar sync")]
#[command(version)]
pub struct Cli {
    /// Workspace directory (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the workspace layout, default config and database
    Bootstrap,
    /// Suggest calendar dates for a piece of text
    Suggest {
        /// Subject or title line
        subject: String,
        /// Body text
        #[arg(long, default_value = "")]
        body: String,
        /// Reference date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<String>,
        /// Turn option N into a task
        #[arg(long)]
        accept: Option<usize>,
        /// Also create a calendar event for the accepted option
        #[arg(long, requires = "accept")]
        calendar: bool,
    },
    /// List tasks, optionally for one weekday or date
    Tasks {
        #[arg(long)]
        day: Option<String>,
    },
    /// Add a task on a weekday of this week or a YYYY-MM-DD date
    Add {
        title: String,
        day: String,
        /// Start time (HH:MM)
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Toggle a task between pending and completed
    Toggle { task_id: String },
    /// Move a task to a weekday of the current week
    Move { task_id: String, day: String },
    /// Move a task to a position within its day
    Reorder { task_id: String, index: usize },
    /// Delete a task
    Delete { task_id: String },
    /// Import this week's events from Google Calendar
    ImportCalendar,
    /// Suggest events from recent Gmail messages
    Inbox,
    /// Weekly habits
    Habit {
        #[command(subcommand)]
        command: HabitCommand,
    },
    /// Ordered goal lists
    Goal {
        #[command(subcommand)]
        command: GoalCommand,
    },
    /// Subscription checkout state
    Subscribe {
        #[command(subcommand)]
        command: SubscribeCommand,
    },
    /// Cache a Google access token in the OS keyring
    Token {
        access_token: String,
        #[arg(long, default_value_t = 3600)]
        expires_in: i64,
    },
    /// Forget the cached token and client state
    SignOut,
}

#[derive(Debug, Subcommand)]
pub enum HabitCommand {
    Add { name: String },
    List,
    Toggle { habit_id: String, day: String },
    Reset { habit_id: String },
    Delete { habit_id: String },
}

#[derive(Debug, Subcommand)]
pub enum GoalCommand {
    Add {
        text: String,
        #[arg(long, default_value = "general")]
        scope: String,
    },
    List {
        #[arg(long, default_value = "general")]
        scope: String,
    },
    Reorder {
        goal_id: String,
        index: usize,
        #[arg(long, default_value = "general")]
        scope: String,
    },
    Delete {
        goal_id: String,
        #[arg(long, default_value = "general")]
        scope: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SubscribeCommand {
    /// Record a pending checkout session
    Start { session_token: String },
    /// Verify the pending checkout session
    Confirm,
    Status,
}

/// Runs one command and returns its JSON result. Errors are logged to the
/// workspace command log once a workspace exists.
pub async fn run(cli: Cli) -> Result<serde_json::Value, String> {
    let workspace_root = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    if let Commands::Bootstrap = cli.command {
        let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
        return Ok(serde_json::json!({
            "workspace_root": result.workspace_root.display().to_string(),
            "database_path": result.database_path.display().to_string(),
        }));
    }

    let state = AppState::new(workspace_root).map_err(|error| error.to_string())?;
    dispatch(&state, cli.command).await
}

async fn dispatch(state: &AppState, command: Commands) -> Result<serde_json::Value, String> {
    match command {
        Commands::Bootstrap => Ok(serde_json::json!({
            "database_path": state.database_path().display().to_string(),
        })),
        Commands::Suggest {
            subject,
            body,
            today,
            accept: None,
            ..
        } => respond(
            state,
            "suggest_events",
            suggest_events_impl(state, subject, body, today),
        ),
        Commands::Suggest {
            subject,
            body,
            accept: Some(option_index),
            calendar,
            ..
        } => respond(
            state,
            "accept_suggestion",
            accept_suggestion_impl(state, subject, body, option_index, calendar).await,
        ),
        Commands::Tasks { day } => respond(state, "list_tasks", list_tasks_impl(state, day).await),
        Commands::Add {
            title,
            day,
            time,
            note,
        } => respond(
            state,
            "create_task",
            create_task_impl(state, title, day, time, note).await,
        ),
        Commands::Toggle { task_id } => {
            respond(state, "toggle_task", toggle_task_impl(state, task_id).await)
        }
        Commands::Move { task_id, day } => {
            respond(state, "move_task", move_task_impl(state, task_id, day).await)
        }
        Commands::Reorder { task_id, index } => respond(
            state,
            "reorder_task",
            reorder_task_impl(state, task_id, index).await,
        ),
        Commands::Delete { task_id } => {
            respond(state, "delete_task", delete_task_impl(state, task_id).await)
        }
        Commands::ImportCalendar => {
            respond(state, "import_calendar", import_calendar_impl(state).await)
        }
        Commands::Inbox => respond(state, "inbox_suggestions", inbox_suggestions_impl(state).await),
        Commands::Habit { command } => match command {
            HabitCommand::Add { name } => respond(state, "create_habit", create_habit_impl(state, name)),
            HabitCommand::List => respond(state, "list_habits", list_habits_impl(state)),
            HabitCommand::Toggle { habit_id, day } => {
                respond(state, "toggle_habit", toggle_habit_impl(state, habit_id, day))
            }
            HabitCommand::Reset { habit_id } => {
                respond(state, "reset_habit", reset_habit_impl(state, habit_id))
            }
            HabitCommand::Delete { habit_id } => {
                respond(state, "delete_habit", delete_habit_impl(state, habit_id))
            }
        },
        Commands::Goal { command } => match command {
            GoalCommand::Add { text, scope } => respond(state, "add_goal", add_goal_impl(state, text, scope)),
            GoalCommand::List { scope } => respond(state, "list_goals", list_goals_impl(state, scope)),
            GoalCommand::Reorder {
                goal_id,
                index,
                scope,
            } => respond(
                state,
                "reorder_goal",
                reorder_goal_impl(state, goal_id, scope, index),
            ),
            GoalCommand::Delete { goal_id, scope } => {
                respond(state, "delete_goal", delete_goal_impl(state, goal_id, scope))
            }
        },
        Commands::Subscribe { command } => match command {
            SubscribeCommand::Start { session_token } => respond(
                state,
                "start_subscription",
                start_subscription_impl(state, session_token),
            ),
            SubscribeCommand::Confirm => respond(
                state,
                "confirm_subscription",
                confirm_subscription_impl(state).await,
            ),
            SubscribeCommand::Status => {
                respond(state, "subscription_status", subscription_status_impl(state))
            }
        },
        Commands::Token {
            access_token,
            expires_in,
        } => respond(
            state,
            "cache_access_token",
            cache_access_token_impl(state, access_token, expires_in).map(|token| {
                serde_json::json!({ "expires_at": token.expires_at.to_rfc3339() })
            }),
        ),
        Commands::SignOut => respond(state, "sign_out", sign_out_impl(state)),
    }
}

fn respond<T>(
    state: &AppState,
    command: &str,
    result: Result<T, InfraError>,
) -> Result<serde_json::Value, String>
where
    T: Serialize,
{
    result
        .and_then(|value| serde_json::to_value(value).map_err(InfraError::from))
        .map_err(|error| state.command_error(command, &error))
}
