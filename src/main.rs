use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use tasksync::api::types::{
  ChildKind, MessageBundle, MessageList, NewTaskChild, ProfileData, TaskBundle, TaskList,
  TaskSummary, User,
};
use tasksync::api::{CachedClient, RestClient};
use tasksync::auth::CredentialStore;
use tasksync::cache::{CacheResult, CacheSource, EntityStore};
use tasksync::config::Config;
use tasksync::db;
use tasksync::state::{LoadAction, LoadState};
use tasksync::SyncError;

#[derive(Parser, Debug)]
#[command(name = "tasksync")]
#[command(about = "Local-first client for a task and messaging backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/tasksync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log to stderr instead of the daily log file
  #[arg(long)]
  log_stderr: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Log in (password is read from TASKSYNC_PASSWORD)
  Login {
    /// Account email (default: auth.email from the config)
    #[arg(short, long)]
    email: Option<String>,
  },
  /// Forget the login and wipe the local cache
  Logout,
  /// List tasks
  Tasks {
    #[arg(long)]
    refresh: bool,
  },
  /// Show one task with its comments, subtasks, checklist and attachments
  Task {
    id: u64,
    #[arg(long)]
    refresh: bool,
  },
  /// Cached tasks assigned to a user
  Assigned { user: u64 },
  /// Cached tasks created by a user
  CreatedBy { user: u64 },
  /// List conversations
  Messages {
    #[arg(long)]
    refresh: bool,
  },
  /// Show one conversation with its replies
  Message {
    id: u64,
    #[arg(long)]
    refresh: bool,
  },
  /// Show a user
  User { id: u64 },
  /// Show a user's profile
  Profile {
    user: u64,
    #[arg(long)]
    refresh: bool,
  },
  /// Comment on a task
  AddComment { task: u64, body: String },
  /// Delete a comment, subtask, checklist item or attachment
  RemoveChild {
    /// comments, subtasks, checklists or attachments
    kind: ChildKind,
    child_id: u64,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_tracing(args.log_stderr)?;

  let config = Config::load(args.config.as_deref())?;
  let client = build_client(&config)?;

  run(&client, &config, args.command).await
}

fn init_tracing(to_stderr: bool) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tasksync=info"));

  if to_stderr {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .init();
    return Ok(None);
  }

  let log_dir = db::data_dir()?.join("logs");
  let appender = tracing_appender::rolling::daily(log_dir, "tasksync.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Ok(Some(guard))
}

fn build_client(config: &Config) -> Result<CachedClient<RestClient>> {
  let remote = RestClient::new(&config.server.url, config.timeout())?;
  let store = EntityStore::open(&config.database_path()?)?;
  let credentials = CredentialStore::open(&config.credentials_path()?)?;

  Ok(
    CachedClient::new(Arc::new(remote), Arc::new(store), Arc::new(credentials))
      .with_refresh_leeway(config.refresh_leeway()),
  )
}

async fn run(client: &CachedClient<RestClient>, config: &Config, command: Command) -> Result<()> {
  match command {
    Command::Login { email } => {
      let email = email
        .or_else(|| config.auth.email.clone())
        .ok_or_else(|| eyre!("No email given. Pass --email or set auth.email in the config."))?;
      let password = Config::get_password()?;
      let session = client.login(&email, &password).await.map_err(report)?;
      println!("Logged in as {} (user {})", session.name, session.user_id);
    }
    Command::Logout => {
      client.logout().map_err(report)?;
      println!("Logged out, local cache cleared");
    }
    Command::Tasks { refresh } => {
      let result = if refresh {
        client.refresh_tasks().await
      } else {
        client.list_tasks().await
      };
      show(result, print_task_list)?;
    }
    Command::Task { id, refresh } => {
      let result = if refresh {
        client.refresh_task(id).await
      } else {
        client.get_task(id).await
      };
      show(result, print_task)?;
    }
    Command::Assigned { user } => {
      for task in client.tasks_assigned_to(user).map_err(report)? {
        print_summary(&task);
      }
    }
    Command::CreatedBy { user } => {
      for task in client.tasks_created_by(user).map_err(report)? {
        print_summary(&task);
      }
    }
    Command::Messages { refresh } => {
      let result = if refresh {
        client.refresh_messages().await
      } else {
        client.list_messages().await
      };
      show(result, print_message_list)?;
    }
    Command::Message { id, refresh } => {
      let result = if refresh {
        client.refresh_message(id).await
      } else {
        client.get_message(id).await
      };
      show(result, print_message)?;
    }
    Command::User { id } => {
      show(client.get_user(id).await, |user: &User| {
        println!("{} {}", user.id, user.name);
      })?;
    }
    Command::Profile { user, refresh } => {
      let result = if refresh {
        client.refresh_profile(user).await
      } else {
        client.get_profile(user).await
      };
      show(result, print_profile)?;
    }
    Command::AddComment { task, body } => {
      let created = client
        .add_child(task, NewTaskChild::Comment { body })
        .await
        .map_err(report)?;
      println!("Added comment {} to task {}", created.child.id(), task);
    }
    Command::RemoveChild { kind, child_id } => {
      client.remove_child(kind, child_id).await.map_err(report)?;
      println!("Removed {} {}", kind, child_id);
    }
  }
  Ok(())
}

fn report(err: SyncError) -> color_eyre::Report {
  tracing::warn!(error = %err, "command failed");
  eyre!(err.user_message())
}

/// Drive a read through the load state and print whatever it settled on.
fn show<T>(result: tasksync::Result<CacheResult<T>>, render: impl FnOnce(&T)) -> Result<()> {
  let state = LoadState::Idle
    .reduce(LoadAction::Started)
    .reduce(LoadAction::from_result(result));

  match state {
    LoadState::Ready { data, source } => {
      render(&data);
      if source == CacheSource::Cache {
        eprintln!("(cached, use --refresh to fetch)");
      }
      Ok(())
    }
    LoadState::Failed { message, retryable } => {
      if retryable {
        Err(eyre!("{} (try again)", message))
      } else {
        Err(eyre!(message))
      }
    }
    LoadState::Idle | LoadState::Loading => Ok(()),
  }
}

fn user_name(users: &[User], id: u64) -> String {
  users
    .iter()
    .find(|u| u.id == id)
    .map(|u| u.name.clone())
    .unwrap_or_else(|| format!("user {}", id))
}

fn print_summary(task: &TaskSummary) {
  let due = task
    .due
    .map(|d| d.format("%Y-%m-%d").to_string())
    .unwrap_or_else(|| "-".to_string());
  println!(
    "{:>6}  {:<11}  {:<7}  {:<10}  {}",
    task.id, task.status, task.priority, due, task.title
  );
}

fn print_task_list(list: &TaskList) {
  for task in &list.tasks {
    print_summary(task);
  }
}

fn print_task(bundle: &TaskBundle) {
  let task = &bundle.task;
  println!("#{} {} [{} / {} / {}]", task.id, task.title, task.task_type, task.status, task.priority);
  println!("Created by {}", user_name(&bundle.users, task.creator_id));
  if !task.assignees.is_empty() {
    let names: Vec<String> = task
      .assignees
      .iter()
      .map(|id| user_name(&bundle.users, *id))
      .collect();
    println!("Assigned to {}", names.join(", "));
  }
  if let Some(description) = &task.description {
    println!("\n{}", description);
  }
  for subtask in &bundle.subtasks {
    println!("  [{}] {}", if subtask.done { "x" } else { " " }, subtask.title);
  }
  for item in &bundle.checklists {
    println!("  ({}) {}", if item.checked { "x" } else { " " }, item.title);
  }
  for attachment in &bundle.attachments {
    println!("  attachment {} {}", attachment.file_name, attachment.url);
  }
  for comment in &bundle.comments {
    println!(
      "\n{} on {}:\n  {}",
      user_name(&bundle.users, comment.author_id),
      comment.created_at.format("%Y-%m-%d %H:%M"),
      comment.body
    );
  }
}

fn print_message_list(list: &MessageList) {
  for message in &list.messages {
    println!(
      "{:>6}  {}  {:<20}  {}",
      message.id,
      message.sent_date.format("%Y-%m-%d"),
      user_name(&list.users, message.sender_id),
      message.title
    );
  }
}

fn print_message(bundle: &MessageBundle) {
  let message = &bundle.message;
  println!("#{} {}", message.id, message.title);
  println!("From {}\n\n{}", user_name(&bundle.users, message.sender_id), message.body);
  for reply in &bundle.replies {
    println!(
      "\n{} on {}:\n  {}",
      user_name(&bundle.users, reply.sender_id),
      reply.sent_date.format("%Y-%m-%d %H:%M"),
      reply.body
    );
  }
}

fn print_profile(profile: &ProfileData) {
  println!("{} <{}>", profile.name, profile.email);
  if let Some(title) = &profile.job_title {
    println!("{}", title);
  }
  if let Some(phone) = &profile.phone {
    println!("{}", phone);
  }
}
