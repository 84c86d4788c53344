/// Entity store schema.
///
/// Id-list columns (`assignees`, `comments`, ...) hold comma-joined ids.
/// `task_assignees` mirrors `task_summaries.assignees` for equality lookups.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    avatar BLOB
);

CREATE TABLE IF NOT EXISTS task_summaries (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    due TEXT,
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    task_type TEXT NOT NULL,
    assignees TEXT NOT NULL DEFAULT '',
    creator_id INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_summaries_creator ON task_summaries(creator_id);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    due TEXT,
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    task_type TEXT NOT NULL,
    assignees TEXT NOT NULL DEFAULT '',
    creator_id INTEGER NOT NULL,
    sent_date TEXT NOT NULL,
    comments TEXT NOT NULL DEFAULT '',
    subtasks TEXT NOT NULL DEFAULT '',
    checklists TEXT NOT NULL DEFAULT '',
    attachments TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS task_assignees (
    task_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (task_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_task_assignees_user ON task_assignees(user_id);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY,
    task_id INTEGER NOT NULL,
    author_id INTEGER NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subtasks (
    id INTEGER PRIMARY KEY,
    task_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    done INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS checklists (
    id INTEGER PRIMARY KEY,
    task_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    checked INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS attachments (
    id INTEGER PRIMARY KEY,
    task_id INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    url TEXT NOT NULL,
    uploaded_by INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_task ON comments(task_id);
CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks(task_id);
CREATE INDEX IF NOT EXISTS idx_checklists_task ON checklists(task_id);
CREATE INDEX IF NOT EXISTS idx_attachments_task ON attachments(task_id);

CREATE TABLE IF NOT EXISTS message_summaries (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    preview TEXT NOT NULL,
    sender_id INTEGER NOT NULL,
    sent_date TEXT NOT NULL,
    participants TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    sender_id INTEGER NOT NULL,
    sent_date TEXT NOT NULL,
    participants TEXT NOT NULL DEFAULT '',
    replies TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS message_replies (
    id INTEGER PRIMARY KEY,
    message_id INTEGER NOT NULL,
    sender_id INTEGER NOT NULL,
    body TEXT NOT NULL,
    sent_date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_message_replies_message ON message_replies(message_id);

CREATE TABLE IF NOT EXISTS profiles (
    user_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT,
    job_title TEXT,
    avatar BLOB
);

-- Lists that have been fetched at least once (an empty list is still cached)
CREATE TABLE IF NOT EXISTS list_cache (
    list_key TEXT PRIMARY KEY,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Every entity table, in wipe order.
pub const TABLES: &[&str] = &[
  "task_assignees",
  "comments",
  "subtasks",
  "checklists",
  "attachments",
  "tasks",
  "task_summaries",
  "message_replies",
  "messages",
  "message_summaries",
  "profiles",
  "users",
  "list_cache",
];
