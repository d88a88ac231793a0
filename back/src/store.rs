use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rusqlite::{params, Connection, InterruptHandle, OptionalExtension, Row, ToSql};
use thiserror::Error;
use todo_api::v1::{TodoCreate, TodoItem, TodoPatch};
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Engine-side clock, millisecond precision, UTC.
const NOW: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS todo_items (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
    title      TEXT NOT NULL DEFAULT '',
    content    TEXT NOT NULL DEFAULT ''
);
";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("todo not found")]
    NotFound,
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage operation cancelled")]
    Cancelled,
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// SQLite backed persistence for todo items.
///
/// Every operation opens its own connection on the blocking pool, so a
/// `TodoStore` is cheap to clone and safe to share between requests.
#[derive(Clone, Debug)]
pub struct TodoStore {
    path: Arc<PathBuf>,
}

impl TodoStore {
    /// Opens the database at `path`, creating the file and the table if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = connect(&path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.execute_batch(SCHEMA)?;

        debug!(path = %path.display(), "opened todo store");

        Ok(Self {
            path: Arc::new(path),
        })
    }

    pub async fn add_todo(&self, create: TodoCreate) -> Result<TodoItem, StoreError> {
        self.run(move |conn| {
            let todo = conn.query_row(
                "INSERT INTO todo_items (title, content) VALUES (?1, ?2) \
                 RETURNING id, created_at, updated_at, title, content",
                params![create.title, create.content],
                todo_from_row,
            )?;
            Ok(todo)
        })
        .await
    }

    pub async fn get_all_todos(&self) -> Result<Vec<TodoItem>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, created_at, updated_at, title, content \
                 FROM todo_items ORDER BY id",
            )?;
            let todos = stmt
                .query_map([], todo_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(todos)
        })
        .await
    }

    pub async fn get_todo(&self, id: &str) -> Result<TodoItem, StoreError> {
        let id = id.to_owned();
        self.run(move |conn| select_todo(conn, &id)).await
    }

    pub async fn delete_todo(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_owned();
        self.run(move |conn| {
            let affected = conn.execute("DELETE FROM todo_items WHERE id = ?1", [&id])?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    /// Writes only the columns present in `patch`, then reads the row back.
    ///
    /// An empty patch touches nothing, not even `updated_at`.
    pub async fn patch_todo(&self, id: &str, patch: TodoPatch) -> Result<TodoItem, StoreError> {
        let id = id.to_owned();
        self.run(move |conn| {
            if patch.is_empty() {
                return select_todo(conn, &id);
            }

            let mut assignments = Vec::new();
            let mut values: Vec<&dyn ToSql> = Vec::new();
            if let Some(title) = &patch.title {
                assignments.push("title = ?");
                values.push(title);
            }
            if let Some(content) = &patch.content {
                assignments.push("content = ?");
                values.push(content);
            }
            values.push(&id);

            let sql = format!(
                "UPDATE todo_items SET {}, updated_at = {NOW} WHERE id = ?",
                assignments.join(", ")
            );
            let affected = conn.execute(&sql, values.as_slice())?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }

            select_todo(conn, &id)
        })
        .await
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let path = Arc::clone(&self.path);
        let guard = CancelGuard::default();
        let slot = Arc::clone(&guard.slot);

        let result = tokio::task::spawn_blocking(move || {
            let conn = connect(&path)?;
            arm(&slot, &conn)?;
            op(&conn)
        })
        .await;

        guard.disarm();
        result?
    }
}

fn connect(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn select_todo(conn: &Connection, id: &str) -> Result<TodoItem, StoreError> {
    conn.query_row(
        "SELECT id, created_at, updated_at, title, content FROM todo_items WHERE id = ?1",
        [id],
        todo_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound)
}

fn todo_from_row(row: &Row<'_>) -> rusqlite::Result<TodoItem> {
    Ok(TodoItem {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
    })
}

#[derive(Default)]
struct InterruptSlot {
    handle: Option<InterruptHandle>,
    cancelled: bool,
}

/// Interrupts the in-flight query when the awaiting future is dropped.
#[derive(Default)]
struct CancelGuard {
    slot: Arc<Mutex<InterruptSlot>>,
    disarmed: bool,
}

impl CancelGuard {
    fn disarm(mut self) {
        self.disarmed = true;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.disarmed {
            return;
        }

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.cancelled = true;
        if let Some(handle) = slot.handle.take() {
            debug!("interrupting cancelled storage operation");
            handle.interrupt();
        }
    }
}

fn arm(slot: &Mutex<InterruptSlot>, conn: &Connection) -> Result<(), StoreError> {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.cancelled {
        return Err(StoreError::Cancelled);
    }
    slot.handle = Some(conn.get_interrupt_handle());
    Ok(())
}
