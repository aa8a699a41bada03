//! SQLite-backed store for sessions, messages and roles.

use std::os::raw::c_int;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parking_lot::Mutex;
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::schema::SCHEMA_SQL;
use crate::types::*;
use chat2anyllm_core::{Error, Result};

const SESSION_COLUMNS: &str = "id, title, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, session_id, role, content, created_at";
const ROLE_COLUMNS: &str = "id, name, instructions, created_at, updated_at";

/// Single-connection SQLite store. Calls are short and synchronous.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the database file, creating parent directories as needed.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::Database(e.to_string()))?;
        }

        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;

        let store = Self::from_connection(conn, Some(db_path.to_path_buf()))?;
        let stats = store.stats()?;
        info!(
            "SqliteStore initialized: {} sessions, {} messages, {} roles, path={}",
            stats.sessions,
            stats.messages,
            stats.roles,
            db_path.display()
        );
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Liveness check.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(db_err)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------

    /// All sessions, most recently active first.
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM sessions ORDER BY updated_at DESC, rowid DESC",
            SESSION_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql).map_err(db_err)?;
        let rows = stmt.query_map([], row_to_session).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn create_session(&self, title: &str) -> Result<Session> {
        let now = now();
        let session = Session {
            id: Uuid::new_v4(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO sessions (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(db_err)?
        .execute(params![
            session.id.to_string(),
            session.title,
            fmt_ts(&session.created_at),
            fmt_ts(&session.updated_at)
        ])
        .map_err(db_err)?;
        debug!("Created session {}", session.id);
        Ok(session)
    }

    pub fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS);
        let row = conn
            .prepare_cached(&sql)
            .map_err(db_err)?
            .query_row(params![id.to_string()], row_to_session)
            .optional()
            .map_err(db_err)?;
        Ok(row)
    }

    /// Change a session's title. Returns `false` if the session does not exist.
    pub fn rename_session(&self, id: Uuid, title: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE sessions SET title = ?1 WHERE id = ?2",
                params![title, id.to_string()],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Delete a session and its messages (cascade).
    pub fn delete_session(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        Ok(count > 0)
    }

    // ---------------------------------------------------------------
    // Messages
    // ---------------------------------------------------------------

    /// Messages of a session in conversation order.
    pub fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM messages WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
            MESSAGE_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![session_id.to_string()], row_to_message)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Append a message and bump the session's `updated_at`.
    pub fn add_message(&self, session_id: Uuid, role: MessageRole, content: &str) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.to_string(),
            created_at: now(),
        };
        let created = fmt_ts(&message.created_at);

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO messages (id, session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                session_id.to_string(),
                role.as_str(),
                message.content,
                created
            ],
        )
        .map_err(|e| {
            if is_constraint(&e, ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
                Error::NotFound(format!("session {}", session_id))
            } else {
                db_err(e)
            }
        })?;
        tx.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![created, session_id.to_string()],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(message)
    }

    pub fn count_messages(&self, session_id: Uuid) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
            params![session_id.to_string()],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    // ---------------------------------------------------------------
    // Roles
    // ---------------------------------------------------------------

    /// All roles sorted by name.
    pub fn list_roles(&self) -> Result<Vec<Role>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM roles ORDER BY name ASC", ROLE_COLUMNS);
        let mut stmt = conn.prepare_cached(&sql).map_err(db_err)?;
        let rows = stmt.query_map([], row_to_role).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM roles WHERE id = ?1", ROLE_COLUMNS);
        let row = conn
            .prepare_cached(&sql)
            .map_err(db_err)?
            .query_row(params![id.to_string()], row_to_role)
            .optional()
            .map_err(db_err)?;
        Ok(row)
    }

    /// Case-insensitive lookup by name.
    pub fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM roles WHERE lower(name) = lower(?1) ORDER BY name ASC LIMIT 1",
            ROLE_COLUMNS
        );
        let row = conn
            .prepare_cached(&sql)
            .map_err(db_err)?
            .query_row(params![name], row_to_role)
            .optional()
            .map_err(db_err)?;
        Ok(row)
    }

    /// Insert a role. A duplicate name yields [`Error::Conflict`].
    pub fn create_role(&self, name: &str, instructions: &str) -> Result<Role> {
        let now = now();
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            instructions: instructions.to_string(),
            created_at: now,
            updated_at: now,
        };
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO roles (id, name, instructions, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(db_err)?
        .execute(params![
            role.id.to_string(),
            role.name,
            role.instructions,
            fmt_ts(&role.created_at),
            fmt_ts(&role.updated_at)
        ])
        .map_err(role_write_err)?;
        Ok(role)
    }

    /// Apply a partial update. Returns `None` if the role does not exist.
    pub fn update_role(&self, id: Uuid, update: &RoleUpdate) -> Result<Option<Role>> {
        if update.is_empty() {
            return Err(Error::Invalid("Nothing to update".into()));
        }

        let mut fields: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(name) = &update.name {
            values.push(name.clone());
            fields.push(format!("name = ?{}", values.len()));
        }
        if let Some(instructions) = &update.instructions {
            values.push(instructions.clone());
            fields.push(format!("instructions = ?{}", values.len()));
        }
        values.push(fmt_ts(&now()));
        fields.push(format!("updated_at = ?{}", values.len()));
        values.push(id.to_string());
        let sql = format!(
            "UPDATE roles SET {} WHERE id = ?{}",
            fields.join(", "),
            values.len()
        );

        let conn = self.conn.lock();
        let count = conn
            .execute(&sql, rusqlite::params_from_iter(values.iter()))
            .map_err(role_write_err)?;
        if count == 0 {
            return Ok(None);
        }
        let select = format!("SELECT {} FROM roles WHERE id = ?1", ROLE_COLUMNS);
        conn.query_row(&select, params![id.to_string()], row_to_role)
            .optional()
            .map_err(db_err)
    }

    pub fn delete_role(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM roles WHERE id = ?1", params![id.to_string()])
            .map_err(db_err)?;
        Ok(count > 0)
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let count = |table: &str| -> Result<i64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .map_err(db_err)
        };
        let sessions = count("sessions")?;
        let messages = count("messages")?;
        let roles = count("roles")?;
        drop(conn);

        let db_size = self
            .db_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            sessions,
            messages,
            roles,
            db_path: self
                .db_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|| ":memory:".into()),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }
}

// ---------------------------------------------------------------
// Row Mapping Helpers
// ---------------------------------------------------------------

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: parse_uuid(row, 0)?,
        title: row.get(1)?,
        created_at: parse_ts(row, 2)?,
        updated_at: parse_ts(row, 3)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    Ok(Message {
        id: parse_uuid(row, 0)?,
        session_id: parse_uuid(row, 1)?,
        role: role.parse().map_err(|e: String| conversion_err(2, e))?,
        content: row.get(3)?,
        created_at: parse_ts(row, 4)?,
    })
}

fn row_to_role(row: &rusqlite::Row<'_>) -> rusqlite::Result<Role> {
    Ok(Role {
        id: parse_uuid(row, 0)?,
        name: row.get(1)?,
        instructions: row.get(2)?,
        created_at: parse_ts(row, 3)?,
        updated_at: parse_ts(row, 4)?,
    })
}

fn parse_uuid(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_err(idx, e.to_string()))
}

fn parse_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e.to_string()))
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(Error::Database(msg)),
    )
}

/// Current time at the precision the database keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

/// True for a constraint failure with the given extended result code.
fn is_constraint(e: &rusqlite::Error, extended: c_int) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == ErrorCode::ConstraintViolation && err.extended_code == extended
    )
}

fn role_write_err(e: rusqlite::Error) -> Error {
    if is_constraint(&e, ffi::SQLITE_CONSTRAINT_UNIQUE) {
        Error::Conflict("Role name already exists".into())
    } else {
        db_err(e)
    }
}
