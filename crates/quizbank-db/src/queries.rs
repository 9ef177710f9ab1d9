use crate::models::{TestRow, TestSummaryRow, UserRow};
use crate::{Database, DbError};
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    /// Insert a new user. The UNIQUE constraint on `username` is the
    /// authoritative duplicate guard — any existence check a caller does
    /// first is only an early exit, not the source of truth.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRow, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password) VALUES (?1, ?2)",
                (username, password_hash),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DbError::Duplicate
                } else {
                    e.into()
                }
            })?;

            Ok(UserRow {
                id: conn.last_insert_rowid(),
                username: username.to_string(),
                password: password_hash.to_string(),
            })
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| query_user(conn, "username = ?1", &[&username]))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &[&id]))
    }

    pub fn update_password_hash(&self, id: i64, new_hash: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                (new_hash, id),
            )?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    // -- Tests --

    pub fn create_test(
        &self,
        kind: &str,
        title: &str,
        content: &str,
        audiofile: Option<&str>,
    ) -> Result<TestRow, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tests (kind, title, content, audiofile) VALUES (?1, ?2, ?3, ?4)",
                (kind, title, content, audiofile),
            )?;

            Ok(TestRow {
                id: conn.last_insert_rowid(),
                kind: kind.to_string(),
                title: title.to_string(),
                content: content.to_string(),
                audiofile: audiofile.map(str::to_string),
            })
        })
    }

    pub fn list_tests(&self) -> Result<Vec<TestSummaryRow>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, kind, title FROM tests ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(TestSummaryRow {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        title: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_test(&self, id: i64) -> Result<Option<TestRow>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, kind, title, content, audiofile FROM tests WHERE id = ?1")?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(TestRow {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        title: row.get(2)?,
                        content: row.get(3)?,
                        audiofile: row.get(4)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    /// Full replace — no merge with the prior content.
    pub fn update_test(
        &self,
        id: i64,
        kind: &str,
        title: &str,
        content: &str,
        audiofile: Option<&str>,
    ) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tests SET kind = ?1, title = ?2, content = ?3, audiofile = ?4 WHERE id = ?5",
                (kind, title, content, audiofile, id),
            )?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    pub fn delete_test(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM tests WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }
}

fn query_user(
    conn: &Connection,
    filter: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Option<UserRow>, DbError> {
    let sql = format!("SELECT id, username, password FROM users WHERE {filter}");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row(params, |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
