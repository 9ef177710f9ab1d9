/// Database row types — these map directly to SQLite rows.
/// Distinct from quizbank-types API models to keep the DB layer
/// independent.

#[derive(Debug)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string, never the plaintext.
    pub password: String,
}

pub struct TestRow {
    pub id: i64,
    pub kind: String,
    pub title: String,
    /// Canonical content mapping, serialized as JSON text.
    pub content: String,
    /// Server-relative path of the attached audio asset, if any.
    pub audiofile: Option<String>,
}

/// List projection — content deliberately left out.
pub struct TestSummaryRow {
    pub id: i64,
    pub kind: String,
    pub title: String,
}
