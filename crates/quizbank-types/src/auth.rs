use serde::{Deserialize, Serialize};

/// JWT claims shared between token issuance and the auth middleware.
/// Canonical definition lives here in quizbank-types to eliminate
/// duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

/// The authenticated identity resolved from a verified token.
///
/// Inserted as a request extension by the auth middleware and read by
/// handlers via `Extension<Principal>` — handlers never touch the raw
/// token or re-verify anything.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub username: String,
}
