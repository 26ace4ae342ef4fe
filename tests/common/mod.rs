//! Shared helpers for integration tests.

use sqlward::{SqlSession, SqliteSession};

/// Fresh in-memory SQLite session.
pub fn test_session() -> SqliteSession {
    SqliteSession::in_memory().expect("in-memory database should open")
}

/// Create and seed a small `users` table: three rows, one with a NULL email.
pub async fn seed_users(session: &dyn SqlSession) {
    session
        .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, plan TEXT NOT NULL)")
        .await
        .expect("Should create users table");
    session
        .execute(
            "INSERT INTO users (email, plan) VALUES ('ada@example.com', 'pro'); \
             INSERT INTO users (email, plan) VALUES ('grace@example.com', 'free'); \
             INSERT INTO users (email, plan) VALUES (NULL, 'free')",
        )
        .await
        .expect("Should seed users table");
}
