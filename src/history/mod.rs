//! Conversation history and usage counters, persisted in SQLite.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: i64,
    pub conversation_id: Option<String>,
    pub question: String,
    pub answer: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub files_processed: i64,
    pub tokens_used: i64,
}

#[derive(Clone)]
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    pub async fn new(db_path: &Path) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to history db: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                conversation_id TEXT,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                context TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init conversations table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_user_id ON conversations(user_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create index: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_stats (
                user_id TEXT PRIMARY KEY,
                files_processed INTEGER NOT NULL DEFAULT 0,
                tokens_used INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init stats table: {}", e)))?;

        Ok(())
    }

    pub async fn append(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        question: &str,
        answer: &str,
        context: &str,
    ) -> Result<i64, ApiError> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO conversations (user_id, conversation_id, question, answer, context, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(question)
        .bind(answer)
        .bind(context)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(result.last_insert_rowid())
    }

    /// The last `limit` exchanges for a user, oldest first.
    pub async fn recent(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ConversationEntry>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, question, answer, created_at FROM \
             (SELECT * FROM conversations WHERE user_id = ? ORDER BY id DESC LIMIT ?) \
             ORDER BY id ASC",
        )
        .bind(user_id)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(ConversationEntry {
                id: row.try_get::<i64, _>("id").unwrap_or_default(),
                conversation_id: row
                    .try_get::<Option<String>, _>("conversation_id")
                    .unwrap_or(None),
                question: row.try_get::<String, _>("question").unwrap_or_default(),
                answer: row.try_get::<String, _>("answer").unwrap_or_default(),
                created_at: row.try_get::<String, _>("created_at").unwrap_or_default(),
            });
        }
        Ok(entries)
    }

    pub async fn delete_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM conversations WHERE user_id = ? AND conversation_id = ?")
            .bind(user_id)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }

    /// Removes everything recorded for the user: exchanges and counters.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query("DELETE FROM conversations WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("DELETE FROM user_stats WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    pub async fn stats(&self, user_id: &str) -> Result<UserStats, ApiError> {
        let row = sqlx::query(
            "SELECT files_processed, tokens_used FROM user_stats WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(match row {
            Some(row) => UserStats {
                files_processed: row.try_get::<i64, _>("files_processed").unwrap_or_default(),
                tokens_used: row.try_get::<i64, _>("tokens_used").unwrap_or_default(),
            },
            None => UserStats::default(),
        })
    }

    pub async fn bump_stats(
        &self,
        user_id: &str,
        files_processed: i64,
        tokens_used: i64,
    ) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO user_stats (user_id, files_processed, tokens_used) VALUES (?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET \
             files_processed = files_processed + excluded.files_processed, \
             tokens_used = tokens_used + excluded.tokens_used",
        )
        .bind(user_id)
        .bind(files_processed)
        .bind(tokens_used)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, ConversationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(&dir.path().join("conversations.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn recent_returns_the_last_exchanges_oldest_first() {
        let (_dir, store) = store().await;

        for i in 0..5 {
            store
                .append("alice", None, &format!("q{}", i), &format!("a{}", i), "")
                .await
                .unwrap();
        }

        let entries = store.recent("alice", 3).await.unwrap();

        let questions: Vec<&str> = entries.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3", "q4"]);
    }

    #[tokio::test]
    async fn history_is_per_user() {
        let (_dir, store) = store().await;

        store.append("alice", None, "qa", "aa", "").await.unwrap();
        store.append("bob", None, "qb", "ab", "").await.unwrap();

        let alice = store.recent("alice", 10).await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].question, "qa");
    }

    #[tokio::test]
    async fn delete_conversation_only_touches_that_conversation() {
        let (_dir, store) = store().await;

        store
            .append("alice", Some("c1"), "q1", "a1", "")
            .await
            .unwrap();
        store
            .append("alice", Some("c2"), "q2", "a2", "")
            .await
            .unwrap();
        store.append("alice", None, "q3", "a3", "").await.unwrap();

        store.delete_conversation("alice", "c1").await.unwrap();

        let entries = store.recent("alice", 10).await.unwrap();
        let questions: Vec<&str> = entries.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3"]);
    }

    #[tokio::test]
    async fn delete_user_wipes_history_and_stats() {
        let (_dir, store) = store().await;

        store.append("alice", None, "q", "a", "ctx").await.unwrap();
        store.bump_stats("alice", 2, 100).await.unwrap();

        store.delete_user("alice").await.unwrap();

        assert!(store.recent("alice", 10).await.unwrap().is_empty());
        let stats = store.stats("alice").await.unwrap();
        assert_eq!(stats.files_processed, 0);
        assert_eq!(stats.tokens_used, 0);
    }

    #[tokio::test]
    async fn stats_accumulate_across_bumps() {
        let (_dir, store) = store().await;

        assert_eq!(store.stats("alice").await.unwrap().files_processed, 0);

        store.bump_stats("alice", 2, 300).await.unwrap();
        store.bump_stats("alice", 1, 50).await.unwrap();

        let stats = store.stats("alice").await.unwrap();
        assert_eq!(stats.files_processed, 3);
        assert_eq!(stats.tokens_used, 350);
    }
}
