// SQLite QueueStore Implementation

use async_trait::async_trait;
use ohq_core::error::{AppError, Result};
use ohq_core::port::{normalize_range, FieldGuard, QueueStore, Record, Score, WriteBatch, WriteOp};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Store(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Store(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Store(format!("Database full: {}", db_err.message())),
                    _ => AppError::Store(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Store(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Store("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Store(format!("Column not found: {}", col)),
        // Connection, pool, protocol errors
        _ => AppError::Store(err.to_string()),
    }
}

/// QueueStore over two tables: `kv_fields` (hash objects) and `sorted_sets`
///
/// Multi-statement writes run in one SQL transaction while holding
/// `write_lock`, which serializes writers inside this process so a read-then-write
/// transaction never has to upgrade its lock against another local writer.
pub struct SqliteQueueStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteQueueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }
}

async fn read_field(conn: &mut SqliteConnection, key: &str, field: &str) -> Result<Option<String>> {
    sqlx::query_scalar("SELECT value FROM kv_fields WHERE key = ? AND field = ?")
        .bind(key)
        .bind(field)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)
}

async fn write_field(conn: &mut SqliteConnection, key: &str, field: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO kv_fields (key, field, value) VALUES (?, ?, ?)
        ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(field)
    .bind(value)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn guard_holds(conn: &mut SqliteConnection, guard: &FieldGuard) -> Result<bool> {
    let actual = read_field(conn, &guard.key, &guard.field).await?;
    if actual != guard.expected {
        debug!(
            key = %guard.key,
            field = %guard.field,
            expected = ?guard.expected,
            actual = ?actual,
            "Batch guard failed"
        );
        return Ok(false);
    }
    Ok(true)
}

async fn write_op(conn: &mut SqliteConnection, op: &WriteOp) -> Result<()> {
    match op {
        WriteOp::SetObject { key, record } => {
            sqlx::query("DELETE FROM kv_fields WHERE key = ?")
                .bind(key)
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
            for (field, value) in record {
                write_field(conn, key, field, value).await?;
            }
        }
        WriteOp::DeleteObject { key } => {
            sqlx::query("DELETE FROM kv_fields WHERE key = ?")
                .bind(key)
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
        }
        WriteOp::SetField { key, field, value } => write_field(conn, key, field, value).await?,
        WriteOp::DeleteField { key, field } => {
            sqlx::query("DELETE FROM kv_fields WHERE key = ? AND field = ?")
                .bind(key)
                .bind(field)
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
        }
        WriteOp::SortedSetAdd { key, score, member } => {
            // A fresh seq larger than every live one keeps ties in insertion order
            sqlx::query(
                r#"
                INSERT INTO sorted_sets (key, member, score, seq)
                VALUES (?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM sorted_sets))
                ON CONFLICT(key, member) DO UPDATE SET score = excluded.score, seq = excluded.seq
                "#,
            )
            .bind(key)
            .bind(member)
            .bind(score)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        }
        WriteOp::SortedSetRemove { key, member } => {
            sqlx::query("DELETE FROM sorted_sets WHERE key = ? AND member = ?")
                .bind(key)
                .bind(member)
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
        }
    }
    Ok(())
}

impl SqliteQueueStore {
    /// Run ops in one transaction; `guards` are checked first inside it
    async fn write_all(&self, guards: &[FieldGuard], ops: &[WriteOp]) -> Result<bool> {
        let _lock = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for guard in guards {
            if !guard_holds(&mut tx, guard).await? {
                tx.rollback().await.map_err(map_sqlx_error)?;
                return Ok(false);
            }
        }
        for op in ops {
            write_op(&mut tx, op).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        read_field(&mut conn, key, field).await
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let op = WriteOp::SetField {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        };
        self.write_all(&[], &[op]).await.map(|_| ())
    }

    async fn incr_field(&self, key: &str, field: &str) -> Result<i64> {
        let _lock = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let current: i64 = match read_field(&mut tx, key, field).await? {
            Some(raw) => raw.parse().map_err(|_| {
                AppError::Store(format!("{}.{} is not an integer: '{}'", key, field, raw))
            })?,
            None => 0,
        };
        let next = current + 1;
        write_field(&mut tx, key, field, &next.to_string()).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(next)
    }

    async fn get_object(&self, key: &str) -> Result<Option<Record>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT field, value FROM kv_fields WHERE key = ?")
                .bind(key)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.into_iter().collect()))
    }

    async fn set_object(&self, key: &str, record: &Record) -> Result<()> {
        let op = WriteOp::SetObject {
            key: key.to_string(),
            record: record.clone(),
        };
        self.write_all(&[], &[op]).await.map(|_| ())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let op = WriteOp::DeleteObject {
            key: key.to_string(),
        };
        self.write_all(&[], &[op]).await.map(|_| ())
    }

    async fn sorted_set_add(&self, key: &str, score: Score, member: &str) -> Result<()> {
        let op = WriteOp::SortedSetAdd {
            key: key.to_string(),
            score,
            member: member.to_string(),
        };
        self.write_all(&[], &[op]).await.map(|_| ())
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<()> {
        let op = WriteOp::SortedSetRemove {
            key: key.to_string(),
            member: member.to_string(),
        };
        self.write_all(&[], &[op]).await.map(|_| ())
    }

    async fn sorted_set_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let len = self.sorted_set_card(key).await? as usize;
        let range = normalize_range(len, start, stop);
        if range.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_scalar(
            "SELECT member FROM sorted_sets WHERE key = ? ORDER BY score, seq LIMIT ? OFFSET ?",
        )
        .bind(key)
        .bind(range.len() as i64)
        .bind(range.start as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn sorted_set_card(&self, key: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sorted_sets WHERE key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count as u64)
    }

    async fn sorted_set_rank(&self, key: &str, member: &str) -> Result<Option<u64>> {
        let position: Option<(i64, i64)> =
            sqlx::query_as("SELECT score, seq FROM sorted_sets WHERE key = ? AND member = ?")
                .bind(key)
                .bind(member)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let Some((score, seq)) = position else {
            return Ok(None);
        };

        let ahead: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM sorted_sets
            WHERE key = ? AND (score < ? OR (score = ? AND seq < ?))
            "#,
        )
        .bind(key)
        .bind(score)
        .bind(score)
        .bind(seq)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(Some(ahead as u64))
    }

    async fn apply(&self, batch: WriteBatch) -> Result<bool> {
        self.write_all(batch.guards(), batch.ops()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn store() -> SqliteQueueStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteQueueStore::new(pool)
    }

    #[tokio::test]
    async fn test_fields_and_counter() {
        let store = store().await;
        assert_eq!(store.get_field("course:1", "queueOpen").await.unwrap(), None);

        store.set_field("course:1", "queueOpen", "1").await.unwrap();
        store.set_field("course:1", "queueOpen", "0").await.unwrap();
        assert_eq!(
            store.get_field("course:1", "queueOpen").await.unwrap().as_deref(),
            Some("0")
        );

        assert_eq!(store.incr_field("global", "next").await.unwrap(), 1);
        assert_eq!(store.incr_field("global", "next").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_absent_field_guard() {
        let store = store().await;
        let claim = |value: &str| {
            let mut batch = WriteBatch::new();
            batch
                .expect_field("claims", "5", None)
                .set_field("claims", "5", value);
            batch
        };

        assert!(store.apply(claim("10")).await.unwrap());
        assert!(!store.apply(claim("11")).await.unwrap());
        assert_eq!(store.get_field("claims", "5").await.unwrap().as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_sorted_set_order_and_rank() {
        let store = store().await;
        store.sorted_set_add("idx", 100, "9").await.unwrap();
        store.sorted_set_add("idx", 100, "10").await.unwrap();
        store.sorted_set_add("idx", 50, "11").await.unwrap();

        assert_eq!(store.sorted_set_range("idx", 0, -1).await.unwrap(), vec!["11", "9", "10"]);
        assert_eq!(store.sorted_set_range("idx", 0, 0).await.unwrap(), vec!["11"]);
        assert_eq!(store.sorted_set_range("idx", -1, -1).await.unwrap(), vec!["10"]);
        assert_eq!(store.sorted_set_rank("idx", "10").await.unwrap(), Some(2));
        assert_eq!(store.sorted_set_rank("idx", "12").await.unwrap(), None);

        // Re-adding with the same score moves the member behind its ties
        store.sorted_set_add("idx", 100, "9").await.unwrap();
        assert_eq!(store.sorted_set_range("idx", 0, -1).await.unwrap(), vec!["11", "10", "9"]);

        store.sorted_set_remove("idx", "11").await.unwrap();
        assert_eq!(store.sorted_set_card("idx").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = store().await;
        store.set_field("queue:entry:1", "status", "assigned").await.unwrap();

        let mut batch = WriteBatch::new();
        batch
            .expect_field("queue:entry:1", "status", Some("waiting"))
            .sorted_set_add("idx", 1, "1");
        assert!(!store.apply(batch).await.unwrap());
        assert_eq!(store.sorted_set_card("idx").await.unwrap(), 0);

        let mut batch = WriteBatch::new();
        batch
            .expect_field("queue:entry:1", "status", Some("assigned"))
            .set_field("queue:entry:1", "status", "in_progress")
            .sorted_set_add("idx", 1, "1");
        assert!(store.apply(batch).await.unwrap());
        assert_eq!(store.sorted_set_card("idx").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_objects() {
        let store = store().await;
        let mut record = Record::new();
        record.insert("id".to_string(), "1".to_string());
        record.insert("status".to_string(), "waiting".to_string());
        store.set_object("queue:entry:1", &record).await.unwrap();

        let mut replacement = Record::new();
        replacement.insert("id".to_string(), "1".to_string());
        store.set_object("queue:entry:1", &replacement).await.unwrap();
        assert_eq!(store.get_object("queue:entry:1").await.unwrap(), Some(replacement));

        store.delete_object("queue:entry:1").await.unwrap();
        assert_eq!(store.get_object("queue:entry:1").await.unwrap(), None);
    }
}
