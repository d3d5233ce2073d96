//! Asynchronous persistence of loggable error entries.

use ecliptic_fault::{ErrorEntry, Result};
use tracing::warn;

use crate::models::LogRow;
use crate::{now_rfc3339, Catalog};

impl Catalog {
    /// Persist a loggable entry without blocking the request path.
    ///
    /// Entries with `should_log == false` are ignored. A failed write is
    /// reported to tracing and otherwise dropped; logging must never take a
    /// request down with it.
    pub fn log_error(&self, organization_id: Option<&str>, entry: &ErrorEntry) {
        if !entry.should_log {
            return;
        }
        let pool = self.pool.clone();
        let organization_id = organization_id.map(str::to_string);
        let code = entry.code.clone();
        let internal = entry.internal.clone();
        let params_json = entry
            .log_params
            .as_ref()
            .and_then(|p| serde_json::to_string(p).ok());

        tokio::spawn(async move {
            let written = sqlx::query(
                "INSERT INTO log (organization_id, code, internal, params_json, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&organization_id)
            .bind(&code)
            .bind(&internal)
            .bind(&params_json)
            .bind(now_rfc3339())
            .execute(&pool)
            .await;
            if let Err(err) = written {
                warn!(code = %code, error = %err, "failed to persist log entry");
            }
        });
    }

    pub async fn recent_logs(&self, limit: i64) -> Result<Vec<LogRow>> {
        Ok(
            sqlx::query_as::<_, LogRow>("SELECT * FROM log ORDER BY id DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use ecliptic_fault::ErrorEntry;

    use crate::Catalog;

    #[tokio::test]
    async fn loggable_entries_are_persisted() {
        let catalog = Catalog::open_in_memory().await.unwrap();

        let entry = ErrorEntry::engine("ddl exploded")
            .with_params(serde_json::json!({"table": "users"}));
        catalog.log_error(Some("org1"), &entry);

        // The write is spawned; poll briefly for it.
        let mut rows = Vec::new();
        for _ in 0..50 {
            rows = catalog.recent_logs(10).await.unwrap();
            if !rows.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, "engine.failure");
        assert_eq!(rows[0].organization_id.as_deref(), Some("org1"));

        // Non-loggable entries are ignored.
        catalog.log_error(None, &ErrorEntry::bad_request("x", "y"));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(catalog.recent_logs(10).await.unwrap().len(), 1);
    }
}
