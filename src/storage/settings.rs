use anyhow::Result;

use super::schema::Database;
use crate::douban::Category;

/// Whether the recommendation feed is shown at all. Defaults to on.
const KEY_FEED_ENABLED: &str = "douban.enabled";
/// Category the user last browsed, restored on startup.
const KEY_LAST_CATEGORY: &str = "douban.last_category";

impl Database {
    // ========================================================================
    // Settings Operations
    // ========================================================================

    /// Get a single setting value by key.
    ///
    /// Keys use dotted convention: `douban.enabled`, `douban.tags.movie`, etc.
    ///
    /// # Returns
    ///
    /// The setting value if the key exists, or `None` if not set.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a setting value (UPSERT).
    ///
    /// Inserts the key-value pair if it doesn't exist, or updates the value
    /// and timestamp if the key already exists.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // Typed accessors
    // ========================================================================

    /// Whether the feed pane is enabled. Unset or unrecognized values count
    /// as enabled.
    pub async fn feed_enabled(&self) -> Result<bool> {
        let value = self.get_setting(KEY_FEED_ENABLED).await?;
        Ok(value.as_deref() != Some("false"))
    }

    pub async fn set_feed_enabled(&self, enabled: bool) -> Result<()> {
        self.set_setting(KEY_FEED_ENABLED, if enabled { "true" } else { "false" })
            .await
    }

    /// The category the user was browsing when they last quit, if any was
    /// recorded and it still parses.
    pub async fn last_category(&self) -> Result<Option<Category>> {
        let value = self.get_setting(KEY_LAST_CATEGORY).await?;
        Ok(value.as_deref().and_then(Category::from_setting))
    }

    pub async fn set_last_category(&self, category: Category) -> Result<()> {
        self.set_setting(KEY_LAST_CATEGORY, category.as_setting())
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::douban::Category;
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_setting_missing() {
        let db = test_db().await;
        let value = db.get_setting("nonexistent.key").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_and_get_setting() {
        let db = test_db().await;
        db.set_setting("douban.enabled", "true").await.unwrap();

        let value = db.get_setting("douban.enabled").await.unwrap();
        assert_eq!(value, Some("true".to_string()));
    }

    #[tokio::test]
    async fn test_set_setting_upsert() {
        let db = test_db().await;
        db.set_setting("douban.enabled", "true").await.unwrap();
        db.set_setting("douban.enabled", "false").await.unwrap();

        let value = db.get_setting("douban.enabled").await.unwrap();
        assert_eq!(value, Some("false".to_string()));
    }

    #[tokio::test]
    async fn test_feed_enabled_defaults_on() {
        let db = test_db().await;
        assert!(db.feed_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_feed_enabled_roundtrip() {
        let db = test_db().await;
        db.set_feed_enabled(false).await.unwrap();
        assert!(!db.feed_enabled().await.unwrap());

        db.set_feed_enabled(true).await.unwrap();
        assert!(db.feed_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_feed_enabled_garbage_value_counts_as_on() {
        let db = test_db().await;
        db.set_setting("douban.enabled", "maybe").await.unwrap();
        assert!(db.feed_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_last_category_missing() {
        let db = test_db().await;
        assert_eq!(db.last_category().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_category_roundtrip() {
        let db = test_db().await;
        db.set_last_category(Category::Tv).await.unwrap();
        assert_eq!(db.last_category().await.unwrap(), Some(Category::Tv));

        db.set_last_category(Category::Movie).await.unwrap();
        assert_eq!(db.last_category().await.unwrap(), Some(Category::Movie));
    }

    #[tokio::test]
    async fn test_last_category_garbage_value_ignored() {
        let db = test_db().await;
        db.set_setting("douban.last_category", "radio")
            .await
            .unwrap();
        assert_eq!(db.last_category().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_setting_updates_timestamp() {
        let db = test_db().await;
        db.set_setting("test.key", "value1").await.unwrap();

        let row1: (String,) = sqlx::query_as("SELECT updated_at FROM settings WHERE key = ?")
            .bind("test.key")
            .fetch_one(&db.pool)
            .await
            .unwrap();

        db.set_setting("test.key", "value2").await.unwrap();

        let row2: (String,) = sqlx::query_as("SELECT updated_at FROM settings WHERE key = ?")
            .bind("test.key")
            .fetch_one(&db.pool)
            .await
            .unwrap();

        // Both should be valid datetime strings (may or may not differ depending on timing)
        assert!(!row1.0.is_empty());
        assert!(!row2.0.is_empty());
    }
}
