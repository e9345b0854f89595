use anyhow::Result;
use thiserror::Error;

use super::schema::Database;
use crate::douban::Category;
use crate::util::scrub_text;

/// The one tag that is always present and can never be deleted.
pub const RESERVED_TAG: &str = "热门";

/// Built-in movie tags, in display order.
pub const DEFAULT_MOVIE_TAGS: [&str; 16] = [
    "热门",
    "最新",
    "经典",
    "豆瓣高分",
    "冷门佳片",
    "华语",
    "欧美",
    "韩国",
    "日本",
    "动作",
    "喜剧",
    "爱情",
    "科幻",
    "悬疑",
    "恐怖",
    "治愈",
];

/// Built-in TV tags, in display order.
pub const DEFAULT_TV_TAGS: [&str; 10] = [
    "热门",
    "美剧",
    "英剧",
    "韩剧",
    "日剧",
    "国产剧",
    "港剧",
    "日本动画",
    "综艺",
    "纪录片",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("Tag cannot be empty")]
    Empty,
    #[error("Tag already exists")]
    Duplicate,
    #[error("The \"热门\" tag cannot be deleted")]
    Reserved,
    #[error("Failed to save tags: {0}")]
    Storage(String),
}

/// User-editable tag lists for each category.
///
/// The in-memory lists are authoritative once loaded; every mutation writes
/// the whole list back to the settings table immediately (last write wins,
/// no batching).
pub struct TagStore {
    db: Database,
    movie: Vec<String>,
    tv: Vec<String>,
}

impl TagStore {
    /// Load both tag lists from the settings table.
    ///
    /// Missing or corrupt stored values fall back to the built-in defaults;
    /// a list that lost its reserved tag gets it reinserted at the front.
    pub async fn load(db: Database) -> Result<Self> {
        let movie = Self::load_list(&db, Category::Movie).await?;
        let tv = Self::load_list(&db, Category::Tv).await?;
        Ok(Self { db, movie, tv })
    }

    async fn load_list(db: &Database, category: Category) -> Result<Vec<String>> {
        let Some(json) = db.get_setting(Self::storage_key(category)).await? else {
            return Ok(Self::default_tags(category));
        };
        let mut tags: Vec<String> = match serde_json::from_str(&json) {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(
                    category = %category,
                    error = %e,
                    "Stored tag list is not valid JSON, using defaults"
                );
                return Ok(Self::default_tags(category));
            }
        };
        if !tags.iter().any(|t| t == RESERVED_TAG) {
            tags.insert(0, RESERVED_TAG.to_string());
        }
        Ok(tags)
    }

    /// Current tags for a category, in insertion order.
    pub fn tags(&self, category: Category) -> &[String] {
        self.list(category)
    }

    /// Add a tag after sanitizing it, returning the cleaned name.
    ///
    /// The name has control characters stripped and whitespace trimmed before
    /// validation. Duplicate checks compare Unicode-lowercased forms.
    pub async fn add_tag(&mut self, category: Category, name: &str) -> Result<String, TagError> {
        let scrubbed = scrub_text(name);
        let clean = scrubbed.trim();
        if clean.is_empty() {
            return Err(TagError::Empty);
        }
        let lowered = clean.to_lowercase();
        if self
            .list(category)
            .iter()
            .any(|t| t.to_lowercase() == lowered)
        {
            return Err(TagError::Duplicate);
        }
        self.list_mut(category).push(clean.to_string());
        self.persist(category).await?;
        Ok(clean.to_string())
    }

    /// Delete a tag. Returns `Ok(false)` if the tag wasn't in the list.
    pub async fn delete_tag(&mut self, category: Category, name: &str) -> Result<bool, TagError> {
        if name == RESERVED_TAG {
            return Err(TagError::Reserved);
        }
        let list = self.list_mut(category);
        let Some(pos) = list.iter().position(|t| t == name) else {
            return Ok(false);
        };
        list.remove(pos);
        self.persist(category).await?;
        Ok(true)
    }

    /// Replace a category's list with the built-in defaults.
    pub async fn reset_to_default(&mut self, category: Category) -> Result<(), TagError> {
        *self.list_mut(category) = Self::default_tags(category);
        self.persist(category).await
    }

    async fn persist(&self, category: Category) -> Result<(), TagError> {
        let json = serde_json::to_string(self.list(category))
            .map_err(|e| TagError::Storage(e.to_string()))?;
        self.db
            .set_setting(Self::storage_key(category), &json)
            .await
            .map_err(|e| TagError::Storage(e.to_string()))
    }

    fn storage_key(category: Category) -> &'static str {
        match category {
            Category::Movie => "douban.tags.movie",
            Category::Tv => "douban.tags.tv",
        }
    }

    fn default_tags(category: Category) -> Vec<String> {
        let defaults: &[&str] = match category {
            Category::Movie => &DEFAULT_MOVIE_TAGS,
            Category::Tv => &DEFAULT_TV_TAGS,
        };
        defaults.iter().map(|s| (*s).to_string()).collect()
    }

    fn list(&self, category: Category) -> &Vec<String> {
        match category {
            Category::Movie => &self.movie,
            Category::Tv => &self.tv,
        }
    }

    fn list_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Movie => &mut self.movie,
            Category::Tv => &mut self.tv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> TagStore {
        let db = Database::open(":memory:").await.unwrap();
        TagStore::load(db).await.unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_nothing_stored() {
        let store = test_store().await;
        assert_eq!(store.tags(Category::Movie).len(), 16);
        assert_eq!(store.tags(Category::Tv).len(), 10);
        assert_eq!(store.tags(Category::Movie)[0], RESERVED_TAG);
        assert_eq!(store.tags(Category::Tv)[0], RESERVED_TAG);
    }

    #[tokio::test]
    async fn test_add_tag_appends_and_persists() {
        let db = Database::open(":memory:").await.unwrap();
        let mut store = TagStore::load(db.clone()).await.unwrap();

        let added = store.add_tag(Category::Movie, "动画").await.unwrap();
        assert_eq!(added, "动画");
        assert_eq!(store.tags(Category::Movie).last().unwrap(), "动画");

        // A fresh store over the same pool sees the persisted list
        let reloaded = TagStore::load(db).await.unwrap();
        assert_eq!(reloaded.tags(Category::Movie).last().unwrap(), "动画");
        assert_eq!(reloaded.tags(Category::Movie).len(), 17);
    }

    #[tokio::test]
    async fn test_add_tag_empty_rejected() {
        let mut store = test_store().await;
        assert_eq!(
            store.add_tag(Category::Movie, "").await,
            Err(TagError::Empty)
        );
        assert_eq!(
            store.add_tag(Category::Movie, "   ").await,
            Err(TagError::Empty)
        );
        // Control characters alone scrub down to nothing
        assert_eq!(
            store.add_tag(Category::Movie, "\x1b[31m\x07").await,
            Err(TagError::Empty)
        );
        assert_eq!(store.tags(Category::Movie).len(), 16);
    }

    #[tokio::test]
    async fn test_add_tag_strips_escape_sequences() {
        let mut store = test_store().await;
        let added = store
            .add_tag(Category::Movie, "  Act\x1b[31mion \n")
            .await
            .unwrap();
        assert_eq!(added, "Action");
    }

    #[tokio::test]
    async fn test_add_tag_duplicate_case_insensitive() {
        let mut store = test_store().await;
        let before = store.tags(Category::Movie).len();

        store.add_tag(Category::Movie, "Action").await.unwrap();
        assert_eq!(
            store.add_tag(Category::Movie, "action").await,
            Err(TagError::Duplicate)
        );
        assert_eq!(
            store.add_tag(Category::Movie, "ACTION").await,
            Err(TagError::Duplicate)
        );

        // Exactly one tag was added
        assert_eq!(store.tags(Category::Movie).len(), before + 1);
    }

    #[tokio::test]
    async fn test_add_tag_duplicate_of_default() {
        let mut store = test_store().await;
        assert_eq!(
            store.add_tag(Category::Tv, "美剧").await,
            Err(TagError::Duplicate)
        );
    }

    #[tokio::test]
    async fn test_delete_reserved_rejected() {
        let db = Database::open(":memory:").await.unwrap();
        let mut store = TagStore::load(db.clone()).await.unwrap();

        assert_eq!(
            store.delete_tag(Category::Movie, RESERVED_TAG).await,
            Err(TagError::Reserved)
        );
        assert_eq!(store.tags(Category::Movie)[0], RESERVED_TAG);

        // Still rejected after a persistence round-trip
        store.add_tag(Category::Movie, "动画").await.unwrap();
        let mut reloaded = TagStore::load(db).await.unwrap();
        assert_eq!(
            reloaded.delete_tag(Category::Movie, RESERVED_TAG).await,
            Err(TagError::Reserved)
        );
        assert!(reloaded
            .tags(Category::Movie)
            .iter()
            .any(|t| t == RESERVED_TAG));
    }

    #[tokio::test]
    async fn test_delete_tag_absent_is_noop() {
        let mut store = test_store().await;
        assert_eq!(store.delete_tag(Category::Movie, "不存在").await, Ok(false));
        assert_eq!(store.tags(Category::Movie).len(), 16);
    }

    #[tokio::test]
    async fn test_delete_tag_removes_and_persists() {
        let db = Database::open(":memory:").await.unwrap();
        let mut store = TagStore::load(db.clone()).await.unwrap();

        assert_eq!(store.delete_tag(Category::Movie, "治愈").await, Ok(true));
        assert!(!store.tags(Category::Movie).iter().any(|t| t == "治愈"));

        let reloaded = TagStore::load(db).await.unwrap();
        assert!(!reloaded.tags(Category::Movie).iter().any(|t| t == "治愈"));
        assert_eq!(reloaded.tags(Category::Movie).len(), 15);
    }

    #[tokio::test]
    async fn test_reset_to_default_restores_list() {
        let mut store = test_store().await;
        store.add_tag(Category::Tv, "动画").await.unwrap();
        store.delete_tag(Category::Tv, "综艺").await.unwrap();

        store.reset_to_default(Category::Tv).await.unwrap();
        assert_eq!(store.tags(Category::Tv).len(), 10);
        assert_eq!(store.tags(Category::Tv)[0], RESERVED_TAG);
        assert!(!store.tags(Category::Tv).iter().any(|t| t == "动画"));
    }

    #[tokio::test]
    async fn test_corrupt_stored_list_falls_back_to_defaults() {
        let db = Database::open(":memory:").await.unwrap();
        db.set_setting("douban.tags.movie", "not json at all")
            .await
            .unwrap();

        let store = TagStore::load(db).await.unwrap();
        assert_eq!(store.tags(Category::Movie).len(), 16);
        assert_eq!(store.tags(Category::Movie)[0], RESERVED_TAG);
    }

    #[tokio::test]
    async fn test_reserved_tag_reinserted_when_missing() {
        let db = Database::open(":memory:").await.unwrap();
        db.set_setting("douban.tags.movie", r#"["动作","喜剧"]"#)
            .await
            .unwrap();

        let store = TagStore::load(db).await.unwrap();
        assert_eq!(
            store.tags(Category::Movie),
            &["热门".to_string(), "动作".to_string(), "喜剧".to_string()]
        );
    }

    #[tokio::test]
    async fn test_categories_are_independent() {
        let mut store = test_store().await;
        store.add_tag(Category::Movie, "动画").await.unwrap();

        assert!(store.tags(Category::Movie).iter().any(|t| t == "动画"));
        assert!(!store.tags(Category::Tv).iter().any(|t| t == "动画"));
    }
}
