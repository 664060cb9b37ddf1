use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Store {
    pub fn create_article(&self, article: &Article) -> Result<(), StoreError> {
        let key = keys::article_key(&article.id)?;
        self.articles
            .insert(key.as_bytes(), Self::serialize(article)?)?;
        Ok(())
    }

    pub fn get_article(&self, article_id: &str) -> Result<Option<Article>, StoreError> {
        let key = keys::article_key(article_id)?;
        match self.articles.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Soft delete: the record stays (read history and rollups still point at
    /// it) and only `deleted_at` is set.
    pub fn soft_delete_article(
        &self,
        article_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Article, StoreError> {
        let mut article = self
            .get_article(article_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "article".to_string(),
                key: article_id.to_string(),
            })?;
        if article.deleted_at.is_none() {
            article.deleted_at = Some(at);
            article.updated_at = at;
            self.create_article(&article)?;
        }
        Ok(article)
    }

    /// Live articles of one author, newest first.
    pub fn list_articles_by_author(&self, author_id: &str) -> Result<Vec<Article>, StoreError> {
        let mut articles = Vec::new();
        for item in self.articles.iter() {
            let (_, value) = item?;
            let article: Article = Self::deserialize(&value)?;
            if article.author_id == author_id && !article.is_deleted() {
                articles.push(article);
            }
        }
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::test_support::temp_store;

    use super::*;

    fn sample(id: &str) -> Article {
        sample_at(id, "author-1", Utc::now())
    }

    fn sample_at(id: &str, author_id: &str, now: DateTime<Utc>) -> Article {
        Article {
            id: id.to_string(),
            author_id: author_id.to_string(),
            title: "Title".to_string(),
            content: "Body".to_string(),
            category: Some("tech".to_string()),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn create_then_get() {
        let (_tmp, store) = temp_store("articles.sled");
        store.create_article(&sample("a1")).unwrap();
        let got = store.get_article("a1").unwrap().expect("article");
        assert_eq!(got.title, "Title");
        assert!(store.get_article("missing").unwrap().is_none());
    }

    #[test]
    fn soft_delete_keeps_the_record() {
        let (_tmp, store) = temp_store("articles_delete.sled");
        store.create_article(&sample("a1")).unwrap();
        let deleted = store.soft_delete_article("a1", Utc::now()).unwrap();
        assert!(deleted.is_deleted());
        assert!(store.get_article("a1").unwrap().unwrap().is_deleted());
        assert!(matches!(
            store.soft_delete_article("nope", Utc::now()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn author_listing_skips_deleted_and_other_authors() {
        use chrono::Duration;

        let (_tmp, store) = temp_store("articles_by_author.sled");
        let t0 = Utc::now();
        store.create_article(&sample_at("old", "author-1", t0)).unwrap();
        store
            .create_article(&sample_at("new", "author-1", t0 + Duration::seconds(5)))
            .unwrap();
        store
            .create_article(&sample_at("gone", "author-1", t0 + Duration::seconds(9)))
            .unwrap();
        store.create_article(&sample_at("theirs", "author-2", t0)).unwrap();
        store.soft_delete_article("gone", Utc::now()).unwrap();

        let ids: Vec<_> = store
            .list_articles_by_author("author-1")
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["new".to_string(), "old".to_string()]);
    }
}
