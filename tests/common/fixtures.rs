use chrono::{DateTime, Utc};

use read_analytics::store::operations::articles::Article;
use read_analytics::store::Store;

pub fn seed_article(store: &Store, id: &str, author_id: &str) -> Article {
    seed_article_at(store, id, author_id, Utc::now())
}

pub fn seed_article_at(store: &Store, id: &str, author_id: &str, now: DateTime<Utc>) -> Article {
    let article = Article {
        id: id.to_string(),
        author_id: author_id.to_string(),
        title: format!("Article {id}"),
        content: "Lorem ipsum dolor sit amet, consectetur adipiscing elit.".to_string(),
        category: Some("tech".to_string()),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    store.create_article(&article).expect("create seed article");
    article
}

pub fn seed_reads(store: &Store, article_id: &str, at: &[DateTime<Utc>]) {
    for occurred_at in at {
        store
            .append_read_event(article_id, None, *occurred_at)
            .expect("append seed read");
    }
}
