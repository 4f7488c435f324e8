use bson::{Document, doc};
use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{Notification, NotificationResponse, PanicAlert, User};

/// Creates the indexes behind every alert feed filter and the recipient
/// lookup by role. Safe to run on every start.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let plan = [
        (
            User::COLLECTION,
            vec![
                unique(doc! { "email": 1 }),
                unique(doc! { "username": 1 }),
                plain(doc! { "role": 1 }),
            ],
        ),
        (Notification::COLLECTION, feed_indexes()),
        (PanicAlert::COLLECTION, feed_indexes()),
        (
            NotificationResponse::COLLECTION,
            vec![plain(doc! { "notification_id": 1, "created_at": 1 })],
        ),
    ];

    for (collection, indexes) in plan {
        let created = db
            .collection::<Document>(collection)
            .create_indexes(indexes)
            .await?;
        info!(collection, count = created.index_names.len(), "Indexes ensured");
    }
    Ok(())
}

/// Newest-first feeds are filtered by category, by reporter or by both.
fn feed_indexes() -> Vec<IndexModel> {
    vec![
        plain(doc! { "category": 1, "created_at": -1 }),
        plain(doc! { "user_id": 1, "created_at": -1 }),
        plain(doc! { "category": 1, "user_id": 1, "created_at": -1 }),
    ]
}

fn plain(keys: Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn unique(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}
