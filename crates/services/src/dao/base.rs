use bson::{Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Collection, Database,
    error::{ErrorKind, WriteFailure},
    options::ReturnDocument,
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),
    #[error("Entity not found")]
    NotFound,
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Unexpected inserted id: {0}")]
    UnexpectedId(String),
    #[error("Write task failed: {0}")]
    WriteTask(String),
}

pub type DaoResult<T> = Result<T, DaoError>;

impl DaoError {
    /// Splits unique-index violations out of a driver error.
    fn from_write(err: mongodb::error::Error) -> Self {
        match *err.kind {
            ErrorKind::Write(WriteFailure::WriteError(ref write))
                if write.code == DUPLICATE_KEY =>
            {
                DaoError::DuplicateKey(write.message.clone())
            }
            _ => DaoError::Mongo(err),
        }
    }
}

/// Typed handle on one collection of alert documents.
pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T> BaseDao<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    pub fn new(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<T>(collection_name),
        }
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<T> {
        self.find_one(doc! { "_id": id })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_one(&self, filter: Document) -> DaoResult<Option<T>> {
        Ok(self.collection.find_one(filter).await?)
    }

    /// Documents matching `filter` in `sort` order, at most `limit` of them.
    pub async fn find_sorted(
        &self,
        filter: Document,
        sort: Document,
        limit: Option<usize>,
    ) -> DaoResult<Vec<T>> {
        // The driver treats a zero limit as unlimited.
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let mut find = self.collection.find(filter).sort(sort);
        if let Some(limit) = limit {
            find = find.limit(limit as i64);
        }
        Ok(find.await?.try_collect().await?)
    }

    pub async fn insert(&self, doc: &T) -> DaoResult<ObjectId> {
        let inserted = self
            .collection
            .insert_one(doc)
            .await
            .map_err(DaoError::from_write)?
            .inserted_id;
        let id = inserted
            .as_object_id()
            .ok_or_else(|| DaoError::UnexpectedId(inserted.to_string()))?;
        debug!(collection = self.collection.name(), %id, "Inserted document");
        Ok(id)
    }

    /// `$set`s `fields` on the document matching `filter`; `false` when
    /// nothing matched.
    pub async fn set_where(&self, filter: Document, fields: Document) -> DaoResult<bool> {
        let result = self
            .collection
            .update_one(filter, doc! { "$set": fields })
            .await?;
        Ok(result.matched_count > 0)
    }

    /// Guarded `$set` that hands back the document as stored after the
    /// write, in the same round trip. `None` when nothing matched `filter`.
    pub async fn update_returning(
        &self,
        filter: Document,
        fields: Document,
    ) -> DaoResult<Option<T>> {
        Ok(self
            .collection
            .find_one_and_update(filter, doc! { "$set": fields })
            .return_document(ReturnDocument::After)
            .await?)
    }
}
