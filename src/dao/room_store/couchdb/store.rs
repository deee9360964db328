use std::{sync::Arc, time::Duration};

use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dao::{
    models::{PlayerEntity, RoomEntity},
    room_store::{ChangeKind, ChangeTable, RoomStore, StoreChange},
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, CouchPlayerDocument, CouchRoomDocument, END_SUFFIX,
        WriteResponse, player_doc_id, player_prefix, room_doc_id, room_of_doc_id,
    },
};

const CHANGES: &str = "_changes";

/// [`RoomStore`] over a CouchDB database; document revisions back the conflict checks.
#[derive(Clone)]
pub struct CouchRoomStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    longpoll_timeout: Duration,
    changes_retry_delay: Duration,
}

impl CouchRoomStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            longpoll_timeout: config.longpoll_timeout,
            changes_retry_delay: config.changes_retry_delay,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    debug!(database = %database, "created CouchDB database");
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document; a 409 means the revision moved or the id is already taken.
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<String>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Err(CouchDaoError::DocumentConflict {
                path: doc_id.to_string(),
            }),
            status if status.is_success() => response
                .json::<WriteResponse>()
                .await
                .map(|written| written.rev)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: doc_id.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<()> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::DocumentConflict {
                path: doc_id.to_string(),
            }),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: row.id.clone(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn update_room_checked(
        &self,
        mut room: RoomEntity,
        expected_version: u64,
    ) -> CouchResult<RoomEntity> {
        let doc_id = room_doc_id(&room.id);
        let existing = self
            .get_document::<CouchRoomDocument>(&doc_id)
            .await?
            .ok_or_else(|| CouchDaoError::MissingDocument {
                path: doc_id.clone(),
            })?;
        if existing.room.version != expected_version {
            return Err(CouchDaoError::StaleVersion {
                room_id: room.id,
                expected: expected_version,
                actual: existing.room.version,
            });
        }

        // The revision read above makes the PUT fail if another writer got in between.
        room.version = expected_version + 1;
        let doc = CouchRoomDocument::from_entity(room, existing.rev);
        self.put_document(&doc_id, &doc).await?;
        Ok(doc.room)
    }

    async fn delete_player_doc(&self, room_id: &str, player_id: Uuid) -> CouchResult<bool> {
        let doc_id = player_doc_id(room_id, player_id);
        match self.get_document::<CouchPlayerDocument>(&doc_id).await? {
            Some(CouchPlayerDocument { rev: Some(rev), .. }) => {
                self.delete_document(&doc_id, &rev).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_room_docs(&self, room_id: &str) -> CouchResult<()> {
        let players = self
            .list_documents::<CouchPlayerDocument>(&player_prefix(room_id))
            .await?;
        for doc in players {
            if let Some(rev) = doc.rev {
                self.delete_document(&doc.id, &rev).await?;
            }
        }

        let doc_id = room_doc_id(room_id);
        if let Some(CouchRoomDocument { rev: Some(rev), .. }) =
            self.get_document::<CouchRoomDocument>(&doc_id).await?
        {
            self.delete_document(&doc_id, &rev).await?;
        }
        Ok(())
    }

    async fn poll_changes(&self, since: &str) -> CouchResult<ChangesResponse> {
        let timeout = self.longpoll_timeout.as_millis().to_string();
        let response = self
            .request(Method::GET, CHANGES)
            .query(&[
                ("feed", "longpoll"),
                ("since", since),
                ("timeout", timeout.as_str()),
            ])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: CHANGES.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<ChangesResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: CHANGES.to_string(),
                source,
            })
    }
}

fn change_from_row(doc_id: &str, deleted: bool, first_rev: Option<&str>) -> Option<StoreChange> {
    let room_id = room_of_doc_id(doc_id)?;
    let table = if doc_id.starts_with(super::models::ROOM_PREFIX) {
        ChangeTable::Rooms
    } else {
        ChangeTable::Players
    };
    let kind = if deleted {
        ChangeKind::Delete
    } else if first_rev.is_some_and(|rev| rev.starts_with("1-")) {
        ChangeKind::Insert
    } else {
        ChangeKind::Update
    };
    Some(StoreChange::new(room_id, table, kind))
}

fn seq_to_string(seq: &Value) -> String {
    match seq {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}

impl RoomStore for CouchRoomStore {
    fn create_room(&self, mut room: RoomEntity) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move {
            room.version = 0;
            let doc = CouchRoomDocument::from_entity(room, None);
            store.put_document(&doc.id, &doc).await?;
            Ok(doc.room)
        })
    }

    fn find_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<CouchRoomDocument>(&room_doc_id(&id))
                .await?;
            Ok(doc.map(|doc| doc.room))
        })
    }

    fn update_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_room_checked(room, expected_version)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_room(&self, id: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_room_docs(&id).await.map_err(Into::into) })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let room_doc = room_doc_id(&player.room_id);
            if store
                .get_document::<CouchRoomDocument>(&room_doc)
                .await?
                .is_none()
            {
                return Err(CouchDaoError::MissingDocument { path: room_doc }.into());
            }
            let doc = CouchPlayerDocument::from_entity(player, None);
            store.put_document(&doc.id, &doc).await?;
            Ok(())
        })
    }

    fn update_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = player_doc_id(&player.room_id, player.id);
            let existing = store
                .get_document::<CouchPlayerDocument>(&doc_id)
                .await?
                .ok_or(CouchDaoError::MissingDocument {
                    path: doc_id.clone(),
                })?;
            let doc = CouchPlayerDocument::from_entity(player, existing.rev);
            store.put_document(&doc_id, &doc).await?;
            Ok(())
        })
    }

    fn delete_player(
        &self,
        room_id: String,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_player_doc(&room_id, player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_players(
        &self,
        room_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchPlayerDocument>(&player_prefix(&room_id))
                .await?;
            let mut players: Vec<PlayerEntity> = docs.into_iter().map(|doc| doc.player).collect();
            players.sort_by_key(|player| player.player_order);
            Ok(players)
        })
    }

    fn subscribe(&self, room_id: String) -> BoxStream<'static, StoreChange> {
        let store = self.clone();
        async_stream::stream! {
            let mut since = "now".to_string();
            loop {
                match store.poll_changes(&since).await {
                    Ok(page) => {
                        since = seq_to_string(&page.last_seq);
                        for row in page.results {
                            let first_rev = row.changes.first().map(|change| change.rev.as_str());
                            match change_from_row(&row.id, row.deleted, first_rev) {
                                Some(change) if change.room_id == room_id => {
                                    yield change;
                                }
                                _ => {}
                            }
                        }
                    }
                    Err(err) => {
                        warn!(
                            error = %err,
                            room = %room_id,
                            "CouchDB change feed failed; retrying"
                        );
                        tokio::time::sleep(store.changes_retry_delay).await;
                    }
                }
            }
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
