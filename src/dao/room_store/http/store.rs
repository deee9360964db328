use std::{sync::Arc, time::Duration};

use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{PlayerEntity, RoomEntity},
        room_store::{RoomStore, StoreChange},
        storage::StorageResult,
    },
    dto::room::{DeletedResponse, ErrorBody, UpdateRoomRequest},
};

use super::{
    error::{HttpStoreError, HttpStoreResult},
    events::EventDecoder,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Talks to a running store host over its REST routes and SSE change feed.
#[derive(Clone)]
pub struct HttpRoomStore {
    client: Client,
    base_url: Arc<str>,
}

impl HttpRoomStore {
    /// Build a client for the host at `base_url` (for example `http://localhost:8080`).
    pub fn new(base_url: impl AsRef<str>) -> HttpStoreResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| HttpStoreError::ClientBuilder { source })?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(
        &self,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> HttpStoreResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| HttpStoreError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.message)
            .unwrap_or_else(|_| status.to_string());
        Err(HttpStoreError::RequestStatus {
            path: path.to_string(),
            status,
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> HttpStoreResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|source| HttpStoreError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    async fn fetch_room(&self, id: &str) -> HttpStoreResult<Option<RoomEntity>> {
        let path = format!("/rooms/{id}");
        match self.send(&path, self.request(Method::GET, &path)).await {
            Ok(response) => Self::decode(&path, response).await.map(Some),
            Err(HttpStoreError::RequestStatus {
                status: StatusCode::NOT_FOUND,
                ..
            }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn open_events(&self, room_id: &str) -> HttpStoreResult<Response> {
        let path = format!("/rooms/{room_id}/events");
        self.send(&path, self.request(Method::GET, &path)).await
    }
}

impl RoomStore for HttpRoomStore {
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let path = "/rooms";
            let response = store
                .send(path, store.request(Method::POST, path).json(&room))
                .await?;
            Ok(Self::decode(path, response).await?)
        })
    }

    fn find_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.fetch_room(&id).await?) })
    }

    fn update_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("/rooms/{}", room.id);
            let body = UpdateRoomRequest {
                expected_version,
                room,
            };
            let response = store
                .send(&path, store.request(Method::PUT, &path).json(&body))
                .await?;
            Ok(Self::decode(&path, response).await?)
        })
    }

    fn delete_room(&self, id: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("/rooms/{id}");
            store
                .send(&path, store.request(Method::DELETE, &path))
                .await?;
            Ok(())
        })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("/rooms/{}/players", player.room_id);
            store
                .send(&path, store.request(Method::POST, &path).json(&player))
                .await?;
            Ok(())
        })
    }

    fn update_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("/rooms/{}/players/{}", player.room_id, player.id);
            store
                .send(&path, store.request(Method::PUT, &path).json(&player))
                .await?;
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
            let path = format!("/rooms/{room_id}/players/{player_id}");
            let response = store
                .send(&path, store.request(Method::DELETE, &path))
                .await?;
            let body: DeletedResponse = Self::decode(&path, response).await?;
            Ok(body.deleted)
        })
    }

    fn list_players(
        &self,
        room_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("/rooms/{room_id}/players");
            let response = store.send(&path, store.request(Method::GET, &path)).await?;
            Ok(Self::decode(&path, response).await?)
        })
    }

    fn subscribe(&self, room_id: String) -> BoxStream<'static, StoreChange> {
        let store = self.clone();
        async_stream::stream! {
            loop {
                let response = match store.open_events(&room_id).await {
                    Ok(response) => response,
                    Err(err) => {
                        warn!(error = %err, room = %room_id, "change feed unavailable; retrying");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        continue;
                    }
                };
                debug!(room = %room_id, "change feed connected");

                let mut decoder = EventDecoder::default();
                let mut body = response.bytes_stream();
                while let Some(chunk) = body.next().await {
                    match chunk {
                        Ok(bytes) => {
                            for change in decoder.push(&bytes) {
                                yield change;
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, room = %room_id, "change feed interrupted");
                            break;
                        }
                    }
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let path = "/healthcheck";
            store.send(path, store.request(Method::GET, path)).await?;
            Ok(())
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}
