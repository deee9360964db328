use std::{io, path::Path, sync::Arc};

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    client::{
        identity,
        reconcile::{OptimisticPatch, Reconciler},
        sync::Subscription,
    },
    config::AppConfig,
    dao::{
        models::{PlayerEntity, RoomEntity},
        room_store::RoomStore,
        storage::StorageError,
    },
    error::GameError,
    state::{
        game::{GameState, Player, PlayerId, Room, RoomCode, RoomSnapshot},
        state_machine::GamePhase,
        transitions::{self, KanaStatus},
    },
};

/// Shared by the public handle and the background sync tasks.
struct ClientCore {
    store: Arc<dyn RoomStore>,
    config: AppConfig,
    player_id: PlayerId,
    session: Mutex<Option<Reconciler>>,
    view: watch::Sender<Option<GameState>>,
}

/// One player's connection to the shared room store.
///
/// Every action is applied to the local view first, written to the store, then confirmed
/// by a fresh fetch. Background polling and the store's change stream keep the view in
/// step with the other players while a room is joined.
pub struct RoomClient {
    core: Arc<ClientCore>,
    subscription: Mutex<Option<Subscription>>,
}

impl RoomClient {
    /// Client acting as `player_id` against `store`.
    pub fn new(store: Arc<dyn RoomStore>, config: AppConfig, player_id: PlayerId) -> Self {
        let (view, _receiver) = watch::channel(None);
        Self {
            core: Arc::new(ClientCore {
                store,
                config,
                player_id,
                session: Mutex::new(None),
                view,
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Client playing as the identity persisted on this machine, created on first use.
    pub fn with_local_identity(store: Arc<dyn RoomStore>, config: AppConfig) -> io::Result<Self> {
        Self::with_identity_file(store, config, &identity::identity_path())
    }

    /// Client playing as the identity stored at `path`.
    pub fn with_identity_file(
        store: Arc<dyn RoomStore>,
        config: AppConfig,
        path: &Path,
    ) -> io::Result<Self> {
        let player_id = identity::load_or_create(path)?;
        Ok(Self::new(store, config, player_id))
    }

    /// Identity this client plays as.
    pub fn player_id(&self) -> PlayerId {
        self.core.player_id
    }

    /// Current rendered state, `None` outside a room.
    pub fn view(&self) -> Option<GameState> {
        self.core.view.borrow().clone()
    }

    /// Receiver notified every time the rendered state changes.
    pub fn watch(&self) -> watch::Receiver<Option<GameState>> {
        self.core.view.subscribe()
    }

    /// Whether this client hosts its current room.
    pub fn is_host(&self) -> bool {
        self.core
            .view
            .borrow()
            .as_ref()
            .is_some_and(|state| state.room.host_id == self.core.player_id)
    }

    /// Whether this client is the one expected to attack.
    pub fn is_my_turn(&self) -> bool {
        self.core.view.borrow().as_ref().is_some_and(|state| {
            state.room.phase == GamePhase::Battle
                && state
                    .players
                    .get(state.room.current_player_index)
                    .is_some_and(|player| player.id == self.core.player_id)
        })
    }

    /// Keyboard status of `kana` in the current room.
    pub fn kana_status(&self, kana: char) -> Option<KanaStatus> {
        self.core
            .view
            .borrow()
            .as_ref()
            .map(|state| transitions::kana_status(state, kana))
    }

    /// Open a new room hosted by this client and join it.
    pub async fn create_room(&self, name: &str) -> Result<RoomCode, GameError> {
        self.leave_if_joined().await?;
        let core = &self.core;
        let attempts = core.config.room_code_attempts();

        let mut created = None;
        for attempt in 1..=attempts {
            let code = RoomCode::random(&mut rand::rng());
            let room = Room::new(code.clone(), core.player_id);
            match core.store.create_room(room.into()).await {
                Ok(_) => {
                    created = Some(code);
                    break;
                }
                Err(err) if err.is_conflict() => {
                    debug!(attempt, room_id = %code, "room code already taken; drawing another");
                }
                Err(err) => return Err(err.into()),
            }
        }
        let code = created.ok_or(GameError::RoomCodeExhausted { attempts })?;

        let host = player_entity(core.player_id, &code, name, 0)?;
        if let Err(err) = core.store.insert_player(host).await {
            if let Err(cleanup) = core.store.delete_room(code.to_string()).await {
                warn!(room_id = %code, error = %cleanup, "failed to drop half-created room");
            }
            return Err(err.into());
        }

        info!(room_id = %code, player_id = %core.player_id, "room created");
        self.enter(code.clone()).await?;
        Ok(code)
    }

    /// Join an existing room by code. Rejoining a room this identity already belongs to
    /// is allowed in any phase.
    pub async fn join_room(&self, code: &str, name: &str) -> Result<(), GameError> {
        let code: RoomCode = code.parse()?;
        if self.core.current_room().await.as_ref() == Some(&code) {
            return self.core.refresh().await;
        }
        self.leave_if_joined().await?;
        let core = &self.core;

        let room = core
            .store
            .find_room(code.to_string())
            .await?
            .ok_or(GameError::RoomNotFound)?;
        let players = core.store.list_players(code.to_string()).await?;

        if players.iter().any(|player| player.id == core.player_id) {
            debug!(room_id = %code, "already a member; rejoining");
        } else {
            if room.phase != GamePhase::Lobby {
                return Err(GameError::GameAlreadyStarted);
            }
            if players.len() >= core.config.max_players() {
                return Err(GameError::RoomFull);
            }
            let order = players
                .iter()
                .map(|player| player.player_order)
                .max()
                .map_or(0, |highest| highest + 1);
            let entity = player_entity(core.player_id, &code, name, order)?;
            match core.store.insert_player(entity).await {
                Ok(()) => {}
                Err(StorageError::NotFound { .. }) => return Err(GameError::RoomNotFound),
                Err(err) if err.is_conflict() => {
                    // Either a duplicate of our own row or the host refused a full room.
                    let players = core.store.list_players(code.to_string()).await?;
                    if !players.iter().any(|player| player.id == core.player_id) {
                        return Err(GameError::RoomFull);
                    }
                }
                Err(err) => return Err(err.into()),
            }
            info!(room_id = %code, player_id = %core.player_id, order, "joined room");
        }

        self.enter(code).await
    }

    /// Leave the current room. The host role moves to the next player by join order and an
    /// empty room is deleted.
    pub async fn leave_room(&self) -> Result<(), GameError> {
        self.subscription.lock().await.take();
        let reconciler = {
            let mut session = self.core.session.lock().await;
            let reconciler = session.take();
            self.core.view.send_replace(None);
            reconciler
        };
        let Some(reconciler) = reconciler else {
            return Err(GameError::NotInRoom);
        };

        let room_id = reconciler.remote().room.id.clone();
        self.core.hand_over(&room_id).await?;
        info!(room_id = %room_id, player_id = %self.core.player_id, "left room");
        Ok(())
    }

    /// Host-only: set the theme while in the lobby.
    pub async fn set_theme(&self, theme: &str) -> Result<(), GameError> {
        let me = self.core.player_id;
        self.core
            .perform("set_theme", |state| transitions::set_theme(state, me, theme))
            .await
    }

    /// Host-only: pick one of the configured themes at random and apply it.
    pub async fn random_theme(&self) -> Result<String, GameError> {
        let theme = self.core.config.random_theme(&mut rand::rng());
        self.set_theme(&theme).await?;
        Ok(theme)
    }

    /// Host-only: LOBBY → INPUT.
    pub async fn start_game(&self) -> Result<(), GameError> {
        let me = self.core.player_id;
        self.core
            .perform("start_game", |state| transitions::start_game(state, me))
            .await
    }

    /// Submit this player's secret word during INPUT.
    pub async fn submit_word(&self, raw: &str) -> Result<(), GameError> {
        self.core.submit_word(raw).await
    }

    /// Attack `kana` during this player's turn.
    pub async fn attack(&self, kana: char) -> Result<(), GameError> {
        let me = self.core.player_id;
        self.core
            .perform("attack", |state| transitions::attack(state, me, kana))
            .await
    }

    /// Host-only: GAMEOVER → LOBBY.
    pub async fn restart(&self) -> Result<(), GameError> {
        let me = self.core.player_id;
        self.core
            .perform("restart", |state| transitions::restart(state, me))
            .await
    }

    /// Whether background sync is running for the current room. It stops on leave and
    /// when the room disappears from the store.
    pub async fn is_syncing(&self) -> bool {
        self.subscription
            .lock()
            .await
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Fetch the room now instead of waiting for the next tick or push.
    pub async fn refresh(&self) -> Result<(), GameError> {
        self.core.refresh().await
    }

    async fn leave_if_joined(&self) -> Result<(), GameError> {
        if self.core.session.lock().await.is_some() {
            self.leave_room().await?;
        }
        Ok(())
    }

    async fn enter(&self, code: RoomCode) -> Result<(), GameError> {
        let snapshot = self
            .core
            .fetch_snapshot(&code)
            .await?
            .ok_or(GameError::RoomNotFound)?;
        {
            let mut session = self.core.session.lock().await;
            let reconciler = Reconciler::new(snapshot);
            self.core.view.send_replace(Some(reconciler.view().clone()));
            *session = Some(reconciler);
        }

        let core = self.core.clone();
        let subscription = Subscription::spawn(
            self.core.store.subscribe(code.to_string()),
            self.core.config.poll_interval(),
            move || {
                let core = core.clone();
                let code = code.clone();
                async move {
                    if let Err(err) = core.refresh().await {
                        warn!(error = %err, "room sync failed; retrying on next tick");
                    }
                    core.current_room().await.as_ref() == Some(&code)
                }
            },
        );
        *self.subscription.lock().await = Some(subscription);
        Ok(())
    }
}

impl ClientCore {
    async fn fetch_snapshot(&self, code: &RoomCode) -> Result<Option<RoomSnapshot>, StorageError> {
        let (room, players) = futures::try_join!(
            self.store.find_room(code.to_string()),
            self.store.list_players(code.to_string())
        )?;
        Ok(room.map(|room| {
            RoomSnapshot::new(room.into(), players.into_iter().map(Player::from).collect())
        }))
    }

    fn publish(&self, session: &Option<Reconciler>) {
        self.view
            .send_replace(session.as_ref().map(|reconciler| reconciler.view().clone()));
    }

    /// Fetch and merge once, then try the INPUT → BATTLE step if it is due.
    async fn refresh(&self) -> Result<(), GameError> {
        self.sync_once().await?;
        self.advance_if_ready().await
    }

    async fn sync_once(&self) -> Result<(), GameError> {
        let Some(room_id) = self.current_room().await else {
            return Ok(());
        };
        let fetched = self.fetch_snapshot(&room_id).await?;

        let mut session = self.session.lock().await;
        let Some(reconciler) = session.as_mut() else {
            return Ok(());
        };
        if reconciler.remote().room.id != room_id {
            return Ok(());
        }

        match fetched {
            Some(snapshot) => {
                if reconciler.apply_remote(snapshot) {
                    self.publish(&session);
                }
            }
            None => {
                warn!(room_id = %room_id, "room disappeared from the store");
                *session = None;
                self.publish(&session);
            }
        }
        Ok(())
    }

    async fn current_room(&self) -> Option<RoomCode> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|reconciler| reconciler.remote().room.id.clone())
    }

    /// Any client that sees every word in may flip the room to BATTLE. The version check
    /// lets exactly one of them win; the others just observe the result.
    async fn advance_if_ready(&self) -> Result<(), GameError> {
        let candidate = {
            let session = self.session.lock().await;
            session.as_ref().and_then(|reconciler| {
                let remote = reconciler.remote();
                if remote.room.phase != GamePhase::Input {
                    return None;
                }
                let advanced =
                    transitions::advance_if_all_submitted(GameState::from_snapshot(remote.clone()));
                (advanced.room.phase == GamePhase::Battle)
                    .then(|| (advanced.room, remote.room.version))
            })
        };
        let Some((room, base)) = candidate else {
            return Ok(());
        };

        let room_id = room.id.clone();
        match self.store.update_room(room.into(), base).await {
            Ok(_) => {
                info!(room_id = %room_id, "every word is in; battle started");
                self.sync_once().await
            }
            Err(err) if err.is_conflict() => {
                debug!(room_id = %room_id, "another client already started the battle");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Run a room-level action: optimistic apply, versioned write, confirm by fetching.
    async fn perform<F>(&self, action: &'static str, apply: F) -> Result<(), GameError>
    where
        F: FnOnce(&GameState) -> Result<GameState, GameError>,
    {
        let (before, next, base) = {
            let mut session = self.session.lock().await;
            let reconciler = session.as_mut().ok_or(GameError::NotInRoom)?;
            let before = reconciler.view().clone();
            let next = apply(&before)?;
            let base = reconciler.remote().room.version;
            reconciler.apply_local(OptimisticPatch::Room(next.snapshot()), next.logs.clone());
            self.publish(&session);
            (before, next, base)
        };

        if let Err(err) = self.write_changes(&before, &next, base).await {
            self.discard_overlay().await;
            if err.is_conflict() {
                warn!(
                    action,
                    room_id = %next.room.id,
                    error = %err,
                    "write lost a race; resyncing"
                );
            } else {
                return Err(err.into());
            }
        }

        if let Err(err) = self.refresh().await {
            warn!(action, error = %err, "confirmation fetch failed");
        }
        Ok(())
    }

    async fn write_changes(
        &self,
        before: &GameState,
        next: &GameState,
        base: u64,
    ) -> Result<(), StorageError> {
        if next.room != before.room {
            let room: RoomEntity = next.room.clone().into();
            self.store.update_room(room, base).await?;
        }
        for player in &next.players {
            let unchanged = before
                .players
                .iter()
                .any(|previous| previous == player);
            if !unchanged {
                self.store.update_player(player.clone().into()).await?;
            }
        }
        Ok(())
    }

    async fn discard_overlay(&self) {
        let mut session = self.session.lock().await;
        if let Some(reconciler) = session.as_mut() {
            reconciler.drop_overlay();
        }
        self.publish(&session);
    }

    async fn submit_word(&self, raw: &str) -> Result<(), GameError> {
        let player = {
            let mut session = self.session.lock().await;
            let reconciler = session.as_mut().ok_or(GameError::NotInRoom)?;
            let next = transitions::submit_word(reconciler.view(), self.player_id, raw)?;
            let player = next
                .players
                .iter()
                .find(|player| player.id == self.player_id)
                .cloned()
                .ok_or(GameError::UnknownPlayer)?;
            let board = player.word.clone().ok_or(GameError::UnknownPlayer)?;
            reconciler.apply_local(
                OptimisticPatch::Word {
                    player_id: self.player_id,
                    board,
                },
                next.logs,
            );
            self.publish(&session);
            player
        };

        if let Err(err) = self.store.update_player(player.into()).await {
            self.discard_overlay().await;
            return Err(err.into());
        }

        if let Err(err) = self.refresh().await {
            warn!(action = "submit_word", error = %err, "confirmation fetch failed");
        }
        Ok(())
    }

    /// Remove this player from `room_id`, repairing host, turn and outcome for the others.
    ///
    /// The player row is only deleted once the repaired room is stored, so the room never
    /// points its host or turn at a removed player.
    async fn hand_over(&self, room_id: &RoomCode) -> Result<(), GameError> {
        let attempts = self.config.leave_attempts();
        let mut repaired = false;
        for _ in 0..attempts {
            let Some(snapshot) = self.fetch_snapshot(room_id).await? else {
                return Ok(());
            };
            if snapshot.player(self.player_id).is_none() {
                repaired = true;
                break;
            }
            if snapshot.players.len() == 1 {
                self.store.delete_room(room_id.to_string()).await?;
                debug!(room_id = %room_id, "last player left; room deleted");
                return Ok(());
            }

            let base = snapshot.room.version;
            let state = GameState::from_snapshot(snapshot);
            let next = transitions::remove_player(&state, self.player_id)?;
            match self.write_changes(&state, &next, base).await {
                Ok(()) => {
                    repaired = true;
                    break;
                }
                Err(err) if err.is_conflict() => {
                    debug!(room_id = %room_id, "room moved while leaving; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        if !repaired {
            warn!(room_id = %room_id, attempts, "gave up repairing the room; player row kept");
            return Err(GameError::LeaveContended { attempts });
        }

        self.store
            .delete_player(room_id.to_string(), self.player_id)
            .await?;
        if self
            .store
            .list_players(room_id.to_string())
            .await?
            .is_empty()
        {
            self.store.delete_room(room_id.to_string()).await?;
        }
        Ok(())
    }
}

fn player_entity(
    id: PlayerId,
    code: &RoomCode,
    name: &str,
    order: u32,
) -> Result<PlayerEntity, GameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::Validation("a player name is required".into()));
    }
    let entity: PlayerEntity = Player::new(id, code.clone(), name.to_string(), order).into();
    entity.validate()?;
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, AtomicU32, Ordering},
        time::Duration,
    };

    use futures::{future::BoxFuture, stream::BoxStream};
    use uuid::Uuid;

    use super::*;
    use crate::dao::{
        room_store::{StoreChange, memory::MemoryRoomStore},
        storage::StorageResult,
    };

    fn client(store: &MemoryRoomStore) -> RoomClient {
        let config = AppConfig::default().with_poll_interval(Duration::from_secs(3600));
        RoomClient::new(Arc::new(store.clone()), config, Uuid::new_v4())
    }

    #[tokio::test]
    async fn join_checks_code_phase_and_capacity() {
        let store = MemoryRoomStore::new();
        let host = client(&store);
        let code = host.create_room("Aki").await.unwrap();

        let stranger = client(&store);
        let missing = if code.as_str() == "999999" { "000000" } else { "999999" };
        assert!(matches!(
            stranger.join_room(missing, "Ren").await,
            Err(GameError::RoomNotFound)
        ));
        assert!(matches!(
            stranger.join_room("12ab56", "Ren").await,
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            stranger.join_room(code.as_str(), "   ").await,
            Err(GameError::Validation(_))
        ));

        let mut guests = Vec::new();
        for name in ["Ren", "Mio", "Sora"] {
            let guest = client(&store);
            guest.join_room(code.as_str(), name).await.unwrap();
            guests.push(guest);
        }
        let late = client(&store);
        assert!(matches!(
            late.join_room(code.as_str(), "Yui").await,
            Err(GameError::RoomFull)
        ));

        let players = store.list_players(code.to_string()).await.unwrap();
        let orders: Vec<u32> = players.iter().map(|player| player.player_order).collect();
        assert_eq!(orders, [0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn cannot_join_a_started_game_but_members_can_return() {
        let store = MemoryRoomStore::new();
        let host = client(&store);
        let code = host.create_room("Aki").await.unwrap();
        let guest = client(&store);
        guest.join_room(code.as_str(), "Ren").await.unwrap();
        host.refresh().await.unwrap();
        host.start_game().await.unwrap();

        let late = client(&store);
        assert!(matches!(
            late.join_room(code.as_str(), "Mio").await,
            Err(GameError::GameAlreadyStarted)
        ));

        // Same identity on a fresh client, for example after a restart of the app.
        let returning = RoomClient::new(
            Arc::new(store.clone()),
            AppConfig::default().with_poll_interval(Duration::from_secs(3600)),
            guest.player_id(),
        );
        returning.join_room(code.as_str(), "Ren").await.unwrap();
        assert_eq!(returning.view().unwrap().room.phase, GamePhase::Input);
        assert_eq!(store.list_players(code.to_string()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn leaving_hands_host_over_and_last_one_out_deletes_the_room() {
        let store = MemoryRoomStore::new();
        let host = client(&store);
        let code = host.create_room("Aki").await.unwrap();
        let guest = client(&store);
        guest.join_room(code.as_str(), "Ren").await.unwrap();

        host.leave_room().await.unwrap();
        assert!(host.view().is_none());
        guest.refresh().await.unwrap();
        assert!(guest.is_host());

        guest.leave_room().await.unwrap();
        assert_eq!(store.room_count(), 0);
        assert!(matches!(guest.leave_room().await, Err(GameError::NotInRoom)));
    }

    #[tokio::test]
    async fn only_the_host_sets_the_theme() {
        let store = MemoryRoomStore::new();
        let host = client(&store);
        let code = host.create_room("Aki").await.unwrap();
        let guest = client(&store);
        guest.join_room(code.as_str(), "Ren").await.unwrap();

        assert!(matches!(guest.set_theme("food").await, Err(GameError::NotHost)));
        let theme = host.random_theme().await.unwrap();
        guest.refresh().await.unwrap();
        assert_eq!(guest.view().unwrap().room.theme, theme);
    }

    /// Lets another writer land right before the first versioned room write, can pretend
    /// the next few room codes are taken, and can fail every room write with a conflict.
    struct RacingStore {
        inner: MemoryRoomStore,
        armed: AtomicBool,
        taken_codes: AtomicU32,
        contended: AtomicBool,
    }

    impl RacingStore {
        fn new() -> Self {
            Self {
                inner: MemoryRoomStore::new(),
                armed: AtomicBool::new(false),
                taken_codes: AtomicU32::new(0),
                contended: AtomicBool::new(false),
            }
        }
    }

    impl RoomStore for RacingStore {
        fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<RoomEntity>> {
            let taken = self
                .taken_codes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if taken {
                let err = StorageError::conflict(format!("room `{}` already exists", room.id));
                return Box::pin(futures::future::ready(Err::<RoomEntity, _>(err)));
            }
            self.inner.create_room(room)
        }

        fn find_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            self.inner.find_room(id)
        }

        fn update_room(
            &self,
            room: RoomEntity,
            expected_version: u64,
        ) -> BoxFuture<'static, StorageResult<RoomEntity>> {
            if self.contended.load(Ordering::SeqCst) {
                let err = StorageError::conflict(format!("room `{}` keeps moving", room.id));
                return Box::pin(futures::future::ready(Err::<RoomEntity, _>(err)));
            }
            let inner = self.inner.clone();
            let race = self.armed.swap(false, Ordering::SeqCst);
            Box::pin(async move {
                if race {
                    let mut theirs = inner.find_room(room.id.clone()).await?.unwrap();
                    let version = theirs.version;
                    theirs.theme = "food".into();
                    inner.update_room(theirs, version).await?;
                }
                inner.update_room(room, expected_version).await
            })
        }

        fn delete_room(&self, id: String) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.delete_room(id)
        }

        fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.insert_player(player)
        }

        fn update_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.update_player(player)
        }

        fn delete_player(
            &self,
            room_id: String,
            player_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_player(room_id, player_id)
        }

        fn list_players(
            &self,
            room_id: String,
        ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
            self.inner.list_players(room_id)
        }

        fn subscribe(&self, room_id: String) -> BoxStream<'static, StoreChange> {
            self.inner.subscribe(room_id)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn lost_race_resyncs_without_error() {
        let store = Arc::new(RacingStore::new());
        let config = AppConfig::default().with_poll_interval(Duration::from_secs(3600));
        let host = RoomClient::new(store.clone(), config, Uuid::new_v4());
        host.create_room("Aki").await.unwrap();

        store.armed.store(true, Ordering::SeqCst);
        host.set_theme("animals").await.unwrap();

        let view = host.view().unwrap();
        assert_eq!(view.room.theme, "food");
        assert!(host.core.session.lock().await.as_ref().unwrap().overlay().is_none());
    }

    #[tokio::test]
    async fn room_code_collisions_are_retried_then_reported() {
        let store = Arc::new(RacingStore::new());
        let config = AppConfig::default().with_poll_interval(Duration::from_secs(3600));
        let attempts = config.room_code_attempts();

        store.taken_codes.store(attempts - 1, Ordering::SeqCst);
        let host = RoomClient::new(store.clone(), config.clone(), Uuid::new_v4());
        let code = host.create_room("Aki").await.unwrap();
        assert_eq!(host.view().unwrap().room.id, code);

        store.taken_codes.store(attempts, Ordering::SeqCst);
        let unlucky = RoomClient::new(store.clone(), config, Uuid::new_v4());
        assert!(matches!(
            unlucky.create_room("Ren").await,
            Err(GameError::RoomCodeExhausted { attempts: tried }) if tried == attempts
        ));
        assert!(unlucky.view().is_none());
    }

    #[tokio::test]
    async fn contended_leave_keeps_the_player_row() {
        let store = Arc::new(RacingStore::new());
        let config = AppConfig::default().with_poll_interval(Duration::from_secs(3600));
        let attempts = config.leave_attempts();
        let host = RoomClient::new(store.clone(), config.clone(), Uuid::new_v4());
        let code = host.create_room("Aki").await.unwrap();
        let guest = RoomClient::new(store.clone(), config, Uuid::new_v4());
        guest.join_room(code.as_str(), "Ren").await.unwrap();

        store.contended.store(true, Ordering::SeqCst);
        assert!(matches!(
            host.leave_room().await,
            Err(GameError::LeaveContended { attempts: tried }) if tried == attempts
        ));

        let players = store.list_players(code.to_string()).await.unwrap();
        assert!(players.iter().any(|player| player.id == host.player_id()));
        let room = store.find_room(code.to_string()).await.unwrap().unwrap();
        assert_eq!(room.host_id, host.player_id());
    }

    #[tokio::test]
    async fn identity_file_survives_a_client_restart() {
        let store = MemoryRoomStore::new();
        let path = std::env::temp_dir()
            .join(format!("kana-clash-{}", Uuid::new_v4()))
            .join("player_id");
        let config = AppConfig::default().with_poll_interval(Duration::from_secs(3600));

        let first =
            RoomClient::with_identity_file(Arc::new(store.clone()), config.clone(), &path).unwrap();
        let code = first.create_room("Aki").await.unwrap();
        drop(first);

        let again = RoomClient::with_identity_file(Arc::new(store.clone()), config, &path).unwrap();
        again.join_room(code.as_str(), "Aki").await.unwrap();
        assert!(again.is_host());
        assert_eq!(store.list_players(code.to_string()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleted_room_ends_background_sync() {
        let store = MemoryRoomStore::new();
        let config = AppConfig::default().with_poll_interval(Duration::from_millis(20));
        let host = RoomClient::new(Arc::new(store.clone()), config, Uuid::new_v4());
        let code = host.create_room("Aki").await.unwrap();
        assert!(host.is_syncing().await);

        store.delete_room(code.to_string()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while host.is_syncing().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("sync kept running after the room was deleted");
        assert!(host.view().is_none());
    }
}
