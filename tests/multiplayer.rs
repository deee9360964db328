use std::{sync::Arc, time::Duration};

use kana_clash::{
    client::RoomClient,
    config::AppConfig,
    dao::room_store::{RoomStore, memory::MemoryRoomStore},
    error::GameError,
    state::{game::GameState, state_machine::GamePhase, transitions::KanaStatus},
};
use tokio::time::timeout;
use uuid::Uuid;

fn client(store: &MemoryRoomStore, poll_interval: Duration) -> RoomClient {
    let config = AppConfig::default().with_poll_interval(poll_interval);
    RoomClient::new(Arc::new(store.clone()), config, Uuid::new_v4())
}

fn messages(state: &GameState) -> Vec<&str> {
    state.logs.iter().map(|log| log.message.as_str()).collect()
}

async fn wait_for<F>(client: &RoomClient, predicate: F) -> GameState
where
    F: Fn(&GameState) -> bool,
{
    let mut receiver = client.watch();
    timeout(Duration::from_secs(5), async {
        loop {
            if let Some(state) = receiver.borrow_and_update().clone()
                && predicate(&state)
            {
                return state;
            }
            receiver.changed().await.unwrap();
        }
    })
    .await
    .expect("view never reached the expected state")
}

#[tokio::test]
async fn two_players_play_a_full_round_and_restart() {
    let store = MemoryRoomStore::new();
    let quiet = Duration::from_secs(3600);
    let aki = client(&store, quiet);
    let ren = client(&store, quiet);

    let code = aki.create_room("Aki").await.unwrap();
    ren.join_room(code.as_str(), "Ren").await.unwrap();
    aki.refresh().await.unwrap();
    assert!(aki.is_host());
    assert!(!ren.is_host());

    aki.set_theme("どうぶつ").await.unwrap();
    aki.start_game().await.unwrap();
    ren.refresh().await.unwrap();
    let view = ren.view().unwrap();
    assert_eq!(view.room.phase, GamePhase::Input);
    assert!(messages(&view).contains(&"Game start! Theme: どうぶつ"));

    aki.submit_word("ねこ").await.unwrap();
    assert!(matches!(
        aki.submit_word("さる").await,
        Err(GameError::WordAlreadySubmitted)
    ));
    ren.submit_word("いぬ").await.unwrap();

    // Whoever sees every word first flips the room to battle; the other write loses the
    // version check and is ignored.
    ren.refresh().await.unwrap();
    assert_eq!(ren.view().unwrap().room.phase, GamePhase::Battle);
    aki.refresh().await.unwrap();
    assert_eq!(aki.view().unwrap().room.phase, GamePhase::Battle);
    assert!(aki.is_my_turn());
    assert!(matches!(ren.attack('ね').await, Err(GameError::NotYourTurn)));

    aki.attack('い').await.unwrap();
    assert!(aki.is_my_turn(), "a hit grants a bonus attack");
    assert_eq!(aki.kana_status('い'), Some(KanaStatus::Hit));
    assert!(matches!(
        aki.attack('い').await,
        Err(GameError::KanaAlreadyAttacked('い'))
    ));

    aki.attack('ぬ').await.unwrap();
    let view = aki.view().unwrap();
    assert_eq!(view.room.phase, GamePhase::GameOver);
    assert_eq!(view.room.winner_id, Some(aki.player_id()));
    let lines = messages(&view);
    assert!(lines.contains(&"Aki may attack again!"));
    assert!(lines.contains(&"Aki wins!"));

    ren.refresh().await.unwrap();
    let view = ren.view().unwrap();
    assert_eq!(view.room.phase, GamePhase::GameOver);
    let loser = view
        .players
        .iter()
        .find(|player| player.id == ren.player_id())
        .unwrap();
    assert!(loser.is_eliminated);
    assert!(messages(&view).contains(&"Aki wins!"));

    assert!(matches!(ren.restart().await, Err(GameError::NotHost)));
    aki.restart().await.unwrap();
    ren.refresh().await.unwrap();
    let view = ren.view().unwrap();
    assert_eq!(view.room.phase, GamePhase::Lobby);
    assert!(view.room.attacked_kanas.is_empty());
    assert!(view.players.iter().all(|player| player.word.is_none()));
    assert_eq!(view.room.winner_id, None);
    assert_eq!(store.list_players(code.to_string()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn background_sync_delivers_other_players_moves() {
    let store = MemoryRoomStore::new();
    let aki = client(&store, Duration::from_millis(50));
    let ren = client(&store, Duration::from_millis(50));

    let code = aki.create_room("Aki").await.unwrap();
    ren.join_room(code.as_str(), "Ren").await.unwrap();
    wait_for(&aki, |state| state.players.len() == 2).await;

    aki.start_game().await.unwrap();
    wait_for(&ren, |state| state.room.phase == GamePhase::Input).await;

    aki.submit_word("そら").await.unwrap();
    ren.submit_word("うみ").await.unwrap();
    wait_for(&aki, |state| state.room.phase == GamePhase::Battle).await;

    // Miss: nobody holds か, so the turn passes to Ren.
    aki.attack('か').await.unwrap();
    let state = wait_for(&ren, |state| state.room.current_player_index == 1).await;
    assert!(messages(&state).contains(&"Miss!"));
    assert!(ren.is_my_turn());
    assert_eq!(ren.kana_status('か'), Some(KanaStatus::Miss));
}

#[tokio::test]
async fn leaving_mid_battle_hands_the_win_to_the_survivor() {
    let store = MemoryRoomStore::new();
    let quiet = Duration::from_secs(3600);
    let aki = client(&store, quiet);
    let ren = client(&store, quiet);

    let code = aki.create_room("Aki").await.unwrap();
    ren.join_room(code.as_str(), "Ren").await.unwrap();
    aki.refresh().await.unwrap();
    aki.start_game().await.unwrap();
    ren.refresh().await.unwrap();
    aki.submit_word("はな").await.unwrap();
    ren.submit_word("つき").await.unwrap();
    aki.refresh().await.unwrap();
    assert_eq!(aki.view().unwrap().room.phase, GamePhase::Battle);

    aki.leave_room().await.unwrap();
    ren.refresh().await.unwrap();
    let view = ren.view().unwrap();
    assert!(ren.is_host());
    assert_eq!(view.players.len(), 1);
    assert_eq!(view.room.phase, GamePhase::GameOver);
    assert_eq!(view.room.winner_id, Some(ren.player_id()));
}
