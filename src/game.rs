use rand::Rng;
use tokio::sync::{broadcast, mpsc};

use crate::cadence::Arm;
use crate::roster::Roster;
use crate::session::Session;
use crate::types::*;

/// Commands the WebSocket handlers and the round timer send to the session
/// task. Everything that mutates session or roster state arrives here, so
/// admin actions, ticks and connection events can never interleave.
#[derive(Debug, Clone)]
pub enum GameCommand {
    /// An observer connected and wants its initial snapshot.
    WebHello { socket_id: String },
    /// A block identified itself; joins (or reactivates) the roster entry.
    BlockHello { socket_id: String, block_id: String },
    /// A block reporting its outcome for the active round.
    Report { socket_id: String, success: bool },
    /// An admin intent from the console.
    Admin { action: AdminAction },
    /// Transport-level disconnect of any socket.
    Disconnect { socket_id: String },
    /// The round timer fired. Stale generations are discarded.
    Tick { generation: u64 },
}

/// One outbound message, addressed to a single socket. The session task
/// decides who gets what: observers get state snapshots, blocks get their
/// round commands. Each connection's forwarder picks out its own messages.
#[derive(Debug, Clone)]
pub struct GameEvent {
    pub socket_id: String,
    pub msg: ServerMsg,
}

/// Handle for talking to the session task.
#[derive(Clone)]
pub struct GameHandle {
    pub cmd_tx: mpsc::Sender<GameCommand>,
    pub event_tx: broadcast::Sender<GameEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClientKind {
    Web,
    Block { block_id: String },
}

#[derive(Debug, Clone)]
struct ClientMeta {
    socket_id: String,
    kind: ClientKind,
}

/// State owned exclusively by the session task.
struct GameState {
    session: Session,
    roster: Roster,
    clients: Vec<ClientMeta>,
    commands: Vec<String>,
    defaults: CadenceConfig,
    // for re-enqueueing timer ticks onto our own command channel
    cmd_tx: mpsc::Sender<GameCommand>,
}

impl GameState {
    fn send_to(&self, tx: &broadcast::Sender<GameEvent>, socket_id: &str, msg: ServerMsg) {
        let _ = tx.send(GameEvent {
            socket_id: socket_id.to_string(),
            msg,
        });
    }

    fn snapshot(&self) -> ServerMsg {
        ServerMsg::State {
            phase: self.session.phase(),
            round: self.session.round(),
            current_cmd: self.session.current_cmd().to_string(),
            players: self.roster.snapshot(),
        }
    }

    /// Publishes the full current snapshot to every connected observer.
    /// Blocks are skipped; they only ever receive their round commands.
    fn broadcast_state(&self, tx: &broadcast::Sender<GameEvent>) {
        let snapshot = self.snapshot();
        for client in &self.clients {
            if client.kind == ClientKind::Web {
                self.send_to(tx, &client.socket_id, snapshot.clone());
            }
        }
    }

    fn client_block_id(&self, socket_id: &str) -> Option<&str> {
        self.clients
            .iter()
            .find(|c| c.socket_id == socket_id)
            .and_then(|c| match &c.kind {
                ClientKind::Block { block_id } => Some(block_id.as_str()),
                ClientKind::Web => None,
            })
    }
}

/// Spawn the session task. Returns the handle the transport layer uses to
/// submit commands and subscribe to outbound messages.
pub fn spawn_game(config: GameConfig) -> GameHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let (event_tx, _) = broadcast::channel(256);

    let state = GameState {
        session: Session::new(),
        roster: Roster::new(),
        clients: Vec::new(),
        commands: if config.commands.is_empty() {
            default_commands()
        } else {
            config.commands
        },
        defaults: config.defaults,
        cmd_tx: cmd_tx.clone(),
    };

    let handle = GameHandle {
        cmd_tx,
        event_tx: event_tx.clone(),
    };

    tokio::spawn(game_task(state, cmd_rx, event_tx));

    handle
}

async fn game_task(
    mut state: GameState,
    mut cmd_rx: mpsc::Receiver<GameCommand>,
    event_tx: broadcast::Sender<GameEvent>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            GameCommand::WebHello { socket_id } => {
                handle_web_hello(&mut state, &event_tx, socket_id);
            }
            GameCommand::BlockHello {
                socket_id,
                block_id,
            } => {
                handle_block_hello(&mut state, &event_tx, socket_id, block_id);
            }
            GameCommand::Report { socket_id, success } => {
                handle_report(&mut state, &event_tx, socket_id, success);
            }
            GameCommand::Admin { action } => {
                handle_admin(&mut state, &event_tx, action);
            }
            GameCommand::Disconnect { socket_id } => {
                handle_disconnect(&mut state, &event_tx, socket_id);
            }
            GameCommand::Tick { generation } => {
                handle_tick(&mut state, &event_tx, generation);
            }
        }
    }

    tracing::info!("session task ended");
}

fn handle_web_hello(state: &mut GameState, tx: &broadcast::Sender<GameEvent>, socket_id: String) {
    state.clients.retain(|c| c.socket_id != socket_id);
    state.clients.push(ClientMeta {
        socket_id: socket_id.clone(),
        kind: ClientKind::Web,
    });

    // new observers get a full snapshot right away
    let snapshot = state.snapshot();
    state.send_to(tx, &socket_id, snapshot);
    tracing::info!("observer connected: {}", socket_id);
}

fn handle_block_hello(
    state: &mut GameState,
    tx: &broadcast::Sender<GameEvent>,
    socket_id: String,
    block_id: String,
) {
    if block_id.is_empty() {
        tracing::warn!("block hello without block id from {}", socket_id);
        return;
    }

    state.clients.retain(|c| c.socket_id != socket_id);
    state.clients.push(ClientMeta {
        socket_id,
        kind: ClientKind::Block {
            block_id: block_id.clone(),
        },
    });

    state.roster.join(&block_id, &block_id);
    tracing::info!("block connected: {}", block_id);
    state.broadcast_state(tx);
}

fn handle_report(
    state: &mut GameState,
    tx: &broadcast::Sender<GameEvent>,
    socket_id: String,
    success: bool,
) {
    if state.session.phase() != Phase::Running {
        return;
    }
    let Some(block_id) = state.client_block_id(&socket_id).map(str::to_string) else {
        tracing::warn!("report from unidentified socket {}", socket_id);
        return;
    };

    if state.roster.mark_report(&block_id, success) {
        state.broadcast_state(tx);
    }
}

fn handle_admin(state: &mut GameState, tx: &broadcast::Sender<GameEvent>, action: AdminAction) {
    match action {
        AdminAction::Start {
            round0_ms,
            decay_ms,
            min_ms,
        } => {
            let config = CadenceConfig {
                round0_ms: round0_ms.unwrap_or(state.defaults.round0_ms),
                decay_ms: decay_ms.unwrap_or(state.defaults.decay_ms),
                min_ms: min_ms.unwrap_or(state.defaults.min_ms),
            };
            if !state.session.begin(config) {
                tracing::warn!("start ignored in phase {}", state.session.phase());
                return;
            }
            state.roster.begin_game();
            tracing::info!(
                "game started: round0={}ms decay={}ms min={}ms",
                config.round0_ms,
                config.decay_ms,
                config.min_ms
            );
            advance_or_finish(state, tx);
        }
        AdminAction::Pause => {
            if state.session.pause() {
                tracing::info!("game paused in round {}", state.session.round());
                state.broadcast_state(tx);
            }
        }
        AdminAction::Resume => {
            if let Some(arm) = state.session.resume() {
                tracing::info!(
                    "game resumed, {}ms left in round {}",
                    arm.window.as_millis(),
                    state.session.round()
                );
                arm_round_timer(state, arm);
                state.broadcast_state(tx);
            }
        }
        AdminAction::Reset => {
            state.session.reset();
            state.roster.reset_all();
            tracing::info!("game reset to lobby");
            state.broadcast_state(tx);
        }
        AdminAction::Rename { block_id, name } => {
            if state.session.phase() != Phase::Lobby {
                tracing::warn!(
                    "rename of {} ignored: {}",
                    block_id,
                    ActionError::InvalidState(state.session.phase())
                );
                return;
            }
            match state.roster.rename(&block_id, &name) {
                Ok(()) => state.broadcast_state(tx),
                Err(err) => tracing::warn!("rename of {} ignored: {}", block_id, err),
            }
        }
    }
}

fn handle_disconnect(state: &mut GameState, tx: &broadcast::Sender<GameEvent>, socket_id: String) {
    let block_id = state.client_block_id(&socket_id).map(str::to_string);
    state.clients.retain(|c| c.socket_id != socket_id);

    if let Some(block_id) = block_id {
        state.roster.leave(&block_id);
        tracing::info!("block disconnected: {}", block_id);
        state.broadcast_state(tx);
    }
}

fn handle_tick(state: &mut GameState, tx: &broadcast::Sender<GameEvent>, generation: u64) {
    if !state.session.accepts_tick(generation) {
        tracing::debug!("discarding stale tick (generation {})", generation);
        return;
    }

    // the round is over: anyone who didn't report success is out
    state.roster.eliminate_silent();
    advance_or_finish(state, tx);
}

/// Advances to the next round — or ends the game when at most one player is
/// left standing. Called while RUNNING, right after `begin` or a round tick.
fn advance_or_finish(state: &mut GameState, tx: &broadcast::Sender<GameEvent>) {
    if state.roster.alive_count() <= 1 {
        state.session.finish();
        tracing::info!("game over after round {}", state.session.round());
        state.broadcast_state(tx);
        return;
    }

    state.roster.clear_round_flags();
    let cmd = pick_command(&state.commands);
    let arm = state.session.advance_round(cmd.clone());
    arm_round_timer(state, arm);

    // blocks still in the game get the command directly
    let round_msg = ServerMsg::Round {
        round: state.session.round(),
        cmd,
        window_ms: arm.window.as_millis() as u64,
    };
    for client in &state.clients {
        if let ClientKind::Block { block_id } = &client.kind {
            let eligible = state
                .roster
                .get(block_id)
                .is_some_and(|p| p.in_game && p.connected);
            if eligible {
                state.send_to(tx, &client.socket_id, round_msg.clone());
            }
        }
    }

    state.broadcast_state(tx);
}

/// Sleeps out the round window on a side task and re-enqueues the tick as a
/// command, so the timer can never mutate state off the session task. The
/// generation tag lets the session discard the tick if anything cancelled it
/// in the meantime.
fn arm_round_timer(state: &GameState, arm: Arm) {
    let cmd_tx = state.cmd_tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(arm.window).await;
        let _ = cmd_tx
            .send(GameCommand::Tick {
                generation: arm.generation,
            })
            .await;
    });
}

fn pick_command(commands: &[String]) -> String {
    if commands.is_empty() {
        return String::new();
    }
    let mut rng = rand::rng();
    commands[rng.random_range(0..commands.len())].clone()
}
