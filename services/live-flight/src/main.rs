use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State as AxumState;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use skymultiplier_execution::{
    BetSessionController, GeneratorConfig, HouseLedger, InMemoryHistory, Ledger, SessionError,
    SettlementResult,
};
use skymultiplier_types::{Mode, RoundSnapshot, RoundStatus, STALL_TIMEOUT_MS, TICK_INTERVAL_MS};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time;
use tracing::{info, warn};

#[derive(Clone, Debug)]
struct LiveFlightConfig {
    tick_ms: u64,
    stall_timeout_ms: u64,
    default_balance_cents: u64,
    table_seed: u64,
}

impl LiveFlightConfig {
    fn from_env() -> Self {
        Self {
            tick_ms: read_u64("LIVE_FLIGHT_TICK_MS", TICK_INTERVAL_MS),
            stall_timeout_ms: read_u64("LIVE_FLIGHT_STALL_TIMEOUT_MS", STALL_TIMEOUT_MS),
            default_balance_cents: read_u64("LIVE_FLIGHT_DEFAULT_BALANCE_CENTS", 100_000),
            table_seed: read_u64("LIVE_FLIGHT_TABLE_SEED", 42),
        }
    }
}

fn read_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

#[derive(Debug)]
enum LiveFlightError {
    NotSubscribed,
    RoundInProgress,
    NoActiveRound,
    Session(SessionError),
}

impl From<SessionError> for LiveFlightError {
    fn from(value: SessionError) -> Self {
        LiveFlightError::Session(value)
    }
}

struct FlightDeck {
    config: LiveFlightConfig,
    controller: BetSessionController<HouseLedger, InMemoryHistory>,
    round_by_player: HashMap<String, u64>,
    epoch: Instant,
}

impl FlightDeck {
    fn new(config: LiveFlightConfig) -> Self {
        let controller = BetSessionController::new(
            HouseLedger::new(),
            InMemoryHistory::new(),
            GeneratorConfig::default(),
            config.table_seed,
        )
        .expect("default generator config is valid");
        Self {
            config,
            controller,
            round_by_player: HashMap::new(),
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    async fn handle_join(
        &mut self,
        player_id: &str,
        balance_cents: Option<u64>,
    ) -> Result<BalanceMessage, LiveFlightError> {
        if self.controller.ledger().balance(player_id).await.is_err() {
            let opening = balance_cents.unwrap_or(self.config.default_balance_cents);
            self.controller.ledger_mut().open_account(player_id, opening);
        }
        self.balance_message(player_id).await
    }

    fn handle_leave(&mut self, player_id: &str) {
        // The round, if any, keeps flying server-side; the tick loop settles
        // it when it terminates.
        self.round_by_player.remove(player_id);
    }

    async fn handle_start(
        &mut self,
        player_id: &str,
        stake_cents: u64,
        mode: Mode,
    ) -> Result<FlightStateMessage, LiveFlightError> {
        if let Some(&round_id) = self.round_by_player.get(player_id) {
            if self.controller.round(round_id).is_some() {
                return Err(LiveFlightError::RoundInProgress);
            }
            self.round_by_player.remove(player_id);
        }

        let now_ms = self.now_ms();
        let round_id = self
            .controller
            .start_round(player_id, stake_cents, mode, now_ms)
            .await?;
        self.round_by_player.insert(player_id.to_string(), round_id);

        let snapshot = self.controller.snapshot(round_id)?;
        Ok(self.state_message(snapshot))
    }

    async fn handle_cash_out(
        &mut self,
        player_id: &str,
    ) -> Result<FlightStateMessage, LiveFlightError> {
        let round_id = *self
            .round_by_player
            .get(player_id)
            .ok_or(LiveFlightError::NoActiveRound)?;
        let snapshot = self.controller.cash_out(round_id)?;
        Ok(self.state_message(snapshot))
    }

    async fn tick(&mut self) -> Vec<OutboundEvent> {
        let now_ms = self.now_ms();
        let mut events = Vec::new();

        // Safety net: rounds that somehow fell off the tick path still get
        // resolved rather than holding their debit open.
        self.controller
            .reap_stalled(now_ms, self.config.stall_timeout_ms);

        for round_id in self.controller.active_round_ids() {
            match self.controller.tick_round(round_id, now_ms) {
                Ok(snapshot) => {
                    if let Some(player_id) = self.player_for(round_id) {
                        events.push(OutboundEvent::State {
                            player_id: Some(player_id.clone()),
                            payload: self.state_message(snapshot),
                        });
                    }
                }
                Err(err) => warn!(round_id, ?err, "tick failed"),
            }
        }

        // Settle every terminal round; transient ledger failures retry on
        // the next tick with the same round id.
        for round_id in self.controller.unsettled_round_ids() {
            match self.controller.settle(round_id, now_ms).await {
                Ok(result) => {
                    if let Some(player_id) = self.player_for(round_id) {
                        events.push(OutboundEvent::Result {
                            player_id: player_id.clone(),
                            payload: result_message(&result),
                        });
                        self.round_by_player.remove(&player_id);
                    }
                    self.controller.release(round_id);
                }
                Err(SessionError::AlreadySettled) => self.controller.release(round_id),
                Err(err) => warn!(round_id, ?err, "settlement deferred, will retry"),
            }
        }

        events
    }

    fn player_for(&self, round_id: u64) -> Option<String> {
        self.round_by_player
            .iter()
            .find(|(_, &id)| id == round_id)
            .map(|(player, _)| player.clone())
    }

    fn state_message(&self, snapshot: RoundSnapshot) -> FlightStateMessage {
        FlightStateMessage {
            msg_type: "flight_state",
            round: snapshot,
        }
    }

    async fn balance_message(&self, player_id: &str) -> Result<BalanceMessage, LiveFlightError> {
        let real_cents = self
            .controller
            .ledger()
            .balance(player_id)
            .await
            .map_err(|_| LiveFlightError::NotSubscribed)?;
        let practice_cents = self
            .controller
            .practice_ledger()
            .balance(player_id)
            .await
            .map_err(|err| LiveFlightError::Session(SessionError::Ledger(err)))?;
        Ok(BalanceMessage {
            msg_type: "balance",
            real_cents,
            practice_cents,
        })
    }
}

fn result_message(result: &SettlementResult) -> FlightResultMessage {
    FlightResultMessage {
        msg_type: "flight_result",
        round_id: result.round_id,
        outcome: result.outcome,
        cashout_multiplier: result.cashout_bps as f64 / 10_000.0,
        payout_cents: result.payout_cents,
        balance_cents: result.new_balance_cents,
    }
}

#[derive(Clone, Debug, Serialize)]
struct FlightStateMessage {
    #[serde(rename = "type")]
    msg_type: &'static str,
    round: RoundSnapshot,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlightResultMessage {
    #[serde(rename = "type")]
    msg_type: &'static str,
    round_id: u64,
    outcome: RoundStatus,
    cashout_multiplier: f64,
    payout_cents: u64,
    balance_cents: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceMessage {
    #[serde(rename = "type")]
    msg_type: &'static str,
    real_cents: u64,
    practice_cents: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
enum OutboundEvent {
    #[serde(rename = "state")]
    State {
        #[serde(rename = "playerId", skip_serializing_if = "Option::is_none")]
        player_id: Option<String>,
        payload: FlightStateMessage,
    },
    #[serde(rename = "result")]
    Result {
        #[serde(rename = "playerId")]
        player_id: String,
        payload: FlightResultMessage,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum InboundMessage {
    #[serde(rename = "join")]
    Join {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "playerId")]
        player_id: String,
        #[serde(rename = "balanceCents")]
        balance_cents: Option<u64>,
    },
    #[serde(rename = "leave")]
    Leave {
        #[serde(rename = "requestId")]
        request_id: Option<String>,
        #[serde(rename = "playerId")]
        player_id: String,
    },
    #[serde(rename = "start")]
    Start {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "playerId")]
        player_id: String,
        #[serde(rename = "stakeCents")]
        stake_cents: u64,
        mode: Mode,
    },
    #[serde(rename = "cashOut")]
    CashOut {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "playerId")]
        player_id: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum OutboundResponse {
    #[serde(rename = "ack")]
    Ack {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "requestId")]
        request_id: String,
        code: String,
        message: String,
    },
}

#[derive(Clone)]
struct AppState {
    deck: Arc<Mutex<FlightDeck>>,
    broadcaster: broadcast::Sender<OutboundEvent>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let mut broadcast_rx = state.broadcaster.subscribe();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let broadcast_task = {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Ok(event) = broadcast_rx.recv().await {
                if let Ok(payload) = serde_json::to_string(&event) {
                    let _ = tx.send(Message::Text(payload));
                }
            }
        })
    };

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                Ok(inbound) => {
                    handle_inbound(inbound, &state, &tx).await;
                }
                Err(err) => {
                    warn!(?err, "invalid inbound message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    write_task.abort();
    broadcast_task.abort();
}

async fn handle_inbound(
    inbound: InboundMessage,
    state: &AppState,
    tx: &mpsc::UnboundedSender<Message>,
) {
    match inbound {
        InboundMessage::Join {
            request_id,
            player_id,
            balance_cents,
        } => {
            let response = {
                let mut deck = state.deck.lock().await;
                match deck.handle_join(&player_id, balance_cents).await {
                    Ok(payload) => {
                        send_json(tx, &payload);
                        OutboundResponse::Ack { request_id }
                    }
                    Err(err) => error_response(request_id, err),
                }
            };
            send_json(tx, &response);
        }
        InboundMessage::Leave {
            request_id,
            player_id,
        } => {
            {
                let mut deck = state.deck.lock().await;
                deck.handle_leave(&player_id);
            }
            if let Some(request_id) = request_id {
                send_json(tx, &OutboundResponse::Ack { request_id });
            }
        }
        InboundMessage::Start {
            request_id,
            player_id,
            stake_cents,
            mode,
        } => {
            let response = {
                let mut deck = state.deck.lock().await;
                match deck.handle_start(&player_id, stake_cents, mode).await {
                    Ok(payload) => {
                        state
                            .broadcaster
                            .send(OutboundEvent::State {
                                player_id: Some(player_id.clone()),
                                payload,
                            })
                            .ok();
                        OutboundResponse::Ack { request_id }
                    }
                    Err(err) => error_response(request_id, err),
                }
            };
            send_json(tx, &response);
        }
        InboundMessage::CashOut {
            request_id,
            player_id,
        } => {
            let response = {
                let mut deck = state.deck.lock().await;
                match deck.handle_cash_out(&player_id).await {
                    Ok(payload) => {
                        state
                            .broadcaster
                            .send(OutboundEvent::State {
                                player_id: Some(player_id.clone()),
                                payload,
                            })
                            .ok();
                        OutboundResponse::Ack { request_id }
                    }
                    Err(err) => error_response(request_id, err),
                }
            };
            send_json(tx, &response);
        }
    }
}

fn send_json<T: Serialize>(tx: &mpsc::UnboundedSender<Message>, value: &T) {
    if let Ok(payload) = serde_json::to_string(value) {
        let _ = tx.send(Message::Text(payload));
    }
}

fn error_response(request_id: String, err: LiveFlightError) -> OutboundResponse {
    let (code, message) = match err {
        LiveFlightError::NotSubscribed => ("NOT_SUBSCRIBED".to_string(), "NOT_SUBSCRIBED".to_string()),
        LiveFlightError::RoundInProgress => (
            "ROUND_IN_PROGRESS".to_string(),
            "finish the current round first".to_string(),
        ),
        LiveFlightError::NoActiveRound => (
            "NO_ACTIVE_ROUND".to_string(),
            "no round in flight".to_string(),
        ),
        LiveFlightError::Session(err) => {
            let code = match &err {
                SessionError::InvalidStake(_) => "INVALID_STAKE",
                SessionError::InsufficientFunds => "INSUFFICIENT_FUNDS",
                SessionError::AccountSuspended => "ACCOUNT_SUSPENDED",
                SessionError::NotActive => "TOO_LATE",
                SessionError::AlreadySettled => "ALREADY_SETTLED",
                SessionError::Generation(_) => "TRY_AGAIN",
                _ => "INTERNAL",
            };
            (code.to_string(), err.to_string())
        }
    };
    OutboundResponse::Error {
        request_id,
        code,
        message,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let host = std::env::var("LIVE_FLIGHT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("LIVE_FLIGHT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9124);

    let config = LiveFlightConfig::from_env();
    let tick_ms = config.tick_ms;
    let deck = Arc::new(Mutex::new(FlightDeck::new(config)));
    let (broadcaster, _) = broadcast::channel::<OutboundEvent>(1024);

    let state = AppState {
        deck: deck.clone(),
        broadcaster: broadcaster.clone(),
    };

    // Tick loop: the interval only re-arms after the previous tick's state
    // mutation completes, so no two ticks for one round ever interleave.
    let tick_deck = deck.clone();
    let tick_broadcaster = broadcaster.clone();
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_millis(tick_ms));
        loop {
            interval.tick().await;
            let events = {
                let mut deck = tick_deck.lock().await;
                deck.tick().await
            };
            for event in events {
                let _ = tick_broadcaster.send(event);
            }
        }
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}").parse().context("invalid listen addr")?;
    info!(%addr, "live flight service listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}
