//! Load test for the pong server.
//!
//! Spawns pairs of fake WebSocket clients. In every pair:
//! - the host creates a room and the guest joins it by code
//! - both ready up, the host serves and re-serves after every point
//! - both send paddle moves and count game_state broadcasts
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --pairs N        Number of rooms to fill (default: 50)
//!   --duration S     Test duration in seconds (default: 30)
//!   --move-rate R    Paddle moves per second per client (default: 5)
//!   --url URL        Server URL (default: ws://127.0.0.1:3001/ws)

use futures_util::{SinkExt, StreamExt};
use pong_shared::protocol::{
    ClientMsg, Direction, JoinRoomMsg, PaddleMoveMsg, PlayerReadyMsg, ServerMsg, Side,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type Ws = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// === Metrics ===

struct Metrics {
    connected: AtomicU64,
    rooms_started: AtomicU64,
    messages_received: AtomicU64,
    game_states_received: AtomicU64,
    points_scored: AtomicU64,
    moves_sent: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        Self {
            connected: AtomicU64::new(0),
            rooms_started: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            game_states_received: AtomicU64::new(0),
            points_scored: AtomicU64::new(0),
            moves_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }
}

async fn send(ws: &mut Ws, msg: &ClientMsg) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => ws.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => false,
    }
}

/// Next server message, or `None` if the socket ended.
async fn next_msg(ws: &mut Ws, metrics: &Metrics) -> Option<ServerMsg> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                match serde_json::from_str(&text) {
                    Ok(msg) => return Some(msg),
                    Err(_) => {
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            _ => {}
        }
    }
    None
}

/// Skip messages until `pick` accepts one or five seconds pass.
async fn expect<T>(
    ws: &mut Ws,
    metrics: &Metrics,
    mut pick: impl FnMut(ServerMsg) -> Option<T>,
) -> Option<T> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = next_msg(ws, metrics).await {
            if let Some(v) = pick(msg) {
                return Some(v);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

// === Client task ===

enum Role {
    Host(oneshot::Sender<String>),
    Guest(oneshot::Receiver<String>),
}

async fn run_client(
    client_id: u32,
    url: String,
    role: Role,
    move_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();
    let mut ws = match connect_async(&url).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };
    metrics
        .latency_sum_ms
        .fetch_add(connect_start.elapsed().as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    let player_id = expect(&mut ws, &metrics, |m| match m {
        ServerMsg::Welcome(w) => Some(w.player_id),
        _ => None,
    })
    .await;
    let Some(player_id) = player_id else {
        eprintln!("Client {} got no welcome", client_id);
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    };

    let is_host = matches!(role, Role::Host(_));
    let assigned = match role {
        Role::Host(code_tx) => {
            send(&mut ws, &ClientMsg::CreateRoom).await;
            let created = expect(&mut ws, &metrics, |m| match m {
                ServerMsg::RoomCreated(r) => Some((r.room_code, r.side)),
                _ => None,
            })
            .await;
            if let Some((code, _)) = &created {
                let _ = code_tx.send(code.clone());
            }
            created
        }
        Role::Guest(code_rx) => match code_rx.await {
            Ok(code) => {
                send(
                    &mut ws,
                    &ClientMsg::JoinRoom(JoinRoomMsg {
                        room_code: code.clone(),
                    }),
                )
                .await;
                expect(&mut ws, &metrics, |m| match m {
                    ServerMsg::RoomJoined(r) => Some((r.room_code, r.side)),
                    _ => None,
                })
                .await
            }
            Err(_) => None,
        },
    };
    let Some((room_code, side)) = assigned else {
        if client_id < 5 {
            eprintln!("Client {} never got a room", client_id);
        }
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    };

    send(
        &mut ws,
        &ClientMsg::PlayerReady(PlayerReadyMsg {
            room_code,
            player_id,
        }),
    )
    .await;
    let started = expect(&mut ws, &metrics, |m| {
        matches!(m, ServerMsg::GameStarted).then_some(())
    })
    .await;
    if started.is_none() {
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }
    if is_host {
        metrics.rooms_started.fetch_add(1, Ordering::Relaxed);
        send(&mut ws, &ClientMsg::StartGame).await;
    }

    let move_interval = if move_rate > 0.0 {
        Duration::from_secs_f64(1.0 / move_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut move_timer = tokio::time::interval(move_interval);
    move_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let test_end = Instant::now() + duration;
    let mut going_up = side == Side::Left;

    loop {
        if Instant::now() >= test_end {
            break;
        }

        tokio::select! {
            _ = move_timer.tick() => {
                going_up = !going_up;
                let direction = if going_up { Direction::Up } else { Direction::Down };
                if send(&mut ws, &ClientMsg::PaddleMove(PaddleMoveMsg { side, direction })).await {
                    metrics.moves_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = next_msg(&mut ws, &metrics) => {
                match msg {
                    Some(ServerMsg::GameState(_)) => {
                        metrics.game_states_received.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(ServerMsg::PointScored(_)) => {
                        if is_host {
                            metrics.points_scored.fetch_add(1, Ordering::Relaxed);
                            send(&mut ws, &ClientMsg::StartGame).await;
                        }
                    }
                    Some(ServerMsg::Error(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} got error: {}", client_id, e.message);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(ServerMsg::RoomClosed(_)) | None => break,
                    Some(_) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_pairs: u32 = 50;
    let mut duration_secs: u64 = 30;
    let mut move_rate: f64 = 5.0;
    let mut url = "ws://127.0.0.1:3001/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--pairs" => {
                i += 1;
                num_pairs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(50);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--move-rate" => {
                i += 1;
                move_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(5.0);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Pong Server Load Test ===");
    println!("Pairs: {} ({} clients)", num_pairs, num_pairs * 2);
    println!("Duration: {}s", duration_secs);
    println!("Move rate: {}/s per client", move_rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::new());
    let duration = Duration::from_secs(duration_secs);
    let mut handles = Vec::with_capacity(num_pairs as usize * 2);

    println!("Spawning {} pairs...", num_pairs);
    let spawn_start = Instant::now();

    for pair in 0..num_pairs {
        let (code_tx, code_rx) = oneshot::channel();
        for (client_id, role) in [
            (pair * 2, Role::Host(code_tx)),
            (pair * 2 + 1, Role::Guest(code_rx)),
        ] {
            let url = url.clone();
            let metrics = Arc::clone(&metrics);
            handles.push(tokio::spawn(async move {
                run_client(client_id, url, role, move_rate, duration, metrics).await;
            }));
        }

        // Stagger spawns slightly to avoid thundering herd
        if pair % 25 == 24 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();

        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            if elapsed >= duration_secs + 5 {
                break;
            }

            println!(
                "[{:3}s] connected={}, rooms={}, msgs={}, game_states={}, points={}, moves={}, errors={}",
                elapsed,
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.rooms_started.load(Ordering::Relaxed),
                metrics_clone.messages_received.load(Ordering::Relaxed),
                metrics_clone.game_states_received.load(Ordering::Relaxed),
                metrics_clone.points_scored.load(Ordering::Relaxed),
                metrics_clone.moves_sent.load(Ordering::Relaxed),
                metrics_clone.errors.load(Ordering::Relaxed),
            );
        }
    });

    // Wait for all clients to finish
    for handle in handles {
        let _ = handle.await;
    }

    stats_handle.abort();

    // Final stats
    println!();
    println!("=== Final Results ===");
    let msgs = metrics.messages_received.load(Ordering::Relaxed);
    let game_states = metrics.game_states_received.load(Ordering::Relaxed);
    let rooms = metrics.rooms_started.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Rooms started: {}/{}", rooms, num_pairs);
    println!("Total messages received: {}", msgs);
    println!("Total game_state messages: {}", game_states);
    println!("Total points scored: {}", metrics.points_scored.load(Ordering::Relaxed));
    println!("Total paddle moves sent: {}", metrics.moves_sent.load(Ordering::Relaxed));
    println!("Total errors: {}", metrics.errors.load(Ordering::Relaxed));

    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }

    let clients = (num_pairs as f64 * 2.0).max(1.0);
    let states_per_client = game_states as f64 / clients;
    // Server default is 60 Hz
    let expected = duration_secs as f64 * 60.0;

    println!();
    println!("Messages/sec (total): {:.0}", msgs as f64 / duration_secs.max(1) as f64);
    println!("Game states per client: {:.1}", states_per_client);
    println!("Expected game states per client: {:.1}", expected);
    if expected > 0.0 {
        println!("Delivery rate: {:.1}%", states_per_client / expected * 100.0);
    }
}
