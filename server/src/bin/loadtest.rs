//! Load test for the asteroids server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect and join with a generated name
//! - Periodically send random steering/thrust/fire input
//! - Receive and count game_state broadcasts
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 8)
//!   --duration S     Test duration in seconds (default: 30)
//!   --input-rate R   Input messages per second per client (default: 10)
//!   --tick-rate HZ   Server tick rate used for the delivery estimate (default: 60)
//!   --url URL        Server URL (default: ws://127.0.0.1:8081/ws)

use asteroids_shared::protocol::{ClientMsg, InputData, ServerMsg};
use futures_util::{SinkExt, StreamExt};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    joined: AtomicU64,
    rejected: AtomicU64,
    messages_received: AtomicU64,
    game_states_received: AtomicU64,
    inputs_sent: AtomicU64,
    errors: AtomicU64,
    total_asteroids_seen: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

fn random_input(rng: &mut impl Rng) -> InputData {
    InputData {
        rotation: Some(rng.gen_range(-1..=1)),
        thrust: Some(rng.gen_bool(0.4)),
        fire: rng.gen_bool(0.3),
    }
}

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    input_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();

    let (mut ws, _) = match connect_async(&url).await {
        Ok(conn) => conn,
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

    let join = ClientMsg::Join {
        player_name: format!("bot-{}", client_id),
    };
    let Ok(json) = serde_json::to_string(&join) else {
        return;
    };
    if ws.send(Message::Text(json.into())).await.is_err() {
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }

    // Wait for the join reply before sending input
    let join_reply = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            };
            metrics.messages_received.fetch_add(1, Ordering::Relaxed);
            match serde_json::from_str::<ServerMsg>(&text) {
                Ok(ServerMsg::Welcome(_)) => return Some(true),
                Ok(ServerMsg::JoinRejected { reason }) => {
                    if client_id < 3 {
                        eprintln!("Client {} rejected: {}", client_id, reason);
                    }
                    return Some(false);
                }
                _ => {}
            }
        }
        None
    })
    .await;

    match join_reply {
        Ok(Some(true)) => {
            metrics.joined.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Some(false)) => {
            metrics.rejected.fetch_add(1, Ordering::Relaxed);
            metrics.connected.fetch_sub(1, Ordering::Relaxed);
            let _ = ws.close(None).await;
            return;
        }
        Ok(None) | Err(_) => {
            if client_id < 3 {
                eprintln!("Client {} got no join reply", client_id);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            metrics.connected.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    }

    let input_interval = if input_rate > 0.0 {
        Duration::from_secs_f64(1.0 / input_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };

    let mut input_timer = tokio::time::interval(input_interval);
    input_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let test_end = Instant::now() + duration;
    let mut rng = ChaCha8Rng::seed_from_u64(client_id as u64 * 12345 + 67890);

    loop {
        if Instant::now() >= test_end {
            break;
        }

        tokio::select! {
            _ = input_timer.tick() => {
                let msg = ClientMsg::Input { data: random_input(&mut rng) };
                let Ok(json) = serde_json::to_string(&msg) else {
                    continue;
                };
                if ws.send(Message::Text(json.into())).await.is_ok() {
                    metrics.inputs_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        let parsed = serde_json::from_str::<ServerMsg>(&text);
                        if let Ok(ServerMsg::GameState { data, .. }) = parsed {
                            metrics.game_states_received.fetch_add(1, Ordering::Relaxed);
                            metrics
                                .total_asteroids_seen
                                .fetch_add(data.asteroids.len() as u64, Ordering::Relaxed);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(_)) => {}
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

    let mut num_clients: u32 = 8;
    let mut duration_secs: u64 = 30;
    let mut input_rate: f64 = 10.0;
    let mut tick_rate: f64 = 60.0;
    let mut url = "ws://127.0.0.1:8081/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(8);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--input-rate" => {
                i += 1;
                input_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(10.0);
            }
            "--tick-rate" => {
                i += 1;
                tick_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(60.0);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Asteroids Server Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("Input rate: {}/s per client", input_rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(num_clients as usize);
    let spawn_start = Instant::now();

    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);

        handles.push(tokio::spawn(async move {
            run_client(client_id, url, input_rate, duration, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
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
                "[{:3}s] connected={}, joined={}, msgs={}, game_states={}, inputs={}, errors={}",
                elapsed,
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.joined.load(Ordering::Relaxed),
                metrics_clone.messages_received.load(Ordering::Relaxed),
                metrics_clone.game_states_received.load(Ordering::Relaxed),
                metrics_clone.inputs_sent.load(Ordering::Relaxed),
                metrics_clone.errors.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }

    stats_handle.abort();

    println!();
    println!("=== Final Results ===");
    let joined = metrics.joined.load(Ordering::Relaxed);
    let msgs = metrics.messages_received.load(Ordering::Relaxed);
    let game_states = metrics.game_states_received.load(Ordering::Relaxed);
    let asteroids = metrics.total_asteroids_seen.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Joined: {}", joined);
    println!("Rejected (server full): {}", metrics.rejected.load(Ordering::Relaxed));
    println!("Total messages received: {}", msgs);
    println!("Total game_state messages: {}", game_states);
    println!("Total input sent: {}", metrics.inputs_sent.load(Ordering::Relaxed));
    println!("Total errors: {}", metrics.errors.load(Ordering::Relaxed));
    if game_states > 0 {
        println!("Average asteroids on field: {}", asteroids / game_states);
    }
    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }

    if joined > 0 {
        let expected = duration_secs as f64 * tick_rate;
        let per_client = game_states as f64 / joined as f64;
        println!();
        println!("Messages/sec (total): {:.0}", msgs as f64 / duration_secs as f64);
        println!("Game states per client: {:.1}", per_client);
        println!("Expected game states per client: {:.1}", expected);
        println!("Delivery rate: {:.1}%", per_client / expected * 100.0);
    }
}
