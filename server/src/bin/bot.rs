//! Scripted arena client for exercising a running server.
//!
//! Connects, creates or joins a room, optionally starts the game and then
//! wanders around planting bombs until the game ends or time runs out.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Direction, Packet, PlayerId, CLIENT_VERSION, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, Duration, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Display name in the room
    #[clap(short, long, default_value = "bot")]
    name: String,
    /// Room code to join; a new room is created when omitted
    #[clap(short, long)]
    room: Option<String>,
    /// Send a start request once in the room
    #[clap(long)]
    start: bool,
    /// Milliseconds between actions
    #[clap(long, default_value = "250")]
    action_ms: u64,
    /// Chance of planting a bomb instead of moving
    #[clap(long, default_value = "0.15")]
    bomb_chance: f64,
    /// Seconds before the bot disconnects
    #[clap(short, long, default_value = "60")]
    duration: u64,
}

async fn send(
    socket: &UdpSocket,
    server: SocketAddr,
    packet: &Packet,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&serialize(packet)?, server).await?;
    Ok(())
}

async fn recv(socket: &UdpSocket, buf: &mut [u8]) -> Result<Packet, Box<dyn std::error::Error>> {
    let (len, _) = socket.recv_from(buf).await?;
    Ok(deserialize(&buf[..len])?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Bot socket bound to {}", socket.local_addr()?);

    let mut buf = vec![0u8; MAX_PACKET_SIZE];

    send(
        &socket,
        args.server,
        &Packet::Connect {
            client_version: CLIENT_VERSION,
        },
    )
    .await?;

    let client_id: PlayerId =
        match timeout(Duration::from_secs(3), recv(&socket, &mut buf)).await?? {
            Packet::Connected { client_id } => client_id,
            Packet::Disconnected { reason } => {
                return Err(format!("Connection refused: {}", reason).into())
            }
            other => return Err(format!("Unexpected handshake reply: {:?}", other).into()),
        };
    info!("Connected as client {}", client_id);

    let request = match &args.room {
        Some(code) => Packet::JoinRoom {
            room_code: code.clone(),
            player_name: args.name.clone(),
        },
        None => Packet::CreateRoom {
            player_name: args.name.clone(),
        },
    };
    send(&socket, args.server, &request).await?;

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut actions = interval(Duration::from_millis(args.action_ms));
    let mut heartbeat = interval(Duration::from_secs(1));
    let mut in_room = false;
    let mut start_sent = false;

    loop {
        tokio::select! {
            received = recv(&socket, &mut buf) => {
                match received {
                    Ok(Packet::RoomCreated { room_code }) => {
                        info!("Created room {}", room_code);
                        in_room = true;
                    }
                    Ok(Packet::RoomJoined { room_code, success, message }) => {
                        if success {
                            info!("Joined room {}", room_code);
                            in_room = true;
                        } else {
                            warn!("Join refused: {}", message.unwrap_or_default());
                            break;
                        }
                    }
                    Ok(Packet::PlayerJoined { players, .. }) => {
                        info!("{} players in room", players.len());
                        if args.start && !start_sent && players.len() >= shared::MIN_PLAYERS_TO_START {
                            send(&socket, args.server, &Packet::StartGame).await?;
                            start_sent = true;
                        }
                    }
                    Ok(Packet::GameState(snapshot)) => {
                        debug!(
                            "bombs={} explosions={} power_ups={}",
                            snapshot.bombs.len(),
                            snapshot.explosions.len(),
                            snapshot.power_ups.len()
                        );
                        if snapshot.game_over {
                            match snapshot.winner {
                                Some(winner) if winner == client_id => info!("Won the game"),
                                Some(winner) => info!("Player {} won the game", winner),
                                None => info!("Game ended in a draw"),
                            }
                            break;
                        }
                    }
                    Ok(Packet::Error { message }) => warn!("Server error: {}", message),
                    Ok(Packet::Disconnected { reason }) => {
                        warn!("Disconnected: {}", reason);
                        return Ok(());
                    }
                    Ok(other) => debug!("Received {:?}", other),
                    Err(e) => warn!("Failed to read packet: {}", e),
                }
            }

            _ = actions.tick(), if in_room => {
                let packet = {
                    let mut rng = rand::thread_rng();
                    if rng.gen_bool(args.bomb_chance.clamp(0.0, 1.0)) {
                        Packet::PlaceBomb
                    } else {
                        let direction = *Direction::ALL.choose(&mut rng).unwrap_or(&Direction::Up);
                        Packet::MovePlayer { direction }
                    }
                };
                send(&socket, args.server, &packet).await?;
            }

            _ = heartbeat.tick() => {
                send(&socket, args.server, &Packet::Heartbeat).await?;
            }

            _ = tokio::time::sleep_until(deadline) => {
                info!("Time is up");
                break;
            }
        }
    }

    send(&socket, args.server, &Packet::Disconnect).await?;
    Ok(())
}
