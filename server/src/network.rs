//! Server network layer handling UDP communications and room dispatch

use crate::broadcast::Dispatch;
use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::registry::RoomRegistry;
use crate::scheduler::TickRequest;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerId, CLIENT_VERSION, MAX_NAME_LEN, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: PlayerId },
    Shutdown,
}

/// Messages sent from the server loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    Deliver {
        packet: Packet,
        recipients: Vec<PlayerId>,
    },
}

/// Main server: owns the room registry and serialises every room mutation
/// and every tick on one loop.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    registry: RoomRegistry,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
    tick_rx: mpsc::UnboundedReceiver<TickRequest>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            registry: RoomRegistry::new(config.rules, tick_tx),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
            tick_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Sender for injecting messages such as `Shutdown` into the loop.
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::Deliver { packet, recipients } => {
                        let targets = {
                            let clients_guard = clients.read().await;
                            clients_guard.addrs_for(&recipients)
                        };
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode packet: {}", e);
                                continue;
                            }
                        };

                        for (client_id, addr) in targets {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Queues everything a room operation produced for delivery.
    fn dispatch(&self, out: Vec<Dispatch>) {
        for Dispatch { recipients, packet } in out {
            if recipients.is_empty() {
                continue;
            }
            if let Err(e) = self.game_tx.send(GameMessage::Deliver { packet, recipients }) {
                error!("Failed to queue packet for delivery: {}", e);
            }
        }
    }

    /// Processes incoming packets
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != CLIENT_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // Remove existing connection if present
                let existing_client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(existing_id) = existing_client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(&existing_id);
                    let out = self.registry.leave_room(existing_id);
                    self.dispatch(out);
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                let response = match client_id {
                    Some(client_id) => Packet::Connected { client_id },
                    None => Packet::Disconnected {
                        reason: "Server full".to_string(),
                    },
                };
                self.send_packet(response, addr);
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    self.clients.write().await.remove_client(&client_id);
                    let out = self.registry.leave_room(client_id);
                    self.dispatch(out);
                }
            }

            packet => {
                let client_id = self.clients.write().await.touch_addr(addr);
                match client_id {
                    Some(client_id) => {
                        let out = self.route(client_id, packet);
                        self.dispatch(out);
                    }
                    None => warn!("Dropping packet from unconnected address {}", addr),
                }
            }
        }
    }

    /// Hands a connected client's request to the room registry.
    fn route(&mut self, client_id: PlayerId, packet: Packet) -> Vec<Dispatch> {
        match packet {
            Packet::Heartbeat => Vec::new(),

            Packet::CreateRoom { player_name } => match validate_player_name(&player_name) {
                Ok(name) => self.registry.create_room(client_id, name),
                Err(message) => vec![Dispatch::to_player(
                    client_id,
                    Packet::Error {
                        message: message.to_string(),
                    },
                )],
            },

            Packet::JoinRoom {
                room_code,
                player_name,
            } => match validate_player_name(&player_name) {
                Ok(name) => self.registry.join_room(client_id, &room_code, name),
                Err(message) => vec![Dispatch::to_player(
                    client_id,
                    Packet::RoomJoined {
                        room_code,
                        success: false,
                        message: Some(message.to_string()),
                    },
                )],
            },

            Packet::StartGame => self.registry.start_game(client_id),
            Packet::MovePlayer { direction } => self.registry.move_player(client_id, direction),
            Packet::PlaceBomb => self.registry.place_bomb(client_id),
            Packet::ResetGame => self.registry.reset_game(client_id),
            Packet::LeaveRoom => self.registry.leave_room(client_id),

            other => {
                warn!("Unexpected packet from client {}: {:?}", client_id, other);
                Vec::new()
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            let out = self.registry.leave_room(client_id);
                            self.dispatch(out);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                Some(request) = self.tick_rx.recv() => {
                    let out = self.registry.tick(&request);
                    self.dispatch(out);
                },
            }
        }

        debug!("{} rooms open at shutdown", self.registry.room_count());
        Ok(())
    }
}

/// Trims a requested display name, rejecting blank or overlong ones.
pub fn validate_player_name(raw: &str) -> Result<String, &'static str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("Player name is required");
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err("Player name is too long");
    }
    Ok(name.to_string())
}
