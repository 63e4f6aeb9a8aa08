use std::collections::{hash_map, HashMap};
use std::ops;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use instant::Instant;
use log::{info, warn};

use crate::board::{TurnError, TurnOutcome};
use crate::cards::CardRegistry;
use crate::clock::TimeControl;
use crate::coord::Coord;
use crate::event::{game_over_event, ClientEvent, RejectionReason, ServerEvent};
use crate::force::Force;
use crate::game::{GameError, GameState};
use crate::matchmaking::MatchmakingQueue;
use crate::player::{PlayerId, Seat};


#[derive(Debug)]
pub enum IncomingEvent {
    Network(ClientId, ClientEvent),
    Tick,
    Disconnect(ClientId),
}

#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub time_control: TimeControl,
    // How long a dropped player may reconnect before forfeiting.
    pub reconnect_grace: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            time_control: TimeControl::default(),
            reconnect_grace: Duration::from_secs(60),
        }
    }
}


// u64 rather than usize: the id is random and `rand` only samples sized
// integer types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ClientId(u64);

pub struct Client {
    events_tx: mpsc::Sender<ServerEvent>,
    player_id: Option<PlayerId>,
    room_id: Option<String>,
}

impl Client {
    fn send(&self, event: ServerEvent) {
        // A send failure means the writer already hung up; the disconnect
        // event is on its way.
        if self.events_tx.send(event).is_err() {
            warn!("Dropped event for a disconnected client");
        }
    }
}

pub struct Clients {
    map: HashMap<ClientId, Client>,
}

impl Clients {
    pub fn new() -> Self { Self { map: HashMap::new() } }

    pub fn add_client(&mut self, events_tx: mpsc::Sender<ServerEvent>) -> ClientId {
        let client = Client { events_tx, player_id: None, room_id: None };
        loop {
            let id = ClientId(rand::random());
            match self.map.entry(id) {
                hash_map::Entry::Occupied(_) => {}
                hash_map::Entry::Vacant(e) => {
                    e.insert(client);
                    return id;
                }
            }
        }
    }

    fn remove_client(&mut self, id: ClientId) -> Option<Client> { self.map.remove(&id) }

    fn send_to(&self, id: ClientId, event: ServerEvent) {
        if let Some(client) = self.map.get(&id) {
            client.send(event);
        }
    }

    fn find_player(&self, player_id: &str) -> Option<ClientId> {
        self.map
            .iter()
            .find(|(_, client)| client.player_id.as_deref() == Some(player_id))
            .map(|(&id, _)| id)
    }
}

impl ops::Index<ClientId> for Clients {
    type Output = Client;
    fn index(&self, id: ClientId) -> &Self::Output { &self.map[&id] }
}
impl ops::IndexMut<ClientId> for Clients {
    fn index_mut(&mut self, id: ClientId) -> &mut Self::Output {
        self.map.get_mut(&id).expect("client unregistered while in use")
    }
}


#[derive(Debug)]
struct Member {
    seat: Seat,
    client: Option<ClientId>,
    // Set while the member is disconnected but still within grace.
    reconnect_deadline: Option<Instant>,
}

#[derive(Debug)]
struct Room {
    game: GameState,
    cards: CardRegistry,
    members: HashMap<PlayerId, Member>,
    // Clock charging point; the single place wall time enters the game.
    last_update: Instant,
}

impl Room {
    fn new(time_control: TimeControl, now: Instant) -> Self {
        Room {
            game: GameState::new(time_control),
            cards: CardRegistry::new(),
            members: HashMap::new(),
            last_update: now,
        }
    }

    fn players_count(&self) -> usize {
        self.members.values().filter(|m| m.client.is_some()).count()
    }

    fn free_seat(&self) -> Seat {
        let occupied = |seat| self.members.values().any(|m| m.seat == seat);
        if !occupied(Seat::White) {
            Seat::White
        } else if !occupied(Seat::Black) {
            Seat::Black
        } else {
            Seat::Observer
        }
    }

    fn init_event(&self, seat: Seat) -> ServerEvent {
        ServerEvent::Init {
            color: seat,
            board: self.game.grid().clone(),
            current_player: self.game.active_force(),
            custom_moves: self.cards.table().clone(),
            ability_cards: self.cards.cards().clone(),
            timers: self.game.timers(),
            players_count: self.players_count(),
            move_log: self.game.move_log().to_vec(),
            promotion_pending: self.game.promotion_pending(),
        }
    }
}

fn broadcast_room(clients: &Clients, room: &Room, event: &ServerEvent, except: Option<ClientId>) {
    for member in room.members.values() {
        if let Some(client_id) = member.client {
            if Some(client_id) != except {
                clients.send_to(client_id, event.clone());
            }
        }
    }
}

fn rejection(err: GameError) -> ServerEvent {
    let (reason, message) = match err {
        GameError::Turn(TurnError::IllegalMove) => {
            (RejectionReason::IllegalMove, "move is not legal")
        }
        GameError::Turn(TurnError::InvalidSelection) => {
            (RejectionReason::InvalidSelection, "no movable piece at the source square")
        }
        GameError::Turn(TurnError::PromotionPending) => {
            (RejectionReason::BadRequest, "a promotion choice is pending")
        }
        GameError::Turn(TurnError::NotPromotionTime) => {
            (RejectionReason::BadRequest, "no promotion is pending")
        }
        GameError::Turn(TurnError::InvalidPromotionTarget) => {
            (RejectionReason::BadRequest, "cannot promote to this piece")
        }
        GameError::Turn(TurnError::GameNotActive) | GameError::GameOver => {
            (RejectionReason::BadRequest, "the game is over")
        }
        GameError::NotYourTurn => (RejectionReason::NotYourTurn, "it is not your turn"),
        GameError::OfferAlreadyPending => {
            (RejectionReason::BadRequest, "an offer is already pending")
        }
        GameError::NoPendingOffer => (RejectionReason::BadRequest, "there is no pending offer"),
        GameError::NothingToUndo => (RejectionReason::BadRequest, "there is nothing to undo"),
    };
    ServerEvent::Rejection { reason, message: message.to_owned() }
}


pub struct ServerState {
    clients: Arc<Mutex<Clients>>,
    rooms: HashMap<String, Room>,
    queue: MatchmakingQueue,
    options: ServerOptions,
}

impl ServerState {
    pub fn new(clients: Arc<Mutex<Clients>>, options: ServerOptions) -> Self {
        ServerState {
            clients,
            rooms: HashMap::new(),
            queue: MatchmakingQueue::new(),
            options,
        }
    }

    // The single entry point. Every network message, every tick and every
    // disconnect passes through here, which is what keeps room state
    // single-writer without any per-room locking.
    pub fn apply_event(&mut self, event: IncomingEvent) {
        let now = Instant::now();
        let clients = Arc::clone(&self.clients);
        let mut clients = clients.lock().expect("clients mutex poisoned");
        match event {
            IncomingEvent::Network(client_id, event) => {
                self.on_client_event(&mut clients, client_id, event, now);
            }
            IncomingEvent::Tick => self.on_tick(&mut clients, now),
            IncomingEvent::Disconnect(client_id) => {
                self.on_disconnect(&mut clients, client_id, now);
            }
        }
    }

    fn on_tick(&mut self, clients: &mut Clients, now: Instant) {
        for room in self.rooms.values_mut() {
            Self::charge_room(clients, room, now);
            Self::expire_members(clients, room, now);
        }
        // A room survives as long as somebody is connected or may still
        // reconnect within grace.
        self.rooms.retain(|room_id, room| {
            let alive = room
                .members
                .values()
                .any(|m| m.client.is_some() || m.reconnect_deadline.is_some());
            if !alive {
                info!("Dropping empty room {room_id}");
            }
            alive
        });
        self.run_matchmaking(clients, now);
    }

    // Charges the side to move; a flag fall becomes the terminal state and is
    // announced right here.
    fn charge_room(clients: &Clients, room: &mut Room, now: Instant) {
        let elapsed = now.saturating_duration_since(room.last_update);
        room.last_update = now;
        let was_active = room.game.is_active();
        room.game.charge_active(elapsed);
        if was_active && !room.game.is_active() {
            if let Some(event) = game_over_event(room.game.status()) {
                broadcast_room(clients, room, &event, None);
            }
        }
    }

    fn expire_members(clients: &mut Clients, room: &mut Room, now: Instant) {
        let expired: Vec<PlayerId> = room
            .members
            .iter()
            .filter(|(_, m)| m.reconnect_deadline.is_some_and(|deadline| deadline <= now))
            .map(|(player_id, _)| player_id.clone())
            .collect();
        for player_id in expired {
            let member = match room.members.remove(&player_id) {
                Some(member) => member,
                None => continue,
            };
            info!("Player {player_id} did not return within grace");
            if let Some(force) = member.seat.force() {
                if room.game.is_active() {
                    room.game.forfeit_by_abandonment(force);
                    if let Some(event) = game_over_event(room.game.status()) {
                        broadcast_room(clients, room, &event, None);
                    }
                }
            }
            let event = ServerEvent::PlayerLeft { players_count: room.players_count() };
            broadcast_room(clients, room, &event, None);
        }
    }

    fn run_matchmaking(&mut self, clients: &mut Clients, now: Instant) {
        let mut paired = false;
        while let Some((first, second)) = self.queue.pair(now) {
            paired = true;
            let room_id = self.fresh_room_id();
            for entry in [&first, &second] {
                if let Some(client_id) = clients.find_player(&entry.player_id) {
                    clients.send_to(client_id, ServerEvent::MatchFound {
                        room_id: room_id.clone(),
                    });
                }
            }
        }
        if paired {
            self.send_queue_updates(clients);
        }
    }

    fn fresh_room_id(&self) -> String {
        loop {
            let room_id = format!("match-{:08x}", rand::random::<u32>());
            if !self.rooms.contains_key(&room_id) {
                return room_id;
            }
        }
    }

    fn send_queue_updates(&self, clients: &Clients) {
        let queue_size = self.queue.len();
        for (idx, player_id) in self.queue.player_ids().enumerate() {
            if let Some(client_id) = clients.find_player(player_id) {
                clients.send_to(client_id, ServerEvent::QueueUpdate {
                    position: idx + 1,
                    queue_size,
                });
            }
        }
    }

    fn on_disconnect(&mut self, clients: &mut Clients, client_id: ClientId, now: Instant) {
        let Some(client) = clients.remove_client(client_id) else {
            return;
        };
        if let Some(player_id) = &client.player_id {
            if self.queue.leave(player_id) {
                self.send_queue_updates(clients);
            }
        }
        let Some(room_id) = client.room_id else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        let Some(player_id) = client.player_id else {
            return;
        };
        if let Some(member) = room.members.get_mut(&player_id) {
            if member.client == Some(client_id) {
                member.client = None;
                member.reconnect_deadline = Some(now + self.options.reconnect_grace);
                info!("Player {player_id} disconnected from room {room_id}");
                let event = ServerEvent::PlayerLeft { players_count: room.players_count() };
                broadcast_room(clients, room, &event, None);
            }
        }
    }

    fn on_client_event(
        &mut self, clients: &mut Clients, client_id: ClientId, event: ClientEvent, now: Instant,
    ) {
        match event {
            ClientEvent::Join { room_id, player_id } => {
                self.on_join(clients, client_id, room_id, player_id, now);
            }
            ClientEvent::JoinQueue { player_id, rating } => {
                if clients[client_id].room_id.is_some() {
                    clients.send_to(client_id, ServerEvent::Rejection {
                        reason: RejectionReason::BadRequest,
                        message: "cannot queue while in a room".to_owned(),
                    });
                    return;
                }
                clients[client_id].player_id = Some(player_id.clone());
                self.queue.join(player_id, rating, now);
                clients.send_to(client_id, ServerEvent::Queued { rating });
                self.send_queue_updates(clients);
            }
            ClientEvent::LeaveQueue => {
                if let Some(player_id) = clients[client_id].player_id.clone() {
                    if self.queue.leave(&player_id) {
                        self.send_queue_updates(clients);
                    }
                }
            }
            event => self.on_room_event(clients, client_id, event, now),
        }
    }

    fn on_join(
        &mut self, clients: &mut Clients, client_id: ClientId, room_id: String,
        player_id: PlayerId, now: Instant,
    ) {
        if self.queue.leave(&player_id) {
            self.send_queue_updates(clients);
        }
        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(self.options.time_control, now));
        Self::charge_room(clients, room, now);
        let seat = match room.members.get(&player_id) {
            Some(member) => {
                info!("Player {player_id} reconnected to room {room_id}");
                // A lingering connection under the same identity is superseded.
                if let Some(old_client) = member.client {
                    if old_client != client_id {
                        clients.send_to(old_client, ServerEvent::Rejection {
                            reason: RejectionReason::StaleConnection,
                            message: "superseded by a newer connection".to_owned(),
                        });
                        clients[old_client].room_id = None;
                        clients[old_client].player_id = None;
                    }
                }
                member.seat
            }
            None => {
                let seat = room.free_seat();
                info!("Player {player_id} joined room {room_id} as {seat:?}");
                seat
            }
        };
        room.members.insert(player_id.clone(), Member {
            seat,
            client: Some(client_id),
            reconnect_deadline: None,
        });
        clients[client_id].player_id = Some(player_id);
        clients[client_id].room_id = Some(room_id);
        clients.send_to(client_id, room.init_event(seat));
        let event = ServerEvent::PlayerJoined { players_count: room.players_count() };
        broadcast_room(clients, room, &event, Some(client_id));
    }

    fn on_room_event(
        &mut self, clients: &mut Clients, client_id: ClientId, event: ClientEvent, now: Instant,
    ) {
        let Some(room_id) = clients[client_id].room_id.clone() else {
            clients.send_to(client_id, ServerEvent::Rejection {
                reason: RejectionReason::StaleConnection,
                message: "join a room first".to_owned(),
            });
            return;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            clients[client_id].room_id = None;
            clients.send_to(client_id, ServerEvent::Rejection {
                reason: RejectionReason::StaleConnection,
                message: "the room no longer exists".to_owned(),
            });
            return;
        };
        let seat = clients[client_id]
            .player_id
            .as_ref()
            .and_then(|player_id| room.members.get(player_id))
            .map(|member| member.seat);
        let Some(seat) = seat else {
            clients.send_to(client_id, ServerEvent::Rejection {
                reason: RejectionReason::StaleConnection,
                message: "not a member of this room".to_owned(),
            });
            return;
        };
        // Bring the clock up to date before the intent is judged.
        Self::charge_room(clients, room, now);

        match event {
            ClientEvent::GetValidMoves { position } => {
                let destinations = room.game.valid_destinations(position, room.cards.table());
                clients.send_to(client_id, ServerEvent::ValidMoves {
                    position,
                    moves: destinations.moves,
                    attacks: destinations.attacks,
                });
            }
            ClientEvent::Chat { message } => {
                broadcast_room(clients, room, &ServerEvent::Chat { message }, Some(client_id));
            }
            ClientEvent::SaveCard { color, name, card_data } => {
                if seat == Seat::Observer {
                    clients.send_to(client_id, ServerEvent::Rejection {
                        reason: RejectionReason::NotSeated,
                        message: "observers cannot edit cards".to_owned(),
                    });
                    return;
                }
                room.cards.save_card(color, name, card_data);
                Self::broadcast_cards(clients, room);
            }
            ClientEvent::ToggleCard { color, name, enabled } => {
                if seat == Seat::Observer {
                    clients.send_to(client_id, ServerEvent::Rejection {
                        reason: RejectionReason::NotSeated,
                        message: "observers cannot edit cards".to_owned(),
                    });
                    return;
                }
                if room.cards.toggle_card(color, &name, enabled) {
                    Self::broadcast_cards(clients, room);
                } else {
                    clients.send_to(client_id, ServerEvent::Rejection {
                        reason: RejectionReason::BadRequest,
                        message: format!("no card named {name:?}"),
                    });
                }
            }
            ClientEvent::DeleteCard { color, name } => {
                if seat == Seat::Observer {
                    clients.send_to(client_id, ServerEvent::Rejection {
                        reason: RejectionReason::NotSeated,
                        message: "observers cannot edit cards".to_owned(),
                    });
                    return;
                }
                if room.cards.delete_card(color, &name) {
                    Self::broadcast_cards(clients, room);
                } else {
                    clients.send_to(client_id, ServerEvent::Rejection {
                        reason: RejectionReason::BadRequest,
                        message: format!("no card named {name:?}"),
                    });
                }
            }
            ClientEvent::ResetCustomMoves => {
                if seat == Seat::Observer {
                    clients.send_to(client_id, ServerEvent::Rejection {
                        reason: RejectionReason::NotSeated,
                        message: "observers cannot edit cards".to_owned(),
                    });
                    return;
                }
                room.cards.reset();
                let event = ServerEvent::CustomMovesUpdated {
                    custom_moves: room.cards.table().clone(),
                };
                broadcast_room(clients, room, &event, None);
            }
            event => {
                // Everything below acts on the game itself and needs a seat.
                let Some(force) = seat.force() else {
                    clients.send_to(client_id, ServerEvent::Rejection {
                        reason: RejectionReason::NotSeated,
                        message: "observers cannot act on the game".to_owned(),
                    });
                    return;
                };
                Self::on_game_intent(clients, room, client_id, force, event);
            }
        }
    }

    fn broadcast_cards(clients: &Clients, room: &Room) {
        let event = ServerEvent::CardsUpdated {
            ability_cards: room.cards.cards().clone(),
            custom_moves: room.cards.table().clone(),
        };
        broadcast_room(clients, room, &event, None);
    }

    fn on_game_intent(
        clients: &mut Clients, room: &mut Room, client_id: ClientId, force: Force,
        event: ClientEvent,
    ) {
        // The room clock was charged by the caller; no further wall time
        // passes within a single event.
        const NO_TIME: Duration = Duration::ZERO;
        match event {
            ClientEvent::Move { from, to } => {
                match room.game.try_move(force, from, to, room.cards.table(), NO_TIME) {
                    Ok(outcome) => {
                        Self::broadcast_move(clients, room, from, to, &outcome);
                        if outcome.promotion_pending {
                            clients.send_to(client_id, ServerEvent::PromotionPending { at: to });
                        }
                        Self::announce_if_over(clients, room);
                    }
                    Err(err) => clients.send_to(client_id, rejection(err)),
                }
            }
            ClientEvent::ChoosePromotion { piece } => {
                match room.game.choose_promotion(force, piece, room.cards.table(), NO_TIME) {
                    Ok(outcome) => {
                        // The suspended half-move just landed in the log.
                        let (from, to) = match room.game.move_log().last() {
                            Some(half_move) => (half_move.from, half_move.to),
                            None => return,
                        };
                        Self::broadcast_move(clients, room, from, to, &outcome);
                        Self::announce_if_over(clients, room);
                    }
                    Err(err) => clients.send_to(client_id, rejection(err)),
                }
            }
            ClientEvent::Resign => match room.game.resign(force) {
                Ok(()) => Self::announce_if_over(clients, room),
                Err(err) => clients.send_to(client_id, rejection(err)),
            },
            ClientEvent::OfferDraw => match room.game.offer_draw(force) {
                Ok(()) => {
                    broadcast_room(clients, room, &ServerEvent::DrawOffered, Some(client_id));
                }
                Err(err) => clients.send_to(client_id, rejection(err)),
            },
            ClientEvent::DrawResponse { accept } => {
                match room.game.respond_draw(force, accept) {
                    Ok(true) => Self::announce_if_over(clients, room),
                    Ok(false) => {
                        broadcast_room(clients, room, &ServerEvent::DrawDeclined, Some(client_id));
                    }
                    Err(err) => clients.send_to(client_id, rejection(err)),
                }
            }
            ClientEvent::RequestUndo => match room.game.request_undo(force) {
                Ok(()) => {
                    broadcast_room(clients, room, &ServerEvent::UndoRequested, Some(client_id));
                }
                Err(err) => clients.send_to(client_id, rejection(err)),
            },
            ClientEvent::UndoResponse { accept } => {
                match room.game.respond_undo(force, accept) {
                    Ok(true) => {
                        let event = ServerEvent::UndoAccepted {
                            board: room.game.grid().clone(),
                            current_player: room.game.active_force(),
                            timers: room.game.timers(),
                            move_log: room.game.move_log().to_vec(),
                        };
                        broadcast_room(clients, room, &event, None);
                    }
                    Ok(false) => {
                        broadcast_room(clients, room, &ServerEvent::UndoDeclined, Some(client_id));
                    }
                    Err(err) => clients.send_to(client_id, rejection(err)),
                }
            }
            _ => {
                clients.send_to(client_id, ServerEvent::Rejection {
                    reason: RejectionReason::BadRequest,
                    message: "unexpected message".to_owned(),
                });
            }
        }
    }

    fn broadcast_move(
        clients: &Clients, room: &Room, from: Coord, to: Coord, outcome: &TurnOutcome,
    ) {
        let event = ServerEvent::Move {
            board: room.game.grid().clone(),
            from,
            to,
            current_player: room.game.active_force(),
            timers: room.game.timers(),
            check: outcome.check,
            checkmate: outcome.checkmate,
            stalemate: outcome.stalemate,
            captured: outcome.captured,
            promotion: outcome.promotion,
            promotion_pending: outcome.promotion_pending,
        };
        broadcast_room(clients, room, &event, None);
    }

    fn announce_if_over(clients: &Clients, room: &Room) {
        if let Some(event) = game_over_event(room.game.status()) {
            broadcast_room(clients, room, &event, None);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_random_and_distinct() {
        let mut clients = Clients::new();
        let (tx, _rx) = mpsc::channel();
        let a = clients.add_client(tx.clone());
        let b = clients.add_client(tx);
        assert_ne!(a, b);
    }
}
