//! The Hub - central shared state for the chat coordinator.
//!
//! The Hub owns the connection registry, room directory, typing roster, and
//! message store, plus the per-connection outbound senders used for fan-out.
//! All state changes flow through the owning component; the Hub stitches
//! them together and is the only place that emits events to connections.
//!
//! Fan-out resolves room membership at delivery time, never from a snapshot
//! captured earlier, so since-departed connections are skipped. Outbound
//! queues are unbounded and sends never block: there is no backpressure or
//! retry, and a dead recipient never stalls delivery to the rest; its queue
//! is torn down with the connection.

use crate::config::Config;
use crate::error::HandlerError;
use crate::state::{ConnIdGenerator, ConnectionRegistry, MessageStore, RoomDirectory, TypingRoster};
use dashmap::DashMap;
use slchat_proto::{ConnId, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// This server's identity information.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub default_room: String,
}

/// Assertion verification settings, accessible to the network layer.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// HMAC secret shared with the external auth service.
    pub secret: String,
    /// How long a fresh connection gets to present its assertion.
    pub handshake_timeout: std::time::Duration,
}

/// Central shared state container.
pub struct Hub {
    /// Who is online and where.
    pub registry: ConnectionRegistry,
    /// Provisioned rooms and their member sets.
    pub rooms: RoomDirectory,
    /// Currently-typing connections per room.
    pub typing: TypingRoster,
    /// Capacity-bounded per-room message logs.
    pub store: MessageStore,
    /// Connection id generator for new links.
    pub cid_gen: ConnIdGenerator,
    /// This server's identity.
    pub server_info: ServerInfo,
    /// Assertion verification settings.
    pub auth: AuthSettings,

    /// Outbound event sender per connection, for routing.
    senders: DashMap<ConnId, mpsc::UnboundedSender<ServerEvent>>,
}

impl Hub {
    /// Build the Hub from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomDirectory::new(&config.chat.rooms),
            typing: TypingRoster::new(),
            store: MessageStore::new(&config.chat.rooms, config.chat.retention),
            cid_gen: ConnIdGenerator::new(config.server.node_id.clone()),
            server_info: ServerInfo {
                name: config.server.name.clone(),
                default_room: config.chat.default_room.clone(),
            },
            auth: AuthSettings {
                secret: config.auth.secret.clone(),
                handshake_timeout: std::time::Duration::from_secs(
                    config.auth.handshake_timeout_secs,
                ),
            },
            senders: DashMap::new(),
        }
    }

    // === Fan-out ===

    /// Deliver an event to a single connection. Returns false if the
    /// connection is gone or its queue is closed.
    pub fn to_connection(&self, cid: &str, event: ServerEvent) -> bool {
        self.senders
            .get(cid)
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Deliver an event to every current member of a room, optionally
    /// excluding one connection (usually the originator). Membership is read
    /// at delivery time; a closed queue skips that recipient only.
    pub fn to_room(&self, room: &str, event: ServerEvent, exclude: Option<&str>) {
        for cid in self.rooms.members(room) {
            if exclude.is_some_and(|e| e == cid) {
                continue;
            }
            if let Some(tx) = self.senders.get(&cid) {
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Deliver an event to every registered connection. Presence is global:
    /// roster changes go to everyone, regardless of room.
    pub fn to_all(&self, event: ServerEvent) {
        for entry in self.senders.iter() {
            let _ = entry.value().send(event.clone());
        }
    }

    /// The full presence roster as a `user_list` event.
    pub fn user_list_event(&self) -> ServerEvent {
        ServerEvent::UserList { users: self.registry.roster() }
    }

    // === Session lifecycle ===

    /// Bring an authenticated connection into service: register it, announce
    /// presence globally, and place it in the default room.
    pub fn attach_session(
        &self,
        cid: &str,
        identity: &str,
        tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<(), HandlerError> {
        if let Err(e) = self.registry.register(cid, identity) {
            warn!(cid = %cid, identity = %identity, "Rejecting duplicate connection id");
            return Err(e);
        }
        self.senders.insert(cid.to_string(), tx);
        crate::metrics::connected_sessions().set(self.registry.len() as i64);

        info!(cid = %cid, identity = %identity, "Session attached");

        // Presence is global, room membership is local.
        self.to_all(self.user_list_event());
        self.to_all(ServerEvent::UserJoined {
            username: identity.to_string(),
            cid: cid.to_string(),
        });

        self.place_in_room(cid, identity, &self.server_info.default_room);

        Ok(())
    }

    /// Move a connection into a room and emit the membership notifications:
    /// `user_left_room` to the old room, `joined_room` to the mover,
    /// `user_joined_room` to the rest of the new room.
    pub fn place_in_room(&self, cid: &str, identity: &str, room: &str) {
        let transfer = match self.rooms.join(cid, room) {
            Ok(transfer) => transfer,
            Err(e) => {
                debug!(cid = %cid, room = %room, code = e.error_code(), "Join ignored");
                crate::metrics::event_errors(e.error_code()).inc();
                return;
            }
        };
        self.registry.set_current_room(cid, Some(room.to_string()));

        // A room change also retires any typing entries the mover left behind.
        for (affected, users) in self.typing.clear_connection(cid) {
            self.to_room(
                &affected,
                ServerEvent::TypingUsers { room: affected.clone(), users },
                None,
            );
        }

        if let Some(left) = transfer.left {
            self.to_room(
                &left,
                ServerEvent::UserLeftRoom {
                    username: identity.to_string(),
                    cid: cid.to_string(),
                    room: left.clone(),
                },
                Some(cid),
            );
        }

        let users = self.registry.resolve(&transfer.members);
        self.to_connection(cid, ServerEvent::JoinedRoom { room: room.to_string(), users });
        self.to_room(
            room,
            ServerEvent::UserJoinedRoom {
                username: identity.to_string(),
                cid: cid.to_string(),
                room: room.to_string(),
            },
            Some(cid),
        );

        debug!(cid = %cid, room = %room, "Joined room");
    }

    /// Tear a connection down. This is the canonical cleanup, used for both
    /// graceful and abrupt disconnects. It:
    /// 1. Removes the connection from every room, notifying each
    /// 2. Sweeps its typing entries, republishing affected rosters
    /// 3. Unregisters it from the registry
    /// 4. Announces the departure and the refreshed presence roster
    ///
    /// Idempotent: a second call for the same cid finds nothing to do.
    pub fn detach_session(&self, cid: &str) {
        let identity = self.registry.lookup(cid).map(|conn| conn.identity);

        for room in self.rooms.remove_everywhere(cid) {
            if let Some(identity) = &identity {
                self.to_room(
                    &room,
                    ServerEvent::UserLeftRoom {
                        username: identity.clone(),
                        cid: cid.to_string(),
                        room: room.clone(),
                    },
                    None,
                );
            }
        }

        for (room, users) in self.typing.clear_connection(cid) {
            self.to_room(&room, ServerEvent::TypingUsers { room: room.clone(), users }, None);
        }

        self.registry.unregister(cid);
        self.senders.remove(cid);
        crate::metrics::connected_sessions().set(self.registry.len() as i64);

        if let Some(identity) = identity {
            info!(cid = %cid, identity = %identity, "Session detached");
            self.to_all(ServerEvent::UserLeft {
                username: identity,
                cid: cid.to_string(),
            });
            self.to_all(self.user_list_event());
        }
    }
}

/// Convenience alias used throughout handlers and the network layer.
pub type SharedHub = Arc<Hub>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config() -> Config {
        toml::from_str(
            r#"
            [server]
            name = "chat.test"
            node_id = "C01"

            [listen]
            address = "127.0.0.1:0"

            [auth]
            secret = "unit-test-secret-0123456789"
            "#,
        )
        .unwrap()
    }

    fn attach(hub: &Hub, identity: &str) -> (ConnId, mpsc::UnboundedReceiver<ServerEvent>) {
        let cid = hub.cid_gen.next();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.attach_session(&cid, identity, tx).unwrap();
        (cid, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[test]
    fn attach_announces_presence_and_joins_default_room() {
        let hub = Hub::new(&test_config());
        let (cid, mut rx) = attach(&hub, "alice");

        let events = drain(&mut rx);
        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["user_list", "user_joined", "joined_room"]);

        assert!(hub.rooms.is_member("general", &cid));
        assert_eq!(hub.registry.current_room(&cid).as_deref(), Some("general"));
    }

    #[test]
    fn second_join_notifies_the_rest_of_the_room() {
        let hub = Hub::new(&test_config());
        let (_cid_a, mut rx_a) = attach(&hub, "alice");
        drain(&mut rx_a);

        let (cid_b, mut rx_b) = attach(&hub, "bob");

        // Alice sees the roster refresh, the presence delta, and bob joining
        // her room; she does not see bob's private joined_room ack.
        let alice_events = drain(&mut rx_a);
        let alice_names: Vec<&str> = alice_events.iter().map(|e| e.name()).collect();
        assert_eq!(alice_names, ["user_list", "user_joined", "user_joined_room"]);

        // Bob's joined_room ack lists both members.
        let bob_events = drain(&mut rx_b);
        let joined = bob_events
            .iter()
            .find_map(|e| match e {
                ServerEvent::JoinedRoom { room, users } => Some((room.clone(), users.clone())),
                _ => None,
            })
            .expect("bob gets joined_room");
        assert_eq!(joined.0, "general");
        assert_eq!(joined.1.len(), 2);
        assert!(joined.1.iter().any(|u| u.cid == cid_b));
    }

    #[test]
    fn detach_cleans_every_trace() {
        let hub = Hub::new(&test_config());
        let (cid_a, mut rx_a) = attach(&hub, "alice");
        let (cid_b, mut rx_b) = attach(&hub, "bob");
        hub.typing.set("general", &cid_a, "alice", true);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.detach_session(&cid_a);

        assert!(!hub.registry.contains(&cid_a));
        assert!(!hub.rooms.is_member("general", &cid_a));
        assert!(hub.typing.list("general").is_empty());

        let bob_events = drain(&mut rx_b);
        let bob_names: Vec<&str> = bob_events.iter().map(|e| e.name()).collect();
        assert_eq!(
            bob_names,
            ["user_left_room", "typing_users", "user_left", "user_list"]
        );

        // Cleanup is idempotent; bob hears nothing the second time.
        hub.detach_session(&cid_a);
        assert!(drain(&mut rx_b).is_empty());

        assert!(hub.registry.contains(&cid_b));
    }

    #[test]
    fn room_fanout_skips_excluded_and_departed() {
        let hub = Hub::new(&test_config());
        let (cid_a, mut rx_a) = attach(&hub, "alice");
        let (_cid_b, mut rx_b) = attach(&hub, "bob");
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.to_room(
            "general",
            ServerEvent::TypingUsers { room: "general".into(), users: vec![] },
            Some(&cid_a),
        );

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b).len(), 1);
    }
}
