use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::peer::PeerKey;
use crate::reliability::ReliabilitySession;

/// Server side state for one admitted peer.
///
/// A session is created by a successful handshake and holds the only reliability session for its
///  peer. There is no teardown: it lives until it is replaced by a later handshake from the same
///  peer, evicted for being idle, or the server goes away.
pub struct Session {
    pub peer_addr: SocketAddr,
    pub reliability: Box<dyn ReliabilitySession>,
    pub created_at: Instant,
    pub last_seen: Instant,
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session{{peer_addr:{:?}, created_at:{:?}, last_seen:{:?}}}", self.peer_addr, self.created_at, self.last_seen)
    }
}

impl Session {
    pub fn new(peer_addr: SocketAddr, reliability: Box<dyn ReliabilitySession>, now: Instant) -> Session {
        Session {
            peer_addr,
            reliability,
            created_at: now,
            last_seen: now,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }
}

#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: FxHashMap<PeerKey, Session>,
}

impl SessionTable {
    /// Inserts a session, returning the one it replaced (if any). Replacing is silent by
    ///  protocol - a repeated handshake simply starts over.
    pub fn insert(&mut self, key: PeerKey, session: Session) -> Option<Session> {
        self.sessions.insert(key, session)
    }

    pub fn get_mut(&mut self, key: &PeerKey) -> Option<&mut Session> {
        self.sessions.get_mut(key)
    }

    pub fn contains(&self, key: &PeerKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn remove(&mut self, key: &PeerKey) -> Option<Session> {
        self.sessions.remove(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// removes all sessions that were not seen for longer than `max_idle`, returning their keys
    pub fn evict_idle(&mut self, now: Instant, max_idle: Duration) -> Vec<PeerKey> {
        let mut evicted = Vec::new();
        self.sessions.retain(|key, session| {
            if now.saturating_duration_since(session.last_seen) > max_idle {
                debug!("evicting idle session for {:?} (last seen {:?} ago)", key, now.saturating_duration_since(session.last_seen));
                evicted.push(*key);
                false
            }
            else {
                true
            }
        });
        evicted
    }
}
