//! Stale-response detection for leaderboard requests.
//!
//! Each client remembers the newest generation it has issued per [`View`]. A
//! request takes a [`Ticket`] before it fetches and checks it again once it
//! has computed its answer; if a newer request from the same client for the
//! same view arrived in the meantime, the older answer is dropped instead of
//! overwriting the newer one. Views are independent, so a group board and a
//! drill-down loading side by side under one `client_id` never supersede
//! each other.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::errors::AppError;

/// Leaderboard screen a request feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Groups,
    DrillDown,
    Actors,
}

type Key = (String, View);

#[derive(Debug, Clone)]
pub struct Ticket {
    key: Key,
    pub generation: u64,
}

#[derive(Default)]
pub struct RequestSequencer {
    latest: DashMap<Key, (u64, Instant)>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new request for `client` on `view`.
    ///
    /// With a client-supplied `seq` the generation is that number, and a
    /// `seq` not above the newest one seen is rejected right away. Without
    /// one the generation is the previous one plus one.
    pub fn begin(&self, client: &str, view: View, seq: Option<u64>) -> Result<Ticket, AppError> {
        let key = (client.to_string(), view);
        let mut slot = self.latest.entry(key.clone()).or_insert((0, Instant::now()));
        let (latest, touched) = slot.value_mut();

        let generation = match seq {
            Some(seq) if seq <= *latest => {
                return Err(AppError::Stale {
                    generation: seq,
                    latest: *latest,
                });
            }
            Some(seq) => seq,
            None => *latest + 1,
        };

        *latest = generation;
        *touched = Instant::now();

        Ok(Ticket { key, generation })
    }

    /// Fails if a newer request for the same client and view has begun since
    /// `ticket`.
    pub fn check(&self, ticket: &Ticket) -> Result<(), AppError> {
        let latest = self
            .latest
            .get(&ticket.key)
            .map(|slot| slot.value().0)
            .unwrap_or(ticket.generation);

        if latest > ticket.generation {
            tracing::info!(
                client = %ticket.key.0,
                view = ?ticket.key.1,
                generation = ticket.generation,
                latest,
                "discarding superseded leaderboard response"
            );
            return Err(AppError::Stale {
                generation: ticket.generation,
                latest,
            });
        }
        Ok(())
    }

    /// Forgets clients that have been quiet for longer than `idle`.
    pub fn cleanup_idle(&self, idle: Duration) -> usize {
        let before = self.latest.len();
        self.latest
            .retain(|_, (_, touched)| touched.elapsed() < idle);
        let removed = before - self.latest.len();
        if removed > 0 {
            tracing::debug!("🧹 Forgot {} idle leaderboard clients", removed);
        }
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.latest.len()
    }
}
