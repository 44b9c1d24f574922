//! Single-flight coordination of the refresh exchange.
//!
//! The first caller to find the coordinator idle becomes the leader and runs
//! [`SessionStore::refresh`]. Callers arriving while that exchange is in flight
//! become followers: they never touch the exchange and resolve with the
//! leader's outcome. Backends that rotate refresh credentials on use would
//! otherwise see every concurrent 401 spend the same refresh credential.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::errors::Result;
use crate::session::SessionStore;

type Outcome = Option<Result<String>>;

/// Receiver of the in-flight exchange's outcome; `None` while idle
type FlightSlot = Mutex<Option<watch::Receiver<Outcome>>>;

#[derive(Debug)]
pub struct RefreshCoordinator {
    session: Arc<SessionStore>,
    slot: FlightSlot,
    flights: AtomicU64,
}

enum Part<'a> {
    Leader(Flight<'a>),
    Follower(watch::Receiver<Outcome>),
}

/// Leader's handle on the flight slot.
///
/// Dropping it returns the coordinator to idle, so a leader future that is
/// abandoned mid-exchange still releases the slot and wakes its followers.
struct Flight<'a> {
    slot: &'a FlightSlot,
    tx: watch::Sender<Outcome>,
}

impl Flight<'_> {
    fn publish(self, outcome: &Result<String>) {
        let shared = match outcome {
            Ok(token) => Ok(token.clone()),
            Err(e) => Err(e.replicate()),
        };
        self.tx.send_replace(Some(shared));
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl RefreshCoordinator {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            session,
            slot: Mutex::new(None),
            flights: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Number of refresh exchanges led so far
    pub fn flights(&self) -> u64 {
        self.flights.load(Ordering::SeqCst)
    }

    /// Whether a refresh exchange is currently in flight
    pub fn in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn join(&self) -> Part<'_> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = slot.as_ref() {
            return Part::Follower(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        *slot = Some(rx);
        Part::Leader(Flight {
            slot: &self.slot,
            tx,
        })
    }

    /// Obtain a fresh access credential, sharing one exchange among all
    /// concurrent callers.
    ///
    /// A follower whose leader is dropped before publishing joins again and
    /// may lead the next flight itself.
    #[instrument(skip(self))]
    pub async fn coordinate_refresh(&self) -> Result<String> {
        loop {
            match self.join() {
                Part::Leader(flight) => {
                    let flight_no = self.flights.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(flight_no, "Leading refresh exchange");

                    let outcome = self.session.refresh().await;
                    flight.publish(&outcome);
                    return outcome;
                }
                Part::Follower(mut rx) => {
                    debug!("Refresh already in flight, waiting for its outcome");
                    if let Ok(outcome) = rx.wait_for(Option::is_some).await
                        && let Some(shared) = &*outcome
                    {
                        return match shared {
                            Ok(token) => Ok(token.clone()),
                            Err(e) => Err(e.replicate()),
                        };
                    }
                    debug!("Refresh leader went away, joining again");
                }
            }
        }
    }
}
