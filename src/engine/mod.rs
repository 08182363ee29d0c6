use crate::auth::CredentialProvider;
use crate::error::{ProspectorError, Result};
use crate::profile::ProfileSummary;
use crate::source::NeighborSource;
use crate::store::TriageStore;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod session;

use session::Session;

/// Lifecycle phase of the triage session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriagePhase {
    /// No session; `start` opens one
    Idle,
    /// A candidate is exposed at the cursor
    Active,
    /// The cursor has reached the queue end. A late expansion merge can
    /// extend the queue and return the session to Active; the engine never
    /// restarts on its own, the operator leaves this state via `stop` or
    /// a fresh `start`.
    Exhausted,
}

impl fmt::Display for TriagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriagePhase::Idle => write!(f, "idle"),
            TriagePhase::Active => write!(f, "active"),
            TriagePhase::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Durable and session counters reported to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriageStats {
    pub accepted: u64,
    pub rejected: u64,
    pub pending: usize,
}

struct EngineState {
    session: Option<Session>,
    /// Bumped on every start/stop; expansion merges carry the generation
    /// they were spawned under and are discarded on mismatch
    generation: u64,
}

/// The frontier engine: owns the candidate queue, the seen set, the cursor
/// and the triage state machine.
///
/// All mutation of session state goes through one async mutex, so triage
/// operations and expansion merges are serialized (single-writer). The
/// mutex is held across the persistence write inside `skip`/`accept`,
/// making each a single logical step: counter/store and cursor move
/// together or not at all. Expansion network fetches run outside the lock
/// and never block `accept` returning to the operator.
#[derive(Clone)]
pub struct FrontierEngine {
    source: Arc<dyn NeighborSource>,
    store: Arc<dyn TriageStore>,
    credentials: Arc<dyn CredentialProvider>,
    state: Arc<Mutex<EngineState>>,
}

impl FrontierEngine {
    pub fn new(
        source: Arc<dyn NeighborSource>,
        store: Arc<dyn TriageStore>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            source,
            store,
            credentials,
            state: Arc::new(Mutex::new(EngineState {
                session: None,
                generation: 0,
            })),
        }
    }

    /// Open a session seeded from `seed`'s neighbors.
    ///
    /// Any previous session is discarded first (stop semantics). Fails with
    /// `NoCredential` before touching any state when no valid credential is
    /// available, and stays Idle when the neighbor source fails. Returns
    /// the number of candidates queued; zero means the session opened
    /// directly into Exhausted, which is a normal outcome, not an error.
    pub async fn start(&self, seed: &str) -> Result<usize> {
        if !self.credentials.has_valid_credential() {
            return Err(ProspectorError::NoCredential);
        }

        let mut state = self.state.lock().await;
        state.session = None;
        state.generation += 1;
        let generation = state.generation;

        log::info!("Fetching similar profiles for seed {}", seed);
        let neighbors = self.source.fetch_neighbors(seed).await?;

        let session = Session::new(seed, neighbors, generation);
        let discovered = session.pending();
        if discovered == 0 {
            log::info!("No candidates found for {}", seed);
        } else {
            log::info!("Queued {} candidate(s) for {}", discovered, seed);
        }
        state.session = Some(session);

        Ok(discovered)
    }

    /// The candidate at the cursor. Pure read; None when Idle or Exhausted.
    pub async fn current(&self) -> Option<ProfileSummary> {
        let state = self.state.lock().await;
        state.session.as_ref().and_then(|s| s.current().cloned())
    }

    pub async fn phase(&self) -> TriagePhase {
        let state = self.state.lock().await;
        match &state.session {
            None => TriagePhase::Idle,
            Some(s) if s.is_exhausted() => TriagePhase::Exhausted,
            Some(_) => TriagePhase::Active,
        }
    }

    /// Reject the current candidate: bump the persisted rejection counter,
    /// then advance the cursor. Returns the new counter value. On a
    /// persistence failure the cursor is left where it was, so the skip
    /// can be retried without losing its record.
    pub async fn skip(&self) -> Result<u64> {
        let mut state = self.state.lock().await;
        let session = state.session.as_mut().ok_or(ProspectorError::NoSession)?;
        if session.current().is_none() {
            return Err(ProspectorError::NoCandidate);
        }

        let rejected = self.store.increment_rejected().await?;
        session.advance();

        if session.is_exhausted() {
            log::info!("Queue exhausted after skip");
        }
        Ok(rejected)
    }

    /// Accept the current candidate: persist it, advance the cursor, and
    /// spawn a detached expansion that fetches the candidate's own
    /// neighbors and merges the unseen ones onto the queue tail.
    ///
    /// The expansion never blocks this call and its failures are dropped
    /// by contract: the operator just sees fewer candidates than were
    /// theoretically reachable. Returns the accepted candidate.
    pub async fn accept(&self) -> Result<ProfileSummary> {
        let mut state = self.state.lock().await;
        let session = state.session.as_mut().ok_or(ProspectorError::NoSession)?;
        let candidate = match session.current() {
            Some(c) => c.clone(),
            None => return Err(ProspectorError::NoCandidate),
        };

        let inserted = self.store.upsert_accepted(&candidate).await?;
        if !inserted {
            log::debug!("{} was already accepted", candidate.public_identifier);
        }

        session.advance();
        session.begin_expansion();
        let generation = session.generation();
        if session.is_exhausted() {
            log::info!("Queue exhausted after accept; expansion may refill it");
        }
        drop(state);

        let engine = self.clone();
        let identifier = candidate.public_identifier.clone();
        tokio::spawn(async move {
            engine.expand(identifier, generation).await;
        });

        Ok(candidate)
    }

    /// Discard the session and return to Idle. Idempotent; effective
    /// immediately even with expansions still in flight (their merges
    /// will be discarded by the generation check).
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if state.session.take().is_some() {
            log::info!("Triage session stopped");
        }
        state.generation += 1;
    }

    /// Counters for the operator: accepted/rejected always come from the
    /// persisted store, pending from the active session (0 when Idle)
    pub async fn stats(&self) -> Result<TriageStats> {
        let pending = {
            let state = self.state.lock().await;
            state.session.as_ref().map(|s| s.pending()).unwrap_or(0)
        };
        let accepted = self.store.accepted_count().await?;
        let rejected = self.store.rejected_count().await?;
        Ok(TriageStats {
            accepted,
            rejected,
            pending,
        })
    }

    /// Expansions spawned from the active session that have not merged yet
    pub async fn expansions_in_flight(&self) -> usize {
        let state = self.state.lock().await;
        state
            .session
            .as_ref()
            .map(|s| s.expansions_in_flight())
            .unwrap_or(0)
    }

    async fn expand(&self, identifier: String, generation: u64) {
        let result = self.source.fetch_neighbors(&identifier).await;

        let mut state = self.state.lock().await;
        let session = match state.session.as_mut() {
            Some(s) if s.generation() == generation => s,
            // The session this expansion belonged to is gone or replaced
            _ => {
                log::debug!("Discarding stale expansion of {}", identifier);
                return;
            }
        };
        session.finish_expansion();

        match result {
            Ok(neighbors) => {
                let appended = session.merge(neighbors);
                log::info!(
                    "Expansion of {} appended {} candidate(s), {} pending",
                    identifier,
                    appended,
                    session.pending()
                );
            }
            Err(e) => {
                // Contract: background expansion failures are never surfaced
                log::debug!("Expansion of {} failed, continuing: {}", identifier, e);
            }
        }
    }
}
