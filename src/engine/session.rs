use crate::profile::ProfileSummary;
use std::collections::HashSet;

/// Ephemeral state of one triage session.
///
/// The queue is append-only: candidates are never removed, the cursor just
/// moves past them. The seen set holds every identifier that ever entered
/// the queue (seed included), so no identifier can occupy two positions in
/// the queue's full history. Registration in the seen set and the append
/// itself happen together, inside the same `&mut self` call.
pub struct Session {
    seed: String,
    queue: Vec<ProfileSummary>,
    cursor: usize,
    seen: HashSet<String>,
    generation: u64,
    inflight: usize,
}

impl Session {
    /// Build a session from the seed's neighbor list.
    ///
    /// The seed itself and any repeated identifiers within the list are
    /// dropped; the order of survivors is preserved.
    pub fn new(seed: impl Into<String>, neighbors: Vec<ProfileSummary>, generation: u64) -> Self {
        let seed = seed.into();
        let mut seen = HashSet::new();
        seen.insert(seed.clone());

        let mut session = Self {
            seed,
            queue: Vec::new(),
            cursor: 0,
            seen,
            generation,
            inflight: 0,
        };
        session.merge(neighbors);
        session
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The candidate at the cursor, or None when the queue is exhausted
    pub fn current(&self) -> Option<&ProfileSummary> {
        self.queue.get(self.cursor)
    }

    /// Move the cursor past the current candidate
    pub fn advance(&mut self) {
        debug_assert!(self.cursor < self.queue.len());
        self.cursor += 1;
    }

    /// Candidates not yet triaged
    pub fn pending(&self) -> usize {
        self.queue.len().saturating_sub(self.cursor)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.queue.len()
    }

    /// Append neighbors not already seen to the queue tail, registering
    /// them in the seen set. Returns how many survived the filter.
    pub fn merge(&mut self, neighbors: Vec<ProfileSummary>) -> usize {
        let before = self.queue.len();
        for neighbor in neighbors {
            if self.seen.insert(neighbor.public_identifier.clone()) {
                self.queue.push(neighbor);
            }
        }
        self.queue.len() - before
    }

    pub fn begin_expansion(&mut self) {
        self.inflight += 1;
    }

    pub fn finish_expansion(&mut self) {
        self.inflight = self.inflight.saturating_sub(1);
    }

    /// Expansions spawned from this session that have not yet merged
    pub fn expansions_in_flight(&self) -> usize {
        self.inflight
    }
}
