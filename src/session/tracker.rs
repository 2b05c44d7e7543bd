// ABOUTME: Correlates outbound sequence numbers with outstanding requests and caller message ids
// ABOUTME: Holds the commands queue and the submitted messages map, each under its own lock

use crate::datatypes::CommandId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::SubmitError;

/// Highest sequence number before wrapping back to 1
pub const MAX_SEQUENCE_NUMBER: u32 = 0x7FFF_FFFF;

/// A request waiting for its response
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCommand {
    pub command_id: CommandId,
    pub sent_at: Instant,
}

/// A submitted message waiting for its `*_sm_resp`
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    /// Caller supplied message id
    pub local_id: String,
    pub submitted_at: Instant,
    pub want_receipt: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sequence number bookkeeping for one session.
///
/// Every request sent is recorded in the commands queue until its response
/// arrives. Submitted messages are also recorded against the local message
/// id so the response can be reported against it. The two maps have
/// separate locks and neither is held across I/O.
#[derive(Debug)]
pub struct SubmissionTracker {
    next_sequence: Mutex<u32>,
    commands: Mutex<HashMap<u32, PendingCommand>>,
    submitted: Mutex<HashMap<u32, Submission>>,
}

impl Default for SubmissionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionTracker {
    pub fn new() -> Self {
        Self {
            next_sequence: Mutex::new(1),
            commands: Mutex::new(HashMap::new()),
            submitted: Mutex::new(HashMap::new()),
        }
    }

    fn in_use(&self, sequence_number: u32) -> bool {
        lock(&self.commands).contains_key(&sequence_number)
            || lock(&self.submitted).contains_key(&sequence_number)
    }

    /// Reserve `count` consecutive sequence numbers, none of them in flight.
    ///
    /// Returns the first. The run never wraps past `MAX_SEQUENCE_NUMBER`.
    pub fn reserve(&self, count: u32) -> u32 {
        let count = count.max(1);
        let mut next = lock(&self.next_sequence);

        loop {
            if *next == 0 || *next > MAX_SEQUENCE_NUMBER - (count - 1) {
                *next = 1;
            }
            let base = *next;
            match (base..base + count).find(|seq| self.in_use(*seq)) {
                Some(busy) => *next = busy.wrapping_add(1),
                None => {
                    *next = base.wrapping_add(count);
                    return base;
                }
            }
        }
    }

    /// Next free sequence number for a single request
    pub fn next_sequence(&self) -> u32 {
        self.reserve(1)
    }

    /// Queue a request until its response arrives.
    ///
    /// A sequence number already waiting for a response is refused and the
    /// queued request is kept.
    pub fn record_command(
        &self,
        sequence_number: u32,
        command_id: CommandId,
        now: Instant,
    ) -> Result<(), SubmitError> {
        let mut commands = lock(&self.commands);
        if commands.contains_key(&sequence_number) {
            return Err(SubmitError::DuplicateSequence(sequence_number));
        }
        commands.insert(
            sequence_number,
            PendingCommand {
                command_id,
                sent_at: now,
            },
        );
        Ok(())
    }

    /// Remove a request answered by `sequence_number`
    pub fn complete_command(&self, sequence_number: u32) -> Option<PendingCommand> {
        lock(&self.commands).remove(&sequence_number)
    }

    /// Map `sequence_number` to a caller's message id.
    ///
    /// An existing mapping is never overwritten.
    pub fn register_submission(
        &self,
        sequence_number: u32,
        local_id: impl Into<String>,
        want_receipt: bool,
        now: Instant,
    ) -> Result<(), SubmitError> {
        let mut submitted = lock(&self.submitted);
        if submitted.contains_key(&sequence_number) {
            return Err(SubmitError::DuplicateSequence(sequence_number));
        }
        submitted.insert(
            sequence_number,
            Submission {
                local_id: local_id.into(),
                submitted_at: now,
                want_receipt,
            },
        );
        Ok(())
    }

    /// Take the submission answered by `sequence_number`
    pub fn resolve_submission(&self, sequence_number: u32) -> Option<Submission> {
        lock(&self.submitted).remove(&sequence_number)
    }

    /// Age of the oldest unanswered request
    pub fn oldest_outstanding(&self, now: Instant) -> Option<Duration> {
        lock(&self.commands)
            .values()
            .map(|pending| now.saturating_duration_since(pending.sent_at))
            .max()
    }

    pub fn pending_commands(&self) -> usize {
        lock(&self.commands).len()
    }

    pub fn pending_submissions(&self) -> usize {
        lock(&self.submitted).len()
    }

    /// Empty both maps, returning the submissions that never got an answer
    pub fn drain(&self) -> Vec<Submission> {
        lock(&self.commands).clear();
        let mut submissions: Vec<Submission> =
            lock(&self.submitted).drain().map(|(_, sub)| sub).collect();
        submissions.sort_by_key(|sub| sub.submitted_at);
        submissions
    }
}
