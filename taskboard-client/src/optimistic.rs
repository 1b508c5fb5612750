//! Optimistic value tracking for a single displayed field.
//!
//! [`Optimistic`] shows a requested value immediately, remembers what was
//! displayed before, and settles once the server answers:
//!
//! ```text
//! Idle --begin(target)--> Pending --resolve(Ok)--> Idle (server value)
//!                                 --resolve(Err)-> Idle (previous value)
//! ```
//!
//! Under [`ConcurrencyPolicy::Queue`] a request made while pending is shown
//! at once too; the rollback point stays the value from before the
//! in-flight change.
//!
//! Every in-flight change carries a [`Ticket`] with a generation number.
//! Answers for any generation other than the current one are ignored, so a
//! late response can never overwrite newer state.

/// What to do when a change is requested while another is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyPolicy {
    /// Refuse the new change with [`OptimisticError::Busy`].
    #[default]
    Reject,
    /// Show the latest requested value and send it once the in-flight
    /// change is confirmed.
    Queue,
}

/// Errors from starting a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OptimisticError {
    /// A change is already in flight and the policy is
    /// [`ConcurrencyPolicy::Reject`].
    #[error("a change is already in flight")]
    Busy,
}

/// Handle for one in-flight change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    /// The generation this ticket was issued for.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

/// Result of [`Optimistic::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// The target is displayed and must now be sent with this ticket.
    Started(Ticket),
    /// Another change is in flight; the target is displayed and queued
    /// behind it.
    Queued,
}

/// Result of [`Optimistic::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T, E> {
    /// The server accepted the change; its value is now displayed.
    Confirmed,
    /// The server accepted the change and a queued target took its place.
    /// The caller must send `target` with `ticket`.
    Promoted {
        /// Ticket for the promoted change.
        ticket: Ticket,
        /// Value to send.
        target: T,
    },
    /// The change failed; the previous value is displayed again and any
    /// queued target was dropped.
    RolledBack {
        /// The value now displayed.
        restored: T,
        /// Why the change failed.
        error: E,
    },
    /// The answer belongs to a superseded change and was ignored.
    Stale,
}

#[derive(Debug, Clone)]
enum Phase<T> {
    Idle,
    Pending {
        generation: u64,
        previous: T,
        queued: Option<T>,
    },
}

/// A displayed value that may be ahead of the server.
#[derive(Debug, Clone)]
pub struct Optimistic<T> {
    value: T,
    phase: Phase<T>,
    generation: u64,
    policy: ConcurrencyPolicy,
}

impl<T: Clone + PartialEq> Optimistic<T> {
    /// Starts idle, displaying `value`.
    pub const fn new(value: T, policy: ConcurrencyPolicy) -> Self {
        Self {
            value,
            phase: Phase::Idle,
            generation: 0,
            policy,
        }
    }

    /// The value to display.
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Returns `true` while a change is in flight.
    pub const fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending { .. })
    }

    /// The target waiting behind the in-flight change, if any.
    pub const fn queued(&self) -> Option<&T> {
        match &self.phase {
            Phase::Pending {
                queued: Some(target),
                ..
            } => Some(target),
            _ => None,
        }
    }

    /// The current generation. Bumped by every started change and by
    /// [`reset`](Self::reset).
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Requests `target`.
    ///
    /// The target is displayed at once. When idle a ticket is returned;
    /// while pending the outcome depends on the policy.
    ///
    /// # Errors
    ///
    /// [`OptimisticError::Busy`] while pending under
    /// [`ConcurrencyPolicy::Reject`].
    pub fn begin(&mut self, target: T) -> Result<Begin, OptimisticError> {
        if let Phase::Pending { queued, .. } = &mut self.phase {
            return match self.policy {
                ConcurrencyPolicy::Reject => Err(OptimisticError::Busy),
                ConcurrencyPolicy::Queue => {
                    self.value = target.clone();
                    *queued = Some(target);
                    Ok(Begin::Queued)
                }
            };
        }
        let previous = std::mem::replace(&mut self.value, target);
        Ok(Begin::Started(self.start(previous)))
    }

    /// Settles the change identified by `ticket`.
    pub fn resolve<E>(&mut self, ticket: Ticket, outcome: Result<T, E>) -> Resolution<T, E> {
        let current = match &self.phase {
            Phase::Pending { generation, .. } => *generation == ticket.generation,
            Phase::Idle => false,
        };
        if !current {
            return Resolution::Stale;
        }

        let Phase::Pending {
            previous, queued, ..
        } = std::mem::replace(&mut self.phase, Phase::Idle)
        else {
            return Resolution::Stale;
        };

        match outcome {
            Ok(authoritative) => match queued {
                Some(target) if target != authoritative => {
                    self.value = target.clone();
                    let ticket = self.start(authoritative);
                    Resolution::Promoted { ticket, target }
                }
                _ => {
                    self.value = authoritative;
                    Resolution::Confirmed
                }
            },
            Err(error) => {
                self.value = previous;
                Resolution::RolledBack {
                    restored: self.value.clone(),
                    error,
                }
            }
        }
    }

    /// Replaces the displayed value with `authoritative`, dropping any
    /// in-flight or queued change. Outstanding tickets become stale.
    pub fn reset(&mut self, authoritative: T) {
        self.value = authoritative;
        self.phase = Phase::Idle;
        self.generation += 1;
    }

    fn start(&mut self, previous: T) -> Ticket {
        self.generation += 1;
        self.phase = Phase::Pending {
            generation: self.generation,
            previous,
            queued: None,
        };
        Ticket {
            generation: self.generation,
        }
    }
}
