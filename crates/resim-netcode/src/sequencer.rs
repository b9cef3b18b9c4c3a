//! Server-side command sequencing
//!
//! Commands from a remote producer arrive late, duplicated, out of order, or
//! not at all. The sequencer hands the authority exactly one command (or
//! none) per simulation step, filling short gaps with a continuation of the
//! last real command and giving up on a missing sequence once the fill cap
//! is reached.

use crate::NetConfig;
use resim_core::{Command, Sequence};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// Result of offering a command to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferInsert {
    /// Stored for processing
    Buffered,
    /// Same sequence already buffered
    Duplicate,
    /// Sequence already processed
    Late,
    /// Buffer was full; the lowest sequence was evicted (may be this one)
    Evicted(Sequence),
}

/// Pending commands from one producer, ordered by sequence
#[derive(Debug, Clone)]
pub struct CommandBuffer<I> {
    pending: BTreeMap<Sequence, Command<I>>,
    capacity: usize,
}

impl<I> CommandBuffer<I> {
    /// Create a buffer holding at most `capacity` commands
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Offer a command; `last_processed` rejects anything already consumed
    pub fn insert(&mut self, command: Command<I>, last_processed: Sequence) -> BufferInsert {
        if command.sequence <= last_processed {
            return BufferInsert::Late;
        }
        if self.pending.contains_key(&command.sequence) {
            return BufferInsert::Duplicate;
        }
        self.pending.insert(command.sequence, command);
        if self.pending.len() > self.capacity {
            if let Some((evicted, _)) = self.pending.pop_first() {
                return BufferInsert::Evicted(evicted);
            }
        }
        BufferInsert::Buffered
    }

    /// Lowest buffered command
    pub fn peek_lowest(&self) -> Option<&Command<I>> {
        self.pending.values().next()
    }

    /// Remove and return the lowest buffered command
    pub fn pop_lowest(&mut self) -> Option<Command<I>> {
        self.pending.pop_first().map(|(_, cmd)| cmd)
    }

    /// Number of buffered commands
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Maximum number of buffered commands
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every buffered command
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// What the authority should run for one step
#[derive(Debug, Clone, PartialEq)]
pub enum SequencedCommand<I> {
    /// The expected next command
    InOrder(Command<I>),
    /// The last real command renumbered to fill a gap
    Synthesized(Command<I>),
    /// A command ahead of sequence, accepted after the fill cap was reached
    GapAccepted(Command<I>),
    /// Nothing pending: tick with no input
    Ghost,
}

impl<I> SequencedCommand<I> {
    /// The command to apply, if any
    pub fn command(&self) -> Option<&Command<I>> {
        match self {
            SequencedCommand::InOrder(cmd)
            | SequencedCommand::Synthesized(cmd)
            | SequencedCommand::GapAccepted(cmd) => Some(cmd),
            SequencedCommand::Ghost => None,
        }
    }

    /// Take the command to apply, if any
    pub fn into_command(self) -> Option<Command<I>> {
        match self {
            SequencedCommand::InOrder(cmd)
            | SequencedCommand::Synthesized(cmd)
            | SequencedCommand::GapAccepted(cmd) => Some(cmd),
            SequencedCommand::Ghost => None,
        }
    }

    /// Whether this is a tick without input
    pub fn is_ghost(&self) -> bool {
        matches!(self, SequencedCommand::Ghost)
    }
}

/// Counters for sequencing decisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencerStats {
    /// Commands consumed at the expected sequence
    pub in_order: u64,
    /// Continuation commands made up to cover a gap
    pub synthesized: u64,
    /// Commands run ahead of sequence once the fill cap was reached
    pub gap_accepted: u64,
    /// Ticks run with no command available
    pub ghost: u64,
    /// Commands already buffered when they arrived again
    pub duplicates: u64,
    /// Commands at or below the last processed sequence
    pub late: u64,
    /// Commands pushed out of a full buffer
    pub evicted: u64,
    /// Backlog commands skipped while catch-up is disabled
    pub dropped_backlog: u64,
}

/// Orders and gap-fills commands from one remote producer
#[derive(Debug, Clone)]
pub struct CommandSequencer<I> {
    buffer: CommandBuffer<I>,
    /// Highest sequence consumed (or synthesized)
    last_processed: Sequence,
    /// Last command that actually arrived from the producer
    last_received: Option<Command<I>>,
    /// Consecutive synthesized commands in the current gap
    fill_count: usize,
    max_fill: usize,
    target_size: usize,
    catch_up: bool,
    max_catch_up_per_tick: usize,
    max_dropped_per_tick: usize,
    stats: SequencerStats,
}

impl<I: Clone> CommandSequencer<I> {
    /// Create a sequencer sized from the session configuration
    pub fn new(config: &NetConfig) -> Self {
        Self {
            buffer: CommandBuffer::new(config.command_buffer_capacity()),
            last_processed: 0,
            last_received: None,
            fill_count: 0,
            max_fill: config.max_predicted_fill(),
            target_size: config.target_command_buffer(),
            catch_up: config.catch_up,
            max_catch_up_per_tick: config.max_catch_up_per_tick,
            max_dropped_per_tick: config.max_dropped_per_tick,
            stats: SequencerStats::default(),
        }
    }

    /// Offer a command received from the network
    ///
    /// Duplicates and already-processed sequences are dropped silently.
    pub fn receive(&mut self, command: Command<I>) -> BufferInsert {
        let sequence = command.sequence;
        let result = self.buffer.insert(command, self.last_processed);
        match result {
            BufferInsert::Buffered => {}
            BufferInsert::Duplicate => {
                self.stats.duplicates += 1;
                trace!(sequence, "duplicate command dropped");
            }
            BufferInsert::Late => {
                self.stats.late += 1;
                trace!(sequence, last_processed = self.last_processed, "late command dropped");
            }
            BufferInsert::Evicted(evicted) => {
                self.stats.evicted += 1;
                warn!(
                    evicted,
                    capacity = self.buffer.capacity(),
                    "command buffer full, evicted oldest command"
                );
            }
        }
        result
    }

    /// Offer a batch of commands (e.g. one redundant network packet)
    pub fn receive_all(&mut self, commands: impl IntoIterator<Item = Command<I>>) {
        for command in commands {
            self.receive(command);
        }
    }

    /// Decide what to run for one step
    pub fn next(&mut self) -> SequencedCommand<I> {
        let Some(lowest) = self.buffer.peek_lowest() else {
            self.stats.ghost += 1;
            return SequencedCommand::Ghost;
        };
        let expected = self.last_processed + 1;

        if lowest.sequence == expected {
            let Some(command) = self.buffer.pop_lowest() else {
                return SequencedCommand::Ghost;
            };
            self.consume(&command);
            self.stats.in_order += 1;
            return SequencedCommand::InOrder(command);
        }

        if self.fill_count < self.max_fill {
            if let Some(last) = &self.last_received {
                let filled = last.renumbered(expected);
                self.last_processed = expected;
                self.fill_count += 1;
                self.stats.synthesized += 1;
                debug!(
                    sequence = expected,
                    from = last.sequence,
                    fill = self.fill_count,
                    "synthesized missing command"
                );
                return SequencedCommand::Synthesized(filled);
            }
        }

        let Some(command) = self.buffer.pop_lowest() else {
            return SequencedCommand::Ghost;
        };
        debug!(
            expected,
            sequence = command.sequence,
            "accepting sequence gap"
        );
        self.consume(&command);
        self.stats.gap_accepted += 1;
        SequencedCommand::GapAccepted(command)
    }

    /// Decide what to run for one driver tick, including backlog handling
    ///
    /// Always yields at least one entry. When the buffer holds more than the
    /// target, either extra commands are run (catch-up) or the oldest excess
    /// commands are dropped.
    pub fn commands_for_tick(&mut self) -> Vec<SequencedCommand<I>> {
        let backlog = self.buffer.len().saturating_sub(self.target_size);
        let mut extra = 0;
        if backlog > 0 {
            if self.catch_up {
                extra = backlog.min(self.max_catch_up_per_tick);
            } else {
                self.drop_backlog(backlog.min(self.max_dropped_per_tick));
            }
        }

        let mut batch = Vec::with_capacity(extra + 1);
        batch.push(self.next());
        for _ in 0..extra {
            if self.buffer.is_empty() {
                break;
            }
            batch.push(self.next());
        }
        batch
    }

    fn consume(&mut self, command: &Command<I>) {
        self.last_processed = command.sequence;
        self.last_received = Some(command.clone());
        self.fill_count = 0;
    }

    fn drop_backlog(&mut self, count: usize) {
        for _ in 0..count {
            let Some(command) = self.buffer.pop_lowest() else {
                break;
            };
            debug!(sequence = command.sequence, "dropping backlog command");
            self.consume(&command);
            self.stats.dropped_backlog += 1;
        }
    }

    /// Highest sequence consumed or synthesized so far
    pub fn last_processed(&self) -> Sequence {
        self.last_processed
    }

    /// Number of buffered commands
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Maximum consecutive synthesized commands
    pub fn max_fill(&self) -> usize {
        self.max_fill
    }

    /// Sequencing counters
    pub fn stats(&self) -> SequencerStats {
        self.stats
    }
}
