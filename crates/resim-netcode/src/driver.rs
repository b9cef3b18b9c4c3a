//! Per-entity simulation driver
//!
//! One driver wraps one game entity on one participant. The scheduler calls
//! `tick`, then `capture_snapshot`, once per step; `set_snapshot` rewinds
//! the entity before a resimulation or a lag-compensated check. What each
//! call does depends on the role resolved for the entity:
//!
//! - **Authority** runs sequenced commands (or its own input) and stores
//!   confirmed state.
//! - **Input** predicts with local commands and reconciles against
//!   confirmations.
//! - **Observer** copies delayed remote state onto the local timeline.

use crate::interpolation::{ObserverInterpolator, RenderSample};
use crate::reconciliation::{ReconcileOutcome, ReconciliationEngine};
use crate::sequencer::CommandSequencer;
use crate::{inbox, Error, Inbox, InboxSender, NetConfig, NetMessage, Result};
use resim_core::{
    Command, Mode, ModeResolver, Participant, ParticipantId, RoleAssignment, Sequence, SimTime,
    Simulated, Snapshot, Snapshotable, TimeHistory,
};
use resim_history::TimeIndexedHistory;
use tracing::{debug, trace, warn};

/// Something the driver noticed while handling network traffic or rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    /// Confirmations fell behind local history; no new sequences are issued
    PredictionPaused,
    /// A confirmation landed inside local history again
    PredictionResumed,
    /// A prediction was corrected at this local time
    Mispredicted { local_time: SimTime },
    /// A render step was skipped
    InterpolationStarved { render_time: SimTime },
}

/// Counters for one driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Every `tick` call, replays included
    pub ticks: u64,
    /// Ticks run as part of a resimulation
    pub replayed_ticks: u64,
    /// Predictions overwritten by a confirmation
    pub mispredictions: u64,
    /// Predictions confirmed unchanged
    pub confirmations: u64,
    /// Ticks run with a null command while prediction was paused
    pub paused_ticks: u64,
    /// Render steps skipped for lack of remote snapshots
    pub starved_renders: u64,
}

/// Role-specific machinery
enum RoleState<I, S> {
    Authority {
        /// `None` when input is produced locally
        sequencer: Option<CommandSequencer<I>>,
    },
    Input {
        reconciler: ReconciliationEngine,
    },
    Observer {
        interpolator: ObserverInterpolator<S>,
    },
}

/// Drives one entity in its resolved role
pub struct SimulationDriver<E: Simulated> {
    entity: E,
    role: RoleAssignment,
    /// Participant producing this entity's input
    owner: Option<ParticipantId>,
    config: NetConfig,
    /// Captured state keyed by local time
    states: TimeIndexedHistory<Snapshot<E::State>>,
    /// Command applied at each local tick (`None` for ghost or paused ticks)
    inputs: TimeIndexedHistory<Option<Command<E::Input>>>,
    role_state: RoleState<E::Input, E::State>,
    inbox: Inbox<E::Input, E::State>,
    inbox_tx: InboxSender<E::Input, E::State>,
    outbox: Vec<NetMessage<E::Input, E::State>>,
    /// Last sequence issued by this participant
    next_sequence: Sequence,
    /// Sequence of the last command applied to the entity
    last_processed: Sequence,
    remote_now: SimTime,
    ticks_since_send: usize,
    events: Vec<DriverEvent>,
    stats: DriverStats,
}

impl<E: Simulated> SimulationDriver<E> {
    /// Create a driver for an already resolved role
    pub fn new(entity: E, role: RoleAssignment, config: &NetConfig) -> Result<Self> {
        config.validate()?;
        let history = config.history_capacity();
        let role_state = match role.mode {
            Mode::Authority => RoleState::Authority {
                sequencer: (!role.local_input).then(|| CommandSequencer::new(config)),
            },
            Mode::Input => RoleState::Input {
                reconciler: ReconciliationEngine::new(),
            },
            Mode::Observer => RoleState::Observer {
                interpolator: ObserverInterpolator::new(history, config.interpolation_delay()),
            },
        };
        let (inbox_tx, inbox) = inbox(history);

        debug!(mode = %role.mode, local_input = role.local_input, history, "driver created");

        Ok(Self {
            entity,
            role,
            owner: None,
            config: config.clone(),
            states: TimeIndexedHistory::new(history),
            inputs: TimeIndexedHistory::new(history),
            role_state,
            inbox,
            inbox_tx,
            outbox: Vec::new(),
            next_sequence: 0,
            last_processed: 0,
            remote_now: SimTime::ZERO,
            ticks_since_send: 0,
            events: Vec::new(),
            stats: DriverStats::default(),
        })
    }

    /// Create a driver, resolving the role for this participant
    pub fn for_participant(
        entity: E,
        is_owning_producer: bool,
        server_authority: bool,
        participant: Participant,
        config: &NetConfig,
    ) -> Result<Self> {
        let role = ModeResolver::resolve(is_owning_producer, server_authority, participant);
        Self::new(entity, role, config)
    }

    /// Record which participant produces this entity's input
    pub fn with_owner(mut self, owner: ParticipantId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Advance the entity one step
    pub fn tick(&mut self, time: SimTime, is_replay: bool) {
        self.stats.ticks += 1;
        if is_replay {
            self.stats.replayed_ticks += 1;
        }
        match self.role.mode {
            Mode::Authority => self.tick_authority(time, is_replay),
            Mode::Input => self.tick_input(time, is_replay),
            Mode::Observer => self.tick_observer(time, is_replay),
        }
    }

    fn tick_authority(&mut self, time: SimTime, is_replay: bool) {
        if is_replay {
            warn!(%time, "authority asked to replay confirmed history, ignoring");
            return;
        }
        if self.role.local_input {
            let command = self.issue_command(time);
            self.last_processed = command.sequence;
            let stored = self.inputs.add(time, Some(command)).and_then(Option::as_ref);
            self.entity.tick(stored, false);
            return;
        }

        let RoleState::Authority {
            sequencer: Some(sequencer),
        } = &mut self.role_state
        else {
            self.entity.tick(None, false);
            return;
        };
        let mut applied = None;
        for step in sequencer.commands_for_tick() {
            match step.into_command() {
                Some(command) => {
                    self.entity.tick(Some(&command), false);
                    self.last_processed = command.sequence;
                    applied = Some(command);
                }
                None => self.entity.tick(None, false),
            }
        }
        self.inputs.add(time, applied);
    }

    fn tick_input(&mut self, time: SimTime, is_replay: bool) {
        if is_replay {
            let command = self.inputs.get_exact(time).and_then(Option::as_ref);
            if let Some(command) = command {
                self.last_processed = command.sequence;
            }
            self.entity.tick(command, true);
            return;
        }

        let command = if self.is_paused() {
            self.stats.paused_ticks += 1;
            None
        } else {
            Some(self.issue_command(time))
        };
        let stored = self.inputs.add(time, command).and_then(Option::as_ref);
        if let Some(command) = stored {
            self.last_processed = command.sequence;
        }
        self.entity.tick(stored, false);
    }

    fn tick_observer(&mut self, time: SimTime, is_replay: bool) {
        if is_replay {
            if let Some((_, snapshot)) = self.states.get(time) {
                self.entity.restore_state(snapshot);
            }
            return;
        }
        self.entity.tick(None, false);
    }

    fn issue_command(&mut self, time: SimTime) -> Command<E::Input> {
        self.next_sequence += 1;
        let payload = self.entity.produce_input(time);
        Command::new(self.next_sequence, time, payload)
    }

    /// Record the state produced by the last `tick`
    pub fn capture_snapshot(&mut self, time: SimTime, is_replay: bool) {
        match self.role.mode {
            Mode::Authority => {
                if is_replay {
                    return;
                }
                let snapshot = self
                    .entity
                    .capture_state(self.last_processed, time)
                    .into_authoritative();
                self.states.add(time, snapshot);
                self.states.set_authoritative(time, true);
                if self.send_due() {
                    self.queue_snapshot(time);
                }
            }
            Mode::Input => {
                if is_replay && self.states.is_authoritative(time) {
                    trace!(%time, "keeping confirmed entry during replay");
                    return;
                }
                let snapshot = self.entity.capture_state(self.last_processed, time);
                self.states.add(time, snapshot);
                if !is_replay && self.send_due() {
                    self.queue_commands();
                }
            }
            Mode::Observer => {
                if is_replay {
                    if let Some((_, snapshot)) = self.states.get(time) {
                        self.entity.restore_state(snapshot);
                    }
                    return;
                }
                let RoleState::Observer { interpolator } = &self.role_state else {
                    return;
                };
                let Some(latest) = interpolator.latest_elapsed(self.remote_now) else {
                    return;
                };
                let snapshot = latest.clone().retimed(time).into_authoritative();
                self.entity.restore_state(&snapshot);
                self.last_processed = snapshot.last_processed_command;
                self.states.add(time, snapshot);
                self.states.set_authoritative(time, true);
            }
        }
    }

    fn send_due(&mut self) -> bool {
        self.ticks_since_send += 1;
        if self.ticks_since_send < self.config.ticks_per_send() {
            return false;
        }
        self.ticks_since_send = 0;
        self.role.transmits()
    }

    fn queue_snapshot(&mut self, time: SimTime) {
        if let Some(snapshot) = self.states.get_exact(time) {
            self.outbox.push(NetMessage::Snapshot {
                remote_time: time,
                snapshot: snapshot.clone(),
            });
        }
    }

    /// Resend everything the authority has not confirmed yet
    fn queue_commands(&mut self) {
        let RoleState::Input { reconciler } = &self.role_state else {
            return;
        };
        let confirmed = reconciler.last_confirmed().unwrap_or(0);
        let pending = match reconciler.confirmed_time() {
            Some(time) => self.inputs.get_all_after(time),
            None => self.inputs.iter().collect(),
        };
        let commands: Vec<_> = pending
            .into_iter()
            .filter_map(|(_, command)| command.as_ref())
            .filter(|command| command.sequence > confirmed)
            .cloned()
            .collect();
        if !commands.is_empty() {
            trace!(count = commands.len(), "queued commands for send");
            self.outbox.push(NetMessage::Commands(commands));
        }
    }

    /// Restore the entity to the newest state stored at or before `time`
    ///
    /// Returns the time of the restored entry.
    pub fn set_snapshot(&mut self, time: SimTime) -> Result<SimTime> {
        let Some((stored, snapshot)) = self.states.get(time) else {
            return Err(Error::SnapshotNotFound(time));
        };
        self.entity.restore_state(snapshot);
        self.last_processed = snapshot.last_processed_command;
        Ok(stored)
    }

    /// Handle everything queued by the transport since the last poll
    pub fn poll_inbox(&mut self) {
        for message in self.inbox.drain() {
            match message {
                NetMessage::Commands(commands) => self.receive_commands(commands),
                NetMessage::Snapshot {
                    remote_time,
                    snapshot,
                } => self.receive_snapshot(remote_time, snapshot),
            }
        }
    }

    fn receive_commands(&mut self, commands: Vec<Command<E::Input>>) {
        match &mut self.role_state {
            RoleState::Authority {
                sequencer: Some(sequencer),
            } => sequencer.receive_all(commands),
            _ => trace!(mode = %self.role.mode, "ignoring commands"),
        }
    }

    fn receive_snapshot(&mut self, remote_time: SimTime, snapshot: Snapshot<E::State>) {
        match &mut self.role_state {
            RoleState::Input { reconciler } => {
                let was_paused = reconciler.is_paused();
                let outcome = reconciler.reconcile(&mut self.states, &snapshot, E::states_match);
                let paused = reconciler.is_paused();

                match (was_paused, paused) {
                    (false, true) => self.events.push(DriverEvent::PredictionPaused),
                    (true, false) => self.events.push(DriverEvent::PredictionResumed),
                    _ => {}
                }
                match outcome {
                    ReconcileOutcome::Adopted => self.entity.restore_state(&snapshot),
                    ReconcileOutcome::Confirmed { .. } => self.stats.confirmations += 1,
                    ReconcileOutcome::Corrected {
                        local_time,
                        resimulate,
                    } => {
                        self.stats.mispredictions += 1;
                        self.events.push(DriverEvent::Mispredicted { local_time });
                        if !resimulate {
                            // Newest entry: the live entity is the one that diverged
                            if let Some(corrected) = self.states.get_exact(local_time) {
                                self.entity.restore_state(corrected);
                            }
                        }
                    }
                    ReconcileOutcome::Paused
                    | ReconcileOutcome::Unverified
                    | ReconcileOutcome::Stale => {}
                }
            }
            RoleState::Observer { interpolator } => {
                let relay = self.role.relays.then(|| snapshot.clone());
                if interpolator.push_remote(remote_time, snapshot) {
                    if let Some(snapshot) = relay {
                        self.outbox.push(NetMessage::Snapshot {
                            remote_time,
                            snapshot,
                        });
                    }
                }
            }
            RoleState::Authority { .. } => {
                trace!(%remote_time, "authority ignoring remote snapshot");
            }
        }
    }

    /// Blend an observed entity for display
    ///
    /// Returns `Ok(None)` for roles that do not interpolate.
    pub fn render(&mut self, remote_now: SimTime) -> Result<Option<RenderSample>> {
        let RoleState::Observer { interpolator } = &mut self.role_state else {
            return Ok(None);
        };
        match interpolator.render(&mut self.entity, remote_now) {
            Ok(sample) => Ok(Some(sample)),
            Err(err) => {
                if let Error::InterpolationStarved { render_time, .. } = &err {
                    self.stats.starved_renders += 1;
                    self.events.push(DriverEvent::InterpolationStarved {
                        render_time: *render_time,
                    });
                }
                Err(err)
            }
        }
    }

    /// Take the scheduled resimulation start time, if any
    pub fn take_pending_resimulation(&mut self) -> Option<SimTime> {
        match &mut self.role_state {
            RoleState::Input { reconciler } => reconciler.take_pending_resimulation(),
            _ => None,
        }
    }

    /// Stored tick times after `from`, oldest first
    pub fn replay_times(&self, from: SimTime) -> Vec<SimTime> {
        self.states
            .get_all_after(from)
            .into_iter()
            .map(|(time, _)| time)
            .collect()
    }

    /// Update the sender's clock used for observer playback
    pub fn set_remote_clock(&mut self, remote_now: SimTime) {
        self.remote_now = remote_now;
    }

    /// Take everything queued for the transport
    pub fn drain_outgoing(&mut self) -> Vec<NetMessage<E::Input, E::State>> {
        std::mem::take(&mut self.outbox)
    }

    /// Take events raised since the last call
    pub fn drain_events(&mut self) -> Vec<DriverEvent> {
        std::mem::take(&mut self.events)
    }

    /// Handle for transport callbacks to deliver messages to this driver
    pub fn inbox_sender(&self) -> InboxSender<E::Input, E::State> {
        self.inbox_tx.clone()
    }

    /// Messages lost because the inbox was full
    pub fn inbox_dropped(&self) -> u64 {
        self.inbox.dropped()
    }

    /// Whether prediction is paused (input role only)
    pub fn is_paused(&self) -> bool {
        matches!(&self.role_state, RoleState::Input { reconciler } if reconciler.is_paused())
    }

    /// Pending commands in the sequencer (remote-input authority only)
    pub fn pending_commands(&self) -> usize {
        match &self.role_state {
            RoleState::Authority {
                sequencer: Some(sequencer),
            } => sequencer.pending(),
            _ => 0,
        }
    }

    /// Sequencer counters (remote-input authority only)
    pub fn sequencer_stats(&self) -> Option<crate::SequencerStats> {
        match &self.role_state {
            RoleState::Authority {
                sequencer: Some(sequencer),
            } => Some(sequencer.stats()),
            _ => None,
        }
    }

    /// Buffered remote snapshots (observer only)
    pub fn interpolator(&self) -> Option<&ObserverInterpolator<E::State>> {
        match &self.role_state {
            RoleState::Observer { interpolator } => Some(interpolator),
            _ => None,
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }

    pub fn role(&self) -> RoleAssignment {
        self.role
    }

    pub fn mode(&self) -> Mode {
        self.role.mode
    }

    pub fn owner(&self) -> Option<ParticipantId> {
        self.owner
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Captured state keyed by local time
    pub fn states(&self) -> &TimeIndexedHistory<Snapshot<E::State>> {
        &self.states
    }

    /// Applied commands keyed by local time
    pub fn inputs(&self) -> &TimeIndexedHistory<Option<Command<E::Input>>> {
        &self.inputs
    }

    /// Sequence of the last command applied to the entity
    pub fn last_processed(&self) -> Sequence {
        self.last_processed
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config_20hz, Walker};
    use resim_core::TickRate;

    fn times(count: usize) -> Vec<SimTime> {
        let rate = TickRate::new(20).unwrap();
        (0..count).map(|i| rate.tick_time(i as u64)).collect()
    }

    fn run(driver: &mut SimulationDriver<Walker>, ticks: &[SimTime]) {
        for &time in ticks {
            driver.tick(time, false);
            driver.capture_snapshot(time, false);
        }
    }

    fn input_driver() -> SimulationDriver<Walker> {
        SimulationDriver::for_participant(
            Walker::default(),
            true,
            true,
            Participant::Client,
            &config_20hz(),
        )
        .unwrap()
        .with_owner(ParticipantId::new(1))
    }

    #[test]
    fn test_roles_resolved() {
        let config = config_20hz();
        let server =
            SimulationDriver::for_participant(Walker::default(), false, true, Participant::Server, &config)
                .unwrap();
        assert_eq!(server.mode(), Mode::Authority);
        assert!(server.sequencer_stats().is_some());

        let observer =
            SimulationDriver::for_participant(Walker::default(), false, true, Participant::Client, &config)
                .unwrap();
        assert_eq!(observer.mode(), Mode::Observer);
        assert!(observer.interpolator().is_some());

        assert_eq!(input_driver().mode(), Mode::Input);
        assert_eq!(input_driver().owner(), Some(ParticipantId::new(1)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = NetConfig {
            send_interval_ms: 10,
            ..config_20hz()
        };
        assert!(matches!(
            SimulationDriver::for_participant(Walker::default(), true, true, Participant::Client, &config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_input_predicts_and_sends_redundantly() {
        let mut driver = input_driver();
        let ticks = times(4);
        run(&mut driver, &ticks);

        assert_eq!(driver.entity().position, 4.0);
        assert_eq!(driver.last_processed(), 4);
        assert_eq!(driver.states().len(), 4);
        assert_eq!(driver.states().get_exact(ticks[2]).unwrap().last_processed_command, 3);

        // Two ticks per send; each send repeats everything unconfirmed
        let outgoing = driver.drain_outgoing();
        assert_eq!(outgoing.len(), 2);
        match &outgoing[1] {
            NetMessage::Commands(commands) => {
                let sequences: Vec<_> = commands.iter().map(|c| c.sequence).collect();
                assert_eq!(sequences, vec![1, 2, 3, 4]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_input_stops_resending_confirmed_commands() {
        let mut driver = input_driver();
        let ticks = times(6);
        run(&mut driver, &ticks[..4]);
        driver.drain_outgoing();

        let confirmation = Snapshot::new(SimTime::from_millis(5_000), 2, 2.0).into_authoritative();
        driver.inbox_sender().push(NetMessage::Snapshot {
            remote_time: SimTime::from_millis(5_000),
            snapshot: confirmation,
        });
        driver.poll_inbox();
        assert_eq!(driver.stats().confirmations, 1);
        assert!(driver.states().is_authoritative(ticks[1]));

        run(&mut driver, &ticks[4..]);
        match driver.drain_outgoing().as_slice() {
            [NetMessage::Commands(commands)] => {
                let sequences: Vec<_> = commands.iter().map(|c| c.sequence).collect();
                assert_eq!(sequences, vec![3, 4, 5, 6]);
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[test]
    fn test_input_replay_reuses_stored_commands() {
        let mut driver = input_driver();
        driver.entity_mut().script.insert(2, 5.0);
        let ticks = times(3);
        run(&mut driver, &ticks);
        assert_eq!(driver.entity().position, 7.0);
        let issued = driver.entity().issued;

        assert_eq!(driver.set_snapshot(ticks[0]).unwrap(), ticks[0]);
        assert_eq!(driver.entity().position, 1.0);
        for &time in &ticks[1..] {
            driver.tick(time, true);
            driver.capture_snapshot(time, true);
        }

        assert_eq!(driver.entity().position, 7.0);
        assert_eq!(driver.entity().issued, issued);
        assert_eq!(driver.entity().replays, 2);
        assert_eq!(driver.stats().replayed_ticks, 2);
        assert_eq!(driver.last_processed(), 3);
    }

    #[test]
    fn test_input_replay_keeps_confirmed_entries() {
        let mut driver = input_driver();
        let ticks = times(4);
        run(&mut driver, &ticks);

        let confirmation = Snapshot::new(SimTime::from_millis(5_000), 3, 3.0).into_authoritative();
        driver.inbox_sender().push(NetMessage::Snapshot {
            remote_time: SimTime::from_millis(5_000),
            snapshot: confirmation,
        });
        driver.poll_inbox();
        assert!(driver.states().is_authoritative(ticks[2]));

        // Replay from a diverged start so every recaptured tick would differ
        driver.set_snapshot(ticks[0]).unwrap();
        driver.entity_mut().position = 100.0;
        for &time in &ticks[1..] {
            driver.tick(time, true);
            driver.capture_snapshot(time, true);
        }

        let confirmed = driver.states().get_exact(ticks[2]).unwrap();
        assert_eq!(confirmed.state, 3.0);
        assert_eq!(confirmed.last_processed_command, 3);
        assert!(confirmed.authoritative);
        assert!(driver.states().is_authoritative(ticks[2]));

        // Unconfirmed entries on either side were recaptured
        assert_eq!(driver.states().get_exact(ticks[1]).unwrap().state, 101.0);
        assert_eq!(driver.states().get_exact(ticks[3]).unwrap().state, 103.0);
        assert!(!driver.states().is_authoritative(ticks[3]));
    }

    #[test]
    fn test_set_snapshot_on_empty_history() {
        let mut driver = input_driver();
        assert!(matches!(
            driver.set_snapshot(SimTime::from_millis(100)),
            Err(Error::SnapshotNotFound(_))
        ));
    }

    #[test]
    fn test_remote_input_authority_runs_sequenced_commands() {
        let mut driver =
            SimulationDriver::for_participant(Walker::default(), false, true, Participant::Server, &config_20hz())
                .unwrap();
        let commands = (1..=3)
            .map(|seq| Command::new(seq, SimTime::from_millis(seq * 50), 2.0))
            .collect();
        assert!(driver.inbox_sender().push(NetMessage::Commands(commands)));
        driver.poll_inbox();
        assert_eq!(driver.pending_commands(), 3);

        run(&mut driver, &times(4));

        assert_eq!(driver.entity().position, 6.0);
        assert_eq!(driver.last_processed(), 3);
        let stats = driver.sequencer_stats().unwrap();
        assert_eq!(stats.in_order, 3);
        assert_eq!(stats.ghost, 1);

        // Ghost tick stores no command
        assert_eq!(driver.inputs().get_exact(times(4)[3]), Some(&None));

        // Snapshots every second tick, all authoritative
        let outgoing = driver.drain_outgoing();
        assert_eq!(outgoing.len(), 2);
        assert!(driver.states().iter().all(|(_, s)| s.authoritative));
    }

    #[test]
    fn test_authority_ignores_replay() {
        let mut driver =
            SimulationDriver::for_participant(Walker::default(), true, true, Participant::Server, &config_20hz())
                .unwrap();
        let ticks = times(2);
        run(&mut driver, &ticks);
        assert_eq!(driver.entity().position, 2.0);

        driver.tick(ticks[1], true);
        driver.capture_snapshot(ticks[1], true);
        assert_eq!(driver.entity().position, 2.0);
        assert_eq!(driver.entity().replays, 0);
    }

    #[test]
    fn test_co_located_authority_sends_nothing() {
        let mut driver =
            SimulationDriver::for_participant(Walker::default(), true, false, Participant::Host, &config_20hz())
                .unwrap();
        assert_eq!(driver.mode(), Mode::Authority);
        run(&mut driver, &times(6));
        assert_eq!(driver.entity().position, 6.0);
        assert!(driver.drain_outgoing().is_empty());
    }

    #[test]
    fn test_relaying_observer_forwards_snapshots() {
        // Client-authority entity seen from the server
        let mut driver =
            SimulationDriver::for_participant(Walker::default(), false, false, Participant::Server, &config_20hz())
                .unwrap();
        assert!(driver.role().relays);

        let sender = driver.inbox_sender();
        for t in [100u64, 150, 150] {
            sender.push(NetMessage::Snapshot {
                remote_time: SimTime::from_millis(t),
                snapshot: Snapshot::new(SimTime::from_millis(t), t / 50, t as f32),
            });
        }
        driver.poll_inbox();

        // Duplicate not relayed
        assert_eq!(driver.drain_outgoing().len(), 2);
    }
}
