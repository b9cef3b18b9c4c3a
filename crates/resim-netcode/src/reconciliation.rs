//! Client-side reconciliation
//!
//! Runs on the input role whenever an authoritative snapshot arrives. The
//! authoritative snapshot is matched to the local prediction by command
//! sequence, not by time: the two clocks are unrelated. A correction is
//! written at the *local* capture time so the local timeline stays aligned,
//! and the ticks after it are scheduled for resimulation.

use resim_core::{Sequence, SimTime, Snapshot, TimeHistory};
use resim_history::TimeIndexedHistory;
use tracing::{debug, info, trace};

/// What a confirmation did to local history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No local prediction existed yet; adopt the authoritative state directly
    Adopted,
    /// The confirmation predates every stored prediction; prediction paused
    Paused,
    /// The matching prediction is gone; assumed correct
    Unverified,
    /// The prediction matched and is now authoritative
    Confirmed { local_time: SimTime },
    /// The prediction diverged and was overwritten with the authoritative state
    Corrected {
        local_time: SimTime,
        /// Whether later ticks exist and must be replayed
        resimulate: bool,
    },
    /// Not newer than the last confirmation; ignored
    Stale,
}

/// Misprediction detection and resimulation scheduling
#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    paused: bool,
    pending_resimulation: Option<SimTime>,
    last_confirmed: Option<Sequence>,
    confirmed_time: Option<SimTime>,
    mispredictions: u64,
    confirmations: u64,
}

impl ReconciliationEngine {
    /// Create an engine with no confirmations yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile local history against an authoritative snapshot
    ///
    /// `matches` is the game's equality/margin check between the predicted
    /// and authoritative state. Any previously scheduled resimulation is
    /// superseded by the result of this call.
    pub fn reconcile<S: Clone>(
        &mut self,
        history: &mut TimeIndexedHistory<Snapshot<S>>,
        authoritative: &Snapshot<S>,
        matches: impl Fn(&S, &S) -> bool,
    ) -> ReconcileOutcome {
        let sequence = authoritative.last_processed_command;
        if self.last_confirmed.is_some_and(|last| sequence <= last) {
            trace!(sequence, "stale confirmation dropped");
            return ReconcileOutcome::Stale;
        }
        self.last_confirmed = Some(sequence);
        self.pending_resimulation = None;

        let Some((_, oldest)) = history.oldest() else {
            debug!(sequence, "no local prediction yet, adopting authoritative state");
            return ReconcileOutcome::Adopted;
        };

        // Sequence 0 confirms no command: there was never a prediction to evict
        if sequence > 0 && oldest.last_processed_command > sequence {
            if !self.paused {
                info!(
                    sequence,
                    oldest = oldest.last_processed_command,
                    "confirmation older than local history, pausing prediction"
                );
            }
            self.paused = true;
            return ReconcileOutcome::Paused;
        }

        let predicted = history
            .find(|snap| snap.last_processed_command == sequence)
            .map(|(time, snap)| (time, snap.clone()));
        let Some((local_time, predicted)) = predicted else {
            trace!(sequence, "no local prediction for confirmed sequence");
            self.resume();
            return ReconcileOutcome::Unverified;
        };

        self.resume();
        self.confirmed_time = Some(local_time);

        if matches(&predicted.state, &authoritative.state) {
            self.confirmations += 1;
            history.overwrite(local_time, predicted.into_authoritative());
            history.set_authoritative(local_time, true);
            trace!(sequence, %local_time, "prediction confirmed");
            return ReconcileOutcome::Confirmed { local_time };
        }

        self.mispredictions += 1;
        history.overwrite(
            local_time,
            authoritative.clone().retimed(local_time).into_authoritative(),
        );
        history.set_authoritative(local_time, true);

        let resimulate = history
            .newest()
            .is_some_and(|(newest, _)| newest > local_time);
        if resimulate {
            self.pending_resimulation = Some(local_time);
        }
        debug!(sequence, %local_time, resimulate, "misprediction corrected");
        ReconcileOutcome::Corrected {
            local_time,
            resimulate,
        }
    }

    fn resume(&mut self) {
        if self.paused {
            info!("prediction resumed");
            self.paused = false;
        }
    }

    /// Take the scheduled resimulation start time, if any
    pub fn take_pending_resimulation(&mut self) -> Option<SimTime> {
        self.pending_resimulation.take()
    }

    /// Scheduled resimulation start time, if any
    pub fn pending_resimulation(&self) -> Option<SimTime> {
        self.pending_resimulation
    }

    /// Whether new sequence numbers are currently withheld
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Sequence of the newest handled confirmation
    pub fn last_confirmed(&self) -> Option<Sequence> {
        self.last_confirmed
    }

    /// Local time of the newest prediction matched to a confirmation
    pub fn confirmed_time(&self) -> Option<SimTime> {
        self.confirmed_time
    }

    /// Number of corrected predictions
    pub fn mispredictions(&self) -> u64 {
        self.mispredictions
    }

    /// Number of predictions confirmed as-is
    pub fn confirmations(&self) -> u64 {
        self.confirmations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> SimTime {
        SimTime::from_millis(v)
    }

    fn close(a: &f32, b: &f32) -> bool {
        (a - b).abs() < 0.01
    }

    /// Predicted history: sequence n at n*50ms with position n
    fn predicted(sequences: std::ops::RangeInclusive<u64>, capacity: usize) -> TimeIndexedHistory<Snapshot<f32>> {
        let mut history = TimeIndexedHistory::new(capacity);
        for seq in sequences {
            history.add(ms(seq * 50), Snapshot::new(ms(seq * 50), seq, seq as f32));
        }
        history
    }

    fn server(sequence: Sequence, position: f32) -> Snapshot<f32> {
        // Server clock is unrelated to the client's
        Snapshot::new(ms(10_000 + sequence * 50), sequence, position).into_authoritative()
    }

    #[test]
    fn test_empty_history_adopts() {
        let mut engine = ReconciliationEngine::new();
        let mut history = TimeIndexedHistory::new(8);
        assert_eq!(
            engine.reconcile(&mut history, &server(0, 1.0), close),
            ReconcileOutcome::Adopted
        );
        assert_eq!(engine.last_confirmed(), Some(0));
    }

    #[test]
    fn test_matching_prediction_is_confirmed() {
        let mut engine = ReconciliationEngine::new();
        let mut history = predicted(0..=5, 16);

        let outcome = engine.reconcile(&mut history, &server(2, 2.001), close);

        assert_eq!(outcome, ReconcileOutcome::Confirmed { local_time: ms(100) });
        assert!(history.is_authoritative(ms(100)));
        assert!(history.get_exact(ms(100)).unwrap().authoritative);
        // The predicted value is kept
        assert_eq!(history.get_exact(ms(100)).unwrap().state, 2.0);
        assert!(engine.take_pending_resimulation().is_none());
        assert_eq!(engine.confirmations(), 1);
    }

    #[test]
    fn test_misprediction_overwrites_at_local_time() {
        let mut engine = ReconciliationEngine::new();
        let mut history = predicted(0..=5, 16);

        let outcome = engine.reconcile(&mut history, &server(2, 7.5), close);

        assert_eq!(
            outcome,
            ReconcileOutcome::Corrected {
                local_time: ms(100),
                resimulate: true
            }
        );
        let corrected = history.get_exact(ms(100)).unwrap();
        assert_eq!(corrected.state, 7.5);
        assert_eq!(corrected.local_time, ms(100));
        assert!(corrected.authoritative);
        assert!(history.is_authoritative(ms(100)));
        assert_eq!(engine.take_pending_resimulation(), Some(ms(100)));
        assert!(engine.take_pending_resimulation().is_none());
        assert_eq!(engine.mispredictions(), 1);
    }

    #[test]
    fn test_misprediction_on_newest_needs_no_replay() {
        let mut engine = ReconciliationEngine::new();
        let mut history = predicted(1..=10, 16);

        let outcome = engine.reconcile(&mut history, &server(10, 9.7), close);

        assert_eq!(
            outcome,
            ReconcileOutcome::Corrected {
                local_time: ms(500),
                resimulate: false
            }
        );
        assert!(engine.pending_resimulation().is_none());
    }

    #[test]
    fn test_missing_prediction_is_unverified() {
        let mut engine = ReconciliationEngine::new();
        let mut history = TimeIndexedHistory::new(16);
        history.add(ms(0), Snapshot::new(ms(0), 1, 1.0));
        history.add(ms(50), Snapshot::new(ms(50), 3, 3.0));

        assert_eq!(
            engine.reconcile(&mut history, &server(2, 99.0), close),
            ReconcileOutcome::Unverified
        );
        assert!(!history.is_authoritative(ms(0)));
        assert!(!history.is_authoritative(ms(50)));
    }

    #[test]
    fn test_stale_confirmation_ignored() {
        let mut engine = ReconciliationEngine::new();
        let mut history = predicted(0..=5, 16);

        engine.reconcile(&mut history, &server(3, 3.0), close);
        assert_eq!(
            engine.reconcile(&mut history, &server(2, 50.0), close),
            ReconcileOutcome::Stale
        );
        assert_eq!(
            engine.reconcile(&mut history, &server(3, 50.0), close),
            ReconcileOutcome::Stale
        );
        assert_eq!(history.get_exact(ms(100)).unwrap().state, 2.0);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut engine = ReconciliationEngine::new();
        // Buffer only holds sequences 6..=9
        let mut history = predicted(1..=9, 4);

        assert_eq!(
            engine.reconcile(&mut history, &server(2, 2.0), close),
            ReconcileOutcome::Paused
        );
        assert!(engine.is_paused());

        assert_eq!(
            engine.reconcile(&mut history, &server(7, 7.0), close),
            ReconcileOutcome::Confirmed { local_time: ms(350) }
        );
        assert!(!engine.is_paused());
    }

    #[test]
    fn test_confirmation_before_first_command_does_not_pause() {
        let mut engine = ReconciliationEngine::new();
        let mut history = predicted(1..=2, 16);

        assert_eq!(
            engine.reconcile(&mut history, &server(0, 0.0), close),
            ReconcileOutcome::Unverified
        );
        assert!(!engine.is_paused());
        assert!(!history.is_authoritative(ms(50)));

        // The first real confirmation is still handled
        assert_eq!(
            engine.reconcile(&mut history, &server(1, 1.0), close),
            ReconcileOutcome::Confirmed { local_time: ms(50) }
        );
    }

    #[test]
    fn test_later_confirmation_supersedes_pending() {
        let mut engine = ReconciliationEngine::new();
        let mut history = predicted(0..=5, 16);

        engine.reconcile(&mut history, &server(1, 40.0), close);
        assert_eq!(engine.pending_resimulation(), Some(ms(50)));

        // Next confirmation matches: the earlier replay is no longer acted on
        engine.reconcile(&mut history, &server(3, 3.0), close);
        assert!(engine.pending_resimulation().is_none());

        // And a later misprediction replaces it
        engine.reconcile(&mut history, &server(4, 41.0), close);
        assert_eq!(engine.pending_resimulation(), Some(ms(200)));
    }

    #[test]
    fn test_paused_null_ticks_match_oldest_entry() {
        let mut engine = ReconciliationEngine::new();
        let mut history = TimeIndexedHistory::new(8);
        // Sequence 4 repeated while paused
        for (i, seq) in [3u64, 4, 4, 4].iter().enumerate() {
            let t = ms(i as u64 * 50);
            history.add(t, Snapshot::new(t, *seq, *seq as f32));
        }

        assert_eq!(
            engine.reconcile(&mut history, &server(4, 4.0), close),
            ReconcileOutcome::Confirmed { local_time: ms(50) }
        );
    }
}
