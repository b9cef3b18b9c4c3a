//! Scheduler - Fixed-step coordinator for every simulated entity
//!
//! The scheduler is an explicit object owned by the session. It owns the
//! local clock, a registry of drivers, and the order of operations within
//! one frame:
//!
//! 1. Drain each driver's inbox and run any scheduled resimulation inline.
//! 2. Tick and capture every driver at the current time.
//! 3. Advance the clock by one tick interval.
//!
//! Rendering and lag-compensated checks are separate calls the session makes
//! at its own points in the frame.

use crate::driver::{DriverEvent, SimulationDriver};
use crate::interpolation::RenderSample;
use crate::lag_compensation::{LagCompensator, RollbackRequest};
use crate::{Error, NetConfig, Result};
use indexmap::IndexMap;
use resim_core::{Mode, ParticipantId, SimTime, Simulated, TickRate};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use tracing::{debug, info, warn};

/// Handle for a registered entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle(pub u64);

impl EntityHandle {
    /// Get the raw handle value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Lifecycle notifications delivered to `on_event` listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Stored ticks were replayed after a correction
    Resimulated {
        entity: EntityHandle,
        from: SimTime,
        ticks: usize,
    },
    PredictionPaused {
        entity: EntityHandle,
    },
    PredictionResumed {
        entity: EntityHandle,
    },
    Mispredicted {
        entity: EntityHandle,
        local_time: SimTime,
    },
    InterpolationStarved {
        entity: EntityHandle,
        render_time: SimTime,
    },
    /// An entity was rewound for a lag-compensated check
    RolledBack {
        entity: EntityHandle,
        requested: SimTime,
        restored: SimTime,
    },
}

impl SchedulerEvent {
    fn from_driver(entity: EntityHandle, event: DriverEvent) -> Self {
        match event {
            DriverEvent::PredictionPaused => SchedulerEvent::PredictionPaused { entity },
            DriverEvent::PredictionResumed => SchedulerEvent::PredictionResumed { entity },
            DriverEvent::Mispredicted { local_time } => {
                SchedulerEvent::Mispredicted { entity, local_time }
            }
            DriverEvent::InterpolationStarved { render_time } => {
                SchedulerEvent::InterpolationStarved {
                    entity,
                    render_time,
                }
            }
        }
    }
}

/// Object-safe view of a driver, whatever its entity type
pub trait ScheduledEntity: Any {
    fn mode(&self) -> Mode;
    fn owner(&self) -> Option<ParticipantId>;
    fn set_remote_clock(&mut self, remote_now: SimTime);
    fn poll_inbox(&mut self);
    fn tick(&mut self, time: SimTime, is_replay: bool);
    fn capture_snapshot(&mut self, time: SimTime, is_replay: bool);
    fn set_snapshot(&mut self, time: SimTime) -> Result<SimTime>;
    fn take_pending_resimulation(&mut self) -> Option<SimTime>;
    fn replay_times(&self, from: SimTime) -> Vec<SimTime>;
    fn render(&mut self, remote_now: SimTime) -> Result<Option<RenderSample>>;
    fn drain_events(&mut self) -> Vec<DriverEvent>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E> ScheduledEntity for SimulationDriver<E>
where
    E: Simulated + 'static,
    E::Input: 'static,
    E::State: 'static,
{
    fn mode(&self) -> Mode {
        SimulationDriver::mode(self)
    }

    fn owner(&self) -> Option<ParticipantId> {
        SimulationDriver::owner(self)
    }

    fn set_remote_clock(&mut self, remote_now: SimTime) {
        SimulationDriver::set_remote_clock(self, remote_now)
    }

    fn poll_inbox(&mut self) {
        SimulationDriver::poll_inbox(self)
    }

    fn tick(&mut self, time: SimTime, is_replay: bool) {
        SimulationDriver::tick(self, time, is_replay)
    }

    fn capture_snapshot(&mut self, time: SimTime, is_replay: bool) {
        SimulationDriver::capture_snapshot(self, time, is_replay)
    }

    fn set_snapshot(&mut self, time: SimTime) -> Result<SimTime> {
        SimulationDriver::set_snapshot(self, time)
    }

    fn take_pending_resimulation(&mut self) -> Option<SimTime> {
        SimulationDriver::take_pending_resimulation(self)
    }

    fn replay_times(&self, from: SimTime) -> Vec<SimTime> {
        SimulationDriver::replay_times(self, from)
    }

    fn render(&mut self, remote_now: SimTime) -> Result<Option<RenderSample>> {
        SimulationDriver::render(self, remote_now)
    }

    fn drain_events(&mut self) -> Vec<DriverEvent> {
        SimulationDriver::drain_events(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type Listener = Box<dyn FnMut(&SchedulerEvent)>;

/// Runs every registered entity at a fixed rate
///
/// ```
/// use resim_core::SimTime;
/// use resim_netcode::{NetConfig, SimulationScheduler};
///
/// let mut scheduler = SimulationScheduler::new(NetConfig::default()).unwrap();
/// assert_eq!(scheduler.entity_count(), 0);
///
/// let ticked = scheduler.advance(SimTime::ZERO);
/// assert_eq!(ticked, SimTime::ZERO);
/// assert_eq!(scheduler.tick_index(), 1);
/// ```
pub struct SimulationScheduler {
    config: NetConfig,
    rate: TickRate,
    /// Index of the next tick to run
    tick_index: u64,
    /// Time of the last completed tick
    last_tick: Option<SimTime>,
    entities: IndexMap<EntityHandle, Box<dyn ScheduledEntity>>,
    next_handle: u64,
    listeners: Vec<Listener>,
    lag: LagCompensator,
}

impl SimulationScheduler {
    /// Create a scheduler for one session
    pub fn new(config: NetConfig) -> Result<Self> {
        config.validate()?;
        let rate = TickRate::new(config.tick_rate)?;
        info!(
            tick_rate = config.tick_rate,
            send_interval_ms = config.send_interval_ms,
            "scheduler created"
        );
        Ok(Self {
            lag: LagCompensator::from_config(&config),
            config,
            rate,
            tick_index: 0,
            last_tick: None,
            entities: IndexMap::new(),
            next_handle: 0,
            listeners: Vec::new(),
        })
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Activate a driver; it runs from the next frame on
    pub fn register<E>(&mut self, driver: SimulationDriver<E>) -> EntityHandle
    where
        E: Simulated + 'static,
        E::Input: 'static,
        E::State: 'static,
    {
        let handle = EntityHandle(self.next_handle);
        self.next_handle += 1;
        debug!(entity = %handle, mode = %driver.mode(), "entity registered");
        self.entities.insert(handle, Box::new(driver));
        handle
    }

    /// Deactivate an entity, dropping its histories
    pub fn unregister(&mut self, handle: EntityHandle) -> Result<()> {
        if self.entities.shift_remove(&handle).is_none() {
            return Err(Error::UnknownEntity(handle));
        }
        debug!(entity = %handle, "entity unregistered");
        Ok(())
    }

    /// Typed access to a registered driver
    pub fn driver<E>(&self, handle: EntityHandle) -> Result<&SimulationDriver<E>>
    where
        E: Simulated + 'static,
        E::Input: 'static,
        E::State: 'static,
    {
        self.entities
            .get(&handle)
            .ok_or(Error::UnknownEntity(handle))?
            .as_any()
            .downcast_ref()
            .ok_or(Error::EntityTypeMismatch(handle))
    }

    /// Typed mutable access to a registered driver
    pub fn driver_mut<E>(&mut self, handle: EntityHandle) -> Result<&mut SimulationDriver<E>>
    where
        E: Simulated + 'static,
        E::Input: 'static,
        E::State: 'static,
    {
        self.entities
            .get_mut(&handle)
            .ok_or(Error::UnknownEntity(handle))?
            .as_any_mut()
            .downcast_mut()
            .ok_or(Error::EntityTypeMismatch(handle))
    }

    /// Register a listener; listeners run synchronously in registration order
    pub fn on_event(&mut self, listener: impl FnMut(&SchedulerEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, events: Vec<SchedulerEvent>) {
        for event in &events {
            for listener in &mut self.listeners {
                listener(event);
            }
        }
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Deliver queued network traffic and run pending resimulations
    ///
    /// `advance` does this first; call it directly to react to traffic
    /// between frames.
    pub fn poll_network(&mut self, remote_now: SimTime) {
        let mut events = Vec::new();
        for (&handle, entity) in self.entities.iter_mut() {
            entity.set_remote_clock(remote_now);
            entity.poll_inbox();
            events.extend(
                entity
                    .drain_events()
                    .into_iter()
                    .map(|event| SchedulerEvent::from_driver(handle, event)),
            );
            if let Some(from) = entity.take_pending_resimulation() {
                match resimulate(&mut **entity, from) {
                    Ok(ticks) => {
                        debug!(entity = %handle, %from, ticks, "resimulated");
                        events.push(SchedulerEvent::Resimulated {
                            entity: handle,
                            from,
                            ticks,
                        });
                    }
                    Err(err) => warn!(entity = %handle, %from, error = %err, "resimulation skipped"),
                }
            }
        }
        self.emit(events);
    }

    /// Run one frame and return the time that was ticked
    pub fn advance(&mut self, remote_now: SimTime) -> SimTime {
        self.poll_network(remote_now);
        let now = self.now();
        for entity in self.entities.values_mut() {
            entity.tick(now, false);
            entity.capture_snapshot(now, false);
        }
        self.last_tick = Some(now);
        self.tick_index += 1;
        now
    }

    /// Interpolate every observed entity; returns how many were rendered
    ///
    /// Starved entities are skipped and reported through `on_event`.
    pub fn render(&mut self, remote_now: SimTime) -> usize {
        let mut rendered = 0;
        let mut events = Vec::new();
        for (&handle, entity) in self.entities.iter_mut() {
            match entity.render(remote_now) {
                Ok(Some(_)) => rendered += 1,
                Ok(None) => {}
                Err(err) => debug!(entity = %handle, error = %err, "render skipped"),
            }
            events.extend(
                entity
                    .drain_events()
                    .into_iter()
                    .map(|event| SchedulerEvent::from_driver(handle, event)),
            );
        }
        self.emit(events);
        rendered
    }

    /// Rewind `targets` as `request.requester` saw them, run `check`, then
    /// restore every target to the present
    ///
    /// Targets with no stored state are left as they are.
    pub fn with_rollback<R>(
        &mut self,
        request: &RollbackRequest,
        targets: &[EntityHandle],
        check: impl FnOnce(&mut Self) -> R,
    ) -> Result<R> {
        if let Some(missing) = targets.iter().find(|h| !self.entities.contains_key(*h)) {
            return Err(Error::UnknownEntity(*missing));
        }
        let present = self.last_tick.unwrap_or_else(|| self.now());

        let mut events = Vec::new();
        for &handle in targets {
            let Some(entity) = self.entities.get_mut(&handle) else {
                continue;
            };
            let requested = self.lag.rollback_time(request, entity.owner(), present);
            match entity.set_snapshot(requested) {
                Ok(restored) => events.push(SchedulerEvent::RolledBack {
                    entity: handle,
                    requested,
                    restored,
                }),
                Err(err) => debug!(entity = %handle, error = %err, "nothing to roll back"),
            }
        }
        self.emit(events);

        let result = check(self);

        for &handle in targets {
            if let Some(entity) = self.entities.get_mut(&handle) {
                if let Err(err) = entity.set_snapshot(present) {
                    debug!(entity = %handle, error = %err, "nothing to restore");
                }
            }
        }
        Ok(result)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Time of the next tick
    pub fn now(&self) -> SimTime {
        self.rate.tick_time(self.tick_index)
    }

    /// Index of the next tick
    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    /// Time of the last completed tick
    pub fn last_tick(&self) -> Option<SimTime> {
        self.last_tick
    }

    pub fn rate(&self) -> TickRate {
        self.rate
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn lag_compensator(&self) -> &LagCompensator {
        &self.lag
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Registered handles in registration order
    pub fn handles(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.entities.keys().copied()
    }
}

/// Replay every stored tick after `from`, starting from the state stored there
fn resimulate(entity: &mut dyn ScheduledEntity, from: SimTime) -> Result<usize> {
    entity.set_snapshot(from)?;
    let times = entity.replay_times(from);
    for &time in &times {
        entity.tick(time, true);
        entity.capture_snapshot(time, true);
    }
    Ok(times.len())
}
