//! Lag Scenario Demo
//!
//! Runs one kart on three participants in a single process:
//!
//! - the **server** simulates it from the client's commands (Authority)
//! - the **client** owns it and predicts locally (Input)
//! - a second client watches it (Observer)
//!
//! Messages travel over an in-memory link with fixed latency and periodic
//! loss, so the run shows gap filling, corrections with resimulation, and
//! observer playback. Settings come from `net.ron`; pass another RON config
//! path to use that instead. Set `RUST_LOG` to change verbosity.

mod kart;
mod link;

use kart::{Kart, KartState};
use link::LossyLink;
use resim_core::{Participant, ParticipantId};
use resim_netcode::{
    EntityHandle, NetConfig, Result, SchedulerEvent, SimulationDriver, SimulationScheduler,
    TimeHistory,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const FRAMES: u64 = 120;
const OWNER: ParticipantId = ParticipantId(1);

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,resim_netcode=debug"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_timer(fmt::time::uptime()),
        )
        .init();
}

/// Settings shipped next to the demo
const DEFAULT_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/net.ron");

fn load_config() -> Result<NetConfig> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    info!(%path, "loading config");
    NetConfig::load(path)
}

/// Count events by kind for the summary
fn track(scheduler: &mut SimulationScheduler) -> Rc<RefCell<[u64; 3]>> {
    let counts = Rc::new(RefCell::new([0u64; 3]));
    let sink = Rc::clone(&counts);
    scheduler.on_event(move |event| {
        let mut counts = sink.borrow_mut();
        match event {
            SchedulerEvent::Mispredicted { .. } => counts[0] += 1,
            SchedulerEvent::Resimulated { .. } => counts[1] += 1,
            SchedulerEvent::InterpolationStarved { .. } => counts[2] += 1,
            _ => {}
        }
    });
    counts
}

fn kart(scheduler: &SimulationScheduler, handle: EntityHandle) -> Result<&SimulationDriver<Kart>> {
    scheduler.driver::<Kart>(handle)
}

fn main() -> Result<()> {
    init_logging();
    let config = load_config()?;

    println!("=== Resim Lag Scenario ===\n");
    println!(
        "tick rate {} Hz, send every {} ms, {} ticks of history\n",
        config.tick_rate,
        config.send_interval_ms,
        config.history_capacity()
    );

    let mut server = SimulationScheduler::new(config.clone())?;
    let mut client = SimulationScheduler::new(config.clone())?;
    let mut observer = SimulationScheduler::new(config.clone())?;

    let on_server = server.register(
        SimulationDriver::for_participant(Kart::default(), false, true, Participant::Server, &config)?
            .with_owner(OWNER),
    );
    let on_client = client.register(
        SimulationDriver::for_participant(Kart::default(), true, true, Participant::Client, &config)?
            .with_owner(OWNER),
    );
    let on_observer = observer.register(
        SimulationDriver::for_participant(Kart::default(), false, true, Participant::Client, &config)?
            .with_owner(OWNER),
    );

    let to_server = kart(&server, on_server)?.inbox_sender();
    let to_client = kart(&client, on_client)?.inbox_sender();
    let to_observer = kart(&observer, on_observer)?.inbox_sender();

    // Two frames each way, every 7th message lost
    let mut uplink: LossyLink<f32, KartState> = LossyLink::new("uplink", 2, 7);
    let mut downlink: LossyLink<f32, KartState> = LossyLink::new("downlink", 2, 7);
    let mut observer_link: LossyLink<f32, KartState> = LossyLink::new("observer", 3, 7);

    let client_counts = track(&mut client);
    let observer_counts = track(&mut observer);

    for frame in 0..FRAMES {
        let server_now = server.now();

        downlink.deliver(frame, &to_client);
        client.advance(server_now);
        for message in outgoing(&mut client, on_client)? {
            uplink.send(frame, message);
        }

        uplink.deliver(frame, &to_server);
        let ticked = server.advance(server_now);
        for message in outgoing(&mut server, on_server)? {
            downlink.send(frame, message.clone());
            observer_link.send(frame, message);
        }

        observer_link.deliver(frame, &to_observer);
        observer.advance(ticked);
        observer.render(ticked);

        if frame % 20 == 19 {
            let (s, c, o) = (
                kart(&server, on_server)?,
                kart(&client, on_client)?,
                kart(&observer, on_observer)?,
            );
            info!(
                frame,
                server = s.entity().state.position,
                client = c.entity().state.position,
                observer = ?o.entity().rendered,
                "positions"
            );
        }
    }

    let s = kart(&server, on_server)?;
    let c = kart(&client, on_client)?;
    let o = kart(&observer, on_observer)?;

    println!("Links:");
    for (name, link) in [("uplink", &uplink), ("downlink", &downlink), ("observer", &observer_link)] {
        println!("  {:<9} sent {:>3}, lost {:>2}", name, link.sent(), link.dropped());
    }

    if let Some(stats) = s.sequencer_stats() {
        println!("\nServer sequencer:");
        println!("  in order      {}", stats.in_order);
        println!("  synthesized   {}", stats.synthesized);
        println!("  gap accepted  {}", stats.gap_accepted);
        println!("  ghost ticks   {}", stats.ghost);
        println!("  late/dupes    {}/{}", stats.late, stats.duplicates);
    }

    let client_counts = client_counts.borrow();
    println!("\nClient:");
    println!("  last sequence {}", c.last_processed());
    println!("  mispredicted  {}", client_counts[0]);
    println!("  resimulated   {}", client_counts[1]);
    println!("  replayed      {} ticks", c.stats().replayed_ticks);
    let history = c.states().stats();
    println!(
        "  history       {}/{} entries, {:.0}% full",
        history.count,
        history.capacity,
        history.fill_ratio() * 100.0
    );

    println!("\nObserver:");
    println!("  starved       {}", observer_counts.borrow()[2]);
    println!("  reached       {} snapshots", o.entity().reached);

    let confirmed = c
        .states()
        .iter()
        .filter(|(time, _)| c.states().is_authoritative(*time))
        .count();
    println!("\nFinal positions:");
    println!("  server   {:.3}", s.entity().state.position);
    println!("  client   {:.3} ({} confirmed entries)", c.entity().state.position, confirmed);
    if let Some(rendered) = o.entity().rendered {
        println!("  observer {:.3} (rendered {} ms behind)", rendered, config.interpolation_delay_ms);
    }

    Ok(())
}

/// Take whatever a driver queued for the network
fn outgoing(
    scheduler: &mut SimulationScheduler,
    handle: EntityHandle,
) -> Result<Vec<resim_netcode::NetMessage<f32, KartState>>> {
    Ok(scheduler.driver_mut::<Kart>(handle)?.drain_outgoing())
}
