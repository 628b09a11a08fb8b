use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sepc::*;

fn trace() {
    std::env::set_var("RUST_BACKTRACE", "1");

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .compact()
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

const DEMO: LibraryId = LibraryId("Demo");

#[derive(Default)]
struct World {
    ready_after: u32,
    polls: u32,
    location: Option<RunLocation>,
    existing: Vec<EntityInfo>,
    notices: Vec<(String, Duration)>,
    explode: bool,
}

impl Host for World {
    fn poll_ready(&mut self) -> Option<RunLocation> {
        self.polls += 1;
        if self.polls <= self.ready_after {
            return None;
        }
        Some(self.location.unwrap_or(RunLocation::BOTH))
    }

    fn existing_entities(&mut self) -> Vec<EntityInfo> {
        if self.explode {
            panic!("world exploded");
        }
        std::mem::take(&mut self.existing)
    }

    fn notify(&mut self, message: &str, duration: Duration, _level: NoticeLevel) {
        self.notices.push((message.to_owned(), duration));
    }
}

type Log<T> = Arc<Mutex<Vec<T>>>;

fn log<T>() -> Log<T> {
    Arc::new(Mutex::new(Vec::new()))
}

fn start(registrar: Registrar, world: World) -> (ComponentSession<World>, SessionHandle) {
    let (handle, queue) = SessionHandle::channel();
    let session = ComponentSession::new(Arc::new(registrar), world, queue, SessionConfig::default());
    (session, handle)
}

#[derive(Default)]
struct Counter {
    count: u64,
}

/// Counts every tick in a session component and logs the frame of every
/// tenth tick of each block
fn run_scenario(remove_after: Option<u64>) -> (u64, Vec<u64>) {
    let clock = Arc::new(AtomicU64::new(0));
    let frames = log();

    let (beacon_clock, beacon_frames) = (clock.clone(), frames.clone());
    let mut registrar = Registrar::new();
    registrar
        .add_library(
            Library::new(DEMO)
                .component(SessionComponent::<Counter>::with_default("Counter").handles(
                    HandlerTag::update(1).named("count"),
                    |counter: &mut Counter| {
                        counter.count += 1;
                        Ok(())
                    },
                ))
                .component(
                    EntityComponent::new("Beacon", EntityKind::Block, |_| Ok(()))
                        .handles(HandlerTag::update(10).named("ping"), move |_| {
                            beacon_frames.lock().unwrap().push(beacon_clock.load(Ordering::SeqCst));
                            Ok(())
                        }),
                ),
        )
        .unwrap();
    registrar.mark_auto_load(DEMO, 0);

    let world = World {
        ready_after: 2,
        ..World::default()
    };
    let (mut session, _handle) = start(registrar, world);

    assert_eq!(session.on_tick(), TickOutcome::NotReady);
    assert_eq!(session.on_tick(), TickOutcome::NotReady);
    assert_eq!(session.on_tick(), TickOutcome::Initialized);

    for t in 0..25u64 {
        clock.store(session.frame(), Ordering::SeqCst);
        assert_eq!(session.on_tick(), TickOutcome::Dispatched(t));

        if t == 0 {
            session.on_entity_added(EntityInfo::block(7u64, "Antenna")).unwrap();
        }
        if Some(t) == remove_after {
            session.on_entity_removing(EntityId(7)).unwrap();
        }
    }

    let count = session
        .store()
        .and_then(|store| store.session_component::<Counter>("Counter"))
        .map(|counter| counter.borrow().count)
        .unwrap_or_default();
    let frames = frames.lock().unwrap().clone();
    (count, frames)
}

#[test]
fn end_to_end() {
    trace();

    assert_eq!(run_scenario(None), (25, vec![10, 20]));
    assert_eq!(run_scenario(Some(15)), (25, vec![10]));
}

#[test]
fn conditions_are_evaluated_once() {
    trace();

    let evaluations = Arc::new(AtomicUsize::new(0));
    let licensed = Arc::new(AtomicBool::new(true));
    let (counter, gate) = (evaluations.clone(), licensed.clone());
    let mut registrar = Registrar::new();
    registrar
        .add_library(
            Library::new(DEMO)
                .component(
                    EntityComponent::new("Pilot", EntityKind::Character, |_| Ok(())).condition(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(gate.load(Ordering::SeqCst))
                    }),
                )
                .component(EntityComponent::new("Medic", EntityKind::Character, |_| Ok(())).group(1)),
        )
        .unwrap();
    registrar.mark_auto_load(DEMO, 0);

    let (mut session, handle) = start(registrar, World::default());
    session.on_tick();
    session.on_entity_added(EntityInfo::character(1u64)).unwrap();
    licensed.store(false, Ordering::SeqCst);
    session.on_entity_added(EntityInfo::character(2u64)).unwrap();
    assert_eq!(evaluations.load(Ordering::SeqCst), 2);

    licensed.store(true, Ordering::SeqCst);
    handle.register_group(DEMO, 1);
    for _ in 0..3 {
        session.on_tick();
    }

    let store = session.store().unwrap();
    assert_eq!(store.component_names(EntityId(1)), Some(vec!["Pilot", "Medic"]));
    assert_eq!(store.component_names(EntityId(2)), Some(vec!["Medic"]));
    assert_eq!(evaluations.load(Ordering::SeqCst), 2);
}

#[test]
fn session_events_run_in_global_order() {
    trace();

    let calls = log();
    let (late, server, client) = (calls.clone(), calls.clone(), calls.clone());
    let mut registrar = Registrar::new();
    registrar
        .add_library(
            Library::new(DEMO)
                .component(StaticComponent::new("Late").handles(
                    HandlerTag::event("Ping").order(2).runs_on(RunLocation::BOTH).named("late"),
                    move || {
                        late.lock().unwrap().push("2 Both");
                        Ok(())
                    },
                ))
                .component(StaticComponent::new("Sync").handles(
                    HandlerTag::event("Ping").order(1).runs_on(RunLocation::SERVER).named("server"),
                    move || {
                        server.lock().unwrap().push("1 Server");
                        Ok(())
                    },
                ))
                .component(StaticComponent::new("Draw").handles(
                    HandlerTag::event("Ping").order(1).runs_on(RunLocation::CLIENT).named("client"),
                    move || {
                        client.lock().unwrap().push("1 Client");
                        Ok(())
                    },
                )),
        )
        .unwrap();
    registrar.mark_auto_load(DEMO, 0);

    let (mut session, handle) = start(registrar, World::default());
    session.on_tick();

    let ping = EventName::from("Ping");
    assert_eq!(
        session.store().unwrap().session_handler_order(&ping),
        vec!["Sync.server", "Draw.client", "Late.late"]
    );

    handle.raise_session_event(ping);
    session.on_tick();
    assert_eq!(*calls.lock().unwrap(), vec!["1 Server", "1 Client", "2 Both"]);
}

#[test]
fn server_skips_client_handlers() {
    trace();

    let calls = log();
    let (server, client) = (calls.clone(), calls.clone());
    let mut registrar = Registrar::new();
    registrar
        .add_library(
            Library::new(DEMO).component(
                StaticComponent::new("Net")
                    .handles(HandlerTag::session_save().runs_on(RunLocation::SERVER).named("server"), move || {
                        server.lock().unwrap().push("server");
                        Ok(())
                    })
                    .handles(HandlerTag::session_save().runs_on(RunLocation::CLIENT).named("client"), move || {
                        client.lock().unwrap().push("client");
                        Ok(())
                    }),
            ),
        )
        .unwrap();
    registrar.mark_auto_load(DEMO, 0);

    let world = World {
        location: Some(RunLocation::for_role(true, true)),
        ..World::default()
    };
    let (mut session, _handle) = start(registrar, world);
    session.on_tick();
    session.on_save();
    session.on_tick();

    assert_eq!(*calls.lock().unwrap(), vec!["server"]);
}

#[test]
fn groups_attach_to_tracked_entities() {
    trace();

    let mut registrar = Registrar::new();
    registrar
        .add_library(
            Library::new(DEMO)
                .component(EntityComponent::new("Hull", EntityKind::Grid, |_| Ok(())).group(1))
                .component(
                    EntityComponent::new("Door", EntityKind::Block, |entity| Ok(entity.id()))
                        .group(1)
                        .sub_kinds(["Door"]),
                ),
        )
        .unwrap();

    let world = World {
        existing: vec![
            EntityInfo::grid(1u64),
            EntityInfo::block(2u64, "Door").on_grid(1u64),
            EntityInfo::block(3u64, "Light").on_grid(1u64),
        ],
        ..World::default()
    };
    let (mut session, handle) = start(registrar, world);
    session.on_tick();
    assert_eq!(session.store().unwrap().tracked_entities(), vec![EntityId(1), EntityId(2), EntityId(3)]);
    assert_eq!(session.store().unwrap().instance_count(EntityId(2)), Some(0));

    handle.register_group(DEMO, 1);
    session.on_tick();

    let store = session.store().unwrap();
    assert_eq!(store.component_names(EntityId(1)), Some(vec!["Hull"]));
    assert_eq!(store.component_names(EntityId(2)), Some(vec!["Door"]));
    assert_eq!(store.instance_count(EntityId(3)), Some(0));
    assert_eq!(
        store.entity_component::<EntityId>(EntityId(2), "Door").map(|door| *door.borrow()),
        Some(EntityId(2))
    );
}

#[test]
fn grids_and_blocks_close_separately() {
    trace();

    let closed = log();
    let (block_closed, grid_closed) = (closed.clone(), closed.clone());
    let mut registrar = Registrar::new();
    registrar
        .add_library(
            Library::new(DEMO)
                .component(
                    EntityComponent::new("Part", EntityKind::Block, |entity| Ok(entity.id()))
                        .handles(HandlerTag::entity_close(), move |id: &mut EntityId| {
                            block_closed.lock().unwrap().push(*id);
                            Ok(())
                        }),
                )
                .component(
                    EntityComponent::new("Ship", EntityKind::Grid, |entity| Ok(entity.id()))
                        .handles(HandlerTag::entity_close(), move |id: &mut EntityId| {
                            grid_closed.lock().unwrap().push(*id);
                            Ok(())
                        }),
                ),
        )
        .unwrap();
    registrar.mark_auto_load(DEMO, 0);

    let (mut session, _handle) = start(registrar, World::default());
    session.on_tick();
    for entity in [
        EntityInfo::grid(10u64),
        EntityInfo::grid(20u64),
        EntityInfo::block(11u64, "Armor").on_grid(10u64),
        EntityInfo::block(12u64, "Armor").on_grid(10u64),
        EntityInfo::block(21u64, "Armor").on_grid(20u64),
    ] {
        session.on_entity_added(entity).unwrap();
    }

    session.on_entity_removing(EntityId(10)).unwrap();
    assert_eq!(*closed.lock().unwrap(), vec![EntityId(10)]);
    assert_eq!(
        session.store().unwrap().tracked_entities(),
        vec![EntityId(11), EntityId(12), EntityId(20), EntityId(21)]
    );

    session.on_entity_removing(EntityId(11)).unwrap();
    session.on_entity_removing(EntityId(12)).unwrap();
    assert_eq!(*closed.lock().unwrap(), vec![EntityId(10), EntityId(11), EntityId(12)]);
    assert_eq!(session.store().unwrap().tracked_entities(), vec![EntityId(20), EntityId(21)]);

    assert_eq!(
        session.on_entity_removing(EntityId(11)),
        Err(StoreError::EntityNotTracked(EntityId(11)))
    );
    assert_eq!(closed.lock().unwrap().len(), 3);
}

#[test]
fn entity_events_reach_only_their_entity() {
    trace();

    let hits = log();
    let seen = hits.clone();
    let mut registrar = Registrar::new();
    registrar
        .add_library(Library::new(DEMO).component(
            EntityComponent::new("Seat", EntityKind::Block, |entity| Ok(entity.id()))
                .handles(HandlerTag::event(EventName::BLOCK_GRID_CHANGE), move |id: &mut EntityId| {
                    seen.lock().unwrap().push(*id);
                    Ok(())
                }),
        ))
        .unwrap();
    registrar.mark_auto_load(DEMO, 0);

    let (mut session, handle) = start(registrar, World::default());
    session.on_tick();
    session.on_entity_added(EntityInfo::block(1u64, "Seat")).unwrap();
    session.on_entity_added(EntityInfo::block(2u64, "Seat")).unwrap();

    handle.raise_entity_event(EventName::BLOCK_GRID_CHANGE, EntityId(2));
    handle.raise_entity_event(EventName::BLOCK_GRID_CHANGE, EntityId(99));
    session.on_tick();

    assert_eq!(*hits.lock().unwrap(), vec![EntityId(2)]);
}

#[test]
fn auto_unregister_on_entity_removal() {
    trace();

    let (mut session, handle) = start(Registrar::new(), World::default());
    session.on_tick();
    session.on_entity_added(EntityInfo::character(5u64)).unwrap();

    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    handle.register_update_handler(
        1,
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        Some(EntityId(5)),
    );

    for _ in 0..3 {
        session.on_tick();
    }
    session.on_entity_removing(EntityId(5)).unwrap();
    for _ in 0..3 {
        session.on_tick();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(session.store().unwrap().update_handler_count(), 0);
}

#[test]
fn active_group_is_rejected() {
    trace();

    let inits = Arc::new(AtomicUsize::new(0));
    let counter = inits.clone();
    let mut registrar = Registrar::new();
    registrar
        .add_library(Library::new(DEMO).component(StaticComponent::new("Boot").handles(
            HandlerTag::static_init(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )))
        .unwrap();

    let group = registrar.select_group(DEMO, 0).unwrap();
    let mut store = ComponentStore::new(RunLocation::BOTH);
    store.add_group(&group).unwrap();
    assert_eq!(store.add_group(&group), Err(StoreError::GroupAlreadyActive(DEMO, 0)));
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(store.session_component_names(), vec!["Boot"]);
}

#[test]
fn close_terminates_the_session() {
    trace();

    let closes = Arc::new(AtomicUsize::new(0));
    let counter = closes.clone();
    let mut registrar = Registrar::new();
    registrar
        .add_library(Library::new(DEMO).component(
            SessionComponent::new("Journal", || Ok(())).handles(HandlerTag::session_close(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ))
        .unwrap();
    registrar.mark_auto_load(DEMO, 0);

    let (mut session, handle) = start(registrar, World::default());
    session.on_tick();
    session.on_tick();
    handle.raise_session_event("Ignored");

    session.on_close();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(session.status(), SessionStatus::Terminated);
    assert!(session.store().is_none());
    assert_eq!(handle.pending(), 0);

    assert_eq!(session.on_tick(), TickOutcome::Terminated);
    assert_eq!(session.on_entity_added(EntityInfo::grid(1u64)), Ok(()));
    session.on_close();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn host_panic_terminates_the_session() {
    trace();

    let world = World {
        explode: true,
        ..World::default()
    };
    let (mut session, _handle) = start(Registrar::new(), world);

    assert_eq!(session.on_tick(), TickOutcome::Terminated);
    assert_eq!(session.on_tick(), TickOutcome::Terminated);
    assert_eq!(session.status(), SessionStatus::Terminated);
}

#[test]
fn debug_failures_notify_the_host() {
    trace();

    let mut registrar = Registrar::new();
    registrar
        .add_library(
            Library::new(DEMO)
                .debug(true)
                .component(StaticComponent::new("Broken").handles(
                    HandlerTag::update(1).named("tick"),
                    || Err(ComponentError::msg("always")),
                ))
                .component(
                    SessionComponent::<Counter>::new("Unbuildable", || Err(ComponentError::msg("no config"))),
                ),
        )
        .unwrap();
    registrar
        .add_library(Library::new(LibraryId("Quiet")).component(
            StaticComponent::new("AlsoBroken").handles(HandlerTag::update(1), || Err(ComponentError::msg("always"))),
        ))
        .unwrap();
    registrar.mark_auto_load(DEMO, 0);
    registrar.mark_auto_load(LibraryId("Quiet"), 0);

    let (mut session, _handle) = start(registrar, World::default());
    session.on_tick();
    assert_eq!(session.host().notices.len(), 1);

    session.on_tick();
    session.on_tick();

    let notices = &session.host().notices;
    assert_eq!(notices.len(), 2);
    assert!(notices[1].0.contains("Broken.tick"));
    assert_eq!(notices[1].1, Duration::from_secs(10));
    assert_eq!(session.store().unwrap().update_handler_count(), 0);
}

#[test]
fn profiled_handlers_are_timed() {
    trace();

    let mut registrar = Registrar::new();
    registrar
        .add_library(Library::new(DEMO).profile(true).component(
            SessionComponent::<Counter>::with_default("Counter").handles(
                HandlerTag::update(2).named("count"),
                |counter: &mut Counter| {
                    counter.count += 1;
                    Ok(())
                },
            ),
        ))
        .unwrap();
    registrar.mark_auto_load(DEMO, 0);

    let (mut session, handle) = start(registrar, World::default());
    for _ in 0..11 {
        session.on_tick();
    }

    let snapshot = handle.profile_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].0, "Demo::Counter.count");
    assert_eq!(snapshot[0].1.calls, 5);
}
