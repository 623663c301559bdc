//! Full engine runs on the headless platform and device.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;

use xen::xen_core::{GameState, Material, MeshHandle, RenderComponent, TransformComponent};
use xen::xen_rendering::{CommandOutput, CreateBuffersCommand, GraphicsDevice, RenderSystem, RenderTarget};
use xen::{
    EngineConfig, EngineError, EngineResult, Game, GameLoop, HeadlessConfig, HeadlessPlatform, Key,
    Platform, PlatformEvent, SimulationConfig, TelemetrySnapshot, TickContext, SIMULATION_THREAD_NAME,
};

fn config(max_frames: u64) -> EngineConfig {
    EngineConfig {
        width: 320,
        height: 240,
        vsync: true,
        simulation: SimulationConfig {
            tick_rate_hz: 1000,
            ..SimulationConfig::default()
        },
        headless: HeadlessConfig {
            max_frames,
            refresh_hz: 500,
        },
        ..EngineConfig::default()
    }
}

#[derive(Default)]
struct RecordingGame {
    fail_load: bool,
    target: Option<Rc<RefCell<RenderTarget>>>,
    ticks_seen: Vec<u64>,
    overlay_calls: u64,
    events: Vec<PlatformEvent>,
    final_target_size: Option<(u32, u32)>,
    unloaded: bool,
}

impl Game for RecordingGame {
    fn load_content(&mut self, render: &mut RenderSystem) -> EngineResult<GameState> {
        if self.fail_load {
            return Err(EngineError::Content("missing asset".to_string()));
        }

        let buffers = render.execute_immediate(CreateBuffersCommand::new(2))?;
        let target = Rc::new(RefCell::new(RenderTarget::new(render, 320, 240)?));
        render.register_volatile(&target);
        self.target = Some(target);

        let mut state = GameState::new();
        let entity = state.create_entity();
        state.add_component(entity, TransformComponent::default());
        state.add_component(
            entity,
            RenderComponent::new(
                MeshHandle {
                    vertex_buffer: buffers[0],
                    index_buffer: buffers[1],
                    index_count: 36,
                },
                Material::default(),
            ),
        );
        Ok(state)
    }

    fn draw(&mut self, state: &GameState, _render: &mut RenderSystem) {
        self.ticks_seen.push(state.tick());
    }

    fn draw_debug_ui(&mut self, _telemetry: &TelemetrySnapshot, _render: &mut RenderSystem) {
        self.overlay_calls += 1;
    }

    fn handle_event(&mut self, event: &PlatformEvent) {
        self.events.push(*event);
    }

    fn unload_content(&mut self, render: &mut RenderSystem) {
        if let Some(target) = self.target.take() {
            self.final_target_size = Some(target.borrow().size());
            if let Ok(target) = Rc::try_unwrap(target) {
                target.into_inner().release(render);
            }
        }
        self.unloaded = true;
    }
}

fn drift(state: &mut GameState, ctx: &TickContext<'_>) {
    for (_, transform) in state.components_mut::<TransformComponent>().iter_mut() {
        transform.position.x += ctx.delta_time;
    }
}

#[test]
fn headless_run_stops_after_max_frames() {
    let game_loop = GameLoop::new(config(30));
    let mut platform = HeadlessPlatform::from_config(game_loop.config());
    let mut game = RecordingGame::default();

    let summary = game_loop.run(&mut platform, &mut game, drift).unwrap();

    assert_eq!(summary.frames, 30);
    assert_eq!(platform.presented(), 30);
    assert_eq!(game.ticks_seen.len(), 30);
    assert!(summary.ticks >= 1);
    assert!(game.ticks_seen.windows(2).all(|w| w[0] <= w[1]), "snapshots went backwards");
    assert_eq!(game.events, vec![PlatformEvent::CloseRequested]);
    assert!(game.unloaded);
    // Vertex and index buffer held by the snapshots.
    assert_eq!(summary.released_resources, 2);
    assert!(summary.elapsed_ms > 0.0);
}

#[test]
fn shutdown_handle_ends_an_unbounded_run() {
    let game_loop = GameLoop::new(config(0));
    let handle = game_loop.shutdown_handle();
    let mut platform = HeadlessPlatform::from_config(game_loop.config());
    let mut game = RecordingGame::default();

    let summary = thread::scope(|s| {
        let telemetry = game_loop.telemetry();
        s.spawn(move || {
            while telemetry.frames() < 5 {
                thread::yield_now();
            }
            handle.quit();
        });
        game_loop.run(&mut platform, &mut game, drift)
    })
    .unwrap();

    assert!(summary.frames >= 5);
    assert!(!game_loop.shutdown_handle().is_running());
    assert!(game.unloaded);
}

#[test]
fn escape_key_quits() {
    let game_loop = GameLoop::new(config(0));
    let mut platform = HeadlessPlatform::from_config(game_loop.config());
    platform.schedule(5, PlatformEvent::KeyPressed(Key::Escape));
    let mut game = RecordingGame::default();

    let summary = game_loop.run(&mut platform, &mut game, drift).unwrap();

    assert_eq!(summary.frames, 5);
    assert_eq!(game.events, vec![PlatformEvent::KeyPressed(Key::Escape)]);
}

#[test]
fn resize_rebuilds_volatile_targets() {
    let game_loop = GameLoop::new(config(10));
    let mut platform = HeadlessPlatform::from_config(game_loop.config());
    platform.schedule(3, PlatformEvent::Resized { width: 640, height: 360 });
    let mut game = RecordingGame::default();

    game_loop.run(&mut platform, &mut game, drift).unwrap();

    assert_eq!(game.final_target_size, Some((640, 360)));
    assert_eq!(platform.framebuffer_size(), (640, 360));
}

#[test]
fn debug_overlay_runs_every_frame_when_enabled() {
    let game_loop = GameLoop::new(EngineConfig {
        debug_overlay: true,
        ..config(12)
    });
    let mut platform = HeadlessPlatform::from_config(game_loop.config());
    let mut game = RecordingGame::default();

    let summary = game_loop.run(&mut platform, &mut game, drift).unwrap();

    assert_eq!(game.overlay_calls, summary.frames);
}

#[test]
fn simulation_runs_on_its_own_thread_and_queues_gpu_work() {
    let game_loop = GameLoop::new(config(30));
    let mut platform = HeadlessPlatform::from_config(game_loop.config());
    let mut game = RecordingGame::default();

    let sim_thread = CommandOutput::<String>::new();
    let executed_on = CommandOutput::<String>::new();
    let (sim_seen, executed) = (sim_thread.clone(), executed_on.clone());
    let simulation = move |_: &mut GameState, ctx: &TickContext<'_>| {
        if ctx.tick == 1 {
            sim_seen.set(thread::current().name().unwrap_or_default().to_string());
            let executed = executed.clone();
            let _ = ctx.commands.submit(move |_: &mut dyn GraphicsDevice| {
                executed.set(thread::current().name().unwrap_or_default().to_string());
            });
        }
    };

    game_loop.run(&mut platform, &mut game, simulation).unwrap();

    assert_eq!(sim_thread.get().as_deref(), Some(SIMULATION_THREAD_NAME));
    let render_thread = executed_on.get();
    assert!(render_thread.is_some(), "queued command never ran");
    assert_ne!(render_thread.as_deref(), Some(SIMULATION_THREAD_NAME));
}

#[test]
fn failed_load_aborts_before_any_frame() {
    let game_loop = GameLoop::new(config(30));
    let mut platform = HeadlessPlatform::from_config(game_loop.config());
    let mut game = RecordingGame {
        fail_load: true,
        ..RecordingGame::default()
    };

    let err = game_loop.run(&mut platform, &mut game, drift).unwrap_err();

    assert!(matches!(err, EngineError::Content(_)));
    assert_eq!(platform.presented(), 0);
    assert_eq!(game_loop.telemetry().frames(), 0);
}

#[test]
fn simulation_panic_is_reported() {
    let game_loop = GameLoop::new(config(0));
    let mut platform = HeadlessPlatform::from_config(game_loop.config());
    let mut game = RecordingGame::default();

    let err = game_loop
        .run(&mut platform, &mut game, |_: &mut GameState, _: &TickContext<'_>| {
            panic!("simulation blew up")
        })
        .unwrap_err();

    assert!(matches!(err, EngineError::SimulationPanicked));
    assert!(game.unloaded);
}

#[test]
fn invalid_config_is_rejected_before_device_creation() {
    let game_loop = GameLoop::new(EngineConfig {
        width: 0,
        ..config(1)
    });
    let mut platform = HeadlessPlatform::new(1, 1, 1);
    let mut game = RecordingGame::default();

    let err = game_loop.run(&mut platform, &mut game, drift).unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));
}
