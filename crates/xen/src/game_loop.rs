//! # Xen Game Loop
//!
//! Two long-lived threads share one [`StateBuffer`]:
//!
//! ```text
//!  simulation thread                         render thread (caller of run)
//! ┌──────────────────────────┐              ┌──────────────────────────────┐
//! │ 1. clock.tick()          │              │ 1. poll platform events      │
//! │ 2. write_buffer()        │   publish    │ 2. swap_read_buffer()        │
//! │ 3. simulation.update()   │ ───────────> │ 3. game.draw(read snapshot)  │
//! │ 4. publish()             │              │ 4. debug overlay (optional)  │
//! │ 5. clock.update()        │   commands   │ 5. render.execute()          │
//! │ 6. record tick time      │ ───────────> │    (GPU timer around 3-5)    │
//! │ 7. pace to tick rate     │              │ 6. present, record frame     │
//! └──────────────────────────┘              └──────────────────────────────┘
//!            ▲                                          │
//!            └────────── running flag (AtomicBool) ─────┘
//! ```
//!
//! Shutdown: clear the flag, join the simulation thread, stop its clock, then
//! unload content and release every GPU object the snapshots still hold, all
//! on the render thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use xen_core::{Clock, StateBuffer, SwapOutcome};
use xen_rendering::{CommandSender, GpuTimer, RenderSystem};

use crate::config::{EngineConfig, SimulationConfig};
use crate::error::{EngineError, EngineResult};
use crate::game::{Game, Simulation, TickContext};
use crate::platform::{Key, Platform, PlatformEvent};
use crate::telemetry::{millis, FrameTelemetry};

/// Name given to the simulation thread.
pub const SIMULATION_THREAD_NAME: &str = "xen-simulation";

/// Requests shutdown from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Clears the running flag. Both loops finish their current iteration
    /// and stop.
    pub fn quit(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Returns true while a run is in progress and no quit was requested.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    /// Frames presented.
    pub frames: u64,
    /// Simulation ticks published.
    pub ticks: u64,
    /// Frames that re-rendered an old snapshot.
    pub stale_frames: u64,
    /// Snapshots replaced before the renderer saw them.
    pub dropped_snapshots: u64,
    /// GPU objects released from the state buffer at shutdown.
    pub released_resources: usize,
    /// Simulation clock time from start to stop, in milliseconds.
    pub elapsed_ms: f32,
}

/// Clears the running flag when dropped, including during unwinding.
struct StopOnDrop<'a>(&'a AtomicBool);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The engine driver.
///
/// `run` borrows the loop immutably, so telemetry can be read from other
/// threads while it runs.
#[derive(Debug)]
pub struct GameLoop {
    config: EngineConfig,
    running: Arc<AtomicBool>,
    telemetry: FrameTelemetry,
}

impl GameLoop {
    /// Creates a driver for `config`.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            telemetry: FrameTelemetry::new(),
        }
    }

    /// Handle that ends the current run.
    ///
    /// A quit issued before [`run`](Self::run) starts is overridden by it.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Live timing metrics.
    #[must_use]
    pub fn telemetry(&self) -> &FrameTelemetry {
        &self.telemetry
    }

    /// Engine settings.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs the game until the platform closes, Escape is pressed (with
    /// `escape_to_quit`), or [`ShutdownHandle::quit`] is called.
    ///
    /// Blocks the calling thread, which becomes the render thread and must
    /// be the one that owns `platform`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidConfig`] for a bad config
    /// - [`EngineError::Render`] if the device cannot be created
    /// - whatever [`Game::load_content`] returns
    /// - [`EngineError::ThreadSpawn`] if the simulation thread cannot start
    /// - [`EngineError::SimulationPanicked`] if it panicked
    ///
    /// Content is unloaded and GPU objects released on every path past
    /// `load_content`.
    pub fn run<P, G, S>(&self, platform: &mut P, game: &mut G, mut simulation: S) -> EngineResult<RunSummary>
    where
        P: Platform,
        G: Game,
        S: Simulation,
    {
        self.config.validate()?;

        let (width, height) = platform.framebuffer_size();
        let device = platform.create_device()?;
        tracing::info!("'{}' starting on {} device at {}x{}", self.config.title, device.name(), width, height);

        let mut render = RenderSystem::new(device, width, height);
        let initial = game.load_content(&mut render)?;
        let loaded = render.execute();
        tracing::debug!("load_content: {} commands, {} entities", loaded, initial.entity_count());

        let mut state = StateBuffer::new();
        state.init(&initial)?;
        drop(initial);

        let commands = render.sender();
        self.running.store(true, Ordering::Release);

        let outcome = thread::scope(|scope| -> EngineResult<Clock> {
            let sim_state = &state;
            let sim_running = &*self.running;
            let sim_config = &self.config.simulation;
            let telemetry = &self.telemetry;
            let simulation = &mut simulation;
            let commands = &commands;

            let stop = StopOnDrop(&*self.running);
            let sim = thread::Builder::new()
                .name(SIMULATION_THREAD_NAME.to_string())
                .spawn_scoped(scope, move || {
                    simulation_loop(sim_state, simulation, commands, sim_config, sim_running, telemetry)
                })
                .map_err(EngineError::ThreadSpawn)?;

            let rendered = self.render_loop(platform, game, &mut render, &state);
            drop(stop);

            let clock = sim.join().map_err(|_| EngineError::SimulationPanicked)??;
            rendered?;
            Ok(clock)
        })
        .map(|mut clock| {
            clock.stop();
            clock.elapsed()
        });

        game.unload_content(&mut render);
        render.execute();
        let released_resources = render.release_state(&mut state);
        let elapsed_ms = outcome?;

        let telemetry = self.telemetry.snapshot();
        let summary = RunSummary {
            frames: telemetry.frames,
            ticks: telemetry.ticks,
            stale_frames: telemetry.stale_frames,
            dropped_snapshots: telemetry.dropped_snapshots,
            released_resources,
            elapsed_ms,
        };
        tracing::info!(
            "'{}' stopped after {:.1} ms: {} frames, {} ticks, {} stale frames, {} dropped snapshots, {} GPU objects released",
            self.config.title,
            summary.elapsed_ms,
            summary.frames,
            summary.ticks,
            summary.stale_frames,
            summary.dropped_snapshots,
            summary.released_resources
        );
        Ok(summary)
    }

    fn render_loop<P: Platform, G: Game>(
        &self,
        platform: &mut P,
        game: &mut G,
        render: &mut RenderSystem,
        state: &StateBuffer,
    ) -> EngineResult<()> {
        let mut events = Vec::new();
        let mut gpu_timer = GpuTimer::new();
        let mut clock = Clock::new();
        clock.start();

        while self.running.load(Ordering::Acquire) {
            clock.tick();

            events.clear();
            platform.poll_events(&mut events);
            if !self.handle_events(&events, game, render) {
                break;
            }

            state.swap_read_buffer()?;

            let cpu_start = Instant::now();
            let snapshot = state.read_buffer()?;
            gpu_timer.begin(render.device_mut());
            game.draw(&snapshot, render);
            if self.config.debug_overlay {
                game.draw_debug_ui(&self.telemetry.snapshot(), render);
            }
            render.execute();
            let render_cpu_ms = millis(cpu_start.elapsed());
            let gpu_ms = gpu_timer.end(render.device_mut());
            drop(snapshot);

            platform.present();
            clock.update();

            self.telemetry.record_frame(render_cpu_ms, gpu_ms, clock.frame_time());
            self.telemetry.record_backpressure(state.stats());
        }
        Ok(())
    }

    /// Returns false when the run should end.
    fn handle_events<G: Game>(&self, events: &[PlatformEvent], game: &mut G, render: &mut RenderSystem) -> bool {
        let mut keep_running = true;
        for event in events {
            game.handle_event(event);
            match *event {
                PlatformEvent::CloseRequested => {
                    tracing::info!("close requested");
                    keep_running = false;
                }
                PlatformEvent::KeyPressed(Key::Escape) if self.config.escape_to_quit => {
                    tracing::info!("escape pressed, quitting");
                    keep_running = false;
                }
                PlatformEvent::Resized { width, height } => {
                    let notified = render.notify_resize(width, height);
                    tracing::debug!("resized to {}x{}, {} volatiles notified", width, height, notified);
                }
                PlatformEvent::KeyPressed(_) => {}
            }
        }
        if !keep_running {
            self.running.store(false, Ordering::Release);
        }
        keep_running
    }
}

fn simulation_loop<S: Simulation>(
    state: &StateBuffer,
    simulation: &mut S,
    commands: &CommandSender,
    config: &SimulationConfig,
    running: &AtomicBool,
    telemetry: &FrameTelemetry,
) -> EngineResult<Clock> {
    let _stop = StopOnDrop(running);
    let period = config.fixed_tick();
    let mut clock = Clock::new();
    clock.start();
    let mut tick = 0u64;

    tracing::debug!("simulation thread started, period {:?}", period);
    while running.load(Ordering::Acquire) {
        let tick_start = Instant::now();
        let delta = clock.tick();
        tick += 1;

        let mut write = state.write_buffer()?;
        write.set_tick(tick);
        let ctx = TickContext {
            tick,
            delta_time: delta.as_secs_f32().min(config.max_delta_seconds),
            elapsed_ms: clock.elapsed(),
            commands,
        };
        simulation.update(&mut write, &ctx);
        if write.publish() == SwapOutcome::Superseded {
            tracing::trace!("tick {} replaced an unread snapshot", tick);
        }

        clock.update();
        telemetry.record_tick(clock.frame_time());

        match period {
            Some(period) => {
                let spent = tick_start.elapsed();
                if spent < period {
                    thread::sleep(period - spent);
                }
            }
            None => thread::yield_now(),
        }
    }
    tracing::debug!("simulation thread stopped after {} ticks", tick);
    Ok(clock)
}
