//! # Game Hooks
//!
//! A game plugs into the loop through two traits, one per thread:
//!
//! | Trait          | Thread     | Sees                                 |
//! |----------------|------------|--------------------------------------|
//! | [`Game`]       | render     | read snapshot, [`RenderSystem`]      |
//! | [`Simulation`] | simulation | write snapshot, [`TickContext`]      |
//!
//! [`Game`] is never sent across threads, so it may hold `Rc`s and GPU-side
//! objects. [`Simulation`] must be `Send`.

use xen_core::GameState;
use xen_rendering::{CommandSender, RenderSystem};

use crate::error::EngineResult;
use crate::platform::PlatformEvent;
use crate::telemetry::TelemetrySnapshot;

/// Render-thread half of a game.
pub trait Game {
    /// Creates GPU content and returns the initial world.
    ///
    /// Runs before the simulation thread starts. Commands submitted here are
    /// executed before the first frame.
    ///
    /// # Errors
    ///
    /// Any error aborts the run before a frame is drawn.
    fn load_content(&mut self, render: &mut RenderSystem) -> EngineResult<GameState>;

    /// Records the frame for `state` into `render`.
    fn draw(&mut self, state: &GameState, render: &mut RenderSystem);

    /// Overlay pass, called after [`draw`](Self::draw) when the debug overlay is on.
    fn draw_debug_ui(&mut self, _telemetry: &TelemetrySnapshot, _render: &mut RenderSystem) {}

    /// Sees every platform event before the loop acts on it.
    fn handle_event(&mut self, _event: &PlatformEvent) {}

    /// Releases GPU content. Runs after the simulation thread has joined.
    fn unload_content(&mut self, render: &mut RenderSystem);
}

/// Per-tick inputs handed to [`Simulation::update`].
#[derive(Debug)]
pub struct TickContext<'a> {
    /// Tick number being produced, starting at 1.
    pub tick: u64,
    /// Seconds since the previous tick, clamped to `max_delta_seconds`.
    pub delta_time: f32,
    /// Milliseconds since the simulation started.
    pub elapsed_ms: f32,
    /// Queues GPU work for the render thread's next `execute`.
    pub commands: &'a CommandSender,
}

/// Simulation-thread half of a game.
pub trait Simulation: Send {
    /// Advances `state` by one tick.
    fn update(&mut self, state: &mut GameState, ctx: &TickContext<'_>);
}

impl<F> Simulation for F
where
    F: FnMut(&mut GameState, &TickContext<'_>) + Send,
{
    fn update(&mut self, state: &mut GameState, ctx: &TickContext<'_>) {
        self(state, ctx);
    }
}
