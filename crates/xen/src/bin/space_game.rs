//! # Space Game
//!
//! Demo: a ship with two turrets and a ring of asteroids, spinning under an
//! orbiting camera. Runs on the headless platform (or a wgpu adapter with
//! `--features wgpu`) for `headless.max_frames` frames.
//!
//! ```text
//! cargo run --bin space_game [path/to/config.toml]
//! RUST_LOG=xen=debug cargo run --bin space_game
//! ```

use std::cell::RefCell;
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use glam::Vec3;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use xen::xen_core::{
    BufferId, CameraState, GameState, Material, MeshHandle, PbrTextures, PointLight, RenderComponent,
    TransformComponent,
};
use xen::xen_rendering::{
    pack_lights, CameraUniform, ClearCommand, CreateBuffersCommand, DeleteBuffersCommand,
    DrawElementsCommand, MaterialUniform, RenderSystem, RenderTarget, UploadBufferCommand,
};
use xen::{
    EngineConfig, EngineError, EngineResult, Game, GameLoop, HeadlessPlatform, Key, PlatformEvent,
    Simulation, TelemetrySnapshot, TickContext,
};

const DEFAULT_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config/space_game.toml");
const ASTEROID_COUNT: usize = 24;
const ASTEROID_RING_RADIUS: f32 = 9.0;
const CAMERA_DISTANCE: f32 = 16.0;
const FIELD_OF_VIEW: f32 = 60.0;

/// Unit cube: position xyz + normal xyz per corner.
#[rustfmt::skip]
const CUBE_VERTICES: [[f32; 6]; 8] = [
    [-0.5, -0.5, -0.5, -0.577, -0.577, -0.577],
    [ 0.5, -0.5, -0.5,  0.577, -0.577, -0.577],
    [ 0.5,  0.5, -0.5,  0.577,  0.577, -0.577],
    [-0.5,  0.5, -0.5, -0.577,  0.577, -0.577],
    [-0.5, -0.5,  0.5, -0.577, -0.577,  0.577],
    [ 0.5, -0.5,  0.5,  0.577, -0.577,  0.577],
    [ 0.5,  0.5,  0.5,  0.577,  0.577,  0.577],
    [-0.5,  0.5,  0.5, -0.577,  0.577,  0.577],
];

#[rustfmt::skip]
const CUBE_INDICES: [u32; 36] = [
    0, 2, 1, 0, 3, 2, // back
    4, 5, 6, 4, 6, 7, // front
    0, 1, 5, 0, 5, 4, // bottom
    3, 7, 6, 3, 6, 2, // top
    0, 4, 7, 0, 7, 3, // left
    1, 2, 6, 1, 6, 5, // right
];

/// Per-frame uniform buffers owned by the game (the mesh belongs to the state).
#[derive(Clone, Copy, Debug)]
struct FrameBuffers {
    camera: BufferId,
    lights: BufferId,
    model: BufferId,
    material: BufferId,
}

impl FrameBuffers {
    fn all(self) -> Vec<BufferId> {
        vec![self.camera, self.lights, self.model, self.material]
    }
}

#[derive(Debug, Default)]
struct SpaceGame {
    target: Option<Rc<RefCell<RenderTarget>>>,
    buffers: Option<FrameBuffers>,
    show_stats: bool,
}

impl SpaceGame {
    fn build_scene(mesh: MeshHandle, aspect: f32) -> GameState {
        let mut state = GameState::new();
        *state.camera_mut() = CameraState::look_at(
            Vec3::new(0.0, 6.0, CAMERA_DISTANCE),
            Vec3::ZERO,
            FIELD_OF_VIEW.to_radians(),
            aspect,
        );

        let lighting = state.lighting_mut();
        lighting.ambient = Vec3::splat(0.05);
        lighting.point_lights.push(PointLight {
            position: Vec3::new(0.0, 3.0, 0.0),
            color: Vec3::new(1.0, 0.6, 0.2),
            intensity: 4.0,
            range: 12.0,
        });

        let ship = state.create_entity();
        state.add_component(ship, TransformComponent::from_position(Vec3::ZERO));
        state.add_component(
            ship,
            RenderComponent::new(
                mesh,
                Material::Pbr {
                    albedo: Vec3::new(0.7, 0.7, 0.75),
                    metallic: 0.9,
                    roughness: 0.3,
                    ao: 1.0,
                    textures: PbrTextures::default(),
                },
            ),
        );

        for side in [-1.0f32, 1.0] {
            let turret = state.create_entity();
            let mut transform = TransformComponent::from_position(Vec3::new(side * 0.8, 0.6, 0.0));
            transform.scale_by(Vec3::splat(0.3));
            state.add_component(turret, transform);
            state.add_component(
                turret,
                RenderComponent::new(
                    mesh,
                    Material::BlinnPhong {
                        diffuse: Vec3::new(0.8, 0.1, 0.1),
                        specular: Vec3::ONE,
                        shininess: 32.0,
                        diffuse_map: None,
                    },
                ),
            );
            state.set_parent(turret, Some(ship));
        }

        for i in 0..ASTEROID_COUNT {
            let angle = TAU * i as f32 / ASTEROID_COUNT as f32;
            let asteroid = state.create_entity();
            let mut transform = TransformComponent::from_position(Vec3::new(
                angle.cos() * ASTEROID_RING_RADIUS,
                (angle * 3.0).sin(),
                angle.sin() * ASTEROID_RING_RADIUS,
            ));
            transform.scale_by(Vec3::splat(0.4 + 0.2 * (angle * 5.0).cos().abs()));
            state.add_component(asteroid, transform);
            let mut render = RenderComponent::new(mesh, Material::default());
            render.casts_shadows = false;
            state.add_component(asteroid, render);
        }

        state
    }
}

impl Game for SpaceGame {
    fn load_content(&mut self, render: &mut RenderSystem) -> EngineResult<GameState> {
        let ids = render.execute_immediate(CreateBuffersCommand::new(6))?;
        let [vertex, index, camera, lights, model, material]: [BufferId; 6] = ids
            .as_slice()
            .try_into()
            .map_err(|_| EngineError::Content(format!("expected 6 buffers, device returned {}", ids.len())))?;

        render
            .submit(UploadBufferCommand::from_pod(vertex, &CUBE_VERTICES))
            .submit(UploadBufferCommand::from_pod(index, &CUBE_INDICES));

        let (width, height) = render.size();
        let target = Rc::new(RefCell::new(RenderTarget::new(render, width, height)?));
        render.register_volatile(&target);
        self.target = Some(target);
        self.buffers = Some(FrameBuffers {
            camera,
            lights,
            model,
            material,
        });

        let mesh = MeshHandle {
            vertex_buffer: vertex,
            index_buffer: index,
            index_count: CUBE_INDICES.len() as u32,
        };
        let state = Self::build_scene(mesh, width as f32 / height.max(1) as f32);
        tracing::info!("space_game: scene with {} entities", state.entity_count());
        Ok(state)
    }

    fn draw(&mut self, state: &GameState, render: &mut RenderSystem) {
        let (Some(target), Some(buffers)) = (&self.target, self.buffers) else {
            return;
        };

        target.borrow().bind(render);
        render
            .submit(ClearCommand::new(0.01, 0.01, 0.03, 1.0))
            .submit(UploadBufferCommand::from_pod(buffers.camera, &[CameraUniform::from(state.camera())]))
            .submit(UploadBufferCommand::from_pod(buffers.lights, &[pack_lights(state.lighting())]));

        for (entity, renderable) in state.components::<RenderComponent>().iter() {
            let Some(mesh) = renderable.mesh.filter(|_| renderable.visible) else {
                continue;
            };
            render
                .submit(UploadBufferCommand::from_pod(
                    buffers.model,
                    &state.world_matrix(entity).to_cols_array(),
                ))
                .submit(UploadBufferCommand::from_pod(
                    buffers.material,
                    &[MaterialUniform::from(&renderable.material)],
                ))
                .submit(DrawElementsCommand::triangles(mesh.index_count));
        }
    }

    fn draw_debug_ui(&mut self, telemetry: &TelemetrySnapshot, _render: &mut RenderSystem) {
        if self.show_stats && telemetry.frames % 60 == 0 {
            tracing::info!(
                "frame {}: {:.1} fps, sim {:.2} ms, cpu {:.2} ms, gpu {:.2} ms, {} stale, {} dropped",
                telemetry.frames,
                telemetry.fps(),
                telemetry.sim_tick_ms,
                telemetry.render_cpu_ms,
                telemetry.gpu_ms,
                telemetry.stale_frames,
                telemetry.dropped_snapshots
            );
        }
    }

    fn handle_event(&mut self, event: &PlatformEvent) {
        if let PlatformEvent::KeyPressed(Key::F3) = event {
            self.show_stats = !self.show_stats;
        }
    }

    fn unload_content(&mut self, render: &mut RenderSystem) {
        if let Some(buffers) = self.buffers.take() {
            render.submit(DeleteBuffersCommand(buffers.all()));
        }
        match self.target.take().map(Rc::try_unwrap) {
            Some(Ok(target)) => target.into_inner().release(render),
            Some(Err(_)) => tracing::warn!("render target still shared at unload"),
            None => {}
        }
    }
}

/// Spins everything and orbits the camera around the ship.
#[derive(Debug)]
struct Orbit {
    spin: f32,
    camera_speed: f32,
    aspect: f32,
}

impl Simulation for Orbit {
    fn update(&mut self, state: &mut GameState, ctx: &TickContext<'_>) {
        let spin = Vec3::new(0.0, self.spin * ctx.delta_time, 0.0);
        for (_, transform) in state.components_mut::<TransformComponent>().iter_mut() {
            transform.rotate(spin);
        }

        let angle = ctx.elapsed_ms / 1000.0 * self.camera_speed;
        let eye = Vec3::new(angle.sin() * CAMERA_DISTANCE, 6.0, angle.cos() * CAMERA_DISTANCE);
        *state.camera_mut() = CameraState::look_at(eye, Vec3::ZERO, FIELD_OF_VIEW.to_radians(), self.aspect);
    }
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(true).with_thread_names(true))
        .init();
}

fn load_config() -> EngineResult<EngineConfig> {
    match std::env::args_os().nth(1) {
        Some(path) => EngineConfig::load(PathBuf::from(path)),
        None if std::path::Path::new(DEFAULT_CONFIG).exists() => EngineConfig::load(DEFAULT_CONFIG),
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> ExitCode {
    let (config, load_error) = match load_config() {
        Ok(config) => (config, None),
        Err(err) => (EngineConfig::default(), Some(err)),
    };
    init_logging(&config.logging.filter);
    if let Some(err) = load_error {
        tracing::error!("{}", err);
        return ExitCode::FAILURE;
    }

    let platform = HeadlessPlatform::from_config(&config);
    #[cfg(feature = "wgpu")]
    let platform = platform.with_backend(xen::DeviceBackend::Wgpu);
    let mut platform = platform;

    let simulation = Orbit {
        spin: 0.8,
        camera_speed: 0.2,
        aspect: config.width as f32 / config.height as f32,
    };
    let mut game = SpaceGame {
        show_stats: config.debug_overlay,
        ..SpaceGame::default()
    };

    match GameLoop::new(config).run(&mut platform, &mut game, simulation) {
        Ok(summary) => {
            tracing::info!(
                "space_game done: {} frames, {} ticks in {:.0} ms",
                summary.frames,
                summary.ticks,
                summary.elapsed_ms
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("space_game failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
