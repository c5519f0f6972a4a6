//! Demo: a smoke volume with an ember particle system, fly camera controls
//! (WASD + mouse, Space/Shift for up/down).

use std::sync::Arc;

use glam::{Mat4, Vec3};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use embers::camera::{FlyCamera, InputState};
use embers::fluid::render::VolumeRenderer;
use embers::fluid::{FluidKernels, FluidVolume, FluidVolumeDesc};
use embers::particles::render::ParticleRenderer;
use embers::particles::{ParticleKernels, ParticleSystem, ParticleSystemDesc};
use embers::GpuContext;

struct Demo {
    camera: FlyCamera,
    fluid: FluidVolume,
    volume_renderer: VolumeRenderer,
    particles: ParticleSystem,
    particle_renderer: ParticleRenderer,
    world: Mat4,
}

impl Demo {
    fn new(ctx: &GpuContext) -> Self {
        let fluid_kernels = Arc::new(FluidKernels::new(&ctx.device));
        let particle_kernels = Arc::new(ParticleKernels::new(&ctx.device));

        let fluid = FluidVolume::new(
            ctx.device.clone(),
            &ctx.queue,
            fluid_kernels,
            FluidVolumeDesc::default(),
        );
        let particles = ParticleSystem::new(
            ctx.device.clone(),
            &ctx.queue,
            particle_kernels,
            ParticleSystemDesc::default(),
        );

        let format = ctx.surface_format();
        let volume_renderer = VolumeRenderer::new(&ctx.device, format);
        let particle_renderer = ParticleRenderer::new(&ctx.device, format);

        let camera = FlyCamera::new()
            .with_position(Vec3::new(0.0, 1.5, 4.0))
            .with_target(Vec3::new(0.0, 1.0, 0.0));

        Self {
            camera,
            fluid,
            volume_renderer,
            particles,
            particle_renderer,
            // Unit box scaled to a 2m column above the origin.
            world: Mat4::from_scale_rotation_translation(
                Vec3::new(2.0, 2.0, 2.0),
                glam::Quat::IDENTITY,
                Vec3::new(0.0, 1.0, 0.0),
            ),
        }
    }

    fn update(&mut self, ctx: &GpuContext, dt: f32) {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Sim Encoder"),
            });
        self.fluid.update(&ctx.queue, &mut encoder, dt);
        self.particles.update(&ctx.queue, &mut encoder, dt);
        self.particles.encode_draw_args(&mut encoder);
        ctx.queue.submit(std::iter::once(encoder.finish()));
    }

    fn render(&mut self, ctx: &GpuContext, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let aspect = ctx.size.0 as f32 / ctx.size.1.max(1) as f32;
        let view_matrix = self.camera.view_matrix();
        let proj = self.camera.projection_matrix(aspect);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Demo Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.02,
                        g: 0.02,
                        b: 0.03,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.volume_renderer.draw(
            &ctx.device,
            &ctx.queue,
            &mut pass,
            &self.fluid,
            self.world,
            view_matrix,
            proj,
            self.camera.position,
        );
        self.particle_renderer.draw(
            &ctx.device,
            &ctx.queue,
            &mut pass,
            &self.particles,
            view_matrix,
            proj,
        );
    }
}

#[derive(Default)]
struct Runner {
    window: Option<Arc<Window>>,
    ctx: Option<GpuContext>,
    demo: Option<Demo>,
    input: InputState,
    last_time: Option<std::time::Instant>,
}

impl ApplicationHandler for Runner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window = match event_loop.create_window(
                Window::default_attributes()
                    .with_title("embers")
                    .with_inner_size(winit::dpi::LogicalSize::new(1280, 720)),
            ) {
                Ok(window) => Arc::new(window),
                Err(e) => {
                    log::error!("failed to create window: {e}");
                    event_loop.exit();
                    return;
                }
            };
            self.window = Some(window.clone());

            let ctx = pollster::block_on(GpuContext::new(window));
            self.demo = Some(Demo::new(&ctx));
            self.ctx = Some(ctx);
            self.last_time = Some(std::time::Instant::now());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let (Some(ctx), Some(_demo)) = (&mut self.ctx, &mut self.demo) else {
            return;
        };
        match event {
            WindowEvent::Resized(size) => {
                ctx.resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput {
                event,
                is_synthetic: false,
                ..
            } => {
                let pressed = event.state == ElementState::Pressed;
                match event.logical_key {
                    winit::keyboard::Key::Character(ref ch) => match ch.as_str() {
                        "w" | "W" => self.input.forward = pressed,
                        "a" | "A" => self.input.left = pressed,
                        "s" | "S" => self.input.back = pressed,
                        "d" | "D" => self.input.right = pressed,
                        _ => {}
                    },
                    winit::keyboard::Key::Named(winit::keyboard::NamedKey::Space) => {
                        self.input.up = pressed;
                    }
                    winit::keyboard::Key::Named(winit::keyboard::NamedKey::Shift) => {
                        self.input.down = pressed;
                    }
                    winit::keyboard::Key::Named(winit::keyboard::NamedKey::Escape) => {
                        event_loop.exit();
                    }
                    _ => {}
                }
            }
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let (Some(demo), DeviceEvent::MouseMotion { delta }) = (&mut self.demo, event) {
            demo.camera.on_mouse_move(delta.0 as f32, delta.1 as f32);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let (Some(ctx), Some(demo), Some(last_time)) = (&self.ctx, &mut self.demo, self.last_time)
        else {
            return;
        };
        let now = std::time::Instant::now();
        let dt = (now - last_time).as_secs_f32().min(0.1);
        self.last_time = Some(now);

        demo.camera.update(&self.input, dt);
        demo.update(ctx, dt);

        let Some(surface) = &ctx.surface else {
            return;
        };
        let surface_texture = match surface.get_current_texture() {
            Ok(t) => t,
            Err(e) => {
                log::warn!("skipping frame: {e:?}");
                return;
            }
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        demo.render(ctx, &mut encoder, &view);
        ctx.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() {
    env_logger::init();
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("failed to create event loop: {e}");
            std::process::exit(1);
        }
    };
    let mut runner = Runner::default();
    if let Err(e) = event_loop.run_app(&mut runner) {
        log::error!("event loop error: {e}");
        std::process::exit(1);
    }
}
