//! # wgpu Backend
//!
//! `WgpuContext` renders into the surface of a window (a canvas on the web) with a
//! depth attachment and presents every frame. Shaders become shader modules keyed
//! by `ShaderId`, programs become render pipelines keyed by `ProgramId`, meshes
//! become one vertex buffer per attribute plus a `u32` index buffer, and textures
//! are uploaded from their decoded RGBA images.
//!
//! Draws are recorded while the frame is walked and encoded into a single render
//! pass when the frame ends.
//!
//! ## Validation
//! Shader modules and pipelines are created inside error scopes. A program is not
//! ready until those scopes have settled, which natively happens before
//! `prepare_program` returns and in the browser a few frames later. A failed scope
//! turns into `ShaderCompilation` or `ProgramLink`.
//!
//! ## Bind groups
//! - group 0: `FrameUniforms`
//! - group 1: `ObjectUniforms`, albedo texture, albedo sampler
//!
//! Only the first texture of a material is bound (as the albedo); an untextured
//! material samples a 1×1 white texture.

use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use log::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{
    context::{DrawCall, GpuContext},
    material::{Program, ProgramId, Shader, ShaderId},
    texture::{GpuTexture, Texture, TextureId},
    uniforms::{FrameUniforms, ObjectUniforms},
    validation::{first_failure, ErrorScope, PendingValidation, ScopeKind},
    vertex,
};
use crate::{
    engine_state::scene::{MeshHandle, MeshId},
    error::{EngineError, EngineResult},
};

const WHITE_TEXTURE_ID: &str = "__white";

type ScopeFuture = Pin<Box<dyn Future<Output = Option<wgpu::Error>>>>;

struct GpuMesh {
    streams: Vec<wgpu::Buffer>,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct RecordedDraw {
    program: ProgramId,
    mesh: MeshId,
    bind_group: wgpu::BindGroup,
}

/// wgpu renderer presenting to a window surface.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_texture: GpuTexture,
    object_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    white: GpuTexture,
    shaders: HashMap<ShaderId, wgpu::ShaderModule>,
    programs: HashMap<ProgramId, wgpu::RenderPipeline>,
    validations: HashMap<ProgramId, PendingValidation>,
    textures: HashMap<TextureId, GpuTexture>,
    meshes: HashMap<MeshId, GpuMesh>,
    clear_color: wgpu::Color,
    draws: Vec<RecordedDraw>,
}

impl WgpuContext {
    /// Creates a surface for `window`, then acquires an adapter able to present to
    /// it and a device.
    ///
    /// # Arguments
    /// * `window` - Window (or canvas) frames are presented to
    ///
    /// # Returns
    /// The context, or `Surface`/`Adapter`/`Device` if the GPU could not be set up.
    pub async fn new(window: Arc<Window>) -> EngineResult<Self> {
        // Backends::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_family = "wasm"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_family = "wasm")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| EngineError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| EngineError::Adapter(e.to_string()))?;
        info!("Using adapter {:?}", adapter.get_info());

        let required_limits = if cfg!(target_family = "wasm") {
            wgpu::Limits::downlevel_webgl2_defaults()
        } else {
            wgpu::Limits::downlevel_defaults()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("voxel-world device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                ..Default::default()
            })
            .await
            .map_err(|e| EngineError::Device(e.to_string()))?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| EngineError::Surface("the surface supports no format".to_owned()))?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("forward pipeline layout"),
            bind_group_layouts: &[&frame_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame bind group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let white = GpuTexture::from_image(
            &device,
            &queue,
            &image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])),
            WHITE_TEXTURE_ID,
        );
        let depth_texture = GpuTexture::create_depth_texture(
            &device,
            surface_config.width,
            surface_config.height,
            "DEPTH TEXTURE",
        );

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            depth_texture,
            object_layout,
            pipeline_layout,
            frame_buffer,
            frame_bind_group,
            white,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            validations: HashMap::new(),
            textures: HashMap::new(),
            meshes: HashMap::new(),
            clear_color: wgpu::Color::BLACK,
            draws: Vec::new(),
        })
    }

    /// Size of the surface.
    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn configure_surface(&mut self) {
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_texture = GpuTexture::create_depth_texture(
            &self.device,
            self.surface_config.width,
            self.surface_config.height,
            "DEPTH TEXTURE",
        );
    }

    /// Creates the shader module unless it exists.
    ///
    /// # Returns
    /// The error scope guarding a new module, `None` if it was already compiled.
    fn compile(&mut self, shader: &Shader) -> EngineResult<Option<ErrorScope<ScopeFuture>>> {
        if self.shaders.contains_key(shader.id()) {
            return Ok(None);
        }
        let source = match (shader.source(), shader.load_error()) {
            (Some(source), _) => source,
            (None, message) => {
                return Err(EngineError::ShaderCompilation {
                    id: shader.id().to_string(),
                    message: message.unwrap_or("source missing").to_owned(),
                })
            }
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&shader.id().0),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
        });
        let scope = self.pop_error_scope(ScopeKind::Compile, shader.id().to_string());

        debug!("Compiled shader {}", shader.id());
        self.shaders.insert(shader.id().clone(), module);
        Ok(Some(scope))
    }

    /// Creates the render pipeline of `program` from its compiled modules.
    fn link(&mut self, program: &Program, id: &ProgramId) -> EngineResult<ErrorScope<ScopeFuture>> {
        let (Some(vertex), Some(fragment)) = (
            self.shaders.get(program.vertex.id()),
            self.shaders.get(program.fragment.id()),
        ) else {
            return Err(EngineError::ProgramLink {
                id: id.to_string(),
                message: "shader module missing".to_owned(),
            });
        };

        let layouts = vertex::layouts();
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&id.to_string()),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some(program.vertex.stage().entry_point()),
                compilation_options: Default::default(),
                buffers: &layouts,
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some(program.fragment.stage().entry_point()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: GpuTexture::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        let scope = self.pop_error_scope(ScopeKind::Link, id.to_string());

        self.programs.insert(id.clone(), pipeline);
        Ok(scope)
    }

    fn pop_error_scope(&self, kind: ScopeKind, id: String) -> ErrorScope<ScopeFuture> {
        ErrorScope {
            kind,
            id,
            outcome: Box::pin(self.device.pop_error_scope()),
        }
    }

    /// Resolves the scopes of a program: on the spot natively, on a later turn of
    /// the browser event loop on the web.
    fn validate(&self, id: &ProgramId, scopes: Vec<ErrorScope<ScopeFuture>>) -> PendingValidation {
        let (pending, sender) = PendingValidation::new(id.to_string());
        let check = async move { sender.complete(Ok(first_failure(scopes).await)) };

        #[cfg(not(target_family = "wasm"))]
        pollster::block_on(check);
        #[cfg(target_family = "wasm")]
        wasm_bindgen_futures::spawn_local(check);

        pending
    }

    /// Reads the validation of a program, dropping everything it created on failure.
    fn settle(&mut self, id: &ProgramId, pending: &PendingValidation) -> EngineResult<bool> {
        let ready = pending.poll();
        match &ready {
            Ok(false) => return Ok(false),
            Ok(true) => debug!("Linked program {id}"),
            Err(_) => {
                self.programs.remove(id);
                if let Some(shader) = pending.failed_shader() {
                    self.shaders.remove(&ShaderId(shader.to_owned()));
                }
            }
        }
        self.validations.remove(id);
        ready
    }

    fn upload_mesh(&self, handle: &MeshHandle) -> EngineResult<GpuMesh> {
        let mesh = handle.mesh();
        let mut streams = Vec::with_capacity(vertex::STREAMS.len());
        for stream in vertex::STREAMS {
            let attribute = mesh.attribute(stream.attribute).ok_or_else(|| {
                EngineError::MalformedMesh(format!(
                    "mesh {:?} has no `{}` attribute",
                    handle.id(),
                    stream.attribute
                ))
            })?;
            if attribute.item_size != stream.components {
                return Err(EngineError::MalformedMesh(format!(
                    "attribute `{}` has {} components, the shader expects {}",
                    stream.attribute, attribute.item_size, stream.components
                )));
            }
            streams.push(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(stream.attribute),
                contents: bytemuck::cast_slice(&attribute.data),
                usage: wgpu::BufferUsages::VERTEX,
            }));
        }

        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("faces"),
            contents: bytemuck::cast_slice(mesh.faces()),
            usage: wgpu::BufferUsages::INDEX,
        });

        Ok(GpuMesh {
            streams,
            index_buffer,
            index_count: mesh.faces().len() as u32,
        })
    }
}

impl GpuContext for WgpuContext {
    fn begin_frame(&mut self, clear_color: [f32; 4]) {
        let [r, g, b, a] = clear_color.map(f64::from);
        self.clear_color = wgpu::Color { r, g, b, a };
        self.draws.clear();
    }

    fn set_frame(&mut self, frame: &FrameUniforms) {
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[*frame]));
    }

    fn prepare_program(&mut self, program: &Program) -> EngineResult<bool> {
        let id = program.id();
        if let Some(pending) = self.validations.get(&id).cloned() {
            return self.settle(&id, &pending);
        }
        if self.programs.contains_key(&id) {
            return Ok(true);
        }
        if program.is_loading() {
            return Ok(false);
        }

        let mut scopes = Vec::with_capacity(3);
        for shader in program.shaders() {
            scopes.extend(self.compile(shader)?);
        }
        scopes.push(self.link(program, &id)?);

        let pending = self.validate(&id, scopes);
        self.validations.insert(id.clone(), pending.clone());
        self.settle(&id, &pending)
    }

    fn prepare_texture(&mut self, texture: &Texture) -> bool {
        if self.textures.contains_key(texture.id()) {
            return true;
        }
        let Some(image) = texture.image() else {
            return false;
        };
        let uploaded = GpuTexture::from_image(&self.device, &self.queue, image, &texture.id().0);
        debug!("Uploaded texture {} ({}x{})", texture.id(), image.width(), image.height());
        self.textures.insert(texture.id().clone(), uploaded);
        true
    }

    fn prepare_mesh(&mut self, mesh: &MeshHandle) -> EngineResult<()> {
        if !self.meshes.contains_key(&mesh.id()) {
            let uploaded = self.upload_mesh(mesh)?;
            self.meshes.insert(mesh.id(), uploaded);
        }
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> EngineResult<()> {
        let albedo = call
            .material
            .textures()
            .next()
            .and_then(|texture| self.textures.get(texture.id()))
            .unwrap_or(&self.white);

        let uniforms = ObjectUniforms::new(call.world, call.material);
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("object uniforms"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object bind group"),
            layout: &self.object_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&albedo.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&albedo.sampler),
                },
            ],
        });

        self.draws.push(RecordedDraw {
            program: call.program.id(),
            mesh: call.mesh.id(),
            bind_group,
        });
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.configure_surface();
        debug!("Surface resized to {width}x{height}");
    }

    fn end_frame(&mut self) -> EngineResult<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("Surface lost, reconfiguring");
                self.configure_surface();
                self.draws.clear();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Timed out acquiring the next frame");
                self.draws.clear();
                return Ok(());
            }
            Err(err) => return Err(EngineError::Surface(err.to_string())),
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("forward pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            rpass.set_bind_group(0, &self.frame_bind_group, &[]);
            for draw in &self.draws {
                let (Some(pipeline), Some(mesh)) =
                    (self.programs.get(&draw.program), self.meshes.get(&draw.mesh))
                else {
                    continue;
                };
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(1, &draw.bind_group, &[]);
                for (slot, buffer) in mesh.streams.iter().enumerate() {
                    rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                rpass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit([encoder.finish()]);
        frame.present();
        self.draws.clear();
        Ok(())
    }

    fn destroy_mesh(&mut self, mesh: &MeshHandle) -> bool {
        if let Some(uploaded) = self.meshes.remove(&mesh.id()) {
            for buffer in &uploaded.streams {
                buffer.destroy();
            }
            uploaded.index_buffer.destroy();
        }
        true
    }

    fn destroy_texture(&mut self, texture: &Texture) -> bool {
        if let Some(uploaded) = self.textures.remove(texture.id()) {
            uploaded.texture.destroy();
        }
        true
    }

    fn destroy_program(&mut self, program: &Program) -> bool {
        let id = program.id();
        self.validations.remove(&id);
        self.programs.remove(&id);
        true
    }

    fn destroy_shader(&mut self, shader: &Shader) -> bool {
        if shader.is_loading() {
            return false;
        }
        self.shaders.remove(shader.id());
        true
    }
}
