#[cfg(target_arch = "wasm32")]
mod imp {
    use ::wgpu::util::DeviceExt;
    use futures::FutureExt as _;
    use std::borrow::Cow;
    use std::collections::HashMap;
    use std::num::NonZeroU64;
    use wasm_bindgen::JsCast;

    use gpu::programs::{POINT_QUAD_VERTICES, wgsl_source};
    use gpu::{
        BufferId, BufferKind, Capability, DrawCall, GpuBackend, GpuError, ProgramId, ProgramKind,
        Topology, Uniforms,
    };
    use scene::Viewport;

    const UNIFORM_SIZE: u64 = std::mem::size_of::<Uniforms>() as u64;
    const POSITION_STRIDE: u64 = 12;
    const NORMAL_STRIDE: u64 = 12;
    const COLOR_STRIDE: u64 = 16;
    const PROGRAM_KINDS: [ProgramKind; 3] =
        [ProgramKind::Lit, ProgramKind::Points, ProgramKind::Background];

    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    struct PipelineKey {
        program: ProgramKind,
        topology: Topology,
        depth_test: bool,
        blend: bool,
        polygon_offset: bool,
    }

    #[derive(Debug)]
    enum Command {
        Viewport(Viewport),
        Draw {
            key: PipelineKey,
            uniform_offset: u32,
            call: DrawCall,
        },
    }

    #[derive(Debug)]
    struct Program {
        kind: ProgramKind,
        module: ::wgpu::ShaderModule,
    }

    #[derive(Debug)]
    struct UniformRing {
        buffer: ::wgpu::Buffer,
        bind_group: ::wgpu::BindGroup,
        capacity: u64,
    }

    /// [`GpuBackend`] over wgpu (WebGL2 in the browser).
    ///
    /// State calls are recorded during the frame and replayed into a single
    /// render pass at `end_frame`. Each `set_uniforms` takes a fresh aligned
    /// slot of one uniform buffer bound with a dynamic offset.
    #[derive(Debug)]
    pub struct WgpuBackend {
        _instance: &'static ::wgpu::Instance,
        surface: ::wgpu::Surface<'static>,
        device: ::wgpu::Device,
        queue: ::wgpu::Queue,
        config: ::wgpu::SurfaceConfiguration,
        _canvas: web_sys::HtmlCanvasElement,
        depth_view: ::wgpu::TextureView,
        uniform_layout: ::wgpu::BindGroupLayout,
        pipeline_layout: ::wgpu::PipelineLayout,
        uniform_alignment: u64,
        uniforms: Option<UniformRing>,
        zeros: Option<(::wgpu::Buffer, u64)>,
        programs: Vec<Program>,
        failed_programs: HashMap<ProgramKind, String>,
        pipelines: HashMap<PipelineKey, ::wgpu::RenderPipeline>,
        buffers: HashMap<BufferId, ::wgpu::Buffer>,
        next_buffer: u32,

        // Per-frame recording.
        clear_color: ::wgpu::Color,
        depth_test: bool,
        blend: bool,
        polygon_offset: bool,
        program: Option<ProgramKind>,
        uniform_offset: Option<u32>,
        staging: Vec<u8>,
        commands: Vec<Command>,
    }

    fn create_depth_view(
        device: &::wgpu::Device,
        config: &::wgpu::SurfaceConfiguration,
    ) -> ::wgpu::TextureView {
        let tex = device.create_texture(&::wgpu::TextureDescriptor {
            label: Some("viewer-depth"),
            size: ::wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: ::wgpu::TextureDimension::D2,
            format: ::wgpu::TextureFormat::Depth24Plus,
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        tex.create_view(&::wgpu::TextureViewDescriptor::default())
    }

    /// Compiles one WGSL module, capturing validation errors instead of
    /// handing them to the device's uncaptured-error handler.
    async fn compile_shader(
        device: &::wgpu::Device,
        kind: ProgramKind,
    ) -> Result<::wgpu::ShaderModule, String> {
        device.push_error_scope(::wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(::wgpu::ShaderModuleDescriptor {
            label: Some("viewer-shader"),
            source: ::wgpu::ShaderSource::Wgsl(Cow::Owned(wgsl_source(kind))),
        });
        match device.pop_error_scope().await {
            Some(err) => Err(err.to_string()),
            None => Ok(module),
        }
    }

    pub async fn init_from_canvas_id(canvas_id: &str) -> Result<WgpuBackend, GpuError> {
        let surface_err = |what: &str| GpuError::Surface(what.to_string());
        let window = web_sys::window().ok_or_else(|| surface_err("window missing"))?;
        let document = window
            .document()
            .ok_or_else(|| surface_err("document missing"))?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| surface_err("canvas missing"))?
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .map_err(|_| surface_err("element is not a canvas"))?;

        // `wgpu::Surface` must not outlive its `wgpu::Instance`; the
        // instance lives for the rest of the page.
        let instance: &'static ::wgpu::Instance = Box::leak(Box::new(::wgpu::Instance::new(
            &::wgpu::InstanceDescriptor {
                backends: ::wgpu::Backends::GL,
                ..Default::default()
            },
        )));

        let surface = instance
            .create_surface(::wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|e| GpuError::Surface(format!("surface error: {e}")))?;

        let adapter = instance
            .request_adapter(&::wgpu::RequestAdapterOptions {
                power_preference: ::wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GpuError::Surface(format!("adapter error: {e}")))?;

        let (device, queue) = adapter
            .request_device(&::wgpu::DeviceDescriptor {
                label: Some("viewer-device"),
                required_features: ::wgpu::Features::empty(),
                required_limits: ::wgpu::Limits::downlevel_webgl2_defaults(),
                ..Default::default()
            })
            .await
            .map_err(|e| GpuError::Surface(format!("device error: {e}")))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| surface_err("no surface formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(::wgpu::CompositeAlphaMode::Auto);

        let config = ::wgpu::SurfaceConfiguration {
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: canvas.width().max(1),
            height: canvas.height().max(1),
            desired_maximum_frame_latency: 2,
            present_mode: ::wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        let uniform_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
            label: Some("viewer-uniforms-bgl"),
            entries: &[::wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: ::wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: ::wgpu::BindingType::Buffer {
                    ty: ::wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(UNIFORM_SIZE),
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&::wgpu::PipelineLayoutDescriptor {
            label: Some("viewer-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout],
            immediate_size: 0,
        });
        let uniform_alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment)
            .max(UNIFORM_SIZE.next_power_of_two());

        let mut programs = Vec::new();
        let mut failed_programs = HashMap::new();
        for kind in PROGRAM_KINDS {
            match compile_shader(&device, kind).await {
                Ok(module) => programs.push(Program { kind, module }),
                Err(message) => {
                    tracing::error!(?kind, error = %message, "shader compilation failed");
                    failed_programs.insert(kind, message);
                }
            }
        }

        tracing::info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "wgpu surface ready"
        );

        Ok(WgpuBackend {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            _canvas: canvas,
            depth_view,
            uniform_layout,
            pipeline_layout,
            uniform_alignment,
            uniforms: None,
            zeros: None,
            programs,
            failed_programs,
            pipelines: HashMap::new(),
            buffers: HashMap::new(),
            next_buffer: 0,
            clear_color: ::wgpu::Color::BLACK,
            depth_test: true,
            blend: false,
            polygon_offset: false,
            program: None,
            uniform_offset: None,
            staging: Vec::new(),
            commands: Vec::new(),
        })
    }

    fn primitive_topology(program: ProgramKind, topology: Topology) -> ::wgpu::PrimitiveTopology {
        match (program, topology) {
            (ProgramKind::Lit, Topology::Lines) => ::wgpu::PrimitiveTopology::LineList,
            // Points are expanded to instanced quads.
            _ => ::wgpu::PrimitiveTopology::TriangleList,
        }
    }

    const POSITION_ATTR: [::wgpu::VertexAttribute; 1] =
        ::wgpu::vertex_attr_array![0 => Float32x3];
    const NORMAL_ATTR: [::wgpu::VertexAttribute; 1] = ::wgpu::vertex_attr_array![1 => Float32x3];
    const COLOR_ATTR: [::wgpu::VertexAttribute; 1] = ::wgpu::vertex_attr_array![2 => Float32x4];

    fn vertex_layouts(program: ProgramKind) -> Vec<::wgpu::VertexBufferLayout<'static>> {
        let layout = |stride: u64, step_mode, attributes: &'static [::wgpu::VertexAttribute]| {
            ::wgpu::VertexBufferLayout {
                array_stride: stride,
                step_mode,
                attributes,
            }
        };
        match program {
            ProgramKind::Lit => vec![
                layout(POSITION_STRIDE, ::wgpu::VertexStepMode::Vertex, &POSITION_ATTR),
                layout(NORMAL_STRIDE, ::wgpu::VertexStepMode::Vertex, &NORMAL_ATTR),
                layout(COLOR_STRIDE, ::wgpu::VertexStepMode::Vertex, &COLOR_ATTR),
            ],
            ProgramKind::Points => vec![
                layout(POSITION_STRIDE, ::wgpu::VertexStepMode::Instance, &POSITION_ATTR),
                layout(COLOR_STRIDE, ::wgpu::VertexStepMode::Instance, &COLOR_ATTR),
            ],
            ProgramKind::Background => Vec::new(),
        }
    }

    impl WgpuBackend {
        fn module(&self, kind: ProgramKind) -> Option<&::wgpu::ShaderModule> {
            self.programs.iter().find(|p| p.kind == kind).map(|p| &p.module)
        }

        fn ensure_pipeline(&mut self, key: PipelineKey) -> Result<(), GpuError> {
            if self.pipelines.contains_key(&key) {
                return Ok(());
            }
            let module = self.module(key.program).ok_or_else(|| GpuError::Program {
                kind: key.program,
                message: "program was never created".to_string(),
            })?;

            let buffers = vertex_layouts(key.program);
            // Depth bias only affects filled triangles, like GL polygon offset.
            let bias = if key.polygon_offset && key.topology == Topology::Triangles {
                ::wgpu::DepthBiasState {
                    constant: 1,
                    slope_scale: 1.0,
                    clamp: 0.0,
                }
            } else {
                ::wgpu::DepthBiasState::default()
            };

            self.device.push_error_scope(::wgpu::ErrorFilter::Validation);
            let pipeline = self
                .device
                .create_render_pipeline(&::wgpu::RenderPipelineDescriptor {
                    label: Some("viewer-pipeline"),
                    layout: Some(&self.pipeline_layout),
                    vertex: ::wgpu::VertexState {
                        module,
                        entry_point: Some("vs_main"),
                        compilation_options: Default::default(),
                        buffers: &buffers,
                    },
                    fragment: Some(::wgpu::FragmentState {
                        module,
                        entry_point: Some("fs_main"),
                        compilation_options: Default::default(),
                        targets: &[Some(::wgpu::ColorTargetState {
                            format: self.config.format,
                            blend: Some(if key.blend {
                                ::wgpu::BlendState::ALPHA_BLENDING
                            } else {
                                ::wgpu::BlendState::REPLACE
                            }),
                            write_mask: ::wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: ::wgpu::PrimitiveState {
                        topology: primitive_topology(key.program, key.topology),
                        strip_index_format: None,
                        front_face: ::wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        polygon_mode: ::wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: Some(::wgpu::DepthStencilState {
                        format: ::wgpu::TextureFormat::Depth24Plus,
                        depth_write_enabled: key.depth_test,
                        depth_compare: if key.depth_test {
                            ::wgpu::CompareFunction::LessEqual
                        } else {
                            ::wgpu::CompareFunction::Always
                        },
                        stencil: ::wgpu::StencilState::default(),
                        bias,
                    }),
                    multisample: ::wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                });
            // The GL backend validates synchronously, so the scope is already resolved.
            if let Some(Some(err)) = self.device.pop_error_scope().now_or_never() {
                return Err(GpuError::Program {
                    kind: key.program,
                    message: err.to_string(),
                });
            }
            tracing::debug!(?key, "render pipeline created");
            self.pipelines.insert(key, pipeline);
            Ok(())
        }

        /// Uploads this frame's uniform slots, growing the ring when needed.
        fn flush_uniforms(&mut self) {
            let needed = (self.staging.len() as u64).max(self.uniform_alignment);
            let big_enough = self.uniforms.as_ref().is_some_and(|u| u.capacity >= needed);
            if !big_enough {
                let capacity = needed.next_power_of_two();
                let buffer = self.device.create_buffer(&::wgpu::BufferDescriptor {
                    label: Some("viewer-uniforms"),
                    size: capacity,
                    usage: ::wgpu::BufferUsages::UNIFORM | ::wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = self.device.create_bind_group(&::wgpu::BindGroupDescriptor {
                    label: Some("viewer-uniforms-bg"),
                    layout: &self.uniform_layout,
                    entries: &[::wgpu::BindGroupEntry {
                        binding: 0,
                        resource: ::wgpu::BindingResource::Buffer(::wgpu::BufferBinding {
                            buffer: &buffer,
                            offset: 0,
                            size: NonZeroU64::new(UNIFORM_SIZE),
                        }),
                    }],
                });
                self.uniforms = Some(UniformRing {
                    buffer,
                    bind_group,
                    capacity,
                });
            }
            if let Some(ring) = &self.uniforms
                && !self.staging.is_empty()
            {
                self.queue.write_buffer(&ring.buffer, 0, &self.staging);
            }
        }

        /// Zero normals for lit draws without a normal stream.
        fn ensure_zeros(&mut self, vertices: u64) {
            let size = (vertices * NORMAL_STRIDE).max(NORMAL_STRIDE);
            if self.zeros.as_ref().is_some_and(|(_, len)| *len >= size) {
                return;
            }
            let size = size.next_power_of_two();
            let buffer = self
                .device
                .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                    label: Some("viewer-zero-normals"),
                    contents: &vec![0u8; size as usize],
                    usage: ::wgpu::BufferUsages::VERTEX,
                });
            self.zeros = Some((buffer, size));
        }

        fn buffer(&self, id: BufferId) -> Result<&::wgpu::Buffer, GpuError> {
            self.buffers
                .get(&id)
                .ok_or_else(|| GpuError::Draw(format!("unknown buffer {}", id.0)))
        }
    }

    impl GpuBackend for WgpuBackend {
        /// Modules are compiled up front; this hands out the compiled one or
        /// the captured compilation error.
        fn create_program(&mut self, kind: ProgramKind) -> Result<ProgramId, GpuError> {
            if let Some(message) = self.failed_programs.get(&kind) {
                return Err(GpuError::Program {
                    kind,
                    message: message.clone(),
                });
            }
            self.programs
                .iter()
                .position(|p| p.kind == kind)
                .map(|index| ProgramId(index as u32))
                .ok_or_else(|| GpuError::Program {
                    kind,
                    message: "no compiled module".to_string(),
                })
        }

        fn create_buffer(&mut self, kind: BufferKind, bytes: &[u8]) -> Result<BufferId, GpuError> {
            let usage = match kind {
                BufferKind::Vertex => ::wgpu::BufferUsages::VERTEX,
                BufferKind::Index => ::wgpu::BufferUsages::INDEX,
            };
            let buffer = self
                .device
                .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                    label: Some("viewer-geometry"),
                    contents: bytes,
                    usage,
                });
            let id = BufferId(self.next_buffer);
            self.next_buffer = self
                .next_buffer
                .checked_add(1)
                .ok_or_else(|| GpuError::Buffer("buffer ids exhausted".to_string()))?;
            self.buffers.insert(id, buffer);
            Ok(id)
        }

        fn delete_buffer(&mut self, buffer: BufferId) {
            if let Some(buffer) = self.buffers.remove(&buffer) {
                buffer.destroy();
            }
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.config.width = width.max(1);
            self.config.height = height.max(1);
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, &self.config);
        }

        fn begin_frame(&mut self) -> Result<(), GpuError> {
            self.commands.clear();
            self.staging.clear();
            self.clear_color = ::wgpu::Color::BLACK;
            self.depth_test = true;
            self.blend = false;
            self.polygon_offset = false;
            self.program = None;
            self.uniform_offset = None;
            Ok(())
        }

        /// Becomes the load op of the frame's render pass.
        fn clear(&mut self, color: [f32; 4]) {
            if !self.commands.is_empty() {
                tracing::debug!("clear after draws ignored");
                return;
            }
            self.clear_color = ::wgpu::Color {
                r: f64::from(color[0]),
                g: f64::from(color[1]),
                b: f64::from(color[2]),
                a: f64::from(color[3]),
            };
        }

        fn set_viewport(&mut self, viewport: Viewport) {
            self.commands.push(Command::Viewport(viewport));
        }

        fn enable(&mut self, capability: Capability) {
            match capability {
                Capability::DepthTest => self.depth_test = true,
                Capability::Blend => self.blend = true,
                Capability::PolygonOffsetFill => self.polygon_offset = true,
            }
        }

        fn disable(&mut self, capability: Capability) {
            match capability {
                Capability::DepthTest => self.depth_test = false,
                Capability::Blend => self.blend = false,
                Capability::PolygonOffsetFill => self.polygon_offset = false,
            }
        }

        fn use_program(&mut self, program: ProgramId) {
            self.program = self.programs.get(program.0 as usize).map(|p| p.kind);
        }

        fn set_uniforms(&mut self, uniforms: &Uniforms) {
            let offset = self.staging.len();
            self.staging.extend_from_slice(bytemuck::bytes_of(uniforms));
            self.staging.resize(offset + self.uniform_alignment as usize, 0);
            self.uniform_offset = Some(offset as u32);
        }

        fn draw(&mut self, call: &DrawCall) -> Result<(), GpuError> {
            let program = self
                .program
                .ok_or_else(|| GpuError::Draw("no program bound".to_string()))?;
            let uniform_offset = self
                .uniform_offset
                .ok_or_else(|| GpuError::Draw("no uniforms set".to_string()))?;
            if let Some(streams) = call.streams {
                self.buffer(streams.position)?;
                self.buffer(streams.color)?;
                if let Some(normal) = streams.normal {
                    self.buffer(normal)?;
                }
            } else if program != ProgramKind::Background {
                return Err(GpuError::Draw(format!("{program:?} draw without vertex streams")));
            }
            if let Some(index) = call.index {
                self.buffer(index.buffer)?;
            }
            self.commands.push(Command::Draw {
                key: PipelineKey {
                    program,
                    topology: call.topology,
                    depth_test: self.depth_test,
                    blend: self.blend,
                    polygon_offset: self.polygon_offset,
                },
                uniform_offset,
                call: *call,
            });
            Ok(())
        }

        fn end_frame(&mut self) -> Result<(), GpuError> {
            let commands = std::mem::take(&mut self.commands);
            let mut zero_normals = 0;
            for command in &commands {
                if let Command::Draw { key, call, .. } = command {
                    // The replay below skips draws whose pipeline is missing.
                    if let Err(err) = self.ensure_pipeline(*key) {
                        tracing::warn!(?key, error = %err, "draw skipped");
                        continue;
                    }
                    if key.program == ProgramKind::Lit
                        && call.streams.is_some_and(|s| s.normal.is_none())
                    {
                        zero_normals = zero_normals.max(u64::from(call.vertex_count));
                    }
                }
            }
            if zero_normals > 0 {
                self.ensure_zeros(zero_normals);
            }
            self.flush_uniforms();

            let frame = self
                .surface
                .get_current_texture()
                .map_err(|e| GpuError::Surface(format!("surface acquire failed: {e}")))?;
            let view = frame
                .texture
                .create_view(&::wgpu::TextureViewDescriptor::default());
            let mut encoder = self
                .device
                .create_command_encoder(&::wgpu::CommandEncoderDescriptor {
                    label: Some("viewer-frame-encoder"),
                });

            {
                let mut rpass = encoder.begin_render_pass(&::wgpu::RenderPassDescriptor {
                    label: Some("viewer-pass"),
                    color_attachments: &[Some(::wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: ::wgpu::Operations {
                            load: ::wgpu::LoadOp::Clear(self.clear_color),
                            store: ::wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(::wgpu::RenderPassDepthStencilAttachment {
                        view: &self.depth_view,
                        depth_ops: Some(::wgpu::Operations {
                            load: ::wgpu::LoadOp::Clear(1.0),
                            store: ::wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                    multiview_mask: None,
                });

                let surface_w = self.config.width;
                let surface_h = self.config.height;
                for command in &commands {
                    match command {
                        Command::Viewport(vp) => {
                            // Layer viewports are bottom-left based; wgpu's are top-left.
                            let x = vp.x.min(surface_w);
                            let w = vp.width.min(surface_w - x);
                            let top = surface_h.saturating_sub(vp.y.saturating_add(vp.height));
                            let h = vp.height.min(surface_h - top);
                            if w == 0 || h == 0 {
                                continue;
                            }
                            rpass.set_viewport(x as f32, top as f32, w as f32, h as f32, 0.0, 1.0);
                        }
                        Command::Draw {
                            key,
                            uniform_offset,
                            call,
                        } => {
                            let (Some(pipeline), Some(ring)) =
                                (self.pipelines.get(key), self.uniforms.as_ref())
                            else {
                                continue;
                            };
                            rpass.set_pipeline(pipeline);
                            rpass.set_bind_group(0, &ring.bind_group, &[*uniform_offset]);

                            let Some(streams) = call.streams else {
                                rpass.draw(0..call.vertex_count, 0..1);
                                continue;
                            };
                            let (Some(position), Some(color)) =
                                (self.buffers.get(&streams.position), self.buffers.get(&streams.color))
                            else {
                                continue;
                            };
                            if key.program == ProgramKind::Points {
                                rpass.set_vertex_buffer(0, position.slice(..));
                                rpass.set_vertex_buffer(1, color.slice(..));
                                rpass.draw(0..POINT_QUAD_VERTICES, 0..call.vertex_count);
                                continue;
                            }

                            let normal = match streams.normal {
                                Some(id) => self.buffers.get(&id),
                                None => self.zeros.as_ref().map(|(b, _)| b),
                            };
                            let Some(normal) = normal else {
                                continue;
                            };
                            rpass.set_vertex_buffer(0, position.slice(..));
                            rpass.set_vertex_buffer(1, normal.slice(..));
                            rpass.set_vertex_buffer(2, color.slice(..));
                            match call.index.and_then(|i| self.buffers.get(&i.buffer).map(|b| (b, i.count))) {
                                Some((index, count)) => {
                                    rpass.set_index_buffer(index.slice(..), ::wgpu::IndexFormat::Uint16);
                                    rpass.draw_indexed(0..count, 0, 0..1);
                                }
                                None => rpass.draw(0..call.vertex_count, 0..1),
                            }
                        }
                    }
                }
            }

            self.queue.submit(std::iter::once(encoder.finish()));
            frame.present();
            Ok(())
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use imp::{WgpuBackend, init_from_canvas_id};
