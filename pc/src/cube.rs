use std::borrow::Cow;
use std::collections::HashMap;
use std::mem;

use bytemuck::{Pod, Zeroable};
use cgmath::{Deg, Matrix4, Vector3};
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, BlendState, Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites, CommandEncoderDescriptor, CompareFunction, DepthStencilState, Device, FragmentState, FrontFace, IndexFormat, LoadOp, MultisampleState, Operations, PipelineLayout, PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, TextureFormat, VertexAttribute, VertexBufferLayout, VertexState, VertexStepMode, vertex_attr_array};

use rsholo_lib::GameApp;
use rsholo_lib::gpu::{DEPTH_FORMAT, WgpuContext, WgpuDevice};
use rsholo_lib::holo::{CameraId, SceneTarget};

const ROT_SPEED: f32 = 45.0; // [deg/s]
const CUBE_POS: Vector3<f32> = Vector3::new(0.0, 0.0, 1.5);
const CUBE_SCALE: f32 = 0.3;

// #VIEW_LEN# is one matrix per eye, see ViewProjectionBuffer. The eye is
// selected by instance index, since every eye is drawn in its own pass.
const SHADER_TMPL: &str = "
struct Uni {
    model_m: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> uni: Uni;
@group(0) @binding(#VIEW_PROJECTION_SLOT#) var<uniform> view_projection: array<mat4x4<f32>, #VIEW_LEN#>;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
}

@vertex
fn vs_main(@location(0) pos: vec3<f32>, @location(1) color: vec3<f32>, @builtin(instance_index) eye: u32) -> VertexOutput {
    var out: VertexOutput;

    // Matrices are stored transposed, multiply from the left.
    let world = uni.model_m * vec4<f32>(pos, 1.0);
    out.position = world * view_projection[eye];
    out.color = color;

    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
";

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    pos: [f32; 3],
    color: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uni {
    model_m: [[f32; 4]; 4],
}

const VERTEX_ATTRS: [VertexAttribute; 2] = vertex_attr_array![ // See vertex shader->@location().
    0 => Float32x3,
    1 => Float32x3,
];

#[rustfmt::skip]
const VERTEXES: [Vertex; 8] = [
    Vertex { pos: [-1.0, -1.0, -1.0], color: [0.0, 0.0, 0.0] },
    Vertex { pos: [ 1.0, -1.0, -1.0], color: [1.0, 0.0, 0.0] },
    Vertex { pos: [ 1.0,  1.0, -1.0], color: [1.0, 1.0, 0.0] },
    Vertex { pos: [-1.0,  1.0, -1.0], color: [0.0, 1.0, 0.0] },
    Vertex { pos: [-1.0, -1.0,  1.0], color: [0.0, 0.0, 1.0] },
    Vertex { pos: [ 1.0, -1.0,  1.0], color: [1.0, 0.0, 1.0] },
    Vertex { pos: [ 1.0,  1.0,  1.0], color: [1.0, 1.0, 1.0] },
    Vertex { pos: [-1.0,  1.0,  1.0], color: [0.0, 1.0, 1.0] },
];

#[rustfmt::skip]
const INDEXES: [u16; 36] = [
    0, 2, 1, 0, 3, 2, // -z
    4, 5, 6, 4, 6, 7, // +z
    0, 1, 5, 0, 5, 4, // -y
    3, 7, 6, 3, 6, 2, // +y
    0, 4, 7, 0, 7, 3, // -x
    1, 2, 6, 1, 6, 5, // +x
];

/// A spinning, vertex-colored cube floating in front of the initial head
/// position.
pub struct CubeApp {
    view_projection_slot: u32,
    angle: f32, // [deg]
    gpu_opt: Option<CubeGpu>,
}

struct CubeGpu {
    device: Device,
    vertex_buf: Buffer,
    index_buf: Buffer,
    uni_buf: Buffer,
    bg_layouts: HashMap<u32, (BindGroupLayout, PipelineLayout)>, // eye count ->
    pipelines: HashMap<(TextureFormat, u32), RenderPipeline>,
    bgs: HashMap<CameraId, (Buffer, BindGroup)>,
}

impl CubeApp {
    pub fn new(view_projection_slot: u32) -> Self {
        assert!(view_projection_slot != 0, "Binding 0 is reserved for the model uniform");

        Self {
            view_projection_slot,
            angle: 0.0,
            gpu_opt: None,
        }
    }

    fn get_model_m(&self) -> Matrix4<f32> {
        Matrix4::from_translation(CUBE_POS) * Matrix4::from_angle_z(Deg(self.angle)) * Matrix4::from_angle_x(Deg(self.angle * 0.5)) * Matrix4::from_scale(CUBE_SCALE)
    }
}

impl CubeGpu {
    fn get_layouts(&mut self, slot: u32, eye_count: u32) -> &(BindGroupLayout, PipelineLayout) {
        let device = &self.device;

        self.bg_layouts.entry(eye_count).or_insert_with(|| {
            let bg_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: None,
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0, // See vertex shader->@binding().
                        visibility: ShaderStages::VERTEX,
                        ty: BindingType::Buffer {
                            ty: BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: slot, // See vertex shader->@binding().
                        visibility: ShaderStages::VERTEX,
                        ty: BindingType::Buffer {
                            ty: BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ]
            });

            let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &[
                    &bg_layout, // See vertex shader->@group().
                ],
                immediate_size: 0,
            });

            (bg_layout, pipeline_layout)
        })
    }

    fn get_pipeline(&mut self, slot: u32, color_format: TextureFormat, eye_count: u32) -> RenderPipeline {
        if let Some(pipeline) = self.pipelines.get(&(color_format, eye_count)) {
            return pipeline.clone();
        }

        let source = SHADER_TMPL.replace("#VIEW_PROJECTION_SLOT#", &slot.to_string()).replace("#VIEW_LEN#", &eye_count.to_string());
        let shader = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("cube"),
            source: ShaderSource::Wgsl(Cow::Owned(source)),
        });

        let device = self.device.clone();
        let (_, pipeline_layout) = self.get_layouts(slot, eye_count);

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("cube"),
            layout: Some(pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[VertexBufferLayout {
                    array_stride: mem::size_of::<Vertex>() as u64,
                    step_mode: VertexStepMode::Vertex,
                    attributes: VERTEX_ATTRS.as_slice(),
                }],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(ColorTargetState { // See fragment shader->@location().
                    format: color_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview_mask: None,
            cache: None
        });

        self.pipelines.insert((color_format, eye_count), pipeline.clone());
        pipeline
    }

    fn get_bind_group(&mut self, slot: u32, camera_id: CameraId, eye_count: u32, view_projection_buf: &Buffer) -> BindGroup {
        // The session recreates the buffer with the camera's resources.

        if let Some((buf, bg)) = self.bgs.get(&camera_id) {
            if buf == view_projection_buf {
                return bg.clone();
            }
        }

        let device = self.device.clone();
        let uni_buf = self.uni_buf.clone();
        let (bg_layout, _) = self.get_layouts(slot, eye_count);

        let bg = device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: bg_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0, // See vertex shader->@binding().
                    resource: uni_buf.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: slot,
                    resource: view_projection_buf.as_entire_binding(),
                },
            ]
        });

        self.bgs.insert(camera_id, (view_projection_buf.clone(), bg.clone()));
        bg
    }
}

impl GameApp<WgpuDevice> for CubeApp {
    fn startup(&mut self, device: &WgpuDevice, _context: &WgpuContext) {
        let device = device.get_device();

        let vertex_buf = device.create_buffer_init(&BufferInitDescriptor {
            label: None,
            contents: bytemuck::cast_slice(&VERTEXES),
            usage: BufferUsages::VERTEX,
        });

        let index_buf = device.create_buffer_init(&BufferInitDescriptor {
            label: None,
            contents: bytemuck::cast_slice(&INDEXES),
            usage: BufferUsages::INDEX,
        });

        let uni_buf = device.create_buffer_init(&BufferInitDescriptor {
            label: None,
            contents: bytemuck::bytes_of(&Uni::zeroed()),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        self.gpu_opt = Some(CubeGpu {
            device: device.clone(),
            vertex_buf,
            index_buf,
            uni_buf,
            bg_layouts: HashMap::new(),
            pipelines: HashMap::new(),
            bgs: HashMap::new(),
        });

        log::info!("cube loaded");
    }

    fn cleanup(&mut self) {
        self.gpu_opt = None;
    }

    fn suspend(&mut self) {
        // Bind groups are cheap to recreate, pipelines are kept.
        if let Some(gpu) = &mut self.gpu_opt {
            gpu.bgs.clear();
        }
    }

    fn update(&mut self, delta_t: f32) {
        self.angle = (self.angle + ROT_SPEED * delta_t) % 360.0;
    }

    fn render_scene(&mut self, context: &WgpuContext, target: &SceneTarget<WgpuDevice>) {
        let model_m = self.get_model_m();
        let slot = self.view_projection_slot;

        let gpu = match &mut self.gpu_opt {
            Some(gpu) => gpu,
            None => return,
        };

        // Stale until device_restored() has run.
        if gpu.device != *context.get_device() {
            return;
        }

        let color_format = match target.format {
            Some(color_format) => color_format,
            None => return,
        };

        // Draw with whatever the session bound to the pipeline.

        let (rtv, dsv) = match context.get_render_targets() {
            (Some(rtv), Some(dsv)) => (rtv, dsv),
            _ => return,
        };
        let view_projection_buf = context.get_vertex_constant_buffer(slot).unwrap_or_else(|| target.view_projection_buffer.clone());
        let viewport = context.get_viewport().unwrap_or(target.viewport);

        let eye_count = rtv.get_layer_views().len() as u32;
        let pipeline = gpu.get_pipeline(slot, color_format, eye_count);
        let bg = gpu.get_bind_group(slot, target.camera_id, eye_count, &view_projection_buf);

        let uni = Uni {
            model_m: model_m.into(),
        };
        context.get_queue().write_buffer(&gpu.uni_buf, 0, bytemuck::bytes_of(&uni));

        let mut encoder = context.get_device().create_command_encoder(&CommandEncoderDescriptor {
            label: None,
        });

        for (eye, (color_view, depth_view)) in rtv.get_layer_views().iter().zip(dsv.get_layer_views()).enumerate() {
            let eye = eye as u32;

            // Already cleared by the session.

            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                multiview_mask: None,
                color_attachments: &[Some(RenderPassColorAttachment { // See fragment shader->@location(0).
                    view: color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Load,
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Load,
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_viewport(viewport.x, viewport.y, viewport.width, viewport.height, viewport.min_depth, viewport.max_depth);
            render_pass.set_pipeline(&pipeline);
            render_pass.set_bind_group(0, &bg, &[]);
            render_pass.set_vertex_buffer(0, gpu.vertex_buf.slice(..)); // See VertexState->buffers[0].
            render_pass.set_index_buffer(gpu.index_buf.slice(..), IndexFormat::Uint16);
            render_pass.draw_indexed(0..INDEXES.len() as u32, 0, eye..eye + 1);
        }

        context.get_queue().submit([encoder.finish()]);
    }
}
