use std::{thread, time::Duration};

use glam::{Mat4, Vec3, Vec4};
use gl_bridge::{
    init_logging, state::gl, BindingState, BridgeConfig, BufferKind, Device, ElementFormat,
    ElementUsage, Frustum, HeadlessBackend, IndexFormat, LoggingConfig, PipelineDescriptor,
    ProgramDescriptor, RenderState, Topology, UniformDeclaration, UniformValue, VertexElement,
    VertexLayout,
};
use once_cell::sync::Lazy;

static LOGGING: Lazy<()> = Lazy::new(|| {
    init_logging(LoggingConfig {
        env_filter: Some("gl_bridge=debug".to_string()),
        ..LoggingConfig::default()
    })
});

const TERRAIN_SHADER: &str = r#"
struct Globals {
    model_view: mat4x4<f32>,
    color: vec4<f32>,
    chunk_offset: vec3<f32>,
}
@group(0) @binding(0) var<uniform> globals: Globals;

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
) -> @builtin(position) vec4<f32> {
    return globals.model_view * vec4<f32>(position + globals.chunk_offset, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return globals.color;
}
"#;

fn color_layout() -> Vec<VertexElement> {
    vec![
        VertexElement::new(ElementUsage::Position, ElementFormat::Float32x3),
        VertexElement::new(ElementUsage::Color, ElementFormat::Unorm8x4),
    ]
}

fn device() -> Device {
    Lazy::force(&LOGGING);
    Device::new(HeadlessBackend::new(), BridgeConfig::default()).expect("headless device")
}

fn terrain(device: &mut Device) -> gl_bridge::PipelineId {
    let program = device
        .create_program(ProgramDescriptor::wgsl("position_color", TERRAIN_SHADER))
        .expect("program");
    device
        .create_pipeline(PipelineDescriptor {
            name: "position_color".to_string(),
            program,
            vertex_layout: VertexLayout::new(color_layout()),
            topology: Topology::TriangleList,
            uniforms: vec![
                UniformDeclaration::new("ModelViewMat", "mat4"),
                UniformDeclaration::new("ColorModulator", "vec4"),
                UniformDeclaration::new("ChunkOffset", "vec3"),
            ],
        })
        .expect("pipeline")
}

#[test]
fn full_frame_over_the_headless_backend() {
    let mut device = device();
    let pipeline = terrain(&mut device);
    device.register_variant("position_color", pipeline);

    let layout = device.uniforms(pipeline).unwrap().layout();
    let offsets: Vec<u32> = layout.entries().iter().map(|entry| entry.offset).collect();
    assert_eq!(offsets, vec![0, 64, 80]);
    assert_eq!(layout.size(), 96);

    // Legacy state calls.
    device.state_mut().set_depth_test_enabled(true);
    device.state_mut().set_depth_func(gl::LEQUAL);
    device.state_mut().set_blend_enabled(true);
    device
        .state_mut()
        .set_blend_func(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);

    // Four vertices with stride 16, six u16 indices.
    let vertices = device
        .create_buffer(BufferKind::Vertex, "quad", &[0u8; 64])
        .unwrap();
    let indices: Vec<u8> = [0u16, 1, 2, 2, 3, 0]
        .iter()
        .flat_map(|index| index.to_le_bytes())
        .collect();
    let indices = device
        .create_buffer(BufferKind::Index, "quad indices", &indices)
        .unwrap();

    let bound = device.bind_shader("position", &color_layout());
    assert_eq!(bound, Some(pipeline));
    assert_eq!(device.binding_state(), BindingState::PipelineBound(pipeline));

    device.set_uniform(pipeline, "ModelViewMat", UniformValue::Mat4(Mat4::IDENTITY));
    device.set_uniform(pipeline, "ColorModulator", UniformValue::Vec4(Vec4::ONE));
    device.set_uniform(pipeline, "ChunkOffset", UniformValue::Vec3(Vec3::new(16.0, 0.0, 16.0)));

    device.bind_vertex_buffer(vertices, 16);
    device.bind_index_buffer(indices, IndexFormat::U16);
    assert!(device.draw_indexed(0, 0, 6, 1));
    // Nothing changed, so the second draw uploads nothing.
    assert!(device.draw_indexed(0, 0, 6, 1));
    device.end_frame();

    let uniforms = device.uniforms(pipeline).unwrap();
    assert_eq!(uniforms.upload_count(), 1);
    assert!(!uniforms.is_dirty());

    let backend = device.backend().as_headless().unwrap();
    assert_eq!(backend.frames_ended(), 1);
    let draws = backend.draws();
    assert_eq!(draws.len(), 2);

    let draw = draws[0];
    assert_eq!(draw.pipeline, device.pipeline_handle(pipeline).unwrap());
    assert_eq!(draw.vertex_stride, 16);
    assert_eq!(draw.count, 6);
    assert!(draw.state.depth_write());
    assert_eq!(
        draw.state.bits() & RenderState::WRITE_MASK,
        RenderState::WRITE_MASK
    );
    assert!(draw.state.blend_func().is_some());

    let recorded = backend.buffer(uniforms.buffer().unwrap().raw()).unwrap();
    assert_eq!(&recorded.contents[80..84], &16.0f32.to_le_bytes());
}

#[test]
fn malformed_usage_degrades_instead_of_failing() {
    let mut device = device();
    let pipeline = terrain(&mut device);

    // Unknown enums fall back, undeclared uniforms are ignored.
    device.state_mut().set_depth_func(0xdead);
    assert!(!device.set_uniform(pipeline, "Unused", UniformValue::Float(1.0)));
    assert!(!device.set_uniform(pipeline, "ColorModulator", UniformValue::Float(1.0)));

    // Draw with no pipeline bound lands on the fallback.
    let vertices = device
        .create_buffer(BufferKind::Vertex, "strip", &[0u8; 12 * 3])
        .unwrap();
    device.bind_vertex_buffer(vertices, 12);
    assert!(device.draw(0, 10));

    let draw = device.backend().as_headless().unwrap().draws()[0];
    assert_eq!(
        draw.pipeline,
        device.pipeline_handle(device.default_pipeline()).unwrap()
    );
    assert_eq!(draw.count, 3);
}

#[test]
fn fence_completes_once_the_presenter_advances() {
    let device = device();
    let fence = device.create_fence();
    assert!(!fence.await_completion(0));

    let clock = device.frame_clock();
    let presenter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        clock.advance_frame();
    });
    assert!(fence.await_completion(-1));
    presenter.join().unwrap();

    let later = device.create_fence();
    assert_eq!(later.captured_frame(), 1);
    assert!(!later.await_completion(1_000_000));
}

#[test]
fn culling_with_a_camera_relative_offset() {
    let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
    let projection = Mat4::perspective_rh(70f32.to_radians(), 16.0 / 9.0, 0.05, 256.0);
    let mut frustum = Frustum::new(view, projection);
    frustum.set_offset(Vec3::new(512.0, 64.0, -512.0));

    // Chunk just in front of the camera in world space.
    assert!(frustum.is_box_in_frustum(
        Vec3::new(504.0, 56.0, -544.0),
        Vec3::new(520.0, 72.0, -528.0)
    ));
    // Chunk behind the camera.
    assert!(!frustum.is_box_in_frustum(
        Vec3::new(504.0, 56.0, -480.0),
        Vec3::new(520.0, 72.0, -464.0)
    ));
}
