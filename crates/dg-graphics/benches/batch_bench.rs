use criterion::{criterion_group, criterion_main, Criterion};
use dg_graphics::prelude::*;
use dg_infra::HeadlessDevice;
use std::hint::black_box;
use std::sync::Arc;

const QUAD_VS: &str = "uniform mat4 uni_CameraProduct;\nvoid main() {}\n";
const QUAD_FS: &str = "uniform sampler2D uni_TexSlots[16];\nvoid main() {}\n";

fn setup(device: &Arc<HeadlessDevice>) -> Renderer {
    let mut renderer = Renderer::new(device.clone(), RendererSpecification::default())
        .expect("renderer");
    let target = FrameBuffer::new(
        device.clone(),
        FrameBufferSpecification {
            attachments: vec![FrameBufferTextureFormat::ColorRgba8],
            ..Default::default()
        },
    )
    .expect("framebuffer");
    let shader = Shader::from_sources(device.clone(), QUAD_VS, QUAD_FS).expect("shader");
    renderer.use_frame_buffer_2d(Arc::new(target)).expect("target");
    renderer.use_quad_shader_2d(Arc::new(shader)).expect("shader");
    renderer
}

fn bench_submission(c: &mut Criterion) {
    let device = Arc::new(HeadlessDevice::new());
    let mut renderer = setup(&device);
    let textures: Vec<Arc<Texture>> = (0..8)
        .map(|_| {
            Arc::new(
                Texture::with_specification(device.clone(), TextureSpecification::default())
                    .expect("texture"),
            )
        })
        .collect();
    let specs: Vec<RenderDrawSpecification2D> = textures
        .iter()
        .map(|t| RenderDrawSpecification2D {
            texture: Some(t.clone()),
            ..Default::default()
        })
        .collect();

    let mut group = c.benchmark_group("2D Batching");

    group.bench_function("10k untextured quads", |b| {
        b.iter(|| {
            renderer.begin_scene_2d(Mat4::IDENTITY).unwrap();
            for i in 0..10_000 {
                let position = Vec3::new(i as f32, 0.0, 0.0);
                renderer
                    .submit_quad_2d_at(position, Vec2::ONE, 0.0, &Default::default())
                    .unwrap();
            }
            renderer.end_scene_2d().unwrap();
            device.clear_draw_log();
            black_box(renderer.batch_count_2d());
        });
    });

    group.bench_function("10k quads over 8 textures", |b| {
        b.iter(|| {
            renderer.begin_scene_2d(Mat4::IDENTITY).unwrap();
            for i in 0..10_000 {
                let transform = Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0));
                renderer
                    .submit_quad_2d(transform, &specs[i % specs.len()])
                    .unwrap();
            }
            renderer.end_scene_2d().unwrap();
            device.clear_draw_log();
            black_box(renderer.batch_count_2d());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_submission);
criterion_main!(benches);
