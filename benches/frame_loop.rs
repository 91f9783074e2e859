use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use orbit_scene::config::{ParticleConfig, SceneConfig, ScenePreset};
use orbit_scene::core::{AnimationLoop, AssetQueue, InputRouter, ManualClock};
use orbit_scene::loaders::FileLoader;
use orbit_scene::scene::SceneGraph;
use orbit_scene::scenes::{create_particles, create_scene};
use orbit_scene::traits::SceneRenderer;
use std::sync::Arc;

/// Renderer that only touches the scene so the frame isn't optimized away
struct NullRenderer;

impl SceneRenderer for NullRenderer {
    fn render(&mut self, scene: &SceneGraph) -> anyhow::Result<()> {
        black_box(scene.len());
        Ok(())
    }
}

fn bench_frame(c: &mut Criterion) {
    let config = SceneConfig::preset(ScenePreset::Dice);
    let mut setup = create_scene(&config);
    let mut assets = AssetQueue::new(Arc::new(FileLoader));
    let mut router = InputRouter::new(config.scroll.clone(), config.orbit.clone());
    let clock = ManualClock::new(0.0);
    let mut frame_loop = AnimationLoop::new(clock.clone(), &config.spin, &config.particles);
    let mut renderer = NullRenderer;

    if frame_loop.start(&mut setup.scene).is_err() {
        return;
    }

    c.bench_function("frame_preset_dice", |b| {
        b.iter(|| {
            clock.advance(1.0 / 60.0);
            black_box(frame_loop.frame(&mut setup.scene, &mut assets, &mut router, &mut renderer))
        })
    });
}

fn bench_scroll(c: &mut Criterion) {
    let config = SceneConfig::preset(ScenePreset::Dice);
    let mut setup = create_scene(&config);
    let mut router = InputRouter::new(config.scroll.clone(), config.orbit.clone());
    let mut offset = 0.0f32;

    c.bench_function("scroll_event", |b| {
        b.iter(|| {
            offset = (offset + 40.0) % 4000.0;
            router.scroll(&mut setup.scene, black_box(offset));
        })
    });
}

fn bench_particles(c: &mut Criterion) {
    let mut group = c.benchmark_group("particle_cloud");

    for count in [1_000, 10_000, 100_000].iter() {
        let config = ParticleConfig {
            count: *count,
            ..ParticleConfig::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(count), &config, |b, config| {
            b.iter(|| black_box(create_particles(config, Some(7))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frame, bench_scroll, bench_particles);
criterion_main!(benches);
