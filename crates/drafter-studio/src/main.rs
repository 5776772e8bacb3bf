use std::hash::{DefaultHasher, Hash, Hasher};

use anyhow::{Context, Result};
use drafter_engine::device::{GpuInit, HeadlessGpu, WgpuDrawBackend};
use drafter_engine::geometry::{
    ClipProjectionData, CurveBox, Hatch, Polyline, PolylineConnector, QuadraticBezierInfo,
};
use drafter_engine::logging::{init_logging, LoggingConfig};
use drafter_engine::render::draw_resources::{
    DrawBackend, DrawBatch, DrawResourcesConfig, DrawResourcesFiller, IntendedSubmit,
    TextureHash, TextureRegion,
};
use drafter_engine::style::LineStyleInfo;

const FRAMES: u32 = 3;
const TEXTURE_SIZE: u32 = 16;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    println!();
    println!("  ╔════════════════════════════════════════╗");
    println!("  ║          DRAFTER STUDIO v0.1           ║");
    println!("  ║   headless wgpu  ·  streamed batches   ║");
    println!("  ╚════════════════════════════════════════╝");
    println!();

    let gpu = HeadlessGpu::new_blocking(GpuInit {
        backends: wgpu::Backends::from_env().unwrap_or(wgpu::Backends::all()),
        ..Default::default()
    })
    .context("failed to open a headless GPU")?;

    // Deliberately small so the demo scene overflows every region.
    let mut config = DrawResourcesConfig::default();
    config
        .set_max_main_objects(64)
        .set_max_draw_objects(256)
        .set_geometry_buffer_size(16 * 1024)
        .set_max_line_styles(8)
        .set_max_textures(4);
    config.texture_extent = TEXTURE_SIZE;

    let mut filler = DrawResourcesFiller::new(WgpuDrawBackend::new(&gpu), config)
        .context("failed to create draw resources")?;
    filler.set_submit_draws_function(Box::new(
        |backend: &mut WgpuDrawBackend, _: &IntendedSubmit, batch: DrawBatch| {
            log::info!(
                "batch #{}: {} cages ({} indices), {} main objects, {} styles, {} B geometry",
                batch.signal_value,
                batch.draw_object_count,
                batch.index_count(),
                batch.main_object_count,
                batch.line_style_count,
                batch.geometry_bytes,
            );
            backend.submit(batch.signal_value, None);
        },
    ));

    let scene = Scene::build();
    let mut intended = IntendedSubmit::new(filler.backend().completed_signal_value());

    for frame in 0..FRAMES {
        log::info!("── frame {frame} ──");
        scene.draw(&mut filler, frame, &mut intended)?;
        filler.submit_frame(&mut intended);
        filler.backend().poll();
    }

    let last = intended.next_signal_value() - 1;
    filler.backend_mut().wait_for_signal_value(last);

    println!();
    println!("  submissions  >  {}", filler.submissions());
    println!("  completed    >  {}", filler.backend().completed_signal_value());
    println!();
    Ok(())
}

/// Demo content: a wavy polyline field, stippled outlines and textured hatches
/// under nested clip projections.
struct Scene {
    waves: Vec<Polyline>,
    outline: Polyline,
    tiles: Vec<Hatch>,
    textures: Vec<(TextureHash, Vec<u8>)>,
}

impl Scene {
    fn build() -> Self {
        let waves = (0..24)
            .map(|row| {
                let y = row as f64 * 4.0;
                let pts: Vec<[f64; 2]> = (0..48)
                    .map(|i| {
                        let x = i as f64;
                        [x, y + (x * 0.4 + row as f64).sin()]
                    })
                    .collect();

                let mut p = Polyline::new();
                p.add_line_strip(&pts);
                p.add_quad_beziers(&[
                    QuadraticBezierInfo::new([47.0, y], [52.0, y + 3.0], [56.0, y]),
                    QuadraticBezierInfo::new([56.0, y], [60.0, y - 3.0], [64.0, y]),
                ]);
                p.add_connector(PolylineConnector {
                    circle_center: [47.0, y],
                    cos_angle_difference_half: 0.9,
                    ..Default::default()
                });
                p
            })
            .collect();

        let mut outline = Polyline::new();
        outline.add_line_strip(&[[0.0, 0.0], [64.0, 0.0], [64.0, 96.0], [0.0, 96.0], [0.0, 0.0]]);

        let tiles = (0..12)
            .map(|i| {
                let x = (i % 4) as f64 * 16.0;
                let y = (i / 4) as f64 * 32.0;
                let mut h = Hatch::rect([x, y], [x + 14.0, y + 14.0]);
                h.push(CurveBox {
                    aabb_min: [x, y + 16.0],
                    aabb_max: [x + 14.0, y + 30.0],
                    ..Default::default()
                });
                h
            })
            .collect();

        let textures = (0..6).map(checkerboard).collect();

        Self {
            waves,
            outline,
            tiles,
            textures,
        }
    }

    fn draw(
        &self,
        filler: &mut DrawResourcesFiller<WgpuDrawBackend>,
        frame: u32,
        intended: &mut IntendedSubmit,
    ) -> Result<()> {
        let region = TextureRegion::rgba8(TEXTURE_SIZE, TEXTURE_SIZE);

        filler.push_clip_projection(ClipProjectionData::scale_translate(
            1.0 / 32.0,
            1.0 / 48.0,
            -1.0,
            -1.0,
        ));

        for (row, wave) in self.waves.iter().enumerate() {
            let hue = row as f32 / self.waves.len() as f32;
            // More widths than style slots, so styles overflow too.
            let width = 1.0 + (row % 12) as f32 * 0.5;
            filler.draw_polyline(wave, &LineStyleInfo::solid([hue, 0.4, 1.0 - hue, 1.0], width), intended);
        }

        filler.push_clip_projection(ClipProjectionData::scale_translate(
            1.0 / 64.0,
            1.0 / 64.0,
            -0.5,
            -0.5,
        ));
        for (i, tile) in self.tiles.iter().enumerate() {
            // Rotate through more textures than the cache holds.
            let (hash, bytes) = &self.textures[(i + frame as usize) % self.textures.len()];
            filler.add_texture(bytes, region, *hash, intended)?;
            filler.draw_hatch_two_tone(
                tile,
                [0.1, 0.1, 0.1, 1.0],
                [0.9, 0.9, 0.8, 0.6],
                Some(*hash),
                intended,
            );
        }
        filler.pop_clip_projection();

        let dashed = LineStyleInfo::solid([1.0, 1.0, 1.0, 1.0], 2.0).with_stipple(&[4.0, 2.0, 1.0, 2.0]);
        filler.draw_polyline(&self.outline, &dashed, intended);
        filler.pop_clip_projection();

        let states = filler.region_states();
        log::debug!(
            "frame {frame} tail: {} main objects, {} cages, {} B geometry, {} styles",
            states.main_objects.current,
            states.draw_objects.current,
            states.geometry.current,
            states.line_styles.current,
        );
        Ok(())
    }
}

fn checkerboard(seed: u32) -> (TextureHash, Vec<u8>) {
    let mut bytes = Vec::with_capacity((TEXTURE_SIZE * TEXTURE_SIZE * 4) as usize);
    for y in 0..TEXTURE_SIZE {
        for x in 0..TEXTURE_SIZE {
            let on = ((x / (seed + 1)) + (y / (seed + 1))) % 2 == 0;
            let v = if on { 255 } else { 0 };
            bytes.extend_from_slice(&[v, v, v, 255]);
        }
    }

    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    (hasher.finish(), bytes)
}
