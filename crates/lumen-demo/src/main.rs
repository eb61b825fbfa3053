use std::f32::consts::TAU;

use glam::{Vec2, Vec3};

use lumen_engine::core::{App, AppControl, FrameCtx, SetupCtx};
use lumen_engine::device::GpuInit;
use lumen_engine::logging::{init_logging, LoggingConfig};
use lumen_engine::paint::Color;
use lumen_engine::render::RendererConfig;
use lumen_engine::scene::{
    Camera, DrawList, Drawable, Glyph, Light, NodeTransform, ShapeGeometry, TextNode, TextureId,
    UvRect,
};
use lumen_engine::window::{Runtime, RuntimeConfig};

const CHECKER_SIZE: u32 = 64;

/// 5x7 bitmaps, one row per string, `#` set.
const FONT: [(char, [&str; 7]); 5] = [
    ('L', ["#....", "#....", "#....", "#....", "#....", "#....", "#####"]),
    ('U', ["#...#", "#...#", "#...#", "#...#", "#...#", "#...#", ".###."]),
    ('M', ["#...#", "##.##", "#.#.#", "#.#.#", "#...#", "#...#", "#...#"]),
    ('E', ["#####", "#....", "#....", "####.", "#....", "#....", "#####"]),
    ('N', ["#...#", "##..#", "#.#.#", "#..##", "#...#", "#...#", "#...#"]),
];

/// Atlas cell; glyphs sit in the top-left 5x7 of each 8x8 cell.
const CELL: u32 = 8;

struct Demo {
    list: DrawList,
    camera: Camera,
    checker: Option<TextureId>,
    font: Option<TextureId>,
    fps_window: (f32, u32),
}

impl Demo {
    fn new() -> Self {
        Self {
            list: DrawList::new(),
            camera: Camera::orthographic(),
            checker: None,
            font: None,
            fps_window: (0.0, 0),
        }
    }

    fn build_scene(&mut self, width: f32, height: f32, t: f32) {
        let list = &mut self.list;
        list.clear();

        let center = Vec2::new(width, height) * 0.5;

        list.push(Drawable::shape(
            ShapeGeometry::Quad,
            NodeTransform::from_parts(center, 0.0, Vec2::ONE, -10.0),
            Vec2::new(width, height),
            Color::from_straight(0.18, 0.2, 0.24, 1.0),
        ));

        // Ring of triangles orbiting the parent's origin. Parent rotation does
        // not carry into child offsets, so the orbit is applied per child.
        list.push_parent(&NodeTransform::from_parts(center, 0.0, Vec2::ONE, 0.0));
        for i in 0..12 {
            let angle = i as f32 / 12.0 * TAU;
            let offset = Vec2::from_angle(angle + t * 0.3) * 220.0;
            let hue = i as f32 / 12.0;
            list.push(Drawable::shape(
                ShapeGeometry::Triangle,
                NodeTransform::from_parts(offset, angle + t, Vec2::ONE, 1.0),
                Vec2::splat(48.0),
                hue_color(hue),
            ));
        }
        list.pop_parent();

        if let Some(checker) = self.checker {
            for i in 0..3 {
                let x = center.x + (i as f32 - 1.0) * 140.0;
                let bob = (t * 2.0 + i as f32).sin() * 12.0;
                list.push(Drawable::sprite(
                    checker,
                    NodeTransform::from_parts(Vec2::new(x, center.y + bob), 0.0, Vec2::ONE, 2.0),
                    Vec2::splat(96.0),
                    Color::WHITE,
                ));
            }
        }

        if let Some(font) = self.font {
            let scale = 8.0;
            let glyphs = layout_text("LUMEN", scale);
            let text_width = glyphs.last().map_or(0.0, |g| g.offset.x + g.size.x);
            list.push(Drawable::Text(TextNode {
                atlas: font,
                transform: NodeTransform::from_parts(
                    Vec2::new(center.x - text_width * 0.5, 48.0),
                    0.0,
                    Vec2::ONE,
                    3.0,
                ),
                color: Color::from_straight(1.0, 0.95, 0.8, 1.0),
                glyphs,
                visible: true,
            }));
        }

        let orbit = |phase: f32, radius: f32| {
            let p = center + Vec2::from_angle(t * 0.8 + phase) * radius;
            Vec3::new(p.x, p.y, 0.0)
        };
        list.add_light(Light::new(orbit(0.0, 180.0), Color::from_straight(1.0, 0.6, 0.3, 1.0), 1.4, 360.0));
        list.add_light(Light::new(orbit(TAU / 3.0, 260.0), Color::from_straight(0.3, 0.6, 1.0, 1.0), 1.2, 320.0));
        list.add_light(Light::new(orbit(2.0 * TAU / 3.0, 120.0), Color::from_straight(0.5, 1.0, 0.5, 1.0), 0.8, 240.0));
    }

    fn report_fps(&mut self, ctx: &mut FrameCtx<'_, '_>) {
        let (acc, frames) = &mut self.fps_window;
        *acc += ctx.time.dt;
        *frames += 1;
        if *acc >= 1.0 {
            let fps = *frames as f32 / *acc;
            ctx.runtime.set_title(format!("lumen demo ({fps:.0} fps)"));
            log::debug!("{fps:.1} fps");
            self.fps_window = (0.0, 0);
        }
    }
}

impl App for Demo {
    fn on_start(&mut self, ctx: &mut SetupCtx<'_, '_>) -> anyhow::Result<()> {
        self.checker = Some(ctx.register_texture(
            "checker",
            CHECKER_SIZE,
            CHECKER_SIZE,
            &checker_pixels(CHECKER_SIZE, 8),
        )?);

        let (width, height, pixels) = font_atlas();
        self.font = Some(ctx.register_texture("font atlas", width, height, &pixels)?);

        log::info!("demo scene ready");
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let (width, height) = ctx.window.physical_size();
        self.build_scene(width as f32, height as f32, ctx.time.elapsed);

        let ambient = Color::from_straight(0.35, 0.35, 0.45, 1.0);
        ctx.render(&self.list, &self.camera, ambient);

        self.report_fps(ctx);
        AppControl::Continue
    }
}

fn hue_color(hue: f32) -> Color {
    let channel = |offset: f32| 0.5 + 0.5 * ((hue + offset) * TAU).cos();
    Color::from_straight(channel(0.0), channel(2.0 / 3.0), channel(1.0 / 3.0), 1.0)
}

fn checker_pixels(size: u32, cell: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / cell) + (y / cell)) % 2 == 0;
            let v = if light { 235 } else { 60 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    pixels
}

/// Builds the glyph atlas: one `CELL`-sized cell per `FONT` entry in a single row.
///
/// Texels are premultiplied: uncovered texels are fully transparent black.
fn font_atlas() -> (u32, u32, Vec<u8>) {
    let width = CELL * FONT.len() as u32;
    let height = CELL;
    let mut pixels = vec![0u8; (width * height * 4) as usize];

    for (cell, (_, rows)) in FONT.iter().enumerate() {
        for (y, row) in rows.iter().enumerate() {
            for (x, bit) in row.bytes().enumerate() {
                if bit != b'#' {
                    continue;
                }
                let px = cell as u32 * CELL + x as u32;
                let index = ((y as u32 * width + px) * 4) as usize;
                pixels[index..index + 4].copy_from_slice(&[255; 4]);
            }
        }
    }

    (width, height, pixels)
}

/// Lays `text` out on one line; characters missing from `FONT` advance without a quad.
fn layout_text(text: &str, scale: f32) -> Vec<Glyph> {
    let atlas_width = (CELL * FONT.len() as u32) as f32;
    let advance = 6.0 * scale;

    text.chars()
        .enumerate()
        .filter_map(|(i, ch)| {
            let cell = FONT.iter().position(|(c, _)| *c == ch)?;
            let u0 = (cell as u32 * CELL) as f32 / atlas_width;
            let u1 = (cell as u32 * CELL + 5) as f32 / atlas_width;
            Some(Glyph {
                offset: Vec2::new(i as f32 * advance, 0.0),
                size: Vec2::new(5.0, 7.0) * scale,
                uv: UvRect::new(u0, 0.0, u1, 7.0 / CELL as f32),
            })
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());
    log::info!("starting lumen demo");

    Runtime::run(
        RuntimeConfig {
            title: "lumen demo".to_string(),
            ..Default::default()
        },
        GpuInit::default(),
        RendererConfig::default(),
        Demo::new(),
    )
}
