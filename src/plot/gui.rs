use std::time::Duration;

use anyhow::{Context as _, Error, Result};
use sdl2::{
    event::{Event, WindowEvent},
    gfx::primitives::DrawRenderer,
    keyboard::Keycode,
    pixels::Color as SdlColor,
    render::Canvas,
    video::Window,
};

use super::{bounds_of, FigureRenderer, Viewport};
use crate::basis::Point;

const WINDOW_WIDTH: u32 = 800;
const WINDOW_HEIGHT: u32 = 800;
const MARGIN: i32 = 24;

const LINE_COLOR: SdlColor = SdlColor {
    r: 31,
    g: 119,
    b: 180,
    a: 0xff,
};
const TEXT_COLOR: SdlColor = SdlColor::BLACK;
const BACKGROUND_COLOR: SdlColor = SdlColor::WHITE;

/// `SdlRenderer` は描画命令を溜めておき, `show` でウィンドウに描いて閉じられるまで待つ.
///
/// 文字は SDL2_gfx 組み込みの 8x8 フォントで描くため, フォントファイルは要らない.
pub struct SdlRenderer {
    title: String,
    lines: Vec<Vec<Point>>,
    texts: Vec<(Point, String)>,
}

impl SdlRenderer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: vec![],
            texts: vec![],
        }
    }

    fn bounds(&self) -> (Point, Point) {
        bounds_of(
            self.lines
                .iter()
                .flatten()
                .chain(self.texts.iter().map(|(p, _)| p))
                .copied(),
        )
    }

    fn draw(&self, canvas: &mut Canvas<Window>, viewport: &Viewport) -> Result<()> {
        canvas.set_draw_color(BACKGROUND_COLOR);
        canvas.clear();

        for line in &self.lines {
            for pair in line.windows(2) {
                let (x1, y1) = viewport.to_screen(pair[0]);
                let (x2, y2) = viewport.to_screen(pair[1]);
                canvas
                    .line(x1 as i16, y1 as i16, x2 as i16, y2 as i16, LINE_COLOR)
                    .map_err(Error::msg)?;
            }
        }

        for (pos, text) in &self.texts {
            let (x, y) = viewport.to_screen(*pos);
            // matplotlib と同じく文字の左下を座標に合わせる
            canvas
                .string(x as i16, (y - 8) as i16, text, TEXT_COLOR)
                .map_err(Error::msg)?;
        }

        canvas.present();
        Ok(())
    }
}

impl FigureRenderer for SdlRenderer {
    fn line(&mut self, points: &[Point]) -> Result<()> {
        self.lines.push(points.to_vec());
        Ok(())
    }

    fn text(&mut self, pos: Point, text: &str) -> Result<()> {
        self.texts.push((pos, text.to_owned()));
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        let sdl = sdl2::init()
            .map_err(Error::msg)
            .context("failed to initialize sdl")?;
        let video = sdl
            .video()
            .map_err(Error::msg)
            .context("failed to initialize video subsystem")?;

        let mut canvas = video
            .window(&self.title, WINDOW_WIDTH, WINDOW_HEIGHT)
            .position_centered()
            .resizable()
            .build()
            .context("failed to create window")?
            .into_canvas()
            .build()
            .context("failed to create canvas")?;

        let mut event_pump = sdl.event_pump().map_err(Error::msg)?;
        let bounds = self.bounds();
        let mut viewport = Viewport::fit(bounds, (WINDOW_WIDTH, WINDOW_HEIGHT), MARGIN);
        let mut dirty = true;

        'running: loop {
            for event in event_pump.poll_iter() {
                match event {
                    Event::Window {
                        win_event: WindowEvent::Resized(w, h),
                        ..
                    } => {
                        viewport = Viewport::fit(bounds, (w as u32, h as u32), MARGIN);
                        dirty = true;
                    }

                    Event::Window {
                        win_event: WindowEvent::Exposed,
                        ..
                    } => dirty = true,

                    Event::Quit { .. }
                    | Event::KeyDown {
                        keycode: Some(Keycode::Escape | Keycode::Q),
                        ..
                    } => break 'running,

                    _ => {}
                }
            }

            if dirty {
                self.draw(&mut canvas, &viewport)?;
                dirty = false;
            }

            // 60fps
            std::thread::sleep(Duration::from_secs_f64(1.0 / 60.0));
        }

        Ok(())
    }
}
