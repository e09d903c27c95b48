use std::path::Path;

use anyhow::{ensure, Context as _, Result};
use image::{ImageFormat, RgbImage};

use crate::basis::Color;


/// `ColorCycle` はブロックの境目を越えるたびに切り替える色の並びを表す.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColorCycle {
    /// 2 色を交互に使う. 最初のブロックは 1 つ目の色になる.
    Toggle(Color, Color),
    /// パレットを先頭から順に巡回する.
    Palette(Vec<Color>),
}

impl ColorCycle {
    fn len(&self) -> usize {
        match self {
            ColorCycle::Toggle(..) => 2,
            ColorCycle::Palette(p) => p.len(),
        }
    }

    fn get(&self, i: usize) -> Color {
        match self {
            ColorCycle::Toggle(a, b) => {
                if i % 2 == 0 {
                    *a
                } else {
                    *b
                }
            }
            ColorCycle::Palette(p) => p[i % p.len()],
        }
    }
}

/// `BlockFill` は幅 `width`, 高さ `height` の画像をブロック単位の色で塗る設定を表す.
///
/// ブロックの境目は画素をラスタ順に並べたときの通し番号で判定する.
/// つまり `block_width * block_height` 画素ごとに色が変わるだけで, 画像上の正方形とは一致しない.
/// 幅がブロック幅の 2 乗の倍数のときなど, 特定の寸法でしかタイル状には見えない.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockFill {
    width: u32,
    height: u32,
    block_width: u32,
    block_height: u32,
    cycle: ColorCycle,
}

impl BlockFill {
    pub fn new(
        width: u32,
        height: u32,
        block_width: u32,
        block_height: u32,
        cycle: ColorCycle,
    ) -> Result<Self> {
        ensure!(
            width != 0 && height != 0,
            "canvas must not be empty: {}x{}",
            width,
            height
        );
        ensure!(
            block_width != 0 && block_height != 0,
            "block must not be empty: {}x{}",
            block_width,
            block_height
        );
        ensure!(cycle.len() != 0, "palette must have at least one color");

        Ok(Self {
            width,
            height,
            block_width,
            block_height,
            cycle,
        })
    }

    pub fn block_area(&self) -> u64 {
        self.block_width as u64 * self.block_height as u64
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// ラスタ順で `index` 番目の画素の色.
    pub fn color_at(&self, index: u64) -> Color {
        let block = index / self.block_area();
        self.cycle.get((block % self.cycle.len() as u64) as usize)
    }

    /// 全画素をラスタ順に走査して塗る.
    pub fn fill(&self) -> RgbImage {
        let mut canvas = RgbImage::new(self.width, self.height);
        let area = self.block_area();

        let (mut x, mut y) = (0, 0);
        // 最初の画素で 0 番目の色に進むように, ひとつ手前から始める
        let mut pointer = self.cycle.len() - 1;
        let mut color = self.cycle.get(pointer);

        for index in 0..self.pixel_count() {
            if index % area == 0 {
                pointer = (pointer + 1) % self.cycle.len();
                color = self.cycle.get(pointer);
            }

            canvas.put_pixel(x, y, color.into());

            x += 1;
            if x >= self.width {
                x = 0;
                y += 1;
            }
        }

        canvas
    }

    /// 塗った画像を `path` に PNG で保存する. 拡張子は見ない.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<RgbImage> {
        let path = path.as_ref();
        let canvas = self.fill();
        canvas
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("failed to save tiled image to {}", path.display()))?;
        log::info!(
            "saved {}x{} image ({} pixels per block) to {}",
            self.width,
            self.height,
            self.block_area(),
            path.display()
        );
        Ok(canvas)
    }
}
