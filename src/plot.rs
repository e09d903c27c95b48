use anyhow::Result;

use crate::{
    basis::Point,
    step::{StepTable, TileWalker, Wrap},
};

#[cfg(feature = "gui")]
pub mod gui;


/// 目盛り合わせのための対角線. データには依存しない.
pub const REFERENCE_LINE: [Point; 5] = [
    Point::new(0, 0),
    Point::new(50, 50),
    Point::new(100, 100),
    Point::new(150, 150),
    Point::new(200, 200),
];

/// プロットの折り返し. X 座標が 200 に達したら次の行 (16 上) へ移る.
pub const PLOT_WRAP: Wrap = Wrap {
    width: 200,
    row_height: 16,
};

/// `LabelMode` は 1 回の配置で置くラベルの数を表す.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelMode {
    Single,
    /// 2 つ目のラベルを `gap` だけ Y 方向にずらして置く.
    Dual { gap: i32 },
}

impl LabelMode {
    fn labels_per_placement(self) -> u32 {
        match self {
            LabelMode::Single => 1,
            LabelMode::Dual { .. } => 2,
        }
    }
}

/// `Label` はプロット上の位置 `pos` に描く番号 `text` を表す.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Label {
    pub pos: Point,
    pub text: u32,
}

/// `Placement` は 1 回の配置を表す. `period` は当てはまった規則の周期で, 番号 0 では `None` になる.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub index: u32,
    pub period: Option<u32>,
    pub pos: Point,
    pub wrapped: bool,
    pub labels: Vec<Label>,
}

/// 番号 `0..count` を走査し, `table` に従って動かした位置にラベルを置いていく.
///
/// 番号 0 は表を引かずに原点へ置く. どの規則にも当てはまらない番号では何も置かない.
pub fn place_labels(table: &StepTable, count: u32, mode: LabelMode, wrap: Wrap) -> Vec<Placement> {
    let mut walker = TileWalker::new(table, wrap);
    let mut counter = 0;
    let mut placements = vec![];

    let mut place = |index: u32, period: Option<u32>, pos: Point, wrapped: bool| {
        let labels = match mode {
            LabelMode::Single => vec![Label { pos, text: counter }],
            LabelMode::Dual { gap } => vec![
                Label { pos, text: counter },
                Label {
                    pos: pos + Point::new(0, gap),
                    text: counter + 1,
                },
            ],
        };
        counter += mode.labels_per_placement();

        placements.push(Placement {
            index,
            period,
            pos,
            wrapped,
            labels,
        });
    };

    for index in 0..count {
        if index == 0 {
            place(0, None, walker.position(), false);
            continue;
        }

        if let Some(step) = walker.step(index) {
            log::trace!(
                "index {}: period {} moved to {:?}",
                index,
                step.rule.period,
                step.pos
            );
            place(index, Some(step.rule.period), step.pos, step.wrapped);
        }
    }

    placements
}

/// `Figure` は描画するべき参照線とラベルをまとめたものを表す.
#[derive(Clone, Debug, Default)]
pub struct Figure {
    pub line: Vec<Point>,
    pub labels: Vec<Label>,
}

impl Figure {
    pub fn from_placements(placements: &[Placement]) -> Self {
        Self {
            line: REFERENCE_LINE.to_vec(),
            labels: placements
                .iter()
                .flat_map(|p| p.labels.iter().copied())
                .collect(),
        }
    }

    /// 参照線とラベルをすべて含む矩形 `(min, max)` を求める.
    pub fn bounds(&self) -> (Point, Point) {
        bounds_of(
            self.line
                .iter()
                .copied()
                .chain(self.labels.iter().map(|l| l.pos)),
        )
    }

    pub fn render<R: FigureRenderer>(&self, renderer: &mut R) -> Result<()> {
        renderer.line(&self.line)?;
        for label in &self.labels {
            renderer.text(label.pos, &label.text.to_string())?;
        }
        Ok(())
    }
}

/// 点がひとつもなければ原点だけの矩形を返す.
pub(crate) fn bounds_of(mut points: impl Iterator<Item = Point>) -> (Point, Point) {
    let first = match points.next() {
        Some(p) => p,
        None => return (Point::default(), Point::default()),
    };

    points.fold((first, first), |(min, max), p| {
        (
            Point::new(min.x.min(p.x), min.y.min(p.y)),
            Point::new(max.x.max(p.x), max.y.max(p.y)),
        )
    })
}

/// `FigureRenderer` は `Figure` を実際に描く外部の描画先を表す.
pub trait FigureRenderer {
    fn line(&mut self, points: &[Point]) -> Result<()>;
    fn text(&mut self, pos: Point, text: &str) -> Result<()>;
    /// 溜めた図を表示する. ウィンドウを持つ実装は閉じられるまで戻らない.
    fn show(&mut self) -> Result<()>;
}

/// `Viewport` はデータ座標 (Y 軸が上向き) をウィンドウのピクセル座標 (Y 軸が下向き) へ写す.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    min: Point,
    scale: f64,
    margin: i32,
    window_height: i32,
}

impl Viewport {
    pub fn fit((min, max): (Point, Point), (width, height): (u32, u32), margin: i32) -> Self {
        let span_x = (max.x - min.x).max(1) as f64;
        let span_y = (max.y - min.y).max(1) as f64;
        let usable_w = (width as i32 - 2 * margin).max(1) as f64;
        let usable_h = (height as i32 - 2 * margin).max(1) as f64;

        Self {
            min,
            scale: (usable_w / span_x).min(usable_h / span_y),
            margin,
            window_height: height as i32,
        }
    }

    pub fn to_screen(&self, p: Point) -> (i32, i32) {
        let x = self.margin as f64 + (p.x - self.min.x) as f64 * self.scale;
        let y = (self.window_height - self.margin) as f64 - (p.y - self.min.y) as f64 * self.scale;
        (x.round() as i32, y.round() as i32)
    }
}
