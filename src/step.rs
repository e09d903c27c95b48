use std::borrow::Cow;

use anyhow::{ensure, Result};

use crate::basis::Point;


/// `StepRule` は「走査中の番号が `period` で割り切れたら位置を `(dx, dy)` だけ進める」という規則を表す.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepRule {
    pub period: u32,
    pub dx: i32,
    pub dy: i32,
}

impl StepRule {
    pub const fn new(period: u32, dx: i32, dy: i32) -> Self {
        Self { period, dx, dy }
    }

    pub fn delta(&self) -> Point {
        Point::new(self.dx, self.dy)
    }
}

/// `StepTable` は `StepRule` を `period` の昇順に並べた表を表す.
///
/// 引くときは `period` の大きい方から試し, 最初に割り切れた規則だけを使う.
/// そのため 32 と 8 の両方で割り切れる番号は 32 の規則にだけ従う.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepTable<'a> {
    rules: Cow<'a, [StepRule]>,
}

impl<'a> StepTable<'a> {
    pub fn new(rules: impl Into<Cow<'a, [StepRule]>>) -> Result<Self> {
        let rules = rules.into();

        ensure!(!rules.is_empty(), "step table must have at least one rule");
        ensure!(
            rules.iter().all(|r| r.period != 0),
            "step rule period must not be zero: {:?}",
            rules
        );
        ensure!(
            rules.windows(2).all(|w| w[0].period < w[1].period),
            "step rules must be listed in strictly ascending period order: {:?}",
            rules
        );

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[StepRule] {
        &self.rules
    }

    /// `index` に当てはまる規則を `period` の大きい順に探す.
    pub fn lookup(&self, index: u32) -> Option<&StepRule> {
        self.rules.iter().rev().find(|r| index % r.period == 0)
    }
}

impl StepTable<'static> {
    /// 検査済みの静的な表から作る. 並び順は debug ビルドでのみ確かめる.
    pub(crate) fn from_static(rules: &'static [StepRule]) -> Self {
        debug_assert!(!rules.is_empty());
        debug_assert!(rules.windows(2).all(|w| w[0].period < w[1].period));
        debug_assert!(rules.iter().all(|r| r.period != 0));
        Self {
            rules: Cow::Borrowed(rules),
        }
    }
}

/// `Wrap` は X 座標が `width` に達したときに次の行へ折り返す幅と行の高さを表す.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Wrap {
    pub width: i32,
    pub row_height: i32,
}

/// `Step` は `TileWalker::step` で規則が適用された結果を表す.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub rule: StepRule,
    /// 折り返し後の位置.
    pub pos: Point,
    pub wrapped: bool,
}

/// `TileWalker` は `StepTable` に従って原点から位置を動かしていく.
#[derive(Clone, Debug)]
pub struct TileWalker<'t, 'a> {
    table: &'t StepTable<'a>,
    wrap: Wrap,
    pos: Point,
}

impl<'t, 'a> TileWalker<'t, 'a> {
    pub fn new(table: &'t StepTable<'a>, wrap: Wrap) -> Self {
        Self {
            table,
            wrap,
            pos: Point::default(),
        }
    }

    pub fn position(&self) -> Point {
        self.pos
    }

    /// 番号 `index` に当てはまる規則で位置を進める. どの規則にも当てはまらなければ何もせず `None` を返す.
    pub fn step(&mut self, index: u32) -> Option<Step> {
        let rule = *self.table.lookup(index)?;
        self.pos += rule.delta();

        // 折り返しは規則を適用した直後に確かめる
        let wrapped = self.pos.x >= self.wrap.width;
        if wrapped {
            self.pos.x = 0;
            self.pos.y += self.wrap.row_height;
        }

        Some(Step {
            rule,
            pos: self.pos,
            wrapped,
        })
    }
}
