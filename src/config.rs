use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::{basis::Color, step::StepRule};

/// Tile-Yf の 4 ピクセル幅の縦並びを 1 ラベルずつ確かめる表.
pub const TILEYF_CHECK_SINGLE: &[StepRule] = &[
    StepRule::new(4, 0, 4),
    StepRule::new(8, 4, -4),
    StepRule::new(16, -4, 4),
    StepRule::new(32, 4, -12),
];

/// Tile-Yf のサブタイル (4x8) を 2 ラベルずつ確かめる表.
pub const TILEYF_CHECK_DUAL: &[StepRule] = &[
    StepRule::new(8, 4, 0),
    StepRule::new(16, -4, 8),
    StepRule::new(32, 4, -8),
];

pub const WALK_COUNT: u32 = 1024;
pub const DUAL_LABEL_GAP: i32 = 4;

pub const CANVAS_WIDTH: u32 = 1920;
pub const CANVAS_HEIGHT: u32 = 1080;
pub const BLOCK_WIDTH: u32 = 4;
pub const BLOCK_HEIGHT: u32 = 4;

pub const TWO_COLORS: (Color, Color) = (Color::new(200, 0, 0), Color::new(0, 0, 200));

pub const PALETTE: [Color; 4] = [
    Color::new(200, 0, 0),
    Color::new(0, 200, 0),
    Color::new(0, 0, 200),
    Color::new(200, 200, 0),
];

pub const DEFAULT_IMAGE_OUTPUT: &str = "/tmp/ssti.png";

const IMAGE_OUTPUT_VAR: &str = "TILE_IMAGE_OUTPUT";
const WALK_COUNT_VAR: &str = "TILE_WALK_COUNT";

/// `Config` は実行時に差し替えられる少数の値を表す. それ以外は上の定数をそのまま使う.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub image_output: PathBuf,
    pub walk_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_output: PathBuf::from(DEFAULT_IMAGE_OUTPUT),
            walk_count: WALK_COUNT,
        }
    }
}

impl Config {
    /// `.env` があれば読み込んでから環境変数を見る.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup(IMAGE_OUTPUT_VAR) {
            config.image_output = PathBuf::from(path);
        }

        if let Some(count) = lookup(WALK_COUNT_VAR) {
            config.walk_count = count
                .trim()
                .parse()
                .with_context(|| format!("failed to parse {}: '{}'", WALK_COUNT_VAR, count))?;
        }

        Ok(config)
    }
}

#[test]
fn test_from_lookup() {
    let config = Config::from_lookup(|_| None).unwrap();
    assert_eq!(config, Config::default());

    let config = Config::from_lookup(|key| match key {
        "TILE_IMAGE_OUTPUT" => Some("out.png".to_owned()),
        "TILE_WALK_COUNT" => Some(" 64 ".to_owned()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.image_output, PathBuf::from("out.png"));
    assert_eq!(config.walk_count, 64);

    assert!(Config::from_lookup(|key| (key == "TILE_WALK_COUNT").then(|| "many".to_owned())).is_err());
}

#[test]
fn test_from_env() {
    std::env::set_var(IMAGE_OUTPUT_VAR, "/tmp/tile_probe_env.png");
    std::env::set_var(WALK_COUNT_VAR, "32");
    let config = Config::from_env();
    std::env::remove_var(IMAGE_OUTPUT_VAR);
    std::env::remove_var(WALK_COUNT_VAR);

    let config = config.unwrap();
    assert_eq!(config.image_output, PathBuf::from("/tmp/tile_probe_env.png"));
    assert_eq!(config.walk_count, 32);
}
