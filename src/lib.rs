pub mod basis;
pub mod config;
pub mod fbtile;
pub mod fill;
pub mod plot;
pub mod step;
