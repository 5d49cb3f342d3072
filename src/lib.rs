pub mod ancils;
pub mod climatology;
pub mod config;
pub mod data_io;
pub mod frac_input;
pub mod grid;
pub mod irrigation;
pub mod landcover;
pub mod math;
pub mod parallel;
pub mod pipeline;
pub mod time_utils;

pub use pipeline::{PipelineError, Result};
