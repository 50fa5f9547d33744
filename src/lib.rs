pub mod backend;
pub mod camera;
pub mod config;
pub mod frame_stats;
pub mod gpu;
pub mod input;
pub mod lighting;
pub mod pipeline;
pub mod polygon;
pub mod post_params;
pub mod post_processing;
pub mod render_targets;

pub mod cli;
