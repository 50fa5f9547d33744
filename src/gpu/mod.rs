pub mod aux_textures;
pub mod mesh;
pub mod pipeline;
pub mod post_processor;
pub mod renderer;
