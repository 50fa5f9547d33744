use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::frame_stats::timed;
use crate::gpu::renderer::WgpuBackend;
use crate::input::{self, Key};
use crate::pipeline::PostProcessPipeline;
use crate::post_processing::{effect_table, PostProcess};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames to disk without a window
    Render {
        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Number of frames to render
        #[arg(long, default_value_t = 60)]
        frames: u32,

        /// Frames per second (fixed frame time is 1 / fps)
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Output width (overrides the config)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (overrides the config)
        #[arg(long)]
        height: Option<u32>,

        /// JSON pipeline config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Effect to stack before the first frame; repeatable
        #[arg(long = "effect", value_parser = parse_effect)]
        effects: Vec<PostProcess>,

        /// Key press on a given frame, as FRAME:KEY (e.g. 30:2); repeatable
        #[arg(long = "key", value_parser = parse_key_press)]
        keys: Vec<(u32, Key)>,

        /// Keys held down for every frame (camera movement)
        #[arg(long, value_delimiter = ',')]
        hold: Vec<Key>,
    },
    /// List the available post-process effects
    Effects,
    /// Print the default config as JSON
    Config,
}

fn parse_effect(s: &str) -> Result<PostProcess, String> {
    PostProcess::from_id(s).ok_or_else(|| format!("unknown effect '{}'", s))
}

fn parse_key_press(s: &str) -> Result<(u32, Key), String> {
    let (frame, key) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FRAME:KEY, got '{}'", s))?;
    let frame = frame
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("bad frame number '{}': {}", frame, e))?;
    let key = key.parse::<Key>().map_err(|e| e.to_string())?;
    Ok((frame, key))
}

/// Load the config (or the default) and apply the viewport overrides.
fn resolve_config(path: Option<&Path>, width: Option<u32>, height: Option<u32>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.width = width.unwrap_or(config.width);
    config.height = height.unwrap_or(config.height);
    config.validate().context("Invalid config")?;
    Ok(config)
}

struct RenderArgs {
    out: PathBuf,
    frames: u32,
    fps: f32,
    effects: Vec<PostProcess>,
    keys: Vec<(u32, Key)>,
    hold: Vec<Key>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            out,
            frames,
            fps,
            width,
            height,
            config,
            effects,
            keys,
            hold,
        } => {
            let config = resolve_config(config.as_deref(), width, height)?;
            let args = RenderArgs {
                out,
                frames,
                fps,
                effects,
                keys,
                hold,
            };
            render_offline(&config, &args)?;
        }
        Commands::Effects => {
            for entry in effect_table() {
                let aux = entry
                    .aux_texture
                    .map(|kind| format!(" [{:?} map]", kind))
                    .unwrap_or_default();
                println!("{:<18} {}{}", entry.effect.id(), entry.description, aux);
            }
        }
        Commands::Config => {
            println!("{}", PipelineConfig::default().to_json_pretty()?);
        }
    }
    Ok(())
}

fn render_offline(config: &PipelineConfig, args: &RenderArgs) -> Result<()> {
    if !(args.fps > 0.0) {
        anyhow::bail!("fps must be positive, got {}", args.fps);
    }
    let dt = 1.0 / args.fps;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;

    let backend = pollster::block_on(WgpuBackend::new_headless(config.width, config.height))
        .context("Failed to initialise GPU")?;
    let mut pipeline = PostProcessPipeline::new(backend, config).context("Invalid config")?;
    for &effect in &args.effects {
        pipeline.effect_stack_mut().append(effect);
    }
    let controls = input::controls_for_keys(&args.hold);

    println!(
        "Rendering {} frames ({}x{}) to {:?}...",
        args.frames, config.width, config.height, args.out
    );

    for frame in 0..args.frames {
        for (_, key) in args.keys.iter().filter(|(at, _)| *at == frame) {
            match input::command_for_key(*key) {
                Some(command) => pipeline.apply_command(command),
                None => log::warn!("Key {} has no command; ignored", key),
            }
        }

        pipeline
            .run_frame(dt, &controls)
            .with_context(|| format!("Failed to render frame {}", frame))?;

        save_frame(pipeline.backend(), &args.out, frame)?;

        if frame % 60 == 0 {
            print!(".");
            use std::io::Write;
            std::io::stdout().flush()?;
        }
    }
    println!("\nDone ({} frames presented).", pipeline.backend().presented_frames());

    Ok(())
}

fn save_frame(backend: &WgpuBackend, out_dir: &Path, frame: u32) -> Result<()> {
    let image = timed("readback", || backend.read_output())
        .with_context(|| format!("Failed to read back frame {}", frame))?;
    let frame_path = out_dir.join(format!("frame_{:05}.png", frame));
    image
        .save(&frame_path)
        .with_context(|| format!("Failed to write {}", frame_path.display()))?;
    Ok(())
}
