#![deny(unsafe_code)]
//! CLI host for the offscreen render pipeline.
//!
//! Subcommands:
//! - `process <input.png>`: run an image through the pipeline, write PNG
//! - `info`: print the graphics context capabilities

mod error;
mod image_io;

use clap::{Parser, Subcommand};
use error::CliError;
use offscreen_render_core::render::EglContext;
use offscreen_render_core::{Orientation, PipelineConfig, RenderPipeline, Rotation};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "offscreen-render", about = "Offscreen GLES render pipeline CLI")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Pipeline config file (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a PNG through the pipeline with an orientation correction.
    Process {
        /// Input PNG path.
        input: PathBuf,

        /// Output file path.
        #[arg(short, long, default_value = "output.png")]
        output: PathBuf,

        /// Rotation in degrees (0, 90, 180 or 270).
        #[arg(short, long, default_value = "0", value_parser = parse_rotation)]
        rotation: Rotation,

        /// Flip the image vertically.
        #[arg(long)]
        flip: bool,
    },
    /// Print graphics context capabilities.
    Info {
        /// Target width in pixels.
        #[arg(short = 'W', long)]
        width: Option<u32>,

        /// Target height in pixels.
        #[arg(short = 'H', long)]
        height: Option<u32>,
    },
}

fn parse_rotation(s: &str) -> Result<Rotation, String> {
    let degrees: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a number of degrees"))?;
    Rotation::from_degrees(degrees).map_err(|e| e.to_string())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
    let params: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| CliError::Input(format!("invalid config JSON: {e}")))?;
    Ok(PipelineConfig::from_json(&params))
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Process {
            input,
            output,
            rotation,
            flip,
        } => {
            let pixels = image_io::load_png(&input)?;
            let (width, height) = pixels.dimensions();
            let config = config.with_dimensions(width, height);
            let orientation = Orientation::new(rotation, flip);

            let pipeline = RenderPipeline::with_passthrough(config, EglContext::new)?;
            let rendered = pipeline.render(pixels, orientation)?;
            pipeline.teardown()?;

            image_io::save_png(&rendered, &output)?;

            if cli.json {
                let info = serde_json::json!({
                    "input": input.display().to_string(),
                    "output": output.display().to_string(),
                    "width": width,
                    "height": height,
                    "orientation": orientation,
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                eprintln!(
                    "processed {} ({width}x{height}, {}°{}) -> {}",
                    input.display(),
                    rotation.degrees(),
                    if flip { ", flipped" } else { "" },
                    output.display()
                );
            }
        }
        Command::Info { width, height } => {
            let config = config.clone().with_dimensions(
                width.unwrap_or(config.width),
                height.unwrap_or(config.height),
            );
            let pipeline = RenderPipeline::with_passthrough(config, EglContext::new)?;
            let info = pipeline.context_info();
            let (w, h) = pipeline.dimensions()?;
            pipeline.teardown()?;

            if cli.json {
                let out = serde_json::json!({
                    "context": info,
                    "target": { "width": w, "height": h, "fits": info.fits(w, h) },
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("OpenGL ES {}.{}", info.major_version, info.minor_version);
                println!("max texture size: {}", info.max_texture_size);
                println!(
                    "target {w}x{h}{}",
                    if info.fits(w, h) { "" } else { " (exceeds limit)" }
                );
            }
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rotation_accepts_quarter_turns() {
        assert_eq!(parse_rotation("0").unwrap(), Rotation::Deg0);
        assert_eq!(parse_rotation("270").unwrap(), Rotation::Deg270);
        assert!(parse_rotation("45").unwrap_err().contains("45"));
        assert!(parse_rotation("left").is_err());
    }

    #[test]
    fn process_arguments_parse() {
        let cli = Cli::try_parse_from([
            "offscreen-render",
            "process",
            "in.png",
            "-o",
            "out.png",
            "--rotation",
            "90",
            "--flip",
        ])
        .unwrap();
        match cli.command {
            Command::Process {
                input,
                output,
                rotation,
                flip,
            } => {
                assert_eq!(input, PathBuf::from("in.png"));
                assert_eq!(output, PathBuf::from("out.png"));
                assert_eq!(rotation, Rotation::Deg90);
                assert!(flip);
            }
            Command::Info { .. } => panic!("expected process"),
        }
    }

    #[test]
    fn bad_rotation_is_a_parse_error() {
        let result = Cli::try_parse_from(["offscreen-render", "process", "in.png", "-r", "30"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["offscreen-render", "info", "--json", "-W", "64"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Info {
                width: Some(64),
                height: None
            }
        ));
    }

    #[test]
    fn load_config_defaults_without_path() {
        assert_eq!(load_config(None).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn load_config_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"queue_capacity": 2, "worker_name": "gpu"}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.worker_name, "gpu");
        assert_eq!(config.width, PipelineConfig::default().width);
    }

    #[test]
    fn load_config_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(err.exit_code(), 12);
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/config.json"))).unwrap_err();
        assert_eq!(err.exit_code(), 11);
    }
}
