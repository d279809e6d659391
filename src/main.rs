//! Headless viewer: draws an image with its annotation overlays to a PNG.
//!
//! ```text
//! seglabel-render <image> <annotations.json> <out.png> [--width W] [--height H]
//! ```
//!
//! `annotations.json` is a store export keyed by image file name; pass `-`
//! to render without overlays.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use seglabel::backend::{MemoryBackend, UploadFile};
use seglabel::constants::DEFAULT_VIEWPORT_SIZE;
use seglabel::model::{ImageId, ImageSize, Size};
use seglabel::render::{RenderError, RenderResult};
use seglabel::{AnnotationStore, AppConfig, LabelSession};

#[derive(Parser)]
#[command(name = "seglabel-render", about = "Render an image with its annotation overlays")]
#[command(version)]
struct Cli {
    /// Image to draw
    image: PathBuf,

    /// Annotation store export, or `-` for none
    annotations: PathBuf,

    /// PNG to write
    output: PathBuf,

    /// Viewport width in pixels
    #[arg(long, default_value_t = DEFAULT_VIEWPORT_SIZE.0, value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = DEFAULT_VIEWPORT_SIZE.1, value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,
}

impl Cli {
    fn annotations(&self) -> Option<&Path> {
        (self.annotations.as_path() != Path::new("-")).then_some(self.annotations.as_path())
    }

    fn viewport(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

fn load_annotations(path: &Path) -> RenderResult<AnnotationStore> {
    let json = std::fs::read_to_string(path).map_err(|e| RenderError::io(path, e))?;
    Ok(AnnotationStore::from_json(&json)?)
}

fn run(config: &AppConfig, args: &Cli) -> RenderResult<()> {
    let bytes = std::fs::read(&args.image).map_err(|e| RenderError::io(&args.image, e))?;
    let image = image::load_from_memory(&bytes)?.to_rgba8();
    let name = args
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RenderError::usage(format!("{:?} has no file name", args.image)))?;
    let folder = args
        .image
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    let backend = MemoryBackend::new();
    let mut session = LabelSession::new(config);
    session.resize(args.viewport());
    let outcome = session.upload(&backend, &folder, &[UploadFile::new(name.clone(), bytes)]);
    if !outcome.is_complete() || session.catalog().is_empty() {
        return Err(RenderError::usage(format!("{name} is not a supported image")));
    }
    let (width, height) = image.dimensions();
    session.set_natural_size(&ImageId::new(name.clone()), ImageSize::new(width, height));

    if let Some(path) = args.annotations() {
        let store = load_annotations(path)?;
        if store.get(&ImageId::new(name.clone())).is_none() {
            log::warn!("{:?} has no annotations for {}", path, name);
        }
        *session.store().write() = store;
    }

    let frame = session.render(Some(&image))?;
    frame.save_png(&args.output)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = AppConfig::load_from_default_path().unwrap_or_default();
    env_logger::Builder::new()
        .filter_level(config.preferences.log_level.to_level_filter())
        .parse_default_env()
        .init();

    match run(&config, &cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("seglabel-render: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_and_no_annotations() {
        let cli = Cli::try_parse_from(["seglabel-render", "a.png", "-", "out.png"]).unwrap();
        assert!(cli.annotations().is_none());
        assert_eq!((cli.width, cli.height), DEFAULT_VIEWPORT_SIZE);
        assert_eq!(cli.viewport(), Size::new(800.0, 600.0));
    }

    #[test]
    fn test_viewport_size_options() {
        let cli = Cli::try_parse_from([
            "seglabel-render",
            "a.png",
            "labels.json",
            "out.png",
            "--width",
            "1024",
            "--height",
            "768",
        ])
        .unwrap();
        assert_eq!(cli.annotations(), Some(Path::new("labels.json")));
        assert_eq!((cli.width, cli.height), (1024, 768));

        assert!(Cli::try_parse_from(["seglabel-render", "a.png", "-", "out.png", "--width", "0"]).is_err());
        assert!(Cli::try_parse_from(["seglabel-render", "a.png", "-"]).is_err());
    }
}
