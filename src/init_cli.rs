//! Entrypoint to normalize a single image file locally

use anyhow::Context;
use logonorm::config::Settings;
use logonorm::util::init_tracing;
use logonorm::{ImageAsset, Normalizer};
use std::path::{Path, PathBuf};
use std::{env, fs, process};

const USAGE: &str = "usage: ./normalize <image file> [config file]";

fn get_args() -> (PathBuf, Option<PathBuf>) {
    let args: Vec<String> = env::args().collect();
    if !(2..=3).contains(&args.len()) {
        println!("{USAGE}");
        process::exit(1);
    }

    (PathBuf::from(&args[1]), args.get(2).map(PathBuf::from))
}

/// Best-effort declared type from the file extension, like a file picker
fn mime_from_path(path: &Path) -> Option<String> {
    image::ImageFormat::from_path(path)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (image, config) = get_args();
    let settings = Settings::load(config.as_deref())?;
    init_tracing(&settings.log);

    let bytes = fs::read(&image).with_context(|| format!("cannot read {}", image.display()))?;
    let asset = ImageAsset::new(bytes, mime_from_path(&image));

    let normalizer = Normalizer::new(settings.normalizer)?;
    let output = normalizer
        .normalize_asset_async(asset)
        .await
        .with_context(|| format!("failed to process {}", image.display()))?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
