use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use memo_fill::markup::load_static_asset;
use memo_fill::{AssetBundle, AssetSlot, FieldMap, FillRequest, Generator};

/// Fill a finance memorandum template and save it as PDF.
#[derive(Parser, Debug)]
#[command(name = "memo_fill")]
#[command(about = "Fill a finance memorandum template and save it as PDF.", long_about = None)]
struct Args {
    /// Target directory containing template.json and the files it names.
    /// Relative paths below are resolved against it
    #[arg(short, long, default_value = ".")]
    target_dir: PathBuf,

    /// Template configuration file
    #[arg(short, long, default_value = "template.json")]
    config: PathBuf,

    /// Field values as a JSON object [default: fields.json, if present]
    #[arg(short, long)]
    fields: Option<PathBuf>,

    /// Set one field, overriding the fields file
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// Upload an asset into a slot (coverImage, footerLogo)
    #[arg(long = "asset", value_name = "SLOT=PATH", value_parser = parse_asset)]
    assets: Vec<(AssetSlot, PathBuf)>,

    /// Output file
    #[arg(short, long, default_value = "output.pdf")]
    output: PathBuf,

    /// Browser executable used by markup templates
    #[arg(long, env = "MEMO_FILL_CHROME")]
    chrome: Option<PathBuf>,
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    Ok((key.trim().to_string(), value.to_string()))
}

fn parse_asset(s: &str) -> std::result::Result<(AssetSlot, PathBuf), String> {
    let (slot, path) = parse_key_value(s)?;
    Ok((slot.parse()?, PathBuf::from(path)))
}

fn load_fields(target_dir: &Path, fields_path: Option<&Path>, overrides: &[(String, String)]) -> Result<FieldMap> {
    let path = match fields_path {
        Some(path) => Some(target_dir.join(path)),
        None => Some(target_dir.join("fields.json")).filter(|path| path.exists()),
    };

    let mut fields = match path {
        Some(path) => {
            log::info!("Loading field values from {:?}...", path);
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            FieldMap::from_json_str(&json).with_context(|| format!("Failed to parse {:?}", path))?
        }
        None => FieldMap::new(),
    };

    fields.merge(FieldMap::from_pairs(overrides.iter().cloned()));
    Ok(fields)
}

fn load_assets(target_dir: &Path, uploads: &[(AssetSlot, PathBuf)]) -> Result<AssetBundle> {
    let mut assets = AssetBundle::new();
    for (slot, path) in uploads {
        let asset = load_static_asset(&target_dir.join(path))
            .with_context(|| format!("Failed to load asset for {}", slot))?;
        log::info!("Using {:?} ({}) for {}", path, asset.mime, slot);
        assets.insert(*slot, asset);
    }
    Ok(assets)
}

async fn run(args: Args) -> Result<()> {
    // Verify the target directory exists
    if !args.target_dir.exists() {
        return Err(anyhow!("Target directory not found: {:?}", args.target_dir));
    }
    if !args.target_dir.is_dir() {
        return Err(anyhow!("Target path is not a directory: {:?}", args.target_dir));
    }

    let config_path = args.target_dir.join(&args.config);
    let mut generator = Generator::open(&config_path)
        .with_context(|| format!("Failed to load template configuration {:?}", config_path))?;
    if let Some(chrome) = args.chrome {
        generator = generator.with_chrome_executable(chrome);
    }

    let fields = load_fields(&args.target_dir, args.fields.as_deref(), &args.set)?;
    let assets = load_assets(&args.target_dir, &args.assets)?;

    let pdf = generator
        .generate(&FillRequest::new(fields, assets))
        .await
        .context("Failed to generate memorandum")?;

    let output_path = args.target_dir.join(&args.output);
    std::fs::write(&output_path, &pdf).with_context(|| format!("Failed to write {:?}", output_path))?;
    log::info!("Successfully saved {:?} ({} bytes)", output_path, pdf.len());

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
