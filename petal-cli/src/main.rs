//! Petal CLI
//!
//! Resolve image sources, or mount an image against the fetching loader and
//! watch its lifecycle.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use petal_image::asset::{AssetManifest, AssetMap};
use petal_image::events::LayoutEvent;
use petal_image::geometry::LayoutRect;
use petal_image::presentation::ImageStyle;
use petal_image::resolve::{ImageEnvironment, resolve_dimensions, resolve_request};
use petal_image::{Image, ImageContext, ImageProps, ResizeMode, Source};
use petal_loader::{FetchConfig, FetchImageLoader};

/// Petal - image source resolution and loading from the command line
#[derive(Parser, Debug)]
#[command(name = "petal")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"SOURCES:
    A source is either JSON or a plain URI:
      3                                   asset handle (needs --assets)
      https://example.com/a.png           URI
      '{"uri": "a.png", "width": 10, "height": 10, "cache": "reload"}'
      '[{"uri": "a.png"}, {"uri": "b.png"}]'

EXAMPLES:
    # Which file does asset 1 resolve to on a 2x display?
    petal resolve --assets manifest.json --dpr 2 1

    # Load a remote image and print the rendered description
    petal load https://example.com/a.png --resize-mode center --layout 100x100
"#)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON array of asset manifests; handles are assigned from 1 in order
    #[arg(long, global = true, value_name = "FILE")]
    assets: Option<PathBuf>,

    /// Device pixel ratio used to pick asset scales
    #[arg(long, global = true, default_value = "1")]
    dpr: f64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a source and print the request it produces
    Resolve {
        /// Source to resolve
        #[arg(value_name = "SOURCE")]
        source: String,
    },
    /// Mount an image, wait for its load, and print events and output
    Load(LoadArgs),
}

#[derive(Args, Debug)]
struct LoadArgs {
    /// Source to load
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Source shown until the primary source has loaded
    #[arg(long, value_name = "SOURCE")]
    default_source: Option<String>,

    /// center, contain, cover, none, repeat, or stretch
    #[arg(long)]
    resize_mode: Option<ResizeMode>,

    /// Tint applied to every opaque pixel
    #[arg(long, value_name = "COLOR")]
    tint_color: Option<String>,

    /// Blur radius in pixels
    #[arg(long, value_name = "PX")]
    blur_radius: Option<f64>,

    /// Style object as JSON
    #[arg(long, value_name = "JSON")]
    style: Option<String>,

    /// Measured box of the root, reported after mounting
    #[arg(long, value_name = "WxH", value_parser = parse_layout)]
    layout: Option<LayoutRect>,

    /// Seconds to wait for the load (also the HTTP timeout)
    #[arg(long, default_value = "30")]
    timeout: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let registry = load_assets(cli.assets.as_ref())?;
    let environment = ImageEnvironment {
        device_pixel_ratio: cli.dpr,
    };

    match &cli.command {
        Command::Resolve { source } => resolve(&parse_source(source), &registry, environment),
        Command::Load(args) => load(args, registry, environment),
    }
}

/// JSON if it parses, otherwise a plain URI.
fn parse_source(raw: &str) -> Source {
    serde_json::from_str(raw).unwrap_or_else(|_| Source::Uri(raw.to_string()))
}

fn parse_layout(raw: &str) -> Result<LayoutRect, String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{raw}'"))?;
    let width: f64 = width.trim().parse().map_err(|_| format!("bad width '{width}'"))?;
    let height: f64 = height
        .trim()
        .parse()
        .map_err(|_| format!("bad height '{height}'"))?;
    Ok(LayoutRect::sized(width, height))
}

fn load_assets(path: Option<&PathBuf>) -> anyhow::Result<AssetMap> {
    let Some(path) = path else {
        return Ok(AssetMap::new());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read asset manifest '{}'", path.display()))?;
    let manifests: Vec<AssetManifest> = serde_json::from_str(&text)
        .with_context(|| format!("invalid asset manifest '{}'", path.display()))?;
    log::debug!("registered {} assets", manifests.len());
    Ok(manifests.into_iter().collect())
}

/// Print the request `source` resolves to.
fn resolve(
    source: &Source,
    registry: &AssetMap,
    environment: ImageEnvironment,
) -> anyhow::Result<()> {
    let request = resolve_request(Some(source), registry, &environment)?;
    let Some(request) = request else {
        println!("{}", "nothing to load".dimmed());
        return Ok(());
    };

    println!("{}", serde_json::to_string_pretty(&request)?);
    if let Some(size) = resolve_dimensions(Some(source), registry)? {
        println!("{} {}x{}", "intrinsic size".bold(), size.width, size.height);
    }
    Ok(())
}

/// Mount an image, pump the loader until it settles, then print the
/// rendered description.
fn load(
    args: &LoadArgs,
    registry: AssetMap,
    environment: ImageEnvironment,
) -> anyhow::Result<()> {
    let timeout = Duration::from_secs(args.timeout);
    let loader = Rc::new(RefCell::new(FetchImageLoader::new(&FetchConfig {
        timeout,
        ..FetchConfig::default()
    })?));

    let style: ImageStyle = match &args.style {
        Some(json) => serde_json::from_str(json).context("invalid --style")?,
        None => ImageStyle::default(),
    };

    let mut props = ImageProps::new(parse_source(&args.source))
        .with_style(style)
        .on_load_start(|| println!("{}", "load start".cyan()))
        .on_load(|event| match event.size {
            Some(size) => println!(
                "{} {} ({}x{})",
                "load".green().bold(),
                event.uri,
                size.width,
                size.height
            ),
            None => println!("{} {}", "load".green().bold(), event.uri),
        })
        .on_error(|event| println!("{} {}", "error".red().bold(), event.error))
        .on_load_end(|event| println!("{} {}", "load end".dimmed(), event.state));
    props.default_source = args.default_source.as_deref().map(parse_source);
    props.resize_mode = args.resize_mode;
    props.tint_color.clone_from(&args.tint_color);
    props.blur_radius = args.blur_radius;

    let context =
        ImageContext::new(Rc::new(registry), loader.clone()).with_environment(environment);
    let mut image = Image::mount(props, context)?;

    if let Some(layout) = args.layout {
        image.handle_layout(&LayoutEvent::new(layout));
    }

    let settled = loader.borrow_mut().pump_until_idle(timeout);
    if !settled {
        eprintln!(
            "{} load did not settle within {}s",
            "warning:".yellow().bold(),
            args.timeout
        );
    }

    let rendered = image.render()?;
    println!("{} {}", "state".bold(), image.state());
    println!("{}", serde_json::to_string_pretty(&rendered)?);

    image.unmount();
    Ok(())
}
