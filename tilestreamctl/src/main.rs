use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tilestream_model::BasicBBox;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod manifest;

use commands::{PlanArgs, RenderArgs, SliceArgs};

#[derive(Parser)]
#[command(
    name = "tilestreamctl",
    version,
    about = "Tile pyramid planning, slicing and rendering"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the pyramid level and tile set for a region of interest
    Plan {
        /// Native image width in pixels
        #[arg(long)]
        width: u32,
        /// Native image height in pixels
        #[arg(long)]
        height: u32,
        #[command(flatten)]
        region: RegionArgs,
        #[arg(long)]
        min_level: Option<u32>,
    },
    /// Cut an image into a local tile pyramid
    Slice {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        image_id: String,
        #[arg(long)]
        min_level: Option<u32>,
    },
    /// Stream a region of a local pyramid into a PNG
    Render {
        /// Pyramid root written by `slice`
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        image_id: String,
        #[command(flatten)]
        region: RegionArgs,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        max_texture_size: Option<u32>,
        /// Give up waiting for tiles after this many milliseconds
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct RegionArgs {
    /// Visible box in basic coordinates: min_x,min_y,max_x,max_y
    #[arg(long, value_parser = parse_bbox, default_value = "0,0,1,1")]
    bbox: BasicBBox,
    /// Basic-coordinate width of one viewport pixel
    #[arg(long)]
    pixel_width: f64,
    /// Basic-coordinate height of one viewport pixel
    #[arg(long)]
    pixel_height: f64,
}

fn parse_bbox(raw: &str) -> Result<BasicBBox, String> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid bbox component: {e}"))?;
    match values.as_slice() {
        [min_x, min_y, max_x, max_y] => {
            Ok(BasicBBox::new(*min_x, *min_y, *max_x, *max_y))
        }
        _ => Err(format!(
            "expected four comma separated values, got {}",
            values.len()
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Plan {
            width,
            height,
            region,
            min_level,
        } => commands::plan(PlanArgs {
            width,
            height,
            bbox: region.bbox,
            pixel_width: region.pixel_width,
            pixel_height: region.pixel_height,
            min_level,
        }),
        Command::Slice {
            input,
            output,
            image_id,
            min_level,
        } => {
            commands::slice(SliceArgs {
                input,
                output,
                image_id,
                min_level,
            })
            .await
        }
        Command::Render {
            root,
            image_id,
            region,
            output,
            max_texture_size,
            timeout_ms,
        } => {
            commands::render(RenderArgs {
                root,
                image_id,
                bbox: region.bbox,
                pixel_width: region.pixel_width,
                pixel_height: region.pixel_height,
                output,
                max_texture_size,
                timeout_ms,
            })
            .await
        }
    }
}
