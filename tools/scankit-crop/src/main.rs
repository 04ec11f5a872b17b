//! Developer tool for checking scan window geometry against raw frame dumps.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use scankit_frame::{FrameBuffer, PixelFormat};
use scankit_geometry::{
    CropRect, CropRegion, Orientation, PixelRect, compute_crop_rect, compute_focus_point,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scankit-crop")]
#[command(about = "Inspect how a scan window maps onto camera frames", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the crop rectangle and focus point for a viewport
    Rect {
        /// Viewport width in pixels
        #[arg(long)]
        width: u32,
        /// Viewport height in pixels
        #[arg(long)]
        height: u32,
        /// Pixel grid to snap to
        #[arg(long, default_value_t = 2)]
        align: u32,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Crop a raw frame dump the way a scan session would
    Crop {
        /// Raw frame bytes
        input: PathBuf,
        /// Where to write the cropped raw bytes
        #[arg(short, long)]
        output: PathBuf,
        /// Frame width in pixels
        #[arg(long)]
        width: u32,
        /// Frame height in pixels
        #[arg(long)]
        height: u32,
        /// Pixel layout of the dump
        #[arg(long, value_enum, default_value_t = Format::Nv21)]
        format: Format,
        /// Also write the cropped luma plane as a PNG
        #[arg(long)]
        png: Option<PathBuf>,
        #[command(flatten)]
        window: WindowArgs,
    },
}

#[derive(Args)]
struct WindowArgs {
    /// Fraction of the viewport width to keep
    #[arg(long, default_value_t = 1.0)]
    scale_width: f64,
    /// Fraction of the viewport height to keep
    #[arg(long, default_value_t = 1.0)]
    scale_height: f64,
    /// Horizontal centre offset in [-1, 1]
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    offset_x: f64,
    /// Vertical centre offset in [-1, 1]
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    offset_y: f64,
    /// Clockwise rotation of the buffer relative to the screen
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    rotation: i32,
}

impl WindowArgs {
    fn region(&self) -> Result<CropRegion> {
        let region = CropRegion::new(
            self.scale_width,
            self.scale_height,
            self.offset_x,
            self.offset_y,
        );
        region.validate()?;
        Ok(region)
    }

    const fn orientation(&self) -> Orientation {
        Orientation::from_rotation_degrees(self.rotation)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Nv21,
    Nv12,
    Rgba,
    Bgra,
}

impl From<Format> for PixelFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Nv21 => Self::Nv21,
            Format::Nv12 => Self::Nv12,
            Format::Rgba => Self::Rgba,
            Format::Bgra => Self::Bgra,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rect {
            width,
            height,
            align,
            window,
        } => run_rect(width, height, align, &window),
        Commands::Crop {
            input,
            output,
            width,
            height,
            format,
            png,
            window,
        } => run_crop(&CropJob {
            input,
            output,
            width,
            height,
            format: format.into(),
            png,
            window,
        }),
    }
}

fn run_rect(width: u32, height: u32, align: u32, window: &WindowArgs) -> Result<()> {
    let region = window.region()?;
    let rect = compute_crop_rect(width, height, &region, window.orientation());
    print_rect(&rect);

    match rect.to_pixel_rect(width, height, align) {
        Ok(pixels) => print_pixels(&pixels),
        Err(err) => println!("{} {err}", "pixel rect:".red().bold()),
    }
    print_focus(width, height, &region);
    Ok(())
}

struct CropJob {
    input: PathBuf,
    output: PathBuf,
    width: u32,
    height: u32,
    format: PixelFormat,
    png: Option<PathBuf>,
    window: WindowArgs,
}

fn run_crop(job: &CropJob) -> Result<()> {
    let region = job.window.region()?;
    let orientation = job.window.orientation();
    let rotation = orientation.rotation_degrees();

    let data = std::fs::read(&job.input)
        .with_context(|| format!("Failed to read {}", job.input.display()))?;
    let frame = FrameBuffer::new(data, job.width, job.height, job.format, rotation)
        .context("Frame dump does not match its dimensions")?;
    println!(
        "{} {}x{} {:?}",
        "frame:".cyan().bold(),
        frame.width(),
        frame.height(),
        frame.format()
    );

    let rect = compute_crop_rect(job.width, job.height, &region, orientation);
    print_rect(&rect);
    let pixels = rect
        .to_pixel_rect(job.width, job.height, job.format.crop_alignment())
        .context("Scan window does not fit the frame")?;
    print_pixels(&pixels);
    print_focus(job.width, job.height, &region);

    let cropped = frame.crop(&pixels)?;
    std::fs::write(&job.output, cropped.data())
        .with_context(|| format!("Failed to write {}", job.output.display()))?;
    println!(
        "{} {} ({} bytes)",
        "wrote".green().bold(),
        job.output.display(),
        cropped.data().len()
    );

    if let Some(png) = &job.png {
        cropped
            .to_luma_image()
            .save(png)
            .with_context(|| format!("Failed to write {}", png.display()))?;
        println!("{} {}", "wrote".green().bold(), png.display());
    }
    Ok(())
}

fn print_rect(rect: &CropRect) {
    println!(
        "{} x={:.2} y={:.2} w={:.2} h={:.2}",
        "crop rect:".cyan().bold(),
        rect.x,
        rect.y,
        rect.width,
        rect.height
    );
}

fn print_pixels(pixels: &PixelRect) {
    println!(
        "{} left={} top={} w={} h={}",
        "pixel rect:".cyan().bold(),
        pixels.left,
        pixels.top,
        pixels.width,
        pixels.height
    );
}

fn print_focus(width: u32, height: u32, region: &CropRegion) {
    let focus = compute_focus_point(width, height, region);
    println!(
        "{} ({:.3}, {:.3})",
        "focus point:".cyan().bold(),
        focus.x,
        focus.y
    );
}
