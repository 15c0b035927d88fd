use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use image::RgbaImage;
use log::warn;
use serde::Serialize;

use pani_tools::formats::animation::{Animation, Background};
use pani_tools::formats::catalog::Catalog;
use pani_tools::formats::image::SharedImage;

#[derive(Parser)]
#[command(name = "pani_tools", version, about = "Inspect and export legacy PIC/CAT/PAN asset files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a JSON summary of an asset file
    Info {
        /// Asset file (.PIC, .CAT or .PAN)
        file: PathBuf,
    },
    /// Export the images in an asset file as PNGs
    Export {
        /// Asset file (.PIC, .CAT or .PAN)
        file: PathBuf,
        /// Output directory, created if missing
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
        /// Render the CGA dithering preview instead of the VGA colours
        #[arg(long)]
        cga: bool,
    },
}

enum Asset {
    Image(SharedImage),
    Catalog(Catalog),
    Animation(Animation),
}

fn load_asset(path: &Path) -> Result<Asset, Box<dyn Error>> {
    let data = fs::read(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pic" => Ok(Asset::Image(SharedImage::from_bytes(&data)?)),
        "cat" => Ok(Asset::Catalog(Catalog::from_bytes(&data)?)),
        "pan" => Ok(Asset::Animation(Animation::from_bytes(&data)?)),
        _ => Err(format!(
            "unrecognised asset extension on {} (expected .pic, .cat or .pan)",
            path.display()
        )
        .into()),
    }
}

#[derive(Serialize)]
struct ImageSummary {
    width: u16,
    height: u16,
    cga_remap: bool,
}

impl ImageSummary {
    fn new(image: &SharedImage) -> ImageSummary {
        ImageSummary {
            width: image.width,
            height: image.height,
            cga_remap: image.cga_remap.is_some(),
        }
    }
}

#[derive(Serialize)]
struct CatalogEntrySummary {
    name: String,
    #[serde(flatten)]
    image: ImageSummary,
}

#[derive(Serialize)]
struct CatalogSummary {
    entries: Vec<CatalogEntrySummary>,
}

#[derive(Serialize)]
struct AnimationSummary {
    width: u16,
    height: u16,
    frame_skip: u8,
    background: String,
    assigned_slots: usize,
    images: Vec<ImageSummary>,
    instructions: usize,
    steps: usize,
}

fn print_info(asset: &Asset) -> Result<(), Box<dyn Error>> {
    let json = match asset {
        Asset::Image(image) => serde_json::to_string_pretty(&ImageSummary::new(image))?,
        Asset::Catalog(catalog) => {
            let entries = catalog
                .entries
                .iter()
                .map(|entry| CatalogEntrySummary {
                    name: entry.name.clone(),
                    image: ImageSummary::new(&entry.image),
                })
                .collect();
            serde_json::to_string_pretty(&CatalogSummary { entries })?
        }
        Asset::Animation(animation) => {
            let background = match &animation.background {
                Background::ClearToColor { color, .. } => format!("clear to colour {}", color),
                Background::ClearToImage(_) => "clear to image".to_string(),
                Background::Other(kind) => format!("other (0x{:02X})", kind),
            };
            let summary = AnimationSummary {
                width: animation.width,
                height: animation.height,
                frame_skip: animation.frame_skip,
                background,
                assigned_slots: animation.slots.iter().filter(|&&s| s != 0).count(),
                images: animation.images.iter().map(ImageSummary::new).collect(),
                instructions: animation.script.instructions.len(),
                steps: animation.script.steps.len(),
            };
            serde_json::to_string_pretty(&summary)?
        }
    };
    println!("{}", json);
    Ok(())
}

fn render(image: &SharedImage, cga: bool) -> Result<RgbaImage, Box<dyn Error>> {
    if cga {
        if let Some(preview) = image.to_cga_rgba()? {
            return Ok(preview);
        }
        warn!("image carries no CGA remap table, exporting VGA colours");
    }
    Ok(image.to_rgba()?)
}

fn save_png(image: &RgbaImage, path: &Path) -> io::Result<()> {
    let temp_path = path.with_extension("temp.png");
    image
        .save(&temp_path)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let mut options = oxipng::Options::from_preset(2);
    options.bit_depth_reduction = true;
    options.interlace = None;

    match oxipng::optimize(
        &oxipng::InFile::Path(temp_path.clone()),
        &oxipng::OutFile::Path(Some(path.to_path_buf())),
        &options,
    ) {
        Ok(_) => {
            let _ = fs::remove_file(temp_path);
            Ok(())
        }
        Err(e) => {
            fs::rename(temp_path, path)?;
            warn!(
                "oxipng optimisation failed for {}, saved unoptimised: {}",
                path.display(),
                e
            );
            Ok(())
        }
    }
}

fn sanitise_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn export(asset: &Asset, stem: &str, output: &Path, cga: bool) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(output)?;
    match asset {
        Asset::Image(image) => {
            let path = output.join(format!("{}.png", stem));
            save_png(&render(image, cga)?, &path)?;
            println!("Wrote {}", path.display());
        }
        Asset::Catalog(catalog) => {
            for entry in &catalog.entries {
                let path = output.join(format!("{}.png", sanitise_name(&entry.name)));
                save_png(&render(&entry.image, cga)?, &path)?;
                println!("Wrote {}", path.display());
            }
        }
        Asset::Animation(animation) => {
            if let Background::ClearToImage(image) = &animation.background {
                let path = output.join(format!("{}_background.png", stem));
                save_png(&render(image, cga)?, &path)?;
                println!("Wrote {}", path.display());
            }
            for (index, image) in animation.images.iter().enumerate() {
                let path = output.join(format!("{}_{:03}.png", stem, index));
                save_png(&render(image, cga)?, &path)?;
                println!("Wrote {}", path.display());
            }
        }
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Info { file } => {
            let asset = load_asset(&file)?;
            print_info(&asset)
        }
        Command::Export { file, output, cga } => {
            let asset = load_asset(&file)?;
            let stem = file
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("asset")
                .to_string();
            export(&asset, &sanitise_name(&stem), &output, cga)
        }
    }
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
