use crate::cli::Args;
use crate::image::RasterImage;
use anyhow::{Result, anyhow};
use image::DynamicImage;
use std::io::{IsTerminal, Write};
use viuer::{Config as ViuerConfig, print};

/// Preview width when neither `--width` nor `--height` is given
const DEFAULT_WIDTH: u32 = 24;

pub fn print_image(raster: &RasterImage, args: &Args) -> Result<()> {
    let is_tty = std::io::stdout().is_terminal();

    let gray = raster
        .to_gray_image()
        .ok_or_else(|| anyhow!("raster does not fill {}x{}", raster.width(), raster.height()))?;
    let image = DynamicImage::ImageLuma8(gray);

    let (config_width, config_height) = match (args.width, args.height) {
        (Some(w), ..) => (Some(w), None),
        (None, Some(h)) => (None, Some(h)),
        (None, None) => (Some(DEFAULT_WIDTH), None),
    };

    let config = ViuerConfig {
        width: config_width,
        height: config_height,
        absolute_offset: false,
        use_kitty: is_tty,
        use_iterm: is_tty,
        use_sixel: is_tty,
        ..Default::default()
    };

    std::io::stdout().flush()
        .map_err(|e| anyhow!("Failed to flush stdout: {e}"))?;

    print(&image, &config)
        .map_err(|e| anyhow!("Failed to display image: {e}"))?;

    Ok(())
}
