//! PNG rendering of QR codes.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

use crate::{Error, Result};

/// Edge length of one QR module in pixels.
pub const MODULE_PIXELS: u32 = 10;

/// Width of the quiet zone around the symbol, in modules.
pub const QUIET_ZONE_MODULES: u32 = 4;

/// Encode `payload` as a grayscale PNG with low error correction.
pub fn render_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| Error::QrRender(e.to_string()))?;

    let image = code
        .render::<Luma<u8>>()
        .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
        .quiet_zone(true)
        .build();

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| Error::QrRender(e.to_string()))?;

    Ok(buf.into_inner())
}
