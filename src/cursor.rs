use crate::backend::CursorDevice;
use crate::error::{AccelError, AccelResult};

pub const CURSOR_MAX_SIZE: u32 = 32;

/// 32x32 pixels at 2 bits per pixel.
pub const CURSOR_IMAGE_BYTES: usize = 256;

/// Kernel `struct fbcurpos`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CursorPosition {
    pub x: u16,
    pub y: u16,
}

impl CursorPosition {
    /// The cursor plane cannot start above the screen; negative `y` is
    /// pinned to the top row.
    pub fn from_screen(x: i32, y: i32) -> Self {
        Self {
            x: (x & 0xFFFF) as u16,
            y: (y.max(0) & 0xFFFF) as u16,
        }
    }
}

/// Translates a 2-bpp source/mask-interleaved cursor into the LCDC's
/// encoding: pixel value 3 becomes 1, 0 becomes 3, the rest are kept.
pub fn convert_cursor_image(bits: &[u8; CURSOR_IMAGE_BYTES]) -> [u8; CURSOR_IMAGE_BYTES] {
    let mut converted = *bits;
    for byte in converted.iter_mut() {
        let mut out = *byte;
        for shift in (0..8).step_by(2) {
            let value = match (*byte >> shift) & 0x3 {
                3 => 1,
                0 => 3,
                other => other,
            };
            out &= !(0x3 << shift);
            out |= value << shift;
        }
        *byte = out;
    }
    converted
}

/// Hardware cursor on the graphics framebuffer.
pub struct HwCursor {
    device: Box<dyn CursorDevice>,
}

impl HwCursor {
    /// Probes for cursor support by switching the cursor off.
    pub fn new(mut device: Box<dyn CursorDevice>) -> AccelResult<Self> {
        device.set_enable(false).map_err(|source| {
            log::info!("no hardware cursor support: {source}");
            AccelError::device("FBIOPUT_SET_CURSOR_EN", source)
        })?;
        Ok(Self { device })
    }

    pub fn max_size(&self) -> (u32, u32) {
        (CURSOR_MAX_SIZE, CURSOR_MAX_SIZE)
    }

    pub fn show(&mut self) {
        if let Err(err) = self.device.set_enable(true) {
            log::warn!("failed to show the hardware cursor: {err}");
        }
    }

    pub fn hide(&mut self) {
        if let Err(err) = self.device.set_enable(false) {
            log::warn!("failed to hide the hardware cursor: {err}");
        }
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        if let Err(err) = self.device.set_position(CursorPosition::from_screen(x, y)) {
            log::warn!("failed to move the hardware cursor: {err}");
        }
    }

    pub fn set_colors(&mut self, bg: u32, fg: u32) {
        if let Err(err) = self.device.set_colors(bg, fg) {
            log::debug!("failed to set hardware cursor colors: {err}");
        }
    }

    pub fn load_image(&mut self, bits: &[u8; CURSOR_IMAGE_BYTES]) {
        let converted = convert_cursor_image(bits);
        if let Err(err) = self.device.load_image(&converted) {
            log::warn!("failed to load the hardware cursor image: {err}");
        }
    }
}
