use std::io;
use std::sync::Arc;

use crate::cursor::{CURSOR_IMAGE_BYTES, CursorPosition};
use crate::display::DisplayConfig;
use crate::error::AccelResult;
use crate::overlay::FbVarScreenInfo;
use crate::rga::RgaRequest;

/// Memory mapping and geometry of the graphics framebuffer.
///
/// Owned by the top-level [`DisplayAccel`](crate::display::DisplayAccel);
/// the accelerator and the overlay keep their own copy of the descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramebufferRegion {
    /// Address of the CPU mapping of the framebuffer.
    pub base: usize,
    /// Physical address of the first framebuffer byte.
    pub phys_addr: u32,
    /// Total length of the framebuffer memory.
    pub total_len: usize,
    /// Bytes reserved for the on-screen (double-height) graphics surface.
    /// Everything past this offset is free for overlay frames and the
    /// overlap-split scratch band.
    pub visible_len: usize,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl FramebufferRegion {
    pub fn from_screen_info(
        base: usize,
        phys_addr: u32,
        total_len: usize,
        info: &FbVarScreenInfo,
    ) -> Self {
        let row_bytes = info.xres_virtual as usize * info.bits_per_pixel as usize / 8;
        Self {
            base,
            phys_addr,
            total_len,
            visible_len: row_bytes * info.yres_virtual as usize * 2,
            screen_width: info.xres,
            screen_height: info.yres,
        }
    }

    pub fn has_offscreen_memory(&self) -> bool {
        self.visible_len <= self.total_len
    }

    pub fn offscreen_len(&self) -> usize {
        self.total_len.saturating_sub(self.visible_len)
    }
}

/// Synchronous 2D accelerator (`/dev/rga`).
pub trait RgaDevice: Send {
    fn blit_sync(&mut self, request: &RgaRequest) -> io::Result<()>;
}

/// Scaler/YUV overlay plane plus the graphics plane's color-key register.
pub trait OverlayDevice: Send {
    fn var_screeninfo(&mut self) -> io::Result<FbVarScreenInfo>;
    fn put_var_screeninfo(&mut self, info: &FbVarScreenInfo) -> io::Result<()>;
    fn set_overlay_state(&mut self, enabled: bool) -> io::Result<()>;
    fn config_done(&mut self) -> io::Result<()>;
    fn set_enable(&mut self, enabled: bool) -> io::Result<()>;
    fn set_yuv_addr(&mut self, addr: [u32; 2]) -> io::Result<()>;
    /// Written to the graphics framebuffer, not the overlay.
    fn set_color_key(&mut self, key: u32) -> io::Result<()>;
}

pub trait CursorDevice: Send {
    fn set_enable(&mut self, enabled: bool) -> io::Result<()>;
    fn set_position(&mut self, position: CursorPosition) -> io::Result<()>;
    fn set_colors(&mut self, bg: u32, fg: u32) -> io::Result<()>;
    fn load_image(&mut self, image: &[u8; CURSOR_IMAGE_BYTES]) -> io::Result<()>;
}

/// CPU-writable view of the framebuffer memory.
pub trait FramebufferMemory: Send {
    fn as_mut_bytes(&mut self) -> &mut [u8];
}

impl FramebufferMemory for Vec<u8> {
    fn as_mut_bytes(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

pub trait DisplayBackend: Send + Sync {
    fn framebuffer(&self) -> AccelResult<FramebufferRegion>;

    /// Screen info of the graphics plane, used for color-key conversion.
    fn screen_info(&self) -> AccelResult<FbVarScreenInfo>;

    /// Hands out the framebuffer mapping. Backends only allow one writer.
    fn map_framebuffer(&self) -> AccelResult<Box<dyn FramebufferMemory>>;

    fn open_accelerator(&self) -> AccelResult<Box<dyn RgaDevice>>;

    fn open_overlay(&self) -> AccelResult<Box<dyn OverlayDevice>>;

    fn open_cursor(&self) -> AccelResult<Box<dyn CursorDevice>>;
}

pub fn default_backend(config: &DisplayConfig) -> AccelResult<Arc<dyn DisplayBackend>> {
    crate::platform::build_backend(config)
}
