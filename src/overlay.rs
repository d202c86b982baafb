//! Video overlay capability and its Rockchip fbdev implementation.

use bitflags::bitflags;

use crate::backend::{FramebufferMemory, FramebufferRegion, OverlayDevice};
use crate::error::{AccelError, AccelResult};
use crate::region::OverlayRect;
use crate::surface::ImageFormat;

/// `FB_ACTIVATE_FORCE`: apply the screen info even if nothing changed.
pub const FB_ACTIVATE_FORCE: u32 = 128;

/// Overlay scan-out format, low byte of `nonstd`.
pub const HAL_PIXEL_FORMAT_YCRCB_NV12: u32 = 0x20;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FbBitfield {
    pub offset: u32,
    pub length: u32,
    pub msb_right: u32,
}

/// Kernel `struct fb_var_screeninfo`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FbVarScreenInfo {
    pub xres: u32,
    pub yres: u32,
    pub xres_virtual: u32,
    pub yres_virtual: u32,
    pub xoffset: u32,
    pub yoffset: u32,
    pub bits_per_pixel: u32,
    pub grayscale: u32,
    pub red: FbBitfield,
    pub green: FbBitfield,
    pub blue: FbBitfield,
    pub transp: FbBitfield,
    pub nonstd: u32,
    pub activate: u32,
    pub height: u32,
    pub width: u32,
    pub accel_flags: u32,
    pub pixclock: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
    pub hsync_len: u32,
    pub vsync_len: u32,
    pub sync: u32,
    pub vmode: u32,
    pub rotate: u32,
    pub colorspace: u32,
    pub reserved: [u32; 4],
}

bitflags! {
    /// Capabilities advertised by a [`VideoOverlay`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OverlayFlags: u32 {
        /// Successive frames go to different framebuffer offsets.
        const DOUBLE_BUFFERING = 1 << 0;
    }
}

/// Part of the frame in framebuffer memory the overlay reads from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputParams {
    pub width: i32,
    pub height: i32,
    /// Luma stride in bytes.
    pub stride: i32,
    pub x: i32,
    pub y: i32,
}

pub trait VideoOverlay: Send {
    fn flags(&self) -> OverlayFlags;

    /// Plane offsets are relative to the start of the framebuffer.
    fn set_yuv420_input_buffer(&mut self, y_offset: u32, u_offset: u32, v_offset: u32)
    -> AccelResult<()>;

    fn set_input_par(&mut self, input: InputParams) -> AccelResult<()>;

    fn set_output_window(&mut self, window: OverlayRect) -> AccelResult<()>;

    fn show_window(&mut self) -> AccelResult<()>;

    fn hide_window(&mut self) -> AccelResult<()>;

    fn set_colorkey(&mut self, color: u32) -> AccelResult<()>;

    fn disable_colorkey(&mut self) -> AccelResult<()>;

    /// Writes a client frame into framebuffer memory at `offset`. The
    /// default is a straight byte copy.
    fn copy_buffer(&mut self, offset: usize, src: &[u8], _format: ImageFormat) -> AccelResult<()> {
        let end = offset
            .checked_add(src.len())
            .ok_or(AccelError::BufferOverflow)?;
        let dst = self
            .fb_mem()
            .get_mut(offset..end)
            .ok_or(AccelError::BufferOverflow)?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn screen_width(&self) -> i32;

    fn screen_height(&self) -> i32;

    fn fb_mem(&mut self) -> &mut [u8];

    fn visible_fb_size(&self) -> usize;

    fn total_fb_size(&self) -> usize;
}

/// Overlay on the second Rockchip LCDC window (`/dev/fb1` for `/dev/fb0`).
pub struct RkOverlay {
    device: Box<dyn OverlayDevice>,
    memory: Box<dyn FramebufferMemory>,
    framebuffer: FramebufferRegion,
    input: InputParams,
    enabled: bool,
}

impl RkOverlay {
    /// Takes over the overlay window and makes sure it starts hidden.
    pub fn new(
        mut device: Box<dyn OverlayDevice>,
        memory: Box<dyn FramebufferMemory>,
        framebuffer: FramebufferRegion,
    ) -> AccelResult<Self> {
        device.set_enable(false).map_err(|source| {
            log::warn!("failed to set up the overlay: {source}");
            AccelError::device("RK_FBIOSET_ENABLE", source)
        })?;
        Ok(Self {
            device,
            memory,
            framebuffer,
            input: InputParams::default(),
            enabled: false,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn window_screeninfo(&self, mut info: FbVarScreenInfo, window: OverlayRect) -> FbVarScreenInfo {
        let input = self.input;
        info.xoffset = input.x as u32;
        info.yoffset = input.y as u32;
        info.xres = input.width as u32;
        info.xres_virtual = input.stride as u32;
        info.yres = input.height as u32;
        info.yres_virtual = (input.height + input.y) as u32;
        // Display size; a nonzero value overrides xres/yres on screen.
        info.grayscale = ((window.height as u32) << 20) | ((window.width as u32) << 8);
        info.activate = FB_ACTIVATE_FORCE;
        // Display position, with the scan-out format in the low byte.
        info.nonstd =
            HAL_PIXEL_FORMAT_YCRCB_NV12 | ((window.x as u32) << 8) | ((window.y as u32) << 20);
        info
    }
}

impl VideoOverlay for RkOverlay {
    fn flags(&self) -> OverlayFlags {
        OverlayFlags::DOUBLE_BUFFERING
    }

    fn set_yuv420_input_buffer(
        &mut self,
        y_offset: u32,
        u_offset: u32,
        v_offset: u32,
    ) -> AccelResult<()> {
        let phys = self.framebuffer.phys_addr;
        let addr = [
            phys.wrapping_add(y_offset),
            phys.wrapping_add(u_offset.min(v_offset)),
        ];
        self.device.set_yuv_addr(addr).map_err(|source| {
            log::warn!("failed to set overlay buffer address: {source}");
            AccelError::device("RK_FBIOSET_YUV_ADDR", source)
        })
    }

    fn set_input_par(&mut self, input: InputParams) -> AccelResult<()> {
        self.input = input;
        Ok(())
    }

    fn set_output_window(&mut self, window: OverlayRect) -> AccelResult<()> {
        let current = self.device.var_screeninfo().map_err(|source| {
            log::warn!("failed to read overlay screen info: {source}");
            AccelError::device("FBIOGET_VSCREENINFO", source)
        })?;
        let info = self.window_screeninfo(current, window);
        if let Err(err) = self.device.put_var_screeninfo(&info) {
            log::warn!("failed to send FBIOPUT_VSCREENINFO: {err}");
        }

        self.device
            .set_overlay_state(true)
            .map_err(|source| AccelError::device("RK_FBIOSET_OVERLAY_STATE", source))?;
        self.device
            .config_done()
            .map_err(|source| AccelError::device("RK_FBIOSET_CONFIG_DONE", source))?;
        self.device
            .set_enable(true)
            .map_err(|source| AccelError::device("RK_FBIOSET_ENABLE", source))
    }

    fn show_window(&mut self) -> AccelResult<()> {
        if self.enabled {
            return Ok(());
        }
        if let Err(err) = self.device.set_enable(true) {
            log::warn!("failed to enable the overlay: {err}");
        }
        self.enabled = true;
        Ok(())
    }

    fn hide_window(&mut self) -> AccelResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Err(err) = self.device.set_enable(false) {
            log::warn!("failed to disable the overlay: {err}");
        }
        self.enabled = false;
        Ok(())
    }

    fn set_colorkey(&mut self, color: u32) -> AccelResult<()> {
        self.device
            .set_color_key(color | (1 << 24))
            .map_err(|source| AccelError::device("FBIOPUT_SET_COLOR_KEY", source))
    }

    fn disable_colorkey(&mut self) -> AccelResult<()> {
        self.device
            .set_color_key(0)
            .map_err(|source| AccelError::device("FBIOPUT_SET_COLOR_KEY", source))
    }

    fn copy_buffer(&mut self, offset: usize, src: &[u8], format: ImageFormat) -> AccelResult<()> {
        let dst = self
            .memory
            .as_mut_bytes()
            .get_mut(offset..)
            .ok_or(AccelError::BufferOverflow)?;
        crate::convert::copy_planar_to_nv12(dst, src, format)
    }

    fn screen_width(&self) -> i32 {
        self.framebuffer.screen_width as i32
    }

    fn screen_height(&self) -> i32 {
        self.framebuffer.screen_height as i32
    }

    fn fb_mem(&mut self) -> &mut [u8] {
        self.memory.as_mut_bytes()
    }

    fn visible_fb_size(&self) -> usize {
        self.framebuffer.visible_len
    }

    fn total_fb_size(&self) -> usize {
        self.framebuffer.total_len
    }
}
