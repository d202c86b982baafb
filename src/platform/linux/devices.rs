use std::fs::File;
use std::io;

use super::ioctl::{
    FBIOGET_VSCREENINFO, FBIOPUT_SET_COLOR_KEY, FBIOPUT_SET_CURSOR_CMAP, FBIOPUT_SET_CURSOR_EN,
    FBIOPUT_SET_CURSOR_IMG, FBIOPUT_SET_CURSOR_POS, FBIOPUT_VSCREENINFO, FbImage, RGA_BLIT_SYNC,
    RK_FBIOSET_CONFIG_DONE, RK_FBIOSET_ENABLE, RK_FBIOSET_OVERLAY_STATE, RK_FBIOSET_YUV_ADDR,
    ioctl_int, ioctl_ptr,
};
use crate::backend::{CursorDevice, OverlayDevice, RgaDevice};
use crate::cursor::{CURSOR_IMAGE_BYTES, CursorPosition};
use crate::overlay::FbVarScreenInfo;
use crate::rga::RgaRequest;

pub(crate) struct RgaNode {
    file: File,
}

impl RgaNode {
    pub(crate) fn new(file: File) -> Self {
        Self { file }
    }
}

impl RgaDevice for RgaNode {
    fn blit_sync(&mut self, request: &RgaRequest) -> io::Result<()> {
        let mut request = *request;
        ioctl_ptr(&self.file, RGA_BLIT_SYNC, &mut request)
    }
}

/// The overlay window node plus the graphics node, which owns the color
/// key register.
pub(crate) struct OverlayNode {
    overlay: File,
    graphics: File,
}

impl OverlayNode {
    pub(crate) fn new(overlay: File, graphics: File) -> Self {
        Self { overlay, graphics }
    }
}

impl OverlayDevice for OverlayNode {
    fn var_screeninfo(&mut self) -> io::Result<FbVarScreenInfo> {
        read_var_screeninfo(&self.overlay)
    }

    fn put_var_screeninfo(&mut self, info: &FbVarScreenInfo) -> io::Result<()> {
        let mut info = *info;
        ioctl_ptr(&self.overlay, FBIOPUT_VSCREENINFO, &mut info)
    }

    fn set_overlay_state(&mut self, enabled: bool) -> io::Result<()> {
        ioctl_int(&self.overlay, RK_FBIOSET_OVERLAY_STATE, i32::from(enabled))
    }

    fn config_done(&mut self) -> io::Result<()> {
        ioctl_int(&self.overlay, RK_FBIOSET_CONFIG_DONE, 0)
    }

    fn set_enable(&mut self, enabled: bool) -> io::Result<()> {
        ioctl_int(&self.overlay, RK_FBIOSET_ENABLE, i32::from(enabled))
    }

    fn set_yuv_addr(&mut self, addr: [u32; 2]) -> io::Result<()> {
        let mut addr = addr;
        ioctl_ptr(&self.overlay, RK_FBIOSET_YUV_ADDR, &mut addr)
    }

    fn set_color_key(&mut self, key: u32) -> io::Result<()> {
        let mut key = key;
        ioctl_ptr(&self.graphics, FBIOPUT_SET_COLOR_KEY, &mut key)
    }
}

pub(crate) struct CursorNode {
    file: File,
}

impl CursorNode {
    pub(crate) fn new(file: File) -> Self {
        Self { file }
    }
}

impl CursorDevice for CursorNode {
    fn set_enable(&mut self, enabled: bool) -> io::Result<()> {
        ioctl_int(&self.file, FBIOPUT_SET_CURSOR_EN, i32::from(enabled))
    }

    fn set_position(&mut self, position: CursorPosition) -> io::Result<()> {
        let mut position = position;
        ioctl_ptr(&self.file, FBIOPUT_SET_CURSOR_POS, &mut position)
    }

    fn set_colors(&mut self, bg: u32, fg: u32) -> io::Result<()> {
        let mut image = FbImage::colors(bg, fg);
        ioctl_ptr(&self.file, FBIOPUT_SET_CURSOR_CMAP, &mut image)
    }

    fn load_image(&mut self, image: &[u8; CURSOR_IMAGE_BYTES]) -> io::Result<()> {
        let mut image = *image;
        ioctl_ptr(&self.file, FBIOPUT_SET_CURSOR_IMG, &mut image)
    }
}

pub(crate) fn read_var_screeninfo(file: &File) -> io::Result<FbVarScreenInfo> {
    let mut info = FbVarScreenInfo::default();
    ioctl_ptr(file, FBIOGET_VSCREENINFO, &mut info)?;
    Ok(info)
}
