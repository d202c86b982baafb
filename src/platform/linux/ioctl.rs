//! Request numbers and argument layouts of the fbdev, Rockchip LCDC and
//! RGA ioctls.

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

pub(crate) const FBIOGET_VSCREENINFO: libc::c_ulong = 0x4600;
pub(crate) const FBIOPUT_VSCREENINFO: libc::c_ulong = 0x4601;

pub(crate) const RK_FBIOSET_YUV_ADDR: libc::c_ulong = 0x5002;
pub(crate) const RK_FBIOSET_OVERLAY_STATE: libc::c_ulong = 0x5018;
pub(crate) const RK_FBIOSET_ENABLE: libc::c_ulong = 0x5019;
pub(crate) const RK_FBIOSET_CONFIG_DONE: libc::c_ulong = 0x4628;

pub(crate) const FBIOPUT_SET_CURSOR_EN: libc::c_ulong = 0x4609;
pub(crate) const FBIOPUT_SET_CURSOR_IMG: libc::c_ulong = 0x460a;
pub(crate) const FBIOPUT_SET_CURSOR_POS: libc::c_ulong = 0x460b;
pub(crate) const FBIOPUT_SET_CURSOR_CMAP: libc::c_ulong = 0x460c;

pub(crate) const FBIOGET_PHYMEMINFO: libc::c_ulong = 0x461d;
pub(crate) const FBIOPUT_SET_COLOR_KEY: libc::c_ulong = 0x461f;

pub(crate) const RGA_BLIT_SYNC: libc::c_ulong = crate::rga::RGA_BLIT_SYNC as libc::c_ulong;

/// Kernel `struct rk_fb_mem_inf`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RkFbMemInfo {
    pub yrgb: u32,
    pub cbr: u32,
    pub len: u32,
}

/// Kernel `struct fb_cmap`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct FbCmap {
    pub start: u32,
    pub len: u32,
    pub red: *mut u16,
    pub green: *mut u16,
    pub blue: *mut u16,
    pub transp: *mut u16,
}

/// Kernel `struct fb_image`. The cursor color ioctl only reads the two
/// color fields.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct FbImage {
    pub dx: u32,
    pub dy: u32,
    pub width: u32,
    pub height: u32,
    pub fg_color: u32,
    pub bg_color: u32,
    pub depth: u8,
    pub data: *const u8,
    pub cmap: FbCmap,
}

impl FbImage {
    pub(crate) fn colors(bg: u32, fg: u32) -> Self {
        Self {
            dx: 0,
            dy: 0,
            width: 0,
            height: 0,
            fg_color: fg,
            bg_color: bg,
            depth: 0,
            data: std::ptr::null(),
            cmap: FbCmap {
                start: 0,
                len: 0,
                red: std::ptr::null_mut(),
                green: std::ptr::null_mut(),
                blue: std::ptr::null_mut(),
                transp: std::ptr::null_mut(),
            },
        }
    }
}

/// Issues `request` on `file` with a pointer to `arg`.
pub(crate) fn ioctl_ptr<T>(file: &File, request: libc::c_ulong, arg: &mut T) -> io::Result<()> {
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), request as _, arg as *mut T) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Boolean switches are passed as a pointer to `int`.
pub(crate) fn ioctl_int(file: &File, request: libc::c_ulong, value: i32) -> io::Result<()> {
    let mut value: libc::c_int = value;
    ioctl_ptr(file, request, &mut value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::CursorPosition;
    use crate::overlay::FbVarScreenInfo;

    #[test]
    fn argument_layouts_match_the_kernel() {
        assert_eq!(std::mem::size_of::<FbVarScreenInfo>(), 160);
        assert_eq!(std::mem::size_of::<RkFbMemInfo>(), 12);
        assert_eq!(std::mem::size_of::<CursorPosition>(), 4);
    }

    #[test]
    fn ioctl_on_a_non_framebuffer_fails() -> io::Result<()> {
        let file = File::open("/dev/null")?;
        let mut info = FbVarScreenInfo::default();
        assert!(ioctl_ptr(&file, FBIOGET_VSCREENINFO, &mut info).is_err());
        Ok(())
    }
}
