//! Control block for the Rockchip RGA 2D engine (`RGA_BLIT_SYNC`).
//!
//! The layout mirrors the kernel's `struct rga_req` (212 bytes on 32-bit
//! ARM). Only a handful of fields change between blits; everything else is
//! filled in once by [`RgaRequest::bitblt_template`].

use crate::error::{AccelError, AccelResult};

pub const RGA_BLIT_SYNC: u32 = 0x5017;

/// The engine addresses at most this many rows (and columns).
pub const RGA_MAX_ROWS: i32 = 2048;
pub const RGA_XMAX: u16 = 2048;
pub const RGA_YMAX: u16 = 2048;

const RENDER_MODE_BITBLT: u8 = 0;
const ROTATE_MODE_NONE: u8 = 0;
const MMU_FLAG_DEFAULT: u32 = 0x21;
/// 1.0 in the engine's 16.16 fixed point.
const COS_IDENTITY: i32 = 65536;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum RgaFormat {
    Rgba8888 = 0x0,
    Rgb888 = 0x2,
    Rgb565 = 0x4,
}

impl RgaFormat {
    pub fn from_bpp(bpp: i32) -> AccelResult<Self> {
        match bpp {
            16 => Ok(Self::Rgb565),
            24 => Ok(Self::Rgb888),
            32 => Ok(Self::Rgba8888),
            other => Err(AccelError::UnsupportedFormat(format!("{other} bpp"))),
        }
    }

    /// Converts a stride in 32-bit words into the engine's virtual width
    /// in pixels.
    pub fn virtual_width(self, stride_words: i32) -> u16 {
        let pixels = match self {
            Self::Rgb565 => stride_words * 2,
            Self::Rgb888 => stride_words * 4 / 3,
            Self::Rgba8888 => stride_words,
        };
        pixels as u16
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgaImageInfo {
    pub yrgb_addr: u32,
    pub uv_addr: u32,
    pub v_addr: u32,
    pub format: u32,
    pub act_w: u16,
    pub act_h: u16,
    pub x_offset: u16,
    pub y_offset: u16,
    pub vir_w: u16,
    pub vir_h: u16,
    pub endian_mode: u16,
    pub alpha_swap: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgaRect {
    pub xmin: u16,
    pub xmax: u16,
    pub ymin: u16,
    pub ymax: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgaPoint {
    pub x: u16,
    pub y: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgaLineDraw {
    pub start_point: RgaPoint,
    pub end_point: RgaPoint,
    pub color: u32,
    pub flag: u32,
    pub line_width: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgaColorFill {
    pub gr_x_a: i16,
    pub gr_y_a: i16,
    pub gr_x_b: i16,
    pub gr_y_b: i16,
    pub gr_x_g: i16,
    pub gr_y_g: i16,
    pub gr_x_r: i16,
    pub gr_y_r: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgaFading {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub res: u8,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgaMmu {
    pub mmu_en: u8,
    pub base_addr: u32,
    pub mmu_flag: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgaRequest {
    pub render_mode: u8,
    pub src: RgaImageInfo,
    pub dst: RgaImageInfo,
    pub pat: RgaImageInfo,
    pub rop_mask_addr: u32,
    pub lut_addr: u32,
    pub clip: RgaRect,
    pub sina: i32,
    pub cosa: i32,
    pub alpha_rop_flag: u16,
    pub scale_mode: u8,
    pub color_key_max: u32,
    pub color_key_min: u32,
    pub fg_color: u32,
    pub bg_color: u32,
    pub gr_color: RgaColorFill,
    pub line_draw_info: RgaLineDraw,
    pub fading: RgaFading,
    pub pd_mode: u8,
    pub alpha_global_value: u8,
    pub rop_code: u16,
    pub bsfilter_flag: u8,
    pub palette_mode: u8,
    pub yuv2rgb_mode: u8,
    pub endian_mode: u8,
    pub rotate_mode: u8,
    pub color_fill_mode: u8,
    pub mmu_info: RgaMmu,
    pub alpha_rop_mode: u8,
    pub src_trans_mode: u8,
}

impl RgaRequest {
    /// Request with every fixed field of a plain framebuffer blit set.
    pub fn bitblt_template() -> Self {
        let mut req = Self {
            render_mode: RENDER_MODE_BITBLT,
            rotate_mode: ROTATE_MODE_NONE,
            clip: RgaRect {
                xmin: 0,
                xmax: RGA_XMAX,
                ymin: 0,
                ymax: RGA_YMAX,
            },
            sina: 0,
            cosa: COS_IDENTITY,
            alpha_rop_flag: 0,
            pd_mode: 1,
            src_trans_mode: 0,
            mmu_info: RgaMmu {
                mmu_en: 1,
                base_addr: 0,
                mmu_flag: MMU_FLAG_DEFAULT,
            },
            ..Default::default()
        };
        req.src.endian_mode = 1;
        req.dst.endian_mode = 1;
        req
    }
}

/// Per-transfer fields of one side (source or destination) of a blit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneSetup {
    pub addr: u32,
    pub format: RgaFormat,
    pub vir_w: u16,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PlaneSetup {
    pub(crate) fn apply(&self, info: &mut RgaImageInfo) {
        info.yrgb_addr = self.addr;
        info.format = self.format as u32;
        info.vir_w = self.vir_w;
        info.act_w = self.width as u16;
        info.act_h = self.height as u16;
        info.x_offset = self.x as u16;
        info.y_offset = self.y as u16;
        info.vir_h = (self.y + self.height) as u16;
    }
}
