//! Planar YUV 4:2:0 surface layout and the offscreen ring the overlay
//! frames are written into.

use crate::error::{AccelError, AccelResult};

pub const FOURCC_YV12: u32 = 0x3231_5659;
pub const FOURCC_I420: u32 = 0x3032_3449;

/// Chroma rows are padded to this many bytes.
pub const STRIDE_ALIGNMENT: u32 = 16;

#[inline]
pub(crate) const fn align_stride(value: u32) -> u32 {
    (value + STRIDE_ALIGNMENT - 1) & !(STRIDE_ALIGNMENT - 1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    /// Y, then U, then V.
    I420,
    /// Y, then V, then U.
    Yv12,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 2] = [ImageFormat::Yv12, ImageFormat::I420];

    pub fn from_fourcc(fourcc: u32) -> AccelResult<Self> {
        match fourcc {
            FOURCC_I420 => Ok(Self::I420),
            FOURCC_YV12 => Ok(Self::Yv12),
            other => Err(AccelError::UnsupportedFormat(format!("fourcc {other:#010x}"))),
        }
    }

    pub const fn fourcc(self) -> u32 {
        match self {
            Self::I420 => FOURCC_I420,
            Self::Yv12 => FOURCC_YV12,
        }
    }
}

/// Strides, plane offsets and total size of one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceLayout {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub y_stride: u32,
    pub uv_stride: u32,
    pub size: usize,
    pub y_offset: usize,
    pub u_offset: usize,
    pub v_offset: usize,
}

impl SurfaceLayout {
    /// Layout for a frame of exactly `width` x `height`.
    pub fn new(format: ImageFormat, width: u32, height: u32) -> Self {
        let uv_stride = align_stride(width >> 1);
        let y_stride = uv_stride * 2;
        let luma_size = y_stride as usize * height as usize;
        let chroma_plane_size = uv_stride as usize * (height >> 1) as usize;
        // Both chroma planes together take one uv_stride * height area.
        let size = luma_size + uv_stride as usize * height as usize;

        let (u_offset, v_offset) = match format {
            ImageFormat::I420 => (luma_size, luma_size + chroma_plane_size),
            ImageFormat::Yv12 => (luma_size + chroma_plane_size, luma_size),
        };

        Self {
            format,
            width,
            height,
            y_stride,
            uv_stride,
            size,
            y_offset: 0,
            u_offset,
            v_offset,
        }
    }

    /// Pitches in memory plane order.
    pub fn pitches(&self) -> [u32; 3] {
        [self.y_stride, self.uv_stride, self.uv_stride]
    }

    /// Plane offsets in memory order (Y first, then whichever chroma plane
    /// the format stores first).
    pub fn plane_offsets(&self) -> [usize; 3] {
        match self.format {
            ImageFormat::I420 => [self.y_offset, self.u_offset, self.v_offset],
            ImageFormat::Yv12 => [self.y_offset, self.v_offset, self.u_offset],
        }
    }
}

/// Layout the client should allocate for a `width` x `height` image.
/// Both dimensions are rounded up to even.
pub fn query_layout(format: ImageFormat, width: u32, height: u32) -> SurfaceLayout {
    SurfaceLayout::new(format, (width + 1) & !1, (height + 1) & !1)
}

/// A frame placed in framebuffer memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlaySurface {
    pub layout: SurfaceLayout,
    /// Offset of the frame inside the framebuffer.
    pub device_offset: usize,
}

impl OverlaySurface {
    pub fn new(layout: SurfaceLayout, device_offset: usize) -> Self {
        Self {
            layout,
            device_offset,
        }
    }

    /// Y, U and V plane offsets relative to the framebuffer start.
    pub fn framebuffer_offsets(&self) -> AccelResult<[u32; 3]> {
        let to_device = |plane: usize| {
            plane
                .checked_add(self.device_offset)
                .and_then(|offset| u32::try_from(offset).ok())
                .ok_or(AccelError::BufferOverflow)
        };
        Ok([
            to_device(self.layout.y_offset)?,
            to_device(self.layout.u_offset)?,
            to_device(self.layout.v_offset)?,
        ])
    }
}

/// Hands out framebuffer offsets for successive overlay frames.
///
/// Frames live past the visible graphics surface. With double buffering
/// each displayed frame moves the offset forward so the next frame never
/// lands on the one being scanned out; the offset wraps back to the start
/// of the offscreen area when the next frame would not fit.
#[derive(Clone, Debug)]
pub struct SurfaceAllocator {
    start: usize,
    total: usize,
    offset: usize,
    double_buffering: bool,
}

impl SurfaceAllocator {
    pub fn new(visible_len: usize, total_len: usize, double_buffering: bool) -> Self {
        Self {
            start: visible_len,
            total: total_len,
            offset: visible_len,
            double_buffering,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn double_buffering(&self) -> bool {
        self.double_buffering
    }

    fn fits(&self, frame_size: usize) -> bool {
        self.offset
            .checked_add(frame_size)
            .is_some_and(|end| end <= self.total)
    }

    /// Offset at which the next frame of `frame_size` bytes goes.
    pub fn reserve(&mut self, frame_size: usize) -> AccelResult<usize> {
        if self.double_buffering && (self.offset < self.start || !self.fits(frame_size)) {
            self.offset = self.start;
        }
        if !self.fits(frame_size) {
            return Err(AccelError::LimitExceeded);
        }
        Ok(self.offset)
    }

    /// Called once the frame at the current offset is on screen.
    pub fn advance(&mut self, frame_size: usize) {
        if self.double_buffering {
            self.offset = self.offset.saturating_add(frame_size);
        }
    }

    /// Back to the first offscreen byte. Only done when the display device
    /// is re-initialized.
    pub fn reset(&mut self) {
        self.offset = self.start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yv12_dvd_frame_layout() {
        let layout = query_layout(ImageFormat::Yv12, 720, 480);
        assert_eq!((layout.width, layout.height), (720, 480));
        assert_eq!(layout.uv_stride, 368);
        assert_eq!(layout.y_stride, 736);
        assert_eq!(layout.size, 736 * 480 + 368 * 480);
        assert_eq!(layout.y_offset, 0);
        assert_eq!(layout.v_offset, 353_280);
        assert_eq!(layout.u_offset, 353_280 + 368 * 240);
        assert_eq!(layout.plane_offsets(), [0, 353_280, 441_600]);
        assert_eq!(layout.pitches(), [736, 368, 368]);
    }

    #[test]
    fn i420_places_u_before_v() {
        let layout = query_layout(ImageFormat::I420, 640, 360);
        assert_eq!(layout.uv_stride, 320);
        assert_eq!(layout.y_stride, 640);
        assert_eq!(layout.u_offset, 640 * 360);
        assert_eq!(layout.v_offset, 640 * 360 + 320 * 180);
        assert_eq!(layout.size, 640 * 360 + 320 * 360);
    }

    #[test]
    fn odd_dimensions_round_up_to_even() {
        let layout = query_layout(ImageFormat::I420, 721, 481);
        assert_eq!((layout.width, layout.height), (722, 482));
        assert_eq!(layout.uv_stride, 368);
        assert_eq!(layout.y_stride, 736);
    }

    #[test]
    fn layout_query_is_idempotent() {
        for format in ImageFormat::ALL {
            assert_eq!(
                query_layout(format, 1279, 719),
                query_layout(format, 1279, 719)
            );
        }
    }

    #[test]
    fn fourcc_round_trips_and_rejects_unknown_codes() -> AccelResult<()> {
        assert_eq!(ImageFormat::from_fourcc(FOURCC_YV12)?, ImageFormat::Yv12);
        assert_eq!(ImageFormat::from_fourcc(FOURCC_I420)?, ImageFormat::I420);
        let yuy2 = 0x3259_5559;
        assert!(matches!(
            ImageFormat::from_fourcc(yuy2),
            Err(AccelError::UnsupportedFormat(_))
        ));
        Ok(())
    }

    #[test]
    fn surface_offsets_are_shifted_into_the_framebuffer() -> AccelResult<()> {
        let surface = OverlaySurface::new(query_layout(ImageFormat::Yv12, 720, 480), 0x100_0000);
        let [y, u, v] = surface.framebuffer_offsets()?;
        assert_eq!(y, 0x100_0000);
        assert_eq!(v, 0x100_0000 + 353_280);
        assert_eq!(u, 0x100_0000 + 441_600);
        Ok(())
    }

    #[test]
    fn allocator_starts_past_the_visible_surface() -> AccelResult<()> {
        let mut allocator = SurfaceAllocator::new(1000, 3000, true);
        assert_eq!(allocator.offset(), 1000);
        assert_eq!(allocator.reserve(800)?, 1000);
        allocator.advance(800);
        assert_eq!(allocator.reserve(800)?, 1800);
        allocator.advance(800);
        // 2600 + 800 would overrun, so the ring wraps.
        assert_eq!(allocator.reserve(800)?, 1000);
        Ok(())
    }

    #[test]
    fn allocator_fails_when_frame_cannot_fit_after_wrapping() {
        let mut allocator = SurfaceAllocator::new(1000, 3000, true);
        assert!(matches!(
            allocator.reserve(2001),
            Err(AccelError::LimitExceeded)
        ));
        assert_eq!(allocator.offset(), 1000);
    }

    #[test]
    fn allocator_without_double_buffering_never_moves() -> AccelResult<()> {
        let mut allocator = SurfaceAllocator::new(1000, 3000, false);
        assert_eq!(allocator.reserve(800)?, 1000);
        allocator.advance(800);
        assert_eq!(allocator.reserve(800)?, 1000);
        assert!(allocator.reserve(2500).is_err());
        Ok(())
    }
}
