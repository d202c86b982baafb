//! Hardware rectangular copies inside the framebuffer.
//!
//! [`RgaBlitter`] decides whether a copy is worth handing to the RGA engine,
//! resolves self-overlapping copies the engine cannot do in one pass, and
//! builds a fresh control block for every transfer it submits.

use crate::backend::{FramebufferRegion, RgaDevice};
use crate::error::{AccelError, AccelResult};
use crate::rga::{PlaneSetup, RGA_MAX_ROWS, RgaFormat, RgaRequest};

/// Below this many bytes (read + written) the engine's fixed setup cost
/// makes a CPU copy faster.
pub const DEFAULT_THRESHOLD_BYTES: u64 = 10240;

/// Row used as the intermediate band for overlap splitting. It lies past
/// the visible screen, inside the second virtual screen.
pub const DEFAULT_SCRATCH_ROW: i32 = 1080;

/// A copy request in pixman `blt` terms. Strides are in 32-bit words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlitRequest {
    pub src_base: usize,
    pub dst_base: usize,
    pub src_stride: i32,
    pub dst_stride: i32,
    pub src_bpp: i32,
    pub dst_bpp: i32,
    pub src_x: i32,
    pub src_y: i32,
    pub dst_x: i32,
    pub dst_y: i32,
    pub width: i32,
    pub height: i32,
}

impl BlitRequest {
    /// Bits read plus bits written.
    pub fn transfer_bits(&self) -> i64 {
        let bpp = i64::from(self.src_bpp) + i64::from(self.dst_bpp);
        i64::from(self.width)
            .saturating_mul(i64::from(self.height))
            .saturating_mul(bpp)
    }

    /// True when the source starts at or above the destination and the two
    /// rectangles intersect. The engine scans top-down, so such a copy would
    /// overwrite rows it has not read yet.
    pub fn overlaps_downward(&self) -> bool {
        let (src_x, src_y) = (i64::from(self.src_x), i64::from(self.src_y));
        let (dst_x, dst_y) = (i64::from(self.dst_x), i64::from(self.dst_y));
        let w = i64::from(self.width);
        let vertical = src_y <= dst_y && src_y + i64::from(self.height) > dst_y;
        let horizontal =
            (src_x >= dst_x && src_x < dst_x + w) || (src_x + w > dst_x && src_x + w <= dst_x + w);
        vertical && horizontal
    }

    /// The two non-overlapping copies that route this one through `row`.
    pub fn split_through_row(&self, row: i32) -> [BlitRequest; 2] {
        let to_scratch = BlitRequest {
            dst_stride: self.src_stride,
            dst_bpp: self.src_bpp,
            dst_x: self.src_x,
            dst_y: row,
            ..*self
        };
        let from_scratch = BlitRequest {
            src_y: row,
            ..*self
        };
        [to_scratch, from_scratch]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    EmptyRect,
    DepthMismatch,
    BelowThreshold,
    OutsideFramebuffer,
    /// Overlapping copy while overlap splitting is disabled.
    OverlapUnsupported,
    NoAccelerator,
}

/// Result of [`Blitter::overlapped_blt`]. Anything but `Succeeded` means
/// the caller has to do the copy in software.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlitOutcome {
    Rejected(RejectReason),
    Failed,
    Succeeded,
}

impl BlitOutcome {
    pub fn is_handled(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Legacy status value: 1 when handled, 0 otherwise.
    pub fn as_status(self) -> i32 {
        i32::from(self.is_handled())
    }
}

pub trait Blitter: Send {
    /// Counterpart of pixman's `blt` that also copes with overlapping
    /// source and destination rectangles.
    fn overlapped_blt(&mut self, request: &BlitRequest) -> BlitOutcome;
}

/// Used when no accelerator is present. Every copy goes to software.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBlitter;

impl Blitter for NullBlitter {
    fn overlapped_blt(&mut self, _request: &BlitRequest) -> BlitOutcome {
        BlitOutcome::Rejected(RejectReason::NoAccelerator)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BlitConfig {
    pub threshold_bytes: u64,
    pub scratch_row: i32,
}

impl Default for BlitConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            scratch_row: DEFAULT_SCRATCH_ROW,
        }
    }
}

pub struct RgaBlitter {
    device: Box<dyn RgaDevice>,
    framebuffer: FramebufferRegion,
    config: BlitConfig,
    split_overlapped: bool,
    /// Fixed fields, copied into every request before the per-transfer
    /// fields are written.
    template: RgaRequest,
}

impl RgaBlitter {
    pub fn new(
        device: Box<dyn RgaDevice>,
        framebuffer: FramebufferRegion,
        config: BlitConfig,
    ) -> Self {
        let split_overlapped = framebuffer.has_offscreen_memory();
        if !split_overlapped {
            log::info!(
                "disabling acceleration for overlapped blits due to insufficient framebuffer space"
            );
        }
        Self {
            device,
            framebuffer,
            config,
            split_overlapped,
            template: RgaRequest::bitblt_template(),
        }
    }

    pub fn splits_overlapped(&self) -> bool {
        self.split_overlapped
    }

    fn check_eligible(&self, request: &BlitRequest) -> Option<RejectReason> {
        if request.width <= 0 || request.height <= 0 {
            return Some(RejectReason::EmptyRect);
        }
        if request.src_bpp != request.dst_bpp {
            return Some(RejectReason::DepthMismatch);
        }
        let threshold_bits = self.config.threshold_bytes.saturating_mul(8);
        if u64::try_from(request.transfer_bits()).unwrap_or(0) < threshold_bits {
            return Some(RejectReason::BelowThreshold);
        }
        // No cache-coherent access outside the framebuffer mapping.
        if request.src_base != self.framebuffer.base || request.dst_base != self.framebuffer.base
        {
            return Some(RejectReason::OutsideFramebuffer);
        }
        None
    }

    fn submit(&mut self, request: &BlitRequest) -> AccelResult<()> {
        let format = RgaFormat::from_bpp(request.src_bpp)?;
        let src = plane_setup(
            format,
            request.src_base,
            request.src_stride,
            request.src_x,
            request.src_y,
            request.width,
            request.height,
        )?;
        let dst = plane_setup(
            format,
            request.dst_base,
            request.dst_stride,
            request.dst_x,
            request.dst_y,
            request.width,
            request.height,
        )?;

        let mut rga = self.template;
        src.apply(&mut rga.src);
        dst.apply(&mut rga.dst);
        self.device
            .blit_sync(&rga)
            .map_err(|source| AccelError::device("RGA_BLIT_SYNC", source))
    }

    fn submit_logged(&mut self, request: &BlitRequest) -> BlitOutcome {
        match self.submit(request) {
            Ok(()) => BlitOutcome::Succeeded,
            Err(err) => {
                log::error!("rga blit failed: {err}");
                BlitOutcome::Failed
            }
        }
    }
}

impl Blitter for RgaBlitter {
    fn overlapped_blt(&mut self, request: &BlitRequest) -> BlitOutcome {
        if let Some(reason) = self.check_eligible(request) {
            return BlitOutcome::Rejected(reason);
        }

        if request.overlaps_downward() {
            if !self.split_overlapped {
                return BlitOutcome::Rejected(RejectReason::OverlapUnsupported);
            }
            for step in request.split_through_row(self.config.scratch_row) {
                if self.submit_logged(&step) != BlitOutcome::Succeeded {
                    return BlitOutcome::Failed;
                }
            }
            return BlitOutcome::Succeeded;
        }

        self.submit_logged(request)
    }
}

/// Keeps the vertical offset inside the engine's row limit by moving the
/// base address down to row `y` when the transfer would cross it.
///
/// The engine takes 32-bit addresses; a plane that does not fit is an
/// error rather than a truncated address.
fn plane_setup(
    format: RgaFormat,
    base: usize,
    stride_words: i32,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) -> AccelResult<PlaneSetup> {
    let base = i64::try_from(base).map_err(|_| AccelError::BufferOverflow)?;
    let (addr, y) = if i64::from(y) + i64::from(height) > i64::from(RGA_MAX_ROWS) {
        let advance = i64::from(y) * i64::from(stride_words) * 4;
        (base.checked_add(advance), 0)
    } else {
        (Some(base), y)
    };
    let addr = addr
        .and_then(|addr| u32::try_from(addr).ok())
        .ok_or(AccelError::BufferOverflow)?;
    Ok(PlaneSetup {
        addr,
        format,
        vir_w: format.virtual_width(stride_words),
        x,
        y,
        width,
        height,
    })
}
