//! Offloads framebuffer work on Rockchip SoCs to dedicated display
//! hardware: rectangular copies to the RGA 2D engine, planar YUV video to
//! the LCDC overlay window, and the pointer to the hardware cursor.

pub mod backend;
pub mod blit;
pub mod convert;
pub mod cursor;
pub mod display;
pub(crate) mod env_config;
pub mod error;
pub mod overlay;
mod platform;
pub mod region;
pub mod rga;
pub mod surface;
pub mod xvideo;

pub use backend::{DisplayBackend, FramebufferRegion};
pub use blit::{BlitOutcome, BlitRequest, Blitter, NullBlitter, RejectReason, RgaBlitter};
pub use cursor::HwCursor;
pub use display::{DisplayAccel, DisplayAccelBuilder, DisplayConfig};
pub use error::{AccelError, AccelErrorClass, AccelResult};
pub use overlay::{OverlayFlags, RkOverlay, VideoOverlay};
pub use region::{OverlayPlacement, OverlayRect, clip};
pub use surface::{ImageFormat, SurfaceAllocator, SurfaceLayout, query_layout};
pub use xvideo::{ClipBox, ColorKeyFill, PutImage, XvPort};
