use std::sync::Arc;

use crate::backend::DisplayBackend;
#[cfg(not(target_os = "linux"))]
use crate::backend::{CursorDevice, FramebufferMemory, FramebufferRegion, OverlayDevice, RgaDevice};
use crate::display::DisplayConfig;
#[cfg(not(target_os = "linux"))]
use crate::error::AccelError;
use crate::error::AccelResult;
#[cfg(not(target_os = "linux"))]
use crate::overlay::FbVarScreenInfo;

#[cfg(target_os = "linux")]
pub(crate) mod linux;

#[cfg(not(target_os = "linux"))]
fn unsupported_error() -> AccelError {
    AccelError::Platform(anyhow::anyhow!(
        "display acceleration is only supported on Linux framebuffer devices"
    ))
}

#[cfg(not(target_os = "linux"))]
struct UnsupportedBackend;

#[cfg(not(target_os = "linux"))]
impl DisplayBackend for UnsupportedBackend {
    fn framebuffer(&self) -> AccelResult<FramebufferRegion> {
        Err(unsupported_error())
    }

    fn screen_info(&self) -> AccelResult<FbVarScreenInfo> {
        Err(unsupported_error())
    }

    fn map_framebuffer(&self) -> AccelResult<Box<dyn FramebufferMemory>> {
        Err(unsupported_error())
    }

    fn open_accelerator(&self) -> AccelResult<Box<dyn RgaDevice>> {
        Err(unsupported_error())
    }

    fn open_overlay(&self) -> AccelResult<Box<dyn OverlayDevice>> {
        Err(unsupported_error())
    }

    fn open_cursor(&self) -> AccelResult<Box<dyn CursorDevice>> {
        Err(unsupported_error())
    }
}

#[cfg(target_os = "linux")]
pub(crate) fn build_backend(config: &DisplayConfig) -> AccelResult<Arc<dyn DisplayBackend>> {
    Ok(Arc::new(linux::FbdevBackend::open(config)?))
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn build_backend(_config: &DisplayConfig) -> AccelResult<Arc<dyn DisplayBackend>> {
    Ok(Arc::new(UnsupportedBackend))
}
