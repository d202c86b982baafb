mod devices;
mod ioctl;
mod mapping;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use devices::{CursorNode, OverlayNode, RgaNode, read_var_screeninfo};
use ioctl::{FBIOGET_PHYMEMINFO, RkFbMemInfo, ioctl_ptr};
use mapping::{FbMapping, FbMemoryView};

use crate::backend::{
    CursorDevice, DisplayBackend, FramebufferMemory, FramebufferRegion, OverlayDevice, RgaDevice,
};
use crate::display::DisplayConfig;
use crate::error::{AccelError, AccelResult};
use crate::overlay::FbVarScreenInfo;

fn open_rw(path: &Path) -> AccelResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|err| AccelError::DeviceUnavailable(format!("{}: {err}", path.display())))
}

/// Rockchip LCDC framebuffer pair plus the RGA node.
pub(crate) struct FbdevBackend {
    fb: File,
    overlay_device: PathBuf,
    rga_device: PathBuf,
    screen_info: FbVarScreenInfo,
    region: FramebufferRegion,
    mapping: Arc<FbMapping>,
    mapping_taken: AtomicBool,
}

impl FbdevBackend {
    pub(crate) fn open(config: &DisplayConfig) -> AccelResult<Self> {
        let fb = open_rw(&config.fb_device)?;

        let mut mem_info = RkFbMemInfo::default();
        ioctl_ptr(&fb, FBIOGET_PHYMEMINFO, &mut mem_info).map_err(|source| {
            log::info!(
                "failed to get the framebuffer's physical memory information, probably not Rockchip hardware"
            );
            AccelError::device("FBIOGET_PHYMEMINFO", source)
        })?;

        let overlay_device = config.overlay_device().inspect_err(|_| {
            log::info!("unknown framebuffer device {}", config.fb_device.display());
        })?;

        let screen_info = read_var_screeninfo(&fb).map_err(|source| {
            log::info!("failed to fetch screen info");
            AccelError::device("FBIOGET_VSCREENINFO", source)
        })?;

        let mapping =
            FbMapping::map(&fb, mem_info.len as usize).map_err(AccelError::Platform)?;
        let region = FramebufferRegion::from_screen_info(
            mapping.base(),
            mem_info.yrgb,
            mapping.len(),
            &screen_info,
        );
        log::debug!(
            "framebuffer {}: {}x{} at {:#010x}, {} bytes, {} offscreen",
            config.fb_device.display(),
            region.screen_width,
            region.screen_height,
            region.phys_addr,
            region.total_len,
            region.offscreen_len()
        );

        Ok(Self {
            fb,
            overlay_device,
            rga_device: config.rga_device.clone(),
            screen_info,
            region,
            mapping: Arc::new(mapping),
            mapping_taken: AtomicBool::new(false),
        })
    }
}

impl DisplayBackend for FbdevBackend {
    fn framebuffer(&self) -> AccelResult<FramebufferRegion> {
        Ok(self.region)
    }

    fn screen_info(&self) -> AccelResult<FbVarScreenInfo> {
        Ok(self.screen_info)
    }

    fn map_framebuffer(&self) -> AccelResult<Box<dyn FramebufferMemory>> {
        if self.mapping_taken.swap(true, Ordering::AcqRel) {
            return Err(AccelError::DeviceUnavailable(
                "framebuffer mapping already handed out".to_string(),
            ));
        }
        Ok(Box::new(FbMemoryView::new(Arc::clone(&self.mapping))))
    }

    fn open_accelerator(&self) -> AccelResult<Box<dyn RgaDevice>> {
        Ok(Box::new(RgaNode::new(open_rw(&self.rga_device)?)))
    }

    fn open_overlay(&self) -> AccelResult<Box<dyn OverlayDevice>> {
        let overlay = open_rw(&self.overlay_device).inspect_err(|err| {
            log::info!("failed to open the overlay device: {err}");
        })?;
        let graphics = self
            .fb
            .try_clone()
            .map_err(|err| AccelError::DeviceUnavailable(format!("framebuffer: {err}")))?;
        Ok(Box::new(OverlayNode::new(overlay, graphics)))
    }

    fn open_cursor(&self) -> AccelResult<Box<dyn CursorDevice>> {
        let file = self
            .fb
            .try_clone()
            .map_err(|err| AccelError::DeviceUnavailable(format!("framebuffer: {err}")))?;
        Ok(Box::new(CursorNode::new(file)))
    }
}
