use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{self, DisplayBackend, FramebufferRegion};
use crate::blit::{
    BlitConfig, BlitOutcome, BlitRequest, Blitter, DEFAULT_SCRATCH_ROW, DEFAULT_THRESHOLD_BYTES,
    NullBlitter, RgaBlitter,
};
use crate::cursor::HwCursor;
use crate::env_config::{self, define_env_flag};
use crate::error::{AccelError, AccelResult};
use crate::overlay::RkOverlay;
use crate::xvideo::{ColorChannels, XvPort};

pub const DEFAULT_FB_DEVICE: &str = "/dev/fb0";
pub const DEFAULT_RGA_DEVICE: &str = "/dev/rga";

const FB_DEVICE_ENV: &str = "RKDISP_FB_DEVICE";
const RGA_DEVICE_ENV: &str = "RKDISP_RGA_DEVICE";
const BLIT_THRESHOLD_ENV: &str = "RKDISP_BLIT_THRESHOLD";

define_env_flag!(enabled_unless(rga_enabled_by_env, "RKDISP_DISABLE_RGA"));
define_env_flag!(enabled_unless(xv_enabled_by_env, "RKDISP_DISABLE_XV"));
define_env_flag!(enabled_unless(
    hw_cursor_enabled_by_env,
    "RKDISP_DISABLE_HWCURSOR"
));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Graphics framebuffer. The overlay window is the next node.
    pub fb_device: PathBuf,
    pub rga_device: PathBuf,
    /// Copies moving fewer bytes than this stay on the CPU.
    pub blit_threshold_bytes: u64,
    /// Offscreen row used to bounce overlapping copies.
    pub scratch_row: i32,
    pub enable_rga: bool,
    pub enable_overlay: bool,
    pub enable_hw_cursor: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fb_device: PathBuf::from(DEFAULT_FB_DEVICE),
            rga_device: PathBuf::from(DEFAULT_RGA_DEVICE),
            blit_threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            scratch_row: DEFAULT_SCRATCH_ROW,
            enable_rga: true,
            enable_overlay: true,
            enable_hw_cursor: true,
        }
    }
}

impl DisplayConfig {
    /// Defaults with `RKDISP_*` environment overrides applied.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fb_device: env_config::env_var_string(FB_DEVICE_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.fb_device),
            rga_device: env_config::env_var_string(RGA_DEVICE_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.rga_device),
            blit_threshold_bytes: env_config::env_var_positive_u64(BLIT_THRESHOLD_ENV)
                .unwrap_or(defaults.blit_threshold_bytes),
            scratch_row: defaults.scratch_row,
            enable_rga: rga_enabled_by_env(),
            enable_overlay: xv_enabled_by_env(),
            enable_hw_cursor: hw_cursor_enabled_by_env(),
        }
    }

    /// Overlay window paired with the graphics framebuffer.
    pub fn overlay_device(&self) -> AccelResult<PathBuf> {
        overlay_device_for(&self.fb_device)
    }

    pub fn blit_config(&self) -> BlitConfig {
        BlitConfig {
            threshold_bytes: self.blit_threshold_bytes,
            scratch_row: self.scratch_row,
        }
    }
}

fn overlay_device_for(fb_device: &Path) -> AccelResult<PathBuf> {
    match fb_device.to_str() {
        Some("/dev/fb0") => Ok(PathBuf::from("/dev/fb1")),
        Some("/dev/fb2") => Ok(PathBuf::from("/dev/fb3")),
        _ => Err(AccelError::InvalidConfig(format!(
            "no overlay window is paired with {}",
            fb_device.display()
        ))),
    }
}

pub struct DisplayAccelBuilder {
    backend_override: Option<Arc<dyn DisplayBackend>>,
    framebuffer_base: Option<usize>,
    config: DisplayConfig,
}

impl DisplayAccelBuilder {
    pub fn new() -> Self {
        Self {
            backend_override: None,
            framebuffer_base: None,
            config: DisplayConfig::from_env(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn DisplayBackend>) -> Self {
        self.backend_override = Some(backend);
        self
    }

    /// Replaces the whole configuration, environment overrides included.
    pub fn with_config(mut self, config: DisplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Address of the caller's own mapping of the framebuffer. Blit
    /// requests are matched against it instead of the backend's mapping,
    /// which stays private to the overlay.
    pub fn framebuffer_base(mut self, base: usize) -> Self {
        self.framebuffer_base = Some(base);
        self
    }

    pub fn fb_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.fb_device = path.into();
        self
    }

    pub fn rga_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rga_device = path.into();
        self
    }

    pub fn blit_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.blit_threshold_bytes = bytes;
        self
    }

    pub fn scratch_row(mut self, row: i32) -> Self {
        self.config.scratch_row = row;
        self
    }

    pub fn enable_rga(mut self, enabled: bool) -> Self {
        self.config.enable_rga = enabled;
        self
    }

    pub fn enable_overlay(mut self, enabled: bool) -> Self {
        self.config.enable_overlay = enabled;
        self
    }

    pub fn enable_hw_cursor(mut self, enabled: bool) -> Self {
        self.config.enable_hw_cursor = enabled;
        self
    }

    /// Probes every enabled unit. Only a missing framebuffer is fatal; a
    /// unit that fails to come up is logged and left out.
    pub fn build(self) -> AccelResult<DisplayAccel> {
        let config = self.config;
        let backend = match self.backend_override {
            Some(b) => b,
            None => backend::default_backend(&config)?,
        };
        let framebuffer = backend.framebuffer()?;
        let host_framebuffer = match self.framebuffer_base {
            Some(base) => {
                log::debug!("blits match the host framebuffer mapping at {base:#x}");
                FramebufferRegion { base, ..framebuffer }
            }
            None => framebuffer,
        };

        let blitter = open_blitter(backend.as_ref(), &config, host_framebuffer);
        let xv_port = if config.enable_overlay {
            open_xv_port(backend.as_ref(), framebuffer)
                .inspect_err(|err| log::warn!("xvideo overlay disabled: {err}"))
                .ok()
        } else {
            None
        };
        if xv_port.is_some() {
            crate::convert::warmup();
        }
        let cursor = if config.enable_hw_cursor {
            backend
                .open_cursor()
                .and_then(HwCursor::new)
                .inspect_err(|err| log::info!("hardware cursor disabled: {err}"))
                .ok()
        } else {
            None
        };

        Ok(DisplayAccel {
            config,
            framebuffer: host_framebuffer,
            blitter,
            xv_port,
            cursor,
        })
    }
}

impl Default for DisplayAccelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn open_blitter(
    backend: &dyn DisplayBackend,
    config: &DisplayConfig,
    framebuffer: FramebufferRegion,
) -> Box<dyn Blitter> {
    if !config.enable_rga {
        return Box::new(NullBlitter);
    }
    match backend.open_accelerator() {
        Ok(device) => {
            log::info!("enabled RGA 2D acceleration");
            Box::new(RgaBlitter::new(device, framebuffer, config.blit_config()))
        }
        Err(err) => {
            log::info!(
                "{} not usable, RGA acceleration disabled: {err}",
                config.rga_device.display()
            );
            Box::new(NullBlitter)
        }
    }
}

fn open_xv_port(backend: &dyn DisplayBackend, framebuffer: FramebufferRegion) -> AccelResult<XvPort> {
    let channels = ColorChannels::from_screen_info(&backend.screen_info()?);
    let overlay = RkOverlay::new(
        backend.open_overlay()?,
        backend.map_framebuffer()?,
        framebuffer,
    )?;
    Ok(XvPort::new(Box::new(overlay), channels))
}

/// Everything the display hardware can take off the CPU for one
/// framebuffer.
pub struct DisplayAccel {
    config: DisplayConfig,
    framebuffer: FramebufferRegion,
    blitter: Box<dyn Blitter>,
    xv_port: Option<XvPort>,
    cursor: Option<HwCursor>,
}

impl DisplayAccel {
    pub fn builder() -> DisplayAccelBuilder {
        DisplayAccelBuilder::new()
    }

    pub fn new() -> AccelResult<Self> {
        Self::builder().build()
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn framebuffer(&self) -> FramebufferRegion {
        self.framebuffer
    }

    pub fn overlapped_blt(&mut self, request: &BlitRequest) -> BlitOutcome {
        self.blitter.overlapped_blt(request)
    }

    pub fn blitter_mut(&mut self) -> &mut dyn Blitter {
        self.blitter.as_mut()
    }

    pub fn xv_port_mut(&mut self) -> Option<&mut XvPort> {
        self.xv_port.as_mut()
    }

    pub fn cursor_mut(&mut self) -> Option<&mut HwCursor> {
        self.cursor.as_mut()
    }

    pub fn has_overlay(&self) -> bool {
        self.xv_port.is_some()
    }

    pub fn has_hw_cursor(&self) -> bool {
        self.cursor.is_some()
    }
}
