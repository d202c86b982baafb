//! Xv port adaptor.
//!
//! Sits between an X video client and a [`VideoOverlay`]: lays out the
//! client's planar frame, finds it a home in offscreen framebuffer memory,
//! clips the placement to the screen and drives the overlay. It also owns
//! the color key and reports which clip boxes need repainting with it.

use crate::error::{AccelError, AccelResult};
use crate::overlay::{FbVarScreenInfo, InputParams, OverlayFlags, VideoOverlay};
use crate::region::{OverlayPlacement, clip};
use crate::surface::{
    ImageFormat, OverlaySurface, SurfaceAllocator, SurfaceLayout, align_stride, query_layout,
};

pub const XV_COLORKEY: &str = "XV_COLORKEY";

pub const DEFAULT_COLOR_KEY: u32 = 0x08_1018;

/// Settable and gettable port attribute with its accepted range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortAttribute {
    pub name: &'static str,
    pub min: i32,
    pub max: i32,
}

pub static PORT_ATTRIBUTES: [PortAttribute; 1] = [PortAttribute {
    name: XV_COLORKEY,
    min: 0,
    max: (1 << 24) - 1,
}];

/// The color key value and whether the device currently has it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorKeyState {
    pub key: u32,
    pub applied: bool,
}

impl Default for ColorKeyState {
    fn default() -> Self {
        Self {
            key: DEFAULT_COLOR_KEY,
            applied: false,
        }
    }
}

/// Screen-space box, `x2`/`y2` exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl ClipBox {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Bit widths and positions of the graphics plane's color channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorChannels {
    pub weights: [u32; 3],
    pub offsets: [u32; 3],
}

impl ColorChannels {
    pub const RGB565: Self = Self {
        weights: [5, 6, 5],
        offsets: [11, 5, 0],
    };

    pub const XRGB8888: Self = Self {
        weights: [8, 8, 8],
        offsets: [16, 8, 0],
    };

    pub fn from_screen_info(info: &FbVarScreenInfo) -> Self {
        Self {
            weights: [info.red.length, info.green.length, info.blue.length],
            offsets: [info.red.offset, info.green.offset, info.blue.offset],
        }
    }

    /// Converts a `0xRRGGBB` color into a pixel of this layout.
    pub fn convert_color(&self, color: u32) -> u32 {
        let components = [(color >> 16) & 0xFF, (color >> 8) & 0xFF, color & 0xFF];
        components
            .iter()
            .zip(self.weights)
            .zip(self.offsets)
            .map(|((&component, weight), offset)| {
                let value = component.checked_shr(8u32.saturating_sub(weight)).unwrap_or(0);
                value.checked_shl(offset).unwrap_or(0)
            })
            .fold(0, |pixel, channel| pixel | channel)
    }
}

/// Boxes the caller should paint with `pixel` so the overlay shows through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorKeyFill {
    pub pixel: u32,
    pub boxes: Vec<ClipBox>,
}

/// One `PutImage` request.
#[derive(Clone, Copy, Debug)]
pub struct PutImage<'a> {
    pub placement: OverlayPlacement,
    pub fourcc: u32,
    /// Planar client frame, at least one layout size long.
    pub buf: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub clip_boxes: &'a [ClipBox],
}

/// The single port of the overlay adaptor.
pub struct XvPort {
    overlay: Box<dyn VideoOverlay>,
    allocator: SurfaceAllocator,
    color_key: ColorKeyState,
    clip_boxes: Vec<ClipBox>,
    channels: ColorChannels,
}

impl XvPort {
    pub fn new(overlay: Box<dyn VideoOverlay>, channels: ColorChannels) -> Self {
        let allocator = SurfaceAllocator::new(
            overlay.visible_fb_size(),
            overlay.total_fb_size(),
            overlay.flags().contains(OverlayFlags::DOUBLE_BUFFERING),
        );
        Self {
            overlay,
            allocator,
            color_key: ColorKeyState::default(),
            clip_boxes: Vec::new(),
            channels,
        }
    }

    pub fn color_key(&self) -> ColorKeyState {
        self.color_key
    }

    pub fn frame_offset(&self) -> usize {
        self.allocator.offset()
    }

    /// Shows one client frame.
    ///
    /// A placement that ends up entirely off-screen succeeds without
    /// touching the overlay. The returned fill, if any, lists the clip boxes
    /// that changed since the previous frame.
    pub fn put_image(&mut self, request: &PutImage<'_>) -> AccelResult<Option<ColorKeyFill>> {
        let format = ImageFormat::from_fourcc(request.fourcc)?;
        let layout = SurfaceLayout::new(format, request.width, request.height);
        let offset = self.allocator.reserve(layout.size)?;
        let [y_offset, u_offset, v_offset] =
            OverlaySurface::new(layout, offset).framebuffer_offsets()?;

        let Some(placement) = clip(
            request.placement,
            self.overlay.screen_width(),
            self.overlay.screen_height(),
        ) else {
            return Ok(None);
        };

        let frame = request
            .buf
            .get(..layout.size)
            .ok_or(AccelError::BufferOverflow)?;
        self.overlay.copy_buffer(offset, frame, format)?;

        if !self.color_key.applied {
            self.overlay.set_colorkey(self.color_key.key)?;
            self.color_key.applied = true;
        }
        self.overlay
            .set_yuv420_input_buffer(y_offset, u_offset, v_offset)?;
        self.overlay
            .set_input_par(input_params(placement, layout.y_stride))?;
        self.overlay.set_output_window(placement.drawing)?;
        self.overlay.show_window()?;
        self.allocator.advance(layout.size);

        Ok(self.update_clip_boxes(request.clip_boxes))
    }

    /// Moves or rescales the frame already in framebuffer memory.
    pub fn reput_image(&mut self, placement: OverlayPlacement) -> AccelResult<()> {
        let stride = align_stride(placement.source.width.max(0) as u32 >> 1) * 2;
        let Some(placement) = clip(
            placement,
            self.overlay.screen_width(),
            self.overlay.screen_height(),
        ) else {
            return Ok(());
        };
        self.overlay.set_input_par(input_params(placement, stride))?;
        self.overlay.set_output_window(placement.drawing)
    }

    /// With `cleanup` the overlay is hidden and the key removed; the next
    /// frame applies the key again.
    pub fn stop_video(&mut self, cleanup: bool) -> AccelResult<()> {
        self.clip_boxes.clear();
        if cleanup {
            self.overlay.hide_window()?;
            self.overlay.disable_colorkey()?;
            self.color_key.applied = false;
        }
        Ok(())
    }

    /// Returns the port to its freshly opened state after the display
    /// device was re-initialized: overlay hidden, frames placed from the
    /// start of offscreen memory again, default key re-applied on the
    /// next frame.
    pub fn reinit(&mut self) -> AccelResult<()> {
        self.overlay.hide_window()?;
        self.allocator.reset();
        self.color_key = ColorKeyState::default();
        self.clip_boxes.clear();
        Ok(())
    }

    pub fn set_port_attribute(&mut self, name: &str, value: i32) -> AccelResult<()> {
        let attribute = find_attribute(name)?;
        if !(attribute.min..=attribute.max).contains(&value) {
            return Err(AccelError::InvalidAttribute(format!(
                "{name} value {value} outside {}..={}",
                attribute.min, attribute.max
            )));
        }
        let key = value as u32;
        self.overlay.set_colorkey(key)?;
        self.color_key = ColorKeyState { key, applied: true };
        self.clip_boxes.clear();
        Ok(())
    }

    pub fn get_port_attribute(&self, name: &str) -> AccelResult<i32> {
        find_attribute(name)?;
        Ok(self.color_key.key as i32)
    }

    /// The overlay scales freely, so the drawable size is always best.
    pub fn query_best_size(
        &self,
        _video: (u32, u32),
        drawing_width: u32,
        drawing_height: u32,
    ) -> (u32, u32) {
        (drawing_width, drawing_height)
    }

    /// Layout the client should allocate, with both dimensions rounded up
    /// to even.
    pub fn query_image_attributes(
        &self,
        fourcc: u32,
        width: u32,
        height: u32,
    ) -> AccelResult<SurfaceLayout> {
        Ok(query_layout(ImageFormat::from_fourcc(fourcc)?, width, height))
    }

    pub fn convert_color(&self, color: u32) -> u32 {
        self.channels.convert_color(color)
    }

    fn update_clip_boxes(&mut self, boxes: &[ClipBox]) -> Option<ColorKeyFill> {
        if self.clip_boxes == boxes {
            return None;
        }
        self.clip_boxes = boxes.to_vec();
        Some(ColorKeyFill {
            pixel: self.convert_color(self.color_key.key),
            boxes: boxes.to_vec(),
        })
    }
}

fn find_attribute(name: &str) -> AccelResult<&'static PortAttribute> {
    PORT_ATTRIBUTES
        .iter()
        .find(|attribute| attribute.name == name)
        .ok_or_else(|| AccelError::InvalidAttribute(name.to_string()))
}

fn input_params(placement: OverlayPlacement, stride: u32) -> InputParams {
    InputParams {
        width: placement.source.width,
        height: placement.source.height,
        stride: stride as i32,
        x: placement.source.x,
        y: placement.source.y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::OverlayRect;
    use crate::surface::{FOURCC_I420, FOURCC_YV12};
    use std::sync::{Arc, Mutex};

    const VISIBLE: usize = 1 << 20;
    const TOTAL: usize = 2 << 20;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum XvCall {
        Copy(usize, usize),
        Buffer(u32, u32, u32),
        Input(InputParams),
        Output(OverlayRect),
        Show,
        Hide,
        ColorKey(u32),
        DisableColorKey,
    }

    struct MockOverlay {
        calls: Arc<Mutex<Vec<XvCall>>>,
        memory: Vec<u8>,
        flags: OverlayFlags,
    }

    impl MockOverlay {
        fn record(&self, call: XvCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl VideoOverlay for MockOverlay {
        fn flags(&self) -> OverlayFlags {
            self.flags
        }

        fn set_yuv420_input_buffer(&mut self, y: u32, u: u32, v: u32) -> AccelResult<()> {
            self.record(XvCall::Buffer(y, u, v));
            Ok(())
        }

        fn set_input_par(&mut self, input: InputParams) -> AccelResult<()> {
            self.record(XvCall::Input(input));
            Ok(())
        }

        fn set_output_window(&mut self, window: OverlayRect) -> AccelResult<()> {
            self.record(XvCall::Output(window));
            Ok(())
        }

        fn show_window(&mut self) -> AccelResult<()> {
            self.record(XvCall::Show);
            Ok(())
        }

        fn hide_window(&mut self) -> AccelResult<()> {
            self.record(XvCall::Hide);
            Ok(())
        }

        fn set_colorkey(&mut self, color: u32) -> AccelResult<()> {
            self.record(XvCall::ColorKey(color));
            Ok(())
        }

        fn disable_colorkey(&mut self) -> AccelResult<()> {
            self.record(XvCall::DisableColorKey);
            Ok(())
        }

        fn copy_buffer(
            &mut self,
            offset: usize,
            src: &[u8],
            _format: ImageFormat,
        ) -> AccelResult<()> {
            self.record(XvCall::Copy(offset, src.len()));
            self.memory[offset..offset + src.len()].copy_from_slice(src);
            Ok(())
        }

        fn screen_width(&self) -> i32 {
            800
        }

        fn screen_height(&self) -> i32 {
            600
        }

        fn fb_mem(&mut self) -> &mut [u8] {
            &mut self.memory
        }

        fn visible_fb_size(&self) -> usize {
            VISIBLE
        }

        fn total_fb_size(&self) -> usize {
            TOTAL
        }
    }

    fn port(flags: OverlayFlags) -> (XvPort, Arc<Mutex<Vec<XvCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let overlay = MockOverlay {
            calls: Arc::clone(&calls),
            memory: vec![0u8; TOTAL],
            flags,
        };
        (XvPort::new(Box::new(overlay), ColorChannels::RGB565), calls)
    }

    fn take_calls(calls: &Arc<Mutex<Vec<XvCall>>>) -> Vec<XvCall> {
        std::mem::take(&mut *calls.lock().unwrap())
    }

    fn placement(drw_x: i32, drw_y: i32) -> OverlayPlacement {
        OverlayPlacement::new(
            OverlayRect::new(0, 0, 320, 240),
            OverlayRect::new(drw_x, drw_y, 320, 240),
        )
    }

    #[test]
    fn put_image_drives_the_overlay_in_order() -> AccelResult<()> {
        let (mut port, calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        let frame = vec![0x42u8; 320 * 240 * 3 / 2];
        let boxes = [ClipBox::new(10, 20, 330, 260)];
        let fill = port.put_image(&PutImage {
            placement: placement(10, 20),
            fourcc: FOURCC_YV12,
            buf: &frame,
            width: 320,
            height: 240,
            clip_boxes: &boxes,
        })?;

        let luma = 320 * 240;
        let chroma = 160 * 120;
        assert_eq!(
            take_calls(&calls),
            vec![
                XvCall::Copy(VISIBLE, frame.len()),
                XvCall::ColorKey(DEFAULT_COLOR_KEY),
                XvCall::Buffer(
                    VISIBLE as u32,
                    (VISIBLE + luma + chroma) as u32,
                    (VISIBLE + luma) as u32
                ),
                XvCall::Input(InputParams {
                    width: 320,
                    height: 240,
                    stride: 320,
                    x: 0,
                    y: 0,
                }),
                XvCall::Output(OverlayRect::new(10, 20, 320, 240)),
                XvCall::Show,
            ]
        );
        assert_eq!(port.frame_offset(), VISIBLE + frame.len());
        assert!(port.color_key().applied);

        let fill = fill.expect("first frame repaints the color key");
        assert_eq!(fill.pixel, 0x0883);
        assert_eq!(fill.boxes, boxes);
        Ok(())
    }

    #[test]
    fn unchanged_clip_boxes_are_not_refilled() -> AccelResult<()> {
        let (mut port, calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        let frame = vec![0u8; 320 * 240 * 3 / 2];
        let boxes = [ClipBox::new(0, 0, 320, 240)];
        let request = PutImage {
            placement: placement(0, 0),
            fourcc: FOURCC_I420,
            buf: &frame,
            width: 320,
            height: 240,
            clip_boxes: &boxes,
        };
        assert!(port.put_image(&request)?.is_some());
        assert!(port.put_image(&request)?.is_none());

        // The key is only written for the first frame.
        let keys = take_calls(&calls)
            .into_iter()
            .filter(|call| matches!(call, XvCall::ColorKey(_)))
            .count();
        assert_eq!(keys, 1);
        Ok(())
    }

    #[test]
    fn off_screen_frame_is_dropped_without_advancing() -> AccelResult<()> {
        let (mut port, calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        let frame = vec![0u8; 320 * 240 * 3 / 2];
        let fill = port.put_image(&PutImage {
            placement: placement(900, 0),
            fourcc: FOURCC_I420,
            buf: &frame,
            width: 320,
            height: 240,
            clip_boxes: &[ClipBox::new(0, 0, 1, 1)],
        })?;
        assert!(fill.is_none());
        assert!(take_calls(&calls).is_empty());
        assert_eq!(port.frame_offset(), VISIBLE);
        Ok(())
    }

    #[test]
    fn frames_cycle_through_offscreen_memory() -> AccelResult<()> {
        let (mut port, _calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        let size = 320 * 240 * 3 / 2;
        let frame = vec![0u8; size];
        let request = PutImage {
            placement: placement(0, 0),
            fourcc: FOURCC_I420,
            buf: &frame,
            width: 320,
            height: 240,
            clip_boxes: &[],
        };
        let fits = (TOTAL - VISIBLE) / size;
        for _ in 0..fits {
            port.put_image(&request)?;
        }
        assert_eq!(port.frame_offset(), VISIBLE + fits * size);
        port.put_image(&request)?;
        assert_eq!(port.frame_offset(), VISIBLE + size);
        Ok(())
    }

    #[test]
    fn single_buffered_overlay_reuses_one_offset() -> AccelResult<()> {
        let (mut port, _calls) = port(OverlayFlags::empty());
        let frame = vec![0u8; 320 * 240 * 3 / 2];
        let request = PutImage {
            placement: placement(0, 0),
            fourcc: FOURCC_YV12,
            buf: &frame,
            width: 320,
            height: 240,
            clip_boxes: &[],
        };
        port.put_image(&request)?;
        port.put_image(&request)?;
        assert_eq!(port.frame_offset(), VISIBLE);
        Ok(())
    }

    #[test]
    fn oversized_frame_exceeds_the_limit() {
        let (mut port, calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        let frame = vec![0u8; 1920 * 1080 * 3 / 2];
        let result = port.put_image(&PutImage {
            placement: placement(0, 0),
            fourcc: FOURCC_I420,
            buf: &frame,
            width: 1920,
            height: 1080,
            clip_boxes: &[],
        });
        assert!(matches!(result, Err(AccelError::LimitExceeded)));
        assert!(take_calls(&calls).is_empty());
    }

    #[test]
    fn unknown_fourcc_and_short_buffers_are_rejected() {
        let (mut port, _calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        let frame = vec![0u8; 16];
        let mut request = PutImage {
            placement: placement(0, 0),
            fourcc: 0x3259_5559,
            buf: &frame,
            width: 320,
            height: 240,
            clip_boxes: &[],
        };
        assert!(matches!(
            port.put_image(&request),
            Err(AccelError::UnsupportedFormat(_))
        ));
        request.fourcc = FOURCC_I420;
        assert!(matches!(
            port.put_image(&request),
            Err(AccelError::BufferOverflow)
        ));
    }

    #[test]
    fn reput_recomputes_the_stride_from_the_source_width() -> AccelResult<()> {
        let (mut port, calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        port.reput_image(OverlayPlacement::new(
            OverlayRect::new(0, 0, 350, 200),
            OverlayRect::new(700, 0, 350, 200),
        ))?;
        assert_eq!(
            take_calls(&calls),
            vec![
                XvCall::Input(InputParams {
                    width: 100,
                    height: 200,
                    stride: 352,
                    x: 0,
                    y: 0,
                }),
                XvCall::Output(OverlayRect::new(700, 0, 100, 200)),
            ]
        );
        Ok(())
    }

    #[test]
    fn stop_with_cleanup_hides_and_rearms_the_key() -> AccelResult<()> {
        let (mut port, calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        port.stop_video(false)?;
        assert!(take_calls(&calls).is_empty());

        port.set_port_attribute(XV_COLORKEY, 0x00FF_00FF)?;
        port.stop_video(true)?;
        assert_eq!(
            take_calls(&calls),
            vec![
                XvCall::ColorKey(0x00FF_00FF),
                XvCall::Hide,
                XvCall::DisableColorKey
            ]
        );
        assert_eq!(
            port.color_key(),
            ColorKeyState {
                key: 0x00FF_00FF,
                applied: false
            }
        );
        Ok(())
    }

    #[test]
    fn reinit_restarts_frames_at_the_offscreen_start() -> AccelResult<()> {
        let (mut port, calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        let frame = vec![0u8; 320 * 240 * 3 / 2];
        let boxes = [ClipBox::new(0, 0, 320, 240)];
        let request = PutImage {
            placement: placement(0, 0),
            fourcc: FOURCC_I420,
            buf: &frame,
            width: 320,
            height: 240,
            clip_boxes: &boxes,
        };
        port.put_image(&request)?;
        port.set_port_attribute(XV_COLORKEY, 0x0012_3456)?;
        port.put_image(&request)?;
        assert_eq!(port.frame_offset(), VISIBLE + 2 * frame.len());
        take_calls(&calls);

        port.reinit()?;
        assert_eq!(take_calls(&calls), vec![XvCall::Hide]);
        assert_eq!(port.frame_offset(), VISIBLE);
        assert_eq!(port.color_key(), ColorKeyState::default());

        let fill = port.put_image(&request)?;
        assert!(fill.is_some());
        let calls = take_calls(&calls);
        assert_eq!(calls[0], XvCall::Copy(VISIBLE, frame.len()));
        assert_eq!(calls[1], XvCall::ColorKey(DEFAULT_COLOR_KEY));
        Ok(())
    }

    #[test]
    fn color_key_attribute_round_trips_and_validates() -> AccelResult<()> {
        let (mut port, _calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        assert_eq!(port.get_port_attribute(XV_COLORKEY)?, DEFAULT_COLOR_KEY as i32);
        port.set_port_attribute(XV_COLORKEY, 0x10_2030)?;
        assert_eq!(port.get_port_attribute(XV_COLORKEY)?, 0x10_2030);

        assert!(matches!(
            port.set_port_attribute(XV_COLORKEY, 1 << 24),
            Err(AccelError::InvalidAttribute(_))
        ));
        assert!(matches!(
            port.get_port_attribute("XV_BRIGHTNESS"),
            Err(AccelError::InvalidAttribute(_))
        ));
        Ok(())
    }

    #[test]
    fn setting_the_key_forces_a_refill() -> AccelResult<()> {
        let (mut port, _calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        let frame = vec![0u8; 320 * 240 * 3 / 2];
        let boxes = [ClipBox::new(0, 0, 320, 240)];
        let request = PutImage {
            placement: placement(0, 0),
            fourcc: FOURCC_I420,
            buf: &frame,
            width: 320,
            height: 240,
            clip_boxes: &boxes,
        };
        port.put_image(&request)?;
        port.set_port_attribute(XV_COLORKEY, 0xFF_FFFF)?;
        let fill = port.put_image(&request)?;
        assert_eq!(fill.map(|fill| fill.pixel), Some(0xFFFF));
        Ok(())
    }

    #[test]
    fn queries_report_drawable_size_and_even_layouts() -> AccelResult<()> {
        let (port, _calls) = port(OverlayFlags::DOUBLE_BUFFERING);
        assert_eq!(port.query_best_size((720, 480), 1024, 768), (1024, 768));
        let layout = port.query_image_attributes(FOURCC_YV12, 719, 479)?;
        assert_eq!((layout.width, layout.height), (720, 480));
        assert_eq!(layout.plane_offsets(), [0, 353_280, 441_600]);
        Ok(())
    }

    #[test]
    fn color_conversion_follows_the_channel_layout() {
        assert_eq!(ColorChannels::RGB565.convert_color(0x08_1018), 0x0883);
        assert_eq!(ColorChannels::XRGB8888.convert_color(0x08_1018), 0x08_1018);
        assert_eq!(ColorChannels::RGB565.convert_color(0xFF_FFFF), 0xFFFF);

        let info = FbVarScreenInfo {
            red: crate::overlay::FbBitfield {
                offset: 0,
                length: 8,
                msb_right: 0,
            },
            green: crate::overlay::FbBitfield {
                offset: 8,
                length: 8,
                msb_right: 0,
            },
            blue: crate::overlay::FbBitfield {
                offset: 16,
                length: 8,
                msb_right: 0,
            },
            ..Default::default()
        };
        let bgr = ColorChannels::from_screen_info(&info);
        assert_eq!(bgr.convert_color(0x11_2233), 0x33_2211);
    }
}
