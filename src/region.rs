//! Overlay placement geometry.
//!
//! A video frame is described by a pair of rectangles: the part of the
//! source image to show and where on screen to draw it. [`clip`] trims the
//! pair against the visible screen while keeping the two in step.

/// A rectangle in either source-image or screen coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl OverlayRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
}

/// Source rectangle and the screen rectangle it is scaled into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayPlacement {
    pub source: OverlayRect,
    pub drawing: OverlayRect,
}

impl OverlayPlacement {
    pub const fn new(source: OverlayRect, drawing: OverlayRect) -> Self {
        Self { source, drawing }
    }

    /// Source pixels per drawn pixel, horizontally.
    pub fn h_ratio(&self) -> f64 {
        f64::from(self.source.width) / f64::from(self.drawing.width)
    }

    /// Source pixels per drawn pixel, vertically.
    pub fn v_ratio(&self) -> f64 {
        f64::from(self.source.height) / f64::from(self.drawing.height)
    }
}

/// Clips `placement` to a `screen_width` x `screen_height` screen.
///
/// Returns `None` when the drawing rectangle is entirely off-screen.
///
/// Left and top trims of the source are rounded down to an even pixel so
/// chroma pairs stay aligned. The bottom trim is scaled with the
/// horizontal ratio, which matches the overlay driver this geometry feeds;
/// for non-square scale factors the bottom source trim is therefore not
/// proportional.
pub fn clip(
    placement: OverlayPlacement,
    screen_width: i32,
    screen_height: i32,
) -> Option<OverlayPlacement> {
    let v_ratio = placement.v_ratio();
    let h_ratio = placement.h_ratio();
    let mut src = placement.source;
    let mut drw = placement.drawing;

    if drw.x < -drw.width || drw.y < -drw.height || drw.x > screen_width || drw.y > screen_height
    {
        return None;
    }

    if drw.x < 0 {
        let src_offset = scaled(h_ratio, -drw.x) & !1;
        src.x += src_offset;
        src.width -= src_offset;
        drw.width += drw.x;
        drw.x = 0;
    }

    if drw.y < 0 {
        let src_offset = scaled(v_ratio, -drw.y) & !1;
        src.y += src_offset;
        src.height -= src_offset;
        drw.height += drw.y;
        drw.y = 0;
    }

    if drw.right() > screen_width {
        let margin = drw.right() - screen_width;
        drw.width -= margin;
        src.width -= scaled(h_ratio, margin);
    }

    if drw.bottom() > screen_height {
        let margin = drw.bottom() - screen_height;
        drw.height -= margin;
        src.height -= scaled(h_ratio, margin);
    }

    Some(OverlayPlacement::new(src, drw))
}

/// `ratio * pixels`, truncated toward zero.
fn scaled(ratio: f64, pixels: i32) -> i32 {
    (ratio * f64::from(pixels)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN_W: i32 = 1920;
    const SCREEN_H: i32 = 1080;

    fn placement(src: OverlayRect, drw: OverlayRect) -> OverlayPlacement {
        OverlayPlacement::new(src, drw)
    }

    #[test]
    fn fully_visible_placement_is_unchanged() {
        let input = placement(
            OverlayRect::new(0, 0, 720, 480),
            OverlayRect::new(100, 100, 1440, 960),
        );
        assert_eq!(clip(input, SCREEN_W, SCREEN_H), Some(input));
    }

    #[test]
    fn off_screen_drawing_is_not_visible() {
        let src = OverlayRect::new(0, 0, 720, 480);
        for drw in [
            OverlayRect::new(-800, 0, 720, 480),
            OverlayRect::new(0, -500, 720, 480),
            OverlayRect::new(1921, 0, 720, 480),
            OverlayRect::new(0, 1081, 720, 480),
        ] {
            assert_eq!(clip(placement(src, drw), SCREEN_W, SCREEN_H), None);
        }
    }

    #[test]
    fn right_overhang_shrinks_both_rectangles() {
        // 2:1 downscale, 200 drawn pixels past the right edge.
        let input = placement(
            OverlayRect::new(0, 0, 1440, 960),
            OverlayRect::new(1400, 0, 720, 480),
        );
        let clipped = clip(input, SCREEN_W, SCREEN_H).unwrap();
        assert_eq!(clipped.drawing, OverlayRect::new(1400, 0, 520, 480));
        assert_eq!(clipped.source, OverlayRect::new(0, 0, 1040, 960));
        let before = f64::from(input.drawing.width) / f64::from(input.source.width);
        let after = f64::from(clipped.drawing.width) / f64::from(clipped.source.width);
        assert!((before - after).abs() < 0.01);
    }

    #[test]
    fn left_overhang_keeps_chroma_pairs_aligned() {
        // 1.5 source pixels per drawn pixel; 51 drawn pixels hidden -> 76.5
        // source pixels, truncated to 76 (already even).
        let input = placement(
            OverlayRect::new(0, 0, 1080, 720),
            OverlayRect::new(-51, 0, 720, 480),
        );
        let clipped = clip(input, SCREEN_W, SCREEN_H).unwrap();
        assert_eq!(clipped.drawing, OverlayRect::new(0, 0, 669, 480));
        assert_eq!(clipped.source.x, 76);
        assert_eq!(clipped.source.width, 1080 - 76);

        // 1:1, 33 hidden -> 33 rounded down to 32.
        let input = placement(
            OverlayRect::new(0, 0, 720, 480),
            OverlayRect::new(-33, 0, 720, 480),
        );
        let clipped = clip(input, SCREEN_W, SCREEN_H).unwrap();
        assert_eq!(clipped.source.x, 32);
        assert_eq!(clipped.source.width, 688);
        assert_eq!(clipped.drawing.width, 687);
    }

    #[test]
    fn top_overhang_uses_the_vertical_ratio() {
        let input = placement(
            OverlayRect::new(0, 0, 720, 960),
            OverlayRect::new(0, -100, 720, 480),
        );
        let clipped = clip(input, SCREEN_W, SCREEN_H).unwrap();
        assert_eq!(clipped.drawing, OverlayRect::new(0, 0, 720, 380));
        assert_eq!(clipped.source, OverlayRect::new(0, 200, 720, 760));
    }

    #[test]
    fn bottom_overhang_uses_the_horizontal_ratio() {
        // h_ratio = 1.0, v_ratio = 2.0; the bottom trim follows h_ratio.
        let input = placement(
            OverlayRect::new(0, 0, 720, 960),
            OverlayRect::new(0, 880, 720, 480),
        );
        let clipped = clip(input, SCREEN_W, SCREEN_H).unwrap();
        assert_eq!(clipped.drawing, OverlayRect::new(0, 880, 720, 200));
        assert_eq!(clipped.source, OverlayRect::new(0, 0, 720, 680));
    }

    #[test]
    fn oversized_drawing_is_trimmed_on_every_edge() {
        let input = placement(
            OverlayRect::new(0, 0, 2400, 1400),
            OverlayRect::new(-240, -160, 2400, 1400),
        );
        let clipped = clip(input, SCREEN_W, SCREEN_H).unwrap();
        assert_eq!(clipped.drawing, OverlayRect::new(0, 0, 1920, 1080));
        assert_eq!(clipped.source, OverlayRect::new(240, 160, 1920, 1080));
    }
}
