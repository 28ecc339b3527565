//! Slide geometry in EMU (914400 per inch).

/// English Metric Units per inch.
pub const EMU_PER_INCH: i64 = 914_400;

/// Resolution assumed for image pixel sizes.
pub const IMAGE_DPI: f64 = 96.0;

/// Largest picture box on a content slide, in inches.
pub const MAX_IMAGE_WIDTH_IN: f64 = 4.5;
pub const MAX_IMAGE_HEIGHT_IN: f64 = 3.5;

/// Table frame position and size, in inches.
const TABLE_LEFT_IN: f64 = 1.0;
const TABLE_TOP_IN: f64 = 2.0;
const TABLE_WIDTH_IN: f64 = 7.0;
const TABLE_HEIGHT_IN: f64 = 2.5;

/// Bullet font size bounds in points.
const MIN_BULLET_PT: f64 = 14.0;
const MAX_BULLET_PT: f64 = 18.0;

/// Table cell font size in points.
pub const TABLE_FONT_PT: u32 = 12;

/// Convert inches to EMU.
pub fn inches(value: f64) -> i64 {
    (value * EMU_PER_INCH as f64).round() as i64
}

/// Bullet font size in hundredths of a point (the unit of `a:rPr/@sz`).
///
/// `200 / bullet_count` points, kept between 14 and 18.
pub fn bullet_font_size(bullet_count: usize) -> u32 {
    if bullet_count == 0 {
        return (MAX_BULLET_PT * 100.0) as u32;
    }
    let points = (200.0 / bullet_count as f64).clamp(MIN_BULLET_PT, MAX_BULLET_PT);
    (points * 100.0).round() as u32
}

/// An axis-aligned box on a slide, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, cx: i64, cy: i64) -> Self {
        Self { x, y, cx, cy }
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.cy
    }
}

/// Where a picture and the shrunken text body go on a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlacement {
    pub picture: Rect,
    pub body: Rect,
}

/// Positions content on a slide of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideGeometry {
    pub width: i64,
    pub height: i64,
}

impl SlideGeometry {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    /// Text box used when a layout has no body placeholder.
    pub fn default_body(&self) -> Rect {
        Rect::new(
            inches(0.5),
            inches(1.5),
            self.width - inches(1.0),
            self.height - inches(2.0),
        )
    }

    /// Fit a `px_width` x `px_height` image on the right side of the slide.
    ///
    /// The image is scaled down (never up) to fit 4.5in x 3.5in at 96 DPI,
    /// anchored 0.5in from the right edge and centered vertically. The body
    /// text takes the space to its left.
    pub fn fit_image(&self, px_width: u32, px_height: u32) -> ImagePlacement {
        let width_in = px_width as f64 / IMAGE_DPI;
        let height_in = px_height as f64 / IMAGE_DPI;
        let scale = (MAX_IMAGE_WIDTH_IN / width_in)
            .min(MAX_IMAGE_HEIGHT_IN / height_in)
            .min(1.0);

        let cx = inches(width_in * scale);
        let cy = inches(height_in * scale);
        let picture = Rect::new(self.width - cx - inches(0.5), (self.height - cy) / 2, cx, cy);
        let body = Rect::new(
            inches(0.5),
            inches(1.5),
            self.width - cx - inches(1.5),
            self.height - inches(2.0),
        );

        ImagePlacement { picture, body }
    }

    /// Table frame: 1in from the left, 7in wide, 2.5in high.
    ///
    /// With `below_bullets` the frame sits at the bottom of the slide (0.5in
    /// margin) instead of 2in from the top, so the bullets keep the space
    /// above it.
    pub fn table_frame(&self, below_bullets: bool) -> Rect {
        let height = inches(TABLE_HEIGHT_IN);
        let top = if below_bullets {
            (self.height - height - inches(0.5)).max(inches(TABLE_TOP_IN))
        } else {
            inches(TABLE_TOP_IN)
        };
        Rect::new(inches(TABLE_LEFT_IN), top, inches(TABLE_WIDTH_IN), height)
    }

    /// Shrink `body` so it ends 0.1in above `table`.
    pub fn body_above(&self, body: Rect, table: Rect) -> Rect {
        let cy = (table.y - inches(0.1) - body.y).max(inches(0.5));
        Rect { cy, ..body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD: SlideGeometry = SlideGeometry {
        width: 9_144_000,
        height: 6_858_000,
    };

    #[test]
    fn test_inches() {
        assert_eq!(inches(1.0), 914_400);
        assert_eq!(inches(0.5), 457_200);
        assert_eq!(inches(7.5), 6_858_000);
    }

    #[test]
    fn test_bullet_font_size() {
        assert_eq!(bullet_font_size(0), 1800);
        assert_eq!(bullet_font_size(5), 1800);
        assert_eq!(bullet_font_size(12), 1667);
        assert_eq!(bullet_font_size(20), 1400);
        assert_eq!(bullet_font_size(100), 1400);
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let placed = STANDARD.fit_image(192, 96);
        assert_eq!(placed.picture.cx, inches(2.0));
        assert_eq!(placed.picture.cy, inches(1.0));
        assert_eq!(placed.picture.x, STANDARD.width - inches(2.5));
        assert_eq!(placed.picture.y, (STANDARD.height - inches(1.0)) / 2);
        assert_eq!(placed.body, Rect::new(inches(0.5), inches(1.5), STANDARD.width - inches(3.5), STANDARD.height - inches(2.0)));
    }

    #[test]
    fn test_large_image_fits_box_and_keeps_aspect() {
        for (w, h) in [(960, 960), (4000, 1000), (500, 3000)] {
            let placed = STANDARD.fit_image(w, h);
            assert!(placed.picture.cx <= inches(MAX_IMAGE_WIDTH_IN) + 1);
            assert!(placed.picture.cy <= inches(MAX_IMAGE_HEIGHT_IN) + 1);

            let expected = w as f64 / h as f64;
            let actual = placed.picture.cx as f64 / placed.picture.cy as f64;
            assert!((expected - actual).abs() / expected < 0.001, "{w}x{h}");
        }
        let square = STANDARD.fit_image(960, 960);
        assert_eq!(square.picture.cx, inches(3.5));
    }

    #[test]
    fn test_table_frame_positions() {
        let top = STANDARD.table_frame(false);
        assert_eq!(top, Rect::new(inches(1.0), inches(2.0), inches(7.0), inches(2.5)));

        let below = STANDARD.table_frame(true);
        assert_eq!(below.y, inches(4.5));
        assert_eq!(below.bottom(), STANDARD.height - inches(0.5));

        let body = STANDARD.body_above(STANDARD.default_body(), below);
        assert_eq!(body.bottom(), below.y - inches(0.1));
    }
}
