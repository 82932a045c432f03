use image::{Rgba, RgbaImage};

use crate::config::RelativeRect;

/// Computes BT.601 luma: Y = 0.299*R + 0.587*G + 0.114*B
#[inline]
pub fn luma(pixel: &Rgba<u8>) -> f32 {
    0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32
}

/// Converts an RGBA image to a single-channel luma buffer (unrounded).
pub fn luma_plane(img: &RgbaImage) -> Vec<f32> {
    img.pixels().map(luma).collect()
}

/// An integer pixel rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersects the rect with a `width` x `height` image.
    ///
    /// Returns `None` when nothing of the rect is left inside the image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let x0 = self.x.clamp(0, width as i64);
        let y0 = self.y.clamp(0, height as i64);
        let x1 = self.x.saturating_add(self.width).clamp(0, width as i64);
        let y1 = self.y.saturating_add(self.height).clamp(0, height as i64);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Converts relative coordinates into pixels for a `width` x `height` image.
    pub fn from_relative(region: &RelativeRect, width: u32, height: u32) -> Rect {
        let w = width as f32;
        let h = height as f32;
        Rect::new(
            (region.x * w).round() as i64,
            (region.y * h).round() as i64,
            (region.width * w).round() as i64,
            (region.height * h).round() as i64,
        )
    }
}

/// Crops `rect` out of `img`, clamping it to the image bounds first.
///
/// Returns `None` if the clamped rect is empty.
pub fn crop(img: &RgbaImage, rect: Rect) -> Option<RgbaImage> {
    let clamped = rect.clamp_to(img.width(), img.height())?;
    Some(
        image::imageops::crop_imm(
            img,
            clamped.x as u32,
            clamped.y as u32,
            clamped.width as u32,
            clamped.height as u32,
        )
        .to_image(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_weights() {
        assert!((luma(&Rgba([255, 255, 255, 255])) - 255.0).abs() < 0.01);
        assert_eq!(luma(&Rgba([0, 0, 0, 255])), 0.0);
        assert!((luma(&Rgba([100, 0, 0, 255])) - 29.9).abs() < 0.01);
    }

    #[test]
    fn test_clamp_inside_is_unchanged() {
        let rect = Rect::new(10, 20, 30, 40);
        assert_eq!(rect.clamp_to(100, 100), Some(rect));
    }

    #[test]
    fn test_clamp_partially_outside() {
        let cases = [
            Rect::new(-10, -10, 50, 50),
            Rect::new(80, 90, 50, 50),
            Rect::new(-500, 50, 1000, 10),
            Rect::new(99, 99, 1, 1),
        ];
        for rect in cases {
            let clamped = rect.clamp_to(100, 100).unwrap();
            assert!(clamped.width > 0 && clamped.height > 0, "{:?}", rect);
            assert!(clamped.x >= 0 && clamped.y >= 0, "{:?}", rect);
            assert!(clamped.x + clamped.width <= 100, "{:?}", rect);
            assert!(clamped.y + clamped.height <= 100, "{:?}", rect);
        }
    }

    #[test]
    fn test_clamp_fully_outside_is_none() {
        assert_eq!(Rect::new(100, 0, 10, 10).clamp_to(100, 100), None);
        assert_eq!(Rect::new(-20, 0, 10, 10).clamp_to(100, 100), None);
        assert_eq!(Rect::new(0, 0, 0, 10).clamp_to(100, 100), None);
        assert_eq!(Rect::new(0, 0, 10, -5).clamp_to(100, 100), None);
        assert_eq!(Rect::new(0, 0, 10, 10).clamp_to(0, 0), None);
    }

    #[test]
    fn test_crop_region() {
        let img = RgbaImage::from_fn(100, 200, |x, y| Rgba([x as u8, y as u8, 0, 255]));

        let cropped = crop(&img, Rect::new(10, 50, 50, 20)).unwrap();
        assert_eq!(cropped.dimensions(), (50, 20));
        assert_eq!(cropped.get_pixel(0, 0)[0], 10);
        assert_eq!(cropped.get_pixel(0, 0)[1], 50);
    }

    #[test]
    fn test_crop_clamps() {
        let img = RgbaImage::new(100, 100);
        let cropped = crop(&img, Rect::new(90, 90, 50, 50)).unwrap();
        assert_eq!(cropped.dimensions(), (10, 10));
        assert!(crop(&img, Rect::new(150, 0, 10, 10)).is_none());
    }

    #[test]
    fn test_from_relative() {
        let region = RelativeRect {
            x: 0.0,
            y: 0.5,
            width: 0.5,
            height: 0.5,
        };
        assert_eq!(
            Rect::from_relative(&region, 2000, 1500),
            Rect::new(0, 750, 1000, 750)
        );
    }
}
