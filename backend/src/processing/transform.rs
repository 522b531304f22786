use image::{DynamicImage, Rgba, RgbaImage};

/// Enhancement factors; 1.0 leaves an axis untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub color: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub sharpness: f32,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            color: 1.0,
            brightness: 1.0,
            contrast: 1.0,
            sharpness: 1.0,
        }
    }
}

/// Applies color, brightness, contrast and sharpness, in that order.
///
/// Each step blends the image with a degenerate version of itself:
/// `degenerate + (image - degenerate) * factor`. Alpha is carried through
/// unchanged.
pub fn transform(image: &DynamicImage, params: &TransformParams) -> DynamicImage {
    let mut rgba = image.to_rgba8();

    let gray = grayscale(&rgba);
    rgba = blend(&gray, &rgba, params.color);

    let black = RgbaImage::from_pixel(rgba.width(), rgba.height(), Rgba([0, 0, 0, 255]));
    rgba = blend(&black, &rgba, params.brightness);

    let mean = mean_luma(&rgba);
    let flat = RgbaImage::from_pixel(rgba.width(), rgba.height(), Rgba([mean, mean, mean, 255]));
    rgba = blend(&flat, &rgba, params.contrast);

    let smooth = smooth(&rgba);
    rgba = blend(&smooth, &rgba, params.sharpness);

    DynamicImage::ImageRgba8(rgba)
}

fn blend(degenerate: &RgbaImage, image: &RgbaImage, factor: f32) -> RgbaImage {
    let mut out = image.clone();
    for (dst, (d, i)) in out
        .pixels_mut()
        .zip(degenerate.pixels().zip(image.pixels()))
    {
        for c in 0..3 {
            let lo = f32::from(d[c]);
            let hi = f32::from(i[c]);
            dst[c] = (lo + (hi - lo) * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn luma(p: &Rgba<u8>) -> u8 {
    // ITU-R 601-2 weights
    let l = (f32::from(p[0]) * 299.0 + f32::from(p[1]) * 587.0 + f32::from(p[2]) * 114.0) / 1000.0;
    l.round().clamp(0.0, 255.0) as u8
}

fn grayscale(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        let l = luma(p);
        *p = Rgba([l, l, l, p[3]]);
    }
    out
}

fn mean_luma(image: &RgbaImage) -> u8 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0;
    }
    let sum: u64 = image.pixels().map(|p| u64::from(luma(p))).sum();
    ((sum as f64 / count as f64) + 0.5) as u8
}

// 3x3 smoothing kernel [1 1 1; 1 5 1; 1 1 1] / 13. Border pixels keep
// their original value.
fn smooth(image: &RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0u32; 3];
            for dy in 0..3 {
                for dx in 0..3 {
                    let p = image.get_pixel(x + dx - 1, y + dy - 1);
                    let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                    for c in 0..3 {
                        acc[c] += u32::from(p[c]) * weight;
                    }
                }
            }
            let px = out.get_pixel_mut(x, y);
            for c in 0..3 {
                px[c] = ((acc[c] as f32) / 13.0).round() as u8;
            }
        }
    }
    out
}
