use image::{ColorType, DynamicImage};

use super::ProcessingError;
use super::chart::Canvas;

pub const BINS: usize = 256;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 400;
const MARGIN: f32 = 32.0;

/// One plotted channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: &'static str,
    pub color: [u8; 3],
    pub counts: Vec<u64>,
}

/// Per-channel intensity counts. Grayscale sources yield a single series,
/// everything else red, green and blue.
pub fn channel_counts(image: &DynamicImage) -> Vec<Series> {
    let grayscale = matches!(
        image.color(),
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
    );

    if grayscale {
        let mut counts = vec![0u64; BINS];
        for p in image.to_luma8().pixels() {
            counts[usize::from(p[0])] += 1;
        }
        return vec![Series {
            name: "luminance",
            color: [40, 40, 40],
            counts,
        }];
    }

    let mut red = vec![0u64; BINS];
    let mut green = vec![0u64; BINS];
    let mut blue = vec![0u64; BINS];
    for p in image.to_rgb8().pixels() {
        red[usize::from(p[0])] += 1;
        green[usize::from(p[1])] += 1;
        blue[usize::from(p[2])] += 1;
    }
    vec![
        Series {
            name: "red",
            color: [220, 30, 30],
            counts: red,
        },
        Series {
            name: "green",
            color: [30, 160, 30],
            counts: green,
        },
        Series {
            name: "blue",
            color: [30, 60, 220],
            counts: blue,
        },
    ]
}

/// Renders the histogram chart of `image`; the series overlap with
/// transparency.
pub fn histogram(image: &DynamicImage) -> Result<DynamicImage, ProcessingError> {
    let series = channel_counts(image);
    let peak = series
        .iter()
        .flat_map(|s| s.counts.iter().copied())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut canvas = Canvas::new(WIDTH, HEIGHT, MARGIN)?;
    let area = canvas.area();
    let step = area.width / (BINS - 1) as f32;

    for s in &series {
        let mut outline: Vec<(f32, f32)> = s
            .counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let x = area.left + i as f32 * step;
                let y = area.bottom() - (count as f32 / peak as f32) * area.height;
                (x, y)
            })
            .collect();

        let [r, g, b] = s.color;
        canvas.stroke_polyline(&outline, [r, g, b, 230], 1.0);

        outline.push((area.right(), area.bottom()));
        outline.push((area.left, area.bottom()));
        canvas.fill_polygon(&outline, [r, g, b, 90]);
    }
    canvas.draw_axes();

    log::debug!(
        "Rendered histogram with series {:?}",
        series.iter().map(|s| s.name).collect::<Vec<_>>()
    );
    Ok(DynamicImage::ImageRgba8(canvas.into_image()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::{data_uri, encode_png};
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn grayscale_has_one_series() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([10]));
        img.put_pixel(0, 0, Luma([255]));
        let series = channel_counts(&DynamicImage::ImageLuma8(img));

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].counts.len(), BINS);
        assert_eq!(series[0].counts[10], 15);
        assert_eq!(series[0].counts[255], 1);
    }

    #[test]
    fn color_has_three_series() {
        let img = RgbImage::from_pixel(2, 3, Rgb([1, 2, 3]));
        let series = channel_counts(&DynamicImage::ImageRgb8(img));

        let names: Vec<_> = series.iter().map(|s| s.name).collect();
        assert_eq!(names, ["red", "green", "blue"]);
        assert_eq!(series[0].counts[1], 6);
        assert_eq!(series[1].counts[2], 6);
        assert_eq!(series[2].counts[3], 6);
        assert!(series.iter().all(|s| s.counts.iter().sum::<u64>() == 6));
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut img = RgbImage::new(16, 16);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8]);
        }
        let image = DynamicImage::ImageRgb8(img);

        let first = histogram(&image).unwrap();
        let second = histogram(&image).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!((first.width(), first.height()), (WIDTH, HEIGHT));

        assert_eq!(encode_png(&first).unwrap(), encode_png(&second).unwrap());
        let uri = data_uri(&histogram(&image).unwrap()).unwrap();
        assert_eq!(uri, data_uri(&histogram(&image).unwrap()).unwrap());
    }
}
