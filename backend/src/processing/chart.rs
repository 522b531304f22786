use image::{Rgba, RgbaImage};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use super::ProcessingError;

pub const AXIS_COLOR: [u8; 4] = [60, 60, 60, 255];

/// Plot area inside the canvas margins.
#[derive(Debug, Clone, Copy)]
pub struct PlotArea {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PlotArea {
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }
}

/// White canvas with a framed plot area, drawn with tiny-skia.
pub struct Canvas {
    pixmap: Pixmap,
    area: PlotArea,
}

impl Canvas {
    pub fn new(width: u32, height: u32, margin: f32) -> Result<Self, ProcessingError> {
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| ProcessingError::Render(format!("invalid canvas size {width}x{height}")))?;
        pixmap.fill(Color::WHITE);
        let area = PlotArea {
            left: margin,
            top: margin,
            width: width as f32 - 2.0 * margin,
            height: height as f32 - 2.0 * margin,
        };
        Ok(Self { pixmap, area })
    }

    pub fn area(&self) -> PlotArea {
        self.area
    }

    pub fn draw_axes(&mut self) {
        let a = self.area;
        self.stroke_polyline(
            &[(a.left, a.top), (a.left, a.bottom()), (a.right(), a.bottom())],
            AXIS_COLOR,
            1.5,
        );
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: [u8; 4]) {
        let Some(rect) = Rect::from_xywh(x, y, w, h) else {
            return;
        };
        self.pixmap
            .fill_rect(rect, &paint(color), Transform::identity(), None);
    }

    /// Fills the closed polygon through `points`.
    pub fn fill_polygon(&mut self, points: &[(f32, f32)], color: [u8; 4]) {
        let mut pb = PathBuilder::new();
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        pb.move_to(first.0, first.1);
        for p in rest {
            pb.line_to(p.0, p.1);
        }
        pb.close();
        if let Some(path) = pb.finish() {
            self.pixmap.fill_path(
                &path,
                &paint(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    pub fn stroke_polyline(&mut self, points: &[(f32, f32)], color: [u8; 4], width: f32) {
        let mut pb = PathBuilder::new();
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        pb.move_to(first.0, first.1);
        for p in rest {
            pb.line_to(p.0, p.1);
        }
        let Some(path) = pb.finish() else {
            return;
        };
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint(color), &stroke, Transform::identity(), None);
    }

    /// Converts the premultiplied pixmap into a straight-alpha image.
    pub fn into_image(self) -> RgbaImage {
        let (w, h) = (self.pixmap.width(), self.pixmap.height());
        let mut img = RgbaImage::new(w, h);
        for (dst, src) in img.pixels_mut().zip(self.pixmap.pixels()) {
            let c = src.demultiply();
            *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        img
    }
}

fn paint(color: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = true;
    paint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_starts_white_with_axes() {
        let mut canvas = Canvas::new(40, 30, 5.0).unwrap();
        canvas.draw_axes();
        let img = canvas.into_image();
        assert_eq!(img.dimensions(), (40, 30));
        assert_eq!(img.get_pixel(20, 10), &Rgba([255, 255, 255, 255]));
        assert_ne!(img.get_pixel(5, 15), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn fill_rect_paints_inside_only() {
        let mut canvas = Canvas::new(20, 20, 0.0).unwrap();
        canvas.fill_rect(5.0, 5.0, 10.0, 10.0, [255, 0, 0, 255]);
        let img = canvas.into_image();
        assert_eq!(img.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
        assert_eq!(img.get_pixel(1, 1), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn zero_size_canvas_is_an_error() {
        assert!(matches!(Canvas::new(0, 10, 1.0), Err(ProcessingError::Render(_))));
    }
}
