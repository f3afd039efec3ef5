//! Preview compositing using tiny-skia
//!
//! The scaled frame is placed in the display area, then code outlines and
//! the text overlays are drawn on top.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use super::geometry::{self, label, outline, photo};
use super::text;
use crate::config::{OverlayColor, OverlayColors};
use crate::session::{DetectionMode, OverlayRole, SelectionArbiter, ViewportMapper};

const BAR_COLOR: [u8; 4] = [0, 0, 0, 255];

/// How code outlines are drawn
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub colors: OverlayColors,
    pub thickness: f32,
}

impl OverlayStyle {
    pub fn color_for(&self, role: OverlayRole) -> OverlayColor {
        match role {
            OverlayRole::Hovered => self.colors.highlight,
            OverlayRole::Displayed(DetectionMode::Manual) => self.colors.manual,
            OverlayRole::Displayed(DetectionMode::Auto) => self.colors.auto,
            OverlayRole::Other => self.colors.neutral,
        }
    }
}

/// Convert RgbaImage to Pixmap, apply drawing function, and copy back
fn with_pixmap(img: &mut RgbaImage, f: impl FnOnce(&mut Pixmap)) {
    let Some(size) = tiny_skia::IntSize::from_wh(img.width(), img.height()) else {
        return;
    };
    let Some(mut pixmap) = Pixmap::from_vec(img.as_raw().clone(), size) else {
        return;
    };

    f(&mut pixmap);

    // Copy back
    img.copy_from_slice(pixmap.data());
}

/// Build a closed path through the points; None below two points
fn build_polygon_path(points: &[(f32, f32)]) -> Option<tiny_skia::Path> {
    let ((first_x, first_y), rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }

    let mut pb = PathBuilder::new();
    pb.move_to(*first_x, *first_y);
    for (x, y) in rest {
        pb.line_to(*x, *y);
    }
    // Closing edge last -> first
    pb.close();
    pb.finish()
}

/// Stroke a closed polygon outline with a dark shadow underneath
pub fn draw_polygon(img: &mut RgbaImage, points: &[(f32, f32)], color: OverlayColor, thickness: f32) {
    let Some(path) = build_polygon_path(points) else {
        return;
    };

    with_pixmap(img, |pixmap| {
        let mut shadow = Paint::default();
        shadow.set_color_rgba8(0, 0, 0, outline::SHADOW_ALPHA);
        shadow.anti_alias = true;
        let shadow_stroke = Stroke {
            width: thickness + outline::SHADOW * 2.0,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        };
        pixmap.stroke_path(&path, &shadow, &shadow_stroke, Transform::identity(), None);

        let mut paint = Paint::default();
        paint.set_color(color.to_skia());
        paint.anti_alias = true;
        let stroke = Stroke {
            width: thickness,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    });
}

/// Scale the frame into a display-sized canvas, centered with black bars
pub fn letterbox(frame: &RgbaImage, viewport: &ViewportMapper, display: (u32, u32)) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(display.0, display.1, Rgba(BAR_COLOR));
    let (w, h) = viewport.displayed_size();
    if w == 0 || h == 0 || frame.width() == 0 || frame.height() == 0 {
        return canvas;
    }

    let scaled = if (w, h) == frame.dimensions() {
        frame.clone()
    } else {
        imageops::resize(frame, w, h, FilterType::Triangle)
    };
    imageops::overlay(
        &mut canvas,
        &scaled,
        viewport.offset.0.round() as i64,
        viewport.offset.1.round() as i64,
    );
    canvas
}

/// Printable form of a payload for the tooltip
fn tooltip_text(payload: &str) -> String {
    let mut text: String = payload
        .chars()
        .map(|c| if c.is_control() { '.' } else { c })
        .take(label::TOOLTIP_MAX_CHARS)
        .collect();
    if payload.chars().count() > label::TOOLTIP_MAX_CHARS {
        text.push_str("...");
    }
    text
}

/// Build the preview the operator sees: letterboxed frame, outlines
/// colored by role, the detection mode label and the hover tooltip.
pub fn compose(
    frame: &RgbaImage,
    arbiter: &SelectionArbiter,
    display: (u32, u32),
    style: &OverlayStyle,
) -> RgbaImage {
    let viewport = arbiter.viewport();
    let mut canvas = letterbox(frame, viewport, display);

    for code in arbiter.codes() {
        if !code.polygon.is_drawable() {
            continue;
        }
        let points = geometry::polygon_to_screen(&code.polygon, viewport);
        let color = style.color_for(arbiter.overlay_role(code));
        draw_polygon(&mut canvas, &points, color, style.thickness);
    }

    text::draw_label(
        &mut canvas,
        label::MARGIN,
        label::MARGIN,
        arbiter.mode().label(),
        label::TEXT,
        label::BACKGROUND,
        label::MODE_SCALE,
        label::PADDING,
    );

    if let Some((payload, (px, py))) = arbiter.tooltip() {
        let tip = tooltip_text(&payload);
        let (tw, th) = text::text_size(&tip, label::TOOLTIP_SCALE);
        let size = (tw + label::PADDING * 2, th + label::PADDING * 2);
        let pos = geometry::clamp_box(
            (
                px as i32 + label::TOOLTIP_OFFSET.0,
                py as i32 + label::TOOLTIP_OFFSET.1,
            ),
            size,
            display,
        );
        text::draw_label(
            &mut canvas,
            pos.0,
            pos.1,
            &tip,
            label::TEXT,
            label::BACKGROUND,
            label::TOOLTIP_SCALE,
            label::PADDING,
        );
    }

    canvas
}

/// Stand-in shown when a part has no photo
pub fn photo_placeholder() -> RgbaImage {
    let size = photo::PLACEHOLDER_SIZE;
    let mut img = RgbaImage::from_pixel(size, size, Rgba([200, 200, 200, 255]));
    let border = [
        (0.0, 0.0),
        (size as f32, 0.0),
        (size as f32, size as f32),
        (0.0, size as f32),
    ];
    draw_polygon(&mut img, &border, OverlayColor::rgb(0.5, 0.5, 0.5), 4.0);
    let (tw, th) = text::text_size("NO IMAGE", 1);
    text::draw_text(
        &mut img,
        (size as i32 - tw as i32) / 2,
        (size as i32 - th as i32) / 2,
        "NO IMAGE",
        [80, 80, 80, 255],
        1,
    );
    img
}
