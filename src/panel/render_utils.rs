use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

const FOCAL_COLOR: Color32 = Color32::from_rgb(245, 206, 93);
const NEAR_COLOR: Color32 = Color32::from_rgb(103, 176, 255);
const FAR_COLOR: Color32 = Color32::from_rgb(118, 128, 146);
const MISSING_COLOR: Color32 = Color32::from_rgb(84, 88, 96);

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| ((a as f32 * (1.0 - amount)) + (b as f32 * amount)) as u8;

    Color32::from_rgba_unmultiplied(
        mix(base.r(), overlay.r()),
        mix(base.g(), overlay.g()),
        mix(base.b(), overlay.b()),
        mix(base.a(), overlay.a()),
    )
}

/// Focal gold, first ring blue, fading to grey with distance.
pub(super) fn hop_color(hop: usize, max_hops: usize, missing: bool) -> Color32 {
    if missing {
        return MISSING_COLOR;
    }
    if hop == 0 {
        return FOCAL_COLOR;
    }
    let span = max_hops.saturating_sub(1).max(1) as f32;
    blend_color(NEAR_COLOR, FAR_COLOR, (hop - 1) as f32 / span)
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.center() + pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    rect.expand(radius).contains(position)
}

/// Conservative bounding-box test; edges that only graze a corner still draw.
pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2) -> bool {
    Rect::from_two_pos(start, end).intersects(rect)
}

pub(super) fn screen_radius(radius: f32, zoom: f32) -> f32 {
    (radius * zoom.powf(0.40)).clamp(2.5, 46.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;

    #[test]
    fn hop_colors_fade_outward() {
        assert_eq!(hop_color(0, 3, false), FOCAL_COLOR);
        assert_eq!(hop_color(1, 3, false), NEAR_COLOR);
        assert_eq!(hop_color(3, 3, false), FAR_COLOR);
        assert_eq!(hop_color(0, 3, true), MISSING_COLOR);
    }

    #[test]
    fn visibility_checks() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 100.0));
        assert!(circle_visible(rect, pos2(-4.0, 50.0), 5.0));
        assert!(!circle_visible(rect, pos2(-10.0, 50.0), 5.0));
        assert!(edge_visible(rect, pos2(-50.0, 50.0), pos2(150.0, 50.0)));
        assert!(!edge_visible(rect, pos2(-50.0, -50.0), pos2(-10.0, 150.0)));
    }
}
