// Presentation only: a line chart of the result series and a heat map of the
// per-bucket MI contributions. Neither feeds back into the registration.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use mi_align::pipeline::{MiBreakdown, ResultSeries, ShiftScore};

const CHART_WIDTH: u32 = 800;
const CHART_HEIGHT: u32 = 480;
const MARGIN: u32 = 40;
const HEATMAP_TARGET: u32 = 512;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);
const LINE: Rgb<u8> = Rgb([30, 90, 200]);
const MARK: Rgb<u8> = Rgb([220, 30, 30]);

/// Renders score against shift. `best` is highlighted when given.
pub fn render_series(series: &ResultSeries, best: Option<ShiftScore>) -> RgbImage {
    let mut chart = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, WHITE);
    let (left, right) = (MARGIN as f32, (CHART_WIDTH - MARGIN) as f32);
    let (top, bottom) = (MARGIN as f32, (CHART_HEIGHT - MARGIN) as f32);

    let scores = series.scores();
    let (low, high) = scores
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    let span = if high > low { high - low } else { 1.0 };
    let last_shift = series.len().saturating_sub(1).max(1) as f32;

    let to_point = |shift: usize, score: f64| -> (f32, f32) {
        let x = left + (right - left) * shift as f32 / last_shift;
        let y = bottom - (bottom - top) * ((score - low) / span) as f32;
        (x, y)
    };

    // Vertical guide every 5 shifts.
    for shift in (0..series.len()).step_by(5) {
        let (x, _) = to_point(shift, low);
        draw_line_segment_mut(&mut chart, (x, top), (x, bottom), GRID);
    }
    draw_line_segment_mut(&mut chart, (left, bottom), (right, bottom), BLACK);
    draw_line_segment_mut(&mut chart, (left, top), (left, bottom), BLACK);

    for pair in series.entries().windows(2) {
        let start = to_point(pair[0].shift, pair[0].score);
        let end = to_point(pair[1].shift, pair[1].score);
        draw_line_segment_mut(&mut chart, start, end, LINE);
    }

    if let Some(best) = best {
        let (x, y) = to_point(best.shift, best.score);
        draw_filled_rect_mut(&mut chart, Rect::at(x as i32 - 3, y as i32 - 3).of_size(7, 7), MARK);
    }
    chart
}

/// Blue -> yellow -> red ramp over `ratio` in [0, 1].
pub fn heat_color(ratio: f64) -> Rgb<u8> {
    let ratio = ratio.clamp(0.0, 1.0);
    let (r, g, b) = if ratio <= 0.5 {
        let t = ratio / 0.5;
        (0.0, 255.0 * t, 255.0 * (1.0 - t))
    } else {
        let t = (ratio - 0.5) / 0.5;
        (255.0 * t, 255.0 * (1.0 - t), 0.0)
    };
    Rgb([r as u8, g as u8, b as u8])
}

/// Renders the signed contribution grid. Zero maps to the middle of the ramp.
pub fn render_contributions(breakdown: &MiBreakdown) -> RgbImage {
    let bins = breakdown.x_bins.max(breakdown.y_bins).max(1) as u32;
    let cell = (HEATMAP_TARGET / bins).max(1);
    let width = breakdown.y_bins as u32 * cell;
    let height = breakdown.x_bins as u32 * cell;
    let mut heatmap = RgbImage::from_pixel(width.max(1), height.max(1), BLACK);

    let extent = breakdown
        .contributions
        .iter()
        .fold(0.0_f64, |acc, c| acc.max(c.abs()));
    let extent = if extent > 0.0 { extent } else { 1.0 };

    for x_bin in 0..breakdown.x_bins {
        for y_bin in 0..breakdown.y_bins {
            let ratio = (breakdown.contribution(x_bin, y_bin) / extent + 1.0) / 2.0;
            let rect = Rect::at((y_bin as u32 * cell) as i32, (x_bin as u32 * cell) as i32)
                .of_size(cell, cell);
            draw_filled_rect_mut(&mut heatmap, rect, heat_color(ratio));
        }
    }
    heatmap
}
