use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::io::Cursor;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 480;
const MARGIN: u32 = 40;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);

// One color per ranked entry, matching the score tables on the rendered
// pages.
const PALETTE: [Rgb<u8>; 5] = [
    Rgb([0x1a, 0x4a, 0x04]),
    Rgb([0x75, 0x00, 0x14]),
    Rgb([0x79, 0x57, 0x03]),
    Rgb([0x06, 0x21, 0x6c]),
    Rgb([0x3f, 0x03, 0x55]),
];

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("no scores to plot")]
    Empty,
    #[error("failed to encode chart: {0}")]
    Encode(#[from] image::ImageError),
}

/// Renders the ranked scores as a horizontal bar chart PNG, best score on
/// top. The x axis spans 0-100 percent with gridlines every 25.
pub fn score_chart_png(scores: &[(String, f32)]) -> Result<Vec<u8>, ChartError> {
    if scores.is_empty() {
        return Err(ChartError::Empty);
    }

    let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let plot_w = WIDTH - 2 * MARGIN;
    let plot_h = HEIGHT - 2 * MARGIN;

    for step in 1..=4u32 {
        let x = MARGIN + plot_w * step / 4;
        draw_filled_rect_mut(
            &mut canvas,
            Rect::at(x as i32, MARGIN as i32).of_size(1, plot_h),
            GRID,
        );
    }

    let rows = scores.len() as u32;
    let row_h = (plot_h / rows).max(1);
    let bar_h = (row_h * 7 / 10).max(1);
    for (i, (_, score)) in scores.iter().enumerate() {
        let frac = (score / 100.0).clamp(0.0, 1.0);
        let bar_w = ((plot_w as f32 * frac).round() as u32).max(1);
        let y = MARGIN + i as u32 * row_h + (row_h - bar_h) / 2;
        draw_filled_rect_mut(
            &mut canvas,
            Rect::at(MARGIN as i32, y as i32).of_size(bar_w, bar_h),
            PALETTE[i % PALETTE.len()],
        );
    }

    // Left and bottom axes drawn last so bars never overpaint them.
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(MARGIN as i32, MARGIN as i32).of_size(1, plot_h),
        AXIS,
    );
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(MARGIN as i32, (MARGIN + plot_h) as i32).of_size(plot_w, 1),
        AXIS,
    );

    let mut png = Vec::new();
    DynamicImage::ImageRgb8(canvas).write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(png)
}
