//! Screen-space 2D pass drawn on top of the 3D frame (color legends).

use formats::{ColorMapWidget, Orientation};

use crate::backend::GpuError;

/// 2D drawing surface layered over the GPU canvas.
pub trait Overlay2d {
    /// Clears the overlay and sizes it to the canvas.
    fn begin(&mut self, width: u32, height: u32);
    fn draw_color_map(&mut self, layout: &ColorMapLayout) -> Result<(), GpuError>;
}

/// Pixel rectangle with a top-left origin, as 2D canvases use.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientStop {
    /// Position along the bar, 0 at the minimum scalar.
    pub offset: f32,
    pub rgb: [u8; 3],
}

impl GradientStop {
    pub fn css(&self) -> String {
        format!("rgb({},{},{})", self.rgb[0], self.rgb[1], self.rgb[2])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub value: f32,
    pub text: String,
    /// Position along the bar, 0 at the minimum scalar.
    pub offset: f32,
}

/// Everything a 2D backend needs to paint one legend.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMapLayout {
    pub rect: PixelRect,
    pub orientation: Orientation,
    pub stops: Vec<GradientStop>,
    pub labels: Vec<Label>,
    pub title: String,
}

impl ColorMapLayout {
    /// Lays `widget` out on a `width` x `height` canvas. Widget fractions are
    /// measured from the bottom-left corner.
    pub fn compute(widget: &ColorMapWidget, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let [px, py] = widget.position;
        let [sx, sy] = widget.size;
        let rect = PixelRect {
            x: px * w,
            y: (1.0 - py - sy) * h,
            width: sx * w,
            height: sy * h,
        };

        let (lo, hi) = widget.range().unwrap_or((0.0, 0.0));
        let span = hi - lo;
        let offset = |scalar: f32| {
            if span > 0.0 {
                ((scalar - lo) / span).clamp(0.0, 1.0)
            } else {
                0.0
            }
        };

        let stops = widget
            .stops
            .iter()
            .map(|stop| GradientStop {
                offset: offset(stop.scalar),
                rgb: stop.rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8),
            })
            .collect();

        let count = usize::from(widget.num_labels);
        let labels = if widget.stops.is_empty() {
            Vec::new()
        } else {
            (0..count)
                .map(|i| {
                    let t = if count > 1 { i as f32 / (count - 1) as f32 } else { 0.0 };
                    let value = lo + span * t;
                    Label {
                        value,
                        text: format_label(value),
                        offset: t,
                    }
                })
                .collect()
        };

        Self {
            rect,
            orientation: widget.orientation,
            stops,
            labels,
            title: widget.title.clone(),
        }
    }
}

/// Short numeric label: fixed notation for moderate magnitudes, scientific
/// otherwise.
pub fn format_label(value: f32) -> String {
    let magnitude = value.abs();
    if value == 0.0 {
        "0".to_string()
    } else if !(1e-3..1e5).contains(&magnitude) {
        format!("{value:.3e}")
    } else {
        let text = format!("{value:.3}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formats::ColorStop;
    use pretty_assertions::assert_eq;

    fn widget(num_labels: u8) -> ColorMapWidget {
        ColorMapWidget {
            position: [0.25, 0.25],
            size: [0.5, 0.25],
            stops: vec![
                ColorStop {
                    scalar: -1.0,
                    rgb: [0.0, 0.0, 1.0],
                },
                ColorStop {
                    scalar: 3.0,
                    rgb: [1.0, 0.0, 0.0],
                },
            ],
            orientation: Orientation::Horizontal,
            num_labels,
            title: "Pressure".to_string(),
        }
    }

    #[test]
    fn rect_is_flipped_to_top_left_origin() {
        let layout = ColorMapLayout::compute(&widget(0), 1000, 400);
        assert_eq!(
            layout.rect,
            PixelRect {
                x: 250.0,
                y: 200.0,
                width: 500.0,
                height: 100.0,
            }
        );
        assert_eq!(layout.title, "Pressure");
    }

    #[test]
    fn stops_are_normalized_over_the_scalar_range() {
        let layout = ColorMapLayout::compute(&widget(0), 100, 100);
        assert_eq!(layout.stops[0].offset, 0.0);
        assert_eq!(layout.stops[1].offset, 1.0);
        assert_eq!(layout.stops[1].css(), "rgb(255,0,0)");
    }

    #[test]
    fn labels_spread_from_min_to_max() {
        let layout = ColorMapLayout::compute(&widget(3), 100, 100);
        let texts: Vec<&str> = layout.labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["-1", "1", "3"]);
        assert_eq!(layout.labels[1].offset, 0.5);

        assert_eq!(ColorMapLayout::compute(&widget(1), 100, 100).labels[0].value, -1.0);
    }

    #[test]
    fn labels_switch_to_scientific_notation() {
        assert_eq!(format_label(0.0), "0");
        assert_eq!(format_label(2.5), "2.5");
        assert_eq!(format_label(123456.0), "1.235e5");
        assert_eq!(format_label(0.0001), "1.000e-4");
    }
}
