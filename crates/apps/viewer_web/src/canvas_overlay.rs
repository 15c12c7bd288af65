//! Color legends painted on a 2D canvas stacked over the GPU canvas.

use formats::Orientation;
use gpu::{ColorMapLayout, GpuError, Overlay2d};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

const FONT: &str = "12px sans-serif";
const TEXT_COLOR: &str = "#ffffff";
const LABEL_GAP: f64 = 4.0;

pub struct CanvasOverlay {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

fn js_error(value: JsValue) -> GpuError {
    GpuError::Draw(value.as_string().unwrap_or_else(|| format!("{value:?}")))
}

impl CanvasOverlay {
    pub fn from_canvas_id(canvas_id: &str) -> Result<Self, GpuError> {
        let missing = |what: &str| GpuError::Surface(format!("{what} missing"));
        let canvas = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| missing("document"))?
            .get_element_by_id(canvas_id)
            .ok_or_else(|| missing("overlay canvas"))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| GpuError::Surface("overlay element is not a canvas".to_string()))?;
        let ctx = canvas
            .get_context("2d")
            .map_err(js_error)?
            .ok_or_else(|| missing("2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| GpuError::Surface("unexpected 2d context type".to_string()))?;
        Ok(Self { canvas, ctx })
    }
}

impl Overlay2d for CanvasOverlay {
    fn begin(&mut self, width: u32, height: u32) {
        if self.canvas.width() != width || self.canvas.height() != height {
            self.canvas.set_width(width);
            self.canvas.set_height(height);
        }
        self.ctx
            .clear_rect(0.0, 0.0, f64::from(width), f64::from(height));
    }

    fn draw_color_map(&mut self, layout: &ColorMapLayout) -> Result<(), GpuError> {
        let x = f64::from(layout.rect.x);
        let y = f64::from(layout.rect.y);
        let w = f64::from(layout.rect.width);
        let h = f64::from(layout.rect.height);

        // Offset 0 is the minimum: left when horizontal, bottom when vertical.
        let gradient = match layout.orientation {
            Orientation::Horizontal => self.ctx.create_linear_gradient(x, y, x + w, y),
            Orientation::Vertical => self.ctx.create_linear_gradient(x, y + h, x, y),
        };
        for stop in &layout.stops {
            gradient
                .add_color_stop(stop.offset, &stop.css())
                .map_err(js_error)?;
        }
        self.ctx.set_fill_style_canvas_gradient(&gradient);
        self.ctx.fill_rect(x, y, w, h);

        self.ctx.set_font(FONT);
        self.ctx.set_fill_style_str(TEXT_COLOR);
        for label in &layout.labels {
            let t = f64::from(label.offset);
            let (lx, ly) = match layout.orientation {
                Orientation::Horizontal => (x + t * w, y + h + LABEL_GAP),
                Orientation::Vertical => (x + w + LABEL_GAP, y + h - t * h),
            };
            match layout.orientation {
                Orientation::Horizontal => {
                    self.ctx.set_text_align("center");
                    self.ctx.set_text_baseline("top");
                }
                Orientation::Vertical => {
                    self.ctx.set_text_align("left");
                    self.ctx.set_text_baseline("middle");
                }
            }
            self.ctx.fill_text(&label.text, lx, ly).map_err(js_error)?;
        }

        if !layout.title.is_empty() {
            self.ctx.set_text_align("left");
            self.ctx.set_text_baseline("bottom");
            self.ctx
                .fill_text(&layout.title, x, y - LABEL_GAP)
                .map_err(js_error)?;
        }
        Ok(())
    }
}
