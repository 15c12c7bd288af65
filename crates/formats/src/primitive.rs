/// Row-major identity, as it appears on the wire.
pub const IDENTITY_ROW_MAJOR: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Indexed triangle mesh. `vertices`/`normals` are xyz triples, `colors` are
/// RGBA in `[0, 1]`, `matrix` is the row-major object transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub normals: Vec<f32>,
    pub colors: Vec<f32>,
    pub indices: Vec<u16>,
    pub matrix: [f32; 16],
}

/// Indexed line segments. Normals are synthesized (all zero) so lines can
/// share the lit program with meshes.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSet {
    pub points: Vec<f32>,
    pub normals: Vec<f32>,
    pub colors: Vec<f32>,
    pub indices: Vec<u16>,
    pub matrix: [f32; 16],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    pub points: Vec<f32>,
    pub colors: Vec<f32>,
    pub matrix: [f32; 16],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub scalar: f32,
    pub rgb: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn from_wire(value: u8) -> Self {
        if value == 0 {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Orientation::Horizontal => 0,
            Orientation::Vertical => 1,
        }
    }
}

/// Scalar-bar legend drawn in screen space after the 3D pass.
/// `position` and `size` are fractions of the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMapWidget {
    pub position: [f32; 2],
    pub size: [f32; 2],
    pub stops: Vec<ColorStop>,
    pub orientation: Orientation,
    pub num_labels: u8,
    pub title: String,
}

impl ColorMapWidget {
    /// Scalar range covered by the stops, `None` when there are no stops.
    pub fn range(&self) -> Option<(f32, f32)> {
        let first = self.stops.first()?;
        let (mut lo, mut hi) = (first.scalar, first.scalar);
        for stop in &self.stops[1..] {
            lo = lo.min(stop.scalar);
            hi = hi.max(stop.scalar);
        }
        Some((lo, hi))
    }
}

/// One decoded object part.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Mesh(Mesh),
    Lines(LineSet),
    Points(PointSet),
    ColorMap(ColorMapWidget),
}

impl Primitive {
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Mesh(_) => "mesh",
            Primitive::Lines(_) => "lines",
            Primitive::Points(_) => "points",
            Primitive::ColorMap(_) => "color_map",
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Primitive::Mesh(_) => crate::wire::TAG_MESH,
            Primitive::Lines(_) => crate::wire::TAG_LINES,
            Primitive::Points(_) => crate::wire::TAG_POINTS,
            Primitive::ColorMap(_) => crate::wire::TAG_COLOR_MAP,
        }
    }

    /// Row-major object transform; color maps live in screen space and have none.
    pub fn matrix(&self) -> Option<&[f32; 16]> {
        match self {
            Primitive::Mesh(m) => Some(&m.matrix),
            Primitive::Lines(l) => Some(&l.matrix),
            Primitive::Points(p) => Some(&p.matrix),
            Primitive::ColorMap(_) => None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            Primitive::Mesh(m) => m.vertices.len() / 3,
            Primitive::Lines(l) => l.points.len() / 3,
            Primitive::Points(p) => p.points.len() / 3,
            Primitive::ColorMap(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_map_range_spans_unsorted_stops() {
        let widget = ColorMapWidget {
            position: [0.0, 0.0],
            size: [0.1, 0.5],
            stops: vec![
                ColorStop { scalar: 2.0, rgb: [0.0; 3] },
                ColorStop { scalar: -1.0, rgb: [1.0; 3] },
                ColorStop { scalar: 0.5, rgb: [0.5; 3] },
            ],
            orientation: Orientation::Vertical,
            num_labels: 3,
            title: String::new(),
        };
        assert_eq!(widget.range(), Some((-1.0, 2.0)));
    }

    #[test]
    fn orientation_zero_is_horizontal() {
        assert_eq!(Orientation::from_wire(0), Orientation::Horizontal);
        assert_eq!(Orientation::from_wire(1), Orientation::Vertical);
        assert_eq!(Orientation::from_wire(7), Orientation::Vertical);
        assert_eq!(Orientation::Vertical.to_wire(), 1);
    }
}
