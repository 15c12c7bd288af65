use crate::primitive::{ColorMapWidget, LineSet, Mesh, PointSet, Primitive};
use crate::wire::{HEADER_LEN, TAG_COLOR_MAP, TAG_LINES, TAG_MESH, TAG_POINTS, WireError};

/// Encoder producing the byte layout `wire::decode` reads.
///
/// Colors are quantized to `u8` per channel, so a round trip is exact only
/// for channels that are multiples of `1/255`.
#[derive(Debug, Default)]
pub struct WireWriter {
    out: Vec<u8>,
}

impl WireWriter {
    pub fn encode(primitive: &Primitive) -> Result<Vec<u8>, WireError> {
        let mut w = WireWriter::default();
        // Header is patched once the body length is known.
        w.out.extend_from_slice(&[0; 4]);
        w.out.push(primitive.tag());

        let header = match primitive {
            Primitive::Mesh(mesh) => {
                w.mesh(mesh)?;
                w.body_len()?
            }
            Primitive::Lines(lines) => {
                w.lines(lines)?;
                w.body_len()?
            }
            Primitive::Points(points) => {
                w.points(points)?;
                w.body_len()?
            }
            Primitive::ColorMap(widget) => {
                w.color_map(widget);
                count("color stops", widget.stops.len())?
            }
        };
        w.out[..4].copy_from_slice(&header.to_le_bytes());
        Ok(w.out)
    }

    fn body_len(&self) -> Result<u32, WireError> {
        count("payload", self.out.len() - HEADER_LEN)
    }

    fn mesh(&mut self, mesh: &Mesh) -> Result<(), WireError> {
        self.u32(count("vertices", mesh.vertices.len() / 3)?);
        self.f32s(&mesh.vertices);
        self.f32s(&mesh.normals);
        self.unorm8s(&mesh.colors);
        self.u32(count("indices", mesh.indices.len())?);
        self.u16s(&mesh.indices);
        self.f32s(&mesh.matrix);
        Ok(())
    }

    fn lines(&mut self, lines: &LineSet) -> Result<(), WireError> {
        self.u32(count("points", lines.points.len() / 3)?);
        self.f32s(&lines.points);
        self.unorm8s(&lines.colors);
        self.u32(count("indices", lines.indices.len())?);
        self.u16s(&lines.indices);
        self.f32s(&lines.matrix);
        Ok(())
    }

    fn points(&mut self, points: &PointSet) -> Result<(), WireError> {
        self.u32(count("points", points.points.len() / 3)?);
        self.f32s(&points.points);
        self.unorm8s(&points.colors);
        self.f32s(&points.matrix);
        Ok(())
    }

    fn color_map(&mut self, widget: &ColorMapWidget) {
        self.f32s(&widget.position);
        self.f32s(&widget.size);
        for stop in &widget.stops {
            self.f32s(&[stop.scalar]);
            self.unorm8s(&stop.rgb);
        }
        self.out.push(widget.orientation.to_wire());
        self.out.push(widget.num_labels);
        self.out.extend_from_slice(widget.title.as_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn f32s(&mut self, values: &[f32]) {
        for v in values {
            self.out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn u16s(&mut self, values: &[u16]) {
        for v in values {
            self.out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn unorm8s(&mut self, values: &[f32]) {
        self.out
            .extend(values.iter().map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8));
    }
}

fn count(field: &'static str, len: usize) -> Result<u32, WireError> {
    u32::try_from(len).map_err(|_| WireError::Oversized { field, len })
}
