//! Binary geometry payloads returned by `getWebGLData`.
//!
//! Every payload is little-endian: `[u32 header][u8 tag][body]`. For `M`, `L`
//! and `P` the header carries the body size and is informational only; for `C`
//! it is the number of color stops.

use crate::primitive::{
    ColorMapWidget, ColorStop, LineSet, Mesh, Orientation, PointSet, Primitive,
};
use thiserror::Error;

pub const HEADER_LEN: usize = 5;
pub const MATRIX_LEN: usize = 16;

pub const TAG_MESH: u8 = b'M';
pub const TAG_LINES: u8 = b'L';
pub const TAG_POINTS: u8 = b'P';
pub const TAG_COLOR_MAP: u8 = b'C';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedPayload {
    #[error("payload of {len} bytes is shorter than the {HEADER_LEN}-byte header")]
    ShortHeader { len: usize },
    #[error("unknown type tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("{field} needs {needed} bytes at offset {offset}, {available} remain")]
    Overrun {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] MalformedPayload),
    #[error("invalid base64 payload: {0}")]
    Base64(String),
    #[error("{field} has {len} elements, more than the wire format can carry")]
    Oversized { field: &'static str, len: usize },
}

/// Decodes one object part.
pub fn decode(bytes: &[u8]) -> Result<Primitive, WireError> {
    if bytes.len() < HEADER_LEN {
        return Err(MalformedPayload::ShortHeader { len: bytes.len() }.into());
    }

    let mut r = Reader::new(bytes);
    let header = r.read_u32("header")?;
    let tag = r.read_u8("tag")?;

    let primitive = match tag {
        TAG_MESH => Primitive::Mesh(decode_mesh(&mut r)?),
        TAG_LINES => Primitive::Lines(decode_lines(&mut r)?),
        TAG_POINTS => Primitive::Points(decode_points(&mut r)?),
        TAG_COLOR_MAP => Primitive::ColorMap(decode_color_map(&mut r, header)?),
        other => return Err(MalformedPayload::UnknownTag(other).into()),
    };

    if r.remaining() > 0 {
        tracing::debug!(
            kind = primitive.kind(),
            trailing = r.remaining(),
            "ignoring trailing bytes after payload"
        );
    }
    Ok(primitive)
}

fn decode_mesh(r: &mut Reader<'_>) -> Result<Mesh, MalformedPayload> {
    let n = r.read_count("vertex count")?;
    let vertices = r.read_f32s("vertices", n, 3)?;
    let normals = r.read_f32s("normals", n, 3)?;
    let colors = r.read_unorm8s("vertex colors", n, 4)?;
    let index_count = r.read_count("index count")?;
    let indices = r.read_u16s("indices", index_count)?;
    let matrix = r.read_matrix()?;
    Ok(Mesh {
        vertices,
        normals,
        colors,
        indices,
        matrix,
    })
}

fn decode_lines(r: &mut Reader<'_>) -> Result<LineSet, MalformedPayload> {
    let n = r.read_count("point count")?;
    let points = r.read_f32s("points", n, 3)?;
    let colors = r.read_unorm8s("point colors", n, 4)?;
    let index_count = r.read_count("index count")?;
    let indices = r.read_u16s("indices", index_count)?;
    let matrix = r.read_matrix()?;
    let normals = vec![0.0; points.len()];
    Ok(LineSet {
        points,
        normals,
        colors,
        indices,
        matrix,
    })
}

fn decode_points(r: &mut Reader<'_>) -> Result<PointSet, MalformedPayload> {
    let n = r.read_count("point count")?;
    let points = r.read_f32s("points", n, 3)?;
    let colors = r.read_unorm8s("point colors", n, 4)?;
    let matrix = r.read_matrix()?;
    Ok(PointSet {
        points,
        colors,
        matrix,
    })
}

fn decode_color_map(r: &mut Reader<'_>, num_colors: u32) -> Result<ColorMapWidget, MalformedPayload> {
    let position = r.read_f32_pair("position")?;
    let size = r.read_f32_pair("size")?;

    // Each stop is 7 bytes; check the whole span before allocating.
    let num_colors = num_colors as usize;
    r.ensure("color stops", num_colors, 7)?;
    let mut stops = Vec::with_capacity(num_colors);
    for _ in 0..num_colors {
        let scalar = r.read_f32("color stop scalar")?;
        let rgb = r.take("color stop rgb", 3)?;
        stops.push(ColorStop {
            scalar,
            rgb: [unorm8(rgb[0]), unorm8(rgb[1]), unorm8(rgb[2])],
        });
    }

    let orientation = Orientation::from_wire(r.read_u8("orientation")?);
    let num_labels = r.read_u8("label count")?;
    let title = String::from_utf8_lossy(r.rest()).into_owned();

    Ok(ColorMapWidget {
        position,
        size,
        stops,
        orientation,
        num_labels,
        title,
    })
}

fn unorm8(v: u8) -> f32 {
    f32::from(v) / 255.0
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn overrun(&self, field: &'static str, needed: usize) -> MalformedPayload {
        MalformedPayload::Overrun {
            field,
            offset: self.pos,
            needed,
            available: self.remaining(),
        }
    }

    /// Byte span of `count` elements of `stride` bytes, checked against what remains.
    fn ensure(&self, field: &'static str, count: usize, stride: usize) -> Result<usize, MalformedPayload> {
        let needed = count
            .checked_mul(stride)
            .ok_or_else(|| self.overrun(field, usize::MAX))?;
        if needed > self.remaining() {
            return Err(self.overrun(field, needed));
        }
        Ok(needed)
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], MalformedPayload> {
        if len > self.remaining() {
            return Err(self.overrun(field, len));
        }
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn rest(&mut self) -> &'a [u8] {
        let out = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        out
    }

    fn read_u8(&mut self, field: &'static str) -> Result<u8, MalformedPayload> {
        Ok(self.take(field, 1)?[0])
    }

    fn read_u32(&mut self, field: &'static str) -> Result<u32, MalformedPayload> {
        let b = self.take(field, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_count(&mut self, field: &'static str) -> Result<usize, MalformedPayload> {
        Ok(self.read_u32(field)? as usize)
    }

    fn read_f32(&mut self, field: &'static str) -> Result<f32, MalformedPayload> {
        let b = self.take(field, 4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f32_pair(&mut self, field: &'static str) -> Result<[f32; 2], MalformedPayload> {
        let b = self.take(field, 8)?;
        Ok([
            f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            f32::from_le_bytes([b[4], b[5], b[6], b[7]]),
        ])
    }

    fn read_f32s(
        &mut self,
        field: &'static str,
        count: usize,
        components: usize,
    ) -> Result<Vec<f32>, MalformedPayload> {
        let elements = count
            .checked_mul(components)
            .ok_or_else(|| self.overrun(field, usize::MAX))?;
        let len = self.ensure(field, elements, 4)?;
        let bytes = self.take(field, len)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn read_u16s(&mut self, field: &'static str, count: usize) -> Result<Vec<u16>, MalformedPayload> {
        let len = self.ensure(field, count, 2)?;
        let bytes = self.take(field, len)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect())
    }

    fn read_unorm8s(
        &mut self,
        field: &'static str,
        count: usize,
        channels: usize,
    ) -> Result<Vec<f32>, MalformedPayload> {
        let len = self.ensure(field, count, channels)?;
        Ok(self.take(field, len)?.iter().copied().map(unorm8).collect())
    }

    fn read_matrix(&mut self) -> Result<[f32; 16], MalformedPayload> {
        let values = self.read_f32s("matrix", MATRIX_LEN, 1)?;
        let mut m = [0.0f32; MATRIX_LEN];
        m.copy_from_slice(&values);
        Ok(m)
    }
}
