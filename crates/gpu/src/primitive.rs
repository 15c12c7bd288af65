use formats::{ColorMapWidget, Primitive};
use foundation::math::{Mat4, mat4_from_row_major};

use crate::backend::{
    BufferId, BufferKind, DrawCall, GpuBackend, GpuError, IndexRange, Topology, VertexStreams,
};

/// Geometry resident in GPU buffers. Owned exclusively; the buffers are only
/// deleted through [`GpuPrimitive::release`].
#[derive(Debug, PartialEq)]
pub struct GpuGeometry {
    pub topology: Topology,
    pub streams: VertexStreams,
    pub index: Option<IndexRange>,
    pub vertex_count: u32,
    /// Object matrix, converted from the row-major wire layout.
    pub matrix: Mat4,
}

impl GpuGeometry {
    pub fn draw_call(&self) -> DrawCall {
        DrawCall {
            topology: self.topology,
            vertex_count: self.vertex_count,
            streams: Some(self.streams),
            index: self.index,
        }
    }

    fn buffers(&self) -> Vec<BufferId> {
        let mut out = vec![self.streams.position, self.streams.color];
        out.extend(self.streams.normal);
        out.extend(self.index.map(|i| i.buffer));
        out
    }
}

#[derive(Debug, PartialEq)]
pub enum GpuPrimitive {
    Mesh(GpuGeometry),
    Lines(GpuGeometry),
    Points(GpuGeometry),
    /// Screen-space legend, drawn by the 2D overlay; holds no buffers.
    ColorMap(ColorMapWidget),
    /// A part with no vertices.
    Empty,
}

impl GpuPrimitive {
    /// Uploads a decoded part. On failure every buffer created so far is
    /// deleted again.
    pub fn upload<B: GpuBackend + ?Sized>(backend: &mut B, primitive: Primitive) -> Result<Self, GpuError> {
        let mut uploader = Uploader {
            backend,
            created: Vec::new(),
        };
        let result = uploader.upload(primitive);
        if result.is_err() {
            for buffer in uploader.created.drain(..) {
                uploader.backend.delete_buffer(buffer);
            }
        }
        result
    }

    pub fn release<B: GpuBackend + ?Sized>(self, backend: &mut B) {
        for buffer in self.buffers() {
            backend.delete_buffer(buffer);
        }
    }

    pub fn geometry(&self) -> Option<&GpuGeometry> {
        match self {
            GpuPrimitive::Mesh(g) | GpuPrimitive::Lines(g) | GpuPrimitive::Points(g) => Some(g),
            GpuPrimitive::ColorMap(_) | GpuPrimitive::Empty => None,
        }
    }

    pub fn buffers(&self) -> Vec<BufferId> {
        self.geometry().map(GpuGeometry::buffers).unwrap_or_default()
    }
}

struct Uploader<'a, B: GpuBackend + ?Sized> {
    backend: &'a mut B,
    created: Vec<BufferId>,
}

impl<B: GpuBackend + ?Sized> Uploader<'_, B> {
    fn upload(&mut self, primitive: Primitive) -> Result<GpuPrimitive, GpuError> {
        match primitive {
            Primitive::Mesh(m) => {
                if m.vertices.is_empty() {
                    return Ok(GpuPrimitive::Empty);
                }
                let geometry = self.geometry(
                    Topology::Triangles,
                    &m.vertices,
                    Some(&m.normals),
                    &m.colors,
                    Some(&m.indices),
                    &m.matrix,
                )?;
                Ok(GpuPrimitive::Mesh(geometry))
            }
            Primitive::Lines(l) => {
                if l.points.is_empty() {
                    return Ok(GpuPrimitive::Empty);
                }
                let geometry = self.geometry(
                    Topology::Lines,
                    &l.points,
                    Some(&l.normals),
                    &l.colors,
                    Some(&l.indices),
                    &l.matrix,
                )?;
                Ok(GpuPrimitive::Lines(geometry))
            }
            Primitive::Points(p) => {
                if p.points.is_empty() {
                    return Ok(GpuPrimitive::Empty);
                }
                let geometry =
                    self.geometry(Topology::Points, &p.points, None, &p.colors, None, &p.matrix)?;
                Ok(GpuPrimitive::Points(geometry))
            }
            Primitive::ColorMap(widget) => Ok(GpuPrimitive::ColorMap(widget)),
        }
    }

    fn buffer(&mut self, kind: BufferKind, bytes: &[u8]) -> Result<BufferId, GpuError> {
        let id = self.backend.create_buffer(kind, bytes)?;
        self.created.push(id);
        Ok(id)
    }

    fn geometry(
        &mut self,
        topology: Topology,
        positions: &[f32],
        normals: Option<&[f32]>,
        colors: &[f32],
        indices: Option<&[u16]>,
        matrix: &[f32; 16],
    ) -> Result<GpuGeometry, GpuError> {
        let vertex_count = positions.len() / 3;
        if colors.len() != vertex_count * 4 {
            return Err(GpuError::Buffer(format!(
                "{} color values for {vertex_count} vertices",
                colors.len()
            )));
        }
        if let Some(normals) = normals
            && normals.len() != positions.len()
        {
            return Err(GpuError::Buffer(format!(
                "{} normal values for {vertex_count} vertices",
                normals.len()
            )));
        }
        if let Some(indices) = indices
            && let Some(&max) = indices.iter().max()
            && usize::from(max) >= vertex_count
        {
            return Err(GpuError::Buffer(format!(
                "index {max} out of range for {vertex_count} vertices"
            )));
        }

        let position = self.buffer(BufferKind::Vertex, bytemuck::cast_slice(positions))?;
        let normal = match normals {
            Some(n) => Some(self.buffer(BufferKind::Vertex, bytemuck::cast_slice(n))?),
            None => None,
        };
        let color = self.buffer(BufferKind::Vertex, bytemuck::cast_slice(colors))?;
        let index = match indices {
            Some(i) if !i.is_empty() => Some(IndexRange {
                buffer: self.buffer(BufferKind::Index, bytemuck::cast_slice(i))?,
                count: i.len() as u32,
            }),
            _ => None,
        };

        Ok(GpuGeometry {
            topology,
            streams: VertexStreams {
                position,
                normal,
                color,
            },
            index,
            vertex_count: vertex_count as u32,
            matrix: mat4_from_row_major(matrix),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingBackend;
    use formats::{IDENTITY_ROW_MAJOR, LineSet, Mesh, PointSet};

    fn triangle() -> Primitive {
        Primitive::Mesh(Mesh {
            vertices: vec![0.0; 9],
            normals: vec![0.0; 9],
            colors: vec![1.0; 12],
            indices: vec![0, 1, 2],
            matrix: IDENTITY_ROW_MAJOR,
        })
    }

    #[test]
    fn mesh_uploads_four_buffers_and_releases_them() {
        let mut backend = RecordingBackend::new();
        let gpu = GpuPrimitive::upload(&mut backend, triangle()).expect("upload");
        assert_eq!(backend.live_buffers().len(), 4);
        let geometry = gpu.geometry().expect("geometry");
        assert_eq!(geometry.vertex_count, 3);
        assert_eq!(geometry.index.map(|i| i.count), Some(3));
        assert_eq!(geometry.matrix, Mat4::IDENTITY);

        gpu.release(&mut backend);
        assert!(backend.live_buffers().is_empty());
    }

    #[test]
    fn points_have_no_normals_or_indices() {
        let mut backend = RecordingBackend::new();
        let gpu = GpuPrimitive::upload(
            &mut backend,
            Primitive::Points(PointSet {
                points: vec![0.0; 6],
                colors: vec![1.0; 8],
                matrix: IDENTITY_ROW_MAJOR,
            }),
        )
        .expect("upload");
        assert_eq!(gpu.buffers().len(), 2);
        assert_eq!(gpu.geometry().map(|g| g.topology), Some(Topology::Points));
    }

    #[test]
    fn out_of_range_index_fails_without_leaking() {
        let mut backend = RecordingBackend::new();
        let bad = Primitive::Lines(LineSet {
            points: vec![0.0; 6],
            normals: vec![0.0; 6],
            colors: vec![1.0; 8],
            indices: vec![0, 7],
            matrix: IDENTITY_ROW_MAJOR,
        });
        assert!(matches!(GpuPrimitive::upload(&mut backend, bad), Err(GpuError::Buffer(_))));
        assert!(backend.live_buffers().is_empty());
    }

    #[test]
    fn failed_upload_deletes_partial_buffers() {
        let mut backend = RecordingBackend::new();
        backend.fail_buffer_after(2);
        assert!(GpuPrimitive::upload(&mut backend, triangle()).is_err());
        assert!(backend.live_buffers().is_empty());
    }

    #[test]
    fn empty_mesh_is_empty_primitive() {
        let mut backend = RecordingBackend::new();
        let empty = Primitive::Mesh(Mesh {
            vertices: Vec::new(),
            normals: Vec::new(),
            colors: Vec::new(),
            indices: Vec::new(),
            matrix: IDENTITY_ROW_MAJOR,
        });
        assert_eq!(GpuPrimitive::upload(&mut backend, empty).expect("upload"), GpuPrimitive::Empty);
        assert!(backend.live_buffers().is_empty());
    }
}
