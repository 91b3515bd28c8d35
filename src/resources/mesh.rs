use std::{
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{
    config::Topology,
    data_structures::model::{Model, SubShape},
    gpu::{BufferKind, GpuResources},
    resources::{AssetSource, texture},
};

/// One mesh group of a parsed model file, still on the CPU.
#[derive(Clone, Debug, Default)]
pub struct ShapeData {
    pub name: String,
    /// xyz triples.
    pub positions: Vec<f32>,
    /// xyz triples, empty when the file has none.
    pub normals: Vec<f32>,
    /// uv pairs, empty when the file has none.
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
    /// Diffuse texture, already resolved against the asset root.
    pub diffuse_texture: Option<PathBuf>,
}

impl ShapeData {
    pub fn vertex_count(&self) -> u32 {
        (self.positions.len() / 3) as u32
    }
}

/**
 * Parses an OBJ file (and the MTL files it references) into shape data.
 *
 * Material and texture names are resolved relative to the directory of the OBJ file. A missing
 * or broken MTL only loses the textures, not the geometry.
 */
pub fn parse_obj(source: &AssetSource, file_name: &str) -> anyhow::Result<Vec<ShapeData>> {
    let obj_text = source.load_string(file_name)?;
    let obj_path = source.resolve(file_name);
    let base_dir = obj_path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut obj_reader = BufReader::new(Cursor::new(obj_text));
    let (models, obj_materials) = tobj::load_obj_buf(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| match std::fs::read_to_string(base_dir.join(p)) {
            Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
            Err(_) => Err(tobj::LoadError::OpenFileFailed),
        },
    )
    .with_context(|| format!("parsing {}", obj_path.display()))?;

    let materials = obj_materials.unwrap_or_else(|e| {
        log::warn!("Materials of {file_name} could not be loaded ({e}), shapes stay untextured.");
        Vec::new()
    });

    Ok(models
        .into_iter()
        .map(|m| {
            let diffuse_texture = m
                .mesh
                .material_id
                .and_then(|id| materials.get(id))
                .and_then(|mat| mat.diffuse_texture.as_ref())
                .map(|tex| base_dir.join(tex));
            ShapeData {
                name: m.name,
                positions: m.mesh.positions,
                normals: m.mesh.normals,
                uvs: m.mesh.texcoords,
                indices: m.mesh.indices,
                diffuse_texture,
            }
        })
        .collect())
}

/**
 * Uploads parsed shapes and returns the renderable model.
 *
 * Positions and indices are always uploaded, normals and uvs only when present. A texture that
 * can't be decoded leaves its shape untextured instead of failing the model. Shapes without
 * indices can't be drawn and are skipped.
 */
pub fn upload_model(
    gpu: &mut dyn GpuResources,
    source: &AssetSource,
    file_name: &str,
    shapes: Vec<ShapeData>,
    topology: Topology,
) -> Model {
    let shapes = shapes
        .into_iter()
        .enumerate()
        .filter_map(|(idx, shape)| {
            if shape.indices.is_empty() || shape.positions.is_empty() {
                log::warn!("Shape {} ({:?}) in {} has no triangles and is skipped.", idx, shape.name, file_name);
                return None;
            }
            Some(upload_shape(gpu, source, file_name, shape, topology))
        })
        .collect();

    Model {
        name: file_name.to_string(),
        shapes,
    }
}

fn upload_shape(
    gpu: &mut dyn GpuResources,
    source: &AssetSource,
    file_name: &str,
    shape: ShapeData,
    topology: Topology,
) -> SubShape {
    let positions = gpu.create_buffer(
        &format!("{:?} Position Buffer", file_name),
        BufferKind::Vertex,
        bytemuck::cast_slice(&shape.positions),
    );
    let normals = (!shape.normals.is_empty()).then(|| {
        gpu.create_buffer(
            &format!("{:?} Normal Buffer", file_name),
            BufferKind::Vertex,
            bytemuck::cast_slice(&shape.normals),
        )
    });
    let uvs = (!shape.uvs.is_empty()).then(|| {
        // OBJ puts v=0 at the bottom, the GPU samples with v=0 at the top.
        let flipped = shape
            .uvs
            .chunks(2)
            .flat_map(|uv| [uv[0], 1.0 - uv.get(1).copied().unwrap_or(0.0)])
            .collect::<Vec<f32>>();
        gpu.create_buffer(
            &format!("{:?} UV Buffer", file_name),
            BufferKind::Vertex,
            bytemuck::cast_slice(&flipped),
        )
    });
    let indices = topology.prepare_indices(&shape.indices);
    let index_buffer = gpu.create_buffer(
        &format!("{:?} Index Buffer", file_name),
        BufferKind::Index,
        bytemuck::cast_slice(&indices),
    );

    let texture = shape.diffuse_texture.as_ref().and_then(|path| {
        match texture::load_texture_data(source, path) {
            Ok(data) => Some(gpu.create_texture(&path.display().to_string(), &data)),
            Err(e) => {
                log::warn!("Texture {} of {} could not be decoded, drawing untextured: {e:#}", path.display(), file_name);
                None
            }
        }
    });

    SubShape {
        vertex_count: shape.vertex_count(),
        name: shape.name,
        positions,
        normals,
        uvs,
        indices: index_buffer,
        index_count: indices.len() as u32,
        texture,
    }
}
