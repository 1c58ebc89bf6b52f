use std::{fs, path::Path};

use indexmap::IndexMap;
use thiserror::Error;

use crate::geometry::{EPSILON, Triangle, WorldPoint, WorldVector};

use super::{Face, Material, Mesh, Scene};

#[derive(Debug, Error)]
pub enum ObjOpenError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),

    #[error("No triangles in the file")]
    NoTriangles,

    #[error("Object {object} references vertex {index} out of range")]
    VertexIndexOutOfRange { object: String, index: usize },

    #[error("Object {object} references normal {index} out of range")]
    NormalIndexOutOfRange { object: String, index: usize },
}

impl Scene {
    /// Loads every object of a wavefront OBJ file as one mesh.
    /// If the file names a material library and that file exists next to it,
    /// material albedos are taken from there; otherwise materials are
    /// interned by name with a default albedo.
    pub fn with_obj(p: impl AsRef<Path>) -> Result<Scene, ObjOpenError> {
        let p = p.as_ref();
        let content = fs::read_to_string(p)?;
        let parsed = wavefront_obj::obj::parse(content)?;

        let mtl_source = parsed
            .material_library
            .as_ref()
            .map(|lib| p.with_file_name(lib))
            .filter(|lib| lib.exists())
            .map(fs::read_to_string)
            .transpose()?;
        let mtl = match mtl_source {
            Some(source) => Some(wavefront_obj::mtl::parse(source)?),
            None => None,
        };

        Scene::from_obj_set(parsed, mtl)
    }

    /// Loads a scene from OBJ and optionally MTL sources already in memory.
    pub fn from_obj_sources(obj: &str, mtl: Option<&str>) -> Result<Scene, ObjOpenError> {
        let parsed = wavefront_obj::obj::parse(obj.to_string())?;
        let mtl = mtl
            .map(|m| wavefront_obj::mtl::parse(m.to_string()))
            .transpose()?;
        Scene::from_obj_set(parsed, mtl)
    }

    fn from_obj_set(
        obj: wavefront_obj::obj::ObjSet,
        mtl: Option<wavefront_obj::mtl::MtlSet>,
    ) -> Result<Scene, ObjOpenError> {
        // Material table: library materials first in file order, then any
        // names the OBJ uses that the library does not define.
        let mut materials: IndexMap<String, Material> = IndexMap::new();
        for m in mtl.iter().flat_map(|set| set.materials.iter()) {
            materials.insert(
                m.name.clone(),
                Material {
                    name: m.name.clone(),
                    albedo: rgb::RGB::new(
                        m.color_diffuse.r as f32,
                        m.color_diffuse.g as f32,
                        m.color_diffuse.b as f32,
                    ),
                },
            );
        }

        let mut meshes = Vec::new();
        for object in obj.objects {
            let wavefront_obj::obj::Object {
                name,
                vertices,
                normals,
                geometry,
                ..
            } = object;
            let mut faces: Vec<Face> = Vec::new();

            for geometry in geometry {
                let material = match &geometry.material_name {
                    Some(material_name) => intern_material(&mut materials, material_name),
                    None => intern_material(&mut materials, "default"),
                };

                for shape in geometry.shapes {
                    let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                        println!("non-triangle primitive in {name}!");
                        continue;
                    };

                    let positions = Triangle::new(
                        resolve_vertex(&name, &vertices, a.0)?,
                        resolve_vertex(&name, &vertices, b.0)?,
                        resolve_vertex(&name, &vertices, c.0)?,
                    );
                    // Fallback shading normal for vertices without one
                    let face_normal = positions
                        .normal()
                        .try_normalize(EPSILON)
                        .unwrap_or_else(WorldVector::zeros);
                    let face_normals = Triangle::new(
                        resolve_normal(&name, &normals, a.2, &face_normal)?,
                        resolve_normal(&name, &normals, b.2, &face_normal)?,
                        resolve_normal(&name, &normals, c.2, &face_normal)?,
                    );

                    faces.push(Face::new(
                        positions,
                        face_normals,
                        faces.len().into(),
                        material,
                    ));
                }
            }

            if faces.is_empty() {
                continue;
            }
            meshes.push(Mesh::new(name, faces));
        }

        if meshes.is_empty() {
            return Err(ObjOpenError::NoTriangles);
        }

        Ok(Scene::new(meshes, materials.into_values().collect()))
    }
}

fn intern_material(materials: &mut IndexMap<String, Material>, name: &str) -> usize {
    let entry = materials.entry(name.to_string());
    let index = entry.index();
    entry.or_insert_with(|| Material::with_name(name));
    index
}

fn resolve_vertex(
    object: &str,
    vertices: &[wavefront_obj::obj::Vertex],
    index: usize,
) -> Result<WorldPoint, ObjOpenError> {
    let vertex = vertices
        .get(index)
        .ok_or_else(|| ObjOpenError::VertexIndexOutOfRange {
            object: object.to_string(),
            index,
        })?;
    Ok(WorldPoint::new(
        vertex.x as f32,
        vertex.y as f32,
        vertex.z as f32,
    ))
}

fn resolve_normal(
    object: &str,
    normals: &[wavefront_obj::obj::Normal],
    index: Option<usize>,
    fallback: &WorldVector,
) -> Result<WorldVector, ObjOpenError> {
    let Some(index) = index else {
        return Ok(*fallback);
    };
    let normal = normals
        .get(index)
        .ok_or_else(|| ObjOpenError::NormalIndexOutOfRange {
            object: object.to_string(),
            index,
        })?;
    let normal = WorldVector::new(normal.x as f32, normal.y as f32, normal.z as f32);
    Ok(normal.try_normalize(EPSILON).unwrap_or(*fallback))
}
