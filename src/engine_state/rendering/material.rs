//! Shader programs and materials.
//!
//! A `Program` pairs a vertex and a fragment `Shader`. Shaders are identified by a
//! string id (a path or an inline name) and their source may still be loading; a
//! program built from a loading shader is not ready and draws using it are skipped.
//! A `Material` is the ordered list of values bound alongside a program.

use std::path::PathBuf;

use super::{
    assets::{Asset, AssetState},
    texture::Texture,
};

/// Identity of a shader source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub String);

impl std::fmt::Display for ShaderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline stage a shader is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage, entry point `vs_main`.
    Vertex,
    /// Fragment stage, entry point `fs_main`.
    Fragment,
}

impl ShaderStage {
    /// WGSL entry point of the stage.
    pub fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }
}

/// A shader source, possibly still loading.
#[derive(Debug, Clone)]
pub struct Shader {
    id: ShaderId,
    stage: ShaderStage,
    source: Asset<String>,
}

impl Shader {
    /// A shader whose source is known up front.
    pub fn inline(id: impl Into<String>, stage: ShaderStage, source: impl Into<String>) -> Self {
        Self {
            id: ShaderId(id.into()),
            stage,
            source: Asset::ready(source.into()),
        }
    }

    /// A shader read from `path` on a loader thread. The path is the shader id.
    pub fn from_file(path: impl Into<PathBuf>, stage: ShaderStage) -> Self {
        let path = path.into();
        let id = ShaderId(path.display().to_string());
        let source = Asset::load_with(move || {
            std::fs::read_to_string(&path).map_err(|e| format!("{}: {e}", path.display()))
        });
        Self { id, stage, source }
    }

    /// A shader completed later through its asset sender.
    pub fn with_source(id: impl Into<String>, stage: ShaderStage, source: Asset<String>) -> Self {
        Self {
            id: ShaderId(id.into()),
            stage,
            source,
        }
    }

    pub fn id(&self) -> &ShaderId {
        &self.id
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Source text once loaded.
    pub fn source(&self) -> Option<&str> {
        self.source.get().map(String::as_str)
    }

    /// Loading state of the source.
    pub fn state(&self) -> AssetState {
        self.source.state()
    }

    /// Whether the source has not arrived yet.
    pub fn is_loading(&self) -> bool {
        self.source.state() == AssetState::Pending
    }

    /// Why loading failed, if it did.
    pub fn load_error(&self) -> Option<&str> {
        self.source.error()
    }
}

/// Identity of a linked program: the ids of its shaders in stage order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub Vec<ShaderId>);

impl std::fmt::Display for ProgramId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|s| s.0.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// A vertex and a fragment shader linked together.
#[derive(Debug, Clone)]
pub struct Program {
    pub vertex: Shader,
    pub fragment: Shader,
}

impl Program {
    /// Links `vertex` with `fragment`.
    pub fn new(vertex: Shader, fragment: Shader) -> Self {
        Self { vertex, fragment }
    }

    /// Program id derived from both shader ids.
    pub fn id(&self) -> ProgramId {
        ProgramId(vec![self.vertex.id.clone(), self.fragment.id.clone()])
    }

    /// Both shaders in stage order.
    pub fn shaders(&self) -> [&Shader; 2] {
        [&self.vertex, &self.fragment]
    }

    /// Whether either shader is still loading.
    pub fn is_loading(&self) -> bool {
        self.vertex.is_loading() || self.fragment.is_loading()
    }
}

/// A value bound to a program when drawing.
#[derive(Debug, Clone)]
pub enum MaterialValue {
    Texture(Texture),
    Float(f32),
    Vec3([f32; 3]),
    Int(i32),
}

/// Ordered property list of a material.
///
/// Insertion order is binding order: textures are assigned texture units in the
/// order they appear.
#[derive(Debug, Clone, Default)]
pub struct Material {
    properties: Vec<(String, MaterialValue)>,
}

impl Material {
    /// Creates an empty material.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property, keeping its position if it already exists.
    pub fn with(mut self, name: impl Into<String>, value: MaterialValue) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a property, keeping its position if it already exists.
    pub fn set(&mut self, name: impl Into<String>, value: MaterialValue) {
        let name = name.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MaterialValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Float property, also accepting integers.
    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            MaterialValue::Float(v) => Some(*v),
            MaterialValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Properties in binding order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &MaterialValue)> {
        self.properties.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Textures in binding order.
    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        self.properties.iter().filter_map(|(_, v)| match v {
            MaterialValue::Texture(texture) => Some(texture),
            _ => None,
        })
    }
}
