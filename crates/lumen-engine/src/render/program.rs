//! Named, precompiled GPU programs.
//!
//! Pipelines never see shader source directly: they ask the library for a
//! vertex/fragment program pair by name and hand the resolved programs to the
//! backend.

use std::collections::HashMap;
use std::sync::Arc;

use crate::gpu::PipelineError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProgramStage {
    Vertex,
    Fragment,
}

/// One WGSL module; may hold several programs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramModule {
    pub name: String,
    pub source: String,
}

/// A single stage entry point inside a module.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub stage: ProgramStage,
    pub entry_point: String,
    pub module: Arc<ProgramModule>,
}

/// Vertex + fragment program names selected by a pipeline.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProgramPair {
    pub vertex: String,
    pub fragment: String,
}

impl ProgramPair {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    pub fn shape() -> Self {
        Self::new("color_vertex", "color_fragment")
    }

    pub fn sprite() -> Self {
        Self::new("sprite_vertex", "sprite_fragment")
    }

    pub fn composition() -> Self {
        Self::new("composition_vertex", "composition_fragment")
    }
}

#[derive(Debug, Clone)]
struct ProgramEntry {
    stage: ProgramStage,
    entry_point: String,
    module: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProgramLibrary {
    modules: HashMap<String, Arc<ProgramModule>>,
    programs: HashMap<String, ProgramEntry>,
}

impl ProgramLibrary {
    /// Empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding the built-in programs of every pipeline type.
    pub fn with_defaults() -> Self {
        let mut lib = Self::new();

        lib.register_module("shape.wgsl", include_str!("shaders/shape.wgsl"));
        lib.register_program("color_vertex", ProgramStage::Vertex, "shape.wgsl", "vs_main");
        lib.register_program("color_fragment", ProgramStage::Fragment, "shape.wgsl", "fs_main");

        lib.register_module("sprite.wgsl", include_str!("shaders/sprite.wgsl"));
        lib.register_program("sprite_vertex", ProgramStage::Vertex, "sprite.wgsl", "vs_main");
        lib.register_program("sprite_fragment", ProgramStage::Fragment, "sprite.wgsl", "fs_main");

        lib.register_module("composition.wgsl", include_str!("shaders/composition.wgsl"));
        lib.register_program(
            "composition_vertex",
            ProgramStage::Vertex,
            "composition.wgsl",
            "vs_main",
        );
        lib.register_program(
            "composition_fragment",
            ProgramStage::Fragment,
            "composition.wgsl",
            "fs_main",
        );

        lib
    }

    /// Adds or replaces a module.
    pub fn register_module(&mut self, name: impl Into<String>, source: impl Into<String>) {
        let name = name.into();
        let module = Arc::new(ProgramModule {
            name: name.clone(),
            source: source.into(),
        });
        self.modules.insert(name, module);
    }

    /// Adds or replaces a program; the module may be registered later.
    pub fn register_program(
        &mut self,
        name: impl Into<String>,
        stage: ProgramStage,
        module: impl Into<String>,
        entry_point: impl Into<String>,
    ) {
        self.programs.insert(
            name.into(),
            ProgramEntry {
                stage,
                entry_point: entry_point.into(),
                module: module.into(),
            },
        );
    }

    pub fn resolve(&self, name: &str) -> Result<Program, PipelineError> {
        let entry = self
            .programs
            .get(name)
            .ok_or_else(|| PipelineError::UnknownProgram {
                name: name.to_string(),
            })?;
        let module = self
            .modules
            .get(&entry.module)
            .ok_or_else(|| PipelineError::UnknownModule {
                program: name.to_string(),
                module: entry.module.clone(),
            })?;
        Ok(Program {
            name: name.to_string(),
            stage: entry.stage,
            entry_point: entry.entry_point.clone(),
            module: Arc::clone(module),
        })
    }

    /// Resolves both programs of `pair`, checking that each has the right stage.
    pub fn resolve_pair(&self, pair: &ProgramPair) -> Result<(Program, Program), PipelineError> {
        let vertex = self.resolve(&pair.vertex)?;
        let fragment = self.resolve(&pair.fragment)?;
        expect_stage(&vertex, ProgramStage::Vertex)?;
        expect_stage(&fragment, ProgramStage::Fragment)?;
        Ok((vertex, fragment))
    }
}

fn expect_stage(program: &Program, expected: ProgramStage) -> Result<(), PipelineError> {
    if program.stage == expected {
        Ok(())
    } else {
        Err(PipelineError::StageMismatch {
            program: program.name.clone(),
            expected,
            found: program.stage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{BackendLimits, BindGroupKind, PipelineDesc};

    #[test]
    fn defaults_resolve_to_their_stages() {
        let lib = ProgramLibrary::with_defaults();
        for pair in [ProgramPair::shape(), ProgramPair::sprite(), ProgramPair::composition()] {
            let (vs, fs) = lib.resolve_pair(&pair).unwrap();
            assert_eq!(vs.stage, ProgramStage::Vertex);
            assert_eq!(fs.stage, ProgramStage::Fragment);
            assert!(Arc::ptr_eq(&vs.module, &fs.module));
        }
    }

    #[test]
    fn default_programs_compile() {
        let lib = ProgramLibrary::with_defaults();
        let groups: [(ProgramPair, &[BindGroupKind]); 3] = [
            (ProgramPair::shape(), &[BindGroupKind::FrameUniforms]),
            (
                ProgramPair::sprite(),
                &[BindGroupKind::FrameUniforms, BindGroupKind::Texture],
            ),
            (
                ProgramPair::composition(),
                &[
                    BindGroupKind::FragmentConstants,
                    BindGroupKind::Texture,
                    BindGroupKind::Texture,
                ],
            ),
        ];
        for (pair, bind_groups) in groups {
            let (vs, fs) = lib.resolve_pair(&pair).unwrap();
            let desc = PipelineDesc {
                label: "defaults",
                vertex: &vs,
                fragment: &fs,
                vertex_buffers: &[],
                bind_groups,
                targets: &[],
                topology: wgpu::PrimitiveTopology::TriangleList,
            };
            if let Err(e) = desc.validate(&BackendLimits::default()) {
                panic!("{pair:?}: {e}");
            }
        }
    }

    #[test]
    fn unknown_program_is_reported() {
        let lib = ProgramLibrary::with_defaults();
        let err = lib.resolve("nope").unwrap_err();
        assert_eq!(err, PipelineError::UnknownProgram { name: "nope".into() });
    }

    #[test]
    fn missing_module_is_reported() {
        let mut lib = ProgramLibrary::new();
        lib.register_program("v", ProgramStage::Vertex, "missing.wgsl", "vs_main");
        let err = lib.resolve("v").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownModule { .. }));
    }

    #[test]
    fn pair_with_swapped_stages_is_rejected() {
        let lib = ProgramLibrary::with_defaults();
        let err = lib
            .resolve_pair(&ProgramPair::new("color_fragment", "color_vertex"))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StageMismatch {
                expected: ProgramStage::Vertex,
                ..
            }
        ));
    }
}
