//! Pass graph of the push pipeline
//!
//! A pipeline is plain data: a list of [`PassSpec`]s naming the kernel each pass
//! runs, the logical texture slots it reads and the single slot it writes.
//! [`ExecutablePipeline::new`] validates such a list and puts it into a stable
//! topological order, which is the order the scheduler dispatches in.

use crate::kernels::Kernel;
use std::fmt;

/// Logical textures flowing between passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureSlot {
    /// The uploaded input image, at source size
    Source,
    /// Bilinear upscale of the source
    Scaled,
    /// Luminance of the scaled image
    Luminance,
    /// Line-thinned image
    Pushed,
    /// Luminance of the pushed image
    PushedLuminance,
    /// Edge strength of the pushed image
    Gradient,
    /// Final output, read back after the run
    Result,
}

impl TextureSlot {
    /// Returns a stable lowercase name, e.g. for dump file names
    pub fn name(&self) -> &'static str {
        match self {
            TextureSlot::Source => "source",
            TextureSlot::Scaled => "scaled",
            TextureSlot::Luminance => "luminance",
            TextureSlot::Pushed => "pushed",
            TextureSlot::PushedLuminance => "pushed_luminance",
            TextureSlot::Gradient => "gradient",
            TextureSlot::Result => "result",
        }
    }
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One node of the pass graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSpec {
    /// Human-readable name, reported in logs and errors
    pub name: &'static str,
    /// Compute program run by this pass
    pub kernel: Kernel,
    /// Slots read by the pass, in binding order
    pub inputs: &'static [TextureSlot],
    /// Slot written by the pass
    pub output: TextureSlot,
}

/// The Anime4K v0.9 push pipeline
///
/// `Scale -> Luminance -> Push -> Luminance -> Gradient -> Final`, with the
/// luminance kernel used twice.
pub const PUSH_PIPELINE: &[PassSpec] = &[
    PassSpec {
        name: "Scale",
        kernel: Kernel::Scale,
        inputs: &[TextureSlot::Source],
        output: TextureSlot::Scaled,
    },
    PassSpec {
        name: "Luminance",
        kernel: Kernel::Luminance,
        inputs: &[TextureSlot::Scaled],
        output: TextureSlot::Luminance,
    },
    PassSpec {
        name: "Push",
        kernel: Kernel::Push,
        inputs: &[TextureSlot::Scaled, TextureSlot::Luminance],
        output: TextureSlot::Pushed,
    },
    PassSpec {
        name: "Luminance (pushed)",
        kernel: Kernel::Luminance,
        inputs: &[TextureSlot::Pushed],
        output: TextureSlot::PushedLuminance,
    },
    PassSpec {
        name: "Gradient",
        kernel: Kernel::Gradient,
        inputs: &[TextureSlot::Pushed, TextureSlot::PushedLuminance],
        output: TextureSlot::Gradient,
    },
    PassSpec {
        name: "Final",
        kernel: Kernel::Final,
        inputs: &[TextureSlot::Pushed, TextureSlot::Gradient, TextureSlot::Scaled],
        output: TextureSlot::Result,
    },
];

/// A validated pass list in dispatch order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutablePipeline {
    passes: Vec<PassSpec>,
}

impl ExecutablePipeline {
    /// Validates `passes` and orders them topologically
    ///
    /// Passes with no dependency between them keep their relative order.
    ///
    /// # Returns
    /// The ordered pipeline, or the first [`PipelineValidationError`] found
    pub fn new(passes: &[PassSpec]) -> Result<Self, PipelineValidationError> {
        validate(passes)?;
        let passes = topological_order(passes)?;

        // Nothing may consume RESULT, so its producer must be last
        match passes.iter().position(|pass| pass.output == TextureSlot::Result) {
            Some(index) if index + 1 == passes.len() => Ok(Self { passes }),
            Some(index) => Err(PipelineValidationError::ResultNotInLastPass(passes[index].name)),
            None => Err(PipelineValidationError::MissingResult),
        }
    }

    /// The built-in push pipeline
    pub fn push() -> Self {
        Self {
            passes: PUSH_PIPELINE.to_vec(),
        }
    }

    /// Passes in dispatch order
    pub fn passes(&self) -> &[PassSpec] {
        &self.passes
    }

    /// Every slot the pipeline touches: SOURCE first, then outputs in production order
    pub fn slots(&self) -> Vec<TextureSlot> {
        std::iter::once(TextureSlot::Source).chain(self.passes.iter().map(|pass| pass.output)).collect()
    }

    /// Slots that are produced by a pass but are not the final result
    pub fn intermediate_slots(&self) -> Vec<TextureSlot> {
        self.passes.iter().map(|pass| pass.output).filter(|slot| *slot != TextureSlot::Result).collect()
    }
}

impl Default for ExecutablePipeline {
    fn default() -> Self {
        Self::push()
    }
}

fn validate(passes: &[PassSpec]) -> Result<(), PipelineValidationError> {
    if passes.is_empty() {
        return Err(PipelineValidationError::NoPasses);
    }

    let mut produced = Vec::with_capacity(passes.len());
    for pass in passes {
        if pass.inputs.len() != pass.kernel.input_count() {
            return Err(PipelineValidationError::SlotCountMismatch {
                pass: pass.name,
                expected: pass.kernel.slot_count(),
                actual: pass.inputs.len() + 1,
            });
        }
        if pass.inputs.contains(&pass.output) {
            return Err(PipelineValidationError::SelfDependency(pass.name));
        }
        if pass.output == TextureSlot::Source || produced.contains(&pass.output) {
            return Err(PipelineValidationError::TextureOverwritten(pass.name, pass.output));
        }
        produced.push(pass.output);
    }

    for pass in passes {
        if let Some(&missing) = pass.inputs.iter().find(|slot| **slot != TextureSlot::Source && !produced.contains(*slot)) {
            return Err(PipelineValidationError::InputTextureNotFound(pass.name, missing));
        }
    }

    Ok(())
}

/// Kahn's algorithm, always taking the lowest-indexed ready pass
fn topological_order(passes: &[PassSpec]) -> Result<Vec<PassSpec>, PipelineValidationError> {
    let mut available = vec![TextureSlot::Source];
    let mut done = vec![false; passes.len()];
    let mut ordered = Vec::with_capacity(passes.len());

    while ordered.len() < passes.len() {
        let ready = passes
            .iter()
            .enumerate()
            .find(|(i, pass)| !done[*i] && pass.inputs.iter().all(|slot| available.contains(slot)));

        let Some((index, pass)) = ready else {
            let blocked = passes.iter().zip(&done).find(|(_, done)| !**done).map(|(pass, _)| pass.name).unwrap_or_default();
            return Err(PipelineValidationError::CyclicDependency(blocked));
        };

        done[index] = true;
        available.push(pass.output);
        ordered.push(*pass);
    }

    Ok(ordered)
}

/// Errors that can occur while validating a pass list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineValidationError {
    /// The pass list is empty
    NoPasses,
    /// A pass binds a different number of slots than its kernel declares
    SlotCountMismatch {
        /// Pass name
        pass: &'static str,
        /// Slots declared by the kernel
        expected: usize,
        /// Slots bound by the pass
        actual: usize,
    },
    /// A pass reads the slot it writes (pass name)
    SelfDependency(&'static str),
    /// A slot is written more than once, or SOURCE is written (pass name, slot)
    TextureOverwritten(&'static str, TextureSlot),
    /// A pass reads a slot no pass produces (pass name, slot)
    InputTextureNotFound(&'static str, TextureSlot),
    /// The passes cannot be ordered (first blocked pass name)
    CyclicDependency(&'static str),
    /// RESULT is produced by a pass that other passes depend on (pass name)
    ResultNotInLastPass(&'static str),
    /// No pass produces RESULT
    MissingResult,
}

impl fmt::Display for PipelineValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPasses => write!(f, "Pipeline must have at least one pass"),
            Self::SlotCountMismatch { pass, expected, actual } => {
                write!(f, "Pass '{pass}' binds {actual} texture slots but its kernel declares {expected}")
            }
            Self::SelfDependency(pass) => write!(f, "Pass '{pass}' reads its own output"),
            Self::TextureOverwritten(pass, slot) => {
                write!(f, "Texture '{slot}' is being overwritten in pass '{pass}'")
            }
            Self::InputTextureNotFound(pass, slot) => {
                write!(f, "Input texture '{slot}' in pass '{pass}' is not produced by any pass and is not SOURCE")
            }
            Self::CyclicDependency(pass) => write!(f, "Pass '{pass}' is part of a dependency cycle"),
            Self::ResultNotInLastPass(pass) => {
                write!(f, "RESULT is produced by pass '{pass}' but must come from the last pass")
            }
            Self::MissingResult => write!(f, "No pass produces RESULT"),
        }
    }
}

impl std::error::Error for PipelineValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pipeline: &ExecutablePipeline) -> Vec<&'static str> {
        pipeline.passes().iter().map(|pass| pass.name).collect()
    }

    #[test]
    fn test_push_pipeline_is_valid_and_already_ordered() {
        let pipeline = ExecutablePipeline::new(PUSH_PIPELINE).unwrap();
        assert_eq!(pipeline, ExecutablePipeline::push());
        assert_eq!(names(&pipeline), ["Scale", "Luminance", "Push", "Luminance (pushed)", "Gradient", "Final"]);
        assert_eq!(
            pipeline.intermediate_slots(),
            [TextureSlot::Scaled, TextureSlot::Luminance, TextureSlot::Pushed, TextureSlot::PushedLuminance, TextureSlot::Gradient]
        );
        assert_eq!(pipeline.slots().len(), 7);
    }

    #[test]
    fn test_shuffled_passes_are_reordered() {
        let mut shuffled = PUSH_PIPELINE.to_vec();
        shuffled.reverse();
        let pipeline = ExecutablePipeline::new(&shuffled).unwrap();
        assert_eq!(pipeline, ExecutablePipeline::push());
    }

    #[test]
    fn test_independent_passes_keep_their_order() {
        let luma = PassSpec {
            name: "Luma of source",
            kernel: Kernel::Luminance,
            inputs: &[TextureSlot::Source],
            output: TextureSlot::Luminance,
        };
        let scale = PassSpec {
            name: "Scale",
            kernel: Kernel::Scale,
            inputs: &[TextureSlot::Source],
            output: TextureSlot::Result,
        };

        let pipeline = ExecutablePipeline::new(&[luma, scale]).unwrap();
        assert_eq!(names(&pipeline), ["Luma of source", "Scale"]);

        // Not moved behind an unrelated pass just to put RESULT last
        let err = ExecutablePipeline::new(&[scale, luma]).unwrap_err();
        assert_eq!(err, PipelineValidationError::ResultNotInLastPass("Scale"));
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(ExecutablePipeline::new(&[]), Err(PipelineValidationError::NoPasses));

        let wrong_arity = PassSpec {
            name: "Final",
            kernel: Kernel::Final,
            inputs: &[TextureSlot::Source],
            output: TextureSlot::Result,
        };
        assert_eq!(
            ExecutablePipeline::new(&[wrong_arity]),
            Err(PipelineValidationError::SlotCountMismatch {
                pass: "Final",
                expected: 4,
                actual: 2
            })
        );

        let overwrite = [PUSH_PIPELINE[0], PassSpec { name: "Rescale", ..PUSH_PIPELINE[0] }];
        assert_eq!(
            ExecutablePipeline::new(&overwrite),
            Err(PipelineValidationError::TextureOverwritten("Rescale", TextureSlot::Scaled))
        );

        let missing = [PUSH_PIPELINE[2], PUSH_PIPELINE[0]];
        assert_eq!(
            ExecutablePipeline::new(&missing),
            Err(PipelineValidationError::InputTextureNotFound("Push", TextureSlot::Luminance))
        );

        let no_result = &PUSH_PIPELINE[..5];
        assert_eq!(ExecutablePipeline::new(no_result), Err(PipelineValidationError::MissingResult));
    }

    #[test]
    fn test_cycle_is_detected() {
        let cycle = [
            PassSpec {
                name: "A",
                kernel: Kernel::Luminance,
                inputs: &[TextureSlot::Gradient],
                output: TextureSlot::Pushed,
            },
            PassSpec {
                name: "B",
                kernel: Kernel::Luminance,
                inputs: &[TextureSlot::Pushed],
                output: TextureSlot::Gradient,
            },
        ];
        assert_eq!(ExecutablePipeline::new(&cycle), Err(PipelineValidationError::CyclicDependency("A")));
        assert!(PipelineValidationError::CyclicDependency("A").to_string().contains("cycle"));
    }
}
