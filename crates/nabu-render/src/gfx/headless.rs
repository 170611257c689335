//! GPU-less device that records pass commands.
//!
//! Useful for tests and tooling that want to inspect exactly what a frame
//! would submit. Programs can be flagged as still compiling (their pipelines
//! report not-ready) or broken (pipeline creation fails).

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};

use super::descriptors::{BindingsDescriptor, RenderPipelineDescriptor};
use super::device::{GfxDevice, RenderPass};
use super::handles::{
    BufferHandle, InputLayoutHandle, InputStateHandle, ProgramHandle, SamplerHandle,
    TextureHandle,
};

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessPipeline {
    pub id: u32,
    pub descriptor: RenderPipelineDescriptor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessBindings {
    pub id: u32,
    pub descriptor: BindingsDescriptor,
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_id: u32,
    compiling: HashSet<ProgramHandle>,
    broken: HashSet<ProgramHandle>,
    input_states: HashMap<InputStateHandle, InputLayoutHandle>,

    pipelines_created: usize,
    bindings_created: usize,
    live_objects: usize,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn create_program(&mut self) -> ProgramHandle {
        ProgramHandle::new(self.next())
    }

    pub fn create_input_layout(&mut self) -> InputLayoutHandle {
        InputLayoutHandle::new(self.next())
    }

    pub fn create_input_state(&mut self, layout: InputLayoutHandle) -> InputStateHandle {
        let state = InputStateHandle::new(self.next());
        self.input_states.insert(state, layout);
        state
    }

    pub fn create_buffer(&mut self) -> BufferHandle {
        BufferHandle::new(self.next())
    }

    pub fn create_sampler(&mut self) -> SamplerHandle {
        SamplerHandle::new(self.next())
    }

    pub fn create_texture(&mut self) -> TextureHandle {
        TextureHandle::new(self.next())
    }

    /// Pipelines using a compiling program report not-ready.
    pub fn set_program_compiling(&mut self, program: ProgramHandle, compiling: bool) {
        if compiling {
            self.compiling.insert(program);
        } else {
            self.compiling.remove(&program);
        }
    }

    /// Pipeline creation fails for broken programs.
    pub fn set_program_broken(&mut self, program: ProgramHandle, broken: bool) {
        if broken {
            self.broken.insert(program);
        } else {
            self.broken.remove(&program);
        }
    }

    #[inline]
    pub fn pipelines_created(&self) -> usize {
        self.pipelines_created
    }

    #[inline]
    pub fn bindings_created(&self) -> usize {
        self.bindings_created
    }

    /// Pipelines + bindings created and not yet destroyed.
    #[inline]
    pub fn live_objects(&self) -> usize {
        self.live_objects
    }
}

impl GfxDevice for HeadlessDevice {
    type RenderPipeline = HeadlessPipeline;
    type Bindings = HeadlessBindings;

    fn create_render_pipeline(
        &mut self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<HeadlessPipeline> {
        if let Some(program) = descriptor.program {
            if self.broken.contains(&program) {
                bail!("program {} failed to link", program.id());
            }
        }
        self.pipelines_created += 1;
        self.live_objects += 1;
        Ok(HeadlessPipeline {
            id: self.next(),
            descriptor: *descriptor,
        })
    }

    fn query_pipeline_ready(&self, pipeline: &HeadlessPipeline) -> bool {
        pipeline
            .descriptor
            .program
            .is_none_or(|p| !self.compiling.contains(&p))
    }

    fn create_bindings(&mut self, descriptor: &BindingsDescriptor) -> Result<HeadlessBindings> {
        self.bindings_created += 1;
        self.live_objects += 1;
        Ok(HeadlessBindings {
            id: self.next(),
            descriptor: descriptor.clone(),
        })
    }

    fn input_layout_for_state(&self, state: InputStateHandle) -> Option<InputLayoutHandle> {
        self.input_states.get(&state).copied()
    }

    fn destroy_render_pipeline(&mut self, _pipeline: HeadlessPipeline) {
        self.live_objects -= 1;
    }

    fn destroy_bindings(&mut self, _bindings: HeadlessBindings) {
        self.live_objects -= 1;
    }
}

/// One recorded pass command.
#[derive(Debug, Clone, PartialEq)]
pub enum PassCommand {
    SetPipeline(HeadlessPipeline),
    SetInputState(Option<InputStateHandle>),
    SetBindings {
        slot: u32,
        bindings: HeadlessBindings,
        dynamic_byte_offsets: Vec<u32>,
    },
    Draw { count: u32, start: u32 },
    DrawIndexed { count: u32, start: u32 },
}

/// A draw plus the state that was bound when it was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub indexed: bool,
    pub count: u32,
    pub start: u32,
    pub pipeline: Option<HeadlessPipeline>,
    pub input_state: Option<InputStateHandle>,
    pub bindings: Option<HeadlessBindings>,
    pub dynamic_byte_offsets: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct RecordingPass {
    commands: Vec<PassCommand>,
}

impl RecordingPass {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn commands(&self) -> &[PassCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Replays the command stream and returns each draw with its bound state.
    pub fn draws(&self) -> Vec<RecordedDraw> {
        let mut pipeline = None;
        let mut input_state = None;
        let mut bindings = None;
        let mut offsets = Vec::new();
        let mut out = Vec::new();

        for cmd in &self.commands {
            match cmd {
                PassCommand::SetPipeline(p) => pipeline = Some(p.clone()),
                PassCommand::SetInputState(s) => input_state = *s,
                PassCommand::SetBindings {
                    bindings: b,
                    dynamic_byte_offsets,
                    ..
                } => {
                    bindings = Some(b.clone());
                    offsets = dynamic_byte_offsets.clone();
                }
                PassCommand::Draw { count, start } | PassCommand::DrawIndexed { count, start } => {
                    out.push(RecordedDraw {
                        indexed: matches!(cmd, PassCommand::DrawIndexed { .. }),
                        count: *count,
                        start: *start,
                        pipeline: pipeline.clone(),
                        input_state,
                        bindings: bindings.clone(),
                        dynamic_byte_offsets: offsets.clone(),
                    });
                }
            }
        }

        out
    }
}

impl RenderPass<HeadlessDevice> for RecordingPass {
    fn set_pipeline(&mut self, pipeline: &HeadlessPipeline) {
        self.commands.push(PassCommand::SetPipeline(pipeline.clone()));
    }

    fn set_input_state(&mut self, state: Option<InputStateHandle>) {
        self.commands.push(PassCommand::SetInputState(state));
    }

    fn set_bindings(&mut self, slot: u32, bindings: &HeadlessBindings, dynamic_byte_offsets: &[u32]) {
        self.commands.push(PassCommand::SetBindings {
            slot,
            bindings: bindings.clone(),
            dynamic_byte_offsets: dynamic_byte_offsets.to_vec(),
        });
    }

    fn draw(&mut self, count: u32, start: u32) {
        self.commands.push(PassCommand::Draw { count, start });
    }

    fn draw_indexed(&mut self, count: u32, start: u32) {
        self.commands.push(PassCommand::DrawIndexed { count, start });
    }
}
