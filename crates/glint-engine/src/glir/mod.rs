//! GLIR: the command protocol between GL object wrappers and interpreters.
//!
//! Wrappers never talk to a graphics API. They append [`Command`]s to a
//! [`GlirQueue`]; a flush hands the backlog to a [`GlirParser`], which either
//! executes it ([`LocalParser`] over a [`GlBackend`]) or forwards it
//! ([`RemoteParser`] over a [`GlirExecutor`]).

mod enums;

pub mod backend;
pub mod command;
pub mod headless;
pub mod local;
pub mod parser;
pub mod queue;
pub mod remote;
pub mod wire;

#[cfg(not(target_arch = "wasm32"))]
pub mod glow_backend;

pub use backend::{Attachment, BufferTarget, Capabilities, GlBackend, ShaderStage, TextureTarget};
pub use command::{
    AttributeSource, ClearFlags, Command, DataArgs, GlCall, ObjectId, Opcode, Selection,
    SizeArgs, VertexLayout,
};
pub use enums::*;
pub use headless::HeadlessBackend;
pub use local::LocalParser;
pub use parser::{ActiveVariable, GlirParser, Handle, Pixels, Realization};
pub use queue::GlirQueue;
pub use remote::{GlirExecutor, JsonLinesExecutor, LoopbackExecutor, RemoteParser};
pub use wire::{ArraySerialization, GlirMessage};

#[cfg(not(target_arch = "wasm32"))]
pub use glow_backend::GlowBackend;
