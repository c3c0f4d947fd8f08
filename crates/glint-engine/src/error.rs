//! Error types for the GL object model and interpreters.

use glint_glsl::ShaderDiagnostic;
use thiserror::Error;

use crate::glir::{ObjectId, Opcode};

/// Errors raised by wrappers (locally, before anything is queued) and by
/// interpreters (at flush time).
#[derive(Error, Debug)]
pub enum GlooError {
    /// Data whose byte layout cannot be described.
    #[error("type error: {0}")]
    Type(String),

    /// Bad offset, shape or size.
    #[error("value error: {0}")]
    Value(String),

    /// Operation on a deleted or incomplete object.
    #[error("resource error: {0}")]
    Resource(String),

    /// The driver rejected a shader. `report` quotes the offending lines.
    #[error("shader {id} failed to compile:\n{report}")]
    ShaderCompile {
        id: ObjectId,
        diagnostics: Vec<ShaderDiagnostic>,
        report: String,
    },

    #[error("program {id} failed to link: {log}")]
    ProgramLink { id: ObjectId, log: String },

    /// The backend lacks a required capability.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A command referenced an id the interpreter never saw created.
    #[error("{opcode} references unknown object {id}")]
    UnknownObject { opcode: Opcode, id: ObjectId },

    /// The graphics backend failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Shared namespace misuse. Fatal for the surface involved.
    #[error("shared namespace error: {0}")]
    Namespace(String),

    /// A synchronous read-back was requested from a remote interpreter.
    #[error("{0} needs a local interpreter but this namespace is remote")]
    RemoteReadback(&'static str),

    /// A remote executor failed to accept a message.
    #[error("executor failed: {0:#}")]
    Executor(anyhow::Error),

    /// A wire message could not be encoded or decoded.
    #[error("malformed wire message: {0}")]
    Wire(String),
}

/// Result type for GL object and interpreter operations.
pub type Result<T> = std::result::Result<T, GlooError>;
