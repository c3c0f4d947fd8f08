//! Deferred GL object wrappers.
//!
//! Every wrapper is built against an explicit [`GlContext`](crate::context::GlContext)
//! and only validates, stages and queues commands. Nothing reaches a
//! graphics API until the context is flushed.

mod buffer;
mod framebuffer;
mod object;
mod program;
mod shader;
mod state;
mod texture;

pub use buffer::{BufferView, Element, GlScalar, IndexBuffer, PendingWrite, VertexBuffer};
pub use framebuffer::{Attachment, FrameBuffer, RenderBuffer};
pub use object::GlObject;
pub use program::{AttributeInput, BufferBinding, Program, UniformValue};
pub use shader::{FragmentShader, Shader, VertexShader};
pub use state::{BlendFunc, GlState};
pub use texture::{PendingTexels, Sampled, Texel, Texture2D, Texture3D, TextureAtlas, TextureLevel};
