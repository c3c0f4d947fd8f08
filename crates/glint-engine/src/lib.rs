//! Glint engine crate.
//!
//! A deferred GL object model: wrappers in [`gloo`] queue [`glir`] commands
//! on a [`GlContext`], and a flush hands them to the interpreter of the
//! context's shared namespace, which executes them locally (over `glow` or
//! the headless backend) or serializes them for a remote client.

pub mod context;
pub mod error;
pub mod glir;
pub mod gloo;
pub mod logging;

pub use context::{CurrentGuard, GlConfig, GlContext, HeadlessSurface, SharedNamespace, SurfaceBackend};
pub use error::{GlooError, Result};
pub use glint_glsl::ShaderDialect;

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::glir::{
        ActiveVariable, ArraySerialization, Command, GlirParser, HeadlessBackend, LocalParser,
        LoopbackExecutor, ObjectId, ObjectKind, Opcode, Pixels, PrimitiveMode, Realization,
        RemoteParser, TextureFormat,
    };
    use crate::gloo::{IndexBuffer, Program, Texture2D, VertexBuffer};

    const VERT: &str = "\
attribute vec2 a_position;
uniform vec4 u_color;
varying vec4 v_color;
void main() {
    v_color = u_color;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

    const FRAG: &str = "\
varying vec4 v_color;
void main() {
    gl_FragColor = v_color;
}
";

    /// Records what reaches it without executing anything.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<(Opcode, Option<ObjectId>)>,
    }

    impl GlirParser for Recorder {
        fn is_remote(&self) -> bool {
            false
        }

        fn parse(&mut self, commands: Vec<Command>) -> Result<()> {
            self.seen.extend(commands.iter().map(|c| (c.opcode(), c.target())));
            Ok(())
        }

        fn realization(&self, _id: ObjectId) -> Realization {
            Realization::Unrealized
        }

        fn read_pixels(&mut self, _region: Option<[i32; 4]>) -> Result<Pixels> {
            Err(GlooError::Unsupported("recorder has no pixels".into()))
        }

        fn active_uniforms(&self, _program: ObjectId) -> Result<Vec<ActiveVariable>> {
            Ok(Vec::new())
        }

        fn active_attributes(&self, _program: ObjectId) -> Result<Vec<ActiveVariable>> {
            Ok(Vec::new())
        }
    }

    fn headless(width: usize, height: usize) -> (GlContext, Rc<RefCell<LocalParser<HeadlessBackend>>>) {
        GlContext::with_parser(GlConfig::default(), LocalParser::new(HeadlessBackend::new(width, height)))
            .unwrap()
    }

    // ── queue ──

    #[test]
    fn replay_preserves_call_order() {
        let (ctx, recorder) = GlContext::with_parser(GlConfig::default(), Recorder::default()).unwrap();
        let mut a = VertexBuffer::with_data(&ctx, &[0.0f32; 8]).unwrap();
        let mut tex = Texture2D::new(&ctx);
        let mut b = IndexBuffer::with_data(&ctx, &[0u16, 1, 2]).unwrap();
        a.set_subdata(4, &[1.0f32]).unwrap();
        tex.set_shape(0, &[2, 2, 4], None).unwrap();
        b.set_subdata_at(1, &[5u16]).unwrap();
        a.delete();
        tex.set_wrapping_all(crate::glir::Wrapping::Repeat).unwrap();
        let expected: Vec<_> = ctx.pending_commands().iter().map(|c| (c.opcode(), c.target())).collect();
        ctx.flush().unwrap();
        assert_eq!(recorder.borrow().seen, expected);
        assert_eq!(ctx.pending_len(), 0);
    }

    #[test]
    fn repeated_set_data_leaves_one_upload() {
        let (ctx, parser) = headless(1, 1);
        let mut vbo = VertexBuffer::new(&ctx, Default::default());
        let data = [[0.5f32; 2]; 4];
        vbo.set_data(&data).unwrap();
        vbo.set_subdata(8, &[[1.0f32; 2]]).unwrap();
        vbo.set_data(&data).unwrap();
        assert_eq!(vbo.pending_writes().len(), 1);
        let backend_calls_before = parser.borrow().backend().calls().len();
        ctx.flush().unwrap();
        let p = parser.borrow();
        assert_eq!(p.buffer_size(vbo.id()), Some(32));
        let uploads = p.backend().calls()[backend_calls_before..]
            .iter()
            .filter(|c| c.starts_with("buffer_sub_data"))
            .count();
        assert_eq!(uploads, 1);
        assert_eq!(p.object_count(), 1);
    }

    #[test]
    fn subdata_past_the_end_never_queues() {
        let ctx = GlContext::new(GlConfig::default());
        for size in [1usize, 4, 7, 16] {
            let mut vbo = VertexBuffer::with_data(&ctx, &vec![0u8; size]).unwrap();
            for offset in 0..=size {
                let len = size - offset + 1;
                let before = ctx.pending_len();
                let err = vbo.set_subdata(offset, &vec![1u8; len]).unwrap_err();
                assert!(matches!(err, GlooError::Value(_)));
                assert_eq!(ctx.pending_len(), before);
            }
        }
    }

    #[test]
    fn delete_twice_queues_one_delete() {
        let (ctx, _) = headless(1, 1);
        let mut tex = Texture2D::with_data(&ctx, &[0u8; 4], &[1, 1, 4]).unwrap();
        ctx.flush().unwrap();
        assert!(tex.object().valid());
        tex.delete();
        tex.delete();
        let deletes = ctx.pending_commands().iter().filter(|c| c.opcode() == Opcode::Delete).count();
        assert_eq!(deletes, 1);
        assert!(!tex.object().valid());
        ctx.flush().unwrap();
        assert!(!tex.object().valid());
    }

    #[test]
    fn create_delete_leaves_table_consistent() {
        let (_, parser) = headless(1, 1);
        let mut p = parser.borrow_mut();
        let id = ObjectId::next();
        p.execute(Command::Create { id, kind: ObjectKind::VertexBuffer }).unwrap();
        assert!(p.contains(id));
        p.execute(Command::Delete { id }).unwrap();
        assert!(!p.contains(id));
        p.execute(Command::Delete { id }).unwrap();
        assert_eq!(p.object_count(), 0);
    }

    // ── scenarios ──

    #[test]
    fn link_failure_quotes_the_line() {
        let (ctx, _) = headless(1, 1);
        let broken = "\
attribute vec2 a_position;
void main() {
    gl_Position = vec4(a_position, 0.0 1.0);
}
";
        let _program = Program::from_source(&ctx, broken, FRAG).unwrap();
        let message = ctx.flush().unwrap_err().to_string();
        assert!(message.contains("line 3"), "{message}");
        assert!(message.contains("gl_Position = vec4(a_position, 0.0 1.0);"), "{message}");
    }

    #[test]
    fn shared_contexts_see_each_others_objects() {
        let (a, parser) = headless(4, 4);
        let b = GlContext::new_shared(GlConfig::default(), &a);
        let vbo = VertexBuffer::with_data(&a, &[[-1.0f32, -1.0], [1.0, -1.0], [0.0, 1.0]]).unwrap();
        a.flush().unwrap();
        assert!(vbo.object().valid());

        let mut program = Program::from_source(&b, VERT, FRAG).unwrap();
        program.set_attribute("a_position", &vbo).unwrap();
        program.set_uniform("u_color", [1.0f32, 0.0, 0.0, 1.0]).unwrap();
        program.draw(PrimitiveMode::Triangles, None).unwrap();
        b.flush().unwrap();
        assert!(program.object().valid());
        assert!(parser.borrow().contains(vbo.id()));
        assert_eq!(b.realization(vbo.id()), a.realization(vbo.id()));
    }

    #[test]
    fn current_context_guard_is_scoped() {
        let a = GlContext::new(GlConfig::default());
        let b = GlContext::new_shared(GlConfig::default(), &a);
        {
            let _ga = a.make_current();
            {
                let _gb = b.make_current();
                assert!(b.is_current());
            }
            assert!(a.is_current());
        }
        assert!(GlContext::current().is_none());
    }

    #[test]
    fn remote_flush_round_trips_through_the_wire() {
        let loopback = LoopbackExecutor::new(4, 4).with_serialization(ArraySerialization::Base64);
        let (ctx, remote) =
            GlContext::with_parser(GlConfig::default(), RemoteParser::new(loopback)).unwrap();
        assert!(ctx.shared().is_remote());

        let vbo = VertexBuffer::with_data(&ctx, &[[0.0f32; 2]; 3]).unwrap();
        let tex = Texture2D::with_data(&ctx, &[7u8; 12], &[2, 2, 3]).unwrap();
        let mut program = Program::from_source(&ctx, VERT, FRAG).unwrap();
        program.set_attribute("a_position", &vbo).unwrap();
        program.set_uniform("u_color", [0.0f32, 1.0, 0.0, 1.0]).unwrap();
        program.draw(PrimitiveMode::Points, None).unwrap();
        ctx.flush().unwrap();

        let remote = remote.borrow();
        assert_eq!(remote.messages_sent(), 1);
        let local = remote.executor().parser();
        assert!(local.contains(vbo.id()) && local.contains(tex.id()) && local.contains(program.id()));
        assert_eq!(local.buffer_size(vbo.id()), Some(24));
        assert!(!vbo.object().valid());
        drop(remote);

        assert!(matches!(ctx.read_pixels(None), Err(GlooError::RemoteReadback(_))));
        assert_eq!(tex.format(), Some(TextureFormat::Rgb));
    }
}
