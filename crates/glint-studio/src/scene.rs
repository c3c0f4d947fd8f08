//! The demo scene: a textured, tinted quad drawn with indexed triangles.

use glint_engine::gloo::{GlState, IndexBuffer, Program, Texture2D, VertexBuffer};
use glint_engine::glir::{ClearFlags, Interpolation, PrimitiveMode, VertexLayout, VertexType, Wrapping};
use glint_engine::{GlContext, Result};

const VERT: &str = "\
attribute vec2 a_position;
attribute vec2 a_texcoord;
uniform float u_scale;
varying vec2 v_texcoord;
void main() {
    v_texcoord = a_texcoord;
    gl_Position = vec4(a_position * u_scale, 0.0, 1.0);
}
";

const FRAG: &str = "\
uniform sampler2D u_texture;
uniform vec4 u_tint;
varying vec2 v_texcoord;
void main() {
    gl_FragColor = texture2D(u_texture, v_texcoord) * u_tint;
}
";

/// Interleaved `[x, y, u, v]` corners of the quad.
const QUAD: [[f32; 4]; 4] = [
    [-1.0, -1.0, 0.0, 0.0],
    [1.0, -1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0, 1.0],
];

const INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

pub struct DemoScene {
    program: Program,
    // Kept alive so the program's bindings stay valid.
    _vertices: VertexBuffer,
    indices:   IndexBuffer,
    _texture:  Texture2D,
    frame:     u32,
}

/// RGBA checkerboard, `size` x `size` texels.
fn checkerboard(size: usize) -> Vec<u8> {
    let mut texels = Vec::with_capacity(size * size * 4);
    for y in 0..size {
        for x in 0..size {
            let v = if (x + y) % 2 == 0 { 255 } else { 40 };
            texels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    texels
}

impl DemoScene {
    pub fn build(ctx: &GlContext) -> Result<Self> {
        let vertices = VertexBuffer::with_data(ctx, &QUAD)?;
        let indices = IndexBuffer::with_data(ctx, &INDICES)?;

        let mut texture = Texture2D::with_data(ctx, &checkerboard(8), &[8, 8, 4])?;
        texture.set_interpolation(Interpolation::Nearest, Interpolation::Nearest)?;
        texture.set_wrapping_all(Wrapping::Repeat)?;

        let vec2 = VertexLayout::new(VertexType::F32, 2);
        let mut program = Program::from_source(ctx, VERT, FRAG)?;
        program.set_attribute("a_position", &vertices.field(0, vec2)?)?;
        program.set_attribute("a_texcoord", &vertices.field(8, vec2)?)?;
        program.set_uniform("u_scale", 0.9f32)?;
        program.set_texture("u_texture", &texture)?;

        Ok(Self { program, _vertices: vertices, indices, _texture: texture, frame: 0 })
    }

    /// Queues one frame: state, clear, draw, swap.
    pub fn draw(&mut self, ctx: &GlContext, state: &GlState, size: (usize, usize)) -> Result<()> {
        let phase = self.frame as f32 * 0.25;
        ctx.set_state(state);
        ctx.set_viewport(0, 0, size.0 as i32, size.1 as i32);
        ctx.set_clear_color([0.1, 0.1, 0.15, 1.0]);
        ctx.clear(ClearFlags::COLOR_DEPTH);
        self.program.set_uniform("u_tint", [1.0f32, phase.cos().abs(), phase.sin().abs(), 1.0])?;
        self.program.draw(PrimitiveMode::Triangles, Some(&self.indices))?;
        ctx.swap();
        self.frame += 1;
        Ok(())
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use glint_engine::glir::{HeadlessBackend, LocalParser};
    use glint_engine::GlConfig;

    use super::*;

    // ── headless ──────────────────────────────────────────────────────────

    #[test]
    fn frames_reach_the_backend() {
        let (ctx, parser) =
            GlContext::with_parser(GlConfig::default(), LocalParser::new(HeadlessBackend::new(16, 16)))
                .unwrap();
        let mut scene = DemoScene::build(&ctx).unwrap();
        for _ in 0..3 {
            scene.draw(&ctx, &GlState::opaque(), (16, 16)).unwrap();
            ctx.flush().unwrap();
        }
        assert_eq!(parser.borrow().backend().draw_count(), 3);
    }

    #[test]
    fn checkerboard_alternates() {
        let texels = checkerboard(2);
        assert_eq!(texels.len(), 16);
        assert_eq!(&texels[0..4], &[255, 255, 255, 255]);
        assert_eq!(&texels[4..8], &[40, 40, 40, 255]);
    }
}
