//! Fixed-function GL state and the context-level emitters for it.

use crate::context::GlContext;
use crate::glir::{
    BlendEquation, BlendFactor, Capability, ClearFlags, Command, CompareFunc, Face, FrontFace,
    GlCall,
};

/// Source and destination blend factors, applied to color and alpha alike
/// unless the alpha pair is given.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlendFunc {
    pub src:       BlendFactor,
    pub dst:       BlendFactor,
    pub src_alpha: Option<BlendFactor>,
    pub dst_alpha: Option<BlendFactor>,
}

impl BlendFunc {
    pub const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self { src, dst, src_alpha: None, dst_alpha: None }
    }

    fn call(self) -> GlCall {
        GlCall::BlendFunc {
            src_rgb: self.src,
            dst_rgb: self.dst,
            src_alpha: self.src_alpha.unwrap_or(self.src),
            dst_alpha: self.dst_alpha.unwrap_or(self.dst),
        }
    }
}

/// A set of GL state changes. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlState {
    pub depth_test:     Option<bool>,
    pub depth_func:     Option<CompareFunc>,
    pub depth_mask:     Option<bool>,
    pub blend:          Option<bool>,
    pub blend_func:     Option<BlendFunc>,
    pub blend_equation: Option<BlendEquation>,
    pub cull_face:      Option<bool>,
    pub cull_mode:      Option<Face>,
    pub front_face:     Option<FrontFace>,
    pub scissor_test:   Option<bool>,
    pub stencil_test:   Option<bool>,
    pub polygon_offset: Option<(f32, f32)>,
    pub color_mask:     Option<[bool; 4]>,
    pub line_width:     Option<f32>,
    pub clear_color:    Option<[f32; 4]>,
}

impl GlState {
    /// Depth-tested, unblended geometry.
    pub fn opaque() -> Self {
        Self {
            depth_test: Some(true),
            blend: Some(false),
            cull_face: Some(false),
            ..Self::default()
        }
    }

    /// Depth-tested geometry blended over what is behind it.
    pub fn translucent() -> Self {
        Self {
            depth_test: Some(true),
            blend: Some(true),
            blend_func: Some(BlendFunc::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)),
            cull_face: Some(false),
            ..Self::default()
        }
    }

    /// Geometry accumulated without depth testing.
    pub fn additive() -> Self {
        Self {
            depth_test: Some(false),
            blend: Some(true),
            blend_func: Some(BlendFunc::new(BlendFactor::SrcAlpha, BlendFactor::One)),
            cull_face: Some(false),
            ..Self::default()
        }
    }

    /// Preset by name: `opaque`, `translucent` or `additive`.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "opaque" => Some(Self::opaque()),
            "translucent" => Some(Self::translucent()),
            "additive" => Some(Self::additive()),
            _ => None,
        }
    }

    /// FUNC calls for every set field, capabilities first.
    pub fn calls(&self) -> Vec<GlCall> {
        let toggle = |cap, on: bool| if on { GlCall::Enable(cap) } else { GlCall::Disable(cap) };
        let mut calls = Vec::new();
        let caps = [
            (Capability::DepthTest, self.depth_test),
            (Capability::Blend, self.blend),
            (Capability::CullFace, self.cull_face),
            (Capability::ScissorTest, self.scissor_test),
            (Capability::StencilTest, self.stencil_test),
            (Capability::PolygonOffsetFill, self.polygon_offset.map(|_| true)),
        ];
        for (cap, on) in caps {
            if let Some(on) = on {
                calls.push(toggle(cap, on));
            }
        }
        calls.extend(self.depth_func.map(GlCall::DepthFunc));
        calls.extend(self.depth_mask.map(GlCall::DepthMask));
        calls.extend(self.blend_func.map(BlendFunc::call));
        calls.extend(self.blend_equation.map(GlCall::BlendEquation));
        calls.extend(self.cull_mode.map(GlCall::CullFace));
        calls.extend(self.front_face.map(GlCall::FrontFace));
        calls.extend(self.polygon_offset.map(|(factor, units)| GlCall::PolygonOffset { factor, units }));
        calls.extend(self.color_mask.map(GlCall::ColorMask));
        calls.extend(self.line_width.map(GlCall::LineWidth));
        calls.extend(self.clear_color.map(GlCall::ClearColor));
        calls
    }
}

impl GlContext {
    fn func(&self, call: GlCall) {
        self.push(Command::Func(call));
    }

    /// Queues the calls for every set field of `state`.
    pub fn set_state(&self, state: &GlState) {
        for call in state.calls() {
            self.func(call);
        }
    }

    pub fn set_viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.func(GlCall::Viewport { x, y, width, height });
    }

    pub fn set_scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        self.func(GlCall::Scissor { x, y, width, height });
    }

    pub fn set_clear_color(&self, rgba: [f32; 4]) {
        self.func(GlCall::ClearColor(rgba));
    }

    pub fn clear(&self, flags: ClearFlags) {
        self.func(GlCall::Clear(flags));
    }

    pub fn finish(&self) {
        self.func(GlCall::Finish);
    }

    /// Queues a `glFlush`; unrelated to [`GlContext::flush`].
    pub fn flush_gl(&self) {
        self.func(GlCall::Flush);
    }

    pub fn swap(&self) {
        self.push(Command::Swap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GlConfig;
    use crate::glir::{HeadlessBackend, LocalParser};

    fn funcs(ctx: &GlContext) -> Vec<GlCall> {
        ctx.pending_commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Func(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn presets() {
        let t = GlState::translucent();
        assert_eq!(t.calls(), [
            GlCall::Enable(Capability::DepthTest),
            GlCall::Enable(Capability::Blend),
            GlCall::Disable(Capability::CullFace),
            GlCall::BlendFunc {
                src_rgb: BlendFactor::SrcAlpha,
                dst_rgb: BlendFactor::OneMinusSrcAlpha,
                src_alpha: BlendFactor::SrcAlpha,
                dst_alpha: BlendFactor::OneMinusSrcAlpha,
            },
        ]);
        let a = GlState::additive();
        assert_eq!(a.depth_test, Some(false));
        assert_eq!(a.blend_func, Some(BlendFunc::new(BlendFactor::SrcAlpha, BlendFactor::One)));
        assert_eq!(GlState::opaque().calls().len(), 3);
        assert_eq!(GlState::preset("opaque"), Some(GlState::opaque()));
        assert_eq!(GlState::preset("glossy"), None);
    }

    #[test]
    fn empty_state_emits_nothing() {
        let ctx = GlContext::new(GlConfig::default());
        ctx.set_state(&GlState::default());
        assert_eq!(ctx.pending_len(), 0);
    }

    #[test]
    fn emitters_queue_func_commands() {
        let ctx = GlContext::new(GlConfig::default());
        ctx.set_viewport(0, 0, 4, 2);
        ctx.clear(ClearFlags::ALL);
        ctx.finish();
        ctx.flush_gl();
        ctx.swap();
        assert_eq!(funcs(&ctx), [
            GlCall::Viewport { x: 0, y: 0, width: 4, height: 2 },
            GlCall::Clear(ClearFlags::ALL),
            GlCall::Finish,
            GlCall::Flush,
        ]);
        assert_eq!(ctx.pending_commands().last(), Some(&Command::Swap));
    }

    #[test]
    fn state_reaches_the_backend() {
        let (ctx, parser) =
            GlContext::with_parser(GlConfig::default(), LocalParser::new(HeadlessBackend::new(2, 2)))
                .unwrap();
        ctx.set_state(&GlState::additive());
        ctx.flush().unwrap();
        let p = parser.borrow();
        assert!(p.backend().is_enabled(Capability::Blend));
        assert!(!p.backend().is_enabled(Capability::DepthTest));
    }
}
