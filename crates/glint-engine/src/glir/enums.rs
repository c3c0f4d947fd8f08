//! Small closed vocabularies shared by commands, wrappers and the wire form.
//!
//! Every enum carries a stable lowercase name (used on the wire and in
//! `describe()` output) and can be parsed back from it.

macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

// ── objects ───────────────────────────────────────────────────────────────

named_enum! {
    /// Kind of GL object a CREATE command allocates.
    pub enum ObjectKind {
        VertexBuffer => "VertexBuffer",
        IndexBuffer => "IndexBuffer",
        Texture2D => "Texture2D",
        Texture3D => "Texture3D",
        VertexShader => "VertexShader",
        FragmentShader => "FragmentShader",
        Program => "Program",
        RenderBuffer => "RenderBuffer",
        FrameBuffer => "FrameBuffer",
    }
}

impl ObjectKind {
    pub fn is_buffer(self) -> bool {
        matches!(self, Self::VertexBuffer | Self::IndexBuffer)
    }

    pub fn is_texture(self) -> bool {
        matches!(self, Self::Texture2D | Self::Texture3D)
    }

    pub fn is_shader(self) -> bool {
        matches!(self, Self::VertexShader | Self::FragmentShader)
    }
}

named_enum! {
    /// Buffer usage hint.
    pub enum BufferUsage {
        Static => "static",
        Dynamic => "dynamic",
        Stream => "stream",
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::Dynamic
    }
}

named_enum! {
    /// Scalar type of a vertex buffer element.
    pub enum VertexType {
        I8 => "i8",
        U8 => "u8",
        I16 => "i16",
        U16 => "u16",
        F32 => "f32",
    }
}

impl VertexType {
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::F32 => 4,
        }
    }
}

named_enum! {
    /// Scalar type of an index buffer element.
    pub enum IndexType {
        U8 => "u8",
        U16 => "u16",
        U32 => "u32",
    }
}

impl IndexType {
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

named_enum! {
    /// Pixel format of a texture level.
    pub enum TextureFormat {
        Luminance => "luminance",
        Alpha => "alpha",
        LuminanceAlpha => "luminance_alpha",
        Rgb => "rgb",
        Rgba => "rgba",
    }
}

impl TextureFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Luminance | Self::Alpha => 1,
            Self::LuminanceAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Default format for a channel count. One channel maps to luminance.
    pub fn from_channels(channels: usize) -> Option<Self> {
        Some(match channels {
            1 => Self::Luminance,
            2 => Self::LuminanceAlpha,
            3 => Self::Rgb,
            4 => Self::Rgba,
            _ => return None,
        })
    }
}

named_enum! {
    /// Scalar type of texture texels.
    pub enum TexelType {
        I8 => "int8",
        U8 => "uint8",
        I16 => "int16",
        U16 => "uint16",
        I32 => "int32",
        U32 => "uint32",
        F32 => "float32",
    }
}

impl TexelType {
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
        }
    }

    pub fn is_float(self) -> bool {
        self == Self::F32
    }
}

impl Default for TexelType {
    fn default() -> Self {
        Self::U8
    }
}

named_enum! {
    /// Storage format of a render buffer.
    pub enum RenderBufferFormat {
        Color => "color",
        Depth => "depth",
        Stencil => "stencil",
    }
}

named_enum! {
    /// Framebuffer attachment point.
    pub enum AttachmentPoint {
        Color => "color",
        Depth => "depth",
        Stencil => "stencil",
    }
}

named_enum! {
    pub enum Interpolation {
        Nearest => "nearest",
        Linear => "linear",
    }
}

named_enum! {
    pub enum Wrapping {
        Repeat => "repeat",
        ClampToEdge => "clamp_to_edge",
        MirroredRepeat => "mirrored_repeat",
    }
}

named_enum! {
    /// Primitive assembly mode for DRAW.
    pub enum PrimitiveMode {
        Points => "points",
        Lines => "lines",
        LineStrip => "line_strip",
        LineLoop => "line_loop",
        Triangles => "triangles",
        TriangleStrip => "triangle_strip",
        TriangleFan => "triangle_fan",
    }
}

// ── fixed-function state ──────────────────────────────────────────────────

named_enum! {
    /// Capabilities toggled with enable/disable.
    pub enum Capability {
        Blend => "blend",
        DepthTest => "depth_test",
        CullFace => "cull_face",
        ScissorTest => "scissor_test",
        StencilTest => "stencil_test",
        PolygonOffsetFill => "polygon_offset_fill",
        Dither => "dither",
        SampleAlphaToCoverage => "sample_alpha_to_coverage",
        SampleCoverage => "sample_coverage",
    }
}

named_enum! {
    pub enum BlendFactor {
        Zero => "zero",
        One => "one",
        SrcColor => "src_color",
        OneMinusSrcColor => "one_minus_src_color",
        DstColor => "dst_color",
        OneMinusDstColor => "one_minus_dst_color",
        SrcAlpha => "src_alpha",
        OneMinusSrcAlpha => "one_minus_src_alpha",
        DstAlpha => "dst_alpha",
        OneMinusDstAlpha => "one_minus_dst_alpha",
        ConstantColor => "constant_color",
        OneMinusConstantColor => "one_minus_constant_color",
        ConstantAlpha => "constant_alpha",
        OneMinusConstantAlpha => "one_minus_constant_alpha",
        SrcAlphaSaturate => "src_alpha_saturate",
    }
}

named_enum! {
    pub enum BlendEquation {
        Add => "func_add",
        Subtract => "func_subtract",
        ReverseSubtract => "func_reverse_subtract",
    }
}

named_enum! {
    pub enum CompareFunc {
        Never => "never",
        Less => "less",
        Equal => "equal",
        LessEqual => "lequal",
        Greater => "greater",
        NotEqual => "notequal",
        GreaterEqual => "gequal",
        Always => "always",
    }
}

named_enum! {
    pub enum Face {
        Front => "front",
        Back => "back",
        FrontAndBack => "front_and_back",
    }
}

named_enum! {
    pub enum FrontFace {
        Cw => "cw",
        Ccw => "ccw",
    }
}

named_enum! {
    pub enum HintTarget {
        GenerateMipmap => "generate_mipmap_hint",
        FragmentShaderDerivative => "fragment_shader_derivative_hint",
    }
}

named_enum! {
    pub enum HintMode {
        Fastest => "fastest",
        Nicest => "nicest",
        DontCare => "dont_care",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::from_name(kind.name()), Some(*kind));
        }
        for f in BlendFactor::ALL {
            assert_eq!(BlendFactor::from_name(f.name()), Some(*f));
        }
        assert_eq!(CompareFunc::from_name("lequal"), Some(CompareFunc::LessEqual));
        assert_eq!(Wrapping::from_name("bogus"), None);
    }

    #[test]
    fn texture_format_channels() {
        for n in 1..=4 {
            assert_eq!(TextureFormat::from_channels(n).map(|f| f.channels()), Some(n));
        }
        assert_eq!(TextureFormat::from_channels(5), None);
        assert_eq!(TextureFormat::Alpha.channels(), 1);
    }

    #[test]
    fn element_sizes() {
        assert_eq!(VertexType::I16.size(), 2);
        assert_eq!(IndexType::U32.size(), 4);
    }
}
