/// Surface configuration requested from a windowing backend.
///
/// Sizes are in bits per pixel component; `samples == 0` disables
/// multisampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlConfig {
    pub red_size:      u8,
    pub green_size:    u8,
    pub blue_size:     u8,
    pub alpha_size:    u8,
    pub depth_size:    u8,
    pub stencil_size:  u8,
    pub double_buffer: bool,
    pub stereo:        bool,
    pub samples:       u8,
}

impl Default for GlConfig {
    fn default() -> Self {
        Self {
            red_size:      8,
            green_size:    8,
            blue_size:     8,
            alpha_size:    8,
            depth_size:    16,
            stencil_size:  0,
            double_buffer: true,
            stereo:        false,
            samples:       0,
        }
    }
}

impl GlConfig {
    /// Total color bits per pixel.
    pub fn color_bits(&self) -> u32 {
        [self.red_size, self.green_size, self.blue_size, self.alpha_size]
            .iter()
            .map(|b| *b as u32)
            .sum()
    }

    pub fn with_depth(mut self, bits: u8) -> Self {
        self.depth_size = bits;
        self
    }

    pub fn with_stencil(mut self, bits: u8) -> Self {
        self.stencil_size = bits;
        self
    }

    pub fn with_samples(mut self, samples: u8) -> Self {
        self.samples = samples;
        self
    }
}
