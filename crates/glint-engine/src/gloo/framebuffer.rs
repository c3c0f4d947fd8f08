use super::object::GlObject;
use super::texture::Texture2D;
use crate::context::GlContext;
use crate::error::{GlooError, Result};
use crate::glir::{AttachmentPoint, Command, ObjectId, ObjectKind, Pixels, RenderBufferFormat, SizeArgs};

/// Offscreen storage usable as a framebuffer attachment.
#[derive(Debug)]
pub struct RenderBuffer {
    obj:       GlObject,
    shape:     [usize; 2],
    format:    RenderBufferFormat,
    resizable: bool,
}

impl RenderBuffer {
    /// `shape` is `[h, w]`.
    pub fn new(ctx: &GlContext, shape: [usize; 2], format: RenderBufferFormat) -> Result<Self> {
        let mut rb =
            Self { obj: GlObject::new(ctx, ObjectKind::RenderBuffer), shape, format, resizable: true };
        rb.push_size()?;
        Ok(rb)
    }

    fn push_size(&mut self) -> Result<()> {
        if self.shape.contains(&0) {
            return Err(GlooError::Value(format!("render buffer shape {:?} is empty", self.shape)));
        }
        self.obj.push(Command::Size {
            id: self.obj.id(),
            args: SizeArgs::RenderBuffer { shape: self.shape, format: self.format },
        })
    }

    pub fn id(&self) -> ObjectId {
        self.obj.id()
    }

    pub fn object(&self) -> &GlObject {
        &self.obj
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn format(&self) -> RenderBufferFormat {
        self.format
    }

    pub fn is_resizable(&self) -> bool {
        self.resizable
    }

    pub fn set_resizable(&mut self, resizable: bool) {
        self.resizable = resizable;
    }

    /// Reallocates; contents become undefined. No-op if nothing changes.
    pub fn resize(&mut self, shape: [usize; 2], format: Option<RenderBufferFormat>) -> Result<()> {
        let format = format.unwrap_or(self.format);
        if shape == self.shape && format == self.format {
            return Ok(());
        }
        if !self.resizable && shape != self.shape {
            return Err(GlooError::Resource(format!(
                "render buffer {} is not resizable ({:?} -> {shape:?})",
                self.id(),
                self.shape
            )));
        }
        let previous = (self.shape, self.format);
        (self.shape, self.format) = (shape, format);
        if let Err(e) = self.push_size() {
            (self.shape, self.format) = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn delete(&mut self) {
        self.obj.delete();
    }
}

/// An object attached to a framebuffer. The framebuffer owns it, so its
/// shape is always read from the live object.
#[derive(Debug)]
pub enum Attachment {
    Texture(Texture2D),
    RenderBuffer(RenderBuffer),
}

impl Attachment {
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Texture(tex) => tex.id(),
            Self::RenderBuffer(rb) => rb.id(),
        }
    }

    /// `[h, w]`, `None` for a texture without storage.
    pub fn shape(&self) -> Option<[usize; 2]> {
        match self {
            Self::Texture(tex) => tex.shape().map(|s| [s[0], s[1]]),
            Self::RenderBuffer(rb) => Some(rb.shape()),
        }
    }

    pub fn as_texture(&self) -> Option<&Texture2D> {
        match self {
            Self::Texture(tex) => Some(tex),
            Self::RenderBuffer(_) => None,
        }
    }

    pub fn as_render_buffer(&self) -> Option<&RenderBuffer> {
        match self {
            Self::RenderBuffer(rb) => Some(rb),
            Self::Texture(_) => None,
        }
    }

    fn is_resizable(&self) -> bool {
        match self {
            Self::Texture(tex) => tex.is_resizable(),
            Self::RenderBuffer(rb) => rb.is_resizable(),
        }
    }

    /// Reallocates to `[h, w]`, keeping channels and format.
    fn resize(&mut self, shape: [usize; 2]) -> Result<()> {
        match self {
            Self::Texture(tex) => {
                let channels = tex.shape().map_or(4, |s| s[2]);
                let format = tex.format();
                tex.set_shape(0, &[shape[0], shape[1], channels], format)
            }
            Self::RenderBuffer(rb) => rb.resize(shape, None),
        }
    }
}

impl From<Texture2D> for Attachment {
    fn from(tex: Texture2D) -> Self {
        Self::Texture(tex)
    }
}

impl From<RenderBuffer> for Attachment {
    fn from(rb: RenderBuffer) -> Self {
        Self::RenderBuffer(rb)
    }
}

/// Render target made of color, depth and stencil attachments.
///
/// Activation nests: the interpreter keeps a stack and deactivating
/// rebinds whatever was bound before.
#[derive(Debug)]
pub struct FrameBuffer {
    obj:     GlObject,
    color:   Option<Attachment>,
    depth:   Option<Attachment>,
    stencil: Option<Attachment>,
    active:  usize,
}

impl FrameBuffer {
    pub fn new(ctx: &GlContext) -> Self {
        Self {
            obj: GlObject::new(ctx, ObjectKind::FrameBuffer),
            color: None,
            depth: None,
            stencil: None,
            active: 0,
        }
    }

    /// Framebuffer with a color attachment and optional depth.
    pub fn with_color(
        ctx: &GlContext,
        color: impl Into<Attachment>,
        depth: Option<Attachment>,
    ) -> Result<Self> {
        let mut fb = Self::new(ctx);
        fb.set_color(Some(color.into()))?;
        if depth.is_some() {
            fb.set_depth(depth)?;
        }
        Ok(fb)
    }

    pub fn id(&self) -> ObjectId {
        self.obj.id()
    }

    pub fn object(&self) -> &GlObject {
        &self.obj
    }

    pub fn color(&self) -> Option<&Attachment> {
        self.color.as_ref()
    }

    pub fn depth(&self) -> Option<&Attachment> {
        self.depth.as_ref()
    }

    pub fn stencil(&self) -> Option<&Attachment> {
        self.stencil.as_ref()
    }

    fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        [&self.color, &self.depth, &self.stencil].into_iter().flatten()
    }

    /// Shape shared by all attachments, `[h, w]`.
    pub fn shape(&self) -> Option<[usize; 2]> {
        self.attachments().find_map(Attachment::shape)
    }

    /// Attaches `target` as the color buffer and hands back the one it
    /// replaces.
    pub fn set_color(&mut self, target: Option<Attachment>) -> Result<Option<Attachment>> {
        self.attach(AttachmentPoint::Color, target)
    }

    pub fn set_depth(&mut self, target: Option<Attachment>) -> Result<Option<Attachment>> {
        self.attach(AttachmentPoint::Depth, target)
    }

    pub fn set_stencil(&mut self, target: Option<Attachment>) -> Result<Option<Attachment>> {
        self.attach(AttachmentPoint::Stencil, target)
    }

    fn slot(&mut self, point: AttachmentPoint) -> &mut Option<Attachment> {
        match point {
            AttachmentPoint::Color => &mut self.color,
            AttachmentPoint::Depth => &mut self.depth,
            AttachmentPoint::Stencil => &mut self.stencil,
        }
    }

    fn attach(&mut self, point: AttachmentPoint, target: Option<Attachment>) -> Result<Option<Attachment>> {
        self.obj.check_alive()?;
        if let Some(t) = &target {
            match t {
                Attachment::Texture(tex) => {
                    if point == AttachmentPoint::Stencil {
                        return Err(GlooError::Type("stencil attachments must be render buffers".into()));
                    }
                    tex.object().check_alive()?;
                }
                Attachment::RenderBuffer(rb) => {
                    rb.object().check_alive()?;
                    let expected = match point {
                        AttachmentPoint::Color => RenderBufferFormat::Color,
                        AttachmentPoint::Depth => RenderBufferFormat::Depth,
                        AttachmentPoint::Stencil => RenderBufferFormat::Stencil,
                    };
                    if rb.format() != expected {
                        return Err(GlooError::Value(format!(
                            "{point} attachment needs a {expected} render buffer, got {}",
                            rb.format()
                        )));
                    }
                }
            }
            let shape = t.shape().ok_or_else(|| {
                GlooError::Value(format!("texture {} has no storage to attach", t.id()))
            })?;
            let current = self.slot(point).as_ref().map(Attachment::id);
            for other in self.attachments().filter(|a| Some(a.id()) != current) {
                if other.shape().is_some_and(|s| s != shape) {
                    return Err(GlooError::Value(format!(
                        "{point} attachment of shape {shape:?} does not match {:?}",
                        other.shape()
                    )));
                }
            }
        }
        self.obj.push(Command::Attach { id: self.obj.id(), point, target: target.as_ref().map(Attachment::id) })?;
        Ok(std::mem::replace(self.slot(point), target))
    }

    /// Reallocates every attachment to `[h, w]`. Fails without touching
    /// anything if one of them is not resizable.
    pub fn resize(&mut self, shape: [usize; 2]) -> Result<()> {
        self.obj.check_alive()?;
        if shape.contains(&0) {
            return Err(GlooError::Value(format!("framebuffer shape {shape:?} is empty")));
        }
        if let Some(fixed) = self.attachments().find(|a| !a.is_resizable() && a.shape() != Some(shape)) {
            return Err(GlooError::Resource(format!(
                "attachment {} of framebuffer {} is not resizable",
                fixed.id(),
                self.id()
            )));
        }
        for slot in [&mut self.color, &mut self.depth, &mut self.stencil] {
            if let Some(a) = slot {
                a.resize(shape)?;
            }
        }
        Ok(())
    }

    /// Makes this the render target. Calls nest with [`deactivate`].
    ///
    /// [`deactivate`]: FrameBuffer::deactivate
    pub fn activate(&mut self) -> Result<()> {
        self.obj.push(Command::Framebuffer { id: self.obj.id(), bind: true })?;
        self.active += 1;
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<()> {
        if self.active == 0 {
            return Err(GlooError::Resource(format!("framebuffer {} is not active", self.id())));
        }
        self.obj.push(Command::Framebuffer { id: self.obj.id(), bind: false })?;
        self.active -= 1;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active > 0
    }

    /// Reads the color attachment (rows top to bottom). Flushes the context.
    pub fn read(&mut self) -> Result<Pixels> {
        let Some(shape) = self.color.as_ref().and_then(Attachment::shape) else {
            return Err(GlooError::Resource(format!("framebuffer {} has no color attachment", self.id())));
        };
        self.activate()?;
        let pixels = self.obj.context().read_pixels(Some([0, 0, shape[1] as i32, shape[0] as i32]));
        self.deactivate()?;
        pixels
    }

    pub fn delete(&mut self) {
        self.obj.delete();
        self.active = 0;
    }
}
