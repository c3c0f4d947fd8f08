//! Vertex and index buffers.
//!
//! Typed slices are converted to bytes with `bytemuck`; the element type
//! decides the vertex layout (or index type) recorded with the buffer.

use std::cell::Cell;
use std::ops::Range;
use std::rc::Rc;

use bytes::Bytes;

use super::object::GlObject;
use crate::context::GlContext;
use crate::error::{GlooError, Result};
use crate::glir::{
    BufferUsage, Command, DataArgs, IndexType, ObjectId, ObjectKind, SizeArgs, VertexLayout,
    VertexType,
};

// ── element types ─────────────────────────────────────────────────────────

/// Scalar that may appear in buffer data.
pub trait GlScalar: bytemuck::Pod {
    const NAME: &'static str;
    const VERTEX: Option<VertexType>;
    const INDEX: Option<IndexType>;
}

/// One buffer element: a scalar or a fixed-size array of scalars.
pub trait Element: bytemuck::Pod {
    type Scalar: GlScalar;
    const COMPONENTS: usize;
}

macro_rules! gl_scalar {
    ($($t:ty => $vertex:expr, $index:expr;)+) => {$(
        impl GlScalar for $t {
            const NAME: &'static str = stringify!($t);
            const VERTEX: Option<VertexType> = $vertex;
            const INDEX: Option<IndexType> = $index;
        }

        impl Element for $t {
            type Scalar = $t;
            const COMPONENTS: usize = 1;
        }

        impl<const N: usize> Element for [$t; N] {
            type Scalar = $t;
            const COMPONENTS: usize = N;
        }
    )+};
}

gl_scalar! {
    i8  => Some(VertexType::I8),  None;
    u8  => Some(VertexType::U8),  Some(IndexType::U8);
    i16 => Some(VertexType::I16), None;
    u16 => Some(VertexType::U16), Some(IndexType::U16);
    i32 => None,                  None;
    u32 => None,                  Some(IndexType::U32);
    f32 => Some(VertexType::F32), None;
    f64 => None,                  None;
}

fn vertex_layout<E: Element>() -> Result<VertexLayout> {
    let ty = <E::Scalar as GlScalar>::VERTEX.ok_or_else(|| {
        GlooError::Type(format!(
            "{} cannot be used as vertex data",
            <E::Scalar as GlScalar>::NAME
        ))
    })?;
    if !(1..=4).contains(&E::COMPONENTS) {
        return Err(GlooError::Type(format!(
            "vertex elements need 1 to 4 components, got {}",
            E::COMPONENTS
        )));
    }
    Ok(VertexLayout::new(ty, E::COMPONENTS as u8))
}

fn index_type<E: Element>() -> Result<IndexType> {
    let name = <E::Scalar as GlScalar>::NAME;
    match <E::Scalar as GlScalar>::INDEX {
        Some(ty) if E::COMPONENTS == 1 => Ok(ty),
        Some(_) => Err(GlooError::Type(format!(
            "index data must be scalar {name}, not [{name}; {}]",
            E::COMPONENTS
        ))),
        None => Err(GlooError::Type(format!("{name} cannot be used as index data"))),
    }
}

// ── shared core ───────────────────────────────────────────────────────────

/// A write queued since the last flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub offset: usize,
    pub data:   Bytes,
    epoch:      u64,
}

impl PendingWrite {
    pub fn nbytes(&self) -> usize {
        self.data.len()
    }
}

/// State readable by views and programs after the buffer is borrowed away.
#[derive(Debug, Default)]
pub(crate) struct BufferShared {
    pub(crate) nbytes:     Cell<usize>,
    /// Bumped whenever the storage is reallocated.
    pub(crate) generation: Cell<u64>,
    pub(crate) deleted:    Cell<bool>,
}

#[derive(Debug)]
struct BufferCore {
    obj:     GlObject,
    usage:   BufferUsage,
    pending: Vec<PendingWrite>,
    shared:  Rc<BufferShared>,
}

impl BufferCore {
    fn new(ctx: &GlContext, kind: ObjectKind, usage: BufferUsage) -> Self {
        Self {
            obj: GlObject::new(ctx, kind),
            usage,
            pending: Vec::new(),
            shared: Rc::new(BufferShared::default()),
        }
    }

    fn nbytes(&self) -> usize {
        self.shared.nbytes.get()
    }

    fn epoch(&self) -> u64 {
        self.obj.context().epoch()
    }

    fn resize(&mut self, nbytes: usize) -> Result<()> {
        self.obj.check_alive()?;
        self.obj.push(Command::Size {
            id: self.obj.id(),
            args: SizeArgs::Buffer { nbytes, usage: self.usage },
        })?;
        self.pending.clear();
        if nbytes != self.nbytes() {
            self.shared.generation.set(self.shared.generation.get() + 1);
        }
        self.shared.nbytes.set(nbytes);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: Bytes) -> Result<()> {
        self.obj.push(Command::Data {
            id: self.obj.id(),
            args: DataArgs::Buffer { offset, data: data.clone() },
        })?;
        let epoch = self.epoch();
        // Writes from earlier epochs were flushed already.
        self.pending.retain(|w| w.epoch == epoch);
        self.pending.push(PendingWrite { offset, data, epoch });
        Ok(())
    }

    fn set_data(&mut self, data: Bytes) -> Result<()> {
        self.obj.check_alive()?;
        self.resize(data.len())?;
        if !data.is_empty() {
            self.write(0, data)?;
        }
        Ok(())
    }

    fn set_subdata(&mut self, offset: usize, data: Bytes) -> Result<()> {
        self.obj.check_alive()?;
        let nbytes = self.nbytes();
        if nbytes == 0 {
            return Err(GlooError::Value(format!(
                "buffer {} has no storage; set its data first",
                self.obj.id()
            )));
        }
        if offset.checked_add(data.len()).is_none_or(|end| end > nbytes) {
            return Err(GlooError::Value(format!(
                "write of {} bytes at offset {offset} exceeds buffer of {nbytes} bytes",
                data.len()
            )));
        }
        if offset == 0 && data.len() == nbytes {
            return self.set_data(data);
        }
        self.write(offset, data)
    }

    fn pending(&self) -> Vec<PendingWrite> {
        let epoch = self.epoch();
        self.pending.iter().filter(|w| w.epoch == epoch).cloned().collect()
    }

    fn delete(&mut self) {
        self.obj.delete();
        self.pending.clear();
        self.shared.deleted.set(true);
    }
}

impl Drop for BufferCore {
    fn drop(&mut self) {
        self.shared.deleted.set(true);
    }
}

fn element_offset(element: usize, itemsize: usize) -> Result<usize> {
    element
        .checked_mul(itemsize)
        .ok_or_else(|| GlooError::Value(format!("element offset {element} is out of range")))
}

fn to_bytes<E: Element>(data: &[E]) -> Bytes {
    Bytes::copy_from_slice(bytemuck::cast_slice(data))
}

// ── VertexBuffer ──────────────────────────────────────────────────────────

/// Buffer of per-vertex attribute data.
#[derive(Debug)]
pub struct VertexBuffer {
    core:   BufferCore,
    layout: Option<VertexLayout>,
}

impl VertexBuffer {
    pub fn new(ctx: &GlContext, usage: BufferUsage) -> Self {
        Self { core: BufferCore::new(ctx, ObjectKind::VertexBuffer, usage), layout: None }
    }

    pub fn with_data<E: Element>(ctx: &GlContext, data: &[E]) -> Result<Self> {
        let mut vbo = Self::new(ctx, BufferUsage::default());
        vbo.set_data(data)?;
        Ok(vbo)
    }

    pub fn object(&self) -> &GlObject {
        &self.core.obj
    }

    pub fn id(&self) -> ObjectId {
        self.core.obj.id()
    }

    pub fn usage(&self) -> BufferUsage {
        self.core.usage
    }

    pub fn nbytes(&self) -> usize {
        self.core.nbytes()
    }

    /// Element layout set by the last `set_data`.
    pub fn layout(&self) -> Option<VertexLayout> {
        self.layout
    }

    /// Number of whole elements.
    pub fn len(&self) -> usize {
        self.layout.map_or(0, |l| self.nbytes() / l.itemsize())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the whole contents; the buffer takes the size and layout of
    /// `data`.
    pub fn set_data<E: Element>(&mut self, data: &[E]) -> Result<()> {
        let layout = vertex_layout::<E>()?;
        self.core.set_data(to_bytes(data))?;
        self.layout = Some(layout);
        Ok(())
    }

    /// Writes `data` at a byte offset. Never resizes.
    pub fn set_subdata<E: Element>(&mut self, offset: usize, data: &[E]) -> Result<()> {
        let layout = vertex_layout::<E>()?;
        if let Some(current) = self.layout
            && current != layout
        {
            return Err(GlooError::Type(format!(
                "buffer holds {}x{} elements, got {}x{}",
                current.ty, current.components, layout.ty, layout.components
            )));
        }
        self.core.set_subdata(offset, to_bytes(data))
    }

    /// Writes `data` starting at element index `element`.
    pub fn set_subdata_at<E: Element>(&mut self, element: usize, data: &[E]) -> Result<()> {
        let layout = vertex_layout::<E>()?;
        self.set_subdata(element_offset(element, layout.itemsize())?, data)
    }

    /// Reallocates to `nbytes` of undefined contents. Invalidates views.
    pub fn resize_bytes(&mut self, nbytes: usize) -> Result<()> {
        self.core.resize(nbytes)
    }

    /// Writes queued since the last flush, oldest first.
    pub fn pending_writes(&self) -> Vec<PendingWrite> {
        self.core.pending()
    }

    /// View of the elements in `range`, usable as an attribute source.
    pub fn view(&self, range: Range<usize>) -> Result<BufferView> {
        self.core.obj.check_alive()?;
        let layout = self.require_layout()?;
        if range.start > range.end || range.end > self.len() {
            return Err(GlooError::Value(format!(
                "view {range:?} out of bounds for {} elements",
                self.len()
            )));
        }
        Ok(self.make_view(layout, range.start * layout.itemsize(), 0, range.len()))
    }

    /// View of one field of interleaved elements: `layout` read at byte
    /// `offset` inside each element.
    pub fn field(&self, offset: usize, layout: VertexLayout) -> Result<BufferView> {
        self.core.obj.check_alive()?;
        let element = self.require_layout()?;
        let stride = element.itemsize();
        if offset + layout.itemsize() > stride {
            return Err(GlooError::Value(format!(
                "field of {} bytes at offset {offset} does not fit a {stride}-byte element",
                layout.itemsize()
            )));
        }
        Ok(self.make_view(layout, offset, stride, self.len()))
    }

    fn require_layout(&self) -> Result<VertexLayout> {
        self.layout.ok_or_else(|| {
            GlooError::Value(format!("vertex buffer {} has no data", self.id()))
        })
    }

    fn make_view(&self, layout: VertexLayout, offset: usize, stride: usize, count: usize) -> BufferView {
        BufferView {
            vbo: self.id(),
            layout,
            offset,
            stride,
            count,
            generation: self.core.shared.generation.get(),
            shared: Rc::clone(&self.core.shared),
        }
    }

    pub(crate) fn shared(&self) -> &Rc<BufferShared> {
        &self.core.shared
    }

    pub fn delete(&mut self) {
        self.core.delete();
    }
}

/// A window onto a vertex buffer for attribute binding.
///
/// A view stops being valid when its buffer is resized or deleted.
#[derive(Debug, Clone)]
pub struct BufferView {
    vbo:        ObjectId,
    layout:     VertexLayout,
    offset:     usize,
    stride:     usize,
    count:      usize,
    generation: u64,
    shared:     Rc<BufferShared>,
}

impl BufferView {
    pub fn buffer_id(&self) -> ObjectId {
        self.vbo
    }

    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    /// Byte offset of the first element.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte distance between elements; 0 means tightly packed.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of elements covered.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_valid(&self) -> bool {
        !self.shared.deleted.get() && self.shared.generation.get() == self.generation
    }

    pub(crate) fn shared(&self) -> &Rc<BufferShared> {
        &self.shared
    }
}

// ── IndexBuffer ───────────────────────────────────────────────────────────

/// Buffer of vertex indices for element draws.
#[derive(Debug)]
pub struct IndexBuffer {
    core:       BufferCore,
    index_type: Option<IndexType>,
}

impl IndexBuffer {
    pub fn new(ctx: &GlContext, usage: BufferUsage) -> Self {
        Self { core: BufferCore::new(ctx, ObjectKind::IndexBuffer, usage), index_type: None }
    }

    pub fn with_data<E: Element>(ctx: &GlContext, data: &[E]) -> Result<Self> {
        let mut ibo = Self::new(ctx, BufferUsage::default());
        ibo.set_data(data)?;
        Ok(ibo)
    }

    pub fn object(&self) -> &GlObject {
        &self.core.obj
    }

    pub fn id(&self) -> ObjectId {
        self.core.obj.id()
    }

    pub fn nbytes(&self) -> usize {
        self.core.nbytes()
    }

    pub fn index_type(&self) -> Option<IndexType> {
        self.index_type
    }

    /// Number of indices.
    pub fn len(&self) -> usize {
        self.index_type.map_or(0, |t| self.nbytes() / t.size())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_data<E: Element>(&mut self, data: &[E]) -> Result<()> {
        let ty = index_type::<E>()?;
        self.core.set_data(to_bytes(data))?;
        self.index_type = Some(ty);
        Ok(())
    }

    /// Writes indices starting at index position `element`.
    pub fn set_subdata_at<E: Element>(&mut self, element: usize, data: &[E]) -> Result<()> {
        let ty = index_type::<E>()?;
        if self.index_type.is_some_and(|t| t != ty) {
            return Err(GlooError::Type(format!(
                "index buffer holds {}, got {ty}",
                self.index_type.map_or("nothing", IndexType::name)
            )));
        }
        self.core.set_subdata(element_offset(element, ty.size())?, to_bytes(data))
    }

    pub fn pending_writes(&self) -> Vec<PendingWrite> {
        self.core.pending()
    }

    pub fn is_deleted(&self) -> bool {
        self.core.obj.is_deleted()
    }

    pub fn delete(&mut self) {
        self.core.delete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GlConfig;
    use crate::glir::{HeadlessBackend, LocalParser, Opcode};

    fn ctx() -> GlContext {
        GlContext::new(GlConfig::default())
    }

    fn ops(ctx: &GlContext) -> Vec<Opcode> {
        ctx.pending_commands().iter().map(Command::opcode).collect()
    }

    // ── layouts ──

    #[test]
    fn element_types_set_layout() {
        let ctx = ctx();
        let vbo = VertexBuffer::with_data(&ctx, &[[0.0f32; 3]; 4]).unwrap();
        assert_eq!(vbo.layout(), Some(VertexLayout::new(VertexType::F32, 3)));
        assert_eq!((vbo.nbytes(), vbo.len()), (48, 4));

        let err = VertexBuffer::with_data(&ctx, &[0.0f64; 2]).unwrap_err();
        assert!(matches!(err, GlooError::Type(_)));
        let err = VertexBuffer::with_data(&ctx, &[[0u8; 5]]).unwrap_err();
        assert!(matches!(err, GlooError::Type(_)));
    }

    #[test]
    fn index_types() {
        let ctx = ctx();
        let ibo = IndexBuffer::with_data(&ctx, &[0u16, 1, 2]).unwrap();
        assert_eq!(ibo.index_type(), Some(IndexType::U16));
        assert_eq!(ibo.len(), 3);
        assert!(matches!(IndexBuffer::with_data(&ctx, &[0.0f32]), Err(GlooError::Type(_))));
        assert!(matches!(IndexBuffer::with_data(&ctx, &[[0u32; 2]]), Err(GlooError::Type(_))));
    }

    // ── writes ──

    #[test]
    fn set_data_queues_size_and_data() {
        let ctx = ctx();
        let _vbo = VertexBuffer::with_data(&ctx, &[1.0f32, 2.0]).unwrap();
        assert_eq!(ops(&ctx), [Opcode::Create, Opcode::Size, Opcode::Data]);
    }

    #[test]
    fn subdata_out_of_bounds_queues_nothing() {
        let ctx = ctx();
        let mut vbo = VertexBuffer::with_data(&ctx, &[0.0f32; 4]).unwrap();
        let before = ctx.pending_len();
        let err = vbo.set_subdata(12, &[1.0f32, 2.0]).unwrap_err();
        assert!(matches!(err, GlooError::Value(_)));
        assert_eq!(ctx.pending_len(), before);
        vbo.set_subdata(8, &[1.0f32, 2.0]).unwrap();
        assert_eq!(ctx.pending_len(), before + 1);
    }

    #[test]
    fn subdata_at_huge_offsets_is_a_value_error() {
        let ctx = ctx();
        let mut vbo = VertexBuffer::with_data(&ctx, &[0u8; 16]).unwrap();
        let before = ctx.pending_len();
        assert!(matches!(vbo.set_subdata(usize::MAX, &[1u8; 2]), Err(GlooError::Value(_))));
        assert!(matches!(vbo.set_subdata_at(usize::MAX, &[1u8]), Err(GlooError::Value(_))));
        let mut ibo = IndexBuffer::with_data(&ctx, &[0u32; 4]).unwrap();
        assert!(matches!(ibo.set_subdata_at(usize::MAX / 2, &[1u32]), Err(GlooError::Value(_))));
        assert_eq!(ctx.pending_len(), before + 3);
    }

    #[test]
    fn flushed_writes_are_released() {
        let (ctx, _parser) = GlContext::with_parser(
            GlConfig::default(),
            LocalParser::new(HeadlessBackend::new(1, 1)),
        )
        .unwrap();
        let mut vbo = VertexBuffer::with_data(&ctx, &[0.0f32; 512]).unwrap();
        for _ in 0..20 {
            vbo.set_subdata(0, &[1.0f32; 256]).unwrap();
            ctx.flush().unwrap();
        }
        vbo.set_subdata(4, &[2.0f32]).unwrap();
        assert_eq!(vbo.core.pending.len(), 1);
        assert_eq!(vbo.pending_writes().len(), 1);
    }

    #[test]
    fn subdata_needs_storage() {
        let ctx = ctx();
        let mut vbo = VertexBuffer::new(&ctx, BufferUsage::Stream);
        assert!(matches!(vbo.set_subdata(0, &[1.0f32]), Err(GlooError::Value(_))));
    }

    #[test]
    fn full_subdata_is_promoted() {
        let ctx = ctx();
        let mut vbo = VertexBuffer::with_data(&ctx, &[0u8; 4]).unwrap();
        vbo.set_subdata(0, &[1u8, 2, 3, 4]).unwrap();
        assert_eq!(ops(&ctx)[3..], [Opcode::Size, Opcode::Data]);
        assert_eq!(vbo.pending_writes().len(), 1);
    }

    #[test]
    fn element_offsets() {
        let ctx = ctx();
        let mut vbo = VertexBuffer::with_data(&ctx, &[[0.0f32; 2]; 4]).unwrap();
        vbo.set_subdata_at(2, &[[1.0f32, 1.0]]).unwrap();
        let last = vbo.pending_writes().pop().unwrap();
        assert_eq!((last.offset, last.nbytes()), (16, 8));
        let err = vbo.set_subdata_at(1, &[1u8]).unwrap_err();
        assert!(matches!(err, GlooError::Type(_)));
    }

    #[test]
    fn pending_writes_reset_by_set_data() {
        let ctx = ctx();
        let mut vbo = VertexBuffer::with_data(&ctx, &[0.0f32; 4]).unwrap();
        vbo.set_subdata(4, &[1.0f32]).unwrap();
        assert_eq!(vbo.pending_writes().len(), 2);
        vbo.set_data(&[0.0f32; 4]).unwrap();
        assert_eq!(vbo.pending_writes().len(), 1);
    }

    #[test]
    fn deleted_buffer_rejects_writes() {
        let ctx = ctx();
        let mut vbo = VertexBuffer::with_data(&ctx, &[0.0f32; 4]).unwrap();
        vbo.delete();
        assert!(matches!(vbo.set_data(&[1.0f32]), Err(GlooError::Resource(_))));
        assert!(matches!(vbo.view(0..1), Err(GlooError::Resource(_))));
    }

    // ── views ──

    #[test]
    fn views_are_invalidated_by_resize() {
        let ctx = ctx();
        let mut vbo = VertexBuffer::with_data(&ctx, &[[0.0f32; 2]; 4]).unwrap();
        let view = vbo.view(1..3).unwrap();
        assert_eq!((view.offset(), view.count()), (8, 2));
        vbo.set_data(&[[1.0f32; 2]; 4]).unwrap();
        assert!(view.is_valid());
        vbo.resize_bytes(64).unwrap();
        assert!(!view.is_valid());
        assert!(vbo.view(3..9).is_err());
    }

    #[test]
    fn interleaved_fields() {
        let ctx = ctx();
        // position (2) + color (3) per vertex
        let vbo = VertexBuffer::with_data(&ctx, &[[0.0f32; 5]; 3]).unwrap();
        let color = vbo.field(8, VertexLayout::new(VertexType::F32, 3)).unwrap();
        assert_eq!((color.offset(), color.stride(), color.count()), (8, 20, 3));
        assert!(vbo.field(12, VertexLayout::new(VertexType::F32, 3)).is_err());
    }
}
