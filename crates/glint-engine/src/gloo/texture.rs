//! 2D and 3D textures with per-level bookkeeping.
//!
//! Shapes are `[h, w, c]` (2D) or `[d, h, w, c]` (3D); a shape given
//! without the channel axis gets one channel.

use std::collections::BTreeMap;

use bytes::Bytes;
use glint_glsl::GlslType;

use super::object::GlObject;
use crate::context::GlContext;
use crate::error::{GlooError, Result};
use crate::glir::{
    Command, DataArgs, Interpolation, ObjectId, ObjectKind, SizeArgs, TexelType, TextureFormat, Wrapping,
};

/// Scalar a texture can be filled with.
pub trait Texel: bytemuck::Pod {
    const TYPE: TexelType;
}

macro_rules! texel {
    ($($t:ty => $v:ident),+ $(,)?) => {$(
        impl Texel for $t {
            const TYPE: TexelType = TexelType::$v;
        }
    )+};
}

texel!(i8 => I8, u8 => U8, i16 => I16, u16 => U16, i32 => I32, u32 => U32, f32 => F32);

/// A texel upload queued since the last flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTexels {
    pub offset: Vec<usize>,
    pub shape:  Vec<usize>,
    pub texel:  TexelType,
    pub data:   Bytes,
    epoch:      u64,
}

/// Storage description of one mip level.
#[derive(Debug, Clone)]
pub struct TextureLevel {
    shape:      Vec<usize>,
    format:     TextureFormat,
    texel:      TexelType,
    resized_at: Option<u64>,
    pending:    Vec<PendingTexels>,
}

impl TextureLevel {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn texel(&self) -> TexelType {
        self.texel
    }

    pub fn pending(&self) -> &[PendingTexels] {
        &self.pending
    }
}

/// Something a program can bind to a sampler uniform.
pub trait Sampled {
    fn sampler_id(&self) -> ObjectId;
    fn sampler_type(&self) -> GlslType;
    fn check_alive(&self) -> Result<()>;
}

/// Picks the format for `channels`, keeping a previous single-channel
/// choice when none is given.
fn infer_format(
    channels: usize,
    given: Option<TextureFormat>,
    previous: Option<TextureFormat>,
) -> Result<TextureFormat> {
    if let Some(format) = given {
        if format.channels() != channels {
            return Err(GlooError::Value(format!(
                "format {format} needs {} channels, data has {channels}",
                format.channels()
            )));
        }
        return Ok(format);
    }
    match previous {
        Some(prev) if channels == 1 && prev.channels() == 1 => Ok(prev),
        _ => TextureFormat::from_channels(channels)
            .ok_or_else(|| GlooError::Value(format!("textures have 1 to 4 channels, not {channels}"))),
    }
}

#[derive(Debug)]
struct TextureCore {
    obj:           GlObject,
    ndim:          usize,
    levels:        BTreeMap<u32, TextureLevel>,
    interpolation: (Interpolation, Interpolation),
    wrapping:      Vec<Wrapping>,
    resizable:     bool,
}

impl TextureCore {
    fn new(ctx: &GlContext, kind: ObjectKind, ndim: usize) -> Self {
        Self {
            obj: GlObject::new(ctx, kind),
            ndim,
            levels: BTreeMap::new(),
            interpolation: (Interpolation::Nearest, Interpolation::Nearest),
            wrapping: vec![Wrapping::ClampToEdge; ndim],
            resizable: true,
        }
    }

    fn normalize_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        let mut shape = shape.to_vec();
        if shape.len() == self.ndim {
            shape.push(1);
        }
        if shape.len() != self.ndim + 1 {
            return Err(GlooError::Value(format!(
                "{}D texture shape must have {} or {} dimensions, got {shape:?}",
                self.ndim,
                self.ndim,
                self.ndim + 1
            )));
        }
        let channels = shape[self.ndim];
        if !(1..=4).contains(&channels) {
            return Err(GlooError::Value(format!("textures have 1 to 4 channels, not {channels}")));
        }
        if shape[..self.ndim].contains(&0) {
            return Err(GlooError::Value(format!("texture shape {shape:?} has an empty axis")));
        }
        Ok(shape)
    }

    /// Without an explicit `texel` the level keeps its previous one.
    fn set_shape(
        &mut self,
        level: u32,
        shape: &[usize],
        format: Option<TextureFormat>,
        texel: Option<TexelType>,
    ) -> Result<()> {
        self.obj.check_alive()?;
        let shape = self.normalize_shape(shape)?;
        let previous = self.levels.get(&level);
        let format = infer_format(shape[self.ndim], format, previous.map(|l| l.format))?;
        let texel = texel.or(previous.map(|l| l.texel)).unwrap_or_default();
        if let Some(prev) = previous {
            if prev.shape == shape && prev.format == format && prev.texel == texel {
                return Ok(());
            }
            if !self.resizable && prev.shape != shape {
                return Err(GlooError::Resource(format!(
                    "texture {} is not resizable ({:?} -> {shape:?})",
                    self.obj.id(),
                    prev.shape
                )));
            }
        }
        self.obj.push(Command::Size {
            id: self.obj.id(),
            args: SizeArgs::Texture { level, shape: shape.clone(), format, texel },
        })?;
        let epoch = self.obj.context().epoch();
        self.levels.insert(level, TextureLevel {
            shape,
            format,
            texel,
            resized_at: Some(epoch),
            pending: Vec::new(),
        });
        Ok(())
    }

    fn set_data<T: Texel>(
        &mut self,
        level: u32,
        data: &[T],
        shape: &[usize],
        format: Option<TextureFormat>,
    ) -> Result<()> {
        self.obj.check_alive()?;
        let normalized = self.normalize_shape(shape)?;
        check_len(data, &normalized)?;
        self.set_shape(level, &normalized, format, Some(T::TYPE))?;
        if let Some(l) = self.levels.get_mut(&level) {
            l.pending.clear();
        }
        self.write(level, vec![0; self.ndim], normalized, data)
    }

    fn set_subdata<T: Texel>(
        &mut self,
        level: u32,
        offset: &[usize],
        data: &[T],
        shape: &[usize],
    ) -> Result<()> {
        self.obj.check_alive()?;
        let shape = self.normalize_shape(shape)?;
        check_len(data, &shape)?;
        let stored = self.levels.get(&level).ok_or_else(|| {
            GlooError::Value(format!(
                "texture {} level {level} has no storage; set its shape first",
                self.obj.id()
            ))
        })?;
        if stored.texel != T::TYPE {
            return Err(GlooError::Type(format!(
                "level {level} stores {} texels, not {}",
                stored.texel,
                T::TYPE
            )));
        }
        if offset.len() != self.ndim {
            return Err(GlooError::Value(format!(
                "offset {offset:?} must have {} coordinates",
                self.ndim
            )));
        }
        let fits = shape[self.ndim] == stored.shape[self.ndim]
            && (0..self.ndim)
                .all(|d| offset[d].checked_add(shape[d]).is_some_and(|end| end <= stored.shape[d]));
        if !fits {
            return Err(GlooError::Value(format!(
                "data {shape:?} at {offset:?} does not fit level {level} of shape {:?}",
                stored.shape
            )));
        }
        self.write(level, offset.to_vec(), shape, data)
    }

    fn write<T: Texel>(&mut self, level: u32, offset: Vec<usize>, shape: Vec<usize>, data: &[T]) -> Result<()> {
        let data = Bytes::copy_from_slice(bytemuck::cast_slice(data));
        self.obj.push(Command::Data {
            id: self.obj.id(),
            args: DataArgs::Texture {
                level,
                offset: offset.clone(),
                shape: shape.clone(),
                texel: T::TYPE,
                data: data.clone(),
            },
        })?;
        let epoch = self.obj.context().epoch();
        if let Some(l) = self.levels.get_mut(&level) {
            // Uploads from earlier epochs were flushed already.
            l.pending.retain(|w| w.epoch == epoch);
            l.pending.push(PendingTexels { offset, shape, texel: T::TYPE, data, epoch });
        }
        Ok(())
    }

    fn set_interpolation(&mut self, min: Interpolation, mag: Interpolation) -> Result<()> {
        self.obj.push(Command::Interpolation { id: self.obj.id(), min, mag })?;
        self.interpolation = (min, mag);
        Ok(())
    }

    fn set_wrapping(&mut self, wrap: &[Wrapping]) -> Result<()> {
        if wrap.len() != self.ndim {
            return Err(GlooError::Value(format!(
                "{}D texture takes {} wrapping modes, got {}",
                self.ndim,
                self.ndim,
                wrap.len()
            )));
        }
        self.obj.push(Command::Wrapping { id: self.obj.id(), wrap: wrap.to_vec() })?;
        self.wrapping = wrap.to_vec();
        Ok(())
    }

    fn need_resize(&self, level: u32) -> bool {
        let epoch = self.obj.context().epoch();
        self.levels.get(&level).is_some_and(|l| l.resized_at == Some(epoch))
    }

    fn level(&self, level: u32) -> Option<TextureLevel> {
        let epoch = self.obj.context().epoch();
        self.levels.get(&level).map(|l| {
            let mut l = l.clone();
            l.pending.retain(|w| w.epoch == epoch);
            l
        })
    }
}

fn check_len<T>(data: &[T], shape: &[usize]) -> Result<()> {
    let expected = shape.iter().try_fold(1usize, |n, d| n.checked_mul(*d));
    if expected != Some(data.len()) {
        return Err(GlooError::Value(format!(
            "{} texels given for shape {shape:?}",
            data.len()
        )));
    }
    Ok(())
}

macro_rules! texture_api {
    ($name:ident, $kind:expr, $ndim:literal, $sampler:expr, $offset:ty) => {
        impl $name {
            /// Empty texture; storage is allocated by the first shape or data.
            pub fn new(ctx: &GlContext) -> Self {
                Self { core: TextureCore::new(ctx, $kind, $ndim) }
            }

            /// Texture created with level 0 holding `data` of `shape`.
            pub fn with_data<T: Texel>(ctx: &GlContext, data: &[T], shape: &[usize]) -> Result<Self> {
                let mut tex = Self::new(ctx);
                tex.set_data(data, shape)?;
                Ok(tex)
            }

            pub fn object(&self) -> &GlObject {
                &self.core.obj
            }

            pub fn id(&self) -> ObjectId {
                self.core.obj.id()
            }

            /// Shape of level 0, `None` before allocation.
            pub fn shape(&self) -> Option<&[usize]> {
                self.core.levels.get(&0).map(|l| l.shape.as_slice())
            }

            pub fn format(&self) -> Option<TextureFormat> {
                self.core.levels.get(&0).map(|l| l.format)
            }

            /// Level bookkeeping. Pending writes are those queued since the
            /// last flush.
            pub fn level(&self, level: u32) -> Option<TextureLevel> {
                self.core.level(level)
            }

            pub fn levels(&self) -> impl Iterator<Item = u32> + '_ {
                self.core.levels.keys().copied()
            }

            /// True if a SIZE for `level` is queued and not yet flushed.
            pub fn need_resize(&self, level: u32) -> bool {
                self.core.need_resize(level)
            }

            pub fn is_resizable(&self) -> bool {
                self.core.resizable
            }

            /// A non-resizable texture rejects shape changes once allocated.
            pub fn set_resizable(&mut self, resizable: bool) {
                self.core.resizable = resizable;
            }

            /// Replaces level 0, allocating it to `shape`.
            pub fn set_data<T: Texel>(&mut self, data: &[T], shape: &[usize]) -> Result<()> {
                self.core.set_data(0, data, shape, None)
            }

            /// Replaces `level` with an explicit or inferred format.
            pub fn set_level_data<T: Texel>(
                &mut self,
                level: u32,
                data: &[T],
                shape: &[usize],
                format: Option<TextureFormat>,
            ) -> Result<()> {
                self.core.set_data(level, data, shape, format)
            }

            /// Reallocates `level` without uploading, keeping its texel type.
            /// Discards the level's pending writes; no-op if shape and format
            /// are unchanged.
            pub fn set_shape(
                &mut self,
                level: u32,
                shape: &[usize],
                format: Option<TextureFormat>,
            ) -> Result<()> {
                self.core.set_shape(level, shape, format, None)
            }

            /// Writes texels at `offset` inside an allocated level. The
            /// texel type must match the level's storage.
            pub fn set_subdata<T: Texel>(
                &mut self,
                level: u32,
                offset: $offset,
                data: &[T],
                shape: &[usize],
            ) -> Result<()> {
                self.core.set_subdata(level, &offset, data, shape)
            }

            pub fn interpolation(&self) -> (Interpolation, Interpolation) {
                self.core.interpolation
            }

            pub fn set_interpolation(&mut self, min: Interpolation, mag: Interpolation) -> Result<()> {
                self.core.set_interpolation(min, mag)
            }

            pub fn wrapping(&self) -> &[Wrapping] {
                &self.core.wrapping
            }

            /// One mode per axis.
            pub fn set_wrapping(&mut self, wrap: &[Wrapping]) -> Result<()> {
                self.core.set_wrapping(wrap)
            }

            pub fn set_wrapping_all(&mut self, wrap: Wrapping) -> Result<()> {
                self.core.set_wrapping(&[wrap; $ndim])
            }

            pub fn is_deleted(&self) -> bool {
                self.core.obj.is_deleted()
            }

            pub fn delete(&mut self) {
                self.core.obj.delete();
                self.core.levels.clear();
            }
        }

        impl Sampled for $name {
            fn sampler_id(&self) -> ObjectId {
                self.id()
            }

            fn sampler_type(&self) -> GlslType {
                $sampler
            }

            fn check_alive(&self) -> Result<()> {
                self.core.obj.check_alive()
            }
        }
    };
}

/// Two-dimensional texture.
#[derive(Debug)]
pub struct Texture2D {
    core: TextureCore,
}

texture_api!(Texture2D, ObjectKind::Texture2D, 2, GlslType::Sampler2D, [usize; 2]);

/// Three-dimensional texture. Needs 3D texture support in the interpreter.
#[derive(Debug)]
pub struct Texture3D {
    core: TextureCore,
}

texture_api!(Texture3D, ObjectKind::Texture3D, 3, GlslType::Sampler3D, [usize; 3]);

/// Packs many small RGB `float32` regions into one 2D texture.
///
/// Regions are placed bottom-left on a skyline: a list of horizontal
/// segments `(x, y, width)` tracing the top edge of the used area.
#[derive(Debug)]
pub struct TextureAtlas {
    texture: Texture2D,
    nodes:   Vec<(usize, usize, usize)>,
}

/// Nearest power of two in log space, `700 -> 512`, `100 -> 128`.
fn round_pow2(n: usize) -> usize {
    let exp = ((n as f64).log2() + 0.5).floor() as u32;
    1usize << exp
}

impl TextureAtlas {
    /// Atlas of `[h, w]` texels, each axis rounded to a power of two.
    pub fn new(ctx: &GlContext, shape: [usize; 2]) -> Result<Self> {
        if shape.contains(&0) {
            return Err(GlooError::Value(format!("atlas shape {shape:?} has an empty axis")));
        }
        let [h, w] = shape.map(round_pow2);
        let mut texture = Texture2D::with_data(ctx, &vec![0f32; h * w * 3], &[h, w, 3])?;
        texture.set_interpolation(Interpolation::Linear, Interpolation::Linear)?;
        texture.set_wrapping_all(Wrapping::ClampToEdge)?;
        Ok(Self { texture, nodes: vec![(0, 0, w)] })
    }

    pub fn texture(&self) -> &Texture2D {
        &self.texture
    }

    /// `[h, w]` in texels.
    pub fn size(&self) -> [usize; 2] {
        match self.texture.shape() {
            Some(&[h, w, _]) => [h, w],
            _ => [0, 0],
        }
    }

    /// Reserves a `width` x `height` region and returns it as
    /// `[x, y, w, h]`, or `None` when nothing fits.
    pub fn get_free_region(&mut self, width: usize, height: usize) -> Option<[usize; 4]> {
        if width == 0 || height == 0 {
            return None;
        }
        // (bottom edge, node width, node index)
        let mut best: Option<(usize, usize, usize)> = None;
        let mut region = [0; 4];
        for i in 0..self.nodes.len() {
            let Some(y) = self.fit(i, width, height) else { continue };
            let (x, _, node_width) = self.nodes[i];
            let bottom = y + height;
            if best.is_none_or(|(b, bw, _)| bottom < b || (bottom == b && node_width < bw)) {
                best = Some((bottom, node_width, i));
                region = [x, y, width, height];
            }
        }
        let (_, _, index) = best?;
        self.nodes.insert(index, (region[0], region[1] + height, width));

        // Cut the new segment out of the ones it now covers.
        let mut i = index + 1;
        while i < self.nodes.len() {
            let (px, _, pw) = self.nodes[i - 1];
            let (x, y, w) = self.nodes[i];
            let edge = px + pw;
            if x >= edge {
                break;
            }
            let shrink = edge - x;
            if w <= shrink {
                self.nodes.remove(i);
            } else {
                self.nodes[i] = (x + shrink, y, w - shrink);
                break;
            }
        }

        let mut i = 0;
        while i + 1 < self.nodes.len() {
            if self.nodes[i].1 == self.nodes[i + 1].1 {
                self.nodes[i].2 += self.nodes[i + 1].2;
                self.nodes.remove(i + 1);
            } else {
                i += 1;
            }
        }
        Some(region)
    }

    /// Lowest `y` at which the region fits starting at node `index`.
    fn fit(&self, index: usize, width: usize, height: usize) -> Option<usize> {
        let [rows, cols] = self.size();
        let (x, mut y, _) = self.nodes[index];
        if x + width > cols {
            return None;
        }
        let mut covered = 0;
        for &(_, node_y, node_width) in &self.nodes[index..] {
            if covered >= width {
                break;
            }
            y = y.max(node_y);
            if y + height > rows {
                return None;
            }
            covered += node_width;
        }
        Some(y)
    }

    /// Uploads `[h, w, 3]` texels into a region from `get_free_region`.
    pub fn set_region(&mut self, region: [usize; 4], data: &[f32]) -> Result<()> {
        let [x, y, w, h] = region;
        self.texture.set_subdata(0, [y, x], data, &[h, w, 3])
    }

    /// Normalized `[u0, v0, u1, v1]` of a region.
    pub fn texcoords(&self, region: [usize; 4]) -> [f32; 4] {
        let [rows, cols] = self.size();
        let [x, y, w, h] = region;
        let (cols, rows) = (cols as f32, rows as f32);
        [x as f32 / cols, y as f32 / rows, (x + w) as f32 / cols, (y + h) as f32 / rows]
    }
}

impl Sampled for TextureAtlas {
    fn sampler_id(&self) -> ObjectId {
        self.texture.id()
    }

    fn sampler_type(&self) -> GlslType {
        GlslType::Sampler2D
    }

    fn check_alive(&self) -> Result<()> {
        self.texture.check_alive()
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

    fn last(ctx: &GlContext) -> Command {
        ctx.pending_commands().pop().unwrap()
    }

    // ── shapes and formats ──

    #[test]
    fn channel_axis_is_added() {
        let ctx = ctx();
        let tex = Texture2D::with_data(&ctx, &[0u8; 6], &[2, 3]).unwrap();
        assert_eq!(tex.shape(), Some(&[2, 3, 1][..]));
        assert_eq!(tex.format(), Some(TextureFormat::Luminance));
    }

    #[test]
    fn bad_shapes_are_value_errors() {
        let ctx = ctx();
        let mut tex = Texture2D::new(&ctx);
        assert!(matches!(tex.set_data(&[0u8; 10], &[1, 2, 5]), Err(GlooError::Value(_))));
        assert!(matches!(tex.set_data(&[0u8; 4], &[2]), Err(GlooError::Value(_))));
        assert!(matches!(tex.set_data(&[0u8; 3], &[2, 2]), Err(GlooError::Value(_))));
        assert_eq!(ctx.pending_len(), 1);
    }

    #[test]
    fn single_channel_keeps_alpha() {
        let ctx = ctx();
        let mut tex = Texture2D::new(&ctx);
        tex.set_level_data(0, &[0u8; 4], &[2, 2], Some(TextureFormat::Alpha)).unwrap();
        tex.set_data(&[0u8; 9], &[3, 3]).unwrap();
        assert_eq!(tex.format(), Some(TextureFormat::Alpha));
        tex.set_data(&[0u8; 27], &[3, 3, 3]).unwrap();
        assert_eq!(tex.format(), Some(TextureFormat::Rgb));
        let err = tex.set_level_data(0, &[0u8; 9], &[3, 3], Some(TextureFormat::Rgba)).unwrap_err();
        assert!(matches!(err, GlooError::Value(_)));
    }

    // ── levels ──

    #[test]
    fn set_shape_discards_level_writes() {
        let ctx = ctx();
        let mut tex = Texture2D::with_data(&ctx, &[0u8; 16], &[2, 2, 4]).unwrap();
        tex.set_subdata(0, [1, 1], &[9u8; 4], &[1, 1, 4]).unwrap();
        assert_eq!(tex.level(0).unwrap().pending().len(), 2);
        tex.set_shape(0, &[4, 4, 4], None).unwrap();
        assert!(tex.level(0).unwrap().pending().is_empty());
        assert!(tex.need_resize(0));
    }

    #[test]
    fn same_shape_is_not_requeued() {
        let ctx = ctx();
        let mut tex = Texture2D::new(&ctx);
        tex.set_shape(0, &[4, 4, 3], None).unwrap();
        let n = ctx.pending_len();
        tex.set_shape(0, &[4, 4, 3], None).unwrap();
        assert_eq!(ctx.pending_len(), n);
    }

    #[test]
    fn subdata_must_fit() {
        let ctx = ctx();
        let mut tex = Texture2D::new(&ctx);
        assert!(tex.set_subdata(0, [0, 0], &[0u8; 1], &[1, 1]).is_err());
        tex.set_shape(0, &[4, 4], None).unwrap();
        assert!(matches!(tex.set_subdata(0, [3, 3], &[0u8; 4], &[2, 2]), Err(GlooError::Value(_))));
        assert!(matches!(tex.set_subdata(0, [0, 0], &[0u8; 8], &[2, 2, 2]), Err(GlooError::Value(_))));
        tex.set_subdata(0, [2, 2], &[0u8; 4], &[2, 2]).unwrap();
        assert_eq!(last(&ctx).opcode(), Opcode::Data);
    }

    #[test]
    fn mip_levels_are_independent() {
        let ctx = ctx();
        let mut tex = Texture2D::with_data(&ctx, &[0u8; 64], &[4, 4, 4]).unwrap();
        tex.set_level_data(1, &[0u8; 16], &[2, 2, 4], None).unwrap();
        assert_eq!(tex.levels().collect::<Vec<_>>(), [0, 1]);
        assert_eq!(tex.level(1).unwrap().shape(), &[2, 2, 4]);
        assert_eq!(tex.shape(), Some(&[4, 4, 4][..]));
    }

    #[test]
    fn non_resizable_rejects_new_shape() {
        let ctx = ctx();
        let mut tex = Texture2D::with_data(&ctx, &[0u8; 4], &[2, 2]).unwrap();
        tex.set_resizable(false);
        tex.set_data(&[1u8; 4], &[2, 2]).unwrap();
        let err = tex.set_data(&[0u8; 9], &[3, 3]).unwrap_err();
        assert!(matches!(err, GlooError::Resource(_)));
    }

    #[test]
    fn pending_clears_after_flush() {
        let (ctx, _) =
            GlContext::with_parser(GlConfig::default(), LocalParser::new(HeadlessBackend::new(2, 2)))
                .unwrap();
        let tex = Texture2D::with_data(&ctx, &[0u8; 4], &[2, 2]).unwrap();
        assert!(tex.need_resize(0));
        ctx.flush().unwrap();
        assert!(!tex.need_resize(0));
        assert!(tex.level(0).unwrap().pending().is_empty());
        assert!(tex.object().valid());
    }

    #[test]
    fn huge_offsets_do_not_fit() {
        let ctx = ctx();
        let mut tex = Texture2D::with_data(&ctx, &[0u8; 16], &[4, 4]).unwrap();
        let n = ctx.pending_len();
        let err = tex.set_subdata(0, [usize::MAX, 0], &[0u8; 2], &[1, 2]).unwrap_err();
        assert!(matches!(err, GlooError::Value(_)));
        let err = tex.set_subdata(0, [0, usize::MAX - 1], &[0u8; 2], &[1, 2]).unwrap_err();
        assert!(matches!(err, GlooError::Value(_)));
        assert_eq!(ctx.pending_len(), n);
    }

    #[test]
    fn flushed_uploads_are_released() {
        let (ctx, _) =
            GlContext::with_parser(GlConfig::default(), LocalParser::new(HeadlessBackend::new(2, 2)))
                .unwrap();
        let mut tex = Texture2D::with_data(&ctx, &[0u8; 16], &[4, 4]).unwrap();
        for i in 0..20u8 {
            tex.set_subdata(0, [1, 1], &[i; 4], &[2, 2]).unwrap();
            ctx.flush().unwrap();
        }
        tex.set_subdata(0, [0, 0], &[1u8; 4], &[2, 2]).unwrap();
        assert_eq!(tex.core.levels[&0].pending.len(), 1);
    }

    // ── texel types ──

    #[test]
    fn float_data_sizes_float_storage() {
        let ctx = ctx();
        let tex = Texture2D::with_data(&ctx, &[0.5f32; 8], &[2, 2, 2]).unwrap();
        assert_eq!(tex.level(0).unwrap().texel(), TexelType::F32);
        let size = ctx.pending_commands().into_iter().find(|c| c.opcode() == Opcode::Size).unwrap();
        match size {
            Command::Size { args: SizeArgs::Texture { texel, format, .. }, .. } => {
                assert_eq!((texel, format), (TexelType::F32, TextureFormat::LuminanceAlpha));
            }
            other => panic!("expected a texture SIZE, got {other:?}"),
        }
        match last(&ctx) {
            Command::Data { args: DataArgs::Texture { data, .. }, .. } => assert_eq!(data.len(), 32),
            other => panic!("expected texture DATA, got {other:?}"),
        }
    }

    #[test]
    fn texel_change_reallocates() {
        let ctx = ctx();
        let mut tex = Texture2D::with_data(&ctx, &[0u8; 4], &[2, 2]).unwrap();
        let err = tex.set_subdata(0, [0, 0], &[0u16; 1], &[1, 1]).unwrap_err();
        assert!(matches!(err, GlooError::Type(_)));
        tex.set_resizable(false);
        tex.set_data(&[0u16; 4], &[2, 2]).unwrap();
        assert_eq!(tex.level(0).unwrap().texel(), TexelType::U16);
        tex.set_shape(0, &[2, 2], None).unwrap();
        assert_eq!(tex.level(0).unwrap().texel(), TexelType::U16);
    }

    // ── atlas ──

    #[test]
    fn atlas_rounds_to_powers_of_two() {
        let ctx = ctx();
        let atlas = TextureAtlas::new(&ctx, [100, 700]).unwrap();
        assert_eq!(atlas.size(), [128, 512]);
        assert_eq!(atlas.texture().level(0).unwrap().texel(), TexelType::F32);
        assert_eq!(atlas.texture().format(), Some(TextureFormat::Rgb));
        assert!(matches!(TextureAtlas::new(&ctx, [0, 8]), Err(GlooError::Value(_))));
    }

    #[test]
    fn atlas_regions_do_not_overlap() {
        let ctx = ctx();
        let mut atlas = TextureAtlas::new(&ctx, [100, 100]).unwrap();
        let mut regions: Vec<[usize; 4]> = Vec::new();
        for (w, h) in [(10, 10), (20, 5), (10, 30), (64, 8), (40, 40), (10, 10)] {
            let r = atlas.get_free_region(w, h).unwrap();
            assert_eq!(&r[2..], &[w, h]);
            assert!(r[0] + w <= 128 && r[1] + h <= 128);
            for o in &regions {
                let apart = r[0] + r[2] <= o[0] || o[0] + o[2] <= r[0] || r[1] + r[3] <= o[1] || o[1] + o[3] <= r[1];
                assert!(apart, "{r:?} overlaps {o:?}");
            }
            regions.push(r);
        }
        assert_eq!(regions[0], [0, 0, 10, 10]);
        assert_eq!(regions[1], [10, 0, 20, 5]);
    }

    #[test]
    fn atlas_exhaustion_returns_none() {
        let ctx = ctx();
        let mut atlas = TextureAtlas::new(&ctx, [16, 16]).unwrap();
        assert_eq!(atlas.get_free_region(17, 1), None);
        assert_eq!(atlas.get_free_region(0, 4), None);
        for _ in 0..4 {
            assert!(atlas.get_free_region(8, 8).is_some());
        }
        assert_eq!(atlas.get_free_region(1, 1), None);
    }

    #[test]
    fn atlas_region_upload() {
        let ctx = ctx();
        let mut atlas = TextureAtlas::new(&ctx, [8, 8]).unwrap();
        let region = atlas.get_free_region(2, 3).unwrap();
        atlas.set_region(region, &[1.0; 2 * 3 * 3]).unwrap();
        match last(&ctx) {
            Command::Data { args: DataArgs::Texture { offset, shape, texel, .. }, .. } => {
                assert_eq!((offset, shape, texel), (vec![0, 0], vec![3, 2, 3], TexelType::F32));
            }
            other => panic!("expected texture DATA, got {other:?}"),
        }
        assert!(atlas.set_region(region, &[1.0; 4]).is_err());
        assert_eq!(atlas.texcoords([2, 4, 2, 4]), [0.25, 0.5, 0.5, 1.0]);
    }

    // ── parameters ──

    #[test]
    fn wrapping_per_axis() {
        let ctx = ctx();
        let mut tex = Texture3D::new(&ctx);
        assert!(matches!(tex.set_wrapping(&[Wrapping::Repeat; 2]), Err(GlooError::Value(_))));
        tex.set_wrapping_all(Wrapping::MirroredRepeat).unwrap();
        assert_eq!(tex.wrapping(), &[Wrapping::MirroredRepeat; 3]);
        tex.set_interpolation(Interpolation::Linear, Interpolation::Nearest).unwrap();
        assert_eq!(
            last(&ctx),
            Command::Interpolation { id: tex.id(), min: Interpolation::Linear, mag: Interpolation::Nearest }
        );
    }

    #[test]
    fn sampler_types() {
        let ctx = ctx();
        assert_eq!(Texture2D::new(&ctx).sampler_type(), GlslType::Sampler2D);
        assert_eq!(Texture3D::new(&ctx).sampler_type(), GlslType::Sampler3D);
    }
}
