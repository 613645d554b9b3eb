//! Binary container format structures and parsing.
//!
//! Defines the byte layout of the XVIZ binary container and provides
//! bounds-checked primitives for reading and writing it.
//!
//! ## Container layout
//!
//! ```text
//! [magic "XVIZ": 4][container version: u32][skeleton length: u32][accessor table length: u32]
//! [skeleton JSON bytes][padding to 4]
//! [accessor table: count u32, then per buffer
//!     {scalar type tag: u32}{component count: u32}{byte length: u32}[raw bytes][padding to 4]]
//! [image table: count u32, then per image
//!     {encoding tag: u32}{byte length: u32}[raw bytes][padding to 4]]
//! ```
//!
//! All integers are little-endian. The accessor-table length recorded in the
//! header covers the whole accessor section (count word, entry headers, data
//! and padding) so a decoder can locate the image table without walking the
//! entries first.

use crate::{Result, XvizError};

/// First four bytes of every binary container.
pub const XVIZ_MAGIC: [u8; 4] = *b"XVIZ";

/// Container layout revision. Decoders reject anything else.
pub const CONTAINER_VERSION: u32 = 1;

/// Fixed header size: magic + version + skeleton length + accessor table length.
pub const HEADER_SIZE: usize = 16;

/// Sections and buffer payloads are padded to this boundary.
pub const ALIGNMENT: usize = 4;

/// Element type of an accessor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// Unsigned 8-bit, used for color components.
    Uint8,
    /// 32-bit float, used for vertex/point coordinates.
    Float32,
}

impl ScalarType {
    pub fn tag(self) -> u32 {
        match self {
            ScalarType::Uint8 => 1,
            ScalarType::Float32 => 2,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(ScalarType::Uint8),
            2 => Some(ScalarType::Float32),
            _ => None,
        }
    }

    /// Size of one element in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            ScalarType::Uint8 => 1,
            ScalarType::Float32 => 4,
        }
    }
}

/// Image payload encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Raw,
    Png,
    Jpeg,
}

impl ImageEncoding {
    pub fn tag(self) -> u32 {
        match self {
            ImageEncoding::Raw => 0,
            ImageEncoding::Png => 1,
            ImageEncoding::Jpeg => 2,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(ImageEncoding::Raw),
            1 => Some(ImageEncoding::Png),
            2 => Some(ImageEncoding::Jpeg),
            _ => None,
        }
    }

    /// Map a producer-declared format label onto an encoding tag.
    ///
    /// Unknown labels fall back to [`ImageEncoding::Raw`]; the skeleton keeps
    /// the original label so nothing is lost.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "png" => ImageEncoding::Png,
            "jpg" | "jpeg" => ImageEncoding::Jpeg,
            _ => ImageEncoding::Raw,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageEncoding::Raw => "raw",
            ImageEncoding::Png => "png",
            ImageEncoding::Jpeg => "jpeg",
        }
    }
}

/// One out-of-band numeric buffer referenced from the skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorBuffer {
    pub scalar: ScalarType,
    /// Components per record (3 for positions, 3 or 4 for colors).
    pub components: u32,
    pub bytes: Vec<u8>,
}

impl AccessorBuffer {
    pub fn from_f32(values: &[f32], components: u32) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Self { scalar: ScalarType::Float32, components, bytes }
    }

    pub fn from_u8(values: &[u8], components: u32) -> Self {
        Self { scalar: ScalarType::Uint8, components, bytes: values.to_vec() }
    }

    /// Number of scalar elements in the buffer.
    pub fn element_count(&self) -> usize {
        self.bytes.len() / self.scalar.byte_size()
    }

    /// Reinterpret the raw bytes as little-endian f32 values.
    ///
    /// Fails when the buffer is not float-typed or its length is not a
    /// multiple of four.
    pub fn as_f32_vec(&self) -> Result<Vec<f32>> {
        if self.scalar != ScalarType::Float32 {
            return Err(XvizError::malformed_container(
                "accessor buffer",
                format!("expected Float32 data, found {:?}", self.scalar),
            ));
        }
        if self.bytes.len() % 4 != 0 {
            return Err(XvizError::malformed_container(
                "accessor buffer",
                format!("Float32 buffer length {} is not a multiple of 4", self.bytes.len()),
            ));
        }
        Ok(self
            .bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

/// One out-of-band image payload referenced from the skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub encoding: ImageEncoding,
    pub bytes: Vec<u8>,
}

/// Parsed fixed-size container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u32,
    pub skeleton_len: u32,
    pub accessor_table_len: u32,
}

impl ContainerHeader {
    /// Parse and validate the 16-byte header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(XvizError::malformed_container(
                "header",
                format!("need {} header bytes, have {}", HEADER_SIZE, data.len()),
            ));
        }
        if data[0..4] != XVIZ_MAGIC {
            return Err(XvizError::malformed_container(
                "header",
                format!("bad magic {:02x?}", &data[0..4]),
            ));
        }
        let version = read_u32_le(data, 4, "header version")?;
        if version != CONTAINER_VERSION {
            return Err(XvizError::malformed_container(
                "header",
                format!("unsupported container version {version} (expected {CONTAINER_VERSION})"),
            ));
        }
        let skeleton_len = read_u32_le(data, 8, "skeleton length")?;
        let accessor_table_len = read_u32_le(data, 12, "accessor table length")?;
        Ok(Self { version, skeleton_len, accessor_table_len })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&XVIZ_MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.skeleton_len.to_le_bytes());
        out.extend_from_slice(&self.accessor_table_len.to_le_bytes());
    }
}

/// Whether a byte buffer starts with the container magic.
pub fn has_container_magic(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..4] == XVIZ_MAGIC
}

/// Bounds-checked little-endian u32 read.
pub(crate) fn read_u32_le(data: &[u8], offset: usize, context: &str) -> Result<u32> {
    if offset + 4 > data.len() {
        return Err(XvizError::malformed_container(
            context,
            format!(
                "insufficient data for u32 at offset {} (need 4 bytes, have {})",
                offset,
                data.len().saturating_sub(offset)
            ),
        ));
    }
    Ok(u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]))
}

/// Round `len` up to the next [`ALIGNMENT`] boundary.
pub(crate) fn padded_len(len: usize) -> usize {
    len.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// Append zero bytes until `out` is aligned.
pub(crate) fn pad_to_alignment(out: &mut Vec<u8>) {
    while out.len() % ALIGNMENT != 0 {
        out.push(0);
    }
}
