//! Binary container encoding.
//!
//! Walks a JSON tree depth-first, moves numeric and image payloads into
//! out-of-band buffer tables, and serializes the rewritten skeleton plus the
//! tables into one byte vector.

use serde_json::{Map, Value};
use tracing::trace;

use super::format::{
    AccessorBuffer, ContainerHeader, ImageBuffer, ImageEncoding, CONTAINER_VERSION, pad_to_alignment,
};
use super::pointer::{self, BufferPointer};
use crate::{Result, XvizError};

/// Encode a JSON-compatible tree into a binary container.
///
/// Arrays under the keys `vertices` and `points` flatten into 3-component
/// f32 accessor buffers; arrays under `colors` flatten into 3- or 4-component
/// u8 buffers; objects carrying encoded image bytes move into the image
/// table. Every other array recurses element-wise with its shape preserved.
pub fn encode_binary(tree: &Value) -> Result<Vec<u8>> {
    let mut packer = Packer::default();
    let skeleton = packer.pack_value(None, tree);
    let skeleton_bytes = serde_json::to_vec(&skeleton)
        .map_err(|e| XvizError::json_error("container skeleton serialization", e))?;

    trace!(
        skeleton_len = skeleton_bytes.len(),
        accessors = packer.accessors.len(),
        images = packer.images.len(),
        "encoding binary container"
    );

    let accessor_table = write_accessor_table(&packer.accessors);
    let image_table = write_image_table(&packer.images);

    let header = ContainerHeader {
        version: CONTAINER_VERSION,
        skeleton_len: skeleton_bytes.len() as u32,
        accessor_table_len: accessor_table.len() as u32,
    };

    let mut out = Vec::with_capacity(
        super::format::HEADER_SIZE + skeleton_bytes.len() + accessor_table.len() + image_table.len() + 4,
    );
    header.write(&mut out);
    out.extend_from_slice(&skeleton_bytes);
    pad_to_alignment(&mut out);
    out.extend_from_slice(&accessor_table);
    out.extend_from_slice(&image_table);
    Ok(out)
}

fn write_accessor_table(accessors: &[AccessorBuffer]) -> Vec<u8> {
    let mut table = Vec::new();
    table.extend_from_slice(&(accessors.len() as u32).to_le_bytes());
    for buffer in accessors {
        table.extend_from_slice(&buffer.scalar.tag().to_le_bytes());
        table.extend_from_slice(&buffer.components.to_le_bytes());
        table.extend_from_slice(&(buffer.bytes.len() as u32).to_le_bytes());
        table.extend_from_slice(&buffer.bytes);
        pad_to_alignment(&mut table);
    }
    table
}

fn write_image_table(images: &[ImageBuffer]) -> Vec<u8> {
    let mut table = Vec::new();
    table.extend_from_slice(&(images.len() as u32).to_le_bytes());
    for image in images {
        table.extend_from_slice(&image.encoding.tag().to_le_bytes());
        table.extend_from_slice(&(image.bytes.len() as u32).to_le_bytes());
        table.extend_from_slice(&image.bytes);
        pad_to_alignment(&mut table);
    }
    table
}

/// Accumulates buffer tables while rewriting the tree.
#[derive(Default)]
struct Packer {
    accessors: Vec<AccessorBuffer>,
    images: Vec<ImageBuffer>,
}

impl Packer {
    /// Rewrite one value, recording extracted buffers.
    ///
    /// `key` is the field name this value sits under, which drives the
    /// flattening policy; array elements recurse with no key.
    fn pack_value(&mut self, key: Option<&str>, value: &Value) -> Value {
        match value {
            Value::String(s) => match pointer::escape_literal(s) {
                Some(escaped) => Value::String(escaped),
                None => value.clone(),
            },
            Value::Array(items) => {
                // Field-name-driven flattening first, element-wise recursion
                // as the fallback for arrays the policy cannot flatten.
                match key {
                    Some("vertices") | Some("points") => {
                        if let Some(flat) = flatten_vertices(value) {
                            return self.push_accessor(AccessorBuffer::from_f32(&flat, 3));
                        }
                    }
                    Some("colors") => {
                        if let Some((stride, flat)) = flatten_colors(value) {
                            return self.push_accessor(AccessorBuffer::from_u8(&flat, stride));
                        }
                    }
                    _ => {}
                }
                Value::Array(items.iter().map(|item| self.pack_value(None, item)).collect())
            }
            Value::Object(fields) => {
                if let Some(image) = as_image_object(fields) {
                    return self.pack_image_object(fields, image);
                }
                Value::Object(
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), self.pack_value(Some(k), v)))
                        .collect(),
                )
            }
            _ => value.clone(),
        }
    }

    fn push_accessor(&mut self, buffer: AccessorBuffer) -> Value {
        let index = self.accessors.len();
        self.accessors.push(buffer);
        Value::String(BufferPointer::accessor(index))
    }

    fn pack_image_object(&mut self, fields: &Map<String, Value>, image: ImageBuffer) -> Value {
        let index = self.images.len();
        self.images.push(image);
        Value::Object(
            fields
                .iter()
                .map(|(k, v)| {
                    if k == "data" {
                        (k.clone(), Value::String(BufferPointer::image(index)))
                    } else {
                        (k.clone(), self.pack_value(Some(k), v))
                    }
                })
                .collect(),
        )
    }
}

/// Recognize an encoded-image object: a `data` byte array alongside a
/// `format` or `encoding` label.
fn as_image_object(fields: &Map<String, Value>) -> Option<ImageBuffer> {
    let label = fields
        .get("format")
        .or_else(|| fields.get("encoding"))
        .and_then(Value::as_str)?;
    let data = fields.get("data")?.as_array()?;
    let mut bytes = Vec::with_capacity(data.len());
    for item in data {
        bytes.push(color_component(item)?);
    }
    Some(ImageBuffer { encoding: ImageEncoding::from_label(label), bytes })
}

/// Flatten a vertex/point array to 3 components per record.
///
/// Accepts either an already-flat numeric array or a nested array of
/// 3-element coordinate records. Anything else (objects inside, ragged
/// records) is not flattenable and the caller recurses instead.
pub(crate) fn flatten_vertices(value: &Value) -> Option<Vec<f32>> {
    let items = value.as_array()?;
    if items.iter().all(Value::is_number) {
        return items.iter().map(|v| v.as_f64().map(|f| f as f32)).collect();
    }
    let mut flat = Vec::with_capacity(items.len() * 3);
    for item in items {
        let record = item.as_array()?;
        if record.len() != 3 || !record.iter().all(Value::is_number) {
            return None;
        }
        for component in record {
            flat.push(component.as_f64()? as f32);
        }
    }
    Some(flat)
}

/// Flatten a color array to a (stride, bytes) pair.
///
/// Nested records take their stride from the first element's length, 4 only
/// when the first record has length 4 and 3 otherwise. Already-flat arrays
/// default to stride 3 when divisible by 3, falling back to 4.
pub(crate) fn flatten_colors(value: &Value) -> Option<(u32, Vec<u8>)> {
    let items = value.as_array()?;
    if items.is_empty() {
        return Some((3, Vec::new()));
    }
    if items.iter().all(Value::is_number) {
        let stride = if items.len() % 3 == 0 {
            3
        } else if items.len() % 4 == 0 {
            4
        } else {
            return None;
        };
        let flat = items.iter().map(color_component).collect::<Option<Vec<u8>>>()?;
        return Some((stride, flat));
    }
    let first = items.first()?.as_array()?;
    let stride = if first.len() == 4 { 4 } else { 3 };
    let mut flat = Vec::with_capacity(items.len() * stride);
    for item in items {
        let record = item.as_array()?;
        if record.len() != stride {
            return None;
        }
        for component in record {
            flat.push(color_component(component)?);
        }
    }
    Some((stride as u32, flat))
}

fn color_component(value: &Value) -> Option<u8> {
    Some(value.as_f64()?.clamp(0.0, 255.0) as u8)
}
