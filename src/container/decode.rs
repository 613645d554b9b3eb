//! Binary container decoding.
//!
//! Exact inverse of [`super::encode`]: parse the header, extract the
//! skeleton JSON, then resolve every pointer string back into typed data
//! spliced in place. All table reads are bounds-checked against the lengths
//! the header declares; inconsistencies fail with
//! [`XvizError::MalformedContainer`] rather than partially succeeding.

use serde_json::{Number, Value};
use tracing::trace;

use super::format::{
    AccessorBuffer, ContainerHeader, ImageBuffer, ImageEncoding, HEADER_SIZE, ScalarType,
    padded_len, read_u32_le,
};
use super::pointer::{self, BufferPointer};
use crate::{Result, XvizError};

/// Decode a binary container back into the JSON tree it was encoded from.
///
/// The result owns all of its data; nothing aliases `data` past this call.
pub fn decode_binary(data: &[u8]) -> Result<Value> {
    let header = ContainerHeader::parse(data)?;

    let skeleton_end = HEADER_SIZE + header.skeleton_len as usize;
    if data.len() < skeleton_end {
        return Err(XvizError::malformed_container(
            "skeleton",
            format!("declared skeleton length {} exceeds container size {}", header.skeleton_len, data.len()),
        ));
    }
    let skeleton: Value = serde_json::from_slice(&data[HEADER_SIZE..skeleton_end])
        .map_err(|e| XvizError::json_error("container skeleton parsing", e))?;

    let accessor_start = padded_len(skeleton_end);
    let accessor_end = accessor_start + header.accessor_table_len as usize;
    if data.len() < accessor_end {
        return Err(XvizError::malformed_container(
            "accessor table",
            format!(
                "declared table length {} exceeds container size {}",
                header.accessor_table_len,
                data.len()
            ),
        ));
    }
    let accessors = parse_accessor_table(&data[accessor_start..accessor_end])?;
    let images = parse_image_table(&data[accessor_end..])?;

    trace!(accessors = accessors.len(), images = images.len(), "decoding binary container");

    resolve_value(skeleton, &accessors, &images)
}

fn parse_accessor_table(table: &[u8]) -> Result<Vec<AccessorBuffer>> {
    let count = read_u32_le(table, 0, "accessor table count")? as usize;
    let mut accessors = Vec::with_capacity(count);
    let mut offset = 4;
    for index in 0..count {
        let context = format!("accessor table entry {index}");
        let tag = read_u32_le(table, offset, &context)?;
        let scalar = ScalarType::from_tag(tag).ok_or_else(|| {
            XvizError::malformed_container(&context, format!("unknown scalar type tag {tag}"))
        })?;
        let components = read_u32_le(table, offset + 4, &context)?;
        let byte_len = read_u32_le(table, offset + 8, &context)? as usize;
        let data_start = offset + 12;
        if table.len() < data_start + byte_len {
            return Err(XvizError::malformed_container(
                &context,
                format!(
                    "declared buffer length {} exceeds remaining table bytes {}",
                    byte_len,
                    table.len().saturating_sub(data_start)
                ),
            ));
        }
        accessors.push(AccessorBuffer {
            scalar,
            components,
            bytes: table[data_start..data_start + byte_len].to_vec(),
        });
        offset = data_start + padded_len(byte_len);
    }
    if offset != table.len() {
        return Err(XvizError::malformed_container(
            "accessor table",
            format!("table length mismatch: walked {offset} of {} declared bytes", table.len()),
        ));
    }
    Ok(accessors)
}

fn parse_image_table(table: &[u8]) -> Result<Vec<ImageBuffer>> {
    let count = read_u32_le(table, 0, "image table count")? as usize;
    let mut images = Vec::with_capacity(count);
    let mut offset = 4;
    for index in 0..count {
        let context = format!("image table entry {index}");
        let tag = read_u32_le(table, offset, &context)?;
        let encoding = ImageEncoding::from_tag(tag).ok_or_else(|| {
            XvizError::malformed_container(&context, format!("unknown image encoding tag {tag}"))
        })?;
        let byte_len = read_u32_le(table, offset + 4, &context)? as usize;
        let data_start = offset + 8;
        if table.len() < data_start + byte_len {
            return Err(XvizError::malformed_container(
                &context,
                format!(
                    "declared image length {} exceeds remaining table bytes {}",
                    byte_len,
                    table.len().saturating_sub(data_start)
                ),
            ));
        }
        images.push(ImageBuffer {
            encoding,
            bytes: table[data_start..data_start + byte_len].to_vec(),
        });
        offset = data_start + padded_len(byte_len);
    }
    if offset != table.len() {
        return Err(XvizError::malformed_container(
            "image table",
            format!("trailing bytes after image table: walked {offset} of {}", table.len()),
        ));
    }
    Ok(images)
}

/// Splice buffer data back over pointer strings, depth-first.
fn resolve_value(
    value: Value,
    accessors: &[AccessorBuffer],
    images: &[ImageBuffer],
) -> Result<Value> {
    match value {
        Value::String(s) => match BufferPointer::parse(&s)? {
            Some(BufferPointer::Accessor(index)) => {
                let buffer = accessors.get(index).ok_or_else(|| {
                    XvizError::malformed_container(
                        "pointer resolution",
                        format!("accessor index {index} out of range ({} buffers)", accessors.len()),
                    )
                })?;
                splice_accessor(buffer)
            }
            Some(BufferPointer::Image(index)) => {
                let image = images.get(index).ok_or_else(|| {
                    XvizError::malformed_container(
                        "pointer resolution",
                        format!("image index {index} out of range ({} images)", images.len()),
                    )
                })?;
                Ok(Value::Array(image.bytes.iter().map(|b| Value::from(*b)).collect()))
            }
            None => Ok(Value::String(pointer::unescape_literal(&s).unwrap_or(s))),
        },
        Value::Array(items) => items
            .into_iter()
            .map(|item| resolve_value(item, accessors, images))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(fields) => fields
            .into_iter()
            .map(|(k, v)| resolve_value(v, accessors, images).map(|v| (k, v)))
            .collect::<Result<serde_json::Map<_, _>>>()
            .map(Value::Object),
        other => Ok(other),
    }
}

fn splice_accessor(buffer: &AccessorBuffer) -> Result<Value> {
    match buffer.scalar {
        ScalarType::Float32 => {
            let values = buffer.as_f32_vec()?;
            let mut items = Vec::with_capacity(values.len());
            for value in values {
                let number = Number::from_f64(value as f64).ok_or_else(|| {
                    XvizError::malformed_container(
                        "accessor buffer",
                        "non-finite float cannot be represented in JSON",
                    )
                })?;
                items.push(Value::Number(number));
            }
            Ok(Value::Array(items))
        }
        ScalarType::Uint8 => {
            Ok(Value::Array(buffer.bytes.iter().map(|b| Value::from(*b)).collect()))
        }
    }
}
