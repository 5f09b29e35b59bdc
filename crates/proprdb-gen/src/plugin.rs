//! Plugin driver: compiler request in, generated files out.
//!
//! The request is decoded twice. `prost-types` gives us the structured view
//! (which files to generate). The descriptor pool is built from the raw
//! `proto_file` bytes instead, because the custom option extensions live in
//! fields that the structured `FileDescriptorProto` type does not model and
//! would silently drop on re-encode.

use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::compiler::code_generator_response::{Feature, File};
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};

use crate::error::{GenError, Result};
use crate::{analysis, generate_file_content, output_file_name};

const PROTO_FILE_FIELD: u64 = 15;

/// Run the full plugin exchange over raw request bytes.
///
/// Generation errors are routed into the response `error` field, which the
/// compiler reports to the user; only request-level decode failures return
/// `Err`.
pub fn respond(request_bytes: &[u8]) -> Result<CodeGeneratorResponse> {
    let request = CodeGeneratorRequest::decode(request_bytes)
        .map_err(|e| GenError::Request(e.to_string()))?;

    let mut response = CodeGeneratorResponse {
        supported_features: Some(Feature::Proto3Optional as u64),
        ..Default::default()
    };

    match generate_all(request_bytes, &request) {
        Ok(files) => response.file = files,
        Err(error) => response.error = Some(error.to_string()),
    }

    Ok(response)
}

fn generate_all(request_bytes: &[u8], request: &CodeGeneratorRequest) -> Result<Vec<File>> {
    let descriptor_set = file_descriptor_set_bytes(request_bytes)?;
    let pool = DescriptorPool::decode(descriptor_set.as_slice())
        .map_err(|e| GenError::Descriptor(e.to_string()))?;

    let mut files = Vec::new();
    for file_name in &request.file_to_generate {
        let plan = analysis::analyze_file(&pool, file_name)?;
        if plan.tables.is_empty() {
            continue;
        }
        files.push(File {
            name: Some(output_file_name(file_name)),
            content: Some(generate_file_content(&plan)),
            ..Default::default()
        });
    }
    Ok(files)
}

/// Re-frame the request's `proto_file` entries (field 15) as a
/// `FileDescriptorSet` (repeated field 1), working on the wire encoding so
/// extension options survive.
pub fn file_descriptor_set_bytes(request_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut cursor = request_bytes;
    while !cursor.is_empty() {
        let key = read_varint(&mut cursor)?;
        let field_number = key >> 3;
        let wire_type = key & 0x7;
        match wire_type {
            0 => {
                read_varint(&mut cursor)?;
            }
            1 => {
                cursor = take(cursor, 8)?.1;
            }
            2 => {
                let length = read_varint(&mut cursor)? as usize;
                let (payload, rest) = take(cursor, length)?;
                cursor = rest;
                if field_number == PROTO_FILE_FIELD {
                    out.push(0x0a);
                    write_varint(&mut out, payload.len() as u64);
                    out.extend_from_slice(payload);
                }
            }
            5 => {
                cursor = take(cursor, 4)?.1;
            }
            other => {
                return Err(GenError::Request(format!(
                    "unsupported wire type {other} in request"
                )));
            }
        }
    }
    Ok(out)
}

fn read_varint(cursor: &mut &[u8]) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let (&byte, rest) = cursor
            .split_first()
            .ok_or_else(|| GenError::Request("truncated varint in request".to_string()))?;
        *cursor = rest;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift >= 64 {
            return Err(GenError::Request("oversized varint in request".to_string()));
        }
    }
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn take(cursor: &[u8], length: usize) -> Result<(&[u8], &[u8])> {
    if cursor.len() < length {
        return Err(GenError::Request(
            "truncated length-delimited field in request".to_string(),
        ));
    }
    Ok(cursor.split_at(length))
}
