//! Minimal NumPy `.npy` reader/writer for 2-D little-endian `float32` arrays.
//!
//! Writes format version 1.0: magic, version, `u16` header length, a Python
//! dict literal padded with spaces to a 64-byte boundary and terminated by
//! `\n`, then the data in C order. Reads versions 1.x to 3.x, but only
//! `'<f4'`, `fortran_order: False`, and rank-2 shapes.
//!
//! Reference: <https://numpy.org/devdocs/reference/generated/numpy.lib.format.html>

use std::io::{Read, Write};

use ndarray::Array2;

use crate::{ArtifactKind, IndexError};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGN: usize = 64;

fn malformed(reason: impl Into<String>) -> IndexError {
    IndexError::format(ArtifactKind::Embeddings, reason)
}

/// Serialize `matrix` as a `.npy` v1.0 stream.
pub fn write_npy<W: Write>(mut writer: W, matrix: &Array2<f32>) -> Result<(), IndexError> {
    let (rows, cols) = matrix.dim();
    let dict = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");

    // magic(6) + version(2) + header_len(2) + dict + padding + '\n'
    let preamble = MAGIC.len() + 2 + 2;
    let unpadded = preamble + dict.len() + 1;
    let padding = (ALIGN - unpadded % ALIGN) % ALIGN;
    let header_len = dict.len() + padding + 1;
    let header_len = u16::try_from(header_len)
        .map_err(|_| malformed(format!("header too long ({header_len} bytes)")))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(dict.as_bytes())?;
    writer.write_all(&vec![b' '; padding])?;
    writer.write_all(b"\n")?;

    let mut data = Vec::with_capacity(rows * cols * 4);
    // `iter` walks logical (row-major) order whatever the memory layout.
    for value in matrix.iter() {
        data.extend_from_slice(&value.to_le_bytes());
    }
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

/// Parse a `.npy` stream holding a 2-D `float32` array.
pub fn read_npy<R: Read>(mut reader: R) -> Result<Array2<f32>, IndexError> {
    let (rows, cols) = read_header(&mut reader)?;

    let total = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| malformed(format!("shape ({rows}, {cols}) overflows")))?;
    // The declared shape is untrusted; only allocate what the stream holds.
    let mut raw = Vec::new();
    reader
        .by_ref()
        .take(total as u64)
        .read_to_end(&mut raw)
        .map_err(|e| malformed(format!("failed to read data: {e}")))?;
    if raw.len() != total {
        return Err(malformed(format!(
            "expected {total} data bytes, found {}",
            raw.len()
        )));
    }

    let values: Vec<f32> = raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Array2::from_shape_vec((rows, cols), values).map_err(|e| malformed(e.to_string()))
}

/// Read just enough of the stream to return the `(rows, cols)` shape.
pub fn read_shape<R: Read>(mut reader: R) -> Result<(usize, usize), IndexError> {
    read_header(&mut reader)
}

fn read_header<R: Read>(reader: &mut R) -> Result<(usize, usize), IndexError> {
    let mut magic = [0u8; 6];
    reader
        .read_exact(&mut magic)
        .map_err(|e| malformed(format!("failed to read magic: {e}")))?;
    if &magic != MAGIC {
        return Err(malformed("bad magic"));
    }

    let mut version = [0u8; 2];
    reader
        .read_exact(&mut version)
        .map_err(|e| malformed(format!("failed to read version: {e}")))?;
    let header_len = match version[0] {
        1 => {
            let mut buf = [0u8; 2];
            reader
                .read_exact(&mut buf)
                .map_err(|e| malformed(format!("failed to read header length: {e}")))?;
            u16::from_le_bytes(buf) as usize
        }
        2 | 3 => {
            let mut buf = [0u8; 4];
            reader
                .read_exact(&mut buf)
                .map_err(|e| malformed(format!("failed to read header length: {e}")))?;
            u32::from_le_bytes(buf) as usize
        }
        other => return Err(malformed(format!("unsupported format version {other}"))),
    };

    let mut header = Vec::new();
    reader
        .by_ref()
        .take(header_len as u64)
        .read_to_end(&mut header)
        .map_err(|e| malformed(format!("failed to read header: {e}")))?;
    if header.len() != header_len {
        return Err(malformed(format!(
            "header declares {header_len} bytes, found {}",
            header.len()
        )));
    }
    let header =
        std::str::from_utf8(&header).map_err(|e| malformed(format!("header is not utf8: {e}")))?;

    if !header.contains("'<f4'") {
        return Err(malformed(format!("only '<f4' arrays are supported: {header}")));
    }
    if header.contains("'fortran_order': True") {
        return Err(malformed("fortran-ordered arrays are not supported"));
    }
    parse_shape(header)
}

fn parse_shape(header: &str) -> Result<(usize, usize), IndexError> {
    let start = header
        .find("'shape':")
        .ok_or_else(|| malformed(format!("no 'shape' key in header: {header}")))?;
    let rest = &header[start..];
    let open = rest
        .find('(')
        .ok_or_else(|| malformed("no opening paren in shape"))?;
    let close = rest
        .find(')')
        .ok_or_else(|| malformed("no closing paren in shape"))?;

    let dims = rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|e| malformed(format!("bad shape entry '{s}': {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match dims.as_slice() {
        [rows, cols] => Ok((*rows, *cols)),
        _ => Err(malformed(format!("expected a 2-D shape, got {dims:?}"))),
    }
}
