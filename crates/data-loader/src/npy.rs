//! Reader for NumPy `.npy` arrays holding the trained factors and biases.
//!
//! Only what the training job writes is supported: little-endian `f8` or
//! `f4` data in C order, with any shape. Float32 arrays are widened to f64.
//!
//! File layout:
//! - 6-byte magic `\x93NUMPY`, then a major and a minor version byte
//! - header length (u16 LE for v1, u32 LE for v2/v3)
//! - ASCII header dict: `{'descr': '<f8', 'fortran_order': False, 'shape': (3, 2), }`
//! - raw element data

use crate::error::{DataLoadError, Result};
use std::fs;
use std::path::Path;

const MAGIC: &[u8] = b"\x93NUMPY";

/// A dense array read from a `.npy` file
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl NpyArray {
    /// Row and column counts of a 2-D array
    pub fn matrix_dims(&self) -> Option<(usize, usize)> {
        match self.shape.as_slice() {
            [rows, cols] => Some((*rows, *cols)),
            _ => None,
        }
    }
}

/// Read and decode a `.npy` file
pub fn read_npy(path: &Path) -> Result<NpyArray> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_npy(&bytes, &name)
}

/// Decode the bytes of a `.npy` file; `name` is only used in error messages
pub fn parse_npy(bytes: &[u8], name: &str) -> Result<NpyArray> {
    let malformed = |reason: String| DataLoadError::MalformedModel(format!("{name}: {reason}"));

    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(malformed("not a .npy file".to_string()));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(malformed("truncated header".to_string()));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        other => return Err(malformed(format!("unsupported format version {other}"))),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(malformed("truncated header".to_string()));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| malformed("header is not valid text".to_string()))?;

    let descr = header_value(header, "descr")
        .and_then(quoted)
        .ok_or_else(|| malformed("header has no 'descr'".to_string()))?;
    let fortran_order = header_value(header, "fortran_order")
        .ok_or_else(|| malformed("header has no 'fortran_order'".to_string()))?;
    if fortran_order.starts_with("True") {
        return Err(malformed("Fortran-ordered arrays are not supported".to_string()));
    }
    let shape = header_value(header, "shape")
        .and_then(parse_shape)
        .ok_or_else(|| malformed("header has no valid 'shape'".to_string()))?;

    let element_size = match descr {
        "<f8" => 8,
        "<f4" => 4,
        other => return Err(malformed(format!("unsupported dtype '{other}'"))),
    };

    let expected_len = shape
        .iter()
        .try_fold(element_size, |acc: usize, &dim| acc.checked_mul(dim))
        .ok_or_else(|| malformed(format!("shape {shape:?} overflows")))?;
    let payload = &bytes[data_start..];
    if payload.len() != expected_len {
        return Err(malformed(format!(
            "expected {} bytes of data for shape {:?}, found {}",
            expected_len,
            shape,
            payload.len()
        )));
    }

    let data = if element_size == 8 {
        payload
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect()
    } else {
        payload
            .chunks_exact(4)
            .map(|c| f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect()
    };

    Ok(NpyArray { shape, data })
}

/// Text following `'key':` in the header dict, leading whitespace removed
fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{key}':");
    let start = header.find(&pattern)? + pattern.len();
    Some(header[start..].trim_start())
}

/// Contents of the leading single-quoted string
fn quoted(value: &str) -> Option<&str> {
    let rest = value.strip_prefix('\'')?;
    let end = rest.find('\'')?;
    Some(&rest[..end])
}

/// Parse a Python tuple like `(3, 2)`, `(5,)` or `()`
fn parse_shape(value: &str) -> Option<Vec<usize>> {
    let rest = value.strip_prefix('(')?;
    let end = rest.find(')')?;
    rest[..end]
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| dim.parse().ok())
        .collect()
}
