//! Raw subject recordings stored as NumPy `.npy` arrays.
//!
//! Only what the recordings need is supported: little-endian `f4` / `f8`
//! (and `i2` / `i4` / `i8`, widened to `f64`), C order, format versions 1-3.
//! A recording has shape `[channel_types, sensors, time]`.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::DataError;

const MAGIC: &[u8] = b"\x93NUMPY";

/// File name suffix of a subject's full recording.
pub const RECORDING_SUFFIX: &str = "_ICA_transdef_mfds200.npy";

/// Path of `subject`'s recording inside `data_dir`.
pub fn recording_path(data_dir: &Path, subject: &str) -> PathBuf {
    data_dir.join(format!("{subject}{RECORDING_SUFFIX}"))
}

/// An n-dimensional array of `f64` in C order.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Recording {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Recording, DataError> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(DataError::Shape { expected: shape, actual: vec![data.len()] });
        }
        Ok(Recording { shape, data })
    }

    /// Reads a `.npy` file.
    pub fn read(path: &Path) -> Result<Recording, DataError> {
        let bytes = std::fs::read(path).map_err(|e| DataError::io(path, e))?;
        parse_npy(&bytes).map_err(|reason| DataError::npy(path, reason))
    }

    /// Writes the array as a version 1.0 `<f8` `.npy` file.
    pub fn write(&self, path: &Path) -> Result<(), DataError> {
        let shape = match self.shape.len() {
            1 => format!("({},)", self.shape[0]),
            _ => format!(
                "({})",
                self.shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
            ),
        };
        let mut header = format!("{{'descr': '<f8', 'fortran_order': False, 'shape': {shape}, }}");
        // Magic + version + length prefix + header + '\n' is padded to 64 bytes.
        let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
        header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
        header.push('\n');

        let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + self.data.len() * 8);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        for v in &self.data {
            out.extend_from_slice(&v.to_le_bytes());
        }

        let mut file = std::fs::File::create(path).map_err(|e| DataError::io(path, e))?;
        file.write_all(&out).map_err(|e| DataError::io(path, e))
    }

    /// Length of the last (time) axis.
    pub fn time_len(&self) -> usize {
        self.shape.last().copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Dtype {
    F4,
    F8,
    I2,
    I4,
    I8,
}

impl Dtype {
    fn size(self) -> usize {
        match self {
            Dtype::I2 => 2,
            Dtype::F4 | Dtype::I4 => 4,
            Dtype::F8 | Dtype::I8 => 8,
        }
    }

    fn decode(self, b: &[u8]) -> f64 {
        match self {
            Dtype::F4 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Dtype::F8 => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
            Dtype::I2 => i16::from_le_bytes([b[0], b[1]]) as f64,
            Dtype::I4 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Dtype::I8 => i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64,
        }
    }
}

fn parse_npy(bytes: &[u8]) -> Result<Recording, String> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err("missing NUMPY magic".into());
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated header length".into());
            }
            (u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, 12)
        }
        v => return Err(format!("unsupported format version {v}")),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err("truncated header".into());
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| "header is not valid UTF-8".to_string())?;

    let descr = dict_value(header, "descr").ok_or("header has no 'descr'")?;
    let dtype = match descr.trim_matches(|c| c == '\'' || c == '"') {
        "<f4" => Dtype::F4,
        "<f8" => Dtype::F8,
        "<i2" => Dtype::I2,
        "<i4" => Dtype::I4,
        "<i8" => Dtype::I8,
        other => return Err(format!("unsupported dtype {other}")),
    };
    let fortran = dict_value(header, "fortran_order").ok_or("header has no 'fortran_order'")?;
    if fortran.trim() != "False" {
        return Err("Fortran-ordered arrays are not supported".into());
    }
    let shape = parse_shape(dict_value(header, "shape").ok_or("header has no 'shape'")?)?;

    let numel: usize = shape.iter().product();
    let payload = &bytes[data_start..];
    if payload.len() < numel * dtype.size() {
        return Err(format!("expected {} data bytes, found {}", numel * dtype.size(), payload.len()));
    }
    let data = payload
        .chunks_exact(dtype.size())
        .take(numel)
        .map(|b| dtype.decode(b))
        .collect();
    Ok(Recording { shape, data })
}

/// Raw text of `key`'s value in the header's Python dict literal.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let key_pos = header.find(&format!("'{key}'"))?;
    let rest = &header[key_pos + key.len() + 2..];
    let rest = rest[rest.find(':')? + 1..].trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find(',').or_else(|| rest.find('}'))?
    };
    Some(rest[..end].trim())
}

fn parse_shape(raw: &str) -> Result<Vec<usize>, String> {
    raw.trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| format!("bad shape entry '{s}'")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_files_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.npy");
        let rec = Recording::new(vec![2, 3], vec![0.0, 1.5, -2.0, 3.25, 4.0, 5.0]).unwrap();
        rec.write(&path).unwrap();
        assert_eq!(Recording::read(&path).unwrap(), rec);
    }

    #[test]
    fn header_is_padded_to_sixty_four_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.npy");
        Recording::new(vec![4], vec![1.0; 4]).unwrap().write(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!((bytes.len() - 32) % 64, 0);
    }

    #[test]
    fn parses_float32_headers_written_by_numpy() {
        let header = "{'descr': '<f4', 'fortran_order': False, 'shape': (1, 2), }";
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-0.25f32).to_le_bytes());
        let rec = parse_npy(&bytes).unwrap();
        assert_eq!(rec.shape, vec![1, 2]);
        assert_eq!(rec.data, vec![1.5, -0.25]);
    }

    #[test]
    fn rejects_non_npy_bytes() {
        assert!(parse_npy(b"not a numpy file").is_err());
    }
}
