//! Binary file format for computed fractal grids.
//!
//! Layout, all values little-endian:
//!
//! ```text
//! signature        u32   0x41434652
//! version          u32   0x00010001
//! metadata         top-left (re, im), bottom-right (re, im), escape radius: f64
//!                  limit, samples_real, samples_img, max_iterations, min_iterations: u32
//! rows             samples_img rows of samples_real points:
//!                  last value (re, im), last modulus: f64
//!                  iterations: u32
//!                  diverged: u8 (0 or 1)
//! ```
//!
//! Rows appear in index order, row 0 first.
//! Nothing marks a file as complete; a partially-written file fails to read.

use std::{
    fs::File,
    io::{BufReader, BufWriter, ErrorKind, Read, Write},
    path::Path,
};

use num::complex::Complex64;

use crate::{Error, FractalMetadata, FractalParameters, Grid, PointResult};

pub const SIGNATURE: u32 = 0x4143_4652;
pub const VERSION: u32 = 0x0001_0001;

/// Writer for a fractal file.
///
/// Metadata must be written exactly once, followed by exactly
/// `samples_img` rows of `samples_real` points, followed by [FractalFileWriter::finalize].
pub struct FractalFileWriter<W: Write> {
    out: W,
    metadata: Option<FractalMetadata>,
    rows_written: usize,
}

impl FractalFileWriter<BufWriter<File>> {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::create(path.as_ref())?;
        Ok(FractalFileWriter::new(BufWriter::new(file)))
    }
}

impl<W: Write> FractalFileWriter<W> {
    pub fn new(out: W) -> Self {
        FractalFileWriter {
            out,
            metadata: None,
            rows_written: 0,
        }
    }

    /// Writes the file header and the metadata record.
    pub fn write_metadata(&mut self, metadata: &FractalMetadata) -> Result<(), Error> {
        if self.metadata.is_some() {
            return Err(Error::WriterState("metadata already written".to_owned()));
        }
        metadata.params.validate()?;

        let mut buf = Vec::with_capacity(8 + 5 * 8 + 5 * 4);
        buf.extend_from_slice(&SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&VERSION.to_le_bytes());
        encode_metadata(&mut buf, metadata)?;
        self.out.write_all(&buf)?;

        self.metadata = Some(*metadata);
        Ok(())
    }

    /// Writes the next row.
    pub fn write_row(&mut self, row: &[PointResult]) -> Result<(), Error> {
        let params = match &self.metadata {
            None => {
                return Err(Error::WriterState(
                    "metadata must be written before rows".to_owned(),
                ))
            }
            Some(m) => m.params,
        };
        if self.rows_written >= params.samples_img {
            return Err(Error::RowCount {
                expected: params.samples_img,
                actual: self.rows_written + 1,
            });
        }
        if row.len() != params.samples_real {
            return Err(Error::RowWidth {
                expected: params.samples_real,
                actual: row.len(),
            });
        }

        let mut buf = Vec::with_capacity(row.len() * POINT_SIZE);
        for point in row {
            encode_point(&mut buf, point);
        }
        self.out.write_all(&buf)?;
        self.rows_written += 1;
        Ok(())
    }

    /// Checks that every declared row was written and flushes the output.
    pub fn finalize(mut self) -> Result<W, Error> {
        let metadata = self.metadata.ok_or_else(|| {
            Error::WriterState("metadata must be written before finalizing".to_owned())
        })?;
        if self.rows_written != metadata.params.samples_img {
            return Err(Error::RowCount {
                expected: metadata.params.samples_img,
                actual: self.rows_written,
            });
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Writes a complete fractal file.
pub fn write(path: impl AsRef<Path>, metadata: &FractalMetadata, grid: &Grid) -> Result<(), Error> {
    let span = tracing::debug_span!("write-fractal-file", path = %path.as_ref().display());
    let _guard = span.enter();

    let mut writer = FractalFileWriter::create(path)?;
    writer.write_metadata(metadata)?;
    for row in grid.rows() {
        writer.write_row(row)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Reads a complete fractal file: metadata and grid.
pub fn read(path: impl AsRef<Path>) -> Result<(FractalMetadata, Grid), Error> {
    let span = tracing::debug_span!("read-fractal-file", path = %path.as_ref().display());
    let _guard = span.enter();

    let file = File::open(path.as_ref())?;
    read_from(BufReader::new(file))
}

/// Reads only the metadata of a fractal file.
pub fn read_metadata(path: impl AsRef<Path>) -> Result<FractalMetadata, Error> {
    let file = File::open(path.as_ref())?;
    read_metadata_from(BufReader::new(file))
}

/// Reads the header and metadata record from a stream.
pub fn read_metadata_from<R: Read>(mut input: R) -> Result<FractalMetadata, Error> {
    let mut word = [0u8; 4];
    read_exact(&mut input, &mut word, "file signature")?;
    if u32::from_le_bytes(word) != SIGNATURE {
        return Err(Error::Corrupt(format!(
            "signature {:#010x} does not match",
            u32::from_le_bytes(word)
        )));
    }
    read_exact(&mut input, &mut word, "file version")?;
    let version = u32::from_le_bytes(word);
    if version != VERSION {
        return Err(Error::UnsupportedVersion {
            expected: VERSION,
            found: version,
        });
    }

    let mut record = [0u8; METADATA_SIZE];
    read_exact(&mut input, &mut record, "metadata")?;
    let metadata = decode_metadata(&record);
    metadata
        .params
        .validate()
        .map_err(|err| Error::Corrupt(format!("stored parameters are invalid: {}", err)))?;
    Ok(metadata)
}

/// Reads the metadata and every row from a stream.
pub fn read_from<R: Read>(mut input: R) -> Result<(FractalMetadata, Grid), Error> {
    let metadata = read_metadata_from(&mut input)?;
    let width = metadata.params.samples_real;
    let height = metadata.params.samples_img;

    let mut record = [0u8; POINT_SIZE];
    let mut rows = Vec::with_capacity(height.min(MAX_PREALLOCATION));
    for _ in 0..height {
        let mut row = Vec::with_capacity(width.min(MAX_PREALLOCATION));
        for _ in 0..width {
            read_exact(&mut input, &mut record, "point data")?;
            row.push(decode_point(&record)?);
        }
        rows.push(row);
    }
    tracing::debug!("read {} rows of {} points", height, width);

    Ok((metadata, Grid::from_rows(width, rows)?))
}

const METADATA_SIZE: usize = 5 * 8 + 5 * 4;
const POINT_SIZE: usize = 3 * 8 + 4 + 1;

/// Bounds up-front allocations driven by (unverified) sizes in the file.
const MAX_PREALLOCATION: usize = 1 << 16;

fn read_exact<R: Read>(input: &mut R, buf: &mut [u8], what: &str) -> Result<(), Error> {
    input.read_exact(buf).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => Error::Corrupt(format!("file truncated while reading {}", what)),
        _ => Error::Io(err),
    })
}

fn encode_count(buf: &mut Vec<u8>, name: &str, value: usize) -> Result<(), Error> {
    let v: u32 = value
        .try_into()
        .map_err(|_| Error::InvalidArgument(format!("{} {} too large to store", name, value)))?;
    buf.extend_from_slice(&v.to_le_bytes());
    Ok(())
}

fn encode_metadata(buf: &mut Vec<u8>, metadata: &FractalMetadata) -> Result<(), Error> {
    let p = &metadata.params;
    for v in [
        p.top_left.re,
        p.top_left.im,
        p.bottom_right.re,
        p.bottom_right.im,
        p.escape_radius,
    ] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.extend_from_slice(&p.limit.to_le_bytes());
    encode_count(buf, "samples_real", p.samples_real)?;
    encode_count(buf, "samples_img", p.samples_img)?;
    buf.extend_from_slice(&metadata.max_iterations.to_le_bytes());
    buf.extend_from_slice(&metadata.min_iterations.to_le_bytes());
    Ok(())
}

fn encode_point(buf: &mut Vec<u8>, point: &PointResult) {
    buf.extend_from_slice(&point.last_value.re.to_le_bytes());
    buf.extend_from_slice(&point.last_value.im.to_le_bytes());
    buf.extend_from_slice(&point.last_modulus.to_le_bytes());
    buf.extend_from_slice(&point.iterations.to_le_bytes());
    buf.push(point.diverged as u8);
}

/// Little-endian cursor over a fixed-size record.
struct Fields<'a>(&'a [u8]);

impl Fields<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let (head, tail) = self.0.split_at(N);
        self.0 = tail;
        let mut out = [0u8; N];
        out.copy_from_slice(head);
        out
    }

    fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }
}

fn decode_metadata(record: &[u8; METADATA_SIZE]) -> FractalMetadata {
    let mut f = Fields(record);
    let top_left = Complex64::new(f.f64(), f.f64());
    let bottom_right = Complex64::new(f.f64(), f.f64());
    let escape_radius = f.f64();
    let limit = f.u32();
    let samples_real = f.u32() as usize;
    let samples_img = f.u32() as usize;
    let max_iterations = f.u32();
    let min_iterations = f.u32();
    FractalMetadata {
        params: FractalParameters {
            top_left,
            bottom_right,
            escape_radius,
            limit,
            samples_real,
            samples_img,
        },
        max_iterations,
        min_iterations,
    }
}

fn decode_point(record: &[u8; POINT_SIZE]) -> Result<PointResult, Error> {
    let mut f = Fields(record);
    let last_value = Complex64::new(f.f64(), f.f64());
    let last_modulus = f.f64();
    let iterations = f.u32();
    let diverged = match f.take::<1>()[0] {
        0 => false,
        1 => true,
        v => return Err(Error::Corrupt(format!("invalid divergence flag {}", v))),
    };
    Ok(PointResult {
        last_value,
        last_modulus,
        iterations,
        diverged,
    })
}
