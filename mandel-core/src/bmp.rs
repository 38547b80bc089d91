//! Streaming writer for uncompressed 32-bit BMP images.
//!
//! Rows are written as they arrive; the writer never buffers the image.
//! The headers declare a positive height, i.e. bottom-up scan order:
//! the first row written is the bottom row of the picture.
//! Grid row 0 is the bottom edge of the sampling box, so rows can be
//! streamed in grid order without any reordering.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::{colorize::RowSink, pixel::Pixel, Error};

const FILE_HEADER_SIZE: u32 = 14;
const IMAGE_HEADER_SIZE: u32 = 40;
const BYTES_PER_PIXEL: u32 = 4;

/// BMP image sink with a declared size.
pub struct BmpWriter<W: Write> {
    out: W,
    width: usize,
    height: usize,
    rows_written: usize,
    initialized: bool,
}

impl BmpWriter<BufWriter<File>> {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: impl AsRef<Path>, width: usize, height: usize) -> Result<Self, Error> {
        let file = File::create(path.as_ref())?;
        tracing::debug!("writing bitmap {}", path.as_ref().display());
        BmpWriter::new(BufWriter::new(file), width, height)
    }
}

impl<W: Write> BmpWriter<W> {
    pub fn new(out: W, width: usize, height: usize) -> Result<Self, Error> {
        let too_big = || {
            Error::InvalidArgument(format!("bitmap of {}x{} is too large", width, height))
        };
        let w: i32 = width.try_into().map_err(|_| too_big())?;
        let h: i32 = height.try_into().map_err(|_| too_big())?;
        (w as u32)
            .checked_mul(h as u32)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .and_then(|n| n.checked_add(FILE_HEADER_SIZE + IMAGE_HEADER_SIZE))
            .ok_or_else(too_big)?;

        Ok(BmpWriter {
            out,
            width,
            height,
            rows_written: 0,
            initialized: false,
        })
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Checks that every declared row was written and flushes the output.
    pub fn finish(mut self) -> Result<W, Error> {
        if self.rows_written != self.height {
            return Err(Error::RowCount {
                expected: self.height,
                actual: self.rows_written,
            });
        }
        self.initialize()?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn initialize(&mut self) -> Result<(), Error> {
        if self.initialized {
            return Ok(());
        }
        self.write_file_header()?;
        self.write_image_header()?;
        self.initialized = true;
        Ok(())
    }

    fn image_size(&self) -> u32 {
        // Bounds were checked in new().
        self.width as u32 * self.height as u32 * BYTES_PER_PIXEL
    }

    fn write_file_header(&mut self) -> Result<(), Error> {
        let data_offset = FILE_HEADER_SIZE + IMAGE_HEADER_SIZE;
        let file_size = data_offset + self.image_size();

        let out = &mut self.out;
        out.write_all(b"BM")?;
        out.write_all(&file_size.to_le_bytes())?;
        out.write_all(&0u16.to_le_bytes())?;
        out.write_all(&0u16.to_le_bytes())?;
        out.write_all(&data_offset.to_le_bytes())?;
        Ok(())
    }

    fn write_image_header(&mut self) -> Result<(), Error> {
        let image_size = self.image_size();

        let out = &mut self.out;
        out.write_all(&IMAGE_HEADER_SIZE.to_le_bytes())?;
        out.write_all(&(self.width as i32).to_le_bytes())?;
        out.write_all(&(self.height as i32).to_le_bytes())?;
        // planes, bits per pixel
        out.write_all(&1u16.to_le_bytes())?;
        out.write_all(&32u16.to_le_bytes())?;
        // BI_RGB: no compression
        out.write_all(&0u32.to_le_bytes())?;
        out.write_all(&image_size.to_le_bytes())?;
        // resolution (unspecified), palette size, important colors
        out.write_all(&0i32.to_le_bytes())?;
        out.write_all(&0i32.to_le_bytes())?;
        out.write_all(&0u32.to_le_bytes())?;
        out.write_all(&0u32.to_le_bytes())?;
        Ok(())
    }
}

impl<W: Write> RowSink for BmpWriter<W> {
    fn write_row(&mut self, row: &[Pixel]) -> Result<(), Error> {
        self.initialize()?;

        if self.rows_written >= self.height {
            return Err(Error::RowCount {
                expected: self.height,
                actual: self.rows_written + 1,
            });
        }
        if row.len() != self.width {
            return Err(Error::RowWidth {
                expected: self.width,
                actual: row.len(),
            });
        }

        self.rows_written += 1;
        for pixel in row {
            self.out.write_all(&pixel.to_u32().to_le_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_row(y: usize, width: usize) -> Vec<Pixel> {
        (0..width)
            .map(|x| Pixel::rgb((x * 20) as u8, (y * 20) as u8, 7))
            .collect()
    }

    #[test]
    fn writes_headers() {
        let mut bmp = BmpWriter::new(Vec::new(), 10, 11).unwrap();
        for y in 0..11 {
            bmp.write_row(&gradient_row(y, 10)).unwrap();
        }
        let bytes = bmp.finish().unwrap();

        assert_eq!(bytes.len(), 54 + 10 * 11 * 4);
        assert_eq!(&bytes[0..2], b"BM");
        assert_eq!(u32::from_le_bytes(bytes[2..6].try_into().unwrap()), bytes.len() as u32);
        assert_eq!(u32::from_le_bytes(bytes[10..14].try_into().unwrap()), 54);
        assert_eq!(u32::from_le_bytes(bytes[14..18].try_into().unwrap()), 40);
        assert_eq!(i32::from_le_bytes(bytes[18..22].try_into().unwrap()), 10);
        assert_eq!(i32::from_le_bytes(bytes[22..26].try_into().unwrap()), 11);
        assert_eq!(u16::from_le_bytes(bytes[28..30].try_into().unwrap()), 32);
        // First pixel of first row, stored as B, G, R, 0.
        assert_eq!(&bytes[54..58], &[7, 0, 0, 0]);
    }

    #[test]
    fn decodes_bottom_up() {
        let (width, height) = (12, 10);
        let mut bmp = BmpWriter::new(Vec::new(), width, height).unwrap();
        for y in 0..height {
            bmp.write_row(&gradient_row(y, width)).unwrap();
        }
        let bytes = bmp.finish().unwrap();

        let img = image::load_from_memory_with_format(&bytes, image::ImageFormat::Bmp)
            .unwrap()
            .to_rgb8();
        assert_eq!(img.dimensions(), (width as u32, height as u32));
        for y in 0..height {
            // The first row written is the bottom row of the picture.
            let image_y = (height - 1 - y) as u32;
            for (x, expected) in gradient_row(y, width).into_iter().enumerate() {
                let got = img.get_pixel(x as u32, image_y);
                assert_eq!(got.0, [expected.red, expected.green, expected.blue]);
            }
        }
    }

    #[test]
    fn rejects_extra_rows() {
        let mut bmp = BmpWriter::new(Vec::new(), 10, 10).unwrap();
        for y in 0..10 {
            bmp.write_row(&gradient_row(y, 10)).unwrap();
        }
        assert!(matches!(
            bmp.write_row(&gradient_row(10, 10)),
            Err(Error::RowCount {
                expected: 10,
                actual: 11
            })
        ));
    }

    #[test]
    fn rejects_wrong_width() {
        let mut bmp = BmpWriter::new(Vec::new(), 10, 10).unwrap();
        assert!(matches!(
            bmp.write_row(&gradient_row(0, 9)),
            Err(Error::RowWidth {
                expected: 10,
                actual: 9
            })
        ));
        assert_eq!(bmp.rows_written(), 0);
    }

    #[test]
    fn finish_requires_every_row() {
        let mut bmp = BmpWriter::new(Vec::new(), 10, 10).unwrap();
        bmp.write_row(&gradient_row(0, 10)).unwrap();
        assert!(matches!(
            bmp.finish(),
            Err(Error::RowCount {
                expected: 10,
                actual: 1
            })
        ));
    }

    #[test]
    fn creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bmp");
        let mut bmp = BmpWriter::create(&path, 10, 10).unwrap();
        for y in 0..10 {
            bmp.write_row(&gradient_row(y, 10)).unwrap();
        }
        bmp.finish().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 54 + 400);
    }
}
