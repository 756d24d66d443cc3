//! Loading demonstration samples from MNIST IDX files or plain image files.

use ndarray::{Array3, ArrayD};
use std::path::Path;
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::preprocess::normalize_image;

const IDX_IMAGES_MAGIC: u32 = 0x0000_0803;
const IDX_LABELS_MAGIC: u32 = 0x0000_0801;

/// One normalized image and its label
#[derive(Debug, Clone)]
pub struct Sample {
    pub image: ArrayD<f32>,
    pub label: i32,
}

/// Raw `u8` images from an IDX3 file
#[derive(Debug, Clone)]
pub struct IdxImages {
    pub rows: usize,
    pub cols: usize,
    pixels: Vec<u8>,
}

impl IdxImages {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header = read_header(bytes, IDX_IMAGES_MAGIC, 4)?;
        let (count, rows, cols) = (header[0], header[1], header[2]);
        let expected = count
            .checked_mul(rows)
            .and_then(|n| n.checked_mul(cols))
            .ok_or_else(|| LedgerError::InvalidInput("IDX image dimensions overflow".to_string()))?;
        let pixels = &bytes[16..];
        if pixels.len() != expected {
            return Err(LedgerError::InvalidInput(format!(
                "IDX image file holds {} pixel bytes, header declares {}",
                pixels.len(),
                expected
            )));
        }
        Ok(Self {
            rows,
            cols,
            pixels: pixels.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        let per_image = self.rows * self.cols;
        if per_image == 0 {
            0
        } else {
            self.pixels.len() / per_image
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Image `index` as a `(rows, cols, 1)` array scaled to `[0, 1]`
    pub fn normalized(&self, index: usize) -> Result<ArrayD<f32>> {
        if index >= self.len() {
            return Err(LedgerError::InvalidInput(format!(
                "image index {} out of range (0..{})",
                index,
                self.len()
            )));
        }
        let per_image = self.rows * self.cols;
        let start = index * per_image;
        let raw = &self.pixels[start..start + per_image];
        let cols = self.cols;
        Ok(
            Array3::from_shape_fn((self.rows, self.cols, 1), |(r, c, _)| {
                f32::from(raw[r * cols + c]) / 255.0
            })
            .into_dyn(),
        )
    }
}

/// Labels from an IDX1 file
pub fn parse_idx_labels(bytes: &[u8]) -> Result<Vec<u8>> {
    let header = read_header(bytes, IDX_LABELS_MAGIC, 2)?;
    let labels = &bytes[8..];
    if labels.len() != header[0] {
        return Err(LedgerError::InvalidInput(format!(
            "IDX label file holds {} labels, header declares {}",
            labels.len(),
            header[0]
        )));
    }
    Ok(labels.to_vec())
}

/// Big-endian `u32` fields after the magic number
fn read_header(bytes: &[u8], magic: u32, words: usize) -> Result<Vec<usize>> {
    if bytes.len() < words * 4 {
        return Err(LedgerError::InvalidInput(format!(
            "IDX file too short: {} bytes",
            bytes.len()
        )));
    }
    let fields: Vec<u32> = bytes[..words * 4]
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if fields[0] != magic {
        return Err(LedgerError::InvalidInput(format!(
            "bad IDX magic {:#010x}, expected {:#010x}",
            fields[0], magic
        )));
    }
    Ok(fields[1..].iter().map(|v| *v as usize).collect())
}

/// Sample `index` from a pair of MNIST IDX files
pub fn load_mnist_sample(images: &Path, labels: &Path, index: usize) -> Result<Sample> {
    let images = IdxImages::parse(&std::fs::read(images)?)?;
    let labels = parse_idx_labels(&std::fs::read(labels)?)?;
    if images.len() != labels.len() {
        return Err(LedgerError::InvalidInput(format!(
            "{} images but {} labels",
            images.len(),
            labels.len()
        )));
    }

    let image = images.normalized(index)?;
    let label = i32::from(labels[index]);
    debug!("Loaded MNIST sample {} (label {})", index, label);
    Ok(Sample { image, label })
}

/// Sample from an image file on disk with a caller-supplied label
pub fn load_image_sample(path: &Path, label: i32) -> Result<Sample> {
    let image = image::open(path)?;
    Ok(Sample {
        image: normalize_image(&image),
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx_images(count: u32, rows: u32, cols: u32, pixels: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in [IDX_IMAGES_MAGIC, count, rows, cols] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(pixels);
        out
    }

    fn idx_labels(labels: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&IDX_LABELS_MAGIC.to_be_bytes());
        out.extend_from_slice(&(labels.len() as u32).to_be_bytes());
        out.extend_from_slice(labels);
        out
    }

    #[test]
    fn parses_images_and_labels() {
        let pixels: Vec<u8> = vec![0, 255, 51, 102, 10, 20, 30, 40];
        let images = IdxImages::parse(&idx_images(2, 2, 2, &pixels)).unwrap();
        assert_eq!(images.len(), 2);

        let second = images.normalized(1).unwrap();
        assert_eq!(second.shape(), &[2, 2, 1]);
        assert!((second[[0, 1, 0]] - 20.0 / 255.0).abs() < 1e-7);

        let first = images.normalized(0).unwrap();
        assert_eq!(first[[0, 1, 0]], 1.0);

        assert!(images.normalized(2).is_err());
        assert_eq!(parse_idx_labels(&idx_labels(&[7, 2])).unwrap(), vec![7, 2]);
    }

    #[test]
    fn rejects_bad_files() {
        assert!(IdxImages::parse(&idx_labels(&[1])).is_err());
        assert!(IdxImages::parse(&idx_images(2, 2, 2, &[0; 7])).is_err());
        assert!(parse_idx_labels(&[0, 0]).is_err());
    }

    #[test]
    fn loads_sample_from_disk() {
        let dir = std::env::temp_dir().join(format!("digit-ledger-idx-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let images_path = dir.join("images");
        let labels_path = dir.join("labels");
        std::fs::write(&images_path, idx_images(1, 2, 2, &[0, 0, 255, 0])).unwrap();
        std::fs::write(&labels_path, idx_labels(&[7])).unwrap();

        let sample = load_mnist_sample(&images_path, &labels_path, 0).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(sample.label, 7);
        assert_eq!(sample.image[[1, 0, 0]], 1.0);
    }
}
