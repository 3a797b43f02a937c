//! Reader for the CIFAR-10 binary distribution.
//!
//! Each `.bin` file is a flat sequence of 3073-byte records: one label byte
//! followed by the red, green and blue planes of a 32x32 image (row-major).
//! Images are re-packed to interleaved RGB on load so every `get` is a single
//! copy into an `RgbImage`.

use std::path::{Path, PathBuf};

use burn::data::dataset::Dataset;
use image::RgbImage;

use super::sample::ImageSample;
use crate::error::SimclrError;

/// Directory name produced by extracting `cifar-10-binary.tar.gz`.
pub const CIFAR10_FOLDER: &str = "cifar-10-batches-bin";

const SIDE: usize = 32;
const PLANE: usize = SIDE * SIDE;
const IMAGE_BYTES: usize = 3 * PLANE;
const RECORD_BYTES: usize = 1 + IMAGE_BYTES;

const CLASS_NAMES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Which half of CIFAR-10 to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cifar10Split {
    Train,
    Test,
}

impl Cifar10Split {
    /// Binary batch files making up this split, in read order.
    pub fn files(self) -> &'static [&'static str] {
        match self {
            Cifar10Split::Train => &[
                "data_batch_1.bin",
                "data_batch_2.bin",
                "data_batch_3.bin",
                "data_batch_4.bin",
                "data_batch_5.bin",
            ],
            Cifar10Split::Test => &["test_batch.bin"],
        }
    }
}

/// CIFAR-10 held fully in memory.
#[derive(Debug, Clone)]
pub struct Cifar10 {
    /// Interleaved RGB bytes, `IMAGE_BYTES` per image.
    pixels: Vec<u8>,
    labels: Vec<u8>,
}

impl Cifar10 {
    /// Load a split from `root`.
    ///
    /// `root` may point either at the extracted `cifar-10-batches-bin`
    /// directory or at its parent.
    pub fn open(root: &Path, split: Cifar10Split) -> Result<Self, SimclrError> {
        let dir = if root.join(CIFAR10_FOLDER).is_dir() {
            root.join(CIFAR10_FOLDER)
        } else {
            root.to_path_buf()
        };

        let mut dataset = Cifar10 {
            pixels: Vec::new(),
            labels: Vec::new(),
        };
        for name in split.files() {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(SimclrError::Dataset(format!(
                    "missing CIFAR-10 file {} (download and extract the binary version into {})",
                    path.display(),
                    root.display()
                )));
            }
            let bytes = std::fs::read(&path).map_err(|e| {
                SimclrError::Dataset(format!("failed to read {}: {e}", path.display()))
            })?;
            dataset.append_records(&bytes).map_err(|e| match e {
                SimclrError::Dataset(msg) => {
                    SimclrError::Dataset(format!("{}: {msg}", path.display()))
                }
                other => other,
            })?;
        }

        tracing::info!(
            dir = %dir.display(),
            ?split,
            images = dataset.labels.len(),
            "Loaded CIFAR-10"
        );
        let mut counts = [0usize; CLASS_NAMES.len()];
        for &label in &dataset.labels {
            counts[label as usize] += 1;
        }
        for (label, count) in counts.into_iter().enumerate() {
            tracing::debug!(class = Cifar10::class_name(label).unwrap_or("?"), count, "Class balance");
        }
        Ok(dataset)
    }

    /// Parse raw binary records (one or more concatenated `.bin` payloads).
    pub fn from_records(bytes: &[u8]) -> Result<Self, SimclrError> {
        let mut dataset = Cifar10 {
            pixels: Vec::new(),
            labels: Vec::new(),
        };
        dataset.append_records(bytes)?;
        Ok(dataset)
    }

    fn append_records(&mut self, bytes: &[u8]) -> Result<(), SimclrError> {
        if bytes.len() % RECORD_BYTES != 0 {
            return Err(SimclrError::Dataset(format!(
                "length {} is not a multiple of the {RECORD_BYTES}-byte record size",
                bytes.len()
            )));
        }
        let count = bytes.len() / RECORD_BYTES;
        self.pixels.reserve(count * IMAGE_BYTES);
        self.labels.reserve(count);

        for record in bytes.chunks_exact(RECORD_BYTES) {
            let label = record[0];
            if label as usize >= CLASS_NAMES.len() {
                return Err(SimclrError::Dataset(format!("label {label} out of range")));
            }
            let (r, rest) = record[1..].split_at(PLANE);
            let (g, b) = rest.split_at(PLANE);
            for i in 0..PLANE {
                self.pixels.extend_from_slice(&[r[i], g[i], b[i]]);
            }
            self.labels.push(label);
        }
        Ok(())
    }

    /// Human-readable class name for a label.
    pub fn class_name(label: usize) -> Option<&'static str> {
        CLASS_NAMES.get(label).copied()
    }
}

impl Dataset<ImageSample> for Cifar10 {
    fn get(&self, index: usize) -> Option<ImageSample> {
        let label = *self.labels.get(index)?;
        let start = index * IMAGE_BYTES;
        let raw = self.pixels[start..start + IMAGE_BYTES].to_vec();
        let image = RgbImage::from_raw(SIDE as u32, SIDE as u32, raw)?;
        Some(ImageSample::new(image, label as usize))
    }

    fn len(&self) -> usize {
        self.labels.len()
    }
}

/// Resolve a possibly-relative data directory against the working directory.
pub fn resolve_data_dir(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
