//! Positive-pair generation on top of any base image dataset.

use burn::data::dataset::Dataset;
use rand::RngCore;

use super::augment::{Augment, View};
use super::sample::ImageSample;
use crate::error::SimclrError;

/// Two independent views of one source image.
///
/// `views[0]` and `views[1]` form the positive pair; `index` is the position
/// of the source image in the base dataset.
#[derive(Clone, Debug)]
pub struct ViewPair {
    pub views: [View; 2],
    pub label: usize,
    pub index: usize,
}

/// Adapter turning a base `Dataset<ImageSample>` into a source of view pairs.
///
/// The base dataset is only read; all randomness comes from the caller's rng.
pub struct PairDataset<D, A> {
    base: D,
    augment: A,
}

impl<D, A> PairDataset<D, A>
where
    D: Dataset<ImageSample>,
    A: Augment,
{
    pub fn new(base: D, augment: A) -> Self {
        Self { base, augment }
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Shape `[C, H, W]` of each view.
    pub fn view_shape(&self) -> [usize; 3] {
        self.augment.view_shape()
    }

    /// Draw two independent augmentations of the image at `index`.
    pub fn get_pair(&self, index: usize, rng: &mut dyn RngCore) -> Result<ViewPair, SimclrError> {
        let len = self.base.len();
        let sample = self
            .base
            .get(index)
            .ok_or(SimclrError::IndexOutOfRange { index, len })?;

        let first = self.augment.view(&sample.image, rng);
        let second = self.augment.view(&sample.image, rng);
        Ok(ViewPair {
            views: [first, second],
            label: sample.label,
            index,
        })
    }
}
