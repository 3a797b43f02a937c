use image::RgbImage;

/// One (image, label) pair from a base classification dataset.
///
/// The label is carried through the pair pipeline but never reaches the loss.
#[derive(Clone, Debug)]
pub struct ImageSample {
    pub image: RgbImage,
    pub label: usize,
}

impl ImageSample {
    pub fn new(image: RgbImage, label: usize) -> Self {
        Self { image, label }
    }
}
