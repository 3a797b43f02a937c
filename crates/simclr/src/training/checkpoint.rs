//! Model snapshots written with burn's named MessagePack recorder.

use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};

use crate::error::SimclrError;
use crate::model::backbone::Backbone;
use crate::model::simclr::{SimclrModel, SimclrModelConfig};

/// File stem for an epoch snapshot: `simclr_<backbone>_epoch<N>`.
pub fn checkpoint_stem(backbone: Backbone, epoch: usize) -> String {
    format!("simclr_{backbone}_epoch{epoch}")
}

/// Full path the recorder writes for an epoch snapshot (it appends `.mpk`).
pub fn checkpoint_path(dir: &Path, backbone: Backbone, epoch: usize) -> PathBuf {
    dir.join(format!("{}.mpk", checkpoint_stem(backbone, epoch)))
}

/// Write the model parameters for `epoch` into `dir`. Returns the file path.
pub fn save_checkpoint<B: Backend>(
    model: &SimclrModel<B>,
    dir: &Path,
    backbone: Backbone,
    epoch: usize,
) -> Result<PathBuf, SimclrError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        SimclrError::Checkpoint(format!("failed to create {}: {e}", dir.display()))
    })?;
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(dir.join(checkpoint_stem(backbone, epoch)), &recorder)
        .map_err(|e| SimclrError::Checkpoint(format!("failed to save epoch {epoch} into {}: {e}", dir.display())))?;
    Ok(checkpoint_path(dir, backbone, epoch))
}

/// Load a snapshot into a freshly initialized model.
pub fn load_checkpoint<B: Backend>(
    path: &Path,
    config: &SimclrModelConfig,
    device: &B::Device,
) -> Result<SimclrModel<B>, SimclrError> {
    config
        .init::<B>(device)
        .load_file(
            path,
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            device,
        )
        .map_err(|e| SimclrError::Checkpoint(format!("failed to load {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_checkpoint_naming() {
        assert_eq!(checkpoint_stem(Backbone::ResNet18, 1), "simclr_resnet18_epoch1");
        assert_eq!(
            checkpoint_path(Path::new("/ckpt"), Backbone::ResNet34, 250),
            PathBuf::from("/ckpt/simclr_resnet34_epoch250.mpk")
        );
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = tempfile::TempDir::new().unwrap();
        let device = Default::default();
        let config = SimclrModelConfig::new(Backbone::ResNet18)
            .with_projection_dim(4)
            .with_hidden_dim(8);
        let model = config.init::<TestBackend>(&device);

        let path = save_checkpoint(&model, tmp.path(), Backbone::ResNet18, 3).unwrap();
        assert!(path.exists(), "missing {}", path.display());

        let reloaded = load_checkpoint::<TestBackend>(&path, &config, &device).unwrap();
        // Tiny input: only the projection head output is compared.
        let features = Tensor::<TestBackend, 2>::random([2, 512], Distribution::Normal(0.0, 1.0), &device);
        let a: Vec<f32> = model.projector.forward(features.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = reloaded.projector.forward(features).into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_missing_file() {
        let device = Default::default();
        let config = SimclrModelConfig::new(Backbone::ResNet18);
        let err = load_checkpoint::<TestBackend>(Path::new("/nonexistent/x.mpk"), &config, &device)
            .unwrap_err();
        assert!(matches!(err, SimclrError::Checkpoint(_)));
    }

    #[test]
    fn test_save_into_regular_file_names_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let device = Default::default();
        let model = SimclrModelConfig::new(Backbone::ResNet18)
            .with_projection_dim(4)
            .with_hidden_dim(8)
            .init::<TestBackend>(&device);

        let err = save_checkpoint(&model, &blocker, Backbone::ResNet18, 1).unwrap_err();
        assert!(matches!(err, SimclrError::Checkpoint(_)));
        assert!(err.to_string().contains("not-a-dir"), "got {err}");
    }
}
