//! Supported backbone architectures.
//!
//! The whitelist is a closed enum; names are resolved through `FromStr` and
//! anything else is rejected with [`SimclrError::UnsupportedBackbone`].

use std::fmt;
use std::str::FromStr;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::resnet::{ResNet, ResNetConfig};
use crate::error::SimclrError;

/// A feature extractor the encoder can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backbone {
    #[serde(rename = "resnet18")]
    ResNet18,
    #[serde(rename = "resnet34")]
    ResNet34,
}

impl Backbone {
    pub const ALL: [Backbone; 2] = [Backbone::ResNet18, Backbone::ResNet34];

    pub fn name(self) -> &'static str {
        match self {
            Backbone::ResNet18 => "resnet18",
            Backbone::ResNet34 => "resnet34",
        }
    }

    /// Residual blocks per stage.
    pub fn stage_depths(self) -> [usize; 4] {
        match self {
            Backbone::ResNet18 => [2, 2, 2, 2],
            Backbone::ResNet34 => [3, 4, 6, 3],
        }
    }

    /// Width of the pooled feature vector.
    pub fn feature_dim(self) -> usize {
        self.config().output_channels()
    }

    pub fn config(self) -> ResNetConfig {
        ResNetConfig::new(self.stage_depths().to_vec())
    }

    pub fn init<B: Backend>(self, device: &B::Device) -> ResNet<B> {
        self.config().init(device)
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backbone {
    type Err = SimclrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backbone::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| SimclrError::UnsupportedBackbone(s.to_string()))
    }
}
