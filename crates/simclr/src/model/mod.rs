//! Encoder + projection head: ResNet backbones selected by name and the MLP
//! head that feeds the contrastive loss.

pub mod backbone;
pub mod projector;
pub mod resnet;
pub mod simclr;
