//! derma-core — Skin-assessment domain engine.
//!
//! Mock analysis brains, the consensus merge, routine templating, the
//! scripted chat, the upload validity gate (with an optional SCRFD face
//! screen via ONNX Runtime), and PDF report rendering.
//!
//! Every assessment is fabricated by random selection from the embedded
//! catalog. Nothing in this crate looks at skin.

pub mod brain;
pub mod catalog;
pub mod chat;
pub mod consensus;
pub mod report;
pub mod routine;
pub mod screen;
pub mod types;
pub mod validity;

pub use screen::{FaceBox, FaceScreen};
pub use types::{Assessment, BrainKind, SkinType};
