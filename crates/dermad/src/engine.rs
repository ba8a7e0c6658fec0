//! Analysis engine.
//!
//! Owns the face screen and the RNG on a dedicated OS thread; D-Bus
//! handlers talk to it through an mpsc channel with oneshot replies.
//! Loads the screen model synchronously at spawn (fail-fast).

use derma_core::brain::MockBrain;
use derma_core::consensus;
use derma_core::screen::{FaceScreen, ScreenError};
use derma_core::types::Assessment;
use derma_core::validity::{self, ValidityError};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validity(#[from] ValidityError),
    #[error("face screen: {0}")]
    Screen(#[from] ScreenError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of one analysis pass.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub assessment: Assessment,
    pub brain_used: String,
    /// Decoded upload, handed back for the image store.
    pub image: RgbImage,
}

/// Gate thresholds the engine applies to every upload.
pub struct EnginePolicy {
    pub min_image_dim: u32,
    pub min_face_area: f32,
}

enum EngineRequest {
    Analyze {
        bytes: Vec<u8>,
        second_opinion: bool,
        reply: oneshot::Sender<Result<AnalysisOutcome, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Request analysis: gate the upload, then run the brains.
    pub async fn analyze(
        &self,
        bytes: Vec<u8>,
        second_opinion: bool,
    ) -> Result<AnalysisOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Analyze {
                bytes,
                second_opinion,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
pub fn spawn_engine(
    screen_model: Option<&Path>,
    policy: EnginePolicy,
) -> Result<EngineHandle, EngineError> {
    let mut screen = match screen_model {
        Some(path) => {
            let screen = FaceScreen::load(&path.to_string_lossy())?;
            tracing::info!(path = %path.display(), "face screen loaded");
            Some(screen)
        }
        None => {
            tracing::info!("no screen model configured; dimension checks only");
            None
        }
    };

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("derma-engine".into())
        .spawn(move || {
            let mut rng = StdRng::from_entropy();
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Analyze {
                        bytes,
                        second_opinion,
                        reply,
                    } => {
                        let result =
                            run_analysis(&bytes, second_opinion, screen.as_mut(), &policy, &mut rng);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

/// Gate the upload, then fabricate the assessment.
fn run_analysis(
    bytes: &[u8],
    second_opinion: bool,
    screen: Option<&mut FaceScreen>,
    policy: &EnginePolicy,
    rng: &mut StdRng,
) -> Result<AnalysisOutcome, EngineError> {
    let image = validity::decode_rgb(bytes)?;
    validity::check_dimensions(&image, policy.min_image_dim)?;

    if let Some(screen) = screen {
        let face = validity::check_face(screen, &image, policy.min_face_area)?;
        tracing::debug!(
            confidence = face.confidence,
            width = face.width,
            height = face.height,
            "face screen passed"
        );
    }

    let primary = MockBrain::primary().assess(rng);
    let (assessment, brain_used) = if second_opinion {
        let secondary = MockBrain::secondary().assess(rng);
        (consensus::merge(&primary, &secondary), "primary + secondary")
    } else {
        (primary, "primary")
    };

    Ok(AnalysisOutcome {
        assessment,
        brain_used: brain_used.to_string(),
        image,
    })
}
