//! The analyzer engine thread.
//!
//! OpenCV sessions are stateful and must not be shared across request
//! handlers, so they live on one dedicated OS thread. Handlers talk to it
//! through a bounded request channel with oneshot replies.

use likeness_core::{AnalyzerError, FaceAnalyzer, FaceSample};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Extract {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<FaceSample, AnalyzerError>>,
    },
    Ping {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Detect the best face in an encoded image and extract its embedding.
    pub async fn extract(&self, image: Vec<u8>) -> Result<FaceSample, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Extract {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    /// Round-trip liveness probe used by the health endpoint.
    pub async fn ping(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Ping { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The models load on that thread; this function blocks until loading has
/// succeeded or failed, so a missing model aborts startup.
pub fn spawn_engine(
    detector_model: String,
    recognizer_model: String,
    detection_threshold: f32,
) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), AnalyzerError>>();

    std::thread::Builder::new()
        .name("likeness-engine".into())
        .spawn(move || {
            let mut analyzer =
                match FaceAnalyzer::load(&detector_model, &recognizer_model, detection_threshold) {
                    Ok(analyzer) => {
                        let _ = ready_tx.send(Ok(()));
                        analyzer
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Extract { image, reply } => {
                        let _ = reply.send(analyzer.analyze(&image));
                    }
                    EngineRequest::Ping { reply } => {
                        let _ = reply.send(());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    ready_rx.recv().map_err(|_| EngineError::ChannelClosed)??;
    Ok(EngineHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_fails_fast_for_missing_models() {
        let err = spawn_engine(
            "/nonexistent/yunet.onnx".into(),
            "/nonexistent/sface.onnx".into(),
            0.9,
        )
        .err()
        .expect("spawn should fail without model files");
        assert!(matches!(
            err,
            EngineError::Analyzer(AnalyzerError::ModelNotFound(_))
        ));
    }
}
