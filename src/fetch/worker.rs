use crate::fetch::image_fetch::ImageFetcher;
use crate::render::dominant_color::{DominantColor, DominantColorPipeline};
use crate::render::palette::PaletteQuantizer;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccentRequest {
    /// Caller-chosen tag echoed back in the result.
    pub key: u64,
    pub locator: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccentResult {
    pub key: u64,
    pub locator: String,
    /// `None` means the caller should keep its default theme color.
    pub color: Option<DominantColor>,
}

/// Runs the pipeline on a dedicated thread.
///
/// With a non-zero `debounce`, a request followed by another one within that
/// window is dropped in favor of the newer one. The worker exits once every
/// request sender is gone.
pub fn start_dominant_color_worker<F, Q>(
    pipeline: DominantColorPipeline<F, Q>,
    debounce: Duration,
) -> (Sender<AccentRequest>, Receiver<AccentResult>)
where
    F: ImageFetcher + Send + 'static,
    Q: PaletteQuantizer + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<AccentRequest>();
    let (res_tx, res_rx) = mpsc::channel::<AccentResult>();

    std::thread::spawn(move || worker_loop(pipeline, debounce, rx, res_tx));
    (tx, res_rx)
}

fn worker_loop<F, Q>(
    pipeline: DominantColorPipeline<F, Q>,
    debounce: Duration,
    rx: Receiver<AccentRequest>,
    res_tx: Sender<AccentResult>,
) where
    F: ImageFetcher,
    Q: PaletteQuantizer,
{
    log::info!("dominant color worker started (debounce {debounce:?})");

    let mut disconnected = false;
    while !disconnected {
        let mut req = match rx.recv() {
            Ok(r) => r,
            Err(_) => break,
        };

        if !debounce.is_zero() {
            loop {
                match rx.recv_timeout(debounce) {
                    Ok(r) => {
                        log::debug!("request {} superseded by {}", req.key, r.key);
                        req = r;
                    }
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        let color = pipeline.resolve(&req.locator);
        let res = AccentResult {
            key: req.key,
            locator: req.locator,
            color,
        };
        if res_tx.send(res).is_err() {
            break;
        }
    }

    log::info!("dominant color worker stopped");
}
