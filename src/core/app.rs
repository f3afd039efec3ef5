use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbaImage;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use crate::catalog::{Catalog, MouserCatalog};
use crate::channel::WorkerChannel;
use crate::config::StationConfig;
use crate::core::input;
use crate::domain::SymbologySet;
use crate::protocol::{ProtocolError, WorkerCommand, WorkerResponse};
use crate::render::{self, DisplayFields, HeadlessSink, OverlayStyle, RenderSink};
use crate::session::{InputEvent, SelectionArbiter, ViewportMapper};

/// Snapshot of the operator settings carried by every scan command
#[derive(Clone, Debug, PartialEq)]
pub struct ScanSettings {
    pub source_selector: String,
    pub enabled: SymbologySet,
}

/// What the worker pump reports back to the session loop
#[derive(Debug)]
pub enum WorkerEvent {
    Response(WorkerResponse),
    /// Fatal; the pump has already stopped the worker
    Failed(ProtocolError),
}

/// Run the interactive front end until quit or a fatal channel error
pub(crate) fn run(config: StationConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;
    runtime.block_on(run_session(config))
}

async fn run_session(config: StationConfig) -> Result<()> {
    let catalog = MouserCatalog::new(
        config.api_key.clone(),
        config.catalog_url.clone(),
        config.catalog_timeout(),
    )
    .context("Failed to create catalog client")?;
    let channel = WorkerChannel::spawn(config.worker_timeout())?;
    let sink = HeadlessSink::new(config.preview_path.clone());
    log::info!("Writing preview to {}", config.preview_path.display());

    let (input_tx, input_rx) = mpsc::channel(32);
    input::spawn_stdin_reader(input_tx);

    Station::new(config, Arc::new(catalog), Box::new(sink))
        .run(channel, input_rx)
        .await
}

/// Front-end state: owned by the session loop, never shared
pub struct Station {
    config: StationConfig,
    arbiter: SelectionArbiter,
    sink: Box<dyn RenderSink>,
    settings: ScanSettings,
    style: OverlayStyle,
    frame: Option<RgbaImage>,
    composited: Option<RgbaImage>,
}

impl Station {
    pub fn new(config: StationConfig, catalog: Arc<dyn Catalog>, sink: Box<dyn RenderSink>) -> Self {
        let settings = ScanSettings {
            source_selector: config.source_selector.clone(),
            enabled: config.enabled,
        };
        let style = OverlayStyle {
            colors: config.colors,
            thickness: config.stroke_thickness,
        };
        Self {
            config,
            arbiter: SelectionArbiter::new(catalog),
            sink,
            settings,
            style,
            frame: None,
            composited: None,
        }
    }

    fn display_size(&self) -> (u32, u32) {
        (self.config.display_width, self.config.display_height)
    }

    /// Drive the session until quit, ctrl-c or a fatal error
    pub async fn run(
        self,
        channel: WorkerChannel,
        inputs: mpsc::Receiver<InputEvent>,
    ) -> Result<()> {
        self.run_until(channel, inputs, tokio::signal::ctrl_c()).await
    }

    /// Drive the session until quit, `interrupt` resolving or a fatal error.
    ///
    /// The worker is always told to terminate (or signalled after a fatal
    /// error) and joined before this returns.
    pub async fn run_until<F: Future>(
        mut self,
        channel: WorkerChannel,
        mut inputs: mpsc::Receiver<InputEvent>,
        interrupt: F,
    ) -> Result<()> {
        let (settings_tx, settings_rx) = watch::channel(self.settings.clone());
        let (event_tx, mut events) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel();
        let pump = tokio::spawn(pump(
            channel,
            settings_rx,
            self.config.frame_interval(),
            event_tx,
            stop_rx,
        ));

        tokio::pin!(interrupt);

        let mut failure = None;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(WorkerEvent::Response(response)) => self.on_response(response),
                    Some(WorkerEvent::Failed(err)) => {
                        log::error!("Worker channel failed, shutting down: {}", err);
                        failure = Some(err);
                        break;
                    }
                    None => break,
                },
                Some(event) = inputs.recv() => {
                    if event == InputEvent::Quit {
                        log::info!("Quit requested");
                        break;
                    }
                    self.on_input(event, &settings_tx);
                }
                record = self.arbiter.lookup_finished() => {
                    self.arbiter.complete_lookup(record);
                    self.present();
                }
                _ = &mut interrupt => {
                    log::info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        self.arbiter.terminate();
        // Unblocks a pump waiting to hand over a frame
        drop(events);
        let _ = stop_tx.send(());
        pump.await.context("Worker pump task failed")??;

        match failure {
            Some(err) => Err(anyhow::Error::new(err).context("Session ended by worker channel failure")),
            None => Ok(()),
        }
    }

    fn on_response(&mut self, response: WorkerResponse) {
        let WorkerResponse { frame, codes } = response;
        if let Some(err) = &frame.error {
            log::debug!("Showing placeholder frame: {}", err);
        }
        let (dw, dh) = self.display_size();
        let viewport = ViewportMapper::fit(frame.width(), frame.height(), dw, dh);
        self.arbiter.on_frame(viewport, codes);
        self.frame = Some(frame.rgba);
        self.present();
    }

    fn on_input(&mut self, event: InputEvent, settings_tx: &watch::Sender<ScanSettings>) {
        match event {
            InputEvent::PointerMoved(x, y) => self.arbiter.on_pointer_moved(x, y),
            InputEvent::PointerLeft => self.arbiter.on_pointer_left(),
            InputEvent::Click(x, y) => self.arbiter.on_click(x, y),
            InputEvent::Toggle(symbology) => {
                let enabled = self.settings.enabled.toggle(symbology);
                log::info!(
                    "{} scanning {}",
                    symbology,
                    if enabled { "enabled" } else { "disabled" }
                );
                settings_tx.send_replace(self.settings.clone());
                return;
            }
            InputEvent::Source(selector) => {
                log::info!("Switching source to {}", selector);
                self.settings.source_selector = selector;
                settings_tx.send_replace(self.settings.clone());
                return;
            }
            InputEvent::Save => {
                self.save_snapshot();
                return;
            }
            InputEvent::Quit => return,
        }
        self.present();
    }

    /// Composite the latest frame and hand it to the sink
    fn present(&mut self) {
        let Some(frame) = &self.frame else {
            return;
        };
        let canvas = render::compose(frame, &self.arbiter, self.display_size(), &self.style);
        let fields = DisplayFields::from_session(&self.arbiter);
        if let Err(e) = self.sink.present(&canvas, &fields) {
            log::warn!("Failed to present frame: {:?}", e);
        }
        self.composited = Some(canvas);
    }

    fn save_snapshot(&self) {
        let Some(canvas) = &self.composited else {
            log::warn!("Nothing to save yet");
            return;
        };
        match render::snapshot::save_snapshot(canvas, &self.config.snapshot_dir()) {
            Ok(path) => log::info!("Saved snapshot to {}", path.display()),
            Err(e) => log::error!("Failed to save snapshot: {:?}", e),
        }
    }
}

/// Issue one scan command per tick and forward each response.
///
/// A request is never abandoned halfway: stop is only honoured between
/// requests, and the channel is then shut down cleanly.
async fn pump(
    mut channel: WorkerChannel,
    settings: watch::Receiver<ScanSettings>,
    interval: Duration,
    events: mpsc::Sender<WorkerEvent>,
    mut stop: oneshot::Receiver<()>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {}
        }

        let command = {
            let settings = settings.borrow();
            WorkerCommand::scan(settings.source_selector.clone(), settings.enabled)
        };
        match channel.request(&command).await {
            Ok(response) => {
                if events.send(WorkerEvent::Response(response)).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = events.send(WorkerEvent::Failed(err)).await;
                channel.abort().await?;
                return Ok(());
            }
        }
    }

    log::info!("Stopping capture worker");
    channel.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::scanner::{MatrixDecoder, MatrixHit, MatrixRect};
    use crate::capture::{Frame, FrameSource, ScanDispatcher};
    use crate::catalog::PartRecord;
    use crate::domain::Symbology;
    use crate::protocol::write_message;
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use std::os::unix::net::UnixStream as StdUnixStream;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::JoinHandle;

    const PAYLOAD: &[u8] = b"[)>\x1e06\x1d1P123\x1e\x04";

    struct Bench;

    impl FrameSource for Bench {
        fn get_frame(&mut self, selector: &str) -> Frame {
            match selector {
                "bench" => Frame::new(RgbaImage::new(320, 180)),
                other => Frame::placeholder(format!("no source '{other}'")),
            }
        }
    }

    struct OneMatrix;

    impl MatrixDecoder for OneMatrix {
        fn decode(&self, _frame: &RgbaImage) -> anyhow::Result<Vec<MatrixHit>> {
            Ok(vec![MatrixHit {
                payload: PAYLOAD.to_vec(),
                rect: MatrixRect {
                    left: 20,
                    top: 100,
                    width: 40,
                    height: 40,
                },
            }])
        }
    }

    struct CountingCatalog {
        calls: AtomicUsize,
    }

    impl Catalog for CountingCatalog {
        fn lookup(&self, payload: Vec<u8>) -> BoxFuture<'static, Option<PartRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            async move {
                payload.starts_with(b"[)>").then(|| PartRecord {
                    description: "Op amp".into(),
                    in_stock: 3,
                    min_qty: 1,
                    qty_multiples: 1,
                    manufacturer: "TI".into(),
                    manufacturer_part_number: "LM358".into(),
                    supplier_part_number: "123".into(),
                    currency: "EUR".into(),
                    price_breaks: Vec::new(),
                    packaging_options: Vec::new(),
                    details_url: String::new(),
                    image_url: String::new(),
                    image: None,
                })
            }
            .boxed()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        fields: Arc<Mutex<Vec<DisplayFields>>>,
    }

    impl RenderSink for RecordingSink {
        fn present(&mut self, frame: &RgbaImage, fields: &DisplayFields) -> Result<()> {
            assert_eq!(frame.dimensions(), (640, 360));
            self.fields.lock().unwrap().push(fields.clone());
            Ok(())
        }
    }

    fn test_config() -> StationConfig {
        StationConfig {
            source_selector: "bench".to_string(),
            frame_interval_ms: 5,
            worker_timeout_ms: 2_000,
            ..Default::default()
        }
    }

    fn worker_thread() -> (WorkerChannel, JoinHandle<crate::protocol::Result<()>>) {
        let (front, worker) = StdUnixStream::pair().unwrap();
        let handle = std::thread::spawn(move || -> crate::protocol::Result<()> {
            let mut reader = worker.try_clone()?;
            let mut writer = worker;
            let dispatcher = ScanDispatcher::new().with_matrix_decoder(OneMatrix);
            crate::worker::run(&mut reader, &mut writer, &mut Bench, &dispatcher)
        });
        let channel = WorkerChannel::from_stream(front, Duration::from_secs(2)).unwrap();
        (channel, handle)
    }

    async fn wait_for(sink: &RecordingSink, check: impl Fn(&[DisplayFields]) -> bool) {
        for _ in 0..400 {
            if check(&sink.fields.lock().unwrap()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition never reached");
    }

    #[tokio::test]
    async fn test_session_looks_up_scanned_code_once() {
        let (channel, worker) = worker_thread();
        let catalog = Arc::new(CountingCatalog {
            calls: AtomicUsize::new(0),
        });
        let sink = RecordingSink::default();
        let station = Station::new(test_config(), catalog.clone(), Box::new(sink.clone()));
        let (tx, rx) = mpsc::channel(8);

        let driver = async {
            wait_for(&sink, |all| all.iter().any(|f| f.status == "Found")).await;
            // Several more frames of the same code
            let frames = sink.fields.lock().unwrap().len();
            wait_for(&sink, |all| all.len() > frames + 3).await;
            tx.send(InputEvent::Quit).await.unwrap();
        };
        let (result, ()) = tokio::join!(station.run(channel, rx), driver);

        result.unwrap();
        assert!(worker.join().unwrap().is_ok());
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        let fields = sink.fields.lock().unwrap();
        let found = fields.iter().find(|f| f.status == "Found").unwrap();
        assert_eq!(found.supplier_part_number, "123");
        assert_eq!(found.mode, "Auto");
    }

    #[tokio::test]
    async fn test_disabled_symbology_reaches_worker() {
        let (channel, worker) = worker_thread();
        let catalog = Arc::new(CountingCatalog {
            calls: AtomicUsize::new(0),
        });
        let sink = RecordingSink::default();
        let mut config = test_config();
        config.enabled.set(Symbology::Datamatrix2D, false);
        let station = Station::new(config, catalog.clone(), Box::new(sink.clone()));
        let (tx, rx) = mpsc::channel(8);

        let driver = async {
            wait_for(&sink, |all| all.len() > 2).await;
            tx.send(InputEvent::Quit).await.unwrap();
        };
        let (result, ()) = tokio::join!(station.run(channel, rx), driver);

        result.unwrap();
        assert!(worker.join().unwrap().is_ok());
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
        assert!(sink.fields.lock().unwrap().iter().all(|f| f.status == "Waiting for a code"));
    }

    #[tokio::test]
    async fn test_protocol_violation_ends_session() {
        let (front, mut worker) = StdUnixStream::pair().unwrap();
        let channel = WorkerChannel::from_stream(front, Duration::from_secs(2)).unwrap();
        let peer = std::thread::spawn(move || {
            // Answer the first command with a command
            let mut buf = [0u8; 1];
            std::io::Read::read(&mut worker, &mut buf).unwrap();
            write_message(&mut worker, &WorkerCommand::terminate().encode().unwrap()).unwrap();
            worker
        });

        let station = Station::new(
            test_config(),
            Arc::new(CountingCatalog {
                calls: AtomicUsize::new(0),
            }),
            Box::new(RecordingSink::default()),
        );
        let (_tx, rx) = mpsc::channel(8);
        let err = station.run(channel, rx).await.unwrap_err();
        drop(peer.join().unwrap());

        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::UnexpectedMessage { .. })
        ));
    }

    #[tokio::test]
    async fn test_interrupt_stops_session_and_worker() {
        let (channel, worker) = worker_thread();
        let sink = RecordingSink::default();
        let station = Station::new(
            test_config(),
            Arc::new(CountingCatalog {
                calls: AtomicUsize::new(0),
            }),
            Box::new(sink.clone()),
        );
        let (_tx, rx) = mpsc::channel(8);
        let (interrupt_tx, interrupt_rx) = oneshot::channel::<()>();

        let driver = async {
            wait_for(&sink, |all| all.len() > 5).await;
            interrupt_tx.send(()).unwrap();
        };
        let (result, ()) = tokio::join!(station.run_until(channel, rx, interrupt_rx), driver);

        result.unwrap();
        // Terminate reached the worker, so its loop returned cleanly
        assert!(worker.join().unwrap().is_ok());
    }
}
