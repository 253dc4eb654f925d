//! The conversion task: one cancellable background run at a time, observed
//! through a `watch` channel and reported through an event channel.
//!
//! State is only written under the `watch` sender's lock. Each run "settles"
//! exactly once, either by its worker (Completed/Failed) or by its handle
//! (Cancelled); whichever comes second is ignored.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        watch,
    },
};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::converter::ExternalConverter;
use crate::error::{ConversionError, StartError};
use crate::model::{AUDIO_EXTENSION, ConversionEvent, ConversionRequest, ConversionState};
use crate::output::find_latest_output;

/// Bookkeeping shared between a worker and its [`TaskHandle`].
struct Run {
    id: Uuid,
    cancel: watch::Sender<bool>,
    settled: AtomicBool,
    running: AtomicBool,
    events: UnboundedSender<ConversionEvent>,
}

impl Run {
    fn new(events: UnboundedSender<ConversionEvent>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            cancel,
            settled: AtomicBool::new(false),
            running: AtomicBool::new(true),
            events,
        }
    }

    fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    /// Marks the run settled; true only for the first caller.
    fn settle(&self) -> bool {
        !self.settled.swap(true, Ordering::AcqRel)
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    async fn cancelled(&self) {
        let mut rx = self.cancel.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Clears the running indicator. Emits the event at most once per run.
    fn finalize(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!(run = %self.id, "running indicator cleared");
            self.emit(ConversionEvent::RunningChanged(false));
        }
    }

    fn emit(&self, event: ConversionEvent) {
        let _ = self.events.send(event);
    }
}

/// Cancellable reference to an in-flight conversion.
#[derive(Clone)]
pub struct TaskHandle {
    run: Arc<Run>,
    state_tx: watch::Sender<ConversionState>,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.run.id
    }

    /// Requests cancellation. The state becomes `Cancelled` right away; the
    /// worker stops at its next await and the child process is killed when
    /// its future is dropped. Returns false if the run had already finished.
    pub fn cancel(&self) -> bool {
        let run = &self.run;
        let cancelled = self.state_tx.send_if_modified(|state| {
            if !state.is_running() || !run.settle() {
                return false;
            }
            run.cancel.send_replace(true);
            *state = ConversionState::Cancelled;
            true
        });

        if cancelled {
            info!(run = %run.id, "conversion cancelled");
            run.emit(ConversionEvent::Cancelled);
            run.finalize();
        } else {
            debug!(run = %run.id, "cancel ignored, run already settled");
        }
        cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.run.is_settled()
    }
}

/// Owns the conversion state and starts runs against one converter.
pub struct ConversionController {
    converter: Arc<dyn ExternalConverter>,
    runtime: Handle,
    state_tx: watch::Sender<ConversionState>,
    events_tx: UnboundedSender<ConversionEvent>,
}

impl ConversionController {
    /// Creates the controller in `Idle` plus the receiving end of its
    /// notifications.
    pub fn new(
        converter: Arc<dyn ExternalConverter>,
        runtime: Handle,
    ) -> (Self, UnboundedReceiver<ConversionEvent>) {
        let (state_tx, _) = watch::channel(ConversionState::Idle);
        let (events_tx, events_rx) = unbounded_channel();
        let controller = Self {
            converter,
            runtime,
            state_tx,
            events_tx,
        };
        (controller, events_rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ConversionState {
        self.state_tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state_tx.borrow().is_running()
    }

    pub fn output_file(&self) -> Option<PathBuf> {
        self.state_tx.borrow().output_file().map(PathBuf::from)
    }

    /// Moves `Idle` to `Running(0.0)` and spawns the worker. Requests with an
    /// empty URL, and any call made outside `Idle`, leave the state alone.
    pub fn start(&self, request: ConversionRequest) -> Result<TaskHandle, StartError> {
        if !request.has_source() {
            debug!("ignoring start with empty source URL");
            return Err(StartError::EmptyInput);
        }

        let mut refused = None;
        self.state_tx.send_if_modified(|state| match state {
            ConversionState::Idle => {
                *state = ConversionState::Running(0.0);
                true
            }
            ConversionState::Running(_) => {
                refused = Some(StartError::Busy);
                false
            }
            _ => {
                refused = Some(StartError::NotReset);
                false
            }
        });
        if let Some(err) = refused {
            warn!(%err, "start refused");
            return Err(err);
        }

        let run = Arc::new(Run::new(self.events_tx.clone()));
        info!(run = %run.id, url = request.source_url(), "conversion started");
        run.emit(ConversionEvent::Started {
            url: request.source_url().to_owned(),
        });
        run.emit(ConversionEvent::RunningChanged(true));

        let worker = Worker {
            converter: Arc::clone(&self.converter),
            state_tx: self.state_tx.clone(),
            run: Arc::clone(&run),
            request,
        };
        let span = info_span!("conversion", run = %run.id, converter = self.converter.name());
        self.runtime.spawn(worker.run().instrument(span));

        Ok(TaskHandle {
            run,
            state_tx: self.state_tx.clone(),
        })
    }

    /// Resets a `Failed` or `Cancelled` run and starts `request`. A
    /// `Completed` result still needs an explicit [`reset`](Self::reset).
    pub fn retry(&self, request: ConversionRequest) -> Result<TaskHandle, StartError> {
        if matches!(
            *self.state_tx.borrow(),
            ConversionState::Failed(_) | ConversionState::Cancelled
        ) {
            self.reset();
        }
        self.start(request)
    }

    /// Returns a terminal state to `Idle`, dropping the recorded output file.
    pub fn reset(&self) -> bool {
        let reset = self.state_tx.send_if_modified(|state| {
            if state.is_terminal() {
                *state = ConversionState::Idle;
                true
            } else {
                false
            }
        });
        if reset {
            info!("conversion state reset");
        }
        reset
    }
}

struct Worker {
    converter: Arc<dyn ExternalConverter>,
    state_tx: watch::Sender<ConversionState>,
    run: Arc<Run>,
    request: ConversionRequest,
}

impl Worker {
    async fn run(self) {
        let (progress_tx, mut progress_rx) = unbounded_channel();
        let work = self.execute(progress_tx);
        tokio::pin!(work);

        let outcome = loop {
            tokio::select! {
                _ = self.run.cancelled() => break None,
                Some(fraction) = progress_rx.recv() => self.report_progress(fraction),
                result = &mut work => break Some(result),
            }
        };

        match outcome {
            None => debug!("worker stopped after cancellation"),
            Some(Ok(path)) => {
                info!(output = %path.display(), "conversion completed");
                self.settle(
                    ConversionState::Completed(path.clone()),
                    ConversionEvent::Completed(path),
                );
            }
            Some(Err(err)) => {
                let message = err.to_string();
                warn!(error = %message, "conversion failed");
                self.settle(
                    ConversionState::Failed(message.clone()),
                    ConversionEvent::Failed(message),
                );
            }
        }

        self.run.finalize();
    }

    async fn execute(&self, progress_tx: UnboundedSender<f32>) -> Result<PathBuf, ConversionError> {
        let dir = self.request.output_directory().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ConversionError::OutputDirectory { path: dir.clone(), source })?;

        self.converter.convert(&self.request, progress_tx).await?;

        let scan_dir = dir.clone();
        let found = tokio::task::spawn_blocking(move || find_latest_output(&scan_dir, AUDIO_EXTENSION))
            .await
            .map_err(|join| ConversionError::Scan {
                path: dir.clone(),
                source: std::io::Error::other(join),
            })?
            .map_err(|source| ConversionError::Scan { path: dir.clone(), source })?;

        found.ok_or(ConversionError::OutputNotFound)
    }

    fn report_progress(&self, fraction: f32) {
        let run = &self.run;
        self.state_tx.send_if_modified(|state| match state {
            ConversionState::Running(current) if !run.is_settled() && fraction > *current => {
                *current = fraction;
                true
            }
            _ => false,
        });
    }

    fn settle(&self, next: ConversionState, event: ConversionEvent) {
        let run = &self.run;
        let applied = self.state_tx.send_if_modified(|state| {
            if run.is_cancelled() || !state.is_running() || !run.settle() {
                return false;
            }
            *state = next;
            true
        });

        if applied {
            run.emit(event);
        } else {
            debug!("outcome dropped, run already settled");
        }
    }
}
