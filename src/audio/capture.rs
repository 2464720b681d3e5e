use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::fft::FftEngine;
use super::frame::FrameAssembler;
use super::source::AudioSource;
use super::spectrum::SpectrumPublisher;
use crate::error::AnalysisError;

/// Pause between failed cycles once the error run reaches the limit
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Why the capture thread stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EndReason {
    /// Shutdown was requested
    #[default]
    Stopped,
    /// The source ended cleanly on a frame boundary
    EndOfStream,
    /// The source ended part way through a frame
    Incomplete,
    /// The capture thread panicked
    Panicked,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EndReason::Stopped => "stopped",
            EndReason::EndOfStream => "end of stream",
            EndReason::Incomplete => "incomplete frame at end of stream",
            EndReason::Panicked => "capture thread panicked",
        };
        f.write_str(text)
    }
}

/// Counters reported when the capture thread exits
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    pub frames: u64,
    pub short_reads: u64,
    /// Cycles that failed and were skipped
    pub recovered_errors: u64,
    pub end_reason: EndReason,
    /// Transform + publish time
    pub total_compute: Duration,
    pub min_compute: Option<Duration>,
    pub max_compute: Duration,
}

impl CaptureStats {
    pub fn average_compute(&self) -> Duration {
        if self.frames == 0 {
            Duration::ZERO
        } else {
            match u32::try_from(self.frames) {
                Ok(frames) => self.total_compute / frames,
                Err(_) => self.total_compute.div_f64(self.frames as f64),
            }
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.frames += 1;
        self.total_compute += elapsed;
        self.min_compute = Some(self.min_compute.map_or(elapsed, |m| m.min(elapsed)));
        self.max_compute = self.max_compute.max(elapsed);
    }

    fn log(&self) {
        info!(
            "Capture ended ({}): {} frames, {} short reads, {} skipped",
            self.end_reason, self.frames, self.short_reads, self.recovered_errors
        );
        if self.frames > 0 {
            info!(
                "Compute per frame: avg {:?}, min {:?}, max {:?}",
                self.average_compute(),
                self.min_compute.unwrap_or_default(),
                self.max_compute
            );
        }
    }
}

/// One analysis cycle after another: read a frame, transform it, publish it.
pub struct CaptureLoop {
    source: Box<dyn AudioSource>,
    assembler: FrameAssembler,
    engine: FftEngine,
    publisher: SpectrumPublisher,
    max_consecutive_errors: u32,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn AudioSource>,
        assembler: FrameAssembler,
        engine: FftEngine,
        publisher: SpectrumPublisher,
    ) -> Self {
        Self {
            source,
            assembler,
            engine,
            publisher,
            max_consecutive_errors: 32,
        }
    }

    /// Start backing off after this many failed cycles in a row (minimum 1)
    pub fn with_max_consecutive_errors(mut self, limit: u32) -> Self {
        self.max_consecutive_errors = limit.max(1);
        self
    }

    /// Run until `stop_flag` is set or the source ends. The source is dropped on return.
    pub fn run(mut self, stop_flag: &AtomicBool) -> CaptureStats {
        info!(
            "Capture started: {} (FFT size {}, {:?})",
            self.source.describe(),
            self.engine.size(),
            self.engine.algorithm()
        );

        let mut stats = CaptureStats::default();
        let mut consecutive_errors = 0u32;

        stats.end_reason = loop {
            if stop_flag.load(Ordering::Relaxed) {
                debug!("Stop flag set, ending capture loop");
                break EndReason::Stopped;
            }

            match self.cycle(&mut stats) {
                Ok(true) => consecutive_errors = 0,
                Ok(false) => {
                    debug!("Source ended on a frame boundary");
                    break EndReason::EndOfStream;
                }
                Err(e @ AnalysisError::IncompleteCapture { .. }) => {
                    warn!("{}", e);
                    break EndReason::Incomplete;
                }
                Err(e) => {
                    stats.recovered_errors += 1;
                    consecutive_errors = consecutive_errors.saturating_add(1);

                    if consecutive_errors < self.max_consecutive_errors {
                        warn!("Skipping frame: {}", e);
                    } else {
                        if consecutive_errors == self.max_consecutive_errors {
                            error!(
                                "{} consecutive failures on {}, retrying every {:?}",
                                consecutive_errors,
                                self.source.describe(),
                                ERROR_BACKOFF
                            );
                        }
                        debug!("Skipping frame: {}", e);
                        thread::sleep(ERROR_BACKOFF);
                    }
                }
            }
        };

        stats.short_reads = self.assembler.short_reads();
        stats.log();
        stats
    }

    /// Returns `Ok(false)` at end of stream
    fn cycle(&mut self, stats: &mut CaptureStats) -> Result<bool, AnalysisError> {
        let frame = match self.assembler.next_frame(self.source.as_mut())? {
            Some(frame) => frame,
            None => return Ok(false),
        };

        let started = Instant::now();
        let transformed = self.engine.transform(frame)?;
        self.publisher.publish(&transformed);
        stats.record(started.elapsed());

        Ok(true)
    }
}

/// Handle to the running capture thread.
pub struct Capture {
    thread: Option<thread::JoinHandle<CaptureStats>>,
    stop_flag: Arc<AtomicBool>,
}

impl Drop for Capture {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

impl Capture {
    /// Spawn the capture thread
    pub fn start(capture_loop: CaptureLoop) -> Result<Self, AnalysisError> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = stop_flag.clone();

        let thread = thread::Builder::new()
            .name("fftscope-capture".into())
            .spawn(move || capture_loop.run(&stop_flag_clone))
            .map_err(AnalysisError::ThreadSpawn)?;

        Ok(Self {
            thread: Some(thread),
            stop_flag,
        })
    }

    /// Ask the thread to stop after the current cycle
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Whether the thread has exited (source ended, gave up, or was stopped)
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Request a stop and wait for the thread to exit
    pub fn stop(self) -> CaptureStats {
        self.request_stop();
        self.join()
    }

    /// Wait for the thread to exit on its own
    pub fn join(mut self) -> CaptureStats {
        Self::join_handle(self.thread.take())
    }

    /// Request a stop and wait up to `timeout` for the thread to exit.
    ///
    /// Returns `None` if the thread is still blocked in a source read; it is
    /// left detached and will exit after that read returns.
    pub fn shutdown(mut self, timeout: Duration) -> Option<CaptureStats> {
        self.request_stop();

        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                warn!("Capture thread still blocked on read after {:?}, detaching", timeout);
                return None;
            }
            thread::sleep(Duration::from_millis(5));
        }

        Some(Self::join_handle(self.thread.take()))
    }

    fn join_handle(handle: Option<thread::JoinHandle<CaptureStats>>) -> CaptureStats {
        match handle.map(|h| h.join()) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                error!("Capture thread panicked");
                CaptureStats {
                    end_reason: EndReason::Panicked,
                    ..Default::default()
                }
            }
            None => CaptureStats::default(),
        }
    }
}
