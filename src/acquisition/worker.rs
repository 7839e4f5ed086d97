//! Acquisition thread: sensor -> filter pipeline -> consumer channels.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use super::channels::{ControlReceivers, WorkerCommand};
use crate::calibration::Mode;
use crate::filter::{FilterConfig, FilterOutput, FilteredFrame, FrameFilterPipeline, GradientField};
use crate::sensor::{ColorFrame, DepthIntrinsics, DepthSensor, SensorError};
use crate::telemetry::{AcquisitionStats, FrameProfiler};

/// Errors buffered before the consumer picks them up.
const ERROR_CAPACITY: usize = 4;

/// Closes the sensor when the worker loop ends, however it ends.
struct SensorGuard<S: DepthSensor>(S);

impl<S: DepthSensor> Deref for SensorGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.0
    }
}

impl<S: DepthSensor> DerefMut for SensorGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.0
    }
}

impl<S: DepthSensor> Drop for SensorGuard<S> {
    fn drop(&mut self) {
        self.0.close();
        log::info!("Depth sensor released");
    }
}

/// State moved onto the worker thread.
struct WorkerContext {
    pipeline: FrameFilterPipeline,
    control: ControlReceivers,
    filtered_tx: Sender<FilteredFrame>,
    color_tx: Sender<ColorFrame>,
    gradient_tx: Sender<GradientField>,
    error_tx: Sender<SensorError>,
    running: Arc<AtomicBool>,
    frames_in_flight: Arc<Mutex<i64>>,
    stats: Arc<Mutex<AcquisitionStats>>,
    profiler: FrameProfiler,
    mode: Mode,
}

/// Background acquisition worker.
///
/// Owns the sensor and the filter pipeline on a dedicated thread. Outputs are
/// offered on single-slot channels with `try_send`; an output the consumer has
/// not drained yet is dropped and counted.
pub struct AcquisitionWorker {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    filtered_rx: Receiver<FilteredFrame>,
    color_rx: Receiver<ColorFrame>,
    gradient_rx: Receiver<GradientField>,
    error_rx: Receiver<SensorError>,
    frames_in_flight: Arc<Mutex<i64>>,
    stats: Arc<Mutex<AcquisitionStats>>,
    width: u32,
    height: u32,
    intrinsics: DepthIntrinsics,
}

impl AcquisitionWorker {
    /// Start the acquisition thread for `sensor`.
    pub fn spawn<S>(sensor: S, config: FilterConfig, control: ControlReceivers) -> std::io::Result<Self>
    where
        S: DepthSensor + 'static,
    {
        let (width, height) = sensor.size();
        let intrinsics = sensor.intrinsics();

        let (filtered_tx, filtered_rx) = bounded(1);
        let (color_tx, color_rx) = bounded(1);
        let (gradient_tx, gradient_rx) = bounded(1);
        let (error_tx, error_rx) = bounded(ERROR_CAPACITY);

        let running = Arc::new(AtomicBool::new(true));
        let frames_in_flight = Arc::new(Mutex::new(0i64));
        let pipeline = FrameFilterPipeline::new(width, height, config);
        let stats = Arc::new(Mutex::new(AcquisitionStats {
            roi: Some(pipeline.roi()),
            ..Default::default()
        }));

        let context = WorkerContext {
            pipeline,
            control,
            filtered_tx,
            color_tx,
            gradient_tx,
            error_tx,
            running: Arc::clone(&running),
            frames_in_flight: Arc::clone(&frames_in_flight),
            stats: Arc::clone(&stats),
            profiler: FrameProfiler::new(),
            mode: Mode::default(),
        };

        let thread_handle = std::thread::Builder::new()
            .name("depth-acquisition".to_string())
            .spawn(move || context.run(SensorGuard(sensor)))?;

        log::info!("Acquisition worker started ({}x{})", width, height);

        Ok(Self {
            running,
            thread_handle: Some(thread_handle),
            filtered_rx,
            color_rx,
            gradient_rx,
            error_rx,
            frames_in_flight,
            stats,
            width,
            height,
            intrinsics,
        })
    }

    pub fn try_receive_filtered(&self) -> Option<FilteredFrame> {
        self.filtered_rx.try_recv().ok()
    }

    pub fn try_receive_color(&self) -> Option<ColorFrame> {
        self.color_rx.try_recv().ok()
    }

    pub fn try_receive_gradient(&self) -> Option<GradientField> {
        self.gradient_rx.try_recv().ok()
    }

    pub fn try_receive_error(&self) -> Option<SensorError> {
        self.error_rx.try_recv().ok()
    }

    /// Consumer finished with one delivered filtered frame.
    pub fn frame_done(&self) {
        let mut in_flight = self.frames_in_flight.lock();
        *in_flight -= 1;
    }

    pub fn frames_in_flight(&self) -> i64 {
        *self.frames_in_flight.lock()
    }

    /// Snapshot of the worker's counters.
    pub fn stats(&self) -> AcquisitionStats {
        let mut stats = self.stats.lock().clone();
        stats.frames_in_flight = self.frames_in_flight();
        stats
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn intrinsics(&self) -> DepthIntrinsics {
        self.intrinsics
    }

    /// Whether the thread is still acquiring.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.thread_handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Stop acquiring and wait for the thread to release the sensor.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Acquisition thread panicked");
            }
        }
    }
}

impl Drop for AcquisitionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl WorkerContext {
    fn run<S: DepthSensor>(mut self, mut sensor: SensorGuard<S>) {
        log::info!("Acquisition thread running");

        while self.running.load(Ordering::Acquire) {
            let raw = match sensor.next_depth_frame() {
                Ok(raw) => raw,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            };

            let start = self.profiler.begin_frame();
            let color = sensor.color_frame();
            let output = match self.pipeline.process_frame(&raw, color) {
                Ok(output) => output,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            };
            self.profiler.end_frame(start);

            let published = self.publish(output);
            self.apply_control();
            self.update_stats(published);
        }

        self.running.store(false, Ordering::Release);
        log::info!("Acquisition thread stopped");
    }

    fn fail(&self, error: SensorError) {
        log::error!("Depth acquisition failed: {}", error);
        if self.error_tx.try_send(error).is_err() {
            log::warn!("Error channel full, acquisition error not delivered");
        }
    }

    /// Offer each output to the consumer. Returns whether the filtered frame went out.
    fn publish(&mut self, output: FilterOutput) -> bool {
        let FilterOutput {
            filtered,
            color,
            gradient,
        } = output;

        let published = match self.filtered_tx.try_send(filtered) {
            Ok(()) => {
                *self.frames_in_flight.lock() += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.stats.lock().dropped.filtered += 1;
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.running.store(false, Ordering::Release);
                false
            }
        };

        if let Some(color) = color {
            if let Err(TrySendError::Full(_)) = self.color_tx.try_send(color) {
                self.stats.lock().dropped.color += 1;
            }
        }
        if let Err(TrySendError::Full(_)) = self.gradient_tx.try_send(gradient) {
            self.stats.lock().dropped.gradient += 1;
        }

        published
    }

    /// Apply at most one pending update per control channel.
    fn apply_control(&mut self) {
        if let Ok(mode) = self.control.mode_rx.try_recv() {
            if mode != self.mode {
                log::info!("Worker mode: {} -> {}", self.mode, mode);
                self.mode = mode;
            }
        }

        if let Ok(roi) = self.control.roi_rx.try_recv() {
            let applied = self.pipeline.set_roi(roi);
            log::debug!("Worker applied ROI {} (requested {})", applied, roi);
        }

        if let Ok(command) = self.control.command_rx.try_recv() {
            match command {
                WorkerCommand::ResetBuffers => {
                    self.pipeline.reset_buffers();
                    log::info!("Filter buffers reset");
                }
                WorkerCommand::Reconfigure(config) => self.pipeline.reconfigure(config),
            }
        }
    }

    fn update_stats(&mut self, published: bool) {
        let mut stats = self.stats.lock();
        stats.frames_acquired += 1;
        if published {
            stats.frames_published += 1;
        }
        stats.processing = self.profiler.stats();
        stats.fps = self.profiler.fps();
        stats.mode = self.mode;
        stats.roi = Some(self.pipeline.roi());
        stats.first_image_ready = self.pipeline.first_image_ready();
    }
}
