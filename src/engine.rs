// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The long-running squaring driver.
//!
//! A [VdfEngine] owns one computation at a time: a discriminant, an initial
//! form and a target iteration count. Starting a computation spawns a single
//! worker thread which performs the sequential squarings, periodically
//! records checkpoints (with streaming Wesolowski proofs for each segment
//! when enabled), and publishes progress through atomics and callbacks. The
//! delay is sequential by construction; there is never more than one worker
//! per engine.
//!
//! Readers observe `current_iteration`, `phase` and `iterations_per_second`
//! through atomics. The checkpoint list, the final form and the callback
//! slots are guarded by a single mutex which the worker only holds while
//! appending a record or publishing the final form. Callbacks are always
//! invoked without the lock held, so they may call back into the engine,
//! but they run on the worker thread and must not block it.

use crate::class_group::{Discriminant, QuadraticForm, Reducer};
use crate::error::{VdfError, VdfResult};
use crate::vdf::wesolowski;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default number of iterations between two checkpoints.
pub const DEFAULT_SEGMENT_SIZE: u32 = 65536;

/// Number of squarings between two cheap bookkeeping points in the worker.
const BATCH_SIZE: u64 = 1000;

/// Engine configuration. `num_threads`, `proof_threads`, `fast_mode` and
/// `avx512` are tuning hints carried for API compatibility with deployments
/// that dispatch to accelerated backends; the core driver is single-worker
/// by design and only `logging` and `segment_size` change its behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub num_threads: u32,
    pub proof_threads: u32,
    pub fast_mode: bool,
    pub avx512: bool,
    pub logging: bool,
    /// Checkpoint interval in iterations. Zero disables checkpoints.
    pub segment_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let num_threads = thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(4);
        Self {
            num_threads,
            proof_threads: (num_threads / 2).max(1),
            fast_mode: true,
            avx512: false,
            logging: false,
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

/// The lifecycle of a computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Computing = 1,
    Completed = 2,
    Stopped = 3,
    Error = 4,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Computing,
            2 => Phase::Completed,
            3 => Phase::Stopped,
            4 => Phase::Error,
            _ => Phase::Idle,
        }
    }

    /// Terminal phases are absorbing until the next `start`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Stopped | Phase::Error)
    }
}

/// A snapshot of the computation state.
#[derive(Clone, Debug)]
pub struct EngineStatus {
    pub current_iteration: u64,
    pub target_iterations: u64,
    pub phase: Phase,
    pub progress_percentage: f64,
    pub iterations_per_second: u64,
    pub elapsed: Duration,
    pub has_proof_ready: bool,
}

/// A recorded checkpoint: the form reached at `iteration` and, when
/// streaming proofs are enabled, the serialized segment proof covering the
/// distance from the previous checkpoint. The record at iteration 0 carries
/// the sentinel blob and no proof body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub iteration: u64,
    pub form: QuadraticForm,
    pub proof: Option<Vec<u8>>,
}

/// The big-endian bytes of a result form, one vector per coordinate with
/// exact per-coordinate lengths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormBytes {
    pub a: Vec<u8>,
    pub b: Vec<u8>,
    pub c: Vec<u8>,
}

/// Coordinate slot size of the fixed-width legacy layout.
pub const LEGACY_COORDINATE_SIZE: usize = 256;

/// The fixed-width form layout used on the legacy wire: 256 bytes per
/// coordinate, big-endian, left-padded, plus the size of the largest
/// coordinate. Only for callers that need backward wire compatibility.
#[derive(Clone, Debug)]
pub struct LegacyFormBytes {
    pub a_data: [u8; LEGACY_COORDINATE_SIZE],
    pub b_data: [u8; LEGACY_COORDINATE_SIZE],
    pub c_data: [u8; LEGACY_COORDINATE_SIZE],
    pub data_size: usize,
}

impl FormBytes {
    fn from_form(form: &QuadraticForm) -> Self {
        Self {
            a: form.a().to_signed_bytes_be(),
            b: form.b().to_signed_bytes_be(),
            c: form.c().to_signed_bytes_be(),
        }
    }

    /// Convert to the fixed-width legacy layout. Fails with
    /// [VdfError::InvalidParameters] if any coordinate exceeds the 256-byte
    /// slot; coordinates are never silently truncated.
    pub fn legacy_padded(&self) -> VdfResult<LegacyFormBytes> {
        fn pad(bytes: &[u8]) -> VdfResult<[u8; LEGACY_COORDINATE_SIZE]> {
            if bytes.len() > LEGACY_COORDINATE_SIZE {
                return Err(VdfError::InvalidParameters);
            }
            let mut buffer = [0u8; LEGACY_COORDINATE_SIZE];
            buffer[LEGACY_COORDINATE_SIZE - bytes.len()..].copy_from_slice(bytes);
            Ok(buffer)
        }
        Ok(LegacyFormBytes {
            a_data: pad(&self.a)?,
            b_data: pad(&self.b)?,
            c_data: pad(&self.c)?,
            data_size: self.a.len().max(self.b.len()).max(self.c.len()),
        })
    }
}

/// Progress callback: (current_iteration, target_iterations).
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Completion callback: (success, completed_iterations).
pub type CompletionCallback = Arc<dyn Fn(bool, u64) + Send + Sync>;

/// State guarded by the engine mutex.
#[derive(Default)]
struct EngineState {
    discriminant: Option<Discriminant>,
    initial_form: Option<QuadraticForm>,
    final_form: Option<QuadraticForm>,
    checkpoints: Vec<CheckpointRecord>,
    target_iterations: u64,
    start_time: Option<Instant>,
    progress_cb: Option<ProgressCallback>,
    completion_cb: Option<CompletionCallback>,
    update_interval: Option<Duration>,
}

/// State shared between the engine handle and the worker thread.
struct Shared {
    phase: AtomicU8,
    current_iteration: AtomicU64,
    should_stop: AtomicBool,
    iterations_per_second: AtomicU64,
    state: Mutex<EngineState>,
    completion: Condvar,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Store a terminal phase and wake all waiters. Must be called with the
    /// state mutex held so waiters cannot miss the transition.
    fn finish(&self, _guard: &MutexGuard<'_, EngineState>, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
        self.completion.notify_all();
    }
}

/// Everything the worker needs, moved into the thread at start.
struct WorkerTask {
    shared: Arc<Shared>,
    discriminant: Discriminant,
    initial_form: QuadraticForm,
    target_iterations: u64,
    checkpoint_interval: u64,
    streaming_proofs: bool,
    logging: bool,
    update_interval: Duration,
}

/// The default interval between progress callback invocations.
const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(1000);

/// A verifiable-delay-function engine. See the module documentation.
pub struct VdfEngine {
    config: EngineConfig,
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl VdfEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: EngineConfig) -> VdfResult<Self> {
        if config.num_threads == 0 || config.proof_threads == 0 {
            return Err(VdfError::InvalidConfig);
        }
        Ok(Self {
            config,
            shared: Arc::new(Shared {
                phase: AtomicU8::new(Phase::Idle as u8),
                current_iteration: AtomicU64::new(0),
                should_stop: AtomicBool::new(false),
                iterations_per_second: AtomicU64::new(0),
                state: Mutex::new(EngineState::default()),
                completion: Condvar::new(),
            }),
            worker: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a computation of `iterations` squarings, deriving the
    /// discriminant of the given size from the 32-byte challenge. The
    /// initial form defaults to the class group generator.
    pub fn start(
        &mut self,
        challenge: &[u8; 32],
        initial_form: Option<QuadraticForm>,
        iterations: u64,
        discriminant_size_in_bits: u64,
    ) -> VdfResult<()> {
        self.check_startable(iterations)?;
        let discriminant = Discriminant::from_challenge(challenge, discriminant_size_in_bits)?;
        self.start_internal(discriminant, initial_form, iterations)
    }

    /// Start a computation with an explicit discriminant, given as the
    /// big-endian bytes of its absolute value. The imported value is forced
    /// to 1 mod 4 (subtracting the residue and adding 1, stepping by 4
    /// toward negative if the adjustment crossed zero); only values that
    /// cannot be made strictly negative are rejected.
    pub fn start_with_discriminant(
        &mut self,
        discriminant_bytes: &[u8],
        initial_form: Option<QuadraticForm>,
        iterations: u64,
    ) -> VdfResult<()> {
        self.check_startable(iterations)?;
        let discriminant = Discriminant::from_be_bytes_adjusted(discriminant_bytes)?;
        self.start_internal(discriminant, initial_form, iterations)
    }

    fn check_startable(&self, iterations: u64) -> VdfResult<()> {
        if iterations == 0 {
            return Err(VdfError::InvalidParameters);
        }
        if self.shared.phase() == Phase::Computing {
            return Err(VdfError::AlreadyRunning);
        }
        Ok(())
    }

    fn start_internal(
        &mut self,
        discriminant: Discriminant,
        initial_form: Option<QuadraticForm>,
        iterations: u64,
    ) -> VdfResult<()> {
        // Re-checked here: deriving the discriminant may have taken a while.
        if self.shared.phase() == Phase::Computing {
            return Err(VdfError::AlreadyRunning);
        }
        // Reap a worker left over from a previous run.
        if let Some(handle) = self.worker.take() {
            handle.join().map_err(|_| VdfError::ThreadError)?;
        }

        let initial_form = match initial_form {
            Some(form) => {
                if !form.is_valid(&discriminant) || !form.is_reduced() {
                    return Err(VdfError::InvalidForm);
                }
                form
            }
            None => QuadraticForm::generator(&discriminant)?,
        };

        let update_interval;
        {
            let mut state = self.shared.state();
            state.discriminant = Some(discriminant.clone());
            state.initial_form = Some(initial_form.clone());
            state.final_form = None;
            state.checkpoints = Vec::new();
            state.target_iterations = iterations;
            state.start_time = Some(Instant::now());
            update_interval = state.update_interval.unwrap_or(DEFAULT_UPDATE_INTERVAL);
        }
        self.shared.current_iteration.store(0, Ordering::Release);
        self.shared.iterations_per_second.store(0, Ordering::Relaxed);
        self.shared.should_stop.store(false, Ordering::Release);
        self.shared
            .phase
            .store(Phase::Computing as u8, Ordering::Release);

        if self.config.logging {
            info!(
                iterations,
                discriminant_bits = discriminant.bits(),
                segment_size = self.config.segment_size,
                "starting vdf computation"
            );
        }

        let task = WorkerTask {
            shared: Arc::clone(&self.shared),
            discriminant,
            initial_form,
            target_iterations: iterations,
            checkpoint_interval: self.config.segment_size as u64,
            streaming_proofs: self.config.segment_size > 0,
            logging: self.config.logging,
            update_interval,
        };
        let handle = thread::Builder::new()
            .name("vdf-worker".to_string())
            .spawn(move || run_worker(task))
            .map_err(|_| {
                self.shared.phase.store(Phase::Idle as u8, Ordering::Release);
                VdfError::ThreadError
            })?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Request cancellation and wait for the worker to exit. After this
    /// returns the phase is Stopped, or Completed if the worker finished in
    /// the race.
    pub fn stop(&mut self) -> VdfResult<()> {
        self.shared.should_stop.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            handle.join().map_err(|_| VdfError::ThreadError)?;
        }
        Ok(())
    }

    /// Block until the computation reaches a terminal phase. `None` waits
    /// forever; on timeout [VdfError::ComputationFailed] is returned.
    pub fn wait_completion(&self, timeout: Option<Duration>) -> VdfResult<()> {
        let guard = self.shared.state();
        match timeout {
            None => {
                let _guard = self
                    .shared
                    .completion
                    .wait_while(guard, |_| !self.shared.phase().is_terminal())
                    .unwrap_or_else(PoisonError::into_inner);
                Ok(())
            }
            Some(timeout) => {
                let (_guard, result) = self
                    .shared
                    .completion
                    .wait_timeout_while(guard, timeout, |_| !self.shared.phase().is_terminal())
                    .unwrap_or_else(PoisonError::into_inner);
                if result.timed_out() && !self.shared.phase().is_terminal() {
                    return Err(VdfError::ComputationFailed);
                }
                Ok(())
            }
        }
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    pub fn is_complete(&self) -> bool {
        self.shared.phase() == Phase::Completed
    }

    /// A snapshot of the computation progress.
    pub fn status(&self) -> EngineStatus {
        let phase = self.shared.phase();
        let current_iteration = self.shared.current_iteration.load(Ordering::Acquire);
        let iterations_per_second = self.shared.iterations_per_second.load(Ordering::Relaxed);
        let state = self.shared.state();
        let target_iterations = state.target_iterations;
        let elapsed = match (phase, state.start_time) {
            (Phase::Idle, _) | (_, None) => Duration::ZERO,
            (_, Some(start)) => start.elapsed(),
        };
        let progress_percentage = if target_iterations > 0 {
            current_iteration as f64 / target_iterations as f64 * 100.0
        } else {
            0.0
        };
        EngineStatus {
            current_iteration,
            target_iterations,
            phase,
            progress_percentage,
            iterations_per_second,
            elapsed,
            has_proof_ready: phase == Phase::Completed,
        }
    }

    /// The final form of a completed computation.
    pub fn result_form(&self) -> VdfResult<QuadraticForm> {
        if self.shared.phase() != Phase::Completed {
            return Err(VdfError::ComputationFailed);
        }
        self.shared
            .state()
            .final_form
            .clone()
            .ok_or(VdfError::ComputationFailed)
    }

    /// The final form as per-coordinate big-endian bytes.
    pub fn result_form_bytes(&self) -> VdfResult<FormBytes> {
        Ok(FormBytes::from_form(&self.result_form()?))
    }

    /// Generate the full Wesolowski proof for a completed computation. The
    /// returned blob is owned by the caller.
    pub fn generate_proof(&self, recursion_level: u8) -> VdfResult<Vec<u8>> {
        let (discriminant, input, output, iterations) = self.proof_inputs()?;
        wesolowski::prove_final(&input, &output, iterations, &discriminant, recursion_level)
    }

    /// Generate a proof for a prefix of the computation ending at
    /// `iterations`. The prefix must end exactly on a recorded checkpoint;
    /// passing the full target is equivalent to [VdfEngine::generate_proof].
    pub fn generate_proof_for_iterations(
        &self,
        iterations: u64,
        recursion_level: u8,
    ) -> VdfResult<Vec<u8>> {
        let (discriminant, input, _, target_iterations) = self.proof_inputs()?;
        if iterations > target_iterations {
            return Err(VdfError::InvalidParameters);
        }
        if iterations == target_iterations {
            return self.generate_proof(recursion_level);
        }
        let checkpoint_form = self
            .shared
            .state()
            .checkpoints
            .iter()
            .find(|record| record.iteration == iterations)
            .map(|record| record.form.clone())
            .ok_or(VdfError::InvalidParameters)?;
        wesolowski::prove_final(
            &input,
            &checkpoint_form,
            iterations,
            &discriminant,
            recursion_level,
        )
    }

    fn proof_inputs(&self) -> VdfResult<(Discriminant, QuadraticForm, QuadraticForm, u64)> {
        if self.shared.phase() != Phase::Completed {
            return Err(VdfError::ComputationFailed);
        }
        let state = self.shared.state();
        Ok((
            state.discriminant.clone().ok_or(VdfError::NotInitialized)?,
            state.initial_form.clone().ok_or(VdfError::NotInitialized)?,
            state.final_form.clone().ok_or(VdfError::ComputationFailed)?,
            state.target_iterations,
        ))
    }

    /// Number of recorded checkpoints.
    pub fn checkpoint_count(&self) -> usize {
        self.shared.state().checkpoints.len()
    }

    /// The checkpoint records with `start_iteration <= iteration <=
    /// end_iteration`, in increasing iteration order. The clones are owned
    /// by the caller.
    pub fn checkpoint_proofs(
        &self,
        start_iteration: u64,
        end_iteration: u64,
    ) -> Vec<CheckpointRecord> {
        self.shared
            .state()
            .checkpoints
            .iter()
            .filter(|record| {
                record.iteration >= start_iteration && record.iteration <= end_iteration
            })
            .cloned()
            .collect()
    }

    /// Install the progress and completion callbacks and the minimum
    /// interval between progress invocations. The callbacks take effect
    /// immediately; the interval at the next `start`.
    pub fn set_callbacks(
        &mut self,
        progress: Option<ProgressCallback>,
        completion: Option<CompletionCallback>,
        update_interval: Duration,
    ) {
        let mut state = self.shared.state();
        state.progress_cb = progress;
        state.completion_cb = completion;
        state.update_interval = Some(update_interval);
    }

    /// Update the thread-count hints.
    pub fn set_thread_count(&mut self, num_threads: u32, proof_threads: u32) -> VdfResult<()> {
        if num_threads == 0 || proof_threads > num_threads {
            return Err(VdfError::InvalidParameters);
        }
        self.reject_while_computing()?;
        self.config.num_threads = num_threads;
        self.config.proof_threads = proof_threads;
        Ok(())
    }

    /// Update the optimization hints.
    pub fn set_optimizations(&mut self, fast_mode: bool, avx512: bool) -> VdfResult<()> {
        self.reject_while_computing()?;
        self.config.fast_mode = fast_mode;
        self.config.avx512 = avx512;
        Ok(())
    }

    /// Update the checkpoint interval for subsequent computations.
    pub fn set_segment_size(&mut self, segment_size: u32) -> VdfResult<()> {
        if segment_size == 0 {
            return Err(VdfError::InvalidParameters);
        }
        self.reject_while_computing()?;
        self.config.segment_size = segment_size;
        Ok(())
    }

    fn reject_while_computing(&self) -> VdfResult<()> {
        if self.shared.phase() == Phase::Computing {
            return Err(VdfError::AlreadyRunning);
        }
        Ok(())
    }
}

impl Drop for VdfEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn run_worker(task: WorkerTask) {
    let shared = Arc::clone(&task.shared);
    match compute(task) {
        Ok(()) => {}
        Err(error) => {
            warn!(%error, "vdf worker failed");
            let completion_cb;
            {
                let guard = shared.state();
                completion_cb = guard.completion_cb.clone();
                shared.finish(&guard, Phase::Error);
            }
            if let Some(callback) = completion_cb {
                callback(false, shared.current_iteration.load(Ordering::Acquire));
            }
        }
    }
}

fn compute(task: WorkerTask) -> VdfResult<()> {
    let shared = &task.shared;
    let discriminant = &task.discriminant;
    let target = task.target_iterations;
    let checkpoints_enabled = task.checkpoint_interval > 0;

    let mut reducer = Reducer::new();
    let mut current = task.initial_form.clone();
    let mut last_checkpoint = task.initial_form.clone();
    let mut last_checkpoint_iteration = 0u64;
    let mut completed = 0u64;

    if checkpoints_enabled {
        shared.state().checkpoints.push(CheckpointRecord {
            iteration: 0,
            form: current.clone(),
            proof: Some(wesolowski::codec::sentinel_blob()),
        });
    }

    let mut last_update = Instant::now();
    while completed < target && !shared.should_stop.load(Ordering::Acquire) {
        let batch_start = completed;
        let batch_end = (completed + BATCH_SIZE).min(target);

        while completed < batch_end && !shared.should_stop.load(Ordering::Acquire) {
            current = current.square(&mut reducer);
            completed += 1;
            shared
                .current_iteration
                .store(completed, Ordering::Release);

            if checkpoints_enabled
                && (completed % task.checkpoint_interval == 0 || completed == target)
            {
                let proof = if task.streaming_proofs {
                    let delta = completed - last_checkpoint_iteration;
                    let blob = wesolowski::prove_checkpoint(
                        &last_checkpoint,
                        &current,
                        completed,
                        delta,
                        discriminant,
                    )?;
                    last_checkpoint = current.clone();
                    last_checkpoint_iteration = completed;
                    Some(blob)
                } else {
                    None
                };
                shared.state().checkpoints.push(CheckpointRecord {
                    iteration: completed,
                    form: current.clone(),
                    proof,
                });
                if task.logging {
                    debug!(iteration = completed, "checkpoint recorded");
                }
            }
        }

        let now = Instant::now();
        let elapsed = now.duration_since(last_update);
        if elapsed >= task.update_interval {
            let elapsed_ms = elapsed.as_millis() as u64;
            if elapsed_ms > 0 {
                shared
                    .iterations_per_second
                    .store((completed - batch_start) * 1000 / elapsed_ms, Ordering::Relaxed);
            }
            last_update = now;
            let progress_cb = shared.state().progress_cb.clone();
            if let Some(callback) = progress_cb {
                callback(completed, target);
            }
        }
    }

    let finished = completed == target;
    let completion_cb;
    {
        let mut guard = shared.state();
        if finished {
            guard.final_form = Some(current);
        }
        completion_cb = guard.completion_cb.clone();
        shared.finish(&guard, if finished { Phase::Completed } else { Phase::Stopped });
    }
    if task.logging {
        info!(
            completed,
            target,
            finished,
            "vdf computation finished"
        );
    }
    if let Some(callback) = completion_cb {
        callback(finished, completed);
    }
    Ok(())
}

/// Derive the discriminant for a challenge and return the big-endian bytes
/// of its absolute value.
pub fn create_discriminant(challenge: &[u8; 32], size_in_bits: u64) -> VdfResult<Vec<u8>> {
    Ok(Discriminant::from_challenge(challenge, size_in_bits)?.to_be_bytes())
}

/// Verify a full Wesolowski proof blob. See [wesolowski::verify_final].
pub fn verify_proof(
    discriminant_bytes: &[u8],
    initial_form: Option<&QuadraticForm>,
    proof: &[u8],
    iterations: u64,
    recursion_level: u8,
) -> bool {
    wesolowski::verify_final(
        discriminant_bytes,
        initial_form,
        proof,
        iterations,
        recursion_level,
    )
    .is_ok()
}

/// Verify a full Wesolowski proof blob against a challenge-derived
/// discriminant. See [wesolowski::verify_final_with_challenge].
pub fn verify_proof_with_challenge(
    challenge: &[u8; 32],
    discriminant_size_in_bits: u64,
    initial_form: Option<&QuadraticForm>,
    proof: &[u8],
    iterations: u64,
    recursion_level: u8,
) -> bool {
    wesolowski::verify_final_with_challenge(
        challenge,
        discriminant_size_in_bits,
        initial_form,
        proof,
        iterations,
        recursion_level,
    )
    .is_ok()
}

/// CPU features and topology, for deployments that dispatch to accelerated
/// backends.
#[derive(Clone, Copy, Debug, Default)]
pub struct Capabilities {
    pub has_avx2: bool,
    pub has_avx512: bool,
    pub has_bmi2: bool,
    pub has_adx: bool,
    pub cpu_cores: u32,
    pub cpu_threads: u32,
}

/// Detect CPU capabilities at runtime.
pub fn capabilities() -> Capabilities {
    let cpu_threads = thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1);
    #[cfg(target_arch = "x86_64")]
    {
        Capabilities {
            has_avx2: std::arch::is_x86_feature_detected!("avx2"),
            has_avx512: std::arch::is_x86_feature_detected!("avx512f"),
            has_bmi2: std::arch::is_x86_feature_detected!("bmi2"),
            has_adx: std::arch::is_x86_feature_detected!("adx"),
            cpu_cores: cpu_threads,
            cpu_threads,
        }
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        Capabilities {
            cpu_cores: cpu_threads,
            cpu_threads,
            ..Capabilities::default()
        }
    }
}

/// Measure the sequential squaring rate in iterations per second with a
/// 1024-bit discriminant.
pub fn benchmark(config: &EngineConfig, test_iterations: u64) -> VdfResult<f64> {
    if test_iterations == 0 {
        return Err(VdfError::InvalidParameters);
    }
    let challenge: [u8; 32] = core::array::from_fn(|i| i as u8 + 1);
    let mut engine = VdfEngine::new(*config)?;
    let start = Instant::now();
    engine.start(&challenge, None, test_iterations, 1024)?;
    engine.wait_completion(None)?;
    let elapsed = start.elapsed();
    if elapsed.is_zero() {
        return Err(VdfError::ComputationFailed);
    }
    Ok(test_iterations as f64 * 1000.0 / elapsed.as_millis().max(1) as f64)
}

/// Run a short computation end to end and verify its proof.
pub fn self_test() -> VdfResult<()> {
    let mut challenge = [0u8; 32];
    challenge[0] = 0x01;
    let iterations = 100;

    let mut engine = VdfEngine::new(EngineConfig::default())?;
    engine.start(&challenge, None, iterations, 1024)?;
    engine.wait_completion(Some(Duration::from_secs(30)))?;
    if !engine.is_complete() {
        return Err(VdfError::ComputationFailed);
    }
    let proof = engine.generate_proof(0)?;
    if !verify_proof_with_challenge(&challenge, 1024, None, &proof, iterations, 0) {
        return Err(VdfError::VerificationFailed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdf::wesolowski::{codec, verify_checkpoint};
    use std::sync::atomic::AtomicUsize;

    fn test_challenge() -> [u8; 32] {
        core::array::from_fn(|i| i as u8 + 1)
    }

    fn config_with_segment_size(segment_size: u32) -> EngineConfig {
        EngineConfig {
            segment_size,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.num_threads >= 1);
        assert_eq!(config.proof_threads, (config.num_threads / 2).max(1));
        assert!(config.fast_mode);
        assert!(!config.avx512);
        assert!(!config.logging);
        assert_eq!(config.segment_size, DEFAULT_SEGMENT_SIZE);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.num_threads = 0;
        assert_eq!(VdfEngine::new(config).err(), Some(VdfError::InvalidConfig));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        assert_eq!(
            engine.start(&test_challenge(), None, 0, 512).err(),
            Some(VdfError::InvalidParameters)
        );
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn test_small_discriminant_rejected() {
        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        assert_eq!(
            engine.start(&test_challenge(), None, 100, 63).err(),
            Some(VdfError::InvalidParameters)
        );
    }

    #[test]
    fn test_start_with_discriminant_adjusts_residue() {
        // -30 is 2 mod 4; the import forces it to -31 and the run proceeds.
        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        engine.start_with_discriminant(&[30], None, 100).unwrap();
        engine.wait_completion(None).unwrap();
        assert!(engine.is_complete());

        // The proof was computed over the adjusted discriminant -31.
        let proof = engine.generate_proof(0).unwrap();
        assert!(verify_proof(&[31], None, &proof, 100, 0));
        assert!(!verify_proof(&[35], None, &proof, 100, 0));

        // Empty input has nothing to adjust.
        assert_eq!(
            engine.start_with_discriminant(&[], None, 100).err(),
            Some(VdfError::InvalidDiscriminant)
        );
    }

    /// Scenario S1: full run with the default segment size, which is larger
    /// than T, so only the sentinel and the final checkpoint are recorded.
    #[test]
    fn test_full_run_with_default_segments() {
        let iterations = 10_000u64;
        let challenge = test_challenge();
        let mut engine = VdfEngine::new(config_with_segment_size(65536)).unwrap();
        engine.start(&challenge, None, iterations, 1024).unwrap();
        engine.wait_completion(None).unwrap();

        let status = engine.status();
        assert_eq!(status.phase, Phase::Completed);
        assert_eq!(status.current_iteration, iterations);
        assert!((status.progress_percentage - 100.0).abs() < f64::EPSILON);
        assert!(status.has_proof_ready);

        let discriminant = Discriminant::from_challenge(&challenge, 1024).unwrap();
        let result = engine.result_form().unwrap();
        assert!(result.is_valid(&discriminant));
        assert!(result.is_reduced());

        let proof = engine.generate_proof(0).unwrap();
        assert!(verify_proof_with_challenge(
            &challenge, 1024, None, &proof, iterations, 0
        ));

        assert_eq!(engine.checkpoint_count(), 2);
        let checkpoints = engine.checkpoint_proofs(0, iterations);
        assert_eq!(checkpoints[0].iteration, 0);
        assert_eq!(checkpoints[1].iteration, iterations);
        assert_eq!(
            checkpoints[0].proof.as_deref(),
            Some(&[codec::INITIAL_CHECKPOINT_VERSION][..])
        );
    }

    /// Scenario S2: segment size 2000 over 10000 iterations gives the
    /// checkpoints 0, 2000, ..., 10000, each segment verifying against its
    /// predecessor.
    #[test]
    fn test_streaming_checkpoints_verify() {
        let iterations = 10_000u64;
        let challenge = test_challenge();
        let mut engine = VdfEngine::new(config_with_segment_size(2000)).unwrap();
        engine.start(&challenge, None, iterations, 1024).unwrap();
        engine.wait_completion(None).unwrap();
        assert!(engine.is_complete());

        assert_eq!(engine.checkpoint_count(), 6);
        let checkpoints = engine.checkpoint_proofs(0, iterations);
        let expected_iterations: Vec<u64> = (0..=5).map(|i| i * 2000).collect();
        assert_eq!(
            checkpoints.iter().map(|c| c.iteration).collect::<Vec<_>>(),
            expected_iterations
        );

        // Each segment proof verifies against its predecessor's form.
        let discriminant = Discriminant::from_challenge(&challenge, 1024).unwrap();
        for window in checkpoints.windows(2) {
            let previous = &window[0];
            let record = &window[1];
            let delta = record.iteration - previous.iteration;
            let verified = verify_checkpoint(
                &discriminant,
                &previous.form,
                record.proof.as_ref().unwrap(),
                delta,
            )
            .unwrap();
            assert_eq!(verified, record.form);
        }

        // The last checkpoint form is the final form.
        assert_eq!(checkpoints[5].form, engine.result_form().unwrap());
    }

    /// Scenario S3: proof blob shape and single-byte tampering.
    #[test]
    fn test_proof_blob_shape_and_tampering() {
        let iterations = 10_000u64;
        let challenge = [0x42u8; 32];
        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        engine.start(&challenge, None, iterations, 512).unwrap();
        engine.wait_completion(None).unwrap();

        let proof = engine.generate_proof(0).unwrap();
        assert_eq!(proof[0], codec::FINAL_PROOF_VERSION);
        assert_eq!(codec::decode_final(&proof).unwrap().iterations, iterations);
        assert!(verify_proof_with_challenge(
            &challenge, 512, None, &proof, iterations, 0
        ));

        let mut tampered = proof.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert!(!verify_proof_with_challenge(
            &challenge, 512, None, &tampered, iterations, 0
        ));
    }

    /// Scenario S4: stopping a long run.
    #[test]
    fn test_stop_long_running_computation() {
        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        engine
            .start(&test_challenge(), None, 1_000_000, 2048)
            .unwrap();
        thread::sleep(Duration::from_secs(2));
        engine.stop().unwrap();

        let status = engine.status();
        assert_eq!(status.phase, Phase::Stopped);
        assert!(status.current_iteration > 0);
        assert!(status.current_iteration < 1_000_000);

        // No further progress after stop.
        let iteration_after_stop = engine.status().current_iteration;
        thread::sleep(Duration::from_millis(100));
        assert_eq!(engine.status().current_iteration, iteration_after_stop);

        // A subsequent wait returns immediately.
        engine.wait_completion(Some(Duration::from_millis(1))).unwrap();
        assert_eq!(engine.result_form().err(), Some(VdfError::ComputationFailed));
    }

    /// Scenario S5: discriminant creation from a challenge.
    #[test]
    fn test_create_discriminant() {
        let challenge: [u8; 32] = core::array::from_fn(|i| i as u8);
        let bytes = create_discriminant(&challenge, 512).unwrap();
        assert_eq!(bytes.len(), 512 / 8);
        assert!(bytes.iter().any(|&b| b != 0));
        assert!(bytes[0] & 0x80 != 0);
    }

    /// Scenario S6: concurrent engines are independent.
    #[test]
    fn test_concurrent_engines_are_independent() {
        let iterations = 2000u64;
        let challenge_a = [0xaau8; 32];
        let challenge_b = [0xbbu8; 32];

        let handle_a = thread::spawn(move || {
            let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
            engine.start(&challenge_a, None, iterations, 512).unwrap();
            engine.wait_completion(None).unwrap();
            (engine.result_form().unwrap(), engine.generate_proof(0).unwrap())
        });
        let handle_b = thread::spawn(move || {
            let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
            engine.start(&challenge_b, None, iterations, 512).unwrap();
            engine.wait_completion(None).unwrap();
            (engine.result_form().unwrap(), engine.generate_proof(0).unwrap())
        });

        let (form_a, proof_a) = handle_a.join().unwrap();
        let (form_b, proof_b) = handle_b.join().unwrap();
        assert_ne!(form_a, form_b);
        assert!(verify_proof_with_challenge(
            &challenge_a, 512, None, &proof_a, iterations, 0
        ));
        assert!(verify_proof_with_challenge(
            &challenge_b, 512, None, &proof_b, iterations, 0
        ));
    }

    #[test]
    fn test_start_while_computing_rejected() {
        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        engine
            .start(&test_challenge(), None, 500_000, 512)
            .unwrap();
        assert_eq!(
            engine.start(&test_challenge(), None, 100, 512).err(),
            Some(VdfError::AlreadyRunning)
        );
        engine.stop().unwrap();

        // After a terminal phase a fresh start is accepted.
        engine.start(&test_challenge(), None, 100, 512).unwrap();
        engine.wait_completion(None).unwrap();
        assert!(engine.is_complete());
    }

    #[test]
    fn test_segment_size_zero_disables_checkpoints() {
        let mut engine = VdfEngine::new(config_with_segment_size(0)).unwrap();
        engine.start(&test_challenge(), None, 1000, 512).unwrap();
        engine.wait_completion(None).unwrap();
        assert!(engine.is_complete());
        assert_eq!(engine.checkpoint_count(), 0);
        assert!(engine.checkpoint_proofs(0, u64::MAX).is_empty());
        // The final proof is still available.
        assert!(engine.generate_proof(0).is_ok());
    }

    #[test]
    fn test_start_with_discriminant_and_explicit_form() {
        let challenge = test_challenge();
        let discriminant_bytes = create_discriminant(&challenge, 512).unwrap();
        let discriminant = Discriminant::try_from_be_bytes(&discriminant_bytes).unwrap();
        let initial_form = QuadraticForm::generator(&discriminant).unwrap();

        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        engine
            .start_with_discriminant(&discriminant_bytes, Some(initial_form.clone()), 1000)
            .unwrap();
        engine.wait_completion(None).unwrap();
        assert!(engine.is_complete());

        let proof = engine.generate_proof(0).unwrap();
        assert!(verify_proof(
            &discriminant_bytes,
            Some(&initial_form),
            &proof,
            1000,
            0
        ));

        // A form for a different discriminant is rejected at start.
        let other = Discriminant::generate(512, b"unrelated").unwrap();
        let wrong_form = QuadraticForm::generator(&other).unwrap();
        assert_eq!(
            engine
                .start_with_discriminant(&discriminant_bytes, Some(wrong_form), 1000)
                .err(),
            Some(VdfError::InvalidForm)
        );
    }

    #[test]
    fn test_callbacks_and_progress_monotonicity() {
        let progress_calls = Arc::new(Mutex::new(Vec::<u64>::new()));
        let completion_flag = Arc::new(AtomicUsize::new(0));

        let progress_calls_cb = Arc::clone(&progress_calls);
        let completion_flag_cb = Arc::clone(&completion_flag);

        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        engine.set_callbacks(
            Some(Arc::new(move |current, _target| {
                progress_calls_cb.lock().unwrap().push(current);
            })),
            Some(Arc::new(move |success, completed| {
                assert!(success);
                assert_eq!(completed, 5000);
                completion_flag_cb.fetch_add(1, Ordering::SeqCst);
            })),
            Duration::from_millis(1),
        );
        engine.start(&test_challenge(), None, 5000, 512).unwrap();
        engine.wait_completion(None).unwrap();
        assert!(engine.is_complete());

        assert_eq!(completion_flag.load(Ordering::SeqCst), 1);
        let calls = progress_calls.lock().unwrap();
        assert!(calls.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_wait_completion_timeout() {
        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        engine
            .start(&test_challenge(), None, 10_000_000, 512)
            .unwrap();
        assert_eq!(
            engine.wait_completion(Some(Duration::from_millis(50))).err(),
            Some(VdfError::ComputationFailed)
        );
        engine.stop().unwrap();
    }

    #[test]
    fn test_generate_proof_before_completion_fails() {
        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        assert_eq!(
            engine.generate_proof(0).err(),
            Some(VdfError::ComputationFailed)
        );
        engine
            .start(&test_challenge(), None, 1_000_000, 512)
            .unwrap();
        assert_eq!(
            engine.generate_proof(0).err(),
            Some(VdfError::ComputationFailed)
        );
        engine.stop().unwrap();
    }

    #[test]
    fn test_generate_proof_for_checkpoint_prefix() {
        let challenge = test_challenge();
        let mut engine = VdfEngine::new(config_with_segment_size(1000)).unwrap();
        engine.start(&challenge, None, 3000, 512).unwrap();
        engine.wait_completion(None).unwrap();

        // A prefix ending on a checkpoint proves and verifies.
        let prefix_proof = engine.generate_proof_for_iterations(2000, 0).unwrap();
        assert!(verify_proof_with_challenge(
            &challenge, 512, None, &prefix_proof, 2000, 0
        ));

        // Off-checkpoint prefixes and overlong prefixes are rejected.
        assert_eq!(
            engine.generate_proof_for_iterations(1234, 0).err(),
            Some(VdfError::InvalidParameters)
        );
        assert_eq!(
            engine.generate_proof_for_iterations(4000, 0).err(),
            Some(VdfError::InvalidParameters)
        );
    }

    #[test]
    fn test_result_form_bytes_and_legacy_layout() {
        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        engine.start(&test_challenge(), None, 100, 512).unwrap();
        engine.wait_completion(None).unwrap();

        let bytes = engine.result_form_bytes().unwrap();
        let form = engine.result_form().unwrap();
        assert_eq!(bytes.a, form.a().to_signed_bytes_be());

        let legacy = bytes.legacy_padded().unwrap();
        assert_eq!(
            legacy.data_size,
            bytes.a.len().max(bytes.b.len()).max(bytes.c.len())
        );
        // Left-padded: the tail of the slot holds the coordinate.
        assert_eq!(
            &legacy.a_data[LEGACY_COORDINATE_SIZE - bytes.a.len()..],
            bytes.a.as_slice()
        );
    }

    #[test]
    fn test_setters_rejected_while_computing() {
        let mut engine = VdfEngine::new(EngineConfig::default()).unwrap();
        engine
            .start(&test_challenge(), None, 1_000_000, 512)
            .unwrap();
        assert_eq!(
            engine.set_thread_count(2, 1).err(),
            Some(VdfError::AlreadyRunning)
        );
        assert_eq!(
            engine.set_optimizations(true, false).err(),
            Some(VdfError::AlreadyRunning)
        );
        assert_eq!(
            engine.set_segment_size(1024).err(),
            Some(VdfError::AlreadyRunning)
        );
        engine.stop().unwrap();

        engine.set_thread_count(2, 1).unwrap();
        engine.set_optimizations(false, false).unwrap();
        engine.set_segment_size(1024).unwrap();
        assert_eq!(engine.config().segment_size, 1024);
        assert_eq!(
            engine.set_segment_size(0).err(),
            Some(VdfError::InvalidParameters)
        );
        assert_eq!(
            engine.set_thread_count(0, 0).err(),
            Some(VdfError::InvalidParameters)
        );
    }

    #[test]
    fn test_capabilities_and_self_test() {
        let caps = capabilities();
        assert!(caps.cpu_threads >= 1);
        assert!(caps.cpu_cores >= 1);
        self_test().unwrap();
    }
}
