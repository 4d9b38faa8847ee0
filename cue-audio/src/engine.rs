//! Audio engine - cpal output driving one voice per playback element
//!
//! The audio callback only renders voices. Commands arrive over a bounded
//! channel and are applied by a command thread that also reports voices
//! that ran out. `EngineBackend` is the control-side handle and implements
//! `MediaBackend`.

use crate::backend::{ElementEvent, ElementId, GraphState, MediaBackend, Readiness};
use crate::error::{EngineError, PreviewError};
use crate::mixer::Mixer;
use crate::resources::Blob;
use crate::tap::{AnalysisTap, TapHandle};
use crate::voice::Voice;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use cue_analysis::FFT_SIZE;
use cue_library::{DecodedAudio, LoadError, TrackLoader};
use parking_lot::Mutex;
use ringbuf::traits::Split;
use ringbuf::{HeapProd, HeapRb};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Maximum buffer size for pre-allocated processing buffers
const MAX_BUFFER_SIZE: usize = 4096;
/// How long `spawn` waits for the device to open
const STARTUP_TIMEOUT: Duration = Duration::from_secs(3);
/// Analysis ring capacity per element
const TAP_RING_SIZE: usize = FFT_SIZE * 8;

/// Commands sent to the audio thread
pub enum EngineCommand {
    AddVoice {
        element: ElementId,
        samples: Arc<Vec<f32>>,
        position: Arc<AtomicU64>,
        /// Volume set while the element was still decoding
        volume: f32,
    },
    Play(ElementId),
    Pause(ElementId),
    Stop(ElementId),
    SetVolume(ElementId, f32),
    AttachTap(ElementId, HeapProd<f32>),
    DetachTap(ElementId),
    Remove(ElementId),
    /// Start rendering; output is silent until then
    Resume,
    SetMasterVolume(f32),
    Shutdown,
}

/// Events sent from the audio thread
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Ended(ElementId),
    Error(String),
}

/// Audio engine state (held in audio thread)
pub struct EngineState {
    voices: Vec<Voice>,
    mixer: Mixer,
    running: bool,
    /// Pre-allocated per-voice render buffer
    scratch: Vec<f32>,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            voices: Vec::new(),
            mixer: Mixer::new(),
            running: false,
            scratch: vec![0.0f32; MAX_BUFFER_SIZE],
        }
    }

    fn voice_mut(&mut self, element: ElementId) -> Option<&mut Voice> {
        self.voices.iter_mut().find(|v| v.element() == element)
    }

    /// Process a command
    pub fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::AddVoice {
                element,
                samples,
                position,
                volume,
            } => {
                self.voices.retain(|v| v.element() != element);
                self.voices
                    .push(Voice::new(element, samples, position).with_volume(volume));
            }
            EngineCommand::Play(id) => {
                if let Some(v) = self.voice_mut(id) {
                    v.play();
                }
            }
            EngineCommand::Pause(id) => {
                if let Some(v) = self.voice_mut(id) {
                    v.pause();
                }
            }
            EngineCommand::Stop(id) => {
                if let Some(v) = self.voice_mut(id) {
                    v.stop();
                }
            }
            EngineCommand::SetVolume(id, volume) => {
                if let Some(v) = self.voice_mut(id) {
                    v.set_volume(volume);
                }
            }
            EngineCommand::AttachTap(id, tap) => {
                if let Some(v) = self.voice_mut(id) {
                    v.attach_tap(tap);
                }
            }
            EngineCommand::DetachTap(id) => {
                if let Some(v) = self.voice_mut(id) {
                    v.detach_tap();
                }
            }
            EngineCommand::Remove(id) => self.voices.retain(|v| v.element() != id),
            EngineCommand::Resume => self.running = true,
            EngineCommand::SetMasterVolume(volume) => self.mixer.set_master_volume(volume),
            EngineCommand::Shutdown => {}
        }
    }

    /// Elements whose voice reached its end since the last call
    pub fn take_ended(&mut self) -> Vec<ElementId> {
        self.voices
            .iter_mut()
            .filter_map(|v| v.take_ended().then(|| v.element()))
            .collect()
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Process audio for a stereo interleaved output buffer
    pub fn process(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        if !self.running {
            return;
        }

        let len = output.len();
        // This should rarely happen after the first call
        if len > self.scratch.len() {
            self.scratch.resize(len, 0.0);
        }

        for voice in self.voices.iter_mut() {
            if !voice.is_playing() {
                continue;
            }
            let buf = &mut self.scratch[..len];
            buf.fill(0.0);
            voice.process(buf);
            self.mixer.accumulate(buf, output);
        }

        self.mixer.finish(output);
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

fn run_audio_thread(
    cmd_rx: Receiver<EngineCommand>,
    evt_tx: Sender<EngineEvent>,
    ready_tx: Sender<Result<u32, EngineError>>,
    shutdown: Arc<AtomicBool>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        let _ = ready_tx.send(Err(EngineError::NoDevice));
        return;
    };

    let config = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(EngineError::Config(e.to_string())));
            return;
        }
    };

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    let engine_state = Arc::new(Mutex::new(EngineState::new()));
    let engine_for_callback = engine_state.clone();

    // Stereo render buffer for devices that are not two-channel
    let mut conversion_buffer = vec![0.0f32; MAX_BUFFER_SIZE * 4];

    let stream_errors = evt_tx.clone();
    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            // Never block the real-time thread; output silence on contention
            let Some(mut state) = engine_for_callback.try_lock() else {
                data.fill(0.0);
                return;
            };
            if channels == 2 {
                state.process(data);
                return;
            }

            let frames = data.len() / channels.max(1);
            if frames * 2 > conversion_buffer.len() {
                conversion_buffer.resize(frames * 2, 0.0);
            }
            let stereo = &mut conversion_buffer[..frames * 2];
            state.process(stereo);
            for (frame, pair) in data.chunks_mut(channels.max(1)).zip(stereo.chunks(2)) {
                if channels == 1 {
                    frame[0] = (pair[0] + pair[1]) * 0.5;
                } else {
                    frame.fill(0.0);
                    frame[0] = pair[0];
                    frame[1] = pair[1];
                }
            }
        },
        move |err| {
            let _ = stream_errors.try_send(EngineEvent::Error(err.to_string()));
        },
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(EngineError::Stream(e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(EngineError::Stream(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(sample_rate));

    // Command processing loop
    while !shutdown.load(Ordering::Relaxed) {
        match cmd_rx.recv_timeout(Duration::from_millis(10)) {
            Ok(EngineCommand::Shutdown) => break,
            Ok(cmd) => engine_state.lock().handle_command(cmd),
            Err(_) => {}
        }

        let ended = engine_state.lock().take_ended();
        for element in ended {
            let _ = evt_tx.try_send(EngineEvent::Ended(element));
        }
    }
    debug!("Audio thread exiting");
}

#[derive(Debug, Clone, PartialEq)]
enum LoadState {
    Decoding,
    Ready { duration: Duration },
    Failed(String),
}

struct ElementSlot {
    load: LoadState,
    playing: bool,
    volume: f32,
    position: Arc<AtomicU64>,
    tapped: bool,
    /// Set on removal so a running decode stops early
    cancel: Arc<AtomicBool>,
}

impl ElementSlot {
    fn new() -> Self {
        Self {
            load: LoadState::Decoding,
            playing: false,
            volume: 1.0,
            position: Arc::new(AtomicU64::new(0)),
            tapped: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Voice for decoded samples, carrying state set during decode
    fn voice_command(&self, element: ElementId, samples: Arc<Vec<f32>>) -> EngineCommand {
        EngineCommand::AddVoice {
            element,
            samples,
            position: self.position.clone(),
            volume: self.volume,
        }
    }
}

type LoadResult = (ElementId, Result<DecodedAudio, LoadError>);

/// Control-side handle to the audio engine
pub struct EngineBackend {
    command_tx: Sender<EngineCommand>,
    event_rx: Receiver<EngineEvent>,
    load_tx: Sender<LoadResult>,
    load_rx: Receiver<LoadResult>,
    loader: Arc<TrackLoader>,
    elements: HashMap<ElementId, ElementSlot>,
    next_id: u64,
    sample_rate: u32,
    graph: GraphState,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EngineBackend {
    /// Open the default output device and start the audio thread
    pub fn spawn() -> Result<Self, EngineError> {
        // Buffer size of 1024 provides headroom for command bursts
        let (command_tx, command_rx) = bounded(1024);
        let (event_tx, event_rx) = bounded(1024);
        let (ready_tx, ready_rx) = bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_audio = shutdown.clone();

        let thread = thread::Builder::new()
            .name("cue-audio".into())
            .spawn(move || run_audio_thread(command_rx, event_tx, ready_tx, shutdown_audio))
            .map_err(|e| EngineError::Startup(e.to_string()))?;

        let sample_rate = match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                shutdown.store(true, Ordering::Relaxed);
                return Err(EngineError::Startup("audio device did not respond".into()));
            }
        };
        info!("Audio engine running at {} Hz", sample_rate);

        let (load_tx, load_rx) = unbounded();
        Ok(Self {
            command_tx,
            event_rx,
            load_tx,
            load_rx,
            loader: Arc::new(TrackLoader::with_sample_rate(sample_rate)),
            elements: HashMap::new(),
            next_id: 1,
            sample_rate,
            graph: GraphState::Suspended,
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.send(EngineCommand::SetMasterVolume(volume));
    }

    fn send(&self, cmd: EngineCommand) {
        if self.command_tx.try_send(cmd).is_err() {
            warn!("Audio command queue full, command dropped");
        }
    }

    /// Collect finished decodes and hand ready voices to the audio thread
    fn collect_loads(&mut self) {
        while let Ok((id, result)) = self.load_rx.try_recv() {
            let Some(slot) = self.elements.get_mut(&id) else {
                debug!("Discarding decode for removed {}", id);
                continue;
            };
            match result {
                Ok(audio) => {
                    slot.load = LoadState::Ready {
                        duration: audio.duration,
                    };
                    let cmd = slot.voice_command(id, audio.samples);
                    self.send(cmd);
                }
                Err(e) => {
                    warn!("Decode of {} failed: {}", id, e);
                    slot.load = LoadState::Failed(e.to_string());
                }
            }
        }
    }

    fn ready_slot(&mut self, id: ElementId) -> Result<&mut ElementSlot, PreviewError> {
        self.collect_loads();
        let slot = self
            .elements
            .get_mut(&id)
            .ok_or_else(|| PreviewError::Playback(format!("unknown {}", id)))?;
        match &slot.load {
            LoadState::Ready { .. } => Ok(slot),
            LoadState::Decoding => Err(PreviewError::Playback(format!("{} is still loading", id))),
            LoadState::Failed(msg) => Err(PreviewError::Playback(msg.clone())),
        }
    }
}

impl MediaBackend for EngineBackend {
    fn create_element(&mut self, blob: &Blob) -> Result<ElementId, PreviewError> {
        let id = ElementId::new(self.next_id);
        self.next_id += 1;

        let slot = ElementSlot::new();
        let cancel = slot.cancel.clone();
        let loader = self.loader.clone();
        let tx = self.load_tx.clone();
        let bytes = blob.bytes().clone();
        let extension = blob.extension().to_string();
        thread::Builder::new()
            .name("cue-decode".into())
            .spawn(move || {
                let result = loader.decode_cancellable(bytes, Some(extension.as_str()), &cancel);
                if matches!(result, Err(LoadError::Cancelled)) {
                    debug!("Decode of {} cancelled", id);
                    return;
                }
                let _ = tx.send((id, result));
            })?;

        self.elements.insert(id, slot);
        debug!("Decoding {} ({} bytes)", id, blob.len());
        Ok(id)
    }

    fn readiness(&mut self, id: ElementId) -> Readiness {
        self.collect_loads();
        match self.elements.get(&id).map(|s| &s.load) {
            None => Readiness::Failed(format!("unknown {}", id)),
            Some(LoadState::Decoding) => Readiness::Pending,
            Some(LoadState::Ready { .. }) => Readiness::Ready,
            Some(LoadState::Failed(msg)) => Readiness::Failed(msg.clone()),
        }
    }

    fn play(&mut self, id: ElementId) -> Result<(), PreviewError> {
        self.ready_slot(id)?.playing = true;
        self.send(EngineCommand::Play(id));
        Ok(())
    }

    fn pause(&mut self, id: ElementId) {
        if let Some(slot) = self.elements.get_mut(&id) {
            slot.playing = false;
            self.send(EngineCommand::Pause(id));
        }
    }

    fn stop(&mut self, id: ElementId) {
        if let Some(slot) = self.elements.get_mut(&id) {
            slot.playing = false;
            slot.position.store(0, Ordering::Relaxed);
            self.send(EngineCommand::Stop(id));
        }
    }

    fn is_paused(&self, id: ElementId) -> bool {
        self.elements.get(&id).map_or(true, |s| !s.playing)
    }

    fn set_volume(&mut self, id: ElementId, volume: f32) {
        if let Some(slot) = self.elements.get_mut(&id) {
            slot.volume = volume.clamp(0.0, 1.0);
            let volume = slot.volume;
            self.send(EngineCommand::SetVolume(id, volume));
        }
    }

    fn volume(&self, id: ElementId) -> f32 {
        self.elements.get(&id).map_or(0.0, |s| s.volume)
    }

    fn position(&self, id: ElementId) -> Duration {
        self.elements.get(&id).map_or(Duration::ZERO, |s| {
            let frames = s.position.load(Ordering::Relaxed);
            Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
        })
    }

    fn duration(&self, id: ElementId) -> Option<Duration> {
        match self.elements.get(&id).map(|s| &s.load) {
            Some(LoadState::Ready { duration }) => Some(*duration),
            _ => None,
        }
    }

    fn remove_element(&mut self, id: ElementId) {
        if let Some(slot) = self.elements.remove(&id) {
            slot.cancel.store(true, Ordering::Relaxed);
            self.send(EngineCommand::Remove(id));
            debug!("Removed {}", id);
        }
    }

    fn connect_tap(&mut self, id: ElementId) -> Result<TapHandle, PreviewError> {
        let sample_rate = self.sample_rate;
        let slot = self.ready_slot(id)?;
        slot.tapped = true;
        let (prod, cons) = HeapRb::<f32>::new(TAP_RING_SIZE).split();
        self.send(EngineCommand::AttachTap(id, prod));
        Ok(AnalysisTap::with_source(id, sample_rate, cons).into_handle())
    }

    fn disconnect_tap(&mut self, id: ElementId) {
        if let Some(slot) = self.elements.get_mut(&id) {
            if std::mem::take(&mut slot.tapped) {
                self.send(EngineCommand::DetachTap(id));
            }
        }
    }

    fn graph_state(&self) -> GraphState {
        self.graph
    }

    fn resume_graph(&mut self) {
        if self.graph == GraphState::Suspended {
            self.send(EngineCommand::Resume);
            self.graph = GraphState::Running;
            debug!("Audio graph resumed");
        }
    }

    fn drain_events(&mut self) -> Vec<ElementEvent> {
        let mut events = Vec::new();
        for event in self.event_rx.try_iter() {
            match event {
                EngineEvent::Ended(id) => {
                    if let Some(slot) = self.elements.get_mut(&id) {
                        slot.playing = false;
                        events.push(ElementEvent::Ended(id));
                    }
                }
                EngineEvent::Error(msg) => error!("Audio stream error: {}", msg),
            }
        }
        events
    }
}

impl Drop for EngineBackend {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.command_tx.try_send(EngineCommand::Shutdown);
        self.graph = GraphState::Closed;
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
