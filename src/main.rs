// ssq - MIDI step sequencer
// Control thread: controller input, LED feedback and pattern files

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ringbuf::traits::Consumer;

use ssq::config::{Config, DEFAULT_CONFIG_PATH};
use ssq::control::{ControlAction, ControlSurface};
use ssq::messaging::{Command, SequencerEvent, create_control_channel};
use ssq::midi::{
    ControlInput, MidiDeviceManager, MidiEvent, MidiSink, MidirSink, NullSink, PooledOutput,
};
use ssq::param::ConnectionRules;
use ssq::sequencer::{Pattern, SequencerHandle, write_pattern_file};

// Controller messages arrive at human speed; 256 covers a full fader sweep
const CONTROL_RINGBUFFER_CAPACITY: usize = 256;
const CONTROL_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ssq::ConfigError),

    #[error("Failed to start sequencer thread: {0}")]
    Thread(#[from] std::io::Error),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load(&config_path)?;

    let rules = Arc::new(ConnectionRules::standard());
    let mut pattern = match config.rng_seed {
        Some(seed) => Pattern::with_seed(Arc::clone(&rules), seed),
        None => Pattern::new(Arc::clone(&rules)),
    };
    if config.pattern_file.exists() {
        match Pattern::read_file(&config.pattern_file, Arc::clone(&rules)) {
            Ok(loaded) => pattern.adopt(loaded),
            Err(e) => log::error!("Failed to load {}: {}", config.pattern_file.display(), e),
        }
    }

    let surface = ControlSurface::new(pattern.clone());

    let seq_output = config.seq_output.clone();
    let note_pool_size = config.note_pool_size;
    let handle = SequencerHandle::spawn(pattern, config.sequencer_options(), move || {
        PooledOutput::new(open_outputs(&seq_output), note_pool_size)
    })?;

    let (control_tx, mut control_rx) = create_control_channel(CONTROL_RINGBUFFER_CAPACITY);
    let _control_input = match &config.control_input {
        Some(name) => ControlInput::connect(name, control_tx)
            .inspect_err(|e| log::warn!("No control surface: {}", e))
            .ok(),
        None => {
            log::warn!("No control input configured");
            None
        }
    };

    let feedback: Box<dyn MidiSink> = match &config.control_output {
        Some(name) => match MidiDeviceManager::new().open_output(name) {
            Ok(connection) => Box::new(MidirSink::new(vec![Some(connection)])),
            Err(e) => {
                log::warn!("No control feedback: {}", e);
                Box::new(NullSink)
            }
        },
        None => Box::new(NullSink),
    };

    let mut app = App {
        handle,
        surface,
        feedback,
        pattern_file: config.pattern_file.clone(),
        rules,
    };
    app.run(&mut control_rx);
    app.shutdown();
    Ok(())
}

/// Open the sequencer output ports; runs on the sequencer thread
fn open_outputs(names: &[String]) -> MidirSink {
    let manager = MidiDeviceManager::new();
    let connections = names
        .iter()
        .map(|name| {
            manager
                .open_output(name)
                .inspect_err(|e| log::warn!("Output device unavailable: {}", e))
                .ok()
        })
        .collect();
    MidirSink::new(connections)
}

struct App {
    handle: SequencerHandle,
    surface: ControlSurface,
    feedback: Box<dyn MidiSink>,
    pattern_file: PathBuf,
    rules: Arc<ConnectionRules>,
}

impl App {
    fn run(&mut self, control_rx: &mut ssq::messaging::ControlConsumer) {
        self.perform_all(self.surface.refresh());
        log::info!("ssq running, F4 quits");

        loop {
            while let Some(message) = control_rx.try_pop() {
                let actions = self.surface.handle(message);
                if !self.perform_all(actions) {
                    return;
                }
            }

            while let Some(event) = self.handle.poll_event() {
                self.on_event(event);
            }

            if let Some(action) = self.surface.tick() {
                self.perform(action);
            }

            thread::sleep(CONTROL_POLL_INTERVAL);
        }
    }

    /// Returns false once a quit was requested
    fn perform_all(&mut self, actions: Vec<ControlAction>) -> bool {
        let mut keep_running = true;
        for action in actions {
            keep_running &= self.perform(action);
        }
        keep_running
    }

    fn perform(&mut self, action: ControlAction) -> bool {
        match action {
            ControlAction::Send(command) => {
                if self.handle.send(command).is_err() {
                    log::warn!("Command queue full, dropped command");
                }
            }
            ControlAction::Edit { address, edit } => {
                // The mirror only follows edits the sequencer will see
                match self.handle.send(Command::edit(address, edit)) {
                    Ok(()) => {
                        let leds = self.surface.apply(address, edit);
                        self.perform_all(leds);
                    }
                    Err(_) => log::warn!("Command queue full, dropped edit of {:?}", address),
                }
            }
            ControlAction::Feedback { cc, value } => {
                let event = MidiEvent::ControlChange {
                    channel: 0,
                    controller: cc,
                    value,
                };
                self.feedback.send(0, event, 0);
            }
            ControlAction::SavePattern => {
                log::info!("Saving pattern...");
                if self.handle.send(Command::RequestSnapshot).is_err() {
                    log::warn!("Command queue full, pattern not saved");
                }
            }
            ControlAction::LoadPattern => {
                log::info!("Loading pattern...");
                match Pattern::read_file(&self.pattern_file, Arc::clone(&self.rules)) {
                    Ok(pattern) => {
                        let mirror = pattern.clone();
                        match self.handle.send(Command::ApplyPattern(Box::new(pattern))) {
                            Ok(()) => {
                                let leds = self.surface.load(mirror);
                                self.perform_all(leds);
                            }
                            Err(_) => log::warn!("Command queue full, pattern not loaded"),
                        }
                    }
                    Err(e) => {
                        log::error!("Failed to load {}: {}", self.pattern_file.display(), e)
                    }
                }
            }
            ControlAction::Quit => return false,
        }
        true
    }

    fn on_event(&mut self, event: SequencerEvent) {
        match &event {
            SequencerEvent::PatternSnapshot(bytes) => {
                if let Err(e) = write_pattern_file(&self.pattern_file, bytes) {
                    log::error!("Failed to save {}: {}", self.pattern_file.display(), e);
                }
            }
            SequencerEvent::TempoChanged(bpm) => log::debug!("Tempo {} BPM", bpm),
            _ => {}
        }

        let actions = self.surface.on_event(&event);
        self.perform_all(actions);
    }

    fn shutdown(self) {
        log::info!("Shutting down");
        if self.handle.shutdown().is_none() {
            log::warn!("Sequencer thread did not exit cleanly");
        }
    }
}
