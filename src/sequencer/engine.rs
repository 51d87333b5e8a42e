// Sequencer engine - Application context owning pattern, clock and output
// Runs on its own thread and is the only writer of sequencing state

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ringbuf::traits::{Consumer, Producer};

use crate::messaging::channels::{
    CommandConsumer, CommandProducer, EventConsumer, EventProducer, create_command_channel,
    create_event_channel,
};
use crate::messaging::command::Command;
use crate::messaging::event::SequencerEvent;
use crate::midi::output::NoteOutput;

use super::clock::Clock;
use super::edit::{ParamAddress, ParamEdit};
use super::line::LineParam;
use super::pattern::Pattern;
use super::transport::SharedSequencerState;
use super::{NUM_LINES, NUM_SEQUENCES, PPQ};

/// Sequencer thread settings
#[derive(Debug, Clone)]
pub struct SequencerOptions {
    pub poll_interval: Duration,
    pub command_queue_capacity: usize,
    pub event_queue_capacity: usize,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(100),
            command_queue_capacity: 256,
            event_queue_capacity: 1024,
        }
    }
}

pub struct Sequencer<O: NoteOutput> {
    pattern: Pattern,
    clock: Clock,
    output: O,
    commands: CommandConsumer,
    events: EventProducer,
    shared: Arc<SharedSequencerState>,
    running: bool,
}

impl<O: NoteOutput> Sequencer<O> {
    pub fn new(
        pattern: Pattern,
        output: O,
        commands: CommandConsumer,
        events: EventProducer,
        shared: Arc<SharedSequencerState>,
    ) -> Self {
        let clock = Clock::new(pattern.tempo());
        shared.set_tempo(pattern.tempo());
        Self {
            pattern,
            clock,
            output,
            commands,
            events,
            shared,
            running: false,
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn shared(&self) -> &Arc<SharedSequencerState> {
        &self.shared
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// One loop iteration: apply queued commands, then advance the clock
    ///
    /// Commands are only ever applied here, between pulses.
    pub fn tick(&mut self, now_us: u64) {
        while let Some(command) = self.commands.try_pop() {
            self.handle_command(command, now_us);
        }

        if !self.running {
            return;
        }

        let pattern = &mut self.pattern;
        let output = &mut self.output;
        let events = &mut self.events;
        self.clock.update(now_us, |pulse, elapsed_ms| {
            pattern.pulse(pulse, elapsed_ms, &mut *output);
            if pulse % i64::from(PPQ) == 0 && events.try_push(SequencerEvent::Beat(pulse)).is_err() {
                log::warn!("Event queue full, beat {} dropped", pulse);
            }
        });
        self.shared
            .set_position(self.clock.current_pulse(), self.clock.elapsed_ms());
    }

    pub fn handle_command(&mut self, command: Command, now_us: u64) {
        match command {
            Command::Start => self.start(now_us),
            Command::Stop => self.stop(),
            Command::Edit { address, edit } => self.edit(address, edit),
            Command::ApplyPattern(pattern) => self.apply_pattern(*pattern),
            Command::RequestSnapshot => {
                let image = self.pattern.to_bytes();
                self.emit(SequencerEvent::PatternSnapshot(image));
            }
        }
    }

    /// Start playback; restarts from the top when already running
    pub fn start(&mut self, now_us: u64) {
        if self.running {
            log::info!("Sequencer restarted");
        } else {
            log::info!("Sequencer started at {} BPM", self.pattern.tempo());
        }

        // Output timestamps are relative to the clock start
        self.clock.set_tempo(self.pattern.tempo(), PPQ);
        self.clock.start(now_us);
        self.pattern.reset(&mut self.output, self.clock.elapsed_ms());
        self.running = true;
        self.shared.set_position(-1, 0);
        self.shared.set_playing(true);
        self.emit(SequencerEvent::Started);
    }

    /// Stop playback and silence held notes; no-op when already stopped
    pub fn stop(&mut self) {
        if !self.running {
            log::debug!("Stop ignored, sequencer not running");
            return;
        }
        self.running = false;
        self.output.stop_all(self.clock.elapsed_ms());
        self.shared.set_playing(false);
        log::info!("Sequencer stopped at pulse {}", self.clock.current_pulse());
        self.emit(SequencerEvent::Stopped);
    }

    fn edit(&mut self, address: ParamAddress, edit: ParamEdit) {
        for event in self.pattern.edit(address, edit) {
            if let SequencerEvent::TempoChanged(bpm) = event {
                // Takes effect on the next clock update
                self.clock.set_tempo(bpm, PPQ);
                self.shared.set_tempo(bpm);
            }
            self.emit(event);
        }
    }

    fn apply_pattern(&mut self, pattern: Pattern) {
        self.pattern.reset(&mut self.output, self.clock.elapsed_ms());
        self.pattern.adopt(pattern);

        let bpm = self.pattern.tempo();
        self.clock.set_tempo(bpm, PPQ);
        self.shared.set_tempo(bpm);
        log::info!("Pattern applied ({} BPM)", bpm);

        self.emit(SequencerEvent::PatternApplied);
        self.emit(SequencerEvent::TempoChanged(bpm));
        for sequence in 0..NUM_SEQUENCES {
            for line in 0..NUM_LINES {
                let address = ParamAddress::Line {
                    sequence,
                    line,
                    param: LineParam::Mode,
                };
                if let Some(param) = self.pattern.param(address) {
                    let event = SequencerEvent::param_changed(address, param);
                    self.emit(event);
                }
            }
        }
    }

    fn emit(&mut self, event: SequencerEvent) {
        if let Err(event) = self.events.try_push(event) {
            log::warn!("Event queue full, dropping {:?}", event);
        }
    }

    /// Stop playback and hand back the pattern
    pub fn into_pattern(mut self) -> Pattern {
        self.stop();
        self.pattern
    }
}

/// Control thread side of a running sequencer thread
pub struct SequencerHandle {
    commands: CommandProducer,
    events: EventConsumer,
    shared: Arc<SharedSequencerState>,
    quit: Arc<AtomicBool>,
    thread: Option<JoinHandle<Pattern>>,
}

impl SequencerHandle {
    /// Spawn the sequencer thread
    ///
    /// The output is built on the sequencer thread, so it does not need to
    /// be `Send`.
    pub fn spawn<O, F>(
        pattern: Pattern,
        options: SequencerOptions,
        make_output: F,
    ) -> std::io::Result<Self>
    where
        O: NoteOutput + 'static,
        F: FnOnce() -> O + Send + 'static,
    {
        let (commands, command_rx) = create_command_channel(options.command_queue_capacity);
        let (event_tx, events) = create_event_channel(options.event_queue_capacity);
        let shared = SharedSequencerState::new();
        let quit = Arc::new(AtomicBool::new(false));

        let thread_shared = Arc::clone(&shared);
        let thread_quit = Arc::clone(&quit);
        let poll_interval = options.poll_interval;

        let thread = thread::Builder::new()
            .name("sequencer".to_string())
            .spawn(move || {
                let epoch = Instant::now();
                let mut sequencer =
                    Sequencer::new(pattern, make_output(), command_rx, event_tx, thread_shared);

                while !thread_quit.load(Ordering::Acquire) {
                    sequencer.tick(epoch.elapsed().as_micros() as u64);
                    thread::sleep(poll_interval);
                }

                sequencer.into_pattern()
            })?;

        Ok(Self {
            commands,
            events,
            shared,
            quit,
            thread: Some(thread),
        })
    }

    /// Queue a command; hands it back when the queue is full
    pub fn send(&mut self, command: Command) -> Result<(), Command> {
        self.commands.try_push(command).inspect_err(|_| {
            log::warn!("Command queue full");
        })
    }

    pub fn start(&mut self) -> bool {
        self.send(Command::Start).is_ok()
    }

    pub fn stop(&mut self) -> bool {
        self.send(Command::Stop).is_ok()
    }

    pub fn edit(&mut self, address: ParamAddress, edit: ParamEdit) -> bool {
        self.send(Command::edit(address, edit)).is_ok()
    }

    /// Next pending event, if any
    pub fn poll_event(&mut self) -> Option<SequencerEvent> {
        self.events.try_pop()
    }

    pub fn shared(&self) -> &Arc<SharedSequencerState> {
        &self.shared
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_playing()
    }

    /// Stop the thread and return the final pattern
    pub fn shutdown(mut self) -> Option<Pattern> {
        self.join()
    }

    fn join(&mut self) -> Option<Pattern> {
        self.quit.store(true, Ordering::Release);
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(pattern) => Some(pattern),
            Err(_) => {
                log::error!("Sequencer thread panicked");
                None
            }
        }
    }
}

impl Drop for SequencerHandle {
    fn drop(&mut self) {
        self.join();
    }
}
