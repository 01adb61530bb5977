//! Event plumbing for the terminal loop: terminal input on one side and the
//! session clock on the other, merged into one stream of [`BreathEvent`]s.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// What the app loop reacts to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BreathEvent {
    Key(KeyEvent),
    Resize,
    /// Session time that passed since the previous tick
    Tick { elapsed_ms: u64 },
}

/// Terminal input, without time
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Resize,
}

pub trait InputSource: Send + 'static {
    /// Wait up to `timeout` for input; None when nothing arrived
    fn next_within(&self, timeout: Duration) -> Option<InputEvent>;
}

fn recv_within(rx: &Receiver<InputEvent>, timeout: Duration) -> Option<InputEvent> {
    match rx.recv_timeout(timeout) {
        Ok(ev) => Some(ev),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => {
            // keep the pace even when input is gone
            std::thread::sleep(timeout);
            None
        }
    }
}

/// Keyboard and resize events read from the terminal on a helper thread
pub struct TerminalInput {
    rx: Receiver<InputEvent>,
}

impl TerminalInput {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let sent = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    tx.send(InputEvent::Key(key))
                }
                Ok(CtEvent::Resize(_, _)) => tx.send(InputEvent::Resize),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if sent.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for TerminalInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for TerminalInput {
    fn next_within(&self, timeout: Duration) -> Option<InputEvent> {
        recv_within(&self.rx, timeout)
    }
}

/// Input fed through a channel, for tests and headless runs
pub struct ScriptedInput {
    rx: Receiver<InputEvent>,
}

impl ScriptedInput {
    pub fn new(rx: Receiver<InputEvent>) -> Self {
        Self { rx }
    }
}

impl InputSource for ScriptedInput {
    fn next_within(&self, timeout: Duration) -> Option<InputEvent> {
        recv_within(&self.rx, timeout)
    }
}

/// How session time advances from one tick to the next
pub trait Pace: Send + 'static {
    /// How long to wait for input before ticking
    fn interval(&self) -> Duration;
    /// Session milliseconds to report for this tick
    fn elapsed_ms(&mut self) -> u64;
    /// Forget time that passed since the last tick
    fn restart(&mut self) {}
}

/// Reports real time measured between ticks. Sub-millisecond remainders
/// carry over so long sessions do not drift.
#[derive(Debug)]
pub struct WallClock {
    interval: Duration,
    last: Instant,
    carry: Duration,
}

impl WallClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
            carry: Duration::ZERO,
        }
    }
}

impl Pace for WallClock {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn elapsed_ms(&mut self) -> u64 {
        let now = Instant::now();
        let total = now.duration_since(self.last) + self.carry;
        self.last = now;
        let whole_ms = total.as_millis() as u64;
        self.carry = total - Duration::from_millis(whole_ms);
        whole_ms
    }

    fn restart(&mut self) {
        self.last = Instant::now();
        self.carry = Duration::ZERO;
    }
}

/// Every tick reports the same amount of session time
#[derive(Clone, Copy, Debug)]
pub struct FixedPace {
    interval: Duration,
    step_ms: u64,
}

impl FixedPace {
    pub fn new(interval: Duration, step_ms: u64) -> Self {
        Self { interval, step_ms }
    }
}

impl Pace for FixedPace {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn elapsed_ms(&mut self) -> u64 {
        self.step_ms
    }
}

/// Yields the next input event, or a tick once the pace interval passes
/// without input
pub struct Runner<I: InputSource, P: Pace> {
    input: I,
    pace: P,
}

impl<I: InputSource, P: Pace> Runner<I, P> {
    pub fn new(input: I, pace: P) -> Self {
        Self { input, pace }
    }

    pub fn step(&mut self) -> BreathEvent {
        match self.input.next_within(self.pace.interval()) {
            Some(InputEvent::Key(key)) => BreathEvent::Key(key),
            Some(InputEvent::Resize) => BreathEvent::Resize,
            None => BreathEvent::Tick {
                elapsed_ms: self.pace.elapsed_ms(),
            },
        }
    }

    /// Drop time spent outside a session (results screen, restart)
    pub fn restart_clock(&mut self) {
        self.pace.restart();
    }
}
