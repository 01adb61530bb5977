use crate::catalog::{Catalog, Step, StepKind};
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    Stopped,
}

/// Notifications produced by a state transition, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerEvent {
    PhaseChanged {
        step_index: usize,
        name: String,
        instruction: String,
        is_hold: bool,
        awaits_action: bool,
        cycle: u32,
    },
    RoundCompleted {
        round: u32,
    },
    Completed {
        elapsed_ms: u64,
        cycles: u32,
        rounds: u32,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencerError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("cannot {operation} a session that is {status}")]
    InvalidTransition {
        operation: &'static str,
        status: SessionStatus,
    },
}

/// Walks a step catalog on an externally driven clock.
///
/// The sequencer never reads wall-clock time itself: the owner calls
/// [`Sequencer::tick`] with the time that passed since the previous call.
/// All runtime state lives here and is discarded by [`Sequencer::reset`]
/// or the next [`Sequencer::start`].
#[derive(Debug, Clone)]
pub struct Sequencer {
    catalog: Option<Catalog>,
    step_index: usize,
    cycle_count: u32,
    round_count: u32,
    cycles_in_round: u32,
    block_passes: u32,
    target_ms: u64,
    elapsed_ms: u64,
    phase_remaining_ms: u64,
    status: SessionStatus,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self {
            catalog: None,
            step_index: 0,
            cycle_count: 0,
            round_count: 0,
            cycles_in_round: 0,
            block_passes: 0,
            target_ms: 0,
            elapsed_ms: 0,
            phase_remaining_ms: 0,
            status: SessionStatus::Idle,
        }
    }
}

/// Checks everything but emptiness, which `start` rejects when it takes the
/// first step.
fn validate(catalog: &Catalog, target_duration_ms: u64) -> Result<(), SequencerError> {
    let invalid = |msg: String| Err(SequencerError::InvalidConfiguration(msg));

    if target_duration_ms == 0 {
        return invalid("target duration must be positive".into());
    }
    if let Some(step) = catalog
        .steps
        .iter()
        .find(|s| s.kind == StepKind::Timed && s.duration_ms == 0)
    {
        return invalid(format!("step '{}' has no duration", step.name));
    }
    if let Some(block) = catalog.repeat {
        if block.steps == 0 || block.steps > catalog.len() || block.times == 0 {
            return invalid(format!(
                "repeat block of {} steps x{} does not fit a {}-step catalog",
                block.steps,
                block.times,
                catalog.len()
            ));
        }
    }
    if let Some(policy) = catalog.rounds {
        if policy.max_rounds == 0 || policy.cycles_per_round == 0 {
            return invalid("round policy needs at least one round of one cycle".into());
        }
    }
    Ok(())
}

fn phase_event(step_index: usize, step: &Step, cycle: u32) -> SequencerEvent {
    SequencerEvent::PhaseChanged {
        step_index,
        name: step.name.clone(),
        instruction: step.instruction.clone(),
        is_hold: step.is_hold,
        awaits_action: step.waits_for_action(),
        cycle,
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a session at the first step. On error nothing changes.
    pub fn start(
        &mut self,
        catalog: Catalog,
        target_duration_ms: u64,
    ) -> Result<SequencerEvent, SequencerError> {
        let Some(first) = catalog.steps.first() else {
            return Err(SequencerError::InvalidConfiguration(
                "catalog has no steps".into(),
            ));
        };
        validate(&catalog, target_duration_ms)?;

        let event = phase_event(0, first, 1);
        let phase_remaining_ms = first.duration_ms as u64;
        debug!(
            "session started: {} steps, target {}ms",
            catalog.len(),
            target_duration_ms
        );

        *self = Self {
            catalog: Some(catalog),
            cycle_count: 1,
            target_ms: target_duration_ms,
            phase_remaining_ms,
            status: SessionStatus::Running,
            ..Self::default()
        };
        Ok(event)
    }

    /// Advance the clocks by `delta_ms`, crossing as many step boundaries as
    /// fit. A boundary that coincides with the end of the session completes
    /// it instead of starting the next step.
    pub fn tick(&mut self, delta_ms: u64) -> Result<Vec<SequencerEvent>, SequencerError> {
        self.ensure_running("tick")?;

        let mut events = Vec::new();
        let mut budget = delta_ms.min(self.target_ms.saturating_sub(self.elapsed_ms));

        loop {
            let waits = self.current_step().map_or(true, Step::waits_for_action);
            if waits || self.phase_remaining_ms > budget {
                if !waits {
                    self.phase_remaining_ms -= budget;
                }
                self.elapsed_ms += budget;
                break;
            }

            self.elapsed_ms += self.phase_remaining_ms;
            budget -= self.phase_remaining_ms;
            self.phase_remaining_ms = 0;
            if self.elapsed_ms >= self.target_ms {
                break;
            }

            self.next_step(&mut events);
            if self.status != SessionStatus::Running {
                return Ok(events);
            }
        }

        if self.elapsed_ms >= self.target_ms {
            self.complete(&mut events);
        }
        Ok(events)
    }

    /// Move past the current step on user request; the only way out of a
    /// hold-until-action step.
    pub fn advance(&mut self) -> Result<Vec<SequencerEvent>, SequencerError> {
        self.ensure_running("advance")?;

        let mut events = Vec::new();
        self.next_step(&mut events);
        Ok(events)
    }

    /// Returns true when this call stopped a running session
    pub fn stop(&mut self) -> bool {
        if self.status != SessionStatus::Running {
            return false;
        }
        self.status = SessionStatus::Stopped;
        debug!("session stopped after {}ms", self.elapsed_ms);
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn ensure_running(&self, operation: &'static str) -> Result<(), SequencerError> {
        if self.status == SessionStatus::Running {
            return Ok(());
        }
        warn!("ignoring {operation} while session is {}", self.status);
        Err(SequencerError::InvalidTransition {
            operation,
            status: self.status,
        })
    }

    fn next_step(&mut self, events: &mut Vec<SequencerEvent>) {
        let Some(catalog) = self.catalog.as_ref() else {
            return;
        };
        let len = catalog.len();
        let repeat = catalog.repeat;
        let rounds = catalog.rounds;
        let next = self.step_index + 1;

        if let Some(block) = repeat {
            if next == block.steps {
                self.block_passes += 1;
                if self.block_passes < block.times {
                    self.enter_step(0, events);
                    return;
                }
            }
        }

        if next < len {
            self.enter_step(next, events);
            return;
        }

        self.block_passes = 0;
        if let Some(policy) = rounds {
            self.cycles_in_round += 1;
            if self.cycles_in_round >= policy.cycles_per_round {
                self.cycles_in_round = 0;
                self.round_count += 1;
                events.push(SequencerEvent::RoundCompleted {
                    round: self.round_count,
                });
                if self.round_count >= policy.max_rounds {
                    self.complete(events);
                    return;
                }
            }
        }

        self.cycle_count += 1;
        self.enter_step(0, events);
    }

    fn enter_step(&mut self, index: usize, events: &mut Vec<SequencerEvent>) {
        self.step_index = index;
        let Some(step) = self.catalog.as_ref().and_then(|c| c.steps.get(index)) else {
            return;
        };
        self.phase_remaining_ms = step.duration_ms as u64;
        debug!("phase -> {} (cycle {})", step.name, self.cycle_count);
        events.push(phase_event(index, step, self.cycle_count));
    }

    fn complete(&mut self, events: &mut Vec<SequencerEvent>) {
        self.status = SessionStatus::Completed;
        debug!(
            "session completed after {}ms, {} cycles",
            self.elapsed_ms, self.cycle_count
        );
        events.push(SequencerEvent::Completed {
            elapsed_ms: self.elapsed_ms,
            cycles: self.cycle_count,
            rounds: self.round_count,
        });
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn has_finished(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Completed | SessionStatus::Stopped
        )
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.catalog.as_ref()?.steps.get(self.step_index)
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// Completed rounds
    pub fn round_count(&self) -> u32 {
        self.round_count
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn target_ms(&self) -> u64 {
        self.target_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.target_ms.saturating_sub(self.elapsed_ms)
    }

    /// None while waiting on the user
    pub fn phase_remaining_ms(&self) -> Option<u64> {
        match self.current_step() {
            Some(step) if !step.waits_for_action() => Some(self.phase_remaining_ms),
            _ => None,
        }
    }

    /// `(current, total)` breath while inside a repeated block
    pub fn breath_progress(&self) -> Option<(u32, u32)> {
        let block = self.catalog.as_ref()?.repeat?;
        (self.step_index < block.steps).then_some((self.block_passes + 1, block.times))
    }

    /// Fraction of the target duration that has elapsed
    pub fn progress(&self) -> f64 {
        if self.target_ms == 0 {
            return 0.0;
        }
        (self.elapsed_ms as f64 / self.target_ms as f64).min(1.0)
    }
}
