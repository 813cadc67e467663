//! Scheduling of passes: which pass produces the next candidate, and when the
//! whole reduction has reached a fixed point.

use std::fmt;

use super::{
    opportunity::{Snapshot, Tree},
    pass::ReductionPass,
};
use crate::{config, ReducerContext};

pub type BoxedPass<T> = Box<dyn ReductionPass<T>>;

/// Phases are run in order; a later phase is only entered once the previous
/// one stopped making progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Initial,
    Core,
    Exhaustive,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Initial, Phase::Core, Phase::Exhaustive];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initial => write!(f, "initial"),
            Phase::Core => write!(f, "core"),
            Phase::Exhaustive => write!(f, "exhaustive"),
        }
    }
}

/// When is another round over the passes of a phase worthwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundPolicy {
    /// Another round is run if something was accepted, or if some pass has
    /// not swept at its finest granularity yet.
    #[default]
    Granularity,
    /// Exhausted passes are replenished, and a pass is left after
    /// `max_steps_per_pass` consecutive candidates. Another round is run
    /// only if something was accepted.
    Replenish { max_steps_per_pass: usize },
}

impl RoundPolicy {
    pub fn replenish() -> Self {
        Self::Replenish {
            max_steps_per_pass: config::MAX_STEPS_PER_PASS,
        }
    }
}

pub struct PassManager<T: Tree> {
    phases: [Vec<BoxedPass<T>>; 3],
    policy: RoundPolicy,
    phase: usize,
    pass_index: usize,
    another_round_worthwhile: bool,
    current_pass_steps: usize,
    finished: bool,
}

impl<T: Tree> PassManager<T> {
    pub fn new(policy: RoundPolicy) -> Self {
        Self {
            phases: [vec![], vec![], vec![]],
            policy,
            phase: 0,
            pass_index: 0,
            another_round_worthwhile: false,
            current_pass_steps: 0,
            finished: false,
        }
    }

    /// Append `passes` to `phase`.
    pub fn with_phase(mut self, phase: Phase, passes: Vec<BoxedPass<T>>) -> Self {
        self.phases[phase.index()].extend(passes);
        self
    }

    pub fn push_pass(&mut self, phase: Phase, pass: BoxedPass<T>) {
        self.phases[phase.index()].push(pass);
    }

    pub fn policy(&self) -> RoundPolicy {
        self.policy
    }

    pub fn phase(&self) -> Phase {
        Phase::ALL[self.phase]
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn num_passes(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    /// Name of the pass that produced the last candidate.
    pub fn current_pass_name(&self) -> Option<&'static str> {
        if self.finished {
            return None;
        }
        self.phases[self.phase]
            .get(self.pass_index)
            .map(|pass| pass.name())
    }

    /// Ask the passes for a reduced copy of `tree`. `None` means that no pass
    /// can reduce it anymore; every later call returns `None` as well.
    pub fn apply_reduction(
        &mut self,
        tree: &Snapshot<T>,
        ctx: &mut ReducerContext,
    ) -> eyre::Result<Option<Snapshot<T>>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            if self.phases[self.phase].is_empty() {
                self.enter_next_phase();
                continue;
            }
            if let RoundPolicy::Replenish { max_steps_per_pass } = self.policy {
                if self.current_pass_steps >= max_steps_per_pass {
                    crate::log!(
                        debug,
                        "leave pass {} after {} steps",
                        self.phases[self.phase][self.pass_index].name(),
                        self.current_pass_steps
                    );
                    self.leave_pass();
                    continue;
                }
            }
            let pass = &mut self.phases[self.phase][self.pass_index];
            if let Some(candidate) = pass.try_apply_reduction(tree, ctx)? {
                self.current_pass_steps += 1;
                return Ok(Some(candidate));
            }
            crate::log!(debug, "pass {} has no step, {}", pass.name(), pass.describe());
            match self.policy {
                RoundPolicy::Granularity => {
                    if !pass.reached_minimum_granularity() {
                        self.another_round_worthwhile = true;
                    }
                }
                RoundPolicy::Replenish { .. } => pass.replenish(),
            }
            self.leave_pass();
        }
    }

    /// Feedback on the last candidate returned by `apply_reduction`.
    pub fn notify_interesting(&mut self, interesting: bool) {
        if self.finished {
            return;
        }
        if interesting {
            self.another_round_worthwhile = true;
        }
        if let Some(pass) = self.phases[self.phase].get_mut(self.pass_index) {
            pass.notify_interesting(interesting);
        }
    }

    fn leave_pass(&mut self) {
        self.phases[self.phase][self.pass_index].suspend();
        self.current_pass_steps = 0;
        self.pass_index += 1;
        if self.pass_index < self.phases[self.phase].len() {
            return;
        }
        self.pass_index = 0;
        if self.another_round_worthwhile {
            self.another_round_worthwhile = false;
            crate::log!(debug, "start another round of {} phase", self.phase());
        } else {
            self.enter_next_phase();
        }
    }

    fn enter_next_phase(&mut self) {
        self.pass_index = 0;
        self.another_round_worthwhile = false;
        if self.phase + 1 < Phase::ALL.len() {
            self.phase += 1;
            crate::log!(info, "enter {} phase", self.phase());
        } else {
            crate::log!(info, "no more to reduce");
            self.finished = true;
        }
    }
}
