//! The reduction loop: ask the passes for candidates, let the judge decide,
//! and keep the smallest interesting tree.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use super::{
    manager::PassManager,
    opportunity::{Snapshot, Tree},
};
use crate::{
    config, fingerprint, format_count, format_time, is_transient_error, Judge, ReduceError,
    ReducerContext, Serialize, WorkDir,
};

#[derive(Debug, Clone, Default)]
pub struct ReductionOptions {
    /// Stop after this many candidates.
    pub max_steps: Option<usize>,
    /// Added to step numbers, used when a previous reduction is continued.
    pub step_offset: usize,
    /// The initial tree is already known to be interesting.
    pub skip_initial_check: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionStatus {
    /// No pass can reduce the tree any further.
    FixedPoint,
    /// The step limit was reached.
    BudgetExhausted,
    /// Stopped by the user.
    Interrupted,
    /// The initial tree was never judged interesting.
    NotInteresting,
}

impl ReductionStatus {
    /// Whether the reduction was stopped before reaching a fixed point.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::BudgetExhausted | Self::Interrupted)
    }
}

#[derive(Debug)]
pub struct ReductionOutcome<T> {
    pub status: ReductionStatus,
    pub steps: usize,
    pub successful_steps: usize,
    pub final_tree: T,
    pub final_file: Option<PathBuf>,
}

pub struct ReductionDriver<T: Tree, J> {
    manager: PassManager<T>,
    ctx: ReducerContext,
    judge: J,
    work_dir: WorkDir,
    running: Option<Arc<AtomicBool>>,
    fail_hashes: HashSet<u64>,
    pass_hashes: HashSet<u64>,
    cache_hits: usize,
}

impl<T: Tree + Serialize, J: Judge<T>> ReductionDriver<T, J> {
    pub fn new(manager: PassManager<T>, ctx: ReducerContext, judge: J, work_dir: WorkDir) -> Self {
        Self {
            manager,
            ctx,
            judge,
            work_dir,
            running: None,
            fail_hashes: HashSet::new(),
            pass_hashes: HashSet::new(),
            cache_hits: 0,
        }
    }

    /// The reduction stops at the next step once `running` is cleared.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    pub fn judge(&self) -> &J {
        &self.judge
    }

    pub fn context(&self) -> &ReducerContext {
        &self.ctx
    }

    pub fn work_dir(&self) -> &WorkDir {
        &self.work_dir
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map_or(true, |r| r.load(Ordering::SeqCst))
    }

    /// Reduce `initial`, whose serialized form is `initial_file`.
    pub fn do_reduction(
        &mut self,
        initial: T,
        initial_file: &Path,
        options: &ReductionOptions,
    ) -> eyre::Result<ReductionOutcome<T>> {
        let start_at = Instant::now();
        let initial_size = initial.size();
        if options.skip_initial_check {
            crate::log!(info, "continue reduction for {}", self.work_dir.variant());
        } else {
            crate::log!(info, "start reduction for {}", self.work_dir.variant());
            if !self.check_initial(&initial, initial_file)? {
                self.work_dir.create_marker(config::NOT_INTERESTING)?;
                return Ok(ReductionOutcome {
                    status: ReductionStatus::NotInteresting,
                    steps: 0,
                    successful_steps: 0,
                    final_tree: initial,
                    final_file: None,
                });
            }
            crate::log!(info, "initial state is interesting, proceeding with reduction");
        }

        let mut baseline = Snapshot::new(initial);
        let mut steps = 0;
        let mut successful_steps = 0;
        let status = loop {
            if options.max_steps.map_or(false, |max| steps >= max) {
                crate::log!(info, "stop reduction due to hitting step limit {}", steps);
                break ReductionStatus::BudgetExhausted;
            }
            if !self.is_running() {
                crate::log!(warn, "reduction is interrupted");
                break ReductionStatus::Interrupted;
            }
            let Some(candidate) = self.next_candidate(&baseline)? else {
                break ReductionStatus::FixedPoint;
            };
            steps += 1;
            let step = steps + options.step_offset;
            let file = self.work_dir.save_step(step, candidate.tree())?;
            #[cfg(feature = "verbose")]
            crate::log!(
                trace,
                "candidate of step {}:\n{}",
                step,
                candidate.tree().serialize()?
            );
            let interesting = self.is_interesting_with_cache(candidate.tree(), &file)?;
            self.work_dir.mark_step(step, interesting)?;
            crate::log!(
                info,
                "{} step {}: {} by {}, size: {}, successful: {}",
                format_time(start_at.elapsed().as_secs()),
                step,
                if interesting { "success" } else { "fail" },
                self.manager.current_pass_name().unwrap_or("-"),
                candidate.tree().size(),
                successful_steps + usize::from(interesting)
            );
            if interesting {
                successful_steps += 1;
                baseline = candidate;
            }
            self.manager.notify_interesting(interesting);
        };

        let final_tree = baseline.into_tree();
        let final_file = self.work_dir.save_final(&final_tree)?;
        if status.is_incomplete() {
            self.work_dir.create_marker(config::REDUCTION_INCOMPLETE)?;
        }
        let stats = serde_json::json!({
            "variant": self.work_dir.variant(),
            "status": format!("{status:?}"),
            "seed": self.ctx.seed(),
            "steps": steps,
            "step_offset": options.step_offset,
            "successful_steps": successful_steps,
            "initial_size": initial_size,
            "final_size": final_tree.size(),
            "cache_hits": self.cache_hits,
            "elapsed_secs": start_at.elapsed().as_secs_f64(),
            "judge": self.judge.describe(),
        });
        self.work_dir.save_stats(&stats)?;
        crate::log!(
            info,
            "reduction finished: {:?}, {} steps, {} successful, size {} -> {}",
            status,
            format_count(steps),
            format_count(successful_steps),
            initial_size,
            final_tree.size()
        );
        Ok(ReductionOutcome {
            status,
            steps,
            successful_steps,
            final_tree,
            final_file: Some(final_file),
        })
    }

    /// Flaky tests get a few chances on the initial tree.
    fn check_initial(&mut self, initial: &T, initial_file: &Path) -> eyre::Result<bool> {
        for i in 1..=config::NUM_INITIAL_TRIES {
            if self.judge.is_interesting(initial, initial_file)? {
                return Ok(true);
            }
            crate::log!(info, "result from initial state is not interesting (attempt {})", i);
        }
        crate::log!(info, "tried {} times, stopping", config::NUM_INITIAL_TRIES);
        Ok(false)
    }

    fn next_candidate(&mut self, baseline: &Snapshot<T>) -> eyre::Result<Option<Snapshot<T>>> {
        let mut attempts = 0;
        loop {
            match self.manager.apply_reduction(baseline, &mut self.ctx) {
                Ok(candidate) => return Ok(candidate),
                Err(err) if is_transient_error(&err) => {
                    attempts += 1;
                    if attempts >= config::MAX_APPLY_ATTEMPTS {
                        return Err(err);
                    }
                    crate::log!(warn, "fail to apply reduction (attempt {}): {}", attempts, err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_interesting_with_cache(&mut self, tree: &T, file: &Path) -> eyre::Result<bool> {
        let hash = fingerprint(tree);
        if self.fail_hashes.contains(&hash) {
            crate::log!(debug, "candidate {:016x} is known to be not interesting", hash);
            self.cache_hits += 1;
            return Ok(false);
        }
        if self.pass_hashes.contains(&hash) {
            return Err(ReduceError::ReductionLoop(hash).into());
        }
        let interesting = self.judge.is_interesting(tree, file)?;
        if interesting {
            self.pass_hashes.insert(hash);
        } else {
            self.fail_hashes.insert(hash);
        }
        Ok(interesting)
    }
}
