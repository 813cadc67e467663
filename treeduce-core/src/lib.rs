mod config;
mod depot;
mod error;
mod judge;
mod plan;
mod reduce;
#[cfg(test)]
mod test;
pub mod tree;
mod utils;

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

pub use config::*;
pub use depot::*;
pub use error::*;
pub use judge::*;
pub use plan::build_pass_manager;
pub use reduce::*;
pub use utils::*;

use tree::BlockTree;

/// Get a running state, which is cleared by Ctrl-C.
pub fn new_running_state() -> eyre::Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        crate::log!(warn, "Ending reduction.");
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

/// Find where to start from: the input, or the last successful step of an
/// incomplete reduction.
fn prepare_start(config: &Config, work_dir: &WorkDir) -> eyre::Result<(PathBuf, ReductionOptions)> {
    let mut options = ReductionOptions {
        max_steps: config.max_steps(),
        ..Default::default()
    };
    if !config.continue_previous_reduction {
        let input = work_dir.copy_input(&config.input)?;
        return Ok((input, options));
    }
    if !work_dir.has_marker(config::REDUCTION_INCOMPLETE) {
        return Err(ReduceError::InvalidConfig(format!(
            "there is no incomplete reduction in {:?}",
            work_dir.path()
        ))
        .into());
    }
    work_dir.remove_marker(config::REDUCTION_INCOMPLETE)?;
    options.step_offset = work_dir.latest_step(false)?.unwrap_or(0);
    options.skip_initial_check = true;
    let start = match work_dir.latest_step(true)? {
        Some(step) => work_dir.step_file(step, Some(true)),
        None => work_dir.input_file(),
    };
    Ok((start, options))
}

/// Reduce the input file described by `config` with its interestingness test.
pub fn run_reducer(
    config: &Config,
    running: Option<Arc<AtomicBool>>,
) -> eyre::Result<ReductionOutcome<BlockTree>> {
    let work_dir = WorkDir::new(&config.output, &config.input)?;
    let (start, options) = prepare_start(config, &work_dir)?;
    crate::log!(info, "reduce from file: {:?}, options: {:?}", start, options);
    let buf = work_dir.read_to_string(&start)?;
    let tree = BlockTree::parse(&buf)?;
    let ctx = ReducerContext::from_config(config)?;
    let manager = build_pass_manager(config, &ctx);
    let judge = CommandJudge::new(
        config.test.clone(),
        config.test_args.clone(),
        Duration::from_secs(config.timeout),
    );
    let mut driver = ReductionDriver::new(manager, ctx, judge, work_dir);
    if let Some(running) = running {
        driver = driver.with_running_flag(running);
    }
    let outcome = driver.do_reduction(tree, &start, &options)?;
    crate::log!(info, "judge: {}", Judge::<BlockTree>::describe(driver.judge()));
    Ok(outcome)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const INPUT: &str = "a;\nf() {\n  needle;\n  b;\n}\nc;\n";

    const NESTED: &str = "\
a;
f() {
  if (x) { // check
    g() {
      needle;
    }
  } else {
    b;
  }
}
";

    fn config_for(dir: &std::path::Path, source: &str) -> Config {
        let input = dir.join("case.c");
        std::fs::write(&input, source).unwrap();
        let mut config = Config::new(&input, "sh");
        config.test_args = vec![
            "-c".to_string(),
            "grep -q needle \"$1\"".to_string(),
            "judge".to_string(),
        ];
        config.output = dir.join("out");
        config.seed = Some(1);
        config.max_steps = 0;
        config.timeout = 10;
        config.validate().unwrap();
        config
    }

    fn config(dir: &std::path::Path) -> Config {
        config_for(dir, INPUT)
    }

    #[test]
    fn test_run_reducer() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let outcome = run_reducer(&config, None).unwrap();
        assert_eq!(outcome.status, ReductionStatus::FixedPoint);
        assert_eq!(outcome.final_tree.to_source(), "  needle;\n");
        let final_file = outcome.final_file.unwrap();
        assert_eq!(std::fs::read_to_string(final_file).unwrap(), "  needle;\n");
        assert!(config.output.join("case.c").is_file());
    }

    #[test]
    fn test_continue_previous_reduction() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.max_steps = 2;
        let outcome = run_reducer(&config, None).unwrap();
        assert_eq!(outcome.status, ReductionStatus::BudgetExhausted);
        assert!(config.output.join(config::REDUCTION_INCOMPLETE).is_file());

        config.max_steps = 0;
        config.continue_previous_reduction = true;
        let outcome = run_reducer(&config, None).unwrap();
        assert_eq!(outcome.status, ReductionStatus::FixedPoint);
        assert_eq!(outcome.final_tree.to_source(), "  needle;\n");
        assert!(!config.output.join(config::REDUCTION_INCOMPLETE).exists());
        let work_dir = WorkDir::new(&config.output, &config.input).unwrap();
        assert_eq!(work_dir.latest_step(false).unwrap(), Some(2 + outcome.steps));

        // nothing left to continue
        assert!(run_reducer(&config, None).is_err());
    }

    #[test]
    fn test_reduce_nested_blocks() {
        for strategy in [Strategy::Systematic, Strategy::Randomized] {
            let dir = tempfile::tempdir().unwrap();
            let mut config = config_for(dir.path(), NESTED);
            config.strategy = strategy;
            let outcome = run_reducer(&config, None).unwrap();
            assert_eq!(outcome.status, ReductionStatus::FixedPoint);
            assert_eq!(outcome.final_tree.to_source(), "      needle;\n");
            // every judged candidate is a valid tree
            for entry in std::fs::read_dir(&config.output).unwrap() {
                let path = entry.unwrap().path();
                let name = path.file_name().unwrap().to_string_lossy().to_string();
                if name.contains("_reduced_") {
                    let buf = std::fs::read_to_string(&path).unwrap();
                    assert!(BlockTree::parse(&buf).is_ok(), "{name} does not parse");
                }
            }
        }
    }
}
