// --- Reduction ---
// Percentage of opportunities a randomized pass takes at first
pub const DEFAULT_MAX_PERCENTAGE_TO_REDUCE: u32 = 50;
// Decrease of that percentage after each rejected candidate
pub const DEFAULT_AGGRESSION_DECREASE_STEP: u32 = 5;
// Times of judging the initial input before giving up
pub const NUM_INITIAL_TRIES: usize = 5;
// Times of asking the passes again after a transient failure
pub const MAX_APPLY_ATTEMPTS: usize = 3;
// Consecutive candidates from one pass before the manager moves on
pub const MAX_STEPS_PER_PASS: usize = 200;
pub const DEFAULT_MAX_STEPS: usize = 250;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
// Lines carrying this marker are not reduced unless `--reduce-everywhere`
pub static KEEP_MARKER: &str = "reducer:keep";

// --- Work dir ---
pub static NOT_INTERESTING: &str = "NOT_INTERESTING";
pub static REDUCTION_INCOMPLETE: &str = "REDUCTION_INCOMPLETE";
pub static STATS_FILE_SUFFIX: &str = "_reduction_stats.json";
pub static LOG_BASENAME: &str = "reducer";

// -----------------------------------------------------

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::{tree::FinderType, Phase, ReduceError, RoundPolicy, SelectionSkew};

/// Configuration parsed from command line
#[derive(Debug, Clone, Parser)]
#[clap(name = "treeduce")]
#[clap(version = "1.0.0", author = "Peng Chen")]
pub struct Config {
    /// File to reduce.
    #[clap(value_parser)]
    pub input: PathBuf,
    /// Interestingness test, it is run with the candidate file as last
    /// argument and should exit with 0 if the candidate is interesting.
    #[clap(value_parser)]
    pub test: String,
    /// Extra arguments of the interestingness test, before the candidate file.
    #[clap(value_parser, last = true)]
    pub test_args: Vec<String>,
    /// Work directory for candidates, final result and logs.
    #[clap(long, short, value_parser, default_value = "reduction")]
    pub output: PathBuf,
    /// Seed of the random generator, a random one is used if it is not given.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,
    /// Maximal number of candidates, 0 for no limit.
    #[clap(long, value_parser, default_value_t = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,
    /// Percentage of opportunities a randomized pass takes at first.
    #[clap(long, value_parser, default_value_t = DEFAULT_MAX_PERCENTAGE_TO_REDUCE)]
    pub max_percentage: u32,
    /// Decrease of that percentage after each rejected candidate.
    #[clap(long, value_parser, default_value_t = DEFAULT_AGGRESSION_DECREASE_STEP)]
    pub aggression_step: u32,
    /// Maximal number of opportunities a systematic pass takes at once.
    #[clap(long, value_parser)]
    pub max_granularity: Option<usize>,
    /// Limitation of the interestingness test, whose unit is seconds.
    #[clap(long, value_parser, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
    /// Passes used in the core phase.
    #[clap(long, value_enum, value_parser, default_value = "randomized")]
    pub strategy: Strategy,
    /// When to run another round over a phase, defaults to what suits the strategy.
    #[clap(long, value_enum, value_parser)]
    pub policy: Option<PolicyType>,
    /// Consecutive candidates of one pass, with the replenish policy.
    #[clap(long, value_parser, default_value_t = MAX_STEPS_PER_PASS)]
    pub max_steps_per_pass: usize,
    /// Enabled phases.
    #[clap(
        long,
        value_enum,
        value_parser,
        value_delimiter = ',',
        default_value = "initial,core,exhaustive"
    )]
    pub phases: Vec<PhaseType>,
    /// Enabled finders.
    #[clap(
        long,
        value_enum,
        value_parser,
        value_delimiter = ',',
        default_value = "block,stmt,unwrap"
    )]
    pub finders: Vec<FinderType>,
    /// How randomized passes pick opportunities.
    #[clap(long, value_enum, value_parser, default_value = "uniform")]
    pub skew: SelectionSkew,
    /// Also reduce lines marked with `reducer:keep`.
    #[clap(long)]
    pub reduce_everywhere: bool,
    /// Continue an incomplete reduction in the output directory.
    #[clap(long)]
    pub continue_previous_reduction: bool,
    /// Log every candidate.
    #[clap(long, short)]
    pub verbose: bool,
}

impl Config {
    /// Config for reducing `input` with `test`, with default values otherwise.
    pub fn new(input: impl Into<PathBuf>, test: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            test: test.into(),
            test_args: vec![],
            output: PathBuf::from("reduction"),
            seed: None,
            max_steps: DEFAULT_MAX_STEPS,
            max_percentage: DEFAULT_MAX_PERCENTAGE_TO_REDUCE,
            aggression_step: DEFAULT_AGGRESSION_DECREASE_STEP,
            max_granularity: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            strategy: Strategy::default(),
            policy: None,
            max_steps_per_pass: MAX_STEPS_PER_PASS,
            phases: PhaseType::ALL.to_vec(),
            finders: FinderType::ALL.to_vec(),
            skew: SelectionSkew::default(),
            reduce_everywhere: false,
            continue_previous_reduction: false,
            verbose: false,
        }
    }

    /// Check the values, and pick a seed if none is given.
    pub fn validate(&mut self) -> eyre::Result<()> {
        if self.max_percentage > 100 {
            return Err(ReduceError::InvalidConfig(format!(
                "--max-percentage should be in [0, 100], got {}",
                self.max_percentage
            ))
            .into());
        }
        if self.max_granularity == Some(0) {
            return Err(ReduceError::InvalidConfig(
                "--max-granularity should be positive".to_string(),
            )
            .into());
        }
        if self.max_steps_per_pass == 0 {
            return Err(ReduceError::InvalidConfig(
                "--max-steps-per-pass should be positive".to_string(),
            )
            .into());
        }
        if self.timeout == 0 {
            return Err(
                ReduceError::InvalidConfig("--timeout should be positive".to_string()).into(),
            );
        }
        if self.finders.is_empty() {
            return Err(ReduceError::InvalidConfig("no finder is enabled".to_string()).into());
        }
        if !self.input.is_file() {
            return Err(ReduceError::InvalidConfig(format!(
                "input {:?} is not a file",
                self.input
            ))
            .into());
        }
        self.phases.sort();
        self.phases.dedup();
        let mut finders = vec![];
        for f in self.finders.drain(..) {
            if !finders.contains(&f) {
                finders.push(f);
            }
        }
        self.finders = finders;
        if self.seed.is_none() {
            self.seed = Some(rand::random::<u32>() as u64);
        }
        Ok(())
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or_default()
    }

    pub fn max_steps(&self) -> Option<usize> {
        (self.max_steps > 0).then_some(self.max_steps)
    }

    pub fn round_policy(&self) -> RoundPolicy {
        let policy = self.policy.unwrap_or(match self.strategy {
            Strategy::Systematic => PolicyType::Granularity,
            Strategy::Randomized => PolicyType::Replenish,
        });
        match policy {
            PolicyType::Granularity => RoundPolicy::Granularity,
            PolicyType::Replenish => RoundPolicy::Replenish {
                max_steps_per_pass: self.max_steps_per_pass,
            },
        }
    }

    pub fn phase_enabled(&self, phase: Phase) -> bool {
        self.phases.iter().any(|p| p.phase() == phase)
    }
}

pub fn parse_config() -> eyre::Result<Config> {
    let mut config = Config::parse();
    config.validate()?;
    Ok(config)
}

/// Kind of passes used in the core phase
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum Strategy {
    /// Every opportunity, in chunks of decreasing size
    Systematic,
    /// Random batches of decreasing size
    #[default]
    Randomized,
}

/// Round policy of the pass manager
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum PolicyType {
    Granularity,
    Replenish,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum PhaseType {
    Initial,
    Core,
    Exhaustive,
}

impl PhaseType {
    pub const ALL: [PhaseType; 3] = [PhaseType::Initial, PhaseType::Core, PhaseType::Exhaustive];

    pub fn phase(self) -> Phase {
        match self {
            PhaseType::Initial => Phase::Initial,
            PhaseType::Core => Phase::Core,
            PhaseType::Exhaustive => Phase::Exhaustive,
        }
    }
}

#[test]
fn test_parse_args() {
    let config = Config::try_parse_from([
        "treeduce",
        "case.c",
        "./check.sh",
        "--seed",
        "7",
        "--strategy",
        "systematic",
        "--finders",
        "stmt,unwrap",
        "--max-steps",
        "0",
        "--",
        "-q",
    ])
    .unwrap();
    assert_eq!(config.input, PathBuf::from("case.c"));
    assert_eq!(config.test, "./check.sh");
    assert_eq!(config.test_args, vec!["-q".to_string()]);
    assert_eq!(config.seed(), 7);
    assert_eq!(config.max_steps(), None);
    assert_eq!(config.finders, vec![FinderType::Stmt, FinderType::Unwrap]);
    assert_eq!(config.phases, PhaseType::ALL.to_vec());
    assert_eq!(config.round_policy(), RoundPolicy::Granularity);
    assert_eq!(config.skew, SelectionSkew::Uniform);

    let config = Config::try_parse_from(["treeduce", "case.c", "./check.sh"]).unwrap();
    assert_eq!(config.max_steps(), Some(DEFAULT_MAX_STEPS));
    assert_eq!(config.strategy, Strategy::Randomized);
    assert_eq!(
        config.round_policy(),
        RoundPolicy::Replenish {
            max_steps_per_pass: MAX_STEPS_PER_PASS
        }
    );
}

#[test]
fn test_validate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("case.c");
    std::fs::write(&input, "a;\n").unwrap();

    let mut config = Config::new(&input, "true");
    config.validate().unwrap();
    assert!(config.seed.is_some());

    let mut config = Config::new(&input, "true");
    config.max_percentage = 101;
    assert!(config.validate().is_err());

    let mut config = Config::new(dir.path().join("missing.c"), "true");
    let err = config.validate().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReduceError>(),
        Some(ReduceError::InvalidConfig(_))
    ));
}
