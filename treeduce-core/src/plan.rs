//! Passes used to reduce block trees, as described by the config.

use crate::{
    config::{Config, Strategy},
    tree::BlockTree,
    BoxedPass, PassManager, Phase, RandomizedPass, ReducerContext, SystematicPass,
};

pub fn build_pass_manager(config: &Config, ctx: &ReducerContext) -> PassManager<BlockTree> {
    let mut manager = PassManager::new(config.round_policy());
    let max_granularity = config.max_granularity.unwrap_or(usize::MAX);
    if config.phase_enabled(Phase::Initial) {
        // whole blocks first
        for finder in config.finders.iter().filter(|f| **f == crate::tree::FinderType::Block) {
            let pass = SystematicPass::with_maximum_granularity(finder.finder(), max_granularity);
            manager.push_pass(Phase::Initial, Box::new(pass));
        }
    }
    if config.phase_enabled(Phase::Core) {
        for finder in &config.finders {
            let pass: BoxedPass<BlockTree> = match config.strategy {
                Strategy::Systematic => Box::new(SystematicPass::with_maximum_granularity(
                    finder.finder(),
                    max_granularity,
                )),
                Strategy::Randomized => Box::new(RandomizedPass::new(finder.finder(), ctx)),
            };
            manager.push_pass(Phase::Core, pass);
        }
    }
    if config.phase_enabled(Phase::Exhaustive) {
        // one opportunity at a time
        for finder in &config.finders {
            manager.push_pass(
                Phase::Exhaustive,
                Box::new(SystematicPass::with_maximum_granularity(finder.finder(), 1)),
            );
        }
    }
    crate::log!(
        info,
        "{} passes, policy: {:?}",
        manager.num_passes(),
        manager.policy()
    );
    manager
}

#[test]
fn test_build_pass_manager() {
    use crate::config::PhaseType;
    use crate::tree::FinderType;

    let ctx = ReducerContext::new(0);
    let mut config = Config::new("case.c", "true");
    assert_eq!(build_pass_manager(&config, &ctx).num_passes(), 7);

    config.phases = vec![PhaseType::Core];
    config.finders = vec![FinderType::Stmt];
    let manager = build_pass_manager(&config, &ctx);
    assert_eq!(manager.num_passes(), 1);
    assert_eq!(manager.policy(), config.round_policy());

    config.phases = vec![PhaseType::Initial];
    assert_eq!(build_pass_manager(&config, &ctx).num_passes(), 0);
}
