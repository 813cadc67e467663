//! Reduce a text file with an interestingness test.
//!
//! treeduce [options] <input> <test> [-- <test args>...]

use treeduce::{Config, ReductionStatus, WorkDir};

fn init_logger(config: &Config) {
    use flexi_logger::*;

    let output_file = FileSpec::default()
        .directory(&config.output)
        .basename(treeduce::LOG_BASENAME);
    let level = if cfg!(feature = "verbose") {
        "trace"
    } else if config.verbose {
        "debug"
    } else {
        "info"
    };
    Logger::try_with_env_or_str(level)
        .unwrap() // Write all error, warn, and info messages
        .log_to_file(output_file)
        .duplicate_to_stdout(Duplicate::Info)
        .format_for_files(opt_format)
        .adaptive_format_for_stdout(AdaptiveFormat::Opt)
        .rotate(
            // If the program runs long enough,
            Criterion::Size(1 << 30),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(3),
        )
        .start()
        .unwrap();
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let config = treeduce::parse_config()?;
    std::fs::create_dir_all(&config.output)?;
    init_logger(&config);
    log::info!("treeduce starting ...");
    log::info!("config: {:?}", config);
    let running = treeduce::new_running_state()?;
    let res = treeduce::run_reducer(&config, Some(running));
    match &res {
        Ok(outcome) => {
            match outcome.status {
                ReductionStatus::NotInteresting => {
                    log::warn!("the input is not interesting, nothing to reduce")
                }
                status => log::info!(
                    "reduction status: {:?}, steps: {}, successful: {}",
                    status,
                    outcome.steps,
                    outcome.successful_steps
                ),
            }
            if let Some(f) = &outcome.final_file {
                log::info!("final result: {:?}", f);
            }
        }
        Err(err) => {
            let work_dir = WorkDir::new(&config.output, &config.input)?;
            let path = work_dir.save_exception(err)?;
            log::error!("reducer error is wrote into {:?}", path);
        }
    }
    log::info!("treeduce ending ...");
    res?;
    Ok(())
}
