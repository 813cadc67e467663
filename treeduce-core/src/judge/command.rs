use std::{
    path::Path,
    process::{Command, Stdio},
    time::Duration,
};

use eyre::Context;
use wait_timeout::ChildExt;

use super::Judge;
use crate::TimeUsage;

/// Runs an interestingness test command with the candidate file as its last
/// argument. Exit code 0 means interesting.
pub struct CommandJudge {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    pub usage: TimeUsage,
    timeouts: usize,
}

impl CommandJudge {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            usage: TimeUsage::default(),
            timeouts: 0,
        }
    }

    /// Times the command was killed after the timeout.
    pub fn timeouts(&self) -> usize {
        self.timeouts
    }
}

impl<T> Judge<T> for CommandJudge {
    fn is_interesting(&mut self, _tree: &T, file: &Path) -> eyre::Result<bool> {
        let _counter = self.usage.count();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("fail to run interestingness test `{}`", self.program))?;
        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                crate::log!(trace, "interestingness test exit with {:?}", status.code());
                Ok(status.success())
            }
            None => {
                crate::log!(warn, "interestingness test timeout on {:?}", file);
                self.timeouts += 1;
                child.kill()?;
                child.wait()?;
                Ok(false)
            }
        }
    }

    fn describe(&self) -> String {
        format!(
            "runs: {}, avg: {}, total: {}, timeouts: {}",
            self.usage.num(),
            self.usage.avg_ms(),
            self.usage.format(),
            self.timeouts
        )
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn judge(script: &str, timeout: Duration) -> CommandJudge {
        let args = vec!["-c".to_string(), script.to_string(), "judge".to_string()];
        CommandJudge::new("sh", args, timeout)
    }

    #[test]
    fn test_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("case.txt");
        std::fs::write(&file, "keep me").unwrap();
        // `$1` is the candidate file
        let mut grep = judge("grep -q keep \"$1\"", Duration::from_secs(10));
        assert!(Judge::<()>::is_interesting(&mut grep, &(), &file).unwrap());
        std::fs::write(&file, "gone").unwrap();
        assert!(!Judge::<()>::is_interesting(&mut grep, &(), &file).unwrap());
        assert_eq!(grep.usage.num(), 2);
    }

    #[test]
    fn test_timeout_is_not_interesting() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("case.txt");
        std::fs::write(&file, "").unwrap();
        let mut slow = judge("sleep 5", Duration::from_millis(100));
        assert!(!Judge::<()>::is_interesting(&mut slow, &(), &file).unwrap());
        assert_eq!(slow.timeouts(), 1);
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let mut judge = CommandJudge::new("/no/such/program", vec![], Duration::from_secs(1));
        assert!(Judge::<()>::is_interesting(&mut judge, &(), dir.path()).is_err());
    }
}
