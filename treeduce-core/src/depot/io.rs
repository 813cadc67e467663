use std::{
    fs,
    io::prelude::*,
    path::{Path, PathBuf},
};

use eyre::Context;
use regex::Regex;

use super::Serialize;
use crate::config;

/// Directory of one reduction, stores every step, the final result and the
/// marker files.
///
/// Files are named after the input: `<variant>_reduced_0007_success.<ext>`
/// is the 7th candidate, which was found interesting.
pub struct WorkDir {
    path: PathBuf,
    variant: String,
    extension: Option<String>,
}

impl WorkDir {
    /// Create the directory of depot for reducing `input`.
    pub fn new(path: impl Into<PathBuf>, input: &Path) -> eyre::Result<Self> {
        let path = path.into();
        if !path.exists() {
            fs::create_dir_all(&path)
                .with_context(|| format!("fail to create work dir {path:?}"))?;
        }
        let variant = input
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| eyre::eyre!("input path {input:?} has no file name"))?
            .to_string();
        let extension = input
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string());
        Ok(Self {
            path,
            variant,
            extension,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    fn file_name(&self, stem: &str) -> PathBuf {
        match &self.extension {
            Some(ext) => self.path.join(format!("{stem}.{ext}")),
            None => self.path.join(stem),
        }
    }

    /// Copy of the input inside the work dir.
    pub fn input_file(&self) -> PathBuf {
        self.file_name(&self.variant)
    }

    /// Copy `input` into the work dir, unless it is already there.
    pub fn copy_input(&self, input: &Path) -> eyre::Result<PathBuf> {
        let dst = self.input_file();
        let same = match (fs::canonicalize(input), fs::canonicalize(&dst)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !same {
            fs::copy(input, &dst).with_context(|| format!("fail to copy {input:?} to {dst:?}"))?;
        }
        Ok(dst)
    }

    /// File of the `step`-th candidate; `verdict` is known once it is judged.
    pub fn step_file(&self, step: usize, verdict: Option<bool>) -> PathBuf {
        let mut stem = format!("{}_reduced_{step:04}", self.variant);
        match verdict {
            Some(true) => stem.push_str("_success"),
            Some(false) => stem.push_str("_fail"),
            None => {}
        }
        self.file_name(&stem)
    }

    pub fn final_file(&self) -> PathBuf {
        self.file_name(&format!("{}_reduced_final", self.variant))
    }

    pub fn exception_file(&self) -> PathBuf {
        self.path.join(format!("{}.exception", self.variant))
    }

    pub fn stats_file(&self) -> PathBuf {
        self.path
            .join(format!("{}{}", self.variant, config::STATS_FILE_SUFFIX))
    }

    /// Save the `step`-th candidate, before it is judged.
    pub fn save_step<S: Serialize>(&self, step: usize, tree: &S) -> eyre::Result<PathBuf> {
        let file = self.step_file(step, None);
        crate::log!(debug, "save candidate at file: {:?}", &file);
        self.save_file(&file, tree)?;
        Ok(file)
    }

    /// Rename the `step`-th candidate once it is judged.
    pub fn mark_step(&self, step: usize, interesting: bool) -> eyre::Result<PathBuf> {
        let from = self.step_file(step, None);
        let to = self.step_file(step, Some(interesting));
        fs::rename(&from, &to).with_context(|| format!("fail to rename {from:?}"))?;
        Ok(to)
    }

    pub fn save_final<S: Serialize>(&self, tree: &S) -> eyre::Result<PathBuf> {
        let file = self.final_file();
        self.save_file(&file, tree)?;
        Ok(file)
    }

    fn save_file<S: Serialize>(&self, file: &Path, tree: &S) -> eyre::Result<()> {
        let buf = tree.serialize()?;
        let mut f = fs::File::create(file)?;
        f.write_all(buf.as_bytes())?;
        f.flush()?;
        Ok(())
    }

    pub fn save_stats(&self, stats: &serde_json::Value) -> eyre::Result<PathBuf> {
        let file = self.stats_file();
        let buf = serde_json::to_string_pretty(stats)?;
        fs::write(&file, buf)?;
        Ok(file)
    }

    pub fn save_exception(&self, err: &eyre::Report) -> eyre::Result<PathBuf> {
        let file = self.exception_file();
        let mut f = fs::File::create(&file)?;
        writeln!(f, "{err:#?}")?;
        Ok(file)
    }

    pub fn create_marker(&self, marker: &str) -> eyre::Result<()> {
        fs::File::create(self.path.join(marker))?;
        Ok(())
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.path.join(marker).is_file()
    }

    pub fn remove_marker(&self, marker: &str) -> eyre::Result<()> {
        let file = self.path.join(marker);
        if file.exists() {
            fs::remove_file(file)?;
        }
        Ok(())
    }

    /// Largest step number among judged step files, or only among the
    /// successful ones.
    pub fn latest_step(&self, success_only: bool) -> eyre::Result<Option<usize>> {
        let verdict = if success_only { "success" } else { "success|fail" };
        let pattern = format!(
            r"^{}_reduced_(\d+)_({verdict})(\..*)?$",
            regex::escape(&self.variant)
        );
        let re = Regex::new(&pattern)?;
        let mut latest = None;
        for entry in self.path.read_dir()? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(step) = re
                .captures(name)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<usize>().ok())
            {
                latest = latest.max(Some(step));
            }
        }
        Ok(latest)
    }

    /// Read back a file in the work dir.
    pub fn read_to_string(&self, file: &Path) -> eyre::Result<String> {
        fs::read_to_string(file).with_context(|| format!("fail to read {file:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::ToyTree;

    #[test]
    fn test_step_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = WorkDir::new(dir.path(), Path::new("/tmp/shader.frag")).unwrap();
        assert_eq!(work_dir.variant(), "shader");
        let name = |p: PathBuf| p.file_name().unwrap().to_str().unwrap().to_string();
        assert_eq!(name(work_dir.step_file(3, None)), "shader_reduced_0003.frag");
        assert_eq!(
            name(work_dir.step_file(12, Some(true))),
            "shader_reduced_0012_success.frag"
        );
        assert_eq!(
            name(work_dir.step_file(12345, Some(false))),
            "shader_reduced_12345_fail.frag"
        );
        assert_eq!(name(work_dir.final_file()), "shader_reduced_final.frag");
        assert_eq!(name(work_dir.exception_file()), "shader.exception");

        let work_dir = WorkDir::new(dir.path(), Path::new("case")).unwrap();
        assert_eq!(name(work_dir.step_file(1, None)), "case_reduced_0001");
    }

    #[test]
    fn test_latest_step() {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = WorkDir::new(dir.path(), Path::new("a.txt")).unwrap();
        assert_eq!(work_dir.latest_step(false).unwrap(), None);
        let tree = ToyTree::with_depths(&[0, 0]);
        for (step, ok) in [(1, true), (2, false), (3, true), (4, false)] {
            work_dir.save_step(step, &tree).unwrap();
            work_dir.mark_step(step, ok).unwrap();
        }
        // not judged yet, and another variant
        work_dir.save_step(5, &tree).unwrap();
        fs::write(dir.path().join("ab_reduced_0009_success.txt"), "").unwrap();
        assert_eq!(work_dir.latest_step(false).unwrap(), Some(4));
        assert_eq!(work_dir.latest_step(true).unwrap(), Some(3));
        assert_eq!(
            work_dir
                .read_to_string(&work_dir.step_file(3, Some(true)))
                .unwrap(),
            "0\n1"
        );
    }

    #[test]
    fn test_markers() {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = WorkDir::new(dir.path().join("out"), Path::new("a.txt")).unwrap();
        assert!(!work_dir.has_marker(config::REDUCTION_INCOMPLETE));
        work_dir.create_marker(config::REDUCTION_INCOMPLETE).unwrap();
        assert!(work_dir.has_marker(config::REDUCTION_INCOMPLETE));
        work_dir.remove_marker(config::REDUCTION_INCOMPLETE).unwrap();
        assert!(!work_dir.has_marker(config::REDUCTION_INCOMPLETE));
        work_dir.remove_marker(config::REDUCTION_INCOMPLETE).unwrap();
    }
}
