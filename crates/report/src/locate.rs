//! Resolves a report path or glob into the report files to trace.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use glob::{Paths, Pattern};
use junit_trace_core::error::{JunitTraceError, Result};
use tracing::debug;

/// Lazy sequence of absolute report file paths.
///
/// The input may hold several patterns, one per line; blank lines and `#` comments are
/// ignored. A pattern that matches a directory yields every file beneath it.
/// Lines starting with `!` exclude the files they match, or everything beneath a
/// directory they match, whatever their position in the input.
/// Directories themselves are never yielded and each file is yielded once.
pub struct ReportLocator {
    patterns: VecDeque<String>,
    exclusions: Vec<Pattern>,
    walks: Vec<Walk>,
    seen: HashSet<PathBuf>,
}

struct Walk {
    paths: Paths,
    descend: bool,
}

impl ReportLocator {
    pub fn new(input: &str) -> Result<Self> {
        let mut patterns = VecDeque::new();
        let mut exclusions = Vec::new();
        for line in input.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.strip_prefix('!') {
                Some(excluded) => exclusions.push(compile(excluded.trim())?),
                None => {
                    compile(line)?;
                    patterns.push_back(line.to_string());
                }
            }
        }

        Ok(Self {
            patterns,
            exclusions,
            walks: Vec::new(),
            seen: HashSet::new(),
        })
    }

    fn start_walk(&mut self, pattern: &str, descend: bool) -> Result<()> {
        let paths = glob::glob(pattern).map_err(|e| {
            JunitTraceError::InvalidArgument(format!("invalid report pattern {pattern}: {e}"))
        })?;
        self.walks.push(Walk { paths, descend });
        Ok(())
    }

    fn is_excluded(&self, found: &Path, absolute: &Path) -> bool {
        self.exclusions.iter().any(|exclusion| {
            found
                .ancestors()
                .chain(absolute.ancestors())
                .any(|p| !p.as_os_str().is_empty() && exclusion.matches_path(p))
        })
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| {
        JunitTraceError::InvalidArgument(format!("invalid report pattern {pattern}: {e}"))
    })
}

impl Iterator for ReportLocator {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(walk) = self.walks.last_mut() else {
                let pattern = self.patterns.pop_front()?;
                if let Err(err) = self.start_walk(&pattern, true) {
                    return Some(Err(err));
                }
                continue;
            };

            let descend = walk.descend;
            match walk.paths.next() {
                None => {
                    self.walks.pop();
                }
                Some(Err(err)) => {
                    return Some(Err(JunitTraceError::Io(format!(
                        "failed reading {}: {}",
                        err.path().display(),
                        err.error()
                    ))));
                }
                Some(Ok(path)) if path.is_dir() => {
                    debug!(dir = %path.display(), descend, "report pattern matched a directory");
                    if descend && let Err(err) = self.start_walk(&descendants(&path), false) {
                        return Some(Err(err));
                    }
                }
                Some(Ok(found)) => {
                    let path = match std::path::absolute(&found) {
                        Ok(p) => p,
                        Err(e) => {
                            return Some(Err(JunitTraceError::Io(format!(
                                "failed resolving {}: {e}",
                                found.display()
                            ))));
                        }
                    };
                    if self.is_excluded(&found, &path) {
                        debug!(path = %path.display(), "report excluded");
                        continue;
                    }
                    if self.seen.insert(path.clone()) {
                        return Some(Ok(path));
                    }
                }
            }
        }
    }
}

fn descendants(dir: &Path) -> String {
    format!("{}/**/*", Pattern::escape(&dir.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn layout() -> tempfile::TempDir {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("b.xml"), "<testsuite/>").unwrap();
        fs::write(temp.path().join("a.xml"), "<testsuite/>").unwrap();
        fs::write(temp.path().join("notes.txt"), "hi").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested").join("c.xml"), "<testsuite/>").unwrap();
        temp
    }

    fn escaped(dir: &Path) -> String {
        Pattern::escape(&dir.to_string_lossy())
    }

    fn names(found: Vec<PathBuf>) -> Vec<String> {
        found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn glob_yields_sorted_files_and_skips_directories() {
        let temp = layout();
        let found = ReportLocator::new(&format!("{}/*.xml", escaped(temp.path())))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(names(found.clone()), vec!["a.xml", "b.xml"]);
        assert!(found.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn directory_match_yields_descendants() {
        let temp = layout();
        let found = ReportLocator::new(&temp.path().join("nested").to_string_lossy())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(names(found), vec!["c.xml"]);
    }

    #[test]
    fn multiple_patterns_are_deduplicated() {
        let temp = layout();
        let input = format!(
            "# reports\n{dir}/a.xml\n\n{dir}/*.xml\n",
            dir = escaped(temp.path())
        );
        let found = ReportLocator::new(&input)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(names(found), vec!["a.xml", "b.xml"]);
    }

    #[test]
    fn negated_patterns_exclude_files_and_directories() {
        let temp = layout();
        let dir = escaped(temp.path());
        let found = ReportLocator::new(&format!("{dir}/*.xml\n!{dir}/b.xml"))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(names(found), vec!["a.xml"]);

        let found = ReportLocator::new(&format!("!{dir}/nested\n{dir}\n"))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let mut found = names(found);
        found.sort();
        assert_eq!(found, vec!["a.xml", "b.xml", "notes.txt"]);
    }

    #[test]
    fn missing_path_yields_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let mut locator =
            ReportLocator::new(&temp.path().join("absent.xml").to_string_lossy()).unwrap();
        assert!(locator.next().is_none());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(ReportLocator::new("reports/[.xml").is_err());
        assert!(ReportLocator::new("reports/*.xml\n!reports/[.xml").is_err());
    }
}
