use crate::debugger::error::Error;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// Names like `<string>` or `<stdin>` denote code without a backing file.
pub fn is_pseudo_file(file: &str) -> bool {
    file.starts_with('<') && file.ends_with('>')
}

/// Bring a source file name into the form agents report it in: an absolute,
/// lexically normalized path (case-folded on Windows) pointing to the source
/// file rather than to compiled bytecode. Pseudo-files are returned unchanged.
pub fn canonicalize(file: &str) -> String {
    if is_pseudo_file(file) {
        return file.to_string();
    }

    let path = Path::new(file);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut normal = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other.as_os_str()),
        }
    }

    let mut canonical = normal.to_string_lossy().into_owned();
    if cfg!(windows) {
        canonical = canonical.to_lowercase();
    }
    if let Some(stem) = canonical
        .strip_suffix(".pyc")
        .or_else(|| canonical.strip_suffix(".pyo"))
    {
        canonical = format!("{stem}.py");
    }
    canonical
}

/// Line breakpoint in a source file of the debugged program.
///
/// Two breakpoints are equal if they point to the same place and are both
/// (or both not) temporary, the condition is not part of the identity.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    file: String,
    line: Option<u32>,
    temporary: bool,
    condition: Option<String>,
}

impl Breakpoint {
    pub fn new(file: &str, line: u32) -> Self {
        Self::build(file, Some(line), false, None)
    }

    pub fn build(file: &str, line: Option<u32>, temporary: bool, condition: Option<String>) -> Self {
        Self {
            file: canonicalize(file),
            line,
            temporary,
            condition,
        }
    }

    pub fn temporary(self) -> Self {
        Self {
            temporary: true,
            ..self
        }
    }

    pub fn with_condition(self, condition: impl Into<String>) -> Self {
        Self {
            condition: Some(condition.into()),
            ..self
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// Arguments of a `do_set_breakpoint` request.
    pub fn set_args(&self) -> Vec<Value> {
        vec![
            json!(self.file),
            json!(self.line),
            json!(self.temporary),
            json!(self.condition),
        ]
    }

    /// Arguments of a `do_clear_breakpoint` request.
    pub fn clear_args(&self) -> Vec<Value> {
        vec![json!(self.file), json!(self.line)]
    }
}

impl PartialEq for Breakpoint {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file && self.line == other.line && self.temporary == other.temporary
    }
}

impl Eq for Breakpoint {}

impl Hash for Breakpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file.hash(state);
        self.line.hash(state);
        self.temporary.hash(state);
    }
}

impl Display for Breakpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.temporary {
            f.write_str("Temporary ")?;
        }
        write!(f, "Breakpoint on file {}", self.file)?;
        if let Some(line) = self.line {
            write!(f, " on line {line}")?;
        }
        if let Some(ref cond) = self.condition {
            write!(f, " if {cond}")?;
        }
        Ok(())
    }
}

/// Set of breakpoints known to the frontend, kept independently of an agent
/// connection and pushed to every agent on startup.
#[derive(Debug, Default)]
pub struct BreakpointRegistry {
    breakpoints: HashSet<Breakpoint>,
}

impl BreakpointRegistry {
    /// Insert a breakpoint, replacing an equal one (a new condition wins).
    /// Return `true` if no equal breakpoint was registered before.
    pub fn add(&mut self, brkpt: Breakpoint) -> bool {
        self.breakpoints.replace(brkpt).is_none()
    }

    pub fn remove(&mut self, brkpt: &Breakpoint) -> Result<Breakpoint, Error> {
        self.breakpoints
            .take(brkpt)
            .ok_or_else(|| Error::BreakpointNotFound(brkpt.to_string()))
    }

    /// Remove every breakpoint in a file, return removed ones.
    pub fn remove_file(&mut self, file: &str) -> Vec<Breakpoint> {
        let file = canonicalize(file);
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .breakpoints
            .drain()
            .partition(|brkpt| brkpt.file == file);
        self.breakpoints = kept.into_iter().collect();
        sorted(removed)
    }

    pub fn contains(&self, brkpt: &Breakpoint) -> bool {
        self.breakpoints.contains(brkpt)
    }

    /// All registered breakpoints ordered by file and line.
    pub fn all(&self) -> Vec<Breakpoint> {
        sorted(self.breakpoints.iter().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}

fn sorted(mut breakpoints: Vec<Breakpoint>) -> Vec<Breakpoint> {
    breakpoints.sort_by(|a, b| (&a.file, a.line, a.temporary).cmp(&(&b.file, b.line, b.temporary)));
    breakpoints
}
