use crate::store::{LoadRegistry, UnitStatus};
use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Renders the dependency tree recorded for `target`, one line per unit with
/// its status and attempt count. A unit that already appeared is printed as
/// a back-reference instead of being expanded again.
pub fn format_trace(registry: &LoadRegistry, target: &Path) -> String {
    let mut tracer = Tracer {
        registry,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    if registry.get(target).is_some() {
        let _ = writeln!(tracer.output, "LOAD TRACE for '{}':", target.display());
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_unit(target, 1, "", "");
    } else {
        let _ = writeln!(tracer.output, "Error: '{}' is not in the registry", target.display());
    }
    tracer.output
}

struct Tracer<'a> {
    registry: &'a LoadRegistry,
    visited_at_level: HashMap<PathBuf, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_unit(&mut self, path: &Path, level: usize, branch: &str, stem: &str) {
        let name = short_name(path);
        if let Some(&first_seen) = self.visited_at_level.get(path) {
            let _ = writeln!(self.output, "{}{} -> (Ref to L{})", branch, name, first_seen);
            return;
        }
        self.visited_at_level.insert(path.to_path_buf(), level);

        let Some(unit) = self.registry.get(path) else {
            let _ = writeln!(self.output, "{}[L{}] {} [unknown]", branch, level, name);
            return;
        };

        let status = match (&unit.status, &unit.last_error) {
            (UnitStatus::Failed, Some(err)) => format!("Failed: {}", err.kind()),
            (status, _) => format!("{:?}", status),
        };
        let _ = writeln!(
            self.output,
            "{}[L{}] {} [{}, attempts={}]",
            branch, level, name, status, unit.attempts
        );

        let children = unit.resolved.clone();
        let count = children.len();
        for (i, child) in children.iter().enumerate() {
            let is_last = i + 1 == count;
            let child_branch = format!("{}{}", stem, if is_last { "`-- " } else { "|-- " });
            let child_stem = format!("{}{}", stem, if is_last { "    " } else { "|   " });
            self.trace_unit(child, level + 1, &child_branch, &child_stem);
        }
    }
}

fn short_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
