use super::plan::PlanError;
use std::collections::HashMap;
use std::path::PathBuf;

/// The metadata extracted from one discovered unit: its path and the
/// resolved paths it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRecord {
    pub path: PathBuf,
    pub dependencies: Vec<PathBuf>,
}

/// Performs a Topological Sort using Depth-First Search (DFS).
///
/// Returns paths such that every dependency appears before its consumer.
/// Roots are visited in path order and dependencies in declaration order, so
/// the result does not depend on the order of `records`.
pub fn sort(records: &[UnitRecord]) -> Result<Vec<PathBuf>, PlanError> {
    let mut sorted: Vec<&UnitRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));

    let index: HashMap<&PathBuf, usize> = sorted.iter().enumerate().map(|(i, r)| (&r.path, i)).collect();
    let mut state = vec![VisitState::None; sorted.len()];
    let mut stack = Vec::new();
    let mut order = Vec::with_capacity(sorted.len());

    for i in 0..sorted.len() {
        if state[i] == VisitState::None {
            visit(i, &sorted, &index, &mut state, &mut stack, &mut order)?;
        }
    }

    Ok(order)
}

#[derive(Clone, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting, // Used for cycle detection
    Visited,
}

fn visit(
    idx: usize,
    records: &[&UnitRecord],
    index: &HashMap<&PathBuf, usize>,
    state: &mut Vec<VisitState>,
    stack: &mut Vec<usize>,
    order: &mut Vec<PathBuf>,
) -> Result<(), PlanError> {
    match state[idx] {
        VisitState::Visited => return Ok(()),
        VisitState::Visiting => {
            let start = stack.iter().position(|&s| s == idx).unwrap_or(0);
            let members = stack[start..]
                .iter()
                .map(|&s| records[s].path.display().to_string())
                .collect();
            return Err(PlanError::Cycle { members });
        }
        VisitState::None => state[idx] = VisitState::Visiting,
    }
    stack.push(idx);

    let record = records[idx];
    for dep in &record.dependencies {
        let Some(&dep_idx) = index.get(dep) else {
            return Err(PlanError::UnknownDependency {
                module: record.path.display().to_string(),
                dependency: dep.display().to_string(),
            });
        };
        visit(dep_idx, records, index, state, stack, order)?;
    }

    stack.pop();
    state[idx] = VisitState::Visited;
    order.push(record.path.clone());
    Ok(())
}
