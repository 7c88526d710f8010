//! Dependency resolution: turning a registry into an execution plan.
//!
//! Plans are produced with Kahn's algorithm. Whenever several steps are ready at once the
//! earliest-declared one goes first, so the same registry always yields the same plan.

use std::collections::{BTreeSet, HashSet};

use derive_more::{Deref, Display};

use crate::{error::DeployError, step::StepRegistry};

/// Step names in an order where every prerequisite precedes its dependents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deref, Display)]
#[display("{}", _0.join(" -> "))]
pub struct ExecutionPlan(Vec<String>);

impl ExecutionPlan {
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

/// Resolve every registered step.
pub fn resolve(registry: &StepRegistry) -> Result<ExecutionPlan, DeployError> {
    let all: Vec<usize> = (0..registry.len()).collect();
    order(registry, &all)
}

/// Names of the steps `targets` select directly, in declaration order, without their
/// prerequisites.
///
/// A target is either a step name or a tag. An empty target list selects everything.
pub fn targeted_steps<S: AsRef<str>>(
    registry: &StepRegistry,
    targets: &[S],
) -> Result<Vec<String>, DeployError> {
    let positions = target_positions(registry, targets)?;
    Ok(positions
        .into_iter()
        .map(|i| registry.steps()[i].name().to_string())
        .collect())
}

fn target_positions<S: AsRef<str>>(
    registry: &StepRegistry,
    targets: &[S],
) -> Result<BTreeSet<usize>, DeployError> {
    if targets.is_empty() {
        return Ok((0..registry.len()).collect());
    }

    let mut positions = BTreeSet::new();
    for target in targets {
        let target = target.as_ref();
        if let Some(position) = registry.position(target) {
            positions.insert(position);
            continue;
        }
        let tagged: Vec<usize> = registry
            .tagged(target)
            .filter_map(|s| registry.position(s.name()))
            .collect();
        if tagged.is_empty() {
            return Err(DeployError::UnknownTarget {
                target: target.to_string(),
            });
        }
        positions.extend(tagged);
    }
    Ok(positions)
}

/// Resolve the steps selected by `targets` plus all of their transitive prerequisites.
///
/// A target is either a step name or a tag. An empty target list selects everything.
pub fn resolve_targets<S: AsRef<str>>(
    registry: &StepRegistry,
    targets: &[S],
) -> Result<ExecutionPlan, DeployError> {
    if targets.is_empty() {
        return resolve(registry);
    }

    let mut pending: Vec<usize> = target_positions(registry, targets)?.into_iter().collect();
    let mut selected = BTreeSet::new();
    while let Some(position) = pending.pop() {
        if !selected.insert(position) {
            continue;
        }
        let step = &registry.steps()[position];
        for dependency in step.prerequisites() {
            let dep = registry
                .position(dependency)
                .ok_or_else(|| DeployError::UnknownDependency {
                    step: step.name().to_string(),
                    dependency: dependency.clone(),
                })?;
            pending.push(dep);
        }
    }

    let selected: Vec<usize> = selected.into_iter().collect();
    order(registry, &selected)
}

/// Kahn's algorithm over the sub-graph made of `selected` (declaration indices, ascending).
fn order(registry: &StepRegistry, selected: &[usize]) -> Result<ExecutionPlan, DeployError> {
    let steps = registry.steps();
    let in_selection: HashSet<usize> = selected.iter().copied().collect();

    // Unresolved prerequisite count per step, and the reverse edges.
    let mut remaining = vec![0usize; steps.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];

    for &i in selected {
        let step = &steps[i];
        for dependency in step.prerequisites() {
            let dep = registry
                .position(dependency)
                .ok_or_else(|| DeployError::UnknownDependency {
                    step: step.name().to_string(),
                    dependency: dependency.clone(),
                })?;
            if in_selection.contains(&dep) {
                remaining[i] += 1;
                dependents[dep].push(i);
            }
        }
    }

    let mut ready: BTreeSet<usize> = selected
        .iter()
        .copied()
        .filter(|&i| remaining[i] == 0)
        .collect();
    let mut plan = Vec::with_capacity(selected.len());

    while let Some(next) = ready.pop_first() {
        plan.push(steps[next].name().to_string());
        for &dependent in &dependents[next] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if plan.len() < selected.len() {
        let start = selected
            .iter()
            .copied()
            .find(|&i| remaining[i] > 0)
            .expect("an unplanned step has unresolved prerequisites");
        return Err(DeployError::CyclicDependency {
            step: steps[cycle_member(registry, &remaining, start)].name().to_string(),
        });
    }

    tracing::debug!(steps = plan.len(), "Resolved execution plan");
    Ok(ExecutionPlan(plan))
}

/// Walk unresolved prerequisites from `start` until a step repeats; that step lies on a cycle.
///
/// Every step left with unresolved prerequisites has at least one prerequisite in the same
/// state, so the walk never dead-ends.
fn cycle_member(registry: &StepRegistry, remaining: &[usize], start: usize) -> usize {
    let steps = registry.steps();
    let mut seen = HashSet::new();
    let mut current = start;

    while seen.insert(current) {
        current = steps[current]
            .prerequisites()
            .iter()
            .filter_map(|name| registry.position(name))
            .find(|&dep| remaining[dep] > 0)
            .unwrap_or(current);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{Step, tests::Fixed};
    use alloy_core::primitives::Address;

    fn step(name: &str, deps: &[&str]) -> Step {
        deps.iter()
            .fold(Step::new(name, Fixed(Address::ZERO)), |s, d| s.depends_on(*d))
    }

    fn registry(steps: &[(&str, &[&str])]) -> StepRegistry {
        let mut registry = StepRegistry::new();
        for (name, deps) in steps {
            registry.register(step(name, deps)).unwrap();
        }
        registry
    }

    fn assert_topological(registry: &StepRegistry, plan: &ExecutionPlan) {
        for step in registry.steps() {
            let at = plan.iter().position(|n| n == step.name());
            let Some(at) = at else { continue };
            for dep in step.prerequisites() {
                let dep_at = plan
                    .iter()
                    .position(|n| n == dep)
                    .unwrap_or_else(|| panic!("{dep} missing from plan"));
                assert!(dep_at < at, "{dep} must run before {}", step.name());
            }
        }
    }

    #[test]
    fn test_fan_out_scenario() {
        let registry = registry(&[("A", &[]), ("B", &["A"]), ("C", &["A"])]);
        let plan = resolve(&registry).unwrap();

        assert_eq!(*plan, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let registry = registry(&[("C", &["A"]), ("B", &["A"]), ("A", &[])]);
        let plan = resolve(&registry).unwrap();

        assert_eq!(*plan, vec!["A", "C", "B"]);
    }

    #[test]
    fn test_deep_graph_is_topological() {
        let registry = registry(&[
            ("E", &["D", "B"]),
            ("D", &["C"]),
            ("C", &["A"]),
            ("B", &["A"]),
            ("A", &[]),
            ("F", &[]),
        ]);
        let plan = resolve(&registry).unwrap();

        assert_eq!(plan.len(), 6);
        assert_topological(&registry, &plan);
        assert_eq!(plan.to_string(), "A -> C -> D -> B -> E -> F");
    }

    #[test]
    fn test_two_cycle() {
        let registry = registry(&[("A", &["B"]), ("B", &["A"])]);

        let err = resolve(&registry).unwrap_err();
        assert!(matches!(err, DeployError::CyclicDependency { ref step } if step == "A" || step == "B"));
    }

    #[test]
    fn test_cycle_member_is_on_the_cycle() {
        // D hangs off the cycle B -> C -> B and must not be blamed.
        let registry = registry(&[("A", &[]), ("D", &["B"]), ("B", &["C"]), ("C", &["B", "A"])]);

        let err = resolve(&registry).unwrap_err();
        assert!(matches!(err, DeployError::CyclicDependency { ref step } if step == "B" || step == "C"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let registry = registry(&[("A", &["A"])]);
        assert!(matches!(
            resolve(&registry),
            Err(DeployError::CyclicDependency { step }) if step == "A"
        ));
    }

    #[test]
    fn test_unknown_dependency() {
        let registry = registry(&[("A", &[]), ("B", &["Missing"])]);

        let err = resolve(&registry).unwrap_err();
        assert!(matches!(
            err,
            DeployError::UnknownDependency { ref step, ref dependency }
                if step == "B" && dependency == "Missing"
        ));
    }

    #[test]
    fn test_targets_pull_in_prerequisites() {
        let registry = StepRegistry::new()
            .with(step("A", &[]))
            .unwrap()
            .with(step("B", &["A"]).tag("deployB"))
            .unwrap()
            .with(step("C", &[]))
            .unwrap()
            .with(step("D", &["B", "C"]))
            .unwrap();

        let by_tag = resolve_targets(&registry, &["deployB"]).unwrap();
        assert_eq!(*by_tag, vec!["A", "B"]);

        let by_name = resolve_targets(&registry, &["D"]).unwrap();
        assert_eq!(*by_name, vec!["A", "B", "C", "D"]);

        let everything = resolve_targets::<&str>(&registry, &[]).unwrap();
        assert_eq!(everything, resolve(&registry).unwrap());
    }

    #[test]
    fn test_targeted_steps_exclude_prerequisites() {
        let registry = StepRegistry::new()
            .with(step("A", &[]))
            .unwrap()
            .with(step("B", &["A"]).tag("deployB"))
            .unwrap()
            .with(step("C", &["B"]).tag("deployB"))
            .unwrap();

        assert_eq!(targeted_steps(&registry, &["deployB"]).unwrap(), ["B", "C"]);
        assert_eq!(targeted_steps(&registry, &["C", "A"]).unwrap(), ["A", "C"]);
        assert_eq!(targeted_steps::<&str>(&registry, &[]).unwrap(), ["A", "B", "C"]);
        assert!(matches!(
            targeted_steps(&registry, &["nope"]),
            Err(DeployError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn test_unknown_target() {
        let registry = registry(&[("A", &[])]);
        assert!(matches!(
            resolve_targets(&registry, &["nope"]),
            Err(DeployError::UnknownTarget { target }) if target == "nope"
        ));
    }
}
