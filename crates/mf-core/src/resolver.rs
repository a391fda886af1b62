//! Dependency ordering of feature extractors.
//!
//! Kahn's algorithm run in passes over the input: each pass emits, in input
//! order, every unit whose dependencies have all been emitted, and strikes it
//! from its dependents straight away. A pass that emits nothing while units
//! remain means a cycle or a dependency on a name that is not in the set.

use std::collections::{HashMap, HashSet};

use crate::error::CoreError;

/// Returns the evaluation order of `nodes` as indices into `nodes`.
///
/// Each node is `(name, dependency names)`.
///
/// # Errors
/// - [`CoreError::Configuration`] if two nodes share a name.
/// - [`CoreError::UnresolvableDependency`] if some nodes can never be ordered.
///
/// # Example
/// ```
/// use mf_core::resolver::resolve_indices;
/// let words = vec!["Number of Words".to_string()];
/// let nodes: Vec<(&str, &[String])> = vec![("Word Variety", &words), ("Number of Words", &[])];
/// assert_eq!(resolve_indices(&nodes).unwrap(), vec![1, 0]);
/// ```
pub fn resolve_indices(nodes: &[(&str, &[String])]) -> Result<Vec<usize>, CoreError> {
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, (name, _)) in nodes.iter().enumerate() {
        if index_of.insert(*name, i).is_some() {
            return Err(CoreError::config(format!("duplicate feature name '{name}'")));
        }
    }

    // Dependents of each node, and how many distinct dependencies each node still waits on.
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut waiting: Vec<usize> = Vec::with_capacity(nodes.len());
    for (i, (_, deps)) in nodes.iter().enumerate() {
        let unique: HashSet<&str> = deps.iter().map(String::as_str).collect();
        waiting.push(unique.len());
        for dep in unique {
            if let Some(&j) = index_of.get(dep) {
                dependents[j].push(i);
            }
        }
    }

    let mut placed = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    while order.len() < nodes.len() {
        let mut progressed = false;
        for i in 0..nodes.len() {
            if placed[i] || waiting[i] > 0 {
                continue;
            }
            placed[i] = true;
            order.push(i);
            progressed = true;
            for &d in &dependents[i] {
                waiting[d] -= 1;
            }
        }
        if !progressed {
            let remaining = nodes
                .iter()
                .zip(&placed)
                .filter(|(_, done)| !**done)
                .map(|((name, _), _)| (*name).to_string())
                .collect();
            return Err(CoreError::UnresolvableDependency { remaining });
        }
    }

    log::debug!(
        "Resolved feature order: {}",
        order
            .iter()
            .map(|&i| nodes[i].0)
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    Ok(order)
}

/// Reorders `units` so that every unit follows its dependencies.
///
/// # Errors
/// Same as [`resolve_indices`].
pub fn resolve_order<T>(
    units: Vec<T>,
    name: impl Fn(&T) -> &str,
    dependencies: impl Fn(&T) -> &[String],
) -> Result<Vec<T>, CoreError> {
    let order = {
        let nodes: Vec<(&str, &[String])> =
            units.iter().map(|u| (name(u), dependencies(u))).collect();
        resolve_indices(&nodes)?
    };
    let mut slots: Vec<Option<T>> = units.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
