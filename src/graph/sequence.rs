//! Topological Sequencing
//!
//! Depth-first topological sort with a recursion-path guard. Roots are visited
//! in input order and prerequisites in the order `prerequisites_of` yields
//! them, so the same input always produces the same output.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// A prerequisite cycle, first node repeated at the end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCycle<T> {
    pub cycle: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the current DFS path
    Visiting,
    Done,
}

/// Order `nodes` so that every prerequisite precedes its dependents.
///
/// Prerequisites outside `nodes` belong to another emission unit and are
/// ignored, so the result is a permutation of the input.
pub fn sequence<T, F, P>(nodes: &[T], mut prerequisites_of: F) -> Result<Vec<T>, SequenceCycle<T>>
where
    T: Copy + Eq + Hash,
    F: FnMut(T) -> P,
    P: IntoIterator<Item = T>,
{
    let members: HashSet<T> = nodes.iter().copied().collect();
    let mut marks: HashMap<T, Mark> = HashMap::with_capacity(nodes.len());
    let mut path = Vec::new();
    let mut order = Vec::with_capacity(nodes.len());

    for &node in nodes {
        visit(node, &members, &mut prerequisites_of, &mut marks, &mut path, &mut order)?;
    }

    Ok(order)
}

fn visit<T, F, P>(
    node: T,
    members: &HashSet<T>,
    prerequisites_of: &mut F,
    marks: &mut HashMap<T, Mark>,
    path: &mut Vec<T>,
    order: &mut Vec<T>,
) -> Result<(), SequenceCycle<T>>
where
    T: Copy + Eq + Hash,
    F: FnMut(T) -> P,
    P: IntoIterator<Item = T>,
{
    match marks.get(&node) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|n| *n == node).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(node);
            return Err(SequenceCycle { cycle });
        }
        None => {}
    }

    marks.insert(node, Mark::Visiting);
    path.push(node);

    let prerequisites: Vec<T> = prerequisites_of(node)
        .into_iter()
        .filter(|p| members.contains(p))
        .collect();
    for prerequisite in prerequisites {
        visit(prerequisite, members, prerequisites_of, marks, path, order)?;
    }

    path.pop();
    marks.insert(node, Mark::Done);
    order.push(node);
    Ok(())
}
