// graph.rs - Kahn's-algorithm topological sort with insertion-order tie-break.
//
// Nodes are dense indices `0..n` in registration order. `edges` is a list
// of `(before, after)` pairs meaning "before runs before after". Duplicate
// edges are idempotent (deduped via the HashSet). On success returns the
// run order; on a cycle returns `Err(())` and the caller falls back to
// plain insertion order, recording a diagnostic.

use std::collections::HashSet;

pub fn topo_sort(n: usize, edges: &[(usize, usize)]) -> Result<Vec<usize>, ()> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];
    let mut seen = HashSet::new();

    for &(before, after) in edges {
        if before == after || before >= n || after >= n {
            continue;
        }
        if !seen.insert((before, after)) {
            continue;
        }
        adjacency[before].push(after);
        indegree[after] += 1;
    }

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);

    loop {
        // Insertion-order tie-break: among all currently-ready nodes, the
        // lowest index always goes next.
        let next = (0..n).find(|&i| !visited[i] && indegree[i] == 0);
        let Some(i) = next else { break };
        visited[i] = true;
        order.push(i);
        for &j in &adjacency[i] {
            indegree[j] -= 1;
        }
    }

    if order.len() == n {
        Ok(order)
    } else {
        Err(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_constraints_preserves_insertion_order() {
        assert_eq!(topo_sort(3, &[]).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn linear_chain_is_respected() {
        // 2 after 1, 1 after 0 -> edges (0,1), (1,2)
        assert_eq!(topo_sort(3, &[(0, 1), (1, 2)]).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_edges_are_idempotent() {
        assert_eq!(topo_sort(2, &[(0, 1), (0, 1), (0, 1)]).unwrap(), vec![0, 1]);
    }

    #[test]
    fn cycle_is_detected() {
        assert!(topo_sort(2, &[(0, 1), (1, 0)]).is_err());
    }

    #[test]
    fn reordering_constraint_overrides_insertion_order() {
        // system 0 declared first but must run after system 1
        assert_eq!(topo_sort(2, &[(1, 0)]).unwrap(), vec![1, 0]);
    }
}
