/// Execution planning for workflow graphs
///
/// Turns a node set plus connection list into the deterministic linear order
/// the runtime executes, and detects cycles while doing so. The traversal is
/// depth-first with an explicit stack (no recursion, so very large graphs
/// cannot blow the call stack) and follows connections strictly in declared
/// order, so the plan depends only on the input ordering — never on hash-map
/// iteration order.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::workflow::types::{Connection, Node};

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Compute the linear execution order for a graph.
///
/// Start nodes (no incoming connection) are traversed depth-first in declared
/// order; a post-order collection reversed at the end yields a topological
/// order, so every node appears after all of its dependencies. Nodes left
/// over after the start sweep are either isolated (appended at the end, so
/// orphans still run exactly once) or part of a fragment with no start node
/// at all — which can only happen when the fragment is cyclic, so traversing
/// it reports the cycle instead of silently dropping the nodes.
///
/// Fails with [`EngineError::CycleDetected`] naming a node on the first cycle
/// encountered.
pub fn build_execution_plan(
    nodes: &[Node],
    connections: &[Connection],
) -> Result<Vec<String>, EngineError> {
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    for node in nodes {
        marks.insert(node.id.as_str(), Mark::Unvisited);
        outgoing.entry(node.id.as_str()).or_default();
    }
    for conn in connections {
        // Dangling endpoints are a validation concern; the planner just
        // ignores edges that do not resolve to member nodes.
        if marks.contains_key(conn.from.as_str()) && marks.contains_key(conn.to.as_str()) {
            if let Some(targets) = outgoing.get_mut(conn.from.as_str()) {
                targets.push(conn.to.as_str());
            }
        }
    }

    let mut has_incoming: HashMap<&str, bool> = HashMap::new();
    for targets in outgoing.values() {
        for target in targets {
            has_incoming.insert(*target, true);
        }
    }
    let connected =
        |id: &str| -> bool { has_incoming.contains_key(id) || !outgoing[id].is_empty() };

    let mut post: Vec<&str> = Vec::with_capacity(nodes.len());

    // Post-order segments are reversed once at the end, so components pushed
    // earlier come later in the plan. Walking start nodes in reverse declared
    // order keeps the final plan in declared-start order.
    let starts: Vec<&str> = nodes
        .iter()
        .filter(|n| !has_incoming.contains_key(n.id.as_str()) && connected(&n.id))
        .map(|n| n.id.as_str())
        .collect();
    for start in starts.iter().rev() {
        visit(start, &outgoing, &mut marks, &mut post)?;
    }

    // Anything still unvisited but wired into connections has no reachable
    // start node, which only a cycle can produce; traversing it surfaces the
    // offending node. Isolated leftovers are appended after the reversal.
    let mut orphans: Vec<&str> = Vec::new();
    for node in nodes.iter().rev() {
        if marks[node.id.as_str()] != Mark::Unvisited {
            continue;
        }
        if connected(&node.id) {
            visit(node.id.as_str(), &outgoing, &mut marks, &mut post)?;
        } else {
            orphans.push(node.id.as_str());
        }
    }

    let mut plan: Vec<String> = post.into_iter().rev().map(str::to_string).collect();
    plan.extend(orphans.into_iter().rev().map(str::to_string));
    Ok(plan)
}

/// Iterative depth-first traversal from one root, collecting post-order.
///
/// Each stack frame carries the index of the next outgoing edge to follow;
/// encountering a node already in the `Visiting` state means the stack holds
/// a path back to it, i.e. a cycle.
fn visit<'a>(
    root: &'a str,
    outgoing: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    post: &mut Vec<&'a str>,
) -> Result<(), EngineError> {
    if marks[root] != Mark::Unvisited {
        return Ok(());
    }
    marks.insert(root, Mark::Visiting);
    let mut stack: Vec<(&str, usize)> = vec![(root, 0)];

    while let Some(frame) = stack.last_mut() {
        let (node, next_edge) = (frame.0, frame.1);
        let targets = &outgoing[node];
        if next_edge < targets.len() {
            frame.1 += 1;
            let target = targets[next_edge];
            match marks[target] {
                Mark::Visiting => {
                    return Err(EngineError::CycleDetected {
                        node_id: target.to_string(),
                    });
                }
                Mark::Visited => {}
                Mark::Unvisited => {
                    marks.insert(target, Mark::Visiting);
                    stack.push((target, 0));
                }
            }
        } else {
            stack.pop();
            marks.insert(node, Mark::Visited);
            post.push(node);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::ErrorPolicy;
    use serde_json::Value;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            name: id.to_uppercase(),
            node_type: "transform.set".to_string(),
            params: Value::Null,
            on_error: ErrorPolicy::default(),
            retry_on_fail: false,
        }
    }

    fn conn(from: &str, to: &str) -> Connection {
        Connection {
            from: from.to_string(),
            to: to.to_string(),
            port: "main".to_string(),
        }
    }

    #[test]
    fn linear_chain_plans_in_order() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let conns = vec![conn("a", "b"), conn("b", "c")];
        let plan = build_execution_plan(&nodes, &conns).unwrap();
        assert_eq!(plan, vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_respects_dependencies() {
        let nodes = vec![node("a"), node("b"), node("c"), node("d")];
        let conns = vec![conn("a", "b"), conn("a", "c"), conn("b", "d"), conn("c", "d")];
        let plan = build_execution_plan(&nodes, &conns).unwrap();
        assert_eq!(plan.len(), 4);
        let pos = |id: &str| plan.iter().position(|p| p == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn plan_is_deterministic_for_same_input_order() {
        let nodes = vec![node("a"), node("b"), node("c"), node("d")];
        let conns = vec![conn("a", "b"), conn("a", "c"), conn("b", "d"), conn("c", "d")];
        let first = build_execution_plan(&nodes, &conns).unwrap();
        for _ in 0..20 {
            assert_eq!(build_execution_plan(&nodes, &conns).unwrap(), first);
        }
    }

    #[test]
    fn every_node_appears_exactly_once_under_permutation() {
        let orderings = [
            vec!["a", "b", "c", "d"],
            vec!["d", "c", "b", "a"],
            vec!["b", "d", "a", "c"],
        ];
        let conns = vec![conn("a", "b"), conn("a", "c"), conn("b", "d"), conn("c", "d")];
        for ordering in orderings {
            let nodes: Vec<Node> = ordering.iter().map(|&id| node(id)).collect();
            let mut plan = build_execution_plan(&nodes, &conns).unwrap();
            plan.sort();
            assert_eq!(plan, vec!["a", "b", "c", "d"]);
        }
    }

    #[test]
    fn cycle_reachable_from_start_is_detected() {
        let nodes = vec![node("a"), node("b"), node("c")];
        // a -> b -> c -> b
        let conns = vec![conn("a", "b"), conn("b", "c"), conn("c", "b")];
        let err = build_execution_plan(&nodes, &conns).unwrap_err();
        match err {
            EngineError::CycleDetected { node_id } => {
                assert!(node_id == "b" || node_id == "c");
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn two_node_cycle_without_start_is_detected() {
        let nodes = vec![node("a"), node("b")];
        let conns = vec![conn("a", "b"), conn("b", "a")];
        let err = build_execution_plan(&nodes, &conns).unwrap_err();
        match err {
            EngineError::CycleDetected { node_id } => {
                assert!(node_id == "a" || node_id == "b");
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn disconnected_fragments_are_appended() {
        let nodes = vec![node("a"), node("b"), node("lonely")];
        let conns = vec![conn("a", "b")];
        let plan = build_execution_plan(&nodes, &conns).unwrap();
        assert_eq!(plan, vec!["a", "b", "lonely"]);
    }

    #[test]
    fn single_node_graph_plans_itself() {
        let nodes = vec![node("only")];
        let plan = build_execution_plan(&nodes, &[]).unwrap();
        assert_eq!(plan, vec!["only"]);
    }

    #[test]
    fn multiple_starts_keep_declared_order() {
        let nodes = vec![node("x"), node("y"), node("x2"), node("y2")];
        let conns = vec![conn("x", "x2"), conn("y", "y2")];
        let plan = build_execution_plan(&nodes, &conns).unwrap();
        assert_eq!(plan[0], "x");
        let pos = |id: &str| plan.iter().position(|p| p == id).unwrap();
        assert!(pos("x") < pos("x2"));
        assert!(pos("y") < pos("y2"));
    }
}
