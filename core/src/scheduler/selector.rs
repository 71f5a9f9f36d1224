use std::cmp::Ordering;
use std::collections::HashSet;

use crate::task::{scope_key, Task};

fn compare_priority(a: &Task, b: &Task) -> Ordering {
    match (a.priority, b.priority) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable ascending sort by priority; tasks without a priority go last.
pub fn sort_by_priority(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    // `sort_by` is stable, so equal priorities keep fetch order.
    sorted.sort_by(compare_priority);
    sorted
}

/// Greedily picks at most `max_parallel` tasks, never two from the same scope
/// and never one whose scope is already in `active_scopes`.
pub fn select_parallel(
    tasks: &[Task],
    max_parallel: usize,
    active_scopes: &HashSet<String>,
) -> Vec<Task> {
    let mut occupied = active_scopes.clone();
    let mut selected = Vec::new();

    for task in sort_by_priority(tasks) {
        if selected.len() >= max_parallel {
            break;
        }
        let scope = scope_key(&task);
        if occupied.contains(&scope) {
            continue;
        }
        occupied.insert(scope);
        selected.push(task);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, priority: Option<f64>, project: Option<&str>, sub: Option<&str>) -> Task {
        Task {
            id: id.to_string(),
            priority,
            project_id: project.map(str::to_string),
            subproject_id: sub.map(str::to_string),
            ..Default::default()
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn sort_is_stable_and_puts_missing_priority_last() {
        let tasks = vec![
            task("a", None, None, None),
            task("b", Some(2.0), None, None),
            task("c", Some(1.0), None, None),
            task("d", Some(2.0), None, None),
            task("e", None, None, None),
            task("f", Some(1.0), None, None),
        ];
        let sorted = sort_by_priority(&tasks);
        assert_eq!(ids(&sorted), vec!["c", "f", "b", "d", "a", "e"]);
    }

    #[test]
    fn one_task_per_scope_in_priority_order() {
        let tasks = vec![
            task("p1-a", Some(1.0), Some("P1"), None),
            task("p1-b", Some(0.0), Some("P1"), None),
            task("p1s1", Some(5.0), Some("P1"), Some("S1")),
            task("p2", None, Some("P2"), None),
        ];
        let selected = select_parallel(&tasks, 4, &HashSet::new());
        assert_eq!(ids(&selected), vec!["p1-b", "p1s1", "p2"]);
    }

    #[test]
    fn skips_scopes_already_running() {
        let tasks = vec![
            task("a", Some(1.0), Some("P1"), None),
            task("b", Some(2.0), Some("P2"), None),
        ];
        let active: HashSet<String> = ["project:P1".to_string()].into_iter().collect();
        let selected = select_parallel(&tasks, 5, &active);
        assert_eq!(ids(&selected), vec!["b"]);
    }

    #[test]
    fn respects_max_parallel() {
        let tasks: Vec<Task> = (0..10)
            .map(|i| task(&format!("t{i}"), Some(i as f64), None, None))
            .collect();
        let selected = select_parallel(&tasks, 3, &HashSet::new());
        assert_eq!(ids(&selected), vec!["t0", "t1", "t2"]);
        assert!(select_parallel(&tasks, 0, &HashSet::new()).is_empty());
    }

    #[test]
    fn malformed_tasks_each_get_their_own_scope() {
        let tasks = vec![task("x", None, None, None), task("y", None, None, None)];
        let selected = select_parallel(&tasks, 2, &HashSet::new());
        assert_eq!(ids(&selected), vec!["x", "y"]);
    }
}
