use super::Task;

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Ownership scope of a task; at most one task per scope may run at a time.
///
/// - `subproject:<project>:<subproject>` when both ids are present
/// - `project:<project>` when only the project id is present
/// - `unknown:<task id>` otherwise, so malformed tasks never block each other
pub fn scope_key(task: &Task) -> String {
    match (present(&task.project_id), present(&task.subproject_id)) {
        (Some(p), Some(s)) => format!("subproject:{p}:{s}"),
        (Some(p), None) => format!("project:{p}"),
        _ => format!("unknown:{}", task.id),
    }
}
