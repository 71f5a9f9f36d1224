use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::DaemonError;

use super::Task;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Str(String),
    Int(i64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Str(s) => s,
            RawId::Int(n) => n.to_string(),
            RawId::Float(f) => f.to_string(),
        }
    }
}

/// Accepts ids sent either as JSON strings or numbers.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

pub fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

pub fn task_from_json(json: &str) -> Result<Task, DaemonError> {
    serde_json::from_str::<Task>(json)
        .map_err(|e| DaemonError::Config(format!("deserialize task: {e}")))
}

pub fn read_task_json_file(path: impl AsRef<Path>) -> Result<Task, DaemonError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    task_from_json(&json)
}
