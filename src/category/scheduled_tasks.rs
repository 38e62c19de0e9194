//! Scheduled tasks: one JSON file per task, named after its schedule.

use super::{ArtifactSet, array, id, object, safe_name, text};
use crate::error::CategoryError;
use serde_json::Value;

/// Schedule members that change on every run and would make each fetch a diff
const VOLATILE_SCHEDULE_KEYS: [&str; 11] = [
    "asap",
    "next_execution",
    "last_execution",
    "execution_time",
    "lock_expire",
    "lock_pid",
    "lock_ttl",
    "error_message",
    "last_error",
    "retries",
    "retry_interval",
];

pub(super) fn render(group: &Value) -> Result<ArtifactSet, CategoryError> {
    let tasks = array(group, "scheduled_task")?;
    let schedules = array(group, "schedule")?
        .iter()
        .map(|schedule| -> Result<Value, CategoryError> {
            let mut schedule = object(schedule, "schedule")?;
            for key in VOLATILE_SCHEDULE_KEYS {
                schedule.remove(key);
            }
            Ok(Value::Object(schedule))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut artifacts = ArtifactSet::new();
    for task in tasks {
        let schedule_id = id(task, "schedule_id");
        let schedule = schedules
            .iter()
            .find(|s| schedule_id.is_some() && id(s, "id") == schedule_id)
            .ok_or_else(|| {
                CategoryError::RemoteFormat(format!(
                    "scheduled task {} references unknown schedule {}",
                    text(task, "id"),
                    text(task, "schedule_id")
                ))
            })?;

        let mut task_map = object(task, "scheduled task")?;
        task_map.insert("schedule".to_string(), schedule.clone());

        let file_name = format!("{}.json", safe_name(&text(schedule, "name")));
        artifacts.add_json(file_name, &task_map)?;
    }

    Ok(artifacts)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_embeds_its_schedule_without_volatile_keys() {
        let group = json!({
            "scheduled_task": [{"id": 1, "schedule_id": 20, "script_id": 7}],
            "schedule": [{
                "id": 20,
                "name": "Nightly cleanup",
                "frequency": "daily",
                "next_execution": "2024-01-02 00:00",
                "last_execution": "2024-01-01 00:00",
                "lock_pid": 1234,
                "retries": 0
            }],
        });

        let artifacts = render(&group).unwrap();
        let task: Value =
            serde_json::from_slice(artifacts.get("Nightly cleanup.json").unwrap()).unwrap();

        assert_eq!(task["script_id"], 7);
        assert_eq!(
            task["schedule"],
            json!({"id": 20, "name": "Nightly cleanup", "frequency": "daily"})
        );
    }

    #[test]
    fn dangling_schedule_reference_is_a_format_error() {
        let group = json!({
            "scheduled_task": [{"id": 1, "schedule_id": 99}],
            "schedule": [{"id": 20, "name": "Other"}],
        });

        match render(&group) {
            Err(CategoryError::RemoteFormat(reason)) => {
                assert!(reason.contains("unknown schedule 99"), "{reason}")
            }
            other => panic!("expected format error, got {other:?}"),
        }
    }
}
