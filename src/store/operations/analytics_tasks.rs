use crate::analytics::types::{JournaledTask, TaskId};
use crate::store::{Store, StoreError};

impl Store {
    pub fn save_analytics_task(&self, entry: &JournaledTask) -> Result<(), StoreError> {
        self.analytics_tasks.insert(
            entry.task.task_id.as_str().as_bytes(),
            Self::serialize(entry)?,
        )?;
        Ok(())
    }

    pub fn remove_analytics_task(&self, task_id: &TaskId) -> Result<(), StoreError> {
        self.analytics_tasks.remove(task_id.as_str().as_bytes())?;
        Ok(())
    }

    /// Load every journaled task. Undecodable entries are skipped with a warning
    /// rather than blocking the rest of the queue from being restored.
    pub fn load_analytics_tasks(&self) -> Result<Vec<JournaledTask>, StoreError> {
        let mut tasks = Vec::new();
        for item in self.analytics_tasks.iter() {
            let (key, value) = item?;
            match Self::deserialize::<JournaledTask>(&value) {
                Ok(entry) => tasks.push(entry),
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "Skipping undecodable analytics task"
                    );
                }
            }
        }
        Ok(tasks)
    }
}
