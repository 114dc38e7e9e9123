//! Maps records to persisted entities and commits them.

use super::record_failure;
use crate::buffers::{ErrorAccumulator, SharedList};
use crate::core::{TaskKind, TaskOutcome};
use crate::errors::Result;
use crate::mapping::EntityMapper;
use crate::scheduler::{Task, TaskContext};
use crate::store::{EntityRef, ObjectStore};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Upserts every record through an [`EntityMapper`] in one background
/// session, then saves that session recursively.
///
/// The session lives only for one execution. Either every record of the
/// invocation is committed or none is.
pub struct ManagedParseTask {
    name: String,
    store: ObjectStore,
    mapper: Arc<dyn EntityMapper>,
    input: SharedList<Value>,
    output: SharedList<EntityRef>,
    errors: ErrorAccumulator,
}

impl ManagedParseTask {
    /// Creates a new map-and-persist stage.
    #[must_use]
    pub fn new(
        store: ObjectStore,
        mapper: Arc<dyn EntityMapper>,
        input: SharedList<Value>,
        output: SharedList<EntityRef>,
        errors: ErrorAccumulator,
    ) -> Self {
        Self {
            name: "persist".to_string(),
            store,
            mapper,
            input,
            output,
            errors,
        }
    }

    /// Sets the task name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn map_and_save(&self) -> Result<Vec<EntityRef>> {
        let session = self.store.background_session();
        let records = self.input.snapshot();
        let refs = records
            .iter()
            .map(|record| self.mapper.map(record, &session))
            .collect::<Result<Vec<_>>>()?;

        session.save(true)?;
        debug!(
            task = %self.name,
            session = %session.name(),
            entities = refs.len(),
            "Session saved"
        );
        Ok(refs)
    }
}

impl std::fmt::Debug for ManagedParseTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedParseTask")
            .field("name", &self.name)
            .field("records", &self.input.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Task for ManagedParseTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Persist
    }

    async fn execute(&self, _ctx: &TaskContext) -> TaskOutcome {
        match self.map_and_save() {
            Ok(refs) => {
                self.output.extend(refs);
                TaskOutcome::Succeeded
            }
            Err(err) => record_failure(&self.errors, &self.name, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WeatherflowError;
    use crate::mapping::{BlockEntityMapper, RegionMapper};
    use crate::store::{MemoryBackend, Region, Session};
    use crate::testing::fixtures::forecast_payload;
    use crate::testing::FailingBackend;
    use serde_json::json;

    fn persist_task(
        store: &ObjectStore,
        mapper: Arc<dyn EntityMapper>,
        records: Vec<Value>,
    ) -> (ManagedParseTask, SharedList<EntityRef>, ErrorAccumulator) {
        let output = SharedList::new();
        let errors = ErrorAccumulator::new();
        let task = ManagedParseTask::new(
            store.clone(),
            mapper,
            SharedList::from_vec(records),
            output.clone(),
            errors.clone(),
        );
        (task, output, errors)
    }

    #[tokio::test]
    async fn test_persists_and_publishes_references() {
        let backend = Arc::new(MemoryBackend::new());
        let store = ObjectStore::new(backend.clone());
        let (task, output, errors) = persist_task(
            &store,
            Arc::new(RegionMapper::by_id()),
            vec![forecast_payload(1, "Oslo")],
        );

        assert!(task.execute(&TaskContext::detached("persist")).await.is_success());

        assert!(errors.is_empty());
        assert_eq!(output.len(), 1);
        assert_eq!(backend.len(), 1);
        let id = output.last().unwrap();
        assert_eq!(
            store.main_session().resolve(id).unwrap().and_then(|r| r.name),
            Some("Oslo".to_string())
        );
    }

    #[tokio::test]
    async fn test_mapping_failure_commits_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let store = ObjectStore::new(backend.clone());
        let mapper = BlockEntityMapper::new(|record: &Value, session: &Session| {
            session.insert(Region::default());
            if record.get("bad").is_some() {
                Err(WeatherflowError::missing("city"))
            } else {
                Ok(session.insert(Region::default()))
            }
        });
        let records = vec![json!({}), json!({"bad": true}), json!({})];
        let (task, output, errors) = persist_task(&store, Arc::new(mapper), records);

        let outcome = task.execute(&TaskContext::detached("persist")).await;

        assert_eq!(outcome, TaskOutcome::Failed(WeatherflowError::missing("city")));
        assert!(output.is_empty());
        assert!(backend.is_empty());
        assert!(!store.main_session().has_changes());
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_is_persistence_error() {
        let store = ObjectStore::new(Arc::new(FailingBackend::new("disk full")));
        let (task, output, errors) = persist_task(
            &store,
            Arc::new(RegionMapper::by_id()),
            vec![forecast_payload(1, "Oslo")],
        );

        task.execute(&TaskContext::detached("persist")).await;

        assert_eq!(errors.first(), Some(WeatherflowError::persistence("disk full")));
        assert!(output.is_empty());
    }
}
