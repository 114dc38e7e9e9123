//! Per-record mapping strategies.
//!
//! The parse stages are generic over how a record becomes a value: a
//! [`Mapper`] turns a record into an in-memory value, an [`EntityMapper`]
//! upserts it into a store session and returns the entity's reference.
//! Call sites pick a strategy instead of subclassing a stage.

mod region;

pub use region::{apply_region_record, RegionLookup, RegionMapper, RegionSnapshotMapper};

use crate::errors::Result;
use crate::store::{EntityRef, Session};
use serde_json::Value;
use std::marker::PhantomData;

/// Maps one decoded record to a value.
pub trait Mapper: Send + Sync {
    /// The mapped value.
    type Output: Clone + Send + Sync + 'static;

    /// Maps one record.
    ///
    /// # Errors
    ///
    /// Returns the failure to record for this invocation.
    fn map(&self, record: &Value) -> Result<Self::Output>;
}

/// Maps one decoded record to a persisted entity.
pub trait EntityMapper: Send + Sync {
    /// Upserts the record in `session` and returns the entity's reference.
    ///
    /// # Errors
    ///
    /// Returns the failure to record for this invocation.
    fn map(&self, record: &Value, session: &Session) -> Result<EntityRef>;
}

/// A closure-backed [`Mapper`].
pub struct BlockMapper<F, T> {
    func: F,
    _output: PhantomData<fn() -> T>,
}

impl<F, T> BlockMapper<F, T>
where
    F: Fn(&Value) -> Result<T> + Send + Sync,
    T: Clone + Send + Sync + 'static,
{
    /// Creates a new closure-backed mapper.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _output: PhantomData,
        }
    }
}

impl<F, T> Mapper for BlockMapper<F, T>
where
    F: Fn(&Value) -> Result<T> + Send + Sync,
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    fn map(&self, record: &Value) -> Result<T> {
        (self.func)(record)
    }
}

/// A closure-backed [`EntityMapper`].
pub struct BlockEntityMapper<F> {
    func: F,
}

impl<F> BlockEntityMapper<F>
where
    F: Fn(&Value, &Session) -> Result<EntityRef> + Send + Sync,
{
    /// Creates a new closure-backed entity mapper.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> EntityMapper for BlockEntityMapper<F>
where
    F: Fn(&Value, &Session) -> Result<EntityRef> + Send + Sync,
{
    fn map(&self, record: &Value, session: &Session) -> Result<EntityRef> {
        (self.func)(record, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WeatherflowError;
    use crate::store::{ObjectStore, Region};
    use serde_json::json;

    #[test]
    fn test_block_mapper() {
        let mapper = BlockMapper::new(|record: &Value| {
            record
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| WeatherflowError::missing("id"))
        });

        assert_eq!(mapper.map(&json!({"id": 4})).unwrap(), 4);
        assert!(mapper.map(&json!({})).unwrap_err().is_missing_data());
    }

    #[test]
    fn test_block_entity_mapper() {
        let store = ObjectStore::in_memory();
        let session = store.background_session();
        let mapper = BlockEntityMapper::new(|record: &Value, session: &Session| {
            let sid = record.get("id").and_then(Value::as_i64).unwrap_or(0);
            Ok(session.insert(Region {
                sid,
                ..Region::default()
            }))
        });

        let id = mapper.map(&json!({"id": 12}), &session).unwrap();
        assert_eq!(session.resolve(id).unwrap().map(|r| r.sid), Some(12));
    }
}
