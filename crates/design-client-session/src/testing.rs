//! In-memory doubles for the channel and the executor.

use std::{
    any::TypeId,
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use design_client_core::{
    ChannelError, CommunicationChannel, DesignOperation, OperationExecutor, OperationFailure,
    OperationResult,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

type Scripted = Result<Value, ChannelError>;

/// Serves queued responses or failures per type and counts calls.
///
/// A fetch with nothing queued yields no value; a reply with nothing queued
/// is decoded from `{}`.
#[derive(Default)]
pub struct ScriptedChannel {
    responses: Mutex<HashMap<TypeId, VecDeque<Scripted>>>,
    fetches: Mutex<HashMap<TypeId, usize>>,
    submitted: Mutex<Vec<Value>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next response served for `T`.
    pub fn respond<T: Serialize + 'static>(self, value: &T) -> Self {
        self.push::<T>(Ok(serde_json::to_value(value).unwrap()))
    }

    /// Queue a failure in place of the next response for `T`.
    pub fn fail<T: 'static>(self, error: ChannelError) -> Self {
        self.push::<T>(Err(error))
    }

    fn push<T: 'static>(self, scripted: Scripted) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(TypeId::of::<T>())
            .or_default()
            .push_back(scripted);
        self
    }

    pub fn fetches<T: 'static>(&self) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(&TypeId::of::<T>())
            .copied()
            .unwrap_or_default()
    }

    pub fn submitted(&self) -> Vec<Value> {
        self.submitted.lock().unwrap().clone()
    }

    fn next<T: DeserializeOwned + 'static>(&self) -> Result<Option<T>, ChannelError> {
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&TypeId::of::<T>())
            .and_then(VecDeque::pop_front);
        scripted
            .transpose()
            .map(|value| value.map(|v| serde_json::from_value(v).unwrap()))
    }
}

#[async_trait]
impl CommunicationChannel for ScriptedChannel {
    async fn fetch<T>(&self, cancel: &CancellationToken) -> Result<Option<T>, ChannelError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(ChannelError::Cancelled);
        }
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(TypeId::of::<T>())
            .or_default() += 1;
        self.next()
    }

    async fn submit<T>(&self, value: &T, cancel: &CancellationToken) -> Result<(), ChannelError>
    where
        T: Serialize + Sync + 'static,
    {
        if cancel.is_cancelled() {
            return Err(ChannelError::Cancelled);
        }
        self.submitted.lock().unwrap().push(serde_json::to_value(value)?);
        Ok(())
    }

    async fn submit_for<T, R>(&self, value: &T, cancel: &CancellationToken) -> Result<R, ChannelError>
    where
        T: Serialize + Sync + 'static,
        R: DeserializeOwned + Send + 'static,
    {
        self.submit(value, cancel).await?;
        match self.next()? {
            Some(reply) => Ok(reply),
            None => Ok(serde_json::from_value(Value::Object(serde_json::Map::new()))?),
        }
    }
}

/// Records executed operation names; `Boom` faults.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    releases: Arc<AtomicUsize>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationExecutor for RecordingExecutor {
    async fn execute(
        &self,
        operation: &DesignOperation,
        _cancel: &CancellationToken,
    ) -> OperationResult {
        self.executed.lock().unwrap().push(operation.name.clone());
        if operation.name == "Boom" {
            return OperationResult::failure(
                operation.id,
                OperationFailure::fault("unexpected null", "at Boom::run"),
            );
        }
        OperationResult::success(
            operation.id,
            [("operation".to_string(), operation.name.clone())].into(),
        )
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Descriptors named `names`, in order.
pub fn batch(names: &[&str]) -> design_client_core::PendingOperations {
    names
        .iter()
        .map(|name| DesignOperation::new(*name))
        .collect::<Vec<_>>()
        .into()
}
