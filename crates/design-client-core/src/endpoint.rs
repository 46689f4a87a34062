//! Explicit binding of wire types to server endpoints.
//!
//! Every request/response type is registered once with its path, verb and,
//! for writes that expect a typed reply, the single valid reply type.

use std::{
    any::{TypeId, type_name},
    collections::HashMap,
    fmt,
};

use crate::{
    ChannelError, OperationResult, OperationResultSubmitted, PendingOperations, SessionSettings,
};

/// Request verb of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Fetch a resource (GET).
    Read,
    /// Submit a new resource (POST).
    Create,
    /// Replace a resource (PUT).
    Update,
}

impl Verb {
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
        })
    }
}

/// Registered reply type of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseType {
    pub id: TypeId,
    pub name: &'static str,
}

impl ResponseType {
    #[must_use]
    pub fn of<R: 'static>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: type_name::<R>(),
        }
    }
}

/// Endpoint registered for one wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    pub verb: Verb,
    pub response: Option<ResponseType>,
}

/// Type → endpoint table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<TypeId, Endpoint>,
}

impl EndpointRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The design server protocol under `api_prefix`.
    #[must_use]
    pub fn design_protocol(api_prefix: &str) -> Self {
        let prefix = api_prefix.trim_end_matches('/');
        Self::new()
            .register::<SessionSettings>(format!("{prefix}/settings"), Verb::Read)
            .register::<PendingOperations>(format!("{prefix}/operations"), Verb::Read)
            .register_with_response::<OperationResult, OperationResultSubmitted>(
                format!("{prefix}/operation-results"),
                Verb::Update,
            )
    }

    /// Register `T` at `path`.
    #[must_use]
    pub fn register<T: 'static>(mut self, path: impl Into<String>, verb: Verb) -> Self {
        self.endpoints.insert(
            TypeId::of::<T>(),
            Endpoint {
                path: path.into(),
                verb,
                response: None,
            },
        );
        self
    }

    /// Register `T` at `path`, answered with `R`.
    #[must_use]
    pub fn register_with_response<T: 'static, R: 'static>(
        mut self,
        path: impl Into<String>,
        verb: Verb,
    ) -> Self {
        self.endpoints.insert(
            TypeId::of::<T>(),
            Endpoint {
                path: path.into(),
                verb,
                response: Some(ResponseType::of::<R>()),
            },
        );
        self
    }

    #[must_use]
    pub fn get<T: 'static>(&self) -> Option<&Endpoint> {
        self.endpoints.get(&TypeId::of::<T>())
    }

    /// Endpoint of `T` for reads.
    ///
    /// # Errors
    /// `EndpointNotFound` if `T` is unregistered or not readable.
    pub fn read_endpoint<T: 'static>(&self) -> Result<&Endpoint, ChannelError> {
        self.get::<T>()
            .filter(|e| e.verb == Verb::Read)
            .ok_or_else(|| ChannelError::EndpointNotFound {
                resource: type_name::<T>(),
                verb: Verb::Read,
            })
    }

    /// Endpoint of `T` for writes.
    ///
    /// # Errors
    /// `EndpointNotFound` if `T` is unregistered or registered for reads.
    pub fn write_endpoint<T: 'static>(&self) -> Result<&Endpoint, ChannelError> {
        match self.get::<T>() {
            Some(e) if e.verb.is_write() => Ok(e),
            Some(e) => Err(ChannelError::EndpointNotFound {
                resource: type_name::<T>(),
                verb: e.verb,
            }),
            None => Err(ChannelError::EndpointNotFound {
                resource: type_name::<T>(),
                verb: Verb::Update,
            }),
        }
    }

    /// Write endpoint of `T`, checked to be answered with `R`.
    ///
    /// # Errors
    /// `ResponseTypeMismatch` if `T` does not declare `R` as its reply.
    pub fn write_endpoint_for<T: 'static, R: 'static>(&self) -> Result<&Endpoint, ChannelError> {
        let endpoint = self.write_endpoint::<T>()?;
        match endpoint.response {
            Some(r) if r.id == TypeId::of::<R>() => Ok(endpoint),
            other => Err(ChannelError::ResponseTypeMismatch {
                request: type_name::<T>(),
                expected: other.map_or("<none>", |r| r.name),
                actual: type_name::<R>(),
            }),
        }
    }
}
