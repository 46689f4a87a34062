//! The fixed set of design-time operations and their arguments.

use std::{fmt, str::FromStr};

use design_client_core::{DesignOperation, Parameters};
use serde_json::Value;

/// Named remote procedures understood by the design component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationName {
    AddMigration,
    RemoveMigration,
    GetMigrations,
    ScriptMigration,
    DropDatabase,
    GetDatabase,
    UpdateDatabase,
    GetContextTypes,
    GetContextType,
    ReverseEngineer,
}

impl OperationName {
    pub const ALL: [Self; 10] = [
        Self::AddMigration,
        Self::RemoveMigration,
        Self::GetMigrations,
        Self::ScriptMigration,
        Self::DropDatabase,
        Self::GetDatabase,
        Self::UpdateDatabase,
        Self::GetContextTypes,
        Self::GetContextType,
        Self::ReverseEngineer,
    ];

    /// Canonical (PascalCase) name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddMigration => "AddMigration",
            Self::RemoveMigration => "RemoveMigration",
            Self::GetMigrations => "GetMigrations",
            Self::ScriptMigration => "ScriptMigration",
            Self::DropDatabase => "DropDatabase",
            Self::GetDatabase => "GetDatabase",
            Self::UpdateDatabase => "UpdateDatabase",
            Self::GetContextTypes => "GetContextTypes",
            Self::GetContextType => "GetContextType",
            Self::ReverseEngineer => "ReverseEngineer",
        }
    }

    /// Whether the operation produces no output.
    #[must_use]
    pub const fn is_void(self) -> bool {
        matches!(
            self,
            Self::RemoveMigration | Self::DropDatabase | Self::UpdateDatabase
        )
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown operation name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

impl FromStr for OperationName {
    type Err = UnknownOperation;

    /// Accepts `AddMigration`, `add-migration` or `add_migration`, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(&folded))
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// An operation name with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub name: OperationName,
    pub parameters: Parameters,
}

impl OperationRequest {
    fn new<const N: usize>(name: OperationName, args: [(&str, Value); N]) -> Self {
        let parameters = args
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self { name, parameters }
    }

    #[must_use]
    pub fn add_migration(name: &str, output_dir: Option<&str>, context_type: Option<&str>) -> Self {
        Self::new(
            OperationName::AddMigration,
            [
                ("name", name.into()),
                ("outputDir", output_dir.into()),
                ("contextType", context_type.into()),
            ],
        )
    }

    #[must_use]
    pub fn remove_migration(context_type: Option<&str>, force: bool) -> Self {
        Self::new(
            OperationName::RemoveMigration,
            [("contextType", context_type.into()), ("force", force.into())],
        )
    }

    #[must_use]
    pub fn get_migrations(context_type: Option<&str>) -> Self {
        Self::new(
            OperationName::GetMigrations,
            [("contextType", context_type.into())],
        )
    }

    #[must_use]
    pub fn script_migration(
        from_migration: Option<&str>,
        to_migration: Option<&str>,
        idempotent: bool,
        context_type: Option<&str>,
    ) -> Self {
        Self::new(
            OperationName::ScriptMigration,
            [
                ("fromMigration", from_migration.into()),
                ("toMigration", to_migration.into()),
                ("idempotent", idempotent.into()),
                ("contextType", context_type.into()),
            ],
        )
    }

    #[must_use]
    pub fn drop_database(context_type: Option<&str>) -> Self {
        Self::new(
            OperationName::DropDatabase,
            [("contextType", context_type.into())],
        )
    }

    #[must_use]
    pub fn get_database(context_type: Option<&str>) -> Self {
        Self::new(
            OperationName::GetDatabase,
            [("contextType", context_type.into())],
        )
    }

    #[must_use]
    pub fn update_database(target_migration: Option<&str>, context_type: Option<&str>) -> Self {
        Self::new(
            OperationName::UpdateDatabase,
            [
                ("targetMigration", target_migration.into()),
                ("contextType", context_type.into()),
            ],
        )
    }

    #[must_use]
    pub fn get_context_types() -> Self {
        Self::new(OperationName::GetContextTypes, [])
    }

    #[must_use]
    pub fn get_context_type(name: &str) -> Self {
        Self::new(OperationName::GetContextType, [("name", name.into())])
    }

    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn reverse_engineer(
        provider: &str,
        connection_string: &str,
        output_dir: Option<&str>,
        db_context_class_name: Option<&str>,
        schema_filters: &[&str],
        table_filters: &[&str],
        use_data_annotations: bool,
        overwrite_files: bool,
    ) -> Self {
        Self::new(
            OperationName::ReverseEngineer,
            [
                ("provider", provider.into()),
                ("connectionString", connection_string.into()),
                ("outputDir", output_dir.into()),
                ("dbContextClassName", db_context_class_name.into()),
                ("schemaFilters", schema_filters.into()),
                ("tableFilters", table_filters.into()),
                ("useDataAnnotations", use_data_annotations.into()),
                ("overwriteFiles", overwrite_files.into()),
            ],
        )
    }

    /// Wrap into a descriptor with a fresh identifier.
    #[must_use]
    pub fn into_descriptor(self) -> DesignOperation {
        DesignOperation {
            parameters: self.parameters,
            ..DesignOperation::new(self.name.as_str())
        }
    }
}
