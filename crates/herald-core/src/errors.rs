use herald_core_types::{InvocationId, TraceId};
use thiserror::Error;

/// Result type alias using HeraldError
pub type Result<T> = std::result::Result<T, HeraldError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable by adapters, tests and
/// external API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Registration
    DuplicateName,
    NotFound,
    InvalidDeclaration,
    CycleDetected,

    // Query / aggregation model
    InvalidQuery,
    InvalidExpression,
    InvalidFieldDefinition,
    UnknownTable,

    // Invocation
    PolicyDenied,
    HandlerFault,

    // Integration
    Persistence,
    Serialization,
    Config,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::DuplicateName => "ERR_DUPLICATE_NAME",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::InvalidDeclaration => "ERR_INVALID_DECLARATION",
            ExErrorKind::CycleDetected => "ERR_CYCLE_DETECTED",
            ExErrorKind::InvalidQuery => "ERR_INVALID_QUERY",
            ExErrorKind::InvalidExpression => "ERR_INVALID_EXPRESSION",
            ExErrorKind::InvalidFieldDefinition => "ERR_INVALID_FIELD_DEFINITION",
            ExErrorKind::UnknownTable => "ERR_UNKNOWN_TABLE",
            ExErrorKind::PolicyDenied => "ERR_POLICY_DENIED",
            ExErrorKind::HandlerFault => "ERR_HANDLER_FAULT",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a stable kind plus optional invocation context for logging and
/// adapter-facing responses.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    command: Option<String>,
    table: Option<String>,
    invocation_id: Option<InvocationId>,
    trace_id: Option<TraceId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            command: None,
            table: None,
            invocation_id: None,
            trace_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add command name context
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Add table name context
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_invocation_id(mut self, invocation_id: InvocationId) -> Self {
        self.invocation_id = Some(invocation_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn invocation_id(&self) -> Option<&InvocationId> {
        self.invocation_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(command) = &self.command {
            write!(f, " (command: {})", command)?;
        }
        if let Some(table) = &self.table {
            write!(f, " (table: {})", table)?;
        }
        if let Some(invocation_id) = &self.invocation_id {
            write!(f, " (invocation: {})", invocation_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for registration, declaration and storage faults
///
/// These are configuration-time errors. Per-invocation policy vetoes are
/// replies, not errors, and handler faults travel as `anyhow::Error`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeraldError {
    // ===== Registry Errors =====
    /// An alias is already bound to a different command
    #[error("Duplicate command names: \"{name}\"")]
    DuplicateCommandName { name: String },

    /// No command is registered under the given name or id
    #[error("Command not found: {name}")]
    CommandNotFound { name: String },

    /// The command template could not be parsed
    #[error("Invalid command declaration \"{declaration}\": {reason}")]
    InvalidCommandDeclaration { declaration: String, reason: String },

    /// Re-parenting would make a command its own descendant
    #[error("Cannot set command {command} as its own descendant")]
    CyclicCommandParent { command: String },

    // ===== Query Model Errors =====
    /// Query shape is not valid for the target table
    #[error("Invalid query syntax for table {table}: {reason}")]
    InvalidQuery { table: String, reason: String },

    /// Aggregation or boolean expression is malformed
    #[error("Invalid expression: {reason}")]
    InvalidExpression { reason: String },

    /// Field definition string does not match `type(args)`
    #[error("Invalid field definition: \"{definition}\"")]
    InvalidFieldDefinition { definition: String },

    /// Table has not been declared
    #[error("Unknown table: {table}")]
    UnknownTable { table: String },

    // ===== Integration Errors =====
    /// Storage collaborator failure
    #[error("Storage error in {op}: {message}")]
    Storage { op: String, message: String },

    /// Serialization error (JSON / TOML encoding or decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Runtime configuration is invalid
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl HeraldError {
    /// Shorthand for an `InvalidQuery` on `table`
    pub fn invalid_query(table: impl Into<String>, reason: impl Into<String>) -> Self {
        HeraldError::InvalidQuery {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an `InvalidExpression`
    pub fn invalid_expression(reason: impl Into<String>) -> Self {
        HeraldError::InvalidExpression {
            reason: reason.into(),
        }
    }
}

/// Conversion from HeraldError to ExError
impl From<HeraldError> for ExError {
    fn from(err: HeraldError) -> Self {
        match err {
            HeraldError::DuplicateCommandName { name } => ExError::new(ExErrorKind::DuplicateName)
                .with_command(name)
                .with_op("register_alias")
                .with_message("Alias is already bound to a different command"),

            HeraldError::CommandNotFound { name } => ExError::new(ExErrorKind::NotFound)
                .with_command(name)
                .with_message("Command not found"),

            HeraldError::InvalidCommandDeclaration {
                declaration,
                reason,
            } => ExError::new(ExErrorKind::InvalidDeclaration)
                .with_op("parse_declaration")
                .with_message(format!("{}: {}", declaration, reason)),

            HeraldError::CyclicCommandParent { command } => {
                ExError::new(ExErrorKind::CycleDetected)
                    .with_command(command)
                    .with_message("Command cannot be its own descendant")
            }

            HeraldError::InvalidQuery { table, reason } => ExError::new(ExErrorKind::InvalidQuery)
                .with_table(table)
                .with_op("resolve_query")
                .with_message(reason),

            HeraldError::InvalidExpression { reason } => {
                ExError::new(ExErrorKind::InvalidExpression).with_message(reason)
            }

            HeraldError::InvalidFieldDefinition { definition } => {
                ExError::new(ExErrorKind::InvalidFieldDefinition)
                    .with_op("parse_field")
                    .with_message(format!("Invalid field definition: {}", definition))
            }

            HeraldError::UnknownTable { table } => ExError::new(ExErrorKind::UnknownTable)
                .with_table(table)
                .with_message("Table has not been declared"),

            HeraldError::Storage { op, message } => ExError::new(ExErrorKind::Persistence)
                .with_op(op)
                .with_message(message),

            HeraldError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            HeraldError::Config { message } => {
                ExError::new(ExErrorKind::Config).with_message(message)
            }

            HeraldError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to HeraldError
impl From<serde_json::Error> for HeraldError {
    fn from(err: serde_json::Error) -> Self {
        HeraldError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes_are_unique() {
        let kinds = [
            ExErrorKind::DuplicateName,
            ExErrorKind::NotFound,
            ExErrorKind::InvalidDeclaration,
            ExErrorKind::CycleDetected,
            ExErrorKind::InvalidQuery,
            ExErrorKind::InvalidExpression,
            ExErrorKind::InvalidFieldDefinition,
            ExErrorKind::UnknownTable,
            ExErrorKind::PolicyDenied,
            ExErrorKind::HandlerFault,
            ExErrorKind::Persistence,
            ExErrorKind::Serialization,
            ExErrorKind::Config,
            ExErrorKind::Internal,
        ];
        let mut codes: Vec<&str> = kinds.iter().map(|k| k.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_duplicate_name_conversion() {
        let err = HeraldError::DuplicateCommandName {
            name: "echo".to_string(),
        };
        let ex: ExError = err.into();

        assert_eq!(ex.kind(), ExErrorKind::DuplicateName);
        assert_eq!(ex.code(), "ERR_DUPLICATE_NAME");
        assert_eq!(ex.command(), Some("echo"));
    }

    #[test]
    fn test_display_includes_context() {
        let ex = ExError::new(ExErrorKind::InvalidQuery)
            .with_op("resolve_query")
            .with_table("channel")
            .with_message("composite primary key");
        let text = ex.to_string();

        assert!(text.contains("ERR_INVALID_QUERY"));
        assert!(text.contains("resolve_query"));
        assert!(text.contains("channel"));
    }

    #[test]
    fn test_source_chain() {
        let inner = ExError::new(ExErrorKind::Persistence).with_message("disk");
        let outer = ExError::new(ExErrorKind::Internal).with_source(inner);

        assert_eq!(
            outer.source_error().map(|e| e.kind()),
            Some(ExErrorKind::Persistence)
        );
        assert!(std::error::Error::source(&outer).is_some());
    }
}
