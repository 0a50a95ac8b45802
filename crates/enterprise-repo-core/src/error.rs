//! Error types for stack synthesis

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: CIDR block malformed or subnets do not fit
    E001InvalidNetwork,
    /// E002: Two resources share a logical id
    E002DuplicateResource,
    /// E003: A dependency or reference points at an undeclared resource
    E003UnknownReference,
    /// E004: The resource graph contains a cycle
    E004DependencyCycle,
    /// E005: State machine template could not be loaded or patched
    E005TemplatePatch,
    /// E006: Asset could not be read or staged
    E006Asset,
    /// E007: Compliance findings left unsuppressed
    E007Compliance,
    /// E008: Configuration missing or invalid
    E008InvalidConfig,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidNetwork => "E001",
            Self::E002DuplicateResource => "E002",
            Self::E003UnknownReference => "E003",
            Self::E004DependencyCycle => "E004",
            Self::E005TemplatePatch => "E005",
            Self::E006Asset => "E006",
            Self::E007Compliance => "E007",
            Self::E008InvalidConfig => "E008",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while building or rendering the stack
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("[{code}] Invalid network layout: {message}")]
    InvalidNetwork { code: ErrorCode, message: String },

    #[error("[{code}] Resource '{logical_id}' is declared more than once")]
    DuplicateResource { code: ErrorCode, logical_id: String },

    #[error("[{code}] Resource '{from}' refers to undeclared resource '{to}'")]
    UnknownReference {
        code: ErrorCode,
        from: String,
        to: String,
    },

    #[error("[{code}] Dependency cycle between resources: {}", members.join(" -> "))]
    DependencyCycle {
        code: ErrorCode,
        members: Vec<String>,
    },

    #[error("[{code}] State machine template: {message}")]
    TemplatePatch { code: ErrorCode, message: String },

    #[error("[{code}] Asset '{path}': {message}")]
    Asset {
        code: ErrorCode,
        path: String,
        message: String,
    },

    #[error("[{code}] {count} unsuppressed compliance finding(s): {}", rules.join(", "))]
    Compliance {
        code: ErrorCode,
        count: usize,
        rules: Vec<String>,
    },

    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: ErrorCode, message: String },

    #[error("Failed to serialize template: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SynthError {
    pub fn invalid_network(message: impl Into<String>) -> Self {
        Self::InvalidNetwork {
            code: ErrorCode::E001InvalidNetwork,
            message: message.into(),
        }
    }

    pub fn duplicate_resource(logical_id: impl Into<String>) -> Self {
        Self::DuplicateResource {
            code: ErrorCode::E002DuplicateResource,
            logical_id: logical_id.into(),
        }
    }

    pub fn unknown_reference(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::UnknownReference {
            code: ErrorCode::E003UnknownReference,
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn dependency_cycle(members: Vec<String>) -> Self {
        Self::DependencyCycle {
            code: ErrorCode::E004DependencyCycle,
            members,
        }
    }

    pub fn template_patch(message: impl Into<String>) -> Self {
        Self::TemplatePatch {
            code: ErrorCode::E005TemplatePatch,
            message: message.into(),
        }
    }

    pub fn asset(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Asset {
            code: ErrorCode::E006Asset,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn compliance(rules: Vec<String>) -> Self {
        Self::Compliance {
            code: ErrorCode::E007Compliance,
            count: rules.len(),
            rules,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E008InvalidConfig,
            message: message.into(),
        }
    }

    /// Stable code for this error, if it carries one
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::InvalidNetwork { code, .. }
            | Self::DuplicateResource { code, .. }
            | Self::UnknownReference { code, .. }
            | Self::DependencyCycle { code, .. }
            | Self::TemplatePatch { code, .. }
            | Self::Asset { code, .. }
            | Self::Compliance { code, .. }
            | Self::InvalidConfig { code, .. } => Some(*code),
            Self::Serialize(_) => None,
        }
    }
}

/// Result type alias for SynthError
pub type Result<T> = std::result::Result<T, SynthError>;
