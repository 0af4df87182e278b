//! Error types for cfn-hotswap.
//!
//! Two layers of failure exist. [`EvaluationError`] is raised by the intrinsic
//! evaluator and is always fatal for the attempt that produced it.
//! [`HotswapError`] is what every public entry point returns; it wraps
//! evaluation errors and adds template, client, waiter and settings failures.
//! Per-resource "cannot hotswap this" outcomes are never errors, see
//! [`HotswapVerdict`](crate::classify::HotswapVerdict).

use std::fmt;

/// Result type alias for cfn-hotswap operations.
pub type Result<T> = std::result::Result<T, HotswapError>;

/// Errors that abort a hotswap attempt.
#[derive(Debug, thiserror::Error)]
pub enum HotswapError {
    /// An intrinsic function could not be evaluated.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// A template body could not be parsed.
    #[error("Failed to parse template: {0}")]
    TemplateParse(String),

    /// A call to an AWS service API failed.
    #[error("{operation} failed: {message}")]
    Api {
        /// Name of the API operation, e.g. `UpdateFunctionCode`
        operation: &'static str,
        /// Error message reported by the service or transport
        message: String,
    },

    /// The Lambda function-updated waiter ended in a non-success state.
    #[error("Resource is not in the expected state due to waiter status: {state}{}", reason_suffix(.reason))]
    Waiter {
        /// Terminal waiter state
        state: WaiterState,
        /// Reason reported by the service, if any
        reason: Option<String>,
    },

    /// An operation needs a service client that was not configured.
    #[error("No {0} client configured")]
    ClientNotConfigured(&'static str),

    /// Inline function code could not be packaged.
    #[error("Failed to package inline code: {0}")]
    Packaging(String),

    /// Nested stack data could not be loaded.
    #[error("Failed to load nested stack '{logical_id}': {message}")]
    NestedStack {
        /// Logical ID of the nested stack resource
        logical_id: String,
        /// What went wrong
        message: String,
    },

    /// Settings could not be loaded from their sources.
    #[error("Failed to load settings: {0}")]
    SettingsLoad(String),

    /// Settings were loaded but could not be deserialized.
    #[error("Failed to deserialize settings: {0}")]
    SettingsDeserialize(String),

    /// Settings failed validation.
    #[error("Settings validation failed: {0}")]
    SettingsValidation(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HotswapError {
    /// Create an API error for the given operation.
    pub fn api(operation: &'static str, message: impl fmt::Display) -> Self {
        Self::Api {
            operation,
            message: message.to_string(),
        }
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(". Reason: {r}"))
        .unwrap_or_default()
}

/// Terminal states of the Lambda function-updated waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterState {
    /// The function reported a failed update.
    Failure,
    /// The maximum wait time elapsed before the update finished.
    Timeout,
}

impl fmt::Display for WaiterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure => write!(f, "FAILURE"),
            Self::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Fatal failures of the intrinsic evaluator.
///
/// The messages are part of the observable contract and are shown to users as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    /// `Ref` target is neither a parameter nor a deployed resource.
    #[error("Parameter or resource '{0}' could not be found for evaluation")]
    RefNotFound(String),

    /// `Fn::GetAtt` target resource is not deployed or not in the template.
    #[error("Attribute '{attribute}' of resource '{logical_id}' could not be found for evaluation")]
    AttributeNotFound {
        /// Logical ID of the target resource
        logical_id: String,
        /// Requested attribute
        attribute: String,
    },

    /// The attribute table has no entry for the resource type.
    #[error("We don't support attributes of the '{resource_type}' resource. This is a CDK limitation. Please report it at https://github.com/aws/aws-cdk/issues/new/choose")]
    UnsupportedResourceType {
        /// CloudFormation resource type
        resource_type: String,
    },

    /// The attribute table has no entry for this attribute of the resource type.
    #[error("We don't support the '{attribute}' attribute of the '{resource_type}' resource. This is a CDK limitation. Please report it at https://github.com/aws/aws-cdk/issues/new/choose")]
    UnsupportedAttribute {
        /// Requested attribute
        attribute: String,
        /// CloudFormation resource type
        resource_type: String,
    },

    /// An `Fn::*` function the evaluator does not implement.
    #[error("CloudFormation function {0} is not supported")]
    UnsupportedFunction(String),

    /// `Fn::ImportValue` names an export that does not exist.
    #[error("Export '{0}' could not be found for evaluation")]
    ExportNotFound(String),

    /// An intrinsic function was given arguments of the wrong shape.
    #[error("Invalid arguments to {function}: {reason}")]
    InvalidArguments {
        /// Intrinsic function name
        function: &'static str,
        /// What was wrong with the arguments
        reason: String,
    },

    /// Inline code was given for a runtime without a known file extension.
    #[error("runtime {0} is unsupported, only node.js and python runtimes are currently supported.")]
    UnsupportedInlineRuntime(String),
}

impl EvaluationError {
    /// Create an invalid arguments error.
    pub fn invalid_arguments(function: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            function,
            reason: reason.into(),
        }
    }
}
