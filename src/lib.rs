//! # cfn-hotswap
//!
//! Hotswap deployments for CloudFormation stacks.
//!
//! ## Overview
//!
//! Given a deployed stack and a newly synthesized template, `cfn-hotswap`
//! decides resource by resource whether the difference can be applied by
//! calling narrow service APIs directly instead of running a full stack
//! update. It combines:
//! - Structural diffing of the deployed and synthesized templates
//! - An evaluator for CloudFormation intrinsic functions (`Ref`,
//!   `Fn::GetAtt`, `Fn::Join`, `Fn::Sub`, ...) against live parameters and
//!   physical resource IDs
//! - Per resource type classifiers for Lambda functions, CodeBuild projects
//!   and Step Functions state machines
//! - Recursive traversal of nested stacks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cfn_hotswap::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     cloudformation: Arc<dyn CloudFormationApi>,
//! #     lambda: Arc<dyn LambdaApi>,
//! # ) -> cfn_hotswap::error::Result<()> {
//! let deployer = HotswapDeployer::builder()
//!     .with_cloudformation(cloudformation)
//!     .with_lambda(lambda)
//!     .with_nested_templates(Arc::new(DirectoryTemplateSource::new("cdk.out")))
//!     .with_settings_file("hotswap.yaml")
//!     .with_env_overrides("HOTSWAP", "__")
//!     .build()
//!     .await?;
//!
//! let template = Template::parse(&std::fs::read_to_string("cdk.out/MyStack.template.json")?)?;
//! let request = HotswapRequest::new("MyStack", template);
//!
//! match deployer.try_hotswap_deployment(&request).await? {
//!     None => println!("falling back to a full deployment"),
//!     Some(result) if result.no_op => println!("no changes"),
//!     Some(result) => println!("hotswapped {}", result.hotswapped_resources.join(", ")),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `yaml` (default): parse YAML templates
//! - `aws`: client implementations backed by the AWS SDK for Rust
//! - `metrics`: OpenTelemetry metrics for attempts and operations
//!
//! ```toml
//! [dependencies]
//! cfn-hotswap = { version = "0.1", features = ["aws", "metrics"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod classify;
pub mod clients;
pub mod core;
pub mod diff;
pub mod error;
pub mod evaluate;
pub mod nested;
pub mod settings;
pub mod sources;
pub mod template;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::classify::{ChangeOperation, HotswapVerdict, Service};
    pub use crate::clients::{
        CloudFormationApi, CodeBuildApi, DirectoryTemplateSource, LambdaApi,
        NestedTemplateSource, StaticTemplateSource, StepFunctionsApi,
    };
    pub use crate::core::{
        DeployResult, HotswapDeployer, HotswapDeployerBuilder, HotswapMode, HotswapPlan,
        HotswapRequest,
    };
    pub use crate::error::{EvaluationError, HotswapError, Result};
    pub use crate::settings::HotswapSettings;
    pub use crate::template::{ResourceSummary, Template};
}
