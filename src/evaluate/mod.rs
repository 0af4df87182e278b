//! Intrinsic function evaluation.
//!
//! Resolves `Ref`, `Fn::GetAtt`, `Fn::Join`, `Fn::Sub`, `Fn::Split`,
//! `Fn::Select` and `Fn::ImportValue` nodes inside template values against an
//! [`EvaluationContext`]: the parameter table, pseudo parameters and physical
//! resource IDs of exactly one stack level.
//!
//! # Examples
//!
//! ```rust
//! use cfn_hotswap::evaluate::{EvaluationContext, ParameterTable, StackEnvironment};
//! use cfn_hotswap::nested::StackSnapshot;
//! use cfn_hotswap::template::{ResourceSummary, Template};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let stack = StackSnapshot::new("my-stack", Template::default(), Template::default())
//!     .with_resources(vec![ResourceSummary::new("Bus", "AWS::Events::EventBus", "my-bus")]);
//! let ctx = EvaluationContext::new(
//!     Arc::new(stack),
//!     ParameterTable::new(),
//!     Arc::new(StackEnvironment::new("123456789012", "us-east-1")),
//!     Arc::default(),
//! );
//!
//! let arn = ctx.evaluate(&json!({ "Fn::GetAtt": ["Bus", "Arn"] })).unwrap();
//! assert_eq!(arn, json!("arn:aws:events:us-east-1:123456789012:event-bus/my-bus"));
//! ```

mod attributes;
mod context;
mod intrinsics;
mod sub;

pub use context::{EvaluationContext, ParameterTable, StackEnvironment, default_url_suffix};
pub use intrinsics::is_intrinsic;
pub(crate) use intrinsics::scalar_to_string;
