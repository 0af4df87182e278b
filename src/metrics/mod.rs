//! Built-in metrics for hotswap deployments.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Hotswap attempts and their outcomes
//! - Attempt duration
//! - Service operations executed, per service
//! - Changes that required a full deployment, per reason
//!
//! # Examples
//!
//! ```rust,no_run
//! use cfn_hotswap::prelude::*;
//! use opentelemetry::global;
//!
//! # async fn example() -> Result<()> {
//! let meter = global::meter("my-deployer");
//!
//! let deployer = HotswapDeployer::builder()
//!     .with_settings_file("hotswap.yaml")
//!     .with_metrics(meter)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod hotswap_metrics;

pub use hotswap_metrics::{AttemptOutcome, HotswapMetrics};
