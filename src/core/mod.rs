//! Hotswap orchestration.
//!
//! One attempt loads the stack tree, classifies every change, applies the
//! mode policy and executes the resulting operations. Each attempt starts
//! from scratch; no state is shared between attempts.

mod builder;
mod deployer;
mod executor;
mod mode;
mod report;

pub use builder::HotswapDeployerBuilder;
pub use deployer::{HotswapDeployer, HotswapPlan};
pub use mode::{DeployResult, HotswapMode, HotswapRequest};
