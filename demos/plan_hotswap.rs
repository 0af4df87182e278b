//! Plan and apply a hotswap against an in-memory stack.
//!
//! This example shows how to:
//! - Implement the client traits (here with in-memory fakes)
//! - Inspect the classified changes before executing anything
//! - Apply the plan and read the result
//!
//! Run with: cargo run --example plan_hotswap
//!
//! Set `RUST_LOG=cfn_hotswap=debug` to see the engine's logs.

use async_trait::async_trait;
use cfn_hotswap::classify::{LambdaCodeUpdate, LambdaConfigurationUpdate};
use cfn_hotswap::clients::FunctionConfiguration;
use cfn_hotswap::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct InMemoryCloudFormation {
    template: Template,
    resources: Vec<ResourceSummary>,
}

#[async_trait]
impl CloudFormationApi for InMemoryCloudFormation {
    async fn get_template(&self, _stack_name: &str) -> Result<Option<Template>> {
        Ok(Some(self.template.clone()))
    }

    async fn list_stack_resources(&self, _stack_name: &str) -> Result<Vec<ResourceSummary>> {
        Ok(self.resources.clone())
    }

    async fn stack_parameters(&self, _stack_name: &str) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::from([("AssetKey".to_string(), "v1.zip".to_string())]))
    }

    async fn list_exports(&self) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }
}

struct PrintingLambda;

#[async_trait]
impl LambdaApi for PrintingLambda {
    async fn update_function_code(&self, update: &LambdaCodeUpdate) -> Result<FunctionConfiguration> {
        println!("  UpdateFunctionCode {} -> s3://{:?}/{:?}", update.function_name, update.s3_bucket, update.s3_key);
        Ok(FunctionConfiguration {
            function_name: update.function_name.clone(),
            ..Default::default()
        })
    }

    async fn update_function_configuration(
        &self,
        update: &LambdaConfigurationUpdate,
    ) -> Result<FunctionConfiguration> {
        println!("  UpdateFunctionConfiguration {}", update.function_name);
        Ok(FunctionConfiguration::default())
    }

    async fn get_function_configuration(&self, function_name: &str) -> Result<FunctionConfiguration> {
        Ok(FunctionConfiguration {
            function_name: function_name.to_string(),
            ..Default::default()
        })
    }

    async fn publish_version(&self, function_name: &str) -> Result<String> {
        println!("  PublishVersion {function_name}");
        Ok("1".to_string())
    }

    async fn update_alias(&self, function_name: &str, alias: &str, version: &str) -> Result<()> {
        println!("  UpdateAlias {function_name}:{alias} -> {version}");
        Ok(())
    }
}

fn template(key: serde_json::Value, memory: u32) -> Result<Template> {
    Template::from_value(json!({
        "Parameters": { "AssetKey": { "Type": "String" } },
        "Resources": {
            "Handler": {
                "Type": "AWS::Lambda::Function",
                "Properties": {
                    "Code": { "S3Bucket": { "Fn::Sub": "assets-${AWS::AccountId}" }, "S3Key": key },
                    "FunctionName": "orders-handler"
                }
            },
            "Worker": {
                "Type": "AWS::Lambda::Function",
                "Properties": {
                    "Code": { "S3Bucket": "assets", "S3Key": "worker.zip" },
                    "FunctionName": "orders-worker",
                    "MemorySize": memory
                }
            }
        }
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Hotswap Planning Example ===\n");

    let cloudformation = InMemoryCloudFormation {
        template: template(json!("v1.zip"), 128)?,
        resources: vec![
            ResourceSummary::new("Handler", "AWS::Lambda::Function", "orders-handler"),
            ResourceSummary::new("Worker", "AWS::Lambda::Function", "orders-worker"),
        ],
    };

    let mut settings = HotswapSettings::default();
    settings.environment.account = "123456789012".to_string();
    settings.environment.region = "eu-west-1".to_string();

    let deployer = HotswapDeployer::builder()
        .with_cloudformation(Arc::new(cloudformation))
        .with_lambda(Arc::new(PrintingLambda))
        .with_settings(settings)
        .build()
        .await?;

    // New code for the handler, and a memory change for the worker
    let generated = template(json!({ "Ref": "AssetKey" }), 256)?;
    let request = HotswapRequest::new("orders", generated).with_parameter("AssetKey", "v2.zip");

    for mode in [HotswapMode::FallBack, HotswapMode::HotswapOnly] {
        println!("--- Mode: {mode} ---");
        let Some(plan) = deployer.plan(&request.clone().with_mode(mode)).await? else {
            println!("stack is not deployed");
            continue;
        };

        for change in &plan.changes.hotswappable {
            println!("hotswappable: {} ({} operations)", change.logical_id, change.operations.len());
        }
        for change in &plan.changes.non_hotswappable {
            println!("needs full deployment: {}: {change}", change.logical_id);
        }

        match deployer.execute_plan(&plan).await? {
            None => println!("result: full deployment required\n"),
            Some(result) if result.no_op => println!("result: nothing to do\n"),
            Some(result) => println!("result: hotswapped {:?}\n", result.hotswapped_resources),
        }
    }

    Ok(())
}
