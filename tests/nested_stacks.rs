//! Hotswaps across nested stack trees.

mod common;

use cfn_hotswap::prelude::*;
use common::{Call, FakeCloudFormation, Harness, STACK, template_of};
use serde_json::{Value, json};

fn function(name: &str, key: Value) -> Value {
    json!({
        "Type": "AWS::Lambda::Function",
        "Properties": {
            "Code": { "S3Bucket": "bucket", "S3Key": key },
            "FunctionName": name
        }
    })
}

fn nested_stack(asset_path: &str) -> Value {
    json!({
        "Type": "AWS::CloudFormation::Stack",
        "Properties": { "TemplateURL": "https://www.magic-url.com" },
        "Metadata": { "aws:asset:path": asset_path }
    })
}

fn stack_summary(logical_id: &str, physical_id: &str) -> ResourceSummary {
    ResourceSummary::new(logical_id, "AWS::CloudFormation::Stack", physical_id)
}

fn code_update_names(harness: &Harness) -> Vec<String> {
    let mut names: Vec<String> = harness
        .log
        .updates()
        .into_iter()
        .filter_map(|call| match call {
            Call::UpdateFunctionCode(update) => Some(update.function_name),
            _ => None,
        })
        .collect();
    names.sort();
    names
}

/// Root function, two sibling nested stacks, one of them with a grandchild.
fn three_layer_tree(key: &str) -> (Value, Value, Value, Value) {
    let root = json!({
        "Resources": {
            "RootFunc": function("root-function", json!(key)),
            "ChildA": nested_stack("child-a.nested.template.json"),
            "ChildB": nested_stack("child-b.nested.template.json"),
        }
    });
    let child_a = json!({
        "Resources": { "GrandChild": nested_stack("grandchild.nested.template.json") }
    });
    let child_b = json!({ "Resources": { "FuncB": function("function-b", json!(key)) } });
    let grandchild = json!({ "Resources": { "DeepFunc": function("deep-function", json!(key)) } });
    (root, child_a, child_b, grandchild)
}

fn deployed_tree() -> FakeCloudFormation {
    let (root, child_a, child_b, grandchild) = three_layer_tree("current");
    FakeCloudFormation::new()
        .with_stack(
            STACK,
            root,
            vec![
                ResourceSummary::new("RootFunc", "AWS::Lambda::Function", "root-function"),
                stack_summary("ChildA", "child-a-stack"),
                stack_summary("ChildB", "child-b-stack"),
            ],
        )
        .with_stack(
            "child-a-stack",
            child_a,
            vec![stack_summary("GrandChild", "grandchild-stack")],
        )
        .with_stack(
            "child-b-stack",
            child_b,
            vec![ResourceSummary::new("FuncB", "AWS::Lambda::Function", "function-b")],
        )
        .with_stack(
            "grandchild-stack",
            grandchild,
            vec![ResourceSummary::new("DeepFunc", "AWS::Lambda::Function", "deep-function")],
        )
}

fn generated_templates(child_a: Value, child_b: Value, grandchild: Value) -> StaticTemplateSource {
    StaticTemplateSource::new()
        .with_template("child-a.nested.template.json", template_of(child_a))
        .with_template("child-b.nested.template.json", template_of(child_b))
        .with_template("grandchild.nested.template.json", template_of(grandchild))
}

#[tokio::test]
async fn test_three_layers_and_siblings_in_one_attempt() {
    let (root, child_a, child_b, grandchild) = three_layer_tree("new");
    let harness = Harness::with_templates(
        deployed_tree(),
        generated_templates(child_a, child_b, grandchild),
        |lambda| lambda,
    )
    .await;

    let result = harness
        .hotswap(root, HotswapMode::FallBack)
        .await
        .unwrap()
        .unwrap();

    assert!(!result.no_op);
    assert_eq!(
        code_update_names(&harness),
        vec!["deep-function", "function-b", "root-function"]
    );
}

#[tokio::test]
async fn test_only_deep_change() {
    let (root, child_a, child_b, _) = three_layer_tree("current");
    let (_, _, _, grandchild) = three_layer_tree("new");
    let harness = Harness::with_templates(
        deployed_tree(),
        generated_templates(child_a, child_b, grandchild),
        |lambda| lambda,
    )
    .await;

    harness.hotswap(root, HotswapMode::FallBack).await.unwrap().unwrap();
    assert_eq!(code_update_names(&harness), vec!["deep-function"]);
}

#[tokio::test]
async fn test_non_hotswappable_change_deep_in_tree() {
    let (root, child_a, child_b, mut grandchild) = three_layer_tree("new");
    grandchild["Resources"]["DeepFunc"]["Properties"]["Handler"] = json!("index.other");
    let templates = || generated_templates(child_a.clone(), child_b.clone(), grandchild.clone());

    let harness = Harness::with_templates(deployed_tree(), templates(), |lambda| lambda).await;
    assert_eq!(harness.hotswap(root.clone(), HotswapMode::FallBack).await.unwrap(), None);
    assert!(harness.log.calls().is_empty());

    let harness = Harness::with_templates(deployed_tree(), templates(), |lambda| lambda).await;
    harness.hotswap(root, HotswapMode::HotswapOnly).await.unwrap().unwrap();
    assert_eq!(code_update_names(&harness), vec!["function-b", "root-function"]);
}

#[tokio::test]
async fn test_creating_nested_stack_by_mode() {
    let deployed = json!({ "Resources": { "RootFunc": function("root-function", json!("current")) } });
    let generated = json!({
        "Resources": {
            "RootFunc": function("root-function", json!("new")),
            "NewChild": nested_stack("new-child.nested.template.json"),
        }
    });
    let cloudformation = || {
        FakeCloudFormation::new().with_stack(
            STACK,
            deployed.clone(),
            vec![ResourceSummary::new("RootFunc", "AWS::Lambda::Function", "root-function")],
        )
    };
    let templates = || {
        StaticTemplateSource::new().with_template(
            "new-child.nested.template.json",
            template_of(json!({ "Resources": { "Func": function("new-function", json!("k")) } })),
        )
    };

    let harness = Harness::with_templates(cloudformation(), templates(), |lambda| lambda).await;
    assert_eq!(harness.hotswap(generated.clone(), HotswapMode::FallBack).await.unwrap(), None);

    let harness = Harness::with_templates(cloudformation(), templates(), |lambda| lambda).await;
    let result = harness
        .hotswap(generated, HotswapMode::HotswapOnly)
        .await
        .unwrap()
        .unwrap();
    assert!(!result.no_op);
    assert_eq!(code_update_names(&harness), vec!["root-function"]);
}

#[tokio::test]
async fn test_deleting_nested_stack_by_mode() {
    let (root, child_a, child_b, grandchild) = three_layer_tree("current");
    let mut generated = root.clone();
    generated["Resources"].as_object_mut().unwrap().remove("ChildB");
    let templates = || generated_templates(child_a.clone(), child_b.clone(), grandchild.clone());

    let harness = Harness::with_templates(deployed_tree(), templates(), |lambda| lambda).await;
    assert_eq!(harness.hotswap(generated.clone(), HotswapMode::FallBack).await.unwrap(), None);

    let harness = Harness::with_templates(deployed_tree(), templates(), |lambda| lambda).await;
    let result = harness.hotswap(generated, HotswapMode::HotswapOnly).await.unwrap();
    assert_eq!(result, Some(DeployResult::no_op()));
}

#[tokio::test]
async fn test_parameters_flow_into_nested_stack() {
    let root = |key_parameter: Value| {
        json!({
            "Parameters": { "RootKey": { "Type": "String" } },
            "Resources": {
                "Child": {
                    "Type": "AWS::CloudFormation::Stack",
                    "Properties": {
                        "TemplateURL": "https://www.magic-url.com",
                        "Parameters": { "Key": key_parameter }
                    },
                    "Metadata": { "aws:asset:path": "child.nested.template.json" }
                }
            }
        })
    };
    let child = |key: Value| {
        json!({
            "Parameters": { "Key": { "Type": "String" } },
            "Resources": { "Func": function("child-function", key) }
        })
    };

    let cloudformation = FakeCloudFormation::new()
        .with_stack(STACK, root(json!("old.zip")), vec![stack_summary("Child", "child-stack")])
        .with_stack(
            "child-stack",
            child(json!("old.zip")),
            vec![ResourceSummary::new("Func", "AWS::Lambda::Function", "child-function")],
        );
    let templates = StaticTemplateSource::new().with_template(
        "child.nested.template.json",
        template_of(child(json!({ "Fn::Sub": "${Key}.zip" }))),
    );
    let harness = Harness::with_templates(cloudformation, templates, |lambda| lambda).await;

    let request = HotswapRequest::new(STACK, template_of(root(json!({ "Ref": "RootKey" }))))
        .with_parameter("RootKey", "new");
    harness
        .deployer
        .try_hotswap_deployment(&request)
        .await
        .unwrap()
        .unwrap();

    let Call::UpdateFunctionCode(update) = &harness.log.calls()[0] else {
        panic!("expected a code update");
    };
    assert_eq!(update.function_name, "child-function");
    assert_eq!(update.s3_key.as_deref(), Some("new.zip"));
}

#[tokio::test]
async fn test_nested_stack_without_physical_name() {
    let (root, child_a, _, grandchild) = three_layer_tree("current");
    let (_, _, child_b, _) = three_layer_tree("new");
    let cloudformation = FakeCloudFormation::new()
        .with_stack(
            STACK,
            root.clone(),
            vec![
                ResourceSummary::new("RootFunc", "AWS::Lambda::Function", "root-function"),
                stack_summary("ChildA", "child-a-stack"),
            ],
        )
        .with_stack(
            "child-a-stack",
            child_a.clone(),
            vec![stack_summary("GrandChild", "grandchild-stack")],
        )
        .with_stack("grandchild-stack", grandchild.clone(), vec![]);
    let harness = Harness::with_templates(
        cloudformation,
        generated_templates(child_a, child_b, grandchild),
        |lambda| lambda,
    )
    .await;

    let plan = harness
        .deployer
        .plan(&HotswapRequest::new(STACK, template_of(root)))
        .await
        .unwrap()
        .unwrap();
    assert!(plan.requires_full_deployment());
    assert_eq!(
        plan.changes.non_hotswappable[0].to_string(),
        "physical name for AWS::CloudFormation::Stack 'ChildB' could not be found in CloudFormation, \
         so this is a newly created nested stack and cannot be hotswapped"
    );
}

#[tokio::test]
async fn test_nested_stack_output_feeds_parent_function() {
    let root = |bucket: Value| {
        json!({
            "Resources": {
                "Func": {
                    "Type": "AWS::Lambda::Function",
                    "Properties": {
                        "Code": { "S3Bucket": bucket, "S3Key": "code.zip" },
                        "FunctionName": "my-function"
                    }
                },
                "Child": nested_stack("child.nested.template.json")
            }
        })
    };
    let child = json!({
        "Resources": { "Assets": { "Type": "AWS::S3::Bucket" } },
        "Outputs": { "BucketOut": { "Value": { "Ref": "Assets" } } }
    });

    let cloudformation = FakeCloudFormation::new()
        .with_stack(
            STACK,
            root(json!("old-bucket")),
            vec![
                ResourceSummary::new("Func", "AWS::Lambda::Function", "my-function"),
                stack_summary("Child", "child-stack"),
            ],
        )
        .with_stack(
            "child-stack",
            child.clone(),
            vec![ResourceSummary::new("Assets", "AWS::S3::Bucket", "phys-bucket")],
        );
    let templates =
        StaticTemplateSource::new().with_template("child.nested.template.json", template_of(child));
    let harness = Harness::with_templates(cloudformation, templates, |lambda| lambda).await;

    let generated = root(json!({ "Fn::GetAtt": ["Child", "Outputs.BucketOut"] }));
    let result = harness
        .hotswap(generated, HotswapMode::FallBack)
        .await
        .unwrap()
        .unwrap();

    assert!(!result.no_op);
    let Call::UpdateFunctionCode(update) = &harness.log.calls()[0] else {
        panic!("expected a code update");
    };
    assert_eq!(update.function_name, "my-function");
    assert_eq!(update.s3_bucket.as_deref(), Some("phys-bucket"));
    assert_eq!(update.s3_key.as_deref(), Some("code.zip"));
}
