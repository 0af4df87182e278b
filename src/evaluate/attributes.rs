//! `Fn::GetAtt` knowledge base.
//!
//! Attributes are derived from the physical ID of the deployed resource, so only
//! attributes that can be computed without calling the owning service are listed.

use crate::error::EvaluationError;

/// Inputs for formatting one attribute.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArnParts<'a> {
    pub partition: &'a str,
    pub region: &'a str,
    pub account: &'a str,
    pub resource_type: &'a str,
    pub physical_id: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeFormat {
    /// `arn:<partition>:<service>:<region>:<account>:<type>:<name>`
    ColonArn,
    /// `arn:<partition>:<service>:<region>:<account>:<type>/<name>`
    SlashArn,
    /// `arn:<partition>:iam::<account>:<type>/<name>`
    IamArn,
    /// `arn:<partition>:s3:::<name>`
    S3Arn,
    /// The physical ID itself.
    PhysicalId,
    /// The n-th `/`-separated segment of an ARN shaped physical ID.
    ArnSegment(usize),
}

/// Format the attribute `attribute` of a deployed resource.
///
/// # Errors
///
/// Fails with [`EvaluationError::UnsupportedResourceType`] when the type has no
/// known attributes, and [`EvaluationError::UnsupportedAttribute`] when the type
/// is known but the attribute is not.
pub(crate) fn format_attribute(
    attribute: &str,
    parts: &ArnParts<'_>,
) -> Result<String, EvaluationError> {
    let format = lookup(parts.resource_type, attribute)?;
    let service = service_of(parts.resource_type);
    let type_part = arn_type_part(parts.resource_type);

    Ok(match format {
        AttributeFormat::ColonArn => format!(
            "arn:{}:{}:{}:{}:{}:{}",
            parts.partition, service, parts.region, parts.account, type_part, parts.physical_id
        ),
        AttributeFormat::SlashArn => format!(
            "arn:{}:{}:{}:{}:{}/{}",
            parts.partition, service, parts.region, parts.account, type_part, parts.physical_id
        ),
        AttributeFormat::IamArn => format!(
            "arn:{}:iam::{}:{}/{}",
            parts.partition, parts.account, type_part, parts.physical_id
        ),
        AttributeFormat::S3Arn => format!("arn:{}:s3:::{}", parts.partition, parts.physical_id),
        AttributeFormat::PhysicalId => parts.physical_id.to_string(),
        AttributeFormat::ArnSegment(index) => parts
            .physical_id
            .split('/')
            .nth(index)
            .unwrap_or_default()
            .to_string(),
    })
}

fn lookup(resource_type: &str, attribute: &str) -> Result<AttributeFormat, EvaluationError> {
    let format = match resource_type {
        "AWS::IAM::Role" | "AWS::IAM::User" | "AWS::IAM::Group" => match attribute {
            "Arn" => Some(AttributeFormat::IamArn),
            _ => None,
        },
        "AWS::S3::Bucket" => match attribute {
            "Arn" => Some(AttributeFormat::S3Arn),
            _ => None,
        },
        "AWS::Lambda::Function" => match attribute {
            "Arn" => Some(AttributeFormat::ColonArn),
            _ => None,
        },
        "AWS::Events::EventBus" => match attribute {
            "Arn" => Some(AttributeFormat::SlashArn),
            // the name of an event bus is also its Ref value
            "Name" => Some(AttributeFormat::PhysicalId),
            _ => None,
        },
        "AWS::DynamoDB::Table" | "AWS::KMS::Key" => match attribute {
            "Arn" => Some(AttributeFormat::SlashArn),
            _ => None,
        },
        // arn:<p>:appsync:<r>:<a>:apis/<apiId>
        "AWS::AppSync::GraphQLApi" => match attribute {
            "ApiId" => Some(AttributeFormat::ArnSegment(1)),
            _ => None,
        },
        // arn:<p>:appsync:<r>:<a>:apis/<apiId>/functions/<functionId>
        "AWS::AppSync::FunctionConfiguration" => match attribute {
            "FunctionId" => Some(AttributeFormat::ArnSegment(3)),
            _ => None,
        },
        // arn:<p>:appsync:<r>:<a>:apis/<apiId>/datasources/<name>
        "AWS::AppSync::DataSource" => match attribute {
            "Name" => Some(AttributeFormat::ArnSegment(3)),
            _ => None,
        },
        _ => {
            return Err(EvaluationError::UnsupportedResourceType {
                resource_type: resource_type.to_string(),
            });
        }
    };

    format.ok_or_else(|| EvaluationError::UnsupportedAttribute {
        attribute: attribute.to_string(),
        resource_type: resource_type.to_string(),
    })
}

/// `AWS::DynamoDB::Table` -> `dynamodb`
fn service_of(resource_type: &str) -> String {
    resource_type
        .split("::")
        .nth(1)
        .unwrap_or_default()
        .to_lowercase()
}

/// `AWS::DynamoDB::Table` -> `table`, with per-type exceptions.
fn arn_type_part(resource_type: &str) -> String {
    match resource_type {
        "AWS::Events::EventBus" => "event-bus".to_string(),
        _ => resource_type
            .split("::")
            .nth(2)
            .unwrap_or_default()
            .to_lowercase(),
    }
}
