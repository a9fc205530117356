//! Built-in resource kinds.
//!
//! Field names are `snake_case`; synthesizers translate them to the
//! provider's own casing.

use super::{FieldSpec, ResourceSchema, ValueType};

/// `DynamoDB` table.
pub const TABLE: ResourceSchema = ResourceSchema {
    kind: "AWS::DynamoDB::Table",
    fields: &[
        FieldSpec::required("partition_key", ValueType::Map),
        FieldSpec::optional("sort_key", ValueType::Map),
        FieldSpec::optional("billing_mode", ValueType::String),
        FieldSpec::optional("table_name", ValueType::String),
    ],
    outputs: &["table_name", "arn", "stream_arn"],
    primary_output: Some("table_name"),
    identity: Some("arn"),
};

/// Virtual private network.
pub const VPC: ResourceSchema = ResourceSchema {
    kind: "AWS::EC2::VPC",
    fields: &[
        FieldSpec::required("cidr_block", ValueType::String),
        FieldSpec::optional("max_azs", ValueType::Integer),
        FieldSpec::optional("enable_dns_support", ValueType::Bool),
    ],
    outputs: &["vpc_id", "cidr_block", "default_security_group"],
    primary_output: Some("vpc_id"),
    identity: None,
};

/// Compute handler. Packaging happens outside the core; `code` names the entry.
pub const FUNCTION: ResourceSchema = ResourceSchema {
    kind: "AWS::Lambda::Function",
    fields: &[
        FieldSpec::required("runtime", ValueType::String),
        FieldSpec::required("handler", ValueType::String),
        FieldSpec::required("code", ValueType::String),
        FieldSpec::required("role", ValueType::Token),
        FieldSpec::optional("environment", ValueType::Map),
        FieldSpec::optional("vpc_config", ValueType::Map),
        FieldSpec::optional("timeout", ValueType::Integer),
        FieldSpec::optional("memory_size", ValueType::Integer),
    ],
    outputs: &["function_name", "arn"],
    primary_output: Some("function_name"),
    identity: Some("arn"),
};

/// REST API. Not associable by itself: only a deployed stage has an address.
pub const REST_API: ResourceSchema = ResourceSchema {
    kind: "AWS::ApiGateway::RestApi",
    fields: &[
        FieldSpec::required("name", ValueType::String),
        FieldSpec::optional("description", ValueType::String),
        FieldSpec::optional("cloud_watch_role", ValueType::Bool),
    ],
    outputs: &["rest_api_id", "root_resource_id"],
    primary_output: Some("rest_api_id"),
    identity: None,
};

/// Deployment stage of a REST API.
pub const STAGE: ResourceSchema = ResourceSchema {
    kind: "AWS::ApiGateway::Stage",
    fields: &[
        FieldSpec::required("rest_api_id", ValueType::String),
        FieldSpec::required("stage_name", ValueType::String),
        FieldSpec::optional("description", ValueType::String),
        FieldSpec::optional("tracing_enabled", ValueType::Bool),
        FieldSpec::optional("variables", ValueType::Map),
    ],
    outputs: &["stage_name", "stage_arn"],
    primary_output: Some("stage_name"),
    identity: Some("stage_arn"),
};

/// Web firewall policy set.
pub const WEB_ACL: ResourceSchema = ResourceSchema {
    kind: "AWS::WAFv2::WebACL",
    fields: &[
        FieldSpec::required("scope", ValueType::String),
        FieldSpec::required("default_action", ValueType::Map),
        FieldSpec::required("visibility_config", ValueType::Map),
        FieldSpec::required("rules", ValueType::List),
        FieldSpec::optional("description", ValueType::String),
    ],
    outputs: &["arn", "id"],
    primary_output: None,
    identity: Some("arn"),
};

/// Binds a web firewall policy set to a protected resource.
pub const WEB_ACL_ASSOCIATION: ResourceSchema = ResourceSchema {
    kind: "AWS::WAFv2::WebACLAssociation",
    fields: &[
        FieldSpec::required("resource_arn", ValueType::String),
        FieldSpec::required("web_acl_arn", ValueType::String),
    ],
    outputs: &[],
    primary_output: None,
    identity: None,
};

/// Every built-in kind.
pub const ALL: &[ResourceSchema] = &[
    TABLE,
    VPC,
    FUNCTION,
    REST_API,
    STAGE,
    WEB_ACL,
    WEB_ACL_ASSOCIATION,
];
