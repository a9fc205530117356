//! Security-association construct.
//!
//! Binds a web firewall policy set to an existing resource. The construct
//! depends explicitly on the protected resource, so neither the policy set
//! nor the association is ever realized before the target exists.

use skyweave_common::error::{Result, SkyweaveError};

use crate::construct::{App, NodeId};
use crate::descriptor::ResourceId;
use crate::provider::catalog::{WEB_ACL, WEB_ACL_ASSOCIATION};
use crate::value::{Config, Value};

/// Logical id of the policy-set resource inside the construct.
pub const POLICY_SET_ID: &str = "WebAcl";
/// Logical id of the association resource inside the construct.
pub const ASSOCIATION_ID: &str = "Association";

/// Input of [`SecurityAssociation::new`].
#[derive(Debug, Clone)]
pub struct SecurityAssociationProps {
    /// Resource to protect; must have an addressable identity.
    pub target: ResourceId,
    /// Rule statements, passed through to the policy set.
    pub rules: Vec<Value>,
    /// Policy scope, e.g. `REGIONAL`.
    pub scope: String,
    /// Metric name for request sampling.
    pub metric_name: String,
}

impl SecurityAssociationProps {
    /// Regional scope with the `firewall` metric.
    #[must_use]
    pub fn new(target: ResourceId, rules: Vec<Value>) -> Self {
        Self {
            target,
            rules,
            scope: "REGIONAL".into(),
            metric_name: "firewall".into(),
        }
    }
}

/// A policy set plus its association with one protected resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityAssociation {
    node: NodeId,
    policy_set: ResourceId,
    association: ResourceId,
}

impl SecurityAssociation {
    /// Creates the construct `name` under `scope`.
    ///
    /// Every check runs before the first node or resource is created, so a
    /// rejected association leaves the tree untouched. Any failure abandons
    /// the app.
    ///
    /// # Errors
    ///
    /// - [`SkyweaveError::UnboundTarget`] if the target's kind has no identity
    ///   attribute (for example an API with no deployed stage).
    /// - [`SkyweaveError::UnexposedReference`] if the target lives in another
    ///   stack than `scope`.
    /// - [`SkyweaveError::DuplicateName`] if `scope` already has a child `name`.
    /// - [`SkyweaveError::Schema`] if the policy set is malformed.
    pub fn new(
        app: &mut App,
        scope: NodeId,
        name: &str,
        props: SecurityAssociationProps,
    ) -> Result<Self> {
        let result = Self::bind(app, scope, name, props);
        app.track(result)
    }

    fn bind(
        app: &mut App,
        scope: NodeId,
        name: &str,
        props: SecurityAssociationProps,
    ) -> Result<Self> {
        let path = app.node(scope).path().child(name);
        let target = app.descriptor(props.target);
        let identity = app
            .registry()
            .get(target.kind())?
            .identity_attribute()
            .map(str::to_string);
        let Some(identity) = identity else {
            return Err(SkyweaveError::UnboundTarget {
                association: path,
                target: target.address(),
                kind: target.kind().to_string(),
            });
        };
        if target.stack() != path.stack() {
            return Err(SkyweaveError::UnexposedReference {
                consumer: path.child(ASSOCIATION_ID).to_string(),
                producer: target.address(),
                stack: target.stack().to_string(),
            });
        }
        app.ensure_open(scope)?;
        if app
            .node(scope)
            .children()
            .iter()
            .any(|&c| app.node(c).name() == name)
        {
            return Err(SkyweaveError::DuplicateName {
                parent: app.node(scope).path().to_string(),
                name: name.to_string(),
            });
        }

        let policy_config = Config::new()
            .with("description", format!("ACL for {}", target.address()))
            .with("scope", props.scope)
            .with("default_action", Value::map([("allow", Value::map::<&str, Value>([]))]))
            .with(
                "visibility_config",
                Value::map([
                    ("sampled_requests_enabled", Value::from(true)),
                    ("cloud_watch_metrics_enabled", Value::from(true)),
                    ("metric_name", Value::from(props.metric_name)),
                ]),
            )
            .with("rules", props.rules);
        app.registry().validate(
            WEB_ACL.kind,
            &path.child(POLICY_SET_ID).to_string(),
            &policy_config,
        )?;
        let target_identity = app.reference(props.target, &identity)?;

        let node = app.add_child(scope, name)?;
        app.add_dependency(node, props.target)?;
        let policy_set = app.declare_resource(node, WEB_ACL.kind, POLICY_SET_ID, policy_config)?;
        let policy_arn = app.reference(policy_set, "arn")?;
        let association = app.declare_resource(
            node,
            WEB_ACL_ASSOCIATION.kind,
            ASSOCIATION_ID,
            Config::new()
                .with("resource_arn", target_identity)
                .with("web_acl_arn", policy_arn),
        )?;
        tracing::info!(%path, "security association bound");

        Ok(Self {
            node,
            policy_set,
            association,
        })
    }

    /// Construct node holding both resources.
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// The policy-set resource.
    #[must_use]
    pub const fn policy_set(&self) -> ResourceId {
        self.policy_set
    }

    /// The association resource.
    #[must_use]
    pub const fn association(&self) -> ResourceId {
        self.association
    }
}
