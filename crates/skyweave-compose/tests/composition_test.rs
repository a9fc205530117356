//! End-to-end composition tests.
//!
//! These tests drive the full pass across crates:
//! 1. Declare stacks, constructs, and resources
//! 2. Wire outputs between stacks
//! 3. Assemble the composition graph and detect cycles
//! 4. Produce the deployment plan and synthesize templates

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use skyweave_common::error::SkyweaveError;
use skyweave_compose::graph::CompositionGraph;
use skyweave_compose::plan::{DeploymentPlan, plan};
use skyweave_compose::synth::{Synthesizer, TemplateSynthesizer};
use skyweave_core::construct::{App, NodeId};
use skyweave_core::descriptor::ResourceId;
use skyweave_core::provider::{ProviderRegistry, catalog};
use skyweave_core::security::{SecurityAssociation, SecurityAssociationProps};
use skyweave_core::stack::Stack;
use skyweave_core::value::{Config, Reference, Value};

// ── Fixtures ─────────────────────────────────────────────────────────

fn table_config() -> Config {
    Config::new()
        .with("billing_mode", "PAY_PER_REQUEST")
        .with("partition_key", Value::map([("name", "Id"), ("type", "S")]))
}

fn rest_api(app: &mut App, owner: NodeId, name: &str) -> ResourceId {
    app.declare_resource(
        owner,
        catalog::REST_API.kind,
        name,
        Config::new().with("name", "Videos API Service"),
    )
    .expect("rest api")
}

fn stage(app: &mut App, owner: NodeId, api: ResourceId) -> ResourceId {
    let api_id = app.reference(api, "rest_api_id").expect("ref");
    app.declare_resource(
        owner,
        catalog::STAGE.kind,
        "Stage",
        Config::new()
            .with("rest_api_id", api_id)
            .with("stage_name", "prod"),
    )
    .expect("stage")
}

fn handler_config(table_name: Reference) -> Config {
    Config::new()
        .with("runtime", "nodejs14.x")
        .with("handler", "index.handler")
        .with("code", "resources/videos.ts")
        .with("role", "arn:aws:iam::123456789012:role/LabRole")
        .with("environment", Value::map([("VIDEOS_TABLE_NAME", table_name)]))
}

/// `Persistent` exposes `tableName`; `Api` consumes it and protects its stage.
fn video_service(with_handler: bool) -> App {
    let mut app = App::new(ProviderRegistry::builtin(true));

    let persistent = Stack::new(&mut app, "Persistent").expect("persistent");
    let table = app
        .declare_resource(persistent.node(), catalog::TABLE.kind, "VideoTable", table_config())
        .expect("table");
    let table_name = persistent
        .expose_output(&mut app, "tableName", table, "table_name")
        .expect("expose");
    persistent.complete(&mut app).expect("complete");

    let api = Stack::new(&mut app, "Api").expect("api");
    let rest = rest_api(&mut app, api.node(), "videos-api");
    let stage = stage(&mut app, api.node(), rest);
    if with_handler {
        let table_name = app.consume(&table_name).expect("consume");
        let _ = app
            .declare_resource(
                api.node(),
                catalog::FUNCTION.kind,
                "VideoHandler",
                handler_config(table_name),
            )
            .expect("handler");
    } else {
        // Consume without a handler: the stack still depends on the export.
        let table_name = app.consume(&table_name).expect("consume");
        let api_id = app.reference(rest, "rest_api_id").expect("ref");
        let _ = app
            .declare_resource(
                api.node(),
                catalog::STAGE.kind,
                "Canary",
                Config::new()
                    .with("rest_api_id", api_id)
                    .with("stage_name", "canary")
                    .with("description", table_name),
            )
            .expect("canary");
    }
    let _ = SecurityAssociation::new(
        &mut app,
        api.node(),
        "Firewall",
        SecurityAssociationProps::new(stage, Vec::new()),
    )
    .expect("firewall");
    api.complete(&mut app).expect("complete");
    app
}

fn assert_linearization(app: &App) {
    let graph = CompositionGraph::build(app);
    let order = graph.topological_order().expect("order");
    assert_eq!(order.len(), app.resources().len());
    let position = |r: ResourceId| order.iter().position(|&x| x == r).expect("present");
    for edge in graph.ordering_edges() {
        assert!(
            position(edge.producer) < position(edge.consumer),
            "{} must precede {}",
            app.descriptor(edge.producer).address(),
            app.descriptor(edge.consumer).address()
        );
    }
}

// ── Ordering ─────────────────────────────────────────────────────────

#[test]
fn scenario_orders_table_api_stage_policy_association() {
    let plan = plan(video_service(false)).expect("plan");
    let order = plan.addresses();
    assert_eq!(
        order,
        vec![
            "Persistent/VideoTable",
            "Api/videos-api",
            "Api/Stage",
            "Api/Canary",
            "Api/Firewall/WebAcl",
            "Api/Firewall/Association",
        ]
    );
    assert_eq!(order.last(), Some(&"Api/Firewall/Association"));
}

#[test]
fn scenario_with_handler_keeps_association_last() {
    let plan = plan(video_service(true)).expect("plan");
    let order = plan.addresses();
    let pos = |a: &str| order.iter().position(|x| *x == a).expect("present");
    assert!(pos("Persistent/VideoTable") < pos("Api/VideoHandler"));
    assert!(pos("Api/videos-api") < pos("Api/Stage"));
    assert!(pos("Api/Stage") < pos("Api/Firewall/WebAcl"));
    assert!(pos("Api/Firewall/WebAcl") < pos("Api/Firewall/Association"));
    assert_eq!(order.last(), Some(&"Api/Firewall/Association"));
}

#[test]
fn topological_order_is_valid_linearization() {
    assert_linearization(&video_service(true));
    assert_linearization(&video_service(false));

    let mut app = App::new(ProviderRegistry::builtin(true));
    let stack = Stack::new(&mut app, "Deep").expect("stack");
    let mut owner = stack.node();
    let mut previous: Option<ResourceId> = None;
    for depth in 0..5 {
        owner = app.add_child(owner, &format!("Level{depth}")).expect("child");
        let api = rest_api(&mut app, owner, "Api");
        let stage = stage(&mut app, owner, api);
        if let Some(prev) = previous {
            app.add_dependency(owner, prev).expect("dep");
        }
        previous = Some(stage);
    }
    assert_linearization(&app);
}

#[test]
fn association_never_precedes_target_for_any_tree_shape() {
    // Target nested at varying depths, association attached at varying scopes.
    for target_depth in 0..3 {
        for scope_depth in 0..3 {
            let mut app = App::new(ProviderRegistry::builtin(true));
            let stack = Stack::new(&mut app, "Api").expect("stack");

            let mut target_owner = stack.node();
            for d in 0..target_depth {
                target_owner = app.add_child(target_owner, &format!("T{d}")).expect("t");
            }
            let api = rest_api(&mut app, target_owner, "RestApi");
            let stage = stage(&mut app, target_owner, api);

            let mut scope = stack.node();
            for d in 0..scope_depth {
                scope = app.add_child(scope, &format!("S{d}")).expect("s");
            }
            let waf = SecurityAssociation::new(
                &mut app,
                scope,
                "Firewall",
                SecurityAssociationProps::new(stage, Vec::new()),
            )
            .expect("association");

            let graph = CompositionGraph::build(&app);
            let order = graph.topological_order().expect("order");
            let pos = |r: ResourceId| order.iter().position(|&x| x == r).expect("present");
            assert!(pos(stage) < pos(waf.association()));
            assert!(pos(stage) < pos(waf.policy_set()));
        }
    }
}

// ── Determinism ──────────────────────────────────────────────────────

#[test]
fn identical_input_yields_byte_identical_output() {
    let first: DeploymentPlan = plan(video_service(true)).expect("first");
    let second: DeploymentPlan = plan(video_service(true)).expect("second");
    assert_eq!(first.to_json().expect("json"), second.to_json().expect("json"));
    assert_eq!(first.digest, second.digest);

    let synth = TemplateSynthesizer::new();
    let a = synth.synthesize(&first).expect("synth");
    let b = synth.synthesize(&second).expect("synth");
    assert_eq!(a, b);
}

#[test]
fn different_input_changes_digest() {
    let with = plan(video_service(true)).expect("with");
    let without = plan(video_service(false)).expect("without");
    assert_ne!(with.digest, without.digest);
}

// ── Failures ─────────────────────────────────────────────────────────

#[test]
fn mutual_dependency_fails_with_cycle_path() {
    let mut app = App::new(ProviderRegistry::builtin(true));
    let stack = Stack::new(&mut app, "Api").expect("stack");
    let a = app.add_child(stack.node(), "A").expect("a");
    let b = app.add_child(stack.node(), "B").expect("b");
    let api = rest_api(&mut app, a, "RestApi");
    let _ = stage(&mut app, b, api);
    // B's stage reads A's API output; A now also waits for B.
    app.add_dependency(a, b).expect("dep");

    let err = plan(app).unwrap_err();
    match err {
        SkyweaveError::CyclicDependency { path } => {
            assert_eq!(path, vec!["Api/A/RestApi", "Api/B/Stage", "Api/A/RestApi"]);
        }
        other => panic!("expected cyclic dependency, got {other}"),
    }
}

#[test]
fn duplicate_logical_id_fails_before_ordering() {
    let mut app = App::new(ProviderRegistry::builtin(true));
    let stack = Stack::new(&mut app, "Persistent").expect("stack");
    let _ = app
        .declare_resource(stack.node(), catalog::TABLE.kind, "X", table_config())
        .expect("first");
    let err = app
        .declare_resource(stack.node(), catalog::TABLE.kind, "X", table_config())
        .unwrap_err();
    assert!(matches!(err, SkyweaveError::DuplicateId { .. }));
    assert!(err.to_string().contains("X"));
}

#[test]
fn duplicate_logical_id_under_different_owners_plans() {
    let mut app = App::new(ProviderRegistry::builtin(true));
    let stack = Stack::new(&mut app, "Persistent").expect("stack");
    let archive = app.add_child(stack.node(), "Archive").expect("archive");
    let _ = app
        .declare_resource(stack.node(), catalog::TABLE.kind, "X", table_config())
        .expect("first");
    let _ = app
        .declare_resource(archive, catalog::TABLE.kind, "X", table_config())
        .expect("second");
    let plan = plan(app).expect("plan");
    assert_eq!(plan.addresses(), vec!["Persistent/X", "Persistent/Archive/X"]);
    assert_ne!(plan.resources[0].template_id, plan.resources[1].template_id);
}

// ── Synthesis ────────────────────────────────────────────────────────

#[test]
fn synthesized_api_template_imports_table_name() {
    let plan = plan(video_service(true)).expect("plan");
    let assembly = TemplateSynthesizer::new().synthesize(&plan).expect("synth");

    let persistent = assembly.stack("Persistent").expect("persistent");
    assert_eq!(persistent.template.outputs["tableName"].export.name, "Persistent:tableName");

    let api = assembly.stack("Api").expect("api");
    assert_eq!(api.depends_on, vec!["Persistent"]);
    let handler = plan.resource("Api/VideoHandler").expect("handler");
    let rendered = &api.template.resources[&handler.template_id];
    assert_eq!(
        rendered.properties["Environment"]["VIDEOS_TABLE_NAME"],
        serde_json::json!({ "Fn::ImportValue": "Persistent:tableName" })
    );
    assert!(rendered.depends_on.is_empty());
}

#[test]
fn synthesized_templates_are_written_to_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let plan = plan(video_service(true)).expect("plan");
    let assembly = TemplateSynthesizer::new().synthesize(&plan).expect("synth");
    let written = assembly
        .write_to(dir.path(), skyweave_common::config::OutputFormat::Json)
        .expect("write");
    assert_eq!(written.len(), 3);

    let api: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("Api.template.json")).expect("read"),
    )
    .expect("json");
    assert_eq!(api["Resources"].as_object().expect("resources").len(), 5);
}
