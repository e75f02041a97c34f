//! Reference KRM functions.
//!
//! Each constructor returns a ready [`Function`]; the `krmfn` binary exposes
//! them as subcommands.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use anyhow::Context;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use krmkit_framework::{Command, ConfigBinder, FlagSet, Output, ResultItem, ResultSet};
use krmkit_yaml::Node;
use serde::Deserialize;
use tracing::debug;

pub type Transformer<C> = fn(Vec<Node>, &C) -> anyhow::Result<Output>;
pub type Function<C> = Command<C, Transformer<C>>;

/// Parameters of `set-annotation`, bound from `functionConfig.data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetAnnotation {
    pub key: String,
    pub value: String,
}

/// Set one annotation on every item.
pub fn set_annotation() -> Function<SetAnnotation> {
    let flags = FlagSet::new()
        .string("value", "", "annotation value", |c: &mut SetAnnotation, v| c.value = v)
        .string("key", "value", "annotation key", |c: &mut SetAnnotation, v| c.key = v);
    let run: Transformer<SetAnnotation> = annotate;
    Command::new("set-annotation", ConfigBinder::flags(flags), run).about("Set an annotation on every resource")
}

fn annotate(mut items: Vec<Node>, config: &SetAnnotation) -> anyhow::Result<Output> {
    for item in &mut items {
        item.set_annotation(&config.key, &config.value)?;
    }
    Ok(items.into())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Keep an existing Service and reconcile its annotations.
    #[default]
    Update,
    /// Drop an existing Service and append a fresh one.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratorSpec {
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub policy: Policy,
}

/// Structured functionConfig of `generate-service`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceGenerator {
    pub spec: GeneratorSpec,
}

pub fn generate_service() -> Function<ServiceGenerator> {
    let run: Transformer<ServiceGenerator> = generate;
    Command::new("generate-service", ConfigBinder::schema(), run).about("Generate or reconcile a v1 Service")
}

fn is_generated(item: &Node, name: &str) -> anyhow::Result<bool> {
    let meta = item.get_meta().context("reading item identity")?;
    Ok(meta.api_version() == "v1" && meta.kind() == "Service" && meta.name() == name)
}

fn service(spec: &GeneratorSpec) -> anyhow::Result<Node> {
    let svc = Service {
        metadata: ObjectMeta { name: Some(spec.name.clone()), ..ObjectMeta::default() },
        ..Service::default()
    };
    let mut node = Node::encode(&svc)?;
    for (k, v) in &spec.annotations {
        node.set_annotation(k, v)?;
    }
    Ok(node)
}

fn generate(items: Vec<Node>, config: &ServiceGenerator) -> anyhow::Result<Output> {
    let spec = &config.spec;
    let mut out = Vec::with_capacity(items.len() + 1);
    let mut found = false;
    for mut item in items {
        if !found && is_generated(&item, &spec.name)? {
            found = true;
            match spec.policy {
                Policy::Replace => continue,
                Policy::Update => {
                    for (k, v) in &spec.annotations {
                        item.set_annotation(k, v)?;
                    }
                }
            }
        }
        out.push(item);
    }
    if !found || spec.policy == Policy::Replace {
        out.push(service(spec)?);
    }
    debug!(name = %spec.name, found, policy = ?spec.policy, "generated service");
    Ok(out.into())
}

/// Report every Deployment without `spec.replicas`.
pub fn validate_replicas() -> Function<()> {
    let run: Transformer<()> = validate;
    Command::new("validate-replicas", ConfigBinder::none(), run).about("Require spec.replicas on Deployments")
}

fn validate(items: Vec<Node>, _: &()) -> anyhow::Result<Output> {
    let mut results = ResultSet::new("replicas-validator");
    for item in &items {
        let meta = item.get_meta()?;
        if meta.kind() != "Deployment" {
            continue;
        }
        if item.lookup(&["spec", "replicas"])?.is_some() {
            continue;
        }
        results.push(
            ResultItem::error("missing replicas").with_resource(&meta).with_field("spec.replicas", Some("1")),
        );
    }
    results.sort();
    Ok(Output::with_results(items, results))
}
