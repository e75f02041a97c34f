use krmkit_framework::{Command, ConfigBinder, Error, FlagSet, Limits, Node, Output, ResultItem, ResultSet, Status};

fn run<C, T: krmkit_framework::Transform<C>>(cmd: &mut Command<C, T>, input: &str) -> (Result<Status, Error>, String) {
    let mut out = Vec::new();
    let res = cmd.run(input.as_bytes(), &mut out);
    (res, String::from_utf8(out).unwrap())
}

fn passthrough() -> Command<(), impl krmkit_framework::Transform<()>> {
    Command::new("noop", ConfigBinder::none(), |items: Vec<Node>, _: &()| -> anyhow::Result<Output> { Ok(items.into()) })
}

#[test]
fn identity_transform_keeps_unknown_fields_and_results() {
    let input = "apiVersion: config.kubernetes.io/v1alpha1\nkind: ResourceList\nitems:\n- apiVersion: v1\n  kind: ConfigMap\n  metadata:\n    name: a\n  data:\n    port: \"8080\"\nresults:\n- name: upstream\n  items:\n  - message: old\n    severity: error\nx-extension:\n  keep: me\n";
    let (res, out) = run(&mut passthrough(), input);
    // upstream errors never fail this invocation
    assert_eq!(res.unwrap(), Status::Success);
    assert_eq!(out, input);
}

#[test]
fn results_are_appended_after_upstream() {
    let mut cmd = Command::new("second", ConfigBinder::none(), |items: Vec<Node>, _: &()| -> anyhow::Result<Output> {
        let mut set = ResultSet::new("second");
        set.push(ResultItem::warning("heads up"));
        Ok(Output::with_results(items, set))
    });
    let input = "kind: ResourceList\nitems: []\nresults:\n- name: first\n  items:\n  - message: fyi\n    severity: info\n";
    let (res, out) = run(&mut cmd, input);
    assert_eq!(res.unwrap(), Status::Success);
    assert_eq!(
        out,
        "apiVersion: config.kubernetes.io/v1alpha1\nkind: ResourceList\nitems: []\nresults:\n- name: first\n  items:\n  - message: fyi\n    severity: info\n- name: second\n  items:\n  - message: heads up\n    severity: warning\n"
    );
}

#[test]
fn hard_error_wins_over_partial_work() {
    let mut cmd = Command::new("broken", ConfigBinder::none(), |mut items: Vec<Node>, _: &()| -> anyhow::Result<Output> {
        for item in &mut items {
            item.set_annotation("touched", "yes")?;
        }
        anyhow::bail!("cannot continue after {} items", items.len())
    });
    let (res, out) = run(&mut cmd, "kind: ResourceList\nitems:\n- kind: A\n");
    let err = res.unwrap_err();
    assert!(matches!(err, Error::Invocation(_)));
    assert_eq!(err.to_string(), "function failed: cannot continue after 1 items");
    assert!(out.is_empty());
}

#[test]
fn type_errors_from_primitives_are_fatal() {
    let mut cmd = Command::new("typed", ConfigBinder::none(), |mut items: Vec<Node>, _: &()| -> anyhow::Result<Output> {
        for item in &mut items {
            item.set_string(&["spec", "replicas", "x"], "1")?;
        }
        Ok(items.into())
    });
    let (res, out) = run(&mut cmd, "kind: ResourceList\nitems:\n- spec:\n    replicas: 2\n");
    assert!(matches!(res, Err(Error::Invocation(_))));
    assert!(out.is_empty());
}

#[test]
fn config_errors_are_fatal() {
    let flags = FlagSet::new().int("count", 1, "how many", |c: &mut i64, v| *c = v);
    let mut cmd = Command::new("counted", ConfigBinder::flags(flags), |items: Vec<Node>, _: &i64| -> anyhow::Result<Output> {
        Ok(items.into())
    });
    let (res, out) = run(&mut cmd, "kind: ResourceList\nitems: []\nfunctionConfig:\n  data:\n    count: many\n");
    assert!(matches!(res, Err(Error::Config(_))));
    assert!(out.is_empty());
}

#[test]
fn malformed_envelopes_are_fatal() {
    for input in ["", "kind: ConfigMap\n", "kind: ResourceList\nitems: nope\n", "[unclosed\n"] {
        let (res, out) = run(&mut passthrough(), input);
        assert!(matches!(res, Err(Error::Format(_))), "{input:?}");
        assert!(out.is_empty());
    }
}

#[test]
fn oversized_input_is_rejected() {
    let mut cmd = passthrough().limits(Limits { max_input_bytes: 16, max_nodes: 1000 });
    let (res, out) = run(&mut cmd, "kind: ResourceList\nitems: []\n");
    assert!(matches!(res, Err(Error::Format(ref m)) if m.contains("too large")));
    assert!(out.is_empty());
}

#[test]
fn transform_may_drop_reorder_and_add() {
    let mut cmd = Command::new("shuffle", ConfigBinder::none(), |items: Vec<Node>, _: &()| -> anyhow::Result<Output> {
        let mut out: Vec<Node> = items.into_iter().rev().skip(1).collect();
        out.push(Node::parse("kind: New\n")?);
        Ok(out.into())
    });
    let (res, out) = run(&mut cmd, "kind: ResourceList\nitems:\n- kind: A\n- kind: B\n- kind: C\n");
    assert_eq!(res.unwrap(), Status::Success);
    assert_eq!(
        out,
        "apiVersion: config.kubernetes.io/v1alpha1\nkind: ResourceList\nitems:\n- kind: B\n- kind: A\n- kind: New\n"
    );
}

#[test]
fn passthrough_keeps_source_formatting() {
    let input = r#"apiVersion: config.kubernetes.io/v1alpha1
kind: ResourceList
items:
- apiVersion: v1
  kind: ConfigMap
  metadata:
    name: 'cfg'
    labels: {app: web}
  data:
    q: "x"
    hex: 0x50
    exp: 1e3
    empty:
    yes: on
    t: True
    list:
      - a
      - "b"
functionConfig:
  data:
    value: ~
"#;
    let (res, out) = run(&mut passthrough(), input);
    assert_eq!(res.unwrap(), Status::Success);
    assert_eq!(out, input);
}

#[test]
fn null_function_config_is_echoed() {
    let input = "apiVersion: config.kubernetes.io/v1alpha1\nkind: ResourceList\nitems:\n- kind: A\nfunctionConfig: null\n";
    let (res, out) = run(&mut passthrough(), input);
    assert_eq!(res.unwrap(), Status::Success);
    assert_eq!(out, input);
}
