//! The single call into user code.

use std::time::Instant;

use krmkit_yaml::Node;
use metrics::histogram;
use tracing::debug;

use crate::{Error, Result, ResultSet};

/// What a transform hands back: the new item collection and, optionally,
/// its diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    pub items: Vec<Node>,
    pub results: Option<ResultSet>,
}

impl Output {
    pub fn new(items: Vec<Node>) -> Self {
        Self { items, results: None }
    }

    pub fn with_results(items: Vec<Node>, results: ResultSet) -> Self {
        Self { items, results: Some(results) }
    }
}

impl From<Vec<Node>> for Output {
    fn from(items: Vec<Node>) -> Self {
        Output::new(items)
    }
}

/// User transformation logic.
///
/// Returning `Err` is a hard failure: nothing is written, whatever items or
/// results were built before the error are discarded.
pub trait Transform<C> {
    fn transform(&mut self, items: Vec<Node>, config: &C) -> anyhow::Result<Output>;
}

impl<C, F> Transform<C> for F
where
    F: FnMut(Vec<Node>, &C) -> anyhow::Result<Output>,
{
    fn transform(&mut self, items: Vec<Node>, config: &C) -> anyhow::Result<Output> {
        self(items, config)
    }
}

/// Call `transform` once. No retries, no rollback.
pub fn invoke<C, T: Transform<C> + ?Sized>(transform: &mut T, items: Vec<Node>, config: &C) -> Result<Output> {
    let t0 = Instant::now();
    let input = items.len();
    let res = transform.transform(items, config);
    histogram!("krmfn_transform_ms", t0.elapsed().as_secs_f64() * 1000.0);
    let out = res.map_err(Error::Invocation)?;
    debug!(input, output = out.items.len(), results = out.results.as_ref().map_or(0, |r| r.items.len()), "transform returned");
    Ok(out)
}
