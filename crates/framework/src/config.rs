//! functionConfig binding.
//!
//! A function declares its parameters once, either as a table of named
//! flags (values read from `functionConfig.data`) or as a typed schema (the
//! whole functionConfig deserialized with serde). Exactly one applies.

use clap::{Arg, ArgMatches};
use krmkit_yaml::Node;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{Error, Result};

type Setter<C> = Box<dyn Fn(&mut C, &str) -> anyhow::Result<()>>;

/// One declared flag: name, default, help text and how to store a value.
pub struct Flag<C> {
    pub name: &'static str,
    pub default: String,
    pub help: &'static str,
    set: Setter<C>,
}

impl<C> std::fmt::Debug for Flag<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flag").field("name", &self.name).field("default", &self.default).finish()
    }
}

/// Flags declared by a function, in declaration order.
#[derive(Debug)]
pub struct FlagSet<C> {
    flags: Vec<Flag<C>>,
}

impl<C> Default for FlagSet<C> {
    fn default() -> Self {
        Self { flags: Vec::new() }
    }
}

impl<C> FlagSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a flag with a raw setter. The setter also receives the default.
    pub fn flag(
        mut self,
        name: &'static str,
        default: impl Into<String>,
        help: &'static str,
        set: impl Fn(&mut C, &str) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.flags.push(Flag { name, default: default.into(), help, set: Box::new(set) });
        self
    }

    pub fn string(
        self,
        name: &'static str,
        default: &str,
        help: &'static str,
        set: impl Fn(&mut C, String) + 'static,
    ) -> Self {
        self.flag(name, default, help, move |c, v| {
            set(c, v.to_string());
            Ok(())
        })
    }

    pub fn bool(self, name: &'static str, default: bool, help: &'static str, set: impl Fn(&mut C, bool) + 'static) -> Self {
        self.flag(name, default.to_string(), help, move |c, v| {
            let b = v.parse::<bool>().map_err(|_| anyhow::anyhow!("expected true or false, got {v:?}"))?;
            set(c, b);
            Ok(())
        })
    }

    pub fn int(self, name: &'static str, default: i64, help: &'static str, set: impl Fn(&mut C, i64) + 'static) -> Self {
        self.flag(name, default.to_string(), help, move |c, v| {
            let i = v.parse::<i64>().map_err(|_| anyhow::anyhow!("expected an integer, got {v:?}"))?;
            set(c, i);
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag<C>> {
        self.flags.iter()
    }
}

enum Strategy<C> {
    Flags(FlagSet<C>, fn() -> C),
    Schema(fn(&Node) -> Result<C>),
}

/// Projects functionConfig onto a function's declared parameters.
pub struct ConfigBinder<C> {
    strategy: Strategy<C>,
}

fn decode_schema<C: DeserializeOwned>(node: &Node) -> Result<C> {
    node.decode::<C>().map_err(|e| Error::Config(e.to_string()))
}

impl<C: Default> ConfigBinder<C> {
    /// Unstructured binding: `functionConfig.data` keys set declared flags.
    pub fn flags(set: FlagSet<C>) -> Self {
        Self { strategy: Strategy::Flags(set, C::default) }
    }
}

impl ConfigBinder<()> {
    /// No parameters at all.
    pub fn none() -> Self {
        Self { strategy: Strategy::Flags(FlagSet::new(), <()>::default) }
    }
}

impl<C: DeserializeOwned> ConfigBinder<C> {
    /// Structured binding: the whole functionConfig is decoded into `C`.
    /// Unknown fields are ignored unless `C` denies them.
    pub fn schema() -> Self {
        Self { strategy: Strategy::Schema(decode_schema::<C>) }
    }
}

impl<C> ConfigBinder<C> {
    pub fn is_structured(&self) -> bool {
        matches!(self.strategy, Strategy::Schema(_))
    }

    /// Command-line options for declared flags. Structured functions expose none.
    pub fn args(&self) -> Vec<Arg> {
        match &self.strategy {
            Strategy::Flags(set, _) => set
                .iter()
                .map(|f| {
                    Arg::new(f.name)
                        .long(f.name)
                        .help(f.help)
                        .num_args(1)
                        .value_name("VALUE")
                })
                .collect(),
            Strategy::Schema(_) => Vec::new(),
        }
    }

    /// Bind `function_config`. For flags the value is taken from
    /// `functionConfig.data`, then the command line, then the declared default.
    pub fn bind(&self, function_config: Option<&Node>, cli: Option<&ArgMatches>) -> Result<C> {
        // `functionConfig: null` binds like an absent config
        let function_config = function_config.filter(|n| !n.is_null());
        match &self.strategy {
            Strategy::Schema(decode) => bind_schema(*decode, function_config),
            Strategy::Flags(set, init) => bind_flags(set, *init, function_config, cli),
        }
    }
}

fn bind_schema<C>(decode: fn(&Node) -> Result<C>, function_config: Option<&Node>) -> Result<C> {
    match function_config {
        Some(node) => decode(node),
        // absent config binds like an empty mapping, so required fields still fail
        None => decode(&Node::mapping()),
    }
}

fn bind_flags<C>(set: &FlagSet<C>, init: fn() -> C, function_config: Option<&Node>, cli: Option<&ArgMatches>) -> Result<C> {
    let data = match function_config {
        Some(fc) => match fc.lookup(&["data"]).map_err(|e| Error::Config(e.to_string()))? {
            Some(d) if d.is_null() => None,
            Some(d) => Some(
                d.as_mapping()
                    .ok_or_else(|| Error::Config(format!("data must be a mapping, found {}", d.kind_name())))?,
            ),
            None => None,
        },
        None => None,
    };

    let mut out = init();
    for flag in set.iter() {
        let from_data = match data.and_then(|d| d.get(flag.name)) {
            Some(v) => Some(
                v.as_scalar()
                    .map(|s| if s.is_null() { "" } else { s.value.as_str() })
                    .ok_or_else(|| Error::Config(format!("data.{} must be a scalar, found {}", flag.name, v.kind_name())))?,
            ),
            None => None,
        };
        let from_cli = cli.and_then(|m| m.try_get_one::<String>(flag.name).ok().flatten()).map(String::as_str);
        let value = from_data.or(from_cli).unwrap_or(flag.default.as_str());
        (flag.set)(&mut out, value).map_err(|e| Error::Config(format!("flag {}: {e:#}", flag.name)))?;
        debug!(flag = flag.name, value, "bound flag");
    }
    Ok(out)
}
