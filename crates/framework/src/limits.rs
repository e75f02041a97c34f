//! Input limits, configured through the environment.

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest accepted input, in bytes (`KRMKIT_MAX_INPUT_BYTES`).
    pub max_input_bytes: usize,
    /// Largest accepted document, in nodes (`KRMKIT_MAX_NODES`).
    pub max_nodes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_input_bytes: 64 * 1024 * 1024, max_nodes: 1_000_000 }
    }
}

impl Limits {
    pub fn from_env() -> Self {
        let d = Limits::default();
        Self {
            max_input_bytes: env_usize("KRMKIT_MAX_INPUT_BYTES", d.max_input_bytes),
            max_nodes: env_usize("KRMKIT_MAX_NODES", d.max_nodes),
        }
    }
}
