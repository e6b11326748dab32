use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::backend::Topology;

/// What the dispatcher does when the conservative vertex-range estimate
/// exceeds the bound vertex buffer.
///
/// The estimate is an upper bound, not proof of an overrun, so neither
/// policy ever blocks the draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VertexBoundsPolicy {
    #[default]
    Warn,
    Ignore,
}

/// Tunables for a [`Device`](crate::Device).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub fence_poll_interval_us: u64,
    pub vertex_bounds: VertexBoundsPolicy,
    pub default_topology: Topology,
    pub max_uniform_buffer_size: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fence_poll_interval_us: 250,
            vertex_bounds: VertexBoundsPolicy::Warn,
            default_topology: Topology::TriangleList,
            max_uniform_buffer_size: 64 * 1024,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `GL_BRIDGE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading through `lookup`.
    /// Unparsable values keep the default and log a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("GL_BRIDGE_FENCE_POLL_US") {
            match value.trim().parse::<u64>() {
                Ok(us) => config.fence_poll_interval_us = us,
                Err(err) => warn!("ignoring GL_BRIDGE_FENCE_POLL_US={value}: {err}"),
            }
        }
        if let Some(value) = lookup("GL_BRIDGE_VERTEX_BOUNDS") {
            match value.trim().to_ascii_lowercase().as_str() {
                "warn" => config.vertex_bounds = VertexBoundsPolicy::Warn,
                "ignore" => config.vertex_bounds = VertexBoundsPolicy::Ignore,
                other => warn!("ignoring GL_BRIDGE_VERTEX_BOUNDS={other}: expected warn or ignore"),
            }
        }
        if let Some(value) = lookup("GL_BRIDGE_DEFAULT_TOPOLOGY") {
            match Topology::from_name(value.trim()) {
                Some(topology) => config.default_topology = topology,
                None => warn!("ignoring GL_BRIDGE_DEFAULT_TOPOLOGY={value}: unknown topology"),
            }
        }
        if let Some(value) = lookup("GL_BRIDGE_MAX_UNIFORM_BYTES") {
            match value.trim().parse::<u32>() {
                Ok(bytes) => config.max_uniform_buffer_size = bytes,
                Err(err) => warn!("ignoring GL_BRIDGE_MAX_UNIFORM_BYTES={value}: {err}"),
            }
        }

        config
    }

    pub fn fence_poll_interval(&self) -> Duration {
        Duration::from_micros(self.fence_poll_interval_us)
    }
}
