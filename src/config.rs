//! Application settings from environment variables.
use std::path::PathBuf;

use tracing::warn;

use crate::tasks::DemoId;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Demo launched right away instead of showing the selector.
    pub demo: Option<DemoId>,
    pub asset_dir: PathBuf,
    pub window: (u32, u32),
    /// Frames each simulated acquisition step takes.
    pub sim_latency: u32,
    pub sim_floor: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            demo: None,
            asset_dir: PathBuf::from("assets"),
            window: (1280, 720),
            sim_latency: 2,
            sim_floor: 0.0,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; values that do not parse keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("ARTOYS_DEMO") {
            match DemoId::from_key(v.trim()) {
                Some(id) => config.demo = Some(id),
                None => warn!(value = %v, "ARTOYS_DEMO names no demo, showing selector"),
            }
        }
        if let Some(v) = lookup("ARTOYS_ASSET_DIR").filter(|v| !v.is_empty()) {
            config.asset_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ARTOYS_WINDOW") {
            match parse_size(&v) {
                Some(size) => config.window = size,
                None => warn!(value = %v, "ARTOYS_WINDOW must look like 1280x720"),
            }
        }
        if let Some(v) = lookup("ARTOYS_SIM_LATENCY") {
            match v.trim().parse() {
                Ok(n) => config.sim_latency = n,
                Err(e) => warn!(value = %v, "bad ARTOYS_SIM_LATENCY: {e}"),
            }
        }
        if let Some(v) = lookup("ARTOYS_SIM_FLOOR") {
            match v.trim().parse::<f32>() {
                Ok(h) if h.is_finite() => config.sim_floor = h,
                _ => warn!(value = %v, "bad ARTOYS_SIM_FLOOR"),
            }
        }
        config
    }
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.trim().split_once(['x', 'X'])?;
    let (w, h) = (w.parse().ok()?, h.parse().ok()?);
    (w > 0 && h > 0).then_some((w, h))
}
