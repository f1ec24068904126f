//! Runtime configuration (`taskforge.toml` + `TASKFORGE_*` env overrides).
//!
//! Per spec §6, no defaults are encoded at the call sites that consume this
//! struct — every field either has an explicit `serde(default = ...)` here
//! or is required in the TOML. The core never reads `taskforge.toml` itself;
//! `RuntimeConfig::load` is the one seam where the collaborator's file lands
//! in a typed struct.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub workspace: WorkspaceConfig,
    pub local_provider: ProviderEndpoint,
    #[serde(default)]
    pub remote_provider: Option<ProviderEndpoint>,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub skill_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_context_length")]
    pub context_length: u32,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_context_length() -> u32 {
    32_768
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_target")]
    pub default_target: String,
    #[serde(default)]
    pub always_local_keywords: Vec<String>,
    #[serde(default)]
    pub always_remote_keywords: Vec<String>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

fn default_target() -> String {
    "local".to_string()
}
fn default_confidence_threshold() -> f32 {
    0.55
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_target: default_target(),
            always_local_keywords: Vec::new(),
            always_remote_keywords: Vec::new(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_working_memory_ttl_ms")]
    pub working_memory_ttl_ms: u64,
    #[serde(default = "default_max_tool_result_tokens")]
    pub max_tool_result_tokens: u32,
    #[serde(default = "default_reserve_for_output")]
    pub reserve_for_output: u32,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    #[serde(default = "default_hybrid_fts_weight")]
    pub hybrid_fts_weight: f32,
    #[serde(default = "default_hybrid_vector_weight")]
    pub hybrid_vector_weight: f32,
}

fn default_working_memory_ttl_ms() -> u64 {
    3_600_000
}
fn default_max_tool_result_tokens() -> u32 {
    8_000
}
fn default_reserve_for_output() -> u32 {
    2_048
}
fn default_embedding_dimension() -> usize {
    384
}
fn default_hybrid_fts_weight() -> f32 {
    0.3
}
fn default_hybrid_vector_weight() -> f32 {
    0.7
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            working_memory_ttl_ms: default_working_memory_ttl_ms(),
            max_tool_result_tokens: default_max_tool_result_tokens(),
            reserve_for_output: default_reserve_for_output(),
            embedding_dimension: default_embedding_dimension(),
            hybrid_fts_weight: default_hybrid_fts_weight(),
            hybrid_vector_weight: default_hybrid_vector_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_max_active_tasks")]
    pub max_active_tasks: u32,
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    #[serde(default = "default_discovery_interval_ms")]
    pub discovery_interval_ms: u64,
    #[serde(default = "default_idle_threshold_ms")]
    pub idle_threshold_ms: u64,
    #[serde(default = "default_event_dedupe_ms")]
    pub event_dedupe_ms: u64,
    #[serde(default)]
    pub heartbeat_schedule: Option<String>,
    #[serde(default)]
    pub business_hours: Option<String>,
}

fn default_tick_interval_ms() -> u64 {
    30_000
}
fn default_max_active_tasks() -> u32 {
    100
}
fn default_task_timeout_ms() -> u64 {
    300_000
}
fn default_discovery_interval_ms() -> u64 {
    1_800_000
}
fn default_idle_threshold_ms() -> u64 {
    600_000
}
fn default_event_dedupe_ms() -> u64 {
    10_000
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_active_tasks: default_max_active_tasks(),
            task_timeout_ms: default_task_timeout_ms(),
            discovery_interval_ms: default_discovery_interval_ms(),
            idle_threshold_ms: default_idle_threshold_ms(),
            event_dedupe_ms: default_event_dedupe_ms(),
            heartbeat_schedule: None,
            business_hours: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default)]
    pub require_confirmation: bool,
    #[serde(default)]
    pub blocked_commands: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub available: Vec<String>,
}

impl RuntimeConfig {
    /// Load config from a TOML file with `TASKFORGE_*` env var overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RuntimeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TASKFORGE_").split("_"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.taskforge/taskforge.toml", home)
}
