//! Runtime configuration: strategy presets, global switches, priority
//! inference, and recommended models.
//!
//! One `McpConfigManager` is shared by the pipeline (priority inference)
//! and the executor (effective per-request parameters). All state sits
//! behind read-mostly locks; admin updates are atomic from the readers'
//! point of view.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;

use crate::router::{RouteQuery, SmartRouter};
use crate::types::{
    CacheStrategy, Capability, CompletionRequest, ComplexityLevel, McpParams, Provider,
    RequestMetadata, RequestPriority, StrategyPreset, TaskPriority, TaskType,
};

/// Partial [`McpParams`] for runtime preset updates. Only set fields
/// overwrite.
#[derive(Debug, Clone, Default)]
pub struct McpParamsPatch {
    pub cache_strategy: Option<CacheStrategy>,
    pub min_similarity: Option<f32>,
    pub cache_ttl: Option<Duration>,
    pub priority: Option<TaskPriority>,
    pub store_result: Option<bool>,
    pub preferred_provider: Option<Provider>,
}

impl McpParamsPatch {
    fn apply(&self, params: &mut McpParams) {
        if let Some(strategy) = self.cache_strategy {
            params.cache_strategy = strategy;
        }
        if let Some(floor) = self.min_similarity {
            params.min_similarity = floor;
        }
        if let Some(ttl) = self.cache_ttl {
            params.cache_ttl = ttl;
        }
        if let Some(priority) = self.priority {
            params.priority = priority;
        }
        if let Some(store) = self.store_result {
            params.store_result = store;
        }
        if let Some(provider) = self.preferred_provider {
            params.preferred_provider = Some(provider);
        }
    }
}

/// Global switches surfaced in `stats()`.
#[derive(Debug, Clone, Serialize)]
pub struct McpSettings {
    pub strategy: StrategyPreset,
    /// When false, routing is pinned to one provider.
    pub multi_provider_enabled: bool,
    /// Provider preference applied to requests that carry none.
    pub preferred_provider: Option<Provider>,
    pub semantic_cache_enabled: bool,
    pub smart_routing_enabled: bool,
    /// TTL applied when a request's parameters carry none of their own.
    pub default_ttl: Duration,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyPreset::Balanced,
            multi_provider_enabled: true,
            preferred_provider: None,
            semantic_cache_enabled: true,
            smart_routing_enabled: true,
            default_ttl: Duration::from_secs(12 * 60 * 60),
        }
    }
}

/// Configuration authority for the MCP core.
pub struct McpConfigManager {
    router: Arc<SmartRouter>,
    settings: RwLock<McpSettings>,
    /// Per-preset parameter tables, seeded from the built-in presets and
    /// mutable via [`update_strategy_config`](Self::update_strategy_config).
    presets: RwLock<BTreeMap<StrategyPreset, McpParams>>,
}

impl McpConfigManager {
    pub fn new(router: Arc<SmartRouter>) -> Self {
        let mut presets = BTreeMap::new();
        for preset in [
            StrategyPreset::Aggressive,
            StrategyPreset::Balanced,
            StrategyPreset::Conservative,
        ] {
            presets.insert(preset, preset.params());
        }
        Self {
            router,
            settings: RwLock::new(McpSettings::default()),
            presets: RwLock::new(presets),
        }
    }

    pub fn router(&self) -> &Arc<SmartRouter> {
        &self.router
    }

    pub fn settings(&self) -> McpSettings {
        self.settings.read().clone()
    }

    // ------------------------------------------------------------------
    // Admin operations
    // ------------------------------------------------------------------

    pub fn set_strategy(&self, preset: StrategyPreset) {
        let ttl = self.params_for(preset).cache_ttl;
        let mut settings = self.settings.write();
        settings.strategy = preset;
        settings.default_ttl = ttl;
    }

    /// Patch one preset's parameter table.
    pub fn update_strategy_config(&self, preset: StrategyPreset, patch: &McpParamsPatch) {
        let mut presets = self.presets.write();
        let params = presets.entry(preset).or_insert_with(|| preset.params());
        patch.apply(params);
    }

    pub fn set_multi_provider_enabled(&self, enabled: bool) {
        self.settings.write().multi_provider_enabled = enabled;
    }

    pub fn set_preferred_provider(&self, provider: Option<Provider>) {
        self.settings.write().preferred_provider = provider;
    }

    pub fn set_semantic_cache_enabled(&self, enabled: bool) {
        self.settings.write().semantic_cache_enabled = enabled;
    }

    pub fn set_smart_routing_enabled(&self, enabled: bool) {
        self.settings.write().smart_routing_enabled = enabled;
    }

    pub fn set_default_ttl(&self, ttl: Duration) {
        self.settings.write().default_ttl = ttl;
    }

    // ------------------------------------------------------------------
    // Per-request resolution
    // ------------------------------------------------------------------

    /// Parameters for the currently active strategy.
    pub fn active_params(&self) -> McpParams {
        let strategy = self.settings.read().strategy;
        self.params_for(strategy)
    }

    /// Parameters for a specific preset, including runtime patches.
    pub fn params_for(&self, preset: StrategyPreset) -> McpParams {
        self.presets
            .read()
            .get(&preset)
            .cloned()
            .unwrap_or_else(|| preset.params())
    }

    /// Resolve the parameters a request executes under.
    ///
    /// Explicit request parameters win; otherwise the active preset
    /// fills them in. The global provider switches then apply: with
    /// multi-provider off, routing is pinned to the configured provider
    /// (Claude when none is set); with it on, requests without their own
    /// preference inherit the global one.
    pub fn effective_params(&self, request: &CompletionRequest) -> McpParams {
        let settings = self.settings.read();
        let mut params = match &request.mcp {
            Some(explicit) => explicit.clone(),
            None => {
                let mut params = self.params_for(settings.strategy);
                params.cache_ttl = settings.default_ttl;
                params
            }
        };

        if !settings.multi_provider_enabled {
            params.preferred_provider =
                Some(settings.preferred_provider.unwrap_or(Provider::Claude));
        } else if params.preferred_provider.is_none() {
            params.preferred_provider = settings.preferred_provider;
        }
        params
    }

    /// Map request metadata to a scheduling priority.
    ///
    /// Type strings containing "interactive", "message", or "critical"
    /// rank high; "background", "batch", or "analysis" rank low;
    /// anything else is normal.
    pub fn infer_priority(&self, metadata: &RequestMetadata) -> RequestPriority {
        let mut hints: Vec<&str> = Vec::new();
        if let Some(kind) = metadata.kind.as_deref() {
            hints.push(kind);
        }
        for field in ["type", "priority"] {
            if let Some(value) = metadata.extra.get(field).and_then(|v| v.as_str()) {
                hints.push(value);
            }
        }

        let matches_any = |needles: &[&str]| {
            hints.iter().any(|hint| {
                let hint = hint.to_ascii_lowercase();
                needles.iter().any(|needle| hint.contains(needle))
            })
        };

        if matches_any(&["interactive", "message", "critical"]) {
            RequestPriority::High
        } else if matches_any(&["background", "batch", "analysis"]) {
            RequestPriority::Low
        } else {
            RequestPriority::Normal
        }
    }

    /// Recommended model for a task at a complexity level.
    ///
    /// Low-complexity work optimizes for cost, everything else for
    /// quality; reasoning is gated at the level's threshold.
    pub fn get_recommended_model(&self, task: TaskType, complexity: ComplexityLevel) -> String {
        let priority = match complexity {
            ComplexityLevel::Low => TaskPriority::Cost,
            ComplexityLevel::Medium | ComplexityLevel::High => TaskPriority::Quality,
        };
        let settings = self.settings.read();
        let preferred_provider = if settings.multi_provider_enabled {
            settings.preferred_provider
        } else {
            Some(settings.preferred_provider.unwrap_or(Provider::Claude))
        };
        drop(settings);

        self.router.select(&RouteQuery {
            task_type: task,
            complexity,
            required_capabilities: vec![Capability::Reasoning],
            preferred_provider,
            priority,
            prompt_tokens: 500,
            output_tokens: 300,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> McpConfigManager {
        McpConfigManager::new(Arc::new(SmartRouter::new()))
    }

    #[test]
    fn set_strategy_switches_active_params() {
        let manager = manager();
        manager.set_strategy(StrategyPreset::Aggressive);
        let params = manager.active_params();
        assert_eq!(params.cache_strategy, CacheStrategy::Hybrid);
        assert!((params.min_similarity - 0.65).abs() < 1e-6);
    }

    #[test]
    fn update_strategy_config_patches_one_preset() {
        let manager = manager();
        manager.update_strategy_config(
            StrategyPreset::Balanced,
            &McpParamsPatch {
                min_similarity: Some(0.85),
                ..Default::default()
            },
        );

        assert!((manager.params_for(StrategyPreset::Balanced).min_similarity - 0.85).abs() < 1e-6);
        // Other presets untouched.
        assert!(
            (manager.params_for(StrategyPreset::Conservative).min_similarity - 0.95).abs() < 1e-6
        );
    }

    #[test]
    fn infer_priority_from_kind() {
        let manager = manager();

        let mut metadata = RequestMetadata::default();
        assert_eq!(manager.infer_priority(&metadata), RequestPriority::Normal);

        metadata.kind = Some("interactive_chat".into());
        assert_eq!(manager.infer_priority(&metadata), RequestPriority::High);

        metadata.kind = Some("background_analysis".into());
        assert_eq!(manager.infer_priority(&metadata), RequestPriority::Low);
    }

    #[test]
    fn infer_priority_reads_extra_bag() {
        let manager = manager();
        let mut metadata = RequestMetadata::default();
        metadata
            .extra
            .insert("type".into(), serde_json::json!("critical_alert"));
        assert_eq!(manager.infer_priority(&metadata), RequestPriority::High);
    }

    #[test]
    fn high_markers_win_over_low_markers() {
        let manager = manager();
        let mut metadata = RequestMetadata::default();
        metadata.kind = Some("critical_batch".into());
        assert_eq!(manager.infer_priority(&metadata), RequestPriority::High);
    }

    #[test]
    fn single_provider_mode_pins_routing() {
        let manager = manager();
        manager.set_multi_provider_enabled(false);

        let request = CompletionRequest::new("hello");
        let params = manager.effective_params(&request);
        assert_eq!(params.preferred_provider, Some(Provider::Claude));
    }

    #[test]
    fn explicit_request_params_win() {
        let manager = manager();
        manager.set_strategy(StrategyPreset::Conservative);

        let request = CompletionRequest::new("hello")
            .with_mcp(StrategyPreset::Aggressive.params());
        let params = manager.effective_params(&request);
        assert_eq!(params.cache_strategy, CacheStrategy::Hybrid);
    }

    #[test]
    fn recommended_model_reasoning_is_monotone() {
        let manager = manager();
        let router = Arc::clone(manager.router());

        let reasoning = |model: &str| router.metadata(model).unwrap().capabilities.reasoning;
        let low = manager.get_recommended_model(TaskType::General, ComplexityLevel::Low);
        let medium = manager.get_recommended_model(TaskType::General, ComplexityLevel::Medium);
        let high = manager.get_recommended_model(TaskType::General, ComplexityLevel::High);

        assert!(reasoning(&low) <= reasoning(&medium));
        assert!(reasoning(&medium) <= reasoning(&high));
    }
}
