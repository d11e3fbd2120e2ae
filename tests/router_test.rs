//! Smart routing tests: selection, capability gating, provider
//! preference, recommended-model monotonicity.

use std::sync::Arc;

use muninn::{
    Capability, CapabilityScores, ComplexityLevel, McpConfigManager, ModelMetadata, Provider,
    RouteQuery, SmartRouter, TaskPriority, TaskType,
};

fn base_query() -> RouteQuery {
    RouteQuery {
        task_type: TaskType::General,
        complexity: ComplexityLevel::Medium,
        required_capabilities: Vec::new(),
        preferred_provider: None,
        priority: TaskPriority::Quality,
        prompt_tokens: 500,
        output_tokens: 300,
    }
}

// ============================================================================
// Provider gating
// ============================================================================

#[test]
fn preferred_provider_selects_within_provider() {
    let router = SmartRouter::new();

    for provider in [Provider::Claude, Provider::OpenAi] {
        let mut query = base_query();
        query.preferred_provider = Some(provider);
        let model = router.select(&query);
        assert_eq!(
            router.provider_of(&model),
            Some(provider),
            "model {model} not on {provider}"
        );
    }
}

#[test]
fn provider_parse_normalizes_case() {
    // "CLAUDE" and "claude" are the same provider at the boundary.
    let upper = Provider::parse("CLAUDE").unwrap();
    let lower = Provider::parse("claude").unwrap();
    assert_eq!(upper, lower);
}

// ============================================================================
// Capability gating
// ============================================================================

#[test]
fn high_complexity_gates_out_weak_models() {
    let router = SmartRouter::new();

    let mut query = base_query();
    query.complexity = ComplexityLevel::High;
    query.required_capabilities = vec![Capability::Reasoning];
    let model = router.select(&query);

    let reasoning = router.metadata(&model).unwrap().capabilities.reasoning;
    assert!(reasoning >= 8.0, "{model} reasoning {reasoning} below gate");
}

#[test]
fn no_eligible_model_returns_default() {
    let router = SmartRouter::new();

    let mut query = base_query();
    query.complexity = ComplexityLevel::High;
    query.required_capabilities = vec![Capability::Reasoning];
    // No OpenAI model pairs a 9+ math score with the gate below; force
    // an impossible combination by requiring everything at high level
    // on a provider with none.
    query.preferred_provider = Some(Provider::OpenAi);
    query.required_capabilities = vec![Capability::Creativity];

    let decision = router.select_scored(&query);
    // gpt-4o caps creativity at 7.5, o1-mini at 6.0: gate (8.0) rejects
    // both, and gpt-4o-mini falls further short.
    assert!(decision.fallback);
    assert_eq!(decision.model, router.default_model());
}

// ============================================================================
// Priority weightings
// ============================================================================

#[test]
fn speed_priority_prefers_faster_models_than_quality() {
    let router = SmartRouter::new();

    let mut speed_query = base_query();
    speed_query.priority = TaskPriority::Speed;
    let fast = router.select(&speed_query);

    let mut quality_query = base_query();
    quality_query.priority = TaskPriority::Quality;
    let good = router.select(&quality_query);

    let latency = |m: &str| router.metadata(m).unwrap().average_response_time_ms;
    assert!(
        latency(&fast) <= latency(&good),
        "speed pick {fast} slower than quality pick {good}"
    );
}

#[test]
fn cost_priority_prefers_cheaper_models_than_quality() {
    let router = SmartRouter::new();

    let mut cost_query = base_query();
    cost_query.priority = TaskPriority::Cost;
    let cheap = router.select(&cost_query);

    let mut quality_query = base_query();
    quality_query.priority = TaskPriority::Quality;
    let good = router.select(&quality_query);

    let cost = |m: &str| router.estimate_cost(m, 500.0, 300.0);
    assert!(
        cost(&cheap) <= cost(&good),
        "cost pick {cheap} pricier than quality pick {good}"
    );
}

// ============================================================================
// Recommended models
// ============================================================================

#[test]
fn recommended_model_reasoning_monotone_in_complexity() {
    let router = Arc::new(SmartRouter::new());
    let manager = McpConfigManager::new(Arc::clone(&router));

    for task in [
        TaskType::General,
        TaskType::Code,
        TaskType::Analysis,
        TaskType::Math,
    ] {
        let reasoning = |level| {
            let model = manager.get_recommended_model(task, level);
            router.metadata(&model).unwrap().capabilities.reasoning
        };

        let low = reasoning(ComplexityLevel::Low);
        let medium = reasoning(ComplexityLevel::Medium);
        let high = reasoning(ComplexityLevel::High);
        assert!(low <= medium, "{task:?}: low {low} > medium {medium}");
        assert!(medium <= high, "{task:?}: medium {medium} > high {high}");
    }
}

// ============================================================================
// Overrides and custom tables
// ============================================================================

#[test]
fn override_shifts_selection() {
    let router = SmartRouter::new();

    let mut query = base_query();
    query.priority = TaskPriority::Quality;
    let before = router.select(&query);

    // Make a different model overwhelmingly better.
    let boosted = if before == "gpt-4o" { "claude-3-opus-20240229" } else { "gpt-4o" };
    router
        .override_metadata(
            boosted,
            &muninn::MetadataPatch {
                average_response_time_ms: Some(1),
                cost_per_input_token: Some(0.0),
                cost_per_output_token: Some(0.0),
                capabilities: Some(CapabilityScores {
                    reasoning: 10.0,
                    creativity: 10.0,
                    code_generation: 10.0,
                    math_precision: 10.0,
                    factual_accuracy: 10.0,
                    context_understanding: 10.0,
                }),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(router.select(&query), boosted);
}

#[test]
fn custom_table_with_unknown_default_still_falls_back() {
    let mut models = std::collections::BTreeMap::new();
    models.insert(
        "only-model".to_string(),
        ModelMetadata::new(Provider::Claude)
            .with_context_size(8_192)
            .with_costs(1e-6, 2e-6)
            .with_latency_ms(800)
            .with_capabilities(CapabilityScores {
                reasoning: 5.0,
                creativity: 5.0,
                code_generation: 5.0,
                math_precision: 5.0,
                factual_accuracy: 5.0,
                context_understanding: 5.0,
            }),
    );
    let router = SmartRouter::with_models(models, "external-default");

    let mut query = base_query();
    query.preferred_provider = Some(Provider::OpenAi);
    let decision = router.select_scored(&query);
    assert!(decision.fallback);
    assert_eq!(decision.model, "external-default");
}
