//! Catalog of the models the generator is known to work with.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub label: &'static str,
    /// Emits a `<think>` reasoning segment before its answer.
    pub is_thinker: bool,
}

pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "deepseek/deepseek-chat-v3-0324",
        label: "DeepSeek V3 O324",
        is_thinker: false,
    },
    ModelInfo {
        id: "deepseek/deepseek-r1",
        label: "DeepSeek R1 0528",
        is_thinker: true,
    },
    ModelInfo {
        id: "Qwen/Qwen3-Coder-480B-A35B-Instruct",
        label: "Qwen3 Coder 480B A35B Instruct",
        is_thinker: false,
    },
    ModelInfo {
        id: "moonshotai/Kimi-K2-Instruct",
        label: "Kimi K2 Instruct",
        is_thinker: false,
    },
    ModelInfo {
        id: "deepseek-ai/DeepSeek-V3.1",
        label: "DeepSeek V3.1",
        is_thinker: false,
    },
    ModelInfo {
        id: "moonshotai/Kimi-K2-Instruct-0905",
        label: "Kimi K2 Instruct 0905",
        is_thinker: false,
    },
    ModelInfo {
        id: "openai/gpt-4o",
        label: "GPT-4o",
        is_thinker: false,
    },
    ModelInfo {
        id: "openai/gpt-4o-mini",
        label: "GPT-4o Mini",
        is_thinker: false,
    },
    ModelInfo {
        id: "anthropic/claude-3.5-sonnet",
        label: "Claude 3.5 Sonnet",
        is_thinker: false,
    },
    ModelInfo {
        id: "google/gemini-pro-1.5",
        label: "Gemini Pro 1.5",
        is_thinker: false,
    },
];

/// Ids stored by older projects, mapped to the id that replaced them.
const LEGACY_IDS: &[(&str, &str)] = &[
    ("deepseek-ai/DeepSeek-V3-0324", "deepseek/deepseek-chat-v3-0324"),
    ("deepseek-ai/DeepSeek-R1-0528", "deepseek/deepseek-r1"),
];

/// Resolves a legacy id to its current name; other ids pass through.
pub fn canonical_model_id(id: &str) -> &str {
    LEGACY_IDS
        .iter()
        .find(|(legacy, _)| *legacy == id)
        .map_or(id, |(_, current)| current)
}

/// Looks a model up by id (legacy ids included) or by display label.
pub fn find_model(id_or_label: &str) -> Option<&'static ModelInfo> {
    let id = canonical_model_id(id_or_label);
    MODELS
        .iter()
        .find(|m| m.id == id || m.label == id_or_label)
}

/// Whether output from `model` starts with a reasoning segment. Unknown
/// models are assumed not to reason.
pub fn supports_reasoning(model: &str) -> bool {
    find_model(model).is_some_and(|m| m.is_thinker)
}
