//! Adapter stacks and the `<lora:name:model[:clip]>` prompt syntax

use modelvault_core::asset::normalize_separators;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::warn;

/// File extension appended to bare adapter names
pub const ADAPTER_EXTENSION: &str = ".safetensors";

static LORA_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<lora:([^:]+):([^:>]+)(?::([^>]+))?>").expect("valid adapter tag pattern")
});

static ANGLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid angle tag pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// One adapter in a stack
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    pub name: String,
    pub strength_model: f32,
    pub strength_clip: f32,
}

impl StackEntry {
    pub fn new(name: impl Into<String>, strength_model: f32, strength_clip: f32) -> Self {
        Self {
            name: name.into(),
            strength_model,
            strength_clip,
        }
    }

    /// Both strengths are zero
    pub fn is_noop(&self) -> bool {
        self.strength_model == 0.0 && self.strength_clip == 0.0
    }
}

impl fmt::Display for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_entry(self, false))
    }
}

/// Adapter tags found in `text`, in order
pub fn extract_lora_tags(text: &str) -> Vec<StackEntry> {
    LORA_TAG
        .captures_iter(text)
        .filter_map(|caps| {
            let mut name = normalize_separators(caps[1].trim());
            if !name.ends_with(ADAPTER_EXTENSION) {
                name.push_str(ADAPTER_EXTENSION);
            }

            let strength_model = match caps[2].trim().parse::<f32>() {
                Ok(v) => v,
                Err(_) => {
                    warn!(tag = &caps[0], "Ignoring adapter tag with invalid strength");
                    return None;
                }
            };
            let strength_clip = match caps.get(3) {
                Some(m) => match m.as_str().trim().parse::<f32>() {
                    Ok(v) => v,
                    Err(_) => {
                        warn!(tag = &caps[0], "Ignoring adapter tag with invalid strength");
                        return None;
                    }
                },
                None => strength_model,
            };

            Some(StackEntry::new(name, strength_model, strength_clip))
        })
        .collect()
}

/// Remove every `<...>` section and collapse whitespace
pub fn strip_angle_tags(text: &str) -> String {
    let stripped = ANGLE_TAG.replace_all(text, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn round2(value: f32) -> f64 {
    (f64::from(value) * 100.0).round() / 100.0
}

/// `<lora:name:model:clip>`; compact form drops an equal clip strength
pub fn format_entry(entry: &StackEntry, compact: bool) -> String {
    let model = round2(entry.strength_model);
    let clip = round2(entry.strength_clip);
    if compact && model == clip {
        format!("<lora:{}:{:?}>", entry.name, model)
    } else {
        format!("<lora:{}:{:?}:{:?}>", entry.name, model, clip)
    }
}

/// One formatted entry per line
pub fn stack_to_text(stack: &[StackEntry]) -> String {
    stack
        .iter()
        .map(|entry| format_entry(entry, false) + "\n")
        .collect()
}
