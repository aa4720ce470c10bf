//! LoRA stack commands

use modelvault_core::VaultConfig;
use modelvault_lora::{
    LoraApplicator, SafetensorsLoader, SearchPaths, WeightCache, WeightSet, extract_lora_tags,
    stack_to_text, strip_angle_tags,
};
use std::sync::Arc;

/// Print the stack and the prompt with its tags removed
pub fn parse(prompt: &str) {
    let stack = extract_lora_tags(prompt);

    println!("=== Stack ({}) ===", stack.len());
    print!("{}", stack_to_text(&stack));
    println!();
    println!("=== Prompt ===");
    println!("{}", strip_angle_tags(prompt));
}

/// Resolve and decode every adapter of the prompt's stack
///
/// Nothing is patched into a real model here; the empty weight sets only
/// exercise resolution, decoding and the cache.
pub fn apply(config: &VaultConfig, prompt: &str) {
    let stack = extract_lora_tags(prompt);
    let applicator = LoraApplicator::new(
        SearchPaths::new(config.lora_search_paths()),
        SafetensorsLoader::default(),
        Arc::new(WeightCache::new(config.max_cached_loras)),
    );

    let result = applicator.apply_stack(&stack, WeightSet::new(), Some(WeightSet::new()));

    println!("=== Applied ({}/{}) ===", result.applied.len(), stack.len());
    for applied in &result.applied {
        println!(
            "  {} [{:?}] {}",
            applied.entry,
            applied.provenance,
            applied.path.display()
        );
    }

    let cache = applicator.cache();
    let stats = cache.stats();
    println!();
    println!("=== Cache ({}/{}) ===", cache.len(), cache.max_entries());
    for path in cache.paths() {
        println!("  {}", path.display());
    }
    println!(
        "  hits: {}, misses: {}, evictions: {}",
        stats.hits, stats.misses, stats.evictions
    );
}
