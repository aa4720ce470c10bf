//! Decoded adapter weights
//!
//! A LoRA file stores, for every patched layer, a low-rank pair
//! `<layer>.lora_down.weight` (`rank × in`) and `<layer>.lora_up.weight`
//! (`out × rank`), plus an optional scalar `<layer>.alpha`. Applying it with
//! strength `s` adds `s * alpha/rank * (up @ down)` to the base matrix.

use crate::error::{LoraError, Result};
use half::{bf16, f16};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use std::collections::BTreeMap;
use tracing::debug;

const DOWN_SUFFIX: &str = ".lora_down.weight";
const UP_SUFFIX: &str = ".lora_up.weight";
const ALPHA_SUFFIX: &str = ".alpha";

/// Layer name prefix of text-encoder layers
pub const TEXT_ENCODER_PREFIX: &str = "lora_te";

/// Which half of the pipeline a layer patches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterTarget {
    /// Diffusion model
    Model,
    /// Text encoder
    Clip,
}

impl AdapterTarget {
    /// Target of a layer, from its name
    pub fn of_layer(name: &str) -> Self {
        if name.starts_with(TEXT_ENCODER_PREFIX) {
            Self::Clip
        } else {
            Self::Model
        }
    }
}

/// A single low-rank layer
#[derive(Debug, Clone, PartialEq)]
pub struct LoraLayer {
    /// Down projection, row-major `rank × in_dim`
    pub down: Vec<f32>,
    /// Up projection, row-major `out_dim × rank`
    pub up: Vec<f32>,
    pub rank: usize,
    pub in_dim: usize,
    pub out_dim: usize,
    pub alpha: Option<f32>,
}

impl LoraLayer {
    /// Zero-initialized layer
    pub fn new(in_dim: usize, out_dim: usize, rank: usize) -> Self {
        Self {
            down: vec![0.0; rank * in_dim],
            up: vec![0.0; out_dim * rank],
            rank,
            in_dim,
            out_dim,
            alpha: None,
        }
    }

    /// `alpha / rank`, or 1 without alpha
    pub fn scale(&self) -> f32 {
        match self.alpha {
            Some(alpha) if self.rank > 0 => alpha / self.rank as f32,
            _ => 1.0,
        }
    }

    /// Number of values in the patched matrix
    pub fn target_len(&self) -> usize {
        self.out_dim * self.in_dim
    }

    /// Apply LoRA delta to a row-major `out × in` matrix
    /// W' = W + strength * alpha/rank * (up @ down)
    pub fn apply_to_weights(&self, base_weights: &mut [f32], strength: f32) -> Result<()> {
        if base_weights.len() != self.target_len() {
            return Err(LoraError::Shape {
                layer: String::new(),
                expected: self.target_len(),
                actual: base_weights.len(),
            });
        }

        let scale = strength * self.scale();
        for out_idx in 0..self.out_dim {
            for in_idx in 0..self.in_dim {
                let mut delta = 0.0;
                for r in 0..self.rank {
                    delta += self.up[out_idx * self.rank + r] * self.down[r * self.in_dim + in_idx];
                }
                base_weights[out_idx * self.in_dim + in_idx] += scale * delta;
            }
        }
        Ok(())
    }

    /// Estimate memory usage
    pub fn memory_size(&self) -> usize {
        (self.down.len() + self.up.len()) * std::mem::size_of::<f32>()
    }
}

/// Decoded adapter payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterWeights {
    layers: BTreeMap<String, LoraLayer>,
}

impl AdapterWeights {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode a safetensors file image (F32, F16 or BF16 tensors)
    pub fn from_safetensors(bytes: &[u8]) -> Result<Self> {
        let tensors =
            SafeTensors::deserialize(bytes).map_err(|e| LoraError::Decode(e.to_string()))?;

        let mut downs: BTreeMap<String, (Vec<usize>, Vec<f32>)> = BTreeMap::new();
        let mut ups: BTreeMap<String, (Vec<usize>, Vec<f32>)> = BTreeMap::new();
        let mut alphas: BTreeMap<String, f32> = BTreeMap::new();

        for (name, view) in tensors.tensors() {
            if let Some(layer) = name.strip_suffix(DOWN_SUFFIX) {
                downs.insert(layer.to_string(), (view.shape().to_vec(), decode(&name, &view)?));
            } else if let Some(layer) = name.strip_suffix(UP_SUFFIX) {
                ups.insert(layer.to_string(), (view.shape().to_vec(), decode(&name, &view)?));
            } else if let Some(layer) = name.strip_suffix(ALPHA_SUFFIX) {
                let alpha = decode(&name, &view)?.first().copied().ok_or_else(|| {
                    LoraError::Decode(format!("{name}: empty alpha tensor"))
                })?;
                alphas.insert(layer.to_string(), alpha);
            } else {
                debug!("Ignoring tensor {}", name);
            }
        }

        let mut weights = Self::empty();
        for (name, (down_shape, down)) in downs {
            let (up_shape, up) = ups
                .remove(&name)
                .ok_or_else(|| LoraError::Decode(format!("{name}: missing lora_up weight")))?;

            let rank = down_shape.first().copied().unwrap_or(0);
            if rank == 0 {
                return Err(LoraError::Decode(format!("{name}: zero rank")));
            }
            let in_dim = down.len() / rank;
            let out_dim = up_shape.first().copied().unwrap_or(0);
            if up.len() != out_dim * rank {
                return Err(LoraError::Shape {
                    layer: name,
                    expected: out_dim * rank,
                    actual: up.len(),
                });
            }

            let alpha = alphas.get(&name).copied();
            weights.add_layer(
                name,
                LoraLayer {
                    down,
                    up,
                    rank,
                    in_dim,
                    out_dim,
                    alpha,
                },
            );
        }

        if let Some(name) = ups.keys().next() {
            return Err(LoraError::Decode(format!("{name}: missing lora_down weight")));
        }

        Ok(weights)
    }

    /// Add a layer
    pub fn add_layer(&mut self, name: impl Into<String>, layer: LoraLayer) {
        self.layers.insert(name.into(), layer);
    }

    /// Get a layer by name
    pub fn get_layer(&self, name: &str) -> Option<&LoraLayer> {
        self.layers.get(name)
    }

    /// Layers patching one target
    pub fn layers_for(&self, target: AdapterTarget) -> impl Iterator<Item = (&str, &LoraLayer)> {
        self.layers
            .iter()
            .filter(move |(name, _)| AdapterTarget::of_layer(name) == target)
            .map(|(name, layer)| (name.as_str(), layer))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Estimate memory usage
    pub fn memory_size(&self) -> usize {
        self.layers.values().map(LoraLayer::memory_size).sum()
    }
}

fn decode(name: &str, view: &TensorView<'_>) -> Result<Vec<f32>> {
    let data = view.data();
    let values = match view.dtype() {
        Dtype::F32 => data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::F16 => data
            .chunks_exact(2)
            .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect(),
        Dtype::BF16 => data
            .chunks_exact(2)
            .map(|c| bf16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect(),
        other => {
            return Err(LoraError::Decode(format!(
                "{name}: unsupported dtype {other:?}"
            )));
        }
    };
    Ok(values)
}

/// Something an adapter can be composed onto
pub trait PatchTarget {
    /// Fail if `apply_patch` with the same layers would fail; changes nothing
    fn check_patch(&self, weights: &AdapterWeights, target: AdapterTarget) -> Result<()>;

    /// Add the `target` layers of `weights` at `strength`; returns the
    /// number of layers patched
    fn apply_patch(
        &mut self,
        weights: &AdapterWeights,
        target: AdapterTarget,
        strength: f32,
    ) -> Result<usize>;
}

/// Named row-major weight matrices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightSet {
    matrices: BTreeMap<String, Vec<f32>>,
    patches: usize,
}

impl WeightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a matrix
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f32>) {
        self.matrices.insert(name.into(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.matrices.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Layer patches applied so far
    pub fn patch_count(&self) -> usize {
        self.patches
    }
}

impl PatchTarget for WeightSet {
    fn check_patch(&self, weights: &AdapterWeights, target: AdapterTarget) -> Result<()> {
        for (name, layer) in weights.layers_for(target) {
            if let Some(base) = self.matrices.get(name) {
                if base.len() != layer.target_len() {
                    return Err(LoraError::Shape {
                        layer: name.to_string(),
                        expected: layer.target_len(),
                        actual: base.len(),
                    });
                }
            }
        }
        Ok(())
    }

    fn apply_patch(
        &mut self,
        weights: &AdapterWeights,
        target: AdapterTarget,
        strength: f32,
    ) -> Result<usize> {
        // all shapes are checked before any matrix changes
        self.check_patch(weights, target)?;

        let mut patched = 0;
        for (name, layer) in weights.layers_for(target) {
            if let Some(base) = self.matrices.get_mut(name) {
                layer.apply_to_weights(base, strength)?;
                patched += 1;
            }
        }
        self.patches += patched;
        Ok(patched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn f16_bytes(values: &[f32]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| f16::from_f32(*v).to_le_bytes())
            .collect()
    }

    fn serialize(tensors: &[(&str, Dtype, Vec<usize>, Vec<u8>)]) -> Vec<u8> {
        let views: Vec<(&str, TensorView<'_>)> = tensors
            .iter()
            .map(|(name, dtype, shape, data)| {
                (*name, TensorView::new(*dtype, shape.clone(), data).unwrap())
            })
            .collect();
        safetensors::serialize(views.iter().map(|(n, v)| (*n, v)), &None).unwrap()
    }

    #[test]
    fn test_lora_layer() {
        let mut layer = LoraLayer::new(4, 4, 2);

        // down: 2x4, up: 4x2
        layer.down = vec![1.0; 8];
        layer.up = vec![0.5; 8];

        let mut base = vec![0.0; 16];
        layer.apply_to_weights(&mut base, 1.0).unwrap();

        // Each output should be 2 * 1.0 * 0.5 = 1.0
        assert!((base[0] - 1.0).abs() < 0.001);
        assert!(base.iter().all(|v| (v - 1.0).abs() < 0.001));
    }

    #[test]
    fn test_alpha_scaling() {
        let mut layer = LoraLayer::new(2, 2, 2);
        layer.down = vec![1.0; 4];
        layer.up = vec![1.0; 4];
        layer.alpha = Some(1.0);

        let mut base = vec![0.0; 4];
        layer.apply_to_weights(&mut base, 0.5).unwrap();

        // 0.5 * (1/2) * 2
        assert!((base[3] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_shape_mismatch() {
        let layer = LoraLayer::new(4, 4, 2);
        let mut base = vec![0.0; 15];
        assert!(matches!(
            layer.apply_to_weights(&mut base, 1.0),
            Err(LoraError::Shape {
                expected: 16,
                actual: 15,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_safetensors() {
        let bytes = serialize(&[
            (
                "lora_unet_mid.lora_down.weight",
                Dtype::F32,
                vec![1, 3],
                f32_bytes(&[1.0, 2.0, 3.0]),
            ),
            (
                "lora_unet_mid.lora_up.weight",
                Dtype::F16,
                vec![2, 1],
                f16_bytes(&[0.5, -1.0]),
            ),
            ("lora_unet_mid.alpha", Dtype::F32, vec![1], f32_bytes(&[1.0])),
            (
                "lora_te1_attn.lora_down.weight",
                Dtype::F32,
                vec![1, 2],
                f32_bytes(&[1.0, 1.0]),
            ),
            (
                "lora_te1_attn.lora_up.weight",
                Dtype::F32,
                vec![2, 1],
                f32_bytes(&[1.0, 1.0]),
            ),
        ]);

        let weights = AdapterWeights::from_safetensors(&bytes).unwrap();
        assert_eq!(weights.len(), 2);

        let mid = weights.get_layer("lora_unet_mid").unwrap();
        assert_eq!((mid.rank, mid.in_dim, mid.out_dim), (1, 3, 2));
        assert_eq!(mid.up, vec![0.5, -1.0]);
        assert_eq!(mid.alpha, Some(1.0));

        let model: Vec<_> = weights.layers_for(AdapterTarget::Model).map(|(n, _)| n).collect();
        let clip: Vec<_> = weights.layers_for(AdapterTarget::Clip).map(|(n, _)| n).collect();
        assert_eq!(model, vec!["lora_unet_mid"]);
        assert_eq!(clip, vec!["lora_te1_attn"]);
    }

    #[test]
    fn test_decode_rejects_half_pairs() {
        let bytes = serialize(&[(
            "lora_unet_mid.lora_up.weight",
            Dtype::F32,
            vec![2, 1],
            f32_bytes(&[1.0, 1.0]),
        )]);
        assert!(matches!(
            AdapterWeights::from_safetensors(&bytes),
            Err(LoraError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            AdapterWeights::from_safetensors(b"not a safetensors file"),
            Err(LoraError::Decode(_))
        ));
    }

    #[test]
    fn test_weight_set_patch() {
        let mut layer = LoraLayer::new(2, 2, 1);
        layer.down = vec![1.0, 0.0];
        layer.up = vec![1.0, 1.0];
        let mut weights = AdapterWeights::empty();
        weights.add_layer("lora_unet_a", layer.clone());
        weights.add_layer("lora_te_b", layer);

        let mut model = WeightSet::new();
        model.insert("lora_unet_a", vec![0.0; 4]);
        model.insert("other", vec![7.0; 4]);

        let patched = model
            .apply_patch(&weights, AdapterTarget::Model, 2.0)
            .unwrap();
        assert_eq!(patched, 1);
        assert_eq!(model.get("lora_unet_a").unwrap(), &[2.0, 0.0, 2.0, 0.0]);
        assert_eq!(model.get("other").unwrap(), &[7.0; 4]);
        assert_eq!(model.patch_count(), 1);
    }

    #[test]
    fn test_weight_set_patch_is_all_or_nothing() {
        let mut weights = AdapterWeights::empty();
        weights.add_layer("lora_unet_a", LoraLayer::new(2, 2, 1));
        weights.add_layer("lora_unet_b", LoraLayer::new(2, 2, 1));

        let mut model = WeightSet::new();
        model.insert("lora_unet_a", vec![1.0; 4]);
        model.insert("lora_unet_b", vec![1.0; 3]);
        let before = model.clone();

        assert!(model.apply_patch(&weights, AdapterTarget::Model, 1.0).is_err());
        assert_eq!(model, before);
    }
}
