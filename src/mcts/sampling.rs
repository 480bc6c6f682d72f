//! Move selection after the simulation budget: weighted sampling with
//! Dirichlet exploration noise early in the game, argmax afterwards.

use log::warn;
use rand::prelude::*;
use rand_distr::{Distribution, Gamma};

use crate::{Result, SelfPlayError};

/// Samples an index proportionally to `weights`.
///
/// Non-positive and non-finite weights are never chosen. If no weight is
/// positive, falls back to a uniform choice over `legal` (over every slot
/// when `legal` is `None`).
///
/// # Errors
/// `NoLegalActions` if there is nothing at all to choose from.
pub fn weighted_action(
    weights: &[f32],
    legal: Option<&[usize]>,
    rng: &mut StdRng,
) -> Result<usize> {
    let usable = |w: f32| w.is_finite() && w > 0.0;
    let total: f32 = weights.iter().copied().filter(|&w| usable(w)).sum();

    if total > 0.0 {
        let target = rng.random_range(0.0..total);
        let mut cumulative = 0.0;
        let mut last_positive = 0;
        for (i, &w) in weights.iter().enumerate() {
            if !usable(w) {
                continue;
            }
            cumulative += w;
            last_positive = i;
            if target < cumulative {
                return Ok(i);
            }
        }
        // Rounding left `target` just past the final bucket
        return Ok(last_positive);
    }

    warn!("all sampling weights are zero, falling back to a uniform choice");
    match legal {
        Some(actions) if !actions.is_empty() => Ok(actions[rng.random_range(0..actions.len())]),
        None if !weights.is_empty() => Ok(rng.random_range(0..weights.len())),
        _ => Err(SelfPlayError::NoLegalActions),
    }
}

/// Index of the largest weight, first one wins on ties
pub fn max_action(weights: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &w) in weights.iter().enumerate() {
        match best {
            Some((_, best_w)) if w <= best_w => {}
            _ => best = Some((i, w)),
        }
    }
    best.map(|(i, _)| i)
}

/// Draws a symmetric Dirichlet(alpha) sample of size `len` from Gamma draws.
pub fn dirichlet_noise(alpha: f32, len: usize, rng: &mut StdRng) -> Result<Vec<f32>> {
    let gamma = Gamma::new(alpha, 1.0)
        .map_err(|e| SelfPlayError::InvalidConfig(format!("dirichlet alpha {}: {}", alpha, e)))?;

    let mut noise: Vec<f32> = (0..len).map(|_| gamma.sample(rng)).collect();
    let sum: f32 = noise.iter().sum();
    if sum > 0.0 {
        for x in noise.iter_mut() {
            *x /= sum;
        }
    } else if len > 0 {
        // Tiny alpha can underflow every draw to zero
        noise.fill(1.0 / len as f32);
    }
    Ok(noise)
}

/// Mixes `visit_probs` with Dirichlet noise over the `legal` actions:
/// `weight × visit + (1 − weight) × noise`. Illegal slots stay at zero.
pub fn mix_noise(
    visit_probs: &[f32],
    legal: &[usize],
    alpha: f32,
    weight: f32,
    rng: &mut StdRng,
) -> Result<Vec<f32>> {
    let noise = dirichlet_noise(alpha, legal.len(), rng)?;
    let mut mixed = vec![0.0; visit_probs.len()];
    for (&action, &eta) in legal.iter().zip(noise.iter()) {
        if let Some(&visit) = visit_probs.get(action) {
            mixed[action] = weight * visit + (1.0 - weight) * eta;
        }
    }
    Ok(mixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_weighted_never_picks_zero_weight() {
        let mut rng = StdRng::seed_from_u64(7);
        let weights = [0.0, 0.3, 0.0, 0.7, 0.0];
        for _ in 0..500 {
            let a = weighted_action(&weights, None, &mut rng).unwrap();
            assert!(a == 1 || a == 3);
        }
    }

    #[test]
    fn test_weighted_all_zero_uses_legal_actions() {
        let mut rng = StdRng::seed_from_u64(11);
        let weights = [0.0; 9];
        let legal = [2, 5, 7];
        for _ in 0..100 {
            let a = weighted_action(&weights, Some(&legal), &mut rng).unwrap();
            assert!(legal.contains(&a));
        }
        let a = weighted_action(&weights, None, &mut rng).unwrap();
        assert!(a < weights.len());
    }

    #[test]
    fn test_weighted_nothing_to_choose() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_matches!(
            weighted_action(&[], None, &mut rng),
            Err(SelfPlayError::NoLegalActions)
        );
    }

    #[test]
    fn test_max_action_first_tie() {
        assert_eq!(max_action(&[0.1, 0.4, 0.4, 0.1]), Some(1));
        assert_eq!(max_action(&[]), None);
    }

    #[test]
    fn test_dirichlet_is_a_distribution() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = dirichlet_noise(0.8, 6, &mut rng).unwrap();
        assert_eq!(noise.len(), 6);
        assert!((noise.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert!(noise.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_dirichlet_rejects_bad_alpha() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_matches!(
            dirichlet_noise(-1.0, 4, &mut rng),
            Err(SelfPlayError::InvalidConfig(_))
        );
    }

    #[test]
    fn test_mix_noise_keeps_illegal_slots_empty() {
        let mut rng = StdRng::seed_from_u64(5);
        let visits = [0.0, 0.5, 0.0, 0.5];
        let mixed = mix_noise(&visits, &[1, 3], 0.8, 0.5, &mut rng).unwrap();
        assert_eq!(mixed[0], 0.0);
        assert_eq!(mixed[2], 0.0);
        assert!((mixed.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }
}
