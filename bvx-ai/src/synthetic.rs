//! Synthetic demo model
//!
//! Builds a placeholder artifact from generated feature rows so a serving
//! process can be exercised before any labeled recordings exist. The rows
//! only caricature the two classes; the resulting model is not meant for
//! real audio.

use crate::error::{DetectError, Result};
use crate::features::{FeatureLayout, N_MFCC};
use crate::model::{ForestConfig, ModelArtifact, Normalizer, RandomForest};
use crate::types::Label;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use tracing::info;

/// Rows in the demo design matrix
pub const DEMO_SAMPLES: usize = 200;

/// Standard normal draw (Box-Muller)
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn column(layout: &FeatureLayout, name: &str) -> Result<usize> {
    layout
        .index_of(name)
        .ok_or_else(|| DetectError::Configuration(format!("Layout has no '{}' column", name)))
}

/// Generated design matrix, half AI and half human, shuffled
///
/// Every cell starts as a standard normal draw. AI rows get narrower
/// cepstral spreads (x0.5), flatter pitch variance (x0.3) and higher HNR
/// (+2); human rows get wider cepstral spreads (x1.5), livelier pitch
/// variance (x2) and wider ZCR spread (x1.5).
pub fn demo_design_matrix(n_samples: usize, seed: u64) -> Result<(Vec<Vec<f64>>, Vec<Label>)> {
    let layout = FeatureLayout::current();
    let spread = N_MFCC..2 * N_MFCC;
    let pitch_variance = column(&layout, "pitch_variance")?;
    let hnr = column(&layout, "hnr")?;
    let zcr_std = column(&layout, "zcr_std")?;

    let mut rng = StdRng::seed_from_u64(seed);
    let half = n_samples / 2;
    let mut rows: Vec<(Vec<f64>, Label)> = Vec::with_capacity(2 * half);

    for i in 0..2 * half {
        let label = if i < half { Label::AiGenerated } else { Label::Human };
        let mut row: Vec<f64> = (0..layout.len()).map(|_| standard_normal(&mut rng)).collect();
        match label {
            Label::AiGenerated => {
                row[spread.clone()].iter_mut().for_each(|v| *v *= 0.5);
                row[pitch_variance] *= 0.3;
                row[hnr] += 2.0;
            }
            Label::Human => {
                row[spread.clone()].iter_mut().for_each(|v| *v *= 1.5);
                row[pitch_variance] *= 2.0;
                row[zcr_std] *= 1.5;
            }
        }
        rows.push((row, label));
    }

    rows.shuffle(&mut rng);
    Ok(rows.into_iter().unzip())
}

/// Demo artifact fitted on [`demo_design_matrix`] with default forest settings
pub fn demo_artifact(seed: u64) -> Result<ModelArtifact> {
    let (x, y) = demo_design_matrix(DEMO_SAMPLES, seed)?;
    let normalizer = Normalizer::fit(&x)?;
    let xn = normalizer.transform_matrix(&x)?;
    let classifier = RandomForest::fit(
        &xn,
        &y,
        ForestConfig {
            seed,
            ..ForestConfig::default()
        },
    )?;

    let correct = xn
        .iter()
        .zip(&y)
        .filter(|&(row, &label)| classifier.predict(row).ok() == Some(label))
        .count();
    info!(
        samples = x.len(),
        training_accuracy = correct as f64 / x.len() as f64,
        "Demo model fitted on synthetic data"
    );

    ModelArtifact::new(FeatureLayout::current(), normalizer, classifier)
}
