//! Bagged ensemble of CART trees
//!
//! Each tree is grown on a bootstrap sample with its own RNG derived from
//! `(seed, tree_index)`, so growing trees in parallel gives the same forest
//! as growing them one by one.

use super::tree::{DecisionTree, TreeParams};
use crate::error::{DetectError, Result};
use crate::features::FeatureLayout;
use crate::types::Label;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features per split; `None` means `round(sqrt(n_features))`
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 20,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: None,
            seed: 42,
        }
    }
}

impl ForestConfig {
    fn resolved_max_features(&self, n_features: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().round() as usize)
            .clamp(1, n_features.max(1))
    }
}

/// Seed of tree `index` within a forest seeded with `seed`
fn tree_seed(seed: u64, index: usize) -> u64 {
    // splitmix64 finalizer over the pair
    let mut z = seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Index of the largest vote fraction; ties go to the lower index
fn winning_class(proba: &[f64]) -> usize {
    let mut best = 0;
    for (class, &p) in proba.iter().enumerate() {
        if p > proba[best] {
            best = class;
        }
    }
    best
}

/// Fitted random forest classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
    /// Mean impurity-decrease importance per feature, summing to 1
    /// (all zero when no tree split)
    importances: Vec<f64>,
}

impl RandomForest {
    /// Fit on a normalized design matrix
    ///
    /// # Errors
    /// `DetectError::Training` on empty input, ragged rows, or a row/label
    /// count mismatch.
    pub fn fit(x: &[Vec<f64>], labels: &[Label], config: ForestConfig) -> Result<Self> {
        if x.is_empty() {
            return Err(DetectError::Training("No training samples".to_string()));
        }
        if x.len() != labels.len() {
            return Err(DetectError::Training(format!(
                "{} rows but {} labels",
                x.len(),
                labels.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(DetectError::Training(
                "Design matrix rows must share a non-zero width".to_string(),
            ));
        }
        if config.n_trees == 0 {
            return Err(DetectError::Training("Forest needs at least one tree".to_string()));
        }

        let y: Vec<usize> = labels.iter().map(|l| l.index()).collect();
        let n = x.len();
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.resolved_max_features(n_features),
            n_classes: Label::COUNT,
        };

        debug!(
            n_samples = n,
            n_features = n_features,
            n_trees = config.n_trees,
            max_features = params.max_features,
            "Growing random forest"
        );

        let grown: Vec<(DecisionTree, Vec<f64>)> = (0..config.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(tree_seed(config.seed, t));
                let mut samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, &y, &mut samples, params, &mut rng)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(grown.len());
        for (tree, tree_importances) in grown {
            let total: f64 = tree_importances.iter().sum();
            if total > 0.0 {
                for (acc, v) in importances.iter_mut().zip(&tree_importances) {
                    *acc += v / total;
                }
            }
            trees.push(tree);
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        info!(
            n_trees = trees.len(),
            mean_nodes = trees.iter().map(DecisionTree::n_nodes).sum::<usize>() / trees.len(),
            "Random forest trained"
        );

        Ok(Self {
            config,
            n_features,
            n_classes: Label::COUNT,
            trees,
            importances,
        })
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Vote fraction per class, in [`Label`] index order
    ///
    /// # Errors
    /// `DetectError::Configuration` if `row` does not have the fitted width.
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.n_features {
            return Err(DetectError::Configuration(format!(
                "Classifier expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            let class = tree.predict(row);
            if let Some(v) = votes.get_mut(class) {
                *v += 1;
            }
        }
        let n = self.trees.len().max(1) as f64;
        Ok(votes.into_iter().map(|v| v as f64 / n).collect())
    }

    /// Winning label and its vote fraction; ties go to the lower class index
    pub fn predict_with_confidence(&self, row: &[f64]) -> Result<(Label, f64)> {
        let proba = self.predict_proba(row)?;
        let best = winning_class(&proba);
        let label = Label::from_index(best).ok_or_else(|| {
            DetectError::Artifact(format!("Classifier produced unknown class {}", best))
        })?;
        Ok((label, proba[best]))
    }

    pub fn predict(&self, row: &[f64]) -> Result<Label> {
        Ok(self.predict_with_confidence(row)?.0)
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    /// The `k` most important features, descending; ties keep layout order
    pub fn ranked_importances(&self, layout: &FeatureLayout, k: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(usize, f64)> = self.importances.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(k)
            .map(|(i, v)| {
                let name = layout
                    .names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("feature_{}", i));
                (name, v)
            })
            .collect()
    }

    /// Reject deserialized forests whose structure cannot be evaluated
    pub(crate) fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(DetectError::Artifact("Classifier has no trees".to_string()));
        }
        if self.n_classes != Label::COUNT {
            return Err(DetectError::Artifact(format!(
                "Classifier has {} classes, expected {}",
                self.n_classes,
                Label::COUNT
            )));
        }
        if self.importances.len() != self.n_features {
            return Err(DetectError::Artifact(
                "Importance vector does not match feature count".to_string(),
            ));
        }
        if let Some(i) = self
            .trees
            .iter()
            .position(|t| !t.is_well_formed(self.n_features, self.n_classes))
        {
            return Err(DetectError::Artifact(format!("Tree {} is malformed", i)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well-separated blobs in 4 dimensions
    fn blobs() -> (Vec<Vec<f64>>, Vec<Label>) {
        let mut rng = StdRng::seed_from_u64(11);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..60 {
            let (label, centre) = if i % 2 == 0 {
                (Label::AiGenerated, -2.0)
            } else {
                (Label::Human, 2.0)
            };
            x.push(
                (0..4)
                    .map(|_| centre + rng.gen_range(-1.0..1.0))
                    .collect::<Vec<f64>>(),
            );
            y.push(label);
        }
        (x, y)
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_trees: 25,
            ..ForestConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ForestConfig::default();
        assert_eq!(config.n_trees, 200);
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.min_samples_split, 5);
        assert_eq!(config.min_samples_leaf, 2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.resolved_max_features(40), 6);
    }

    #[test]
    fn test_tree_seeds_distinct() {
        assert_ne!(tree_seed(42, 0), tree_seed(42, 1));
        assert_ne!(tree_seed(42, 0), tree_seed(43, 0));
        assert_eq!(tree_seed(42, 5), tree_seed(42, 5));
    }

    #[test]
    fn test_fit_separates_blobs() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, small_config()).unwrap();

        assert_eq!(forest.predict(&[-2.0; 4]).unwrap(), Label::AiGenerated);
        assert_eq!(forest.predict(&[2.0; 4]).unwrap(), Label::Human);

        let proba = forest.predict_proba(&[2.0; 4]).unwrap();
        assert_eq!(proba.len(), 2);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs();
        let a = RandomForest::fit(&x, &y, small_config()).unwrap();
        let b = RandomForest::fit(&x, &y, small_config()).unwrap();
        assert_eq!(a, b);

        let row = [0.1, -0.3, 0.2, 0.0];
        assert_eq!(a.predict_proba(&row).unwrap(), b.predict_proba(&row).unwrap());
    }

    #[test]
    fn test_importances_normalized() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, small_config()).unwrap();
        let total: f64 = forest.feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);

        let layout = FeatureLayout {
            version: 1,
            names: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        };
        let ranked = forest.ranked_importances(&layout, 2);
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].1 >= ranked[1].1);
    }

    #[test]
    fn test_wrong_width_is_configuration_error() {
        let (x, y) = blobs();
        let forest = RandomForest::fit(&x, &y, small_config()).unwrap();
        assert!(matches!(
            forest.predict_proba(&[0.0; 3]),
            Err(DetectError::Configuration(_))
        ));
    }

    #[test]
    fn test_tie_goes_to_ai_generated() {
        assert_eq!(winning_class(&[0.5, 0.5]), Label::AiGenerated.index());
        assert_eq!(winning_class(&[0.4, 0.6]), Label::Human.index());
        assert_eq!(winning_class(&[0.6, 0.4]), Label::AiGenerated.index());
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        assert!(RandomForest::fit(&[], &[], small_config()).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[], small_config()).is_err());
        assert!(RandomForest::fit(&[vec![1.0], vec![]], &[Label::Human; 2], small_config()).is_err());
    }
}
