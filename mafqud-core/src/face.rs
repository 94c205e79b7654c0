use crate::cache::EmbeddingCache;
use crate::report::{ImageRef, Report};
use ndarray::Array1;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Face feature vector produced by the external provider
pub type Embedding = Array1<f32>;

#[derive(Debug, Error)]
pub enum FaceError {
    #[error("Face API timed out")]
    Timeout,
    #[error("No face detected in image")]
    NoFace,
    #[error("Face provider error: {0}")]
    Provider(String),
}

/// Raw comparison result from the external provider: a distance between two
/// embeddings and the provider's own match threshold for that metric.
#[derive(Debug, Clone, Copy)]
pub struct FaceComparison {
    pub distance: f32,
    pub threshold: f32,
}

/// External biometric comparison capability. Implementations must honor the
/// timeout passed to `embed`; blowing it is reported as `FaceError::Timeout`.
pub trait FaceProvider: Send + Sync {
    fn embed(&self, image: &ImageRef, timeout: Duration) -> Result<Embedding, FaceError>;
    fn compare(&self, a: &Embedding, b: &Embedding) -> Result<FaceComparison, FaceError>;
}

/// Map the provider's distance/threshold metric into a 0-100 band
pub fn band_score(comparison: &FaceComparison) -> u8 {
    let FaceComparison { distance, threshold } = *comparison;
    if distance <= 0.5 * threshold {
        100
    } else if distance <= threshold {
        80
    } else if distance <= 1.5 * threshold {
        50
    } else {
        20
    }
}

/// Computes a best-of similarity score across two reports' photo sets,
/// caching embeddings so each image is embedded at most once.
pub struct FaceResolver {
    provider: Arc<dyn FaceProvider>,
    cache: Arc<EmbeddingCache>,
}

impl FaceResolver {
    pub fn new(provider: Arc<dyn FaceProvider>, cache: Arc<EmbeddingCache>) -> Self {
        Self { provider, cache }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Best face similarity between the two reports' photo sets, or `None`
    /// when no image pair could be compared.
    ///
    /// A timeout, comparison failure, or undetected face excludes that pair
    /// from aggregation rather than scoring it zero. Stops early once a pair
    /// hits the top band, since no later pair can beat it.
    pub fn compare_reports(&self, a: &Report, b: &Report, timeout: Duration) -> Option<u8> {
        if a.images.is_empty() || b.images.is_empty() {
            return None;
        }

        let mut best: Option<u8> = None;

        for image_a in &a.images {
            let embedding_a = match self.embedding_for(a, image_a, timeout) {
                Some(e) => e,
                None => continue,
            };

            for image_b in &b.images {
                let embedding_b = match self.embedding_for(b, image_b, timeout) {
                    Some(e) => e,
                    None => continue,
                };

                let comparison = match self.provider.compare(&embedding_a, &embedding_b) {
                    Ok(c) => c,
                    Err(e) => {
                        log::debug!(
                            "Face comparison failed for {} / {}: {}",
                            image_a,
                            image_b,
                            e
                        );
                        continue;
                    }
                };

                let score = band_score(&comparison);
                log::debug!(
                    "Face pair {} / {}: distance {:.3} (threshold {:.3}) -> {}",
                    image_a,
                    image_b,
                    comparison.distance,
                    comparison.threshold,
                    score
                );

                if best.map_or(true, |b| score > b) {
                    best = Some(score);
                }
                if best == Some(100) {
                    return best;
                }
            }
        }

        best
    }

    /// Cached embedding for one image, computing it on first use. An image
    /// that cannot be embedded (timeout, no face) yields `None` and is
    /// skipped by the caller.
    fn embedding_for(
        &self,
        report: &Report,
        image: &ImageRef,
        timeout: Duration,
    ) -> Option<Embedding> {
        if let Some(hit) = self.cache.get(report.id, image) {
            return Some(hit);
        }

        match self.provider.embed(image, timeout) {
            Ok(embedding) => {
                self.cache.insert(report.id, image.clone(), embedding.clone());
                Some(embedding)
            }
            Err(FaceError::NoFace) => {
                log::debug!("No face detected in {} of report {}", image, report.id);
                None
            }
            Err(e) => {
                log::warn!("Embedding failed for {} of report {}: {}", image, report.id, e);
                None
            }
        }
    }
}
