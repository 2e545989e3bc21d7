// Nearest-neighbour identification over stored identity vectors


use pgvector::Vector;
use serde::Serialize;
use tracing::{debug, info};

use crate::auth::Session;
use crate::config::MatcherConfig;
use crate::database::{MatchCandidate, PersonKind, VectorQueries};
use crate::{RegistryError, Result};

/// Result of comparing a probe against one population
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Match { hn: String, distance: f64 },
    /// The nearest owner was farther than the configured maximum distance
    NoMatch { nearest: MatchCandidate },
    /// No active owner has an active vector
    Empty,
}

impl MatchOutcome {
    #[inline]
    pub fn matched_hn(&self) -> Option<&str> {
        match self {
            MatchOutcome::Match { hn, .. } => Some(hn),
            MatchOutcome::NoMatch { .. } | MatchOutcome::Empty => None,
        }
    }
}

/// Outcome of identifying a probe across both populations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identification {
    /// Population of the nearest owner, when there was one
    pub kind: Option<PersonKind>,
    #[serde(flatten)]
    pub outcome: MatchOutcome,
}

#[derive(Debug, Clone)]
pub struct IdentityMatcher {
    dimension: usize,
    max_distance: Option<f64>,
}

impl IdentityMatcher {
    #[inline]
    pub fn new(dimension: usize, max_distance: Option<f64>) -> Self {
        Self {
            dimension,
            max_distance,
        }
    }

    #[inline]
    pub fn from_config(config: &MatcherConfig) -> Self {
        Self::new(config.embedding_dimension as usize, config.max_distance)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn max_distance(&self) -> Option<f64> {
        self.max_distance
    }

    /// Reject probes that cannot be compared by cosine distance
    #[inline]
    pub fn validate_embedding(&self, embedding: &[f32]) -> Result<()> {
        validate_embedding(embedding, self.dimension)
    }

    /// Apply the distance threshold to the nearest candidate
    #[inline]
    pub fn evaluate(&self, nearest: Option<MatchCandidate>) -> MatchOutcome {
        match nearest {
            None => MatchOutcome::Empty,
            Some(candidate) => match self.max_distance {
                Some(max) if candidate.distance > max => MatchOutcome::NoMatch { nearest: candidate },
                _ => MatchOutcome::Match {
                    hn: candidate.hn,
                    distance: candidate.distance,
                },
            },
        }
    }

    /// Nearest active owner in one population
    #[inline]
    pub async fn find_closest(
        &self,
        session: &Session,
        kind: PersonKind,
        probe: &[f32],
    ) -> Result<MatchOutcome> {
        self.validate_embedding(probe)?;
        session.require_operator().await?;

        let nearest = {
            let mut active = session.connections().acquire().await?;
            VectorQueries::find_closest(active.conn(), kind, Vector::from(probe.to_vec())).await?
        };

        debug!("Nearest {} candidate: {:?}", kind, nearest);
        let outcome = self.evaluate(nearest);
        info!("Identification against {} population: {:?}", kind, outcome);
        Ok(outcome)
    }

    /// Nearest active owner across children and parents.
    ///
    /// On equal distance the child wins.
    #[inline]
    pub async fn identify(&self, session: &Session, probe: &[f32]) -> Result<Identification> {
        self.validate_embedding(probe)?;
        session.require_operator().await?;

        let (child, parent) = {
            let mut active = session.connections().acquire().await?;
            let child = VectorQueries::find_closest(
                active.conn(),
                PersonKind::Child,
                Vector::from(probe.to_vec()),
            )
            .await?;
            let parent = VectorQueries::find_closest(
                active.conn(),
                PersonKind::Parent,
                Vector::from(probe.to_vec()),
            )
            .await?;
            (child, parent)
        };

        let best = match (child, parent) {
            (Some(c), Some(p)) if p.distance < c.distance => Some((PersonKind::Parent, p)),
            (Some(c), _) => Some((PersonKind::Child, c)),
            (None, Some(p)) => Some((PersonKind::Parent, p)),
            (None, None) => None,
        };

        let identification = match best {
            Some((kind, candidate)) => Identification {
                kind: Some(kind),
                outcome: self.evaluate(Some(candidate)),
            },
            None => Identification {
                kind: None,
                outcome: MatchOutcome::Empty,
            },
        };

        info!("Identification result: {:?}", identification);
        Ok(identification)
    }
}

/// Check an embedding has the expected dimension, finite components and a non-zero norm
#[inline]
pub fn validate_embedding(embedding: &[f32], dimension: usize) -> Result<()> {
    if embedding.is_empty() {
        return Err(RegistryError::Validation("Embedding must not be empty".into()));
    }
    if embedding.len() != dimension {
        return Err(RegistryError::Validation(format!(
            "Embedding has {} components, expected {}",
            embedding.len(),
            dimension
        )));
    }
    if let Some(position) = embedding.iter().position(|v| !v.is_finite()) {
        return Err(RegistryError::Validation(format!(
            "Embedding component {} is not a finite number",
            position
        )));
    }
    if embedding.iter().all(|v| *v == 0.0) {
        return Err(RegistryError::Validation(
            "Embedding must not be the zero vector".into(),
        ));
    }
    Ok(())
}
