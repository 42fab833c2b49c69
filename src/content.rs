use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::GameError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub text: String,
}

impl Card {
    /// Reserved id of a blank card; its text is written by the player.
    pub const BLANK_ID: i64 = -1;

    pub fn blank() -> Self {
        Self {
            id: Self::BLANK_ID,
            text: String::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.id == Self::BLANK_ID
    }
}

/// A prompt image, served from the visual CDN by filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visual {
    pub id: i64,
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    pub top: Vec<Card>,
    pub bottom: Vec<Card>,
    pub visuals: Vec<Visual>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupKind {
    #[serde(rename = "top")]
    Top,
    #[serde(rename = "bottom")]
    Bottom,
    #[serde(rename = "visual")]
    Visual,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LookupHit {
    Card(Card),
    Visual(Visual),
}

impl ContentSnapshot {
    pub fn lookup(&self, kind: LookupKind, query: &LookupQuery) -> Option<LookupHit> {
        let find_card = |cards: &[Card]| {
            cards
                .iter()
                .find(|card| {
                    query.id.is_some_and(|id| id == card.id)
                        || query.text.as_deref().is_some_and(|text| text == card.text)
                })
                .cloned()
                .map(LookupHit::Card)
        };
        match kind {
            LookupKind::Top => find_card(&self.top),
            LookupKind::Bottom => find_card(&self.bottom),
            LookupKind::Visual => self
                .visuals
                .iter()
                .find(|visual| {
                    query.id.is_some_and(|id| id == visual.id)
                        || query
                            .filename
                            .as_deref()
                            .is_some_and(|name| name == visual.filename)
                })
                .cloned()
                .map(LookupHit::Visual),
        }
    }
}

enum ContentSource {
    File(PathBuf),
    #[cfg(test)]
    Fixed,
}

struct CacheState {
    snapshot: Option<Arc<ContentSnapshot>>,
    refreshed_at: Option<Instant>,
}

/// Refreshable cache of card text and prompt images. Rounds take a snapshot
/// once and shuffle their own copies, so refreshes never disturb a live round.
pub struct ContentCache {
    source: ContentSource,
    cooldown: Duration,
    state: RwLock<CacheState>,
}

impl ContentCache {
    pub fn from_file(path: impl Into<PathBuf>, cooldown: Duration) -> Self {
        Self {
            source: ContentSource::File(path.into()),
            cooldown,
            state: RwLock::new(CacheState {
                snapshot: None,
                refreshed_at: None,
            }),
        }
    }

    #[cfg(test)]
    pub fn fixed(snapshot: ContentSnapshot) -> Self {
        Self {
            source: ContentSource::Fixed,
            cooldown: Duration::MAX,
            state: RwLock::new(CacheState {
                snapshot: Some(Arc::new(snapshot)),
                refreshed_at: Some(Instant::now()),
            }),
        }
    }

    /// Current content, refreshed first if the cooldown has lapsed.
    pub async fn snapshot(&self) -> Result<Arc<ContentSnapshot>, GameError> {
        {
            let state = self.state.read().await;
            if let (Some(snapshot), Some(at)) = (&state.snapshot, state.refreshed_at) {
                if at.elapsed() < self.cooldown {
                    return Ok(snapshot.clone());
                }
            }
        }

        let mut state = self.state.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let (Some(snapshot), Some(at)) = (&state.snapshot, state.refreshed_at) {
            if at.elapsed() < self.cooldown {
                return Ok(snapshot.clone());
            }
        }

        match self.load().await {
            Ok(fresh) => {
                info!(
                    "Refreshed content: {} top, {} bottom, {} visuals",
                    fresh.top.len(),
                    fresh.bottom.len(),
                    fresh.visuals.len()
                );
                let fresh = Arc::new(fresh);
                state.snapshot = Some(fresh.clone());
                state.refreshed_at = Some(Instant::now());
                Ok(fresh)
            }
            Err(e) => {
                warn!("Content refresh failed: {:#}", e);
                // Retry no sooner than the cooldown either way.
                state.refreshed_at = Some(Instant::now());
                state.snapshot.clone().ok_or(GameError::ContentUnavailable)
            }
        }
    }

    pub async fn lookup(&self, kind: LookupKind, query: &LookupQuery) -> Option<LookupHit> {
        match self.snapshot().await {
            Ok(snapshot) => snapshot.lookup(kind, query),
            Err(_) => None,
        }
    }

    async fn load(&self) -> anyhow::Result<ContentSnapshot> {
        match &self.source {
            ContentSource::File(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let snapshot = serde_json::from_str(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?;
                Ok(snapshot)
            }
            #[cfg(test)]
            ContentSource::Fixed => anyhow::bail!("fixed content cannot be reloaded"),
        }
    }
}
