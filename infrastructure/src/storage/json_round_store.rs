//! File-based [`RoundStore`]: one pretty-printed JSON document per round.
//!
//! Every save replaces `{data_dir}/{round_id}.json` with the cumulative
//! round via a temp file and rename, so readers never see a torn write.

use async_trait::async_trait;
use council_application::{RoundStore, StoreError};
use council_domain::DeliberationRound;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct LocalRoundStore {
    data_dir: PathBuf,
}

impl LocalRoundStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn round_path(&self, round_id: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_id(round_id) {
            return Err(StoreError::InvalidRoundId(round_id.to_string()));
        }
        Ok(self.data_dir.join(format!("{round_id}.json")))
    }
}

/// Round ids become file names; keep them to a conservative character set.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[async_trait]
impl RoundStore for LocalRoundStore {
    async fn save(&self, round: &DeliberationRound) -> Result<(), StoreError> {
        let path = self.round_path(&round.round_id)?;
        let content = serde_json::to_string_pretty(round)?;

        tokio::fs::create_dir_all(&self.data_dir).await?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!(round_id = %round.round_id, state = round.state.as_str(), path = %path.display(), "Round saved");
        Ok(())
    }

    async fn load(&self, round_id: &str) -> Result<Option<DeliberationRound>, StoreError> {
        let path = self.round_path(round_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}
