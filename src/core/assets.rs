/// Sprite assets with explicit, load-once readiness.
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::sprite::{Sprite, SpriteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetId {
    Background,
    Car,
    Palm,
    Wave,
}

impl AssetId {
    pub const ALL: [AssetId; 4] = [
        AssetId::Background,
        AssetId::Car,
        AssetId::Palm,
        AssetId::Wave,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            AssetId::Background => "background.sprite",
            AssetId::Car => "car.sprite",
            AssetId::Palm => "palm.sprite",
            AssetId::Wave => "wave.sprite",
        }
    }

    fn embedded(self) -> &'static str {
        match self {
            AssetId::Background => include_str!("../../assets/background.sprite"),
            AssetId::Car => include_str!("../../assets/car.sprite"),
            AssetId::Palm => include_str!("../../assets/palm.sprite"),
            AssetId::Wave => include_str!("../../assets/wave.sprite"),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default)]
pub enum AssetState {
    #[default]
    Loading,
    Ready(Arc<Sprite>),
    Failed,
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Decode(#[from] SpriteError),
    #[error("decoder task failed: {0}")]
    Join(String),
}

/// Completion message sent by a loader task.
#[derive(Debug)]
pub struct AssetLoaded {
    pub id: AssetId,
    pub result: Result<Sprite, AssetError>,
}

#[derive(Debug, Clone, Default)]
pub struct Assets {
    states: [AssetState; 4],
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: AssetId) -> &AssetState {
        &self.states[id.index()]
    }

    pub fn sprite(&self, id: AssetId) -> Option<&Arc<Sprite>> {
        match self.state(id) {
            AssetState::Ready(sprite) => Some(sprite),
            _ => None,
        }
    }

    pub fn is_ready(&self, id: AssetId) -> bool {
        self.sprite(id).is_some()
    }

    /// Applies a loader result. Only the first completion for an asset counts;
    /// returns whether this one did.
    pub fn complete(&mut self, loaded: AssetLoaded) -> bool {
        let slot = &mut self.states[loaded.id.index()];
        if !matches!(slot, AssetState::Loading) {
            debug!(asset = ?loaded.id, "ignoring repeated asset completion");
            return false;
        }
        *slot = match loaded.result {
            Ok(sprite) => {
                debug!(asset = ?loaded.id, width = sprite.width(), height = sprite.height(), "asset ready");
                AssetState::Ready(Arc::new(sprite))
            }
            Err(e) => {
                warn!(asset = ?loaded.id, error = %e, "asset failed to load, using fallback shape");
                AssetState::Failed
            }
        };
        true
    }
}

/// Starts one loader per asset. Each sends exactly one [`AssetLoaded`].
pub fn spawn_loaders(
    asset_dir: Option<PathBuf>,
    tx: mpsc::UnboundedSender<AssetLoaded>,
) -> Vec<JoinHandle<()>> {
    AssetId::ALL
        .into_iter()
        .map(|id| {
            let dir = asset_dir.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = load(id, dir.as_deref()).await;
                // Receiver gone means the client is shutting down.
                let _ = tx.send(AssetLoaded { id, result });
            })
        })
        .collect()
}

async fn load(id: AssetId, dir: Option<&Path>) -> Result<Sprite, AssetError> {
    let source = match dir {
        Some(dir) => {
            let path = dir.join(id.file_name());
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) if e.kind() == io::ErrorKind::NotFound => id.embedded().to_owned(),
                Err(source) => return Err(AssetError::Read { path, source }),
            }
        }
        None => id.embedded().to_owned(),
    };

    tokio::task::spawn_blocking(move || Sprite::parse(&source))
        .await
        .map_err(|e| AssetError::Join(e.to_string()))?
        .map_err(AssetError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> Sprite {
        Sprite::parse("size 1 1\ncolor r #ff0000\npixels\nr\n").unwrap()
    }

    #[test]
    fn starts_loading() {
        let assets = Assets::new();
        for id in AssetId::ALL {
            assert!(matches!(assets.state(id), AssetState::Loading));
        }
    }

    #[test]
    fn state_is_set_once() {
        let mut assets = Assets::new();
        assert!(assets.complete(AssetLoaded {
            id: AssetId::Car,
            result: Err(AssetError::Join("boom".into())),
        }));
        assert!(!assets.complete(AssetLoaded {
            id: AssetId::Car,
            result: Ok(tiny()),
        }));
        assert!(matches!(assets.state(AssetId::Car), AssetState::Failed));
        assert!(!assets.is_ready(AssetId::Car));
    }

    #[test]
    fn embedded_sprites_decode() {
        for id in AssetId::ALL {
            let sprite = Sprite::parse(id.embedded());
            assert!(sprite.is_ok(), "{:?}: {:?}", id, sprite.err());
        }
    }

    #[tokio::test]
    async fn loaders_report_every_asset() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_loaders(None, tx);
        let mut assets = Assets::new();
        for _ in AssetId::ALL {
            let loaded = rx.recv().await.expect("completion");
            assets.complete(loaded);
        }
        assert!(AssetId::ALL.iter().all(|id| assets.is_ready(*id)));
    }

    #[tokio::test]
    async fn missing_override_falls_back_to_embedded() {
        let dir = std::env::temp_dir().join("beach-rally-no-such-asset-dir");
        let sprite = load(AssetId::Wave, Some(&dir)).await.expect("embedded fallback");
        assert!(sprite.width() > 0);
    }

    #[tokio::test]
    async fn broken_override_marks_failed() {
        let dir = std::env::temp_dir().join(format!("beach-rally-assets-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(AssetId::Palm.file_name()), "size 2 2\npixels\n..\n")
            .await
            .unwrap();
        let result = load(AssetId::Palm, Some(&dir)).await;
        assert!(matches!(result, Err(AssetError::Decode(SpriteError::RowCount { .. }))));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
