use crate::error::{AppError, Result};
use crate::ml::{load_artifact, ModelArtifact};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Store of named, staged model artifacts
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Fetch the model registered as `name` at `stage`
    async fn fetch(&self, name: &str, stage: &str) -> Result<ModelArtifact>;

    /// Register `artifact` as `name` at `stage`, replacing any previous one
    async fn register(&self, name: &str, stage: &str, artifact: &ModelArtifact) -> Result<()>;

    /// Human-readable location, for logs
    fn location(&self) -> String;
}

/// Registry backed by a directory tree: `<root>/<name>/<stage>/model.bin`
#[derive(Debug, Clone)]
pub struct FileModelRegistry {
    root: PathBuf,
}

impl FileModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn model_path(&self, name: &str, stage: &str) -> PathBuf {
        self.root.join(name).join(stage).join("model.bin")
    }
}

#[async_trait]
impl ModelRegistry for FileModelRegistry {
    async fn fetch(&self, name: &str, stage: &str) -> Result<ModelArtifact> {
        let path = self.model_path(name, stage);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            AppError::Registry(format!(
                "Model {}/{} not found at {}: {}",
                name,
                stage,
                path.display(),
                e
            ))
        })?;

        ModelArtifact::from_bytes(&bytes)
    }

    async fn register(&self, name: &str, stage: &str, artifact: &ModelArtifact) -> Result<()> {
        let path = self.model_path(name, stage);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, artifact.to_bytes()?).await?;

        info!(model = name, stage, path = %path.display(), "Registered model");
        Ok(())
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// Registry served over HTTP at `{base_url}/models/{name}/{stage}`
#[derive(Debug, Clone)]
pub struct HttpModelRegistry {
    client: Client,
    base_url: String,
}

impl HttpModelRegistry {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn model_url(&self, name: &str, stage: &str) -> String {
        format!("{}/models/{}/{}", self.base_url, name, stage)
    }
}

#[async_trait]
impl ModelRegistry for HttpModelRegistry {
    async fn fetch(&self, name: &str, stage: &str) -> Result<ModelArtifact> {
        let bytes = self
            .client
            .get(self.model_url(name, stage))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        ModelArtifact::from_bytes(&bytes)
    }

    async fn register(&self, name: &str, stage: &str, artifact: &ModelArtifact) -> Result<()> {
        self.client
            .put(self.model_url(name, stage))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(artifact.to_bytes()?)
            .send()
            .await?
            .error_for_status()?;

        info!(model = name, stage, url = %self.base_url, "Registered model");
        Ok(())
    }

    fn location(&self) -> String {
        self.base_url.clone()
    }
}

/// Where the serving model came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSource {
    Registry { name: String, stage: String },
    File { path: PathBuf },
}

impl ModelSource {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ModelSource::Registry { .. } => "registry",
            ModelSource::File { .. } => "file",
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Registry { name, stage } => write!(f, "registry:{}/{}", name, stage),
            ModelSource::File { path } => write!(f, "file:{}", path.display()),
        }
    }
}

/// Result of the registry-then-file model load
#[derive(Debug)]
pub enum ModelLoadOutcome {
    FromRegistry {
        artifact: ModelArtifact,
        source: ModelSource,
    },
    FromFile {
        artifact: ModelArtifact,
        source: ModelSource,
        /// Why the registry was not used; `None` if no registry is configured
        registry_error: Option<AppError>,
    },
    Unavailable {
        registry_error: Option<AppError>,
        file_error: AppError,
    },
}

impl ModelLoadOutcome {
    pub fn is_available(&self) -> bool {
        !matches!(self, ModelLoadOutcome::Unavailable { .. })
    }
}

/// Try `registry` first, then the local artifact at `local_path`.
///
/// Never fails; the caller decides whether `Unavailable` is fatal.
pub async fn load_model(
    registry: Option<&dyn ModelRegistry>,
    name: &str,
    stage: &str,
    local_path: &Path,
) -> ModelLoadOutcome {
    let registry_error = match registry {
        Some(registry) => match registry.fetch(name, stage).await {
            Ok(artifact) => {
                info!(
                    model = name,
                    stage,
                    registry = %registry.location(),
                    "Loaded model from registry"
                );
                return ModelLoadOutcome::FromRegistry {
                    artifact,
                    source: ModelSource::Registry {
                        name: name.to_string(),
                        stage: stage.to_string(),
                    },
                };
            }
            Err(e) => {
                warn!(
                    model = name,
                    stage,
                    registry = %registry.location(),
                    error = %e,
                    "Registry unavailable, falling back to local model file"
                );
                Some(e)
            }
        },
        None => None,
    };

    match load_artifact::<ModelArtifact>(local_path) {
        Ok(artifact) => {
            info!(path = %local_path.display(), "Loaded model from local file");
            ModelLoadOutcome::FromFile {
                artifact,
                source: ModelSource::File {
                    path: local_path.to_path_buf(),
                },
                registry_error,
            }
        }
        Err(file_error) => ModelLoadOutcome::Unavailable {
            registry_error,
            file_error,
        },
    }
}
