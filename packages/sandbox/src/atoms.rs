// ABOUTME: Atom catalog for building, deleting and listing prebuilt sandbox images
// ABOUTME: Maps atom names onto prefixed, labelled engine images

use crate::error::Result;
use crate::providers::{ContainerEngine, ImageSummary};
use gravelbox_config::GravelConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// An atom image known to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    /// Repository with the image prefix stripped, e.g. `python` for `atom-python`
    pub name: String,
    pub repository: String,
    pub tag: String,
    pub image_id: String,
    pub created: String,
    pub size: String,
}

impl Atom {
    fn from_summary(summary: ImageSummary, prefix: &str) -> Self {
        let name = summary
            .repository
            .strip_prefix(prefix)
            .unwrap_or(&summary.repository)
            .to_string();
        Self {
            name,
            repository: summary.repository,
            tag: summary.tag,
            image_id: summary.image_id,
            created: summary.created,
            size: summary.size,
        }
    }
}

#[derive(Clone)]
pub struct AtomCatalog {
    engine: Arc<dyn ContainerEngine>,
    atom_path: PathBuf,
    image_prefix: String,
    image_label: String,
}

impl AtomCatalog {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: &GravelConfig) -> Self {
        Self {
            engine,
            atom_path: config.atom_path.clone(),
            image_prefix: config.image_prefix.clone(),
            image_label: config.image_label.clone(),
        }
    }

    pub fn image_for(&self, name: &str) -> String {
        format!("{}{}", self.image_prefix, name)
    }

    /// Build the atom image from the configured build context; returns the build log
    pub async fn build(&self, name: &str) -> Result<String> {
        let tag = self.image_for(name);
        let labels = split_label(&self.image_label).into_iter().collect::<Vec<_>>();

        let log = self
            .engine
            .build_image(&tag, &self.atom_path, &labels)
            .await?;
        info!("Built atom {} as {}", name, tag);
        Ok(log)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.engine.remove_image(&self.image_for(name)).await?;
        info!("Deleted atom {}", name);
        Ok(())
    }

    /// Atom images carrying the catalog label
    pub async fn list(&self) -> Result<Vec<Atom>> {
        let images = self.engine.list_images(Some(&self.image_label)).await?;
        debug!("Found {} atom images", images.len());
        Ok(images
            .into_iter()
            .map(|summary| Atom::from_summary(summary, &self.image_prefix))
            .collect())
    }

    /// Whether the atom's image is present. Unlabelled images count too.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let image = self.image_for(name);
        let images = self.engine.list_images(None).await?;
        Ok(images.iter().any(|summary| summary.repository == image))
    }
}

/// `key=value` labels become a pair; a bare key gets an empty value
fn split_label(label: &str) -> Option<(String, String)> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    Some(match label.split_once('=') {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => (label.to_string(), String::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{EngineError, RunOutcome, RunSpec};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct ImageStore {
        images: Vec<ImageSummary>,
        labelled: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    fn summary(repository: &str) -> ImageSummary {
        ImageSummary {
            repository: repository.to_string(),
            tag: "latest".to_string(),
            image_id: format!("id-{}", repository),
            created: "2024-05-01".to_string(),
            size: "10MB".to_string(),
        }
    }

    #[async_trait]
    impl ContainerEngine for ImageStore {
        async fn version(&self) -> crate::providers::Result<String> {
            Ok("Docker version 24.0.7".to_string())
        }

        async fn build_image(
            &self,
            tag: &str,
            context: &Path,
            labels: &[(String, String)],
        ) -> crate::providers::Result<String> {
            self.calls.lock().unwrap().push(format!(
                "build {} {} {:?}",
                tag,
                context.display(),
                labels
            ));
            Ok("Successfully built".to_string())
        }

        async fn remove_image(&self, tag: &str) -> crate::providers::Result<()> {
            if self.images.iter().any(|image| image.repository == tag) {
                Ok(())
            } else {
                Err(EngineError::CommandFailed {
                    message: format!("Error: No such image: {}: exit status: 1", tag),
                    exit_code: Some(1),
                    output: String::new(),
                })
            }
        }

        async fn list_images(
            &self,
            label_filter: Option<&str>,
        ) -> crate::providers::Result<Vec<ImageSummary>> {
            Ok(self
                .images
                .iter()
                .filter(|image| label_filter.is_none() || self.labelled.contains(&image.repository))
                .cloned()
                .collect())
        }

        async fn run_container(
            &self,
            _spec: &RunSpec,
            _deadline: Duration,
        ) -> crate::providers::Result<RunOutcome> {
            unreachable!("catalog never runs containers")
        }

        async fn force_remove(&self, _name: &str) -> crate::providers::Result<()> {
            Ok(())
        }
    }

    fn catalog(store: ImageStore) -> (Arc<ImageStore>, AtomCatalog) {
        let store = Arc::new(store);
        let config = GravelConfig {
            atom_path: PathBuf::from("/srv/atom"),
            ..GravelConfig::default()
        };
        (store.clone(), AtomCatalog::new(store, &config))
    }

    #[tokio::test]
    async fn test_build_uses_prefix_and_label() {
        let (store, catalog) = catalog(ImageStore::default());

        let log = catalog.build("python").await.unwrap();

        assert_eq!(log, "Successfully built");
        assert_eq!(
            store.calls.lock().unwrap().as_slice(),
            [r#"build atom-python /srv/atom [("source", "gravelbox")]"#]
        );
    }

    #[tokio::test]
    async fn test_list_strips_prefix_and_filters_by_label() {
        let (_, catalog) = catalog(ImageStore {
            images: vec![summary("atom-python"), summary("atom-node"), summary("redis")],
            labelled: vec!["atom-python".to_string(), "atom-node".to_string()],
            ..ImageStore::default()
        });

        let names: Vec<String> = catalog
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|atom| atom.name)
            .collect();

        assert_eq!(names, vec!["python", "node"]);
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let (_, catalog) = catalog(ImageStore {
            images: vec![summary("atom-python")],
            ..ImageStore::default()
        });

        assert!(catalog.exists("python").await.unwrap());
        assert!(!catalog.exists("ruby").await.unwrap());
        assert!(catalog.delete("python").await.is_ok());

        let error = catalog.delete("ruby").await.unwrap_err();
        assert!(error.to_string().contains("No such image"), "{}", error);
    }

    #[test]
    fn test_split_label() {
        assert_eq!(
            split_label("source=gravelbox"),
            Some(("source".to_string(), "gravelbox".to_string()))
        );
        assert_eq!(split_label("managed"), Some(("managed".to_string(), String::new())));
        assert_eq!(split_label(" "), None);
    }
}
