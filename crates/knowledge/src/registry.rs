//! Datastore registry: resolves datastore ids to knowledge stores.

use ragchat_config::{AppConfig, DatastoreConfig, DatastoreKind};
use ragchat_core::error::KnowledgeError;
use ragchat_core::knowledge::KnowledgeStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::file::FileKnowledgeStore;
use crate::http::HttpKnowledgeStore;
use crate::in_memory::{Document, InMemoryKnowledgeStore};

#[derive(Default, Clone)]
pub struct DatastoreRegistry {
    stores: BTreeMap<String, Arc<dyn KnowledgeStore>>,
}

impl DatastoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every `[[datastores]]` entry.
    ///
    /// File datastores are read eagerly, so a missing file fails here rather
    /// than on the first chat request.
    pub async fn from_config(config: &AppConfig) -> Result<Self, KnowledgeError> {
        let mut registry = Self::new();
        for store_config in &config.datastores {
            let store = build_store(store_config).await?;
            info!(id = %store_config.id, backend = store.name(), "Datastore registered");
            registry.register(store_config.id.clone(), store);
        }
        Ok(registry)
    }

    pub fn register(&mut self, id: impl Into<String>, store: Arc<dyn KnowledgeStore>) {
        self.stores.insert(id.into(), store);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn KnowledgeStore>> {
        self.stores.get(id).cloned()
    }

    /// Like [`get`](Self::get), but an unknown id is an error.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn KnowledgeStore>, KnowledgeError> {
        self.get(id)
            .ok_or_else(|| KnowledgeError::NotFound(id.to_string()))
    }

    /// `(id, backend name)` pairs, sorted by id.
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.stores
            .iter()
            .map(|(id, store)| (id.as_str(), store.name()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

async fn build_store(config: &DatastoreConfig) -> Result<Arc<dyn KnowledgeStore>, KnowledgeError> {
    match config.kind {
        DatastoreKind::Memory => {
            let documents = config
                .documents
                .iter()
                .map(|d| Document::new(&d.text, &d.source).with_tags(d.tags.clone()))
                .collect();
            Ok(Arc::new(InMemoryKnowledgeStore::with_documents(documents)))
        }
        DatastoreKind::File => {
            let path = config.path.as_ref().ok_or_else(|| {
                KnowledgeError::Storage(format!("datastore '{}' has no path", config.id))
            })?;
            Ok(Arc::new(FileKnowledgeStore::load(path).await?))
        }
        DatastoreKind::Http => {
            let url = config.url.as_deref().ok_or_else(|| {
                KnowledgeError::Unavailable(format!("datastore '{}' has no url", config.id))
            })?;
            Ok(Arc::new(HttpKnowledgeStore::new(url, config.api_key.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_config::SeedDocument;
    use ragchat_core::knowledge::SearchQuery;
    use std::io::Write;

    fn datastore(id: &str, kind: DatastoreKind) -> DatastoreConfig {
        DatastoreConfig {
            id: id.into(),
            kind,
            path: None,
            url: None,
            api_key: None,
            documents: Vec::new(),
        }
    }

    #[tokio::test]
    async fn builds_all_configured_backends() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text":"hello","source":"a"}}"#).unwrap();

        let mut config = AppConfig::default();
        config.datastores = vec![
            DatastoreConfig {
                path: Some(file.path().to_path_buf()),
                ..datastore("docs", DatastoreKind::File)
            },
            DatastoreConfig {
                url: Some("http://localhost:9000".into()),
                ..datastore("remote", DatastoreKind::Http)
            },
            datastore("scratch", DatastoreKind::Memory),
        ];

        let registry = DatastoreRegistry::from_config(&config).await.unwrap();
        assert_eq!(
            registry.list(),
            vec![("docs", "file"), ("remote", "http"), ("scratch", "in_memory")]
        );
    }

    #[tokio::test]
    async fn memory_datastore_is_seeded_from_config() {
        let mut config = AppConfig::default();
        config.datastores = vec![DatastoreConfig {
            documents: vec![
                SeedDocument {
                    text: "Refunds are issued within 14 days.".into(),
                    source: "https://shop.test/refunds".into(),
                    tags: vec!["billing".into()],
                },
                SeedDocument {
                    text: "Shipping takes 3-5 business days.".into(),
                    source: "https://shop.test/shipping".into(),
                    tags: Vec::new(),
                },
            ],
            ..datastore("faq", DatastoreKind::Memory)
        }];

        let registry = DatastoreRegistry::from_config(&config).await.unwrap();
        let store = registry.resolve("faq").unwrap();
        let results = store
            .search(SearchQuery::new("when are refunds issued", 3))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "https://shop.test/refunds");

        let tagged = store
            .search(SearchQuery::new("shipping", 3).with_tags(vec!["billing".into()]))
            .await
            .unwrap();
        assert!(tagged.is_empty());
    }

    #[tokio::test]
    async fn missing_file_fails_registry_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.datastores = vec![DatastoreConfig {
            path: Some(dir.path().join("missing.jsonl")),
            ..datastore("docs", DatastoreKind::File)
        }];

        let result = DatastoreRegistry::from_config(&config).await;
        assert!(matches!(result, Err(KnowledgeError::Storage(_))));
    }

    #[test]
    fn unknown_id_resolves_to_not_found() {
        let mut registry = DatastoreRegistry::new();
        registry.register("kb", Arc::new(InMemoryKnowledgeStore::new()));

        assert!(registry.resolve("kb").is_ok());
        assert!(matches!(
            registry.resolve("other"),
            Err(KnowledgeError::NotFound(id)) if id == "other"
        ));
    }
}
