//! Uploaded documents that managers review.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{JsonFile, StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    /// Public locator under `/uploads`.
    pub url: String,
    pub uploaded_by: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub project_title: String,
    #[serde(default)]
    pub project_details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_delivery_schedule: Option<NaiveDate>,
    pub uploaded_at: DateTime<Utc>,
}

/// Descriptive fields sent alongside an upload or edit.
#[derive(Debug, Clone, Default)]
pub struct DocumentDetails {
    pub customer_name: String,
    pub project_title: String,
    pub project_details: String,
    pub expected_delivery_schedule: Option<NaiveDate>,
}

impl Document {
    pub fn new(name: String, url: String, uploaded_by: String, details: DocumentDetails) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            url,
            uploaded_by,
            customer_name: details.customer_name,
            project_title: details.project_title,
            project_details: details.project_details,
            expected_delivery_schedule: details.expected_delivery_schedule,
            uploaded_at: Utc::now(),
        }
    }

    /// Plain-text summary used in notification mails.
    pub fn summary(&self) -> String {
        let delivery = self
            .expected_delivery_schedule
            .map(|d| d.to_string())
            .unwrap_or_else(|| "not set".to_string());
        format!(
            "Customer: {}\nProject Title: {}\nDetails: {}\nExpected Delivery: {}",
            self.customer_name, self.project_title, self.project_details, delivery
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub uploaded_by: Option<String>,
    pub project_title: Option<String>,
}

#[derive(Debug)]
pub struct DocumentStore {
    documents: RwLock<HashMap<Uuid, Document>>,
    file: JsonFile,
}

impl DocumentStore {
    pub fn open(path: PathBuf) -> StoreResult<Self> {
        let file = JsonFile::new(path);
        let loaded: Vec<Document> = file.load()?;
        tracing::info!(
            "Loaded {} documents from {}",
            loaded.len(),
            file.path().display()
        );
        Ok(Self {
            documents: RwLock::new(loaded.into_iter().map(|d| (d.id, d)).collect()),
            file,
        })
    }

    fn persist(&self, documents: &HashMap<Uuid, Document>) -> StoreResult<()> {
        let mut records: Vec<&Document> = documents.values().collect();
        records.sort_by_key(|d| d.uploaded_at);
        self.file.save(&records)
    }

    pub async fn list(&self, filter: &DocumentFilter) -> Vec<Document> {
        let documents = self.documents.read().await;
        let mut list: Vec<Document> = documents
            .values()
            .filter(|d| {
                filter.uploaded_by.as_ref().map_or(true, |u| &d.uploaded_by == u)
                    && filter
                        .project_title
                        .as_ref()
                        .map_or(true, |t| &d.project_title == t)
            })
            .cloned()
            .collect();
        list.sort_by_key(|d| d.uploaded_at);
        list
    }

    pub async fn get(&self, id: Uuid) -> Option<Document> {
        self.documents.read().await.get(&id).cloned()
    }

    pub async fn add(&self, document: Document) -> StoreResult<Document> {
        let mut documents = self.documents.write().await;
        let previous = documents.insert(document.id, document.clone());
        if let Err(e) = self.persist(&documents) {
            match previous {
                Some(previous) => documents.insert(previous.id, previous),
                None => documents.remove(&document.id),
            };
            return Err(e);
        }
        Ok(document)
    }

    /// Overwrite the descriptive fields and, when a new file was stored, its
    /// name and locator.
    pub async fn update(
        &self,
        id: Uuid,
        details: DocumentDetails,
        file: Option<(String, String)>,
    ) -> StoreResult<Document> {
        let mut documents = self.documents.write().await;
        let document = documents.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            kind: "Document",
            id: id.to_string(),
        })?;
        let previous = document.clone();

        document.customer_name = details.customer_name;
        document.project_title = details.project_title;
        document.project_details = details.project_details;
        document.expected_delivery_schedule = details.expected_delivery_schedule;
        if let Some((name, url)) = file {
            document.name = name;
            document.url = url;
        }
        let updated = document.clone();
        if let Err(e) = self.persist(&documents) {
            documents.insert(id, previous);
            return Err(e);
        }
        Ok(updated)
    }
}
