//! Customers and the projects embedded in them.
//!
//! Projects have no collection of their own: each one lives inside the
//! `projects` list of the customer it was created for, and is located by
//! scanning customers for a matching project id.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{JsonFile, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    OnHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Task counters shown on project cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounters {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub stuck: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub customer_id: Uuid,
    #[serde(default)]
    pub customer_name: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub budget: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub tasks: TaskCounters,
    #[serde(default)]
    pub inline_inspection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_specs_doc: Option<String>,
    #[serde(default)]
    pub qap_criteria: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qap_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tender_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant: Option<String>,
    #[serde(default)]
    pub other_documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

impl Project {
    /// An active project with no schedule, budget or documents yet.
    pub fn new(id: String, customer: &Customer, name: String) -> Self {
        Self {
            id,
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            name,
            description: String::new(),
            status: ProjectStatus::Active,
            start_date: None,
            end_date: None,
            budget: 0.0,
            priority: None,
            progress: 0.0,
            tasks: TaskCounters::default(),
            inline_inspection: false,
            technical_specs_doc: None,
            qap_criteria: false,
            qap_document: None,
            tender_document: None,
            product_type: None,
            plant: None,
            other_documents: Vec::new(),
            uploaded_at: None,
        }
    }

    /// Labelled document locators attached to this project, in display order.
    pub fn documents(&self) -> Vec<(&'static str, &str)> {
        let mut docs = Vec::new();
        if let Some(url) = self.technical_specs_doc.as_deref() {
            docs.push(("Technical Specifications Document", url));
        }
        if let Some(url) = self.qap_document.as_deref() {
            docs.push(("QAP Document", url));
        }
        if let Some(url) = self.tender_document.as_deref() {
            docs.push(("Tender Document", url));
        }
        for url in &self.other_documents {
            docs.push(("Other Document", url.as_str()));
        }
        docs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default)]
    pub projects: Vec<Project>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: String, industry: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            industry,
            projects: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }
}

/// Customer plus the figures derived from its projects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: String,
    pub industry: Option<String>,
    pub projects: Vec<Project>,
    pub active_projects: usize,
    pub completed_projects: usize,
    pub total_budget: f64,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for CustomerSummary {
    fn from(c: Customer) -> Self {
        let count = |status: ProjectStatus| {
            c.projects.iter().filter(|p| p.status == status).count()
        };
        let active_projects = count(ProjectStatus::Active);
        let completed_projects = count(ProjectStatus::Completed);
        let total_budget = c.projects.iter().map(|p| p.budget).sum();
        Self {
            id: c.id,
            name: c.name,
            industry: c.industry,
            projects: c.projects,
            active_projects,
            completed_projects,
            total_budget,
            created_at: c.created_at,
        }
    }
}

/// Persistent customer store with JSON file backing.
#[derive(Debug)]
pub struct CustomerStore {
    customers: RwLock<HashMap<Uuid, Customer>>,
    file: JsonFile,
}

impl CustomerStore {
    pub fn open(path: PathBuf) -> StoreResult<Self> {
        let file = JsonFile::new(path);
        let loaded: Vec<Customer> = file.load()?;
        tracing::info!(
            "Loaded {} customers from {}",
            loaded.len(),
            file.path().display()
        );
        Ok(Self {
            customers: RwLock::new(loaded.into_iter().map(|c| (c.id, c)).collect()),
            file,
        })
    }

    fn persist(&self, customers: &HashMap<Uuid, Customer>) -> StoreResult<()> {
        let mut records: Vec<&Customer> = customers.values().collect();
        records.sort_by_key(|c| c.created_at);
        self.file.save(&records)
    }

    /// All customers, oldest first.
    pub async fn list(&self) -> Vec<Customer> {
        let customers = self.customers.read().await;
        let mut list: Vec<Customer> = customers.values().cloned().collect();
        list.sort_by_key(|c| c.created_at);
        list
    }

    pub async fn get(&self, id: Uuid) -> Option<Customer> {
        self.customers.read().await.get(&id).cloned()
    }

    pub async fn create(&self, customer: Customer) -> StoreResult<Customer> {
        let mut customers = self.customers.write().await;
        let previous = customers.insert(customer.id, customer.clone());
        if let Err(e) = self.persist(&customers) {
            match previous {
                Some(previous) => customers.insert(previous.id, previous),
                None => customers.remove(&customer.id),
            };
            return Err(e);
        }
        Ok(customer)
    }

    /// Append a project to its customer's project list.
    ///
    /// Project ids are unique across all customers.
    pub async fn add_project(&self, project: Project) -> StoreResult<Customer> {
        let mut customers = self.customers.write().await;
        if customers.values().any(|c| c.project(&project.id).is_some()) {
            return Err(StoreError::Duplicate {
                kind: "Project",
                id: project.id,
            });
        }

        let customer = customers
            .get_mut(&project.customer_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "Customer",
                id: project.customer_id.to_string(),
            })?;
        customer.projects.push(project);
        let updated = customer.clone();
        if let Err(e) = self.persist(&customers) {
            if let Some(customer) = customers.get_mut(&updated.id) {
                customer.projects.pop();
            }
            return Err(e);
        }
        Ok(updated)
    }

    /// Locate a project and the customer that owns it.
    pub async fn find_project(&self, project_id: &str) -> Option<(Customer, Project)> {
        let customers = self.customers.read().await;
        customers
            .values()
            .find_map(|c| c.project(project_id).map(|p| (c.clone(), p.clone())))
    }
}
