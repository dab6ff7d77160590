//! Datasets registered with the planner.

use std::path::Path;
use std::sync::Arc;

use crate::api::PlannerApi;
use crate::error::{ClientError, Result, SelectionScope};
use crate::model::{Dataset, DatasetUpload};
use crate::notify::{Notice, Notifier};

/// Display name of a dataset uploaded from `file_name`: the final path
/// component (either separator) up to its first dot.
pub fn dataset_name_from_path(file_name: &str) -> Result<String> {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let name = base.split('.').next().unwrap_or(base);
    if name.is_empty() {
        return Err(ClientError::Validation(format!(
            "cannot derive a dataset name from '{file_name}'"
        )));
    }
    Ok(name.to_string())
}

/// Locally displayed datasets, kept in step with the planner.
///
/// Local state only changes after the planner confirms an operation; any
/// rejection is surfaced through the notifier and leaves the list as it was.
pub struct DatasetManager<A> {
    api: Arc<A>,
    notifier: Arc<dyn Notifier>,
    datasets: Vec<Dataset>,
    selected: Option<String>,
}

impl<A: PlannerApi> DatasetManager<A> {
    /// Creates a manager with an empty list.
    pub fn new(api: Arc<A>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            datasets: Vec::new(),
            selected: None,
        }
    }

    /// Datasets currently displayed.
    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    /// Whether `name` is displayed.
    pub fn contains(&self, name: &str) -> bool {
        self.datasets.iter().any(|ds| ds.name == name)
    }

    /// Replaces the list with the planner's.
    pub async fn list(&mut self) -> Result<&[Dataset]> {
        match self.api.list_datasets().await {
            Ok(names) => {
                self.datasets.clear();
                for name in names {
                    self.insert(Dataset::new(name));
                }
                if self
                    .selected
                    .as_deref()
                    .is_some_and(|name| !self.contains(name))
                {
                    self.selected = None;
                }
                tracing::info!(count = self.datasets.len(), "datasets listed");
                Ok(&self.datasets)
            }
            Err(err) => Err(self.surface("listing datasets failed", err)),
        }
    }

    /// Uploads the file at `path` and, once accepted, displays it under the
    /// name derived from its file name.
    pub async fn upload(&mut self, path: &Path) -> Result<Dataset> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ClientError::Validation(format!("'{}' has no usable file name", path.display()))
            })?
            .to_string();
        let name = dataset_name_from_path(&file_name)?;
        let contents = tokio::fs::read(path).await?;
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        self.upload_contents(DatasetUpload {
            file_name,
            content_type,
            contents,
        })
        .await
        .map(|()| Dataset::new(name))
    }

    /// Uploads an in-memory file.
    pub async fn upload_contents(&mut self, upload: DatasetUpload) -> Result<()> {
        let name = dataset_name_from_path(&upload.file_name)?;
        let bytes = upload.contents.len();
        match self.api.upload_dataset(upload).await {
            Ok(()) => {
                tracing::info!(dataset = %name, bytes, "dataset uploaded");
                self.insert(Dataset::new(name));
                Ok(())
            }
            Err(err) => Err(self.surface("dataset upload failed", err)),
        }
    }

    /// Deletes `name` on the planner and stops displaying it.
    pub async fn remove(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(ClientError::UnknownDataset(name.to_string()));
        }
        match self.api.delete_dataset(name).await {
            Ok(()) => {
                self.datasets.retain(|ds| ds.name != name);
                if self.selected.as_deref() == Some(name) {
                    self.selected = None;
                }
                tracing::info!(dataset = %name, "dataset removed");
                Ok(())
            }
            Err(err) => Err(self.surface("dataset removal failed", err)),
        }
    }

    /// Selects a displayed dataset.
    pub fn select(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(ClientError::UnknownDataset(name.to_string()));
        }
        self.selected = Some(name.to_string());
        Ok(())
    }

    /// Clears the selection.
    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Selected dataset.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Removes the selected dataset.
    pub async fn remove_selected(&mut self) -> Result<()> {
        let name = self
            .selected
            .clone()
            .ok_or(ClientError::NoSelection(SelectionScope::Datasets))?;
        self.remove(&name).await
    }

    fn insert(&mut self, dataset: Dataset) {
        if !self.contains(&dataset.name) {
            self.datasets.push(dataset);
        }
    }

    fn surface(&self, what: &'static str, err: ClientError) -> ClientError {
        tracing::warn!(error = %err, "{what}");
        self.notifier.notify(Notice::error(err.to_string()));
        err
    }
}
