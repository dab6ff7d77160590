#![allow(missing_docs)]

use std::fs;
use std::sync::Arc;

use plansync::{
    api::{endpoint, ApiCall, Failure, InMemoryPlanner, PlannerApi},
    datasets::{dataset_name_from_path, DatasetManager},
    model::{Dataset, DatasetUpload},
    notify::RecordingNotifier,
    ClientError, SelectionScope,
};
use tempfile::TempDir;

fn dataset_manager(
    api: &Arc<InMemoryPlanner>,
) -> (DatasetManager<InMemoryPlanner>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    (DatasetManager::new(api.clone(), notifier.clone()), notifier)
}

fn names(manager: &DatasetManager<InMemoryPlanner>) -> Vec<String> {
    manager.datasets().iter().map(|ds| ds.name.clone()).collect()
}

#[tokio::test]
async fn upload_from_disk_adds_the_derived_name() {
    let api = Arc::new(InMemoryPlanner::new(Vec::<String>::new()).with_datasets(["movies"]));
    let (mut manager, notifier) = dataset_manager(&api);
    manager.list().await.unwrap();

    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("people.csv");
    fs::write(&path, "id,name\n1,Ada\n").expect("write csv");

    let dataset = manager.upload(&path).await.unwrap();
    assert_eq!(dataset, Dataset::new("people"));
    assert_eq!(names(&manager), vec!["movies", "people"]);
    assert_eq!(api.datasets(), vec!["movies", "people"]);
    assert_eq!(
        api.calls(),
        vec![
            ApiCall::ListDatasets,
            ApiCall::UploadDataset("people.csv".into())
        ]
    );
    assert!(notifier.notices().is_empty());
}

#[tokio::test]
async fn failed_listing_keeps_the_previous_list() {
    let api = Arc::new(InMemoryPlanner::new(Vec::<String>::new()).with_datasets(["movies"]));
    let (mut manager, notifier) = dataset_manager(&api);
    manager.list().await.unwrap();

    api.fail_next(endpoint::DS_LIST, Failure::Rejection("boom".into()));
    let err = manager.list().await.unwrap_err();

    assert_eq!(err.to_string(), "boom");
    assert_eq!(names(&manager), vec!["movies"]);
    assert_eq!(notifier.messages(), vec!["boom"]);
}

#[tokio::test]
async fn rejected_removal_keeps_the_dataset() {
    let api = Arc::new(InMemoryPlanner::new(Vec::<String>::new()).with_datasets(["movies"]));
    let (mut manager, notifier) = dataset_manager(&api);
    manager.list().await.unwrap();
    api.fail_next(
        endpoint::DS_DELETE,
        Failure::Rejection("Dataset movies not exists.".into()),
    );

    manager.select("movies").unwrap();
    let err = manager.remove_selected().await.unwrap_err();

    assert!(err.is_remote());
    assert!(manager.contains("movies"));
    assert_eq!(manager.selected(), Some("movies"));
    assert_eq!(notifier.messages(), vec!["Dataset movies not exists."]);
}

#[tokio::test]
async fn removal_drops_dataset_and_selection() {
    let api = Arc::new(
        InMemoryPlanner::new(Vec::<String>::new()).with_datasets(["movies", "people"]),
    );
    let (mut manager, _) = dataset_manager(&api);
    manager.list().await.unwrap();

    manager.select("people").unwrap();
    manager.remove_selected().await.unwrap();

    assert_eq!(names(&manager), vec!["movies"]);
    assert!(manager.selected().is_none());
    assert_eq!(api.datasets(), vec!["movies"]);
}

#[tokio::test]
async fn removal_needs_a_selection() {
    let api = Arc::new(InMemoryPlanner::new(Vec::<String>::new()).with_datasets(["movies"]));
    let (mut manager, _) = dataset_manager(&api);
    manager.list().await.unwrap();
    api.clear_calls();

    let err = manager.remove_selected().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::NoSelection(SelectionScope::Datasets)
    ));
    assert_eq!(err.to_string(), "Please select the dataset to remove.");
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn unknown_dataset_is_not_sent() {
    let api = Arc::new(InMemoryPlanner::new(Vec::<String>::new()));
    let (mut manager, _) = dataset_manager(&api);

    let err = manager.remove("ghost").await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownDataset(name) if name == "ghost"));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn duplicate_upload_is_rejected_by_the_planner() {
    let api = Arc::new(InMemoryPlanner::new(Vec::<String>::new()).with_datasets(["movies"]));
    let (mut manager, notifier) = dataset_manager(&api);
    manager.list().await.unwrap();

    let err = manager
        .upload_contents(DatasetUpload {
            file_name: "movies.csv".into(),
            content_type: "text/csv".into(),
            contents: b"mid,title\n".to_vec(),
        })
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert_eq!(names(&manager), vec!["movies"]);
    assert_eq!(
        notifier.messages(),
        vec!["Dataset 'movies' already exists. Please remove it first."]
    );
}

#[tokio::test]
async fn missing_upload_file_is_a_local_error() {
    let api = Arc::new(InMemoryPlanner::new(Vec::<String>::new()));
    let (mut manager, _) = dataset_manager(&api);
    let dir = TempDir::new().expect("tempdir");

    let err = manager
        .upload(&dir.path().join("absent.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn relisting_drops_a_stale_selection() {
    let api = Arc::new(
        InMemoryPlanner::new(Vec::<String>::new()).with_datasets(["movies", "people"]),
    );
    let (mut manager, _) = dataset_manager(&api);
    manager.list().await.unwrap();
    manager.select("movies").unwrap();

    api.delete_dataset("movies").await.unwrap();
    manager.list().await.unwrap();

    assert_eq!(names(&manager), vec!["people"]);
    assert!(manager.selected().is_none());
}

#[test]
fn dataset_names_come_from_the_file_name() {
    assert_eq!(dataset_name_from_path("data/sub/movies.csv").unwrap(), "movies");
    assert_eq!(dataset_name_from_path(r"C:\data\people.tsv").unwrap(), "people");
    assert_eq!(dataset_name_from_path("animation").unwrap(), "animation");
    assert!(matches!(
        dataset_name_from_path(".csv"),
        Err(ClientError::Validation(_))
    ));
}

#[tokio::test]
async fn padded_file_name_can_be_removed_after_upload() {
    let api = Arc::new(InMemoryPlanner::new(Vec::<String>::new()));
    let (mut manager, notifier) = dataset_manager(&api);

    manager
        .upload_contents(DatasetUpload {
            file_name: " movies.csv".into(),
            content_type: "text/csv".into(),
            contents: b"mid,title\n".to_vec(),
        })
        .await
        .unwrap();
    assert_eq!(names(&manager), vec![" movies"]);
    assert_eq!(api.datasets(), vec![" movies"]);

    manager.select(" movies").unwrap();
    manager.remove_selected().await.unwrap();
    assert!(api.datasets().is_empty());
    assert!(names(&manager).is_empty());
    assert!(notifier.notices().is_empty());
}
