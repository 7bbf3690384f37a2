use stratus_storage::{shared, CloudStorage, ConfigLayer, ErrorKind, StorageSettings};

#[tokio::test]
async fn test_shared_driver_uses_installed_settings() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    std::fs::create_dir_all(&root).unwrap();
    let source = dir.path().join("note.txt");
    std::fs::write(&source, b"hello").unwrap();

    let settings = StorageSettings::default().with_setup(
        "default",
        ConfigLayer::new()
            .with("driver", "local")
            .with("root", root.display().to_string())
            .with("container", "inbox"),
    );
    assert!(CloudStorage::from_settings(settings).install().is_ok());
    assert!(CloudStorage::default().install().is_err());

    let url = shared::create_container("inbox", None).await.unwrap();
    assert!(url.ends_with("/inbox/"));

    shared::upload_object(&source, None, None).await.unwrap();
    assert!(shared::object_exists("note.txt", None).await.unwrap());

    shared::create_container("archive", None).await.unwrap();
    shared::copy_to("inbox", "archive", "note.txt", None)
        .await
        .unwrap();

    // Later callers see the mutated default container
    shared::set_config("container", "archive").await.unwrap();
    assert_eq!(
        shared::get_config("container").await.unwrap(),
        Some("archive".into())
    );
    let listed = shared::list_objects(None, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].full_name, "note.txt");

    let err = shared::delete_container(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeleteContainer);
    assert!(err.is_container_not_empty());

    shared::delete_object("note.txt", None).await.unwrap();
    shared::delete_container(None).await.unwrap();
    assert!(shared::get_container_url(Some("archive")).await.is_err());

    let driver = shared::driver().await.unwrap();
    assert_eq!(driver.name(), "local");
}
