use storage::Storage;

#[tokio::test]
async fn values_survive_reopening_the_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("timeclock.db");
    let database_url = format!("sqlite://{}", path.to_string_lossy().replace('\\', "/"));

    {
        let storage = Storage::new(&database_url).await.expect("open");
        storage
            .put_value("authenticated_user", r#"{"id":7,"email":"alex@example.com"}"#)
            .await
            .expect("put");
        storage.pool().close().await;
    }

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened
            .get_value("authenticated_user")
            .await
            .expect("get")
            .as_deref(),
        Some(r#"{"id":7,"email":"alex@example.com"}"#)
    );
}
