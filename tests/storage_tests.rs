//! Storage backends and the credential store

use crm_assist::credentials::{
    CredentialStore, CrmCredentials, CRM_INSTANCE_URL_KEY, CRM_TOKEN_KEY, LLM_API_KEY,
};
use crm_assist::environment::HostEnvironment;
use crm_assist::storage::{MemoryBackend, Storage, DOCUMENT_FILE, KEY_DIR};
use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

fn memory_store() -> CredentialStore {
    CredentialStore::new(Storage::new(Arc::new(MemoryBackend::new())))
}

async fn assert_round_trip(store: &CredentialStore) {
    store
        .set_crm_credentials(&CrmCredentials::new("token-123", "https://acme.my.salesforce.com"))
        .await
        .unwrap();
    store
        .set_llm_key(&SecretString::from("sk-test"))
        .await
        .unwrap();

    let crm = store.crm_credentials().await.unwrap().unwrap();
    assert_eq!(crm.access_token.expose_secret(), "token-123");
    assert_eq!(crm.instance_url, "https://acme.my.salesforce.com");

    let key = store.llm_key().await.unwrap().unwrap();
    assert_eq!(key.expose_secret(), "sk-test");
}

#[tokio::test]
async fn test_round_trip_document_backend() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(Storage::for_environment(
        HostEnvironment::Interactive,
        dir.path(),
    ));

    assert_round_trip(&store).await;
    assert!(dir.path().join(DOCUMENT_FILE).exists());
}

#[tokio::test]
async fn test_round_trip_key_file_backend() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(Storage::for_environment(
        HostEnvironment::Headless,
        dir.path(),
    ));

    assert_round_trip(&store).await;
    assert!(dir.path().join(KEY_DIR).join("crmToken.json").exists());
}

#[tokio::test]
async fn test_round_trip_memory_backend() {
    assert_round_trip(&memory_store()).await;
}

#[tokio::test]
async fn test_values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    for environment in [HostEnvironment::Interactive, HostEnvironment::Headless] {
        let storage = Storage::for_environment(environment, dir.path());
        storage.set(&[(LLM_API_KEY, "persisted")]).await.unwrap();

        let reopened = Storage::for_environment(environment, dir.path());
        let values = reopened.get(&[LLM_API_KEY]).await.unwrap();
        assert_eq!(values.get(LLM_API_KEY).map(String::as_str), Some("persisted"));
    }
}

#[tokio::test]
async fn test_absent_keys_are_omitted() {
    let dir = tempfile::tempdir().unwrap();

    for environment in [HostEnvironment::Interactive, HostEnvironment::Headless] {
        let storage = Storage::for_environment(environment, dir.path());
        storage.set(&[(CRM_TOKEN_KEY, "tok")]).await.unwrap();

        let values = storage
            .get(&[CRM_TOKEN_KEY, CRM_INSTANCE_URL_KEY])
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert!(!values.contains_key(CRM_INSTANCE_URL_KEY));
    }
}

#[tokio::test]
async fn test_set_merges_with_existing_document() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::for_environment(HostEnvironment::Interactive, dir.path());

    storage.set(&[(CRM_TOKEN_KEY, "a")]).await.unwrap();
    storage.set(&[(LLM_API_KEY, "b")]).await.unwrap();
    storage.set(&[(CRM_TOKEN_KEY, "c")]).await.unwrap();

    let values = storage.get(&[CRM_TOKEN_KEY, LLM_API_KEY]).await.unwrap();
    assert_eq!(values.get(CRM_TOKEN_KEY).map(String::as_str), Some("c"));
    assert_eq!(values.get(LLM_API_KEY).map(String::as_str), Some("b"));
}

#[tokio::test]
async fn test_empty_values_read_back_identically_on_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let stores = [
        Storage::for_environment(HostEnvironment::Interactive, dir.path()),
        Storage::for_environment(HostEnvironment::Headless, dir.path()),
        Storage::new(Arc::new(MemoryBackend::new())),
    ];

    for storage in stores {
        let store = CredentialStore::new(storage.clone());
        store.set_llm_key(&SecretString::from("")).await.unwrap();

        let values = storage.get(&[LLM_API_KEY]).await.unwrap();
        assert_eq!(values.get(LLM_API_KEY).map(String::as_str), Some(""), "{}", storage.backend_name());

        let key = store.llm_key().await.unwrap().unwrap();
        assert_eq!(key.expose_secret(), "");
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_key_file_failed_set_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::for_environment(HostEnvironment::Headless, dir.path());
    let store = CredentialStore::new(storage.clone());
    let keys = dir.path().join(KEY_DIR);

    // A directory where the instance URL file belongs makes its rename fail
    std::fs::create_dir_all(keys.join(format!("{CRM_INSTANCE_URL_KEY}.json"))).unwrap();

    let result = store
        .set_crm_credentials(&CrmCredentials::new("fresh", "https://y.com"))
        .await;
    assert!(result.is_err());
    assert!(storage.get(&[CRM_TOKEN_KEY]).await.unwrap().is_empty());

    // A token that existed before the failed write is restored
    storage.set(&[(CRM_TOKEN_KEY, "previous")]).await.unwrap();
    let result = store
        .set_crm_credentials(&CrmCredentials::new("fresh", "https://y.com"))
        .await;
    assert!(result.is_err());

    let values = storage.get(&[CRM_TOKEN_KEY]).await.unwrap();
    assert_eq!(values.get(CRM_TOKEN_KEY).map(String::as_str), Some("previous"));

    let leftovers: Vec<_> = std::fs::read_dir(&keys)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_persistent_backends_are_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let mode = |path: &std::path::Path| std::fs::metadata(path).unwrap().permissions().mode() & 0o777;

    let dir = tempfile::tempdir().unwrap();
    let document_dir = dir.path().join("document");
    let key_file_dir = dir.path().join("key-file");

    for (environment, root) in [
        (HostEnvironment::Interactive, &document_dir),
        (HostEnvironment::Headless, &key_file_dir),
    ] {
        let store = CredentialStore::new(Storage::for_environment(environment, root));
        store.set_llm_key(&SecretString::from("sk-secret")).await.unwrap();
    }

    assert_eq!(mode(&document_dir), 0o700);
    assert_eq!(mode(&document_dir.join(DOCUMENT_FILE)), 0o600);
    assert_eq!(mode(&key_file_dir.join(KEY_DIR)), 0o700);
    assert_eq!(mode(&key_file_dir.join(KEY_DIR).join(format!("{LLM_API_KEY}.json"))), 0o600);
}

#[tokio::test]
async fn test_key_file_rejects_path_like_keys() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::for_environment(HostEnvironment::Headless, dir.path());

    let result = storage.set(&[("../escape", "x")]).await;
    assert!(matches!(result, Err(crm_assist::AppError::StorageError(_))));
}

#[tokio::test]
async fn test_crm_credentials_require_both_keys() {
    let backend = Arc::new(MemoryBackend::new());
    let storage = Storage::new(backend);
    let store = CredentialStore::new(storage.clone());

    storage.set(&[(CRM_TOKEN_KEY, "tok")]).await.unwrap();
    assert!(store.crm_credentials().await.unwrap().is_none());

    storage
        .set(&[(CRM_INSTANCE_URL_KEY, "https://y.com")])
        .await
        .unwrap();
    assert!(store.crm_credentials().await.unwrap().is_some());
}

#[tokio::test]
async fn test_fully_authenticated_combinations() {
    for (has_crm, has_llm) in [(false, false), (true, false), (false, true), (true, true)] {
        let store = memory_store();

        if has_crm {
            store
                .set_crm_credentials(&CrmCredentials::new("tok", "https://y.com"))
                .await
                .unwrap();
        }
        if has_llm {
            store
                .set_llm_key(&SecretString::from("sk"))
                .await
                .unwrap();
        }

        assert_eq!(
            store.is_fully_authenticated().await.unwrap(),
            has_crm && has_llm,
            "crm={has_crm} llm={has_llm}"
        );
    }
}

#[tokio::test]
async fn test_clear_removes_everything() {
    let dir = tempfile::tempdir().unwrap();

    for environment in [HostEnvironment::Interactive, HostEnvironment::Headless] {
        let store = CredentialStore::new(Storage::for_environment(environment, dir.path()));
        assert_round_trip(&store).await;

        store.clear().await.unwrap();

        assert!(store.crm_credentials().await.unwrap().is_none());
        assert!(store.llm_key().await.unwrap().is_none());
        assert!(!store.is_fully_authenticated().await.unwrap());
    }
}

#[tokio::test]
async fn test_memory_backend_counts_writes() {
    let backend = Arc::new(MemoryBackend::new());
    let store = CredentialStore::new(Storage::new(backend.clone()));

    store
        .set_crm_credentials(&CrmCredentials::new("tok", "https://y.com"))
        .await
        .unwrap();

    // Token and instance URL go out in a single write
    assert_eq!(backend.writes(), 1);
}
