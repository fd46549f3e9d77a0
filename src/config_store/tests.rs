//! Tests for the two-file configuration store.

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;

struct StoreFixture {
    _tmp: TempDir,
    root: Utf8PathBuf,
    store: ConfigStore,
}

#[fixture]
fn store_fixture() -> StoreFixture {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
    let store = ConfigStore::new(root.clone());
    StoreFixture {
        _tmp: tmp,
        root,
        store,
    }
}

fn write_fixture_file(root: &Utf8Path, file_name: &str, contents: &str) {
    std::fs::write(root.join(file_name).as_std_path(), contents)
        .unwrap_or_else(|err| panic!("write {file_name}: {err}"));
}

fn read_fixture_file(root: &Utf8Path, file_name: &str) -> String {
    std::fs::read_to_string(root.join(file_name).as_std_path())
        .unwrap_or_else(|err| panic!("read {file_name}: {err}"))
}

#[rstest]
fn load_returns_defaults_when_files_missing(store_fixture: StoreFixture) {
    let config = store_fixture
        .store
        .load()
        .unwrap_or_else(|err| panic!("load: {err}"));

    assert_eq!(config, Config::default());
}

#[rstest]
fn load_tolerates_empty_files(store_fixture: StoreFixture) {
    write_fixture_file(&store_fixture.root, PROJECT_FILE_NAME, "");
    write_fixture_file(&store_fixture.root, SECRETS_FILE_NAME, "\n  \n");

    let config = store_fixture
        .store
        .load()
        .unwrap_or_else(|err| panic!("load: {err}"));

    assert_eq!(config, Config::default());
}

#[rstest]
fn load_merges_local_credentials_over_project_values(store_fixture: StoreFixture) {
    write_fixture_file(
        &store_fixture.root,
        PROJECT_FILE_NAME,
        "[db]\nurl = \"https://checked-in.supabase.co\"\nanon_key = \"anon\"\n",
    );
    write_fixture_file(
        &store_fixture.root,
        SECRETS_FILE_NAME,
        "[db]\nurl = \"https://local.supabase.co\"\npassword = \"pw\"\n",
    );

    let config = store_fixture
        .store
        .load()
        .unwrap_or_else(|err| panic!("load: {err}"));

    assert_eq!(config.db.url.as_deref(), Some("https://local.supabase.co"));
    assert_eq!(config.db.anon_key.as_deref(), Some("anon"));
    assert_eq!(config.db.password.as_deref(), Some("pw"));
}

#[rstest]
fn parse_failure_names_the_offending_file(store_fixture: StoreFixture) {
    write_fixture_file(&store_fixture.root, PROJECT_FILE_NAME, "not = [");

    let Err(err) = store_fixture.store.load() else {
        panic!("load should fail on invalid content");
    };
    let ConfigStoreError::Parse { path, .. } = err else {
        panic!("expected parse error");
    };
    assert_eq!(path, store_fixture.store.project_path());
}

#[rstest]
fn save_secrets_writes_only_the_db_section(store_fixture: StoreFixture) {
    let db = DbConfig {
        url: Some("https://abc123.supabase.co".to_owned()),
        secret_key: Some("sb_secret_test".to_owned()),
        password: Some("pw".to_owned()),
        ..DbConfig::default()
    };

    let written = store_fixture
        .store
        .save_secrets(&db)
        .unwrap_or_else(|err| panic!("save secrets: {err}"));

    assert_eq!(written, store_fixture.store.secrets_path());
    let contents = read_fixture_file(&store_fixture.root, SECRETS_FILE_NAME);
    assert!(contents.contains("[db]"));
    assert!(!contents.contains("[project]"));
    assert!(!contents.contains("[preferences]"));
    assert!(!contents.contains("anon_key"));
}

#[rstest]
fn save_project_never_writes_credentials(store_fixture: StoreFixture) {
    let project = ProjectConfig {
        frontend_path: Some("web".to_owned()),
        backend_path: None,
    };

    let written = store_fixture
        .store
        .save_project(&project, &PreferencesConfig::default())
        .unwrap_or_else(|err| panic!("save project: {err}"));

    assert_eq!(written, store_fixture.store.project_path());
    let contents = read_fixture_file(&store_fixture.root, PROJECT_FILE_NAME);
    assert!(contents.contains("[project]"));
    assert!(contents.contains("[preferences]"));
    assert!(!contents.contains("[db]"));
    assert!(!contents.contains("backend_path"));
}

#[rstest]
fn save_then_load_round_trips_credentials(store_fixture: StoreFixture) {
    let db = DbConfig {
        url: Some("https://abc123.supabase.co".to_owned()),
        secret_key: Some("sb_secret_test".to_owned()),
        anon_key: Some("sb_publishable_test".to_owned()),
        password: Some("pw".to_owned()),
        project_ref: Some("abc123".to_owned()),
    };

    store_fixture
        .store
        .save_secrets(&db)
        .unwrap_or_else(|err| panic!("save secrets: {err}"));
    let config = store_fixture
        .store
        .load()
        .unwrap_or_else(|err| panic!("load: {err}"));

    assert_eq!(config.db, db);
}

#[rstest]
fn legacy_service_role_key_field_still_loads(store_fixture: StoreFixture) {
    write_fixture_file(
        &store_fixture.root,
        SECRETS_FILE_NAME,
        "[db]\nservice_role_key = \"legacy-jwt\"\n",
    );

    let config = store_fixture
        .store
        .load()
        .unwrap_or_else(|err| panic!("load: {err}"));

    assert_eq!(config.db.secret_key.as_deref(), Some("legacy-jwt"));
}
