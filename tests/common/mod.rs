use repeater::curl_parser;
use repeater::storage::{NewRequest, SavedRequest, Store};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_store() -> (Arc<Store>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store = Store::open(tmp.path().join("repeater.db")).expect("failed to open store");
    (Arc::new(store), tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub async fn add_request(store: &Store, name: &str, curl: &str) -> SavedRequest {
    let parsed = curl_parser::parse(curl).expect("valid curl command");
    store
        .add_request(NewRequest {
            name: name.to_string(),
            url_pattern: parsed.url.clone(),
            raw_command: curl.to_string(),
            parsed_request: parsed,
            cookie_replace_list: Vec::new(),
            group_id: None,
            chain_next_id: None,
        })
        .await
        .expect("failed to add request")
}
