//! Common test utilities and helpers for aptsentry tests

#![allow(dead_code)]

use aptsentry::probe::{HostResolver, ServiceProber, UrlProber};
use aptsentry::{Classifier, ClassifierSettings, Config, SweepEngine};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A throwaway sources directory with its own configuration
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub sources_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let sources_dir = temp_dir.path().join("sources.list.d");
        std::fs::create_dir_all(&sources_dir).expect("Failed to create sources dir");

        Self {
            temp_dir,
            sources_dir,
        }
    }

    pub fn retired_dir(&self) -> PathBuf {
        self.sources_dir.join("retired")
    }

    pub fn write_list(&self, name: &str, content: &str) -> PathBuf {
        let path = self.sources_dir.join(name);
        std::fs::write(&path, content).expect("Failed to write declaration file");
        path
    }

    pub fn write_retired_list(&self, name: &str, content: &str) -> PathBuf {
        std::fs::create_dir_all(self.retired_dir()).expect("Failed to create retired dir");
        let path = self.retired_dir().join(name);
        std::fs::write(&path, content).expect("Failed to write declaration file");
        path
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.sources_directory = self.sources_dir.to_string_lossy().to_string();
        config.probe.user_agent = Some("aptsentry-test".to_string());
        config
    }

    /// Write a YAML config file pointing at this environment
    pub fn write_config(&self, connectivity_url: &str) -> PathBuf {
        let mut config = self.config();
        config.probe.connectivity_url = connectivity_url.to_string();
        config.probe.timeout = 2;

        let path = self.temp_dir.path().join("config.yml");
        config.save(&path).expect("Failed to write test config");
        path
    }

    pub fn engine(&self, network: Arc<FakeNetwork>) -> SweepEngine {
        self.engine_with(self.config(), network)
    }

    pub fn engine_with(&self, config: Config, network: Arc<FakeNetwork>) -> SweepEngine {
        let settings = ClassifierSettings::from_config(&config);
        let classifier = Classifier::new(network.clone(), network.clone(), network, settings);
        SweepEngine::new(config, classifier)
    }
}

/// In-memory network: only the registered hosts, services and URLs answer
#[derive(Default)]
pub struct FakeNetwork {
    resolvable: HashSet<String>,
    online: HashSet<String>,
    fetchable: HashSet<String>,
    fetches: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolving(mut self, host: &str) -> Self {
        self.resolvable.insert(host.to_string());
        self
    }

    /// Host resolves and the mirror's service port accepts connections
    pub fn online(mut self, mirror_url: &str) -> Self {
        let host = mirror_url.split('/').nth(2).unwrap_or("").to_string();
        self.resolvable.insert(host);
        self.online.insert(mirror_url.to_string());
        self
    }

    pub fn serving(mut self, url: &str) -> Self {
        self.fetchable.insert(url.to_string());
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostResolver for FakeNetwork {
    async fn resolves(&self, host: &str) -> bool {
        self.resolvable.contains(host)
    }
}

#[async_trait]
impl ServiceProber for FakeNetwork {
    async fn is_online(&self, mirror_url: &str) -> bool {
        self.online.contains(mirror_url)
    }
}

#[async_trait]
impl UrlProber for FakeNetwork {
    async fn is_fetchable(&self, url: &str, _user_agent: &str) -> bool {
        self.fetches.lock().unwrap().push(url.to_string());
        self.fetchable.contains(url)
    }
}

pub fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).expect("Failed to read file")
}

/// Assertion helpers for test validation
pub fn assert_contains_any(text: &str, expected: &[&str]) {
    let found = expected.iter().any(|item| text.contains(item));
    assert!(
        found,
        "Expected text to contain at least one of {:?}, but it didn't. Text: {}",
        expected,
        text
    );
}
