//! Repository Classifier - decides whether a declared mirror is still alive
//!
//! A declaration is checked in order: its host must resolve, its service port
//! must accept connections, and then one of the well-known index files must be
//! fetchable under one of three URL layouts:
//!
//! - **Flat**: `<mirror>/<file>`
//! - **Dists**: `<mirror>/dists/<dist>/<file>` (skipped for the "./" dist)
//! - **Host root**: `http://<host>/<file>`
//!
//! The first fetchable candidate makes the declaration good; nothing after it
//! is probed.

use crate::config::Config;
use crate::declaration::RepoDeclaration;
use crate::probe::{DnsResolver, HostResolver, HttpUrlProber, ServiceProber, TcpServiceProber, UrlProber};
use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Index artifacts probed in each tier, in probe order
pub const INDEX_CANDIDATES: [&str; 6] = [
    "Release.gpg",
    "en.bz2",
    "Release",
    "Packages.bz2",
    "Packages.gz",
    "Packages",
];

/// Why a declaration was judged bad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadReason {
    /// DNS lookup of the mirror host failed
    HostnameUnresolved,
    /// The mirror's service port refused, timed out, or its scheme is unknown
    ServiceOffline,
    /// No tier served any index candidate
    NoValidIndexFound,
}

impl BadReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadReason::HostnameUnresolved => "Hostname does not resolve.",
            BadReason::ServiceOffline => "Service not online.",
            BadReason::NoValidIndexFound => "Not a valid repository.",
        }
    }
}

impl fmt::Display for BadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Good,
    Bad(BadReason),
}

/// A declaration together with its verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub declaration: RepoDeclaration,
    pub verdict: Verdict,
}

impl Classification {
    pub fn is_good(&self) -> bool {
        self.verdict == Verdict::Good
    }

    pub fn reason(&self) -> Option<BadReason> {
        match self.verdict {
            Verdict::Good => None,
            Verdict::Bad(reason) => Some(reason),
        }
    }
}

/// URL layout tried when looking for index files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Flat,
    Dists,
    HostRoot,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Flat, Tier::Dists, Tier::HostRoot];

    /// Candidate URL for `file`, or `None` when the tier does not apply
    pub fn url(&self, decl: &RepoDeclaration, file: &str) -> Option<String> {
        match self {
            Tier::Flat => Some(format!("{}{}", decl.mirror_url, file)),
            Tier::Dists if decl.is_flat() => None,
            Tier::Dists => Some(format!(
                "{}dists/{}/{}",
                decl.mirror_url, decl.dist_path, file
            )),
            Tier::HostRoot => Some(format!("http://{}/{}", decl.hostname(), file)),
        }
    }
}

/// Fixed per-run classifier settings
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    /// Client identifier sent with each retrieval
    pub user_agent: String,
    /// Trace every probe at info level
    pub verbose: bool,
}

impl ClassifierSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            user_agent: config.user_agent(),
            verbose: config.probe.verbose,
        }
    }
}

/// Tiered reachability classifier
#[derive(Clone)]
pub struct Classifier {
    resolver: Arc<dyn HostResolver>,
    service: Arc<dyn ServiceProber>,
    fetcher: Arc<dyn UrlProber>,
    settings: Arc<ClassifierSettings>,
}

impl Classifier {
    pub fn new(
        resolver: Arc<dyn HostResolver>,
        service: Arc<dyn ServiceProber>,
        fetcher: Arc<dyn UrlProber>,
        settings: ClassifierSettings,
    ) -> Self {
        Self {
            resolver,
            service,
            fetcher,
            settings: Arc::new(settings),
        }
    }

    /// Build a classifier backed by real DNS, TCP and HTTP probes
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.probe_timeout();

        Ok(Self::new(
            Arc::new(DnsResolver::new(timeout)),
            Arc::new(TcpServiceProber::new(
                config.probe.service_ports.clone(),
                timeout,
            )),
            Arc::new(HttpUrlProber::new(timeout)?),
            ClassifierSettings::from_config(config),
        ))
    }

    /// Classify a single declaration
    pub async fn classify(&self, decl: &RepoDeclaration) -> Classification {
        let verdict = self.verdict(decl).await;

        debug!(
            "{} ({}): {:?}",
            decl.mirror_url, decl.source_filename, verdict
        );

        Classification {
            declaration: decl.clone(),
            verdict,
        }
    }

    async fn verdict(&self, decl: &RepoDeclaration) -> Verdict {
        let hostname = decl.hostname();

        self.trace(format_args!("Checking if {} resolves to an IP", hostname));
        if !self.resolver.resolves(hostname).await {
            self.trace(format_args!("{} does not resolve", hostname));
            return Verdict::Bad(BadReason::HostnameUnresolved);
        }

        self.trace(format_args!("Checking if {} is online", decl.mirror_url));
        if !self.service.is_online(&decl.mirror_url).await {
            self.trace(format_args!("{} is not online", decl.mirror_url));
            return Verdict::Bad(BadReason::ServiceOffline);
        }

        for tier in Tier::ALL {
            if self.probe_tier(tier, decl).await {
                return Verdict::Good;
            }
        }

        self.trace(format_args!("{} has failed all file checks", decl.mirror_url));
        Verdict::Bad(BadReason::NoValidIndexFound)
    }

    /// True as soon as one candidate in `tier` is fetchable
    async fn probe_tier(&self, tier: Tier, decl: &RepoDeclaration) -> bool {
        for file in INDEX_CANDIDATES {
            let Some(url) = tier.url(decl, file) else {
                return false;
            };

            let fetchable = self
                .fetcher
                .is_fetchable(&url, &self.settings.user_agent)
                .await;
            self.trace(format_args!(
                "Checking if {} is there: {}",
                url,
                if fetchable { "yes" } else { "no" }
            ));

            if fetchable {
                return true;
            }
        }

        false
    }

    /// Classify many declarations with at most `max_parallel` in flight.
    ///
    /// Results come back in input order.
    pub async fn classify_all(
        &self,
        declarations: &[RepoDeclaration],
        max_parallel: usize,
    ) -> Vec<Classification> {
        let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
        let mut futures = FuturesUnordered::new();

        for (index, decl) in declarations.iter().enumerate() {
            let semaphore = semaphore.clone();

            futures.push(async move {
                // The semaphore is local and never closed
                let _permit = semaphore.acquire().await.ok();
                (index, self.classify(decl).await)
            });
        }

        let mut results = Vec::with_capacity(declarations.len());
        while let Some(result) = futures.next().await {
            results.push(result);
        }

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, c)| c).collect()
    }

    fn trace(&self, message: fmt::Arguments<'_>) {
        if self.settings.verbose {
            info!("{}", message);
        }
    }
}
