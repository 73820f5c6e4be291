//! robots.txt fetching, parsing, and per-host caching.
//!
//! Absence of a robots file never blocks scraping: any fetch failure caches
//! an allow-all policy for the host. The cache is shared read-mostly across
//! jobs; whichever job asks first populates it.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Outcome of a robots check for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsDecision {
    Allowed,
    Denied,
}

#[derive(Debug, Clone, Default)]
struct RuleSet {
    allow: Vec<String>,
    disallow: Vec<String>,
    crawl_delay: Option<f64>,
}

/// Parsed robots policy for one host.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// Rule groups keyed by lowercased user-agent token.
    agents: HashMap<String, RuleSet>,
    /// Rules for `User-agent: *`.
    wildcard: RuleSet,
}

impl RobotsPolicy {
    /// Policy permitting everything; used when no robots file exists.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Self {
        let mut policy = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        // Directives before any User-agent line are ignored.
        let mut in_group = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if in_group {
                        // A new group starts after at least one rule directive.
                        current_agents.clear();
                        in_group = false;
                    }
                    current_agents.push(value.to_lowercase());
                }
                "allow" | "disallow" | "crawl-delay" => {
                    in_group = true;
                    for agent in &current_agents {
                        let rules = if agent == "*" {
                            &mut policy.wildcard
                        } else {
                            policy.agents.entry(agent.clone()).or_default()
                        };
                        match directive.as_str() {
                            "allow" if !value.is_empty() => rules.allow.push(value.to_string()),
                            "disallow" if !value.is_empty() => {
                                rules.disallow.push(value.to_string())
                            }
                            "crawl-delay" => {
                                if let Ok(d) = value.parse::<f64>() {
                                    rules.crawl_delay = Some(d);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        policy
    }

    fn rules_for(&self, user_agent: &str) -> &RuleSet {
        let agent = user_agent.to_lowercase();
        // Longest matching agent token wins when several groups apply.
        self.agents
            .iter()
            .filter(|(token, _)| agent.contains(token.as_str()))
            .max_by_key(|(token, _)| token.len())
            .map(|(_, rules)| rules)
            .unwrap_or(&self.wildcard)
    }

    /// Whether `path` is allowed for `user_agent`.
    ///
    /// Longest-match semantics: the most specific matching rule wins, with
    /// allow beating disallow on equal length.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let rules = self.rules_for(user_agent);

        let best_allow = rules
            .allow
            .iter()
            .filter(|r| rule_matches(r, path))
            .map(|r| r.len())
            .max();
        let best_disallow = rules
            .disallow
            .iter()
            .filter(|r| rule_matches(r, path))
            .map(|r| r.len())
            .max();

        match (best_allow, best_disallow) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(d)) => a >= d,
        }
    }

    /// Crawl delay for `user_agent`, if the policy declares one.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let rules = self.rules_for(user_agent);
        rules
            .crawl_delay
            .or(self.wildcard.crawl_delay)
            .map(Duration::from_secs_f64)
    }
}

/// Match a robots rule against a path, supporting `*` wildcards and the `$`
/// end anchor.
fn rule_matches(rule: &str, path: &str) -> bool {
    let (rule, anchored) = match rule.strip_suffix('$') {
        Some(r) => (r, true),
        None => (rule, false),
    };

    let mut remaining = path;
    let mut segments = rule.split('*');

    // First segment must match at the start.
    if let Some(first) = segments.next() {
        if !remaining.starts_with(first) {
            return false;
        }
        remaining = &remaining[first.len()..];
    }

    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        match remaining.find(segment) {
            Some(idx) => remaining = &remaining[idx + segment.len()..],
            None => return false,
        }
    }

    if anchored {
        // Anchored rules must consume the whole path unless they end in '*'.
        rule.ends_with('*') || remaining.is_empty()
    } else {
        true
    }
}

/// Per-host robots policy cache.
pub struct RobotsCache {
    client: reqwest::Client,
    user_agent: String,
    enabled: bool,
    hosts: RwLock<HashMap<String, RobotsPolicy>>,
}

impl RobotsCache {
    pub fn new(user_agent: impl Into<String>, enabled: bool) -> Self {
        let user_agent = user_agent.into();
        let client = reqwest::Client::builder()
            .user_agent(user_agent.clone())
            .timeout(Duration::from_secs(10))
            .build()
            // Falls back to default client settings only if the builder
            // rejects the user agent, which a static string never triggers.
            .unwrap_or_default();

        Self {
            client,
            user_agent,
            enabled,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a host's policy without fetching. Useful for tests and for
    /// prewarming from a previous run.
    pub async fn prime(&self, host: impl Into<String>, policy: RobotsPolicy) {
        self.hosts.write().await.insert(host.into(), policy);
    }

    /// Check whether the configured user agent may fetch `url`.
    pub async fn check(&self, url: &str) -> RobotsDecision {
        if !self.enabled {
            return RobotsDecision::Allowed;
        }

        let Ok(parsed) = Url::parse(url) else {
            return RobotsDecision::Allowed;
        };
        let Some(host) = parsed.host_str().map(|h| h.to_string()) else {
            return RobotsDecision::Allowed;
        };

        let policy_allows = {
            let hosts = self.hosts.read().await;
            hosts
                .get(&host)
                .map(|p| p.is_allowed(&self.user_agent, parsed.path()))
        };

        let allowed = match policy_allows {
            Some(allowed) => allowed,
            None => {
                let policy = self.fetch_policy(&parsed).await;
                let allowed = policy.is_allowed(&self.user_agent, parsed.path());
                self.hosts.write().await.insert(host.clone(), policy);
                allowed
            }
        };

        if allowed {
            RobotsDecision::Allowed
        } else {
            debug!("robots.txt denies {}", url);
            RobotsDecision::Denied
        }
    }

    /// Crawl delay declared by the (cached) policy for this URL's host.
    pub async fn crawl_delay(&self, url: &str) -> Option<Duration> {
        let host = Url::parse(url).ok()?.host_str()?.to_string();
        let hosts = self.hosts.read().await;
        hosts.get(&host)?.crawl_delay(&self.user_agent)
    }

    async fn fetch_policy(&self, page_url: &Url) -> RobotsPolicy {
        let robots_url = format!(
            "{}://{}/robots.txt",
            page_url.scheme(),
            page_url.host_str().unwrap_or_default()
        );

        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(content) => RobotsPolicy::parse(&content),
                Err(e) => {
                    warn!("Failed to read {}: {}; allowing all", robots_url, e);
                    RobotsPolicy::allow_all()
                }
            },
            Ok(response) => {
                debug!(
                    "{} returned HTTP {}; allowing all",
                    robots_url,
                    response.status()
                );
                RobotsPolicy::allow_all()
            }
            Err(e) => {
                debug!("Failed to fetch {}: {}; allowing all", robots_url, e);
                RobotsPolicy::allow_all()
            }
        }
    }
}
