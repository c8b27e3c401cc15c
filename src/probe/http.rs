use crate::config::ProbeConfig;
use crate::domain::Domain;
use crate::error::{Context, Result};
use crate::probe::{FailureKind, ProbeOutcome, Prober};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::{Duration, Instant};
use url::Url;

const MAX_REDIRECTS: usize = 5;

/// Probes `<scheme>://<domain>/` with a single GET bounded by the configured timeout.
#[derive(Clone, Debug)]
pub struct HttpProber {
    client: Client,
    scheme: String,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(config.user_agent.as_str())
            .build()
            .context("failed to build probe http client")?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
            timeout: config.timeout,
        })
    }

    pub fn target_url(&self, domain: &Domain) -> Result<Url> {
        let raw = format!("{}://{}/", self.scheme, domain.as_str());
        Url::parse(&raw).with_context(|| format!("invalid probe target `{raw}`"))
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, domain: &Domain) -> ProbeOutcome {
        let url = match self.target_url(domain) {
            Ok(url) => url,
            Err(err) => {
                tracing::debug!(domain = %domain, error = %err, "probe target rejected");
                return ProbeOutcome::Failure {
                    kind: FailureKind::InvalidTarget,
                    elapsed: Duration::ZERO,
                };
            }
        };

        let started = Instant::now();
        match self.client.get(url).send().await {
            Ok(response) => ProbeOutcome::Response {
                status_code: response.status().as_u16(),
                elapsed: started.elapsed(),
            },
            Err(err) => {
                let kind = failure_kind(&err);
                tracing::debug!(domain = %domain, kind = %kind, error = %err, "probe failed");
                ProbeOutcome::Failure {
                    kind,
                    elapsed: started.elapsed().min(self.timeout),
                }
            }
        }
    }
}

fn failure_kind(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Connect
    } else if err.is_builder() {
        FailureKind::InvalidTarget
    } else {
        FailureKind::Request
    }
}
