// src/resolver.rs
use crate::error::{Result, SubhiveError};
use crate::types::ResolverConfig;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use trust_dns_resolver::config::{
    NameServerConfig, Protocol, ResolverConfig as DnsResolverConfig, ResolverOpts,
};
use trust_dns_resolver::TokioAsyncResolver;

pub struct Resolver {
    resolver: TokioAsyncResolver,
    semaphore: Arc<Semaphore>,
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let resolver = if config.use_system_resolver {
            TokioAsyncResolver::tokio_from_system_conf().map_err(|e| {
                SubhiveError::Resolution(format!("Failed to create system resolver: {}", e))
            })?
        } else {
            let mut resolver_config = DnsResolverConfig::new();

            for ns in &config.nameservers {
                let socket_addr = SocketAddr::from_str(ns).map_err(|e| {
                    SubhiveError::Config(format!("Invalid nameserver address {}: {}", ns, e))
                })?;
                resolver_config.add_name_server(NameServerConfig {
                    socket_addr,
                    protocol: Protocol::Udp,
                    tls_dns_name: None,
                    trust_negative_responses: false,
                    bind_addr: None,
                });
            }

            let mut opts = ResolverOpts::default();
            opts.timeout = config.timeout;
            opts.attempts = 2;

            TokioAsyncResolver::tokio(resolver_config, opts)
        };

        Ok(Self {
            resolver,
            semaphore: Arc::new(Semaphore::new(config.threads.max(1))),
        })
    }

    /// Maps every domain to its first address, or `None` when the lookup
    /// failed. Failures are not errors for the run.
    pub async fn resolve_all(&self, domains: &[String]) -> BTreeMap<String, Option<IpAddr>> {
        let mut futures = FuturesUnordered::new();

        for domain in domains {
            let resolver = self.resolver.clone();
            let semaphore = self.semaphore.clone();
            let domain = domain.clone();

            futures.push(async move {
                let ip = match semaphore.acquire_owned().await {
                    Ok(_permit) => Self::first_address(&resolver, &domain).await,
                    Err(_) => None,
                };
                (domain, ip)
            });
        }

        let mut resolved = BTreeMap::new();
        while let Some((domain, ip)) = futures.next().await {
            resolved.insert(domain, ip);
        }
        resolved
    }

    async fn first_address(resolver: &TokioAsyncResolver, hostname: &str) -> Option<IpAddr> {
        match resolver.lookup_ip(hostname).await {
            Ok(lookup) => lookup.iter().next(),
            Err(e) => {
                debug!("No address for {}: {}", hostname, e);
                None
            }
        }
    }

    pub async fn resolve_single(&self, hostname: &str) -> Result<IpAddr> {
        let _permit = self.semaphore.acquire().await.map_err(|e| {
            SubhiveError::Resolution(format!("Failed to acquire semaphore: {}", e))
        })?;

        let lookup = self
            .resolver
            .lookup_ip(hostname)
            .await
            .map_err(|e| SubhiveError::Resolution(format!("Failed to resolve {}: {}", hostname, e)))?;

        lookup
            .iter()
            .next()
            .ok_or_else(|| SubhiveError::Resolution(format!("No address for {}", hostname)))
    }

    /// Best-effort resolvability check for a scan target; never fatal.
    pub async fn check_target(&self, host: &str) -> Option<IpAddr> {
        match self.resolve_single(host).await {
            Ok(ip) => {
                info!("Searching for subdomains for {} ({})", ip, host);
                Some(ip)
            }
            Err(e) => {
                warn!(
                    "Error connecting to target {}! Make sure it is spelled correctly and resolvable",
                    host
                );
                debug!("{}", e);
                None
            }
        }
    }
}
