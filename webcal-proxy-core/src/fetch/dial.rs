//! Resolve, vet and dial upstream addresses.
//!
//! Only globally routable unicast addresses are dialed so a caller can't
//! point the proxy at the host it runs on or at its private network.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::FetchError;

/// What may be dialed and how long dialing may take in total.
#[derive(Debug, Clone)]
pub struct DialPolicy {
    pub allow_loopback: bool,
    pub timeout: Duration,
}

impl DialPolicy {
    pub fn permits(&self, class: AddressClass) -> bool {
        match class {
            AddressClass::Global => true,
            AddressClass::Loopback => self.allow_loopback,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    Global,
    Unspecified,
    Loopback,
    Private,
    LinkLocal,
    Multicast,
    Broadcast,
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressClass::Global => "global unicast",
            AddressClass::Unspecified => "unspecified",
            AddressClass::Loopback => "loopback",
            AddressClass::Private => "private",
            AddressClass::LinkLocal => "link-local",
            AddressClass::Multicast => "multicast",
            AddressClass::Broadcast => "broadcast",
        };
        f.write_str(name)
    }
}

/// Classify an address. IPv4-mapped IPv6 addresses are classified as IPv4.
pub fn classify(ip: IpAddr) -> AddressClass {
    match ip {
        IpAddr::V4(v4) => classify_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => classify_v4(v4),
            None => classify_v6(v6),
        },
    }
}

fn classify_v4(ip: Ipv4Addr) -> AddressClass {
    if ip.is_unspecified() {
        AddressClass::Unspecified
    } else if ip.is_loopback() {
        AddressClass::Loopback
    } else if ip.is_private() {
        AddressClass::Private
    } else if ip.is_link_local() {
        AddressClass::LinkLocal
    } else if ip.is_multicast() {
        AddressClass::Multicast
    } else if ip.is_broadcast() {
        AddressClass::Broadcast
    } else {
        AddressClass::Global
    }
}

fn classify_v6(ip: Ipv6Addr) -> AddressClass {
    let first = ip.segments()[0];
    if ip.is_unspecified() {
        AddressClass::Unspecified
    } else if ip.is_loopback() {
        AddressClass::Loopback
    } else if first & 0xfe00 == 0xfc00 {
        // fc00::/7 unique local
        AddressClass::Private
    } else if first & 0xffc0 == 0xfe80 {
        AddressClass::LinkLocal
    } else if ip.is_multicast() {
        AddressClass::Multicast
    } else {
        AddressClass::Global
    }
}

/// Why a candidate address was not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialFailure {
    Rejected(AddressClass),
    TimedOut(Duration),
    Io(String),
}

/// One candidate address and why dialing it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialAttempt {
    pub address: SocketAddr,
    pub failure: DialFailure,
}

impl fmt::Display for DialAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            DialFailure::Rejected(class) => write!(f, "{}: refused {} address", self.address, class),
            DialFailure::TimedOut(after) => {
                write!(f, "{}: timed out after {}ms", self.address, after.as_millis())
            }
            DialFailure::Io(err) => write!(f, "{}: {}", self.address, err),
        }
    }
}

/// Candidate addresses for `host`. A literal IP is its only candidate.
pub async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, FetchError> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }

    let candidates: Vec<SocketAddr> = tokio::net::lookup_host((bare, port))
        .await
        .map_err(|source| FetchError::Resolution {
            host: host.to_string(),
            source,
        })?
        .collect();

    if candidates.is_empty() {
        return Err(FetchError::Resolution {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
        });
    }
    Ok(candidates)
}

/// Connect to the first permitted candidate address of `host` that answers.
pub async fn connect(host: &str, port: u16, policy: &DialPolicy) -> Result<TcpStream, FetchError> {
    let candidates = resolve(host, port).await?;
    dial_each(host, port, &candidates, policy, TcpStream::connect).await
}

/// Each of `candidates` candidates gets an equal share of `total`, with one
/// share held back for the request itself.
fn attempt_budget(total: Duration, candidates: usize) -> Duration {
    let shares = u32::try_from(candidates).unwrap_or(u32::MAX).saturating_add(1);
    total / shares
}

/// Dial `candidates` one at a time until one connects.
///
/// Addresses the policy forbids are recorded as rejected and never dialed.
async fn dial_each<F, Fut>(
    host: &str,
    port: u16,
    candidates: &[SocketAddr],
    policy: &DialPolicy,
    dial: F,
) -> Result<TcpStream, FetchError>
where
    F: Fn(SocketAddr) -> Fut,
    Fut: Future<Output = io::Result<TcpStream>>,
{
    let budget = attempt_budget(policy.timeout, candidates.len());

    let mut attempts = Vec::with_capacity(candidates.len());
    for &address in candidates {
        let class = classify(address.ip());
        if !policy.permits(class) {
            tracing::warn!(host, %address, %class, "Refusing to dial address");
            attempts.push(DialAttempt {
                address,
                failure: DialFailure::Rejected(class),
            });
            continue;
        }

        match timeout(budget, dial(address)).await {
            Ok(Ok(stream)) => {
                tracing::debug!(host, %address, "Connected");
                return Ok(stream);
            }
            Ok(Err(e)) => {
                tracing::debug!(host, %address, error = %e, "Dial failed");
                attempts.push(DialAttempt {
                    address,
                    failure: DialFailure::Io(e.to_string()),
                });
            }
            Err(_) => {
                tracing::debug!(host, %address, "Dial timed out");
                attempts.push(DialAttempt {
                    address,
                    failure: DialFailure::TimedOut(budget),
                });
            }
        }
    }

    Err(FetchError::Dial {
        host: host.to_string(),
        port,
        attempts,
    })
}
