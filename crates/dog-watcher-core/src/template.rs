//! Commit message templates and host address lookup.

use std::net::{IpAddr, Ipv4Addr};

use tracing::warn;

/// Placeholder replaced with the host's primary IPv4 address.
pub const IP_PLACEHOLDER: &str = "{IP}";

/// Source of the host's interface addresses.
pub trait AddressSource: Send + Sync {
    /// All addresses currently bound to local interfaces, in interface order.
    fn addresses(&self) -> Vec<IpAddr>;
}

/// Reads addresses from the operating system's interface table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl AddressSource for SystemInterfaces {
    fn addresses(&self) -> Vec<IpAddr> {
        match if_addrs::get_if_addrs() {
            Ok(interfaces) => interfaces.iter().map(|iface| iface.ip()).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list network interfaces");
                Vec::new()
            }
        }
    }
}

/// A fixed list of addresses.
#[derive(Debug, Clone, Default)]
pub struct FixedAddresses(pub Vec<IpAddr>);

impl AddressSource for FixedAddresses {
    fn addresses(&self) -> Vec<IpAddr> {
        self.0.clone()
    }
}

/// First IPv4 address that is not loopback.
pub fn first_external_ipv4<I>(addresses: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addresses.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
        _ => None,
    })
}

/// Commit message template, e.g. `"Datadog backup from {IP}"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessageTemplate {
    raw: String,
}

impl CommitMessageTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn placeholder_count(&self) -> usize {
        self.raw.matches(IP_PLACEHOLDER).count()
    }

    /// Substitute `address` for the first `{IP}`.
    ///
    /// With no address the placeholder is left in place.
    pub fn render(&self, address: Option<Ipv4Addr>) -> String {
        match address {
            Some(addr) => self.raw.replacen(IP_PLACEHOLDER, &addr.to_string(), 1),
            None => self.raw.clone(),
        }
    }

    /// Render against the addresses reported by `source`.
    pub fn resolve(&self, source: &dyn AddressSource) -> String {
        if self.placeholder_count() == 0 {
            return self.raw.clone();
        }

        let address = first_external_ipv4(source.addresses());
        if address.is_none() {
            warn!(
                template = %self.raw,
                "No non-loopback IPv4 address found; leaving {} unresolved",
                IP_PLACEHOLDER
            );
        }
        self.render(address)
    }
}
