//! Output data model shared by the store, selector, scope filter and differ.
//!
//! An enumeration is identified by an opaque [`EnumerationId`] and covers a
//! [`TimeRange`]. Its discovered assets are [`OutputRecord`]s: a hostname plus
//! the addresses it resolved to. Only the IP value of an [`AddressInfo`] takes
//! part in comparisons; netblock, ASN and description are carried for display.
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of one completed enumeration run.
pub type EnumerationId = String;

/// Earliest and latest activity recorded for an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(earliest: DateTime<Utc>, latest: DateTime<Utc>) -> Self {
        Self { earliest, latest }
    }
}

/// A resolved address with the metadata the store attaches to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressInfo {
    #[serde(rename = "ip")]
    pub address: IpAddr,
    #[serde(rename = "cidr", default, skip_serializing_if = "Option::is_none")]
    pub netblock: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AddressInfo {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            netblock: None,
            asn: None,
            description: None,
        }
    }

    /// Address equality by value. IPv4-mapped IPv6 addresses compare equal to
    /// their IPv4 form; all other metadata is ignored.
    pub fn same_address(&self, other: &AddressInfo) -> bool {
        self.address.to_canonical() == other.address.to_canonical()
    }
}

impl From<IpAddr> for AddressInfo {
    fn from(address: IpAddr) -> Self {
        Self::new(address)
    }
}

/// One discovered hostname within an enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<AddressInfo>,
}

impl OutputRecord {
    pub fn new(name: impl Into<String>, addresses: Vec<AddressInfo>) -> Self {
        Self {
            name: name.into(),
            addresses,
        }
    }

    /// Convenience constructor from bare IPs, mostly for tests and embedding.
    pub fn with_ips(name: impl Into<String>, ips: &[IpAddr]) -> Self {
        Self::new(name, ips.iter().copied().map(AddressInfo::from).collect())
    }
}

/// Comma-separated address line, in recorded order.
pub struct AddressLine<'a>(pub &'a [AddressInfo]);

impl fmt::Display for AddressLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, a) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", a.address)?;
        }
        Ok(())
    }
}

pub fn line_of_addresses(addrs: &[AddressInfo]) -> String {
    AddressLine(addrs).to_string()
}
