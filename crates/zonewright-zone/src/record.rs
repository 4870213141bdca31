//! Resource record model.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, ZoneError};

// ============================================================================
// Record Type
// ============================================================================

/// Record type mnemonic.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address.
    A,
    /// IPv6 address.
    AAAA,
    /// Canonical name.
    CNAME,
    /// Mail exchanger.
    MX,
    /// Name server.
    NS,
    /// Reverse pointer.
    PTR,
    /// Service locator.
    SRV,
    /// Text.
    TXT,
    /// Certification authority authorization.
    CAA,
    /// Start of authority. Never returned by the record parser.
    SOA,
    /// Any other mnemonic, stored uppercased.
    Other(String),
}

impl RecordType {
    /// Returns the mnemonic.
    pub fn as_str(&self) -> &str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
            Self::CNAME => "CNAME",
            Self::MX => "MX",
            Self::NS => "NS",
            Self::PTR => "PTR",
            Self::SRV => "SRV",
            Self::TXT => "TXT",
            Self::CAA => "CAA",
            Self::SOA => "SOA",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Ok(match upper.as_str() {
            "A" => Self::A,
            "AAAA" => Self::AAAA,
            "CNAME" => Self::CNAME,
            "MX" => Self::MX,
            "NS" => Self::NS,
            "PTR" => Self::PTR,
            "SRV" => Self::SRV,
            "TXT" => Self::TXT,
            "CAA" => Self::CAA,
            "SOA" => Self::SOA,
            _ if !upper.is_empty() && upper.chars().all(|c| c.is_ascii_alphanumeric()) => Self::Other(upper),
            _ => return Err(ZoneError::invalid(format!("'{s}' is not a record type"))),
        })
    }
}

impl Serialize for RecordType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RecordType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Resource Record
// ============================================================================

/// A record line from a zone master file.
///
/// `name` is kept exactly as written (`@`, relative, or absolute). MX uses
/// `priority`; SRV uses `priority`, `weight` and `port`. `value` is the rest
/// of the data with single spaces between tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Owner name.
    pub name: String,
    /// Explicit TTL, `None` to inherit `$TTL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Record type.
    #[serde(rename = "type")]
    pub rtype: RecordType,
    /// MX preference or SRV priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    /// SRV weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
    /// SRV port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Record data after the type-specific numeric fields.
    pub value: String,
}

impl ResourceRecord {
    /// Creates a record without TTL or numeric fields.
    pub fn new(name: impl Into<String>, rtype: RecordType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ttl: None,
            rtype,
            priority: None,
            weight: None,
            port: None,
            value: value.into(),
        }
    }

    /// Creates an MX record.
    pub fn mx(name: impl Into<String>, priority: u16, exchange: impl Into<String>) -> Self {
        Self {
            priority: Some(priority),
            ..Self::new(name, RecordType::MX, exchange)
        }
    }

    /// Creates an SRV record.
    pub fn srv(name: impl Into<String>, priority: u16, weight: u16, port: u16, target: impl Into<String>) -> Self {
        Self {
            priority: Some(priority),
            weight: Some(weight),
            port: Some(port),
            ..Self::new(name, RecordType::SRV, target)
        }
    }

    /// Sets the TTL.
    pub fn with_ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the full data portion as written after the type.
    pub fn rdata(&self) -> String {
        match self.rtype {
            RecordType::MX => format!("{} {}", self.priority.unwrap_or_default(), self.value),
            RecordType::SRV => format!(
                "{} {} {} {}",
                self.priority.unwrap_or_default(),
                self.weight.unwrap_or_default(),
                self.port.unwrap_or_default(),
                self.value
            ),
            _ => self.value.clone(),
        }
    }

    /// Checks that the record can be written to a zone file.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.chars().any(|c| c.is_whitespace() || c == ';') {
            return Err(ZoneError::invalid(format!("'{}' is not a valid owner name", self.name)));
        }
        let value = self.value.trim();
        if value.is_empty() {
            return Err(ZoneError::invalid(format!("{} record for {} has no value", self.rtype, self.name)));
        }
        if value.contains(['\n', '\r', '(', ')']) {
            return Err(ZoneError::invalid("record value must be a single line"));
        }

        match self.rtype {
            RecordType::A => {
                value
                    .parse::<Ipv4Addr>()
                    .map_err(|_| ZoneError::invalid(format!("'{value}' is not an IPv4 address")))?;
            }
            RecordType::AAAA => {
                value
                    .parse::<Ipv6Addr>()
                    .map_err(|_| ZoneError::invalid(format!("'{value}' is not an IPv6 address")))?;
            }
            RecordType::MX if self.priority.is_none() => {
                return Err(ZoneError::invalid("MX record requires a priority"));
            }
            RecordType::SRV if self.priority.is_none() || self.weight.is_none() || self.port.is_none() => {
                return Err(ZoneError::invalid("SRV record requires priority, weight and port"));
            }
            RecordType::SOA => {
                return Err(ZoneError::invalid("the SOA record is managed through the serial"));
            }
            _ => {}
        }
        Ok(())
    }
}

// ============================================================================
// Selector
// ============================================================================

/// Identifies the record an update or delete applies to.
///
/// Records are identified by owner name and type. When `value` is set, the
/// first record whose value (or full data) also matches is chosen; without a
/// value the pair must match exactly one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSelector {
    /// Owner name.
    pub name: String,
    /// Record type.
    #[serde(rename = "type")]
    pub rtype: RecordType,
    /// Value to narrow the match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl RecordSelector {
    /// Creates a selector for a name and type.
    pub fn new(name: impl Into<String>, rtype: RecordType) -> Self {
        Self {
            name: name.into(),
            rtype,
            value: None,
        }
    }

    /// Narrows the selector by value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Returns true if the record has this selector's name and type (and
    /// value, when set).
    pub fn matches(&self, record: &ResourceRecord) -> bool {
        if record.rtype != self.rtype || !same_owner(&record.name, &self.name) {
            return false;
        }
        match &self.value {
            Some(value) => {
                let value = value.trim();
                record.value == value || record.rdata() == value
            }
            None => true,
        }
    }

    /// Picks the index of the target record.
    pub fn select(&self, records: &[ResourceRecord]) -> Result<usize> {
        let mut hits = records
            .iter()
            .enumerate()
            .filter(|(_, r)| self.matches(r))
            .map(|(i, _)| i);

        let Some(first) = hits.next() else {
            return Err(ZoneError::RecordNotFound {
                name: self.name.clone(),
                rtype: self.rtype.to_string(),
            });
        };

        if self.value.is_none() {
            let extra = hits.count();
            if extra > 0 {
                return Err(ZoneError::AmbiguousRecord {
                    name: self.name.clone(),
                    rtype: self.rtype.to_string(),
                    count: extra + 1,
                });
            }
        }
        Ok(first)
    }
}

fn same_owner(a: &str, b: &str) -> bool {
    a.trim_end_matches('.').eq_ignore_ascii_case(b.trim_end_matches('.'))
}
