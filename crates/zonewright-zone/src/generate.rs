//! Zone file generation.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use zonewright_conf::{is_reverse_name, normalize_zone_name};

use crate::error::Result;
use crate::parse::format;
use crate::record::{RecordType, ResourceRecord};
use crate::serial::initial_serial;

/// Number of host entries in a reverse PTR sweep.
pub const PTR_SWEEP_LEN: u8 = 254;

/// Parameters for a generated zone file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneFileOptions {
    /// `$TTL` value.
    pub ttl: u32,
    /// SOA refresh.
    pub refresh: u32,
    /// SOA retry.
    pub retry: u32,
    /// SOA expire.
    pub expire: u32,
    /// SOA minimum.
    pub minimum: u32,
    /// Responsible mailbox, either a label (qualified with the zone) or a
    /// full address with `@` or dots.
    pub hostmaster: String,
    /// First label of the primary name server, qualified with the zone.
    pub nameserver_prefix: String,
    /// Primary name server, overriding `nameserver_prefix`.
    pub nameserver: Option<String>,
    /// Address for the glue and host records.
    pub address: Ipv4Addr,
    /// Emit `host<N>` PTR records for 1 to 254 in reverse zones.
    pub auto_generate_ptr: bool,
    /// Domain the sweep's PTR targets live in.
    pub ptr_domain: String,
    /// Serial to start with, `YYYYMMDD01` when `None`.
    pub serial: Option<u64>,
}

impl Default for ZoneFileOptions {
    fn default() -> Self {
        Self {
            ttl: 86_400,
            refresh: 3_600,
            retry: 1_800,
            expire: 604_800,
            minimum: 86_400,
            hostmaster: "hostmaster".to_string(),
            nameserver_prefix: "ns1".to_string(),
            nameserver: None,
            address: Ipv4Addr::LOCALHOST,
            auto_generate_ptr: false,
            ptr_domain: "localdomain".to_string(),
            serial: None,
        }
    }
}

impl ZoneFileOptions {
    /// Returns the fully-qualified primary name server for `zone`.
    pub fn nameserver_for(&self, zone: &str) -> String {
        match &self.nameserver {
            Some(ns) => absolute(ns),
            None => format!("{}.{}", self.nameserver_prefix, zone),
        }
    }

    /// Returns the SOA mailbox for `zone`.
    pub fn hostmaster_for(&self, zone: &str) -> String {
        let mailbox = self.hostmaster.replace('@', ".");
        if mailbox.contains('.') {
            absolute(&mailbox)
        } else {
            format!("{mailbox}.{zone}")
        }
    }
}

/// Generates a master file for a new zone.
///
/// Forward zones get NS, the name server's A record and A records for the
/// apex and `www`. Reverse zones get NS with glue and, when requested, a
/// sweep of PTR records for hosts 1 to 254.
pub fn generate_zone_file(name: &str, options: &ZoneFileOptions) -> Result<String> {
    let zone = normalize_zone_name(name)?;
    let ns = options.nameserver_for(&zone);
    let address = options.address.to_string();

    let mut out = soa_header(&zone, options, options.serial.unwrap_or_else(initial_serial));
    out.push_str(&format!("; {zone}\n"));
    push(&mut out, ResourceRecord::new("@", RecordType::NS, ns.as_str()));

    let glue = glue_label(&ns, &zone);
    if let Some(label) = &glue {
        push(&mut out, ResourceRecord::new(label.as_str(), RecordType::A, address.as_str()));
    }

    if is_reverse_name(&zone) {
        if options.auto_generate_ptr {
            let domain = options.ptr_domain.trim_end_matches('.');
            out.push_str("; host PTR records\n");
            for host in 1..=PTR_SWEEP_LEN {
                push(
                    &mut out,
                    ResourceRecord::new(host.to_string(), RecordType::PTR, format!("host{host}.{domain}.")),
                );
            }
        }
    } else {
        push(&mut out, ResourceRecord::new("@", RecordType::A, address.as_str()));
        push(&mut out, ResourceRecord::new("www", RecordType::A, address.as_str()));
    }

    Ok(out)
}

/// Generates the file a slave zone starts with before its first transfer.
pub fn placeholder_slave_file(name: &str, options: &ZoneFileOptions) -> Result<String> {
    let zone = normalize_zone_name(name)?;
    let mut out = format!("; placeholder for slave zone {zone}, replaced by the first transfer\n");
    out.push_str(&soa_header(&zone, options, 1));
    push(&mut out, ResourceRecord::new("@", RecordType::NS, options.nameserver_for(&zone)));
    Ok(out)
}

fn soa_header(zone: &str, options: &ZoneFileOptions, serial: u64) -> String {
    let ns = options.nameserver_for(zone);
    let hostmaster = options.hostmaster_for(zone);
    format!(
        "$TTL {ttl}\n\
         @       IN      SOA     {ns} {hostmaster} (\n\
         \x20                       {serial:<10} ; Serial\n\
         \x20                       {refresh:<10} ; Refresh\n\
         \x20                       {retry:<10} ; Retry\n\
         \x20                       {expire:<10} ; Expire\n\
         \x20                       {minimum:<10} ; Minimum TTL\n\
         \x20                       )\n",
        ttl = options.ttl,
        refresh = options.refresh,
        retry = options.retry,
        expire = options.expire,
        minimum = options.minimum,
    )
}

/// Relative label for glue when the name server lives inside the zone.
fn glue_label(ns: &str, zone: &str) -> Option<String> {
    let label = ns.strip_suffix(zone)?.strip_suffix('.')?;
    (!label.is_empty()).then(|| label.to_string())
}

fn absolute(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.'))
}

fn push(out: &mut String, record: ResourceRecord) {
    out.push_str(&format(&record));
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::serial::extract_serial;

    #[test]
    fn test_forward_zone() {
        let text = generate_zone_file("example.com", &ZoneFileOptions::default()).unwrap();
        let records = parse(&text);

        let ns = records.iter().find(|r| r.rtype == RecordType::NS).unwrap();
        assert_eq!(ns.value, "ns1.example.com.");
        assert!(records.iter().any(|r| r.name == "ns1" && r.rtype == RecordType::A));
        assert!(records.iter().any(|r| r.name == "www" && r.value == "127.0.0.1"));
        assert!(text.contains("hostmaster.example.com."));
        assert_eq!(extract_serial(&text), Some(initial_serial()));
    }

    #[test]
    fn test_reverse_zone_with_ptr_sweep() {
        let options = ZoneFileOptions {
            auto_generate_ptr: true,
            ptr_domain: "lan.example.".into(),
            ..Default::default()
        };
        let text = generate_zone_file("1.168.192.in-addr.arpa", &options).unwrap();
        let records = parse(&text);

        let ptrs: Vec<_> = records.iter().filter(|r| r.rtype == RecordType::PTR).collect();
        assert_eq!(ptrs.len(), 254);
        assert_eq!(ptrs[0].name, "1");
        assert_eq!(ptrs[0].value, "host1.lan.example.");
        assert_eq!(ptrs[253].name, "254");
        assert_eq!(text.lines().filter(|l| l.contains(" IN PTR ")).count(), 254);

        // glue but no forward host records
        assert!(records.iter().any(|r| r.name == "ns1" && r.rtype == RecordType::A));
        assert!(!records.iter().any(|r| r.name == "www"));
    }

    #[test]
    fn test_reverse_zone_without_sweep() {
        let text = generate_zone_file("2.0.192.in-addr.arpa.", &ZoneFileOptions::default()).unwrap();
        assert!(parse(&text).iter().all(|r| r.rtype != RecordType::PTR));
    }

    #[test]
    fn test_external_nameserver_has_no_glue() {
        let options = ZoneFileOptions {
            nameserver: Some("ns.provider.net".into()),
            hostmaster: "admin@example.org".into(),
            serial: Some(7),
            ..Default::default()
        };
        let text = generate_zone_file("example.com.", &options).unwrap();
        let records = parse(&text);
        assert_eq!(records[0].value, "ns.provider.net.");
        assert!(!records.iter().any(|r| r.name == "ns1"));
        assert!(text.contains("admin.example.org."));
        assert_eq!(extract_serial(&text), Some(7));
    }

    #[test]
    fn test_placeholder_slave_file() {
        let text = placeholder_slave_file("b.example", &ZoneFileOptions::default()).unwrap();
        assert!(text.starts_with("; placeholder"));
        assert_eq!(extract_serial(&text), Some(1));
        assert_eq!(parse(&text).len(), 1);
    }
}
