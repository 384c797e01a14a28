use crate::error::ScanError;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Inclusive span of IPv4 addresses parsed from a single input token.
///
/// Accepted forms:
/// - `192.0.2.7`
/// - `192.0.2.0/24`
/// - `192.0.2.10-192.0.2.40`
/// - `192.0.2.10-40` (last octet shorthand)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    start: u32,
    end: u32,
}

impl AddressRange {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, ScanError> {
        let (start, end) = (u32::from(start), u32::from(end));
        if start > end {
            return Err(ScanError::InvalidAddress(format!(
                "{}-{}",
                Ipv4Addr::from(start),
                Ipv4Addr::from(end)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(addr: Ipv4Addr) -> Self {
        let value = u32::from(addr);
        Self {
            start: value,
            end: value,
        }
    }

    pub fn parse(token: &str) -> Result<Self, ScanError> {
        let token = token.trim();
        let invalid = || ScanError::InvalidAddress(token.to_string());

        if token.contains('/') {
            let net = Ipv4Net::from_str(token).map_err(|_| invalid())?;
            return Ok(Self {
                start: u32::from(net.network()),
                end: u32::from(net.broadcast()),
            });
        }

        if let Some((left, right)) = token.split_once('-') {
            let start = parse_addr(left).ok_or_else(invalid)?;
            let end = match parse_addr(right) {
                Some(end) => end,
                None => {
                    let last: u8 = right.trim().parse().map_err(|_| invalid())?;
                    let [a, b, c, _] = start.octets();
                    Ipv4Addr::new(a, b, c, last)
                }
            };
            return Self::new(start, end).map_err(|_| invalid());
        }

        parse_addr(token).map(Self::single).ok_or_else(invalid)
    }

    pub fn first(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.start)
    }

    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end)
    }

    /// Number of addresses covered; a `/0` covers 2^32.
    pub fn count(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    pub fn iter(&self) -> Addresses {
        Addresses {
            next: Some(self.start),
            end: self.end,
        }
    }
}

impl FromStr for AddressRange {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl IntoIterator for AddressRange {
    type Item = Ipv4Addr;
    type IntoIter = Addresses;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending walk over an [`AddressRange`]; holds only the cursor.
#[derive(Debug, Clone)]
pub struct Addresses {
    next: Option<u32>,
    end: u32,
}

impl Iterator for Addresses {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current < self.end {
            current.checked_add(1)
        } else {
            None
        };
        Some(Ipv4Addr::from(current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(next) => {
                let remaining = u64::from(self.end - next) + 1;
                let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
                (remaining, Some(remaining))
            }
            None => (0, Some(0)),
        }
    }
}

// Strict dotted quad; `Ipv4Addr::from_str` already rejects octets above 255
// and leading zeros.
fn parse_addr(raw: &str) -> Option<Ipv4Addr> {
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(token: &str) -> Vec<String> {
        AddressRange::parse(token)
            .unwrap()
            .iter()
            .map(|a| a.to_string())
            .collect()
    }

    #[test]
    fn single_address_expands_to_itself() {
        assert_eq!(collect("93.184.216.34"), vec!["93.184.216.34"]);
    }

    #[test]
    fn cidr_covers_network_and_broadcast() {
        let addrs = collect("10.1.2.0/30");
        assert_eq!(addrs, vec!["10.1.2.0", "10.1.2.1", "10.1.2.2", "10.1.2.3"]);
    }

    #[test]
    fn cidr_with_host_bits_uses_enclosing_network() {
        let range = AddressRange::parse("10.1.2.77/24").unwrap();
        assert_eq!(range.first(), Ipv4Addr::new(10, 1, 2, 0));
        assert_eq!(range.last(), Ipv4Addr::new(10, 1, 2, 255));
        assert_eq!(range.count(), 256);
    }

    #[test]
    fn dash_range_crosses_octet_boundary() {
        let addrs = collect("10.0.0.254-10.0.1.1");
        assert_eq!(addrs, vec!["10.0.0.254", "10.0.0.255", "10.0.1.0", "10.0.1.1"]);
    }

    #[test]
    fn shorthand_range_keeps_prefix() {
        let addrs = collect("192.0.2.10-12");
        assert_eq!(addrs, vec!["192.0.2.10", "192.0.2.11", "192.0.2.12"]);
    }

    #[test]
    fn top_of_address_space_terminates() {
        let addrs = collect("255.255.255.254/31");
        assert_eq!(addrs, vec!["255.255.255.254", "255.255.255.255"]);
    }

    #[test]
    fn whole_space_is_lazy() {
        let range = AddressRange::parse("0.0.0.0/0").unwrap();
        assert_eq!(range.count(), 1u64 << 32);
        let mut iter = range.iter();
        assert_eq!(iter.next(), Some(Ipv4Addr::new(0, 0, 0, 0)));
        assert_eq!(iter.next(), Some(Ipv4Addr::new(0, 0, 0, 1)));
    }

    #[test]
    fn expansion_is_ascending_unique_and_repeatable() {
        let range = AddressRange::parse("172.16.0.0/22").unwrap();
        let first: Vec<u32> = range.iter().map(u32::from).collect();
        let second: Vec<u32> = range.iter().map(u32::from).collect();
        assert_eq!(first, second);
        assert_eq!(first.len() as u64, range.count());
        assert!(first.windows(2).all(|w| w[0] + 1 == w[1]));
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in [
            "999.1.1.1",
            "10.0.0",
            "10.0.0.1/33",
            "10.0.0.9-10.0.0.1",
            "10.0.0.9-3",
            "10.0.0.1-300",
            "example.org",
            "",
        ] {
            assert!(
                matches!(AddressRange::parse(bad), Err(ScanError::InvalidAddress(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn size_hint_matches_remaining() {
        let mut iter = AddressRange::parse("10.0.0.0/29").unwrap().iter();
        iter.next();
        assert_eq!(iter.size_hint(), (7, Some(7)));
    }
}
