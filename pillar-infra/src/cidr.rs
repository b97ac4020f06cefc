//! IPv4 CIDR blocks and sequential subnet carving

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{InfraError, Result};

/// An aligned IPv4 network block such as `10.110.0.0/16`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(InfraError::InvalidCidr(format!("{}/{}", network, prefix)));
        }
        let cidr = Self { network, prefix };
        if u32::from(network) & cidr.mask() != u32::from(network) {
            return Err(InfraError::InvalidCidr(format!(
                "{}/{} has host bits set",
                network, prefix
            )));
        }
        Ok(cidr)
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses covered by the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix)
    }

    fn mask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix)
        }
    }

    /// Allocator handing out consecutive child blocks of this range
    pub fn allocator(&self) -> SubnetAllocator {
        SubnetAllocator {
            parent: *self,
            next: u64::from(u32::from(self.network)),
        }
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = InfraError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| InfraError::InvalidCidr(s.to_string()))?;
        let network = addr
            .parse::<Ipv4Addr>()
            .map_err(|_| InfraError::InvalidCidr(s.to_string()))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|_| InfraError::InvalidCidr(s.to_string()))?;
        Ipv4Cidr::new(network, prefix)
    }
}

/// Carves child blocks out of a parent range in address order
///
/// Each allocation is aligned to its own size, so mixing prefixes may leave
/// gaps; blocks never overlap and never leave the parent range.
#[derive(Debug, Clone)]
pub struct SubnetAllocator {
    parent: Ipv4Cidr,
    next: u64,
}

impl SubnetAllocator {
    pub fn allocate(&mut self, prefix: u8) -> Result<Ipv4Cidr> {
        if prefix < self.parent.prefix || prefix > 32 {
            return Err(InfraError::InvalidCidr(format!(
                "/{} does not fit inside {}",
                prefix, self.parent
            )));
        }

        let size = 1u64 << (32 - prefix);
        let start = self.next.div_ceil(size) * size;
        let end = u64::from(u32::from(self.parent.network)) + self.parent.size();

        if start + size > end {
            return Err(InfraError::AddressSpaceExhausted {
                cidr: self.parent.to_string(),
                prefix,
            });
        }

        self.next = start + size;
        Ipv4Cidr::new(Ipv4Addr::from(start as u32), prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let cidr: Ipv4Cidr = "10.110.0.0/16".parse().unwrap();
        assert_eq!(cidr.prefix(), 16);
        assert_eq!(cidr.size(), 65536);
        assert_eq!(cidr.to_string(), "10.110.0.0/16");
    }

    #[test]
    fn test_rejects_host_bits_and_garbage() {
        assert!("10.110.0.1/16".parse::<Ipv4Cidr>().is_err());
        assert!("10.110.0.0".parse::<Ipv4Cidr>().is_err());
        assert!("10.110.0.0/33".parse::<Ipv4Cidr>().is_err());
        assert!("ten/8".parse::<Ipv4Cidr>().is_err());
    }

    #[test]
    fn test_allocates_consecutive_blocks() {
        let cidr: Ipv4Cidr = "10.110.0.0/16".parse().unwrap();
        let mut allocator = cidr.allocator();

        assert_eq!(allocator.allocate(21).unwrap().to_string(), "10.110.0.0/21");
        assert_eq!(allocator.allocate(21).unwrap().to_string(), "10.110.8.0/21");
        assert_eq!(allocator.allocate(24).unwrap().to_string(), "10.110.16.0/24");
        // realigns to the next /21 boundary
        assert_eq!(allocator.allocate(21).unwrap().to_string(), "10.110.24.0/21");
    }

    #[test]
    fn test_exhaustion() {
        let cidr: Ipv4Cidr = "10.0.0.0/22".parse().unwrap();
        let mut allocator = cidr.allocator();

        allocator.allocate(23).unwrap();
        allocator.allocate(23).unwrap();
        let err = allocator.allocate(23).unwrap_err();
        assert!(matches!(err, InfraError::AddressSpaceExhausted { prefix: 23, .. }));
    }

    #[test]
    fn test_child_larger_than_parent() {
        let cidr: Ipv4Cidr = "10.0.0.0/24".parse().unwrap();
        assert!(cidr.allocator().allocate(16).is_err());
    }
}
