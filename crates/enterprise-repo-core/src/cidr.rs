//! IPv4 CIDR blocks and sequential subnet allocation

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{Result, SynthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(SynthError::invalid_network(format!(
                "prefix /{} is out of range",
                prefix
            )));
        }
        let bits = u32::from(network);
        if bits & !mask(prefix) != 0 {
            return Err(SynthError::invalid_network(format!(
                "{}/{} has host bits set",
                network, prefix
            )));
        }
        Ok(Self { network, prefix })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix >= self.prefix
            && u32::from(other.network) & mask(self.prefix) == u32::from(self.network)
    }

    /// Carve `count` consecutive blocks of `/new_prefix` from the start of this block.
    pub fn subnets(&self, new_prefix: u8, count: usize) -> Result<Vec<Ipv4Cidr>> {
        if new_prefix < self.prefix || new_prefix > 32 {
            return Err(SynthError::invalid_network(format!(
                "cannot split {} into /{} subnets",
                self, new_prefix
            )));
        }
        let available = 1u64 << u32::from(new_prefix - self.prefix);
        if count as u64 > available {
            return Err(SynthError::invalid_network(format!(
                "{} subnet(s) of /{} requested but {} only holds {}",
                count, new_prefix, self, available
            )));
        }

        let step = 1u64 << (32 - u32::from(new_prefix));
        let base = u64::from(u32::from(self.network));
        (0..count as u64)
            .map(|i| {
                let start = base + i * step;
                let addr = u32::try_from(start).map_err(|_| {
                    SynthError::invalid_network(format!("subnet {} overflows the address space", i))
                })?;
                Ipv4Cidr::new(Ipv4Addr::from(addr), new_prefix)
            })
            .collect()
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl FromStr for Ipv4Cidr {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s.split_once('/').ok_or_else(|| {
            SynthError::invalid_network(format!("'{}' is not in a.b.c.d/n form", s))
        })?;
        let network = addr
            .parse::<Ipv4Addr>()
            .map_err(|e| SynthError::invalid_network(format!("'{}': {}", s, e)))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|e| SynthError::invalid_network(format!("'{}': {}", s, e)))?;
        Ipv4Cidr::new(network, prefix)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}
