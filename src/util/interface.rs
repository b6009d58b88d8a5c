//! Host interface enumeration.
//!
//! Platform-specific lookup of IPv4 interfaces and their broadcast
//! addresses, the only thing discovery needs from the host.

use std::net::Ipv4Addr;

use crate::discovery::InterfaceLister;
use crate::error::Result;
use crate::types::InterfaceCandidate;

/// One IPv4 address assigned to a host interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddress {
    pub name: String,
    pub address: Ipv4Addr,
    pub netmask: Option<Ipv4Addr>,
    pub broadcast: Option<Ipv4Addr>,
    pub is_up: bool,
    pub is_loopback: bool,
}

impl HostAddress {
    /// Broadcast address, derived from the netmask when the kernel
    /// reports none.
    pub fn broadcast_address(&self) -> Option<Ipv4Addr> {
        self.broadcast.or_else(|| {
            self.netmask
                .map(|mask| Ipv4Addr::from(u32::from(self.address) | !u32::from(mask)))
        })
    }

    /// Candidate for discovery, if this address can reach the LAN.
    pub fn candidate(&self) -> Option<InterfaceCandidate> {
        if !self.is_up || self.is_loopback || self.address.is_loopback() {
            return None;
        }
        if self.address.is_link_local() || self.address.is_unspecified() {
            return None;
        }
        self.broadcast_address()
            .map(|broadcast| InterfaceCandidate::new(self.address, broadcast))
    }
}

/// Interfaces of the running host, in kernel order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl SystemInterfaces {
    pub fn new() -> Self {
        Self
    }
}

impl InterfaceLister for SystemInterfaces {
    fn candidates(&self) -> Result<Vec<InterfaceCandidate>> {
        let mut out: Vec<InterfaceCandidate> = Vec::new();
        for candidate in get_host_addresses().iter().filter_map(HostAddress::candidate) {
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        }
        Ok(out)
    }
}

/// All IPv4 addresses of the host.
#[cfg(unix)]
pub fn get_host_addresses() -> Vec<HostAddress> {
    use std::ffi::CStr;

    let mut addresses = Vec::new();

    unsafe {
        let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();
        if libc::getifaddrs(std::ptr::addr_of_mut!(ifaddrs)) != 0 {
            return addresses;
        }

        let mut current = ifaddrs;
        while !current.is_null() {
            let ifa = &*current;

            if !ifa.ifa_name.is_null()
                && !ifa.ifa_addr.is_null()
                && i32::from((*ifa.ifa_addr).sa_family) == libc::AF_INET
            {
                let name = CStr::from_ptr(ifa.ifa_name).to_string_lossy().into_owned();
                let flags = ifa.ifa_flags as i32;

                #[allow(clippy::cast_ptr_alignment)]
                let address = sockaddr_to_ipv4(ifa.ifa_addr);
                #[allow(clippy::cast_ptr_alignment)]
                let netmask = (!ifa.ifa_netmask.is_null()).then(|| sockaddr_to_ipv4(ifa.ifa_netmask));

                let broadcast = if flags & libc::IFF_BROADCAST != 0 {
                    let broadaddr = broadcast_pointer(ifa);
                    (!broadaddr.is_null()).then(|| sockaddr_to_ipv4(broadaddr))
                } else {
                    None
                };

                addresses.push(HostAddress {
                    name,
                    address,
                    netmask,
                    broadcast,
                    is_up: flags & libc::IFF_UP != 0,
                    is_loopback: flags & libc::IFF_LOOPBACK != 0,
                });
            }

            current = ifa.ifa_next;
        }

        libc::freeifaddrs(ifaddrs);
    }

    addresses
}

#[cfg(not(unix))]
pub fn get_host_addresses() -> Vec<HostAddress> {
    vec![]
}

#[cfg(unix)]
#[allow(clippy::cast_ptr_alignment)]
unsafe fn sockaddr_to_ipv4(addr: *const libc::sockaddr) -> Ipv4Addr {
    let sockaddr = addr.cast::<libc::sockaddr_in>();
    Ipv4Addr::from(u32::from_be((*sockaddr).sin_addr.s_addr))
}

// Linux keeps the broadcast address in the ifa_ifu union, the BSDs in ifa_dstaddr.
#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn broadcast_pointer(ifa: &libc::ifaddrs) -> *const libc::sockaddr {
    let union_ptr = std::ptr::addr_of!(ifa.ifa_ifu).cast::<*mut libc::sockaddr>();
    *union_ptr
}

#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
unsafe fn broadcast_pointer(ifa: &libc::ifaddrs) -> *const libc::sockaddr {
    ifa.ifa_dstaddr
}
