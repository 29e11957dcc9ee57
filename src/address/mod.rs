//! Parsers turning user text into canonical match values.
//!
//! - [`ipv4`]: addresses, networks, host names and masks
//! - [`mac`]: Ethernet addresses and aliases
//! - [`field`]: hardware length, opcode, hardware and protocol type
//! - [`iface`]: interface names with wildcards

pub mod field;
pub mod iface;
pub mod ipv4;
pub mod mac;
pub mod number;

pub use field::{opcode_name, parse_hw_type, parse_length, parse_opcode, parse_proto_type};
pub use iface::{parse_interface, Interface, IFNAMSIZ};
pub use ipv4::{
    dotted_to_addr, parse_hostnetwork, parse_hostnetworkmask, parse_mask, HostSpec, Resolver,
    StaticResolver, SystemResolver,
};
pub use mac::{ether_aton, getmac_and_mask, parse_mac_option, MacAddr, ETH_ALEN};
pub use number::string_to_number;
