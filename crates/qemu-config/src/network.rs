use std::fmt;

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

/// QEMU's vendor prefix; `0x52` has the locally-administered bit set and the
/// multicast bit clear.
pub const MAC_PREFIX: [u8; 2] = [0x52, 0x54];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Stable MAC for NIC `index` of the instance using `seed` (its image path).
///
/// SHA-256 over `seed` followed by the decimal index; the first 8 hex digits
/// of the digest fill the four octets after [`MAC_PREFIX`].
pub fn derive_mac(seed: &str, index: u32) -> MacAddress {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(index.to_string().as_bytes());
    let digest = hasher.finalize();
    let [p0, p1] = MAC_PREFIX;
    let mut octets = [p0, p1, 0, 0, 0, 0];
    for (dst, src) in octets.iter_mut().skip(2).zip(digest.iter()) {
        *dst = *src;
    }
    MacAddress(octets)
}

/// Backend/frontend argument pair for one virtio NIC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkDevice {
    pub index: u32,
    pub mac: MacAddress,
    /// Value for `-netdev`.
    pub backend: String,
    /// Value for `-device`.
    pub frontend: String,
}

impl NetworkDevice {
    /// Tap backend plus virtio-net frontend, fully determined by `(image, index)`.
    pub fn derive(image: &str, index: u32) -> Self {
        let mac = derive_mac(image, index);
        let id = format!("hostnet{index}");
        Self {
            index,
            mac,
            backend: format!("tap,id={id},script=no,downscript=no,vhost=on"),
            frontend: format!("virtio-net-pci,netdev={id},mac={mac}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looks_like_qemu_mac(mac: &str) -> bool {
        let parts: Vec<&str> = mac.split(':').collect();
        parts.len() == 6
            && parts[0] == "52"
            && parts[1] == "54"
            && parts
                .iter()
                .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()))
    }

    #[test]
    fn derive_mac_is_deterministic() {
        for seed in ["/img/a.qcow2", "", "relative/disk.img", "späce and ünicode"] {
            for index in 0..8 {
                let a = derive_mac(seed, index);
                let b = derive_mac(seed, index);
                assert_eq!(a, b, "seed={seed} index={index}");
                assert!(looks_like_qemu_mac(&a.to_string()), "bad mac {a}");
            }
        }
    }

    #[test]
    fn derive_mac_uses_digest_prefix() {
        let digest = Sha256::digest(b"/img/a.qcow20");
        let hex = format!("{digest:x}");
        let mac = derive_mac("/img/a.qcow2", 0).to_string();
        let expected = format!(
            "52:54:{}:{}:{}:{}",
            &hex[0..2],
            &hex[2..4],
            &hex[4..6],
            &hex[6..8]
        );
        assert_eq!(mac, expected);
    }

    #[test]
    fn derive_mac_varies_with_index_and_seed() {
        assert_ne!(derive_mac("/img/a.qcow2", 0), derive_mac("/img/a.qcow2", 1));
        assert_ne!(derive_mac("/img/a.qcow2", 0), derive_mac("/img/b.qcow2", 0));
    }

    #[test]
    fn mac_is_locally_administered_unicast() {
        let first = derive_mac("x", 3).octets()[0];
        assert_eq!(first & 0x02, 0x02);
        assert_eq!(first & 0x01, 0x00);
    }

    #[test]
    fn network_device_carries_index_and_mac() {
        let nic = NetworkDevice::derive("/img/a.qcow2", 2);
        let mac = derive_mac("/img/a.qcow2", 2);
        assert_eq!(nic.backend, "tap,id=hostnet2,script=no,downscript=no,vhost=on");
        assert_eq!(nic.frontend, format!("virtio-net-pci,netdev=hostnet2,mac={mac}"));
        assert_eq!(nic, NetworkDevice::derive("/img/a.qcow2", 2));
    }
}
