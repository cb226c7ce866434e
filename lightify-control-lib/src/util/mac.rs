use crate::error::{Error, Result};

/// Number of bytes in a gateway hardware address.
pub const MAC_LEN: usize = 8;

/// Reverses a hex string in groups of two characters, i.e. swaps byte order.
fn reverse_byte_pairs(hex: &str) -> String {
    hex.as_bytes()
        .rchunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect()
}

/// Converts wire-order MAC bytes to the display form.
///
/// The gateway sends the address least significant byte first, the display
/// form is the upper-case hex of the bytes in reverse order.
pub fn mac_from_wire(bytes: &[u8]) -> String {
    reverse_byte_pairs(&hex::encode_upper(bytes))
}

/// Converts a display MAC back to the eight bytes the gateway expects.
pub fn mac_to_wire(mac: &str) -> Result<[u8; MAC_LEN]> {
    if mac.len() != MAC_LEN * 2 {
        return Err(Error::InvalidMac(mac.to_string()));
    }
    let bytes = hex::decode(reverse_byte_pairs(mac)).map_err(|_| Error::InvalidMac(mac.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| Error::InvalidMac(mac.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_from_wire_swaps_byte_order() {
        let wire = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0xAB];
        assert_eq!(mac_from_wire(&wire), "AB07060504030201");
    }

    #[test]
    fn test_mac_to_wire_recovers_wire_bytes() {
        let wire = [0x84, 0x18, 0x26, 0x00, 0x00, 0xd9, 0x5e, 0x7c];
        let mac = mac_from_wire(&wire);
        assert_eq!(mac_to_wire(&mac).unwrap(), wire);
        assert_eq!(mac_to_wire(&mac.to_lowercase()).unwrap(), wire);
    }

    #[test]
    fn test_mac_to_wire_rejects_garbage() {
        assert!(matches!(mac_to_wire("0102"), Err(Error::InvalidMac(_))));
        assert!(matches!(
            mac_to_wire("ZZ07060504030201"),
            Err(Error::InvalidMac(_))
        ));
    }
}
