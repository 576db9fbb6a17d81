use ethers::types::{H160, H256};

pub struct Hashes;

impl Hashes {
    /// Full lowercase `0x`-hex, never the abbreviated `Display` form.
    pub fn h160_to_string(h160: &H160) -> String {
        format!("{h160:?}")
    }

    pub fn h256_to_string(h256: &H256) -> String {
        format!("{h256:?}")
    }

    pub fn bytes_to_string(bytes: &[u8]) -> String {
        format!("0x{}", ethers::utils::hex::encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_full_lowercase_hex() {
        let address: H160 = "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D".parse().unwrap();

        assert_eq!(
            Hashes::h160_to_string(&address),
            "0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d"
        );
        assert_eq!(Hashes::h256_to_string(&H256::zero()), format!("0x{}", "0".repeat(64)));
        assert_eq!(Hashes::bytes_to_string(&[0xde, 0xad]), "0xdead");
    }
}
