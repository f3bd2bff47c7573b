//! Minimal ABI codec for the calls the scheduler makes.
//!
//! Selectors are the first four bytes of the keccak-256 hash of each
//! function signature.

use crate::error::LedgerError;
use crate::types::{Address, Amount};

pub type Selector = [u8; 4];

const WORD: usize = 32;

// ERC-20
pub const BALANCE_OF: Selector = [0x70, 0xa0, 0x82, 0x31]; // balanceOf(address)
pub const ALLOWANCE: Selector = [0xdd, 0x62, 0xed, 0x3e]; // allowance(address,address)
pub const APPROVE: Selector = [0x09, 0x5e, 0xa7, 0xb3]; // approve(address,uint256)
pub const SYMBOL: Selector = [0x95, 0xd8, 0x9b, 0x41]; // symbol()
pub const DECIMALS: Selector = [0x31, 0x3c, 0xe5, 0x67]; // decimals()

// Saving circle
pub const CURR_ROUND: Selector = [0x3f, 0x5d, 0x80, 0x56]; // currRound()
pub const ROUND_DEPOSITS: Selector = [0xd1, 0xf7, 0x09, 0x7d]; // roundDeposits(uint256,address)
pub const START_TIME: Selector = [0x78, 0xe9, 0x79, 0x25]; // startTime()
pub const TIME_PER_ROUND: Selector = [0xe9, 0xce, 0x7f, 0xec]; // timePerRound()
pub const NUM_ROUNDS: Selector = [0x9d, 0x78, 0x32, 0x5d]; // numRounds()
pub const INSTALLMENT_SIZE: Selector = [0x2d, 0x72, 0x04, 0x9a]; // installmentSize()
pub const PROTOCOL_REWARD: Selector = [0xff, 0xac, 0x2e, 0x47]; // protocolTokenRewardPerInstallment()
pub const MAX_AUCTION: Selector = [0x6d, 0x00, 0x93, 0x2c]; // maxProtocolTokenInAuction()
pub const INSTALLMENT_TOKEN: Selector = [0x5d, 0xfa, 0xf1, 0x4e]; // installmentToken()
pub const PROTOCOL_TOKEN: Selector = [0x1a, 0x46, 0x5f, 0xe1]; // protocolToken()
pub const DEPOSIT_ROUND: Selector = [0x89, 0x36, 0x09, 0x49]; // depositRound(uint256,uint256,address)
pub const REGISTER: Selector = [0x1a, 0xa3, 0xa0, 0x08]; // register()

/// Static argument of a call.
///
/// `Uint(Amount::MAX)` is written as the all-ones uint256 word, the
/// conventional unlimited allowance, mirroring `decode_amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(Amount),
}

/// Selector followed by one 32-byte word per argument.
pub fn encode_call(selector: Selector, args: &[Token]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + WORD * args.len());
    out.extend_from_slice(&selector);
    for arg in args {
        let mut word = [0u8; WORD];
        match arg {
            Token::Address(addr) => word[12..].copy_from_slice(addr.as_bytes()),
            Token::Uint(Amount::MAX) => word = [0xff; WORD],
            Token::Uint(value) => word[16..].copy_from_slice(&value.to_be_bytes()),
        }
        out.extend_from_slice(&word);
    }
    out
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8], LedgerError> {
    let start = index * WORD;
    data.get(start..start + WORD).ok_or_else(|| {
        LedgerError::Decode(format!(
            "expected word {} in {} bytes of return data",
            index,
            data.len()
        ))
    })
}

pub fn decode_uint(data: &[u8]) -> Result<Amount, LedgerError> {
    let word = word_at(data, 0)?;
    if word[..16].iter().any(|b| *b != 0) {
        return Err(LedgerError::Decode(format!(
            "value 0x{} does not fit in 128 bits",
            hex::encode(word)
        )));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

/// Decodes a token amount, saturating at `Amount::MAX`.
///
/// Balances and allowances at or above 2^128 (typically the uint256 maximum
/// used for unlimited approvals) exceed every amount this crate can require.
pub fn decode_amount(data: &[u8]) -> Result<Amount, LedgerError> {
    let word = word_at(data, 0)?;
    if word[..16].iter().any(|b| *b != 0) {
        return Ok(Amount::MAX);
    }
    decode_uint(word)
}

pub fn decode_u64(data: &[u8]) -> Result<u64, LedgerError> {
    let value = decode_uint(data)?;
    u64::try_from(value)
        .map_err(|_| LedgerError::Decode(format!("value {} does not fit in 64 bits", value)))
}

pub fn decode_u8(data: &[u8]) -> Result<u8, LedgerError> {
    let value = decode_uint(data)?;
    u8::try_from(value)
        .map_err(|_| LedgerError::Decode(format!("value {} does not fit in 8 bits", value)))
}

pub fn decode_address(data: &[u8]) -> Result<Address, LedgerError> {
    let word = word_at(data, 0)?;
    let mut raw = [0u8; 20];
    raw.copy_from_slice(&word[12..]);
    Ok(Address(raw))
}

/// Decodes a dynamic `string` return value. Tokens that return `bytes32`
/// for `symbol()` are accepted too.
pub fn decode_string(data: &[u8]) -> Result<String, LedgerError> {
    if data.len() == WORD {
        let end = data.iter().position(|b| *b == 0).unwrap_or(WORD);
        return String::from_utf8(data[..end].to_vec())
            .map_err(|e| LedgerError::Decode(e.to_string()));
    }
    let offset = usize::try_from(decode_uint(data)?)
        .map_err(|_| LedgerError::Decode("string offset out of range".to_string()))?;
    let out_of_range = |what: &str| LedgerError::Decode(format!("string {} out of range", what));

    let body_start = offset
        .checked_add(WORD)
        .ok_or_else(|| out_of_range("offset"))?;
    let len_word = data
        .get(offset..body_start)
        .ok_or_else(|| out_of_range("length"))?;
    let len = usize::try_from(decode_uint(len_word)?).map_err(|_| out_of_range("length"))?;
    let body_end = body_start
        .checked_add(len)
        .ok_or_else(|| out_of_range("body"))?;
    let body = data
        .get(body_start..body_end)
        .ok_or_else(|| out_of_range("body"))?;
    String::from_utf8(body.to_vec()).map_err(|e| LedgerError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_deposit_round_arguments() {
        let participant = Address([0x11; 20]);
        let data = encode_call(
            DEPOSIT_ROUND,
            &[Token::Uint(2), Token::Uint(10), Token::Address(participant)],
        );
        assert_eq!(data.len(), 4 + 3 * 32);
        assert_eq!(&data[..4], &[0x89, 0x36, 0x09, 0x49]);
        assert_eq!(data[4 + 31], 2);
        assert_eq!(data[36 + 31], 10);
        assert!(data[68..80].iter().all(|b| *b == 0));
        assert_eq!(&data[80..100], &[0x11; 20]);
    }

    #[test]
    fn encodes_unlimited_approval_as_uint256_max() {
        let data = encode_call(APPROVE, &[Token::Address(Address([1; 20])), Token::Uint(u128::MAX)]);
        assert!(data[36..68].iter().all(|b| *b == 0xff));

        let data = encode_call(APPROVE, &[Token::Address(Address([1; 20])), Token::Uint(u128::MAX - 1)]);
        let amount = &data[36..68];
        assert!(amount[..16].iter().all(|b| *b == 0));
        assert_eq!(amount[31], 0xfe);
    }

    #[test]
    fn amounts_beyond_128_bits_saturate() {
        assert_eq!(decode_amount(&[0xff; 32]).unwrap(), Amount::MAX);

        let mut word = [0u8; 32];
        word[15] = 1;
        assert_eq!(decode_amount(&word).unwrap(), Amount::MAX);

        word[15] = 0;
        word[31] = 7;
        assert_eq!(decode_amount(&word).unwrap(), 7);
        assert!(decode_amount(&[0u8; 8]).is_err());
    }

    #[test]
    fn decodes_uint_and_rejects_overflow() {
        let mut word = [0u8; 32];
        word[31] = 100;
        assert_eq!(decode_uint(&word).unwrap(), 100);
        assert_eq!(decode_u64(&word).unwrap(), 100);

        word[0] = 1;
        assert!(matches!(decode_uint(&word), Err(LedgerError::Decode(_))));
        assert!(decode_uint(&[0u8; 8]).is_err());
    }

    #[test]
    fn decodes_dynamic_and_fixed_strings() {
        let mut data = vec![0u8; 96];
        data[31] = 0x20;
        data[63] = 4;
        data[64..68].copy_from_slice(b"USDC");
        assert_eq!(decode_string(&data).unwrap(), "USDC");

        let mut fixed = [0u8; 32];
        fixed[..3].copy_from_slice(b"SCT");
        assert_eq!(decode_string(&fixed).unwrap(), "SCT");
    }

    #[test]
    fn rejects_string_offsets_that_overflow() {
        let mut data = vec![0u8; 64];
        let hostile = (u64::MAX - 3).to_be_bytes();
        data[24..32].copy_from_slice(&hostile);
        assert!(matches!(decode_string(&data), Err(LedgerError::Decode(_))));

        let mut data = vec![0u8; 96];
        data[31] = 0x20;
        data[56..64].copy_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(decode_string(&data), Err(LedgerError::Decode(_))));
    }

    #[test]
    fn decodes_address_from_low_bytes() {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&[0x42; 20]);
        assert_eq!(decode_address(&word).unwrap(), Address([0x42; 20]));
    }
}
