//! ABI encoding for the two ERC-20 calls the faucet makes

use faucet_common::Address;

/// `transfer(address,uint256)`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// `balanceOf(address)`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

const WORD: usize = 32;

fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(&address.0);
    word
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Calldata for `transfer(to, amount)`
pub fn transfer_calldata(to: &Address, amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 2 * WORD);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&address_word(to));
    data.extend_from_slice(&uint_word(amount));
    data
}

/// Calldata for `balanceOf(holder)`
pub fn balance_of_calldata(holder: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&address_word(holder));
    data
}
