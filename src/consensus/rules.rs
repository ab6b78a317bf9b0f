// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

/// Money type, expressed in minor units
pub type Money = i64;

/// Minor units per coin
pub const COIN: Money = 100_000_000;

/// Upper bound on any single amount
pub const MAX_MONEY: Money = 21_000_000 * COIN;

/// Network names recognized by the node
pub const NETWORK_NAMES: [&str; 3] = ["mainnet", "testnet", "devnet"];

/// Money check
pub fn money_check(amount: Money) -> bool {
    (0..=MAX_MONEY).contains(&amount)
}

/// Converts an amount in minor units to its human readable coin value
pub fn money_to_coins(amount: Money) -> f64 {
    amount as f64 / COIN as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_rejects_negative_money() {
        assert!(!money_check(-1));
        assert!(money_check(0));
    }

    #[test]
    fn it_rejects_money_over_max() {
        assert!(money_check(MAX_MONEY));
        assert!(!money_check(MAX_MONEY + 1));
    }

    #[test]
    fn money_to_coins_half() {
        assert_eq!(money_to_coins(COIN / 2), 0.5);
    }
}
