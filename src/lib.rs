// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! # CoinValidator
//! Registry of blockchain transactions flagged as exploited ("infractions").
//!
//! ## Features
//! * **Height aware loading**: Infractions are read from a line oriented record file up to a given block height. Loading again at a covered height is a no-op, loading at a higher height refreshes the registry.
//! * **Consistent reads**: Lookups run against an immutable snapshot. A reload builds a new snapshot and swaps it in, so readers never observe a partially loaded registry and never wait on file I/O.
//! * **Fault tolerant parsing**: Malformed records are skipped, logged and counted instead of failing the whole load.
//! * **Redeem verification**: Checks that the outputs of a remediation transaction pay back every exploited output with the same script and amount.
//!
//! ## Usage
//! ```no_run
//! use coinvalidator::validator::CoinValidator;
//!
//! let validator = CoinValidator::new("infractions.txt");
//! validator.load(1_200_000).unwrap();
//!
//! if !validator.is_coin_valid("AAA") {
//!     for infraction in validator.get_infractions("AAA") {
//!         println!("{infraction}");
//!     }
//! }
//! ```

pub mod consensus;
pub mod primitives;
pub mod settings;
pub mod validator;
