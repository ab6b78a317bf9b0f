// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::consensus::Money;
use crate::primitives::Script;
use std::collections::HashMap;
use std::fmt;

/// An output taking part in a redeem check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemData {
    pub txid: String,
    pub script_pubkey: Script,
    pub amount: Money,
}

impl RedeemData {
    pub fn new(txid: impl Into<String>, script_pubkey: impl Into<Script>, amount: Money) -> Self {
        Self {
            txid: txid.into(),
            script_pubkey: script_pubkey.into(),
            amount,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum RedeemVerifyErr {
    /// No exploited outputs were given
    Empty,

    /// Exploited and recipient lists differ in length
    SizeMismatch { exploited: usize, recipients: usize },

    /// The exploited output at `index` has no matching recipient output
    Unmatched { index: usize },
}

impl fmt::Display for RedeemVerifyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no exploited outputs"),
            Self::SizeMismatch {
                exploited,
                recipients,
            } => write!(
                f,
                "{exploited} exploited outputs but {recipients} recipient outputs"
            ),
            Self::Unmatched { index } => {
                write!(f, "exploited output {index} has no matching recipient")
            }
        }
    }
}

impl std::error::Error for RedeemVerifyErr {}

/// Checks that every exploited output is paid back by exactly one recipient
/// output with the same script and the same amount.
///
/// Both lists are treated as multisets of `(script, amount)` pairs so order
/// is irrelevant, and transaction ids are not compared.
pub fn check_redeem_outputs(
    exploited: &[RedeemData],
    recipients: &[RedeemData],
) -> Result<(), RedeemVerifyErr> {
    if exploited.is_empty() {
        return Err(RedeemVerifyErr::Empty);
    }

    if exploited.len() != recipients.len() {
        return Err(RedeemVerifyErr::SizeMismatch {
            exploited: exploited.len(),
            recipients: recipients.len(),
        });
    }

    let mut unmatched: HashMap<(&Script, Money), usize> = HashMap::with_capacity(recipients.len());
    for r in recipients {
        *unmatched.entry((&r.script_pubkey, r.amount)).or_insert(0) += 1;
    }

    for (index, e) in exploited.iter().enumerate() {
        match unmatched.get_mut(&(&e.script_pubkey, e.amount)) {
            Some(count) if *count > 0 => *count -= 1,
            _ => return Err(RedeemVerifyErr::Unmatched { index }),
        }
    }

    Ok(())
}

/// Boolean form of [`check_redeem_outputs`].
pub fn redeem_address_verified(exploited: &[RedeemData], recipients: &[RedeemData]) -> bool {
    check_redeem_outputs(exploited, recipients).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    fn entry(txid: &str, script: &[u8], amount: Money) -> RedeemData {
        RedeemData::new(txid, script, amount)
    }

    #[test]
    fn it_verifies_matching_outputs_in_any_order() {
        let exploited = vec![entry("e1", &[1, 2], 500), entry("e2", &[3], 700)];
        let recipients = vec![entry("r1", &[3], 700), entry("r1", &[1, 2], 500)];
        assert_eq!(check_redeem_outputs(&exploited, &recipients), Ok(()));
        assert!(redeem_address_verified(&exploited, &recipients));
    }

    #[test]
    fn it_fails_on_amount_mismatch() {
        let exploited = vec![entry("e1", &[1, 2], 500)];
        let recipients = vec![entry("r1", &[1, 2], 499)];
        assert_eq!(
            check_redeem_outputs(&exploited, &recipients),
            Err(RedeemVerifyErr::Unmatched { index: 0 })
        );
    }

    #[test]
    fn it_fails_on_script_mismatch() {
        let exploited = vec![entry("e1", &[1], 500), entry("e2", &[2], 500)];
        let recipients = vec![entry("r1", &[1], 500), entry("r1", &[9], 500)];
        assert_eq!(
            check_redeem_outputs(&exploited, &recipients),
            Err(RedeemVerifyErr::Unmatched { index: 1 })
        );
    }

    #[test]
    fn it_fails_on_size_mismatch() {
        let exploited = vec![entry("e1", &[1], 500)];
        let recipients = vec![entry("r1", &[1], 500), entry("r1", &[1], 500)];
        assert_eq!(
            check_redeem_outputs(&exploited, &recipients),
            Err(RedeemVerifyErr::SizeMismatch {
                exploited: 1,
                recipients: 2
            })
        );
        assert!(!redeem_address_verified(&[], &[]));
    }

    #[test]
    fn duplicates_are_matched_one_to_one() {
        let exploited = vec![entry("e1", &[1], 500), entry("e2", &[1], 500)];
        let recipients = vec![entry("r1", &[1], 500), entry("r1", &[2], 500)];
        assert!(!redeem_address_verified(&exploited, &recipients));

        let recipients = vec![entry("r1", &[1], 500), entry("r2", &[1], 500)];
        assert!(redeem_address_verified(&exploited, &recipients));
    }

    #[quickcheck]
    fn verification_ignores_order(pairs: Vec<(Vec<u8>, u32)>, rotate: usize) -> TestResult {
        if pairs.is_empty() {
            return TestResult::discard();
        }

        let exploited: Vec<_> = pairs
            .iter()
            .map(|(s, a)| entry("exploited", s, *a as Money))
            .collect();
        let mut recipients: Vec<_> = pairs
            .iter()
            .rev()
            .map(|(s, a)| entry("recipient", s, *a as Money))
            .collect();
        let len = recipients.len();
        recipients.rotate_left(rotate % len);

        TestResult::from_bool(redeem_address_verified(&exploited, &recipients))
    }

    #[quickcheck]
    fn verification_detects_changed_amount(pairs: Vec<(Vec<u8>, u32)>, idx: usize) -> TestResult {
        if pairs.is_empty() {
            return TestResult::discard();
        }

        let exploited: Vec<_> = pairs
            .iter()
            .map(|(s, a)| entry("exploited", s, *a as Money))
            .collect();
        let mut recipients = exploited.clone();
        let idx = idx % recipients.len();
        recipients[idx].amount += 1;

        // The bumped output could still be covered by another identical pair
        let bumped = (&recipients[idx].script_pubkey, recipients[idx].amount);
        if exploited
            .iter()
            .any(|e| (&e.script_pubkey, e.amount) == bumped)
        {
            return TestResult::discard();
        }

        TestResult::from_bool(!redeem_address_verified(&exploited, &recipients))
    }
}
