// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use anyhow::anyhow;
use coinvalidator::consensus::money_to_coins;
use coinvalidator::settings::Settings;
use coinvalidator::validator::{CoinValidator, LoadOutcome};
use log::*;
use mimalloc::MiMalloc;
use std::env;
use tracing_subscriber::prelude::*;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Usage: `coinvalidator [height] [txid...]`
fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let settings = Settings::new()?;
    settings.validate().map_err(|err| anyhow!(err))?;

    let mut args = env::args().skip(1);
    let height = match args.next() {
        Some(h) => h
            .parse()
            .map_err(|_| anyhow!("invalid block height: {h}"))?,
        None => settings.validator.load_height,
    };
    let tx_ids: Vec<String> = args.collect();

    info!(
        "Running CoinValidator v{} on {}",
        env!("CARGO_PKG_VERSION"),
        settings.node.network_name
    );

    for line in run(&settings, height, &tx_ids)? {
        println!("{line}");
    }

    Ok(())
}

/// Loads the registry at `height` and renders the validity of each txid.
///
/// Returns no lines when infraction checks are disabled.
fn run(settings: &Settings, height: u64, tx_ids: &[String]) -> anyhow::Result<Vec<String>> {
    if !settings.validator.enabled {
        warn!("Infraction checks are disabled, exiting without loading");
        return Ok(vec![]);
    }

    let validator = CoinValidator::from_settings(settings);
    info!(
        "Loading infractions from {} up to height {}",
        validator.path().display(),
        height
    );

    if let LoadOutcome::Loaded(report) = validator.load(height)? {
        debug!("Load report: {:?}", report);
    }

    let mut lines = Vec::with_capacity(tx_ids.len());
    for tx_id in tx_ids.iter() {
        let infractions = validator.get_infractions(tx_id);

        if infractions.is_empty() {
            lines.push(format!("{tx_id}: valid"));
            continue;
        }

        lines.push(format!("{tx_id}: invalid"));
        for infraction in infractions.iter() {
            lines.push(format!(
                "  {infraction} ({} coins)",
                money_to_coins(infraction.amount)
            ));
        }
    }

    Ok(lines)
}

/// Initializes a tracing subscriber logging to stdout, filtered by `RUST_LOG`.
fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinvalidator::consensus::COIN;
    use std::fs;
    use tempfile::tempdir;

    fn settings_with_file(dir: &std::path::Path, enabled: bool) -> Settings {
        let mut settings = Settings::default();
        settings.validator.enabled = enabled;
        settings.validator.infractions_file = dir
            .join("infractions.txt")
            .to_string_lossy()
            .into_owned();
        settings
    }

    #[test]
    fn it_reports_flagged_transactions_in_coins() {
        let dir = tempdir().unwrap();
        let settings = settings_with_file(dir.path(), true);
        fs::write(
            settings.infractions_path(),
            format!("txid=AAA;address=1abc;amount={};height=10;amountH=1.5\n", COIN + COIN / 2),
        )
        .unwrap();

        let lines = run(&settings, 10, &["AAA".to_owned(), "ZZZ".to_owned()]).unwrap();
        assert_eq!(
            lines,
            vec![
                "AAA: invalid".to_owned(),
                "  txid=AAA;address=1abc;amount=150000000;amountH=1.5 (1.5 coins)".to_owned(),
                "ZZZ: valid".to_owned(),
            ]
        );
    }

    #[test]
    fn it_exits_without_loading_when_disabled() {
        let dir = tempdir().unwrap();
        // No record file exists, so a load would fail
        let settings = settings_with_file(dir.path(), false);

        let lines = run(&settings, 10, &["AAA".to_owned()]).unwrap();
        assert!(lines.is_empty());

        let settings = settings_with_file(dir.path(), true);
        assert!(run(&settings, 10, &["AAA".to_owned()]).is_err());
    }
}
