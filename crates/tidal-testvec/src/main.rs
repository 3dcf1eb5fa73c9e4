//! Test vector generator for the Tidal rewards engine.
//!
//! Generates `test_vectors.json` pinning the emission table, window
//! integration, weight-ratio attribution and transfer ids. Any other
//! implementation of the engine must reproduce these outputs exactly.
//!
//! Usage:
//!   tidal-testvec              # Generate test_vectors.json
//!   tidal-testvec --verify     # Verify test vectors match expected values

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tidal_emission::{EmissionSchedule, EpochClock};
use tidal_rewards::{Shares, WeightRatio};
use tidal_types::{Address, Timestamp, EPOCH_DURATION_SECS};

const VECTORS_PATH: &str = "tests/fixtures/test_vectors.json";

/// Schedule start used by every vector.
const START: Timestamp = 1_700_000_000;

#[derive(Serialize, Deserialize)]
struct TestVectors {
    version: String,
    generated_by: String,
    vectors: BTreeMap<String, TestVector>,
}

#[derive(Serialize, Deserialize)]
struct TestVector {
    description: String,
    inputs: BTreeMap<String, String>,
    outputs: BTreeMap<String, String>,
}

fn standard_clock() -> anyhow::Result<EpochClock> {
    let schedule = EmissionSchedule::standard(START)?;
    Ok(EpochClock::new(schedule)?)
}

fn generate_emission_vectors() -> anyhow::Result<BTreeMap<String, TestVector>> {
    let mut vectors = BTreeMap::new();
    let clock = standard_clock()?;
    let schedule = *clock.schedule();
    let rates = clock.epoch_rates();

    // Vector 1: rate table samples
    let sample = |index: usize| rates.get(index).copied().unwrap_or(0).to_string();
    vectors.insert(
        "emission_rate_table".to_string(),
        TestVector {
            description: "Per-epoch rate after repeated floor(rate * 99 / 100) decay".to_string(),
            inputs: BTreeMap::from([
                (
                    "initial_rate_per_epoch".to_string(),
                    schedule.initial_rate_per_epoch.to_string(),
                ),
                ("epochs".to_string(), schedule.epoch_count().to_string()),
            ]),
            outputs: BTreeMap::from([
                ("epoch_1".to_string(), sample(0)),
                ("epoch_2".to_string(), sample(1)),
                ("epoch_60".to_string(), sample(59)),
                ("epoch_120".to_string(), sample(119)),
                ("total".to_string(), clock.total_emission()?.to_string()),
            ]),
        },
    );

    // Vector 2: windows inside, across and beyond epochs
    let windows = [
        ("first_day", START, START + 86_400),
        ("first_epoch", START, START + EPOCH_DURATION_SECS),
        (
            "epoch_boundary",
            START + EPOCH_DURATION_SECS - 3_600,
            START + EPOCH_DURATION_SECS + 3_600,
        ),
        ("past_end", schedule.end - 60, schedule.end + 60),
    ];
    let mut inputs = BTreeMap::new();
    let mut outputs = BTreeMap::new();
    for (name, from, to) in windows {
        inputs.insert(name.to_string(), format!("{from}..{to}"));
        outputs.insert(name.to_string(), clock.emission_between(from, to)?.to_string());
    }
    vectors.insert(
        "emission_between".to_string(),
        TestVector {
            description: "Floored cumulative emission difference C(to) - C(from)".to_string(),
            inputs,
            outputs,
        },
    );

    // Vector 3: additivity
    let mid = START + 3 * EPOCH_DURATION_SECS / 2;
    let end = START + 4 * EPOCH_DURATION_SECS;
    let left = clock.emission_between(START, mid)?;
    let right = clock.emission_between(mid, end)?;
    vectors.insert(
        "emission_additivity".to_string(),
        TestVector {
            description: "E(a, c) == E(a, b) + E(b, c)".to_string(),
            inputs: BTreeMap::from([
                ("a".to_string(), START.to_string()),
                ("b".to_string(), mid.to_string()),
                ("c".to_string(), end.to_string()),
            ]),
            outputs: BTreeMap::from([
                ("left".to_string(), left.to_string()),
                ("right".to_string(), right.to_string()),
                ("whole".to_string(), clock.emission_between(START, end)?.to_string()),
            ]),
        },
    );

    Ok(vectors)
}

fn generate_attribution_vectors() -> anyhow::Result<BTreeMap<String, TestVector>> {
    let mut vectors = BTreeMap::new();
    let clock = standard_clock()?;
    let window = clock.emission_between(START, START + 86_400)?;

    // Split 100/50 with vault weights 100/50: the first vault gets
    // (100 * 100) / (150 * 150) of the emission.
    let vault = WeightRatio::new(100 * 100, 150 * 150);
    let staking = WeightRatio::new(50, 150);
    let vault_delta = vault.apply(window)?;
    let staking_delta = staking.apply(window)?;
    let depositor = Shares::new(1, 3).portion_of(vault_delta)?;

    vectors.insert(
        "weight_attribution".to_string(),
        TestVector {
            description: "One day of emission attributed to a vault, the staking pool and a 1/3 depositor"
                .to_string(),
            inputs: BTreeMap::from([
                ("window_emission".to_string(), window.to_string()),
                ("split".to_string(), "100/50".to_string()),
                ("vault_weights".to_string(), "100/50".to_string()),
                ("depositor_share".to_string(), "1/3".to_string()),
            ]),
            outputs: BTreeMap::from([
                ("vault_delta".to_string(), vault_delta.to_string()),
                ("staking_delta".to_string(), staking_delta.to_string()),
                ("depositor_delta".to_string(), depositor.to_string()),
            ]),
        },
    );

    Ok(vectors)
}

fn generate_transfer_id_vector() -> BTreeMap<String, TestVector> {
    let mut vectors = BTreeMap::new();

    let from = Address::repeat(0xf0);
    let to = Address::repeat(0x0a);
    let amount = 1_000_000_000_000u128;
    let id = tidal_db::queries::transfers::transfer_id(1, &from, &to, amount);

    vectors.insert(
        "transfer_id".to_string(),
        TestVector {
            description: "BLAKE3(sequence_le || from || to || amount_le)".to_string(),
            inputs: BTreeMap::from([
                ("sequence".to_string(), "1".to_string()),
                ("from".to_string(), from.to_string()),
                ("to".to_string(), to.to_string()),
                ("amount".to_string(), amount.to_string()),
            ]),
            outputs: BTreeMap::from([("transfer_id".to_string(), hex::encode(id))]),
        },
    );

    vectors
}

fn generate_all_vectors() -> anyhow::Result<TestVectors> {
    let mut all_vectors = BTreeMap::new();

    all_vectors.extend(generate_emission_vectors()?);
    all_vectors.extend(generate_attribution_vectors()?);
    all_vectors.extend(generate_transfer_id_vector());

    Ok(TestVectors {
        version: "1.0".to_string(),
        generated_by: "tidal-testvec".to_string(),
        vectors: all_vectors,
    })
}

fn verify_vectors(vectors: &TestVectors) -> anyhow::Result<bool> {
    let regenerated = generate_all_vectors()?;
    let mut all_pass = true;

    for (name, expected) in &vectors.vectors {
        if let Some(actual) = regenerated.vectors.get(name) {
            if actual.outputs != expected.outputs {
                eprintln!("FAIL: {name}");
                eprintln!("  expected: {:?}", expected.outputs);
                eprintln!("  actual:   {:?}", actual.outputs);
                all_pass = false;
            } else {
                eprintln!("PASS: {name}");
            }
        } else {
            eprintln!("MISSING: {name}");
            all_pass = false;
        }
    }

    Ok(all_pass)
}

fn write_vectors(vectors: &TestVectors) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(vectors)?;
    if let Some(parent) = std::path::Path::new(VECTORS_PATH).parent() {
        std::fs::create_dir_all(parent).context("create fixture directory")?;
    }
    std::fs::write(VECTORS_PATH, json).context("write test vectors")?;
    eprintln!("Generated {} test vectors to {VECTORS_PATH}", vectors.vectors.len());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let verify = std::env::args().any(|a| a == "--verify");

    let vectors = if verify {
        match std::fs::read_to_string(VECTORS_PATH) {
            Ok(content) => serde_json::from_str(&content).context("parse test vectors")?,
            Err(_) => {
                eprintln!("No existing test vectors found at {VECTORS_PATH}. Generating...");
                let vectors = generate_all_vectors()?;
                write_vectors(&vectors)?;
                vectors
            }
        }
    } else {
        let vectors = generate_all_vectors()?;
        write_vectors(&vectors)?;
        vectors
    };

    if verify_vectors(&vectors)? {
        eprintln!("All test vectors verified successfully.");
        Ok(())
    } else {
        eprintln!("Test vector verification FAILED.");
        std::process::exit(1);
    }
}
