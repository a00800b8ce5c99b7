use std::fs;
use std::io::{Read, Write};
use std::{error::Error, process::Command};

use assert_cmd::prelude::*;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use predicates::prelude::*;

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzfeaturestat")?;

    cmd.arg("not_real.json").arg("-o").arg("-");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("NotFound"));
    Ok(())
}

#[test]
fn test_malformed_time_range() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzfeaturestat")?;

    cmd.arg("not_real.json").args(["-o", "-", "-r", "5-z"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range end invalid float literal",
    ));

    let mut cmd = Command::cargo_bin("mzfeaturestat")?;

    cmd.arg("not_real.json").args(["-o", "-", "-r", "a:5"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range start invalid float literal",
    ));

    Ok(())
}

#[test]
fn test_zero_bin_width() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzfeaturestat")?;

    cmd.arg("./tests/data/features.json").args(["-b", "0"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("is not a positive bin width"));
    Ok(())
}

#[test]
fn test_run() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzfeaturestat")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/features.json").args(["-o", "-", "-t", "2"]);
    let result = cmd.assert().success();
    result
        .stderr(predicate::str::contains("Features: 3"))
        .stderr(predicate::str::contains("Chromatograms: 2 | Mobilograms: 1"))
        .stderr(predicate::str::contains("Failed Features: 1"))
        .stdout(predicate::str::contains(r#""id":"pep-1""#))
        .stdout(predicate::str::contains(r#""area":100.0"#))
        .stdout(predicate::str::contains(r#""mobility_unit":"ms""#))
        .stdout(predicate::str::contains("missing-scan").not());
    Ok(())
}

#[test]
fn test_run_subset() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzfeaturestat")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/features.json")
        .args(["-o", "-", "-r", "11.5-12.5"]);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Features: 2"))
        .stderr(predicate::str::contains("Outside Time Range: 1"))
        .stdout(predicate::str::contains("ims-1").not());
    Ok(())
}

#[test]
fn test_compressed_stream() -> Result<(), Box<dyn Error>> {
    let document = fs::read("./tests/data/features.json")?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&document)?;
    let compressed = encoder.finish()?;

    let outdir = tempfile::tempdir()?;
    let outpath = outdir.path().join("reports.jsonl.gz");

    let mut cmd = assert_cmd::Command::cargo_bin("mzfeaturestat")?;
    cmd.arg("-")
        .arg("-o")
        .arg(&outpath)
        .write_stdin(compressed);
    cmd.assert().success();

    let mut text = String::new();
    GzDecoder::new(fs::File::open(&outpath)?).read_to_string(&mut text)?;
    let ids: Vec<String> = text
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids, vec!["pep-1", "pep-2", "ims-1"]);
    Ok(())
}
