use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn reconciler() -> Command {
    let mut cmd = Command::new(cargo_bin!());
    cmd.env("ORDERS_API_KEY", "test_dHar4XY7LxsDOtmnkVtjNVWXLSlXsM")
        .arg("--fixture")
        .arg("tests/fixtures/orders.json");
    cmd
}

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = reconciler();
    cmd.arg("tests/fixtures/events.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("order_id,type,status,success"))
        .stdout(predicate::str::contains("1,webhook,paid,true"))
        .stdout(predicate::str::contains("2,webhook,canceled,false"))
        .stdout(predicate::str::contains("3,redirect,paid,true"))
        // Remote currency differs from the order currency.
        .stdout(predicate::str::contains("4,webhook,paid,false"));

    Ok(())
}

#[test]
fn test_cli_replay_gives_same_row() -> Result<(), Box<dyn std::error::Error>> {
    let output = reconciler().arg("tests/fixtures/events.csv").output()?;
    let stdout = String::from_utf8(output.stdout)?;

    let rows = stdout
        .lines()
        .filter(|line| *line == "1,webhook,paid,true")
        .count();
    assert_eq!(rows, 2);
    Ok(())
}

#[test]
fn test_cli_skips_bad_events() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = reconciler();
    cmd.arg("tests/fixtures/malformed_events.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,webhook,paid,true"))
        .stdout(predicate::str::contains("3,webhook,paid,true"))
        .stdout(predicate::str::contains("99,").not())
        .stderr(predicate::str::contains("Error reading event"))
        .stderr(predicate::str::contains("Error processing event"));

    Ok(())
}

#[test]
fn test_cli_without_api_key_reports_every_event() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.env_remove("ORDERS_API_KEY")
        .arg("--fixture")
        .arg("tests/fixtures/orders.json")
        .arg("tests/fixtures/events.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("webhook").not())
        .stderr(predicate::str::contains("API key not found"));

    Ok(())
}

#[test]
fn test_cli_writes_final_order_state() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("orders.json");

    reconciler()
        .arg("tests/fixtures/events.csv")
        .arg("--orders-out")
        .arg(&out)
        .assert()
        .success();

    let orders: serde_json::Value = serde_json::from_reader(std::fs::File::open(&out)?)?;
    let orders = orders.as_array().ok_or("expected a JSON array")?;
    assert_eq!(orders.len(), 4);

    let first = orders
        .iter()
        .find(|o| o["id"] == 1)
        .ok_or("order 1 missing")?;
    assert_eq!(first["state"], "processing");
    assert_eq!(first["payment"]["is_transaction_closed"], true);
    assert_eq!(first["invoices"].as_array().map(Vec::len), Some(1));
    Ok(())
}
