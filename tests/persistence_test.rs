#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

const HEADER: &str = "op,user,request,amount,wallet,phone,reference,remarks";

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // First run: register a wallet and leave a request pending
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "{HEADER}").unwrap();
    writeln!(csv1, "credit,1,,2000,,01700000001,,").unwrap();
    writeln!(csv1, "send_otp,1,,,,01811111111,,").unwrap();
    writeln!(csv1, "verify_otp,1,,,,01811111111,,").unwrap();
    writeln!(csv1, "add_wallet,1,,,bKash,01811111111,,").unwrap();
    writeln!(csv1, "withdraw,1,,1500,bKash,01811111111,,").unwrap();

    let output1 = Command::new(cargo_bin!("reseller-payouts"))
        .arg(csv1.path())
        .arg("--db-path")
        .arg(&db_path)
        .arg("--otp-code")
        .arg("123456")
        .output()
        .expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,1,bKash,01811111111,1500,10,1490,pending,,"));

    // Second run: settle the stored request and withdraw again through the stored wallet
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "{HEADER}").unwrap();
    writeln!(csv2, "approve,100,1,,,01900000000,TXN1,").unwrap();
    writeln!(csv2, "withdraw,1,,500,bKash,01811111111,,").unwrap();

    let output2 = Command::new(cargo_bin!("reseller-payouts"))
        .arg(csv2.path())
        .arg("--db-path")
        .arg(&db_path)
        .arg("--report")
        .arg("accounts")
        .output()
        .expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    // 2000 - 1500 completed - 500 reserved by the new request
    assert!(stdout2.contains("1,0,500,1500"));
}
