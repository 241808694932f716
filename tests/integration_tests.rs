//! Integration tests for the TDB CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const IGBT_ID: &str = "DEV-01ARZ3NDEKTSV4RRFFQ69G5FAV";
const MOSFET_ID: &str = "DEV-01BX5ZZKBKACTAV9WEVGEMMVRZ";

/// A device with a channel-resistance curve and both switching energies
const IGBT_YAML: &str = r#"
id: DEV-01ARZ3NDEKTSV4RRFFQ69G5FAV
name: FF300R12KE4
manufacturer: Infineon
part_number: FF300R12KE4
class: igbt
created: 2024-01-01T00:00:00Z
ratings:
  v_abs_max: 1200
  i_abs_max: 300
nominal:
  temperature: 25
characteristics:
  - kind: channel-resistance
    unit: Ω
    conditions:
      temperature: 25
    curve:
      axes:
        - variable: current
          samples: [0, 10, 20]
      values: [0.10, 0.12, 0.18]
  - kind: turn-on-energy
    unit: mJ
    curve:
      axes:
        - variable: current
          samples: [0, 10, 20]
      values: [0, 1.2, 2.4]
  - kind: turn-off-energy
    unit: mJ
    curve:
      axes:
        - variable: current
          samples: [0, 10, 20]
      values: [0, 0.8, 1.6]
"#;

const MOSFET_YAML: &str = r#"
id: DEV-01BX5ZZKBKACTAV9WEVGEMMVRZ
name: C3M0065090D
manufacturer: Wolfspeed
part_number: C3M0065090D
class: mosfet
created: 2024-02-01T00:00:00Z
ratings:
  v_abs_max: 900
  i_abs_max: 36
nominal:
  temperature: 25
characteristics:
  - kind: channel-resistance
    unit: Ω
    conditions:
      temperature: 25
    curve:
      axes:
        - variable: current
          samples: [0, 10, 20]
      values: [0.065, 0.066, 0.07]
"#;

/// Switch and diode output characteristics plus an output capacitance
const MODULE_YAML: &str = r#"
id: DEV-01CND9TPQV5F2MZ5H8R3W7XK4B
name: FS100R12W2T7
manufacturer: Infineon
part_number: FS100R12W2T7
class: igbt
created: 2024-03-01T00:00:00Z
ratings:
  v_abs_max: 1200
  i_abs_max: 200
characteristics:
  - kind: channel-voltage
    unit: V
    curve:
      axes:
        - variable: current
          samples: [0, 10, 20]
      values: [0.8, 1.3, 2.3]
  - kind: channel-voltage
    element: diode
    unit: V
    curve:
      axes:
        - variable: current
          samples: [0, 10, 20]
      values: [0.7, 1.2, 1.7]
  - kind: output-capacitance
    unit: nF
    curve:
      axes:
        - variable: voltage
          samples: [0, 100, 200]
      values: [2, 2, 2]
"#;

/// Helper to get a tdb command
fn tdb() -> Command {
    Command::cargo_bin("tdb").unwrap()
}

/// Helper to create a test project in a temp directory
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    tdb().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

/// Write a device file outside the project's device directory
fn write_source(tmp: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = tmp.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Project with both fixture devices imported
fn setup_with_devices() -> TempDir {
    let tmp = setup_test_project();
    for (name, content) in [("igbt.yaml", IGBT_YAML), ("mosfet.yaml", MOSFET_YAML)] {
        let file = write_source(&tmp, name, content);
        tdb()
            .current_dir(tmp.path())
            .args(["device", "import"])
            .arg(&file)
            .assert()
            .success();
    }
    tmp
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    tdb()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("working point"));
}

#[test]
fn test_version_displays() {
    tdb()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tdb"));
}

#[test]
fn test_unknown_command_fails() {
    tdb().arg("frobnicate").assert().failure();
}

#[test]
fn test_completions_bash() {
    tdb()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tdb"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_creates_project_structure() {
    let tmp = TempDir::new().unwrap();

    tdb()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success();

    assert!(tmp.path().join(".tdb").is_dir());
    assert!(tmp.path().join(".tdb/config.yaml").is_file());
    assert!(tmp.path().join("devices").is_dir());
}

#[test]
fn test_init_twice_reports_existing_project() {
    let tmp = setup_test_project();
    tdb()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already"));
}

#[test]
fn test_commands_outside_project_fail() {
    let tmp = TempDir::new().unwrap();
    tdb()
        .current_dir(tmp.path())
        .args(["device", "list"])
        .assert()
        .failure();
}

// ============================================================================
// Device Tests
// ============================================================================

#[test]
fn test_device_import_writes_store_file() {
    let tmp = setup_test_project();
    let file = write_source(&tmp, "igbt.yaml", IGBT_YAML);

    tdb()
        .current_dir(tmp.path())
        .args(["device", "import"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(IGBT_ID));

    assert!(tmp
        .path()
        .join(format!("devices/{}.tdb.yaml", IGBT_ID))
        .is_file());
}

#[test]
fn test_device_import_existing_needs_force() {
    let tmp = setup_with_devices();
    let file = write_source(&tmp, "again.yaml", IGBT_YAML);

    tdb()
        .current_dir(tmp.path())
        .args(["device", "import"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    tdb()
        .current_dir(tmp.path())
        .args(["device", "import", "--force"])
        .arg(&file)
        .assert()
        .success();
}

#[test]
fn test_device_import_dry_run_writes_nothing() {
    let tmp = setup_test_project();
    let file = write_source(&tmp, "igbt.yaml", IGBT_YAML);

    tdb()
        .current_dir(tmp.path())
        .args(["device", "import", "--dry-run"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));

    assert!(!tmp
        .path()
        .join(format!("devices/{}.tdb.yaml", IGBT_ID))
        .exists());
}

#[test]
fn test_device_import_rejects_invalid_file() {
    let tmp = setup_test_project();
    let bad = IGBT_YAML.replace("class: igbt", "class: thyristor");
    let file = write_source(&tmp, "bad.yaml", &bad);

    tdb()
        .current_dir(tmp.path())
        .args(["device", "import"])
        .arg(&file)
        .assert()
        .failure();
}

#[test]
fn test_device_list_count() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["device", "list", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));
}

#[test]
fn test_device_list_filter_by_class() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["device", "list", "--class", "mosfet", "-f", "id"])
        .assert()
        .success()
        .stdout(predicate::str::contains(MOSFET_ID))
        .stdout(predicate::str::contains(IGBT_ID).not());
}

#[test]
fn test_device_list_filter_by_kind() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["device", "list", "--kind", "e-on", "-f", "id"])
        .assert()
        .success()
        .stdout(predicate::str::contains(IGBT_ID))
        .stdout(predicate::str::contains(MOSFET_ID).not());
}

#[test]
fn test_device_list_json() {
    let tmp = setup_with_devices();
    let output = tdb()
        .current_dir(tmp.path())
        .args(["device", "list", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let devices: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let devices = devices.as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert!(devices
        .iter()
        .any(|d| d["manufacturer"] == "Wolfspeed" && d["class"] == "mosfet"));
}

#[test]
fn test_device_list_picks_up_hand_edited_files() {
    let tmp = setup_with_devices();
    let path = tmp.path().join(format!("devices/{}.tdb.yaml", MOSFET_ID));
    fs::remove_file(path).unwrap();

    tdb()
        .current_dir(tmp.path())
        .args(["device", "list", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));
}

#[test]
fn test_device_show_by_part_number() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["device", "show", "C3M0065090D"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wolfspeed"))
        .stdout(predicate::str::contains("channel-resistance"));
}

#[test]
fn test_device_show_unknown_fails() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["device", "show", "NOPE-123"])
        .assert()
        .failure();
}

// ============================================================================
// Working Point Tests
// ============================================================================

#[test]
fn test_wp_interpolates_between_samples() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["wp", IGBT_ID, "-p", "i=5", "-Q", "channel-resistance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.11"))
        .stdout(predicate::str::contains("extrapolated").not());
}

#[test]
fn test_wp_flags_clamped_values() {
    let tmp = setup_with_devices();
    let output = tdb()
        .current_dir(tmp.path())
        .args(["wp", IGBT_ID, "-p", "i=25", "-Q", "channel-resistance", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let result = &report["results"][0];
    assert_eq!(result["quantity"], "channel-resistance");
    assert!((result["value"].as_f64().unwrap() - 0.18).abs() < 1e-9);
    assert_eq!(result["extrapolated"], true);
}

#[test]
fn test_wp_total_switching_energy() {
    let tmp = setup_with_devices();
    let output = tdb()
        .current_dir(tmp.path())
        .args(["wp", "FF300R12KE4", "-p", "i=10", "-Q", "e-sw", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let result = &report["results"][0];
    assert_eq!(result["quantity"], "total-switching-energy");
    assert!((result["value"].as_f64().unwrap() - 2.0).abs() < 1e-9);
    assert_eq!(result["unit"], "mJ");
}

#[test]
fn test_wp_missing_axis_value_fails() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["wp", IGBT_ID, "-p", "t=25", "-Q", "channel-resistance"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("current"));
}

#[test]
fn test_wp_unavailable_quantity_fails() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["wp", MOSFET_ID, "-p", "i=10", "-Q", "turn-on-energy"])
        .assert()
        .failure();
}

#[test]
fn test_wp_rejects_malformed_point() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["wp", IGBT_ID, "-p", "i10"])
        .assert()
        .failure();
}

#[test]
fn test_wp_all_quantities_tsv() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["wp", IGBT_ID, "-p", "i=10", "-f", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("quantity\tvalue\tunit\textrapolated"))
        .stdout(predicate::str::contains("turn-on-energy"))
        .stdout(predicate::str::contains("total-switching-energy"));
}

fn setup_with_module() -> TempDir {
    let tmp = setup_test_project();
    let file = write_source(&tmp, "module.yaml", MODULE_YAML);
    tdb()
        .current_dir(tmp.path())
        .args(["device", "import"])
        .arg(&file)
        .assert()
        .success();
    tmp
}

#[test]
fn test_wp_diode_element() {
    let tmp = setup_with_module();
    let output = tdb()
        .current_dir(tmp.path())
        .args([
            "wp",
            "FS100R12W2T7",
            "-p",
            "i=10",
            "-e",
            "diode",
            "-Q",
            "channel-voltage",
            "-f",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["element"], "diode");
    assert!((report["results"][0]["value"].as_f64().unwrap() - 1.2).abs() < 1e-9);

    tdb()
        .current_dir(tmp.path())
        .args(["wp", "FS100R12W2T7", "-p", "v=100", "-e", "diode", "-Q", "e-oss"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("diode"));
}

#[test]
fn test_wp_linearized_channel_and_output_energy() {
    let tmp = setup_with_module();
    let output = tdb()
        .current_dir(tmp.path())
        .args([
            "wp",
            "FS100R12W2T7",
            "-p",
            "i=5,v=200",
            "-Q",
            "r-lin",
            "-Q",
            "v-lin",
            "-Q",
            "e-oss",
            "-f",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["quantity"], "linear-channel-resistance");
    assert!((results[0]["value"].as_f64().unwrap() - 0.05).abs() < 1e-9);
    assert_eq!(results[1]["quantity"], "linear-channel-voltage");
    assert!((results[1]["value"].as_f64().unwrap() - 0.8).abs() < 1e-9);
    assert_eq!(results[2]["quantity"], "output-energy");
    assert!((results[2]["value"].as_f64().unwrap() - 40_000.0).abs() < 1e-6);
    assert_eq!(results[2]["unit"], "nJ");
}

// ============================================================================
// Export Tests
// ============================================================================

#[test]
fn test_export_tsv_uses_tabs() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args([
            "export",
            IGBT_ID,
            "-p",
            "i=10",
            "-Q",
            "channel-resistance",
            "-f",
            "tsv",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "point\tt\tvg\trg\tv\ti\ttime\tquantity\tvalue\tunit\textrapolated\terror",
        ))
        .stdout(predicate::str::contains("0\t\t\t\t\t10\t\tchannel-resistance\t0.12\tΩ\tfalse\t"))
        .stdout(predicate::str::contains(",").not());
}

#[test]
fn test_export_csv_with_partial_failure() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args([
            "export",
            IGBT_ID,
            "-p",
            "i=10",
            "-p",
            "t=25",
            "-p",
            "i=25",
            "-Q",
            "channel-resistance",
            "-f",
            "csv",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "point,t,vg,rg,v,i,time,quantity,value,unit,extrapolated,error",
        ))
        .stdout(predicate::str::contains("0,,,,,10,,channel-resistance,0.12,Ω,false,"))
        .stdout(predicate::str::contains("2,,,,,25,,channel-resistance,0.18,Ω,true,"))
        .stderr(predicate::str::contains("1 of 3"));
}

#[test]
fn test_export_json_to_file() {
    let tmp = setup_with_devices();
    let out = tmp.path().join("export.json");

    tdb()
        .current_dir(tmp.path())
        .args(["export", IGBT_ID, "-p", "i=5", "-p", "i=20", "-f", "json", "-o"])
        .arg(&out)
        .assert()
        .success();

    let view: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(view["device"]["id"], IGBT_ID);
    assert_eq!(view["points"].as_array().unwrap().len(), 2);
    assert!(view["failures"].as_array().unwrap().is_empty());
}

#[test]
fn test_export_markdown_template() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["export", IGBT_ID, "-p", "i=10", "-f", "md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# FF300R12KE4"));
}

#[test]
fn test_export_custom_template_from_project() {
    let tmp = setup_with_devices();
    fs::write(
        tmp.path().join(".tdb/templates/names.tera"),
        "{% for e in entries %}{{ e.quantity }}={{ e.value }}\n{% endfor %}",
    )
    .unwrap();

    tdb()
        .current_dir(tmp.path())
        .args(["export", IGBT_ID, "-p", "i=20", "-Q", "e-on", "--template", "names"])
        .assert()
        .success()
        .stdout(predicate::str::contains("turn-on-energy=2.4"));
}

#[test]
fn test_export_requires_a_point() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["export", IGBT_ID])
        .assert()
        .failure();
}

// ============================================================================
// Validate Tests
// ============================================================================

#[test]
fn test_validate_project_devices() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("All files passed"));
}

#[test]
fn test_validate_reports_schema_errors() {
    let tmp = setup_test_project();
    let bad = MOSFET_YAML.replace("part_number: C3M0065090D\n", "");
    let file = write_source(&tmp, "bad.tdb.yaml", &bad);

    tdb()
        .current_dir(tmp.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("part_number"));
}

#[test]
fn test_validate_rejects_unsorted_samples() {
    let tmp = setup_test_project();
    let bad = MOSFET_YAML.replace("samples: [0, 10, 20]", "samples: [0, 20, 10]");
    let file = write_source(&tmp, "unsorted.tdb.yaml", &bad);

    tdb()
        .current_dir(tmp.path())
        .args(["validate", "--summary"])
        .arg(&file)
        .assert()
        .failure();
}

// ============================================================================
// Index Tests
// ============================================================================

#[test]
fn test_index_rebuild() {
    let tmp = setup_with_devices();
    tdb()
        .current_dir(tmp.path())
        .args(["index", "rebuild"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Devices indexed: 2"));
}

#[test]
fn test_index_status_json() {
    let tmp = setup_with_devices();
    let output = tdb()
        .current_dir(tmp.path())
        .args(["index", "status", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total_devices"], 2);
}

#[test]
fn test_index_survives_deletion() {
    let tmp = setup_with_devices();
    fs::remove_file(tmp.path().join(".tdb/index.db")).unwrap();

    tdb()
        .current_dir(tmp.path())
        .args(["device", "list", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));
}
