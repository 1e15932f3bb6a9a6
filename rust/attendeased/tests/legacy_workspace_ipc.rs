mod test_support;

use serde_json::json;
use std::path::PathBuf;
use test_support::{
    request_err, request_ok, spawn_sidecar, spawn_sidecar_with_env, temp_dir, write_legacy_db,
};

#[test]
fn selecting_a_legacy_workspace_backs_up_then_migrates() {
    let workspace = temp_dir("attendease-ipc-legacy");
    write_legacy_db(&workspace);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(opened["migration"]["rowsBackfilled"], 8);
    assert!(opened["migration"]["runId"].is_string());
    let backup = opened["backupPath"].as_str().map(PathBuf::from).expect("backup path");
    assert!(backup.is_file());

    let users = request_ok(&mut stdin, &mut reader, "2", "users.list", json!({}));
    let users = users["users"].as_array().cloned().expect("users");
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u["name"] == "User"));

    // Row 5 was NULL and row 6 was 'true'.
    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.stats",
        json!({ "userId": 10, "subjectId": 1 }),
    );
    assert_eq!(stats["attended"], 1);
    assert_eq!(stats["totalMarked"], 2);
    assert_eq!(stats["percentage"].as_f64(), Some(50.0));

    let dropped = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "admin.dropLegacyColumn",
        json!({ "confirm": true }),
    );
    assert_eq!(dropped["dropped"], true);
    let report = request_ok(&mut stdin, &mut reader, "5", "schema.report", json!({}));
    assert_eq!(report["attendance"]["legacyColumnPresent"], false);
    assert_eq!(report["attendance"]["rowCount"], 8);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn manual_migration_when_auto_migrate_is_off() {
    let workspace = temp_dir("attendease-ipc-manual");
    write_legacy_db(&workspace);
    let (mut child, mut stdin, mut reader) =
        spawn_sidecar_with_env(&[("ATTENDEASE_AUTO_MIGRATE", "0")]);

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(opened["migration"].is_null());
    assert!(opened["backupPath"].is_null());

    let status = request_ok(&mut stdin, &mut reader, "2", "migration.status", json!({}));
    assert_eq!(status["pending"], json!([1, 2, 3]));
    assert_eq!(status["applied"], json!([]));

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "3",
            "admin.dropLegacyColumn",
            json!({ "confirm": true }),
        ),
        "conflict"
    );

    let run = request_ok(&mut stdin, &mut reader, "4", "migration.run", json!({}));
    assert_eq!(run["report"]["applied"].as_array().map(|a| a.len()), Some(3));
    assert_eq!(run["report"]["rowsBackfilled"], 8);
    let backup = run["backupPath"].as_str().map(PathBuf::from).expect("backup path");
    assert!(backup.is_file());

    let status = request_ok(&mut stdin, &mut reader, "5", "migration.status", json!({}));
    assert_eq!(status["pending"], json!([]));
    let names: Vec<&str> = status["applied"]
        .as_array()
        .expect("applied")
        .iter()
        .filter_map(|m| m["name"].as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "users_profile_columns",
            "attendance_lecture_counts",
            "attendance_lecture_bounds"
        ]
    );

    let rerun = request_ok(&mut stdin, &mut reader, "6", "migration.run", json!({}));
    assert!(rerun["report"]["runId"].is_null());
    assert!(rerun["backupPath"].is_null());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn startup_workspace_from_environment() {
    let workspace = temp_dir("attendease-ipc-startup");
    write_legacy_db(&workspace);
    let ws = workspace.to_string_lossy().to_string();
    let (mut child, mut stdin, mut reader) = spawn_sidecar_with_env(&[
        ("ATTENDEASE_WORKSPACE", ws.as_str()),
        ("ATTENDEASE_BACKUP_BEFORE_MIGRATE", "false"),
        ("ATTENDEASE_LOG_FORMAT", "json"),
    ]);

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["workspacePath"], ws.as_str());

    let status = request_ok(&mut stdin, &mut reader, "2", "migration.status", json!({}));
    assert_eq!(status["pending"], json!([]));
    assert!(!workspace.join("backups").exists());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn carried_over_users_table_refuses_signups_but_keeps_attendance_working() {
    let workspace = temp_dir("attendease-ipc-legacy-users");
    write_legacy_db(&workspace);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // The old table requires email and password_hash, which the daemon does not own.
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "2",
            "users.create",
            json!({ "username": "erp3001" }),
        ),
        "constraint_violation"
    );
    let users = request_ok(&mut stdin, &mut reader, "3", "users.list", json!({}));
    assert_eq!(users["users"].as_array().map(|a| a.len()), Some(2));

    let toggled = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.toggle",
        json!({ "user_id": 1, "subject_id": 1, "is_present": false, "date": "2024-09-04" }),
    );
    assert_eq!(toggled["record"]["lecturesPresent"], 0);
    assert_eq!(toggled["record"]["lecturesTotal"], 1);

    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.mark",
        json!({
            "userId": 10,
            "date": "2024-09-05",
            "entries": [{ "subjectId": 2, "lecturesTotal": 3, "status": "present" }]
        }),
    );
    assert_eq!(marked["upserted"], 1);

    // Rows 7 and 8 were absent single lectures.
    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.stats",
        json!({ "userId": 10, "subjectId": 2 }),
    );
    assert_eq!(stats["attended"], 3);
    assert_eq!(stats["totalMarked"], 5);
    assert_eq!(stats["percentage"].as_f64(), Some(60.0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
