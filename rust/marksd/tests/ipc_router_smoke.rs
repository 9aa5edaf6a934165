use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_marksd");
    let mut child = Command::new(exe)
        .env_remove("MARKSD_WORKSPACE")
        .env_remove("MARKSD_CALLER")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn marksd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn error_code(v: &serde_json::Value) -> Option<&str> {
    v.get("error").and_then(|e| e.get("code")).and_then(|c| c.as_str())
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("marksd-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");
    let export_out = workspace.join("smoke-export.json");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], json!(true));
    assert!(health["result"]["workspacePath"].is_null());

    let early = request(&mut stdin, &mut reader, "2", "entries.list", json!({}));
    assert_eq!(error_code(&early), Some("no_workspace"));

    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let no_caller = request(&mut stdin, &mut reader, "4", "entries.list", json!({}));
    assert_eq!(error_code(&no_caller), Some("no_caller"));

    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.setCaller",
        json!({ "identity": "smoke-admin" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "roles.assign",
        json!({ "identity": "smoke-admin", "role": "admin" }),
    );
    let _ = request(&mut stdin, &mut reader, "7", "roles.get", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "policy.maxMarks",
        json!({ "grade": 8, "role": "computer" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "policy.termMaxMarks",
        json!({ "grade": 9, "subjects": ["math", "ai"] }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "curriculum.subjects",
        json!({ "grade": 11, "stream": "Commerce", "subgroup": "CEBA" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "grading.letter",
        json!({ "marks": 45, "maxMarks": 50 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "grading.nineScale",
        json!({ "marks": 45, "maxMarks": 50 }),
    );
    let _ = request(&mut stdin, &mut reader, "13", "settings.badgeStyle.get", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "settings.badgeStyle.set",
        json!({ "style": "compact" }),
    );
    let entry = json!({ "grade": 3, "term": 1, "marks": { "math": 40, "computer": 15 } });
    let _ = request(&mut stdin, &mut reader, "15", "entries.build", entry.clone());
    let _ = request(&mut stdin, &mut reader, "16", "entries.add", entry);
    let _ = request(&mut stdin, &mut reader, "17", "entries.list", json!({}));
    let _ = request(&mut stdin, &mut reader, "18", "entries.listByGrade", json!({ "grade": 3 }));
    let _ = request(
        &mut stdin,
        &mut reader,
        "19",
        "entries.listByGradeAndTerm",
        json!({ "grade": 3, "term": 1 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "20",
        "entries.combinedByGrade",
        json!({ "grade": 3 }),
    );
    let board_marks = json!({ "english": 80, "kannada": 70, "math": 60, "science": 65, "social": 55, "ai": 75 });
    let _ = request(
        &mut stdin,
        &mut reader,
        "21",
        "boardExam.compute",
        json!({ "grade": 10, "marks": board_marks }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "22",
        "boardExam.submit",
        json!({ "grade": 10, "marks": board_marks }),
    );
    let _ = request(&mut stdin, &mut reader, "23", "boardExam.get", json!({}));
    let _ = request(&mut stdin, &mut reader, "24", "analytics.subjectStats", json!({}));
    let _ = request(&mut stdin, &mut reader, "25", "analytics.gradeAggregates", json!({}));
    let _ = request(&mut stdin, &mut reader, "26", "analytics.overview", json!({}));
    let _ = request(&mut stdin, &mut reader, "27", "analytics.nineScaleCards", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "28",
        "exchange.export",
        json!({ "exportType": "academic-entries", "outPath": export_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "29",
        "exchange.import",
        json!({ "inPath": export_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "30",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "31",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle_out.to_string_lossy() }),
    );

    let unknown = {
        let payload = json!({ "id": "32", "method": "entries.delete", "params": {} });
        writeln!(stdin, "{}", payload).expect("write request");
        stdin.flush().expect("flush request");
        let mut line = String::new();
        reader.read_line(&mut line).expect("read response");
        serde_json::from_str::<serde_json::Value>(line.trim()).expect("json")
    };
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(error_code(&bad), Some("bad_json"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn environment_presets_workspace_and_caller() {
    let workspace = temp_dir("marksd-router-env");
    let exe = env!("CARGO_BIN_EXE_marksd");
    let mut child = Command::new(exe)
        .env("MARKSD_WORKSPACE", &workspace)
        .env("MARKSD_CALLER", "preset-user")
        .env("MARKSD_LOG", "debug")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn marksd");
    let mut stdin = child.stdin.take().expect("child stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("child stdout"));

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(
        health["result"]["workspacePath"].as_str(),
        Some(workspace.to_string_lossy().as_ref())
    );
    assert_eq!(health["result"]["caller"], json!("preset-user"));

    let listed = request(&mut stdin, &mut reader, "2", "entries.list", json!({}));
    assert_eq!(listed["ok"], json!(true));
    assert_eq!(listed["result"]["entries"], json!([]));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
