// Drives the compiled binary for the non-interactive commands.
// None of these need a TTY.

use assert_cmd::Command;
use tempfile::tempdir;

#[test]
fn list_prints_builtin_techniques() -> Result<(), Box<dyn std::error::Error>> {
    let output = Command::cargo_bin("exhale")?.arg("--list").output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    for id in ["478", "box", "coherent", "triangle", "power"] {
        assert!(stdout.contains(id), "missing {id} in:\n{stdout}");
    }
    Ok(())
}

#[test]
fn stats_on_fresh_file_reports_nothing_yet() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let stats = dir.path().join("stats.json");

    let output = Command::cargo_bin("exhale")?
        .arg("--stats")
        .arg("--stats-file")
        .arg(&stats)
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("sessions: 0 (0 completed)"));
    assert!(stdout.contains("streak:   0 days"));
    Ok(())
}

#[test]
fn export_and_reset_use_the_stats_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let stats = dir.path().join("stats.json");
    let csv = dir.path().join("sessions.csv");
    std::fs::write(
        &stats,
        r#"{"totalSessions":1,"totalDurationSeconds":300,"sessions":[
            {"techniqueId":"box","techniqueName":"Box Breathing","durationSeconds":300,
             "timestampIso":"2024-05-01T08:00:00+00:00","completed":true}]}"#,
    )?;

    let output = Command::cargo_bin("exhale")?
        .arg("--stats-file")
        .arg(&stats)
        .arg("--export")
        .arg(&csv)
        .output()?;
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)?.contains("exported 1 sessions"));
    let exported = std::fs::read_to_string(&csv)?;
    assert!(exported.starts_with("date,time,technique_id,technique,duration_seconds,completed"));
    assert!(exported.contains("box,Box Breathing,300,true"));

    let output = Command::cargo_bin("exhale")?
        .arg("--stats-file")
        .arg(&stats)
        .arg("--reset-stats")
        .output()?;
    assert!(output.status.success());
    assert!(!stats.exists());
    Ok(())
}

#[test]
fn unknown_technique_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let output = Command::cargo_bin("exhale")?
        .arg("-t")
        .arg("nope")
        .arg("--stats-file")
        .arg(dir.path().join("stats.json"))
        .output()?;

    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)?.contains("unknown technique"));
    Ok(())
}
