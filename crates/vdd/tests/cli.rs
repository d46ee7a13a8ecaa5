use std::process::Command;

#[test]
fn help_exits_successfully() {
    // Arrange
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vdd"));
    cmd.arg("--help");

    // Act
    let output = cmd.output().expect("failed to execute vdd");

    // Assert
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("virtual displays"));
}

#[test]
fn version_exits_successfully() {
    // Arrange
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vdd"));
    cmd.arg("--version");

    // Act
    let output = cmd.output().expect("failed to execute vdd");

    // Assert
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("vdd"));
}

#[test]
fn invalid_mode_is_rejected() {
    // Arrange
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vdd"));
    cmd.args(["set", "0", "wide"]);

    // Act
    let output = cmd.output().expect("failed to execute vdd");

    // Assert
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid display mode"));
}

#[test]
fn hidden_commands_stay_out_of_help() {
    // Arrange
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vdd"));
    cmd.arg("--help");

    // Act
    let output = cmd.output().expect("failed to execute vdd");

    // Assert
    let stdout = String::from_utf8_lossy(&output.stdout);
    let listed = |name: &str| stdout.lines().any(|l| l.trim_start().starts_with(name));
    assert!(listed("start"));
    assert!(!listed("daemon"));
    assert!(!listed("apply-custom"));
}
