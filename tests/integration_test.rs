#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but replacement requires nightly

use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn layerconf_cmd(dir: &Path) -> assert_cmd::Command {
	let mut cmd = assert_cmd::Command::cargo_bin("layerconf").unwrap();
	cmd.current_dir(dir)
		.env("LAYERCONF_NO_USER_CONFIG", "1")
		.env_remove("RUST_LOG");
	cmd
}

fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
	let temp_dir = tempfile::tempdir().unwrap();
	for (name, content) in files {
		fs::write(temp_dir.path().join(name), content).unwrap();
	}
	temp_dir
}

// ============================================================================
// CLI flag tests
// ============================================================================

#[test]
fn test_help_flag() {
	let temp_dir = project(&[]);
	layerconf_cmd(temp_dir.path())
		.arg("--help")
		.assert()
		.success()
		.stdout(predicate::str::contains("Resolve layered configuration"));
}

#[test]
fn test_version_flag() {
	let temp_dir = project(&[]);
	layerconf_cmd(temp_dir.path())
		.arg("--version")
		.assert()
		.success()
		.stdout(predicate::str::contains("layerconf"));
}

#[test]
fn test_no_args_shows_help() {
	// With arg_required_else_help, no args should show help
	let temp_dir = project(&[]);
	layerconf_cmd(temp_dir.path())
		.assert()
		.failure()
		.stderr(predicate::str::contains("Usage"));
}

// ============================================================================
// --init tests
// ============================================================================

#[test]
fn test_init_creates_config() {
	let temp_dir = project(&[]);
	let config_path = temp_dir.path().join("application.toml");

	layerconf_cmd(temp_dir.path())
		.arg("--init")
		.assert()
		.success()
		.stdout(predicate::str::contains("Created"));

	let content = fs::read_to_string(&config_path).unwrap();
	assert!(content.contains("[app]"));
	assert!(content.contains("${APP_NAME:my-service}"));
}

#[test]
fn test_init_fails_if_exists() {
	let temp_dir = project(&[("application.toml", "# existing")]);

	layerconf_cmd(temp_dir.path())
		.arg("--init")
		.assert()
		.failure()
		.stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_init_force_overwrites() {
	let temp_dir = project(&[("application.toml", "# existing")]);

	layerconf_cmd(temp_dir.path())
		.args(["--init", "--force"])
		.assert()
		.success();

	let content = fs::read_to_string(temp_dir.path().join("application.toml")).unwrap();
	assert!(!content.contains("# existing"));
}

#[test]
fn test_init_then_get_default() {
	let temp_dir = project(&[]);
	layerconf_cmd(temp_dir.path()).arg("--init").assert().success();

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "get", "app.name"])
		.assert()
		.success()
		.stdout("my-service\n");
}

// ============================================================================
// get / raw / explain
// ============================================================================

#[test]
fn test_get_expands_from_environment() {
	let temp_dir = project(&[(
		"application.toml",
		"[app]\nname = \"${SVC_PREFIX}-svc\"\nport = [8080, 9090]\n",
	)]);

	layerconf_cmd(temp_dir.path())
		.env("SVC_PREFIX", "x")
		.args(["get", "app.name"])
		.assert()
		.success()
		.stdout("x-svc\n");

	layerconf_cmd(temp_dir.path())
		.args(["get", "app.port", "--type", "list<u16>"])
		.assert()
		.success()
		.stdout("[8080, 9090]\n");
}

#[test]
fn test_get_with_dir_flag() {
	let temp_dir = project(&[("application.toml", "greeting = \"hi\"\n")]);
	let elsewhere = project(&[]);

	layerconf_cmd(elsewhere.path())
		.args(["--no-env", "--dir"])
		.arg(temp_dir.path())
		.args(["get", "greeting"])
		.assert()
		.success()
		.stdout("hi\n");
}

#[test]
fn test_define_overrides_file() {
	let temp_dir = project(&[("application.toml", "[app]\nport = 8080\n")]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "-D", "app.port=9000", "get", "app.port", "-t", "i32"])
		.assert()
		.success()
		.stdout("9000\n");
}

#[test]
fn test_invalid_define() {
	let temp_dir = project(&[]);
	layerconf_cmd(temp_dir.path())
		.args(["-D", "novalue", "names"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Invalid -D override"));
}

#[test]
fn test_get_missing_property_lists_names() {
	let temp_dir = project(&[("application.toml", "[app]\nname = \"svc\"\n")]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "get", "app.nmae"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("app.nmae"))
		.stderr(predicate::str::contains("app.name"));
}

#[test]
fn test_get_conversion_failure() {
	let temp_dir = project(&[("application.toml", "port = \"eighty\"\n")]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "get", "port", "--type", "u16"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Failed to convert 'eighty'"));
}

#[test]
fn test_get_invalid_type() {
	let temp_dir = project(&[("application.toml", "port = 1\n")]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "get", "port", "--type", "list<"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Invalid --type"));
}

#[test]
fn test_raw_keeps_macros() {
	let temp_dir = project(&[("application.toml", "url = \"http://${host:localhost}\"\n")]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "raw", "url"])
		.assert()
		.success()
		.stdout("http://${host:localhost}\n");

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "get", "url"])
		.assert()
		.success()
		.stdout("http://localhost\n");

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "raw", "missing"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Property not found: missing"));
}

#[test]
fn test_explain_shows_provenance() {
	let temp_dir = project(&[("application.toml", "[app]\nport = 8080\n")]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "-D", "app.port=1", "explain", "app.port"])
		.assert()
		.success()
		.stdout(predicate::str::contains("source:  overrides (ordinal 400)"));
}

// ============================================================================
// Profiles and cascade
// ============================================================================

#[test]
fn test_profile_file_and_prefix() {
	let temp_dir = project(&[
		(
			"application.toml",
			"[config]\nprofile = \"dev\"\n[app]\nhost = \"prod\"\nport = 80\n[\"%dev\".app]\nport = 8081\n",
		),
		("application-dev.toml", "[app]\nhost = \"dev-host\"\n"),
		("application-test.toml", "[app]\nhost = \"test-host\"\n"),
	]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "get", "app.host"])
		.assert()
		.success()
		.stdout("dev-host\n");

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "get", "app.port"])
		.assert()
		.success()
		.stdout("8081\n");

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "-D", "config.profile=test", "get", "app.host"])
		.assert()
		.success()
		.stdout("test-host\n");
}

#[test]
fn test_nested_directories_prefer_nearest() {
	let temp_dir = project(&[("application.toml", "level = \"root\"\nshared = \"root\"\n")]);
	let child = temp_dir.path().join("child");
	fs::create_dir(&child).unwrap();
	fs::write(child.join("application.toml"), "level = \"child\"\n").unwrap();

	layerconf_cmd(&child)
		.args(["--no-env", "get", "level"])
		.assert()
		.success()
		.stdout("child\n");

	layerconf_cmd(&child)
		.args(["--no-env", "get", "shared"])
		.assert()
		.success()
		.stdout("root\n");
}

#[test]
fn test_names_and_sources() {
	let temp_dir = project(&[
		("application.toml", "[config]\nprofile = \"dev\"\n[app]\nname = \"a\"\n[\"%dev\".app]\nname = \"b\"\n"),
		("application-dev.toml", "[app]\nextra = 1\n"),
	]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "names"])
		.assert()
		.success()
		.stdout(predicate::str::contains("app.name\n"))
		.stdout(predicate::str::contains("app.extra\n"))
		.stdout(predicate::str::contains("%dev").not());

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "sources"])
		.assert()
		.success()
		.stdout(predicate::str::contains("Active profiles: dev"))
		.stdout(predicate::str::contains("(profile: dev)"));
}

#[test]
fn test_invalid_toml_reports_path() {
	let temp_dir = project(&[("application.toml", "app = [")]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "names"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Failed to parse config source"));
}

#[test]
fn test_engine_options_file() {
	let temp_dir = project(&[
		("engine.toml", "base-name = \"service\"\nprofile-key = \"profiles\"\n"),
		("service.toml", "profiles = \"qa\"\nname = \"base\"\n"),
		("service-qa.toml", "name = \"qa\"\n"),
	]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "--engine-options", "engine.toml", "get", "name"])
		.assert()
		.success()
		.stdout("qa\n");
}

#[test]
fn test_verbose_logs_to_stderr() {
	let temp_dir = project(&[("application.toml", "a = 1\n")]);

	layerconf_cmd(temp_dir.path())
		.args(["--no-env", "-v", "get", "a"])
		.assert()
		.success()
		.stdout("1\n")
		.stderr(predicate::str::contains("config snapshot"));
}
