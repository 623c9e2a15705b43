//! Command-line interface for the gha-tools binary.
//!
//! The CLI resolves workflow matrix parameters for GitHub Actions and exposes
//! the GitHub issue, comment, label and artifact operations used by CI jobs.
//! Machine-readable output goes to stdout; logs and annotations go to stderr.

use std::{
    io,
    path::{Path, PathBuf},
    process,
    time::Duration,
};

use clap::{ArgAction, Args, Parser, Subcommand, builder::BoolishValueParser};
use gha_tools::{
    Catalog, DEFAULT_API_URL, DEFAULT_OWNER, DEFAULT_REPO, DEFAULT_WORKFLOW, DeviceKind, Error,
    GithubClient, GithubConfig, ParamValue, ParameterKind, filter_values_on_diff, get_value,
    load_catalog, override_value, parse_device_kinds, print_value,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Workflow whose device lists are narrowed by `--device-type`.
const DEVICE_FILTER_WORKFLOW: &str = "integration_tests";
/// Matrix keys holding device identifiers.
const DEVICE_KEYS: &[&str] = &["android_device", "ios_device"];

/// Command line interface for GitHub workflow support tasks.
#[derive(Debug, Parser,)]
#[command(name = "gha-tools", version, about = "GitHub workflow matrix and API helpers")]
struct Cli
{
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand,)]
/// Supported commands exposed by the CLI.
enum Command
{
    /// Print the value of a matrix or config parameter as JSON.
    Matrix(MatrixArgs,),
    /// Print the matrix keys that describe a platform's build configuration.
    #[command(name = "build-config")]
    BuildConfig(BuildConfigArgs,),
    /// Call the GitHub REST API.
    Github(GithubArgs,),
}

#[derive(Debug, Args,)]
/// Arguments accepted by the `matrix` subcommand.
struct MatrixArgs
{
    /// Query parameters used for workflow dispatch configuration.
    #[arg(short = 'c', long = "config", action = ArgAction::SetTrue)]
    config: bool,

    /// Workflow whose parameters are queried.
    #[arg(short = 'w', long = "workflow", default_value = DEFAULT_WORKFLOW)]
    workflow: String,

    /// Use the expanded parameter set.
    #[arg(
        short = 'e',
        long = "expanded",
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set,
    )]
    expanded: bool,

    /// Key whose value is printed.
    #[arg(short = 'k', long = "parm-key", alias = "parm_key", value_name = "KEY")]
    parm_key: String,

    /// Compare with the given base branch to narrow the value automatically.
    #[arg(short = 'a', long = "auto-diff", alias = "auto_diff", value_name = "BRANCH")]
    auto_diff: Option<String,>,

    /// Print this value instead of the configured one.
    #[arg(short = 'o', long = "override", value_name = "VALUE")]
    override_value: Option<String,>,

    /// Print the registered type of the device named by the key.
    #[arg(short = 'd', long = "device", action = ArgAction::SetTrue)]
    device: bool,

    /// Device types kept in device lists, comma separated.
    #[arg(
        short = 't',
        long = "device-type",
        alias = "device_type",
        default_value = "real,virtual",
        value_name = "TYPES"
    )]
    device_type: String,

    /// YAML parameter catalog used instead of the built-in one.
    #[arg(long = "parameters", value_name = "PATH")]
    parameters: Option<PathBuf,>,
}

#[derive(Debug, Args,)]
struct BuildConfigArgs
{
    /// Platform name such as `windows`, `android` or `tvos`.
    platform: String,

    /// YAML parameter catalog used instead of the built-in one.
    #[arg(long = "parameters", value_name = "PATH")]
    parameters: Option<PathBuf,>,
}

#[derive(Debug, Args,)]
struct GithubArgs
{
    /// Token used for authenticated calls.
    #[arg(long = "token", env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String,>,

    /// Repository owner.
    #[arg(long = "owner", env = "GITHUB_OWNER", default_value = DEFAULT_OWNER)]
    owner: String,

    /// Repository name.
    #[arg(long = "repo", env = "GITHUB_REPO", default_value = DEFAULT_REPO)]
    repo: String,

    /// Base URL of the REST API.
    #[arg(long = "api-url", env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[command(subcommand)]
    operation: GithubOperation,
}

#[derive(Debug, Subcommand,)]
enum GithubOperation
{
    /// Create an issue with one label and print it.
    CreateIssue
    {
        #[arg(long)]
        title: String,
        #[arg(long)]
        label: String,
    },
    /// Apply a JSON object as a partial issue update.
    UpdateIssue
    {
        #[arg(long)]
        issue: u64,
        #[arg(long, value_name = "JSON")]
        data:  String,
    },
    /// Reopen an issue.
    OpenIssue
    {
        #[arg(long)]
        issue: u64,
    },
    /// Close an issue.
    CloseIssue
    {
        #[arg(long)]
        issue: u64,
    },
    /// Replace the body of an issue.
    UpdateIssueComment
    {
        #[arg(long)]
        issue:   u64,
        #[arg(long)]
        comment: String,
    },
    /// Print issues carrying a label.
    SearchIssues
    {
        #[arg(long)]
        label: String,
    },
    /// Print the comments of an issue.
    ListComments
    {
        #[arg(long)]
        issue: u64,
    },
    /// Comment on an issue.
    AddComment
    {
        #[arg(long)]
        issue:   u64,
        #[arg(long)]
        comment: String,
    },
    /// Replace the body of a comment.
    UpdateComment
    {
        #[arg(long)]
        comment_id: u64,
        #[arg(long)]
        comment:    String,
    },
    /// Delete a comment.
    DeleteComment
    {
        #[arg(long)]
        comment_id: u64,
    },
    /// Add a label to an issue.
    AddLabel
    {
        #[arg(long)]
        issue: u64,
        #[arg(long)]
        label: String,
    },
    /// Remove a label from an issue.
    DeleteLabel
    {
        #[arg(long)]
        issue: u64,
        #[arg(long)]
        label: String,
    },
    /// Print the artifacts of a workflow run.
    ListArtifacts
    {
        #[arg(long)]
        run_id: u64,
    },
    /// Download an artifact archive.
    DownloadArtifact
    {
        #[arg(long)]
        artifact_id: u64,
        #[arg(long, value_name = "PATH")]
        output:      PathBuf,
    },
}

/// Value produced by the `matrix` subcommand.
#[derive(Debug, PartialEq, Eq,)]
enum MatrixOutput
{
    /// JSON encoded parameter value.
    Value(ParamValue,),
    /// Plain device type.
    DeviceType(DeviceKind,),
}

/// Entry point that reports errors and sets the appropriate exit status.
fn main()
{
    init_tracing();

    if let Err(error,) = run() {
        eprintln!("{}", error.to_display_string());
        process::exit(1,);
    }
}

fn init_tracing()
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info",),);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter,)
        .with_writer(io::stderr,)
        .with_target(false,)
        .try_init();
}

/// Executes the CLI using parsed arguments.
///
/// # Errors
///
/// Propagates lookup, git and GitHub API failures.
fn run() -> Result<(), Error,>
{
    let cli = Cli::parse();

    match cli.command {
        Command::Matrix(args,) => run_matrix(args,),
        Command::BuildConfig(args,) => run_build_config(args,),
        Command::Github(args,) => run_github(args,),
    }
}

fn load(parameters: Option<&Path,>,) -> Result<Catalog, Error,>
{
    match parameters {
        Some(path,) => load_catalog(path,),
        None => Catalog::builtin(),
    }
}

fn run_matrix(args: MatrixArgs,) -> Result<(), Error,>
{
    let catalog = load(args.parameters.as_deref(),)?;
    let output = resolve_matrix(&args, &catalog,)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_matrix_output(&mut handle, &output,)
}

/// Computes the `matrix` output, applying device and diff filters.
///
/// # Errors
///
/// Returns [`Error`] for unknown keys or devices, invalid device types and
/// failing git invocations.
fn resolve_matrix(args: &MatrixArgs, catalog: &Catalog,) -> Result<MatrixOutput, Error,>
{
    let kind = ParameterKind::from_config_flag(args.config,);

    if let Some(raw,) = args.override_value.as_deref().filter(|raw| !raw.is_empty(),) {
        return Ok(MatrixOutput::Value(override_value(raw, kind,),),);
    }

    if args.device {
        return catalog.devices.device_type(&args.parm_key,).map(MatrixOutput::DeviceType,);
    }

    let mut value =
        get_value(&catalog.parameters, &args.workflow, args.expanded, &args.parm_key, kind,)?
            .clone();

    if args.workflow == DEVICE_FILTER_WORKFLOW
        && DEVICE_KEYS.contains(&args.parm_key.as_str(),)
        && let ParamValue::List(devices,) = &value
    {
        let kinds = parse_device_kinds(&args.device_type,)?;
        value = ParamValue::List(catalog.devices.filter_devices(devices, &kinds,),);
    }

    if let Some(base_branch,) = args.auto_diff.as_deref() {
        let outcome = filter_values_on_diff(&args.parm_key, value, base_branch,)?;
        if let Some(line,) = outcome.annotation(&args.parm_key,) {
            eprintln!("{line}");
        }
        value = outcome.into_value();
    }

    Ok(MatrixOutput::Value(value,),)
}

fn write_matrix_output<W: io::Write,>(writer: &mut W, output: &MatrixOutput,) -> Result<(), Error,>
{
    match output {
        MatrixOutput::Value(value,) => print_value(writer, value,),
        MatrixOutput::DeviceType(kind,) => writeln!(writer, "{kind}")
            .map_err(|e| Error::service(format!("failed to write device type: {e}"),),),
    }
}

fn run_build_config(args: BuildConfigArgs,) -> Result<(), Error,>
{
    let catalog = load(args.parameters.as_deref(),)?;
    let keys = catalog.build_configs.keys_for(&args.platform,).ok_or_else(|| {
        let known = catalog.build_configs.platforms().collect::<Vec<_,>>().join(", ",);
        Error::validation(format!("unknown platform '{}', expected one of: {known}", args.platform),)
    },)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    print_value(&mut handle, keys,)
}

fn run_github(args: GithubArgs,) -> Result<(), Error,>
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::service(format!("failed to start async runtime: {e}"),),)?;

    runtime.block_on(async move {
        let client = GithubClient::new(GithubConfig {
            api_url: args.api_url,
            owner:   args.owner,
            repo:    args.repo,
            token:   args.token,
        },)?;
        let stdout = io::stdout();
        run_github_operation(&client, args.operation, &mut stdout.lock(),).await
    },)
}

async fn run_github_operation<W: io::Write,>(
    client: &GithubClient,
    operation: GithubOperation,
    out: &mut W,
) -> Result<(), Error,>
{
    match operation {
        GithubOperation::CreateIssue {
            title,
            label,
        } => {
            let issue = client.create_issue(&title, &label,).await?;
            print_value(out, &issue,)
        }
        GithubOperation::UpdateIssue {
            issue,
            data,
        } => {
            let data: Value = serde_json::from_str(&data,)
                .map_err(|e| Error::validation(format!("--data must be a JSON object: {e}"),),)?;
            if !data.is_object() {
                return Err(Error::validation("--data must be a JSON object",),);
            }
            client.update_issue(issue, &data,).await
        }
        GithubOperation::OpenIssue {
            issue,
        } => client.open_issue(issue,).await,
        GithubOperation::CloseIssue {
            issue,
        } => client.close_issue(issue,).await,
        GithubOperation::UpdateIssueComment {
            issue,
            comment,
        } => client.update_issue_comment(issue, &comment,).await,
        GithubOperation::SearchIssues {
            label,
        } => {
            let issues = client.search_issues_by_label(&label,).await?;
            print_value(out, &issues,)
        }
        GithubOperation::ListComments {
            issue,
        } => {
            let comments = client.list_comments(issue,).await?;
            print_value(out, &comments,)
        }
        GithubOperation::AddComment {
            issue,
            comment,
        } => client.add_comment(issue, &comment,).await,
        GithubOperation::UpdateComment {
            comment_id,
            comment,
        } => client.update_comment(comment_id, &comment,).await,
        GithubOperation::DeleteComment {
            comment_id,
        } => client.delete_comment(comment_id,).await,
        GithubOperation::AddLabel {
            issue,
            label,
        } => client.add_label(issue, &label,).await,
        GithubOperation::DeleteLabel {
            issue,
            label,
        } => client.delete_label(issue, &label,).await,
        GithubOperation::ListArtifacts {
            run_id,
        } => {
            let artifacts = client.list_artifacts(run_id,).await?;
            print_value(out, &artifacts,)
        }
        GithubOperation::DownloadArtifact {
            artifact_id,
            output,
        } => download_with_spinner(client, artifact_id, &output,).await,
    }
}

async fn download_with_spinner(
    client: &GithubClient,
    artifact_id: u64,
    output: &Path,
) -> Result<(), Error,>
{
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.yellow} [{elapsed_precise}] {msg}",)
            .expect("valid template",),
    );
    pb.enable_steady_tick(Duration::from_millis(120,),);
    pb.set_message(format!("Downloading artifact {artifact_id} to {}...", output.display()),);

    match client.download_artifact(artifact_id, output,).await {
        Ok(written,) => {
            pb.finish_with_message(format!("Downloaded {written} bytes to {}", output.display()),);
            Ok((),)
        }
        Err(error,) => {
            pb.abandon_with_message(format!("Download of artifact {artifact_id} failed"),);
            Err(error,)
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use clap::Parser;
    use gha_tools::{Catalog, DeviceKind, ParamValue};
    use tempfile::tempdir;

    use super::{
        Cli, Command, GithubOperation, MatrixArgs, MatrixOutput, load, resolve_matrix,
        write_matrix_output,
    };

    fn matrix_args(args: &[&str],) -> MatrixArgs
    {
        let mut argv = vec![env!("CARGO_PKG_NAME"), "matrix"];
        argv.extend_from_slice(args,);
        let cli = Cli::try_parse_from(argv,).expect("failed to parse CLI",);
        match cli.command {
            Command::Matrix(args,) => args,
            other => panic!("unexpected command variant: {other:?}"),
        }
    }

    fn list(values: &[&str],) -> ParamValue
    {
        ParamValue::List(values.iter().map(|value| (*value).to_owned(),).collect(),)
    }

    fn resolve(args: &[&str],) -> MatrixOutput
    {
        let catalog = Catalog::builtin().expect("embedded catalog must parse",);
        resolve_matrix(&matrix_args(args,), &catalog,).expect("matrix resolves",)
    }

    #[test]
    fn matrix_requires_key()
    {
        let result = Cli::try_parse_from([env!("CARGO_PKG_NAME"), "matrix"],);
        assert!(result.is_err());
    }

    #[test]
    fn matrix_defaults_to_desktop_standard()
    {
        let args = matrix_args(&["-k", "os"],);
        assert_eq!(args.workflow, "desktop");
        assert!(!args.expanded);
        assert!(!args.config);
        assert_eq!(resolve(&["-k", "os"],), MatrixOutput::Value(list(&["ubuntu-latest", "macos-latest"])));
    }

    #[test]
    fn expanded_flag_accepts_bare_and_valued_forms()
    {
        assert!(matrix_args(&["-k", "os", "-e"],).expanded);
        assert!(matrix_args(&["-k", "os", "-e", "1"],).expanded);
        assert!(matrix_args(&["-k", "os", "--expanded", "true"],).expanded);
        assert!(!matrix_args(&["-k", "os", "-e", "0"],).expanded);
    }

    #[test]
    fn legacy_underscore_flags_are_accepted()
    {
        let args = matrix_args(&["--parm_key", "apis", "--device_type", "real", "-c"],);
        assert_eq!(args.parm_key, "apis");
        assert_eq!(args.device_type, "real");
        assert!(args.config);
    }

    #[test]
    fn expanded_workflow_value_is_printed()
    {
        let output = resolve(&["-w", "ios", "-e", "1", "-k", "xcode_version"],);
        assert_eq!(output, MatrixOutput::Value(list(&["12", "12.4"])));
    }

    #[test]
    fn matrix_override_is_split_into_list()
    {
        let output = resolve(&["-w", "integration_tests", "-o", "my_custom_os,other", "-k", "os"],);
        assert_eq!(output, MatrixOutput::Value(list(&["my_custom_os", "other"])));
    }

    #[test]
    fn config_override_stays_a_string()
    {
        let output = resolve(&["-c", "-w", "integration_tests", "-o", "auth,storage", "-k", "apis"],);
        assert_eq!(output, MatrixOutput::Value(ParamValue::Text("auth,storage".to_owned())));
    }

    #[test]
    fn device_mode_reports_type()
    {
        let output = resolve(&["-d", "-k", "emulator_target"],);
        assert_eq!(output, MatrixOutput::DeviceType(DeviceKind::Virtual));

        let mut buffer = Vec::new();
        write_matrix_output(&mut buffer, &output,).expect("write succeeds",);
        assert_eq!(String::from_utf8(buffer,).expect("utf8",), "virtual\n");
    }

    #[test]
    fn integration_test_devices_are_filtered_by_type()
    {
        let output = resolve(&["-w", "integration_tests", "-k", "android_device", "-t", "virtual"],);
        assert_eq!(output, MatrixOutput::Value(list(&["emulator_target"])));

        let output = resolve(&["-w", "integration_tests", "-k", "ios_device", "-t", "real"],);
        assert_eq!(output, MatrixOutput::Value(list(&["ios_target"])));
    }

    #[test]
    fn device_filter_only_applies_to_integration_tests()
    {
        let output = resolve(&["-w", "integration_tests", "-k", "tvos_device", "-t", "real"],);
        assert_eq!(output, MatrixOutput::Value(list(&["tvos_simulator_target"])));
    }

    #[test]
    fn invalid_device_type_is_rejected()
    {
        let catalog = Catalog::builtin().expect("embedded catalog must parse",);
        let args = matrix_args(&["-w", "integration_tests", "-k", "android_device", "-t", "cloud"],);
        let error = resolve_matrix(&args, &catalog,).expect_err("cloud is not a device type",);
        assert!(matches!(error, gha_tools::Error::Validation { .. }));
    }

    #[test]
    fn unknown_key_fails()
    {
        let catalog = Catalog::builtin().expect("embedded catalog must parse",);
        let args = matrix_args(&["-k", "not_a_real_key"],);
        let error = resolve_matrix(&args, &catalog,).expect_err("unknown key",);
        assert!(error.to_display_string().contains("'not_a_real_key'"));
    }

    #[test]
    fn diff_filter_leaves_other_keys_alone()
    {
        let output = resolve(&["-k", "os", "-a", "no-such-branch"],);
        assert_eq!(output, MatrixOutput::Value(list(&["ubuntu-latest", "macos-latest"])));
    }

    #[test]
    fn value_output_is_json()
    {
        let mut buffer = Vec::new();
        write_matrix_output(&mut buffer, &MatrixOutput::Value(list(&["x64"])),)
            .expect("write succeeds",);
        assert_eq!(String::from_utf8(buffer,).expect("utf8",), "[\"x64\"]\n");
    }

    #[test]
    fn parameters_file_replaces_builtin_catalog()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let path = temp.path().join("parameters.yaml",);
        fs::write(
            &path,
            r"
workflows:
  desktop:
    matrix:
      standard:
        os: [ubuntu-24.04]
",
        )
        .expect("failed to write catalog",);

        let catalog = load(Some(path.as_path(),),).expect("catalog loads",);
        let args = matrix_args(&["-k", "os", "--parameters", path.to_str().expect("utf8",)],);
        assert_eq!(args.parameters.as_deref(), Some(path.as_path()));
        let output = resolve_matrix(&args, &catalog,).expect("matrix resolves",);
        assert_eq!(output, MatrixOutput::Value(list(&["ubuntu-24.04"])));
    }

    #[test]
    fn missing_parameters_file_reports_io_error()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let error = load(Some(temp.path().join("absent.yaml",).as_path(),),).expect_err("missing file",);
        assert!(matches!(error, gha_tools::Error::Io { .. }));
    }

    #[test]
    fn build_config_parses_platform()
    {
        let cli = Cli::try_parse_from([env!("CARGO_PKG_NAME"), "build-config", "android"],)
            .expect("failed to parse CLI",);
        match cli.command {
            Command::BuildConfig(args,) => assert_eq!(args.platform, "android"),
            other => panic!("unexpected command variant: {other:?}"),
        }
    }

    #[test]
    fn github_operations_parse()
    {
        let cli = Cli::try_parse_from([
            env!("CARGO_PKG_NAME"),
            "github",
            "--token",
            "secret",
            "--owner",
            "octocat",
            "download-artifact",
            "--artifact-id",
            "42",
            "--output",
            "logs.zip",
        ],)
        .expect("failed to parse CLI",);

        let args = match cli.command {
            Command::Github(args,) => args,
            other => panic!("unexpected command variant: {other:?}"),
        };
        assert_eq!(args.token.as_deref(), Some("secret"));
        assert_eq!(args.owner, "octocat");
        assert_eq!(args.repo, "firebase-cpp-sdk");
        match args.operation {
            GithubOperation::DownloadArtifact {
                artifact_id,
                output,
            } => {
                assert_eq!(artifact_id, 42);
                assert_eq!(output.to_str(), Some("logs.zip"));
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn github_update_comment_uses_kebab_case_id()
    {
        let cli = Cli::try_parse_from([
            env!("CARGO_PKG_NAME"),
            "github",
            "update-comment",
            "--comment-id",
            "7",
            "--comment",
            "fixed",
        ],)
        .expect("failed to parse CLI",);

        match cli.command {
            Command::Github(args,) => assert!(matches!(
                args.operation,
                GithubOperation::UpdateComment { comment_id: 7, .. }
            )),
            other => panic!("unexpected command variant: {other:?}"),
        }
    }
}
