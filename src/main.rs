//! Discloud CLI
//!
//! Entry point for the `discloud` command-line tool.

use clap::{Args, Parser, Subcommand, ValueEnum};
use discloud_deploy::api::{ApiError, ApiToken, DiscloudClient, PowerAction, Scope};
use discloud_deploy::artifact::Artifact;
use discloud_deploy::build::SystemRunner;
use discloud_deploy::commit::CommitUploader;
use discloud_deploy::config::{
    env_token, AppType, DiscloudConfig, ResolvedSettings, Settings, SettingsOverrides,
};
use discloud_deploy::pipeline::{spawn_commit, CommitJob, CommitPipeline};
use discloud_deploy::runtime::ProjectContext;
use discloud_deploy::transport::{HttpTransport, ReqwestTransport};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "discloud")]
#[command(about = "Package, commit and manage Discloud-hosted apps", version)]
struct Cli {
    /// API token (overrides DISCLOUD_TOKEN and the settings file)
    #[arg(long, global = true)]
    token: Option<String>,

    /// API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the API token to the settings file
    Login {
        /// Discloud API token
        #[arg(value_name = "TOKEN")]
        api_token: String,
    },

    /// Show which runtime would be used for a project
    Detect {
        /// Project directory (default: current directory when no files are given)
        #[arg(long, short = 'd')]
        dir: Option<PathBuf>,

        /// Selected files
        files: Vec<PathBuf>,
    },

    /// Build, package and commit to an existing app
    Commit {
        /// Target app ID
        app_id: String,

        #[command(flatten)]
        package: PackageArgs,

        /// Commit as a team member
        #[arg(long)]
        team: bool,

        /// Do not send the detected runtime with the upload
        #[arg(long)]
        no_runtime_tag: bool,

        /// Kill the build after this many seconds
        #[arg(long, value_name = "SECS")]
        build_timeout: Option<u64>,

        /// Selected files
        files: Vec<PathBuf>,
    },

    /// Zip a project with a discloud.config and upload it as a new app
    Upload {
        #[command(flatten)]
        package: PackageArgs,
    },

    /// Create a discloud.config in the project directory
    Init(InitArgs),

    /// App management commands
    Apps {
        #[command(subcommand)]
        action: AppsCommands,
    },

    /// Team membership commands
    Team {
        #[command(subcommand)]
        action: TeamCommands,
    },
}

#[derive(Args)]
struct PackageArgs {
    /// Project directory (default: current directory)
    #[arg(long, short = 'd')]
    dir: Option<PathBuf>,

    /// Extra glob patterns to leave out of archives
    #[arg(long, short = 'e', value_name = "GLOB")]
    exclude: Vec<String>,

    /// Write the artifact here instead of uploading it
    #[arg(long, short = 'o', value_name = "PATH")]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum AppTypeArg {
    Bot,
    Site,
}

#[derive(Args)]
struct InitArgs {
    /// App type
    #[arg(long = "type", value_enum)]
    app_type: AppTypeArg,

    /// App name
    #[arg(long)]
    name: String,

    #[arg(long)]
    avatar: Option<String>,

    /// Entry point file
    #[arg(long)]
    main: Option<String>,

    /// RAM in MB
    #[arg(long)]
    ram: Option<u32>,

    #[arg(long)]
    autorestart: bool,

    #[arg(long)]
    version: Option<String>,

    /// APT packages
    #[arg(long)]
    apt: Option<String>,

    /// Start command
    #[arg(long)]
    start: Option<String>,

    /// Build command
    #[arg(long)]
    build: Option<String>,

    /// Project directory (default: current directory)
    #[arg(long, short = 'd')]
    dir: Option<PathBuf>,

    /// Overwrite an existing discloud.config
    #[arg(long, short = 'f')]
    force: bool,
}

#[derive(Subcommand)]
enum AppsCommands {
    /// List owned apps
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show container status
    Status(AppTarget),

    Start(AppTarget),

    Restart(AppTarget),

    Stop(AppTarget),

    /// Print the app's terminal output
    Logs(AppTarget),

    /// Change allocated RAM
    Ram {
        #[command(flatten)]
        target: AppTarget,

        /// RAM in MB
        mb: u32,
    },

    /// Download a backup as backup_<APP_ID>.zip
    Backup {
        #[command(flatten)]
        target: AppTarget,

        /// Destination directory (default: current directory)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Delete an app permanently
    Delete {
        app_id: String,
    },
}

#[derive(Args)]
struct AppTarget {
    /// App ID
    app_id: String,

    /// Act as a team member
    #[arg(long)]
    team: bool,
}

impl AppTarget {
    fn scope(&self) -> Scope {
        Scope::from_team_flag(self.team)
    }
}

#[derive(Subcommand)]
enum TeamCommands {
    /// List apps shared with you
    Apps,

    /// List an app's moderators
    Members {
        app_id: String,
    },

    /// Add a moderator
    Add(MemberArgs),

    /// Replace a moderator's permissions
    Edit(MemberArgs),

    /// Remove a moderator
    Remove {
        app_id: String,
        mod_id: String,
    },
}

#[derive(Args)]
struct MemberArgs {
    app_id: String,

    mod_id: String,

    /// Comma-separated permissions (e.g. start_app,logs_app)
    #[arg(long, required = true)]
    perms: String,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = SettingsOverrides {
        token: cli.token.clone(),
        api_url: cli.api_url.clone(),
        build_timeout_secs: None,
    };

    match cli.command {
        Commands::Login { api_token } => run_login(&api_token),
        Commands::Detect { dir, files } => run_detect(dir, files),
        Commands::Commit {
            app_id,
            package,
            team,
            no_runtime_tag,
            build_timeout,
            files,
        } => {
            let overrides = SettingsOverrides {
                build_timeout_secs: build_timeout,
                ..overrides
            };
            run_commit(&overrides, &app_id, package, Scope::from_team_flag(team), !no_runtime_tag, files);
        }
        Commands::Upload { package } => run_upload(&overrides, package),
        Commands::Init(args) => run_init(args),
        Commands::Apps { action } => run_apps(&overrides, action),
        Commands::Team { action } => run_team(&overrides, action),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print `message` to stderr and exit with `code`
fn fail(message: impl std::fmt::Display, code: i32) -> ! {
    eprintln!("Error: {}", message);
    process::exit(code);
}

fn api_exit_code(error: &ApiError) -> i32 {
    match error {
        ApiError::InvalidArgument(_) => 1,
        _ => 3,
    }
}

fn resolve_settings(overrides: &SettingsOverrides) -> ResolvedSettings {
    match Settings::load_default() {
        Ok(settings) => settings.resolve(overrides, env_token()),
        Err(e) => fail(format!("loading settings: {}", e), 1),
    }
}

fn require_token(settings: &ResolvedSettings) -> ApiToken {
    match settings.require_token() {
        Ok(token) => {
            tracing::debug!(origin = ?settings.token_origin, "using API token");
            token
        }
        Err(e) => fail(e, 1),
    }
}

fn transport() -> Arc<dyn HttpTransport> {
    match ReqwestTransport::new() {
        Ok(transport) => Arc::new(transport),
        Err(e) => fail(format!("creating HTTP client: {}", e), 3),
    }
}

fn client(overrides: &SettingsOverrides) -> DiscloudClient {
    let settings = resolve_settings(overrides);
    let token = require_token(&settings);
    DiscloudClient::new(transport(), token).with_base_url(settings.api_url)
}

fn project_dir(dir: Option<PathBuf>) -> PathBuf {
    match dir {
        Some(dir) => dir,
        None => match std::env::current_dir() {
            Ok(cwd) => cwd,
            Err(e) => fail(format!("reading current directory: {}", e), 1),
        },
    }
}

/// A project directory when one is given or no files are, else loose files
fn project_context(dir: Option<PathBuf>, files: Vec<PathBuf>) -> ProjectContext {
    if dir.is_none() && !files.is_empty() {
        return ProjectContext::files(files);
    }
    ProjectContext::new(Some(project_dir(dir)), files)
}

/// Write `artifact` to `out` (a file path, or a directory to put it in)
fn write_artifact(artifact: &Artifact, out: &Path) {
    let path = if out.is_dir() {
        out.join(artifact.filename())
    } else {
        out.to_path_buf()
    };
    if let Err(e) = artifact.write_to(&path) {
        fail(format!("writing {}: {}", path.display(), e), 2);
    }
    println!(
        "Wrote {} ({} bytes, sha256 {})",
        path.display(),
        artifact.size(),
        artifact.sha256()
    );
}

fn run_login(token: &str) {
    let token = token.trim();
    if token.is_empty() {
        fail("token must not be empty", 1);
    }

    let path = match Settings::default_path() {
        Ok(path) => path,
        Err(e) => fail(e, 1),
    };
    let mut settings = match Settings::load(&path) {
        Ok(settings) => settings,
        Err(e) => fail(format!("loading settings: {}", e), 1),
    };
    settings.token = Some(token.to_string());

    if let Err(e) = settings.save(&path) {
        fail(e, 1);
    }
    println!("Token saved to {}", path.display());
}

fn run_detect(dir: Option<PathBuf>, files: Vec<PathBuf>) {
    let context = project_context(dir, files);
    let runtime = context.detect_runtime();

    if runtime.has_build_step() {
        println!("{} (built before upload)", runtime);
    } else {
        println!("{}", runtime);
    }
}

fn run_commit(
    overrides: &SettingsOverrides,
    app_id: &str,
    package: PackageArgs,
    scope: Scope,
    runtime_tag: bool,
    files: Vec<PathBuf>,
) {
    let settings = resolve_settings(overrides);
    let runner = Arc::new(SystemRunner::new().with_timeout(settings.build_timeout));
    let context = project_context(package.dir, files);

    if let Some(out) = package.out {
        // Dry run: nothing is sent, so no token is needed
        let job = CommitJob::new(context, app_id, ApiToken::new(""))
            .with_excludes(package.exclude);
        let uploader = CommitUploader::new(transport());
        let (runtime, artifact) = CommitPipeline::new(runner, uploader).prepare(&job);
        match artifact {
            Ok(artifact) => write_artifact(&artifact, &out),
            Err(e) => fail(format!("packaging {} project: {}", runtime, e), 2),
        }
        return;
    }

    let token = require_token(&settings);
    let uploader = CommitUploader::new(transport()).with_base_url(settings.api_url.as_str());
    let pipeline = Arc::new(CommitPipeline::new(runner, uploader));
    let job = CommitJob::new(context, app_id, token)
        .with_scope(scope)
        .with_runtime_tag(runtime_tag)
        .with_excludes(package.exclude);

    let (tx, rx) = mpsc::channel();
    let handle = match spawn_commit(pipeline, job, move |outcome| {
        let _ = tx.send(outcome);
    }) {
        Ok(handle) => handle,
        Err(e) => fail(&e, e.exit_code()),
    };

    let outcome = rx.recv();
    if handle.join().is_err() {
        fail("commit thread panicked", 2);
    }
    match outcome {
        Ok(outcome) => {
            if outcome.is_success() {
                println!("{}", outcome);
            } else {
                eprintln!("{}", outcome);
            }
            process::exit(outcome.exit_code());
        }
        Err(_) => fail("commit finished without a result", 2),
    }
}

fn run_upload(overrides: &SettingsOverrides, package: PackageArgs) {
    let dir = project_dir(package.dir);
    let settings = resolve_settings(overrides);
    let runner = Arc::new(SystemRunner::new());

    if let Some(out) = package.out {
        let pipeline = CommitPipeline::new(runner, CommitUploader::new(transport()));
        match pipeline.package_project(&dir, &package.exclude) {
            Ok(artifact) => write_artifact(&artifact, &out),
            Err(e) => fail(&e, e.exit_code()),
        }
        return;
    }

    let token = require_token(&settings);
    let uploader = CommitUploader::new(transport()).with_base_url(settings.api_url.as_str());
    let pipeline = CommitPipeline::new(runner, uploader);

    match pipeline.upload_project(&dir, &token, &package.exclude) {
        Ok(result) if result.is_success() => println!("{}", result),
        Ok(result) => {
            eprintln!("{}", result);
            process::exit(3);
        }
        Err(e) => fail(&e, e.exit_code()),
    }
}

fn run_init(args: InitArgs) {
    let app_type = match args.app_type {
        AppTypeArg::Bot => AppType::Bot,
        AppTypeArg::Site => AppType::Site,
    };
    if args.name.trim().is_empty() {
        fail("--name must not be empty", 1);
    }

    let mut config = DiscloudConfig::new(app_type, args.name);
    if let Some(avatar) = args.avatar.filter(|v| !v.trim().is_empty()) {
        config.avatar = avatar;
    }
    if let Some(main) = args.main.filter(|v| !v.trim().is_empty()) {
        config.main = main;
    }
    if let Some(ram) = args.ram {
        if ram == 0 {
            fail("--ram must be greater than 0", 1);
        }
        config.ram = ram;
    }
    config.autorestart = args.autorestart;
    if let Some(version) = args.version.filter(|v| !v.trim().is_empty()) {
        config.version = version;
    }
    if let Some(apt) = args.apt.filter(|v| !v.trim().is_empty()) {
        config.apt = apt;
    }
    config.start = args.start.unwrap_or_default();
    config.build = args.build.unwrap_or_default();

    let dir = project_dir(args.dir);
    match config.write(&dir, args.force) {
        Ok(path) => println!("Created {}", path.display()),
        Err(e) => fail(e, 1),
    }
}

fn run_apps(overrides: &SettingsOverrides, action: AppsCommands) {
    let client = client(overrides);

    let result: Result<(), ApiError> = match action {
        AppsCommands::List { json } => client.list_apps().map(|apps| print_apps(&apps, json)),
        AppsCommands::Status(target) => client.status(target.scope(), &target.app_id).map(|status| {
            println!("App {}", status.id);
            let fields = [
                ("Container", &status.container),
                ("CPU", &status.cpu),
                ("Memory", &status.memory),
                ("SSD", &status.ssd),
                ("Started", &status.started_at),
            ];
            for (label, value) in fields {
                if let Some(value) = value {
                    println!("  {}: {}", label, value);
                }
            }
            if let Some(net) = &status.net_io {
                println!("  Network: {}", net);
            }
        }),
        AppsCommands::Start(target) => power(&client, &target, PowerAction::Start),
        AppsCommands::Restart(target) => power(&client, &target, PowerAction::Restart),
        AppsCommands::Stop(target) => power(&client, &target, PowerAction::Stop),
        AppsCommands::Logs(target) => client
            .logs(target.scope(), &target.app_id)
            .map(|logs| println!("{}", logs)),
        AppsCommands::Ram { target, mb } => client
            .set_ram(target.scope(), &target.app_id, mb)
            .map(|message| println!("{}", message)),
        AppsCommands::Backup { target, out } => {
            let dest = project_dir(out);
            client
                .download_backup(target.scope(), &target.app_id, &dest)
                .map(|path| println!("Backup saved to {}", path.display()))
        }
        AppsCommands::Delete { app_id } => client.delete(&app_id).map(|message| println!("{}", message)),
    };

    if let Err(e) = result {
        fail(&e, api_exit_code(&e));
    }
}

fn power(client: &DiscloudClient, target: &AppTarget, action: PowerAction) -> Result<(), ApiError> {
    client
        .power(target.scope(), &target.app_id, action)
        .map(|message| println!("{}", message))
}

fn print_apps(apps: &[discloud_protocol::AppInfo], json: bool) {
    if json {
        match serde_json::to_string_pretty(apps) {
            Ok(out) => println!("{}", out),
            Err(e) => fail(format!("serializing output: {}", e), 1),
        }
        return;
    }

    if apps.is_empty() {
        println!("No apps found.");
        return;
    }

    println!("Apps ({} total):\n", apps.len());
    for app in apps {
        println!("  {} ({})", app.name, app.id);
        println!("    State: {}", app.state_label());
        println!("    RAM: {} MB", app.ram);
        if let Some(lang) = &app.lang {
            println!("    Language: {}", lang);
        }
    }
}

fn run_team(overrides: &SettingsOverrides, action: TeamCommands) {
    let client = client(overrides);

    let result: Result<(), ApiError> = match action {
        TeamCommands::Apps => client.team_apps().map(|apps| print_apps(&apps, false)),
        TeamCommands::Members { app_id } => client.team_members(&app_id).map(|members| {
            if members.is_empty() {
                println!("No moderators.");
            }
            for member in members {
                println!("  {}: {}", member.mod_id, member.perms.join(", "));
            }
        }),
        TeamCommands::Add(args) => {
            let perms = discloud_protocol::parse_perms(&args.perms);
            client
                .add_member(&args.app_id, &args.mod_id, &perms)
                .map(|message| println!("{}", message))
        }
        TeamCommands::Edit(args) => {
            let perms = discloud_protocol::parse_perms(&args.perms);
            client
                .edit_member(&args.app_id, &args.mod_id, &perms)
                .map(|message| println!("{}", message))
        }
        TeamCommands::Remove { app_id, mod_id } => client
            .remove_member(&app_id, &mod_id)
            .map(|message| println!("{}", message)),
    };

    if let Err(e) = result {
        fail(&e, api_exit_code(&e));
    }
}
