use anyhow::{Result, bail};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use xrepo_fetch::config::parse_loose_version;
use xrepo_fetch::request::parse_configs;
use xrepo_fetch::runtime::RealRuntime;
use xrepo_fetch::{Fetcher, OutputFormat, PackageRequest, Settings, Verbosity};

/// xrepo-fetch - install xmake packages and expose their directories
///
/// Installs packages with `xrepo`, queries where they ended up and prints the
/// include, library and CMake config directories for a build to consume.
///
/// Settings are read from the environment (XREPO_PACKAGE_DISABLE,
/// XREPO_BOOTSTRAP_XMAKE, XREPO_EXECUTABLE, ...); flags override them.
///
/// Examples:
///   xrepo-fetch fetch "zlib 1.2.11"
///   xrepo-fetch fetch fmt --mode debug --format cmake
///   xrepo-fetch --bootstrap fetch libpng --configs shared=true
#[derive(Parser, Debug)]
#[command(author, version = env!("XREPO_FETCH_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Skip every package operation
    #[arg(long, global = true)]
    pub disable: bool,

    /// Diagnosis output for every xrepo install
    #[arg(long = "verbose-all", global = true)]
    pub verbose_all: bool,

    /// Download and build xmake when xrepo is not found
    #[arg(long, global = true)]
    pub bootstrap: bool,

    /// Path to the xrepo executable (also via XREPO_EXECUTABLE)
    #[arg(
        long = "xrepo",
        env = "XREPO_EXECUTABLE",
        value_name = "PATH",
        global = true
    )]
    pub executable: Option<PathBuf>,

    /// Directory for bootstrap artifacts (also via XREPO_BUILD_DIR)
    #[arg(
        long = "build-dir",
        env = "XREPO_BUILD_DIR",
        value_name = "PATH",
        global = true
    )]
    pub build_dir: Option<PathBuf>,

    /// Version of the build tool consuming the results, e.g. 3.16 (also via
    /// XREPO_HOST_TOOL_VERSION)
    #[arg(
        long = "host-tool-version",
        env = "XREPO_HOST_TOOL_VERSION",
        value_name = "VERSION",
        global = true
    )]
    pub host_tool_version: Option<String>,

    /// Log debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install packages and print their directories
    Fetch(FetchArgs),

    /// Print the path of the xrepo executable, bootstrapping it if allowed
    Locate,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// Packages as xrepo understands them, e.g. "zlib 1.2.11"
    #[arg(value_name = "PACKAGE", required = true)]
    pub packages: Vec<String>,

    /// Package configs, e.g. "shared=true,vs_runtime=MD"
    #[arg(long, value_name = "K=V,...")]
    pub configs: Option<String>,

    /// Build mode: debug or release
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// xrepo output level: default, diag, verbose or quiet
    #[arg(long, value_name = "LEVEL", default_value = "default")]
    pub output: Verbosity,

    /// Prefix for the published variables (single package only)
    #[arg(long, value_name = "NAME")]
    pub alias: Option<String>,

    /// Also print search-path directives for the whole build
    #[arg(long = "directory-scope")]
    pub directory_scope: bool,

    /// Output format: env, json, cmake or cargo
    #[arg(long, value_name = "FORMAT", default_value = "env")]
    pub format: OutputFormat,

    /// With --directory-scope, also emit the libraries to link
    #[arg(long = "link-libraries")]
    pub link_libraries: bool,
}

impl Cli {
    fn settings(&self, runtime: &RealRuntime) -> Result<Settings> {
        let mut settings = Settings::from_env(runtime)?;
        settings.disabled |= self.disable;
        settings.verbose |= self.verbose_all;
        settings.bootstrap |= self.bootstrap;
        if let Some(executable) = &self.executable {
            settings.executable = Some(executable.clone());
        }
        if let Some(build_dir) = &self.build_dir {
            settings.build_dir = Some(build_dir.clone());
        }
        if let Some(version) = &self.host_tool_version {
            settings.host_tool_version = Some(parse_loose_version(version)?);
        }
        Ok(settings)
    }
}

impl FetchArgs {
    fn requests(&self) -> Result<Vec<PackageRequest>> {
        if self.alias.is_some() && self.packages.len() > 1 {
            bail!("--alias can only be used with a single package");
        }
        let configs = match &self.configs {
            Some(configs) => parse_configs(configs)?,
            None => Vec::new(),
        };

        Ok(self
            .packages
            .iter()
            .map(|package| {
                let mut request = PackageRequest::new(package.as_str())
                    .with_configs(configs.iter().cloned())
                    .with_verbosity(self.output)
                    .with_directory_scope(self.directory_scope);
                if let Some(mode) = &self.mode {
                    request = request.with_mode(mode.as_str());
                }
                if let Some(alias) = &self.alias {
                    request = request.with_alias(alias.as_str());
                }
                request
            })
            .collect())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let runtime = RealRuntime;
    let settings = cli.settings(&runtime)?;
    let fetcher = Fetcher::new(runtime, settings)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match &cli.command {
        Commands::Fetch(args) => {
            let requests = args.requests()?;
            let published = fetcher.fetch_all(&requests).await?;
            out.write_all(published.render(args.format)?.as_bytes())?;
            published.apply_search_paths(args.format, args.link_libraries, &mut out)?;
        }
        Commands::Locate => {
            let executable = fetcher.executable().await?;
            writeln!(out, "{}", executable.display())?;
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_fetch_parsing() {
        let cli = Cli::try_parse_from(["xrepo-fetch", "fetch", "zlib 1.2.11"]).unwrap();
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.packages, vec!["zlib 1.2.11"]);
                assert_eq!(args.format, OutputFormat::Env);
                assert_eq!(args.output, Verbosity::Normal);
                assert!(!args.directory_scope);
            }
            _ => panic!("Expected Fetch command"),
        }
        assert!(!cli.disable);
        assert_eq!(cli.executable, None);
    }

    #[test]
    fn test_cli_fetch_options() {
        let cli = Cli::try_parse_from([
            "xrepo-fetch",
            "fetch",
            "libpng",
            "--configs",
            "shared=true",
            "--mode",
            "Debug",
            "--output",
            "quiet",
            "--alias",
            "PNG",
            "--directory-scope",
            "--format",
            "cargo",
            "--link-libraries",
        ])
        .unwrap();
        let Commands::Fetch(args) = cli.command else {
            panic!("Expected Fetch command");
        };

        let requests = args.requests().unwrap();

        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.name(), "PNG");
        assert_eq!(request.mode(), Some("Debug"));
        assert_eq!(request.verbosity(), Verbosity::Quiet);
        assert_eq!(request.configs(), &[("shared".to_string(), "true".to_string())]);
        assert!(request.directory_scope());
        assert_eq!(args.format, OutputFormat::Cargo);
        assert!(args.link_libraries);
    }

    #[test]
    fn test_cli_multiple_packages() {
        let cli = Cli::try_parse_from(["xrepo-fetch", "fetch", "zlib", "fmt 10.0.0"]).unwrap();
        let Commands::Fetch(args) = cli.command else {
            panic!("Expected Fetch command");
        };

        let names: Vec<String> = args
            .requests()
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect();

        assert_eq!(names, vec!["zlib", "fmt"]);
    }

    #[test]
    fn test_cli_alias_requires_single_package() {
        let cli =
            Cli::try_parse_from(["xrepo-fetch", "fetch", "zlib", "fmt", "--alias", "X"]).unwrap();
        let Commands::Fetch(args) = cli.command else {
            panic!("Expected Fetch command");
        };

        assert!(args.requests().is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from([
            "xrepo-fetch",
            "--disable",
            "--xrepo",
            "/opt/xmake/bin/xrepo",
            "locate",
            "--bootstrap",
            "--host-tool-version",
            "3.16",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Locate));
        assert!(cli.disable);
        assert!(cli.bootstrap);
        assert_eq!(cli.executable, Some(PathBuf::from("/opt/xmake/bin/xrepo")));
        assert_eq!(cli.host_tool_version.as_deref(), Some("3.16"));
    }

    #[test]
    fn test_cli_path_flags_read_environment() {
        use clap::CommandFactory;

        let command = Cli::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(|env| env.to_string_lossy().into_owned())
        };

        assert_eq!(env_of("executable").as_deref(), Some("XREPO_EXECUTABLE"));
        assert_eq!(env_of("build_dir").as_deref(), Some("XREPO_BUILD_DIR"));
        assert_eq!(
            env_of("host_tool_version").as_deref(),
            Some("XREPO_HOST_TOOL_VERSION")
        );
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        let result = Cli::try_parse_from(["xrepo-fetch", "fetch", "zlib", "--format", "yaml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_fetch_requires_package() {
        let result = Cli::try_parse_from(["xrepo-fetch", "fetch"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(["xrepo-fetch", "zlib"]);
        assert!(result.is_err());
    }
}
