use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::FetchResult;
use crate::error::FetchError;
use crate::runtime::{CommandSpec, Runtime};

/// Run `xrepo fetch --cflags` and derive directories from the include flag.
#[tracing::instrument(skip(runtime, executable, query_args))]
pub fn fetch_text<R: Runtime>(
    runtime: &R,
    executable: &Path,
    query_args: &[String],
    package: &str,
    package_name: &str,
) -> Result<FetchResult> {
    let command = CommandSpec::new(executable)
        .args(["fetch", "--cflags"])
        .args(query_args.iter().cloned())
        .arg(package);
    let output = runtime
        .run(&command)
        .with_context(|| format!("Failed to run `{}`", command))?;

    if !output.success() {
        if !output.stderr.is_empty() {
            warn!("{}", output.stderr.trim_end());
        }
        return Err(FetchError::Query {
            package: package.to_string(),
            code: output.code_display(),
        }
        .into());
    }

    parse_cflags(runtime, package, package_name, &output.stdout)
}

/// Derive a [`FetchResult`] from compiler flags.
///
/// The install root is the first `-I` path with its trailing `/include...`
/// removed. From it: include dir `<root>/include`, link dir `<root>/lib` when
/// present, and config module `<package_name>` at `<root>/lib/cmake/<package_name>`
/// when present.
pub fn parse_cflags<R: Runtime>(
    runtime: &R,
    package: &str,
    package_name: &str,
    stdout: &str,
) -> Result<FetchResult> {
    let parse_error = |reason: &str| FetchError::Parse {
        package: package.to_string(),
        reason: reason.to_string(),
    };

    let include_flag = stdout
        .split_whitespace()
        .filter_map(|token| token.strip_prefix("-I"))
        .map(|path| path.trim_matches('"'))
        .find(|path| !path.is_empty())
        .ok_or_else(|| parse_error("no -I flag in output"))?;

    let root = install_root(include_flag)
        .ok_or_else(|| parse_error("include path does not contain an include directory"))?;
    debug!("Install root of {}: {:?}", package, root);

    let mut result = FetchResult {
        include_dirs: vec![root.join("include")],
        ..Default::default()
    };

    let lib_dir = root.join("lib");
    if runtime.is_dir(&lib_dir) {
        let config_dir = lib_dir.join("cmake").join(package_name);
        if runtime.is_dir(&config_dir) {
            result
                .config_dirs
                .insert(package_name.to_string(), config_dir);
        }
        result.link_dirs.push(lib_dir);
    }

    Ok(result)
}

/// `/opt/pkg/include/foo` -> `/opt/pkg`
fn install_root(include_path: &str) -> Option<PathBuf> {
    let normalized = include_path.replace('\\', "/");
    let idx = normalized
        .match_indices("/include")
        .map(|(idx, _)| idx)
        .filter(|&idx| {
            let rest = &normalized[idx + "/include".len()..];
            rest.is_empty() || rest.starts_with('/')
        })
        .last()?;
    if idx == 0 {
        return Some(PathBuf::from("/"));
    }
    Some(PathBuf::from(&include_path[..idx]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CommandOutput, MockRuntime};
    use mockall::predicate::eq;

    #[test]
    fn test_install_root() {
        assert_eq!(install_root("/opt/pkg/include"), Some(PathBuf::from("/opt/pkg")));
        assert_eq!(
            install_root("/opt/pkg/include/freetype2"),
            Some(PathBuf::from("/opt/pkg"))
        );
        assert_eq!(
            install_root("/home/include/pkgs/z/include"),
            Some(PathBuf::from("/home/include/pkgs/z"))
        );
        assert_eq!(install_root("/include"), Some(PathBuf::from("/")));
        assert_eq!(install_root("/opt/includes"), None);
        assert_eq!(install_root("/opt/pkg/headers"), None);
    }

    #[test]
    fn test_parse_cflags_with_lib_dir() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_is_dir()
            .with(eq(Path::new("/opt/pkg/lib")))
            .returning(|_| true);
        runtime
            .expect_is_dir()
            .with(eq(Path::new("/opt/pkg/lib/cmake/pkg")))
            .returning(|_| false);

        let result = parse_cflags(&runtime, "pkg", "pkg", "-I/opt/pkg/include -DFOO\n").unwrap();

        assert_eq!(result.include_dirs, vec![PathBuf::from("/opt/pkg/include")]);
        assert_eq!(result.link_dirs, vec![PathBuf::from("/opt/pkg/lib")]);
        assert!(result.config_dirs.is_empty());
    }

    #[test]
    fn test_parse_cflags_without_lib_dir() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| false);

        let result = parse_cflags(&runtime, "pkg", "pkg", "-DFOO -I/opt/pkg/include").unwrap();

        assert_eq!(result.include_dirs, vec![PathBuf::from("/opt/pkg/include")]);
        assert!(result.link_dirs.is_empty());
    }

    #[test]
    fn test_parse_cflags_config_module_dir() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| true);

        let result = parse_cflags(
            &runtime,
            "fmt 10.2.1",
            "fmt",
            "-I/home/u/.xmake/packages/f/fmt/10.2.1/abc/include",
        )
        .unwrap();

        assert_eq!(
            result.config_dirs.get("fmt"),
            Some(&PathBuf::from(
                "/home/u/.xmake/packages/f/fmt/10.2.1/abc/lib/cmake/fmt"
            ))
        );
    }

    #[test]
    fn test_parse_cflags_only_first_include_counts() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| false);

        let result =
            parse_cflags(&runtime, "png", "png", "-I/p/png/include -I/p/zlib/include").unwrap();

        assert_eq!(result.include_dirs, vec![PathBuf::from("/p/png/include")]);
    }

    #[test]
    fn test_parse_cflags_without_include_flag() {
        let runtime = MockRuntime::new();

        let err = parse_cflags(&runtime, "pkg", "pkg", "-DFOO -O2").unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Parse { .. })
        ));
    }

    #[test]
    fn test_fetch_text_runs_cflags_query() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run()
            .withf(|cmd| cmd.args == ["fetch", "--cflags", "--mode=debug", "zlib"])
            .times(1)
            .returning(|_| {
                Ok(CommandOutput {
                    code: Some(0),
                    stdout: "-I/z/include".to_string(),
                    stderr: String::new(),
                })
            });
        runtime.expect_is_dir().returning(|_| false);

        let result = fetch_text(
            &runtime,
            Path::new("xrepo"),
            &["--mode=debug".to_string()],
            "zlib",
            "zlib",
        )
        .unwrap();

        assert_eq!(result.include_dirs, vec![PathBuf::from("/z/include")]);
    }

    #[test]
    fn test_fetch_text_query_failure() {
        let mut runtime = MockRuntime::new();
        runtime.expect_run().returning(|_| {
            Ok(CommandOutput {
                code: Some(255),
                ..Default::default()
            })
        });

        let err = fetch_text(&runtime, Path::new("xrepo"), &[], "zlib", "zlib").unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Query { .. })
        ));
    }
}
