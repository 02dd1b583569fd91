//! Variable publisher.
//!
//! A fetch produces plain data ([`Published`]); writing it anywhere is a
//! separate, explicit step. Directory-scoped requests additionally carry
//! [`SearchPaths`] that callers opt into with
//! [`Published::apply_search_paths`].

use anyhow::{Result, anyhow};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use crate::query::FetchResult;

/// How published variables are written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `NAME=a;b`
    #[default]
    Env,
    /// `{"NAME": ["a", "b"]}`
    Json,
    /// `set(NAME "a;b")`
    Cmake,
    /// `cargo:rustc-env=NAME=a;b`
    Cargo,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "env" => Ok(OutputFormat::Env),
            "json" => Ok(OutputFormat::Json),
            "cmake" => Ok(OutputFormat::Cmake),
            "cargo" => Ok(OutputFormat::Cargo),
            other => Err(anyhow!(
                "Unknown format '{}': expected env, json, cmake or cargo",
                other
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Env => "env",
            OutputFormat::Json => "json",
            OutputFormat::Cmake => "cmake",
            OutputFormat::Cargo => "cargo",
        };
        f.write_str(name)
    }
}

/// A named output, e.g. `zlib_INCLUDE_DIR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub name: String,
    pub values: Vec<PathBuf>,
}

/// Directories to add to the compiler/linker search paths of the whole
/// calling scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchPaths {
    pub include_dirs: Vec<PathBuf>,
    pub link_dirs: Vec<PathBuf>,
    /// `links` followed by `syslinks`, applied only on request
    pub link_libraries: Vec<String>,
}

impl SearchPaths {
    fn extend(&mut self, other: SearchPaths) {
        self.include_dirs.extend(other.include_dirs);
        self.link_dirs.extend(other.link_dirs);
        self.link_libraries.extend(other.link_libraries);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Published {
    pub variables: Vec<Variable>,
    pub search_paths: Option<SearchPaths>,
}

/// Turn a fetch result into named outputs.
///
/// - `<name>_INCLUDE_DIR`: always
/// - `<name>_LINK_DIR`: only when there are link directories
/// - `<module>_DIR`: one per discovered config module, keyed by the module's
///   own name
pub fn publish(name: &str, result: &FetchResult, directory_scope: bool) -> Published {
    let mut variables = vec![Variable {
        name: format!("{}_INCLUDE_DIR", name),
        values: result.include_dirs.clone(),
    }];
    if !result.link_dirs.is_empty() {
        variables.push(Variable {
            name: format!("{}_LINK_DIR", name),
            values: result.link_dirs.clone(),
        });
    }
    for (module, dir) in &result.config_dirs {
        variables.push(Variable {
            name: format!("{}_DIR", module),
            values: vec![dir.clone()],
        });
    }

    let search_paths = directory_scope.then(|| SearchPaths {
        include_dirs: result.include_dirs.clone(),
        link_dirs: result.link_dirs.clone(),
        link_libraries: result
            .links
            .iter()
            .chain(&result.syslinks)
            .cloned()
            .collect(),
    });

    Published {
        variables,
        search_paths,
    }
}

impl Published {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.search_paths.is_none()
    }

    pub fn get(&self, name: &str) -> Option<&[PathBuf]> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.values.as_slice())
    }

    /// Fold another package's outputs in. A variable published twice keeps
    /// the later value.
    pub fn merge(&mut self, other: Published) {
        for variable in other.variables {
            match self.variables.iter_mut().find(|v| v.name == variable.name) {
                Some(existing) => existing.values = variable.values,
                None => self.variables.push(variable),
            }
        }
        if let Some(paths) = other.search_paths {
            self.search_paths.get_or_insert_with(Default::default).extend(paths);
        }
    }

    /// Render the variables in `format`.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        let line: fn(&str, &str) -> String = match format {
            OutputFormat::Json => return self.render_json(),
            OutputFormat::Env => |name, joined| format!("{}={}\n", name, joined),
            OutputFormat::Cmake => {
                |name, joined| format!("set({} \"{}\")\n", name, cmake_escape(joined))
            }
            OutputFormat::Cargo => |name, joined| format!("cargo:rustc-env={}={}\n", name, joined),
        };

        Ok(self
            .variables
            .iter()
            .map(|variable| line(&variable.name, &join(&variable.values, format)))
            .collect())
    }

    fn render_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            variables: BTreeMap<&'a str, &'a [PathBuf]>,
            #[serde(skip_serializing_if = "Option::is_none")]
            search_paths: Option<&'a SearchPaths>,
        }

        let output = JsonOutput {
            variables: self
                .variables
                .iter()
                .map(|v| (v.name.as_str(), v.values.as_slice()))
                .collect(),
            search_paths: self.search_paths.as_ref(),
        };
        let mut rendered = serde_json::to_string_pretty(&output)?;
        rendered.push('\n');
        Ok(rendered)
    }

    /// Register the directory-scoped search paths with the caller's build
    /// tool. Does nothing unless a request asked for directory scope.
    ///
    /// For JSON the search paths are already part of [`Published::render`].
    pub fn apply_search_paths<W: Write>(
        &self,
        format: OutputFormat,
        link_libraries: bool,
        out: &mut W,
    ) -> Result<()> {
        let Some(paths) = &self.search_paths else {
            return Ok(());
        };

        match format {
            OutputFormat::Cargo => {
                for dir in &paths.include_dirs {
                    writeln!(out, "cargo:include={}", dir.display())?;
                }
                for dir in &paths.link_dirs {
                    writeln!(out, "cargo:rustc-link-search=native={}", dir.display())?;
                }
                if link_libraries {
                    for lib in &paths.link_libraries {
                        writeln!(out, "cargo:rustc-link-lib={}", lib)?;
                    }
                }
            }
            OutputFormat::Cmake => {
                if !paths.include_dirs.is_empty() {
                    writeln!(out, "include_directories({})", cmake_args(&paths.include_dirs))?;
                }
                if !paths.link_dirs.is_empty() {
                    writeln!(out, "link_directories({})", cmake_args(&paths.link_dirs))?;
                }
                if link_libraries && !paths.link_libraries.is_empty() {
                    writeln!(out, "link_libraries({})", paths.link_libraries.join(" "))?;
                }
            }
            OutputFormat::Env => {
                writeln!(
                    out,
                    "INCLUDE_DIRECTORIES={}",
                    join(&paths.include_dirs, format)
                )?;
                writeln!(out, "LINK_DIRECTORIES={}", join(&paths.link_dirs, format))?;
                if link_libraries {
                    writeln!(out, "LINK_LIBRARIES={}", paths.link_libraries.join(";"))?;
                }
            }
            OutputFormat::Json => {}
        }
        Ok(())
    }
}

fn join(values: &[PathBuf], format: OutputFormat) -> String {
    values
        .iter()
        .map(|p| {
            let s = p.to_string_lossy();
            if format == OutputFormat::Cmake {
                s.replace('\\', "/")
            } else {
                s.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn cmake_escape(s: &str) -> String {
    s.replace('"', "\\\"")
}

fn cmake_args(values: &[PathBuf]) -> String {
    values
        .iter()
        .map(|p| format!("\"{}\"", cmake_escape(&p.to_string_lossy().replace('\\', "/"))))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zlib_result() -> FetchResult {
        FetchResult {
            include_dirs: vec![PathBuf::from("/z/include")],
            link_dirs: vec![PathBuf::from("/z/lib")],
            links: vec!["z".to_string()],
            syslinks: vec!["m".to_string()],
            config_dirs: BTreeMap::from([(
                "ZLIB".to_string(),
                PathBuf::from("/z/lib/cmake/ZLIB"),
            )]),
            ..Default::default()
        }
    }

    #[test]
    fn test_publish_variables() {
        let published = publish("zlib", &zlib_result(), false);

        assert_eq!(
            published.get("zlib_INCLUDE_DIR"),
            Some(&[PathBuf::from("/z/include")][..])
        );
        assert_eq!(
            published.get("zlib_LINK_DIR"),
            Some(&[PathBuf::from("/z/lib")][..])
        );
        // keyed by the module's own name
        assert_eq!(
            published.get("ZLIB_DIR"),
            Some(&[PathBuf::from("/z/lib/cmake/ZLIB")][..])
        );
        assert_eq!(published.search_paths, None);
    }

    #[test]
    fn test_publish_skips_empty_link_dir() {
        let result = FetchResult {
            include_dirs: vec![PathBuf::from("/h/include")],
            ..Default::default()
        };

        let published = publish("header_only", &result, false);

        assert!(published.get("header_only_INCLUDE_DIR").is_some());
        assert!(published.get("header_only_LINK_DIR").is_none());
        assert_eq!(published.variables.len(), 1);
    }

    #[test]
    fn test_publish_directory_scope() {
        let published = publish("zlib", &zlib_result(), true);

        let paths = published.search_paths.unwrap();
        assert_eq!(paths.include_dirs, vec![PathBuf::from("/z/include")]);
        assert_eq!(paths.link_dirs, vec![PathBuf::from("/z/lib")]);
        assert_eq!(paths.link_libraries, vec!["z", "m"]);
    }

    #[test]
    fn test_merge() {
        let mut published = publish("zlib", &zlib_result(), true);
        let other = FetchResult {
            include_dirs: vec![PathBuf::from("/f/include")],
            config_dirs: BTreeMap::from([("ZLIB".to_string(), PathBuf::from("/other/ZLIB"))]),
            ..Default::default()
        };

        published.merge(publish("fmt", &other, false));

        assert!(published.get("fmt_INCLUDE_DIR").is_some());
        assert_eq!(
            published.get("ZLIB_DIR"),
            Some(&[PathBuf::from("/other/ZLIB")][..])
        );
        // fmt was not directory scoped
        assert_eq!(
            published.search_paths.unwrap().include_dirs,
            vec![PathBuf::from("/z/include")]
        );
    }

    #[test]
    fn test_render_env() {
        let mut result = zlib_result();
        result.include_dirs.push(PathBuf::from("/z/include/zlib"));
        let published = publish("zlib", &result, false);

        let rendered = published.render(OutputFormat::Env).unwrap();

        assert_eq!(
            rendered,
            "zlib_INCLUDE_DIR=/z/include;/z/include/zlib\nzlib_LINK_DIR=/z/lib\nZLIB_DIR=/z/lib/cmake/ZLIB\n"
        );
    }

    #[test]
    fn test_render_cmake() {
        let published = publish("zlib", &zlib_result(), false);

        let rendered = published.render(OutputFormat::Cmake).unwrap();

        assert!(rendered.contains("set(zlib_INCLUDE_DIR \"/z/include\")\n"));
        assert!(rendered.contains("set(ZLIB_DIR \"/z/lib/cmake/ZLIB\")\n"));
    }

    #[test]
    fn test_render_cargo() {
        let published = publish("zlib", &zlib_result(), false);

        let rendered = published.render(OutputFormat::Cargo).unwrap();

        assert!(rendered.starts_with("cargo:rustc-env=zlib_INCLUDE_DIR=/z/include\n"));
    }

    #[test]
    fn test_render_json() {
        let published = publish("zlib", &zlib_result(), true);

        let rendered = published.render(OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["variables"]["zlib_LINK_DIR"][0], "/z/lib");
        assert_eq!(value["search_paths"]["link_libraries"][1], "m");
    }

    #[test]
    fn test_apply_search_paths_cargo() {
        let published = publish("zlib", &zlib_result(), true);
        let mut out = Vec::new();

        published
            .apply_search_paths(OutputFormat::Cargo, true, &mut out)
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "cargo:include=/z/include\n\
             cargo:rustc-link-search=native=/z/lib\n\
             cargo:rustc-link-lib=z\n\
             cargo:rustc-link-lib=m\n"
        );
    }

    #[test]
    fn test_apply_search_paths_cmake() {
        let published = publish("zlib", &zlib_result(), true);
        let mut out = Vec::new();

        published
            .apply_search_paths(OutputFormat::Cmake, false, &mut out)
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "include_directories(\"/z/include\")\nlink_directories(\"/z/lib\")\n"
        );
    }

    #[test]
    fn test_apply_search_paths_requires_directory_scope() {
        let published = publish("zlib", &zlib_result(), false);
        let mut out = Vec::new();

        published
            .apply_search_paths(OutputFormat::Cargo, true, &mut out)
            .unwrap();

        assert!(out.is_empty());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("CMake".parse::<OutputFormat>().unwrap(), OutputFormat::Cmake);
        assert_eq!("cargo".parse::<OutputFormat>().unwrap(), OutputFormat::Cargo);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
