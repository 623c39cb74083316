//! Configuration file wrangling
// (c) 2024 Ross Younger

use super::Configuration;
use crate::os::{AbstractPlatform as _, Platform};

use figment::{
    providers::{Format, Serialized, Toml},
    value::Value,
    Figment, Metadata, Provider,
};
use serde::Deserialize;
use std::{
    collections::HashSet,
    fmt::{Debug, Display},
    path::Path,
};
use struct_field_names_as_array::FieldNamesAsSlice;
use tabled::{settings::style::Style, Table, Tabled};

use tracing::{trace, warn};

// SYSTEM DEFAULTS //////////////////////////////////////////////////////////////////////////////////////////////

/// A `[https://docs.rs/figment/latest/figment/trait.Provider.html](figment::Provider)` that holds
/// our set of fixed system default options
#[derive(Default)]
struct SystemDefault {}

impl SystemDefault {
    const META_NAME: &str = "default";
}

impl Provider for SystemDefault {
    fn metadata(&self) -> Metadata {
        figment::Metadata::named(Self::META_NAME)
    }

    fn data(
        &self,
    ) -> std::result::Result<
        figment::value::Map<figment::Profile, figment::value::Dict>,
        figment::Error,
    > {
        Serialized::defaults(Configuration::default()).data()
    }
}

// CONFIG MANAGER /////////////////////////////////////////////////////////////////////////////////////////////

/// Processes and merges all possible configuration sources.
///
/// Configuration file locations are platform-dependent.
/// To see what applies on the current platform, run `portrank --config-files`.
#[derive(Debug, Default)]
pub struct Manager {
    /// Configuration data
    data: Figment,
}

fn add_user_config(f: Figment) -> Figment {
    let Some(path) = Platform::user_config_path() else {
        warn!("could not determine user configuration file path");
        return f;
    };
    if !path.exists() {
        trace!("user configuration file {path:?} not present");
        return f;
    }
    f.merge(Toml::file(path.as_path()))
}

fn add_system_config(f: Figment) -> Figment {
    let Some(path) = Platform::system_config_path() else {
        return f;
    };
    if !path.exists() {
        trace!("system configuration file {path:?} not present");
        return f;
    }
    f.merge(Toml::file(path.as_path()))
}

impl Manager {
    /// Initialises this structure, reading the set of config files appropriate to the platform
    /// and the current user.
    #[must_use]
    pub fn new() -> Self {
        let mut data = Figment::new().merge(SystemDefault::default());
        data = add_system_config(data);

        // N.B. This may leave data in a fused-error state, if a data file isn't parseable.
        data = add_user_config(data);
        Self { data }
    }

    /// Returns the list of configuration files we read.
    ///
    /// This is a function of platform and the current user id.
    #[must_use]
    pub fn config_files() -> Vec<String> {
        [Platform::system_config_path(), Platform::user_config_path()]
            .into_iter()
            .flatten()
            .map(|p| p.into_os_string().to_string_lossy().into())
            .collect()
    }

    /// Testing/internal constructor, does not read files from system
    #[must_use]
    pub(crate) fn without_files() -> Self {
        let data = Figment::new().merge(SystemDefault::default());
        Self { data }
    }

    /// Merges in a data set, which is some sort of [figment::Provider](https://docs.rs/figment/latest/figment/trait.Provider.html).
    ///
    /// Within portrank, we use [crate::util::derive_deftly_template_Optionalify] to implement Provider for [Configuration].
    pub fn merge_provider<T>(&mut self, provider: T)
    where
        T: Provider,
    {
        let f = std::mem::take(&mut self.data);
        self.data = f.merge(provider); // in the error case, this leaves the provider in a fused state
    }

    /// Merges in a data set from a TOML file
    pub fn merge_toml_file<T>(&mut self, toml: T)
    where
        T: AsRef<Path>,
    {
        let path = toml.as_ref();
        let provider = Toml::file_exact(path);
        self.merge_provider(provider);
    }

    /// Attempts to extract a particular struct from the data.
    ///
    /// Within portrank, `T` is usually [Configuration], but it isn't intrinsically required to be.
    pub fn get<'de, T>(&self) -> anyhow::Result<T, figment::Error>
    where
        T: Deserialize<'de>,
    {
        self.data.extract::<T>()
    }

    /// Extracts the [Configuration] and checks it makes sense
    pub fn configuration(&self) -> anyhow::Result<Configuration> {
        let config = self.get::<Configuration>()?;
        config.validate()?;
        Ok(config)
    }
}

// PRETTY PRINT SUPPORT ///////////////////////////////////////////////////////////////////////////////////////

#[derive(Tabled)]
struct PrettyConfig {
    field: String,
    value: String,
    source: String,
}

impl PrettyConfig {
    fn render_source(meta: Option<&Metadata>) -> String {
        if let Some(m) = meta {
            m.source
                .as_ref()
                .map_or_else(|| m.name.to_string(), figment::Source::to_string)
        } else {
            String::new()
        }
    }

    fn render_value(value: &Value) -> String {
        match value {
            Value::String(_tag, s) => s.to_string(),
            Value::Char(_tag, c) => c.to_string(),
            Value::Bool(_tag, b) => b.to_string(),
            Value::Num(_tag, num) => {
                if let Some(i) = num.to_i128() {
                    i.to_string()
                } else if let Some(u) = num.to_u128() {
                    u.to_string()
                } else if let Some(ff) = num.to_f64() {
                    ff.to_string()
                } else {
                    format!("{num:?}")
                }
            }
            Value::Empty(_tag, _) => "<empty>".into(),
            // no field of ours is a dict
            Value::Dict(_tag, _dict) => "<dict>".into(),
            Value::Array(_tag, vec) => {
                format!(
                    "[{}]",
                    vec.iter()
                        .map(PrettyConfig::render_value)
                        .collect::<Vec<_>>()
                        .join(",")
                )
            }
        }
    }

    fn new(field: &str, value: &Value, meta: Option<&Metadata>) -> Self {
        Self {
            field: field.into(),
            value: PrettyConfig::render_value(value),
            source: PrettyConfig::render_source(meta),
        }
    }
}

impl Display for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = match self.data.data() {
            Ok(d) => d,
            Err(e) => {
                // This isn't terribly helpful as it doesn't have metadata attached; BUT attempting to get() a struct does.
                return write!(f, "error: {e}");
            }
        };
        let Some(data) = data.get(&figment::Profile::Default) else {
            return write!(f, "<no data>");
        };

        let mut fields = Vec::<PrettyConfig>::new();

        for field in data.keys() {
            let value = self.data.find_value(field);
            let value = match value {
                Ok(v) => v,
                Err(e) => {
                    writeln!(f, "error on field {field}: {e}")?;
                    continue;
                }
            };
            let meta = self.data.find_metadata(field);
            fields.push(PrettyConfig::new(field, &value, meta));
        }
        write!(f, "{}", Table::new(fields).with(Style::sharp()))
    }
}

/// Pretty-printing type wrapper to Manager
#[derive(Debug)]
pub struct DisplayAdapter<'a> {
    /// Data source
    source: &'a Manager,
    /// Whether to warn if unused fields are present
    warn_on_unused: bool,
    /// The fields we want to output
    fields: HashSet<String>,
}

impl Manager {
    /// Creates a `DisplayAdapter` for this struct with the given options.
    ///
    /// # Returns
    /// An ephemeral structure implementing `Display`.
    #[must_use]
    pub fn to_display_adapter<'de, T>(&self, warn_on_unused: bool) -> DisplayAdapter<'_>
    where
        T: Deserialize<'de> + FieldNamesAsSlice,
    {
        let mut fields = HashSet::<String>::new();
        fields.extend(T::FIELD_NAMES_AS_SLICE.iter().map(|s| String::from(*s)));
        DisplayAdapter {
            source: self,
            warn_on_unused,
            fields,
        }
    }
}

impl Display for DisplayAdapter<'_> {
    /// Formats the contents of this structure which are relevant to a given output type.
    ///
    /// N.B. This function uses CLI styling.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::cli::styles::{ERROR, WARNING};
        use anstream::eprintln;

        let data = match self.source.data.data() {
            Ok(d) => d,
            Err(e) => {
                // This isn't terribly helpful as it doesn't have metadata attached; BUT attempting to get() a struct does.
                eprintln!("{ERROR}ERROR{ERROR:#} {e}");
                return Ok(());
            }
        };
        let Some(data) = data.get(&figment::Profile::Default) else {
            return Ok(());
        };

        let mut output = Vec::<PrettyConfig>::new();

        for field in data.keys() {
            let meta = self.source.data.find_metadata(field);
            if self.fields.contains(field) {
                let value = self.source.data.find_value(field);
                let value = match value {
                    Ok(v) => v,
                    Err(e) => {
                        eprintln!("{WARNING}WARNING{WARNING:#}: error on {field}: {e}");
                        continue;
                    }
                };
                output.push(PrettyConfig::new(field, &value, meta));
            } else if self.warn_on_unused {
                let source = PrettyConfig::render_source(meta);
                eprintln!("{WARNING}WARNING{WARNING:#}: unrecognised field `{field}` in {source}");
            }
        }
        write!(f, "{}", Table::new(output).with(Style::sharp()))
    }
}

#[cfg(test)]
mod test {
    use crate::config::{Configuration, Configuration_Optional, Manager};
    use crate::util::make_test_tempfile;
    use assertables::assert_contains;
    use serde::Deserialize;

    #[test]
    fn defaults() {
        let mgr = Manager::without_files();
        let result = mgr.get().unwrap();
        let expected = Configuration::default();
        assert_eq!(expected, result);
    }

    #[test]
    fn config_merge() {
        // simulate a CLI
        let entered = Configuration_Optional {
            streams: Some(16),
            required_ports: Some(vec![8443, 443]),
            ..Default::default()
        };
        let expected = Configuration {
            streams: 16,
            required_ports: vec![8443, 443],
            ..Default::default()
        };

        let mut mgr = Manager::without_files();
        mgr.merge_provider(entered);
        let result = mgr.get().unwrap();
        assert_eq!(expected, result);
    }

    #[test]
    fn cli_beats_file_beats_default() {
        let (path, _tempdir) = make_test_tempfile(
            r#"
            duration = 20
            streams = 4
            tool = "/opt/bin/iperf3"
            required_ports = [8080, 443]
        "#,
            "test.toml",
        );
        let fake_cli = Configuration_Optional {
            streams: Some(2),
            ..Default::default()
        };
        let mut mgr = Manager::without_files();
        mgr.merge_toml_file(path);
        mgr.merge_provider(fake_cli);
        let result = mgr.configuration().unwrap();
        assert_eq!(result.streams, 2);
        assert_eq!(result.duration, 20);
        assert_eq!(result.tool, "/opt/bin/iperf3");
        assert_eq!(result.required_ports, [8080, 443]);
        assert_eq!(result.port, 9777);
    }

    #[test]
    fn dump_config_cli_and_toml() {
        let (path, _tempdir) = make_test_tempfile(
            r"
            duration = 30
            unused__ = 42
        ",
            "test.toml",
        );
        let fake_cli = Configuration_Optional {
            top_count: Some(10),
            ..Default::default()
        };
        let mut mgr = Manager::without_files();
        mgr.merge_toml_file(&path);
        mgr.merge_provider(fake_cli);
        let out = mgr.to_string();
        assert_contains!(out, "duration");
        assert_contains!(out, "command-line");
        assert_contains!(out, "default");

        let adapted = mgr.to_display_adapter::<Configuration>(false).to_string();
        assert_contains!(adapted, "top_count");
        assert!(!adapted.contains("unused__"));
    }

    #[test]
    fn unparseable_toml() {
        let (path, _tempdir) = make_test_tempfile(
            r"
            a = 1
            streams 123 # this line is a syntax error
            b = 2
        ",
            "test.toml",
        );
        let mut mgr = Manager::without_files();
        mgr.merge_toml_file(path);
        let get = mgr.get::<Configuration>();
        assert!(get.is_err());
    }

    #[test]
    fn type_error() {
        #[derive(Deserialize)]
        struct Test {
            magic_: i32,
        }

        let (path, _tempdir) = make_test_tempfile(
            r"
            streams = true # invalid
            duration = 3.14159 # also invalid
            magic_ = 42
        ",
            "test.toml",
        );
        let mut mgr = Manager::without_files();
        mgr.merge_toml_file(path);
        // This TOML successfully merges into the config, but you can't extract the struct.
        let _ = mgr.get::<Configuration>().unwrap_err();

        // But the config as a whole is not broken and other things can be extracted:
        let other_struct = mgr.get::<Test>().unwrap();
        assert_eq!(other_struct.magic_, 42);
    }

    #[test]
    fn out_of_range_port() {
        let (path, _tempdir) = make_test_tempfile(
            r"
            port = 70000
        ",
            "test.toml",
        );
        let mut mgr = Manager::without_files();
        mgr.merge_toml_file(path);
        assert!(mgr.get::<Configuration>().is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let mut mgr = Manager::without_files();
        mgr.merge_provider(Configuration_Optional {
            streams: Some(0),
            ..Default::default()
        });
        // It extracts, but does not validate
        let _ = mgr.get::<Configuration>().unwrap();
        let e = mgr.configuration().unwrap_err();
        assert_contains!(e.to_string(), "streams");
    }

    #[test]
    fn config_files_listed() {
        let files = Manager::config_files();
        assert!(files.iter().any(|f| f.ends_with("portrank.toml")));
    }
}
