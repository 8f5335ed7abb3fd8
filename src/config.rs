use crate::error::ConfigError;
use crate::test_case::{Params, TestCaseData};
use crate::test_suite::RunOptions;
use getopts::Options;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "endpoints.yaml";
const LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

#[derive(Deserialize, Debug, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_true")]
    pub enable_tracing: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: default_log_level(),
            output_dir: default_output_dir(),
            enable_tracing: true,
            workers: default_workers(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct EndpointConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: f64, // seconds
    #[serde(default)]
    pub headers: IndexMap<String, Value>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            base_url: None,
            timeout: default_timeout(),
            headers: IndexMap::new(),
        }
    }
}

/// The whole configuration file: general settings, the target endpoint and the test cases.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub tests: Vec<TestCaseData>,
    #[serde(skip)]
    raw: Value,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let raw: Value = serde_yaml::from_str(text)?;
        // an empty file is an empty configuration
        let mut config: Config = if raw.is_null() {
            Config::default()
        } else {
            serde_yaml::from_value(raw.clone())?
        };
        config.raw = raw;
        Ok(config)
    }

    /// Looks up a raw value by dotted key, e.g. `endpoints.base_url`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.raw, |value, part| value.get(part))
    }

    /// Command line values win over the file.
    pub fn apply_cli(&mut self, cli: &CliArgs) {
        if let Some(level) = &cli.log_level {
            self.general.log_level = level.clone();
        }
        if let Some(dir) = &cli.output_dir {
            self.general.output_dir = dir.clone();
        }
        if let Some(workers) = cli.workers {
            self.general.workers = workers;
        }
        if cli.no_trace {
            self.general.enable_tracing = false;
        }
    }

    pub fn run_options(&self, cli: &CliArgs) -> RunOptions {
        RunOptions {
            include: cli.tests.clone(),
            overrides: cli.params.clone(),
            workers: self.general.workers,
        }
    }
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub tests: Option<Vec<String>>,
    pub params: Params,
    pub rejected_params: Vec<String>, // not in key=value form, warned about once logging is up
    pub log_level: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub no_trace: bool,
    pub help: bool,
}

impl CliArgs {
    /// Parses the arguments that follow the program name.
    pub fn parse(args: &[String]) -> Result<Self, ConfigError> {
        let opts = options();
        let matches = opts
            .parse(args)
            .map_err(|f| ConfigError::Cli(f.to_string()))?;

        if let Some(extra) = matches.free.first() {
            return Err(ConfigError::Cli(format!("unexpected argument '{}'", extra)));
        }

        let tests: Vec<String> = matches
            .opt_strs("t")
            .iter()
            .flat_map(|list| list.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        let mut params = Params::new();
        let mut rejected_params = Vec::new();
        for pair in matches.opt_strs("p") {
            match pair.split_once('=') {
                Some((key, value)) => {
                    params.insert(key.to_string(), Value::String(value.to_string()));
                }
                None => rejected_params.push(pair),
            }
        }

        let log_level = match matches.opt_str("l") {
            Some(level) => {
                let level = level.to_uppercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(ConfigError::Cli(format!(
                        "invalid log level '{}', expected one of {}",
                        level,
                        LOG_LEVELS.join(", ")
                    )));
                }
                Some(level)
            }
            None => None,
        };

        let workers = match matches.opt_str("w") {
            Some(w) => match w.parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => return Err(ConfigError::Cli(format!("invalid worker count '{}'", w))),
            },
            None => None,
        };

        Ok(CliArgs {
            config_path: matches
                .opt_str("c")
                .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from),
            tests: if tests.is_empty() { None } else { Some(tests) },
            params,
            rejected_params,
            log_level,
            output_dir: matches.opt_str("o").map(PathBuf::from),
            workers,
            no_trace: matches.opt_present("no_trace"),
            help: matches.opt_present("h"),
        })
    }
}

fn options() -> Options {
    let mut opts = Options::new();
    opts.optopt(
        "c",
        "config",
        "Path to the YAML configuration file (default: endpoints.yaml)",
        "FILE",
    );
    opts.optmulti(
        "t",
        "tests",
        "Test name to run, repeatable or comma separated. All tests run if omitted",
        "NAME",
    );
    opts.optmulti(
        "p",
        "params",
        "Parameter override substituted for {key}, repeatable",
        "KEY=VALUE",
    );
    opts.optopt(
        "l",
        "log_level",
        "Logging level: DEBUG, INFO, WARNING, ERROR or CRITICAL",
        "LEVEL",
    );
    opts.optopt("o", "output_dir", "Directory for logs and reports", "DIR");
    opts.optopt("w", "workers", "Run test cases on N worker threads", "N");
    opts.optflag("", "no_trace", "Disable detailed tracing messages");
    opts.optflag("h", "help", "Print this help menu");
    opts
}

pub fn print_usage(program: &str) {
    let version = env!("CARGO_PKG_VERSION");
    let program_name = program.split('/').last().unwrap_or(program);
    let description = "Declarative XML web endpoint tester";
    let brief = format!(
        "{} version {}  {}\nUsage: {} [options]",
        program_name, version, description, program_name
    );

    print!("{}", options().usage(&brief));
}

// Default value functions for serde
fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./reports")
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    1
}

fn default_timeout() -> f64 {
    10.0
}
