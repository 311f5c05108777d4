use bodigital::{config::Config, runtime::run_standalone};
use std::path::PathBuf;

const USAGE: &str = "\
Usage: bodigital [OPTIONS]

Options:
  -c, --config <path>  YAML config file (takes precedence over BODIGITAL_CONFIG)
      --check          Resolve the configuration, print a summary and exit
  -V, --version        Print version
  -h, --help           Print help

Environment variables prefixed with BODIGITAL_ override file settings.
";

#[derive(Debug, Default, PartialEq, Eq)]
struct CliOptions {
    config_path: Option<PathBuf>,
    check: bool,
    version: bool,
    help: bool,
}

fn parse_cli_args<I>(args: I) -> Result<CliOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let (flag, inline_value) = match arg.split_once('=') {
            Some((flag, value)) => (flag, Some(value.to_string())),
            None => (arg.as_str(), None),
        };
        match (flag, inline_value) {
            ("-h" | "--help", None) => options.help = true,
            ("-V" | "--version", None) => options.version = true,
            ("--check", None) => options.check = true,
            ("-c" | "--config", value) => {
                let path = value
                    .or_else(|| args.next())
                    .filter(|path| !path.is_empty())
                    .ok_or_else(|| "missing value for --config".to_string())?;
                options.config_path = Some(PathBuf::from(path));
            }
            _ => return Err(format!("unknown argument: {arg}")),
        }
    }
    Ok(options)
}

fn config_summary(config: &Config) -> String {
    format!(
        "bind={} prefix={} storage={:?} data_dir={} identity={:?}",
        config.bind,
        config.url_prefix,
        config.storage_backend,
        config.data_dir.display(),
        config.identity.backend
    )
}

#[tokio::main]
async fn main() {
    let options = parse_cli_args(std::env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}\n\n{USAGE}");
        std::process::exit(2);
    });

    if options.help {
        println!("{USAGE}");
        return;
    }
    if options.version {
        println!("bodigital {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let loaded = match options.config_path {
        Some(path) => Config::from_env_with_config_file(path),
        None => Config::from_env(),
    };
    let config = loaded.unwrap_or_else(|err| {
        eprintln!("invalid configuration: {err}");
        std::process::exit(2);
    });

    if options.check {
        println!("{}", config_summary(&config));
        return;
    }
    if let Err(err) = run_standalone(config).await {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{config_summary, parse_cli_args};
    use bodigital::config::Config;
    use std::path::PathBuf;

    #[test]
    fn parses_config_flag_in_both_spellings() {
        let spaced = parse_cli_args(vec!["--config".to_string(), "./bodigital.yml".to_string()])
            .expect("parse args");
        assert_eq!(spaced.config_path, Some(PathBuf::from("./bodigital.yml")));

        let joined =
            parse_cli_args(vec!["--config=./bodigital.yml".to_string()]).expect("parse args");
        assert_eq!(joined.config_path, spaced.config_path);

        let short =
            parse_cli_args(vec!["-c".to_string(), "./bodigital.yml".to_string()]).expect("parse");
        assert_eq!(short.config_path, spaced.config_path);
    }

    #[test]
    fn parses_check_and_version_flags() {
        let parsed = parse_cli_args(vec!["--check".to_string(), "-V".to_string()]).expect("parse");
        assert!(parsed.check);
        assert!(parsed.version);
        assert!(!parsed.help);
    }

    #[test]
    fn rejects_missing_values_and_unknown_flags() {
        let err = parse_cli_args(vec!["--config".to_string()]).expect_err("missing value");
        assert_eq!(err, "missing value for --config");
        let err = parse_cli_args(vec!["--config=".to_string()]).expect_err("empty value");
        assert_eq!(err, "missing value for --config");
        let err = parse_cli_args(vec!["--wat".to_string()]).expect_err("unknown arg");
        assert_eq!(err, "unknown argument: --wat");
    }

    #[test]
    fn summary_names_prefix_and_backends() {
        let summary = config_summary(&Config::in_memory());
        assert!(summary.contains("prefix=/make-server-bec4bad8"));
        assert!(summary.contains("storage=Memory"));
        assert!(summary.contains("identity=Local"));
    }
}
