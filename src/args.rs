use std::ffi::OsString;

use clap::{
    builder::{NonEmptyStringValueParser, StyledStr},
    error::ErrorKind,
    CommandFactory, Parser,
};

/// Long options that may also be written with a single dash, e.g. `-table links`.
const LONG_OPTIONS: [&str; 3] = ["table", "region", "endpoint-url"];

/// Scan every item of a DynamoDB table and log it.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "scan-items")]
pub struct Args {
    /// The name of the DynamoDB table to list items from.
    #[arg(long, value_name = "name", value_parser = NonEmptyStringValueParser::new())]
    pub table: String,

    /// The region of your AWS project.
    #[arg(long, value_name = "region", value_parser = NonEmptyStringValueParser::new())]
    pub region: String,

    /// Send DynamoDB requests to this endpoint instead, e.g. DynamoDB Local.
    #[arg(long, value_name = "url")]
    pub endpoint_url: Option<String>,
}

impl Args {
    /// Parses the full argument list, program name included.
    pub fn try_parse_args<I, T>(args: I) -> clap::error::Result<Args>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Args::try_parse_from(expand_single_dash(args))
    }

    /// Full option listing to show next to a missing or empty argument error.
    pub fn usage_for(err: &clap::Error) -> Option<StyledStr> {
        match err.kind() {
            ErrorKind::MissingRequiredArgument | ErrorKind::InvalidValue => {
                Some(Args::command().render_help())
            }
            _ => None,
        }
    }
}

/// Rewrites `-table` / `-table=x` style options into their `--` form.
fn expand_single_dash<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = text.strip_prefix('-') else {
                return arg;
            };
            let name = rest.split('=').next().unwrap_or_default();
            if !rest.starts_with('-') && LONG_OPTIONS.contains(&name) {
                OsString::from(format!("-{text}"))
            } else {
                arg
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn expected(endpoint_url: Option<&str>) -> Args {
        Args {
            table: "links".to_owned(),
            region: "eu-west-1".to_owned(),
            endpoint_url: endpoint_url.map(str::to_owned),
        }
    }

    #[rstest]
    #[case::double_dash(&["scan-items", "--table", "links", "--region", "eu-west-1"])]
    #[case::single_dash(&["scan-items", "-table", "links", "-region", "eu-west-1"])]
    #[case::single_dash_equals(&["scan-items", "-table=links", "-region=eu-west-1"])]
    #[case::mixed(&["scan-items", "-region", "eu-west-1", "--table=links"])]
    fn parses_table_and_region(#[case] argv: &[&str]) {
        assert_eq!(Args::try_parse_args(argv).unwrap(), expected(None));
    }

    #[test]
    fn parses_endpoint_url() {
        let argv = [
            "scan-items",
            "-table",
            "links",
            "-region",
            "eu-west-1",
            "-endpoint-url",
            "http://localhost:8000",
        ];
        assert_eq!(
            Args::try_parse_args(argv).unwrap(),
            expected(Some("http://localhost:8000"))
        );
    }

    #[rstest]
    #[case::nothing(&["scan-items"], ErrorKind::MissingRequiredArgument)]
    #[case::no_region(&["scan-items", "-table", "links"], ErrorKind::MissingRequiredArgument)]
    #[case::no_table(&["scan-items", "-region", "eu-west-1"], ErrorKind::MissingRequiredArgument)]
    #[case::empty_table(&["scan-items", "-table", "", "-region", "eu-west-1"], ErrorKind::InvalidValue)]
    #[case::empty_region(&["scan-items", "-table=links", "-region="], ErrorKind::InvalidValue)]
    fn rejects_incomplete_arguments(#[case] argv: &[&str], #[case] kind: ErrorKind) {
        let err = Args::try_parse_args(argv).unwrap_err();
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn usage_lists_both_options() {
        let err = Args::try_parse_args(["scan-items"]).unwrap_err();
        let usage = err.render().to_string();
        assert!(usage.contains("--table <name>"));
        assert!(usage.contains("--region <region>"));
    }

    #[rstest]
    #[case::missing(&["scan-items", "-table", "links"])]
    #[case::empty(&["scan-items", "-table", "", "-region", "eu-west-1"])]
    fn usage_describes_every_option(#[case] argv: &[&str]) {
        let err = Args::try_parse_args(argv).unwrap_err();
        let usage = Args::usage_for(&err).unwrap().to_string();

        assert!(usage.contains("--table <name>"));
        assert!(usage.contains("The name of the DynamoDB table to list items from"));
        assert!(usage.contains("--region <region>"));
        assert!(usage.contains("The region of your AWS project"));
    }

    #[test]
    fn help_request_gets_no_extra_usage() {
        let err = Args::try_parse_args(["scan-items", "--help"]).unwrap_err();
        assert!(Args::usage_for(&err).is_none());
    }

    #[test]
    fn leaves_values_and_short_flags_alone() {
        let args = expand_single_dash(["scan-items", "-h", "-tables", "-", "--region"]);
        assert_eq!(args, vec!["scan-items", "-h", "-tables", "-", "--region"]);
    }
}
