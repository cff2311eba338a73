use clap::{Parser, Subcommand, ValueEnum};
use notedeckapp::model::Mode;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Remote,
    Local,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Remote => Mode::Remote,
            ModeArg::Local => Mode::Local,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "notedeck", bin_name = "notedeck", version)]
#[command(about = "Markdown notes, kept in an object store or a local folder", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend to use (defaults to the configured mode)
    #[arg(short, long, global = true, value_enum)]
    pub mode: Option<ModeArg>,

    /// Notes directory for local mode (defaults to the configured local-dir)
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List notes
    #[command(alias = "ls")]
    List {
        /// Print the raw note records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a note
    View { key: String },

    /// Create a note
    #[command(alias = "n")]
    Create {
        title: String,

        /// Note body; `-` reads it from stdin
        #[arg(short, long)]
        content: Option<String>,

        /// Key of the parent note or folder
        #[arg(short, long)]
        parent: Option<String>,

        /// Extra metadata, e.g. --meta type=folder
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },

    /// Replace a note's title and/or body, keeping its parent
    Edit {
        key: String,

        #[arg(short, long)]
        title: Option<String>,

        /// New body; `-` reads it from stdin
        #[arg(short, long)]
        content: Option<String>,
    },

    /// Change a note's title and metadata without touching its body
    Rename {
        key: String,
        title: String,

        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },

    /// Delete a note
    #[command(alias = "rm")]
    Delete { key: String },

    /// Print a note's metadata record as JSON
    Meta { key: String },

    /// Show or set configuration (mode, api-base, bucket, timeout, local-dir)
    Config {
        key: Option<String>,
        value: Option<String>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", s))?;
    if key.is_empty() {
        return Err(format!("empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("notedeck").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn no_command_means_list() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());
        assert!(cli.mode.is_none());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["list", "--mode", "local", "--dir", "/tmp/notes", "-v"]);
        assert_eq!(cli.mode, Some(ModeArg::Local));
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/notes")));
        assert!(cli.verbose);
    }

    #[test]
    fn create_collects_meta_pairs() {
        let cli = parse(&[
            "create",
            "Projects",
            "--meta",
            "type=folder",
            "--meta",
            "order=2",
            "-p",
            "root.md",
        ]);
        match cli.command {
            Some(Commands::Create {
                title, meta, parent, ..
            }) => {
                assert_eq!(title, "Projects");
                assert_eq!(parent.as_deref(), Some("root.md"));
                assert_eq!(
                    meta,
                    vec![
                        ("type".to_string(), "folder".to_string()),
                        ("order".to_string(), "2".to_string())
                    ]
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn meta_requires_key_value() {
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
        assert_eq!(
            parse_key_val("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
    }

    #[test]
    fn mode_arg_maps_to_library_mode() {
        assert_eq!(Mode::from(ModeArg::Local), Mode::Local);
        assert_eq!(Mode::from(ModeArg::Remote), Mode::Remote);
    }
}
