//! Backslash meta commands.

/// Help text displayed for `\help`.
pub const HELP_TEXT: &str = r#"Statements end with a line ending in ';' or with a blank line.
Input that does not start with an SQL keyword goes to the scripting escape;
prefix it with !s to send it to the database anyway.

Meta commands:
  \q               - Quit
  \timestamps      - Toggle full timestamps
  \pretty          - Render results as tables
  \compact         - Render results as compact lines
  \reconnect       - Roll back and reset the connection
  \last            - Show the last result set as '|'-joined lines
  \dt              - List public tables
  \d <table>       - Describe a table
  \dc <table>      - List the columns of a table
  \dfk <table>     - List the foreign keys of a table
  \fks             - List every foreign key in the public schema
  \help            - Show this help message"#;

/// A parsed meta command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaCommand {
    Quit,
    ToggleTimestamps,
    Pretty,
    Compact,
    Reconnect,
    Last,
    Tables,
    DescribeTable(String),
    DescribeColumns(String),
    ForeignKeys(String),
    AllForeignKeys,
    Help,
    /// A command that needs an argument was given none.
    MissingArgument(&'static str),
    Unknown(String),
}

impl MetaCommand {
    /// Parses a line starting with `\`.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let mut parts = input.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next().map(str::trim).unwrap_or_default();

        let with_table = |name: &'static str, build: fn(String) -> MetaCommand| {
            if arg.is_empty() {
                MetaCommand::MissingArgument(name)
            } else {
                build(arg.to_string())
            }
        };

        match command.as_str() {
            "\\q" | "\\quit" => Self::Quit,
            "\\timestamps" => Self::ToggleTimestamps,
            "\\pretty" => Self::Pretty,
            "\\compact" => Self::Compact,
            "\\reconnect" => Self::Reconnect,
            "\\last" => Self::Last,
            "\\dt" => Self::Tables,
            "\\d" => with_table("\\d", Self::DescribeTable),
            "\\dc" => with_table("\\dc", Self::DescribeColumns),
            "\\dfk" => with_table("\\dfk", Self::ForeignKeys),
            "\\fks" => Self::AllForeignKeys,
            "\\help" | "\\?" => Self::Help,
            _ => Self::Unknown(command),
        }
    }
}
