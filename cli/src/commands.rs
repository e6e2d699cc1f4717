//! Interactive commands read from stdin while watching.

use std::str::FromStr;

use anyhow::bail;
use batchwatch_engine::{Batch, BatchId};

/// A command typed at the watch prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Sign(String),
    SignAll,
    Clear,
    ClearAll,
    Scan,
    Stats,
    Help,
    Quit,
}

/// Help text for the watch prompt.
pub const HELP: &str = "\
Commands:
  list          show all batches
  sign <id>     sign a completed batch (id prefix is enough)
  sign-all      sign every completed batch
  clear         remove signed batches
  clear-all     remove every batch
  scan          check for completed batches now
  stats         show batch counts
  quit          stop watching";

impl ConsoleCommand {
    /// Commands that take no argument.
    fn bare(name: &str) -> Option<Self> {
        let command = match name {
            "list" | "ls" => Self::List,
            "sign-all" => Self::SignAll,
            "clear" => Self::Clear,
            "clear-all" => Self::ClearAll,
            "scan" => Self::Scan,
            "stats" => Self::Stats,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => return None,
        };
        Some(command)
    }
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((name, args)) = words.split_first() else {
            bail!("empty command");
        };
        let name = name.to_lowercase();

        match (name.as_str(), args) {
            ("sign", [id]) => Ok(Self::Sign((*id).to_string())),
            ("sign", _) => bail!("usage: sign <id>"),
            (name, []) => match Self::bare(name) {
                Some(command) => Ok(command),
                None => bail!("unknown command `{name}`, type `help`"),
            },
            (name, _) if Self::bare(name).is_some() => bail!("`{name}` takes no arguments"),
            (name, _) => bail!("unknown command `{name}`, type `help`"),
        }
    }
}

/// Find the batch whose identifier starts with `prefix`. Hyphens are
/// optional.
pub fn resolve_batch_id(batches: &[Batch], prefix: &str) -> anyhow::Result<BatchId> {
    let needle = prefix.replace('-', "").to_lowercase();
    if needle.is_empty() {
        bail!("empty batch id");
    }

    let mut matches = batches
        .iter()
        .map(|batch| batch.id)
        .filter(|id| id.0.simple().to_string().starts_with(&needle));

    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id),
        (Some(_), Some(_)) => bail!("batch id `{prefix}` is ambiguous"),
        (None, _) => bail!("no batch with id `{prefix}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_commands() {
        let cases = [
            ("list", ConsoleCommand::List),
            ("  LS ", ConsoleCommand::List),
            ("sign 0192ab", ConsoleCommand::Sign("0192ab".to_string())),
            ("sign-all", ConsoleCommand::SignAll),
            ("clear", ConsoleCommand::Clear),
            ("clear-all", ConsoleCommand::ClearAll),
            ("scan", ConsoleCommand::Scan),
            ("stats", ConsoleCommand::Stats),
            ("quit", ConsoleCommand::Quit),
        ];

        for (line, expected) in cases {
            assert_eq!(line.parse::<ConsoleCommand>().unwrap(), expected, "{line}");
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<ConsoleCommand>().is_err());
        assert!("sign".parse::<ConsoleCommand>().is_err());
        assert!("list all".parse::<ConsoleCommand>().is_err());
        assert!("upload".parse::<ConsoleCommand>().is_err());
    }

    #[test]
    fn test_resolve_batch_id() {
        let now = Utc::now();
        let batch = Batch::new("/up", now);
        let batches = vec![batch.clone()];

        let short = batch.id.short();
        assert_eq!(resolve_batch_id(&batches, &short).unwrap(), batch.id);
        assert_eq!(
            resolve_batch_id(&batches, &batch.id.to_string()).unwrap(),
            batch.id
        );
        assert!(resolve_batch_id(&batches, "zzzz").is_err());
        assert!(resolve_batch_id(&batches, "").is_err());
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let now = Utc::now();
        let batches = vec![Batch::new("/a", now), Batch::new("/b", now)];

        // Both v7 identifiers share their leading timestamp digit.
        let first = batches[0].id.0.simple().to_string();
        assert!(resolve_batch_id(&batches, &first[..1]).is_err());
    }
}
