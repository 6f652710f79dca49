//! Launch directive parsing
//!
//! A directive is either an opaque URI handed to the shell, or a program path with
//! arguments. Only a quoted leading path may carry arguments; anything unquoted that is
//! not a URI is treated as one bare path.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("empty launch directive")]
    Empty,

    #[error("unterminated quote in launch directive")]
    UnterminatedQuote,
}

/// Parsed form of a stored launch command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchDirective {
    /// `scheme:rest`, opened through the shell's protocol handler
    Uri(String),
    /// Executable plus arguments
    Program { path: PathBuf, args: Vec<String> },
}

impl LaunchDirective {
    /// URI scheme, lowercased
    pub fn scheme(&self) -> Option<String> {
        match self {
            LaunchDirective::Uri(uri) => uri_scheme(uri).map(|s| s.to_lowercase()),
            LaunchDirective::Program { .. } => None,
        }
    }
}

/// Split a stored command into a [`LaunchDirective`]
pub fn parse_directive(command: &str) -> Result<LaunchDirective, DirectiveError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(DirectiveError::Empty);
    }

    if let Some(rest) = command.strip_prefix('"') {
        let end = rest.find('"').ok_or(DirectiveError::UnterminatedQuote)?;
        let path = rest[..end].trim();
        if path.is_empty() {
            return Err(DirectiveError::Empty);
        }
        return Ok(LaunchDirective::Program {
            path: PathBuf::from(path),
            args: split_args(&rest[end + 1..])?,
        });
    }

    if uri_scheme(command).is_some() {
        return Ok(LaunchDirective::Uri(command.to_string()));
    }

    Ok(LaunchDirective::Program {
        path: PathBuf::from(command),
        args: Vec::new(),
    })
}

/// Scheme of `text` if it looks like `scheme:...`
///
/// Single letters are drive prefixes (`C:\`), not schemes.
pub fn uri_scheme(text: &str) -> Option<&str> {
    let (scheme, _) = text.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if scheme.len() < 2 || !first.is_ascii_alphabetic() {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(scheme)
}

/// First whitespace-separated token of an unquoted command
pub fn first_token(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or("")
}

/// Whitespace-separated arguments; double quotes group and are removed
fn split_args(raw: &str) -> Result<Vec<String>, DirectiveError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;

    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }

    if in_quotes {
        return Err(DirectiveError::UnterminatedQuote);
    }
    if pending {
        args.push(current);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_directives() {
        assert_eq!(
            parse_directive("steam://rungameid/620"),
            Ok(LaunchDirective::Uri("steam://rungameid/620".to_string()))
        );
        let directive = parse_directive("roblox-player:").unwrap();
        assert_eq!(directive.scheme().as_deref(), Some("roblox-player"));
        let epic = parse_directive("com.epicgames.launcher://apps/Fortnite?action=launch").unwrap();
        assert_eq!(epic.scheme().as_deref(), Some("com.epicgames.launcher"));
    }

    #[test]
    fn test_drive_letter_is_not_a_scheme() {
        assert_eq!(uri_scheme(r"C:\Games\game.exe"), None);
        assert_eq!(
            parse_directive(r"C:\Games\game.exe"),
            Ok(LaunchDirective::Program {
                path: PathBuf::from(r"C:\Games\game.exe"),
                args: Vec::new(),
            })
        );
    }

    #[test]
    fn test_quoted_path_with_arguments() {
        let directive = parse_directive(
            r#""C:\Program Files (x86)\GOG Galaxy\GalaxyClient.exe" /command=runGame /gameId=1207 /path="D:\GOG Games\Witcher 3""#,
        )
        .unwrap();

        assert_eq!(
            directive,
            LaunchDirective::Program {
                path: PathBuf::from(r"C:\Program Files (x86)\GOG Galaxy\GalaxyClient.exe"),
                args: vec![
                    "/command=runGame".to_string(),
                    "/gameId=1207".to_string(),
                    r"/path=D:\GOG Games\Witcher 3".to_string(),
                ],
            }
        );
    }

    #[test]
    fn test_unquoted_command_is_one_path() {
        let directive = parse_directive("cmd.exe /c del *").unwrap();
        assert!(matches!(directive, LaunchDirective::Program { ref args, .. } if args.is_empty()));
        assert_eq!(first_token("cmd.exe /c del *"), "cmd.exe");
    }

    #[test]
    fn test_malformed_directives() {
        assert_eq!(parse_directive("   "), Err(DirectiveError::Empty));
        assert_eq!(parse_directive("\"C:\\x.exe"), Err(DirectiveError::UnterminatedQuote));
        assert_eq!(parse_directive("\"\" -x"), Err(DirectiveError::Empty));
        assert_eq!(parse_directive("\"C:\\x.exe\" \"open"), Err(DirectiveError::UnterminatedQuote));
    }

    #[test]
    fn test_empty_quoted_argument_is_kept() {
        let directive = parse_directive(r#""C:\x.exe" -name """#).unwrap();
        let LaunchDirective::Program { args, .. } = directive else {
            panic!("expected a program directive");
        };
        assert_eq!(args, vec!["-name".to_string(), String::new()]);
    }
}
