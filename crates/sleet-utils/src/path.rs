use std::{env, path::PathBuf};

use crate::error::{PathError, PathResult};

/// Resolves a configured path to an absolute one.
///
/// A leading `~` becomes the home directory, `$VAR` and `${VAR}` are replaced from the
/// environment and relative results are joined to the current directory.
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let expanded = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", home_dir().display(), expand_vars(rest)?)
        }
        _ => expand_vars(path)?,
    };

    let resolved = PathBuf::from(expanded);
    if resolved.is_absolute() {
        return Ok(resolved);
    }
    env::current_dir()
        .map(|cwd| cwd.join(resolved))
        .map_err(PathError::CurrentDir)
}

fn expand_vars(input: &str) -> PathResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];

        let (name, tail) = if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}').ok_or_else(|| PathError::UnclosedVariable {
                input: input.to_string(),
            })?;
            (&braced[..end], &braced[end + 1..])
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], &after[end..])
        };

        if name.is_empty() {
            out.push('$');
        } else {
            let value = env::var(name).map_err(|_| PathError::UnsetVariable {
                var: name.to_string(),
                input: input.to_string(),
            })?;
            out.push_str(&value);
        }
        rest = tail;
    }

    out.push_str(rest);
    Ok(out)
}

fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
}

/// `XDG_CONFIG_HOME`, or `~/.config` when unset.
pub fn xdg_config_home() -> PathBuf {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"))
}

/// `XDG_CACHE_HOME`, or `~/.cache` when unset.
pub fn xdg_cache_home() -> PathBuf {
    env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".cache"))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_resolve_path_expands_variables() {
        env::set_var("SLEET_TEST_FEED", "/srv/feed");
        assert_eq!(
            resolve_path("$SLEET_TEST_FEED/packages").unwrap(),
            PathBuf::from("/srv/feed/packages")
        );
        assert_eq!(
            resolve_path("${SLEET_TEST_FEED}_cache").unwrap(),
            PathBuf::from("/srv/feed_cache")
        );
        assert_eq!(
            resolve_path("/srv/$/feed").unwrap(),
            PathBuf::from("/srv/$/feed")
        );
        env::remove_var("SLEET_TEST_FEED");
    }

    #[test]
    #[serial]
    fn test_resolve_path_home() {
        env::set_var("HOME", "/home/feeder");
        assert_eq!(resolve_path("~/feed").unwrap(), PathBuf::from("/home/feeder/feed"));
        assert_eq!(resolve_path("~").unwrap(), PathBuf::from("/home/feeder"));
        assert!(resolve_path("~other/feed").unwrap().ends_with("~other/feed"));
    }

    #[test]
    fn test_resolve_path_relative_is_absolute() {
        let resolved = resolve_path("relative/feed").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("relative/feed"));
    }

    #[test]
    #[serial]
    fn test_resolve_path_errors() {
        assert!(matches!(resolve_path("  "), Err(PathError::Empty)));

        env::remove_var("SLEET_TEST_UNSET");
        assert!(matches!(
            resolve_path("$SLEET_TEST_UNSET/x"),
            Err(PathError::UnsetVariable { var, .. }) if var == "SLEET_TEST_UNSET"
        ));
        assert!(matches!(
            resolve_path("${HOME"),
            Err(PathError::UnclosedVariable { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_xdg_dirs_fall_back_to_home() {
        env::set_var("HOME", "/home/feeder");
        env::remove_var("XDG_CONFIG_HOME");
        env::remove_var("XDG_CACHE_HOME");
        assert_eq!(xdg_config_home(), PathBuf::from("/home/feeder/.config"));
        assert_eq!(xdg_cache_home(), PathBuf::from("/home/feeder/.cache"));
    }
}
