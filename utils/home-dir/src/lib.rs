use dirs::home_dir;
use std::path::PathBuf;

/// Environment variable that relocates the Easel home directory.
pub const EASEL_HOME_ENV: &str = "EASEL_HOME";

const DEFAULT_DIR_NAME: &str = ".easel";

/// Returns the directory holding `config.toml` and `storage.json`.
///
/// - If `EASEL_HOME` is set, it must name an existing directory; the value is
///   canonicalized and any other state is an error.
/// - Otherwise `~/.easel` is returned without checking that it exists.
pub fn find_easel_home() -> std::io::Result<PathBuf> {
    let easel_home_env = std::env::var(EASEL_HOME_ENV)
        .ok()
        .filter(|val| !val.is_empty());
    find_easel_home_from_env(easel_home_env.as_deref())
}

fn find_easel_home_from_env(easel_home_env: Option<&str>) -> std::io::Result<PathBuf> {
    let Some(val) = easel_home_env else {
        let mut p = home_dir().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not find home directory",
            )
        })?;
        p.push(DEFAULT_DIR_NAME);
        return Ok(p);
    };

    let path = PathBuf::from(val);
    let metadata = std::fs::metadata(&path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{EASEL_HOME_ENV} points to {val:?}, but that path does not exist"),
        ),
        _ => std::io::Error::new(
            err.kind(),
            format!("failed to read {EASEL_HOME_ENV} {val:?}: {err}"),
        ),
    })?;

    if !metadata.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{EASEL_HOME_ENV} points to {val:?}, but that path is not a directory"),
        ));
    }

    path.canonicalize().map_err(|err| {
        std::io::Error::new(
            err.kind(),
            format!("failed to canonicalize {EASEL_HOME_ENV} {val:?}: {err}"),
        )
    })
}
