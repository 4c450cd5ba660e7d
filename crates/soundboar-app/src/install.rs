//! Creating and removing the data directory, and installing the frontend
//! release into it.

use std::fs;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

use soundboar_extractor::MetaExtractor;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::config::{sounds_dir, static_dir};

/// Files whose first line contains this were installed by soundboar and
/// may be replaced by a newer frontend.
pub const DEFAULT_LINE_IDENTIFIER: &str = "soundboar-default-static";

/// First line of the placeholder page.
pub const DEFAULT_STATIC_MARKER: &str = "<!-- soundboar-default-static -->";

const HEAD_RELEASES: &str = "https://github.com/soundboar/head/releases/download";

/// Directory inside the release archive that holds the frontend.
const HEAD_SUBDIR: &str = "dist";

const PLACEHOLDER_INDEX: &str = r#"<!-- soundboar-default-static -->
<!doctype html>
<html>
<head><meta charset="utf-8"><title>soundboar</title></head>
<body>
<h1>soundboar</h1>
<p>No frontend installed. The API is available under <code>/api</code>.</p>
</body>
</html>
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Install into a non-empty directory.
    pub force: bool,
    /// A non-empty directory is not an error, just nothing to do.
    pub exist_ok: bool,
    /// Fail instead of creating a missing directory.
    pub no_mkdir: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyInstalled,
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Data directory {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Data directory {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("Failed to prepare {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Could not download the frontend from {url}: {source}")]
    Download {
        url: String,
        source: soundboar_core::Error,
    },

    #[error("Frontend archive is unusable: {0}")]
    Archive(String),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> InstallError + '_ {
    move |source| InstallError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Lay out the data directory: `sounds/` for the library and `static/` for
/// the frontend, with a placeholder page when there is none.
pub fn install(directory: &Path, options: InstallOptions) -> Result<InstallOutcome, InstallError> {
    if directory.exists() {
        let empty = fs::read_dir(directory)
            .map_err(io_error(directory))?
            .next()
            .is_none();
        if !empty && !options.force {
            if options.exist_ok {
                info!("Not installing, {} already exists", directory.display());
                return Ok(InstallOutcome::AlreadyInstalled);
            }
            return Err(InstallError::AlreadyExists(directory.to_path_buf()));
        }
    } else if options.no_mkdir {
        return Err(InstallError::Missing(directory.to_path_buf()));
    }

    for dir in [sounds_dir(directory), static_dir(directory)] {
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    }

    let index = static_dir(directory).join("index.html");
    if !index.exists() || is_default_file(&index) {
        fs::write(&index, PLACEHOLDER_INDEX).map_err(io_error(&index))?;
    } else {
        warn!("Not overwriting {}, it is not a default file", index.display());
    }

    info!("Installed soundboar to {}", directory.display());
    Ok(InstallOutcome::Installed)
}

/// Recursively delete the data directory.
pub fn uninstall(directory: &Path) -> Result<(), InstallError> {
    fs::remove_dir_all(directory).map_err(io_error(directory))?;
    info!("Removed {}", directory.display());
    Ok(())
}

/// Release archive URL of the frontend `version`; a leading `v` is
/// optional.
pub fn head_url(version: &str) -> String {
    let version = version.strip_prefix('v').unwrap_or(version);
    format!("{HEAD_RELEASES}/v{version}/dist.zip")
}

/// What a frontend install did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadReport {
    pub written: usize,
    /// Existing files left alone because they were customized.
    pub kept: usize,
}

/// Download the frontend archive at `url` and unpack it into `static/`.
pub async fn install_head(
    directory: &Path,
    url: &str,
    overwrite: bool,
    http: &MetaExtractor,
) -> Result<HeadReport, InstallError> {
    info!("Downloading frontend from {url}");
    let archive = http
        .download(url)
        .await
        .map_err(|source| InstallError::Download {
            url: url.to_string(),
            source,
        })?;

    let target = static_dir(directory);
    let report = tokio::task::spawn_blocking(move || extract_head(&archive, &target, overwrite))
        .await
        .map_err(|e| InstallError::Archive(format!("extraction did not finish: {e}")))??;
    info!(
        "Installed frontend: {} files written, {} kept",
        report.written, report.kept
    );
    Ok(report)
}

/// Unpack the `dist/` tree of a release archive into `static_dir`.
///
/// Unless `overwrite` is set, existing files are only replaced when they
/// carry [`DEFAULT_LINE_IDENTIFIER`] in their first line.
pub fn extract_head(archive: &[u8], static_dir: &Path, overwrite: bool) -> Result<HeadReport, InstallError> {
    let archive_error = |e: zip::result::ZipError| InstallError::Archive(e.to_string());
    let mut zip = ZipArchive::new(Cursor::new(archive)).map_err(archive_error)?;
    let mut report = HeadReport::default();

    for i in 0..zip.len() {
        let mut member = zip.by_index(i).map_err(archive_error)?;
        if member.is_dir() {
            continue;
        }
        let Some(relative) = member
            .enclosed_name()
            .and_then(|name| name.strip_prefix(HEAD_SUBDIR).ok().map(Path::to_path_buf))
        else {
            debug!("Skipping {} outside {HEAD_SUBDIR}/", member.name());
            continue;
        };

        let destination = static_dir.join(relative);
        if !overwrite && destination.exists() && !is_default_file(&destination) {
            warn!("Not overwriting {}, it is not a default file", destination.display());
            report.kept += 1;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let mut file = fs::File::create(&destination).map_err(io_error(&destination))?;
        io::copy(&mut member, &mut file).map_err(io_error(&destination))?;
        report.written += 1;
    }

    Ok(report)
}

/// Whether the first line of `path` marks it as installed by soundboar.
/// Unreadable and binary files are never default files.
fn is_default_file(path: &Path) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut first = String::new();
    match BufReader::new(file).read_line(&mut first) {
        Ok(_) => first.contains(DEFAULT_LINE_IDENTIFIER),
        Err(e) => {
            debug!("Cannot read {}: {e}", path.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::io::Write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn release(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory("dist/assets/", SimpleFileOptions::default()).unwrap();
        for (name, data) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    async fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await.unwrap();
            let head = format!(
                "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
        });
        format!("http://{address}/dist.zip")
    }

    #[test]
    fn test_head_url() {
        assert_eq!(
            head_url("v1.2.0"),
            "https://github.com/soundboar/head/releases/download/v1.2.0/dist.zip"
        );
        assert_eq!(head_url("1.2.0"), head_url("v1.2.0"));
    }

    #[test]
    fn test_extract_replaces_only_default_files() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data");
        install(&dir, InstallOptions::default()).unwrap();
        let static_dir = dir.join("static");
        fs::write(static_dir.join("custom.css"), "body { color: red }").unwrap();
        fs::write(static_dir.join("logo.png"), [0x89, 0xff, 0xfe, 0x00]).unwrap();

        let archive = release(&[
            ("dist/index.html", &b"<!-- soundboar-default-static v2 -->\n<p>app</p>"[..]),
            ("dist/assets/app.js", &b"console.log(1)"[..]),
            ("dist/custom.css", &b"body {}"[..]),
            ("dist/logo.png", &b"new logo"[..]),
            ("README.md", &b"not part of the frontend"[..]),
        ]);
        let report = extract_head(&archive, &static_dir, false).unwrap();

        assert_eq!(report, HeadReport { written: 2, kept: 2 });
        assert!(fs::read_to_string(static_dir.join("index.html")).unwrap().ends_with("<p>app</p>"));
        assert_eq!(fs::read_to_string(static_dir.join("assets/app.js")).unwrap(), "console.log(1)");
        assert_eq!(fs::read_to_string(static_dir.join("custom.css")).unwrap(), "body { color: red }");
        assert!(!static_dir.join("README.md").exists());

        let report = extract_head(&archive, &static_dir, true).unwrap();
        assert_eq!(report, HeadReport { written: 4, kept: 0 });
        assert_eq!(fs::read_to_string(static_dir.join("custom.css")).unwrap(), "body {}");
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            extract_head(b"not a zip", root.path(), false),
            Err(InstallError::Archive(_))
        ));
    }

    #[tokio::test]
    async fn test_install_head_downloads_release() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data");
        install(&dir, InstallOptions::default()).unwrap();
        let archive = release(&[("dist/index.html", &b"<!-- soundboar-default-static -->\nhi"[..])]);
        let url = serve_once("200 OK", archive).await;

        let report = install_head(&dir, &url, false, &MetaExtractor::new().unwrap())
            .await
            .unwrap();
        assert_eq!(report.written, 1);
        assert!(fs::read_to_string(dir.join("static/index.html")).unwrap().ends_with("hi"));
    }

    #[tokio::test]
    async fn test_install_head_reports_missing_release() {
        let root = tempfile::tempdir().unwrap();
        let url = serve_once("404 Not Found", b"no such release".to_vec()).await;

        let err = install_head(root.path(), &url, false, &MetaExtractor::new().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Download { .. }));
    }

    #[test]
    fn test_install_creates_layout() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data");

        let outcome = install(&dir, InstallOptions::default()).unwrap();
        assert_eq!(outcome, InstallOutcome::Installed);
        assert!(dir.join("sounds").is_dir());
        let index = fs::read_to_string(dir.join("static/index.html")).unwrap();
        assert!(index.starts_with(DEFAULT_STATIC_MARKER));
    }

    #[test]
    fn test_existing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data");
        install(&dir, InstallOptions::default()).unwrap();

        assert!(matches!(
            install(&dir, InstallOptions::default()),
            Err(InstallError::AlreadyExists(_))
        ));

        let exist_ok = InstallOptions {
            exist_ok: true,
            ..InstallOptions::default()
        };
        assert_eq!(install(&dir, exist_ok).unwrap(), InstallOutcome::AlreadyInstalled);
    }

    #[test]
    fn test_force_keeps_custom_frontend() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data");
        install(&dir, InstallOptions::default()).unwrap();
        fs::write(dir.join("static/index.html"), "<h1>mine</h1>").unwrap();

        let force = InstallOptions {
            force: true,
            ..InstallOptions::default()
        };
        assert_eq!(install(&dir, force).unwrap(), InstallOutcome::Installed);
        assert_eq!(fs::read_to_string(dir.join("static/index.html")).unwrap(), "<h1>mine</h1>");
    }

    #[test]
    fn test_no_mkdir_and_uninstall() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data");
        let no_mkdir = InstallOptions {
            no_mkdir: true,
            ..InstallOptions::default()
        };
        assert!(matches!(install(&dir, no_mkdir), Err(InstallError::Missing(_))));

        install(&dir, InstallOptions::default()).unwrap();
        uninstall(&dir).unwrap();
        assert!(!dir.exists());
    }
}
