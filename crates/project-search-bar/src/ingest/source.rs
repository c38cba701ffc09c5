//! Discovering and reading LaTeX sources on disk.

use std::collections::{HashMap, HashSet};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use flate2::read::GzDecoder;
use regex::Regex;

use crate::models::ArxivId;

/// How a source is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A single `.tex` file.
    Tex,
    /// A `.tar.gz`, `.tgz`, `.tar` or bare `.gz` e-print.
    Archive,
    /// A directory of `.tex` files.
    Directory,
}

/// One paper's source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    pub arxiv_id: ArxivId,
    pub kind: SourceKind,
}

const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar", ".gz"];

/// Upper bound on the decompressed size of one e-print.
pub const MAX_UNPACKED_BYTES: u64 = 256 * 1024 * 1024;

/// Nesting limit for `\input` chains.
const MAX_INCLUDE_DEPTH: usize = 8;

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:input|include|subfile)\s*\{\s*([^{}]+?)\s*\}").expect("valid regex")
});

/// Find every paper source directly under `dir`, sorted by path.
pub fn discover_sources(dir: &Path) -> io::Result<Vec<Source>> {
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || name.ends_with(".part") {
            continue;
        }

        let kind = if entry.file_type()?.is_dir() {
            if tex_files(&path)?.is_empty() {
                continue;
            }
            SourceKind::Directory
        } else if has_extension(&path, "tex") {
            SourceKind::Tex
        } else if ARCHIVE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            SourceKind::Archive
        } else {
            continue;
        };

        sources.push(Source { arxiv_id: ArxivId::from_file_name(name), path, kind });
    }
    sources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}

/// Read all LaTeX text of a source as one document (see [`assemble`]).
pub fn read_source(source: &Source) -> io::Result<String> {
    let files = match source.kind {
        SourceKind::Tex => vec![(source.path.clone(), read_lossy(&std::fs::read(&source.path)?))],
        SourceKind::Directory => tex_files(&source.path)?
            .into_iter()
            .map(|path| {
                let text = read_lossy(&std::fs::read(&path)?);
                let relative = path.strip_prefix(&source.path).map(Path::to_path_buf).unwrap_or(path);
                Ok((relative, text))
            })
            .collect::<io::Result<Vec<_>>>()?,
        SourceKind::Archive => read_archive(&std::fs::read(&source.path)?)?,
    };
    Ok(assemble(files))
}

/// Unpack an e-print. arXiv serves gzipped tarballs, gzipped single files
/// and occasionally plain tarballs.
pub fn read_archive(bytes: &[u8]) -> io::Result<Vec<(PathBuf, String)>> {
    read_archive_limited(bytes, MAX_UNPACKED_BYTES)
}

fn read_archive_limited(bytes: &[u8], limit: u64) -> io::Result<Vec<(PathBuf, String)>> {
    let data = if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut out = Vec::new();
        GzDecoder::new(bytes).take(limit + 1).read_to_end(&mut out)?;
        if out.len() as u64 > limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("e-print unpacks to more than {limit} bytes"),
            ));
        }
        out
    } else {
        bytes.to_vec()
    };

    if !is_tar(&data) {
        let text = read_lossy(&data);
        return Ok(if text.trim().is_empty() { Vec::new() } else { vec![(PathBuf::from("main.tex"), text)] });
    }

    let mut files = Vec::new();
    let mut archive = tar::Archive::new(data.as_slice());
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.into_owned();
        if !is_safe_path(&path) {
            tracing::debug!(path = %path.display(), "Skipping unsafe archive entry");
            continue;
        }
        if !has_extension(&path, "tex") {
            continue;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        files.push((path, read_lossy(&content)));
    }
    Ok(files)
}

fn is_tar(data: &[u8]) -> bool {
    data.len() >= 262 && &data[257..262] == b"ustar"
}

fn is_safe_path(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn read_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Every `.tex` file under `dir`, recursively, sorted.
fn tex_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                pending.push(path);
            } else if has_extension(&path, "tex") {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn is_main_file(text: &str) -> bool {
    text.contains("\\documentclass") || text.contains("\\begin{document}")
}

/// Slash-separated relative key, e.g. `sections/intro.tex`.
fn file_key(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Find the file an `\input{name}` refers to, relative to the main file's
/// directory first and the source root second.
fn resolve_include(name: &str, base: &str, files: &HashMap<String, String>) -> Option<String> {
    let name = name.trim_start_matches("./");
    [base, ""]
        .iter()
        .map(|dir| if dir.is_empty() { name.to_string() } else { format!("{dir}/{name}") })
        .flat_map(|joined| [format!("{joined}.tex"), joined])
        .map(|candidate| file_key(Path::new(&candidate)))
        .find(|key| files.contains_key(key))
}

/// Whether `pos` sits behind an unescaped `%` on its line.
fn in_comment(text: &str, pos: usize) -> bool {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let mut escaped = false;
    for c in text[line_start..pos].chars() {
        match c {
            '\\' => escaped = !escaped,
            '%' if !escaped => return true,
            _ => escaped = false,
        }
    }
    false
}

fn expand_includes(
    text: &str,
    files: &HashMap<String, String>,
    base: &str,
    used: &mut HashSet<String>,
    depth: usize,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in INCLUDE.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if depth >= MAX_INCLUDE_DEPTH || in_comment(text, whole.start()) {
            continue;
        }
        let Some(key) = resolve_include(name.as_str(), base, files) else {
            continue;
        };
        if !used.insert(key.clone()) {
            continue;
        }
        out.push_str(&text[last..whole.start()]);
        out.push('\n');
        out.push_str(&expand_includes(&files[&key], files, base, used, depth + 1));
        out.push('\n');
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Join a multi-file source into one document.
///
/// `\input`, `\include` and `\subfile` in the main file are replaced by the
/// files they name. Files never referenced are placed before
/// `\end{document}` so their text still counts as body.
pub fn assemble(mut files: Vec<(PathBuf, String)>) -> String {
    files.sort_by(|a, b| a.0.cmp(&b.0));
    let Some(main) = files.iter().position(|(_, text)| is_main_file(text)) else {
        return files.into_iter().map(|(_, text)| text).collect::<Vec<_>>().join("\n");
    };

    let main_key = file_key(&files[main].0);
    let base = main_key.rsplit_once('/').map_or("", |(dir, _)| dir).to_string();
    let order: Vec<String> = files.iter().map(|(path, _)| file_key(path)).collect();
    let texts: HashMap<String, String> =
        files.into_iter().map(|(path, text)| (file_key(&path), text)).collect();

    let mut used = HashSet::from([main_key.clone()]);
    let mut document = expand_includes(&texts[&main_key], &texts, &base, &mut used, 0);

    let rest: Vec<&str> = order
        .iter()
        .filter(|key| !used.contains(*key))
        .filter_map(|key| texts.get(key).map(String::as_str))
        .collect();
    if !rest.is_empty() {
        let extra = format!("{}\n", rest.join("\n"));
        match document.rfind("\\end{document}") {
            Some(at) => document.insert_str(at, &extra),
            None => {
                document.push('\n');
                document.push_str(&extra);
            }
        }
    }
    document
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_read_gzipped_tarball_main_first() {
        let bytes = gzip(&tarball(&[
            ("appendix.tex", "appendix text"),
            ("figure.png", "binary"),
            ("paper.tex", "\\documentclass{article}\\begin{document}main\\end{document}"),
        ]));
        let files = read_archive(&bytes).unwrap();
        assert_eq!(files.len(), 2);

        let joined = assemble(files);
        assert!(joined.starts_with("\\documentclass"));
        assert!(joined.ends_with("appendix text\n\\end{document}"));
    }

    #[test]
    fn test_inputs_are_inlined_into_the_body() {
        let bytes = gzip(&tarball(&[
            (
                "main.tex",
                "\\documentclass{article}\\begin{document}\\input{intro}\n\\include{sections/proof.tex}\n\\end{document}",
            ),
            ("intro.tex", "The large sieve inequality."),
            ("sections/proof.tex", "A contour argument."),
        ]));
        let document = assemble(read_archive(&bytes).unwrap());

        let intro = document.find("large sieve").unwrap();
        let proof = document.find("contour argument").unwrap();
        let end = document.find("\\end{document}").unwrap();
        assert!(intro < proof && proof < end);
        assert!(!document.contains("\\input{intro}"));

        let body = crate::latex::extract_document(&document).body;
        assert!(body.contains("sieve"));
        assert!(body.contains("contour"));
    }

    #[test]
    fn test_includes_resolve_relative_to_main_file() {
        let files = vec![
            (PathBuf::from("paper/main.tex"), "\\begin{document}\\input{body}\\end{document}".to_string()),
            (PathBuf::from("paper/body.tex"), "nested \\input{paper/main} text".to_string()),
        ];
        let document = assemble(files);
        assert_eq!(document.matches("nested").count(), 1);
        assert!(document.contains("\\input{paper/main}"));
    }

    #[test]
    fn test_commented_input_is_not_expanded() {
        let files = vec![
            (PathBuf::from("main.tex"), "\\begin{document}\n% \\input{draft}\n\\end{document}".to_string()),
            (PathBuf::from("draft.tex"), "draft text".to_string()),
        ];
        let document = assemble(files);
        assert!(document.contains("% \\input{draft}\ndraft text\n\\end{document}"));
    }

    #[test]
    fn test_gzip_bomb_is_rejected() {
        let bytes = gzip(&vec![b'a'; 64 * 1024]);
        let err = read_archive_limited(&bytes, 1024).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(read_archive_limited(&bytes, 64 * 1024).unwrap().len(), 1);
    }

    #[test]
    fn test_read_gzipped_single_file() {
        let bytes = gzip(b"\\documentclass{amsart} hello");
        let files = read_archive(&bytes).unwrap();
        assert_eq!(files, vec![(PathBuf::from("main.tex"), "\\documentclass{amsart} hello".to_string())]);
    }

    #[test]
    fn test_unsafe_paths_rejected() {
        assert!(is_safe_path(Path::new("sub/paper.tex")));
        assert!(is_safe_path(Path::new("./paper.tex")));
        assert!(!is_safe_path(Path::new("../escape.tex")));
        assert!(!is_safe_path(Path::new("/etc/passwd.tex")));
    }

    #[test]
    fn test_discover_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2101.00001.tar.gz"), gzip(b"x")).unwrap();
        std::fs::write(dir.path().join("notes.tex"), "hello").unwrap();
        std::fs::write(dir.path().join("readme.md"), "skip").unwrap();
        std::fs::write(dir.path().join("2101.00009.tar.gz.part"), "partial").unwrap();
        std::fs::create_dir(dir.path().join("math_0601001")).unwrap();
        std::fs::write(dir.path().join("math_0601001").join("main.tex"), "x").unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let sources = discover_sources(dir.path()).unwrap();
        let found: Vec<(&str, SourceKind)> =
            sources.iter().map(|s| (s.arxiv_id.as_str(), s.kind)).collect();
        assert_eq!(
            found,
            vec![
                ("2101.00001", SourceKind::Archive),
                ("math/0601001", SourceKind::Directory),
                ("notes", SourceKind::Tex),
            ]
        );
    }

    #[test]
    fn test_non_utf8_is_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.tex");
        std::fs::write(&path, b"Poincar\xe9").unwrap();
        let source = Source { path, arxiv_id: ArxivId::new("latin1"), kind: SourceKind::Tex };
        assert_eq!(read_source(&source).unwrap(), "Poincar\u{fffd}");
    }
}
