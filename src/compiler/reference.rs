/// Lookup of referenced prompts by path.
///
/// Resolution is synchronous and happens one reference at a time, in
/// document order. Implementations that need a timeout or cancellation do it
/// here; the scanner itself never gives up on a lookup.
pub trait ReferenceResolver {
    /// Raw source of the prompt at `path`.
    ///
    /// `path` is already normalised by [`join_reference_path`]: relative to
    /// the prompt root, `/` separated, with no `.` or `..` segments.
    /// `from` is the normalised path of the referencing document, `None` for
    /// a root document scanned without a path.
    fn resolve(&mut self, path: &str, from: Option<&str>) -> anyhow::Result<String>;
}

impl<F> ReferenceResolver for F
where
    F: FnMut(&str) -> anyhow::Result<String>,
{
    fn resolve(&mut self, path: &str, _from: Option<&str>) -> anyhow::Result<String> {
        self(path)
    }
}

/// Path a reference tag points at, relative to the prompt root.
///
/// A leading `/` starts from the root; anything else starts from the
/// directory of `from`. Returns `None` when the path is empty or climbs
/// above the root.
pub fn join_reference_path(from: Option<&str>, path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    if !path.starts_with('/') {
        if let Some(from) = from {
            segments.extend(from.split('/').filter(|s| !s.is_empty() && *s != "."));
            segments.pop();
        }
    }

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            name => segments.push(name),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}
