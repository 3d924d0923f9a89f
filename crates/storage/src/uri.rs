//! URI handling for data source locations.
//!
//! Accepted form is `<scheme>://<host>/<path>`. A missing scheme means a
//! local path; a relative local path is normalized to absolute. `%7B` and
//! `%7D` escapes are decoded back to `{` and `}` so templated locations
//! survive passing through URL-escaping layers.

use ember_common::Result;

/// Parsed source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    /// Lowercased scheme; `local` when the input carried none.
    pub scheme: String,
    /// Bucket/container/host; empty for local paths.
    pub host: String,
    /// Object key or filesystem path. Local paths keep their leading slash,
    /// object-store keys do not.
    pub path: String,
}

/// Scheme used for plain filesystem paths.
pub const LOCAL_SCHEME: &str = "local";

fn decode_braces(s: &str) -> String {
    s.replace("%7B", "{").replace("%7D", "}")
}

/// Parse a source location string.
pub fn parse(input: &str) -> Result<Uri> {
    let decoded = decode_braces(input);
    if let Some(pos) = decoded.find("://") {
        let scheme = decoded[..pos].to_ascii_lowercase();
        let rest = &decoded[pos + 3..];
        if scheme == LOCAL_SCHEME {
            // local://host parts carry no meaning; keep the absolute path
            let path = rest.find('/').map(|p| &rest[p..]).unwrap_or("/");
            return Ok(Uri {
                scheme,
                host: String::new(),
                path: path.to_string(),
            });
        }
        let (host, path) = match rest.find('/') {
            Some(p) => (&rest[..p], &rest[p + 1..]),
            None => (rest, ""),
        };
        return Ok(Uri {
            scheme,
            host: host.to_string(),
            path: path.to_string(),
        });
    }

    let path = if decoded.starts_with('/') {
        decoded
    } else {
        let cwd = std::env::current_dir()?;
        cwd.join(&decoded).to_string_lossy().into_owned()
    };
    Ok(Uri {
        scheme: LOCAL_SCHEME.to_string(),
        host: String::new(),
        path,
    })
}

/// Render a parsed location back into its canonical string form.
pub fn render(uri: &Uri) -> String {
    if uri.scheme == LOCAL_SCHEME {
        return uri.path.clone();
    }
    format!("{}://{}/{}", uri.scheme, uri.host, uri.path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_store_uri_splits_host_and_key() {
        let u = parse("s3://bucket/events/dt=2023-11-14").expect("parse");
        assert_eq!(u.scheme, "s3");
        assert_eq!(u.host, "bucket");
        assert_eq!(u.path, "events/dt=2023-11-14");
    }

    #[test]
    fn missing_scheme_is_local_and_relative_becomes_absolute() {
        let u = parse("relative/dir").expect("parse");
        assert_eq!(u.scheme, LOCAL_SCHEME);
        assert!(u.path.starts_with('/'));
        assert!(u.path.ends_with("relative/dir"));

        let abs = parse("/var/data").expect("parse");
        assert_eq!(abs.path, "/var/data");
    }

    #[test]
    fn escaped_braces_are_decoded() {
        let u = parse("s3://b/dt=%7Bdate%7D").expect("parse");
        assert_eq!(u.path, "dt={date}");
    }

    #[test]
    fn parse_render_round_trip_is_stable() {
        for input in [
            "s3://bucket/a/b",
            "gs://b/k={date}",
            "abfs://container/part/x",
            "s3://bucket",
            "/abs/path",
            "relative/path",
            "s3://b/dt=%7Bdate%7D",
        ] {
            let once = parse(input).expect("parse");
            let again = parse(&render(&once)).expect("reparse");
            assert_eq!(once, again, "round trip failed for {input}");
        }
    }
}
