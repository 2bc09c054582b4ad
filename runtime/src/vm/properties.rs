use std::collections::HashMap;

/// Plausible Unix-like defaults for the keys the core library reads during
/// bootstrap; caller-supplied values win.
pub(crate) fn default_properties() -> HashMap<String, String> {
    let defaults = [
        ("java.vm.specification.version", "1.8"),
        ("os.arch", std::env::consts::ARCH),
        ("os.name", "Linux"),
        ("os.version", "5.0"),
        ("path.separator", ":"),
        ("line.separator", "\n"),
        ("file.separator", "/"),
        ("file.encoding", "UTF-8"),
        ("sun.jnu.encoding", "UTF-8"),
        ("file.encoding.pkg", "sun.io"),
    ];
    defaults
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn required_keys_are_present() {
        let props = default_properties();
        for key in [
            "os.arch",
            "os.name",
            "os.version",
            "path.separator",
            "line.separator",
            "file.separator",
            "file.encoding",
            "sun.jnu.encoding",
            "file.encoding.pkg",
        ] {
            assert!(props.contains_key(key), "missing {key}");
        }
    }
}
