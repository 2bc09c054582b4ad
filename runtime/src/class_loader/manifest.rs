use std::collections::HashMap;

/// `META-INF/MANIFEST.MF` contents: plain `Name: Value` lines, CR/LF
/// tolerant, leading whitespace on values trimmed.
#[derive(Debug, Default)]
pub struct ManifestFile {
    attributes: HashMap<String, String>,
}

impl ManifestFile {
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut attributes = HashMap::new();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let Some(colon) = line.find(':') else {
                continue;
            };
            let name = line[..colon].to_owned();
            let value = line[colon + 1..].trim_start().to_owned();
            attributes.insert(name, value);
        }
        Self { attributes }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// `Main-Class`, canonicalized from dot form to slash form.
    pub fn main_class(&self) -> Option<String> {
        self.attribute("Main-Class")
            .map(|value| value.replace('.', "/"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_crlf_and_trims_values() {
        let data = b"Manifest-Version: 1.0\r\nMain-Class:   com.example.Main\r\n\r\n";
        let manifest = ManifestFile::parse(data);
        assert_eq!(manifest.attribute("Manifest-Version"), Some("1.0"));
        assert_eq!(manifest.main_class().as_deref(), Some("com/example/Main"));
    }

    #[test]
    fn skips_lines_without_a_colon(){
        let manifest = ManifestFile::parse(b"garbage line\nName: ok\n");
        assert_eq!(manifest.attribute("Name"), Some("ok"));
        assert_eq!(manifest.attribute("garbage line"), None);
    }
}
