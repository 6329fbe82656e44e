//! Class label table.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Ordered class names; the line index in the source file is the class id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl ClassLabels {
    /// Load a newline-delimited label file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read label file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid label file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Self::from_lines(raw.lines())
    }

    pub fn from_lines<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels: Vec<String> = lines
            .into_iter()
            .map(|line| line.as_ref().trim_end().to_string())
            .collect();
        // a trailing newline run is not a class
        while labels.last().is_some_and(|label| label.is_empty()) {
            labels.pop();
        }
        if labels.is_empty() {
            return Err(anyhow!("label table is empty"));
        }
        if let Some(idx) = labels.iter().position(|label| label.is_empty()) {
            return Err(anyhow!("line {} is blank; every class needs a name", idx + 1));
        }
        Ok(Self { labels })
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn line_index_is_class_id() {
        let labels = ClassLabels::parse("person\nbicycle\ncar\n").unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(0), Some("person"));
        assert_eq!(labels.get(2), Some("car"));
        assert_eq!(labels.get(3), None);
    }

    #[test]
    fn handles_crlf_and_keeps_inner_spaces() {
        let labels = ClassLabels::parse("traffic light\r\nfire hydrant\r\n").unwrap();
        assert_eq!(labels.get(0), Some("traffic light"));
        assert_eq!(labels.get(1), Some("fire hydrant"));
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(ClassLabels::parse("").is_err());
        assert!(ClassLabels::parse("\n\n").is_err());
    }

    #[test]
    fn trailing_blank_lines_are_not_classes() {
        let labels = ClassLabels::parse("a\nb\n\n").unwrap();
        assert_eq!(labels.len(), 2);
        let labels = ClassLabels::parse("person\r\ncar\r\n  \r\n\r\n").unwrap();
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["person", "car"]);
    }

    #[test]
    fn inner_blank_line_is_rejected_with_line_number() {
        let err = ClassLabels::parse("person\n\ncar\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn loads_from_disk() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"dog\ncat")?;
        let labels = ClassLabels::load(file.path())?;
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["dog", "cat"]);
        Ok(())
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ClassLabels::load("/nonexistent/coco.names").unwrap_err();
        assert!(format!("{err:#}").contains("coco.names"));
    }
}
