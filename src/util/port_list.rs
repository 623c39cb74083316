/// CLI argument helper - PortList
// (c) 2024 Ross Younger
use std::{collections::HashSet, fmt::Display, str::FromStr};

/// An ordered list of TCP port numbers, as entered by the user.
///
/// The text form is comma-separated. Parsing is forgiving: whitespace around entries and
/// empty entries are ignored, repeated ports are dropped (the first occurrence wins), and
/// entries which are not a port number in `1..=65535` are set aside in [`PortList::invalid`]
/// rather than failing the whole list.
///
/// ```text
/// --ports 443,80,9999
/// --ports "443, 80, , 443, http"   # yields 443,80; "http" is invalid
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortList {
    ports: Vec<u16>,
    invalid: Vec<String>,
}

/// Nothing usable was found in a port list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no valid ports in `{0}`")]
pub struct NoValidPorts(pub String);

impl PortList {
    /// Parses a list, keeping whatever is valid. This never fails.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        let mut seen = HashSet::new();
        let mut result = Self::default();
        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if !token.bytes().all(|b| b.is_ascii_digit()) {
                result.invalid.push(token.to_string());
                continue;
            }
            match token.parse::<u16>() {
                Ok(0) | Err(_) => result.invalid.push(token.to_string()),
                Ok(port) => {
                    if seen.insert(port) {
                        result.ports.push(port);
                    }
                }
            }
        }
        result
    }

    /// The valid ports, in the order given
    #[must_use]
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// The entries which were not valid ports
    #[must_use]
    pub fn invalid(&self) -> &[String] {
        &self.invalid
    }

    /// Are there no valid ports?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl Display for PortList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&csv(&self.ports))
    }
}

/// Formats ports as a comma-separated list, the same form [`PortList`] parses
#[must_use]
pub fn csv(ports: &[u16]) -> String {
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl FromStr for PortList {
    type Err = NoValidPorts;

    /// Parses leniently, but fails if nothing valid remains
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let list = Self::parse_lenient(s);
        if list.is_empty() {
            return Err(NoValidPorts(s.to_string()));
        }
        Ok(list)
    }
}
