use std::fmt;

/// Fixed endpoints exposed by the device web server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Configuration, tariff counters and input labels.
    Data,
    /// Instantaneous power and volume readings.
    Inst,
    /// Hourly log of the circuits and teleinfo counters.
    Log1,
    /// Daily totals log.
    Log2,
}

impl Endpoint {
    /// All endpoints.
    pub const ALL: [Self; 4] = [Self::Data, Self::Inst, Self::Log1, Self::Log2];

    /// Path of the endpoint, without leading slash.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Data => "data.json",
            Self::Inst => "inst.json",
            Self::Log1 => "log1.csv",
            Self::Log2 => "log2.csv",
        }
    }

    /// Whether the endpoint body is JSON (otherwise CSV text).
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Data | Self::Inst)
    }

    pub(crate) fn url(self, host: &str) -> String {
        format!("http://{host}/{}", self.path())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        assert_eq!(
            Endpoint::Data.url("192.168.1.20"),
            "http://192.168.1.20/data.json"
        );
        assert_eq!(
            Endpoint::Log2.url("ecocompteur.lan:8080"),
            "http://ecocompteur.lan:8080/log2.csv"
        );
    }

    #[test]
    fn test_json_endpoints() {
        let json: Vec<_> = Endpoint::ALL
            .into_iter()
            .filter(|endpoint| endpoint.is_json())
            .collect();
        assert_eq!(json, [Endpoint::Data, Endpoint::Inst]);
    }
}
