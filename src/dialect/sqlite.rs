/// Connection parameters for a SQLite database.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqliteDriver {
    /// Path to the database file.
    pub file: String,
    /// Path override; when set `file` is ignored.
    pub connect: Option<String>,
}

impl SqliteDriver {
    #[must_use]
    pub fn connect_string(&self) -> String {
        self.connect.clone().unwrap_or_else(|| self.file.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_string_is_the_file_path_unless_overridden() {
        let mut driver = SqliteDriver {
            file: "data/app.db".to_string(),
            connect: None,
        };
        assert_eq!(driver.connect_string(), "data/app.db");

        driver.connect = Some(":memory:".to_string());
        assert_eq!(driver.connect_string(), ":memory:");
    }
}
